//! Minimal RESP framing: multi-bulk requests, inline requests, and the four
//! reply kinds the command table needs.

use anyhow::{anyhow, bail, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

const MAX_ARGS: usize = 64;
const MAX_BULK_LEN: usize = 64 * 1024;
const MAX_LINE_LEN: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Simple(String),
    Error(String),
    Bulk(String),
    Array(Vec<Reply>),
}

impl Reply {
    pub fn ok() -> Self {
        Reply::Simple("OK".to_owned())
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Reply::Simple(s) => {
                out.push(b'+');
                out.extend_from_slice(s.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Reply::Error(s) => {
                out.push(b'-');
                out.extend_from_slice(s.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Reply::Bulk(s) => {
                out.extend_from_slice(format!("${}\r\n", s.len()).as_bytes());
                out.extend_from_slice(s.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Reply::Array(items) => {
                out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
                for item in items {
                    item.encode(out);
                }
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }
}

/// Reads one request. `Ok(None)` means the peer closed the connection;
/// blank inline lines are skipped.
pub async fn read_command<R>(reader: &mut R) -> Result<Option<Vec<String>>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let Some(line) = read_line(reader).await? else {
            return Ok(None);
        };
        if line.is_empty() {
            continue;
        }

        if let Some(count) = line.strip_prefix('*') {
            let count = parse_len(count, MAX_ARGS)?;
            let mut args = Vec::with_capacity(count);
            for _ in 0..count {
                args.push(read_bulk(reader).await?);
            }
            if args.is_empty() {
                continue;
            }
            return Ok(Some(args));
        }

        return Ok(Some(line.split_whitespace().map(str::to_owned).collect()));
    }
}

async fn read_bulk<R>(reader: &mut R) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let header = read_line(reader)
        .await?
        .ok_or_else(|| anyhow!("unexpected end of stream"))?;
    let len = header
        .strip_prefix('$')
        .ok_or_else(|| anyhow!("expected '$', got '{}'", header))?;
    let len = parse_len(len, MAX_BULK_LEN)?;

    let mut payload = vec![0u8; len + 2];
    reader.read_exact(&mut payload).await?;
    if !payload.ends_with(b"\r\n") {
        bail!("bulk string is not terminated by CRLF");
    }
    payload.truncate(len);
    Ok(String::from_utf8(payload)?)
}

async fn read_line<R>(reader: &mut R) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let n = (&mut *reader).take(MAX_LINE_LEN as u64 + 1).read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    if n > MAX_LINE_LEN {
        bail!("request line too long");
    }
    while matches!(buf.last(), Some(b'\n') | Some(b'\r')) {
        buf.pop();
    }
    Ok(Some(String::from_utf8(buf)?))
}

fn parse_len(raw: &str, max: usize) -> Result<usize> {
    let len: usize = raw.trim().parse().map_err(|_| anyhow!("invalid length '{}'", raw))?;
    if len > max {
        bail!("length {} exceeds limit {}", len, max);
    }
    Ok(len)
}
