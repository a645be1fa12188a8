//! RESP command listener.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::lifecycle::signal::ShutdownSignal;
use crate::observability::metrics::get_metrics;
use crate::server::resp::{read_command, Reply};
use crate::server::surface::{CommandSurface, ExpiringValue};
use crate::upstream::client::IssuerClient;

static RESP_MSG: &'static str = "resp";

/// Pause after a failed accept (e.g. EMFILE) before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub async fn bind(address: &str) -> Result<TcpListener> {
    TcpListener::bind(address)
        .await
        .map_err(|e| anyhow!("command listener cannot bind '{}': {}", address, e))
}

/// Accepts connections until `quit` fires, then waits for open
/// connections to close.
pub async fn serve<C>(listener: TcpListener, surface: CommandSurface<C>, quit: ShutdownSignal) -> Result<()>
where
    C: IssuerClient + 'static,
{
    info!("command listener on {}", listener.local_addr()?);
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = quit.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let surface = surface.clone();
                    let quit = quit.clone();
                    connections.spawn(async move {
                        if let Err(err) = handle_connection(stream, peer, surface, quit).await {
                            debug!(%peer, "connection closed: {}", err);
                        }
                    });
                }
                Err(err) => accept_failed(err).await,
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);
    while connections.join_next().await.is_some() {}
    info!("command listener stopped");
    Ok(())
}

async fn accept_failed(err: std::io::Error) {
    warn!("accept failed: {}", err);
    sleep(ACCEPT_BACKOFF).await;
}

async fn handle_connection<C>(
    stream: TcpStream,
    peer: SocketAddr,
    surface: CommandSurface<C>,
    quit: ShutdownSignal,
) -> Result<()>
where
    C: IssuerClient + 'static,
{
    debug!(%peer, "connection opened");
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let args = tokio::select! {
            _ = quit.cancelled() => break,
            request = read_command(&mut reader) => match request {
                Ok(Some(args)) => args,
                Ok(None) => break,
                Err(err) => {
                    let reply = Reply::Error(format!("ERR protocol error: {}", err));
                    write_half.write_all(&reply.to_bytes()).await?;
                    break;
                }
            },
        };

        let reply = dispatch(&surface, &args).await;
        write_half.write_all(&reply.to_bytes()).await?;
    }

    write_half.shutdown().await.ok();
    Ok(())
}

/// Runs one command. Names are case-insensitive.
pub async fn dispatch<C>(surface: &CommandSurface<C>, args: &[String]) -> Reply
where
    C: IssuerClient + 'static,
{
    let Some((name, rest)) = args.split_first() else {
        return Reply::Error("ERR empty command".to_owned());
    };
    let command = name.to_ascii_lowercase();
    let rest: Vec<&str> = rest.iter().map(String::as_str).collect();

    let arity_ok = match command.as_str() {
        "version" | "save" | "command" => rest.is_empty(),
        "ping" => rest.len() <= 1,
        "token" | "ticket" | "ztoken" | "zticket" => matches!(rest.len(), 1 | 2),
        "zall" => rest.len() == 1,
        _ => return Reply::Error(format!("ERR unknown command '{}'", name)),
    };
    if !arity_ok {
        return Reply::Error(format!(
            "ERR wrong number of arguments for '{}' command",
            command
        ));
    }

    get_metrics()
        .await
        .requests
        .with_label_values(&[RESP_MSG, command.as_str()])
        .inc();

    let flag = rest.get(1).copied();
    match command.as_str() {
        "version" => Reply::Bulk(surface.version().to_owned()),
        "ping" => match rest.first() {
            Some(message) => Reply::Bulk((*message).to_owned()),
            None => Reply::Simple("PONG".to_owned()),
        },
        "command" => Reply::ok(),
        "save" => {
            surface.save();
            Reply::ok()
        }
        "token" => Reply::Bulk(surface.token(rest[0], flag).await),
        "ticket" => Reply::Bulk(surface.ticket(rest[0], flag).await),
        "ztoken" => pair(surface.ztoken(rest[0], flag).await),
        "zticket" => pair(surface.zticket(rest[0], flag).await),
        "zall" => {
            let all = surface.zall(rest[0]).await;
            let mut items = pair_items(all.token);
            items.extend(pair_items(all.ticket));
            Reply::Array(items)
        }
        _ => Reply::Error(format!("ERR unknown command '{}'", name)),
    }
}

fn pair(value: ExpiringValue) -> Reply {
    Reply::Array(pair_items(value))
}

fn pair_items(value: ExpiringValue) -> Vec<Reply> {
    vec![Reply::Bulk(value.value), Reply::Bulk(value.expire_at.to_string())]
}
