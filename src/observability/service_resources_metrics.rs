use anyhow::{anyhow, Result};
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tokio::time::sleep;
use tracing::debug;

use crate::helpers::time::now_i64;
use crate::lifecycle::signal::ShutdownSignal;
use crate::lifecycle::startup::StartupInfo;
use crate::observability::metrics::{get_metrics, Metrics};

const SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

/// Samples this process into the resource gauges until shutdown.
pub async fn collect_process_metrics(
    is_metrics_enabled: bool,
    startup: StartupInfo,
    quit: ShutdownSignal,
) -> Result<()> {
    if !is_metrics_enabled {
        return Ok(());
    }
    let metrics = get_metrics().await;
    let mut sys = System::new();
    let pid = sysinfo::get_current_pid().map_err(|e| anyhow!("cannot resolve own pid: {}", e))?;

    metrics.process_start_time.set(startup.started_at);

    loop {
        sample(metrics, &mut sys, pid, &startup);

        tokio::select! {
            _ = quit.cancelled() => break,
            _ = sleep(SAMPLE_INTERVAL) => {}
        }
    }
    debug!("process sampler stopped");
    Ok(())
}

fn sample(metrics: &Metrics, sys: &mut System, pid: Pid, startup: &StartupInfo) {
    sys.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        false,
        ProcessRefreshKind::nothing()
            .with_cpu()
            .with_memory()
            .with_exe(UpdateKind::OnlyIfNotSet),
    );

    if let Some(proc) = sys.process(pid) {
        metrics.process_cpu_usage.set(proc.cpu_usage().into());
        metrics.process_memory_usage.set(proc.memory() as i64);
        metrics.process_virtual_memory.set(proc.virtual_memory() as i64);

        #[cfg(target_family = "unix")]
        {
            if let Ok(entries) = std::fs::read_dir(format!("/proc/{}/fd", pid.as_u32())) {
                metrics.process_open_fds.set(entries.count() as i64);
            }
        }
    }
    metrics.process_uptime.set(startup.uptime_seconds(now_i64()));
}
