use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use credential_proxy::cache::credential_store::CredentialStore;
use credential_proxy::lifecycle::coordinator::Lifecycle;
use credential_proxy::lifecycle::startup::StartupInfo;
use credential_proxy::observability::metrics::get_metrics;
use credential_proxy::observability::service_resources_metrics::collect_process_metrics;
use credential_proxy::server;
use credential_proxy::upstream::client::HttpIssuer;
use credential_proxy::utils::config_loader;
use credential_proxy::utils::logging::{self, LogLevel};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "credential-proxy.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, set up logging
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level).await?;

    // -------------------------------
    // 2. Build the store and restore the last snapshot
    // -------------------------------

    let issuer = HttpIssuer::new(&service_config.settings.upstream).context("build issuer client")?;
    let store = Arc::new(CredentialStore::from_config(&service_config, issuer));
    let restored = store.load_data().await;
    info!("restored {} credentials", restored);

    // -------------------------------
    // 3. Register listeners and the process sampler
    // -------------------------------

    let lifecycle = Lifecycle::with_os_signals().context("install signal handlers")?;
    let startup = StartupInfo::capture();
    lifecycle.set(startup.clone());

    server::server::start(&lifecycle, &service_config.settings, store.clone());

    let is_metrics_enabled = service_config.settings.metrics.is_enabled;
    lifecycle.spawn("process-metrics", move |quit| {
        collect_process_metrics(is_metrics_enabled, startup, quit)
    });

    get_metrics().await.up.set(1);
    let startup = lifecycle.get().unwrap_or_else(StartupInfo::capture);
    info!(
        version = %startup.version,
        pid = startup.pid,
        command = %service_config.settings.command_address,
        web = %service_config.settings.web_address,
        "Service starting..."
    );

    // -------------------------------
    // 4. Wait for shutdown, drain workers, persist
    // -------------------------------

    lifecycle.quit().cancelled().await;
    lifecycle.join().await;
    get_metrics().await.up.set(0);

    store.save_all().await;

    match lifecycle.fatal() {
        Some(reason) => Err(anyhow!(reason)),
        None => Ok(()),
    }
}
