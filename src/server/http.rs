use std::collections::HashMap;

use anyhow::{anyhow, Result};
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::settings::MetricsConfig;
use crate::lifecycle::signal::ShutdownSignal;
use crate::observability::metrics::get_metrics;
use crate::observability::routes::metrics_router;
use crate::server::surface::{AllValues, CommandSurface, ExpiringValue};
use crate::upstream::client::IssuerClient;

static HTTP_MSG: &'static str = "http";

/// Web routes over the command table. The optional trailing segment is the
/// refresh flag; `1` forces a refresh.
pub fn router<C>(surface: CommandSurface<C>, metrics_config: &MetricsConfig) -> Router
where
    C: IssuerClient + 'static,
{
    Router::new()
        .route("/", get(version::<C>))
        .route("/token/{name}", get(token::<C>))
        .route("/token/{name}/{flag}", get(token::<C>))
        .route("/ticket/{name}", get(ticket::<C>))
        .route("/ticket/{name}/{flag}", get(ticket::<C>))
        .route("/ztoken/{name}", get(ztoken::<C>))
        .route("/ztoken/{name}/{flag}", get(ztoken::<C>))
        .route("/zticket/{name}", get(zticket::<C>))
        .route("/zticket/{name}/{flag}", get(zticket::<C>))
        .route("/zall/{name}", get(zall::<C>))
        .route("/save", get(save::<C>).post(save::<C>))
        .merge(metrics_router(metrics_config))
        .with_state(surface)
}

pub async fn bind(address: &str) -> Result<TcpListener> {
    TcpListener::bind(address)
        .await
        .map_err(|e| anyhow!("web listener cannot bind '{}': {}", address, e))
}

/// Serves until `quit` fires; in-flight requests are allowed to finish.
pub async fn serve(listener: TcpListener, app: Router, quit: ShutdownSignal) -> Result<()> {
    info!("web listener on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { quit.cancelled().await })
        .await?;
    info!("web listener stopped");
    Ok(())
}

struct Target {
    name: String,
    flag: Option<String>,
}

impl Target {
    fn from_params(mut params: HashMap<String, String>) -> Self {
        Self {
            name: params.remove("name").unwrap_or_default(),
            flag: params.remove("flag"),
        }
    }
}

async fn count(command: &str) {
    get_metrics()
        .await
        .requests
        .with_label_values(&[HTTP_MSG, command])
        .inc();
}

async fn version<C: IssuerClient + 'static>(State(surface): State<CommandSurface<C>>) -> String {
    count("version").await;
    format!("version {}", surface.version())
}

async fn token<C: IssuerClient + 'static>(
    State(surface): State<CommandSurface<C>>,
    Path(params): Path<HashMap<String, String>>,
) -> String {
    count("token").await;
    let target = Target::from_params(params);
    surface.token(&target.name, target.flag.as_deref()).await
}

async fn ticket<C: IssuerClient + 'static>(
    State(surface): State<CommandSurface<C>>,
    Path(params): Path<HashMap<String, String>>,
) -> String {
    count("ticket").await;
    let target = Target::from_params(params);
    surface.ticket(&target.name, target.flag.as_deref()).await
}

async fn ztoken<C: IssuerClient + 'static>(
    State(surface): State<CommandSurface<C>>,
    Path(params): Path<HashMap<String, String>>,
) -> Json<ExpiringValue> {
    count("ztoken").await;
    let target = Target::from_params(params);
    Json(surface.ztoken(&target.name, target.flag.as_deref()).await)
}

async fn zticket<C: IssuerClient + 'static>(
    State(surface): State<CommandSurface<C>>,
    Path(params): Path<HashMap<String, String>>,
) -> Json<ExpiringValue> {
    count("zticket").await;
    let target = Target::from_params(params);
    Json(surface.zticket(&target.name, target.flag.as_deref()).await)
}

async fn zall<C: IssuerClient + 'static>(
    State(surface): State<CommandSurface<C>>,
    Path(name): Path<String>,
) -> Json<AllValues> {
    count("zall").await;
    Json(surface.zall(&name).await)
}

async fn save<C: IssuerClient + 'static>(State(surface): State<CommandSurface<C>>) -> &'static str {
    count("save").await;
    surface.save();
    "OK"
}
