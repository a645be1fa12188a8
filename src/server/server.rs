use std::sync::Arc;

use tokio::net::TcpListener;

use crate::cache::credential_store::CredentialStore;
use crate::config::settings::{MetricsConfig, SettingsConfig};
use crate::lifecycle::coordinator::Lifecycle;
use crate::server::surface::CommandSurface;
use crate::server::{command, http};
use crate::upstream::client::IssuerClient;

/// Registers the command and web listeners with the coordinator.
///
/// Each listener binds inside its own worker, so a bind failure surfaces
/// as a fatal worker error and shuts the process down.
pub fn start<C>(lifecycle: &Arc<Lifecycle>, settings: &SettingsConfig, store: Arc<CredentialStore<C>>)
where
    C: IssuerClient + 'static,
{
    let surface = CommandSurface::new(store);

    let address = settings.command_address.clone();
    let commands = surface.clone();
    lifecycle.spawn("command", move |quit| async move {
        let listener = command::bind(&address).await?;
        command::serve(listener, commands, quit).await
    });

    let address = settings.web_address.clone();
    let app = http::router(surface, &settings.metrics);
    lifecycle.spawn("web", move |quit| async move {
        let listener = http::bind(&address).await?;
        http::serve(listener, app, quit).await
    });
}

/// Same as [`start`] for listeners bound by the caller.
pub fn start_on<C>(
    lifecycle: &Arc<Lifecycle>,
    command_listener: TcpListener,
    web_listener: TcpListener,
    metrics_config: &MetricsConfig,
    store: Arc<CredentialStore<C>>,
) where
    C: IssuerClient + 'static,
{
    let surface = CommandSurface::new(store);

    let commands = surface.clone();
    lifecycle.spawn("command", move |quit| command::serve(command_listener, commands, quit));

    let app = http::router(surface, metrics_config);
    lifecycle.spawn("web", move |quit| http::serve(web_listener, app, quit));
}
