// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::time::Duration;

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tracing::{info, warn};

use module_gateway::{
    api::router,
    auth::IdentityResolver,
    config::{init_tracing, GatewayConfig},
    gateway::rotate_module_key,
    state::AppState,
    storage::{FileStorage, StoragePaths},
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = GatewayConfig::from_env()?;

    let mut storage = FileStorage::new(StoragePaths::new(&config.data_dir));
    storage.initialize()?;
    info!(data_dir = %config.data_dir.display(), "Storage initialized");

    for (module_id, secret) in &config.seed_module_keys {
        rotate_module_key(&storage, module_id, secret)?;
        info!(module_id = %module_id, "Seeded module key");
    }

    let identity = match &config.identity {
        Some(settings) => {
            info!(jwks_url = %settings.jwks_url, "Identity provider configured");
            IdentityResolver::new(settings.to_config())
        }
        None => {
            warn!("No identity provider configured; bearer tokens will not be accepted");
            IdentityResolver::default()
        }
    };

    let app = router(AppState::new(storage).with_identity(identity));

    let handle: Handle<SocketAddr> = Handle::new();
    tokio::spawn(shutdown_on_signal(handle.clone()));

    match &config.tls {
        Some(tls) => {
            // Install the ring crypto provider for rustls before any TLS work.
            rustls::crypto::ring::default_provider()
                .install_default()
                .map_err(|_| "failed to install rustls crypto provider")?;
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;

            info!(addr = %config.bind_addr, "Module gateway listening on https (docs at /docs)");
            axum_server::bind_rustls(config.bind_addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            info!(addr = %config.bind_addr, "Module gateway listening on http (docs at /docs)");
            axum_server::bind(config.bind_addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
    }

    info!("Module gateway stopped");
    Ok(())
}

async fn shutdown_on_signal(handle: Handle<SocketAddr>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}
