// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{error::Error, sync::Arc, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tracing::{info, warn};

use micro_stakes_server::{
    api::router,
    auth::{CachedKeySource, KeySource, RemoteKeySet},
    config::{Config, USER_DB_FILE},
    logging,
    state::AppState,
    storage::{ensure_user, IdentityProvider, InMemoryUserDirectory, NewUser, RedbUserDirectory, UserDirectory},
};

type BoxError = Box<dyn Error + Send + Sync>;

/// Time in-flight requests get to finish after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::from_env()?;
    logging::init(config.log_format)?;

    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| "failed to install rustls crypto provider")?;

    let certs_url = config.keycloak.certs_url()?;
    info!(url = %certs_url, realm = %config.keycloak.realm, "Using Keycloak signing keys");
    let remote = RemoteKeySet::new(certs_url, config.keycloak.timeout)?;
    let keys: Arc<dyn KeySource> = if config.keycloak.cache_ttl.is_zero() {
        warn!("Signing key cache disabled; every request fetches the key set");
        Arc::new(remote)
    } else {
        Arc::new(CachedKeySource::new(Arc::new(remote), config.keycloak.cache_ttl))
    };

    let users: Arc<dyn UserDirectory> = match &config.data_dir {
        Some(dir) => {
            let path = dir.join(USER_DB_FILE);
            info!(path = %path.display(), "Opening user database");
            Arc::new(RedbUserDirectory::open(&path)?)
        }
        None => {
            warn!("DATA_DIR not set; users are kept in memory and lost on restart");
            Arc::new(InMemoryUserDirectory::new())
        }
    };

    if let Some(seed) = &config.seed_user {
        let user = ensure_user(
            users.as_ref(),
            NewUser {
                full_name: seed.full_name.clone(),
                email: seed.email.clone(),
                identity_id: seed.identity_id.clone(),
                identity_provider: IdentityProvider::Keycloak,
            },
        )
        .await?;
        info!(user_id = user.id, identity_id = %user.identity_id, "Seed user ready");
    }

    let mut state = AppState::new(keys, users, config.keycloak.leeway_secs);
    if let Some(dir) = &config.data_dir {
        state = state.with_data_dir(dir);
    }
    let app = router(state);

    let handle = Handle::new();
    let shutdown = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            shutdown.graceful_shutdown(Some(SHUTDOWN_GRACE));
        }
    });

    let addr = config.bind_addr;
    match &config.tls {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;
            info!(%addr, "Micro Stakes API listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            info!(%addr, "Micro Stakes API listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
    }

    info!("Server stopped");
    Ok(())
}
