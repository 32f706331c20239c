use crate::{
    api,
    aurum::Aurum,
    keys::{KeyConfig, KeyPair},
    store::{postgres::redact_dsn, MemoryStore, PgStore, Store},
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Debug)]
pub struct Args {
    pub web_address: SocketAddr,
    pub base_path: String,
    pub dsn: Option<SecretString>,
    pub public_key: Option<String>,
    pub secret_key: Option<SecretString>,
    pub public_key_path: PathBuf,
    pub secret_key_path: PathBuf,
    pub key_generate: bool,
    pub key_write: bool,
}

impl Args {
    fn key_config(&self) -> KeyConfig {
        let config = KeyConfig::new(&self.public_key_path, &self.secret_key_path)
            .with_public_pem(self.public_key.clone())
            .with_secret_pem(self.secret_key.clone())
            .with_persist(self.key_write);

        if self.key_generate {
            config
        } else {
            config.without_generation()
        }
    }
}

/// Load keys, open the store, seed it on first run and serve until shutdown.
///
/// # Errors
/// Key, store and bootstrap failures are fatal and returned as-is, as is a
/// failure to bind `web_address`.
pub async fn execute(args: Args) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = crate::GIT_COMMIT_HASH,
        "Starting aurum"
    );

    let keys = KeyPair::load_or_generate(&args.key_config()).context("Failed to load keys")?;

    let store: Arc<dyn Store> = match &args.dsn {
        Some(dsn) => {
            info!(dsn = %redact_dsn(dsn.expose_secret()), "Using postgres store");
            Arc::new(PgStore::connect(dsn).await?)
        }
        None => {
            warn!("No database configured, users and groups are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let aurum = Aurum::new(store, Arc::new(keys));
    aurum
        .bootstrap()
        .await
        .context("Failed to bootstrap the store")?;

    let listener = TcpListener::bind(args.web_address)
        .await
        .with_context(|| format!("Failed to bind {}", args.web_address))?;

    api::serve(listener, api::router(aurum, &args.base_path)).await
}
