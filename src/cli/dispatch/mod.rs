use crate::cli::{
    actions::{server::Args, Action},
    commands::{keys, ARG_BASE_PATH, ARG_DSN, ARG_WEB_ADDRESS},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{net::SocketAddr, path::PathBuf};

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let web_address = matches
        .get_one::<SocketAddr>(ARG_WEB_ADDRESS)
        .copied()
        .context("missing required argument: --web-address")?;

    let base_path = matches
        .get_one::<String>(ARG_BASE_PATH)
        .cloned()
        .unwrap_or_else(|| "/".to_string());

    let path = |id: &str| matches.get_one::<String>(id).map(PathBuf::from);

    Ok(Action::Server(Args {
        web_address,
        base_path,
        dsn: matches
            .get_one::<String>(ARG_DSN)
            .filter(|dsn| !dsn.trim().is_empty())
            .map(|dsn| SecretString::from(dsn.clone())),
        public_key: matches.get_one::<String>(keys::ARG_PUBLIC_KEY).cloned(),
        secret_key: matches
            .get_one::<String>(keys::ARG_SECRET_KEY)
            .map(|pem| SecretString::from(pem.clone())),
        public_key_path: path(keys::ARG_PUBLIC_KEY_PATH)
            .context("missing required argument: --public-key-path")?,
        secret_key_path: path(keys::ARG_SECRET_KEY_PATH)
            .context("missing required argument: --secret-key-path")?,
        key_generate: !matches.get_flag(keys::ARG_NO_KEY_GENERATE),
        key_write: !matches.get_flag(keys::ARG_NO_KEY_WRITE),
    }))
}
