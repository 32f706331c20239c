//! The authorization kernel.
//!
//! Every operation is a method on [`Aurum`]. Authority comes from one place
//! only: the role edge between the caller and a group, re-read from the
//! store on each call. Tokens carry nothing but the username and the refresh
//! flag.

use crate::{
    keys::KeyPair,
    models::Role,
    store::{Store, StoreError},
    token, ROOT_GROUP,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

pub mod bootstrap;
mod error;
mod groups;
mod users;

pub use error::{Error, Result};

#[derive(Clone)]
pub struct Aurum {
    store: Arc<dyn Store>,
    keys: Arc<KeyPair>,
}

impl Aurum {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, keys: Arc<KeyPair>) -> Self {
        Self { store, keys }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    #[must_use]
    pub fn keys(&self) -> &KeyPair {
        &self.keys
    }

    /// PEM of the token verification key, for relying services.
    ///
    /// # Errors
    /// Returns [`Error::Key`] if the key cannot be encoded.
    pub fn public_key_pem(&self) -> Result<String> {
        Ok(self.keys.public_pem()?)
    }

    /// Seed an empty store; see [`bootstrap::run`].
    ///
    /// # Errors
    /// See [`bootstrap::run`].
    pub async fn bootstrap(&self) -> Result<bool> {
        bootstrap::run(self.store.as_ref()).await
    }

    /// Verify an access token and return the caller's username.
    ///
    /// Refresh tokens are authentic but not accepted here, hence `InvalidInput`
    /// rather than `Unauthorized`. A token for a user that no longer exists is
    /// refused.
    pub(crate) async fn authenticate(&self, access_token: &str) -> Result<String> {
        let claims = self.verify_token(access_token)?;
        if claims.refresh {
            return Err(Error::invalid("refresh token cannot be used for this operation"));
        }
        self.ensure_user(&claims.username).await?;
        Ok(claims.username)
    }

    fn verify_token(&self, raw: &str) -> Result<token::Claims> {
        token::verify(raw, self.keys.verifying_key(), Utc::now().timestamp()).map_err(|e| {
            debug!(error = %e, "Token rejected");
            Error::unauthorized("invalid token")
        })
    }

    async fn ensure_user(&self, username: &str) -> Result<()> {
        match self.store.get_user(username).await {
            Ok(_) => Ok(()),
            Err(StoreError::NotExists(_)) => Err(Error::unauthorized("unknown user")),
            Err(e) => Err(e.into()),
        }
    }

    /// The role of `username` in `group`, or `None` when there is no edge.
    pub(crate) async fn role_in(&self, group: &str, username: &str) -> Result<Option<Role>> {
        match self.store.get_group_role(group, username).await {
            Ok(role) => Ok(Some(role)),
            Err(StoreError::NotExists(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) async fn require_admin(&self, group: &str, username: &str) -> Result<()> {
        if self.role_in(group, username).await? == Some(Role::Admin) {
            Ok(())
        } else {
            Err(Error::unauthorized(format!("admin role in {group} required")))
        }
    }
}

/// Group names are case-insensitive at the edge and lowercase in the store.
pub(crate) fn group_name(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(Error::invalid("group name is required"));
    }
    Ok(name.to_lowercase())
}

pub(crate) fn is_root(group: &str) -> bool {
    group == ROOT_GROUP
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::{keys::KeyPair, models::User, passwords, store::MemoryStore};

    pub const PASSWORD: &str = "vK9#mQ2$xL7!pZ";

    /// A bootstrapped kernel over a fresh in-memory store.
    pub async fn kernel() -> Result<Aurum> {
        let aurum = Aurum::new(Arc::new(MemoryStore::new()), Arc::new(KeyPair::generate()));
        aurum.bootstrap().await?;
        Ok(aurum)
    }

    pub fn access_token(aurum: &Aurum, username: &str) -> Result<String> {
        Ok(token::mint(username, false, aurum.keys().signing_key(), Utc::now())?)
    }

    pub fn refresh_token(aurum: &Aurum, username: &str) -> Result<String> {
        Ok(token::mint(username, true, aurum.keys().signing_key(), Utc::now())?)
    }

    /// Insert a user with [`PASSWORD`] and return an access token for it.
    pub async fn user(aurum: &Aurum, username: &str) -> Result<String> {
        aurum
            .sign_up(User {
                username: username.to_string(),
                password: PASSWORD.to_string(),
                email: format!("{username}@example.test"),
            })
            .await?;
        access_token(aurum, username)
    }

    #[test]
    fn test_password_passes_policy() {
        assert!(passwords::accept(PASSWORD, &[]));
    }
}
