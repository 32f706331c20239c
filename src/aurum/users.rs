use super::{Aurum, Error, Result};
use crate::{
    models::{Role, User},
    passwords,
    store::StoreError,
    token::{self, TokenPair},
    ROOT_GROUP,
};
use chrono::Utc;
use tracing::{debug, info};

fn bad_credentials() -> Error {
    Error::unauthorized("invalid username or password")
}

impl Aurum {
    /// Register a new user. The account starts as a `User` member of the root
    /// group, created in the same step as the user row.
    ///
    /// # Errors
    /// `InvalidInput` without a username, `WeakPassword` if the policy refuses
    /// the password, `Exists` if the username is taken.
    pub async fn sign_up(&self, user: User) -> Result<User> {
        if user.username.is_empty() {
            return Err(Error::invalid("username is required"));
        }
        if !passwords::accept(&user.password, &[&user.username, &user.email]) {
            return Err(Error::WeakPassword);
        }

        let hash = passwords::hash_blocking(user.password).await?;
        let stored = User {
            username: user.username,
            password: hash,
            email: user.email,
        };
        self.store
            .create_user_with_role(stored.clone(), ROOT_GROUP, Role::User)
            .await?;

        info!(username = %stored.username, "User signed up");
        Ok(stored.stripped())
    }

    /// Exchange a username and password for an access/refresh token pair.
    ///
    /// # Errors
    /// `Unauthorized` for an unknown user or a wrong password alike.
    pub async fn login(&self, user: User) -> Result<TokenPair> {
        let stored = match self.store.get_user(&user.username).await {
            Ok(stored) => stored,
            Err(StoreError::NotExists(_)) => return Err(bad_credentials()),
            Err(e) => return Err(e.into()),
        };

        if !passwords::verify_blocking(user.password, stored.password).await? {
            debug!(username = %user.username, "Wrong password");
            return Err(bad_credentials());
        }

        Ok(token::mint_pair(
            &user.username,
            self.keys.signing_key(),
            Utc::now(),
        )?)
    }

    /// Mint a new access token from a refresh token. The refresh token is
    /// handed back unchanged.
    ///
    /// # Errors
    /// `InvalidInput` if the refresh token is missing or is an access token,
    /// `Unauthorized` if it does not verify or its user is gone.
    pub async fn refresh_token(&self, pair: TokenPair) -> Result<TokenPair> {
        if pair.refresh_token.is_empty() {
            return Err(Error::invalid("refresh token is required"));
        }

        let claims = self.verify_token(&pair.refresh_token)?;
        if !claims.refresh {
            return Err(Error::invalid("not a refresh token"));
        }
        self.ensure_user(&claims.username).await?;

        Ok(TokenPair {
            login_token: token::mint(&claims.username, false, self.keys.signing_key(), Utc::now())?,
            refresh_token: pair.refresh_token,
        })
    }

    /// The caller's own account, without its password hash.
    ///
    /// # Errors
    /// `Unauthorized` for a bad token.
    pub async fn get_user(&self, access_token: &str) -> Result<User> {
        let caller = self.authenticate(access_token).await?;
        Ok(self.store.get_user(&caller).await?.stripped())
    }

    /// Change the caller's password and/or email. Empty fields are left as
    /// they are; the username in the patch is ignored.
    ///
    /// # Errors
    /// `Unauthorized` for a bad token, `WeakPassword` if a new password is
    /// refused.
    pub async fn update_user(&self, access_token: &str, patch: User) -> Result<User> {
        let caller = self.authenticate(access_token).await?;

        let password = if patch.password.is_empty() {
            String::new()
        } else {
            if !passwords::accept(&patch.password, &[&caller, &patch.email]) {
                return Err(Error::WeakPassword);
            }
            passwords::hash_blocking(patch.password).await?
        };

        self.store
            .set_user(User {
                username: caller.clone(),
                password,
                email: patch.email,
            })
            .await?;

        debug!(username = %caller, "User updated");
        Ok(self.store.get_user(&caller).await?.stripped())
    }
}
