//! Compact JWS tokens signed with Ed25519 (`alg: EdDSA`).
//!
//! Access tokens live 15 minutes, refresh tokens three calendar months. The
//! `Refresh` claim tells them apart; the rest of the claim set is shared.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Months, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

pub const ALGORITHM: &str = "EdDSA";
pub const TOKEN_TYPE: &str = "JWT";
pub const ACCESS_TOKEN_TTL_SECONDS: i64 = 15 * 60;
pub const REFRESH_TOKEN_TTL_MONTHS: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Header {
    pub alg: String,
    pub typ: String,
}

impl Header {
    fn eddsa() -> Self {
        Self {
            alg: ALGORITHM.to_string(),
            typ: TOKEN_TYPE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Refresh")]
    pub refresh: bool,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub jti: String,
}

impl Claims {
    /// Claims for a fresh token issued at `now`.
    ///
    /// # Errors
    /// Returns [`Error::TimeOverflow`] if the expiry cannot be represented.
    pub fn new(username: &str, refresh: bool, now: DateTime<Utc>) -> Result<Self, Error> {
        let exp = if refresh {
            now.checked_add_months(Months::new(REFRESH_TOKEN_TTL_MONTHS))
                .ok_or(Error::TimeOverflow)?
        } else {
            now.checked_add_signed(chrono::Duration::seconds(ACCESS_TOKEN_TTL_SECONDS))
                .ok_or(Error::TimeOverflow)?
        };

        Ok(Self {
            username: username.to_string(),
            refresh,
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        })
    }
}

/// An access token and, on login, its refresh token. Empty fields are left
/// off the wire.
#[derive(ToSchema, Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPair {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub login_token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub refresh_token: String,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("token has no username")]
    MissingUsername,
    #[error("token lifetime out of range")]
    TimeOverflow,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Sign `claims` into a compact JWS.
///
/// # Errors
/// Returns an error if the header or claims cannot be encoded.
pub fn sign(claims: &Claims, key: &SigningKey) -> Result<String, Error> {
    let header_b64 = b64e_json(&Header::eddsa())?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let signature: Signature = key.sign(signing_input.as_bytes());
    let signature_b64 = Base64UrlUnpadded::encode_string(&signature.to_bytes());

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Mint a single access or refresh token for `username`.
///
/// # Errors
/// See [`Claims::new`] and [`sign`].
pub fn mint(
    username: &str,
    refresh: bool,
    key: &SigningKey,
    now: DateTime<Utc>,
) -> Result<String, Error> {
    sign(&Claims::new(username, refresh, now)?, key)
}

/// Mint the access/refresh pair handed out on login.
///
/// # Errors
/// See [`mint`].
pub fn mint_pair(username: &str, key: &SigningKey, now: DateTime<Utc>) -> Result<TokenPair, Error> {
    Ok(TokenPair {
        login_token: mint(username, false, key, now)?,
        refresh_token: mint(username, true, key, now)?,
    })
}

/// Verify a compact JWS and return its claims.
///
/// # Errors
///
/// Returns an error if:
/// - the token is not three dot-separated parts, or holds invalid base64/json,
/// - the header algorithm is anything but `EdDSA`,
/// - the signature does not verify under `key`,
/// - `exp` has passed, `nbf` is still ahead, or the username is empty.
pub fn verify(token: &str, key: &VerifyingKey, now_unix_seconds: i64) -> Result<Claims, Error> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
    if parts.next().is_some() {
        return Err(Error::TokenFormat);
    }

    let header: Header = b64d_json(header_b64)?;
    if header.alg != ALGORITHM {
        return Err(Error::UnsupportedAlg(header.alg));
    }

    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature_bytes = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
    let signature =
        Signature::from_slice(&signature_bytes).map_err(|_| Error::InvalidSignature)?;
    key.verify_strict(signing_input.as_bytes(), &signature)
        .map_err(|_| Error::InvalidSignature)?;

    let claims: Claims = b64d_json(claims_b64)?;
    if claims.exp <= now_unix_seconds {
        return Err(Error::Expired);
    }
    if claims.nbf > now_unix_seconds {
        return Err(Error::NotYetValid);
    }
    if claims.username.is_empty() {
        return Err(Error::MissingUsername);
    }

    Ok(claims)
}
