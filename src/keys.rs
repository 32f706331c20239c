//! Ed25519 signing key material.
//!
//! The keypair is loaded once at startup from an ordered list of sources
//! (inline PEM, PEM files, fresh generation) and is immutable afterwards.
//! Public keys are PKIX `PUBLIC KEY` PEM, secret keys PKCS#8 `PRIVATE KEY`
//! PEM; both carry the Ed25519 OID `1.3.101.112`.

use ed25519_dalek::{
    pkcs8::{
        spki::der::pem::{self, LineEnding},
        DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey,
    },
    SigningKey, VerifyingKey,
};
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};
use std::{
    fmt, fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{info, warn};

const PUBLIC_KEY_LABEL: &str = "PUBLIC KEY";
const SECRET_KEY_LABEL: &str = "PRIVATE KEY";
// Label written by older deployments; the DER body is still PKCS#8.
const LEGACY_SECRET_KEY_LABEL: &str = "ED25519 PRIVATE KEY";

pub const DEFAULT_PUBLIC_KEY_PATH: &str = "./id_25519.pub";
pub const DEFAULT_SECRET_KEY_PATH: &str = "./id_25519";

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("failed to parse key: {0}")]
    Parse(String),
    #[error("public key does not match secret key")]
    Mismatch,
    #[error("no secret key found and key generation is disabled")]
    GenerationDisallowed,
    #[error("key file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl KeyError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Where a key may come from. Sources are tried in the configured order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    InlinePem,
    FilePem,
    Generate,
}

#[derive(Debug, Clone)]
pub struct KeyConfig {
    sources: Vec<KeySource>,
    public_pem: Option<String>,
    secret_pem: Option<SecretString>,
    public_path: PathBuf,
    secret_path: PathBuf,
    persist: bool,
}

impl KeyConfig {
    #[must_use]
    pub fn new(public_path: impl Into<PathBuf>, secret_path: impl Into<PathBuf>) -> Self {
        Self {
            sources: vec![KeySource::InlinePem, KeySource::FilePem, KeySource::Generate],
            public_pem: None,
            secret_pem: None,
            public_path: public_path.into(),
            secret_path: secret_path.into(),
            persist: true,
        }
    }

    /// A config that only generates and never touches the filesystem.
    #[must_use]
    pub fn ephemeral() -> Self {
        Self::new(DEFAULT_PUBLIC_KEY_PATH, DEFAULT_SECRET_KEY_PATH)
            .with_sources(vec![KeySource::Generate])
            .with_persist(false)
    }

    #[must_use]
    pub fn with_sources(mut self, sources: Vec<KeySource>) -> Self {
        self.sources = sources;
        self
    }

    #[must_use]
    pub fn with_public_pem(mut self, pem: Option<String>) -> Self {
        self.public_pem = pem.filter(|pem| !pem.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_secret_pem(mut self, pem: Option<SecretString>) -> Self {
        self.secret_pem = pem.filter(|pem| !pem.expose_secret().trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Remove [`KeySource::Generate`] from the source list.
    #[must_use]
    pub fn without_generation(mut self) -> Self {
        self.sources.retain(|source| *source != KeySource::Generate);
        self
    }

    #[must_use]
    pub fn sources(&self) -> &[KeySource] {
        &self.sources
    }

    #[must_use]
    pub fn persist(&self) -> bool {
        self.persist
    }
}

/// A key decoded from PEM.
pub enum Key {
    Public(VerifyingKey),
    Secret(SigningKey),
}

/// Decode a PEM block into either a public or a secret key, based on its label.
///
/// # Errors
/// Returns [`KeyError::Parse`] if the PEM is malformed, has an unknown label, or
/// the DER body is not an Ed25519 key.
pub fn parse_pem(data: &str) -> Result<Key, KeyError> {
    let (label, der) =
        pem::decode_vec(data.trim().as_bytes()).map_err(|e| KeyError::Parse(e.to_string()))?;

    match label {
        PUBLIC_KEY_LABEL => VerifyingKey::from_public_key_der(&der)
            .map(Key::Public)
            .map_err(|e| KeyError::Parse(e.to_string())),
        SECRET_KEY_LABEL | LEGACY_SECRET_KEY_LABEL => SigningKey::from_pkcs8_der(&der)
            .map(Key::Secret)
            .map_err(|e| KeyError::Parse(e.to_string())),
        other => Err(KeyError::Parse(format!("unknown key type: {other}"))),
    }
}

fn parse_public(data: &str) -> Result<VerifyingKey, KeyError> {
    match parse_pem(data)? {
        Key::Public(key) => Ok(key),
        Key::Secret(_) => Err(KeyError::Parse("expected a public key".to_string())),
    }
}

fn parse_secret(data: &str) -> Result<SigningKey, KeyError> {
    match parse_pem(data)? {
        Key::Secret(key) => Ok(key),
        Key::Public(_) => Err(KeyError::Parse("expected a secret key".to_string())),
    }
}

/// Read a PEM file; a missing file is not an error, it just yields nothing.
fn read_pem_file(path: &Path) -> Result<Option<String>, KeyError> {
    match fs::read_to_string(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(KeyError::io(path, e)),
    }
}

fn write_pem_file(path: &Path, data: &str) -> Result<(), KeyError> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| KeyError::io(path, e))?;
    file.write_all(data.as_bytes())
        .map_err(|e| KeyError::io(path, e))?;

    // `mode` only applies on creation; tighten pre-existing files as well.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .map_err(|e| KeyError::io(path, e))?;
    }

    Ok(())
}

/// The service's token signing keypair.
#[derive(Clone)]
pub struct KeyPair {
    signing: SigningKey,
    verifying: VerifyingKey,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("verifying", &self.verifying)
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    #[must_use]
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    #[must_use]
    pub fn from_signing_key(signing: SigningKey) -> Self {
        let verifying = signing.verifying_key();
        Self { signing, verifying }
    }

    /// Build a pair from both halves, refusing halves that do not belong together.
    ///
    /// # Errors
    /// Returns [`KeyError::Mismatch`] if `verifying` is not derived from `signing`.
    pub fn from_parts(signing: SigningKey, verifying: VerifyingKey) -> Result<Self, KeyError> {
        if signing.verifying_key() != verifying {
            return Err(KeyError::Mismatch);
        }
        Ok(Self { signing, verifying })
    }

    /// Load the keypair following the configured source order.
    ///
    /// Each half stops at the first source that yields it. A lone secret key
    /// derives its public half; a lone public key cannot sign, so it is
    /// replaced by a fresh pair when generation is allowed. Freshly generated
    /// keys are written to the configured paths when persistence is on.
    ///
    /// # Errors
    /// Returns a [`KeyError`]; every variant is fatal at startup.
    pub fn load_or_generate(config: &KeyConfig) -> Result<Self, KeyError> {
        let mut public: Option<VerifyingKey> = None;
        let mut secret: Option<SigningKey> = None;
        let mut generated = false;

        for source in &config.sources {
            match source {
                KeySource::InlinePem => {
                    if public.is_none() {
                        if let Some(pem) = &config.public_pem {
                            public = Some(parse_public(pem)?);
                            info!("Using public key from environment");
                        }
                    }
                    if secret.is_none() {
                        if let Some(pem) = &config.secret_pem {
                            secret = Some(parse_secret(pem.expose_secret())?);
                            info!("Using secret key from environment");
                        }
                    }
                }
                KeySource::FilePem => {
                    if public.is_none() {
                        if let Some(pem) = read_pem_file(&config.public_path)? {
                            public = Some(parse_public(&pem)?);
                            info!(path = %config.public_path.display(), "Using public key from file");
                        }
                    }
                    if secret.is_none() {
                        if let Some(pem) = read_pem_file(&config.secret_path)? {
                            secret = Some(parse_secret(&pem)?);
                            info!(path = %config.secret_path.display(), "Using secret key from file");
                        }
                    }
                }
                KeySource::Generate => {
                    if secret.is_none() {
                        if public.take().is_some() {
                            warn!("Found a public key without its secret key; discarding it");
                        }
                        warn!("No secret key found, generating a new keypair. This is normal on a first run");
                        secret = Some(SigningKey::generate(&mut OsRng));
                        generated = true;
                    }
                }
            }
        }

        let Some(secret) = secret else {
            return Err(KeyError::GenerationDisallowed);
        };

        let pair = match public {
            Some(public) => Self::from_parts(secret, public)?,
            None => Self::from_signing_key(secret),
        };

        if generated && config.persist {
            pair.write(&config.public_path, &config.secret_path)?;
            info!(
                public = %config.public_path.display(),
                secret = %config.secret_path.display(),
                "Wrote generated keypair"
            );
        }

        Ok(pair)
    }

    #[must_use]
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing
    }

    #[must_use]
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying
    }

    /// PKIX `PUBLIC KEY` PEM.
    ///
    /// # Errors
    /// Returns [`KeyError::Parse`] if DER encoding fails.
    pub fn public_pem(&self) -> Result<String, KeyError> {
        self.verifying
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| KeyError::Parse(e.to_string()))
    }

    /// PKCS#8 `PRIVATE KEY` PEM.
    ///
    /// # Errors
    /// Returns [`KeyError::Parse`] if DER encoding fails.
    pub fn secret_pem(&self) -> Result<SecretString, KeyError> {
        let pem = self
            .signing
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| KeyError::Parse(e.to_string()))?;
        Ok(SecretString::from(pem.as_str().to_owned()))
    }

    /// Write both halves as PEM files with mode `0600`.
    ///
    /// # Errors
    /// Returns [`KeyError::Io`] if either file cannot be written.
    pub fn write(&self, public_path: &Path, secret_path: &Path) -> Result<(), KeyError> {
        write_pem_file(public_path, &self.public_pem()?)?;
        write_pem_file(secret_path, self.secret_pem()?.expose_secret())
    }
}
