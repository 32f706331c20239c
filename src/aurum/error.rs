use crate::{keys::KeyError, passwords::HashError, store::StoreError, token};
use thiserror::Error;

/// Everything a kernel operation can fail with.
///
/// The first five are expected outcomes and carry a message that is safe to
/// show a client. `Key`, `Store` and `Internal` wrap a cause that only goes to
/// the log.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    InvalidInput(String),
    #[error("password is too weak")]
    WeakPassword,
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotExists(String),
    #[error("{0}")]
    Exists(String),
    #[error("key error")]
    Key(#[source] KeyError),
    #[error("store error")]
    Store(#[source] anyhow::Error),
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub(crate) fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Taxonomy tag, as sent in the `Code` field of error bodies.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "InvalidInput",
            Self::WeakPassword => "WeakPassword",
            Self::Unauthorized(_) => "Unauthorized",
            Self::NotExists(_) => "NotExists",
            Self::Exists(_) => "Exists",
            Self::Key(_) | Self::Store(_) | Self::Internal(_) => "Internal",
        }
    }

    /// Whether this is a fault rather than an expected refusal.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Key(_) | Self::Store(_) | Self::Internal(_))
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotExists(what) => Self::NotExists(what),
            StoreError::Exists(what) => Self::Exists(what),
            StoreError::Backend(cause) => Self::Store(cause),
        }
    }
}

impl From<KeyError> for Error {
    fn from(err: KeyError) -> Self {
        Self::Key(err)
    }
}

impl From<HashError> for Error {
    fn from(err: HashError) -> Self {
        match err {
            HashError::TooLong => Self::WeakPassword,
            other => Self::Internal(other.into()),
        }
    }
}

impl From<token::Error> for Error {
    fn from(err: token::Error) -> Self {
        Self::Internal(anyhow::Error::new(err).context("failed to mint token"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_sentinels_pass_through() {
        assert!(matches!(
            Error::from(StoreError::NotExists("group eng".into())),
            Error::NotExists(ref what) if what == "group eng"
        ));
        assert!(matches!(
            Error::from(StoreError::Exists("user alice".into())),
            Error::Exists(_)
        ));
        let backend = Error::from(StoreError::Backend(anyhow::anyhow!("connection reset")));
        assert!(matches!(backend, Error::Store(_)));
        assert_eq!(backend.code(), "Internal");
        assert!(backend.is_internal());
    }

    #[test]
    fn internal_display_hides_cause() {
        let err = Error::Internal(anyhow::anyhow!("secret detail"));
        assert_eq!(err.to_string(), "internal error");
        assert!(format!("{:#}", anyhow::Error::new(err)).contains("secret detail"));
    }

    #[test]
    fn codes() {
        assert_eq!(Error::invalid("x").code(), "InvalidInput");
        assert_eq!(Error::WeakPassword.code(), "WeakPassword");
        assert_eq!(Error::unauthorized("x").code(), "Unauthorized");
        assert!(!Error::unauthorized("x").is_internal());
    }
}
