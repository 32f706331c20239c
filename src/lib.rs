//! # Aurum (Identity and Access Management)
//!
//! `aurum` issues Ed25519-signed JWTs and answers one question: does user `u`
//! hold a role in group `g`?
//!
//! ## Groups and roles
//!
//! Authority lives entirely in `(user, group) -> role` edges, with roles
//! `user < admin`. The group named after the service itself (the root group)
//! is special: every user is a member of it, and admin there is the only
//! global administrative right. Group names are case-insensitive and stored
//! lowercase.
//!
//! ## Tokens
//!
//! Access tokens live 15 minutes and refresh tokens three months. Tokens carry
//! only the username and a refresh flag; roles are read from the store on
//! every request. Relying services verify tokens offline with the key served
//! at `GET /pk`.
//!
//! ## First run
//!
//! On an empty store an `admin` account is created with a random password,
//! printed once to the log at INFO.

pub mod api;
pub mod aurum;
pub mod cli;
pub mod keys;
pub mod models;
pub mod passwords;
pub mod store;
pub mod token;

/// The root group, named after the service.
pub const ROOT_GROUP: &str = env!("CARGO_PKG_NAME");

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
