//! Persistence boundary for users, groups and membership edges.
//!
//! The kernel only talks to [`Store`]. Drivers must honour the two sentinels
//! ([`StoreError::NotExists`], [`StoreError::Exists`]) and run the composite
//! operations atomically.

use crate::models::{Group, GroupWithRole, Role, User};
use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod postgres;

#[cfg(test)]
pub(crate) mod contract;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotExists(String),
    #[error("already exists: {0}")]
    Exists(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// `User::password` holds the password hash on both sides of this trait.
#[async_trait]
pub trait Store: Send + Sync {
    async fn count_users(&self) -> StoreResult<u64>;
    async fn create_user(&self, user: User) -> StoreResult<()>;
    async fn get_user(&self, username: &str) -> StoreResult<User>;
    /// Overwrite the non-empty fields of `patch` on the row named by `patch.username`.
    async fn set_user(&self, patch: User) -> StoreResult<()>;

    async fn create_group(&self, group: Group) -> StoreResult<()>;
    async fn get_group(&self, name: &str) -> StoreResult<Group>;
    /// Remove a group along with every edge that refers to it.
    async fn remove_group(&self, name: &str) -> StoreResult<()>;
    async fn list_groups(&self) -> StoreResult<Vec<Group>>;

    async fn add_user_to_group(&self, username: &str, group: &str, role: Role)
        -> StoreResult<()>;
    async fn set_group_role(&self, group: &str, username: &str, role: Role) -> StoreResult<()>;
    async fn remove_user_from_group(&self, group: &str, username: &str) -> StoreResult<()>;
    async fn get_group_role(&self, group: &str, username: &str) -> StoreResult<Role>;
    async fn list_groups_for_user(&self, username: &str) -> StoreResult<Vec<GroupWithRole>>;

    /// Create a user and its first edge in one step.
    async fn create_user_with_role(&self, user: User, group: &str, role: Role)
        -> StoreResult<()>;
    /// Create a group and give `username` a role in it in one step.
    async fn create_group_with_role(&self, group: Group, username: &str, role: Role)
        -> StoreResult<()>;
    /// Seed an empty store with its first user, group and edge. Fails with
    /// [`StoreError::Exists`] if any user is already present.
    async fn initialize(&self, user: User, group: Group, role: Role) -> StoreResult<()>;

    async fn health_check(&self) -> StoreResult<()>;
    fn backend_name(&self) -> &'static str;
}
