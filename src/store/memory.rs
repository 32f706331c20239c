//! In-memory store.
//!
//! Not durable: everything is lost on restart. All state sits behind one
//! `tokio::sync::RwLock`, and no method awaits while holding the write guard,
//! so composite operations are atomic and a dropped future leaves nothing
//! half-written.

use super::{Store, StoreError, StoreResult};
use crate::models::{Group, GroupWithRole, Role, User};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct State {
    users: HashMap<String, User>,
    groups: BTreeMap<String, Group>,
    // (username, group) -> role
    edges: HashMap<(String, String), Role>,
}

impl State {
    fn insert_user(&mut self, user: User) -> StoreResult<()> {
        if self.users.contains_key(&user.username) {
            return Err(StoreError::Exists(format!("user {}", user.username)));
        }
        self.users.insert(user.username.clone(), user);
        Ok(())
    }

    fn insert_group(&mut self, group: Group) -> StoreResult<()> {
        if self.groups.contains_key(&group.name) {
            return Err(StoreError::Exists(format!("group {}", group.name)));
        }
        self.groups.insert(group.name.clone(), group);
        Ok(())
    }

    fn insert_edge(&mut self, username: &str, group: &str, role: Role) -> StoreResult<()> {
        if !self.users.contains_key(username) {
            return Err(StoreError::NotExists(format!("user {username}")));
        }
        if !self.groups.contains_key(group) {
            return Err(StoreError::NotExists(format!("group {group}")));
        }
        let key = (username.to_string(), group.to_string());
        if self.edges.contains_key(&key) {
            return Err(StoreError::Exists(format!("{username} in {group}")));
        }
        self.edges.insert(key, role);
        Ok(())
    }
}

fn edge_key(username: &str, group: &str) -> (String, String) {
    (username.to_string(), group.to_string())
}

fn missing_edge(group: &str, username: &str) -> StoreError {
    StoreError::NotExists(format!("{username} in {group}"))
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn count_users(&self) -> StoreResult<u64> {
        Ok(self.state.read().await.users.len() as u64)
    }

    async fn create_user(&self, user: User) -> StoreResult<()> {
        self.state.write().await.insert_user(user)
    }

    async fn get_user(&self, username: &str) -> StoreResult<User> {
        self.state
            .read()
            .await
            .users
            .get(username)
            .cloned()
            .ok_or_else(|| StoreError::NotExists(format!("user {username}")))
    }

    async fn set_user(&self, patch: User) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&patch.username)
            .ok_or_else(|| StoreError::NotExists(format!("user {}", patch.username)))?;
        if !patch.password.is_empty() {
            user.password = patch.password;
        }
        if !patch.email.is_empty() {
            user.email = patch.email;
        }
        Ok(())
    }

    async fn create_group(&self, group: Group) -> StoreResult<()> {
        self.state.write().await.insert_group(group)
    }

    async fn get_group(&self, name: &str) -> StoreResult<Group> {
        self.state
            .read()
            .await
            .groups
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotExists(format!("group {name}")))
    }

    async fn remove_group(&self, name: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.groups.remove(name).is_none() {
            return Err(StoreError::NotExists(format!("group {name}")));
        }
        state.edges.retain(|(_, group), _| group != name);
        Ok(())
    }

    async fn list_groups(&self) -> StoreResult<Vec<Group>> {
        Ok(self.state.read().await.groups.values().cloned().collect())
    }

    async fn add_user_to_group(
        &self,
        username: &str,
        group: &str,
        role: Role,
    ) -> StoreResult<()> {
        self.state.write().await.insert_edge(username, group, role)
    }

    async fn set_group_role(&self, group: &str, username: &str, role: Role) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let edge = state
            .edges
            .get_mut(&edge_key(username, group))
            .ok_or_else(|| missing_edge(group, username))?;
        *edge = role;
        Ok(())
    }

    async fn remove_user_from_group(&self, group: &str, username: &str) -> StoreResult<()> {
        self.state
            .write()
            .await
            .edges
            .remove(&edge_key(username, group))
            .map(|_| ())
            .ok_or_else(|| missing_edge(group, username))
    }

    async fn get_group_role(&self, group: &str, username: &str) -> StoreResult<Role> {
        self.state
            .read()
            .await
            .edges
            .get(&edge_key(username, group))
            .copied()
            .ok_or_else(|| missing_edge(group, username))
    }

    async fn list_groups_for_user(&self, username: &str) -> StoreResult<Vec<GroupWithRole>> {
        let state = self.state.read().await;
        // BTreeMap iteration keeps the result ordered by group name.
        Ok(state
            .groups
            .values()
            .filter_map(|group| {
                state
                    .edges
                    .get(&edge_key(username, &group.name))
                    .map(|role| GroupWithRole {
                        group: group.clone(),
                        role: *role,
                    })
            })
            .collect())
    }

    async fn create_user_with_role(&self, user: User, group: &str, role: Role) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.groups.contains_key(group) {
            return Err(StoreError::NotExists(format!("group {group}")));
        }
        let username = user.username.clone();
        state.insert_user(user)?;
        state.insert_edge(&username, group, role)
    }

    async fn create_group_with_role(
        &self,
        group: Group,
        username: &str,
        role: Role,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(username) {
            return Err(StoreError::NotExists(format!("user {username}")));
        }
        let name = group.name.clone();
        state.insert_group(group)?;
        state.insert_edge(username, &name, role)
    }

    async fn initialize(&self, user: User, group: Group, role: Role) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.users.is_empty() {
            return Err(StoreError::Exists("store already initialized".to_string()));
        }
        if state.groups.contains_key(&group.name) {
            return Err(StoreError::Exists(format!("group {}", group.name)));
        }
        let (username, name) = (user.username.clone(), group.name.clone());
        state.insert_user(user)?;
        state.insert_group(group)?;
        state.insert_edge(&username, &name, role)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
