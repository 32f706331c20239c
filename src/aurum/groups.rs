use super::{group_name, is_root, Aurum, Error, Result};
use crate::{
    models::{AccessStatus, Group, GroupWithRole, Role},
    store::StoreError,
    ROOT_GROUP,
};
use tracing::info;

impl Aurum {
    /// Create a group; the caller becomes its first admin in the same step.
    /// Requires admin in the root group.
    ///
    /// # Errors
    /// `Unauthorized` without root admin, `Exists` if the name is taken.
    pub async fn add_group(&self, access_token: &str, group: Group) -> Result<Group> {
        let caller = self.authenticate(access_token).await?;
        let group = Group {
            name: group_name(&group.name)?,
            allow_registration: group.allow_registration,
        };
        self.require_admin(ROOT_GROUP, &caller).await?;

        self.store
            .create_group_with_role(group.clone(), &caller, Role::Admin)
            .await?;

        info!(group = %group.name, admin = %caller, "Group created");
        Ok(group)
    }

    /// Delete a group and every membership in it. The root group cannot be
    /// removed.
    ///
    /// # Errors
    /// `Unauthorized` without admin in the group, or for the root group.
    pub async fn remove_group(&self, access_token: &str, group: &str) -> Result<()> {
        let caller = self.authenticate(access_token).await?;
        let group = group_name(group)?;
        if is_root(&group) {
            return Err(Error::unauthorized("the root group cannot be removed"));
        }
        self.require_admin(&group, &caller).await?;

        self.store.remove_group(&group).await?;
        info!(group = %group, by = %caller, "Group removed");
        Ok(())
    }

    /// Add `target` to `group`.
    ///
    /// A group admin may add anyone with any role. Otherwise a caller may only
    /// add themselves to a group that allows registration, and always as
    /// `User` whatever role was asked for.
    ///
    /// # Errors
    /// `NotExists` for an unknown group, `Unauthorized` when neither rule
    /// applies, `Exists` if the membership is already there.
    pub async fn add_user_to_group(
        &self,
        access_token: &str,
        target: &str,
        group: &str,
        wanted: Role,
    ) -> Result<()> {
        let caller = self.authenticate(access_token).await?;
        let group = group_name(group)?;
        if target.is_empty() {
            return Err(Error::invalid("username is required"));
        }

        let details = self.store.get_group(&group).await?;
        let role = if self.role_in(&group, &caller).await? == Some(Role::Admin) {
            wanted
        } else if details.allow_registration && target == caller {
            Role::User
        } else {
            return Err(Error::unauthorized(format!(
                "not allowed to add {target} to {group}"
            )));
        };

        self.store.add_user_to_group(target, &group, role).await?;
        info!(group = %group, username = %target, %role, by = %caller, "Membership added");
        Ok(())
    }

    /// Remove `target` from `group`. Admins may remove anyone; everybody may
    /// leave. Root membership is permanent.
    ///
    /// # Errors
    /// `Unauthorized` when neither rule applies, `InvalidInput` for the root
    /// group, `NotExists` if there is no such membership.
    pub async fn remove_user_from_group(
        &self,
        access_token: &str,
        target: &str,
        group: &str,
    ) -> Result<()> {
        let caller = self.authenticate(access_token).await?;
        let group = group_name(group)?;

        if target != caller {
            self.require_admin(&group, &caller).await?;
        }
        if is_root(&group) {
            return Err(Error::invalid("membership of the root group cannot be removed"));
        }

        self.store.remove_user_from_group(&group, target).await?;
        info!(group = %group, username = %target, by = %caller, "Membership removed");
        Ok(())
    }

    /// Give `target` exactly `role` in `group`, creating the membership if
    /// needed. Requires admin in the group.
    ///
    /// # Errors
    /// `Unauthorized` without admin in the group, `NotExists` for an unknown
    /// user.
    pub async fn set_access(
        &self,
        access_token: &str,
        group: &str,
        target: &str,
        role: Role,
    ) -> Result<()> {
        let caller = self.authenticate(access_token).await?;
        let group = group_name(group)?;
        if target.is_empty() {
            return Err(Error::invalid("username is required"));
        }
        self.require_admin(&group, &caller).await?;

        match self.store.set_group_role(&group, target, role).await {
            Err(StoreError::NotExists(_)) => {
                match self.store.add_user_to_group(target, &group, role).await {
                    // Someone else created the edge in between; apply our role on top.
                    Err(StoreError::Exists(_)) => {
                        self.store.set_group_role(&group, target, role).await?;
                    }
                    other => other?,
                }
            }
            other => other?,
        }

        info!(group = %group, username = %target, %role, by = %caller, "Access set");
        Ok(())
    }

    /// Public access check. Unknown users and groups are simply denied.
    ///
    /// # Errors
    /// Only store faults.
    pub async fn get_access(&self, username: &str, group: &str) -> Result<AccessStatus> {
        let group = group.to_lowercase();
        Ok(match self.role_in(&group, username).await? {
            Some(role) => AccessStatus::granted(group, username, role),
            None => AccessStatus::denied(group, username),
        })
    }

    /// Memberships of `target`. Callers may always list their own; listing
    /// someone else's needs admin in the root group.
    ///
    /// # Errors
    /// `Unauthorized` for someone else's list without root admin.
    pub async fn get_groups_for_user(
        &self,
        access_token: &str,
        target: &str,
    ) -> Result<Vec<GroupWithRole>> {
        let caller = self.authenticate(access_token).await?;
        if target != caller {
            self.require_admin(ROOT_GROUP, &caller).await?;
        }
        Ok(self.store.list_groups_for_user(target).await?)
    }

    /// Every group, public.
    ///
    /// # Errors
    /// Only store faults.
    pub async fn get_groups(&self) -> Result<Vec<Group>> {
        Ok(self.store.list_groups().await?)
    }
}
