//! First-run seeding: an `admin` account with a random password, the root
//! group, and admin rights in it.

use super::{Error, Result};
use crate::{
    models::{Group, Role, User},
    passwords,
    store::{Store, StoreError},
    ROOT_GROUP,
};
use base64ct::{Base64, Encoding};
use rand::{rngs::OsRng, RngCore};
use tracing::{debug, info};

pub const ADMIN_USERNAME: &str = "admin";
const PASSWORD_BYTES: usize = 32;

fn generate_password() -> String {
    let mut raw = [0u8; PASSWORD_BYTES];
    OsRng.fill_bytes(&mut raw);
    Base64::encode_string(&raw)
}

/// Seed the store if it has no users. Returns whether anything was created.
///
/// The user, the group and the edge are written in a single store call, so a
/// failure leaves the store untouched. The generated password is logged once,
/// after the write succeeded.
///
/// # Errors
/// Any store or hashing failure; the caller should treat it as fatal.
pub async fn run(store: &dyn Store) -> Result<bool> {
    if store.count_users().await? > 0 {
        debug!("Users present, skipping bootstrap");
        return Ok(false);
    }

    let password = generate_password();
    let hash = passwords::hash_blocking(password.clone()).await?;

    let admin = User {
        username: ADMIN_USERNAME.to_string(),
        password: hash,
        email: String::new(),
    };
    let root = Group {
        name: ROOT_GROUP.to_string(),
        allow_registration: false,
    };

    match store.initialize(admin, root, Role::Admin).await {
        Ok(()) => {}
        // Another instance got there first.
        Err(StoreError::Exists(what)) => {
            debug!(%what, "Store initialized concurrently, skipping bootstrap");
            return Ok(false);
        }
        Err(e) => return Err(Error::from(e)),
    }

    info!("Created initial user: \"{ADMIN_USERNAME}\" with password \"{password}\"");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn generated_password_shape() {
        let password = generate_password();
        // 32 bytes of standard, padded base64.
        assert_eq!(password.len(), 44);
        assert!(password.ends_with('='));
        assert_ne!(password, generate_password());
    }

    #[tokio::test]
    async fn first_run_seeds_the_store() -> Result<()> {
        let store = MemoryStore::new();
        assert!(run(&store).await?);

        assert_eq!(store.count_users().await?, 1);
        let admin = store.get_user(ADMIN_USERNAME).await?;
        assert!(admin.password.starts_with("$argon2id$"));
        // root is joined through signup, never by self-registration
        assert!(!store.get_group(ROOT_GROUP).await?.allow_registration);
        assert_eq!(
            store.get_group_role(ROOT_GROUP, ADMIN_USERNAME).await?,
            Role::Admin
        );
        Ok(())
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() -> Result<()> {
        let store = MemoryStore::new();
        assert!(run(&store).await?);
        let hash = store.get_user(ADMIN_USERNAME).await?.password;

        assert!(!run(&store).await?);
        assert_eq!(store.count_users().await?, 1);
        assert_eq!(store.get_user(ADMIN_USERNAME).await?.password, hash);
        Ok(())
    }

    #[tokio::test]
    async fn existing_users_block_seeding() -> Result<()> {
        let store = MemoryStore::new();
        store
            .create_user(User {
                username: "someone".to_string(),
                password: "hash".to_string(),
                email: String::new(),
            })
            .await?;

        assert!(!run(&store).await?);
        assert!(matches!(
            store.get_group(ROOT_GROUP).await,
            Err(StoreError::NotExists(_))
        ));
        Ok(())
    }
}
