//! Behaviour every [`Store`] driver must show. Names carry a random suffix so
//! the same run can be repeated against a persistent database.

use super::{Store, StoreError, StoreResult};
use crate::models::{Group, Role, User};
use uuid::Uuid;

pub(crate) fn user(username: &str) -> User {
    User {
        username: username.to_string(),
        password: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
        email: format!("{username}@example.test"),
    }
}

pub(crate) fn group(name: &str, allow_registration: bool) -> Group {
    Group {
        name: name.to_string(),
        allow_registration,
    }
}

fn suffix() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

pub(crate) async fn run(store: &dyn Store) -> StoreResult<()> {
    let tag = suffix();
    let alice = format!("alice-{tag}");
    let bob = format!("bob-{tag}");
    let eng = format!("eng-{tag}");
    let ops = format!("ops-{tag}");

    let before = store.count_users().await?;
    store.create_user(user(&alice)).await?;
    assert_eq!(store.count_users().await?, before + 1);
    assert!(matches!(
        store.create_user(user(&alice)).await,
        Err(StoreError::Exists(_))
    ));
    assert!(matches!(
        store.get_user(&bob).await,
        Err(StoreError::NotExists(_))
    ));

    // Empty patch fields leave the row alone.
    store
        .set_user(User {
            username: alice.clone(),
            password: String::new(),
            email: "new@example.test".to_string(),
        })
        .await?;
    let stored = store.get_user(&alice).await?;
    assert_eq!(stored.email, "new@example.test");
    assert_eq!(stored.password, user(&alice).password);
    assert!(matches!(
        store.set_user(user(&bob)).await,
        Err(StoreError::NotExists(_))
    ));

    store.create_group(group(&eng, false)).await?;
    assert!(matches!(
        store.create_group(group(&eng, true)).await,
        Err(StoreError::Exists(_))
    ));
    assert!(!store.get_group(&eng).await?.allow_registration);

    // Names arrive lowercased by the kernel; the driver keeps them verbatim
    // even where SQL `lower()` would disagree (final sigma).
    let greek = format!("{tag}-ΟΔΟΣ").to_lowercase();
    assert!(greek.ends_with('\u{3c2}'));
    store.create_group(group(&greek, false)).await?;
    assert_eq!(store.get_group(&greek).await?.name, greek);
    store.remove_group(&greek).await?;
    assert!(store
        .list_groups()
        .await?
        .iter()
        .any(|g| g.name == eng));

    store.add_user_to_group(&alice, &eng, Role::User).await?;
    assert!(matches!(
        store.add_user_to_group(&alice, &eng, Role::Admin).await,
        Err(StoreError::Exists(_))
    ));
    assert!(matches!(
        store.add_user_to_group(&bob, &eng, Role::User).await,
        Err(StoreError::NotExists(_))
    ));
    assert_eq!(store.get_group_role(&eng, &alice).await?, Role::User);

    store.set_group_role(&eng, &alice, Role::Admin).await?;
    assert_eq!(store.get_group_role(&eng, &alice).await?, Role::Admin);
    assert!(matches!(
        store.set_group_role(&eng, &bob, Role::Admin).await,
        Err(StoreError::NotExists(_))
    ));

    // Composite: user plus first edge.
    store
        .create_user_with_role(user(&bob), &eng, Role::User)
        .await?;
    assert_eq!(store.get_group_role(&eng, &bob).await?, Role::User);
    assert!(matches!(
        store
            .create_user_with_role(user(&bob), &eng, Role::User)
            .await,
        Err(StoreError::Exists(_))
    ));

    // Composite: group plus creator edge; a duplicate group leaves no edge behind.
    store
        .create_group_with_role(group(&ops, true), &bob, Role::Admin)
        .await?;
    assert_eq!(store.get_group_role(&ops, &bob).await?, Role::Admin);
    assert!(matches!(
        store
            .create_group_with_role(group(&eng, true), &bob, Role::Admin)
            .await,
        Err(StoreError::Exists(_))
    ));
    assert!(matches!(
        store.get_group_role(&eng, &bob).await,
        Ok(Role::User)
    ));

    let memberships = store.list_groups_for_user(&bob).await?;
    let names: Vec<&str> = memberships.iter().map(|m| m.group.name.as_str()).collect();
    assert_eq!(names, vec![eng.as_str(), ops.as_str()]);

    store.remove_user_from_group(&eng, &bob).await?;
    assert!(matches!(
        store.get_group_role(&eng, &bob).await,
        Err(StoreError::NotExists(_))
    ));
    assert!(matches!(
        store.remove_user_from_group(&eng, &bob).await,
        Err(StoreError::NotExists(_))
    ));

    // Removing a group takes its edges with it.
    store.remove_group(&eng).await?;
    assert!(matches!(
        store.get_group(&eng).await,
        Err(StoreError::NotExists(_))
    ));
    assert!(matches!(
        store.get_group_role(&eng, &alice).await,
        Err(StoreError::NotExists(_))
    ));
    assert!(matches!(
        store.remove_group(&eng).await,
        Err(StoreError::NotExists(_))
    ));

    store.health_check().await?;
    Ok(())
}
