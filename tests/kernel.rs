//! End-to-end kernel scenarios against the in-memory store.
//!
//! Each test builds a fresh bootstrapped [`Aurum`] and drives it only through
//! its public operations, the way the HTTP layer does.

use anyhow::Result;
use aurum::{
    aurum::{Aurum, Error},
    keys::KeyPair,
    models::{AccessStatus, Group, Role, User},
    store::{MemoryStore, Store},
    token::{self, TokenPair},
    ROOT_GROUP,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use std::{sync::Arc, time::Duration};

const ALICE_PASSWORD: &str = "S7rong!Passw0rd#";

async fn kernel() -> Result<(Aurum, Arc<MemoryStore>)> {
    let store = Arc::new(MemoryStore::new());
    let aurum = Aurum::new(store.clone(), Arc::new(KeyPair::generate()));
    assert!(aurum.bootstrap().await?);
    Ok((aurum, store))
}

fn access_token(aurum: &Aurum, username: &str) -> Result<String> {
    Ok(token::mint(username, false, aurum.keys().signing_key(), Utc::now())?)
}

async fn sign_up(aurum: &Aurum, username: &str) -> Result<String> {
    aurum
        .sign_up(User {
            username: username.to_string(),
            password: ALICE_PASSWORD.to_string(),
            email: format!("{username}@x"),
        })
        .await?;
    access_token(aurum, username)
}

fn group(name: &str, allow_registration: bool) -> Group {
    Group {
        name: name.to_string(),
        allow_registration,
    }
}

#[tokio::test]
async fn first_run_seeds_admin() -> Result<()> {
    let (aurum, store) = kernel().await?;

    assert_eq!(store.count_users().await?, 1);
    assert_eq!(store.get_user("admin").await?.username, "admin");
    assert!(store
        .list_groups()
        .await?
        .iter()
        .any(|g| g.name == ROOT_GROUP));
    assert_eq!(store.get_group_role(ROOT_GROUP, "admin").await?, Role::Admin);

    // a second start leaves everything as it was
    assert!(!aurum.bootstrap().await?);
    assert_eq!(store.count_users().await?, 1);
    Ok(())
}

#[tokio::test]
async fn sign_up_and_login() -> Result<()> {
    let (aurum, store) = kernel().await?;

    let created = aurum
        .sign_up(User {
            username: "alice".to_string(),
            password: ALICE_PASSWORD.to_string(),
            email: "a@x".to_string(),
        })
        .await?;
    assert!(created.password.is_empty());

    let pair = aurum
        .login(User {
            username: "alice".to_string(),
            password: ALICE_PASSWORD.to_string(),
            ..User::default()
        })
        .await?;
    assert!(!pair.login_token.is_empty());
    assert!(!pair.refresh_token.is_empty());

    let me = aurum.get_user(&pair.login_token).await?;
    assert_eq!(me.username, "alice");
    assert!(me.password.is_empty());

    // every user is in the root group
    assert_eq!(store.get_group_role(ROOT_GROUP, "alice").await?, Role::User);
    Ok(())
}

#[tokio::test]
async fn wrong_password_and_unknown_user_look_alike() -> Result<()> {
    let (aurum, _) = kernel().await?;
    sign_up(&aurum, "alice").await?;

    let wrong = aurum
        .login(User {
            username: "alice".to_string(),
            password: "not-the-password".to_string(),
            ..User::default()
        })
        .await;
    let unknown = aurum
        .login(User {
            username: "nobody".to_string(),
            password: ALICE_PASSWORD.to_string(),
            ..User::default()
        })
        .await;

    match (wrong, unknown) {
        (Err(Error::Unauthorized(a)), Err(Error::Unauthorized(b))) => assert_eq!(a, b),
        other => panic!("unexpected login results: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn algorithm_downgrade_is_unauthorized() -> Result<()> {
    let (aurum, _) = kernel().await?;
    let token = access_token(&aurum, "admin")?;

    let (_, rest) = token.split_once('.').unwrap_or_default();
    let forged_header = Base64UrlUnpadded::encode_string(br#"{"alg":"HS256","typ":"JWT"}"#);
    let forged = format!("{forged_header}.{rest}");

    assert!(matches!(
        aurum.get_user(&forged).await,
        Err(Error::Unauthorized(_))
    ));
    Ok(())
}

#[tokio::test]
async fn group_admin_flow() -> Result<()> {
    let (aurum, _) = kernel().await?;
    let admin = access_token(&aurum, "admin")?;
    let alice = sign_up(&aurum, "alice").await?;

    assert!(matches!(
        aurum.add_group(&alice, group("Eng", false)).await,
        Err(Error::Unauthorized(_))
    ));

    let created = aurum.add_group(&admin, group("Eng", false)).await?;
    assert_eq!(created.name, "eng");
    assert_eq!(
        aurum.get_access("admin", "Eng").await?,
        AccessStatus::granted("eng", "admin", Role::Admin)
    );

    aurum.set_access(&admin, "Eng", "alice", Role::User).await?;
    assert_eq!(
        aurum.get_access("alice", "eng").await?,
        AccessStatus::granted("eng", "alice", Role::User)
    );

    assert!(aurum.remove_group(&admin, ROOT_GROUP).await.is_err());
    assert!(aurum
        .remove_group(&admin, &ROOT_GROUP.to_uppercase())
        .await
        .is_err());
    Ok(())
}

#[tokio::test]
async fn self_registration_is_clamped() -> Result<()> {
    let (aurum, store) = kernel().await?;
    let admin = access_token(&aurum, "admin")?;
    let alice = sign_up(&aurum, "alice").await?;
    sign_up(&aurum, "bob").await?;

    aurum.add_group(&admin, group("Open", true)).await?;

    aurum
        .add_user_to_group(&alice, "alice", "Open", Role::Admin)
        .await?;
    assert_eq!(store.get_group_role("open", "alice").await?, Role::User);

    assert!(matches!(
        aurum
            .add_user_to_group(&alice, "bob", "Open", Role::User)
            .await,
        Err(Error::Unauthorized(_))
    ));
    Ok(())
}

#[tokio::test]
async fn root_group_is_closed_to_self_registration() -> Result<()> {
    let (aurum, store) = kernel().await?;
    let alice = sign_up(&aurum, "alice").await?;

    assert!(!store.get_group(ROOT_GROUP).await?.allow_registration);
    assert!(matches!(
        aurum
            .add_user_to_group(&alice, "alice", ROOT_GROUP, Role::User)
            .await,
        Err(Error::Unauthorized(_))
    ));
    Ok(())
}

#[tokio::test]
async fn refresh_mints_a_newer_access_token() -> Result<()> {
    let (aurum, _) = kernel().await?;
    sign_up(&aurum, "alice").await?;

    let pair = aurum
        .login(User {
            username: "alice".to_string(),
            password: ALICE_PASSWORD.to_string(),
            ..User::default()
        })
        .await?;

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let renewed = aurum
        .refresh_token(TokenPair {
            login_token: String::new(),
            refresh_token: pair.refresh_token.clone(),
        })
        .await?;
    assert_eq!(renewed.refresh_token, pair.refresh_token);

    let key = aurum.keys().verifying_key();
    let now = Utc::now().timestamp();
    let before = token::verify(&pair.login_token, key, now)?;
    let after = token::verify(&renewed.login_token, key, now)?;
    assert!(after.iat > before.iat);
    assert!(!after.refresh);
    assert_eq!(after.username, "alice");
    Ok(())
}

#[tokio::test]
async fn every_user_has_a_root_edge() -> Result<()> {
    let (aurum, store) = kernel().await?;
    for name in ["alice", "bob", "carol"] {
        sign_up(&aurum, name).await?;
    }

    for name in ["admin", "alice", "bob", "carol"] {
        assert!(
            store.get_group_role(ROOT_GROUP, name).await.is_ok(),
            "{name} has no root edge"
        );
    }

    let alice = access_token(&aurum, "alice")?;
    assert!(matches!(
        aurum
            .remove_user_from_group(&alice, "alice", ROOT_GROUP)
            .await,
        Err(Error::InvalidInput(_))
    ));
    Ok(())
}

#[tokio::test]
async fn set_then_remove_access() -> Result<()> {
    let (aurum, _) = kernel().await?;
    let admin = access_token(&aurum, "admin")?;
    let bob = sign_up(&aurum, "bob").await?;
    aurum.add_group(&admin, group("ops", false)).await?;

    aurum.set_access(&admin, "ops", "bob", Role::Admin).await?;
    assert_eq!(
        aurum.get_access("bob", "ops").await?,
        AccessStatus::granted("ops", "bob", Role::Admin)
    );

    // set_access on an existing edge overwrites the role
    aurum.set_access(&admin, "ops", "bob", Role::User).await?;
    assert_eq!(aurum.get_access("bob", "ops").await?.role, Some(Role::User));

    aurum.remove_user_from_group(&bob, "bob", "ops").await?;
    assert_eq!(
        aurum.get_access("bob", "ops").await?,
        AccessStatus::denied("ops", "bob")
    );
    Ok(())
}

#[tokio::test]
async fn add_group_makes_caller_admin_or_nothing() -> Result<()> {
    let (aurum, store) = kernel().await?;
    let admin = access_token(&aurum, "admin")?;

    aurum.add_group(&admin, group("infra", false)).await?;
    assert_eq!(store.get_group_role("infra", "admin").await?, Role::Admin);

    // a duplicate group must not leave a second edge or touch the first
    assert!(matches!(
        aurum.add_group(&admin, group("INFRA", true)).await,
        Err(Error::Exists(_))
    ));
    let infra = store.get_group("infra").await?;
    assert!(!infra.allow_registration);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adds_create_one_edge() -> Result<()> {
    let (aurum, _) = kernel().await?;
    let admin = access_token(&aurum, "admin")?;
    sign_up(&aurum, "bob").await?;
    aurum.add_group(&admin, group("race", false)).await?;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let aurum = aurum.clone();
            let admin = admin.clone();
            tokio::spawn(async move {
                aurum
                    .add_user_to_group(&admin, "bob", "race", Role::User)
                    .await
            })
        })
        .collect();

    let mut created = 0;
    let mut exists = 0;
    for task in tasks {
        match task.await? {
            Ok(()) => created += 1,
            Err(Error::Exists(_)) => exists += 1,
            Err(other) => return Err(other.into()),
        }
    }
    assert_eq!((created, exists), (1, 7));
    Ok(())
}

#[tokio::test]
async fn refresh_tokens_are_refused_elsewhere() -> Result<()> {
    let (aurum, _) = kernel().await?;
    let refresh = token::mint("admin", true, aurum.keys().signing_key(), Utc::now())?;

    assert!(matches!(
        aurum.get_user(&refresh).await,
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        aurum.add_group(&refresh, group("x", false)).await,
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        aurum.get_groups_for_user(&refresh, "admin").await,
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        aurum
            .set_access(&refresh, ROOT_GROUP, "admin", Role::Admin)
            .await,
        Err(Error::InvalidInput(_))
    ));
    Ok(())
}

#[tokio::test]
async fn memberships_are_listed_for_self_or_root_admin() -> Result<()> {
    let (aurum, _) = kernel().await?;
    let admin = access_token(&aurum, "admin")?;
    let alice = sign_up(&aurum, "alice").await?;
    let bob = sign_up(&aurum, "bob").await?;
    aurum.add_group(&admin, group("eng", true)).await?;
    aurum
        .add_user_to_group(&alice, "alice", "eng", Role::User)
        .await?;

    let mine = aurum.get_groups_for_user(&alice, "alice").await?;
    let mut names: Vec<_> = mine.iter().map(|g| g.group.name.as_str()).collect();
    names.sort_unstable();
    let mut expected = vec!["eng", ROOT_GROUP];
    expected.sort_unstable();
    assert_eq!(names, expected);

    assert_eq!(aurum.get_groups_for_user(&admin, "alice").await?.len(), 2);
    assert!(matches!(
        aurum.get_groups_for_user(&bob, "alice").await,
        Err(Error::Unauthorized(_))
    ));
    Ok(())
}
