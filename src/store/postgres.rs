//! Postgres store.
//!
//! Composite operations run inside one transaction; a transaction that is
//! dropped before `commit` (error or cancelled request) rolls back. Unique
//! violations become [`StoreError::Exists`], foreign-key violations on edge
//! inserts become [`StoreError::NotExists`].

use super::{Store, StoreError, StoreResult};
use crate::models::{Group, GroupWithRole, Role, User};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::{postgres::PgPoolOptions, PgConnection, PgPool};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Constraint errors reach clients, so they carry fixed text instead of the
/// server's message, which names tables and constraints.
fn constraint_error(code: Option<&str>) -> Option<StoreError> {
    match code {
        Some(UNIQUE_VIOLATION) => Some(StoreError::Exists("record already exists".to_string())),
        Some(FOREIGN_KEY_VIOLATION) => Some(StoreError::NotExists(
            "referenced record does not exist".to_string(),
        )),
        _ => None,
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(mapped) = constraint_error(db_err.code().as_deref()) {
                debug!(constraint = ?db_err.constraint(), "{}", db_err.message());
                return mapped;
            }
        }
        Self::Backend(err.into())
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    username: String,
    password_hash: String,
    email: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            username: row.username,
            password: row.password_hash,
            email: row.email,
        }
    }
}

#[derive(sqlx::FromRow)]
struct GroupRow {
    name: String,
    allow_registration: bool,
}

impl From<GroupRow> for Group {
    fn from(row: GroupRow) -> Self {
        Self {
            name: row.name,
            allow_registration: row.allow_registration,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MembershipRow {
    name: String,
    allow_registration: bool,
    role: String,
}

fn parse_role(role: &str) -> StoreResult<Role> {
    role.parse::<Role>()
        .map_err(|e| StoreError::Backend(anyhow!("corrupt membership row: {e}")))
}

/// The DSN with its password masked, for logs.
#[must_use]
pub fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut url) => {
            if url.password().is_some() {
                // Only fails for cannot-be-a-base URLs, which carry no password.
                let _ = url.set_password(Some("****"));
            }
            url.to_string()
        }
        Err(_) => "<unparseable dsn>".to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and apply the embedded migrations before anything is served.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable or a migration fails.
    pub async fn connect(dsn: &SecretString) -> anyhow::Result<Self> {
        debug!(dsn = %redact_dsn(dsn.expose_secret()), "Connecting to database");

        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn.expose_secret())
            .await
            .context("Failed to connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;

        info!("Database ready");
        Ok(Self::from_pool(pool))
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn insert_user(conn: &mut PgConnection, user: &User) -> StoreResult<()> {
    sqlx::query("INSERT INTO users (username, password_hash, email) VALUES ($1, $2, $3)")
        .bind(&user.username)
        .bind(&user.password)
        .bind(&user.email)
        .execute(conn)
        .await?;
    Ok(())
}

async fn insert_group(conn: &mut PgConnection, group: &Group) -> StoreResult<()> {
    sqlx::query("INSERT INTO groups (name, allow_registration) VALUES ($1, $2)")
        .bind(&group.name)
        .bind(group.allow_registration)
        .execute(conn)
        .await?;
    Ok(())
}

async fn insert_edge(
    conn: &mut PgConnection,
    username: &str,
    group: &str,
    role: Role,
) -> StoreResult<()> {
    sqlx::query("INSERT INTO memberships (username, group_name, role) VALUES ($1, $2, $3)")
        .bind(username)
        .bind(group)
        .bind(role.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

#[async_trait]
impl Store for PgStore {
    async fn count_users(&self) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        u64::try_from(count).map_err(|e| StoreError::Backend(e.into()))
    }

    async fn create_user(&self, user: User) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_user(&mut conn, &user).await
    }

    async fn get_user(&self, username: &str) -> StoreResult<User> {
        sqlx::query_as::<_, UserRow>(
            "SELECT username, password_hash, email FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .map(User::from)
        .ok_or_else(|| StoreError::NotExists(format!("user {username}")))
    }

    async fn set_user(&self, patch: User) -> StoreResult<()> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET password_hash = COALESCE(NULLIF($2, ''), password_hash),
                email = COALESCE(NULLIF($3, ''), email)
            WHERE username = $1
            ",
        )
        .bind(&patch.username)
        .bind(&patch.password)
        .bind(&patch.email)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotExists(format!("user {}", patch.username)));
        }
        Ok(())
    }

    async fn create_group(&self, group: Group) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_group(&mut conn, &group).await
    }

    async fn get_group(&self, name: &str) -> StoreResult<Group> {
        sqlx::query_as::<_, GroupRow>("SELECT name, allow_registration FROM groups WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .map(Group::from)
            .ok_or_else(|| StoreError::NotExists(format!("group {name}")))
    }

    async fn remove_group(&self, name: &str) -> StoreResult<()> {
        // Edges go with it through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM groups WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotExists(format!("group {name}")));
        }
        Ok(())
    }

    async fn list_groups(&self) -> StoreResult<Vec<Group>> {
        Ok(
            sqlx::query_as::<_, GroupRow>("SELECT name, allow_registration FROM groups ORDER BY name")
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(Group::from)
                .collect(),
        )
    }

    async fn add_user_to_group(
        &self,
        username: &str,
        group: &str,
        role: Role,
    ) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_edge(&mut conn, username, group, role).await
    }

    async fn set_group_role(&self, group: &str, username: &str, role: Role) -> StoreResult<()> {
        let result =
            sqlx::query("UPDATE memberships SET role = $3 WHERE group_name = $1 AND username = $2")
                .bind(group)
                .bind(username)
                .bind(role.as_str())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotExists(format!("{username} in {group}")));
        }
        Ok(())
    }

    async fn remove_user_from_group(&self, group: &str, username: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM memberships WHERE group_name = $1 AND username = $2")
            .bind(group)
            .bind(username)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotExists(format!("{username} in {group}")));
        }
        Ok(())
    }

    async fn get_group_role(&self, group: &str, username: &str) -> StoreResult<Role> {
        let role: Option<String> = sqlx::query_scalar(
            "SELECT role FROM memberships WHERE group_name = $1 AND username = $2",
        )
        .bind(group)
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        match role {
            Some(role) => parse_role(&role),
            None => Err(StoreError::NotExists(format!("{username} in {group}"))),
        }
    }

    async fn list_groups_for_user(&self, username: &str) -> StoreResult<Vec<GroupWithRole>> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r"
            SELECT g.name, g.allow_registration, m.role
            FROM memberships m
            JOIN groups g ON g.name = m.group_name
            WHERE m.username = $1
            ORDER BY g.name
            ",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(GroupWithRole {
                    role: parse_role(&row.role)?,
                    group: Group {
                        name: row.name,
                        allow_registration: row.allow_registration,
                    },
                })
            })
            .collect()
    }

    async fn create_user_with_role(&self, user: User, group: &str, role: Role) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_user(&mut tx, &user).await?;
        insert_edge(&mut tx, &user.username, group, role).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn create_group_with_role(
        &self,
        group: Group,
        username: &str,
        role: Role,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_group(&mut tx, &group).await?;
        insert_edge(&mut tx, username, &group.name, role).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn initialize(&self, user: User, group: Group, role: Role) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let populated: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users)")
            .fetch_one(&mut *tx)
            .await?;
        if populated {
            return Err(StoreError::Exists("store already initialized".to_string()));
        }

        // A concurrent initializer loses on the primary key of `users`.
        insert_user(&mut tx, &user).await?;
        insert_group(&mut tx, &group).await?;
        insert_edge(&mut tx, &user.username, &group.name, role).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
