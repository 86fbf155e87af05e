//! User storage
//!
//! The session service only ever reads users and creates them at sign-up;
//! everything else about the account lifecycle belongs to other parts of
//! the backend. Uniqueness of email and username is enforced by the
//! store, not by pre-flight lookups.

use super::models::{NewUser, User};
use async_trait::async_trait;
use pacta_core::{PactaError, Result};
use sqlx::PgPool;
use uuid::Uuid;

/// User lookup and creation.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create a user. A colliding email or username fails with
    /// [`PactaError::UserAlreadyExists`] naming the offending field.
    async fn create(&self, user: NewUser) -> Result<User>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;
}

// ============================================================================
// PostgreSQL implementation
// ============================================================================

/// PostgreSQL-backed user store.
///
/// Relies on the unique indexes `users_email_key` and `users_username_key`;
/// constraint violations are translated rather than pre-checked so that
/// concurrent sign-ups cannot race past a lookup.
#[derive(Clone)]
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn create(&self, user: NewUser) -> Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, username, password_hash, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id, email, username, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| translate_create_error(&user, e))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, username, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PactaError::Database(format!("get user by id: {e}")))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, username, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PactaError::Database(format!("get user by email: {e}")))
    }
}

fn translate_create_error(user: &NewUser, err: sqlx::Error) -> PactaError {
    if let sqlx::Error::Database(db_err) = &err {
        // Postgres unique_violation
        if db_err.code().as_deref() == Some("23505") {
            let field = match db_err.constraint() {
                Some(c) if c.contains("username") => "username",
                _ => "email",
            };
            tracing::debug!(email = %user.email, field, "sign-up collision");
            return PactaError::UserAlreadyExists {
                field: field.to_string(),
            };
        }
    }
    PactaError::Database(format!("create user: {err}"))
}

// ============================================================================
// In-memory implementation (tests and local wiring)
// ============================================================================

/// In-memory user store enforcing the same uniqueness rules as the
/// database schema.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
pub struct MemoryUserStore {
    users: tokio::sync::RwLock<Vec<User>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: NewUser) -> Result<User> {
        let mut users = self.users.write().await;

        if users.iter().any(|u| u.email == user.email) {
            return Err(PactaError::UserAlreadyExists {
                field: "email".to_string(),
            });
        }
        if users.iter().any(|u| u.username == user.username) {
            return Err(PactaError::UserAlreadyExists {
                field: "username".to_string(),
            });
        }

        let record = User {
            id: Uuid::new_v4(),
            email: user.email,
            username: user.username,
            password_hash: user.password_hash,
            created_at: chrono::Utc::now(),
        };
        users.push(record.clone());
        Ok(record)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str, username: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let store = MemoryUserStore::new();

        let created = store.create(new_user("a@x.com", "alice")).await.unwrap();
        let by_id = store.get_by_id(created.id).await.unwrap().unwrap();
        let by_email = store.get_by_email("a@x.com").await.unwrap().unwrap();

        assert_eq!(by_id.id, created.id);
        assert_eq!(by_email.username, "alice");
        assert!(store.get_by_email("b@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryUserStore::new();
        store.create(new_user("a@x.com", "alice")).await.unwrap();

        let result = store.create(new_user("a@x.com", "alice2")).await;
        assert!(
            matches!(result, Err(PactaError::UserAlreadyExists { field }) if field == "email")
        );
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let store = MemoryUserStore::new();
        store.create(new_user("a@x.com", "alice")).await.unwrap();

        let result = store.create(new_user("b@x.com", "alice")).await;
        assert!(
            matches!(result, Err(PactaError::UserAlreadyExists { field }) if field == "username")
        );
    }
}
