//! PostgreSQL store
//!
//! Queries run on pooled connections. A connection whose driver has died is
//! discarded on checkout and replaced, so a database restart does not wedge
//! the server.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, PoolError, RecyclingMethod, Runtime};
use std::future::Future;
use std::time::Duration;
use tokio_postgres::error::SqlState;
use tokio_postgres::{NoTls, Row};

use super::{schema, AuthStore, PostStore};
use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::models::{Author, Credentials, NewPost, Post, PostUpdate, User};

const POST_COLUMNS: &str = r#"
    SELECT posts.id, posts.title, posts.body, posts.created_at, posts.modified_at,
           COALESCE(users.id, 0) AS author_id,
           COALESCE(users.email, 'REMOVED') AS author_email
    FROM posts
    LEFT JOIN users ON users.id = posts.user_id
"#;

pub struct PgStore {
    pool: Pool,
    timeout: Duration,
}

impl PgStore {
    /// Build the connection pool and check that the database is reachable
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let timeout = config.query_timeout();
        let pg_config: tokio_postgres::Config = config.url.parse()?;

        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(manager)
            .max_size(config.pool_size)
            .runtime(Runtime::Tokio1)
            .wait_timeout(Some(timeout))
            .create_timeout(Some(timeout))
            .recycle_timeout(Some(timeout))
            .build()
            .map_err(|e| Error::Config(format!("Invalid database pool: {}", e)))?;

        let store = Self { pool, timeout };
        store.client().await?;
        Ok(store)
    }

    /// Create the schema if it does not exist yet
    pub async fn migrate(&self) -> Result<()> {
        let client = self.client().await?;
        self.timed(client.batch_execute(schema::SCHEMA)).await?;
        tracing::info!("Database schema is up to date");
        Ok(())
    }

    /// Check out a live connection
    async fn client(&self) -> Result<Object> {
        self.pool.get().await.map_err(map_pool_error)
    }

    /// Run a query under the configured timeout
    async fn timed<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, tokio_postgres::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(map_pg_error),
            Err(_) => Err(Error::StoreTimeout),
        }
    }
}

fn map_pool_error(err: PoolError) -> Error {
    match err {
        PoolError::Timeout(_) => Error::StoreTimeout,
        PoolError::Backend(e) => map_pg_error(e),
        other => Error::Store(other.to_string()),
    }
}

fn map_pg_error(err: tokio_postgres::Error) -> Error {
    let email_taken = err.code() == Some(&SqlState::UNIQUE_VIOLATION)
        && err
            .as_db_error()
            .and_then(|db| db.constraint())
            .is_some_and(|c| c == "users_email_key");

    if email_taken {
        Error::conflict("Email", "already exists in the system")
    } else {
        Error::Database(err)
    }
}

fn post_from_row(row: &Row) -> Post {
    Post {
        id: row.get("id"),
        author: Author {
            id: row.get("author_id"),
            email: row.get("author_email"),
        },
        title: row.get("title"),
        body: row.get("body"),
        created_at: row.get("created_at"),
        modified_at: row.get("modified_at"),
    }
}

#[async_trait]
impl AuthStore for PgStore {
    async fn user_exists(&self, email: &str) -> Result<bool> {
        let client = self.client().await?;
        let row = self
            .timed(client.query_one(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)",
                &[&email],
            ))
            .await?;
        Ok(row.get(0))
    }

    async fn create_user(
        &self,
        email: &str,
        password_digest: &str,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
    ) -> Result<i64> {
        let client = self.client().await?;
        let row = self
            .timed(client.query_one(
                "INSERT INTO users (email, password_digest, created_at, modified_at)
                 VALUES ($1, $2, $3, $4)
                 RETURNING id",
                &[&email, &password_digest, &created_at, &modified_at],
            ))
            .await?;
        Ok(row.get(0))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<Credentials>> {
        let client = self.client().await?;
        let row = self
            .timed(client.query_opt(
                "SELECT id, email, password_digest FROM users WHERE email = $1",
                &[&email],
            ))
            .await?;

        Ok(row.map(|row| Credentials {
            id: row.get("id"),
            email: row.get("email"),
            password_digest: row.get("password_digest"),
        }))
    }

    async fn update_password(
        &self,
        user_id: i64,
        password_digest: &str,
        modified_at: DateTime<Utc>,
    ) -> Result<()> {
        let client = self.client().await?;
        let updated = self
            .timed(client.execute(
                "UPDATE users SET password_digest = $1, modified_at = $2 WHERE id = $3",
                &[&password_digest, &modified_at, &user_id],
            ))
            .await?;

        if updated == 0 {
            return Err(Error::NotFound("User".to_string()));
        }
        Ok(())
    }

    async fn create_session(&self, user_id: i64, token: &str) -> Result<i64> {
        let client = self.client().await?;
        let row = self
            .timed(client.query_one(
                "INSERT INTO user_sessions (user_id, session_token)
                 VALUES ($1, $2)
                 RETURNING id",
                &[&user_id, &token],
            ))
            .await?;
        Ok(row.get(0))
    }

    async fn find_user_by_token(&self, user_id: i64, token: &str) -> Result<Option<User>> {
        let client = self.client().await?;
        let row = self
            .timed(client.query_opt(
                "SELECT users.id, users.email, users.created_at, users.modified_at
                 FROM users
                 JOIN user_sessions ON user_sessions.user_id = users.id
                 WHERE user_sessions.user_id = $1 AND user_sessions.session_token = $2",
                &[&user_id, &token],
            ))
            .await?;

        Ok(row.map(|row| User {
            id: row.get("id"),
            email: row.get("email"),
            created_at: Some(row.get("created_at")),
            modified_at: Some(row.get("modified_at")),
        }))
    }

    async fn delete_session(&self, user_id: i64, token: &str) -> Result<()> {
        let client = self.client().await?;
        self.timed(client.execute(
            "DELETE FROM user_sessions WHERE user_id = $1 AND session_token = $2",
            &[&user_id, &token],
        ))
        .await?;
        Ok(())
    }

    async fn delete_all_sessions(&self, user_id: i64) -> Result<u64> {
        let client = self.client().await?;
        let removed = self
            .timed(client.execute(
                "DELETE FROM user_sessions WHERE user_id = $1",
                &[&user_id],
            ))
            .await?;
        Ok(removed)
    }
}

#[async_trait]
impl PostStore for PgStore {
    async fn all_posts(&self) -> Result<Vec<Post>> {
        let client = self.client().await?;
        let query = format!("{} ORDER BY posts.id", POST_COLUMNS);
        let rows = self.timed(client.query(&query, &[])).await?;
        Ok(rows.iter().map(post_from_row).collect())
    }

    async fn post_by_id(&self, id: i64) -> Result<Option<Post>> {
        let client = self.client().await?;
        let query = format!("{} WHERE posts.id = $1", POST_COLUMNS);
        let row = self.timed(client.query_opt(&query, &[&id])).await?;
        Ok(row.as_ref().map(post_from_row))
    }

    async fn create_post(&self, author: &Author, post: &NewPost) -> Result<Post> {
        let client = self.client().await?;
        let now = Utc::now();
        let row = self
            .timed(client.query_one(
                "INSERT INTO posts (user_id, title, body, created_at, modified_at)
                 VALUES ($1, $2, $3, $4, $4)
                 RETURNING id",
                &[&author.id, &post.title, &post.body, &now],
            ))
            .await?;

        Ok(Post {
            id: row.get(0),
            author: author.clone(),
            title: post.title.clone(),
            body: post.body.clone(),
            created_at: now,
            modified_at: now,
        })
    }

    async fn edit_post(&self, id: i64, update: &PostUpdate) -> Result<Option<Post>> {
        let client = self.client().await?;
        let now = Utc::now();
        let updated = self
            .timed(client.execute(
                "UPDATE posts
                 SET title = COALESCE($2, title), body = COALESCE($3, body), modified_at = $4
                 WHERE id = $1",
                &[&id, &update.title, &update.body, &now],
            ))
            .await?;

        drop(client);

        if updated == 0 {
            return Ok(None);
        }
        self.post_by_id(id).await
    }

    async fn delete_post(&self, id: i64) -> Result<bool> {
        let client = self.client().await?;
        let deleted = self
            .timed(client.execute("DELETE FROM posts WHERE id = $1", &[&id]))
            .await?;
        Ok(deleted > 0)
    }
}
