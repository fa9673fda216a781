//! Persistence ports and their adapters
//!
//! The auth layer only ever talks to [`AuthStore`]; post handlers talk to
//! [`PostStore`]. Both PostgreSQL and the in-memory store implement the pair.

mod memory;
mod postgres;
mod schema;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use schema::SCHEMA;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Author, Credentials, NewPost, Post, PostUpdate, User};

/// Users and sessions as seen by the authentication layer
#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn user_exists(&self, email: &str) -> Result<bool>;

    /// Insert a user and return the id assigned by the store
    async fn create_user(
        &self,
        email: &str,
        password_digest: &str,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
    ) -> Result<i64>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<Credentials>>;

    async fn update_password(
        &self,
        user_id: i64,
        password_digest: &str,
        modified_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Persist a session row and return its id
    async fn create_session(&self, user_id: i64, token: &str) -> Result<i64>;

    /// Resolve a live `(user_id, token)` pair to its user
    async fn find_user_by_token(&self, user_id: i64, token: &str) -> Result<Option<User>>;

    /// Remove one session. Removing a missing session is not an error.
    async fn delete_session(&self, user_id: i64, token: &str) -> Result<()>;

    /// Remove every session of a user, returning how many were removed
    async fn delete_all_sessions(&self, user_id: i64) -> Result<u64>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn all_posts(&self) -> Result<Vec<Post>>;

    async fn post_by_id(&self, id: i64) -> Result<Option<Post>>;

    async fn create_post(&self, author: &Author, post: &NewPost) -> Result<Post>;

    /// Apply the provided fields; `None` when the post does not exist
    async fn edit_post(&self, id: i64, update: &PostUpdate) -> Result<Option<Post>>;

    /// `false` when the post did not exist
    async fn delete_post(&self, id: i64) -> Result<bool>;
}

/// A complete backing store
pub trait Datastore: AuthStore + PostStore {}

impl<T: AuthStore + PostStore> Datastore for T {}
