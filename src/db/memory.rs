//! In-memory store for tests and throwaway local runs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{AuthStore, PostStore};
use crate::error::{Error, Result};
use crate::models::{Author, Credentials, NewPost, Post, PostUpdate, User};

#[derive(Debug, Clone)]
struct UserRow {
    id: i64,
    email: String,
    password_digest: String,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

impl UserRow {
    fn user(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            created_at: Some(self.created_at),
            modified_at: Some(self.modified_at),
        }
    }
}

#[derive(Debug, Clone)]
struct SessionRow {
    user_id: i64,
    token: String,
}

#[derive(Debug, Clone)]
struct PostRow {
    author_id: Option<i64>,
    title: String,
    body: String,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, UserRow>,
    sessions: HashMap<i64, SessionRow>,
    posts: BTreeMap<i64, PostRow>,
    last_user_id: i64,
    last_session_id: i64,
    last_post_id: i64,
}

impl Tables {
    fn author_of(&self, row: &PostRow) -> Author {
        row.author_id
            .and_then(|id| self.users.get(&id))
            .map(|u| Author {
                id: u.id,
                email: u.email.clone(),
            })
            .unwrap_or_else(|| Author {
                id: 0,
                email: Author::REMOVED.to_string(),
            })
    }

    fn post(&self, id: i64, row: &PostRow) -> Post {
        Post {
            id,
            author: self.author_of(row),
            title: row.title.clone(),
            body: row.body.clone(),
            created_at: row.created_at,
            modified_at: row.modified_at,
        }
    }
}

/// Shared-handle store; clones see the same tables
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions across all users
    pub async fn session_count(&self) -> usize {
        self.tables.read().await.sessions.len()
    }

    /// Remove a user, orphaning their posts and dropping their sessions
    pub async fn delete_user(&self, user_id: i64) -> bool {
        let mut tables = self.tables.write().await;
        tables.sessions.retain(|_, s| s.user_id != user_id);
        for post in tables.posts.values_mut() {
            if post.author_id == Some(user_id) {
                post.author_id = None;
            }
        }
        tables.users.remove(&user_id).is_some()
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn user_exists(&self, email: &str) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().any(|u| u.email == email))
    }

    async fn create_user(
        &self,
        email: &str,
        password_digest: &str,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
    ) -> Result<i64> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == email) {
            return Err(Error::conflict("Email", "already exists in the system"));
        }

        tables.last_user_id += 1;
        let id = tables.last_user_id;
        tables.users.insert(
            id,
            UserRow {
                id,
                email: email.to_string(),
                password_digest: password_digest.to_string(),
                created_at,
                modified_at,
            },
        );
        Ok(id)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<Credentials>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email == email)
            .map(|u| Credentials {
                id: u.id,
                email: u.email.clone(),
                password_digest: u.password_digest.clone(),
            }))
    }

    async fn update_password(
        &self,
        user_id: i64,
        password_digest: &str,
        modified_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| Error::NotFound("User".to_string()))?;
        user.password_digest = password_digest.to_string();
        user.modified_at = modified_at;
        Ok(())
    }

    async fn create_session(&self, user_id: i64, token: &str) -> Result<i64> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(Error::Store(format!("user {} does not exist", user_id)));
        }
        if tables.sessions.values().any(|s| s.token == token) {
            return Err(Error::Store("duplicate session token".to_string()));
        }

        tables.last_session_id += 1;
        let id = tables.last_session_id;
        tables.sessions.insert(
            id,
            SessionRow {
                user_id,
                token: token.to_string(),
            },
        );
        Ok(id)
    }

    async fn find_user_by_token(&self, user_id: i64, token: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        let live = tables
            .sessions
            .values()
            .any(|s| s.user_id == user_id && s.token == token);
        if !live {
            return Ok(None);
        }
        Ok(tables.users.get(&user_id).map(UserRow::user))
    }

    async fn delete_session(&self, user_id: i64, token: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .sessions
            .retain(|_, s| !(s.user_id == user_id && s.token == token));
        Ok(())
    }

    async fn delete_all_sessions(&self, user_id: i64) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - tables.sessions.len()) as u64)
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn all_posts(&self) -> Result<Vec<Post>> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .iter()
            .map(|(id, row)| tables.post(*id, row))
            .collect())
    }

    async fn post_by_id(&self, id: i64) -> Result<Option<Post>> {
        let tables = self.tables.read().await;
        Ok(tables.posts.get(&id).map(|row| tables.post(id, row)))
    }

    async fn create_post(&self, author: &Author, post: &NewPost) -> Result<Post> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&author.id) {
            return Err(Error::Store(format!("user {} does not exist", author.id)));
        }

        let now = Utc::now();
        tables.last_post_id += 1;
        let id = tables.last_post_id;
        let row = PostRow {
            author_id: Some(author.id),
            title: post.title.clone(),
            body: post.body.clone(),
            created_at: now,
            modified_at: now,
        };
        let created = tables.post(id, &row);
        tables.posts.insert(id, row);
        Ok(created)
    }

    async fn edit_post(&self, id: i64, update: &PostUpdate) -> Result<Option<Post>> {
        let mut tables = self.tables.write().await;
        let Some(row) = tables.posts.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(title) = &update.title {
            row.title = title.clone();
        }
        if let Some(body) = &update.body {
            row.body = body.clone();
        }
        row.modified_at = Utc::now();

        let row = row.clone();
        Ok(Some(tables.post(id, &row)))
    }

    async fn delete_post(&self, id: i64) -> Result<bool> {
        Ok(self.tables.write().await.posts.remove(&id).is_some())
    }
}
