//! Blog posts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::User;

/// Author fields recorded on a post
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub email: String,
}

impl Author {
    /// Email shown for posts whose author account was removed
    pub const REMOVED: &'static str = "REMOVED";

    /// Both id and email must agree with the live identity
    pub fn is(&self, user: &User) -> bool {
        !user.is_anonymous() && self.id == user.id && self.email == user.email
    }
}

impl From<&User> for Author {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub author: Author,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}
