//! Session token generation and issuance

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::sync::Arc;

use crate::db::AuthStore;
use crate::error::Result;
use crate::models::Session;

/// Random bytes per token (256 bits)
pub const TOKEN_BYTES: usize = 32;

/// Generate an opaque, URL-safe session token
pub fn generate_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Creates session rows. A token is only handed out once its row is stored.
#[derive(Clone)]
pub struct SessionIssuer {
    store: Arc<dyn AuthStore>,
}

impl SessionIssuer {
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self { store }
    }

    pub async fn issue(&self, user_id: i64) -> Result<Session> {
        let token = generate_token();
        let id = self.store.create_session(user_id, &token).await?;
        tracing::debug!(user_id, session_id = id, "Issued session");

        Ok(Session { id, user_id, token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use std::collections::HashSet;

    #[test]
    fn test_token_length_and_alphabet() {
        let token = generate_token();
        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_tokens_are_distinct() {
        let tokens: HashSet<String> = (0..1000).map(|_| generate_token()).collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[tokio::test]
    async fn test_issue_persists_session() {
        let store = Arc::new(MemoryStore::new());
        let now = chrono::Utc::now();
        let user_id = store.create_user("a@x.com", "d", now, now).await.unwrap();

        let issuer = SessionIssuer::new(store.clone());
        let session = issuer.issue(user_id).await.unwrap();

        assert_eq!(session.user_id, user_id);
        let user = store
            .find_user_by_token(user_id, &session.token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.email, "a@x.com");
    }

    #[tokio::test]
    async fn test_issue_fails_when_store_rejects() {
        let store = Arc::new(MemoryStore::new());
        let issuer = SessionIssuer::new(store.clone());

        assert!(issuer.issue(42).await.is_err());
        assert_eq!(store.session_count().await, 0);
    }
}
