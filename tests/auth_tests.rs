//! Authentication and authorization tests
//!
//! Run with: cargo test --test auth_tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use simcha::auth::{require_login, require_ownership, Authenticator, Exchange, OwnerLoader};
use simcha::config::AuthConfig;
use simcha::db::{AuthStore, MemoryStore};
use simcha::error::{Error, ErrorKind, Result};
use simcha::models::{Author, Credentials, NewUser, PasswordChange, User};

const SECRET: &str = "0123456789abcdef0123456789abcdef";

fn auth_config() -> AuthConfig {
    AuthConfig {
        secret: SECRET.to_string(),
        bcrypt_cost: 4,
        ..AuthConfig::default()
    }
}

fn new_user(email: &str, password: &str) -> NewUser {
    NewUser {
        email: email.to_string(),
        password: password.to_string(),
        confirmation_password: password.to_string(),
    }
}

/// The cookie a browser would send back after `exchange`'s response
fn follow_up(auth: &Authenticator, exchange: &Exchange) -> Exchange {
    let mut headers = axum::http::HeaderMap::new();
    if let Some(set_cookie) = exchange.set_cookie() {
        let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
        headers.insert(
            axum::http::header::COOKIE,
            axum::http::HeaderValue::from_str(pair).unwrap(),
        );
    }
    auth.exchange(&headers)
}

async fn setup() -> (Arc<MemoryStore>, Authenticator) {
    let store = Arc::new(MemoryStore::new());
    let auth = Authenticator::new(store.clone(), &auth_config()).unwrap();
    auth.register(new_user("alice@example.com", "hunter22"))
        .await
        .unwrap();
    (store, auth)
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_then_login() {
    let (_, auth) = setup().await;
    let mut exchange = Exchange::default();

    let session = auth
        .login(&mut exchange, "alice@example.com", "hunter22")
        .await
        .expect("login should succeed");

    assert!(session.user_id > 0);
    assert_eq!(session.token.len(), 43);
    let user = auth.current_user(&exchange).await.unwrap();
    assert_eq!(user.email, "alice@example.com");
}

#[tokio::test]
async fn test_short_password_is_policy_error() {
    let (_, auth) = setup().await;
    let err = auth
        .register(new_user("bob@example.com", "abc"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Policy);
    assert_eq!(err.field(), Some("Password"));
}

#[tokio::test]
async fn test_mismatched_confirmation_is_policy_error() {
    let (_, auth) = setup().await;
    let err = auth
        .register(NewUser {
            email: "bob@example.com".to_string(),
            password: "hunter22".to_string(),
            confirmation_password: "hunter23".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Policy);
    assert_eq!(err.field(), Some("ConfirmationPassword"));
}

#[tokio::test]
async fn test_duplicate_email_is_conflict() {
    let (_, auth) = setup().await;
    let err = auth
        .register(new_user("alice@example.com", "another1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.field(), Some("Email"));
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_wrong_password_and_unknown_email_look_the_same() {
    let (store, auth) = setup().await;

    let mut exchange = Exchange::default();
    let wrong_password = auth
        .login(&mut exchange, "alice@example.com", "hunter23")
        .await
        .unwrap_err();
    let unknown_email = auth
        .login(&mut exchange, "nobody@example.com", "hunter22")
        .await
        .unwrap_err();

    assert_eq!(wrong_password.kind(), ErrorKind::Auth);
    assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    assert_eq!(wrong_password.field(), unknown_email.field());

    // Failed logins leave no trace
    assert!(exchange.set_cookie().is_none());
    assert_eq!(store.session_count().await, 0);
}

#[tokio::test]
async fn test_unknown_email_is_not_faster_than_wrong_password() {
    let store = Arc::new(MemoryStore::new());
    let config = AuthConfig {
        bcrypt_cost: 8,
        ..auth_config()
    };
    let auth = Authenticator::new(store, &config).unwrap();
    auth.register(new_user("alice@example.com", "hunter22"))
        .await
        .unwrap();

    let mut exchange = Exchange::default();
    let started = std::time::Instant::now();
    auth.login(&mut exchange, "nobody@example.com", "hunter22")
        .await
        .unwrap_err();
    let unknown = started.elapsed();

    let started = std::time::Instant::now();
    auth.login(&mut exchange, "alice@example.com", "hunter23")
        .await
        .unwrap_err();
    let wrong_password = started.elapsed();

    // Both paths run one bcrypt verify at the same cost
    assert!(
        unknown * 4 >= wrong_password,
        "unknown email {:?} vs wrong password {:?}",
        unknown,
        wrong_password
    );
}

#[tokio::test]
async fn test_each_login_creates_distinct_session() {
    let (store, auth) = setup().await;

    let mut laptop = Exchange::default();
    let mut phone = Exchange::default();
    let first = auth
        .login(&mut laptop, "alice@example.com", "hunter22")
        .await
        .unwrap();
    let second = auth
        .login(&mut phone, "alice@example.com", "hunter22")
        .await
        .unwrap();

    assert_ne!(first.token, second.token);
    assert_eq!(store.session_count().await, 2);
}

#[tokio::test]
async fn test_identity_visible_on_next_request() {
    let (_, auth) = setup().await;
    let mut exchange = Exchange::default();
    auth.login(&mut exchange, "alice@example.com", "hunter22")
        .await
        .unwrap();

    let next = follow_up(&auth, &exchange);
    assert!(auth.is_logged_in(&next).await.unwrap());
}

// ============================================================================
// Logout and stale sessions
// ============================================================================

#[tokio::test]
async fn test_replayed_cookie_after_logout_is_anonymous() {
    let (_, auth) = setup().await;
    let mut login = Exchange::default();
    auth.login(&mut login, "alice@example.com", "hunter22")
        .await
        .unwrap();

    // A copy of the cookie kept aside before logging out
    let replay = follow_up(&auth, &login);

    let mut logout = follow_up(&auth, &login);
    auth.logout(&mut logout).await.unwrap();

    assert_eq!(auth.current_user(&replay).await.unwrap(), User::anonymous());
}

#[tokio::test]
async fn test_logout_only_revokes_presented_session() {
    let (store, auth) = setup().await;

    let mut laptop = Exchange::default();
    let mut phone = Exchange::default();
    auth.login(&mut laptop, "alice@example.com", "hunter22")
        .await
        .unwrap();
    auth.login(&mut phone, "alice@example.com", "hunter22")
        .await
        .unwrap();

    let mut laptop = follow_up(&auth, &laptop);
    auth.logout(&mut laptop).await.unwrap();

    let phone = follow_up(&auth, &phone);
    assert!(auth.is_logged_in(&phone).await.unwrap());
    assert_eq!(store.session_count().await, 1);
}

#[tokio::test]
async fn test_anonymous_logout_is_noop() {
    let (_, auth) = setup().await;
    let mut exchange = Exchange::default();
    auth.logout(&mut exchange).await.unwrap();
    assert!(exchange.set_cookie().is_none());
}

#[tokio::test]
async fn test_deleted_user_session_is_stale() {
    let (store, auth) = setup().await;
    let mut exchange = Exchange::default();
    let session = auth
        .login(&mut exchange, "alice@example.com", "hunter22")
        .await
        .unwrap();

    store.delete_user(session.user_id).await;

    let next = follow_up(&auth, &exchange);
    assert!(!auth.is_logged_in(&next).await.unwrap());
}

// ============================================================================
// Password change
// ============================================================================

#[tokio::test]
async fn test_password_change_revokes_every_session() {
    let (store, auth) = setup().await;

    let mut laptop = Exchange::default();
    let mut phone = Exchange::default();
    auth.login(&mut laptop, "alice@example.com", "hunter22")
        .await
        .unwrap();
    auth.login(&mut phone, "alice@example.com", "hunter22")
        .await
        .unwrap();

    let mut laptop = follow_up(&auth, &laptop);
    auth.change_password(
        &mut laptop,
        PasswordChange {
            previous_password: "hunter22".to_string(),
            password: "correct horse".to_string(),
            confirmation_password: "correct horse".to_string(),
        },
    )
    .await
    .unwrap();

    assert_eq!(store.session_count().await, 0);
    assert!(laptop.session().is_none());
    assert!(!auth.is_logged_in(&follow_up(&auth, &phone)).await.unwrap());

    let mut fresh = Exchange::default();
    assert!(auth
        .login(&mut fresh, "alice@example.com", "hunter22")
        .await
        .is_err());
    auth.login(&mut fresh, "alice@example.com", "correct horse")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_password_change_requires_previous_password() {
    let (store, auth) = setup().await;
    let mut exchange = Exchange::default();
    auth.login(&mut exchange, "alice@example.com", "hunter22")
        .await
        .unwrap();

    let mut exchange = follow_up(&auth, &exchange);
    let err = auth
        .change_password(
            &mut exchange,
            PasswordChange {
                previous_password: "guess123".to_string(),
                password: "correct horse".to_string(),
                confirmation_password: "correct horse".to_string(),
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Auth);
    assert_eq!(err.field(), Some("Previous Password"));
    assert_eq!(store.session_count().await, 1);
}

async fn change_with_bad_new_password(password: &str, confirmation: &str) -> Error {
    let (store, auth) = setup().await;
    let mut exchange = Exchange::default();
    auth.login(&mut exchange, "alice@example.com", "hunter22")
        .await
        .unwrap();

    let mut exchange = follow_up(&auth, &exchange);
    let err = auth
        .change_password(
            &mut exchange,
            PasswordChange {
                previous_password: "hunter22".to_string(),
                password: password.to_string(),
                confirmation_password: confirmation.to_string(),
            },
        )
        .await
        .unwrap_err();

    // Nothing changed: the session survives and the old password still works
    assert!(exchange.set_cookie().is_none());
    assert!(auth.is_logged_in(&exchange).await.unwrap());
    assert_eq!(store.session_count().await, 1);
    let mut fresh = Exchange::default();
    auth.login(&mut fresh, "alice@example.com", "hunter22")
        .await
        .unwrap();

    err
}

#[tokio::test]
async fn test_password_change_rejects_short_password() {
    let err = change_with_bad_new_password("abc", "abc").await;
    assert_eq!(err.kind(), ErrorKind::Policy);
    assert_eq!(err.field(), Some("Password"));
}

#[tokio::test]
async fn test_password_change_rejects_mismatched_confirmation() {
    let err = change_with_bad_new_password("correct horse", "correct horsf").await;
    assert_eq!(err.kind(), ErrorKind::Policy);
    assert_eq!(err.field(), Some("ConfirmationPassword"));
}

#[tokio::test]
async fn test_password_change_requires_login() {
    let (_, auth) = setup().await;
    let mut exchange = Exchange::default();
    let err = auth
        .change_password(
            &mut exchange,
            PasswordChange {
                previous_password: "hunter22".to_string(),
                password: "correct horse".to_string(),
                confirmation_password: "correct horse".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unauthorized));
}

#[tokio::test]
async fn test_revoke_all_by_email() {
    let (store, auth) = setup().await;
    for _ in 0..3 {
        let mut exchange = Exchange::default();
        auth.login(&mut exchange, "alice@example.com", "hunter22")
            .await
            .unwrap();
    }

    assert_eq!(auth.revoke_all("alice@example.com").await.unwrap(), 3);
    assert_eq!(store.session_count().await, 0);

    let err = auth.revoke_all("nobody@example.com").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ============================================================================
// Guards
// ============================================================================

struct Owner(Option<Author>);

#[async_trait]
impl OwnerLoader for Owner {
    fn resource(&self) -> &'static str {
        "Post"
    }

    async fn owner(&self, _resource_id: &str) -> Result<Option<Author>> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn test_require_login_rejects_anonymous() {
    let (_, auth) = setup().await;
    let err = require_login(&auth, &Exchange::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn test_ownership_admits_author_only() {
    let (_, auth) = setup().await;
    auth.register(new_user("bob@example.com", "hunter22"))
        .await
        .unwrap();

    let mut alice = Exchange::default();
    let alice_session = auth
        .login(&mut alice, "alice@example.com", "hunter22")
        .await
        .unwrap();
    let mut bob = Exchange::default();
    auth.login(&mut bob, "bob@example.com", "hunter22")
        .await
        .unwrap();

    let owner = Owner(Some(Author {
        id: alice_session.user_id,
        email: "alice@example.com".to_string(),
    }));

    let admitted = require_ownership(&auth, &alice, &owner, "1").await.unwrap();
    assert_eq!(admitted.id, alice_session.user_id);

    let err = require_ownership(&auth, &bob, &owner, "1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_ownership_needs_matching_email_too() {
    let (_, auth) = setup().await;
    let mut alice = Exchange::default();
    let session = auth
        .login(&mut alice, "alice@example.com", "hunter22")
        .await
        .unwrap();

    let owner = Owner(Some(Author {
        id: session.user_id,
        email: "someone-else@example.com".to_string(),
    }));
    let err = require_ownership(&auth, &alice, &owner, "1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_orphaned_post_admits_nobody() {
    let (_, auth) = setup().await;
    let owner = Owner(Some(Author {
        id: 0,
        email: Author::REMOVED.to_string(),
    }));

    let err = require_ownership(&auth, &Exchange::default(), &owner, "1")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_missing_resource_is_not_found() {
    let (_, auth) = setup().await;
    let err = require_ownership(&auth, &Exchange::default(), &Owner(None), "99")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ============================================================================
// Store failures
// ============================================================================

/// Wraps the memory store and fails selected operations
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_sessions: AtomicBool,
    time_out_lookups: AtomicBool,
}

#[async_trait]
impl AuthStore for FlakyStore {
    async fn user_exists(&self, email: &str) -> Result<bool> {
        self.inner.user_exists(email).await
    }

    async fn create_user(
        &self,
        email: &str,
        password_digest: &str,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
    ) -> Result<i64> {
        self.inner
            .create_user(email, password_digest, created_at, modified_at)
            .await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<Credentials>> {
        if self.time_out_lookups.load(Ordering::SeqCst) {
            return Err(Error::StoreTimeout);
        }
        self.inner.find_user_by_email(email).await
    }

    async fn update_password(
        &self,
        user_id: i64,
        password_digest: &str,
        modified_at: DateTime<Utc>,
    ) -> Result<()> {
        self.inner
            .update_password(user_id, password_digest, modified_at)
            .await
    }

    async fn create_session(&self, user_id: i64, token: &str) -> Result<i64> {
        if self.fail_sessions.load(Ordering::SeqCst) {
            return Err(Error::Store("session insert failed".to_string()));
        }
        self.inner.create_session(user_id, token).await
    }

    async fn find_user_by_token(&self, user_id: i64, token: &str) -> Result<Option<User>> {
        if self.time_out_lookups.load(Ordering::SeqCst) {
            return Err(Error::StoreTimeout);
        }
        self.inner.find_user_by_token(user_id, token).await
    }

    async fn delete_session(&self, user_id: i64, token: &str) -> Result<()> {
        self.inner.delete_session(user_id, token).await
    }

    async fn delete_all_sessions(&self, user_id: i64) -> Result<u64> {
        self.inner.delete_all_sessions(user_id).await
    }
}

async fn flaky_setup() -> (Arc<FlakyStore>, Authenticator) {
    let store = Arc::new(FlakyStore::default());
    let auth = Authenticator::new(store.clone(), &auth_config()).unwrap();
    auth.register(new_user("alice@example.com", "hunter22"))
        .await
        .unwrap();
    (store, auth)
}

#[tokio::test]
async fn test_failed_session_insert_writes_no_cookie() {
    let (store, auth) = flaky_setup().await;
    store.fail_sessions.store(true, Ordering::SeqCst);

    let mut exchange = Exchange::default();
    let err = auth
        .login(&mut exchange, "alice@example.com", "hunter22")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Store);
    assert!(exchange.set_cookie().is_none());
    assert!(exchange.session().is_none());
}

#[tokio::test]
async fn test_login_timeout_is_store_error_not_auth() {
    let (store, auth) = flaky_setup().await;
    store.time_out_lookups.store(true, Ordering::SeqCst);

    let mut exchange = Exchange::default();
    let err = auth
        .login(&mut exchange, "alice@example.com", "hunter22")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Store);
    assert_eq!(err.public_message(), "Internal server error");
}

#[tokio::test]
async fn test_identity_timeout_surfaces_instead_of_anonymous() {
    let (store, auth) = flaky_setup().await;
    let mut exchange = Exchange::default();
    auth.login(&mut exchange, "alice@example.com", "hunter22")
        .await
        .unwrap();

    store.time_out_lookups.store(true, Ordering::SeqCst);
    let next = follow_up(&auth, &exchange);
    let err = auth.current_user(&next).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Store);
}
