//! Login, logout and identity resolution
//!
//! Each request carries at most one identity, in one of three states:
//! anonymous (no usable cookie), authenticated (cookie matches a stored
//! session) or stale (cookie is well formed but its session is gone). Stale
//! resolves exactly like anonymous.

use axum::http::HeaderMap;
use chrono::Utc;
use std::sync::Arc;

use super::cookie::{CookieBinder, CookieSession, Exchange};
use super::password::CredentialManager;
use super::token::SessionIssuer;
use crate::config::AuthConfig;
use crate::db::AuthStore;
use crate::error::{Error, Result};
use crate::models::{NewUser, PasswordChange, Session, User};

const LOGIN_FIELD: &str = "Email or Password";
const LOGIN_MESSAGE: &str = "was not found, or does not match our records";

pub struct Authenticator {
    store: Arc<dyn AuthStore>,
    credentials: CredentialManager,
    issuer: SessionIssuer,
    binder: CookieBinder,
    decoy_digest: String,
}

impl Authenticator {
    pub fn new(store: Arc<dyn AuthStore>, config: &AuthConfig) -> Result<Self> {
        let credentials = CredentialManager::new(config.bcrypt_cost);
        Ok(Self {
            issuer: SessionIssuer::new(store.clone()),
            decoy_digest: credentials.decoy_digest()?,
            binder: CookieBinder::new(config)?,
            credentials,
            store,
        })
    }

    /// Start an exchange from the request's cookie
    pub fn exchange(&self, headers: &HeaderMap) -> Exchange {
        Exchange::from_headers(&self.binder, headers)
    }

    /// Create a user without logging them in
    pub async fn register(&self, new_user: NewUser) -> Result<User> {
        let NewUser {
            email,
            password,
            confirmation_password,
        } = new_user;

        if email.trim().is_empty() {
            return Err(Error::policy("Email", "must be provided"));
        }

        if self.store.user_exists(&email).await? {
            return Err(Error::conflict("Email", "already exists in the system"));
        }

        let digest = self
            .credentials
            .create_digest(&password, &confirmation_password)
            .await?;
        drop(password);
        drop(confirmation_password);

        let now = Utc::now();
        let id = self.store.create_user(&email, &digest, now, now).await?;
        tracing::info!(user_id = id, "Created user");

        Ok(User {
            id,
            email,
            created_at: Some(now),
            modified_at: Some(now),
        })
    }

    /// Create a user and log them in on this exchange
    pub async fn create_user(&self, exchange: &mut Exchange, new_user: NewUser) -> Result<User> {
        let user = self.register(new_user).await?;
        self.start_session(exchange, user.id).await?;
        Ok(user)
    }

    /// Verify credentials, persist a session, then bind the cookie.
    ///
    /// An unknown email and a wrong password produce the same error.
    pub async fn login(&self, exchange: &mut Exchange, email: &str, password: &str) -> Result<Session> {
        let Some(credentials) = self.store.find_user_by_email(email).await? else {
            self.credentials.verify(&self.decoy_digest, password).await?;
            tracing::debug!("Login rejected: unknown email");
            return Err(Error::auth(LOGIN_FIELD, LOGIN_MESSAGE));
        };

        if !self
            .credentials
            .verify(&credentials.password_digest, password)
            .await?
        {
            tracing::debug!(user_id = credentials.id, "Login rejected: wrong password");
            return Err(Error::auth(LOGIN_FIELD, LOGIN_MESSAGE));
        }

        let session = self.start_session(exchange, credentials.id).await?;
        tracing::info!(user_id = credentials.id, "User logged in");
        Ok(session)
    }

    /// Revoke the presented session and clear the cookie. A no-op for anonymous visitors.
    pub async fn logout(&self, exchange: &mut Exchange) -> Result<()> {
        let Some(CookieSession { user_id, token }) = exchange.session().cloned() else {
            return Ok(());
        };

        // The row goes first; a cleared cookie must never be the only revocation
        self.store.delete_session(user_id, &token).await?;
        exchange.clear(&self.binder);
        tracing::info!(user_id, "User logged out");
        Ok(())
    }

    /// Resolve the identity on this exchange; anonymous and stale both yield `id == 0`
    pub async fn current_user(&self, exchange: &Exchange) -> Result<User> {
        let Some(cookie) = exchange.session() else {
            return Ok(User::anonymous());
        };

        match self
            .store
            .find_user_by_token(cookie.user_id, &cookie.token)
            .await?
        {
            Some(user) => Ok(user),
            None => {
                tracing::debug!(user_id = cookie.user_id, "Stale session cookie");
                Ok(User::anonymous())
            }
        }
    }

    pub async fn is_logged_in(&self, exchange: &Exchange) -> Result<bool> {
        Ok(!self.current_user(exchange).await?.is_anonymous())
    }

    /// Replace the password and revoke every session of the user, this one included
    pub async fn change_password(&self, exchange: &mut Exchange, change: PasswordChange) -> Result<()> {
        let user = self.current_user(exchange).await?;
        if user.is_anonymous() {
            return Err(Error::Unauthorized);
        }

        let credentials = self
            .store
            .find_user_by_email(&user.email)
            .await?
            .ok_or(Error::Unauthorized)?;

        if !self
            .credentials
            .verify(&credentials.password_digest, &change.previous_password)
            .await?
        {
            return Err(Error::auth("Previous Password", "does not match current password"));
        }

        let digest = self
            .credentials
            .create_digest(&change.password, &change.confirmation_password)
            .await?;
        self.store
            .update_password(credentials.id, &digest, Utc::now())
            .await?;

        let revoked = self.store.delete_all_sessions(credentials.id).await?;
        exchange.clear(&self.binder);
        tracing::info!(user_id = credentials.id, revoked, "Password changed");
        Ok(())
    }

    /// Force-logout a user everywhere
    pub async fn revoke_all(&self, email: &str) -> Result<u64> {
        let credentials = self
            .store
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| Error::NotFound("User".to_string()))?;

        let revoked = self.store.delete_all_sessions(credentials.id).await?;
        tracing::info!(user_id = credentials.id, revoked, "Revoked all sessions");
        Ok(revoked)
    }

    async fn start_session(&self, exchange: &mut Exchange, user_id: i64) -> Result<Session> {
        let session = self.issuer.issue(user_id).await?;
        exchange.bind(
            &self.binder,
            CookieSession {
                user_id,
                token: session.token.clone(),
            },
        )?;
        Ok(session)
    }
}
