//! Signed session cookie
//!
//! The cookie carries only `(user_id, token)`. Its value is an HS256 token so
//! it cannot be altered client-side; the server-side session row remains the
//! only authority on whether the pair is still valid.

use axum::http::header::{HeaderMap, HeaderValue, COOKIE};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::error::{Error, Result};

/// The pair a client presents on each request
#[derive(Clone, PartialEq, Eq)]
pub struct CookieSession {
    pub user_id: i64,
    pub token: String,
}

impl std::fmt::Debug for CookieSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieSession")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

/// Signed cookie payload
#[derive(Debug, Serialize, Deserialize)]
struct CookieClaims {
    uid: i64,
    token: String,
    iat: i64,
    exp: i64,
}

/// Reads and writes the session cookie
pub struct CookieBinder {
    name: String,
    secure: bool,
    max_age_secs: i64,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    cleared: HeaderValue,
}

impl CookieBinder {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let name = config.cookie_name.clone();
        let valid_name = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
        if !valid_name {
            return Err(Error::Config(format!("Invalid cookie name: {:?}", name)));
        }

        let mut cleared = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", name);
        if config.cookie_secure {
            cleared.push_str("; Secure");
        }
        let cleared = HeaderValue::from_str(&cleared)
            .map_err(|e| Error::Config(format!("Invalid cookie header: {}", e)))?;

        let max_age_secs = config
            .cookie_max_age_days
            .checked_mul(24 * 3600)
            .filter(|secs| *secs > 0)
            .ok_or_else(|| {
                Error::Config(format!(
                    "Invalid cookie max age: {} days",
                    config.cookie_max_age_days
                ))
            })?;

        Ok(Self {
            name,
            secure: config.cookie_secure,
            max_age_secs,
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            cleared,
        })
    }

    /// Extract the session pair from request headers.
    ///
    /// A missing, tampered, expired or malformed cookie yields `None`; this is
    /// the ordinary anonymous path, never an error. When several cookies share
    /// the name, the first one that verifies wins.
    pub fn read(&self, headers: &HeaderMap) -> Option<CookieSession> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|header| header.to_str().ok())
            .flat_map(|header| header.split(';'))
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                (name == self.name).then_some(value)
            })
            .find_map(|value| self.decode(value))
    }

    /// Build the `Set-Cookie` value that binds `session` to the client
    pub fn write(&self, session: &CookieSession) -> Result<HeaderValue> {
        let value = self.encode(session)?;
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.name, value, self.max_age_secs
        );
        if self.secure {
            cookie.push_str("; Secure");
        }

        HeaderValue::from_str(&cookie).map_err(|e| Error::Other(format!("Invalid cookie: {}", e)))
    }

    /// `Set-Cookie` value that removes the cookie
    pub fn clear(&self) -> HeaderValue {
        self.cleared.clone()
    }

    fn encode(&self, session: &CookieSession) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = CookieClaims {
            uid: session.user_id,
            token: session.token.clone(),
            iat: now,
            exp: now.saturating_add(self.max_age_secs),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    fn decode(&self, value: &str) -> Option<CookieSession> {
        let claims = match decode::<CookieClaims>(value, &self.decoding, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                tracing::debug!("Ignoring unreadable session cookie: {}", e);
                return None;
            }
        };

        // The anonymous sentinel is never looked up
        if claims.uid <= 0 || claims.token.is_empty() {
            return None;
        }

        Some(CookieSession {
            user_id: claims.uid,
            token: claims.token,
        })
    }
}

/// Per-request cookie state.
///
/// Starts from whatever the request carried; login binds a new pair, logout
/// clears it, and later reads within the same request see the change. The
/// pending `Set-Cookie` value is emitted with the response.
#[derive(Debug, Default)]
pub struct Exchange {
    session: Option<CookieSession>,
    set_cookie: Option<HeaderValue>,
}

impl Exchange {
    pub fn new(session: Option<CookieSession>) -> Self {
        Self {
            session,
            set_cookie: None,
        }
    }

    pub fn from_headers(binder: &CookieBinder, headers: &HeaderMap) -> Self {
        Self::new(binder.read(headers))
    }

    /// The pair presented (or bound) on this exchange
    pub fn session(&self) -> Option<&CookieSession> {
        self.session.as_ref()
    }

    /// Header to attach to the response, if the cookie changed
    pub fn set_cookie(&self) -> Option<&HeaderValue> {
        self.set_cookie.as_ref()
    }

    pub fn take_set_cookie(&mut self) -> Option<HeaderValue> {
        self.set_cookie.take()
    }

    pub fn bind(&mut self, binder: &CookieBinder, session: CookieSession) -> Result<()> {
        self.set_cookie = Some(binder.write(&session)?);
        self.session = Some(session);
        Ok(())
    }

    pub fn clear(&mut self, binder: &CookieBinder) {
        self.session = None;
        self.set_cookie = Some(binder.clear());
    }
}
