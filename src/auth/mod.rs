//! Authentication and session management

pub mod authenticator;
pub mod cookie;
pub mod guard;
pub mod password;
pub mod token;

pub use authenticator::Authenticator;
pub use cookie::{CookieBinder, CookieSession, Exchange};
pub use guard::{require_login, require_ownership, OwnerLoader};
pub use password::{check_policy, CredentialManager, MIN_PASSWORD_LEN};
pub use token::{generate_token, SessionIssuer};
