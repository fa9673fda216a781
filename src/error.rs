//! Error types for Simcha

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::ApiResponse;

#[derive(Error, Debug)]
pub enum Error {
    /// User-correctable input such as a short password
    #[error("{field} {message}")]
    Policy { field: String, message: String },

    /// Credential mismatch; the message never says which credential was wrong
    #[error("{field} {message}")]
    Auth { field: String, message: String },

    #[error("{field} {message}")]
    Conflict { field: String, message: String },

    #[error("You must be logged in")]
    Unauthorized,

    #[error("User does not match")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Database operation timed out")]
    StoreTimeout,

    #[error("Store error: {0}")]
    Store(String),

    #[error("Password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Cookie signing error: {0}")]
    Cookie(#[from] jsonwebtoken::errors::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config file not found. Run 'simcha init' first.")]
    ConfigNotFound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

/// Coarse classification used to pick a response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Policy,
    Auth,
    Conflict,
    Unauthorized,
    Forbidden,
    NotFound,
    Store,
    Internal,
}

impl Error {
    pub fn policy(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Policy {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn auth(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Auth {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn conflict(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Conflict {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Policy { .. } => ErrorKind::Policy,
            Error::Auth { .. } => ErrorKind::Auth,
            Error::Conflict { .. } => ErrorKind::Conflict,
            Error::Unauthorized => ErrorKind::Unauthorized,
            Error::Forbidden => ErrorKind::Forbidden,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Database(_) | Error::StoreTimeout | Error::Store(_) => ErrorKind::Store,
            _ => ErrorKind::Internal,
        }
    }

    /// The offending field for policy, auth and conflict errors
    pub fn field(&self) -> Option<&str> {
        match self {
            Error::Policy { field, .. } | Error::Auth { field, .. } | Error::Conflict { field, .. } => {
                Some(field)
            }
            _ => None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Policy => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Auth | ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Store | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to a client
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Store | ErrorKind::Internal => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = ApiResponse::<()>::err(self.public_message())
            .with_field(self.field().map(str::to_string));
        (status, Json(body)).into_response()
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Other(format!("Background task failed: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
