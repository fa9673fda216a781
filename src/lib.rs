//! Simcha - a small multi-user blog
//!
//! Visitors read posts; registered users log in and manage their own posts.
//! Authentication is backed by server-side session rows referenced from a
//! signed cookie, so any session can be revoked individually.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::Config;
pub use error::Error;
