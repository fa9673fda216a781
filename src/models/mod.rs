//! Domain records shared by the store, auth and API layers

mod post;
mod user;

pub use post::{Author, NewPost, Post, PostUpdate};
pub use user::{Credentials, LoginRequest, NewUser, PasswordChange, Session, User};
