//! HTTP API server

pub mod middleware;
pub mod routes;
pub mod server;

pub use middleware::CurrentUser;
pub use routes::ApiResponse;
pub use server::*;
