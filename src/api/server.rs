//! HTTP API server

use axum::{
    extract::FromRef,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::Authenticator;
use crate::config::{Config, DatabaseBackend};
use crate::db::{Datastore, MemoryStore, PgStore, PostStore};
use crate::error::{Error, Result};

use super::middleware::{self, OwnershipGuard};
use super::routes::{self, PostOwners};

/// Application state shared across handlers.
///
/// Everything here is immutable or a handle to the store; request state lives
/// in the cookie and the session table.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: Arc<Authenticator>,
    pub posts: Arc<dyn PostStore>,
}

impl AppState {
    /// Wire the auth layer and post handlers to one store
    pub fn new<S: Datastore + 'static>(config: Config, store: Arc<S>) -> Result<Self> {
        let auth = Authenticator::new(store.clone(), &config.auth)?;
        Ok(Self {
            config: Arc::new(config),
            auth: Arc::new(auth),
            posts: store,
        })
    }

    /// Connect to the configured backend
    pub async fn from_config(config: Config) -> Result<Self> {
        match config.database.backend {
            DatabaseBackend::Memory => {
                tracing::warn!("Using the in-memory store; all data is lost on exit");
                Self::new(config, Arc::new(MemoryStore::new()))
            }
            DatabaseBackend::Postgres => {
                let store = PgStore::connect(&config.database).await?;
                store.migrate().await?;
                Self::new(config, Arc::new(store))
            }
        }
    }
}

/// Run the HTTP API server
pub async fn run_server(config: Config, host: &str, port: u16) -> Result<()> {
    let state = AppState::from_config(config).await?;

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    serve(listener, state).await
}

/// Serve on an already bound listener until ctrl-c
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let app = create_router(state)?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

/// Create the router with all routes
pub fn create_router(state: AppState) -> Result<Router> {
    let auth = state.auth.clone();
    let owners = OwnershipGuard::new(
        auth.clone(),
        Arc::new(PostOwners::new(state.posts.clone())),
        "post_id",
    );
    let login_required = || from_fn_with_state(auth.clone(), middleware::require_login);

    let mut router = Router::new()
        .route("/api/health", get(routes::health))
        // Session routes
        .route("/api/login", post(routes::login))
        .route("/api/logout", post(routes::logout))
        // User routes
        .route("/api/users", post(routes::create_user))
        .route("/api/current_user", get(routes::current_user))
        .route(
            "/api/users/password",
            put(routes::change_password).route_layer(login_required()),
        )
        // Post routes
        .route(
            "/api/posts",
            get(routes::list_posts).merge(post(routes::create_post).route_layer(login_required())),
        )
        .route(
            "/api/posts/{post_id}",
            get(routes::get_post).merge(
                put(routes::update_post)
                    .delete(routes::delete_post)
                    // Layers run outermost-last: login is checked before ownership
                    .route_layer(from_fn_with_state(owners, middleware::require_ownership))
                    .route_layer(login_required()),
            ),
        )
        .layer(TraceLayer::new_for_http());

    if let Some(origin) = &state.config.server.allowed_origin {
        router = router.layer(cors_layer(origin)?);
    }

    Ok(router.with_state(state))
}

fn cors_layer(origin: &str) -> Result<CorsLayer> {
    let origin = HeaderValue::from_str(origin)
        .map_err(|e| Error::Config(format!("Invalid allowed_origin {:?}: {}", origin, e)))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            header::ACCEPT_ENCODING,
            header::AUTHORIZATION,
        ]))
}
