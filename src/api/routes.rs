//! API route handlers

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;

use super::middleware::CurrentUser;
use crate::auth::{Authenticator, Exchange, OwnerLoader};
use crate::db::PostStore;
use crate::error::{Error, Result};
use crate::models::{Author, LoginRequest, NewPost, NewUser, PasswordChange, Post, PostUpdate, User};

/// JSON envelope shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub result: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            result: Some(data),
            error: None,
            field: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(message.into()),
            field: None,
        }
    }

    pub fn with_field(mut self, field: Option<String>) -> Self {
        self.field = field;
        self
    }
}

// Health check

pub async fn health() -> impl IntoResponse {
    Json(ApiResponse::ok("healthy"))
}

// Session routes

pub async fn login(
    State(auth): State<Arc<Authenticator>>,
    mut exchange: Exchange,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    auth.login(&mut exchange, &req.email, &req.password).await?;
    Ok((exchange, Json(ApiResponse::ok("success"))))
}

pub async fn logout(
    State(auth): State<Arc<Authenticator>>,
    mut exchange: Exchange,
) -> Result<impl IntoResponse> {
    auth.logout(&mut exchange).await?;
    Ok((exchange, Json(ApiResponse::ok("success"))))
}

// User routes

pub async fn create_user(
    State(auth): State<Arc<Authenticator>>,
    mut exchange: Exchange,
    Json(new_user): Json<NewUser>,
) -> Result<impl IntoResponse> {
    let user = auth.create_user(&mut exchange, new_user).await?;
    Ok((StatusCode::CREATED, exchange, Json(ApiResponse::ok(user))))
}

pub async fn current_user(
    State(auth): State<Arc<Authenticator>>,
    exchange: Exchange,
) -> Result<Json<ApiResponse<User>>> {
    let user = auth.current_user(&exchange).await?;
    Ok(Json(ApiResponse::ok(user)))
}

pub async fn change_password(
    State(auth): State<Arc<Authenticator>>,
    mut exchange: Exchange,
    Json(change): Json<PasswordChange>,
) -> Result<impl IntoResponse> {
    auth.change_password(&mut exchange, change).await?;
    Ok((exchange, Json(ApiResponse::ok("success"))))
}

// Post routes

pub async fn list_posts(
    State(posts): State<Arc<dyn PostStore>>,
) -> Result<Json<ApiResponse<Vec<Post>>>> {
    let all = posts.all_posts().await?;
    Ok(Json(ApiResponse::ok(all)))
}

pub async fn get_post(
    State(posts): State<Arc<dyn PostStore>>,
    Path(post_id): Path<i64>,
) -> Result<Json<ApiResponse<Post>>> {
    let post = posts
        .post_by_id(post_id)
        .await?
        .ok_or_else(|| Error::NotFound("Post".to_string()))?;
    Ok(Json(ApiResponse::ok(post)))
}

pub async fn create_post(
    State(posts): State<Arc<dyn PostStore>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(new_post): Json<NewPost>,
) -> Result<impl IntoResponse> {
    if new_post.title.trim().is_empty() {
        return Err(Error::policy("Title", "must be provided"));
    }

    let post = posts.create_post(&Author::from(&user), &new_post).await?;
    tracing::info!(user_id = user.id, post_id = post.id, "Created post");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(post))))
}

pub async fn update_post(
    State(posts): State<Arc<dyn PostStore>>,
    Path(post_id): Path<i64>,
    Json(update): Json<PostUpdate>,
) -> Result<Json<ApiResponse<Post>>> {
    if update.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(Error::policy("Title", "must be provided"));
    }

    let post = posts
        .edit_post(post_id, &update)
        .await?
        .ok_or_else(|| Error::NotFound("Post".to_string()))?;
    Ok(Json(ApiResponse::ok(post)))
}

pub async fn delete_post(
    State(posts): State<Arc<dyn PostStore>>,
    Path(post_id): Path<i64>,
) -> Result<Json<ApiResponse<&'static str>>> {
    if !posts.delete_post(post_id).await? {
        return Err(Error::NotFound("Post".to_string()));
    }
    tracing::info!(post_id, "Deleted post");
    Ok(Json(ApiResponse::ok("success")))
}

/// Resolves a post's recorded author for the ownership guard
pub struct PostOwners {
    posts: Arc<dyn PostStore>,
}

impl PostOwners {
    pub fn new(posts: Arc<dyn PostStore>) -> Self {
        Self { posts }
    }
}

#[async_trait]
impl OwnerLoader for PostOwners {
    fn resource(&self) -> &'static str {
        "Post"
    }

    async fn owner(&self, resource_id: &str) -> Result<Option<Author>> {
        let Ok(id) = resource_id.parse::<i64>() else {
            return Ok(None);
        };
        Ok(self.posts.post_by_id(id).await?.map(|post| post.author))
    }
}
