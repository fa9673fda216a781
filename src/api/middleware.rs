//! Authentication middleware and extractors

use axum::{
    extract::{FromRef, FromRequestParts, Path, Request, State},
    http::{header::SET_COOKIE, request::Parts},
    middleware::Next,
    response::{IntoResponseParts, Response, ResponseParts},
};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use crate::auth::{guard, Authenticator, Exchange, OwnerLoader};
use crate::error::{Error, Result};
use crate::models::User;

/// Identity admitted by a guard, available to downstream handlers
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for Exchange
where
    Arc<Authenticator>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let auth = Arc::<Authenticator>::from_ref(state);
        Ok(auth.exchange(&parts.headers))
    }
}

impl IntoResponseParts for Exchange {
    type Error = Infallible;

    fn into_response_parts(
        mut self,
        mut res: ResponseParts,
    ) -> std::result::Result<ResponseParts, Self::Error> {
        if let Some(cookie) = self.take_set_cookie() {
            res.headers_mut().append(SET_COOKIE, cookie);
        }
        Ok(res)
    }
}

/// Middleware for requiring authentication
pub async fn require_login(
    State(auth): State<Arc<Authenticator>>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let exchange = auth.exchange(req.headers());
    let user = guard::require_login(&auth, &exchange).await?;
    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

/// State for [`require_ownership`]: which loader to ask and which path
/// parameter names the resource
#[derive(Clone)]
pub struct OwnershipGuard {
    auth: Arc<Authenticator>,
    loader: Arc<dyn OwnerLoader>,
    param: &'static str,
}

impl OwnershipGuard {
    pub fn new(auth: Arc<Authenticator>, loader: Arc<dyn OwnerLoader>, param: &'static str) -> Self {
        Self {
            auth,
            loader,
            param,
        }
    }
}

/// Middleware admitting only the author of the addressed resource.
///
/// Must be layered inside [`require_login`] so anonymous callers get the
/// login error rather than an ownership denial.
pub async fn require_ownership(
    State(ownership): State<OwnershipGuard>,
    Path(params): Path<HashMap<String, String>>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let resource_id = params
        .get(ownership.param)
        .ok_or_else(|| Error::NotFound(ownership.loader.resource().to_string()))?;

    let exchange = ownership.auth.exchange(req.headers());
    let user = guard::require_ownership(
        &ownership.auth,
        &exchange,
        ownership.loader.as_ref(),
        resource_id,
    )
    .await?;

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}
