mod events;
mod polls;
mod vote;

use crate::error::PollError;
use crate::models::AuthContext;
use crate::store::PollStore;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::CookieJar;
use lazy_static::lazy_static;
use log::error;
use regex::Regex;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

const IDENTITY_HEADER: &str = "x-user-id";
const IDENTITY_COOKIE: &str = "user_id";

lazy_static! {
    static ref IDENTITY: Regex = Regex::new(r"^[A-Za-z0-9_.@:-]{1,128}$").unwrap();
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<PollStore>,
}

pub fn router(store: Arc<PollStore>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/polls", get(polls::list_polls).post(polls::create_poll))
        .route("/api/polls/events", get(events::poll_events))
        .route(
            "/api/polls/{poll_id}",
            get(polls::get_poll).patch(polls::update_poll).delete(polls::delete_poll),
        )
        .route("/api/polls/{poll_id}/vote", post(vote::cast_vote))
        .route("/api/polls/{poll_id}/results", get(vote::get_results))
        .with_state(AppState { store })
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthenticated,
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Poll(#[from] PollError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Poll(PollError::Validation(_)) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::Poll(PollError::NotFound(_)) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Poll(PollError::Unauthorized) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::Poll(PollError::ClosedPoll(_)) => (StatusCode::CONFLICT, "POLL_CLOSED"),
            ApiError::Poll(PollError::DuplicateVote(_)) => (StatusCode::CONFLICT, "ALREADY_VOTED"),
            ApiError::Poll(PollError::Storage(_)) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
        };

        let message = match &self {
            ApiError::Poll(PollError::Storage(e)) => {
                error!("Request failed on storage: {}", e);
                "Storage operation failed".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Who is calling, taken from the `x-user-id` header or the `user_id` cookie.
/// Verifying it is somebody else's job; here it only has to be well formed.
#[derive(Debug, Clone)]
pub struct Caller(pub String);

impl Caller {
    pub fn auth(&self) -> AuthContext {
        AuthContext::new(self.0.clone())
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let identity = identity_from_parts(parts);
        async move { identity.map(Caller).ok_or(ApiError::Unauthenticated) }
    }
}

fn identity_from_parts(parts: &Parts) -> Option<String> {
    let from_header = parts
        .headers
        .get(IDENTITY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string());

    let from_cookie = || {
        CookieJar::from_headers(&parts.headers)
            .get(IDENTITY_COOKIE)
            .map(|cookie| cookie.value().trim().to_string())
    };

    from_header
        .or_else(from_cookie)
        .filter(|identity| IDENTITY.is_match(identity))
}

#[cfg(test)]
mod tests;
