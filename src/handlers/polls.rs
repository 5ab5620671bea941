use super::{ApiError, ApiResult, AppState, Caller};
use crate::models::NewPoll;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePollRequest {
    pub active: Option<bool>,
}

pub async fn list_polls(State(state): State<AppState>, Query(params): Query<ListParams>) -> ApiResult<Json<Value>> {
    let polls = match params.active {
        Some(true) => state.store.list_active().await?,
        Some(false) => {
            let mut polls = state.store.list().await?;
            polls.retain(|p| !p.active);
            polls
        }
        None => state.store.list().await?,
    };
    Ok(Json(json!({ "polls": polls })))
}

pub async fn create_poll(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<NewPoll>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(input) = payload.map_err(|_| ApiError::BadRequest("Invalid poll data".to_string()))?;
    let poll = state.store.create(&caller.auth(), input).await?;
    Ok((StatusCode::CREATED, Json(json!({ "poll": poll }))))
}

pub async fn get_poll(State(state): State<AppState>, Path(poll_id): Path<String>) -> ApiResult<Json<Value>> {
    let poll = state.store.get(&poll_id).await?;
    Ok(Json(json!({ "poll": poll })))
}

pub async fn update_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    caller: Caller,
    payload: Result<Json<UpdatePollRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let active = payload
        .ok()
        .and_then(|Json(body)| body.active)
        .ok_or_else(|| ApiError::BadRequest("Field `active` is required".to_string()))?;

    let poll = state.store.set_active(&caller.auth(), &poll_id, active).await?;
    Ok(Json(json!({ "poll": poll })))
}

pub async fn delete_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    caller: Caller,
) -> ApiResult<Json<Value>> {
    state.store.delete(&caller.auth(), &poll_id).await?;
    Ok(Json(json!({ "success": true })))
}
