use super::{ApiError, ApiResult, AppState, Caller};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use log::info;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub option_id: Option<String>,
}

pub async fn cast_vote(
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    caller: Caller,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let option_id = payload
        .ok()
        .and_then(|Json(body)| body.option_id)
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Option ID is required".to_string()))?;

    info!("Vote request: poll_id={}, option_id={}, voter={}", poll_id, option_id, caller.0);
    let poll = state.store.vote(&poll_id, &option_id, &caller.0).await?;
    Ok(Json(json!({ "poll": poll, "message": "Vote recorded" })))
}

pub async fn get_results(State(state): State<AppState>, Path(poll_id): Path<String>) -> ApiResult<Json<Value>> {
    let results = state.store.results(&poll_id).await?;
    Ok(Json(json!({ "results": results })))
}
