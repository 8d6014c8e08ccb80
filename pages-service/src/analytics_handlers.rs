use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use common_http_errors::{ApiError, ApiResult};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::analytics::{AnalyticsData, EventQuery, DEFAULT_EVENT_LIMIT, MAX_EVENT_LIMIT};
use crate::app_state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RecentParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct LogParams {
    pub event: String,
}

fn event_limit(limit: Option<usize>) -> ApiResult<usize> {
    match limit {
        None => Ok(DEFAULT_EVENT_LIMIT),
        Some(n) if (1..=MAX_EVENT_LIMIT).contains(&n) => Ok(n),
        Some(_) => Err(ApiError::bad_request(
            "invalid_limit",
            format!("limit must be between 1 and {MAX_EVENT_LIMIT}"),
        )),
    }
}

pub async fn recent_events(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> ApiResult<Json<Vec<AnalyticsData>>> {
    let limit = event_limit(params.limit)?;
    Ok(Json(state.analytics.recent_events(limit).await?))
}

pub async fn event_analytics(
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
) -> ApiResult<Json<Vec<AnalyticsData>>> {
    event_limit(query.limit)?;
    Ok(Json(state.analytics.event_analytics(&query).await?))
}

pub async fn log_event(
    State(state): State<AppState>,
    Query(params): Query<LogParams>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    state.analytics.log_event(&params.event).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Event logged successfully" })),
    ))
}
