use axum::extract::{Path, Query, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use common_auth::{AccessClaims, AuthError};
use common_http_errors::{ApiError, ApiResult};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::app_state::AppState;
use crate::pages::{
    Page, PageCreate, PageCursor, PageListing, PageUpdate, SearchQuery, MAX_PAGE_LIMIT,
    DEFAULT_PAGE_LIMIT,
};
use crate::uploads::{object_key, PresignedUpload, UploadError, UploadRequest};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
    pub published: Option<bool>,
    pub after_id: Option<i64>,
    pub after_title: Option<String>,
}

fn page_limit(limit: Option<usize>) -> ApiResult<usize> {
    match limit {
        None => Ok(DEFAULT_PAGE_LIMIT),
        Some(n) if (1..=MAX_PAGE_LIMIT).contains(&n) => Ok(n),
        Some(_) => Err(ApiError::bad_request(
            "invalid_limit",
            format!("limit must be between 1 and {MAX_PAGE_LIMIT}"),
        )),
    }
}

pub async fn create_page(
    State(state): State<AppState>,
    AccessClaims(claims): AccessClaims,
    Json(input): Json<PageCreate>,
) -> ApiResult<(StatusCode, Json<Page>)> {
    state.metrics.page_request("create");
    let page = state.pages.create_page(input).await?;
    info!(page_id = page.id, user = ?claims.username(), "page created by user");
    Ok((StatusCode::CREATED, Json(page)))
}

pub async fn list_pages(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<PageListing>> {
    state.metrics.page_request("list");
    let limit = page_limit(params.limit)?;
    let start_after = match (params.after_id, params.after_title) {
        (Some(id), Some(title)) => Some(PageCursor { id, title }.into()),
        (None, None) => None,
        _ => {
            return Err(ApiError::bad_request(
                "invalid_cursor",
                "after_id and after_title must be given together",
            ))
        }
    };
    let listing = if params.published == Some(true) {
        state.pages.list_published_pages(limit, start_after).await?
    } else {
        state.pages.list_pages(limit, start_after).await?
    };
    Ok(Json(listing))
}

pub async fn count_pages(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.metrics.page_request("count");
    let count = state.pages.count_pages().await?;
    Ok(Json(json!({ "count": count })))
}

pub async fn search_pages(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<Page>>> {
    state.metrics.page_request("search");
    page_limit(query.limit)?;
    Ok(Json(state.pages.search_pages(&query).await?))
}

/// Anonymous callers only see published pages. A caller that sends a
/// credential must send a valid one.
pub async fn get_page(
    State(state): State<AppState>,
    Path((id, title)): Path<(i64, String)>,
    headers: HeaderMap,
) -> Result<Json<Page>, Response> {
    state.metrics.page_request("get");
    let authorized = match headers.get(AUTHORIZATION) {
        None => false,
        Some(value) => {
            let raw = value
                .to_str()
                .map_err(|_| AuthError::MissingCredential.into_response())?;
            state
                .gate
                .require_access_token(Some(raw))
                .await
                .map_err(IntoResponse::into_response)?;
            true
        }
    };
    state
        .pages
        .get_page(id, &title, authorized)
        .await
        .map(Json)
        .map_err(|err| ApiError::from(err).into_response())
}

pub async fn update_page(
    State(state): State<AppState>,
    _claims: AccessClaims,
    Path((id, title)): Path<(i64, String)>,
    Json(update): Json<PageUpdate>,
) -> ApiResult<Json<Page>> {
    state.metrics.page_request("update");
    Ok(Json(state.pages.update_page(id, &title, update).await?))
}

pub async fn publish_page(
    State(state): State<AppState>,
    _claims: AccessClaims,
    Path((id, title)): Path<(i64, String)>,
) -> ApiResult<Json<Page>> {
    state.metrics.page_request("publish");
    Ok(Json(state.pages.publish_page(id, &title).await?))
}

pub async fn delete_page(
    State(state): State<AppState>,
    _claims: AccessClaims,
    Path((id, title)): Path<(i64, String)>,
) -> ApiResult<StatusCode> {
    state.metrics.page_request("delete");
    state.pages.delete_page(id, &title).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_upload(
    State(state): State<AppState>,
    _claims: AccessClaims,
    Path(page_id): Path<i64>,
    Json(request): Json<UploadRequest>,
) -> ApiResult<(StatusCode, Json<PresignedUpload>)> {
    state.metrics.page_request("upload");
    let uploads = state.uploads.as_ref().ok_or(UploadError::Unavailable)?;
    let key = object_key(page_id, &request.file_name)?;
    let presigned = uploads
        .issuer
        .presign_put(&uploads.bucket, &key, &request.content_type, uploads.ttl)
        .await?;
    info!(page_id, object_key = %presigned.object_key, "upload url issued");
    Ok((StatusCode::CREATED, Json(presigned)))
}
