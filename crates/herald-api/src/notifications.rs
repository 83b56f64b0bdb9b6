use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use herald_types::api::{
    BatchCreateRequest, FanOutEntry, MarkAllReadRequest, MarkAllReadResponse, NewNotification,
    UnreadCountResponse,
};
use herald_types::error::NotificationError;
use herald_types::models::NotificationType;

use crate::error::ApiError;
use crate::extractors::{ValidJson, ValidQuery};
use crate::reader::{DEFAULT_LIST_LIMIT, ListOptions};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub recipient_id: String,
    #[serde(default)]
    pub unread_only: bool,
    /// Comma-separated notification types.
    pub types: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_LIST_LIMIT
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientQuery {
    pub recipient_id: String,
}

/// POST /notifications
pub async fn create_notification(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<NewNotification>,
) -> Result<impl IntoResponse, ApiError> {
    let notification = state.writer.create(req).await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

/// POST /notifications/batch
pub async fn create_batch(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<BatchCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let results = state
        .writer
        .create_for_many(&req.recipient_ids, &req.template)
        .await?;

    let entries: Vec<FanOutEntry> = results.into_iter().map(FanOutEntry::from).collect();
    Ok(Json(entries))
}

/// GET /notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    // `types=` with no names means no type filter
    let types = query
        .types
        .as_deref()
        .map(parse_types)
        .transpose()?
        .filter(|types| !types.is_empty());

    let notifications = state
        .reader
        .list(
            &query.recipient_id,
            ListOptions {
                unread_only: query.unread_only,
                types,
                limit: query.limit,
            },
        )
        .await?;

    Ok(Json(notifications))
}

/// GET /notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<RecipientQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let count = state.reader.count_unread(&query.recipient_id).await?;
    Ok(Json(UnreadCountResponse { count }))
}

/// POST /notifications/{id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.read_state.mark_read(parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /notifications/mark-all-read
pub async fn mark_all_read(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<MarkAllReadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.recipient_id.trim().is_empty() {
        return Err(NotificationError::validation("recipientId", "must not be empty").into());
    }

    let marked_count = state.read_state.mark_all_read(&req.recipient_id).await?;
    Ok(Json(MarkAllReadResponse { marked_count }))
}

/// DELETE /notifications/{id}
pub async fn delete_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.read_state.delete(parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn health() -> &'static str {
    "ok"
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse().map_err(|_| ApiError::MalformedId(raw.to_string()))
}

fn parse_types(raw: &str) -> Result<Vec<NotificationType>, NotificationError> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn types_parameter_accepts_lists_and_rejects_unknowns() {
        assert_eq!(
            parse_types("new_message, course_update,").unwrap(),
            vec![NotificationType::NewMessage, NotificationType::CourseUpdate]
        );
        assert_eq!(
            parse_types("new_message,party").unwrap_err(),
            NotificationError::InvalidNotificationType("party".into())
        );
    }
}
