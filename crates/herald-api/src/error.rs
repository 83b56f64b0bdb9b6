use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use herald_types::api::ErrorBody;
use herald_types::error::NotificationError;

/// HTTP face of [`NotificationError`].
#[derive(Debug)]
pub enum ApiError {
    Notification(NotificationError),
    /// A path id that is not even a UUID; reported like an unknown id.
    MalformedId(String),
}

impl From<NotificationError> for ApiError {
    fn from(e: NotificationError) -> Self {
        Self::Notification(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Notification(e) => {
                let status = match e {
                    NotificationError::Validation { .. }
                    | NotificationError::InvalidNotificationType(_) => StatusCode::BAD_REQUEST,
                    NotificationError::NotFound(_) => StatusCode::NOT_FOUND,
                    NotificationError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                    NotificationError::Subscription(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, ErrorBody::from(e))
            }
            ApiError::MalformedId(raw) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error: "NotFound".to_string(),
                    detail: format!("notification {} not found", raw),
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}
