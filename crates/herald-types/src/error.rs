use thiserror::Error;
use uuid::Uuid;

/// Every failure the notification core can report. Callers branch on the
/// variant (or on [`NotificationError::kind`] over the wire).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    #[error("invalid {field}: {detail}")]
    Validation { field: String, detail: String },

    #[error("unknown notification type '{0}'")]
    InvalidNotificationType(String),

    #[error("notification {0} not found")]
    NotFound(Uuid),

    #[error("notification store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("subscription failed: {0}")]
    Subscription(String),
}

impl NotificationError {
    pub fn validation(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            detail: detail.into(),
        }
    }

    pub fn unavailable(detail: impl ToString) -> Self {
        Self::StoreUnavailable(detail.to_string())
    }

    /// Stable wire name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "ValidationError",
            Self::InvalidNotificationType(_) => "InvalidNotificationType",
            Self::NotFound(_) => "NotFound",
            Self::StoreUnavailable(_) => "StoreUnavailable",
            Self::Subscription(_) => "SubscriptionError",
        }
    }
}

pub type NotificationResult<T> = Result<T, NotificationError>;
