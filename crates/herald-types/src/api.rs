use serde::{Deserialize, Serialize};

use crate::error::NotificationError;
use crate::models::Notification;

// -- Create --

/// Producer input for a single notification. `type` and `priority` arrive as
/// raw strings so that unknown values surface as typed errors rather than
/// generic deserialization failures.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewNotification {
    #[serde(default)]
    pub recipient_id: String,
    pub sender_id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub action_url: Option<String>,
    pub priority: Option<String>,
}

/// Everything in a [`NewNotification`] except the recipient; used for fan-out.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NotificationTemplate {
    pub sender_id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub action_url: Option<String>,
    pub priority: Option<String>,
}

impl NotificationTemplate {
    pub fn for_recipient(&self, recipient_id: &str) -> NewNotification {
        NewNotification {
            recipient_id: recipient_id.to_string(),
            sender_id: self.sender_id.clone(),
            kind: self.kind.clone(),
            title: self.title.clone(),
            message: self.message.clone(),
            data: self.data.clone(),
            action_url: self.action_url.clone(),
            priority: self.priority.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BatchCreateRequest {
    pub recipient_ids: Vec<String>,
    pub template: NotificationTemplate,
}

/// Outcome of one recipient in a fan-out. Failures are values, not panics
/// or early returns.
#[derive(Debug, Clone)]
pub struct FanOutResult {
    pub recipient_id: String,
    pub outcome: Result<Notification, NotificationError>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FanOutEntry {
    pub recipient_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl From<FanOutResult> for FanOutEntry {
    fn from(result: FanOutResult) -> Self {
        match result.outcome {
            Ok(notification) => Self {
                recipient_id: result.recipient_id,
                notification: Some(notification),
                error: None,
            },
            Err(e) => Self {
                recipient_id: result.recipient_id,
                notification: None,
                error: Some(ErrorBody::from(&e)),
            },
        }
    }
}

// -- Read state --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MarkAllReadRequest {
    pub recipient_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllReadResponse {
    pub marked_count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    pub count: u64,
}

// -- Errors --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
}

impl From<&NotificationError> for ErrorBody {
    fn from(e: &NotificationError) -> Self {
        Self {
            error: e.kind().to_string(),
            detail: e.to_string(),
        }
    }
}
