use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::NotificationError;

/// Closed set of notification kinds. Anything else is rejected at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    NewMessage,
    LiveSessionStarting,
    LiveSessionReminder,
    CourseUpdate,
    AssignmentDue,
    GradeReceived,
    CourseCompleted,
    NewCourseAvailable,
    PaymentConfirmation,
    SystemAnnouncement,
}

impl NotificationType {
    pub const ALL: [NotificationType; 10] = [
        Self::NewMessage,
        Self::LiveSessionStarting,
        Self::LiveSessionReminder,
        Self::CourseUpdate,
        Self::AssignmentDue,
        Self::GradeReceived,
        Self::CourseCompleted,
        Self::NewCourseAvailable,
        Self::PaymentConfirmation,
        Self::SystemAnnouncement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewMessage => "new_message",
            Self::LiveSessionStarting => "live_session_starting",
            Self::LiveSessionReminder => "live_session_reminder",
            Self::CourseUpdate => "course_update",
            Self::AssignmentDue => "assignment_due",
            Self::GradeReceived => "grade_received",
            Self::CourseCompleted => "course_completed",
            Self::NewCourseAvailable => "new_course_available",
            Self::PaymentConfirmation => "payment_confirmation",
            Self::SystemAnnouncement => "system_announcement",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = NotificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| NotificationError::InvalidNotificationType(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = NotificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            other => Err(NotificationError::validation(
                "priority",
                format!("unknown priority '{}', expected low, normal or high", other),
            )),
        }
    }
}

/// A single notification addressed to exactly one recipient.
///
/// `read` only ever moves from false to true, and `read_at` is present
/// exactly when `read` is true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    pub priority: Priority,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

/// A validated notification that has not been persisted yet.
/// The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationDraft {
    pub recipient_id: String,
    pub sender_id: Option<String>,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub action_url: Option<String>,
    pub priority: Priority,
}
