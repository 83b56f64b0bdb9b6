use serde::Serialize;

use crate::api::ErrorBody;
use crate::models::Notification;

/// Frames pushed over the notification stream.
///
/// `Unread` serializes as a bare JSON array holding the full current unread
/// snapshot (never a delta). `Error` is sent once before the stream closes.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StreamFrame {
    Unread(Vec<Notification>),
    Error(ErrorBody),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotificationError;

    #[test]
    fn unread_frame_is_a_bare_array() {
        let json = serde_json::to_string(&StreamFrame::Unread(vec![])).unwrap();
        assert_eq!(json, "[]");
    }

    #[test]
    fn error_frame_names_the_kind() {
        let err = NotificationError::Subscription("change channel closed".into());
        let json = serde_json::to_value(StreamFrame::Error(ErrorBody::from(&err))).unwrap();
        assert_eq!(json["error"], "SubscriptionError");
        assert_eq!(json["detail"], "subscription failed: change channel closed");
    }
}
