use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use herald_db::{NotificationStore, bounded};
use herald_types::api::{FanOutResult, NewNotification, NotificationTemplate};
use herald_types::error::{NotificationError, NotificationResult};
use herald_types::models::{Notification, NotificationDraft, NotificationType, Priority};

/// Validates producer input and persists it. Does not push to live feeds;
/// feeds observe the store.
pub struct NotificationWriter {
    store: Arc<dyn NotificationStore>,
    timeout: Option<Duration>,
}

impl NotificationWriter {
    pub fn new(store: Arc<dyn NotificationStore>, timeout: Option<Duration>) -> Self {
        Self { store, timeout }
    }

    /// Create one notification. The record is stored before this returns.
    pub async fn create(&self, input: NewNotification) -> NotificationResult<Notification> {
        let draft = validate(input)?;
        let notification = bounded(self.timeout, self.store.insert(draft)).await?;

        info!(
            "Created {} notification {} for {}",
            notification.kind, notification.id, notification.recipient_id
        );
        Ok(notification)
    }

    /// Create one independent notification per recipient.
    ///
    /// An invalid template fails the whole call. Past that point every
    /// recipient is attempted and failures are reported per recipient;
    /// nothing already stored is rolled back. Duplicate ids within one call
    /// are collapsed to their first occurrence.
    pub async fn create_for_many(
        &self,
        recipient_ids: &[String],
        template: &NotificationTemplate,
    ) -> NotificationResult<Vec<FanOutResult>> {
        validate_content(&template.kind, &template.title, &template.message, template.priority.as_deref())?;

        let mut seen = HashSet::new();
        let mut results = Vec::with_capacity(recipient_ids.len());

        for recipient_id in recipient_ids {
            if !seen.insert(recipient_id.as_str()) {
                continue;
            }

            let outcome = self.create(template.for_recipient(recipient_id)).await;
            if let Err(e) = &outcome {
                warn!("Fan-out to {} failed: {}", recipient_id, e);
            }

            results.push(FanOutResult {
                recipient_id: recipient_id.clone(),
                outcome,
            });
        }

        let failed = results.iter().filter(|r| r.outcome.is_err()).count();
        info!(
            "Fan-out of {} notification: {} delivered, {} failed",
            template.kind,
            results.len() - failed,
            failed
        );
        Ok(results)
    }
}

/// Turn producer input into a draft, or name the first offending field.
pub fn validate(input: NewNotification) -> NotificationResult<NotificationDraft> {
    require("recipientId", &input.recipient_id)?;
    let (kind, priority) = validate_content(&input.kind, &input.title, &input.message, input.priority.as_deref())?;

    Ok(NotificationDraft {
        recipient_id: input.recipient_id,
        sender_id: input.sender_id,
        kind,
        title: input.title,
        message: input.message,
        data: input.data,
        action_url: input.action_url,
        priority,
    })
}

fn validate_content(
    kind: &str,
    title: &str,
    message: &str,
    priority: Option<&str>,
) -> NotificationResult<(NotificationType, Priority)> {
    require("type", kind)?;
    let kind: NotificationType = kind.parse()?;
    require("title", title)?;
    require("message", message)?;
    let priority = priority.map(str::parse).transpose()?.unwrap_or_default();
    Ok((kind, priority))
}

fn require(field: &str, value: &str) -> NotificationResult<()> {
    if value.trim().is_empty() {
        return Err(NotificationError::validation(field, "must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FlakyStore, sqlite_store};
    use herald_db::{NotificationFilter, SortOrder};

    fn input(recipient: &str, kind: &str) -> NewNotification {
        NewNotification {
            recipient_id: recipient.into(),
            kind: kind.into(),
            title: "Payment confirmed".into(),
            message: "₦5000 received".into(),
            ..Default::default()
        }
    }

    fn template(kind: &str) -> NotificationTemplate {
        NotificationTemplate {
            kind: kind.into(),
            title: "Course updated".into(),
            message: "A new lesson was added".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_returns_a_fully_populated_unread_record() {
        let store = sqlite_store();
        let writer = NotificationWriter::new(store.clone(), None);

        let n = writer.create(input("u1", "payment_confirmation")).await.unwrap();
        assert!(!n.read);
        assert!(n.read_at.is_none());
        assert!(!n.id.is_nil());
        assert_eq!(n.priority, Priority::Normal);
        assert_eq!(n.kind, NotificationType::PaymentConfirmation);

        let stored = store.get(n.id).await.unwrap();
        assert_eq!(stored, n);
    }

    #[tokio::test]
    async fn unknown_types_are_rejected_and_nothing_is_stored() {
        let store = sqlite_store();
        let writer = NotificationWriter::new(store.clone(), None);

        for bad in ["friend_request", "NEW_MESSAGE", "course-update"] {
            let err = writer.create(input("u1", bad)).await.unwrap_err();
            assert_eq!(err, NotificationError::InvalidNotificationType(bad.to_string()));
        }

        assert_eq!(store.count(NotificationFilter::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_required_fields_name_the_field() {
        let writer = NotificationWriter::new(sqlite_store(), None);

        let mut missing_title = input("u1", "new_message");
        missing_title.title = "   ".into();
        match writer.create(missing_title).await.unwrap_err() {
            NotificationError::Validation { field, .. } => assert_eq!(field, "title"),
            other => panic!("unexpected error: {other:?}"),
        }

        match writer.create(input("", "new_message")).await.unwrap_err() {
            NotificationError::Validation { field, .. } => assert_eq!(field, "recipientId"),
            other => panic!("unexpected error: {other:?}"),
        }

        let mut bad_priority = input("u1", "new_message");
        bad_priority.priority = Some("urgent".into());
        match writer.create(bad_priority).await.unwrap_err() {
            NotificationError::Validation { field, .. } => assert_eq!(field, "priority"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn fan_out_isolates_per_recipient_store_failures() {
        let store = Arc::new(FlakyStore::failing_for(["r2"]));
        let writer = NotificationWriter::new(store.clone(), None);
        let recipients = vec!["r1".to_string(), "r2".to_string(), "r3".to_string()];

        let results = writer
            .create_for_many(&recipients, &template("course_update"))
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(results[0].outcome.is_ok());
        assert_eq!(
            results[1].outcome.as_ref().unwrap_err().kind(),
            "StoreUnavailable"
        );
        assert!(results[2].outcome.is_ok());

        for (recipient, expected) in [("r1", 1), ("r2", 0), ("r3", 1)] {
            let stored = store
                .query(NotificationFilter::recipient(recipient), SortOrder::NewestFirst, None)
                .await
                .unwrap();
            assert_eq!(stored.len(), expected, "recipient {recipient}");
        }
    }

    #[tokio::test]
    async fn fan_out_collapses_duplicate_recipients() {
        let store = sqlite_store();
        let writer = NotificationWriter::new(store.clone(), None);
        let recipients = vec!["a".to_string(), "b".to_string(), "a".to_string()];

        let results = writer
            .create_for_many(&recipients, &template("course_update"))
            .await
            .unwrap();

        let ids: Vec<&str> = results.iter().map(|r| r.recipient_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(store.count(NotificationFilter::recipient("a")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn fan_out_with_invalid_template_fails_whole_call() {
        let store = sqlite_store();
        let writer = NotificationWriter::new(store.clone(), None);

        let err = writer
            .create_for_many(&["a".to_string()], &template("bogus"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidNotificationType");
        assert_eq!(store.count(NotificationFilter::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn fan_out_reports_empty_recipient_ids_individually() {
        let writer = NotificationWriter::new(sqlite_store(), None);

        let results = writer
            .create_for_many(&["".to_string(), "ok".to_string()], &template("course_update"))
            .await
            .unwrap();

        assert_eq!(results[0].outcome.as_ref().unwrap_err().kind(), "ValidationError");
        assert!(results[1].outcome.is_ok());
    }
}
