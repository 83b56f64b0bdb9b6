//! Templates for the marketplace events that produce notifications.
//!
//! Each builder fixes the type, headline, priority, payload and deep link
//! for one kind of event. Producers pass the result to
//! [`NotificationWriter`](crate::writer::NotificationWriter), either per
//! recipient with [`NotificationTemplate::for_recipient`] or through a
//! fan-out.

use chrono::{DateTime, Utc};
use serde_json::json;

use herald_types::api::{FanOutResult, NotificationTemplate};
use herald_types::error::NotificationResult;
use herald_types::models::{NotificationType, Priority};

use crate::writer::NotificationWriter;

const PREVIEW_CHARS: usize = 100;

fn template(
    kind: NotificationType,
    priority: Priority,
    title: String,
    message: String,
    data: serde_json::Value,
    action_url: Option<String>,
) -> NotificationTemplate {
    NotificationTemplate {
        sender_id: None,
        kind: kind.as_str().to_string(),
        title,
        message,
        data: Some(data),
        action_url,
        priority: Some(priority.as_str().to_string()),
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(PREVIEW_CHARS).collect();
    cut.push('…');
    cut
}

pub fn message_received(
    sender_id: &str,
    sender_name: &str,
    body: &str,
    conversation_id: &str,
) -> NotificationTemplate {
    let mut t = template(
        NotificationType::NewMessage,
        Priority::Normal,
        format!("New message from {}", sender_name),
        preview(body),
        json!({ "conversationId": conversation_id, "senderName": sender_name }),
        Some(format!("/messages/{}", conversation_id)),
    );
    t.sender_id = Some(sender_id.to_string());
    t
}

pub fn live_session_starting(session_id: &str, session_title: &str, join_url: &str) -> NotificationTemplate {
    template(
        NotificationType::LiveSessionStarting,
        Priority::High,
        "Live session starting".to_string(),
        format!("{} is starting now. Join in!", session_title),
        json!({ "sessionId": session_id, "sessionTitle": session_title, "joinUrl": join_url }),
        Some(format!("/live/{}", session_id)),
    )
}

pub fn live_session_reminder(
    session_id: &str,
    session_title: &str,
    starts_at: DateTime<Utc>,
) -> NotificationTemplate {
    let minutes = (starts_at - Utc::now()).num_minutes().max(0);
    template(
        NotificationType::LiveSessionReminder,
        Priority::Normal,
        "Live session reminder".to_string(),
        format!("{} starts in {} minutes", session_title, minutes),
        json!({
            "sessionId": session_id,
            "sessionTitle": session_title,
            "startsAt": starts_at.to_rfc3339(),
        }),
        Some(format!("/live/{}", session_id)),
    )
}

pub fn course_update(course_id: &str, course_title: &str, summary: &str) -> NotificationTemplate {
    template(
        NotificationType::CourseUpdate,
        Priority::Normal,
        format!("{} was updated", course_title),
        summary.to_string(),
        json!({ "courseId": course_id, "courseTitle": course_title }),
        Some(format!("/courses/{}", course_id)),
    )
}

pub fn assignment_due(
    course_id: &str,
    assignment_title: &str,
    due_at: DateTime<Utc>,
) -> NotificationTemplate {
    template(
        NotificationType::AssignmentDue,
        Priority::High,
        "Assignment due soon".to_string(),
        format!("{} is due {}", assignment_title, due_at.format("%b %-d, %H:%M UTC")),
        json!({
            "courseId": course_id,
            "assignmentTitle": assignment_title,
            "dueAt": due_at.to_rfc3339(),
        }),
        Some(format!("/courses/{}/assignments", course_id)),
    )
}

pub fn grade_received(course_id: &str, assignment_title: &str, grade: &str) -> NotificationTemplate {
    template(
        NotificationType::GradeReceived,
        Priority::Normal,
        "New grade posted".to_string(),
        format!("You received {} on {}", grade, assignment_title),
        json!({ "courseId": course_id, "assignmentTitle": assignment_title, "grade": grade }),
        Some(format!("/courses/{}/grades", course_id)),
    )
}

pub fn course_completed(course_id: &str, course_title: &str) -> NotificationTemplate {
    template(
        NotificationType::CourseCompleted,
        Priority::Normal,
        "Course completed".to_string(),
        format!("Congratulations on completing {}!", course_title),
        json!({ "courseId": course_id, "courseTitle": course_title }),
        Some(format!("/courses/{}/certificate", course_id)),
    )
}

pub fn new_course_available(
    course_id: &str,
    course_title: &str,
    instructor_name: &str,
) -> NotificationTemplate {
    template(
        NotificationType::NewCourseAvailable,
        Priority::Low,
        "New course available".to_string(),
        format!("{} just published {}", instructor_name, course_title),
        json!({
            "courseId": course_id,
            "courseTitle": course_title,
            "instructorName": instructor_name,
        }),
        Some(format!("/courses/{}", course_id)),
    )
}

/// `amount` is already formatted with its currency, e.g. "₦5000".
pub fn payment_confirmation(
    transaction_ref: &str,
    amount: &str,
    course_title: &str,
) -> NotificationTemplate {
    template(
        NotificationType::PaymentConfirmation,
        Priority::High,
        "Payment confirmed".to_string(),
        format!("{} received for {}", amount, course_title),
        json!({ "transactionRef": transaction_ref, "amount": amount, "courseTitle": course_title }),
        Some("/purchases".to_string()),
    )
}

pub fn system_announcement(title: &str, message: &str) -> NotificationTemplate {
    template(
        NotificationType::SystemAnnouncement,
        Priority::Normal,
        title.to_string(),
        message.to_string(),
        json!({}),
        None,
    )
}

/// Send `template` to every enrolled student. Per-student failures are in
/// the returned results.
pub async fn notify_course_students(
    writer: &NotificationWriter,
    student_ids: &[String],
    template: &NotificationTemplate,
) -> NotificationResult<Vec<FanOutResult>> {
    writer.create_for_many(student_ids, template).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sqlite_store;
    use crate::writer::validate;

    #[test]
    fn every_builder_produces_a_valid_notification() {
        let soon = Utc::now() + chrono::Duration::minutes(30);
        let templates = [
            message_received("u9", "Ada", "Hi there", "c1"),
            live_session_starting("s1", "Ownership deep dive", "https://meet.example/s1"),
            live_session_reminder("s1", "Ownership deep dive", soon),
            course_update("rust-101", "Rust 101", "Lesson 4 added"),
            assignment_due("rust-101", "Borrow checker quiz", soon),
            grade_received("rust-101", "Borrow checker quiz", "A"),
            course_completed("rust-101", "Rust 101"),
            new_course_available("async-201", "Async Rust", "Ada"),
            payment_confirmation("tx-1", "₦5000", "Rust 101"),
            system_announcement("Maintenance", "Back in 10 minutes"),
        ];

        for t in &templates {
            let draft = validate(t.for_recipient("u1")).unwrap();
            assert_eq!(draft.recipient_id, "u1");
        }
    }

    #[test]
    fn message_preview_is_truncated() {
        let long = "x".repeat(250);
        let t = message_received("u9", "Ada", &long, "c1");
        assert_eq!(t.message.chars().count(), PREVIEW_CHARS + 1);
        assert_eq!(t.sender_id.as_deref(), Some("u9"));
        assert_eq!(t.action_url.as_deref(), Some("/messages/c1"));
    }

    #[tokio::test]
    async fn course_students_each_get_their_own_record() {
        let store = sqlite_store();
        let writer = NotificationWriter::new(store.clone(), None);
        let students = vec!["s1".to_string(), "s2".to_string()];

        let results = notify_course_students(
            &writer,
            &students,
            &course_update("rust-101", "Rust 101", "Lesson 4 added"),
        )
        .await
        .unwrap();

        let ids: Vec<_> = results.iter().map(|r| r.outcome.as_ref().unwrap().id).collect();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
    }
}
