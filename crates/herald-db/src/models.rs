/// Database row types; these map directly to SQLite rows.
/// Distinct from herald-types models to keep the DB layer independent.

pub struct NotificationRow {
    pub id: String,
    pub recipient_id: String,
    pub sender_id: Option<String>,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub data: Option<String>,
    pub action_url: Option<String>,
    pub priority: String,
    pub read: bool,
    pub read_at: Option<String>,
    pub archived: bool,
    pub created_at: String,
}
