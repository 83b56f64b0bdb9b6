use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (notifications)");
        conn.execute_batch(
            "
            CREATE TABLE notifications (
                seq             INTEGER PRIMARY KEY AUTOINCREMENT,
                id              TEXT NOT NULL UNIQUE,
                recipient_id    TEXT NOT NULL,
                sender_id       TEXT,
                kind            TEXT NOT NULL,
                title           TEXT NOT NULL,
                message         TEXT NOT NULL,
                data            TEXT,
                action_url      TEXT,
                priority        TEXT NOT NULL DEFAULT 'normal',
                read            INTEGER NOT NULL DEFAULT 0,
                read_at         TEXT,
                archived        INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_recipient
                ON notifications(recipient_id, read, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
