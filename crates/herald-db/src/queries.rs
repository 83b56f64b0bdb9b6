use crate::Database;
use crate::models::NotificationRow;
use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, Row};

const COLUMNS: &str = "id, recipient_id, sender_id, kind, title, message, data, action_url, \
                       priority, read, read_at, archived, created_at";

/// Column-level filter; every `Some` narrows the result.
#[derive(Debug, Default, Clone)]
pub struct RowFilter {
    pub recipient_id: Option<String>,
    pub read: Option<bool>,
    pub kinds: Option<Vec<String>>,
}

impl Database {
    // -- Notifications --

    pub fn insert_notification(&self, row: &NotificationRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, recipient_id, sender_id, kind, title, message, data, action_url, priority, read, read_at, archived, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                rusqlite::params![
                    row.id,
                    row.recipient_id,
                    row.sender_id,
                    row.kind,
                    row.title,
                    row.message,
                    row.data,
                    row.action_url,
                    row.priority,
                    row.read,
                    row.read_at,
                    row.archived,
                    row.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_notification(&self, id: &str) -> Result<Option<NotificationRow>> {
        self.with_conn(|conn| query_notification_by_id(conn, id))
    }

    /// Apply a partial update. `read_at` only takes effect on an unread row,
    /// so the first read timestamp is never overwritten.
    /// Returns `None` if the row does not exist, otherwise the recipient and
    /// whether anything changed.
    pub fn update_notification(
        &self,
        id: &str,
        read_at: Option<&str>,
        archived: Option<bool>,
    ) -> Result<Option<(String, bool)>> {
        self.with_conn_mut(|conn| {
            let recipient: Option<String> = conn
                .query_row(
                    "SELECT recipient_id FROM notifications WHERE id = ?1",
                    [id],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(recipient) = recipient else {
                return Ok(None);
            };

            let mut changed = 0;
            if let Some(read_at) = read_at {
                changed += conn.execute(
                    "UPDATE notifications SET read = 1, read_at = ?2 WHERE id = ?1 AND read = 0",
                    rusqlite::params![id, read_at],
                )?;
            }
            if let Some(archived) = archived {
                changed += conn.execute(
                    "UPDATE notifications SET archived = ?2 WHERE id = ?1 AND archived != ?2",
                    rusqlite::params![id, archived],
                )?;
            }

            Ok(Some((recipient, changed > 0)))
        })
    }

    /// Delete a row. Returns the recipient it belonged to, or `None` if absent.
    pub fn delete_notification(&self, id: &str) -> Result<Option<String>> {
        self.with_conn_mut(|conn| {
            conn.query_row(
                "DELETE FROM notifications WHERE id = ?1 RETURNING recipient_id",
                [id],
                |row| row.get(0),
            )
            .optional()
        })
    }

    pub fn query_notifications(
        &self,
        filter: &RowFilter,
        newest_first: bool,
        limit: Option<u32>,
    ) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let (clause, params) = where_clause(filter);
            let order = if newest_first {
                "created_at DESC, seq DESC"
            } else {
                "created_at ASC, seq ASC"
            };

            let mut sql = format!("SELECT {} FROM notifications{} ORDER BY {}", COLUMNS, clause, order);
            if let Some(limit) = limit {
                sql.push_str(&format!(" LIMIT {}", limit));
            }

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn count_notifications(&self, filter: &RowFilter) -> Result<u64> {
        self.with_conn(|conn| {
            let (clause, params) = where_clause(filter);
            let sql = format!("SELECT COUNT(*) FROM notifications{}", clause);
            let count: i64 =
                conn.query_row(&sql, rusqlite::params_from_iter(params.iter()), |row| row.get(0))?;
            Ok(count as u64)
        })
    }
}

fn where_clause(filter: &RowFilter) -> (String, Vec<Value>) {
    let mut conditions: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    if let Some(recipient_id) = &filter.recipient_id {
        conditions.push("recipient_id = ?".to_string());
        params.push(Value::Text(recipient_id.clone()));
    }

    if let Some(read) = filter.read {
        conditions.push("read = ?".to_string());
        params.push(Value::Integer(read as i64));
    }

    if let Some(kinds) = &filter.kinds {
        if kinds.is_empty() {
            // An empty type set matches nothing
            conditions.push("0".to_string());
        } else {
            let placeholders = vec!["?"; kinds.len()].join(", ");
            conditions.push(format!("kind IN ({})", placeholders));
            params.extend(kinds.iter().map(|k| Value::Text(k.clone())));
        }
    }

    if conditions.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), params)
    }
}

fn query_notification_by_id(conn: &Connection, id: &str) -> Result<Option<NotificationRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM notifications WHERE id = ?1", COLUMNS))?;
    let row = stmt.query_row([id], map_row).optional()?;
    Ok(row)
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        recipient_id: row.get(1)?,
        sender_id: row.get(2)?,
        kind: row.get(3)?,
        title: row.get(4)?,
        message: row.get(5)?,
        data: row.get(6)?,
        action_url: row.get(7)?,
        priority: row.get(8)?,
        read: row.get(9)?,
        read_at: row.get(10)?,
        archived: row.get(11)?,
        created_at: row.get(12)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, recipient: &str, kind: &str, created_at: &str) -> NotificationRow {
        NotificationRow {
            id: id.into(),
            recipient_id: recipient.into(),
            sender_id: None,
            kind: kind.into(),
            title: "title".into(),
            message: "message".into(),
            data: None,
            action_url: None,
            priority: "normal".into(),
            read: false,
            read_at: None,
            archived: false,
            created_at: created_at.into(),
        }
    }

    #[test]
    fn query_filters_and_orders_newest_first() {
        let db = Database::open_in_memory().unwrap();
        db.insert_notification(&row("a", "u1", "course_update", "2026-01-01T00:00:00.000000Z")).unwrap();
        db.insert_notification(&row("b", "u1", "new_message", "2026-01-02T00:00:00.000000Z")).unwrap();
        db.insert_notification(&row("c", "u2", "new_message", "2026-01-03T00:00:00.000000Z")).unwrap();

        let filter = RowFilter {
            recipient_id: Some("u1".into()),
            ..Default::default()
        };
        let rows = db.query_notifications(&filter, true, None).unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let filter = RowFilter {
            kinds: Some(vec!["new_message".into()]),
            ..Default::default()
        };
        assert_eq!(db.count_notifications(&filter).unwrap(), 2);

        let filter = RowFilter {
            kinds: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(db.count_notifications(&filter).unwrap(), 0);
    }

    #[test]
    fn equal_timestamps_fall_back_to_insertion_order() {
        let db = Database::open_in_memory().unwrap();
        let ts = "2026-01-01T00:00:00.000000Z";
        db.insert_notification(&row("first", "u1", "new_message", ts)).unwrap();
        db.insert_notification(&row("second", "u1", "new_message", ts)).unwrap();

        let rows = db.query_notifications(&RowFilter::default(), true, Some(1)).unwrap();
        assert_eq!(rows[0].id, "second");
    }

    #[test]
    fn read_at_is_only_set_once() {
        let db = Database::open_in_memory().unwrap();
        db.insert_notification(&row("a", "u1", "new_message", "2026-01-01T00:00:00.000000Z")).unwrap();

        let first = db.update_notification("a", Some("2026-02-01T00:00:00.000000Z"), None).unwrap();
        assert_eq!(first, Some(("u1".to_string(), true)));

        let second = db.update_notification("a", Some("2026-03-01T00:00:00.000000Z"), None).unwrap();
        assert_eq!(second, Some(("u1".to_string(), false)));

        let stored = db.get_notification("a").unwrap().unwrap();
        assert!(stored.read);
        assert_eq!(stored.read_at.as_deref(), Some("2026-02-01T00:00:00.000000Z"));

        assert_eq!(db.update_notification("missing", Some("x"), None).unwrap(), None);
    }

    #[test]
    fn delete_returns_recipient() {
        let db = Database::open_in_memory().unwrap();
        db.insert_notification(&row("a", "u1", "new_message", "2026-01-01T00:00:00.000000Z")).unwrap();

        assert_eq!(db.delete_notification("a").unwrap().as_deref(), Some("u1"));
        assert_eq!(db.delete_notification("a").unwrap(), None);
        assert!(db.get_notification("a").unwrap().is_none());
    }
}
