use rusqlite::{params, Connection};

use crate::db::{now, StoreError};
use crate::record::action::{Action, RecordKind};

/// Log that a record of `kind` was created on behalf of `user_id`
pub fn record_action(conn: &Connection, user_id: i64, kind: RecordKind, detail: &str) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO action (user_id, action_type, action_detail, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, kind.code(), detail, now()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// A user's actions, newest first
pub fn user_actions(conn: &Connection, user_id: i64) -> Result<Vec<Action>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, action_type, action_detail, created_at FROM action WHERE user_id = ?1 ORDER BY id DESC",
    )?;
    let rows = stmt.query_map([user_id], |row| {
        let code: String = row.get(2)?;
        Ok(Action {
            id: row.get(0)?,
            user_id: row.get(1)?,
            action_type: RecordKind::from_code(&code)
                .map(|kind| kind.label().to_string())
                .unwrap_or(code),
            action_detail: row.get(3)?,
            created_at: row.get(4)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<Action>>>()?)
}
