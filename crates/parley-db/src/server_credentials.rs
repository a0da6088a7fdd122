use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The stored login for one chat server. `credential_value` is opaque to this
/// crate; the auth layer decides how it is encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCredential {
    pub server_url: String,
    pub credential_value: String,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

pub struct ServerCredentials<'conn> {
    pub(crate) conn: &'conn mut Connection,
}

impl ServerCredentials<'_> {
    pub fn get(&self, server_url: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT credential_value
                 FROM server_credentials
                 WHERE server_url = ?1",
                params![server_url],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn get_record(&self, server_url: &str) -> Result<Option<ServerCredential>> {
        self.conn
            .query_row(
                "SELECT server_url, credential_value, user_id, username,
                        created_at_ms, updated_at_ms
                 FROM server_credentials
                 WHERE server_url = ?1",
                params![server_url],
                credential_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn upsert(
        &mut self,
        server_url: &str,
        credential_value: &str,
        user_id: Option<i64>,
        username: Option<&str>,
    ) -> Result<()> {
        let now = now_ms();
        self.conn.execute(
            "INSERT INTO server_credentials (
                server_url, credential_value, user_id, username, created_at_ms, updated_at_ms
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(server_url) DO UPDATE SET
                credential_value = excluded.credential_value,
                user_id = excluded.user_id,
                username = excluded.username,
                updated_at_ms = excluded.updated_at_ms",
            params![server_url, credential_value, user_id, username, now, now],
        )?;
        Ok(())
    }

    /// Returns whether a row was removed.
    pub fn delete(&mut self, server_url: &str) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM server_credentials WHERE server_url = ?1",
            params![server_url],
        )?;
        Ok(removed > 0)
    }
}

fn credential_from_row(row: &Row<'_>) -> rusqlite::Result<ServerCredential> {
    Ok(ServerCredential {
        server_url: row.get(0)?,
        credential_value: row.get(1)?,
        user_id: row.get(2)?,
        username: row.get(3)?,
        created_at_ms: row.get(4)?,
        updated_at_ms: row.get(5)?,
    })
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
