use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use crate::error::Result;
use crate::migration;
use crate::server_credentials::ServerCredentials;

/// `parley login` may run while a chat session holds the file.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Local client state, one SQLite file per user data directory.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Self::migrated(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::migrated(Connection::open_in_memory()?)
    }

    fn migrated(mut conn: Connection) -> Result<Self> {
        migration::apply(&mut conn)?;
        Ok(Self { conn })
    }

    pub fn server_credentials(&mut self) -> ServerCredentials<'_> {
        ServerCredentials {
            conn: &mut self.conn,
        }
    }
}
