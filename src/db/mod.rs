pub mod migrations;
pub mod schema;

use rusqlite::{Connection, Result};
use std::path::Path;

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// Open the database and bring its schema up to date.
    pub fn open_and_migrate(path: &Path) -> Result<Self> {
        let db = Self::open(path)?;
        migrations::run(db.connection())?;
        Ok(db)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Counter that changes whenever another connection commits to this file.
    pub fn data_version(&self) -> Result<i64> {
        self.conn
            .query_row("PRAGMA data_version", [], |row| row.get(0))
    }
}
