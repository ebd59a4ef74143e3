use crate::error::RuleError;
use crate::schedule::BlockRule;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use std::time::{SystemTime, UNIX_EPOCH};

/// A stored block rule with the display metadata the rule list shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedApp {
    pub package_id: String,
    pub app_name: String,
    pub blocked_at: i64,
    /// Window start in HH:MM format (24-hour).
    pub from_time: Option<String>,
    /// Window end in HH:MM format (24-hour).
    pub to_time: Option<String>,
    /// DAILY, WEEKLY or MONTHLY.
    pub repeat_mode: Option<String>,
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| i64::try_from(d.as_secs()).ok())
        .unwrap_or(0)
}

const COLUMNS: &str = "package_id, app_name, blocked_at, from_time, to_time, repeat_mode";

impl BlockedApp {
    /// Create a new unscheduled entry (not yet saved to database).
    pub fn new(package_id: &str, app_name: &str) -> Self {
        Self {
            package_id: package_id.to_string(),
            app_name: app_name.to_string(),
            blocked_at: current_timestamp(),
            from_time: None,
            to_time: None,
            repeat_mode: None,
        }
    }

    pub fn with_time_period(mut self, from: &str, to: &str, repeat: &str) -> Self {
        self.from_time = Some(from.to_string());
        self.to_time = Some(to.to_string());
        self.repeat_mode = Some(repeat.to_string());
        self
    }

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            package_id: row.get(0)?,
            app_name: row.get(1)?,
            blocked_at: row.get(2)?,
            from_time: row.get(3)?,
            to_time: row.get(4)?,
            repeat_mode: row.get(5)?,
        })
    }

    /// Insert or replace the entry keyed by package id.
    pub fn save(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO blocked_apps ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ),
            params![
                self.package_id,
                self.app_name,
                self.blocked_at,
                self.from_time,
                self.to_time,
                self.repeat_mode,
            ],
        )?;
        Ok(())
    }

    pub fn find_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM blocked_apps ORDER BY app_name"
        ))?;
        let rows = stmt.query_map([], Self::from_row)?;
        rows.collect()
    }

    pub fn find_by_package(conn: &Connection, package_id: &str) -> Result<Option<Self>> {
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM blocked_apps WHERE package_id = ?1"),
            params![package_id],
            Self::from_row,
        )
        .optional()
    }

    pub fn is_blocked(conn: &Connection, package_id: &str) -> Result<bool> {
        conn.query_row(
            "SELECT COUNT(*) > 0 FROM blocked_apps WHERE package_id = ?1",
            params![package_id],
            |row| row.get(0),
        )
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        conn.query_row("SELECT COUNT(*) FROM blocked_apps", [], |row| row.get(0))
    }

    /// Delete the entry for a package. Returns whether a row was removed.
    pub fn delete(conn: &Connection, package_id: &str) -> Result<bool> {
        let rows_affected = conn.execute(
            "DELETE FROM blocked_apps WHERE package_id = ?1",
            params![package_id],
        )?;
        Ok(rows_affected > 0)
    }

    pub fn delete_all(conn: &Connection) -> Result<usize> {
        conn.execute("DELETE FROM blocked_apps", [])
    }

    /// Set or clear the time period of one package. Returns whether it exists.
    pub fn set_time_period(
        conn: &Connection,
        package_id: &str,
        from: Option<&str>,
        to: Option<&str>,
        repeat: Option<&str>,
    ) -> Result<bool> {
        let rows_affected = conn.execute(
            "UPDATE blocked_apps SET from_time = ?1, to_time = ?2, repeat_mode = ?3
             WHERE package_id = ?4",
            params![from, to, repeat, package_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Apply one time period to every blocked package in a single transaction.
    pub fn set_time_period_for_all(
        conn: &Connection,
        from: Option<&str>,
        to: Option<&str>,
        repeat: Option<&str>,
    ) -> Result<usize> {
        let tx = conn.unchecked_transaction()?;
        let rows_affected = tx.execute(
            "UPDATE blocked_apps SET from_time = ?1, to_time = ?2, repeat_mode = ?3",
            params![from, to, repeat],
        )?;
        tx.commit()?;
        Ok(rows_affected)
    }

    /// Convert to a validated rule for evaluation.
    pub fn to_rule(&self) -> std::result::Result<BlockRule, RuleError> {
        BlockRule::from_parts(
            &self.package_id,
            self.from_time.as_deref(),
            self.to_time.as_deref(),
            self.repeat_mode.as_deref(),
        )
    }
}
