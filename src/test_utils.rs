//! Fixtures shared by the unit tests.

#![cfg(test)]

use crate::db::Database;
use tempfile::{tempdir, TempDir};

/// Fresh rule database in a temp dir. Keep the `TempDir` alive while the
/// database is in use.
pub fn setup_test_db() -> (Database, TempDir) {
    let dir = tempdir().expect("temp dir for rule db");
    let db = Database::open_and_migrate(&dir.path().join("rules.db")).expect("open rule db");
    (db, dir)
}
