//! Where the engine gets its rules from.
//!
//! The engine only ever reads rules. Sources hand out immutable snapshots, so
//! a rule update published mid-stream never tears an evaluation.

use crate::db::Database;
use crate::error::RuleError;
use crate::models::BlockedApp;
use crate::safe_lock;
use crate::schedule::BlockRule;
use log::{info, warn};
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub trait RuleSource {
    /// Rule for `package_id`, if one is configured.
    fn lookup(&self, package_id: &str) -> Result<Option<BlockRule>, RuleError>;
}

/// Immutable set of rules keyed by package id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: HashMap<String, BlockRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from the stored rules. Malformed rows are skipped.
    pub fn load(conn: &Connection) -> rusqlite::Result<Self> {
        let mut set = Self::new();
        for app in BlockedApp::find_all(conn)? {
            match app.to_rule() {
                Ok(rule) => {
                    set.insert(rule);
                }
                Err(e) => warn!("Skipping stored rule: {e}"),
            }
        }
        Ok(set)
    }

    /// Add or replace the rule for its package. Returns the previous rule.
    pub fn insert(&mut self, rule: BlockRule) -> Option<BlockRule> {
        self.rules.insert(rule.package_id.clone(), rule)
    }

    pub fn remove(&mut self, package_id: &str) -> Option<BlockRule> {
        self.rules.remove(package_id)
    }

    pub fn get(&self, package_id: &str) -> Option<&BlockRule> {
        self.rules.get(package_id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromIterator<BlockRule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = BlockRule>>(iter: I) -> Self {
        let mut set = Self::new();
        for rule in iter {
            set.insert(rule);
        }
        set
    }
}

impl RuleSource for RuleSet {
    fn lookup(&self, package_id: &str) -> Result<Option<BlockRule>, RuleError> {
        Ok(self.get(package_id).cloned())
    }
}

struct SnapshotState {
    db: Database,
    data_version: i64,
    snapshot: Arc<RuleSet>,
}

/// Rules backed by the SQLite store.
///
/// The snapshot is rebuilt whenever another connection (the CLI, for
/// example) commits to the database.
pub struct SqliteRuleSource {
    state: Mutex<SnapshotState>,
}

impl SqliteRuleSource {
    pub fn new(db: Database) -> rusqlite::Result<Self> {
        let data_version = db.data_version()?;
        let snapshot = Arc::new(RuleSet::load(db.connection())?);
        info!("Loaded {} block rules", snapshot.len());

        Ok(Self {
            state: Mutex::new(SnapshotState {
                db,
                data_version,
                snapshot,
            }),
        })
    }

    /// The current snapshot, reloaded first if the store changed.
    pub fn snapshot(&self) -> Result<Arc<RuleSet>, RuleError> {
        let mut state = safe_lock(&self.state, "Rule snapshot");

        let version = state.db.data_version()?;
        if version != state.data_version {
            let snapshot = RuleSet::load(state.db.connection())?;
            info!("Block rules changed, reloaded {} rules", snapshot.len());
            state.snapshot = Arc::new(snapshot);
            state.data_version = version;
        }

        Ok(Arc::clone(&state.snapshot))
    }

    /// Rebuild the snapshot unconditionally.
    pub fn reload(&self) -> Result<Arc<RuleSet>, RuleError> {
        let mut state = safe_lock(&self.state, "Rule snapshot");
        let snapshot = Arc::new(RuleSet::load(state.db.connection())?);
        state.data_version = state.db.data_version()?;
        state.snapshot = Arc::clone(&snapshot);
        Ok(snapshot)
    }
}

impl RuleSource for SqliteRuleSource {
    fn lookup(&self, package_id: &str) -> Result<Option<BlockRule>, RuleError> {
        Ok(self.snapshot()?.get(package_id).cloned())
    }
}
