// Rule management operations behind the CLI.

use crate::error::AppError;
use crate::models::BlockedApp;
use crate::schedule::is_active;
use crate::validation::{
    validate_app_name, validate_package_id, validate_repeat_mode, validate_time_period,
};
use chrono::NaiveDateTime;
use log::info;
use rusqlite::Connection;

/// A time window plus recurrence as entered by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimePeriod {
    pub from: String,
    pub to: String,
    pub repeat: String,
}

impl TimePeriod {
    pub fn new(from: &str, to: &str, repeat: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            repeat: repeat.to_string(),
        }
    }

    /// Validate and normalize the repeat spelling.
    fn validated(&self) -> Result<Self, AppError> {
        validate_time_period(
            Some(self.from.as_str()),
            Some(self.to.as_str()),
            Some(self.repeat.as_str()),
        )?;
        Ok(Self {
            from: self.from.clone(),
            to: self.to.clone(),
            repeat: validate_repeat_mode(&self.repeat)?.to_string(),
        })
    }
}

fn split_period(period: Option<&TimePeriod>) -> (Option<&str>, Option<&str>, Option<&str>) {
    match period {
        Some(p) => (Some(p.from.as_str()), Some(p.to.as_str()), Some(p.repeat.as_str())),
        None => (None, None, None),
    }
}

/// Add or replace the block rule for a package.
pub fn block_app(
    conn: &Connection,
    package_id: &str,
    app_name: Option<&str>,
    period: Option<&TimePeriod>,
) -> Result<BlockedApp, AppError> {
    let package_id = validate_package_id(package_id)?;
    let app_name = validate_app_name(app_name.unwrap_or(package_id.as_str()))?;
    let period = period.map(TimePeriod::validated).transpose()?;

    let mut app = BlockedApp::new(&package_id, app_name);
    if let Some(p) = &period {
        app = app.with_time_period(&p.from, &p.to, &p.repeat);
    }
    app.save(conn)?;

    info!("Blocking {package_id}");
    Ok(app)
}

pub fn unblock_app(conn: &Connection, package_id: &str) -> Result<(), AppError> {
    let package_id = validate_package_id(package_id)?;
    if !BlockedApp::delete(conn, &package_id)? {
        return Err(AppError::NotFound { entity: "Blocked app" });
    }
    info!("Unblocked {package_id}");
    Ok(())
}

pub fn list_apps(conn: &Connection) -> Result<Vec<BlockedApp>, AppError> {
    Ok(BlockedApp::find_all(conn)?)
}

/// Set or clear the time period of one package, or of every package when
/// `package_id` is `None`. Returns the number of rules changed.
pub fn set_time_period(
    conn: &Connection,
    package_id: Option<&str>,
    period: Option<&TimePeriod>,
) -> Result<usize, AppError> {
    let period = period.map(TimePeriod::validated).transpose()?;
    let (from, to, repeat) = split_period(period.as_ref());

    match package_id {
        Some(package_id) => {
            let package_id = validate_package_id(package_id)?;
            if BlockedApp::set_time_period(conn, &package_id, from, to, repeat)? {
                Ok(1)
            } else {
                Err(AppError::NotFound { entity: "Blocked app" })
            }
        }
        None => Ok(BlockedApp::set_time_period_for_all(conn, from, to, repeat)?),
    }
}

pub fn clear_all(conn: &Connection) -> Result<usize, AppError> {
    let removed = BlockedApp::delete_all(conn)?;
    info!("Removed {removed} block rules");
    Ok(removed)
}

/// Whether the stored rule for `package_id` would block at `at`.
pub fn check_app(
    conn: &Connection,
    package_id: &str,
    at: &NaiveDateTime,
) -> Result<bool, AppError> {
    let package_id = validate_package_id(package_id)?;
    let app = BlockedApp::find_by_package(conn, &package_id)?
        .ok_or(AppError::NotFound { entity: "Blocked app" })?;
    let rule = app.to_rule().map_err(|e| AppError::InvalidInput {
        field: "rule",
        reason: e.to_string(),
    })?;
    Ok(is_active(&rule, at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::LogDispatcher;
    use crate::engine::{BlockEngine, EngineConfig, ForegroundEvent, Outcome};
    use crate::rules::RuleSet;
    use crate::test_utils::setup_test_db;
    use chrono::NaiveDate;
    use std::time::Instant;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_block_app_defaults_name_to_package() {
        let (db, _dir) = setup_test_db();
        let app = block_app(db.connection(), " steam ", None, None).unwrap();
        assert_eq!(app.package_id, "steam");
        assert_eq!(app.app_name, "steam");
        assert!(app.from_time.is_none());
    }

    #[test]
    fn test_block_app_matches_tracker_package_case() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();

        let app = block_app(conn, "Steam", Some("Steam"), None).unwrap();
        assert_eq!(app.package_id, "steam");
        assert_eq!(app.app_name, "Steam");
        assert!(check_app(conn, "STEAM", &at(3, 12, 0)).unwrap());

        let mut engine = BlockEngine::new(
            EngineConfig::default(),
            RuleSet::load(conn).unwrap(),
            LogDispatcher,
        );
        let event = ForegroundEvent::new("steam", at(3, 12, 0), Instant::now());
        assert_eq!(engine.on_foreground_event(&event), Outcome::Blocked);

        unblock_app(conn, "STEAM").unwrap();
        assert!(list_apps(conn).unwrap().is_empty());
    }

    #[test]
    fn test_block_app_normalizes_repeat() {
        let (db, _dir) = setup_test_db();
        let period = TimePeriod::new("08:00", "17:00", "weekly");
        let app = block_app(db.connection(), "steam", Some("Steam"), Some(&period)).unwrap();
        assert_eq!(app.repeat_mode.as_deref(), Some("WEEKLY"));
    }

    #[test]
    fn test_block_app_rejects_invalid_input() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();

        assert!(block_app(conn, "", None, None).is_err());
        let bad = TimePeriod::new("8:00", "17:00", "DAILY");
        assert!(block_app(conn, "steam", None, Some(&bad)).is_err());
        assert_eq!(BlockedApp::count(conn).unwrap(), 0);
    }

    #[test]
    fn test_unblock_app() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();

        block_app(conn, "steam", None, None).unwrap();
        unblock_app(conn, "steam").unwrap();
        assert!(list_apps(conn).unwrap().is_empty());

        assert!(matches!(
            unblock_app(conn, "steam"),
            Err(AppError::NotFound { .. })
        ));
    }

    #[test]
    fn test_set_time_period_for_one_and_all() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();

        block_app(conn, "a", None, None).unwrap();
        block_app(conn, "b", None, None).unwrap();

        let evening = TimePeriod::new("18:00", "23:00", "DAILY");
        assert_eq!(set_time_period(conn, Some("a"), Some(&evening)).unwrap(), 1);
        assert!(!check_app(conn, "a", &at(3, 12, 0)).unwrap());
        assert!(check_app(conn, "b", &at(3, 12, 0)).unwrap());

        let night = TimePeriod::new("22:00", "06:00", "daily");
        assert_eq!(set_time_period(conn, None, Some(&night)).unwrap(), 2);
        assert!(check_app(conn, "b", &at(3, 23, 0)).unwrap());
        assert!(!check_app(conn, "b", &at(3, 12, 0)).unwrap());

        assert_eq!(set_time_period(conn, None, None).unwrap(), 2);
        assert!(check_app(conn, "a", &at(3, 12, 0)).unwrap());

        assert!(matches!(
            set_time_period(conn, Some("zzz"), None),
            Err(AppError::NotFound { .. })
        ));
    }

    #[test]
    fn test_check_app_monthly() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();

        let period = TimePeriod::new("00:00", "23:59", "MONTHLY");
        block_app(conn, "steam", None, Some(&period)).unwrap();

        assert!(check_app(conn, "steam", &at(1, 10, 0)).unwrap());
        assert!(!check_app(conn, "steam", &at(2, 10, 0)).unwrap());
    }

    #[test]
    fn test_check_app_unknown_package() {
        let (db, _dir) = setup_test_db();
        assert!(matches!(
            check_app(db.connection(), "steam", &at(1, 10, 0)),
            Err(AppError::NotFound { .. })
        ));
    }

    #[test]
    fn test_clear_all() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();

        block_app(conn, "a", None, None).unwrap();
        block_app(conn, "b", None, None).unwrap();
        assert_eq!(clear_all(conn).unwrap(), 2);
        assert!(list_apps(conn).unwrap().is_empty());
    }
}
