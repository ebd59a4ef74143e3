//! Time window evaluation for block rules.
//!
//! A rule without a schedule blocks at all times. A scheduled rule is active
//! when the wall-clock minute falls inside its window *and* the calendar day
//! is eligible under its recurrence.

use crate::constants::MINUTES_PER_DAY;
use crate::error::RuleError;
use crate::validation::parse_time_of_day;
use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};

/// Day-granularity gate applied on top of the time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurrence {
    Daily,
    /// Eligible on Mondays only.
    Weekly,
    /// Eligible on the 1st of the month only.
    Monthly,
    /// No restriction; behaves like `Daily`.
    None,
}

impl Recurrence {
    pub fn as_str(self) -> &'static str {
        match self {
            Recurrence::Daily => "DAILY",
            Recurrence::Weekly => "WEEKLY",
            Recurrence::Monthly => "MONTHLY",
            Recurrence::None => "NONE",
        }
    }

    /// Parse a stored recurrence. Unknown spellings are unrestricted.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Recurrence::Daily,
            "WEEKLY" => Recurrence::Weekly,
            "MONTHLY" => Recurrence::Monthly,
            _ => Recurrence::None,
        }
    }

    /// Whether the calendar day of `now` is eligible.
    pub fn is_eligible(self, now: &NaiveDateTime) -> bool {
        match self {
            Recurrence::Daily | Recurrence::None => true,
            Recurrence::Weekly => now.weekday() == Weekday::Mon,
            Recurrence::Monthly => now.day() == 1,
        }
    }
}

/// Minute-of-day range, inclusive at both ends.
///
/// `from > to` means the window wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    from: u16,
    to: u16,
}

impl TimeWindow {
    pub fn new(from: u16, to: u16) -> Result<Self, String> {
        if from >= MINUTES_PER_DAY || to >= MINUTES_PER_DAY {
            return Err(format!(
                "window bounds must be below {MINUTES_PER_DAY}, got {from}..{to}"
            ));
        }
        Ok(Self { from, to })
    }

    /// Build a window from two `HH:MM` strings.
    pub fn parse(from: &str, to: &str) -> Result<Self, String> {
        let from = parse_time_of_day(from).map_err(|e| e.to_string())?;
        let to = parse_time_of_day(to).map_err(|e| e.to_string())?;
        Self::new(from, to)
    }

    pub fn from(self) -> u16 {
        self.from
    }

    pub fn to(self) -> u16 {
        self.to
    }

    pub fn spans_midnight(self) -> bool {
        self.from > self.to
    }

    pub fn contains(self, minute_of_day: u16) -> bool {
        if self.spans_midnight() {
            minute_of_day >= self.from || minute_of_day <= self.to
        } else {
            self.from <= minute_of_day && minute_of_day <= self.to
        }
    }
}

/// A window and its recurrence. They are only ever set together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSchedule {
    pub window: TimeWindow,
    pub recurrence: Recurrence,
}

/// Which package to block, and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRule {
    pub package_id: String,
    pub schedule: Option<BlockSchedule>,
}

impl BlockRule {
    /// A rule that blocks whenever the package is in the foreground.
    pub fn always(package_id: &str) -> Self {
        Self {
            package_id: package_id.to_string(),
            schedule: None,
        }
    }

    pub fn scheduled(package_id: &str, window: TimeWindow, recurrence: Recurrence) -> Self {
        Self {
            package_id: package_id.to_string(),
            schedule: Some(BlockSchedule { window, recurrence }),
        }
    }

    /// Build a rule from its stored representation.
    ///
    /// All three schedule fields must be present, or all absent.
    pub fn from_parts(
        package_id: &str,
        from_time: Option<&str>,
        to_time: Option<&str>,
        repeat_mode: Option<&str>,
    ) -> Result<Self, RuleError> {
        fn present(s: Option<&str>) -> Option<&str> {
            s.map(str::trim).filter(|s| !s.is_empty())
        }

        match (present(from_time), present(to_time), present(repeat_mode)) {
            (None, None, None) => Ok(Self::always(package_id)),
            (Some(from), Some(to), Some(repeat)) => {
                let window = TimeWindow::parse(from, to)
                    .map_err(|reason| RuleError::malformed(package_id, reason))?;
                Ok(Self::scheduled(package_id, window, Recurrence::parse(repeat)))
            }
            _ => Err(RuleError::malformed(
                package_id,
                "time window and recurrence must be set together",
            )),
        }
    }
}

/// Minute of the day (`0..1440`) for a wall-clock timestamp.
pub fn minute_of_day(now: &NaiveDateTime) -> u16 {
    let minutes = now.hour() * 60 + now.minute();
    // hour < 24 and minute < 60, so this always fits.
    u16::try_from(minutes).unwrap_or(0)
}

/// Whether `rule` should block at wall-clock time `now`.
pub fn is_active(rule: &BlockRule, now: &NaiveDateTime) -> bool {
    match &rule.schedule {
        None => true,
        Some(schedule) => {
            schedule.window.contains(minute_of_day(now)) && schedule.recurrence.is_eligible(now)
        }
    }
}
