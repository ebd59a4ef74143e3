use crate::constants::{MAX_APP_NAME_LEN, MAX_PACKAGE_ID_LEN};
use crate::error::AppError;

/// Parse a `HH:MM` (24-hour) time into a minute of the day.
pub fn parse_time_of_day(time: &str) -> Result<u16, AppError> {
    let err = |reason: &str| AppError::InvalidInput {
        field: "time",
        reason: reason.into(),
    };

    let (hours, minutes) = time
        .split_once(':')
        .filter(|(h, m)| {
            [h, m]
                .iter()
                .all(|part| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit()))
        })
        .ok_or_else(|| err("must be in HH:MM format"))?;

    let hours: u16 = hours.parse().map_err(|_| err("invalid hours"))?;
    let minutes: u16 = minutes.parse().map_err(|_| err("invalid minutes"))?;

    if hours >= 24 {
        return Err(err("hours must be 00-23"));
    }
    if minutes >= 60 {
        return Err(err("minutes must be 00-59"));
    }

    Ok(hours * 60 + minutes)
}

/// Validate time format (HH:MM, 24-hour format).
pub fn validate_time_format(time: &str) -> Result<(), AppError> {
    parse_time_of_day(time).map(|_| ())
}

/// Validate a package identifier and return it trimmed and lowercased, the
/// form the foreground tracker reports.
pub fn validate_package_id(package_id: &str) -> Result<String, AppError> {
    let package_id = package_id.trim();
    if package_id.is_empty() {
        return Err(AppError::InvalidInput {
            field: "package",
            reason: "cannot be empty".into(),
        });
    }
    if package_id.len() > MAX_PACKAGE_ID_LEN {
        return Err(AppError::InvalidInput {
            field: "package",
            reason: format!("cannot exceed {MAX_PACKAGE_ID_LEN} characters"),
        });
    }
    if package_id.chars().any(char::is_whitespace) {
        return Err(AppError::InvalidInput {
            field: "package",
            reason: "cannot contain whitespace".into(),
        });
    }
    Ok(package_id.to_lowercase())
}

/// Validate an application display name.
pub fn validate_app_name(name: &str) -> Result<&str, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidInput {
            field: "name",
            reason: "cannot be empty".into(),
        });
    }
    if name.len() > MAX_APP_NAME_LEN {
        return Err(AppError::InvalidInput {
            field: "name",
            reason: format!("cannot exceed {MAX_APP_NAME_LEN} characters"),
        });
    }
    Ok(name)
}

/// Validate a repeat mode (DAILY, WEEKLY or MONTHLY) and return its stored spelling.
pub fn validate_repeat_mode(repeat: &str) -> Result<&'static str, AppError> {
    match repeat.trim().to_ascii_uppercase().as_str() {
        "DAILY" => Ok("DAILY"),
        "WEEKLY" => Ok("WEEKLY"),
        "MONTHLY" => Ok("MONTHLY"),
        other => Err(AppError::InvalidInput {
            field: "repeat",
            reason: format!("must be DAILY, WEEKLY or MONTHLY, got '{other}'"),
        }),
    }
}

/// Validate a time period: from, to and repeat are all set or all absent.
pub fn validate_time_period(
    from: Option<&str>,
    to: Option<&str>,
    repeat: Option<&str>,
) -> Result<(), AppError> {
    match (from, to, repeat) {
        (None, None, None) => Ok(()),
        (Some(from), Some(to), Some(repeat)) => {
            validate_time_format(from)?;
            validate_time_format(to)?;
            validate_repeat_mode(repeat)?;
            Ok(())
        }
        _ => Err(AppError::InvalidInput {
            field: "period",
            reason: "from, to and repeat must be given together".into(),
        }),
    }
}
