// src/constants.rs

use std::time::Duration;

/// Minutes in one day (24 * 60). Window bounds live in `[0, MINUTES_PER_DAY)`.
pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Minimum interval between two block actions for the same package.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(2);

/// How often the watcher samples the foreground window.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How often an unchanged foreground package is reported again.
pub const DEFAULT_RENOTIFY_INTERVAL: Duration = Duration::from_secs(2);

/// Identity the engine exempts as its own.
pub const SELF_PACKAGE_ID: &str = "ultrafocus";

/// Desktop shells that own the "home" surface and are never blocked.
pub const SYSTEM_SHELL_IDS: &[&str] = &["gnome-shell", "plasmashell"];

/// Maximum package identifier length
pub const MAX_PACKAGE_ID_LEN: usize = 255;

/// Maximum display name length
pub const MAX_APP_NAME_LEN: usize = 100;
