pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS blocked_apps (
    package_id TEXT PRIMARY KEY,
    app_name TEXT NOT NULL,
    blocked_at INTEGER NOT NULL,
    from_time TEXT,
    to_time TEXT,
    repeat_mode TEXT
);

CREATE INDEX IF NOT EXISTS idx_blocked_apps_blocked_at ON blocked_apps(blocked_at);
"#;
