pub mod blocked_app;

pub use blocked_app::BlockedApp;
