pub mod types;

pub use types::{ForegroundApp, PlatformTracker};

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "linux")]
pub use linux::LinuxTracker as NativeTracker;

#[cfg(not(target_os = "linux"))]
use crate::error::DispatchError;

/// Fallback for platforms without a foreground backend. Never reports an app.
#[cfg(not(target_os = "linux"))]
#[derive(Debug, Default)]
pub struct NativeTracker;

#[cfg(not(target_os = "linux"))]
impl NativeTracker {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(target_os = "linux"))]
impl PlatformTracker for NativeTracker {
    fn foreground_app(&self) -> Option<ForegroundApp> {
        None
    }

    fn minimize_foreground(&self) -> Result<(), DispatchError> {
        Err(DispatchError::Unsupported)
    }
}
