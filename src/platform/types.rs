use crate::error::DispatchError;

/// The application currently owning the foreground window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForegroundApp {
    pub package_id: String,
}

pub trait PlatformTracker: Send + Sync {
    fn foreground_app(&self) -> Option<ForegroundApp>;

    /// Push the foreground window out of the user's way.
    fn minimize_foreground(&self) -> Result<(), DispatchError>;
}
