//! Block actions: what actually happens when the engine decides to block.

use crate::error::DispatchError;
use crate::platform::{NativeTracker, PlatformTracker};
use log::{debug, info, warn};
use std::process::{Command, Stdio};
use std::thread;

pub trait BlockDispatcher {
    /// Redirect the user away from `package_id`. Must return promptly.
    fn dispatch_block(&self, package_id: &str) -> Result<(), DispatchError>;
}

/// Dry-run dispatcher: records the decision and does nothing else.
#[derive(Debug, Default)]
pub struct LogDispatcher;

impl BlockDispatcher for LogDispatcher {
    fn dispatch_block(&self, package_id: &str) -> Result<(), DispatchError> {
        info!("[dry-run] would block {package_id}");
        Ok(())
    }
}

/// Runs a user-supplied command with the package id appended.
///
/// The child is not waited on by the caller; a detached thread reaps it.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    program: String,
    args: Vec<String>,
}

impl CommandDispatcher {
    /// `argv` is the program followed by its leading arguments.
    pub fn new(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl BlockDispatcher for CommandDispatcher {
    fn dispatch_block(&self, package_id: &str) -> Result<(), DispatchError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(package_id)
            .stdin(Stdio::null())
            .spawn()?;

        let program = self.program.clone();
        thread::spawn(move || match child.wait() {
            Ok(status) if status.success() => debug!("{program} exited cleanly"),
            Ok(status) => warn!("{program} exited with {status}"),
            Err(e) => warn!("Failed to wait for {program}: {e}"),
        });

        Ok(())
    }
}

/// Minimizes the foreground window through the platform layer.
pub struct NativeDispatcher<P> {
    platform: P,
}

impl<P: PlatformTracker> NativeDispatcher<P> {
    pub fn new(platform: P) -> Self {
        Self { platform }
    }
}

impl<P: PlatformTracker> BlockDispatcher for NativeDispatcher<P> {
    fn dispatch_block(&self, package_id: &str) -> Result<(), DispatchError> {
        // The user may already have switched away; then there is nothing to do.
        match self.platform.foreground_app() {
            Some(app) if app.package_id == package_id => self.platform.minimize_foreground(),
            Some(_) | None => {
                debug!("{package_id} already left the foreground");
                Ok(())
            }
        }
    }
}

/// The dispatcher selected at startup.
pub enum Dispatcher {
    Log(LogDispatcher),
    Command(CommandDispatcher),
    Native(NativeDispatcher<NativeTracker>),
}

impl BlockDispatcher for Dispatcher {
    fn dispatch_block(&self, package_id: &str) -> Result<(), DispatchError> {
        match self {
            Dispatcher::Log(d) => d.dispatch_block(package_id),
            Dispatcher::Command(d) => d.dispatch_block(package_id),
            Dispatcher::Native(d) => d.dispatch_block(package_id),
        }
    }
}
