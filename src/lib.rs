pub mod activation;
pub mod commands;
pub mod config;
pub mod constants;
pub mod db;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod models;
pub mod platform;
pub mod rules;
pub mod schedule;
pub mod shutdown;
#[cfg(test)]
mod test_utils;
pub mod validation;
pub mod watcher;

use crate::config::Config;
use crate::db::Database;
use crate::dispatch::{
    BlockDispatcher, CommandDispatcher, Dispatcher, LogDispatcher, NativeDispatcher,
};
use crate::engine::{BlockEngine, EngineStats};
use crate::error::AppError;
use crate::platform::{NativeTracker, PlatformTracker};
use crate::rules::{RuleSource, SqliteRuleSource};
use crate::watcher::{ForegroundWatcher, StopHandle};
use log::{info, warn};
use std::sync::{mpsc, Mutex, MutexGuard};
use std::thread;

/// Lock a mutex, recovering from poisoning if necessary
pub(crate) fn safe_lock<'a, T>(mutex: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("{context} mutex was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

fn build_dispatcher(config: &Config, dry_run: bool) -> Dispatcher {
    if dry_run {
        info!("Dry run: block actions are only logged");
        return Dispatcher::Log(LogDispatcher);
    }
    match config.redirect_command.as_deref().and_then(CommandDispatcher::new) {
        Some(command) => Dispatcher::Command(command),
        None => Dispatcher::Native(NativeDispatcher::new(NativeTracker::new())),
    }
}

/// Feed `engine` from `watcher` until the watcher stops.
///
/// `on_start` gets a handle that stops the watcher, once its thread is running.
pub fn drive<R, D, P>(
    engine: &mut BlockEngine<R, D>,
    watcher: &ForegroundWatcher<P>,
    on_start: impl FnOnce(StopHandle),
) -> Result<EngineStats, AppError>
where
    R: RuleSource,
    D: BlockDispatcher,
    P: PlatformTracker + 'static,
{
    let (tx, rx) = mpsc::channel();
    let handle = watcher.start(tx);
    on_start(watcher.stop_handle());

    let stats = engine.run(&rx);

    handle
        .join()
        .map_err(|_| AppError::Internal("foreground watcher panicked".into()))?;
    Ok(stats)
}

/// Watch the foreground and block according to the stored rules.
///
/// Blocks the calling thread until SIGINT or SIGTERM.
pub fn run(config: &Config, dry_run: bool) -> Result<EngineStats, AppError> {
    let db_path = config.database_path()?;
    info!("Using rule database {}", db_path.display());
    let db = Database::open_and_migrate(&db_path)?;
    let rules = SqliteRuleSource::new(db)?;

    let dispatcher = build_dispatcher(config, dry_run);
    let mut engine = BlockEngine::new(config.engine_config(), rules, dispatcher);
    let watcher = ForegroundWatcher::new(NativeTracker::new(), config.watcher_config());

    drive(&mut engine, &watcher, |stop| {
        thread::spawn(move || match shutdown::wait_for_signal() {
            Ok(()) => {
                info!("Shutdown requested, stopping foreground watcher");
                stop.stop();
            }
            Err(e) => warn!("Cannot listen for shutdown signals: {e}"),
        });
    })
}
