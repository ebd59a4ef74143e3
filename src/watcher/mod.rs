use crate::constants::{DEFAULT_POLL_INTERVAL, DEFAULT_RENOTIFY_INTERVAL};
use crate::engine::ForegroundEvent;
use crate::platform::PlatformTracker;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherConfig {
    pub poll_interval: Duration,
    /// Report an unchanged foreground package again after this long.
    pub renotify_interval: Option<Duration>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            renotify_interval: Some(DEFAULT_RENOTIFY_INTERVAL),
        }
    }
}

/// Turns foreground samples into change events.
#[derive(Debug)]
struct ChangeDetector {
    renotify_interval: Option<Duration>,
    last: Option<(String, Instant)>,
}

impl ChangeDetector {
    fn new(renotify_interval: Option<Duration>) -> Self {
        Self {
            renotify_interval,
            last: None,
        }
    }

    /// Whether the sample should be reported as a foreground event.
    fn should_emit(&mut self, package_id: &str, now: Instant) -> bool {
        let emit = match (&self.last, self.renotify_interval) {
            (Some((last, _)), _) if last != package_id => true,
            (Some((_, sent_at)), Some(interval)) => {
                now.saturating_duration_since(*sent_at) >= interval
            }
            (Some(_), None) => false,
            (None, _) => true,
        };
        if emit {
            self.last = Some((package_id.to_string(), now));
        }
        emit
    }

    fn clear(&mut self) {
        self.last = None;
    }
}

/// Stops a running watcher from another thread.
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.stop_handle().stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
        }
    }
}

/// Polls the platform on a background thread and feeds foreground changes
/// into a channel.
pub struct ForegroundWatcher<P> {
    config: WatcherConfig,
    running: Arc<AtomicBool>,
    platform: Arc<P>,
}

impl<P: PlatformTracker + 'static> ForegroundWatcher<P> {
    pub fn new(platform: P, config: WatcherConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            platform: Arc::new(platform),
        }
    }

    /// Start polling. The thread exits on `stop()` or when the receiver is dropped.
    pub fn start(&self, events: Sender<ForegroundEvent>) -> thread::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let platform = Arc::clone(&self.platform);
        let config = self.config;

        thread::spawn(move || {
            info!("Foreground watcher started ({:?} poll)", config.poll_interval);
            let mut detector = ChangeDetector::new(config.renotify_interval);

            while running.load(Ordering::SeqCst) {
                match platform.foreground_app() {
                    Some(app) => {
                        let event = ForegroundEvent::now(&app.package_id);
                        if detector.should_emit(&app.package_id, event.at) {
                            debug!("Foreground is now {}", app.package_id);
                            if events.send(event).is_err() {
                                debug!("Event receiver dropped, stopping watcher");
                                break;
                            }
                        }
                    }
                    None => detector.clear(),
                }

                thread::sleep(config.poll_interval);
            }

            running.store(false, Ordering::SeqCst);
            info!("Foreground watcher stopped");
        })
    }

    pub fn stop(&self) {
        self.stop_handle().stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
