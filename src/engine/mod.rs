//! The blocking decision loop.
//!
//! Foreground events are consumed one at a time in arrival order. For each
//! event the rule is looked up, evaluated against the wall clock, and fed to
//! the package's activation state. A resulting block is dispatched before
//! the next event is read.

use crate::activation::{ActivationTable, Phase, Transition};
use crate::constants::{DEFAULT_COOLDOWN, SELF_PACKAGE_ID, SYSTEM_SHELL_IDS};
use crate::dispatch::BlockDispatcher;
use crate::rules::RuleSource;
use crate::schedule::is_active;
use chrono::{Local, NaiveDateTime};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

/// "The foreground application changed to `package_id`."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundEvent {
    pub package_id: String,
    /// Local wall-clock time, used for window matching.
    pub wall_time: NaiveDateTime,
    /// Monotonic time, used for cooldowns.
    pub at: Instant,
}

impl ForegroundEvent {
    pub fn new(package_id: &str, wall_time: NaiveDateTime, at: Instant) -> Self {
        Self {
            package_id: package_id.to_string(),
            wall_time,
            at,
        }
    }

    pub fn now(package_id: &str) -> Self {
        Self::new(package_id, Local::now().naive_local(), Instant::now())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub cooldown: Duration,
    /// Packages that are never evaluated: the engine itself and the system shell.
    pub exempt: HashSet<String>,
}

impl EngineConfig {
    pub fn new(self_package_id: &str) -> Self {
        let mut exempt: HashSet<String> =
            SYSTEM_SHELL_IDS.iter().map(|s| (*s).to_string()).collect();
        exempt.insert(self_package_id.to_string());
        Self {
            cooldown: DEFAULT_COOLDOWN,
            exempt,
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_exempt(mut self, package_id: &str) -> Self {
        self.exempt.insert(package_id.to_string());
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(SELF_PACKAGE_ID)
    }
}

/// How a single event was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Event carried no package id.
    Ignored,
    Exempt,
    /// No usable rule (absent, malformed, or lookup failed).
    NoRule,
    Inactive,
    Suppressed,
    Blocked,
    /// Block was decided but the dispatcher failed; state rolled back.
    DispatchFailed,
}

/// Counters for a finished `run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub events: u64,
    pub blocked: u64,
    pub suppressed: u64,
    pub dispatch_failures: u64,
}

impl EngineStats {
    fn record(&mut self, outcome: Outcome) {
        self.events += 1;
        match outcome {
            Outcome::Blocked => self.blocked += 1,
            Outcome::Suppressed => self.suppressed += 1,
            Outcome::DispatchFailed => self.dispatch_failures += 1,
            Outcome::Ignored | Outcome::Exempt | Outcome::NoRule | Outcome::Inactive => {}
        }
    }
}

pub struct BlockEngine<R, D> {
    config: EngineConfig,
    rules: R,
    dispatcher: D,
    activations: ActivationTable,
}

impl<R: RuleSource, D: BlockDispatcher> BlockEngine<R, D> {
    pub fn new(config: EngineConfig, rules: R, dispatcher: D) -> Self {
        let activations = ActivationTable::new(config.cooldown);
        Self {
            config,
            rules,
            dispatcher,
            activations,
        }
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Phase of a package as of `now`, if it has been observed.
    pub fn phase(&self, package_id: &str, now: Instant) -> Option<Phase> {
        self.activations.phase(package_id, now)
    }

    /// Evaluate one foreground change and dispatch a block if warranted.
    pub fn on_foreground_event(&mut self, event: &ForegroundEvent) -> Outcome {
        let package_id = event.package_id.as_str();

        if package_id.is_empty() {
            debug!("Ignoring foreground event without a package id");
            return Outcome::Ignored;
        }

        if self.config.exempt.contains(package_id) {
            debug!("Ignoring exempt package {package_id}");
            return Outcome::Exempt;
        }

        let rule = match self.rules.lookup(package_id) {
            Ok(rule) => rule,
            Err(e) => {
                warn!("Treating {package_id} as unblocked: {e}");
                None
            }
        };

        let Some(rule) = rule else {
            self.activations.observe(package_id, false, event.at);
            return Outcome::NoRule;
        };

        let active = is_active(&rule, &event.wall_time);
        match self.activations.observe(package_id, active, event.at) {
            Transition::Disarmed => {
                debug!("{package_id} is outside its block window");
                Outcome::Inactive
            }
            Transition::Suppressed => {
                debug!("Suppressing repeat block of {package_id}");
                Outcome::Suppressed
            }
            Transition::Block => match self.dispatcher.dispatch_block(package_id) {
                Ok(()) => {
                    info!("Blocked {package_id}");
                    Outcome::Blocked
                }
                Err(e) => {
                    error!("Failed to block {package_id}: {e}");
                    self.activations.rollback(package_id);
                    Outcome::DispatchFailed
                }
            },
        }
    }

    /// Process events until every sender has been dropped.
    pub fn run(&mut self, events: &Receiver<ForegroundEvent>) -> EngineStats {
        let mut stats = EngineStats::default();
        info!(
            "Block engine started (cooldown {:?}, {} exempt packages)",
            self.config.cooldown,
            self.config.exempt.len()
        );

        for event in events {
            let outcome = self.on_foreground_event(&event);
            stats.record(outcome);
        }

        info!(
            "Block engine stopped after {} events ({} blocked)",
            stats.events, stats.blocked
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DispatchError, RuleError};
    use crate::rules::RuleSet;
    use crate::schedule::{BlockRule, Recurrence, TimeWindow};
    use chrono::NaiveDate;
    use std::cell::RefCell;
    use std::sync::mpsc;
    use std::thread;

    #[derive(Default)]
    struct RecordingDispatcher {
        calls: RefCell<Vec<String>>,
        fail: bool,
    }

    impl BlockDispatcher for RecordingDispatcher {
        fn dispatch_block(&self, package_id: &str) -> Result<(), DispatchError> {
            self.calls.borrow_mut().push(package_id.to_string());
            if self.fail {
                Err(DispatchError::Platform("redirect refused".into()))
            } else {
                Ok(())
            }
        }
    }

    impl RecordingDispatcher {
        fn count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    struct FailingRules;

    impl RuleSource for FailingRules {
        fn lookup(&self, _package_id: &str) -> Result<Option<BlockRule>, RuleError> {
            Err(RuleError::Lookup("database is locked".into()))
        }
    }

    struct MalformedRules;

    impl RuleSource for MalformedRules {
        fn lookup(&self, package_id: &str) -> Result<Option<BlockRule>, RuleError> {
            BlockRule::from_parts(package_id, Some("08:00"), None, None).map(Some)
        }
    }

    /// 2024-01-03 is a Wednesday.
    fn wall(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 3)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    fn office_hours() -> BlockRule {
        BlockRule::scheduled(
            "com.example.game",
            TimeWindow::parse("08:00", "17:00").unwrap(),
            Recurrence::Daily,
        )
    }

    fn engine(rules: Vec<BlockRule>) -> BlockEngine<RuleSet, RecordingDispatcher> {
        BlockEngine::new(
            EngineConfig::default(),
            rules.into_iter().collect(),
            RecordingDispatcher::default(),
        )
    }

    #[test]
    fn test_office_hours_scenario() {
        let mut engine = engine(vec![office_hours()]);
        let t0 = Instant::now();

        let first = ForegroundEvent::new("com.example.game", wall(9, 0, 0), t0);
        assert_eq!(engine.on_foreground_event(&first), Outcome::Blocked);
        assert!(matches!(
            engine.phase("com.example.game", t0),
            Some(Phase::Cooldown { .. })
        ));

        let second = ForegroundEvent::new(
            "com.example.game",
            wall(9, 0, 1),
            t0 + Duration::from_secs(1),
        );
        assert_eq!(engine.on_foreground_event(&second), Outcome::Suppressed);

        let third = ForegroundEvent::new(
            "com.example.game",
            wall(18, 0, 0),
            t0 + Duration::from_secs(9 * 3600),
        );
        assert_eq!(engine.on_foreground_event(&third), Outcome::Inactive);
        assert_eq!(
            engine.phase("com.example.game", t0 + Duration::from_secs(9 * 3600)),
            Some(Phase::Idle)
        );

        assert_eq!(engine.dispatcher().count(), 1);
    }

    #[test]
    fn test_always_block_rule_debounces() {
        let mut engine = engine(vec![BlockRule::always("steam")]);
        let t0 = Instant::now();

        for i in 0..5 {
            let at = t0 + Duration::from_millis(i * 100);
            let event = ForegroundEvent::new("steam", wall(3, 0, 0), at);
            engine.on_foreground_event(&event);
        }
        assert_eq!(engine.dispatcher().count(), 1);

        let later = ForegroundEvent::new("steam", wall(3, 0, 3), t0 + Duration::from_secs(3));
        assert_eq!(engine.on_foreground_event(&later), Outcome::Blocked);
        assert_eq!(engine.dispatcher().count(), 2);
    }

    #[test]
    fn test_inactive_rule_never_blocks() {
        let mut engine = engine(vec![office_hours()]);
        let t0 = Instant::now();

        for i in 0..10 {
            let event = ForegroundEvent::new(
                "com.example.game",
                wall(20, 0, 0),
                t0 + Duration::from_secs(i),
            );
            assert_eq!(engine.on_foreground_event(&event), Outcome::Inactive);
            assert_eq!(
                engine.phase("com.example.game", t0 + Duration::from_secs(i)),
                Some(Phase::Idle)
            );
        }
        assert_eq!(engine.dispatcher().count(), 0);
    }

    #[test]
    fn test_monthly_rule_off_the_first_never_blocks() {
        let rule = BlockRule::scheduled(
            "steam",
            TimeWindow::parse("00:00", "23:59").unwrap(),
            Recurrence::Monthly,
        );
        let mut engine = engine(vec![rule]);
        let event = ForegroundEvent::new("steam", wall(12, 0, 0), Instant::now());
        assert_eq!(engine.on_foreground_event(&event), Outcome::Inactive);
    }

    #[test]
    fn test_own_identity_is_exempt() {
        let mut engine = engine(vec![BlockRule::always(SELF_PACKAGE_ID)]);
        let event = ForegroundEvent::new(SELF_PACKAGE_ID, wall(9, 0, 0), Instant::now());

        assert_eq!(engine.on_foreground_event(&event), Outcome::Exempt);
        assert_eq!(engine.dispatcher().count(), 0);
        assert_eq!(engine.phase(SELF_PACKAGE_ID, Instant::now()), None);
    }

    #[test]
    fn test_system_shell_is_exempt() {
        let mut engine = engine(vec![BlockRule::always("gnome-shell")]);
        let event = ForegroundEvent::new("gnome-shell", wall(9, 0, 0), Instant::now());
        assert_eq!(engine.on_foreground_event(&event), Outcome::Exempt);
    }

    #[test]
    fn test_custom_exempt_package() {
        let config = EngineConfig::new("blocker").with_exempt("launcher");
        let mut engine = BlockEngine::new(
            config,
            vec![BlockRule::always("launcher"), BlockRule::always("blocker")]
                .into_iter()
                .collect::<RuleSet>(),
            RecordingDispatcher::default(),
        );

        for package in ["launcher", "blocker"] {
            let event = ForegroundEvent::new(package, wall(9, 0, 0), Instant::now());
            assert_eq!(engine.on_foreground_event(&event), Outcome::Exempt);
        }
    }

    #[test]
    fn test_empty_package_is_ignored() {
        let mut engine = engine(vec![BlockRule::always("")]);
        let event = ForegroundEvent::new("", wall(9, 0, 0), Instant::now());
        assert_eq!(engine.on_foreground_event(&event), Outcome::Ignored);
        assert_eq!(engine.dispatcher().count(), 0);
    }

    #[test]
    fn test_unknown_package_has_no_rule() {
        let mut engine = engine(vec![office_hours()]);
        let now = Instant::now();
        let event = ForegroundEvent::new("firefox", wall(9, 0, 0), now);
        assert_eq!(engine.on_foreground_event(&event), Outcome::NoRule);
        assert_eq!(engine.phase("firefox", now), Some(Phase::Idle));
    }

    #[test]
    fn test_lookup_failure_fails_open() {
        let mut engine = BlockEngine::new(
            EngineConfig::default(),
            FailingRules,
            RecordingDispatcher::default(),
        );
        let event = ForegroundEvent::new("steam", wall(9, 0, 0), Instant::now());
        assert_eq!(engine.on_foreground_event(&event), Outcome::NoRule);
        assert_eq!(engine.dispatcher().count(), 0);
    }

    #[test]
    fn test_malformed_rule_fails_open() {
        let mut engine = BlockEngine::new(
            EngineConfig::default(),
            MalformedRules,
            RecordingDispatcher::default(),
        );
        let event = ForegroundEvent::new("steam", wall(9, 0, 0), Instant::now());
        assert_eq!(engine.on_foreground_event(&event), Outcome::NoRule);
        assert_eq!(engine.dispatcher().count(), 0);
    }

    #[test]
    fn test_dispatch_failure_rolls_back() {
        let mut engine = BlockEngine::new(
            EngineConfig::default(),
            vec![BlockRule::always("steam")].into_iter().collect::<RuleSet>(),
            RecordingDispatcher {
                fail: true,
                ..RecordingDispatcher::default()
            },
        );
        let t0 = Instant::now();

        let first = ForegroundEvent::new("steam", wall(9, 0, 0), t0);
        assert_eq!(engine.on_foreground_event(&first), Outcome::DispatchFailed);
        assert_eq!(engine.phase("steam", t0), Some(Phase::Idle));

        // Retried on the very next event instead of waiting out a cooldown
        let retry = ForegroundEvent::new("steam", wall(9, 0, 0), t0 + Duration::from_millis(50));
        assert_eq!(engine.on_foreground_event(&retry), Outcome::DispatchFailed);
        assert_eq!(engine.dispatcher().count(), 2);
    }

    #[test]
    fn test_leaving_window_rearms() {
        let rule = BlockRule::scheduled(
            "steam",
            TimeWindow::parse("09:00", "09:30").unwrap(),
            Recurrence::Daily,
        );
        let mut engine = engine(vec![rule]);
        let t0 = Instant::now();

        let inside = ForegroundEvent::new("steam", wall(9, 30, 0), t0);
        let outside = ForegroundEvent::new("steam", wall(9, 31, 0), t0 + Duration::from_millis(10));
        let back = ForegroundEvent::new("steam", wall(9, 30, 59), t0 + Duration::from_millis(20));

        assert_eq!(engine.on_foreground_event(&inside), Outcome::Blocked);
        assert_eq!(engine.on_foreground_event(&outside), Outcome::Inactive);
        assert_eq!(engine.on_foreground_event(&back), Outcome::Blocked);
    }

    #[test]
    fn test_run_consumes_channel_in_order() {
        let (tx, rx) = mpsc::channel();
        let t0 = Instant::now();

        let producer = thread::spawn(move || {
            let sequence = [
                ("steam", 0),
                ("steam", 100),
                ("firefox", 200),
                (SELF_PACKAGE_ID, 300),
                ("steam", 2500),
            ];
            for (package, offset) in sequence {
                let at = t0 + Duration::from_millis(offset);
                let event = ForegroundEvent::new(package, wall(9, 0, 0), at);
                tx.send(event).unwrap();
            }
        });

        let mut engine = engine(vec![BlockRule::always("steam")]);
        let stats = engine.run(&rx);
        producer.join().unwrap();

        assert_eq!(
            stats,
            EngineStats {
                events: 5,
                blocked: 2,
                suppressed: 1,
                dispatch_failures: 0,
            }
        );
        assert_eq!(*engine.dispatcher().calls.borrow(), vec!["steam", "steam"]);
    }

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.cooldown, DEFAULT_COOLDOWN);
        assert!(config.exempt.contains(SELF_PACKAGE_ID));
        for shell in SYSTEM_SHELL_IDS {
            assert!(config.exempt.contains(*shell));
        }

        let config = EngineConfig::default().with_cooldown(Duration::from_secs(5));
        assert_eq!(config.cooldown, Duration::from_secs(5));
    }
}
