//! Per-package debounce state.
//!
//! Each package runs its own two-state machine. A block is emitted on entry
//! into an active rule and then suppressed until the cooldown has elapsed.
//! Expiry is observed lazily on the next event; there are no timers.

use log::debug;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Cooldown { triggered_at: Instant },
}

/// What an observation decided for the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Issue a block action. The package is now cooling down.
    Block,
    /// Rule is active but a block was issued within the cooldown.
    Suppressed,
    /// Rule is absent or inactive. The package is idle again.
    Disarmed,
}

#[derive(Debug)]
pub struct ActivationTable {
    cooldown: Duration,
    states: HashMap<String, Phase>,
}

impl ActivationTable {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            states: HashMap::new(),
        }
    }

    /// Advance the machine for `package_id` given whether its rule is active at `now`.
    pub fn observe(&mut self, package_id: &str, rule_active: bool, now: Instant) -> Transition {
        let cooldown = self.cooldown;
        let phase = self.entry(package_id);

        if !rule_active {
            *phase = Phase::Idle;
            return Transition::Disarmed;
        }

        if let Phase::Cooldown { triggered_at } = *phase {
            // Out-of-order timestamps saturate to zero and stay suppressed.
            if now.saturating_duration_since(triggered_at) < cooldown {
                return Transition::Suppressed;
            }
        }

        *phase = Phase::Cooldown { triggered_at: now };
        Transition::Block
    }

    /// Return a package to `Idle` after its block action failed, so the next
    /// qualifying event retries instead of waiting out the cooldown.
    pub fn rollback(&mut self, package_id: &str) {
        if let Some(phase) = self.states.get_mut(package_id) {
            debug!("Rolling back activation for {package_id}");
            *phase = Phase::Idle;
        }
    }

    /// Current phase as of `now`, with an elapsed cooldown reported as `Idle`.
    pub fn phase(&self, package_id: &str, now: Instant) -> Option<Phase> {
        self.states.get(package_id).map(|phase| match *phase {
            Phase::Cooldown { triggered_at }
                if now.saturating_duration_since(triggered_at) < self.cooldown =>
            {
                Phase::Cooldown { triggered_at }
            }
            Phase::Cooldown { .. } | Phase::Idle => Phase::Idle,
        })
    }

    /// Number of packages observed so far.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn entry(&mut self, package_id: &str) -> &mut Phase {
        self.states
            .entry(package_id.to_string())
            .or_insert(Phase::Idle)
    }
}
