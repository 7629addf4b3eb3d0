//! Subsystem lifecycle contract.
//!
//! The cycle runner drives every registered subsystem through this trait,
//! enabling independent mechanism state machines behind one scheduling
//! surface.
//!
//! # Lifecycle
//!
//! 1. `on_start(now)` - Called once when the runner (re)admits the subsystem
//! 2. `on_loop(now)` - Called every cycle from the loop thread
//! 3. `on_stop(now)` - Called when the runner halts
//!
//! # Timing Contracts
//!
//! | Operation | Constraint |
//! |-----------|------------|
//! | `on_start` / `on_loop` / `on_stop` | Must complete within the cycle budget; no blocking, no sleeps |
//! | `check_system` | Out-of-band only; may sleep; never called from the loop thread |
//!
//! `now` is monotonic elapsed time since the runner started. Handlers must
//! be safe under variable `now` deltas — a late cycle simply reflects the
//! overrun, the runner never catches up.

use std::fmt::Debug;
use std::time::Duration;

use tracing::info;

/// Contract between the cycle runner and one mechanism state machine.
///
/// Implementations own their state behind a per-instance mutex; all trait
/// methods take `&self` so one `Arc<dyn Subsystem>` can be shared between
/// the loop thread and command-issuing threads.
pub trait Subsystem: Send + Sync {
    /// Short stable identifier, used in logs.
    fn name(&self) -> &'static str;

    /// Force the safe/idle operating state, zero the actuator, and reset
    /// state bookkeeping. Invoked before the first cycle and on re-enable.
    fn on_start(&self, now: Duration);

    /// Run one state-machine cycle: dispatch on the current operating
    /// state, apply the transition, and issue the actuator output.
    fn on_loop(&self, now: Duration);

    /// Fail-safe: force actuator output to zero. State bookkeeping is left
    /// alone; the next `on_start` resets it.
    fn on_stop(&self, now: Duration);

    /// Out-of-band diagnostic sequence. Returns pass/fail.
    fn check_system(&self) -> bool {
        true
    }
}

// ─── State Bookkeeping ──────────────────────────────────────────────

/// Per-cycle transition bookkeeping shared by every subsystem state machine.
///
/// Holds the current operating state, the monotonic time it was entered,
/// and the one-cycle `state_changed` flag used for on-entry actions.
/// Mutated only under the owning subsystem's mutex, on the loop thread.
#[derive(Debug, Clone)]
pub struct StateBook<S> {
    /// Current operating state.
    pub state: S,
    /// Monotonic time the current state began.
    pub state_entered_at: Duration,
    /// True only on the cycle a transition occurred.
    pub state_changed: bool,
}

impl<S: Copy + PartialEq + Debug> StateBook<S> {
    /// Create bookkeeping in the given initial state.
    pub fn new(initial: S) -> Self {
        Self {
            state: initial,
            state_entered_at: Duration::ZERO,
            state_changed: true,
        }
    }

    /// Force the initial state, as part of `on_start`.
    pub fn restart(&mut self, initial: S, now: Duration) {
        self.state = initial;
        self.state_entered_at = now;
        self.state_changed = true;
    }

    /// Elapsed time in the current state.
    #[inline]
    pub fn elapsed(&self, now: Duration) -> Duration {
        now.saturating_sub(self.state_entered_at)
    }

    /// Apply the state a handler returned for the next cycle. Records the
    /// transition (and logs it) when `next` differs from the current state.
    pub fn apply(&mut self, subsystem: &str, next: S, now: Duration) {
        if next != self.state {
            info!(subsystem, from = ?self.state, to = ?next, "state transition");
            self.state = next;
            self.state_entered_at = now;
            self.state_changed = true;
        } else {
            self.state_changed = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum S {
        A,
        B,
    }

    const MS: fn(u64) -> Duration = Duration::from_millis;

    #[test]
    fn apply_records_transition_once() {
        let mut book = StateBook::new(S::A);
        book.apply("test", S::B, MS(10));
        assert_eq!(book.state, S::B);
        assert_eq!(book.state_entered_at, MS(10));
        assert!(book.state_changed);

        book.apply("test", S::B, MS(15));
        assert!(!book.state_changed);
        // Entry timestamp is preserved while the state holds.
        assert_eq!(book.state_entered_at, MS(10));
        assert_eq!(book.elapsed(MS(25)), MS(15));
    }

    #[test]
    fn restart_forces_initial_state() {
        let mut book = StateBook::new(S::A);
        book.apply("test", S::B, MS(10));
        book.apply("test", S::B, MS(15));
        book.restart(S::A, MS(20));
        assert_eq!(book.state, S::A);
        assert!(book.state_changed);
        assert_eq!(book.state_entered_at, MS(20));
    }
}
