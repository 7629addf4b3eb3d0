//! Feeder subsystem: sends one ball at a time into the shooter.
//!
//! A trigger motor pushes balls past two IR sensors, one before the feeder
//! (supply present) and one after it (ball delivered). The state machine
//! feeds continuously, feeds a single ball, or reverses to clear a jam.
//!
//! Every active state re-issues its motor command each cycle so an
//! actuator-level watchdog that zeroes stale commands cannot stall the
//! mechanism.

use std::sync::Arc;
use std::time::Duration;

use bitflags::bitflags;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use mech_common::config::FeederTuning;
use mech_common::io::{DigitalInput, MotorOutput};

use crate::subsystem::{StateBook, Subsystem};

/// Self-test pulse power.
const SELF_TEST_POWER: f64 = 0.25;
/// Self-test pulse duration.
const SELF_TEST_PULSE: Duration = Duration::from_millis(250);

// ─── State Enums ────────────────────────────────────────────────────

/// Feeder operating state (internal truth, mutated only on the loop thread).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeederState {
    /// All motors stopped.
    Idle,
    /// Reversing the trigger to clear a jam, self-expiring.
    Unjamming,
    /// Feeding balls into the shooter at full speed.
    ContinuousFeeding,
    /// Feeding a single ball, gated by the supply sensor.
    IncrementalFeeding,
}

/// Feeder commanded state (externally requested behavior).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeederCommand {
    /// Stop all motors.
    #[default]
    Idle,
    /// Reverse to clear a jam.
    Unjam,
    /// Feed continuously.
    ContinuousFeed,
    /// Feed one ball.
    IncrementFeed,
}

/// Baseline commanded-state → operating-state mapping, used whenever no
/// state-specific condition overrides it.
const fn default_transfer(command: FeederCommand) -> FeederState {
    match command {
        FeederCommand::Idle => FeederState::Idle,
        FeederCommand::Unjam => FeederState::Unjamming,
        FeederCommand::ContinuousFeed => FeederState::ContinuousFeeding,
        FeederCommand::IncrementFeed => FeederState::IncrementalFeeding,
    }
}

bitflags! {
    /// Latched feeder diagnostic flags. Cleared on idle entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FeederFaults: u8 {
        /// Incremental feed was requested with no ball at the supply sensor.
        const SUPPLY_EMPTY = 0x01;
        /// Incremental feed timed out without a ball reaching the exit sensor.
        const CLOG         = 0x02;
    }
}

// ─── Subsystem ──────────────────────────────────────────────────────

/// Mutex-guarded feeder state. `command` may be written from any thread;
/// everything else is touched only on the loop thread.
#[derive(Debug)]
struct FeederCore {
    book: StateBook<FeederState>,
    command: FeederCommand,
    faults: FeederFaults,
}

/// The feeder subsystem.
pub struct Feeder {
    tuning: FeederTuning,
    trigger: Arc<dyn MotorOutput>,
    supply_sensor: Arc<dyn DigitalInput>,
    exit_sensor: Arc<dyn DigitalInput>,
    core: Mutex<FeederCore>,
}

impl Feeder {
    /// Construct a feeder over its hardware ports.
    pub fn new(
        tuning: FeederTuning,
        trigger: Arc<dyn MotorOutput>,
        supply_sensor: Arc<dyn DigitalInput>,
        exit_sensor: Arc<dyn DigitalInput>,
    ) -> Self {
        Self {
            tuning,
            trigger,
            supply_sensor,
            exit_sensor,
            core: Mutex::new(FeederCore {
                book: StateBook::new(FeederState::Idle),
                command: FeederCommand::Idle,
                faults: FeederFaults::empty(),
            }),
        }
    }

    /// Request a behavior. Thread-safe, idempotent, effective next cycle.
    pub fn set_command(&self, command: FeederCommand) {
        let mut core = self.core.lock();
        if core.command != command {
            debug!(?command, "feeder command");
            core.command = command;
        }
    }

    /// Current operating state (lock-and-copy, any thread).
    pub fn state(&self) -> FeederState {
        self.core.lock().book.state
    }

    /// Currently latched diagnostic flags.
    pub fn faults(&self) -> FeederFaults {
        self.core.lock().faults
    }

    // ── State Handlers ──────────────────────────────────────────────
    //
    // Each handler returns (operating state for next cycle, motor output
    // for this cycle). Exactly one handler runs per cycle.

    fn handle_idle(core: &mut FeederCore) -> (FeederState, f64) {
        if core.book.state_changed {
            core.faults = FeederFaults::empty();
        }
        (default_transfer(core.command), 0.0)
    }

    fn handle_unjamming(&self, core: &mut FeederCore, now: Duration) -> (FeederState, f64) {
        let expired = core.book.elapsed(now) >= self.tuning.unjam_period();
        // The internal timer only decides the case where the unjam command
        // is still active; an explicit command always takes precedence.
        let next = match core.command {
            FeederCommand::Unjam => {
                if expired {
                    FeederState::Idle
                } else {
                    FeederState::Unjamming
                }
            }
            other => default_transfer(other),
        };
        (next, self.tuning.unjam_power)
    }

    fn handle_incremental(
        &self,
        core: &mut FeederCore,
        now: Duration,
        supply: bool,
        exit: bool,
    ) -> (FeederState, f64) {
        let mut next = FeederState::IncrementalFeeding;
        let mut output = self.tuning.increment_feed_power;

        if core.book.state_changed && !supply {
            // Entry gate: nothing to feed, bail out without powering the
            // trigger at all this cycle.
            warn!("feeder supply empty at incremental feed entry");
            core.faults.insert(FeederFaults::SUPPLY_EMPTY);
            next = FeederState::Idle;
            output = 0.0;
        } else if core.book.elapsed(now) >= self.tuning.clog_period() {
            warn!("feeder clog detected, reversing");
            core.faults.insert(FeederFaults::CLOG);
            next = FeederState::Unjamming;
            output = 0.0;
        } else if exit {
            // Ball delivered.
            next = FeederState::Idle;
            output = 0.0;
        }

        let next = match core.command {
            FeederCommand::IncrementFeed => next,
            other => default_transfer(other),
        };
        (next, output)
    }
}

impl Subsystem for Feeder {
    fn name(&self) -> &'static str {
        "feeder"
    }

    fn on_start(&self, now: Duration) {
        {
            let mut core = self.core.lock();
            core.book.restart(FeederState::Idle, now);
            core.command = FeederCommand::Idle;
            core.faults = FeederFaults::empty();
        }
        self.trigger.set_output(0.0);
    }

    fn on_loop(&self, now: Duration) {
        let supply = self.supply_sensor.read();
        let exit = self.exit_sensor.read();

        let output = {
            let mut core = self.core.lock();
            let (next, output) = match core.book.state {
                FeederState::Idle => Self::handle_idle(&mut core),
                FeederState::Unjamming => self.handle_unjamming(&mut core, now),
                FeederState::ContinuousFeeding => (
                    default_transfer(core.command),
                    self.tuning.continuous_feed_power,
                ),
                FeederState::IncrementalFeeding => {
                    self.handle_incremental(&mut core, now, supply, exit)
                }
            };
            core.book.apply("feeder", next, now);
            output
        };
        // Motor write outside the lock; re-issued every cycle.
        self.trigger.set_output(output);
    }

    fn on_stop(&self, _now: Duration) {
        self.core.lock().command = FeederCommand::Idle;
        self.trigger.set_output(0.0);
    }

    fn check_system(&self) -> bool {
        info!("feeder self-test: pulsing trigger motor");
        self.trigger.set_output(SELF_TEST_POWER);
        std::thread::sleep(SELF_TEST_PULSE);
        self.trigger.set_output(0.0);

        let supply = self.supply_sensor.read();
        let exit = self.exit_sensor.read();
        info!(supply, exit, "feeder self-test sensor snapshot");
        if exit && !supply {
            // A ball "leaving" an empty feeder points at a stuck exit sensor.
            warn!("feeder self-test: exit sensor asserted with empty supply");
            return false;
        }
        true
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimDigitalInput, SimMotor};

    const MS: fn(u64) -> Duration = Duration::from_millis;

    fn fast_tuning() -> FeederTuning {
        FeederTuning {
            unjam_power: -1.0,
            unjam_period_ms: 100,
            clog_period_ms: 200,
            increment_feed_power: 0.65,
            continuous_feed_power: 1.0,
        }
    }

    struct Rig {
        feeder: Feeder,
        motor: Arc<SimMotor>,
        supply: Arc<SimDigitalInput>,
        exit: Arc<SimDigitalInput>,
    }

    fn rig() -> Rig {
        let motor = SimMotor::new();
        let supply = SimDigitalInput::new(false);
        let exit = SimDigitalInput::new(false);
        let feeder = Feeder::new(
            fast_tuning(),
            motor.clone(),
            supply.clone(),
            exit.clone(),
        );
        feeder.on_start(Duration::ZERO);
        Rig {
            feeder,
            motor,
            supply,
            exit,
        }
    }

    #[test]
    fn default_transfer_covers_every_command() {
        for (command, expected) in [
            (FeederCommand::Idle, FeederState::Idle),
            (FeederCommand::Unjam, FeederState::Unjamming),
            (FeederCommand::ContinuousFeed, FeederState::ContinuousFeeding),
            (FeederCommand::IncrementFeed, FeederState::IncrementalFeeding),
        ] {
            let r = rig();
            r.supply.set(true);
            r.feeder.set_command(command);
            r.feeder.on_loop(MS(5));
            assert_eq!(r.feeder.state(), expected, "command {command:?}");
        }
    }

    #[test]
    fn idle_keeps_motor_zeroed() {
        let r = rig();
        r.feeder.on_loop(MS(5));
        assert_eq!(r.motor.output(), 0.0);
        assert_eq!(r.feeder.state(), FeederState::Idle);
    }

    #[test]
    fn continuous_feed_reissues_power_every_cycle() {
        let r = rig();
        r.feeder.set_command(FeederCommand::ContinuousFeed);
        r.feeder.on_loop(MS(5));
        r.feeder.on_loop(MS(10));
        assert_eq!(r.motor.output(), 1.0);
        // Simulate an actuator watchdog zeroing the command.
        r.motor.set_output(0.0);
        r.feeder.on_loop(MS(15));
        assert_eq!(r.motor.output(), 1.0);
    }

    #[test]
    fn unjam_applies_reverse_power_and_self_expires() {
        let r = rig();
        r.feeder.set_command(FeederCommand::Unjam);
        r.feeder.on_loop(MS(0)); // Idle → Unjamming, entered at 0
        r.feeder.on_loop(MS(50));
        assert_eq!(r.feeder.state(), FeederState::Unjamming);
        assert_eq!(r.motor.output(), -1.0);
        // One tick before the boundary: still unjamming.
        r.feeder.on_loop(MS(99));
        assert_eq!(r.feeder.state(), FeederState::Unjamming);
        // At the boundary (>= convention): expires to idle.
        r.feeder.on_loop(MS(100));
        assert_eq!(r.feeder.state(), FeederState::Idle);
    }

    #[test]
    fn explicit_command_overrides_unjam_timer() {
        let r = rig();
        r.feeder.set_command(FeederCommand::Unjam);
        r.feeder.on_loop(MS(0));
        r.feeder.on_loop(MS(20));
        assert_eq!(r.feeder.state(), FeederState::Unjamming);
        // Mid-timeout, an idle command wins immediately.
        r.feeder.set_command(FeederCommand::Idle);
        r.feeder.on_loop(MS(40));
        assert_eq!(r.feeder.state(), FeederState::Idle);
    }

    #[test]
    fn incremental_entry_gate_without_supply() {
        let r = rig();
        r.feeder.set_command(FeederCommand::IncrementFeed);
        r.feeder.on_loop(MS(0)); // Idle → IncrementalFeeding
        assert_eq!(r.feeder.state(), FeederState::IncrementalFeeding);
        // Entry cycle with no ball at the supply sensor: straight back to
        // idle, no feed power issued.
        r.feeder.on_loop(MS(5));
        assert_eq!(r.feeder.state(), FeederState::Idle);
        assert_eq!(r.motor.output(), 0.0);
        assert!(r.feeder.faults().contains(FeederFaults::SUPPLY_EMPTY));
    }

    #[test]
    fn incremental_feeds_until_exit_sensor() {
        let r = rig();
        r.supply.set(true);
        r.feeder.set_command(FeederCommand::IncrementFeed);
        r.feeder.on_loop(MS(0));
        r.feeder.on_loop(MS(5));
        assert_eq!(r.feeder.state(), FeederState::IncrementalFeeding);
        assert_eq!(r.motor.output(), 0.65);
        r.exit.set(true);
        r.feeder.on_loop(MS(10));
        assert_eq!(r.feeder.state(), FeederState::Idle);
        assert_eq!(r.motor.output(), 0.0);
    }

    #[test]
    fn incremental_clog_times_out_into_unjamming() {
        let r = rig();
        r.supply.set(true);
        r.feeder.set_command(FeederCommand::IncrementFeed);
        r.feeder.on_loop(MS(0)); // entered at 0
        r.feeder.on_loop(MS(199));
        assert_eq!(r.feeder.state(), FeederState::IncrementalFeeding);
        r.feeder.on_loop(MS(200)); // clog boundary
        assert_eq!(r.feeder.state(), FeederState::Unjamming);
        assert!(r.feeder.faults().contains(FeederFaults::CLOG));
    }

    #[test]
    fn faults_clear_on_idle_entry() {
        let r = rig();
        r.feeder.set_command(FeederCommand::IncrementFeed);
        r.feeder.on_loop(MS(0));
        r.feeder.on_loop(MS(5)); // gate fails, SUPPLY_EMPTY latched, → Idle
        assert!(!r.feeder.faults().is_empty());
        r.feeder.set_command(FeederCommand::Idle);
        r.feeder.on_loop(MS(10)); // idle entry clears
        assert!(r.feeder.faults().is_empty());
    }

    #[test]
    fn set_command_is_idempotent() {
        let r = rig();
        r.feeder.set_command(FeederCommand::Unjam);
        r.feeder.set_command(FeederCommand::Unjam);
        r.feeder.on_loop(MS(5));
        assert_eq!(r.feeder.state(), FeederState::Unjamming);
    }

    #[test]
    fn on_stop_zeroes_motor_from_any_state() {
        let r = rig();
        r.feeder.set_command(FeederCommand::ContinuousFeed);
        r.feeder.on_loop(MS(0));
        r.feeder.on_loop(MS(5));
        assert!(r.motor.output() > 0.0);
        r.feeder.on_stop(MS(10));
        assert_eq!(r.motor.output(), 0.0);
    }
}
