//! Intake subsystem: pulls balls off the ground into the hopper.
//!
//! A roller motor accumulates balls; an IR beam across the top of the
//! hopper reports fullness. The raw beam is noisy (balls tumble through
//! it), so fullness is debounced: the beam must be blocked continuously
//! for the configured sense period before the hopper counts as full.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};

use mech_common::config::IntakeTuning;
use mech_common::io::{DigitalInput, MotorOutput};

use crate::debounce::DebounceFilter;
use crate::subsystem::{StateBook, Subsystem};

/// Self-test pulse power.
const SELF_TEST_POWER: f64 = 0.25;
/// Self-test pulse duration.
const SELF_TEST_PULSE: Duration = Duration::from_millis(250);

// ─── State Enums ────────────────────────────────────────────────────

/// Intake operating state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeState {
    /// Roller stopped.
    Idle,
    /// Reversing the roller to clear a jam, self-expiring.
    Unjamming,
    /// Running the roller to collect balls.
    Accumulating,
}

/// Intake commanded state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntakeCommand {
    /// Stop the roller.
    #[default]
    Idle,
    /// Reverse to clear a jam.
    Unjam,
    /// Collect balls.
    Intake,
}

const fn default_transfer(command: IntakeCommand) -> IntakeState {
    match command {
        IntakeCommand::Idle => IntakeState::Idle,
        IntakeCommand::Unjam => IntakeState::Unjamming,
        IntakeCommand::Intake => IntakeState::Accumulating,
    }
}

// ─── Subsystem ──────────────────────────────────────────────────────

#[derive(Debug)]
struct IntakeCore {
    book: StateBook<IntakeState>,
    command: IntakeCommand,
    hopper_sense: DebounceFilter,
    /// Most recently computed debounced fullness (the cross-thread query
    /// reads this, never the hardware).
    hopper_full: bool,
}

/// The intake subsystem.
pub struct Intake {
    tuning: IntakeTuning,
    roller: Arc<dyn MotorOutput>,
    hopper_sensor: Arc<dyn DigitalInput>,
    core: Mutex<IntakeCore>,
}

impl Intake {
    /// Construct an intake over its hardware ports.
    pub fn new(
        tuning: IntakeTuning,
        roller: Arc<dyn MotorOutput>,
        hopper_sensor: Arc<dyn DigitalInput>,
    ) -> Self {
        let hopper_sense = DebounceFilter::new(tuning.hopper_sense_period());
        Self {
            tuning,
            roller,
            hopper_sensor,
            core: Mutex::new(IntakeCore {
                book: StateBook::new(IntakeState::Idle),
                command: IntakeCommand::Idle,
                hopper_sense,
                hopper_full: false,
            }),
        }
    }

    /// Request a behavior. Thread-safe, idempotent, effective next cycle.
    pub fn set_command(&self, command: IntakeCommand) {
        let mut core = self.core.lock();
        if core.command != command {
            debug!(?command, "intake command");
            core.command = command;
        }
    }

    /// Current operating state (lock-and-copy, any thread).
    pub fn state(&self) -> IntakeState {
        self.core.lock().book.state
    }

    /// Debounced hopper fullness, as of the last completed cycle.
    pub fn hopper_full(&self) -> bool {
        self.core.lock().hopper_full
    }

    fn handle_unjamming(&self, core: &mut IntakeCore, now: Duration) -> (IntakeState, f64) {
        let expired = core.book.elapsed(now) >= self.tuning.unjam_period();
        let next = match core.command {
            IntakeCommand::Unjam => {
                if expired {
                    IntakeState::Idle
                } else {
                    IntakeState::Unjamming
                }
            }
            other => default_transfer(other),
        };
        (next, self.tuning.unjam_power)
    }

    fn handle_accumulating(&self, core: &mut IntakeCore) -> (IntakeState, f64) {
        let output = if core.hopper_full {
            0.0
        } else {
            self.tuning.intake_power
        };
        (default_transfer(core.command), output)
    }
}

impl Subsystem for Intake {
    fn name(&self) -> &'static str {
        "intake"
    }

    fn on_start(&self, now: Duration) {
        {
            let mut core = self.core.lock();
            core.book.restart(IntakeState::Idle, now);
            core.command = IntakeCommand::Idle;
            core.hopper_sense.reset();
            core.hopper_full = false;
        }
        self.roller.set_output(0.0);
    }

    fn on_loop(&self, now: Duration) {
        let beam_blocked = self.hopper_sensor.read();

        let output = {
            let mut core = self.core.lock();
            let was_full = core.hopper_full;
            core.hopper_full = core.hopper_sense.update(beam_blocked, now);
            if core.hopper_full && !was_full {
                info!("hopper full");
            }

            let (next, output) = match core.book.state {
                IntakeState::Idle => (default_transfer(core.command), 0.0),
                IntakeState::Unjamming => self.handle_unjamming(&mut core, now),
                IntakeState::Accumulating => self.handle_accumulating(&mut core),
            };
            core.book.apply("intake", next, now);
            output
        };
        self.roller.set_output(output);
    }

    fn on_stop(&self, _now: Duration) {
        self.core.lock().command = IntakeCommand::Idle;
        self.roller.set_output(0.0);
    }

    fn check_system(&self) -> bool {
        info!("intake self-test: pulsing roller motor");
        self.roller.set_output(SELF_TEST_POWER);
        std::thread::sleep(SELF_TEST_PULSE);
        self.roller.set_output(0.0);
        info!(beam_blocked = self.hopper_sensor.read(), "intake self-test sensor snapshot");
        true
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
