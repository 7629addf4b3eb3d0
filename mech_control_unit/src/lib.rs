//! # Mech Control Unit Library
//!
//! Cooperative fixed-rate control core for physical mechanisms. One
//! dedicated thread runs every registered subsystem's state machine at a
//! fixed period; commands arrive asynchronously from operator/autonomous
//! threads and take effect on the next cycle.
//!
//! ## Architecture
//!
//! - [`cycle`] — the periodic cycle runner (registration, start/stop,
//!   overrun accounting, optional PREEMPT_RT setup)
//! - [`subsystem`] — the per-subsystem lifecycle contract
//! - [`subsystems`] — concrete state machines (feeder, intake)
//! - [`debounce`] — minimum-duration filter for noisy digital sensors
//! - [`sim`] — in-process simulation ports for tests and bench runs
//!
//! ## Concurrency Model
//!
//! Each subsystem guards its state with one mutex, held for the duration
//! of `set_command` and of `on_loop`'s read-decide-write sequence. Actuator
//! writes happen after the lock is released. There is no cross-subsystem
//! locking; the latest command wins and is observed on the next cycle.

pub mod cycle;
pub mod debounce;
pub mod sim;
pub mod subsystem;
pub mod subsystems;
