//! Fixed-rate cycle runner.
//!
//! One dedicated thread drives every registered subsystem: `on_start` once,
//! then `on_loop` every period in registration order, then `on_stop` when
//! halted. Handlers that overrun the period are never skipped or caught up;
//! the next cycle's `now` simply reflects the overrun, and the stats record
//! it.
//!
//! ## RT Setup (feature `rt`)
//!
//! Production builds lock memory pages, prefault the stack, pin the loop
//! thread to an isolated core, and switch to `SCHED_FIFO`, then pace with
//! `clock_nanosleep(TIMER_ABSTIME)` on `CLOCK_MONOTONIC` for drift-free
//! cycles. Without the feature the loop paces with `Instant` arithmetic and
//! `thread::sleep`, which is plenty for simulation and tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use mech_common::consts::MAX_SUBSYSTEMS;

use crate::subsystem::Subsystem;

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing statistics. Updated every cycle, no allocation.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total cycles executed.
    pub cycle_count: u64,
    /// Last cycle duration [ns].
    pub last_cycle_ns: i64,
    /// Minimum cycle duration [ns].
    pub min_cycle_ns: i64,
    /// Maximum cycle duration [ns].
    pub max_cycle_ns: i64,
    /// Running sum for average computation.
    pub sum_cycle_ns: i64,
    /// Number of cycles whose handler work exceeded the period.
    pub overruns: u64,
}

impl CycleStats {
    /// Create a new zeroed stats instance.
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
        }
    }

    /// Record a cycle duration.
    #[inline]
    pub fn record(&mut self, duration_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        if duration_ns < self.min_cycle_ns {
            self.min_cycle_ns = duration_ns;
        }
        if duration_ns > self.max_cycle_ns {
            self.max_cycle_ns = duration_ns;
        }
        self.sum_cycle_ns += duration_ns;
    }

    /// Average cycle time [ns] (0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Errors ─────────────────────────────────────────────────────────

/// Errors from cycle runner operations.
#[derive(Debug, Error)]
pub enum LoopError {
    /// Registration or start attempted while the loop thread is live.
    #[error("cycle runner already started")]
    AlreadyStarted,
    /// Fixed registration list is full.
    #[error("subsystem capacity of {0} exceeded")]
    Capacity(usize),
    /// Stop attempted with no loop thread running.
    #[error("cycle runner is not running")]
    NotRunning,
    /// Loop thread could not be spawned.
    #[error("failed to spawn cycle thread: {0}")]
    Spawn(String),
    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Thread placement and priority for the cycle thread (feature `rt`).
#[derive(Debug, Clone, Copy)]
pub struct RtOptions {
    /// CPU core to pin to.
    pub cpu_core: usize,
    /// `SCHED_FIFO` priority.
    pub priority: i32,
}

/// Full RT setup sequence: lock pages, prefault stack, pin core, SCHED_FIFO.
///
/// Runs on the cycle thread itself. No-op without the `rt` feature.
#[cfg(feature = "rt")]
pub fn rt_setup(opts: &RtOptions) -> Result<(), LoopError> {
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::sys::mman::{mlockall, MlockallFlags};
    use nix::unistd::Pid;

    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| LoopError::RtSetup(format!("mlockall failed: {e}")))?;

    prefault_stack();

    let mut cpuset = CpuSet::new();
    cpuset.set(opts.cpu_core).map_err(|e| {
        LoopError::RtSetup(format!("CpuSet::set({}) failed: {e}", opts.cpu_core))
    })?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| LoopError::RtSetup(format!("sched_setaffinity failed: {e}")))?;

    let param = libc::sched_param {
        sched_priority: opts.priority,
    };
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(LoopError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {}) failed: {err}",
            opts.priority
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
pub fn rt_setup(_opts: &RtOptions) -> Result<(), LoopError> {
    Ok(()) // No-op in simulation mode
}

/// Touch a large stack buffer so RT execution never page-faults.
#[cfg(feature = "rt")]
fn prefault_stack() {
    let mut buf = [0u8; 1024 * 1024];
    for byte in buf.iter_mut() {
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

// ─── Pacing ─────────────────────────────────────────────────────────

#[cfg(feature = "rt")]
struct Pacer {
    next_wake: nix::sys::time::TimeSpec,
    period_ns: i64,
}

#[cfg(feature = "rt")]
impl Pacer {
    fn new(period: Duration) -> Result<Self, LoopError> {
        use nix::time::{clock_gettime, ClockId};
        let now = clock_gettime(ClockId::CLOCK_MONOTONIC)
            .map_err(|e| LoopError::RtSetup(format!("clock_gettime: {e}")))?;
        Ok(Self {
            next_wake: now,
            period_ns: period.as_nanos() as i64,
        })
    }

    /// Sleep until the next absolute cycle boundary.
    fn wait(&mut self, _spent: Duration) {
        use nix::sys::time::TimeSpec;
        use nix::time::{clock_nanosleep, ClockId, ClockNanosleepFlags};

        let mut secs = self.next_wake.tv_sec();
        let mut nanos = self.next_wake.tv_nsec() + self.period_ns;
        while nanos >= 1_000_000_000 {
            secs += 1;
            nanos -= 1_000_000_000;
        }
        self.next_wake = TimeSpec::new(secs, nanos);
        let _ = clock_nanosleep(
            ClockId::CLOCK_MONOTONIC,
            ClockNanosleepFlags::TIMER_ABSTIME,
            &self.next_wake,
        );
    }
}

#[cfg(not(feature = "rt"))]
struct Pacer {
    period: Duration,
}

#[cfg(not(feature = "rt"))]
impl Pacer {
    fn new(period: Duration) -> Result<Self, LoopError> {
        Ok(Self { period })
    }

    /// Sleep for whatever remains of the period.
    fn wait(&mut self, spent: Duration) {
        if let Some(remaining) = self.period.checked_sub(spent) {
            std::thread::sleep(remaining);
        }
    }
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// State shared between the runner handle and the loop thread.
struct LoopShared {
    running: AtomicBool,
    stats: Mutex<CycleStats>,
}

/// The fixed-rate cycle runner.
///
/// Owns the ordered registration list and the loop thread. Registration is
/// valid only before `start()`; the list is fixed-size (`MAX_SUBSYSTEMS`)
/// so the running loop never allocates.
pub struct CycleRunner {
    period: Duration,
    rt: Option<RtOptions>,
    subsystems: heapless::Vec<Arc<dyn Subsystem>, MAX_SUBSYSTEMS>,
    shared: Arc<LoopShared>,
    handle: Option<JoinHandle<()>>,
}

impl CycleRunner {
    /// Create a runner with the given fixed cycle period.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            rt: None,
            subsystems: heapless::Vec::new(),
            shared: Arc::new(LoopShared {
                running: AtomicBool::new(false),
                stats: Mutex::new(CycleStats::new()),
            }),
            handle: None,
        }
    }

    /// Request RT scheduling for the loop thread (applied on start).
    pub fn with_rt(mut self, opts: RtOptions) -> Self {
        self.rt = Some(opts);
        self
    }

    /// Register a subsystem. Valid only before `start()`; cycle order is
    /// registration order.
    pub fn register(&mut self, subsystem: Arc<dyn Subsystem>) -> Result<(), LoopError> {
        if self.handle.is_some() {
            return Err(LoopError::AlreadyStarted);
        }
        self.subsystems
            .push(subsystem)
            .map_err(|_| LoopError::Capacity(MAX_SUBSYSTEMS))
    }

    /// Start the loop thread: `on_start` for every subsystem, then the
    /// periodic cycle.
    pub fn start(&mut self) -> Result<(), LoopError> {
        if self.handle.is_some() {
            return Err(LoopError::AlreadyStarted);
        }
        self.shared.running.store(true, Ordering::SeqCst);

        let period = self.period;
        let rt = self.rt;
        let subsystems = self.subsystems.clone();
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("mech-cycle".into())
            .spawn(move || loop_thread(period, rt, &subsystems, &shared))
            .map_err(|e| LoopError::Spawn(e.to_string()))?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Halt the loop thread and run `on_stop` for every subsystem.
    pub fn stop(&mut self) -> Result<(), LoopError> {
        let handle = self.handle.take().ok_or(LoopError::NotRunning)?;
        self.shared.running.store(false, Ordering::SeqCst);
        if handle.join().is_err() {
            error!("cycle thread panicked");
        }
        Ok(())
    }

    /// True while the loop thread is live.
    pub fn is_running(&self) -> bool {
        self.handle.is_some() && self.shared.running.load(Ordering::SeqCst)
    }

    /// Snapshot of the timing statistics.
    pub fn stats(&self) -> CycleStats {
        self.shared.stats.lock().clone()
    }
}

fn loop_thread(
    period: Duration,
    rt: Option<RtOptions>,
    subsystems: &heapless::Vec<Arc<dyn Subsystem>, MAX_SUBSYSTEMS>,
    shared: &LoopShared,
) {
    if let Some(ref opts) = rt {
        if let Err(e) = rt_setup(opts) {
            error!("cycle thread RT setup failed: {e}");
            shared.running.store(false, Ordering::SeqCst);
            return;
        }
    }
    let mut pacer = match Pacer::new(period) {
        Ok(p) => p,
        Err(e) => {
            error!("cycle pacer init failed: {e}");
            shared.running.store(false, Ordering::SeqCst);
            return;
        }
    };

    let epoch = Instant::now();
    info!(
        subsystems = subsystems.len(),
        period_us = period.as_micros() as u64,
        "cycle runner starting"
    );
    let now = epoch.elapsed();
    for subsystem in subsystems {
        debug!(subsystem = subsystem.name(), "on_start");
        subsystem.on_start(now);
    }

    while shared.running.load(Ordering::SeqCst) {
        let cycle_start = Instant::now();
        let now = epoch.elapsed();
        for subsystem in subsystems {
            subsystem.on_loop(now);
        }
        let spent = cycle_start.elapsed();
        {
            let mut stats = shared.stats.lock();
            stats.record(spent.as_nanos() as i64);
            if spent > period {
                stats.overruns += 1;
                warn!(
                    actual_us = spent.as_micros() as u64,
                    budget_us = period.as_micros() as u64,
                    "cycle overrun"
                );
            }
        }
        pacer.wait(spent);
    }

    let now = epoch.elapsed();
    for subsystem in subsystems {
        debug!(subsystem = subsystem.name(), "on_stop");
        subsystem.on_stop(now);
    }
    info!("cycle runner stopped");
}

// ─── Tests ──────────────────────────────────────────────────────────
