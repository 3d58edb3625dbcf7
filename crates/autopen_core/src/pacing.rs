//! crates/autopen_core/src/pacing.rs
//!
//! The pacing policy for long-running analysis calls: a small state machine
//! over elapsed-time thresholds instead of nested timers.
//!
//! Phases: `Running` until the soft threshold, `Degraded` (still working,
//! caller is notified once, nothing is cancelled) until the hard threshold,
//! then `ForcedComplete` (the operation is treated as complete-enough and
//! the workflow moves forward with placeholder content).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

/// Monotonic time source, injectable so the policy is testable without
/// real waiting.
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// Wall-clock implementation anchored at construction time.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Phase of a paced operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacePhase {
    Running,
    Degraded,
    ForcedComplete,
}

/// Elapsed-time thresholds for one class of operation.
#[derive(Debug, Clone, Copy)]
pub struct PacingPolicy {
    /// Past this, the operation is reported as still-working.
    pub soft: Duration,
    /// Past this, forward progress is forced.
    pub hard: Duration,
}

impl PacingPolicy {
    pub fn new(soft: Duration, hard: Duration) -> Self {
        debug_assert!(soft <= hard);
        Self { soft, hard }
    }

    /// Pure phase decision for a given elapsed time.
    pub fn phase(&self, elapsed: Duration) -> PacePhase {
        if elapsed >= self.hard {
            PacePhase::ForcedComplete
        } else if elapsed >= self.soft {
            PacePhase::Degraded
        } else {
            PacePhase::Running
        }
    }
}

/// A started paced operation, tracked against an injected clock.
pub struct Pacer {
    policy: PacingPolicy,
    clock: Arc<dyn Clock>,
    started: Duration,
}

impl Pacer {
    pub fn start(policy: PacingPolicy, clock: Arc<dyn Clock>) -> Self {
        let started = clock.now();
        Self {
            policy,
            clock,
            started,
        }
    }

    pub fn phase(&self) -> PacePhase {
        let elapsed = self.clock.now().saturating_sub(self.started);
        self.policy.phase(elapsed)
    }
}

/// Outcome of driving a future under a pacing policy.
#[derive(Debug)]
pub enum PacedOutcome<T> {
    /// The work finished on its own; `degraded` is true when it crossed
    /// the soft threshold first.
    Completed { value: T, degraded: bool },
    /// The hard ceiling elapsed; the work was dropped.
    Forced,
}

/// Drive `work` under `policy`. `on_degraded` is invoked exactly once if
/// the soft threshold elapses while the work is still running.
pub async fn run_paced<T, F, D>(policy: PacingPolicy, work: F, mut on_degraded: D) -> PacedOutcome<T>
where
    F: Future<Output = T>,
    D: FnMut(),
{
    tokio::pin!(work);
    let soft = tokio::time::sleep(policy.soft);
    tokio::pin!(soft);
    let hard = tokio::time::sleep(policy.hard);
    tokio::pin!(hard);

    let mut degraded = false;
    loop {
        tokio::select! {
            value = &mut work => {
                return PacedOutcome::Completed { value, degraded };
            }
            _ = &mut soft, if !degraded => {
                degraded = true;
                on_degraded();
            }
            _ = &mut hard => {
                return PacedOutcome::Forced;
            }
        }
    }
}
