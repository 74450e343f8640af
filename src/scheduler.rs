// src/scheduler.rs
//! Cycle Scheduler: fixed-period timers driving the watcher and indexer
//! loops, each guarded so at most one run of its own kind is in flight.
//! A tick that lands while a run is still going is skipped, never queued.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CycleState {
    Idle = 0,
    Running = 1,
}

/// Re-entrancy guard for one cycle type. Owned by its scheduler loop,
/// never read globally.
#[derive(Debug, Default)]
pub struct CycleGuard {
    state: AtomicU8,
}

impl CycleGuard {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(CycleState::Idle as u8),
        }
    }

    /// Idle -> Running, or false when a run is already in flight.
    pub fn try_begin(&self) -> bool {
        self.state
            .compare_exchange(
                CycleState::Idle as u8,
                CycleState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn finish(&self) {
        self.state.store(CycleState::Idle as u8, Ordering::Release);
    }

    pub fn state(&self) -> CycleState {
        if self.state.load(Ordering::Acquire) == CycleState::Running as u8 {
            CycleState::Running
        } else {
            CycleState::Idle
        }
    }
}

/// Returns the guard to Idle even if the cycle body panics.
struct GuardReset(Arc<CycleGuard>);

impl Drop for GuardReset {
    fn drop(&mut self) {
        self.0.finish();
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CycleCfg {
    pub interval_secs: u64,
}

/// Spawn a ticker loop that runs `run` once per interval under a cycle
/// guard. Shutdown via the watch channel stops the timer and lets an
/// in-flight run finish before the task exits.
pub fn spawn_cycle<F, Fut>(
    name: &'static str,
    cfg: CycleCfg,
    mut shutdown: watch::Receiver<bool>,
    run: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let guard = Arc::new(CycleGuard::new());
        let run = Arc::new(run);
        let mut ticker =
            tokio::time::interval(Duration::from_secs(cfg.interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight: Option<JoinHandle<()>> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !guard.try_begin() {
                        tracing::debug!(cycle = name, "previous run still in flight, tick skipped");
                        counter!("cycle_ticks_skipped_total", "cycle" => name).increment(1);
                        continue;
                    }
                    let reset = GuardReset(guard.clone());
                    let run = run.clone();
                    in_flight = Some(tokio::spawn(async move {
                        let _reset = reset;
                        run().await;
                    }));
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        if let Some(handle) = in_flight.take() {
            let _ = handle.await;
        }
        tracing::info!(cycle = name, "scheduler stopped");
    })
}
