//! One-shot completion barrier with first-failure capture.
//!
//! A phase is opened with [`CompletionBarrier::begin`] for a known number
//! of outstanding operations. Completions arrive concurrently from any
//! task; the single waiter blocks in [`CompletionBarrier::wait`] until the
//! count drains, the first failure is captured, or the deadline elapses.
//! Resolving the wait consumes the phase, so one instance serializes
//! logical phases over time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{EngineError, Result};

/// How often the waiter re-checks phase state.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

struct Phase {
    expected: u64,
    remaining: u64,
    first_error: Option<EngineError>,
    started_at: Instant,
}

struct BarrierState {
    phase: Option<Phase>,
    /// Misuse noticed in a completion context; surfaced by the next wait
    /// instead of panicking into the caller.
    latent: Option<EngineError>,
}

/// Coordinates N outstanding asynchronous operations behind one blocking
/// wait. Exactly one phase may be in flight per instance.
pub struct CompletionBarrier {
    state: Mutex<BarrierState>,
    stopping: AtomicBool,
}

impl CompletionBarrier {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BarrierState {
                phase: None,
                latent: None,
            }),
            stopping: AtomicBool::new(false),
        }
    }

    /// Open a phase expecting `expected` completions.
    ///
    /// Fails with [`EngineError::AlreadyActive`] if the previous phase has
    /// not been drained by a `wait`.
    pub fn begin(&self, expected: u64) -> Result<()> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        if state.phase.is_some() {
            return Err(EngineError::AlreadyActive);
        }
        state.phase = Some(Phase {
            expected,
            remaining: expected,
            first_error: None,
            started_at: Instant::now(),
        });
        Ok(())
    }

    /// Record one successful completion.
    ///
    /// Calling this with no phase active indicates a miscounted phase; the
    /// mistake is recorded and surfaced by the next `wait` rather than
    /// thrown into the completion context.
    pub fn complete_one(&self) {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        match state.phase.as_mut() {
            Some(phase) => {
                if phase.remaining > 0 {
                    phase.remaining -= 1;
                }
            }
            None => {
                tracing::warn!("completion arrived with no phase active");
                if state.latent.is_none() {
                    state.latent = Some(EngineError::NotActive);
                }
            }
        }
    }

    /// Record a failed completion.
    ///
    /// After [`CompletionBarrier::shutdown`] failures are logged and
    /// discarded: late completions during teardown are expected. Otherwise
    /// the first failure is kept (and still counts toward the drain so the
    /// waiter is not starved); later ones are discarded.
    pub fn fail_once(&self, err: EngineError) {
        if self.stopping.load(Ordering::Acquire) {
            tracing::info!("failure after shutdown discarded: {}", err);
            return;
        }
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        match state.phase.as_mut() {
            Some(phase) => {
                if phase.first_error.is_some() {
                    tracing::debug!("additional failure discarded: {}", err);
                    return;
                }
                tracing::warn!("phase failed: {}", err);
                phase.first_error = Some(err);
                if phase.remaining > 0 {
                    phase.remaining -= 1;
                }
            }
            None => {
                tracing::warn!("failure arrived with no phase active: {}", err);
                if state.latent.is_none() {
                    state.latent = Some(EngineError::NotActive);
                }
            }
        }
    }

    /// Block until the phase drains, its first failure is captured, or the
    /// deadline elapses. Any exit path consumes the phase, so a fresh
    /// `begin` succeeds afterwards.
    pub async fn wait(&self, deadline: Instant) -> Result<()> {
        loop {
            {
                let mut guard = self.state.lock().unwrap();
                let state = &mut *guard;

                if let Some(latent) = state.latent.take() {
                    state.phase = None;
                    return Err(latent);
                }

                let phase = match state.phase.as_mut() {
                    Some(phase) => phase,
                    None => return Err(EngineError::NotActive),
                };

                if let Some(err) = phase.first_error.take() {
                    state.phase = None;
                    return Err(err);
                }

                if phase.remaining == 0 {
                    let elapsed = phase.started_at.elapsed();
                    if phase.expected > 1 {
                        tracing::debug!(
                            "phase of {} operations completed in {:?}",
                            phase.expected,
                            elapsed
                        );
                    }
                    state.phase = None;
                    return Ok(());
                }

                if Instant::now() >= deadline {
                    let err = EngineError::DeadlineExceeded {
                        expected: phase.expected,
                        pending: phase.remaining,
                    };
                    state.phase = None;
                    return Err(err);
                }
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    /// True while a phase is in flight.
    pub fn is_active(&self) -> bool {
        self.state.lock().unwrap().phase.is_some()
    }

    /// Switch the barrier into teardown mode: from here on failures from
    /// straggling completions are discarded.
    pub fn shutdown(&self) {
        self.stopping.store(true, Ordering::Release);
    }
}

impl Default for CompletionBarrier {
    fn default() -> Self {
        Self::new()
    }
}
