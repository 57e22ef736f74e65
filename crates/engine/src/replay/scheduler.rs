use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::throttle::Throttle;
use crate::error::{EngineError, Result};
use crate::trace::{Activity, Trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayState {
    Stopped,
    Playing,
    Paused,
}

struct Shared {
    state: Mutex<ReplayState>,
    /// Signalled on every state change and on unpause/stop requests.
    wake: Condvar,
    pause_requested: AtomicBool,
    emitted: AtomicU64,
}

enum Gate {
    Continue { paused: Duration },
    Stop,
}

/// Re-emits the activities of a parsed trace into a target trace at a
/// controlled pace.
///
/// `Stopped → Playing ⇄ Paused → Stopped`. Pause and stop requests are
/// cooperative: the replay thread observes them right before emitting each
/// activity and at least every poll interval while it waits.
pub struct ReplayScheduler {
    source: Arc<Trace>,
    throttle: Throttle,
    poll_interval: Duration,
    shared: Arc<Shared>,
    cancel: Mutex<CancellationToken>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ReplayScheduler {
    pub fn new(source: Arc<Trace>, throttle: Throttle, poll_interval: Duration) -> Self {
        Self {
            source,
            throttle,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            shared: Arc::new(Shared {
                state: Mutex::new(ReplayState::Stopped),
                wake: Condvar::new(),
                pause_requested: AtomicBool::new(false),
                emitted: AtomicU64::new(0),
            }),
            cancel: Mutex::new(CancellationToken::new()),
            worker: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ReplayState {
        *self.shared.state.lock()
    }

    /// Activities emitted by the current (or last) run.
    pub fn emitted(&self) -> u64 {
        self.shared.emitted.load(Ordering::Acquire)
    }

    /// Start replaying from the first activity into `target`. Only valid
    /// while stopped.
    pub fn play(&self, target: Arc<Trace>) -> Result<()> {
        let mut worker = self.worker.lock();
        let token = {
            let mut state = self.shared.state.lock();
            if *state != ReplayState::Stopped {
                return Err(EngineError::InvalidArgument(format!(
                    "replay of `{}` is {:?}, play needs Stopped",
                    self.source.name(),
                    *state
                )));
            }
            // fresh token and flags are in place before anyone can see Playing
            let token = CancellationToken::new();
            *self.cancel.lock() = token.clone();
            self.shared.pause_requested.store(false, Ordering::Release);
            self.shared.emitted.store(0, Ordering::Release);
            *state = ReplayState::Playing;
            token
        };
        if let Some(previous) = worker.take() {
            // already finished: state was Stopped
            if previous.join().is_err() {
                tracing::warn!(source = %self.source.name(), "replay: previous replay thread panicked");
            }
        }

        let run = ReplayRun {
            activities: self.source.all_activities(0..self.source.all_len()),
            target,
            throttle: self.throttle,
            poll: self.poll_interval,
            shared: Arc::clone(&self.shared),
            cancel: token,
        };
        tracing::info!(
            source = %self.source.name(),
            activities = run.activities.len(),
            throttle = ?self.throttle,
            "replay: started"
        );
        let spawned = thread::Builder::new()
            .name(format!("replay-{}", self.source.name()))
            .spawn(move || run.execute());
        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                *self.shared.state.lock() = ReplayState::Stopped;
                Err(EngineError::from(e).with_context("spawning replay thread"))
            }
        }
    }

    /// Ask the replay thread to pause before its next activity.
    pub fn pause(&self) {
        if self.state() == ReplayState::Playing {
            self.shared.pause_requested.store(true, Ordering::Release);
        }
    }

    pub fn unpause(&self) {
        self.shared.pause_requested.store(false, Ordering::Release);
        let _state = self.shared.state.lock();
        self.shared.wake.notify_all();
    }

    /// Ask the replay thread to stop. Returns immediately; see
    /// [`ReplayScheduler::wait_for_shutdown`].
    pub fn stop(&self) {
        // same lock order as `play`: state, then token
        let _state = self.shared.state.lock();
        self.cancel.lock().cancel();
        self.shared.wake.notify_all();
    }

    /// Block until the replay is stopped.
    pub fn wait_for_shutdown(&self) {
        let mut state = self.shared.state.lock();
        while *state != ReplayState::Stopped {
            self.shared.wake.wait(&mut state);
        }
    }

    /// Like [`ReplayScheduler::wait_for_shutdown`] with an upper bound.
    /// Returns whether the replay stopped in time.
    pub fn wait_for_shutdown_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while *state != ReplayState::Stopped {
            if self.shared.wake.wait_until(&mut state, deadline).timed_out() {
                return *state == ReplayState::Stopped;
            }
        }
        true
    }
}

impl Drop for ReplayScheduler {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }
}

struct ReplayRun {
    activities: Vec<Activity>,
    target: Arc<Trace>,
    throttle: Throttle,
    poll: Duration,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl ReplayRun {
    fn execute(self) {
        let origin = self.activities.first().map(Activity::start).unwrap_or(0.0);
        let started = Instant::now();
        let mut paused_total = Duration::ZERO;

        for (index, activity) in self.activities.iter().enumerate() {
            let due = self.throttle.due(index, activity.start() - origin);
            match self.wait_until_due(started, &mut paused_total, due) {
                Gate::Continue { .. } => {}
                Gate::Stop => break,
            }
            if let Err(e) = self.target.append(activity) {
                tracing::error!(target_trace = %self.target.name(), index, error = %e, "replay: emit failed");
                break;
            }
            self.shared.emitted.fetch_add(1, Ordering::AcqRel);
        }
        self.finished();
    }

    /// Wait, in poll-sized chunks, until `due` of unpaused time has passed
    /// since `started`. Always observes pause and stop requests at least once.
    fn wait_until_due(&self, started: Instant, paused_total: &mut Duration, due: Duration) -> Gate {
        loop {
            match self.observe_requests() {
                Gate::Stop => return Gate::Stop,
                Gate::Continue { paused } => *paused_total += paused,
            }
            let active = started.elapsed().saturating_sub(*paused_total);
            if active >= due {
                return Gate::Continue {
                    paused: Duration::ZERO,
                };
            }
            let chunk = (due - active).min(self.poll);
            let mut state = self.shared.state.lock();
            if self.cancel.is_cancelled() || self.shared.pause_requested.load(Ordering::Acquire) {
                continue;
            }
            self.shared.wake.wait_for(&mut state, chunk);
        }
    }

    /// Observe pause and stop requests. Blocks while paused.
    fn observe_requests(&self) -> Gate {
        if self.cancel.is_cancelled() {
            return Gate::Stop;
        }
        if !self.shared.pause_requested.load(Ordering::Acquire) {
            return Gate::Continue {
                paused: Duration::ZERO,
            };
        }

        let since = Instant::now();
        let mut state = self.shared.state.lock();
        *state = ReplayState::Paused;
        self.shared.wake.notify_all();
        tracing::debug!(emitted = self.shared.emitted.load(Ordering::Acquire), "replay: paused");

        while self.shared.pause_requested.load(Ordering::Acquire) && !self.cancel.is_cancelled() {
            self.shared.wake.wait_for(&mut state, self.poll);
        }
        if self.cancel.is_cancelled() {
            return Gate::Stop;
        }
        *state = ReplayState::Playing;
        self.shared.wake.notify_all();
        tracing::debug!("replay: resumed");
        Gate::Continue {
            paused: since.elapsed(),
        }
    }

    fn finished(&self) {
        let mut state = self.shared.state.lock();
        *state = ReplayState::Stopped;
        self.shared.pause_requested.store(false, Ordering::Release);
        self.shared.wake.notify_all();
        tracing::info!(
            target_trace = %self.target.name(),
            emitted = self.shared.emitted.load(Ordering::Acquire),
            "replay: stopped"
        );
    }
}
