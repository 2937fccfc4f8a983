use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use log::{debug, error, info, trace};

use crate::config::{UpdateConfig, UpdateMode};
use crate::error::{UpdateError, UpdateResult};
use crate::presentation::PresentationCache;
use crate::service::{AvatarSimulationService, PresentationHost, RateSink};
use crate::signals::StopSignal;
use crate::state::{RunState, SharedRunState};
use crate::time::{pacing_sleep_usec, FramePacer, USECS_PER_SECOND};

pub const UPDATE_THREAD_NAME: &str = "Avatar Update";

/// Everything one step needs. Owned by whichever thread is stepping.
struct Stepper {
    service: Box<dyn AvatarSimulationService>,
    pacer: Box<dyn FramePacer>,
    sink: Option<Arc<dyn RateSink>>,
    target_interval_usec: u64,
    last_update_usec: u64,
}

impl Stepper {
    fn step(&mut self, paced: bool) {
        let perf = Instant::now();
        let start = self.pacer.now_usec();

        // Signed so a skewed clock hands a negative delta to the simulation.
        let delta_usec = (start as i64).wrapping_sub(self.last_update_usec as i64);
        let delta_seconds = delta_usec as f32 / USECS_PER_SECOND as f32;

        if let Some(sink) = self.sink.as_deref() {
            sink.report_rate(1.0 / delta_seconds);
        }

        self.service.update_others(delta_seconds);
        self.service.update_look_at_target();
        self.service.update_self(delta_seconds);

        if let Some(sink) = self.sink.as_deref() {
            sink.record_step(perf.elapsed());
        }

        if paced {
            let elapsed = self.pacer.now_usec().saturating_sub(start);
            let sleep = pacing_sleep_usec(self.target_interval_usec, elapsed);
            self.pacer.sleep_usec(sleep);
        }

        self.last_update_usec = start;
    }
}

struct Worker {
    join: JoinHandle<Option<Stepper>>,
    exited: Receiver<()>,
}

/// Drives the per-frame avatar step.
///
/// In [`UpdateMode::Synchronous`] the host calls [`step`](Self::step) every
/// frame. In [`UpdateMode::Threaded`], `start(true)` moves the stepping state
/// onto one background thread that loops at the target rate until stopped.
/// [`synchronous_auxiliary_step`](Self::synchronous_auxiliary_step) always
/// runs on the host thread.
///
/// The first step measures its delta from timestamp zero of the pacer's
/// clock. For [`SystemPacer`](crate::time::SystemPacer) that is the process
/// epoch, so the first delta (and reported rate) is arbitrary and may even be
/// zero. Callers should ignore it.
pub struct AvatarUpdateScheduler {
    mode: UpdateMode,
    target_interval_usec: u64,

    stepper: Option<Stepper>,
    worker: Option<Worker>,

    state: SharedRunState,
    stop: StopSignal,
    presentation: PresentationCache,
}

impl AvatarUpdateScheduler {
    pub fn new(
        cfg: &UpdateConfig,
        service: Box<dyn AvatarSimulationService>,
        pacer: Box<dyn FramePacer>,
    ) -> UpdateResult<Self> {
        let target_interval_usec = cfg.target_interval_usec()?;
        debug!(
            "avatar update using {} at {} microseconds",
            cfg.update_type, target_interval_usec
        );

        Ok(Self {
            mode: cfg.update_type,
            target_interval_usec,
            stepper: Some(Stepper {
                service,
                pacer,
                sink: None,
                target_interval_usec,
                last_update_usec: 0,
            }),
            worker: None,
            state: SharedRunState::new(RunState::Idle),
            stop: StopSignal::new(),
            presentation: PresentationCache::new(),
        })
    }

    /// Attaches the simrate sink. Has no effect once the background thread owns the step.
    pub fn with_rate_sink(mut self, sink: Arc<dyn RateSink>) -> Self {
        if let Some(stepper) = self.stepper.as_mut() {
            stepper.sink = Some(sink);
        }
        self
    }

    /// Shares an existing cache, e.g. one the simulation already holds.
    pub fn with_presentation(mut self, cache: PresentationCache) -> Self {
        self.presentation = cache;
        self
    }

    #[inline]
    pub fn mode(&self) -> UpdateMode {
        self.mode
    }

    #[inline]
    pub fn target_interval_usec(&self) -> u64 {
        self.target_interval_usec
    }

    #[inline]
    pub fn run_state(&self) -> RunState {
        self.state.get()
    }

    /// True while a background update thread exists (running or not yet joined).
    #[inline]
    pub fn is_threaded(&self) -> bool {
        self.worker.is_some()
    }

    /// Start of the last completed step. `None` while the background thread owns it.
    #[inline]
    pub fn last_update_usec(&self) -> Option<u64> {
        self.stepper.as_ref().map(|s| s.last_update_usec)
    }

    /// Handle for simulation code that needs the host's presentation state.
    #[inline]
    pub fn presentation(&self) -> PresentationCache {
        self.presentation.clone()
    }

    /// Starts the scheduler. Only the first call does anything.
    ///
    /// With `threaded` set and a threaded mode, spawns the background loop.
    /// Otherwise the host keeps calling `step()` itself.
    pub fn start(&mut self, threaded: bool) -> UpdateResult<()> {
        if self.state.get() != RunState::Idle {
            debug!("avatar update already started ({})", self.state.get().as_str());
            return Ok(());
        }

        if threaded && self.mode == UpdateMode::Threaded {
            self.spawn_worker()?;
        }

        self.state.set(RunState::Running);
        Ok(())
    }

    fn spawn_worker(&mut self) -> UpdateResult<()> {
        let Some(stepper) = self.stepper.take() else {
            return Ok(());
        };

        // The stepper travels through a channel so a failed spawn can take it back.
        let (hand_tx, hand_rx) = bounded::<Stepper>(1);
        let (exit_tx, exit_rx) = bounded::<()>(1);
        // Empty bounded(1) channel with a live receiver: this send cannot fail.
        let sent = hand_tx.send(stepper);
        debug_assert!(sent.is_ok());

        let stop = self.stop.clone();
        let thread_rx = hand_rx.clone();

        let spawned = thread::Builder::new()
            .name(UPDATE_THREAD_NAME.to_owned())
            .spawn(move || {
                let Ok(mut stepper) = thread_rx.recv() else {
                    return None;
                };
                info!(
                    "avatar update thread started ({} us interval)",
                    stepper.target_interval_usec
                );

                while !stop.is_stop_requested() {
                    stepper.step(true);
                }

                debug!("avatar update thread exiting");
                let _ = exit_tx.send(());
                Some(stepper)
            });

        match spawned {
            Ok(join) => {
                self.worker = Some(Worker { join, exited: exit_rx });
                Ok(())
            }
            Err(e) => {
                self.stepper = hand_rx.try_recv().ok();
                error!("cannot spawn avatar update thread: {e}");
                Err(UpdateError::Spawn(e))
            }
        }
    }

    /// Stops the scheduler and joins the background thread, if any.
    ///
    /// Waits for the in-flight step (including its pacing sleep) to finish.
    /// Idempotent, and fine to call before `start`.
    pub fn stop(&mut self) {
        if self.state.get() == RunState::Terminated {
            return;
        }

        self.stop.request_stop();
        self.state.set(RunState::Terminating);

        if let Some(worker) = self.worker.take() {
            self.join_worker(worker);
        }

        self.state.set(RunState::Terminated);
    }

    /// Like [`stop`](Self::stop), but waits at most `timeout` for the thread.
    ///
    /// Returns `false` if the thread is still inside its step. The state then
    /// stays `Terminating` and a later `stop()` (or drop) finishes the join.
    pub fn stop_timeout(&mut self, timeout: Duration) -> bool {
        if self.worker.is_none() {
            self.stop();
            return true;
        }

        self.stop.request_stop();
        self.state.set(RunState::Terminating);

        let exited = match self.worker.as_ref().map(|w| w.exited.recv_timeout(timeout)) {
            Some(Err(RecvTimeoutError::Timeout)) => false,
            _ => true,
        };
        if !exited {
            debug!("avatar update thread still busy after {timeout:?}");
            return false;
        }

        self.stop();
        true
    }

    fn join_worker(&mut self, worker: Worker) {
        match worker.join.join() {
            Ok(Some(stepper)) => self.stepper = Some(stepper),
            Ok(None) => {}
            Err(_) => error!("avatar update thread panicked"),
        }
    }

    /// One avatar tick on the caller's thread. Never paced.
    ///
    /// Does nothing while the background thread owns the step.
    pub fn step(&mut self) {
        match self.stepper.as_mut() {
            Some(stepper) => stepper.step(false),
            None => trace!("avatar step skipped: owned by update thread"),
        }
    }

    /// Host-thread hook run every frame in either mode.
    ///
    /// Caches presentation mode and head pose for asynchronous readers and
    /// serves a pending billboard refresh.
    pub fn synchronous_auxiliary_step(&self, host: &mut dyn PresentationHost) {
        self.presentation.refresh_from(host);
    }
}

impl Drop for AvatarUpdateScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::HeadPose;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Calls {
        order: Vec<&'static str>,
        deltas: Vec<f32>,
    }

    struct Recorder(Arc<Mutex<Calls>>);

    impl AvatarSimulationService for Recorder {
        fn update_others(&mut self, delta_seconds: f32) {
            let mut c = self.0.lock();
            c.order.push("others");
            c.deltas.push(delta_seconds);
        }

        fn update_look_at_target(&mut self) {
            self.0.lock().order.push("look_at");
        }

        fn update_self(&mut self, _delta_seconds: f32) {
            self.0.lock().order.push("self");
        }
    }

    struct FixedClock {
        now: u64,
        sleeps: Arc<Mutex<Vec<u64>>>,
    }

    impl FramePacer for FixedClock {
        fn now_usec(&self) -> u64 {
            self.now
        }

        fn sleep_usec(&self, usec: u64) {
            self.sleeps.lock().push(usec);
        }
    }

    fn scheduler(mode: UpdateMode) -> (AvatarUpdateScheduler, Arc<Mutex<Calls>>, Arc<Mutex<Vec<u64>>>) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let sleeps = Arc::new(Mutex::new(Vec::new()));
        let s = AvatarUpdateScheduler::new(
            &UpdateConfig::new(mode, 60),
            Box::new(Recorder(calls.clone())),
            Box::new(FixedClock { now: 2_000_000, sleeps: sleeps.clone() }),
        )
        .unwrap();
        (s, calls, sleeps)
    }

    #[test]
    fn step_calls_collaborators_in_order() {
        let (mut s, calls, sleeps) = scheduler(UpdateMode::Synchronous);
        s.step();
        assert_eq!(calls.lock().order, vec!["others", "look_at", "self"]);
        assert!(sleeps.lock().is_empty());
        assert_eq!(s.last_update_usec(), Some(2_000_000));
    }

    #[test]
    fn first_delta_is_measured_from_zero() {
        let (mut s, calls, _) = scheduler(UpdateMode::Synchronous);
        s.step();
        assert_eq!(calls.lock().deltas, vec![2.0]);
    }

    #[test]
    fn paced_step_sleeps_remaining_interval() {
        let (mut s, _, sleeps) = scheduler(UpdateMode::Threaded);
        // The fixed clock reports zero elapsed time, so the whole interval is slept.
        s.stepper.as_mut().unwrap().step(true);
        assert_eq!(*sleeps.lock(), vec![16_667]);
    }

    #[test]
    fn zero_rate_is_rejected_at_construction() {
        let r = AvatarUpdateScheduler::new(
            &UpdateConfig::new(UpdateMode::Threaded, 0),
            Box::new(Recorder(Arc::default())),
            Box::new(FixedClock { now: 0, sleeps: Arc::default() }),
        );
        assert!(matches!(r, Err(UpdateError::InvalidRate(0))));
    }

    #[test]
    fn sink_attached_before_start_sees_samples() {
        struct Count(Mutex<u32>);
        impl RateSink for Count {
            fn report_rate(&self, _ticks_per_second: f32) {
                *self.0.lock() += 1;
            }
        }

        let (s, _, _) = scheduler(UpdateMode::Synchronous);
        let sink = Arc::new(Count(Mutex::new(0)));
        let mut s = s.with_rate_sink(sink.clone());
        s.step();
        s.step();
        assert_eq!(*sink.0.lock(), 2);
    }

    #[test]
    fn auxiliary_step_leaves_timestamp_and_state_alone() {
        struct Host;
        impl PresentationHost for Host {
            fn is_hmd_mode(&self) -> bool {
                true
            }
            fn head_pose(&self) -> HeadPose {
                HeadPose::IDENTITY
            }
            fn refresh_billboard(&mut self) {}
        }

        let (s, _, _) = scheduler(UpdateMode::Synchronous);
        s.synchronous_auxiliary_step(&mut Host);
        assert_eq!(s.last_update_usec(), Some(0));
        assert_eq!(s.run_state(), RunState::Idle);
        assert!(s.presentation().is_hmd_mode());
    }
}
