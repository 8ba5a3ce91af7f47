//! Idle-driven pumping of the native event loop.
//!
//! The controller pumps the display on the UI thread, either until asked to
//! stop or until no activity has been seen for the idle threshold. While it
//! pumps, it records when the last event was processed; callers use that to
//! wait for the UI to settle.

use std::{
    cell::Cell,
    marker::PhantomData,
    rc::Rc,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        mpsc,
    },
    time::{Duration, Instant},
};

use crate::{
    display::{Display, TimerId, Waker},
    error::{Error, LoopDispatchError, Result},
    executor::{Job, UiThread, current_display},
    poll,
};

/// Default quiet time after which an idle-watching run stops.
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_millis(500);
/// Default slack added to the idle threshold when arming the wake timer.
pub const DEFAULT_WAKE_MARGIN: Duration = Duration::from_millis(100);

/// What the loop controller is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    /// No run is pumping.
    Idle,
    /// Pumping until explicitly stopped.
    ActiveUnbounded,
    /// Pumping until the idle threshold passes with no activity.
    ActiveIdleWatch,
}

/// Loop controller settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    /// Quiet time after which an idle-watching run stops.
    pub idle_threshold: Duration,
    /// Slack added to the idle threshold when arming the wake timer.
    pub wake_margin: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
            wake_margin: DEFAULT_WAKE_MARGIN,
        }
    }
}

/// Loop state shared between the UI thread and callers. The loop controller
/// writes it; the session only refreshes the activity timestamp between
/// tests.
#[derive(Debug)]
pub struct LoopState {
    /// Base for the timestamps below.
    epoch: Instant,
    /// Has a run been requested and not yet stopped?
    loop_enabled: AtomicBool,
    /// Is the UI thread inside a pump run?
    pumping: AtomicBool,
    /// Is the current run idle-watching?
    idle_watch: AtomicBool,
    /// Is an event being processed right now?
    busy: AtomicBool,
    /// Has a stop been requested for the current run?
    stop_requested: AtomicBool,
    /// Was the display woken explicitly since the last check?
    woken: AtomicBool,
    /// Pending toolkit timers, excluding the controller's own wake timer.
    /// Only meaningful while a run pumps; zero otherwise.
    foreign_timers: AtomicUsize,
    /// Nanoseconds from `epoch` to the last observed activity.
    last_event: AtomicU64,
    /// Incremented for every run.
    generation: AtomicU64,
}

impl LoopState {
    /// Construct a fresh state with the activity timestamp set to now.
    pub(crate) fn new() -> Self {
        Self {
            epoch: Instant::now(),
            loop_enabled: AtomicBool::new(false),
            pumping: AtomicBool::new(false),
            idle_watch: AtomicBool::new(false),
            busy: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            woken: AtomicBool::new(false),
            foreign_timers: AtomicUsize::new(0),
            last_event: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    /// Nanoseconds since the epoch.
    fn now_nanos(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    /// Has a run been requested and not yet stopped?
    pub fn is_loop_enabled(&self) -> bool {
        self.loop_enabled.load(Ordering::SeqCst)
    }

    /// Is the UI thread inside a pump run?
    pub fn is_pumping(&self) -> bool {
        self.pumping.load(Ordering::SeqCst)
    }

    /// The current mode.
    pub fn mode(&self) -> LoopMode {
        if !self.is_pumping() {
            LoopMode::Idle
        } else if self.idle_watch.load(Ordering::SeqCst) {
            LoopMode::ActiveIdleWatch
        } else {
            LoopMode::ActiveUnbounded
        }
    }

    /// When activity was last observed.
    pub fn last_event(&self) -> Instant {
        self.epoch + Duration::from_nanos(self.last_event.load(Ordering::SeqCst))
    }

    /// Time since activity was last observed.
    pub fn idle_for(&self) -> Duration {
        let last = self.last_event.load(Ordering::SeqCst);
        Duration::from_nanos(self.now_nanos().saturating_sub(last))
    }

    /// Has the UI been quiet for at least `min_idle`, with nothing being
    /// processed and no timers waiting to fire? Timers only count while a run
    /// pumps, since nothing fires them otherwise.
    pub fn is_quiet(&self, min_idle: Duration) -> bool {
        let timers_pending =
            self.is_pumping() && self.foreign_timers.load(Ordering::SeqCst) != 0;
        !self.busy.load(Ordering::SeqCst) && !timers_pending && self.idle_for() >= min_idle
    }

    /// Record activity now.
    pub(crate) fn touch(&self) {
        self.last_event.store(self.now_nanos(), Ordering::SeqCst);
    }

    /// Clear the wake flag and refresh the activity timestamp. A pending stop
    /// request is left alone: the run it targets must still see it, and
    /// [`begin`](Self::begin) clears a stale one.
    pub(crate) fn reset(&self) {
        self.woken.store(false, Ordering::SeqCst);
        self.touch();
    }

    /// Mark the start of a run, returning its generation.
    fn begin(&self, mode: LoopMode) -> u64 {
        self.stop_requested.store(false, Ordering::SeqCst);
        self.idle_watch
            .store(mode == LoopMode::ActiveIdleWatch, Ordering::SeqCst);
        self.loop_enabled.store(true, Ordering::SeqCst);
        self.pumping.store(true, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Mark the end of a run.
    fn end(&self) {
        self.pumping.store(false, Ordering::SeqCst);
        self.idle_watch.store(false, Ordering::SeqCst);
        self.loop_enabled.store(false, Ordering::SeqCst);
        self.busy.store(false, Ordering::SeqCst);
        self.foreign_timers.store(0, Ordering::SeqCst);
    }

    /// Is the run with this generation still active?
    fn is_active_run(&self, generation: u64) -> bool {
        self.is_pumping()
            && !self.stop_requested.load(Ordering::SeqCst)
            && self.generation.load(Ordering::SeqCst) == generation
    }
}

/// Errors captured from event handlers while the loop pumps in the
/// background. Any thread may push; the session drains.
#[derive(Debug, Clone, Default)]
pub struct ErrorQueue {
    /// Captured errors, oldest first.
    inner: Arc<Mutex<Vec<LoopDispatchError>>>,
}

impl ErrorQueue {
    /// Lock the queue, ignoring poisoning: the contents are plain values.
    fn lock(&self) -> MutexGuard<'_, Vec<LoopDispatchError>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an error.
    pub fn push(&self, err: LoopDispatchError) {
        self.lock().push(err);
    }

    /// Remove and return all captured errors.
    pub fn drain(&self) -> Vec<LoopDispatchError> {
        self.lock().drain(..).collect()
    }

    /// Discard all captured errors.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of captured errors.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Is the queue empty?
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Returned when a background run starts. Dropping the handle does not stop
/// the run.
#[derive(Debug)]
pub struct RunHandle {
    /// The run's mode.
    mode: LoopMode,
    /// Signalled when the run ends.
    done: mpsc::Receiver<()>,
}

impl RunHandle {
    /// The run's mode.
    pub fn mode(&self) -> LoopMode {
        self.mode
    }

    /// Block until the run ends.
    pub fn join(self) -> Result<()> {
        self.done
            .recv()
            .map_err(|_| Error::Executor("loop run was dropped before it started".into()))
    }
}

/// How a task reached the UI thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Route {
    /// Handed straight to the idle executor.
    Direct,
    /// Posted into the pumping loop's native queue.
    Posted,
}

/// Pumps the native event loop on the UI thread.
pub struct LoopController<D: Display> {
    /// Shared loop state.
    state: LoopState,
    /// Errors captured while pumping.
    errors: ErrorQueue,
    /// The UI thread.
    executor: Arc<UiThread>,
    /// Handle onto the display's native queue.
    waker: Arc<dyn Waker>,
    /// Serialises starting a run against routing a task.
    transition: Mutex<()>,
    /// Settings.
    config: LoopConfig,
    /// Set by the wake timer so that its firing is not counted as activity.
    own_timer_fired: AtomicBool,
    /// Display type marker.
    display: PhantomData<fn() -> D>,
}

impl<D: Display> LoopController<D> {
    /// Construct a controller for the display hosted by `executor`.
    pub(crate) fn new(executor: Arc<UiThread>, waker: Arc<dyn Waker>, config: LoopConfig) -> Self {
        Self {
            state: LoopState::new(),
            errors: ErrorQueue::default(),
            executor,
            waker,
            transition: Mutex::new(()),
            config,
            own_timer_fired: AtomicBool::new(false),
            display: PhantomData,
        }
    }

    /// Shared loop state.
    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Errors captured while pumping.
    pub fn errors(&self) -> &ErrorQueue {
        &self.errors
    }

    /// Settings.
    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Is a run pumping right now?
    pub fn is_pumping(&self) -> bool {
        self.state.is_pumping()
    }

    /// Take the transition lock.
    fn lock_transition(&self) -> MutexGuard<'_, ()> {
        self.transition
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Start pumping on the UI thread. With `stop_on_idle`, the run stops once
    /// the idle threshold passes without activity; otherwise it runs until
    /// [`request_stop`](Self::request_stop). Returns `None` without doing
    /// anything if a run is already pumping.
    pub fn run_background(self: &Arc<Self>, stop_on_idle: bool) -> Result<Option<RunHandle>> {
        let _guard = self.lock_transition();
        if self.state.is_pumping() {
            return Ok(None);
        }
        let mode = if stop_on_idle {
            LoopMode::ActiveIdleWatch
        } else {
            LoopMode::ActiveUnbounded
        };
        let generation = self.state.begin(mode);
        let (done_tx, done_rx) = mpsc::channel();
        let this = Arc::clone(self);
        let job: Job = Box::new(move || {
            match current_display::<D>() {
                Some(display) => this.pump(&display, mode, generation),
                None => this.finish(),
            }
            if done_tx.send(()).is_err() {
                tracing::trace!(generation, "run handle dropped");
            }
        });
        tracing::debug!(?mode, generation, "starting loop");
        if let Err(e) = self.executor.execute(job) {
            self.state.end();
            return Err(e);
        }
        Ok(Some(RunHandle {
            mode,
            done: done_rx,
        }))
    }

    /// Ask the current run to stop, and break any pending sleep.
    pub fn request_stop(&self) {
        self.state.stop_requested.store(true, Ordering::SeqCst);
        self.state.loop_enabled.store(false, Ordering::SeqCst);
        self.waker.wake();
    }

    /// Wake the display. Counts as activity.
    pub fn wake(&self) {
        self.state.woken.store(true, Ordering::SeqCst);
        self.waker.wake();
    }

    /// Run one idle-bounded pass and wait for it to end. Does nothing if a run
    /// is already pumping.
    pub fn flush(self: &Arc<Self>) -> Result<()> {
        if self.executor.is_current() {
            return Err(Error::Precondition(
                "flush must not be called from the ui thread".into(),
            ));
        }
        match self.run_background(true)? {
            Some(run) => run.join(),
            None => Ok(()),
        }
    }

    /// Wait until `min_idle` has passed with no activity. Returns `false` if
    /// that does not happen within `timeout`. Must not be called from the UI
    /// thread, which would never get to process the events being waited on.
    pub fn wait_for_idle(&self, timeout: Duration, min_idle: Duration) -> Result<bool> {
        if self.executor.is_current() {
            return Err(Error::Precondition(
                "wait_for_idle must not be called from the ui thread".into(),
            ));
        }
        Ok(poll::wait_until(timeout, || self.state.is_quiet(min_idle)))
    }

    /// Wait for any run to end.
    pub(crate) fn wait_stopped(&self, timeout: Duration) -> bool {
        poll::wait_until(timeout, || !self.state.is_pumping())
    }

    /// Deliver a task to the UI thread: straight to the executor if no run is
    /// pumping, otherwise through the native queue.
    pub(crate) fn route(&self, job: Job) -> Result<Route> {
        let _guard = self.lock_transition();
        if self.state.is_pumping() {
            self.waker.async_exec(job);
            Ok(Route::Posted)
        } else {
            self.executor.execute(job)?;
            Ok(Route::Direct)
        }
    }

    /// Mark the current run finished.
    fn finish(&self) {
        let _guard = self.lock_transition();
        self.state.end();
    }

    /// The pump. Runs on the UI thread until the run's exit condition holds.
    fn pump(self: &Arc<Self>, display: &D, mode: LoopMode, generation: u64) {
        let _finish = scopeguard::guard((), |()| self.finish());
        self.errors.clear();
        self.state.touch();
        let armed = Rc::new(Cell::new(None));
        if mode == LoopMode::ActiveIdleWatch {
            self.arm_wake_timer(display, generation, &armed);
        }

        loop {
            if self.state.stop_requested.load(Ordering::SeqCst) {
                tracing::debug!(generation, "loop stop requested");
                break;
            }
            if display.is_disposed() {
                tracing::debug!(generation, "display disposed, leaving loop");
                break;
            }
            if mode == LoopMode::ActiveIdleWatch
                && self.state.idle_for() > self.config.idle_threshold
            {
                tracing::debug!(generation, "loop idle, leaving");
                break;
            }
            self.step(display, &armed);
        }

        if let Some(id) = armed.take() {
            display.cancel_timer(id);
        }
    }

    /// Process one event, or sleep if none is pending.
    fn step(&self, display: &D, armed: &Cell<Option<TimerId>>) {
        self.state.busy.store(true, Ordering::SeqCst);
        let outcome = display.dispatch_one();
        match &outcome {
            Ok(true) => {
                if !self.own_timer_fired.swap(false, Ordering::SeqCst) {
                    self.state.touch();
                }
            }
            Ok(false) => {}
            Err(_) => self.state.touch(),
        }
        self.publish_timers(display, armed.get());
        self.state.busy.store(false, Ordering::SeqCst);

        match outcome {
            Ok(true) => {}
            Ok(false) => {
                display.sleep();
                if self.state.woken.swap(false, Ordering::SeqCst) {
                    self.state.touch();
                }
            }
            Err(e) => {
                let err = LoopDispatchError::from(&e);
                tracing::warn!("{err}");
                self.errors.push(err);
            }
        }
    }

    /// Publish the number of pending timers that are not ours.
    fn publish_timers(&self, display: &D, own: Option<TimerId>) {
        let foreign = display
            .pending_timers()
            .saturating_sub(usize::from(own.is_some()));
        self.state.foreign_timers.store(foreign, Ordering::SeqCst);
    }

    /// Arm a one-shot timer that wakes the loop after the idle threshold. The
    /// timer re-arms itself while the run is active, the display is live and
    /// the loop has not yet gone idle.
    fn arm_wake_timer(
        self: &Arc<Self>,
        display: &D,
        generation: u64,
        armed: &Rc<Cell<Option<TimerId>>>,
    ) {
        let this = Arc::clone(self);
        let slot = Rc::clone(armed);
        let delay = self.config.idle_threshold + self.config.wake_margin;
        let id = display.timer_exec(
            delay,
            Box::new(move || {
                slot.set(None);
                this.own_timer_fired.store(true, Ordering::SeqCst);
                if !this.state.is_active_run(generation) {
                    return;
                }
                let Some(display) = current_display::<D>() else {
                    return;
                };
                if display.is_disposed() || this.state.idle_for() > this.config.idle_threshold {
                    return;
                }
                this.arm_wake_timer(&display, generation, &slot);
            }),
        );
        armed.set(Some(id));
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn state_transitions() {
        let s = LoopState::new();
        assert_eq!(s.mode(), LoopMode::Idle);
        assert!(!s.is_loop_enabled());

        let g = s.begin(LoopMode::ActiveIdleWatch);
        assert_eq!(g, 1);
        assert_eq!(s.mode(), LoopMode::ActiveIdleWatch);
        assert!(s.is_active_run(1));
        assert!(!s.is_active_run(2));

        s.stop_requested.store(true, Ordering::SeqCst);
        assert!(!s.is_active_run(1));
        s.end();
        assert_eq!(s.mode(), LoopMode::Idle);

        assert_eq!(s.begin(LoopMode::ActiveUnbounded), 2);
        assert_eq!(s.mode(), LoopMode::ActiveUnbounded);
        assert!(s.is_active_run(2));

        // A reset between tests keeps an unseen stop request.
        s.stop_requested.store(true, Ordering::SeqCst);
        s.reset();
        assert!(!s.is_active_run(2));
    }

    #[test]
    fn quiet_requires_idle_time_and_no_work() {
        let s = LoopState::new();
        s.touch();
        assert!(!s.is_quiet(Duration::from_millis(20)));
        thread::sleep(Duration::from_millis(30));
        assert!(s.is_quiet(Duration::from_millis(20)));

        s.busy.store(true, Ordering::SeqCst);
        assert!(!s.is_quiet(Duration::from_millis(20)));
        s.busy.store(false, Ordering::SeqCst);

        // Timers left behind by a finished run can never fire.
        s.foreign_timers.store(1, Ordering::SeqCst);
        assert!(s.is_quiet(Duration::from_millis(20)));
        s.begin(LoopMode::ActiveUnbounded);
        s.foreign_timers.store(1, Ordering::SeqCst);
        assert!(!s.is_quiet(Duration::from_millis(20)));
        s.end();
        assert_eq!(s.foreign_timers.load(Ordering::SeqCst), 0);
        thread::sleep(Duration::from_millis(30));
        assert!(s.is_quiet(Duration::from_millis(20)));

        s.touch();
        assert!(s.idle_for() < Duration::from_millis(20));
        assert!(s.last_event() <= Instant::now());
    }

    #[test]
    fn error_queue() {
        let q = ErrorQueue::default();
        let producer = q.clone();
        thread::spawn(move || {
            producer.push(LoopDispatchError::new("one"));
            producer.push(LoopDispatchError::new("two"));
        })
        .join()
        .unwrap();
        assert_eq!(q.len(), 2);
        let drained = q.drain();
        assert_eq!(drained[0].message(), "one");
        assert_eq!(drained[1].message(), "two");
        assert!(q.is_empty());

        q.push(LoopDispatchError::new("three"));
        q.clear();
        assert!(q.is_empty());
    }
}
