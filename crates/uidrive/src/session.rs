//! The session: one UI thread, one display, and everything that drives it.

use std::{
    result::Result as StdResult,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tracing::span::EnteredSpan;

use crate::{
    bounds,
    dispatcher::{DEFAULT_POLL_SLICE, DispatchConfig, Dispatcher},
    display::Display,
    error::{BoxError, Error, LoopDispatchError, Result},
    executor::UiThread,
    geom::Rect,
    layout::{LayoutAssert, LayoutAssertAll},
    poll,
    runloop::{
        DEFAULT_IDLE_THRESHOLD, DEFAULT_WAKE_MARGIN, LoopConfig, LoopController, LoopState,
        RunHandle,
    },
};

/// Default bound on how long teardown waits for the loop to stop.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Builder for creating a session with a fluent API.
pub struct SessionBuilder<F> {
    /// Builds the display on the UI thread.
    factory: F,
    /// UI thread name.
    name: String,
    /// Loop controller settings.
    loop_config: LoopConfig,
    /// Dispatcher settings.
    dispatch_config: DispatchConfig,
    /// Bound on how long teardown waits for the loop to stop.
    shutdown_timeout: Duration,
}

impl<D, F> SessionBuilder<F>
where
    D: Display,
    F: FnOnce() -> D + Send + 'static,
{
    /// Create a new builder around a display factory.
    fn new(factory: F) -> Self {
        Self {
            factory,
            name: "uidrive-ui".into(),
            loop_config: LoopConfig {
                idle_threshold: DEFAULT_IDLE_THRESHOLD,
                wake_margin: DEFAULT_WAKE_MARGIN,
            },
            dispatch_config: DispatchConfig {
                poll_slice: DEFAULT_POLL_SLICE,
                timeout: None,
            },
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Name the UI thread.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Quiet time after which an idle-watching run stops.
    pub fn idle_threshold(mut self, threshold: Duration) -> Self {
        self.loop_config.idle_threshold = threshold;
        self
    }

    /// Slack added to the idle threshold when arming the wake timer.
    pub fn wake_margin(mut self, margin: Duration) -> Self {
        self.loop_config.wake_margin = margin;
        self
    }

    /// How often a blocked dispatch re-checks whether the loop still pumps.
    pub fn poll_slice(mut self, slice: Duration) -> Self {
        self.dispatch_config.poll_slice = slice;
        self
    }

    /// Give up on a dispatch after this long. By default, dispatch waits
    /// until the task completes.
    pub fn dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_config.timeout = Some(timeout);
        self
    }

    /// Bound on how long teardown waits for the loop to stop.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Spawn the UI thread, build the display on it, and return the session.
    pub fn build(self) -> Result<Session<D>> {
        let (ui, waker) = UiThread::spawn(&self.name, self.factory)?;
        let executor = Arc::new(ui);
        let controller = Arc::new(LoopController::new(
            Arc::clone(&executor),
            waker,
            self.loop_config,
        ));
        let dispatcher = Dispatcher::new(
            Arc::clone(&executor),
            Arc::clone(&controller),
            self.dispatch_config,
        );
        tracing::debug!(name = %self.name, "session started");
        Ok(Session {
            name: self.name,
            executor,
            controller,
            dispatcher,
            shutdown_timeout: self.shutdown_timeout,
            closed: AtomicBool::new(false),
        })
    }
}

/// A live connection to a display running on its own UI thread.
///
/// Create one per test run and share it between tests; call
/// [`begin_test`](Self::begin_test) at the start of each test. Any thread may
/// use the session. Operations that wait on the UI must not be called from
/// the UI thread itself and fail with [`Error::Precondition`] if they are.
pub struct Session<D: Display> {
    /// UI thread name.
    name: String,
    /// The UI thread.
    executor: Arc<UiThread>,
    /// The loop controller.
    controller: Arc<LoopController<D>>,
    /// The dispatcher.
    dispatcher: Dispatcher<D>,
    /// Bound on how long teardown waits for the loop to stop.
    shutdown_timeout: Duration,
    /// Set once torn down.
    closed: AtomicBool,
}

impl<D: Display> Session<D> {
    /// Create a session builder around a display factory. The factory runs on
    /// the new UI thread.
    pub fn builder<F>(factory: F) -> SessionBuilder<F>
    where
        F: FnOnce() -> D + Send + 'static,
    {
        SessionBuilder::new(factory)
    }

    /// Create a session with default settings.
    pub fn init<F>(factory: F) -> Result<Self>
    where
        F: FnOnce() -> D + Send + 'static,
    {
        Self::builder(factory).build()
    }

    /// The UI thread's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Is the calling thread the UI thread?
    pub fn is_ui_thread(&self) -> bool {
        self.executor.is_current()
    }

    /// The dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher<D> {
        &self.dispatcher
    }

    /// The loop controller.
    pub fn controller(&self) -> &Arc<LoopController<D>> {
        &self.controller
    }

    /// Shared loop state.
    pub fn state(&self) -> &LoopState {
        self.controller.state()
    }

    /// Fail unless called from a thread other than the UI thread.
    fn require_caller_thread(&self, op: &str) -> Result<()> {
        if self.is_ui_thread() {
            return Err(Error::Precondition(format!(
                "{op} must not be called from the ui thread"
            )));
        }
        Ok(())
    }

    /// Start a test. Clears the stop flag, the activity timestamp and any
    /// errors left from a previous test, and opens a tracing span named after
    /// the test.
    pub fn begin_test(&self, name: impl Into<String>) -> TestScope<'_, D> {
        let name = name.into();
        self.controller.state().reset();
        self.controller.errors().clear();
        let span = tracing::info_span!("test", name = %name).entered();
        tracing::debug!("test started");
        TestScope {
            session: self,
            name,
            _span: span,
            finished: false,
        }
    }

    /// Run `work` on the UI thread and return its result.
    pub fn dispatch<R, F>(&self, work: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&D) -> R + Send + 'static,
    {
        self.dispatcher.dispatch(work)
    }

    /// Run fallible `work` on the UI thread.
    pub fn try_dispatch<R, E, F>(&self, work: F) -> Result<R>
    where
        R: Send + 'static,
        E: Into<BoxError>,
        F: FnOnce(&D) -> StdResult<R, E> + Send + 'static,
    {
        self.dispatcher.try_dispatch(work)
    }

    /// Run `work` on the UI thread, then let the events it triggered settle.
    pub fn dispatch_and_flush<R, F>(&self, work: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&D) -> R + Send + 'static,
    {
        self.dispatcher.dispatch_and_flush(work)
    }

    /// Start pumping the event loop in the background. See
    /// [`LoopController::run_background`].
    pub fn run_background(&self, stop_on_idle: bool) -> Result<Option<RunHandle>> {
        self.controller.run_background(stop_on_idle)
    }

    /// Ask the background loop to stop.
    pub fn request_stop(&self) {
        self.controller.request_stop();
    }

    /// Pump until the UI goes idle.
    pub fn flush(&self) -> Result<()> {
        self.controller.flush()
    }

    /// Wait until the UI has been quiet for `min_idle`. Returns `false` if
    /// that does not happen within `timeout`.
    pub fn wait_for_idle(&self, timeout: Duration, min_idle: Duration) -> Result<bool> {
        self.controller.wait_for_idle(timeout, min_idle)
    }

    /// Poll `predicate` on the UI thread until it holds. Returns `false` if it
    /// does not within `timeout`. A failed dispatch ends the wait with that
    /// error.
    pub fn wait_until<P>(&self, timeout: Duration, predicate: P) -> Result<bool>
    where
        P: Fn(&D) -> bool + Send + Sync + 'static,
    {
        self.require_caller_thread("wait_until")?;
        let predicate = Arc::new(predicate);
        let mut failure = None;
        let met = poll::wait_until(timeout, || {
            let p = Arc::clone(&predicate);
            match self.dispatch(move |d| p(d)) {
                Ok(v) => v,
                Err(e) => {
                    failure = Some(e);
                    true
                }
            }
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(met),
        }
    }

    /// Wait until `widget` occupies some visible space.
    pub fn wait_until_visible(&self, widget: &D::Widget, timeout: Duration) -> Result<bool> {
        let widget = widget.clone();
        self.wait_until(timeout, move |d| {
            bounds::visible_bounds(d, &widget, None).is_ok_and(|b| !b.is_empty())
        })
    }

    /// A widget's visible bounds, clipped through its ancestors up to
    /// `reference` (or its top-level container).
    pub fn visible_bounds(
        &self,
        widget: &D::Widget,
        reference: Option<&D::Widget>,
    ) -> Result<Rect> {
        let widget = widget.clone();
        let reference = reference.cloned();
        self.dispatch(move |d| bounds::visible_bounds(d, &widget, reference.as_ref()))?
    }

    /// Start an assertion chain about a widget, clipped up to its top-level
    /// container. Rectangles are in display coordinates.
    pub fn assert_layout(&self, widget: &D::Widget) -> LayoutAssert<'_, D> {
        LayoutAssert::new(&self.dispatcher, widget.clone(), None)
    }

    /// Start an assertion chain about a widget, clipped only by its ancestors
    /// below `reference`. Rectangles stay in display coordinates.
    pub fn assert_layout_in(
        &self,
        widget: &D::Widget,
        reference: &D::Widget,
    ) -> LayoutAssert<'_, D> {
        LayoutAssert::new(&self.dispatcher, widget.clone(), Some(reference.clone()))
    }

    /// Start an assertion chain about an ordered sequence of widgets.
    pub fn assert_layout_all(&self, widgets: &[D::Widget]) -> LayoutAssertAll<'_, D> {
        LayoutAssertAll::new(&self.dispatcher, widgets.to_vec(), None)
    }

    /// Start an assertion chain about an ordered sequence of widgets, clipped
    /// only by ancestors below `reference`. Rectangles stay in display
    /// coordinates.
    pub fn assert_layout_all_in(
        &self,
        widgets: &[D::Widget],
        reference: &D::Widget,
    ) -> LayoutAssertAll<'_, D> {
        LayoutAssertAll::new(&self.dispatcher, widgets.to_vec(), Some(reference.clone()))
    }

    /// Remove and return the errors captured while the loop pumped.
    pub fn drain_errors(&self) -> Vec<LoopDispatchError> {
        self.controller.errors().drain()
    }

    /// Stop the loop, close the UI thread and join it. Safe to call more than
    /// once. If the loop does not stop within the shutdown timeout, the UI
    /// thread is detached instead of joined.
    pub fn teardown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.controller.request_stop();
        let stopped = if self.is_ui_thread() {
            false
        } else {
            self.controller.wait_stopped(self.shutdown_timeout)
        };
        if !stopped {
            tracing::warn!(name = %self.name, "loop did not stop before teardown");
        }
        self.executor.shutdown(stopped);
        tracing::debug!(name = %self.name, "session closed");
    }
}

impl<D: Display> Drop for Session<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// The span of one test within a session.
///
/// Holds the test's tracing span open. Call [`finish`](Self::finish) to
/// collect the errors the loop captured during the test; dropping the scope
/// without finishing logs them instead.
pub struct TestScope<'a, D: Display> {
    /// The owning session.
    session: &'a Session<D>,
    /// Test name.
    name: String,
    /// Entered for the lifetime of the scope.
    _span: EnteredSpan,
    /// Set by `finish`.
    finished: bool,
}

impl<D: Display> TestScope<'_, D> {
    /// The test's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// End the test and return the errors the loop captured during it.
    pub fn finish(mut self) -> Vec<LoopDispatchError> {
        self.finished = true;
        let errors = self.session.drain_errors();
        tracing::debug!(errors = errors.len(), "test finished");
        errors
    }
}

impl<D: Display> Drop for TestScope<'_, D> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        for err in self.session.drain_errors() {
            tracing::warn!(test = %self.name, "{err}");
        }
    }
}
