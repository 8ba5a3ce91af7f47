//! Marshals work from any thread onto the UI thread and returns its result.

use std::{
    convert::Infallible,
    panic::{self, AssertUnwindSafe},
    result::Result as StdResult,
    sync::{Arc, mpsc},
    time::{Duration, Instant},
};

use crate::{
    display::Display,
    error::{BoxError, Error, Result, TaskPanic},
    executor::{Job, UiThread, current_display},
    runloop::{LoopController, Route},
};

/// Default interval at which a waiting caller re-checks the loop.
pub const DEFAULT_POLL_SLICE: Duration = Duration::from_millis(50);

/// Dispatcher settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// How long a caller waits on a posted task before re-checking whether
    /// the loop is still pumping.
    pub poll_slice: Duration,
    /// Overall limit on how long a caller waits. `None` waits until the task
    /// completes.
    pub timeout: Option<Duration>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_slice: DEFAULT_POLL_SLICE,
            timeout: None,
        }
    }
}

/// Runs closures on the UI thread on behalf of any thread.
///
/// The closure receives the display. If the caller already is the UI thread,
/// the closure runs in place, so nested dispatch never deadlocks. Otherwise
/// the caller blocks until the UI thread has run it.
pub struct Dispatcher<D: Display> {
    /// The UI thread.
    executor: Arc<UiThread>,
    /// The loop controller, consulted to decide how a task is delivered.
    controller: Arc<LoopController<D>>,
    /// Settings.
    config: DispatchConfig,
}

impl<D: Display> Clone for Dispatcher<D> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            controller: Arc::clone(&self.controller),
            config: self.config,
        }
    }
}

/// Run work against the display, converting a panic into a dispatch failure.
fn run_guarded<D, R>(display: &D, work: impl FnOnce(&D) -> Result<R>) -> Result<R> {
    panic::catch_unwind(AssertUnwindSafe(|| work(display)))
        .unwrap_or_else(|payload| Err(Error::dispatch(TaskPanic::from_payload(&*payload))))
}

impl<D: Display> Dispatcher<D> {
    /// Construct a dispatcher.
    pub(crate) fn new(
        executor: Arc<UiThread>,
        controller: Arc<LoopController<D>>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            executor,
            controller,
            config,
        }
    }

    /// Is the calling thread the UI thread?
    pub fn is_ui_thread(&self) -> bool {
        self.executor.is_current()
    }

    /// The loop controller.
    pub fn controller(&self) -> &Arc<LoopController<D>> {
        &self.controller
    }

    /// Run `work` on the UI thread and return its result. A panic inside
    /// `work` is returned as [`Error::Dispatch`].
    pub fn dispatch<R, F>(&self, work: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&D) -> R + Send + 'static,
    {
        self.try_dispatch(move |d| Ok::<_, Infallible>(work(d)))
    }

    /// Run fallible `work` on the UI thread. An `Err` from `work` is returned
    /// as [`Error::Dispatch`] with the original error as its source.
    pub fn try_dispatch<R, E, F>(&self, work: F) -> Result<R>
    where
        R: Send + 'static,
        E: Into<BoxError>,
        F: FnOnce(&D) -> StdResult<R, E> + Send + 'static,
    {
        self.submit(move |d| work(d).map_err(Error::dispatch), false)
    }

    /// Like [`dispatch`](Self::dispatch), but if the task ran while the loop
    /// was idle, pump one idle-bounded pass afterwards so that any events the
    /// task triggered settle before returning.
    pub fn dispatch_and_flush<R, F>(&self, work: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&D) -> R + Send + 'static,
    {
        self.submit(move |d| Ok(work(d)), true)
    }

    /// Deliver a task and wait for it.
    fn submit<R, F>(&self, work: F, flush: bool) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&D) -> Result<R> + Send + 'static,
    {
        if self.executor.is_current() {
            let display = current_display::<D>().ok_or_else(|| {
                Error::Precondition("ui thread is not hosting this display type".into())
            })?;
            return run_guarded(&*display, work);
        }

        let (tx, rx) = mpsc::sync_channel::<Result<R>>(1);
        let job: Job = Box::new(move || {
            let outcome = match current_display::<D>() {
                Some(display) => run_guarded(&*display, work),
                None => Err(Error::Executor("no display on the ui thread".into())),
            };
            if tx.send(outcome).is_err() {
                tracing::debug!("dispatch caller went away before completion");
            }
        });

        let route = self.controller.route(job)?;
        let started = Instant::now();
        let outcome = match route {
            Route::Direct => self.wait_direct(&rx, started)?,
            Route::Posted => self.wait_posted(&rx, started)?,
        };
        if flush && route == Route::Direct {
            self.controller.flush()?;
        }
        outcome
    }

    /// Fail if the configured overall timeout has passed.
    fn check_deadline(&self, started: Instant) -> Result<()> {
        match self.config.timeout {
            Some(limit) if started.elapsed() >= limit => Err(Error::Timeout(limit)),
            _ => Ok(()),
        }
    }

    /// Wait for a task handed straight to the executor.
    fn wait_direct<R>(
        &self,
        rx: &mpsc::Receiver<Result<R>>,
        started: Instant,
    ) -> Result<Result<R>> {
        loop {
            match rx.recv_timeout(self.config.poll_slice) {
                Ok(outcome) => return Ok(outcome),
                Err(mpsc::RecvTimeoutError::Timeout) => self.check_deadline(started)?,
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(Error::Executor("task dropped before completion".into()));
                }
            }
        }
    }

    /// Wait for a task posted into the loop's native queue. If the loop stops
    /// pumping after the task was posted, nothing would run it, so force an
    /// idle-bounded pass.
    fn wait_posted<R>(
        &self,
        rx: &mpsc::Receiver<Result<R>>,
        started: Instant,
    ) -> Result<Result<R>> {
        loop {
            match rx.recv_timeout(self.config.poll_slice) {
                Ok(outcome) => return Ok(outcome),
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    self.check_deadline(started)?;
                    if !self.controller.is_pumping() {
                        tracing::debug!("loop stopped with a task queued, forcing a flush");
                        self.controller.run_background(true)?;
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(Error::Executor("task dropped before completion".into()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        headless::HeadlessDisplay,
        runloop::{LoopConfig, LoopMode},
    };

    #[test]
    fn posted_task_is_flushed_once_the_loop_has_stopped() -> Result<()> {
        let (ui, waker) = UiThread::spawn("dispatch-unit", HeadlessDisplay::new)?;
        let executor = Arc::new(ui);
        let controller = Arc::new(LoopController::<HeadlessDisplay>::new(
            Arc::clone(&executor),
            Arc::clone(&waker),
            LoopConfig {
                idle_threshold: Duration::from_millis(30),
                wake_margin: Duration::from_millis(10),
            },
        ));
        let dispatcher = Dispatcher::new(
            Arc::clone(&executor),
            Arc::clone(&controller),
            DispatchConfig {
                poll_slice: Duration::from_millis(10),
                timeout: Some(Duration::from_secs(5)),
            },
        );

        // Posted into the native queue with no run pumping: nothing picks it up.
        let (tx, rx) = mpsc::sync_channel::<Result<u32>>(1);
        waker.async_exec(Box::new(move || {
            assert!(tx.send(Ok(7)).is_ok());
        }));
        std::thread::sleep(Duration::from_millis(30));
        assert!(matches!(rx.try_recv(), Err(mpsc::TryRecvError::Empty)));
        assert_eq!(controller.state().mode(), LoopMode::Idle);

        assert_eq!(dispatcher.wait_posted(&rx, Instant::now())??, 7);
        assert!(controller.wait_stopped(Duration::from_secs(2)));
        assert_eq!(controller.state().mode(), LoopMode::Idle);

        executor.shutdown(true);
        Ok(())
    }
}
