//! The UI thread: a dedicated worker that owns the display.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    rc::Rc,
    sync::{Arc, Mutex, mpsc},
    thread::{self, JoinHandle, ThreadId},
};

use scoped_tls::scoped_thread_local;

use crate::{
    display::{Display, Waker},
    error::{Error, Result, panic_message},
};

/// A unit of work run on the UI thread.
pub type Job = Box<dyn FnOnce() + Send>;

scoped_thread_local!(
    /// The display owned by the current thread, while that thread is serving
    /// as a UI thread.
    static CURRENT: Rc<dyn Any>
);

/// The display owned by the calling thread, if it is a UI thread hosting a
/// display of type `D`.
pub fn current_display<D: Display>() -> Option<Rc<D>> {
    if !CURRENT.is_set() {
        return None;
    }
    CURRENT.with(|d| Rc::clone(d).downcast::<D>().ok())
}

/// The single thread permitted to touch the widget tree.
///
/// Jobs run one at a time, in the order they were submitted. While the loop
/// controller is pumping, its pump job occupies the thread and further work
/// reaches the display through the native queue instead.
pub struct UiThread {
    /// Job channel; `None` once shut down.
    jobs: Mutex<Option<mpsc::Sender<Job>>>,
    /// Identity of the worker thread.
    id: ThreadId,
    /// Join handle, taken on shutdown.
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl UiThread {
    /// Spawn the UI thread. `factory` runs on the new thread and builds the
    /// display there. Returns once the display exists.
    pub fn spawn<D, F>(name: &str, factory: F) -> Result<(Self, Arc<dyn Waker>)>
    where
        D: Display,
        F: FnOnce() -> D + Send + 'static,
    {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Arc<dyn Waker>>(1);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let display = Rc::new(factory());
                if ready_tx.send(display.waker()).is_err() {
                    return;
                }
                let display: Rc<dyn Any> = display;
                CURRENT.set(&display, || serve(&job_rx));
                tracing::debug!("ui thread exiting");
            })
            .map_err(|e| Error::Executor(format!("could not spawn ui thread: {e}")))?;

        let id = handle.thread().id();
        let waker = ready_rx
            .recv()
            .map_err(|_| Error::Executor("display factory panicked".into()))?;
        Ok((
            Self {
                jobs: Mutex::new(Some(job_tx)),
                id,
                handle: Mutex::new(Some(handle)),
            },
            waker,
        ))
    }

    /// Is the calling thread the UI thread?
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.id
    }

    /// Queue a job for execution.
    pub fn execute(&self, job: Job) -> Result<()> {
        let jobs = self
            .jobs
            .lock()
            .map_err(|_| Error::Executor("job channel poisoned".into()))?;
        match jobs.as_ref() {
            Some(tx) => tx
                .send(job)
                .map_err(|_| Error::Executor("ui thread has exited".into())),
            None => Err(Error::Executor("ui thread has been shut down".into())),
        }
    }

    /// Close the job channel. If `join` is set, wait for the thread to exit.
    pub fn shutdown(&self, join: bool) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.take();
        }
        let handle = self.handle.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            if !join {
                tracing::warn!("detaching ui thread that is still busy");
            } else if handle.join().is_err() {
                tracing::error!("ui thread panicked");
            }
        }
    }
}

/// Run jobs until the channel closes.
fn serve(jobs: &mpsc::Receiver<Job>) {
    while let Ok(job) = jobs.recv() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            tracing::error!("ui job panicked: {}", panic_message(&*payload));
        }
    }
}
