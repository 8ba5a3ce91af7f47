//! An in-process toolkit with no native windowing.
//!
//! [`HeadlessDisplay`] implements [`Display`] with a cross-thread event queue,
//! UI-thread timers and a slot-map widget tree. Widgets are plain rectangles:
//! a shell's bounds are in display coordinates, every other widget's bounds
//! are relative to its parent's origin.

/// One-shot timer heap.
mod timers;
/// Widget arena.
mod tree;

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    result::Result as StdResult,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use timers::TimerHeap;
use tree::WidgetTree;
pub use tree::WidgetId;

use crate::{
    display::{Display, Runnable, TimerCallback, TimerId, Waker},
    error::{BoxError, Error, Result, TaskPanic},
    geom::{Point, Rect},
};

/// A fallible event handler posted from any thread.
pub type Handler = Box<dyn FnOnce() -> StdResult<(), BoxError> + Send>;

/// An entry in the native queue.
enum Event {
    /// Work posted with `async_exec`.
    Run(Runnable),
    /// A handler that may fail.
    Handle(Handler),
}

/// Queue contents, guarded by the mutex in [`Shared`].
#[derive(Default)]
struct Queue {
    /// Pending events, oldest first.
    events: VecDeque<Event>,
    /// Set by `wake`, cleared when a sleep consumes it.
    woken: bool,
    /// Set once the display is disposed; later posts are dropped.
    closed: bool,
}

/// State shared between the display and its handles.
#[derive(Default)]
struct Shared {
    /// The native queue.
    queue: Mutex<Queue>,
    /// Signalled whenever the queue changes or the display is woken.
    ready: Condvar,
}

impl Shared {
    /// Lock the queue, ignoring poisoning: handlers never run under the lock.
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an event and wake the sleeper.
    fn post(&self, event: Event) {
        let mut q = self.lock();
        if q.closed {
            tracing::debug!("dropping event posted to a disposed display");
            return;
        }
        q.events.push_back(event);
        self.ready.notify_all();
    }
}

/// A `Send + Sync` handle onto a headless display's queue. Obtain one on the
/// UI thread with [`HeadlessDisplay::handle`] and use it from anywhere.
#[derive(Clone)]
pub struct HeadlessHandle {
    /// Shared queue.
    shared: Arc<Shared>,
}

impl HeadlessHandle {
    /// Post a handler. If it fails, the failure is reported by the
    /// [`Display::dispatch_one`] call that ran it.
    pub fn post_handler(
        &self,
        handler: impl FnOnce() -> StdResult<(), BoxError> + Send + 'static,
    ) {
        self.shared.post(Event::Handle(Box::new(handler)));
    }

    /// Number of events waiting in the queue.
    pub fn queued(&self) -> usize {
        self.shared.lock().events.len()
    }
}

impl Waker for HeadlessHandle {
    fn wake(&self) {
        let mut q = self.shared.lock();
        q.woken = true;
        self.shared.ready.notify_all();
    }

    fn async_exec(&self, task: Runnable) {
        self.shared.post(Event::Run(task));
    }
}

/// A display with no native windowing system behind it.
#[derive(Default)]
pub struct HeadlessDisplay {
    /// Queue shared with handles.
    shared: Arc<Shared>,
    /// Scheduled timers.
    timers: RefCell<TimerHeap>,
    /// The widget tree.
    widgets: RefCell<WidgetTree>,
    /// Set by `dispose`.
    disposed: Cell<bool>,
}

impl HeadlessDisplay {
    /// Construct an empty display.
    pub fn new() -> Self {
        Self::default()
    }

    /// A thread-safe handle onto this display's queue.
    pub fn handle(&self) -> HeadlessHandle {
        HeadlessHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Create a top-level container. `bounds` are in display coordinates.
    pub fn create_shell(&self, bounds: Rect) -> WidgetId {
        self.widgets.borrow_mut().add_shell(bounds)
    }

    /// Create a widget inside `parent`, with bounds relative to the parent.
    pub fn create_widget(&self, parent: WidgetId, bounds: Rect) -> Result<WidgetId> {
        self.widgets.borrow_mut().add_child(parent, bounds)
    }

    /// Move or resize a widget.
    pub fn set_bounds(&self, widget: WidgetId, bounds: Rect) -> Result<()> {
        self.widgets.borrow_mut().set_bounds(widget, bounds)
    }

    /// Show or hide a widget. Hiding a widget hides its descendants.
    pub fn set_visible(&self, widget: WidgetId, visible: bool) -> Result<()> {
        self.widgets.borrow_mut().set_visible(widget, visible)
    }

    /// A widget's children, in creation order.
    pub fn children(&self, widget: WidgetId) -> Result<Vec<WidgetId>> {
        self.widgets.borrow().children(widget)
    }

    /// Is the handle still live?
    pub fn exists(&self, widget: WidgetId) -> bool {
        self.widgets.borrow().contains(widget)
    }

    /// Dispose a widget and everything inside it.
    pub fn dispose_widget(&self, widget: WidgetId) -> Result<()> {
        self.widgets.borrow_mut().remove(widget)
    }

    /// Dispose the display: drop all widgets, timers and queued events, and
    /// refuse further posts.
    pub fn dispose(&self) {
        self.disposed.set(true);
        self.widgets.borrow_mut().clear();
        self.timers.borrow_mut().clear();
        let dropped: Vec<Event> = {
            let mut q = self.shared.lock();
            q.closed = true;
            self.shared.ready.notify_all();
            q.events.drain(..).collect()
        };
        drop(dropped);
    }

    /// Run one callback, converting a panic into a handler error.
    fn run_event(event: Event) -> StdResult<(), BoxError> {
        let outcome = match event {
            Event::Run(task) => panic::catch_unwind(AssertUnwindSafe(task)).map(Ok),
            Event::Handle(handler) => panic::catch_unwind(AssertUnwindSafe(handler)),
        };
        outcome.unwrap_or_else(|payload| Err(TaskPanic::from_payload(&*payload).into()))
    }
}

impl Display for HeadlessDisplay {
    type Widget = WidgetId;

    fn dispatch_one(&self) -> StdResult<bool, BoxError> {
        if self.disposed.get() {
            return Ok(false);
        }
        // The borrow must end before the callback runs: callbacks schedule
        // timers.
        let due = self.timers.borrow_mut().pop_due();
        if let Some(callback) = due {
            return panic::catch_unwind(AssertUnwindSafe(callback))
                .map(|()| true)
                .map_err(|payload| TaskPanic::from_payload(&*payload).into());
        }
        let event = self.shared.lock().events.pop_front();
        match event {
            Some(event) => Self::run_event(event).map(|()| true),
            None => Ok(false),
        }
    }

    fn sleep(&self) {
        let wait = self.timers.borrow_mut().wait();
        let mut q = self.shared.lock();
        if q.woken || q.closed || !q.events.is_empty() {
            q.woken = false;
            return;
        }
        q = match wait {
            Some(d) if d.is_zero() => return,
            Some(d) => {
                self.shared
                    .ready
                    .wait_timeout(q, d)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            }
            None => self
                .shared
                .ready
                .wait(q)
                .unwrap_or_else(PoisonError::into_inner),
        };
        q.woken = false;
    }

    fn waker(&self) -> Arc<dyn Waker> {
        Arc::new(self.handle())
    }

    fn timer_exec(&self, delay: Duration, callback: TimerCallback) -> TimerId {
        self.timers.borrow_mut().add(delay, callback)
    }

    fn cancel_timer(&self, id: TimerId) {
        self.timers.borrow_mut().cancel(id);
    }

    fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    fn bounds(&self, widget: &WidgetId) -> Result<Rect> {
        self.widgets.borrow().bounds(*widget)
    }

    fn parent(&self, widget: &WidgetId) -> Result<Option<WidgetId>> {
        self.widgets.borrow().parent(*widget)
    }

    fn is_visible(&self, widget: &WidgetId) -> Result<bool> {
        self.widgets.borrow().is_showing(*widget)
    }

    fn to_display(&self, widget: &WidgetId, point: Point) -> Result<Point> {
        self.widgets.borrow().to_display(*widget, point)
    }

    fn shell(&self, widget: &WidgetId) -> Result<WidgetId> {
        if self.disposed.get() {
            return Err(Error::Widget("display is disposed".into()));
        }
        self.widgets.borrow().shell(*widget)
    }
}
