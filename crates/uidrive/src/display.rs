//! The seam between uidrive and a native, single-threaded UI toolkit.
//!
//! A [`Display`] is created on the UI thread and never leaves it. Everything
//! another thread may do to it goes through the [`Waker`] handle.

use std::{fmt::Debug, result::Result as StdResult, sync::Arc, time::Duration};

use crate::{
    error::{BoxError, Result},
    geom::{Point, Rect},
};

/// Work posted into a display's native queue from any thread.
pub type Runnable = Box<dyn FnOnce() + Send>;

/// A callback run on the UI thread when a timer fires.
pub type TimerCallback = Box<dyn FnOnce()>;

/// Identifier for a scheduled one-shot timer.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Thread-safe handle onto a display's native event queue.
pub trait Waker: Send + Sync {
    /// Force a pending [`Display::sleep`] to return immediately.
    fn wake(&self);

    /// Append a task to the native queue. The task runs on the UI thread
    /// during a later [`Display::dispatch_one`], in submission order with
    /// other native events. A display that has been disposed drops the task.
    fn async_exec(&self, task: Runnable);
}

/// A single-threaded native UI toolkit.
///
/// Implementations are expected to be `!Send`: the widget tree and event loop
/// belong to the thread that created the display.
pub trait Display: 'static {
    /// Widget handle type. Handles may be passed between threads, but only
    /// dereferenced on the UI thread.
    type Widget: Clone + PartialEq + Debug + Send + Sync + 'static;

    /// Process one pending native event. Returns `Ok(false)` if nothing was
    /// pending. An `Err` means an event handler failed; the event is consumed
    /// either way.
    fn dispatch_one(&self) -> StdResult<bool, BoxError>;

    /// Block until an event arrives, a timer is due, or the display is woken.
    fn sleep(&self);

    /// A handle that other threads can use to wake the display or post work.
    fn waker(&self) -> Arc<dyn Waker>;

    /// Schedule `callback` to run on the UI thread after `delay`.
    fn timer_exec(&self, delay: Duration, callback: TimerCallback) -> TimerId;

    /// Cancel a timer. Cancelling a timer that already fired is a no-op.
    fn cancel_timer(&self, id: TimerId);

    /// Number of timers scheduled but not yet fired.
    fn pending_timers(&self) -> usize;

    /// Has the display been disposed?
    fn is_disposed(&self) -> bool;

    /// The widget's bounds relative to its parent.
    fn bounds(&self, widget: &Self::Widget) -> Result<Rect>;

    /// The widget's parent, or `None` for a top-level container.
    fn parent(&self, widget: &Self::Widget) -> Result<Option<Self::Widget>>;

    /// Is the widget showing? A widget is only visible if all its ancestors
    /// are.
    fn is_visible(&self, widget: &Self::Widget) -> Result<bool>;

    /// Convert a point local to the widget into display coordinates.
    fn to_display(&self, widget: &Self::Widget, point: Point) -> Result<Point>;

    /// The top-level container that holds the widget.
    fn shell(&self, widget: &Self::Widget) -> Result<Self::Widget>;
}
