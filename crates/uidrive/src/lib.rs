//! uidrive: drive a single-threaded UI toolkit from test threads.
//!
//! A toolkit's widget tree may only be touched from the one thread that owns
//! it. uidrive gives that thread to the toolkit and lets any other thread run
//! work on it, pump its event loop, wait for it to settle, and check the
//! resulting geometry with fail-fast layout assertions.
//!
//! # Quick Start
//!
//! The main entry points are:
//! - [`Session`] - A UI thread hosting one display, and the operations on it
//! - [`Display`] - The trait a toolkit implements to be driven
//! - [`LayoutAssert`] and [`LayoutAssertAll`] - Assertion chains over widget
//!   geometry
//!
//! # Module Organization
//!
//! - [`headless`] - An in-process toolkit with no native windowing
//! - [`layout`] - Layout assertions and the rules behind them
//! - [`geom`] - Geometry primitives (Rect, Point, Axis, Edge)

#![warn(missing_docs)]

// Internal modules
mod executor;

// Public modules
pub mod bounds;
pub mod dispatcher;
pub mod display;
pub mod error;
pub mod headless;
pub mod layout;
pub mod logging;
pub mod poll;
pub mod runloop;
pub mod session;

pub use geom;

pub use dispatcher::{DispatchConfig, Dispatcher};
pub use display::{Display, TimerId, Waker};
pub use error::{Error, LoopDispatchError, Result, TaskPanic};
pub use layout::{LayoutAssert, LayoutAssertAll};
pub use runloop::{ErrorQueue, LoopConfig, LoopController, LoopMode, LoopState, RunHandle};
pub use session::{Session, SessionBuilder, TestScope};
