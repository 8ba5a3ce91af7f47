//! Resolve what part of a widget is actually showing.

use crate::{
    display::Display,
    error::Result,
    geom::{Point, Rect},
};

/// Compute a widget's visible bounds in display coordinates, clipped through
/// every ancestor up to (but excluding) `reference`. With no reference, the
/// widget's top-level container is used.
///
/// An invisible widget occupies no space: its bounds are a zero-sized
/// rectangle at its origin. A widget whose ancestor is scrolled out of view
/// or collapsed likewise resolves to zero area. Must run on the UI thread.
pub fn visible_bounds<D: Display>(
    display: &D,
    widget: &D::Widget,
    reference: Option<&D::Widget>,
) -> Result<Rect> {
    match reference {
        Some(r) => resolve(display, widget, r),
        None => resolve(display, widget, &display.shell(widget)?),
    }
}

/// Resolve several widgets against the same reference in one pass.
pub fn visible_bounds_all<D: Display>(
    display: &D,
    widgets: &[D::Widget],
    reference: Option<&D::Widget>,
) -> Result<Vec<Rect>> {
    widgets
        .iter()
        .map(|w| visible_bounds(display, w, reference))
        .collect()
}

/// The resolution proper.
fn resolve<D: Display>(display: &D, widget: &D::Widget, reference: &D::Widget) -> Result<Rect> {
    let local = display.bounds(widget)?;
    let origin = display.to_display(widget, Point::zero())?;
    if !display.is_visible(widget)? {
        return Ok(Rect::zero_at(origin));
    }
    let bounds = Rect::new(origin.x, origin.y, local.w, local.h);
    match display.parent(widget)? {
        Some(parent) if parent != *reference => {
            Ok(bounds.intersect(&resolve(display, &parent, reference)?))
        }
        _ => Ok(bounds),
    }
}
