//! Fluent, fail-fast layout assertions.
//!
//! A chain resolves its subject's visible bounds on first use and reuses
//! that snapshot for every later call in the chain. Every call evaluates its
//! rule immediately and returns the first failure.

use std::cell::{Cell, OnceCell};

use crate::{
    bounds,
    dispatcher::Dispatcher,
    display::Display,
    error::Result,
    geom::{Axis, Edge, Rect},
};

pub mod rules;

pub use rules::{CENTER_TOLERANCE, EXACT};

/// Resolve one widget's visible bounds through the dispatcher.
fn resolve<D: Display>(
    dispatcher: &Dispatcher<D>,
    widget: &D::Widget,
    reference: Option<&D::Widget>,
) -> Result<Rect> {
    let widget = widget.clone();
    let reference = reference.cloned();
    dispatcher.dispatch(move |d| bounds::visible_bounds(d, &widget, reference.as_ref()))?
}

/// Assertions about a single widget.
pub struct LayoutAssert<'a, D: Display> {
    /// Dispatcher used to read widget state.
    dispatcher: &'a Dispatcher<D>,
    /// The subject.
    widget: D::Widget,
    /// Ancestor at which clipping stops for every rectangle in this chain.
    /// Rectangles are always in display coordinates.
    reference: Option<D::Widget>,
    /// Subject bounds, resolved on first use.
    bounds: Cell<Option<Rect>>,
}

impl<'a, D: Display> LayoutAssert<'a, D> {
    /// Start a chain. Nothing is resolved until the first assertion.
    pub fn new(
        dispatcher: &'a Dispatcher<D>,
        widget: D::Widget,
        reference: Option<D::Widget>,
    ) -> Self {
        Self {
            dispatcher,
            widget,
            reference,
            bounds: Cell::new(None),
        }
    }

    /// The subject's bounds as seen by this chain.
    pub fn bounds(&self) -> Result<Rect> {
        if let Some(b) = self.bounds.get() {
            return Ok(b);
        }
        let b = resolve(self.dispatcher, &self.widget, self.reference.as_ref())?;
        self.bounds.set(Some(b));
        Ok(b)
    }

    /// Resolve another widget in the chain's coordinate space. Not cached.
    fn other(&self, widget: &D::Widget) -> Result<Rect> {
        resolve(self.dispatcher, widget, self.reference.as_ref())
    }

    /// Apply a rule to the subject.
    fn check(&self, rule: impl FnOnce(&Rect) -> Result<()>) -> Result<&Self> {
        rule(&self.bounds()?)?;
        Ok(self)
    }

    /// Apply a rule to the subject and another widget.
    fn check_with(
        &self,
        other: &D::Widget,
        rule: impl FnOnce(&Rect, &Rect) -> Result<()>,
    ) -> Result<&Self> {
        let subject = self.bounds()?;
        rule(&subject, &self.other(other)?)?;
        Ok(self)
    }

    /// The subject occupies some space.
    pub fn is_visible(&self) -> Result<&Self> {
        self.check(rules::visible)
    }

    /// The subject occupies no space.
    pub fn is_invisible(&self) -> Result<&Self> {
        self.check(rules::invisible)
    }

    /// The subject is at least `w` by `h`.
    pub fn has_min_size(&self, w: i32, h: i32) -> Result<&Self> {
        self.has_min_size_within(w, h, EXACT)
    }

    /// The subject is at least `w` by `h`, less `tolerance`.
    pub fn has_min_size_within(&self, w: i32, h: i32, tolerance: i32) -> Result<&Self> {
        self.check(|b| rules::min_size(b, w, h, tolerance))
    }

    /// The subject is at most `w` by `h`.
    pub fn has_max_size(&self, w: i32, h: i32) -> Result<&Self> {
        self.has_max_size_within(w, h, EXACT)
    }

    /// The subject is at most `w` by `h`, plus `tolerance`.
    pub fn has_max_size_within(&self, w: i32, h: i32, tolerance: i32) -> Result<&Self> {
        self.check(|b| rules::max_size(b, w, h, tolerance))
    }

    /// The subject is exactly `w` by `h`.
    pub fn has_size(&self, w: i32, h: i32) -> Result<&Self> {
        self.has_size_within(w, h, EXACT)
    }

    /// The subject is `w` by `h` within `tolerance`.
    pub fn has_size_within(&self, w: i32, h: i32, tolerance: i32) -> Result<&Self> {
        self.check(|b| rules::size(b, w, h, tolerance))
    }

    /// The subject's origin is exactly `(x, y)`.
    pub fn has_position(&self, x: i32, y: i32) -> Result<&Self> {
        self.has_position_within(x, y, EXACT)
    }

    /// The subject's origin is `(x, y)` within `tolerance`.
    pub fn has_position_within(&self, x: i32, y: i32, tolerance: i32) -> Result<&Self> {
        self.check(|b| rules::position(b, x, y, tolerance))
    }

    /// The subject ends at least `gap` before `other` starts horizontally.
    pub fn is_left_of(&self, other: &D::Widget, gap: i32) -> Result<&Self> {
        self.is_left_of_within(other, gap, EXACT)
    }

    /// As [`is_left_of`](Self::is_left_of), with a tolerance.
    pub fn is_left_of_within(&self, other: &D::Widget, gap: i32, tolerance: i32) -> Result<&Self> {
        self.check_with(other, |s, o| rules::left_of(s, o, gap, tolerance))
    }

    /// The subject starts at least `gap` after `other` ends horizontally.
    pub fn is_right_of(&self, other: &D::Widget, gap: i32) -> Result<&Self> {
        self.is_right_of_within(other, gap, EXACT)
    }

    /// As [`is_right_of`](Self::is_right_of), with a tolerance.
    pub fn is_right_of_within(&self, other: &D::Widget, gap: i32, tolerance: i32) -> Result<&Self> {
        self.check_with(other, |s, o| rules::right_of(s, o, gap, tolerance))
    }

    /// The subject ends at least `gap` before `other` starts vertically.
    pub fn is_above(&self, other: &D::Widget, gap: i32) -> Result<&Self> {
        self.is_above_within(other, gap, EXACT)
    }

    /// As [`is_above`](Self::is_above), with a tolerance.
    pub fn is_above_within(&self, other: &D::Widget, gap: i32, tolerance: i32) -> Result<&Self> {
        self.check_with(other, |s, o| rules::above(s, o, gap, tolerance))
    }

    /// The subject starts at least `gap` after `other` ends vertically.
    pub fn is_below(&self, other: &D::Widget, gap: i32) -> Result<&Self> {
        self.is_below_within(other, gap, EXACT)
    }

    /// As [`is_below`](Self::is_below), with a tolerance.
    pub fn is_below_within(&self, other: &D::Widget, gap: i32, tolerance: i32) -> Result<&Self> {
        self.check_with(other, |s, o| rules::below(s, o, gap, tolerance))
    }

    /// The subject shares `edge` with `other`.
    pub fn is_aligned(&self, edge: Edge, other: &D::Widget) -> Result<&Self> {
        self.is_aligned_within(edge, other, EXACT)
    }

    /// The subject shares `edge` with `other`, within `tolerance`.
    pub fn is_aligned_within(
        &self,
        edge: Edge,
        other: &D::Widget,
        tolerance: i32,
    ) -> Result<&Self> {
        self.check_with(other, |s, o| rules::edge_aligned(s, o, edge, tolerance))
    }

    /// The subject's center along `axis` matches `other`'s.
    pub fn is_center_aligned(&self, axis: Axis, other: &D::Widget) -> Result<&Self> {
        self.is_center_aligned_within(axis, other, CENTER_TOLERANCE)
    }

    /// As [`is_center_aligned`](Self::is_center_aligned), with an explicit
    /// tolerance.
    pub fn is_center_aligned_within(
        &self,
        axis: Axis,
        other: &D::Widget,
        tolerance: i32,
    ) -> Result<&Self> {
        self.check_with(other, |s, o| rules::center_aligned(s, o, axis, tolerance))
    }

    /// The subject lies entirely inside `container`.
    pub fn is_within(&self, container: &D::Widget) -> Result<&Self> {
        self.check_with(container, rules::within)
    }

    /// The subject does not overlap `other`.
    pub fn does_not_overlap(&self, other: &D::Widget) -> Result<&Self> {
        self.check_with(other, rules::no_overlap)
    }

    /// The subject is centered in `container`.
    pub fn is_centered_in(&self, container: &D::Widget) -> Result<&Self> {
        self.is_centered_in_within(container, CENTER_TOLERANCE)
    }

    /// As [`is_centered_in`](Self::is_centered_in), with an explicit
    /// tolerance.
    pub fn is_centered_in_within(&self, container: &D::Widget, tolerance: i32) -> Result<&Self> {
        self.check_with(container, |s, c| rules::centered_in(s, c, tolerance))
    }

    /// The subject spans `container` along `axis`.
    pub fn fills(&self, axis: Axis, container: &D::Widget) -> Result<&Self> {
        self.fills_within(axis, container, EXACT)
    }

    /// As [`fills`](Self::fills), with a tolerance.
    pub fn fills_within(&self, axis: Axis, container: &D::Widget, tolerance: i32) -> Result<&Self> {
        self.check_with(container, |s, c| rules::fills(s, c, axis, tolerance))
    }

    /// The subject lies inside `container`, at most `max_distance` from
    /// `edge`.
    pub fn is_near_edge(
        &self,
        edge: Edge,
        container: &D::Widget,
        max_distance: i32,
    ) -> Result<&Self> {
        self.check_with(container, |s, c| rules::near_edge(s, c, edge, max_distance))
    }
}

/// Assertions about an ordered sequence of widgets.
pub struct LayoutAssertAll<'a, D: Display> {
    /// Dispatcher used to read widget state.
    dispatcher: &'a Dispatcher<D>,
    /// The subjects, in order.
    widgets: Vec<D::Widget>,
    /// Ancestor at which clipping stops for every rectangle in this chain.
    /// Rectangles are always in display coordinates.
    reference: Option<D::Widget>,
    /// Subject bounds, resolved together on first use.
    bounds: OnceCell<Vec<Rect>>,
}

impl<'a, D: Display> LayoutAssertAll<'a, D> {
    /// Start a chain. Nothing is resolved until the first assertion.
    pub fn new(
        dispatcher: &'a Dispatcher<D>,
        widgets: Vec<D::Widget>,
        reference: Option<D::Widget>,
    ) -> Self {
        Self {
            dispatcher,
            widgets,
            reference,
            bounds: OnceCell::new(),
        }
    }

    /// The subjects' bounds as seen by this chain, in order. All subjects are
    /// resolved in a single trip to the UI thread.
    pub fn bounds(&self) -> Result<&[Rect]> {
        if let Some(b) = self.bounds.get() {
            return Ok(b);
        }
        let widgets = self.widgets.clone();
        let reference = self.reference.clone();
        let resolved = self.dispatcher.dispatch(move |d| {
            bounds::visible_bounds_all(d, &widgets, reference.as_ref())
        })??;
        Ok(self.bounds.get_or_init(|| resolved))
    }

    /// Apply a rule to the subjects.
    fn check(&self, rule: impl FnOnce(&[Rect]) -> Result<()>) -> Result<&Self> {
        rule(self.bounds()?)?;
        Ok(self)
    }

    /// Every subject occupies some space.
    pub fn are_all_visible(&self) -> Result<&Self> {
        self.check(rules::all_visible)
    }

    /// Every subject shares `edge` with the first.
    pub fn are_aligned(&self, edge: Edge) -> Result<&Self> {
        self.are_aligned_within(edge, EXACT)
    }

    /// As [`are_aligned`](Self::are_aligned), with a tolerance.
    pub fn are_aligned_within(&self, edge: Edge, tolerance: i32) -> Result<&Self> {
        self.check(|b| rules::all_aligned(b, edge, tolerance))
    }

    /// Each subject lies right of its predecessor, at least `min_gap` apart.
    pub fn are_arranged_in_row(&self, min_gap: i32) -> Result<&Self> {
        self.check(|b| rules::arranged_in_row(b, min_gap))
    }

    /// Each subject lies below its predecessor, at least `min_gap` apart.
    pub fn are_arranged_in_column(&self, min_gap: i32) -> Result<&Self> {
        self.check(|b| rules::arranged_in_column(b, min_gap))
    }

    /// Consecutive gaps along `axis` all equal `expected`.
    pub fn have_uniform_spacing(&self, axis: Axis, expected: i32) -> Result<&Self> {
        self.have_uniform_spacing_within(axis, expected, EXACT)
    }

    /// As [`have_uniform_spacing`](Self::have_uniform_spacing), with a
    /// tolerance.
    pub fn have_uniform_spacing_within(
        &self,
        axis: Axis,
        expected: i32,
        tolerance: i32,
    ) -> Result<&Self> {
        self.check(|b| rules::uniform_spacing(b, axis, expected, tolerance))
    }

    /// No two subjects overlap.
    pub fn do_not_overlap(&self) -> Result<&Self> {
        self.check(rules::none_overlap)
    }

    /// Every subject lies inside `container`.
    pub fn are_all_within(&self, container: &D::Widget) -> Result<&Self> {
        let rects = self.bounds()?;
        let container = resolve(self.dispatcher, container, self.reference.as_ref())?;
        rules::all_within(rects, &container)?;
        Ok(self)
    }
}
