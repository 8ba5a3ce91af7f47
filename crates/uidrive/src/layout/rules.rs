//! Layout predicates over resolved rectangles.
//!
//! Every rule returns `Ok(())` when it holds and an [`Error::Assertion`]
//! naming the rule, its thresholds and every rectangle involved when it does
//! not. Rules never touch the UI; they operate on bounds that were already
//! resolved.

use crate::{
    error::{Error, Result},
    geom::{Axis, Edge, Rect},
};

/// Default tolerance for positioning, alignment, fill and spacing rules.
pub const EXACT: i32 = 0;
/// Default tolerance for centering rules, absorbing integer-division rounding.
pub const CENTER_TOLERANCE: i32 = 1;

/// Build an assertion failure.
fn fail(msg: String) -> Result<()> {
    Err(Error::Assertion(msg))
}

/// Is `actual` within `tolerance` of `expected`?
fn near(actual: i32, expected: i32, tolerance: i32) -> bool {
    (i64::from(actual) - i64::from(expected)).abs() <= i64::from(tolerance)
}

/// The subject must occupy some space.
pub fn visible(subject: &Rect) -> Result<()> {
    if subject.area() > 0 {
        return Ok(());
    }
    fail(format!("is_visible: {subject} has zero area"))
}

/// The subject must occupy no space.
pub fn invisible(subject: &Rect) -> Result<()> {
    if subject.area() == 0 {
        return Ok(());
    }
    fail(format!(
        "is_invisible: {subject} has area {}",
        subject.area()
    ))
}

/// Width and height must each be at least the given value, less `tolerance`.
pub fn min_size(subject: &Rect, w: i32, h: i32, tolerance: i32) -> Result<()> {
    let ok = i64::from(subject.w) >= i64::from(w) - i64::from(tolerance)
        && i64::from(subject.h) >= i64::from(h) - i64::from(tolerance);
    if ok {
        return Ok(());
    }
    fail(format!(
        "has_min_size: expected at least {w}x{h} (tolerance {tolerance}), got {subject}"
    ))
}

/// Width and height must each be at most the given value, plus `tolerance`.
pub fn max_size(subject: &Rect, w: i32, h: i32, tolerance: i32) -> Result<()> {
    let ok = i64::from(subject.w) <= i64::from(w) + i64::from(tolerance)
        && i64::from(subject.h) <= i64::from(h) + i64::from(tolerance);
    if ok {
        return Ok(());
    }
    fail(format!(
        "has_max_size: expected at most {w}x{h} (tolerance {tolerance}), got {subject}"
    ))
}

/// Width and height must match within `tolerance`.
pub fn size(subject: &Rect, w: i32, h: i32, tolerance: i32) -> Result<()> {
    if near(subject.w, w, tolerance) && near(subject.h, h, tolerance) {
        return Ok(());
    }
    fail(format!(
        "has_size: expected {w}x{h} (tolerance {tolerance}), got {subject}"
    ))
}

/// The origin must match within `tolerance`.
pub fn position(subject: &Rect, x: i32, y: i32, tolerance: i32) -> Result<()> {
    if near(subject.x, x, tolerance) && near(subject.y, y, tolerance) {
        return Ok(());
    }
    fail(format!(
        "has_position: expected ({x}, {y}) (tolerance {tolerance}), got {subject}"
    ))
}

/// Check a signed gap against a required minimum.
fn gap_rule(
    rule: &str,
    measured: i64,
    subject: &Rect,
    other: &Rect,
    gap: i32,
    tolerance: i32,
) -> Result<()> {
    let required = i64::from(gap) - i64::from(tolerance);
    if measured >= required {
        return Ok(());
    }
    fail(format!(
        "{rule}: gap {measured} is less than {gap} (tolerance {tolerance}); subject {subject}, other {other}"
    ))
}

/// The subject's right edge must be at least `gap` left of the other's left
/// edge.
pub fn left_of(subject: &Rect, other: &Rect, gap: i32, tolerance: i32) -> Result<()> {
    let measured = i64::from(other.left()) - i64::from(subject.right());
    gap_rule("is_left_of", measured, subject, other, gap, tolerance)
}

/// The subject's left edge must be at least `gap` right of the other's right
/// edge.
pub fn right_of(subject: &Rect, other: &Rect, gap: i32, tolerance: i32) -> Result<()> {
    let measured = i64::from(subject.left()) - i64::from(other.right());
    gap_rule("is_right_of", measured, subject, other, gap, tolerance)
}

/// The subject's bottom edge must be at least `gap` above the other's top.
pub fn above(subject: &Rect, other: &Rect, gap: i32, tolerance: i32) -> Result<()> {
    let measured = i64::from(other.top()) - i64::from(subject.bottom());
    gap_rule("is_above", measured, subject, other, gap, tolerance)
}

/// The subject's top edge must be at least `gap` below the other's bottom.
pub fn below(subject: &Rect, other: &Rect, gap: i32, tolerance: i32) -> Result<()> {
    let measured = i64::from(subject.top()) - i64::from(other.bottom());
    gap_rule("is_below", measured, subject, other, gap, tolerance)
}

/// The given edge of both rectangles must match within `tolerance`.
pub fn edge_aligned(subject: &Rect, other: &Rect, edge: Edge, tolerance: i32) -> Result<()> {
    if near(subject.edge(edge), other.edge(edge), tolerance) {
        return Ok(());
    }
    fail(format!(
        "is_{}_aligned: {} vs {} (tolerance {tolerance}); subject {subject}, other {other}",
        edge.name(),
        subject.edge(edge),
        other.edge(edge),
    ))
}

/// Centers along `axis` must match within `tolerance`.
pub fn center_aligned(subject: &Rect, other: &Rect, axis: Axis, tolerance: i32) -> Result<()> {
    if near(subject.center(axis), other.center(axis), tolerance) {
        return Ok(());
    }
    fail(format!(
        "is_{}_center_aligned: {} vs {} (tolerance {tolerance}); subject {subject}, other {other}",
        axis.name(),
        subject.center(axis),
        other.center(axis),
    ))
}

/// All four edges of the subject must lie inside the container.
pub fn within(subject: &Rect, container: &Rect) -> Result<()> {
    if container.contains_rect(subject) {
        return Ok(());
    }
    fail(format!(
        "is_within: subject {subject} extends outside container {container}"
    ))
}

/// The rectangles must be disjoint along at least one axis.
pub fn no_overlap(subject: &Rect, other: &Rect) -> Result<()> {
    if subject.is_disjoint(other) {
        return Ok(());
    }
    fail(format!(
        "does_not_overlap: subject {subject} overlaps other {other} in {}",
        subject.intersect(other)
    ))
}

/// Both centers of the subject must match the container's within
/// `tolerance`.
pub fn centered_in(subject: &Rect, container: &Rect, tolerance: i32) -> Result<()> {
    if near(subject.center_x(), container.center_x(), tolerance)
        && near(subject.center_y(), container.center_y(), tolerance)
    {
        return Ok(());
    }
    fail(format!(
        "is_centered_in: center ({}, {}) vs ({}, {}) (tolerance {tolerance}); subject {subject}, container {container}",
        subject.center_x(),
        subject.center_y(),
        container.center_x(),
        container.center_y(),
    ))
}

/// Both edges of the subject along `axis` must match the container's.
pub fn fills(subject: &Rect, container: &Rect, axis: Axis, tolerance: i32) -> Result<()> {
    if near(subject.start(axis), container.start(axis), tolerance)
        && near(subject.end(axis), container.end(axis), tolerance)
    {
        return Ok(());
    }
    fail(format!(
        "fills_{}: subject spans {}..{}, container {}..{} (tolerance {tolerance}); subject {subject}, container {container}",
        axis.name(),
        subject.start(axis),
        subject.end(axis),
        container.start(axis),
        container.end(axis),
    ))
}

/// The subject must lie inside the container, no further than
/// `max_distance` from the given edge.
pub fn near_edge(subject: &Rect, container: &Rect, edge: Edge, max_distance: i32) -> Result<()> {
    let distance = match edge {
        Edge::Left | Edge::Top => i64::from(subject.edge(edge)) - i64::from(container.edge(edge)),
        Edge::Right | Edge::Bottom => {
            i64::from(container.edge(edge)) - i64::from(subject.edge(edge))
        }
    };
    if (0..=i64::from(max_distance)).contains(&distance) {
        return Ok(());
    }
    fail(format!(
        "is_near_{}_edge: distance {distance} not in 0..={max_distance}; subject {subject}, container {container}",
        edge.name(),
    ))
}

/// Prefix a failure with the positions of the elements involved.
fn at_pair(outcome: Result<()>, a: usize, b: usize) -> Result<()> {
    outcome.map_err(|e| match e {
        Error::Assertion(msg) => Error::Assertion(format!("elements {a} and {b}: {msg}")),
        other => other,
    })
}

/// Prefix a failure with the position of the element involved.
fn at(outcome: Result<()>, i: usize) -> Result<()> {
    outcome.map_err(|e| match e {
        Error::Assertion(msg) => Error::Assertion(format!("element {i}: {msg}")),
        other => other,
    })
}

/// Every element must occupy some space.
pub fn all_visible(rects: &[Rect]) -> Result<()> {
    for (i, r) in rects.iter().enumerate() {
        at(visible(r), i)?;
    }
    Ok(())
}

/// Every element must share the first element's edge.
pub fn all_aligned(rects: &[Rect], edge: Edge, tolerance: i32) -> Result<()> {
    let Some(first) = rects.first() else {
        return Ok(());
    };
    for (i, r) in rects.iter().enumerate().skip(1) {
        at_pair(edge_aligned(r, first, edge, tolerance), 0, i)?;
    }
    Ok(())
}

/// Each element must lie right of its predecessor, at least `min_gap` apart.
pub fn arranged_in_row(rects: &[Rect], min_gap: i32) -> Result<()> {
    for (i, pair) in rects.windows(2).enumerate() {
        at_pair(right_of(&pair[1], &pair[0], min_gap, EXACT), i, i + 1)?;
    }
    Ok(())
}

/// Each element must lie below its predecessor, at least `min_gap` apart.
pub fn arranged_in_column(rects: &[Rect], min_gap: i32) -> Result<()> {
    for (i, pair) in rects.windows(2).enumerate() {
        at_pair(below(&pair[1], &pair[0], min_gap, EXACT), i, i + 1)?;
    }
    Ok(())
}

/// Gaps between consecutive elements along `axis` must all equal `expected`
/// within `tolerance`.
pub fn uniform_spacing(rects: &[Rect], axis: Axis, expected: i32, tolerance: i32) -> Result<()> {
    for (i, pair) in rects.windows(2).enumerate() {
        let gap = i64::from(pair[1].start(axis)) - i64::from(pair[0].end(axis));
        if (gap - i64::from(expected)).abs() > i64::from(tolerance) {
            return fail(format!(
                "elements {i} and {}: have_uniform_spacing: {} gap {gap}, expected {expected} (tolerance {tolerance}); {} and {}",
                i + 1,
                axis.name(),
                pair[0],
                pair[1],
            ));
        }
    }
    Ok(())
}

/// No two elements may overlap.
pub fn none_overlap(rects: &[Rect]) -> Result<()> {
    for (i, a) in rects.iter().enumerate() {
        for (j, b) in rects.iter().enumerate().skip(i + 1) {
            at_pair(no_overlap(a, b), i, j)?;
        }
    }
    Ok(())
}

/// Every element must lie inside the container.
pub fn all_within(rects: &[Rect], container: &Rect) -> Result<()> {
    for (i, r) in rects.iter().enumerate() {
        at(within(r, container), i)?;
    }
    Ok(())
}
