//! Geometry primitives used across uidrive.
//!
//! All coordinates are signed integers in a single display coordinate space.
//! Widths and heights may be zero, which denotes a rectangle that occupies no
//! space.

/// Point helpers.
mod point;
/// Rectangle operations.
mod rect;

pub use point::Point;
pub use rect::Rect;

/// A layout axis.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Axis {
    /// The x axis.
    Horizontal,
    /// The y axis.
    Vertical,
}

impl Axis {
    /// Lower-case name, used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Horizontal => "horizontal",
            Self::Vertical => "vertical",
        }
    }
}

/// One of the four edges of a rectangle.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Edge {
    /// The left edge.
    Left,
    /// The right edge.
    Right,
    /// The top edge.
    Top,
    /// The bottom edge.
    Bottom,
}

impl Edge {
    /// Lower-case name, used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Top => "top",
            Self::Bottom => "bottom",
        }
    }
}
