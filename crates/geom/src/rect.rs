use std::fmt;

use super::{Axis, Edge, Point};

/// A rectangle with a signed origin and a non-negative size.
///
/// A zero width or height means the rectangle occupies no space. Sizes are
/// stored as `i32` so that edge arithmetic never needs casts, but no
/// operation in this crate produces a negative size.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Default)]
pub struct Rect {
    /// Left coordinate.
    pub x: i32,
    /// Top coordinate.
    pub y: i32,
    /// Width.
    pub w: i32,
    /// Height.
    pub h: i32,
}

impl Rect {
    /// Construct a rectangle. Negative sizes are clamped to zero.
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            x,
            y,
            w: w.max(0),
            h: h.max(0),
        }
    }

    /// A zero-sized rectangle at `p`.
    pub fn zero_at(p: Point) -> Self {
        Self::new(p.x, p.y, 0, 0)
    }

    /// The top-left corner.
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Left edge.
    pub fn left(&self) -> i32 {
        self.x
    }

    /// Right edge (exclusive). Saturates at `i32::MAX`.
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.w)
    }

    /// Top edge.
    pub fn top(&self) -> i32 {
        self.y
    }

    /// Bottom edge (exclusive). Saturates at `i32::MAX`.
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.h)
    }

    /// Horizontal center, rounded towards the left edge.
    pub fn center_x(&self) -> i32 {
        self.x.saturating_add(self.w / 2)
    }

    /// Vertical center, rounded towards the top edge.
    pub fn center_y(&self) -> i32 {
        self.y.saturating_add(self.h / 2)
    }

    /// The coordinate of one edge.
    pub fn edge(&self, edge: Edge) -> i32 {
        match edge {
            Edge::Left => self.left(),
            Edge::Right => self.right(),
            Edge::Top => self.top(),
            Edge::Bottom => self.bottom(),
        }
    }

    /// The leading edge along an axis.
    pub fn start(&self, axis: Axis) -> i32 {
        match axis {
            Axis::Horizontal => self.left(),
            Axis::Vertical => self.top(),
        }
    }

    /// The trailing edge along an axis.
    pub fn end(&self, axis: Axis) -> i32 {
        match axis {
            Axis::Horizontal => self.right(),
            Axis::Vertical => self.bottom(),
        }
    }

    /// The center along an axis.
    pub fn center(&self, axis: Axis) -> i32 {
        match axis {
            Axis::Horizontal => self.center_x(),
            Axis::Vertical => self.center_y(),
        }
    }

    /// The area of the rectangle.
    pub fn area(&self) -> i64 {
        i64::from(self.w) * i64::from(self.h)
    }

    /// Does this rect occupy no space?
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Intersect two rectangles. Rectangles that do not overlap produce a
    /// zero-area rectangle positioned at the larger of the two origins on each
    /// axis.
    pub fn intersect(&self, other: &Self) -> Self {
        let left = self.left().max(other.left());
        let top = self.top().max(other.top());
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        Self::new(left, top, right.saturating_sub(left), bottom.saturating_sub(top))
    }

    /// True if the rectangles share no area. Touching edges do not overlap.
    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.right() <= other.left()
            || other.right() <= self.left()
            || self.bottom() <= other.top()
            || other.bottom() <= self.top()
    }

    /// True if `other` lies entirely within this rectangle.
    pub fn contains_rect(&self, other: &Self) -> bool {
        other.left() >= self.left()
            && other.right() <= self.right()
            && other.top() >= self.top()
            && other.bottom() <= self.bottom()
    }

    /// Does the rectangle contain the point?
    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.left() && p.x < self.right() && p.y >= self.top() && p.y < self.bottom()
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[x={} y={} w={} h={}]", self.x, self.y, self.w, self.h)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn edges() {
        let r = Rect::new(10, 20, 30, 41);
        assert_eq!(r.left(), 10);
        assert_eq!(r.right(), 40);
        assert_eq!(r.top(), 20);
        assert_eq!(r.bottom(), 61);
        assert_eq!(r.center_x(), 25);
        assert_eq!(r.center_y(), 40);
        assert_eq!(r.edge(Edge::Bottom), 61);
        assert_eq!(r.start(Axis::Vertical), 20);
        assert_eq!(r.end(Axis::Horizontal), 40);
        assert_eq!(r.area(), 30 * 41);
    }

    #[test]
    fn edges_saturate_near_the_limit() {
        let r = Rect::new(i32::MAX - 5, i32::MAX - 2, 10, 10);
        assert_eq!(r.right(), i32::MAX);
        assert_eq!(r.bottom(), i32::MAX);
        assert_eq!(r.center_x(), i32::MAX);
        assert!(!r.is_disjoint(&Rect::new(i32::MAX - 1, i32::MAX - 1, 1, 1)));

        let wide = Rect::new(i32::MIN, 0, i32::MAX, 1);
        let z = wide.intersect(&Rect::new(0, 0, i32::MAX, 1));
        assert_eq!(z.x, 0);
        assert!(z.w >= 0);
    }

    #[test]
    fn negative_size_clamps() {
        let r = Rect::new(0, 0, -5, 3);
        assert_eq!(r.w, 0);
        assert!(r.is_empty());
    }

    #[test]
    fn intersect() {
        let a = Rect::new(0, 0, 10, 10);
        assert_eq!(a.intersect(&Rect::new(5, 5, 10, 10)), Rect::new(5, 5, 5, 5));
        assert_eq!(a.intersect(&Rect::new(2, 2, 3, 3)), Rect::new(2, 2, 3, 3));
        // Disjoint rects yield zero area rather than an error.
        let z = a.intersect(&Rect::new(20, 3, 5, 5));
        assert_eq!(z, Rect::new(20, 3, 0, 5));
        assert!(z.is_empty());
        assert!(a.intersect(&Rect::new(10, 0, 5, 5)).is_empty());
    }

    #[test]
    fn disjoint() {
        let a = Rect::new(0, 0, 10, 10);
        assert!(a.is_disjoint(&Rect::new(10, 0, 10, 10)));
        assert!(a.is_disjoint(&Rect::new(0, 10, 10, 10)));
        assert!(!a.is_disjoint(&Rect::new(9, 9, 10, 10)));
    }

    #[test]
    fn contains() {
        let a = Rect::new(0, 0, 10, 10);
        assert!(a.contains_rect(&a));
        assert!(a.contains_rect(&Rect::new(2, 2, 8, 8)));
        assert!(!a.contains_rect(&Rect::new(2, 2, 9, 8)));
        assert!(a.contains_point(Point::new(9, 9)));
        assert!(!a.contains_point(Point::new(10, 9)));
    }

    fn rect_strategy() -> impl Strategy<Value = Rect> {
        (-100i32..100, -100i32..100, 0i32..80, 0i32..80)
            .prop_map(|(x, y, w, h)| Rect::new(x, y, w, h))
    }

    proptest! {
        #[test]
        fn disjoint_matches_edge_rule(a in rect_strategy(), b in rect_strategy()) {
            let expected = a.right() <= b.left()
                || b.right() <= a.left()
                || a.bottom() <= b.top()
                || b.bottom() <= a.top();
            prop_assert_eq!(a.is_disjoint(&b), expected);
            prop_assert_eq!(a.is_disjoint(&b), b.is_disjoint(&a));
        }

        #[test]
        fn intersection_is_bounded_by_both(a in rect_strategy(), b in rect_strategy()) {
            let i = a.intersect(&b);
            prop_assert!(i.w >= 0 && i.h >= 0);
            prop_assert_eq!(i, b.intersect(&a));
            if !i.is_empty() {
                prop_assert!(a.contains_rect(&i));
                prop_assert!(b.contains_rect(&i));
            }
            prop_assert!(i.area() <= a.area().min(b.area()));
        }

        #[test]
        fn non_empty_intersection_iff_overlap(a in rect_strategy(), b in rect_strategy()) {
            let overlaps = !a.is_disjoint(&b) && !a.is_empty() && !b.is_empty();
            prop_assert_eq!(!a.intersect(&b).is_empty(), overlaps);
        }
    }
}
