//! Integration tests for layout assertion chains.

#[cfg(test)]
mod tests {
    use uidrive::{
        Error, Session,
        error::Result,
        geom::{Axis, Edge, Rect},
        headless::{HeadlessDisplay, WidgetId},
    };

    /// A session with a 200x100 shell at the display origin.
    fn setup() -> Result<(Session<HeadlessDisplay>, WidgetId)> {
        let s = Session::init(HeadlessDisplay::new)?;
        let shell = s.dispatch(|d| d.create_shell(Rect::new(0, 0, 200, 100)))?;
        Ok((s, shell))
    }

    /// Add a widget to `parent`.
    fn add(s: &Session<HeadlessDisplay>, parent: WidgetId, r: Rect) -> Result<WidgetId> {
        s.dispatch(move |d| d.create_widget(parent, r))?
    }

    /// The message of an assertion failure.
    fn assertion_message<T>(outcome: Result<T>) -> String {
        match outcome {
            Err(Error::Assertion(msg)) => msg,
            Err(e) => panic!("expected an assertion failure, got {e}"),
            Ok(_) => panic!("expected an assertion failure"),
        }
    }

    #[test]
    fn gap_boundary() -> Result<()> {
        let (s, shell) = setup()?;
        let a = add(&s, shell, Rect::new(0, 0, 10, 10))?;
        let near = add(&s, shell, Rect::new(19, 0, 10, 10))?;
        let far = add(&s, shell, Rect::new(20, 0, 10, 10))?;

        let msg = assertion_message(s.assert_layout(&near).is_right_of(&a, 10));
        assert!(msg.contains("is_right_of"));
        assert!(msg.contains("gap 9"));
        assert!(msg.contains("[x=19 y=0 w=10 h=10]"));
        assert!(msg.contains("[x=0 y=0 w=10 h=10]"));

        s.assert_layout(&far).is_right_of(&a, 10)?;
        s.assert_layout(&a).is_left_of(&far, 10)?;
        s.assert_layout(&near).is_right_of_within(&a, 10, 1)?;
        Ok(())
    }

    #[test]
    fn row_arrangement() -> Result<()> {
        let (s, shell) = setup()?;
        let items = [
            add(&s, shell, Rect::new(0, 0, 10, 10))?,
            add(&s, shell, Rect::new(20, 0, 10, 10))?,
            add(&s, shell, Rect::new(50, 0, 10, 10))?,
        ];
        s.assert_layout_all(&items)
            .are_all_visible()?
            .are_arranged_in_row(5)?
            .are_aligned(Edge::Top)?
            .do_not_overlap()?
            .are_all_within(&shell)?;

        let third = items[2];
        s.dispatch(move |d| d.set_bounds(third, Rect::new(33, 0, 10, 10)))??;
        let msg = assertion_message(s.assert_layout_all(&items).are_arranged_in_row(5));
        assert!(msg.starts_with("elements 1 and 2"));
        assert!(msg.contains("gap 3"));
        Ok(())
    }

    #[test]
    fn chain_uses_one_snapshot() -> Result<()> {
        let (s, shell) = setup()?;
        let w = add(&s, shell, Rect::new(10, 10, 30, 20))?;
        let chain = s.assert_layout(&w);
        chain.has_size(30, 20)?;

        s.dispatch(move |d| d.set_bounds(w, Rect::new(10, 10, 60, 20)))??;
        chain.has_size(30, 20)?.has_position(10, 10)?;
        assert_eq!(chain.bounds()?, Rect::new(10, 10, 30, 20));

        // A fresh chain sees the change.
        s.assert_layout(&w).has_size(60, 20)?;
        Ok(())
    }

    #[test]
    fn single_subject_rules() -> Result<()> {
        let (s, shell) = setup()?;
        let header = add(&s, shell, Rect::new(0, 0, 200, 20))?;
        let body = add(&s, shell, Rect::new(0, 25, 200, 60))?;
        let button = add(&s, shell, Rect::new(86, 40, 31, 21))?;
        let corner = add(&s, shell, Rect::new(190, 92, 8, 6))?;

        s.assert_layout(&header)
            .is_visible()?
            .fills(Axis::Horizontal, &shell)?
            .is_above(&body, 5)?
            .is_aligned(Edge::Left, &body)?
            .is_within(&shell)?
            .does_not_overlap(&body)?;

        s.assert_layout(&button)
            .is_centered_in(&shell)?
            .is_center_aligned(Axis::Horizontal, &body)?
            .has_min_size(30, 20)?
            .has_max_size(31, 21)?
            .is_below(&header, 20)?;
        assert!(s.assert_layout(&button).is_centered_in_within(&shell, 0).is_err());

        s.assert_layout(&corner)
            .is_near_edge(Edge::Right, &shell, 2)?
            .is_near_edge(Edge::Bottom, &shell, 2)?;
        let msg = assertion_message(s.assert_layout(&corner).is_near_edge(Edge::Left, &shell, 10));
        assert!(msg.contains("is_near_left_edge"));

        let msg = assertion_message(s.assert_layout(&button).does_not_overlap(&body));
        assert!(msg.contains("does_not_overlap"));
        Ok(())
    }

    #[test]
    fn hidden_widget_is_invisible() -> Result<()> {
        let (s, shell) = setup()?;
        let w = add(&s, shell, Rect::new(10, 10, 30, 20))?;
        s.dispatch(move |d| d.set_visible(w, false))??;
        s.assert_layout(&w).is_invisible()?.has_position(10, 10)?;
        let failed = s.assert_layout(&w).has_size(30, 20).err();
        assert!(failed.is_some_and(|e| e.is_assertion() && !e.is_dispatch()));
        let msg = assertion_message(s.assert_layout(&w).is_visible());
        assert!(msg.contains("zero area"));
        Ok(())
    }

    #[test]
    fn reference_limits_clipping() -> Result<()> {
        let s = Session::init(HeadlessDisplay::new)?;
        let shell = s.dispatch(|d| d.create_shell(Rect::new(0, 0, 200, 200)))?;
        let panel = add(&s, shell, Rect::new(50, 50, 40, 40))?;
        let child = add(&s, panel, Rect::new(30, 30, 20, 20))?;

        // Clipped by the panel.
        s.assert_layout(&child).has_size(10, 10)?;
        // Clipping stops at the panel; the position stays in display space.
        s.assert_layout_in(&child, &panel)
            .has_size(20, 20)?
            .has_position(80, 80)?;
        s.assert_layout_all_in(&[child], &panel)
            .are_all_visible()?
            .have_uniform_spacing(Axis::Vertical, 0)?;
        Ok(())
    }

    #[test]
    fn uniform_spacing_reports_pair() -> Result<()> {
        let (s, shell) = setup()?;
        let items = [
            add(&s, shell, Rect::new(0, 0, 20, 10))?,
            add(&s, shell, Rect::new(0, 15, 20, 10))?,
            add(&s, shell, Rect::new(0, 32, 20, 10))?,
        ];
        let chain = s.assert_layout_all(&items);
        chain
            .are_arranged_in_column(5)?
            .have_uniform_spacing_within(Axis::Vertical, 6, 1)?;
        let msg = assertion_message(chain.have_uniform_spacing(Axis::Vertical, 5));
        assert!(msg.starts_with("elements 1 and 2"));
        assert!(msg.contains("gap 7"));
        Ok(())
    }
}
