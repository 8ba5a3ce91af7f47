use slotmap::{SlotMap, new_key_type};

use crate::{
    error::{Error, Result},
    geom::{Point, Rect},
};

new_key_type! {
    /// Handle to a widget in a headless display.
    pub struct WidgetId;
}

/// A node in the widget tree.
#[derive(Debug, Clone)]
struct Node {
    /// Parent widget, `None` for a shell.
    parent: Option<WidgetId>,
    /// Children, in creation order.
    children: Vec<WidgetId>,
    /// Bounds relative to the parent. A shell's bounds are in display
    /// coordinates.
    bounds: Rect,
    /// The widget's own visibility flag.
    visible: bool,
}

/// Arena of widgets.
#[derive(Debug, Default)]
pub(super) struct WidgetTree {
    /// Widget storage.
    nodes: SlotMap<WidgetId, Node>,
}

impl WidgetTree {
    /// Look up a live widget.
    fn node(&self, id: WidgetId) -> Result<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| Error::Widget(format!("{id:?} is disposed")))
    }

    /// Look up a live widget for mutation.
    fn node_mut(&mut self, id: WidgetId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| Error::Widget(format!("{id:?} is disposed")))
    }

    /// Add a top-level container.
    pub(super) fn add_shell(&mut self, bounds: Rect) -> WidgetId {
        self.nodes.insert(Node {
            parent: None,
            children: vec![],
            bounds,
            visible: true,
        })
    }

    /// Add a child widget.
    pub(super) fn add_child(&mut self, parent: WidgetId, bounds: Rect) -> Result<WidgetId> {
        self.node(parent)?;
        let id = self.nodes.insert(Node {
            parent: Some(parent),
            children: vec![],
            bounds,
            visible: true,
        });
        self.node_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// Remove a widget and its subtree.
    pub(super) fn remove(&mut self, id: WidgetId) -> Result<()> {
        let parent = self.node(id)?.parent;
        if let Some(p) = parent.and_then(|p| self.nodes.get_mut(p)) {
            p.children.retain(|c| *c != id);
        }
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            if let Some(node) = self.nodes.remove(n) {
                stack.extend(node.children);
            }
        }
        Ok(())
    }

    /// Remove everything.
    pub(super) fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Does the widget exist?
    pub(super) fn contains(&self, id: WidgetId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Bounds relative to the parent.
    pub(super) fn bounds(&self, id: WidgetId) -> Result<Rect> {
        Ok(self.node(id)?.bounds)
    }

    /// Replace a widget's bounds.
    pub(super) fn set_bounds(&mut self, id: WidgetId, bounds: Rect) -> Result<()> {
        self.node_mut(id)?.bounds = bounds;
        Ok(())
    }

    /// Set a widget's own visibility flag.
    pub(super) fn set_visible(&mut self, id: WidgetId, visible: bool) -> Result<()> {
        self.node_mut(id)?.visible = visible;
        Ok(())
    }

    /// The widget's parent.
    pub(super) fn parent(&self, id: WidgetId) -> Result<Option<WidgetId>> {
        Ok(self.node(id)?.parent)
    }

    /// The widget's children, in creation order.
    pub(super) fn children(&self, id: WidgetId) -> Result<Vec<WidgetId>> {
        Ok(self.node(id)?.children.clone())
    }

    /// The widget and its ancestors, innermost first.
    fn lineage(&self, id: WidgetId) -> Result<Vec<&Node>> {
        let mut out = vec![self.node(id)?];
        while let Some(p) = out.last().and_then(|n| n.parent) {
            out.push(self.node(p)?);
        }
        Ok(out)
    }

    /// True if the widget and all its ancestors are visible.
    pub(super) fn is_showing(&self, id: WidgetId) -> Result<bool> {
        Ok(self.lineage(id)?.iter().all(|n| n.visible))
    }

    /// Convert a widget-local point to display coordinates.
    pub(super) fn to_display(&self, id: WidgetId, p: Point) -> Result<Point> {
        Ok(self
            .lineage(id)?
            .iter()
            .fold(p, |acc, n| acc + n.bounds.origin()))
    }

    /// The top-level container holding the widget.
    pub(super) fn shell(&self, id: WidgetId) -> Result<WidgetId> {
        let mut current = id;
        while let Some(p) = self.node(current)?.parent {
            current = p;
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_and_visibility() -> Result<()> {
        let mut t = WidgetTree::default();
        let shell = t.add_shell(Rect::new(100, 50, 300, 300));
        let a = t.add_child(shell, Rect::new(10, 20, 100, 100))?;
        let b = t.add_child(a, Rect::new(5, 5, 10, 10))?;

        assert_eq!(t.to_display(b, Point::zero())?, Point::new(115, 75));
        assert_eq!(t.to_display(b, Point::new(1, 2))?, Point::new(116, 77));
        assert_eq!(t.shell(b)?, shell);
        assert_eq!(t.parent(b)?, Some(a));
        assert_eq!(t.children(shell)?, vec![a]);

        assert!(t.is_showing(b)?);
        t.set_visible(a, false)?;
        assert!(!t.is_showing(b)?);
        assert!(t.is_showing(shell)?);
        Ok(())
    }

    #[test]
    fn remove_subtree() -> Result<()> {
        let mut t = WidgetTree::default();
        let shell = t.add_shell(Rect::new(0, 0, 10, 10));
        let a = t.add_child(shell, Rect::new(0, 0, 5, 5))?;
        let b = t.add_child(a, Rect::new(0, 0, 1, 1))?;
        t.remove(a)?;
        assert!(!t.contains(a));
        assert!(!t.contains(b));
        assert!(t.children(shell)?.is_empty());
        assert!(matches!(t.bounds(b), Err(Error::Widget(_))));
        assert!(t.add_child(b, Rect::default()).is_err());
        Ok(())
    }
}
