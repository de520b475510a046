//! Layout stack and grouping regions.
//!
//! Entering a layout-capable element pushes it on the [`LayoutStack`] and opens
//! a [`GroupingRegion`] whose first child is the layout element itself.
//! Everything declared while the region is open joins it, and elements that do
//! not name a layout attach under the top of the stack when they appear.
//!
//! The stack is owned by the engine, so separate engines never share it.

use serde::Serialize;

use crate::ids::{ElementId, GroupId, StateRef};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct GroupChild {
    pub target: StateRef,
    /// Whether the region waits for this child before completing.
    pub blocking: bool,
}

/// Implicit parallel composition opened by entering a layout element.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupingRegion {
    pub id: GroupId,
    pub name: String,
    pub owner: ElementId,
    pub children: Vec<GroupChild>,
    /// Still accepting children.
    pub open: bool,
    pub completed_at: Option<f64>,
}

impl GroupingRegion {
    pub fn new(id: GroupId, owner: ElementId) -> Self {
        Self {
            id,
            name: "LAYOUT".to_string(),
            owner,
            children: vec![GroupChild {
                target: StateRef::Element(owner),
                blocking: true,
            }],
            open: true,
            completed_at: None,
        }
    }

    pub fn claim_child(&mut self, target: StateRef) {
        self.children.push(GroupChild {
            target,
            blocking: true,
        });
    }

    pub fn set_child_blocking(&mut self, index: usize, blocking: bool) {
        if let Some(child) = self.children.get_mut(index) {
            child.blocking = blocking;
        }
    }

    /// Close the region. A layout without a fixed duration lasts as long as
    /// its children, so only the children block; a layout with a duration
    /// bounds its children, so only the layout itself blocks.
    pub fn close(&mut self, owner_has_duration: bool) {
        self.open = false;
        if owner_has_duration {
            for n in 1..self.children.len() {
                self.set_child_blocking(n, false);
            }
        } else {
            self.set_child_blocking(0, false);
        }
    }

    pub fn blocking(&self) -> impl Iterator<Item = StateRef> + '_ {
        self.children.iter().filter(|c| c.blocking).map(|c| c.target)
    }

    pub fn non_blocking(&self) -> impl Iterator<Item = StateRef> + '_ {
        self.children.iter().filter(|c| !c.blocking).map(|c| c.target)
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct StackEntry {
    element: ElementId,
    region: GroupId,
}

/// Last-wins stack of currently open layouts.
#[derive(Debug, Default)]
pub struct LayoutStack {
    entries: Vec<StackEntry>,
}

impl LayoutStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, element: ElementId, region: GroupId) {
        self.entries.push(StackEntry { element, region });
    }

    /// Pop the top entry when it belongs to `element`.
    pub fn pop_if(&mut self, element: ElementId) -> Option<GroupId> {
        match self.entries.last() {
            Some(top) if top.element == element => self.entries.pop().map(|e| e.region),
            _ => None,
        }
    }

    /// Innermost open layout element.
    #[inline]
    pub fn top(&self) -> Option<ElementId> {
        self.entries.last().map(|e| e.element)
    }

    /// Region of the innermost open layout.
    #[inline]
    pub fn top_region(&self) -> Option<GroupId> {
        self.entries.last().map(|e| e.region)
    }

    pub fn contains(&self, element: ElementId) -> bool {
        self.entries.iter().any(|e| e.element == element)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
