//! Rendering toolkit contract.
//!
//! The engine never draws. Hosts implement [`Toolkit`] over their widget system
//! and the engine drives it through construction, attach/detach and live
//! property access.

use crate::ids::WidgetHandle;
use crate::params::Hints;
use crate::resolver::PlacementSpec;
use crate::value::Value;

/// A widget property changed outside the engine's own assignments.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyChange {
    pub widget: WidgetHandle,
    pub name: String,
}

pub trait Toolkit {
    /// Designated top-level container used when no layout is open.
    fn root(&self) -> WidgetHandle;

    /// Display refresh interval in seconds, when the host knows it.
    fn frame_interval(&self) -> Option<f64> {
        None
    }

    /// Whether widgets of `class` can hold children.
    fn is_container(&self, class: &str) -> bool;

    /// Live properties exposed by widgets of `class`.
    fn property_names(&self, class: &str) -> Vec<String>;

    fn construct(&mut self, class: &str, spec: &PlacementSpec) -> anyhow::Result<WidgetHandle>;

    /// Drop a constructed widget that will never be attached.
    fn release(&mut self, _widget: WidgetHandle) {}

    /// Start reporting changes of `names` on `widget` through [`Toolkit::take_changes`].
    fn subscribe(&mut self, widget: WidgetHandle, names: &[String]) -> anyhow::Result<()>;

    fn attach(
        &mut self,
        parent: WidgetHandle,
        child: WidgetHandle,
        index: usize,
    ) -> anyhow::Result<()>;

    fn detach(&mut self, parent: WidgetHandle, child: WidgetHandle) -> anyhow::Result<()>;

    fn get_property(&self, widget: WidgetHandle, name: &str) -> Option<Value>;

    fn set_property(&mut self, widget: WidgetHandle, name: &str, value: Value)
        -> anyhow::Result<()>;

    fn set_hints(&mut self, widget: WidgetHandle, hints: &Hints) -> anyhow::Result<()>;

    /// Drain changes observed on subscribed properties since the last call.
    fn take_changes(&mut self) -> Vec<PropertyChange>;
}
