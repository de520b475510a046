//! In-memory toolkit that records every call the engine makes.

use anyhow::{anyhow, bail, Result};
use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;

use cuekit_core::{Hints, PlacementSpec, PropertyChange, PropertyMap, Toolkit, Value, WidgetHandle};

use crate::ClassSpec;

const GEOMETRY: [&str; 8] = [
    "x", "y", "right", "top", "center_x", "center_y", "width", "height",
];

/// Combined keys and the pair of scalar properties they stand for.
const COMBINED: [(&str, &str, &str); 3] = [
    ("pos", "x", "y"),
    ("size", "width", "height"),
    ("center", "center_x", "center_y"),
];

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Construct {
        widget: WidgetHandle,
        class: String,
    },
    Attach {
        parent: WidgetHandle,
        child: WidgetHandle,
        index: usize,
    },
    Detach {
        parent: WidgetHandle,
        child: WidgetHandle,
    },
    SetHints {
        widget: WidgetHandle,
    },
    Release {
        widget: WidgetHandle,
    },
}

#[derive(Clone, Debug)]
pub struct Widget {
    pub class: String,
    pub properties: PropertyMap,
    pub placement: PlacementSpec,
    pub hints: Hints,
    pub subscribed: HashSet<String>,
    pub children: Vec<WidgetHandle>,
    pub parent: Option<WidgetHandle>,
}

#[derive(Debug)]
pub struct RecordingToolkit {
    catalog: IndexMap<String, ClassSpec>,
    widgets: HashMap<WidgetHandle, Widget>,
    next: u64,
    frame_interval: Option<f64>,
    fail_attach: HashSet<String>,
    fail_construct: HashSet<String>,
    fail_subscribe: HashSet<String>,
    changes: Vec<PropertyChange>,
    calls: Vec<Call>,
}

pub const ROOT: WidgetHandle = WidgetHandle(0);

impl RecordingToolkit {
    /// Toolkit over the fixture class catalog.
    pub fn new() -> Self {
        let catalog = crate::classes::load().expect("class catalog fixture should load");
        Self::with_catalog(catalog)
    }

    pub fn with_catalog(catalog: IndexMap<String, ClassSpec>) -> Self {
        let mut widgets = HashMap::new();
        widgets.insert(
            ROOT,
            Widget {
                class: "Root".to_string(),
                properties: PropertyMap::new(),
                placement: cuekit_core::resolve(&PropertyMap::new(), &Hints::default()),
                hints: Hints::default(),
                subscribed: HashSet::new(),
                children: Vec::new(),
                parent: None,
            },
        );
        Self {
            catalog,
            widgets,
            next: 1,
            frame_interval: None,
            fail_attach: HashSet::new(),
            fail_construct: HashSet::new(),
            fail_subscribe: HashSet::new(),
            changes: Vec::new(),
            calls: Vec::new(),
        }
    }

    pub fn with_frame_interval(mut self, interval: f64) -> Self {
        self.frame_interval = Some(interval);
        self
    }

    /// Make every attach of a widget of `class` fail.
    pub fn fail_attach_for(mut self, class: &str) -> Self {
        self.fail_attach.insert(class.to_string());
        self
    }

    pub fn fail_construct_for(mut self, class: &str) -> Self {
        self.fail_construct.insert(class.to_string());
        self
    }

    pub fn fail_subscribe_for(mut self, class: &str) -> Self {
        self.fail_subscribe.insert(class.to_string());
        self
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn widget(&self, handle: WidgetHandle) -> Option<&Widget> {
        self.widgets.get(&handle)
    }

    pub fn children(&self, parent: WidgetHandle) -> Vec<WidgetHandle> {
        self.widgets
            .get(&parent)
            .map(|w| w.children.clone())
            .unwrap_or_default()
    }

    pub fn is_attached(&self, widget: WidgetHandle) -> bool {
        self.widgets.get(&widget).is_some_and(|w| w.parent.is_some())
    }

    /// Change a property the way user code outside the engine would, reporting
    /// it to subscribers.
    pub fn external_set(&mut self, widget: WidgetHandle, name: &str, value: Value) {
        let Some(w) = self.widgets.get_mut(&widget) else {
            return;
        };
        store(&mut w.properties, name, value);
        if w.subscribed.contains(name) {
            self.changes.push(PropertyChange {
                widget,
                name: name.to_string(),
            });
        }
    }

    fn class(&self, class: &str) -> Result<&ClassSpec> {
        self.catalog
            .get(class)
            .ok_or_else(|| anyhow!("unknown widget class '{class}'"))
    }
}

impl Default for RecordingToolkit {
    fn default() -> Self {
        Self::new()
    }
}

/// Store `value`, keeping combined keys and their scalar halves in sync.
fn store(properties: &mut PropertyMap, name: &str, value: Value) {
    if let Some((_, a, b)) = COMBINED.iter().find(|(k, _, _)| *k == name) {
        if let Some([va, vb]) = value.as_vec2() {
            properties.insert(a.to_string(), Value::Float(va));
            properties.insert(b.to_string(), Value::Float(vb));
        }
    }
    properties.insert(name.to_string(), value);
}

fn fetch(properties: &PropertyMap, name: &str) -> Option<Value> {
    if let Some((_, a, b)) = COMBINED.iter().find(|(k, _, _)| *k == name) {
        let a = properties.get(*a).and_then(Value::as_float)?;
        let b = properties.get(*b).and_then(Value::as_float)?;
        return Some(Value::Vec2([a, b]));
    }
    properties.get(name).cloned()
}

impl Toolkit for RecordingToolkit {
    fn root(&self) -> WidgetHandle {
        ROOT
    }

    fn frame_interval(&self) -> Option<f64> {
        self.frame_interval
    }

    fn is_container(&self, class: &str) -> bool {
        self.catalog.get(class).is_some_and(|c| c.container)
    }

    fn property_names(&self, class: &str) -> Vec<String> {
        let mut names: Vec<String> = GEOMETRY.iter().map(|s| s.to_string()).collect();
        names.extend(COMBINED.iter().map(|(k, _, _)| k.to_string()));
        if let Some(spec) = self.catalog.get(class) {
            names.extend(spec.properties.keys().cloned());
        }
        names
    }

    fn construct(&mut self, class: &str, spec: &PlacementSpec) -> Result<WidgetHandle> {
        if self.fail_construct.contains(class) {
            bail!("construct of {class} refused");
        }
        let defaults = self.class(class)?.properties.clone();
        let mut properties = PropertyMap::new();
        for (name, v) in [("x", 0.0), ("y", 0.0), ("width", 100.0), ("height", 100.0)] {
            properties.insert(name.to_string(), Value::Float(v));
        }
        properties.extend(defaults);
        for (name, value) in &spec.properties {
            store(&mut properties, name, value.clone());
        }

        let handle = WidgetHandle(self.next);
        self.next += 1;
        self.widgets.insert(
            handle,
            Widget {
                class: class.to_string(),
                properties,
                placement: spec.clone(),
                hints: spec.hints,
                subscribed: HashSet::new(),
                children: Vec::new(),
                parent: None,
            },
        );
        self.calls.push(Call::Construct {
            widget: handle,
            class: class.to_string(),
        });
        Ok(handle)
    }

    fn subscribe(&mut self, widget: WidgetHandle, names: &[String]) -> Result<()> {
        let w = self
            .widgets
            .get_mut(&widget)
            .ok_or_else(|| anyhow!("no widget {widget:?}"))?;
        if self.fail_subscribe.contains(&w.class) {
            bail!("subscribe on {} refused", w.class);
        }
        w.subscribed.extend(names.iter().cloned());
        Ok(())
    }

    fn release(&mut self, widget: WidgetHandle) {
        if self.widgets.remove(&widget).is_some() {
            self.calls.push(Call::Release { widget });
        }
    }

    fn attach(&mut self, parent: WidgetHandle, child: WidgetHandle, index: usize) -> Result<()> {
        let class = &self
            .widgets
            .get(&child)
            .ok_or_else(|| anyhow!("no widget {child:?}"))?
            .class;
        if self.fail_attach.contains(class) {
            bail!("attach of {class} refused");
        }
        let p = self
            .widgets
            .get_mut(&parent)
            .ok_or_else(|| anyhow!("no parent widget {parent:?}"))?;
        // Index counts from the end of the child list, as in stacking order.
        let at = p.children.len().saturating_sub(index);
        p.children.insert(at, child);
        if let Some(c) = self.widgets.get_mut(&child) {
            c.parent = Some(parent);
        }
        self.calls.push(Call::Attach {
            parent,
            child,
            index,
        });
        Ok(())
    }

    fn detach(&mut self, parent: WidgetHandle, child: WidgetHandle) -> Result<()> {
        let p = self
            .widgets
            .get_mut(&parent)
            .ok_or_else(|| anyhow!("no parent widget {parent:?}"))?;
        p.children.retain(|c| *c != child);
        if let Some(c) = self.widgets.get_mut(&child) {
            c.parent = None;
        }
        self.calls.push(Call::Detach { parent, child });
        Ok(())
    }

    fn get_property(&self, widget: WidgetHandle, name: &str) -> Option<Value> {
        self.widgets
            .get(&widget)
            .and_then(|w| fetch(&w.properties, name))
    }

    fn set_property(&mut self, widget: WidgetHandle, name: &str, value: Value) -> Result<()> {
        let w = self
            .widgets
            .get_mut(&widget)
            .ok_or_else(|| anyhow!("no widget {widget:?}"))?;
        store(&mut w.properties, name, value);
        Ok(())
    }

    fn set_hints(&mut self, widget: WidgetHandle, hints: &Hints) -> Result<()> {
        let w = self
            .widgets
            .get_mut(&widget)
            .ok_or_else(|| anyhow!("no widget {widget:?}"))?;
        w.hints = *hints;
        self.calls.push(Call::SetHints { widget });
        Ok(())
    }

    fn take_changes(&mut self) -> Vec<PropertyChange> {
        std::mem::take(&mut self.changes)
    }
}
