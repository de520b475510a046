//! Issued property references and the per-element cache that hands them out.
//!
//! A [`PropertyRef`] is a reference-counted handle to one named live property
//! of one element. The cache keeps a handle only while someone outside the
//! cache also holds it: a lookup that finds an entry whose only owner is the
//! cache issues a fresh reference instead, and sweeps drop such entries.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use hashbrown::HashMap;

use crate::engine::Engine;
use crate::error::CueError;
use crate::ids::ElementId;
use crate::toolkit::Toolkit;
use crate::value::Value;

#[derive(Debug)]
struct RefInner {
    element: ElementId,
    name: String,
    cached: RefCell<Option<Value>>,
    generation: Cell<u64>,
}

/// Handle to a named live property of an element.
#[derive(Clone, Debug)]
pub struct PropertyRef(Rc<RefInner>);

impl PropertyRef {
    pub fn new(element: ElementId, name: impl Into<String>) -> Self {
        Self(Rc::new(RefInner {
            element,
            name: name.into(),
            cached: RefCell::new(None),
            generation: Cell::new(0),
        }))
    }

    #[inline]
    pub fn element(&self) -> ElementId {
        self.0.element
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Number of invalidations seen so far.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.0.generation.get()
    }

    /// True when the next read has to go back to the live widget.
    pub fn is_stale(&self) -> bool {
        self.0.cached.borrow().is_none()
    }

    /// The underlying value changed; drop the cached read.
    pub fn dep_changed(&self) {
        self.0.cached.replace(None);
        self.0.generation.set(self.0.generation.get() + 1);
    }

    /// Current value, read through the engine when the cache is stale.
    pub fn get<K: Toolkit>(&self, engine: &Engine<K>) -> Result<Value, CueError> {
        if let Some(v) = self.0.cached.borrow().as_ref() {
            return Ok(v.clone());
        }
        let value = engine.current_property(self.0.element, &self.0.name)?;
        self.0.cached.replace(Some(value.clone()));
        Ok(value)
    }

    #[inline]
    pub fn ptr_eq(&self, other: &PropertyRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn externally_held(&self) -> bool {
        Rc::strong_count(&self.0) > 1
    }
}

/// Cache of issued references for one element, keyed by property name.
#[derive(Debug)]
pub struct RefCache {
    element: ElementId,
    capacity: usize,
    entries: HashMap<String, PropertyRef>,
}

impl RefCache {
    pub fn new(element: ElementId, capacity: usize) -> Self {
        Self {
            element,
            capacity: capacity.max(1),
            entries: HashMap::new(),
        }
    }

    /// Return the outstanding reference for `name`, or issue a new one.
    pub fn get_or_issue(&mut self, name: &str) -> PropertyRef {
        if let Some(existing) = self.entries.get(name) {
            if existing.externally_held() {
                return existing.clone();
            }
        }
        if self.entries.len() >= self.capacity {
            self.sweep();
        }
        let fresh = PropertyRef::new(self.element, name);
        self.entries.insert(name.to_string(), fresh.clone());
        fresh
    }

    /// Notify the outstanding reference for `name`, if any.
    pub fn invalidate(&self, name: &str) {
        if let Some(r) = self.entries.get(name) {
            r.dep_changed();
        }
    }

    /// Drop entries nobody outside the cache holds. Returns how many were dropped.
    pub fn sweep(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, r| r.externally_held());
        before - self.entries.len()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_reference_is_reissued() {
        let mut cache = RefCache::new(ElementId(0), 8);
        let a = cache.get_or_issue("x");
        let b = cache.get_or_issue("x");
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn dropped_reference_is_replaced() {
        let mut cache = RefCache::new(ElementId(0), 8);
        let a = cache.get_or_issue("x");
        a.dep_changed();
        assert_eq!(a.generation(), 1);
        drop(a);
        let b = cache.get_or_issue("x");
        assert_eq!(b.generation(), 0);
    }

    #[test]
    fn invalidate_reaches_outstanding_reference() {
        let mut cache = RefCache::new(ElementId(2), 8);
        let r = cache.get_or_issue("color");
        cache.invalidate("color");
        cache.invalidate("missing");
        assert_eq!(r.generation(), 1);
        assert_eq!(r.element(), ElementId(2));
        assert_eq!(r.name(), "color");
    }

    #[test]
    fn capacity_triggers_sweep_of_unheld_entries() {
        let mut cache = RefCache::new(ElementId(0), 2);
        let kept = cache.get_or_issue("a");
        drop(cache.get_or_issue("b"));
        assert_eq!(cache.len(), 2);
        let _c = cache.get_or_issue("c");
        assert_eq!(cache.len(), 2);
        assert!(kept.ptr_eq(&cache.get_or_issue("a")));
    }
}
