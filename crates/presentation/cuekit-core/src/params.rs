//! Declaration records: the explicit set of placement, timing and property
//! parameters an element is constructed from.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::error::CueError;
use crate::ids::ElementId;
use crate::refs::PropertyRef;
use crate::toolkit::Toolkit;
use crate::value::{Value, ValueKind};

/// A parameter value that may only be known at the moment it is used.
#[derive(Clone)]
pub enum Param {
    /// Concrete value
    Const(Value),
    /// Live property of another element, read when resolved
    Ref(PropertyRef),
    /// Arbitrary deferred computation
    Computed(Rc<dyn Fn() -> Value>),
}

impl Param {
    pub fn computed(f: impl Fn() -> Value + 'static) -> Self {
        Param::Computed(Rc::new(f))
    }

    /// Resolve to a concrete value now.
    pub fn resolve<K: Toolkit>(&self, engine: &Engine<K>) -> Result<Value, CueError> {
        match self {
            Param::Const(v) => Ok(v.clone()),
            Param::Ref(r) => r.get(engine),
            Param::Computed(f) => Ok(f()),
        }
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Const(v) => f.debug_tuple("Const").field(v).finish(),
            Param::Ref(r) => f
                .debug_tuple("Ref")
                .field(&r.element())
                .field(&r.name())
                .finish(),
            Param::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<Value> for Param {
    fn from(v: Value) -> Self {
        Param::Const(v)
    }
}

macro_rules! const_param_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Param {
            fn from(v: $t) -> Self {
                Param::Const(Value::from(v))
            }
        })*
    };
}

const_param_from!(f32, bool, [f32; 2], [f32; 4], Vec<f32>, &str, String);

impl From<PropertyRef> for Param {
    fn from(r: PropertyRef) -> Self {
        Param::Ref(r)
    }
}

/// Absolute placement keys the resolver understands. Any other parameter name
/// must be a property the toolkit class exposes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PlacementKey {
    X,
    Y,
    Right,
    Top,
    CenterX,
    CenterY,
    Width,
    Height,
    /// Combined (x, y)
    Pos,
    /// Combined (width, height)
    Size,
    /// Combined (center_x, center_y)
    Center,
}

impl PlacementKey {
    pub const ALL: [PlacementKey; 11] = [
        PlacementKey::X,
        PlacementKey::Y,
        PlacementKey::Right,
        PlacementKey::Top,
        PlacementKey::CenterX,
        PlacementKey::CenterY,
        PlacementKey::Width,
        PlacementKey::Height,
        PlacementKey::Pos,
        PlacementKey::Size,
        PlacementKey::Center,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PlacementKey::X => "x",
            PlacementKey::Y => "y",
            PlacementKey::Right => "right",
            PlacementKey::Top => "top",
            PlacementKey::CenterX => "center_x",
            PlacementKey::CenterY => "center_y",
            PlacementKey::Width => "width",
            PlacementKey::Height => "height",
            PlacementKey::Pos => "pos",
            PlacementKey::Size => "size",
            PlacementKey::Center => "center",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn expected_kind(self) -> ValueKind {
        match self {
            PlacementKey::Pos | PlacementKey::Size | PlacementKey::Center => ValueKind::Vec2,
            _ => ValueKind::Float,
        }
    }

    /// Check a resolved value against the key's kind.
    pub fn validate(self, value: &Value) -> Result<(), CueError> {
        let ok = match self.expected_kind() {
            ValueKind::Vec2 => value.as_vec2().is_some(),
            kind => value.kind() == kind,
        };
        if ok {
            Ok(())
        } else {
            Err(CueError::InvalidParam {
                name: self.name().to_string(),
                expected: self.expected_kind(),
                actual: value.kind(),
            })
        }
    }
}

/// Fractional (0-1) position hints relative to the parent container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PosHint {
    pub x: Option<f32>,
    pub center_x: Option<f32>,
    pub right: Option<f32>,
    pub y: Option<f32>,
    pub center_y: Option<f32>,
    pub top: Option<f32>,
}

impl PosHint {
    #[inline]
    pub fn has_horizontal(&self) -> bool {
        self.x.is_some() || self.center_x.is_some() || self.right.is_some()
    }

    #[inline]
    pub fn has_vertical(&self) -> bool {
        self.y.is_some() || self.center_y.is_some() || self.top.is_some()
    }
}

/// Per-axis proportional size rule.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum SizeHint {
    /// Proportional sizing disabled; absolute size applies.
    Unset,
    Fraction(f32),
}

/// Fractional placement inputs. `None` means "not supplied".
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Hints {
    pub pos_hint: PosHint,
    /// Combined (x, y) size hint
    pub size_hint: Option<[SizeHint; 2]>,
    pub size_hint_x: Option<SizeHint>,
    pub size_hint_y: Option<SizeHint>,
}

/// Where an element attaches when it appears.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LayoutChoice {
    /// Innermost open layout at declaration time, or the root if none is open.
    #[default]
    Inherit,
    Root,
    Within(ElementId),
}

/// Everything needed to declare an element.
#[derive(Clone, Debug)]
pub struct ElementDecl {
    /// Toolkit widget class
    pub class: String,
    pub name: Option<String>,
    pub start_time: f64,
    /// `None` keeps the element on screen until cancelled.
    pub duration: Option<f64>,
    pub layout: LayoutChoice,
    /// Position among the parent's children
    pub index: usize,
    pub params: IndexMap<String, Param>,
    pub hints: Hints,
}

impl ElementDecl {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            name: None,
            start_time: 0.0,
            duration: None,
            layout: LayoutChoice::Inherit,
            index: 0,
            params: IndexMap::new(),
            hints: Hints::default(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn start(mut self, time: f64) -> Self {
        self.start_time = time;
        self
    }

    pub fn duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn layout(mut self, layout: LayoutChoice) -> Self {
        self.layout = layout;
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Param>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn pos_hint(mut self, pos_hint: PosHint) -> Self {
        self.hints.pos_hint = pos_hint;
        self
    }

    pub fn size_hint(mut self, x: SizeHint, y: SizeHint) -> Self {
        self.hints.size_hint = Some([x, y]);
        self
    }

    pub fn size_hint_x(mut self, hint: SizeHint) -> Self {
        self.hints.size_hint_x = Some(hint);
        self
    }

    pub fn size_hint_y(mut self, hint: SizeHint) -> Self {
        self.hints.size_hint_y = Some(hint);
        self
    }

    #[inline]
    pub fn end_time(&self) -> Option<f64> {
        self.duration.map(|d| self.start_time + d)
    }

    /// Timing must be finite with a non-negative duration.
    pub fn validate_timing(&self) -> Result<(), CueError> {
        let end = self.end_time();
        let finite = self.start_time.is_finite() && end.map_or(true, f64::is_finite);
        if !finite || end.map_or(false, |e| e < self.start_time) {
            return Err(CueError::InvalidTiming {
                start: self.start_time,
                end,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placement_keys_round_trip_by_name() {
        for key in PlacementKey::ALL {
            assert_eq!(PlacementKey::from_name(key.name()), Some(key));
        }
        assert_eq!(PlacementKey::from_name("color"), None);
    }

    #[test]
    fn combined_keys_take_pairs() {
        assert!(PlacementKey::Pos.validate(&Value::Vec2([1.0, 2.0])).is_ok());
        assert!(PlacementKey::Size.validate(&Value::Vector(vec![1.0, 2.0])).is_ok());
        assert_eq!(
            PlacementKey::Center.validate(&Value::Float(1.0)),
            Err(CueError::InvalidParam {
                name: "center".into(),
                expected: ValueKind::Vec2,
                actual: ValueKind::Float,
            })
        );
        assert!(PlacementKey::Width.validate(&Value::Bool(true)).is_err());
    }

    #[test]
    fn timing_must_be_finite_and_ordered() {
        assert!(ElementDecl::new("R").start(1.0).duration(0.0).validate_timing().is_ok());
        assert!(ElementDecl::new("R").start(f64::NAN).validate_timing().is_err());
        assert!(ElementDecl::new("R").duration(f64::INFINITY).validate_timing().is_err());
        assert_eq!(
            ElementDecl::new("R").start(2.0).duration(-1.0).validate_timing(),
            Err(CueError::InvalidTiming {
                start: 2.0,
                end: Some(1.0)
            })
        );
    }

    #[test]
    fn builder_collects_params_in_order() {
        let decl = ElementDecl::new("Label")
            .param("text", "hi")
            .param("x", 3.0f32)
            .layout(LayoutChoice::Root);
        assert_eq!(decl.params.keys().collect::<Vec<_>>(), ["text", "x"]);
        assert_eq!(decl.layout, LayoutChoice::Root);
        assert_eq!(decl.end_time(), None);
    }
}
