//! Value: live property values that elements expose and animations interpolate.
//! All numeric components use f32.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Resolved property values keyed by name, in declaration order.
pub type PropertyMap = IndexMap<String, Value>;

/// Coarse kind of a [`Value`], for dispatch and error messages.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    Float,
    Bool,
    Vec2,
    ColorRgba,
    Vector,
    List,
    Text,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Value {
    /// Scalar float
    Float(f32),

    /// Boolean (step)
    Bool(bool),

    /// 2D vector (positions, sizes)
    Vec2([f32; 2]),

    /// RGBA color
    ColorRgba([f32; 4]),

    /// Generic, variable-length numeric vector (point lists)
    Vector(Vec<f32>),

    /// Nested sequence; interpolated element by element
    List(Vec<Value>),

    /// Text / string; step-only for interpolation
    Text(String),
}

impl Value {
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Float(_) => ValueKind::Float,
            Value::Bool(_) => ValueKind::Bool,
            Value::Vec2(_) => ValueKind::Vec2,
            Value::ColorRgba(_) => ValueKind::ColorRgba,
            Value::Vector(_) => ValueKind::Vector,
            Value::List(_) => ValueKind::List,
            Value::Text(_) => ValueKind::Text,
        }
    }

    /// Convenience constructors
    pub fn f(v: f32) -> Self {
        Value::Float(v)
    }

    pub fn vec2(x: f32, y: f32) -> Self {
        Value::Vec2([x, y])
    }

    pub fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Value::ColorRgba([r, g, b, a])
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec2(&self) -> Option<[f32; 2]> {
        match self {
            Value::Vec2(v) => Some(*v),
            Value::Vector(v) if v.len() == 2 => Some([v[0], v[1]]),
            _ => None,
        }
    }

    /// Flat numeric components for the fixed and variable-length numeric kinds.
    pub fn components(&self) -> Option<&[f32]> {
        match self {
            Value::Vec2(v) => Some(v),
            Value::ColorRgba(v) => Some(v),
            Value::Vector(v) => Some(v),
            _ => None,
        }
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<[f32; 2]> for Value {
    fn from(v: [f32; 2]) -> Self {
        Value::Vec2(v)
    }
}

impl From<[f32; 4]> for Value {
    fn from(v: [f32; 4]) -> Self {
        Value::ColorRgba(v)
    }
}

impl From<Vec<f32>> for Value {
    fn from(v: Vec<f32>) -> Self {
        Value::Vector(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}
