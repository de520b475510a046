//! Error types for the presentation engine

use serde::{Deserialize, Serialize};

use crate::ids::{AnimId, ElementId, GroupId, StateRef};
use crate::value::ValueKind;

/// Errors surfaced by engine operations.
///
/// Usage errors are returned synchronously from the call that caused them.
/// Errors raised while a scheduled transition runs are never returned; they are
/// captured as [`Failure`] records instead.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum CueError {
    /// Linear interpolation was requested with an unsupported input combination
    #[error("Invalid combination of interpolation parameters: {combination}")]
    InvalidInterpolation { combination: String },

    /// A layout element was entered while its grouping region was still open
    #[error("Layout context of {element} is not reentrant")]
    LayoutReentered { element: ElementId },

    /// Exit requested for a layout that is not on top of the stack
    #[error("Layout context of {element} is not the innermost open layout")]
    LayoutNotOpen { element: ElementId },

    /// Element class cannot contain children
    #[error("{element} ({class}) is not a layout container")]
    NotLayoutCapable { element: ElementId, class: String },

    #[error("Element not found: {id}")]
    UnknownElement { id: ElementId },

    #[error("Animation not found: {id}")]
    UnknownAnimation { id: AnimId },

    #[error("Group not found: {id}")]
    UnknownGroup { id: GroupId },

    /// Parameter name is neither a placement key nor a property of the class
    #[error("Unknown property '{name}' for class {class}")]
    UnknownProperty { class: String, name: String },

    /// Recognized placement key carrying a value of the wrong kind
    #[error("Invalid value for '{name}': expected {expected:?}, got {actual:?}")]
    InvalidParam {
        name: String,
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error("Invalid timing: start {start}, end {end:?}")]
    InvalidTiming { start: f64, end: Option<f64> },

    /// Animation target is no longer able to receive live changes
    #[error("Animation target {element} is not live")]
    TargetNotLive { element: ElementId },

    #[error("Value type mismatch: expected {expected:?}, got {actual:?}")]
    ValueMismatch {
        expected: ValueKind,
        actual: ValueKind,
    },

    /// Live property read failed
    #[error("Property '{name}' of {element} is unavailable")]
    PropertyUnavailable { element: ElementId, name: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Rendering toolkit operation failed
    #[error("Toolkit error: {reason}")]
    Toolkit { reason: String },
}

impl CueError {
    pub(crate) fn toolkit(err: anyhow::Error) -> Self {
        Self::Toolkit {
            reason: format!("{err:#}"),
        }
    }

    /// Usage errors are caused by how the caller constructed something and
    /// cannot be fixed by the engine.
    #[inline]
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInterpolation { .. }
                | Self::LayoutReentered { .. }
                | Self::LayoutNotOpen { .. }
                | Self::NotLayoutCapable { .. }
                | Self::UnknownProperty { .. }
                | Self::InvalidParam { .. }
                | Self::InvalidTiming { .. }
                | Self::InvalidConfig { .. }
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidInterpolation { .. } => "interpolation",
            Self::LayoutReentered { .. }
            | Self::LayoutNotOpen { .. }
            | Self::NotLayoutCapable { .. } => "layout",
            Self::UnknownElement { .. } | Self::UnknownAnimation { .. } | Self::UnknownGroup { .. } => {
                "lookup"
            }
            Self::UnknownProperty { .. } | Self::InvalidParam { .. } => "params",
            Self::InvalidTiming { .. } => "timing",
            Self::TargetNotLive { .. } | Self::PropertyUnavailable { .. } => "target",
            Self::ValueMismatch { .. } => "value",
            Self::InvalidConfig { .. } => "config",
            Self::Toolkit { .. } => "toolkit",
        }
    }
}

/// A transition that failed while the scheduler ran it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub target: StateRef,
    /// Transition that raised: "appear", "disappear", "finalize" or "tick"
    pub phase: String,
    pub error: CueError,
    pub time: f64,
}
