//! cuekit core (toolkit-agnostic)
//!
//! Schedules timed presentation states against a virtual clock: elements that
//! appear and disappear at precise timestamps, animations that interpolate their
//! live properties frame by frame, and the layout stack that decides which
//! container a newly declared element attaches to. Drawing is delegated to a
//! host [`Toolkit`] implementation.

pub mod animation;
pub mod clock;
pub mod config;
pub mod element;
pub mod engine;
pub mod error;
pub mod ids;
pub mod interp;
pub mod layout;
pub mod outputs;
pub mod params;
pub mod refs;
pub mod resolver;
pub mod toolkit;
pub mod value;

// Re-exports for hosts and tests
pub use animation::{AnimFn, AnimPhase, Animate, AnimationState, Slide};
pub use clock::{Due, Scheduler};
pub use config::Config;
pub use element::{CancelPlan, ElementState, Phase};
pub use engine::Engine;
pub use error::{CueError, Failure};
pub use ids::{AnimId, ElementId, GroupId, IdAllocator, StateRef, TaskHandle, WidgetHandle};
pub use layout::{GroupChild, GroupingRegion, LayoutStack};
pub use outputs::{ElementRecord, Outputs, StateEvent};
pub use params::{ElementDecl, Hints, LayoutChoice, Param, PlacementKey, PosHint, SizeHint};
pub use refs::{PropertyRef, RefCache};
pub use resolver::{resolve, AxisBasis, PlacementSpec};
pub use toolkit::{PropertyChange, Toolkit};
pub use value::{PropertyMap, Value, ValueKind};
