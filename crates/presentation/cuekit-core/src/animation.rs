//! Animations of live element properties.
//!
//! An animation maps each property name to a function of
//! `(elapsed, initial) -> value`. `initial` is sampled from the target widget on
//! the first tick, so an animation picks up wherever earlier animations left a
//! property rather than the value it was declared with.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CueError;
use crate::ids::{AnimId, ElementId, TaskHandle};
use crate::interp::linear_value;
use crate::value::{PropertyMap, Value};

/// Property function: `(elapsed seconds, initial value) -> new value`.
pub type AnimFn = Rc<dyn Fn(f64, &Value) -> Result<Value, CueError>>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnimPhase {
    /// Ticking every frame.
    Running,
    /// Reached its end; finalize is scheduled.
    Finishing,
    Finalized,
    Failed,
}

impl AnimPhase {
    #[inline]
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, AnimPhase::Finalized | AnimPhase::Failed)
    }
}

/// Arbitrary-function animation request.
#[derive(Clone, Default)]
pub struct Animate {
    pub name: Option<String>,
    pub start_time: f64,
    /// `None` runs until cancelled.
    pub duration: Option<f64>,
    pub params: IndexMap<String, AnimFn>,
}

impl Animate {
    pub fn new() -> Self {
        Self::default()
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

    pub fn param(
        mut self,
        name: impl Into<String>,
        f: impl Fn(f64, &Value) -> Value + 'static,
    ) -> Self {
        self.params
            .insert(name.into(), Rc::new(move |t, initial| Ok(f(t, initial))));
        self
    }

    pub fn try_param(
        mut self,
        name: impl Into<String>,
        f: impl Fn(f64, &Value) -> Result<Value, CueError> + 'static,
    ) -> Self {
        self.params.insert(name.into(), Rc::new(f));
        self
    }
}

impl fmt::Debug for Animate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Animate")
            .field("name", &self.name)
            .field("start_time", &self.start_time)
            .field("duration", &self.duration)
            .field("params", &self.params.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Linear interpolation request toward target values.
///
/// Exactly one of duration, speed or acceleration is meant to drive the
/// motion; only duration is supported.
#[derive(Clone, Debug, Default)]
pub struct Slide {
    pub name: Option<String>,
    pub start_time: f64,
    pub duration: Option<f64>,
    pub speed: Option<f64>,
    pub accel: Option<f64>,
    pub targets: IndexMap<String, Value>,
}

impl Slide {
    pub fn new() -> Self {
        Self::default()
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

    pub fn speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn accel(mut self, accel: f64) -> Self {
        self.accel = Some(accel);
        self
    }

    pub fn to(mut self, name: impl Into<String>, target: impl Into<Value>) -> Self {
        self.targets.insert(name.into(), target.into());
        self
    }

    fn combination(&self) -> String {
        let given: Vec<&str> = [
            ("duration", self.duration.is_some()),
            ("speed", self.speed.is_some()),
            ("accel", self.accel.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect();
        if given.is_empty() {
            "none".to_string()
        } else {
            given.join("+")
        }
    }

    /// Build the per-property linear functions.
    pub fn into_animate(self) -> Result<Animate, CueError> {
        let duration = match (self.duration, self.speed, self.accel) {
            (Some(d), None, None) => d,
            _ => {
                return Err(CueError::InvalidInterpolation {
                    combination: self.combination(),
                })
            }
        };
        let mut anim = Animate {
            name: self.name,
            start_time: self.start_time,
            duration: Some(duration),
            params: IndexMap::new(),
        };
        for (name, target) in self.targets {
            let f: AnimFn = Rc::new(move |t, initial| {
                let w = if duration > 0.0 {
                    (t / duration) as f32
                } else {
                    1.0
                };
                linear_value(initial, &target, w)
            });
            anim.params.insert(name, f);
        }
        Ok(anim)
    }
}

pub struct AnimationState {
    pub id: AnimId,
    pub name: Option<String>,
    pub target: ElementId,
    pub anim_params: IndexMap<String, AnimFn>,
    /// Sampled from the target on the first tick.
    pub initial_params: Option<PropertyMap>,
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub phase: AnimPhase,
    pub tick: Option<TaskHandle>,
    pub left: bool,
    pub ticks: u64,
}

impl fmt::Debug for AnimationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationState")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("target", &self.target)
            .field("params", &self.anim_params.keys().collect::<Vec<_>>())
            .field("start_time", &self.start_time)
            .field("end_time", &self.end_time)
            .field("phase", &self.phase)
            .field("ticks", &self.ticks)
            .finish()
    }
}

impl AnimationState {
    /// New end time for a cancellation, or `None` when it changes nothing.
    /// Only ever moves the end earlier.
    pub fn plan_cancel(&self, cancel_time: f64, now: f64) -> Option<f64> {
        if self.phase != AnimPhase::Running {
            return None;
        }
        let at = if cancel_time <= self.start_time {
            self.start_time
        } else {
            cancel_time.max(now)
        };
        match self.end_time {
            Some(end) if at >= end => None,
            _ => Some(at),
        }
    }

    /// Evaluate every property function at `elapsed` seconds.
    pub fn sample(&self, elapsed: f64) -> Result<PropertyMap, CueError> {
        let initial = self.initial_params.as_ref();
        let mut out = PropertyMap::with_capacity(self.anim_params.len());
        for (name, f) in &self.anim_params {
            let start = initial
                .and_then(|m| m.get(name))
                .ok_or_else(|| CueError::PropertyUnavailable {
                    element: self.target,
                    name: name.clone(),
                })?;
            out.insert(name.clone(), f(elapsed, start)?);
        }
        Ok(out)
    }
}
