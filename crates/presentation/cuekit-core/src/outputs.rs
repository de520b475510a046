//! Notifications and records produced for the host state tree.
//!
//! The engine appends [`StateEvent`]s as transitions happen; the host drains
//! them to learn when a participant left (the next state may proceed) or
//! finalized (its participation is complete). Finalized elements also leave an
//! [`ElementRecord`] with their observed timing.

use serde::Serialize;

use crate::ids::{ElementId, GroupId, StateRef};
use crate::value::PropertyMap;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[non_exhaustive]
pub enum StateEvent {
    Entered {
        target: StateRef,
        time: f64,
    },
    Appeared {
        element: ElementId,
        time: f64,
    },
    Disappeared {
        element: ElementId,
        time: f64,
    },
    /// The participant no longer holds up the state that follows it.
    Leave {
        target: StateRef,
        time: f64,
    },
    Finalized {
        target: StateRef,
        time: f64,
    },
    Cancelled {
        target: StateRef,
        requested: f64,
        /// End time in effect after the request.
        end_time: Option<f64>,
    },
    GroupCompleted {
        group: GroupId,
        time: f64,
    },
    Failed {
        target: StateRef,
        time: f64,
    },
}

/// Log attributes of one finalized element.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ElementRecord {
    pub id: ElementId,
    pub name: Option<String>,
    pub class: String,
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub appear_time: Option<f64>,
    pub disappear_time: Option<f64>,
    /// Parameter values as resolved at enter.
    pub params: PropertyMap,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Outputs {
    pub events: Vec<StateEvent>,
    pub records: Vec<ElementRecord>,
}

impl Outputs {
    #[inline]
    pub fn push_event(&mut self, event: StateEvent) {
        self.events.push(event);
    }

    #[inline]
    pub fn push_record(&mut self, record: ElementRecord) {
        self.records.push(record);
    }

    pub fn drain_events(&mut self) -> Vec<StateEvent> {
        std::mem::take(&mut self.events)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.records.is_empty()
    }
}
