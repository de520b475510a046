//! Element lifecycle state.
//!
//! ```text
//! Pending -> CancelledBeforeStart ----------------------> Finalized
//!    |
//!    +----> OnScreen -> (CancelledEarly) -> Disappeared -> Finalized
//! ```
//!
//! Any transition may instead end in `Failed` when the toolkit rejects it.
//! The engine owns scheduling; this module holds the per-element record and
//! the pure cancellation decision.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ids::{ElementId, GroupId, TaskHandle, WidgetHandle};
use crate::params::{Hints, Param};
use crate::refs::RefCache;
use crate::resolver::PlacementSpec;
use crate::value::PropertyMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Entered; waiting for the appear callback.
    Pending,
    /// Retracted before start; will finalize without appearing.
    CancelledBeforeStart,
    OnScreen,
    /// On screen with its end moved earlier by a cancellation.
    CancelledEarly,
    Disappeared,
    Finalized,
    Failed,
}

impl Phase {
    /// Not yet finalized (and not failed).
    #[inline]
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Finalized | Phase::Failed)
    }
}

/// Outcome of a cancellation request, decided before touching the scheduler.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum CancelPlan {
    /// Already finished, already retracting, or not earlier than the current end.
    Ignore,
    /// Cancelled at or before start. `on_screen` means appear already won the
    /// race and the element must disappear now rather than finalize directly.
    Retract { on_screen: bool },
    /// Move the disappear transition to `at`. `clamped` is set when the
    /// requested time lay in the past and `at` is the current time instead.
    Shorten { at: f64, clamped: bool },
}

#[derive(Debug)]
pub struct ElementState {
    pub id: ElementId,
    pub name: Option<String>,
    pub class: String,

    /// Parameters as declared (possibly dynamic).
    pub params: IndexMap<String, Param>,
    pub hints: Hints,
    /// Parameter values resolved at enter, kept for the element record.
    pub init_values: PropertyMap,
    /// Current resolved parameter values, updated by live changes.
    pub values: PropertyMap,
    pub placement: Option<PlacementSpec>,

    pub start_time: f64,
    pub end_time: Option<f64>,
    /// Declared duration; decides which children of its grouping region block.
    pub duration: Option<f64>,
    pub appear_time: Option<f64>,
    pub disappear_time: Option<f64>,
    pub on_screen: bool,
    pub phase: Phase,

    /// Layout element whose widget becomes the parent; root when `None`.
    pub layout: Option<ElementId>,
    pub index: usize,
    pub widget: WidgetHandle,
    pub parent_widget: Option<WidgetHandle>,

    pub pending_appear: Option<TaskHandle>,
    pub pending_disappear: Option<TaskHandle>,
    pub pending_finalize: Option<TaskHandle>,
    /// Leave notification already sent to the host tree.
    pub left: bool,
    pub retracted: bool,

    pub refs: RefCache,
    /// Grouping region currently open on this element.
    pub region: Option<GroupId>,
}

impl ElementState {
    /// Decide what a cancellation at `cancel_time` does when requested at `now`.
    pub fn plan_cancel(&self, cancel_time: f64, now: f64) -> CancelPlan {
        if !self.phase.is_active()
            || self.retracted
            || matches!(self.phase, Phase::CancelledBeforeStart | Phase::Disappeared)
        {
            return CancelPlan::Ignore;
        }
        if cancel_time <= self.start_time {
            return CancelPlan::Retract {
                on_screen: self.on_screen,
            };
        }
        let clamped = cancel_time < now;
        let at = if clamped { now } else { cancel_time };
        match self.end_time {
            Some(end) if at >= end => CancelPlan::Ignore,
            _ => CancelPlan::Shorten { at, clamped },
        }
    }

    /// Display label for logs and records.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{} '{}'", self.id, name),
            None => format!("{} ({})", self.id, self.class),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(start: f64, end: Option<f64>, phase: Phase) -> ElementState {
        ElementState {
            id: ElementId(0),
            name: None,
            class: "Rectangle".into(),
            params: IndexMap::new(),
            hints: Hints::default(),
            init_values: PropertyMap::new(),
            values: PropertyMap::new(),
            placement: None,
            start_time: start,
            end_time: end,
            duration: end.map(|e| e - start),
            appear_time: None,
            disappear_time: None,
            on_screen: matches!(phase, Phase::OnScreen | Phase::CancelledEarly),
            phase,
            layout: None,
            index: 0,
            widget: WidgetHandle(1),
            parent_widget: None,
            pending_appear: None,
            pending_disappear: None,
            pending_finalize: None,
            left: false,
            retracted: false,
            refs: RefCache::new(ElementId(0), 4),
            region: None,
        }
    }

    #[test]
    fn cancel_before_start_retracts() {
        let s = state(10.0, None, Phase::Pending);
        assert_eq!(s.plan_cancel(5.0, 0.0), CancelPlan::Retract { on_screen: false });
        assert_eq!(s.plan_cancel(10.0, 0.0), CancelPlan::Retract { on_screen: false });
    }

    #[test]
    fn retract_after_appear_race_reports_on_screen() {
        let s = state(1.0, Some(5.0), Phase::OnScreen);
        assert_eq!(s.plan_cancel(1.0, 1.0), CancelPlan::Retract { on_screen: true });
    }

    #[test]
    fn cancel_inside_span_shortens() {
        let s = state(0.0, Some(5.0), Phase::OnScreen);
        assert_eq!(
            s.plan_cancel(3.0, 2.0),
            CancelPlan::Shorten {
                at: 3.0,
                clamped: false
            }
        );
    }

    #[test]
    fn open_ended_element_can_always_be_shortened() {
        let s = state(0.0, None, Phase::OnScreen);
        assert!(matches!(s.plan_cancel(100.0, 1.0), CancelPlan::Shorten { at, .. } if at == 100.0));
    }

    #[test]
    fn cancel_at_or_after_end_is_ignored() {
        let s = state(0.0, Some(5.0), Phase::OnScreen);
        assert_eq!(s.plan_cancel(5.0, 1.0), CancelPlan::Ignore);
        assert_eq!(s.plan_cancel(7.0, 1.0), CancelPlan::Ignore);
    }

    #[test]
    fn past_cancel_time_is_clamped_to_now() {
        let s = state(0.0, Some(5.0), Phase::OnScreen);
        assert_eq!(
            s.plan_cancel(1.0, 2.0),
            CancelPlan::Shorten {
                at: 2.0,
                clamped: true
            }
        );
    }

    #[test]
    fn terminal_and_retracting_states_ignore_cancel() {
        for phase in [
            Phase::Finalized,
            Phase::Failed,
            Phase::Disappeared,
            Phase::CancelledBeforeStart,
        ] {
            let s = state(0.0, Some(5.0), phase);
            assert_eq!(s.plan_cancel(1.0, 0.5), CancelPlan::Ignore, "{phase:?}");
        }
    }
}
