use cuekit_core::{CueError, Engine, Phase, Slide, StateEvent, StateRef};
use cuekit_test_fixtures::{decls, Call, RecordingToolkit};

fn engine() -> Engine<RecordingToolkit> {
    Engine::with_toolkit(RecordingToolkit::new())
}

fn attached_ever(eng: &Engine<RecordingToolkit>, widget: cuekit_core::WidgetHandle) -> bool {
    eng.toolkit()
        .calls()
        .iter()
        .any(|c| matches!(c, Call::Attach { child, .. } if *child == widget))
}

#[test]
fn cancel_midway_reschedules_disappear() {
    let mut eng = engine();
    let id = eng.add_element(decls::rect(0.0, 5.0)).unwrap();
    eng.advance_to(2.0);
    eng.cancel(id, 3.0).unwrap();

    assert_eq!(eng.element(id).unwrap().end_time, Some(3.0));
    assert_eq!(eng.element(id).unwrap().phase, Phase::CancelledEarly);
    assert_eq!(eng.next_event_time(), Some(3.0));

    eng.advance_to(10.0);
    let el = eng.element(id).unwrap();
    assert_eq!(el.disappear_time, Some(3.0));
    assert_eq!(el.phase, Phase::Finalized);
}

#[test]
fn later_cancel_is_a_no_op() {
    let mut eng = engine();
    let id = eng.add_element(decls::rect(0.0, 5.0)).unwrap();
    eng.advance_to(1.0);
    eng.cancel(id, 3.0).unwrap();
    eng.cancel(id, 4.0).unwrap();
    eng.cancel(id, 7.0).unwrap();
    assert_eq!(eng.element(id).unwrap().end_time, Some(3.0));

    eng.cancel(id, 2.0).unwrap();
    assert_eq!(eng.element(id).unwrap().end_time, Some(2.0));
    eng.advance_to(10.0);
    assert_eq!(eng.element(id).unwrap().disappear_time, Some(2.0));
}

#[test]
fn cancel_open_ended_element() {
    let mut eng = engine();
    let id = eng.add_element(decls::label("x", 0.0)).unwrap();
    eng.advance_to(1.0);
    eng.cancel(id, 2.5).unwrap();
    eng.advance_to(10.0);
    let el = eng.element(id).unwrap();
    assert_eq!(el.end_time, Some(2.5));
    assert_eq!(el.disappear_time, Some(2.5));
}

#[test]
fn cancel_before_start_never_appears() {
    let mut eng = engine();
    let id = eng.add_element(decls::rect(10.0, 5.0)).unwrap();
    let widget = eng.element(id).unwrap().widget;
    eng.cancel(id, 5.0).unwrap();

    let el = eng.element(id).unwrap();
    assert_eq!(el.phase, Phase::CancelledBeforeStart);
    assert_eq!(el.end_time, Some(10.0));
    assert_eq!(eng.next_event_time(), Some(0.0));

    eng.advance_to(0.0);
    assert_eq!(eng.element(id).unwrap().phase, Phase::Finalized);
    eng.advance_to(30.0);
    assert!(!attached_ever(&eng, widget));
    let el = eng.element(id).unwrap();
    assert_eq!(el.appear_time, None);
    assert_eq!(el.disappear_time, None);
    assert!(eng.is_idle());
}

#[test]
fn cancel_at_start_retracts() {
    let mut eng = engine();
    let id = eng.add_element(decls::rect(2.0, 5.0)).unwrap();
    eng.advance_to(1.0);
    eng.cancel(id, 2.0).unwrap();
    eng.advance_to(8.0);
    let widget = eng.element(id).unwrap().widget;
    assert!(!attached_ever(&eng, widget));
    assert_eq!(eng.element(id).unwrap().end_time, Some(2.0));
}

#[test]
fn retract_after_appear_disappears_now() {
    let mut eng = engine();
    let id = eng.add_element(decls::rect(1.0, 5.0)).unwrap();
    eng.advance_to(2.0);
    eng.cancel(id, 0.5).unwrap();
    eng.advance_to(2.0);
    let el = eng.element(id).unwrap();
    assert_eq!(el.end_time, Some(1.0));
    assert_eq!(el.disappear_time, Some(2.0));
    assert_eq!(el.phase, Phase::Finalized);
}

#[test]
fn past_cancel_is_clamped_to_now() {
    let mut eng = engine();
    let id = eng.add_element(decls::rect(0.0, 10.0)).unwrap();
    eng.advance_to(4.0);
    eng.cancel(id, 2.0).unwrap();
    assert_eq!(eng.element(id).unwrap().end_time, Some(4.0));
    eng.advance_to(4.0);
    assert_eq!(eng.element(id).unwrap().disappear_time, Some(4.0));
}

#[test]
fn cancel_after_finalize_is_ignored() {
    let mut eng = engine();
    let id = eng.add_element(decls::rect(0.0, 1.0)).unwrap();
    eng.advance_to(2.0);
    eng.cancel(id, 0.0).unwrap();
    let el = eng.element(id).unwrap();
    assert_eq!(el.phase, Phase::Finalized);
    assert_eq!(el.end_time, Some(1.0));
    assert!(eng.is_idle());
}

#[test]
fn cancel_reports_effective_end() {
    let mut eng = engine();
    let id = eng.add_element(decls::rect(0.0, 5.0)).unwrap();
    eng.cancel(id, 3.0).unwrap();
    eng.cancel(id, 4.0).unwrap();
    let ends: Vec<_> = eng
        .events()
        .iter()
        .filter_map(|e| match e {
            StateEvent::Cancelled {
                requested,
                end_time,
                ..
            } => Some((*requested, *end_time)),
            _ => None,
        })
        .collect();
    assert_eq!(ends, vec![(3.0, Some(3.0)), (4.0, Some(3.0))]);
}

#[test]
fn cancel_unknown_element_errors() {
    let mut eng = engine();
    assert!(eng.cancel(cuekit_core::ElementId(9), 1.0).is_err());
}

#[test]
fn non_finite_cancel_time_is_rejected() {
    let mut eng = Engine::with_toolkit(RecordingToolkit::new().with_frame_interval(0.25));
    let id = eng.add_element(decls::rect(1.0, 4.0)).unwrap();
    let anim = eng
        .slide(id, Slide::new().duration(2.0).to("opacity", 0.0f32))
        .unwrap();

    for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let err = eng.cancel(id, bad).unwrap_err();
        assert!(matches!(err, CueError::InvalidTiming { start, .. } if start == 1.0));
        assert!(eng.cancel(anim, bad).is_err());
    }
    assert_eq!(eng.element(id).unwrap().end_time, Some(5.0));
    assert_eq!(eng.animation(anim).unwrap().end_time, Some(2.0));
    assert!(eng.events().iter().all(|e| !matches!(e, StateEvent::Cancelled { .. })));

    eng.advance_to(10.0);
    assert_eq!(eng.element(id).unwrap().disappear_time, Some(5.0));
    assert!(eng.failures().is_empty());
}

#[test]
fn cancelled_animation_stops_ticking() {
    let mut eng = Engine::with_toolkit(RecordingToolkit::new().with_frame_interval(0.25));
    let id = eng.add_element(decls::rect(0.0, 10.0)).unwrap();
    let anim = eng
        .slide(id, Slide::new().duration(4.0).to("opacity", 0.0f32))
        .unwrap();
    eng.advance_to(1.0);
    eng.cancel(anim, 2.0).unwrap();
    eng.advance_to(5.0);

    let state = eng.animation(anim).unwrap();
    assert_eq!(state.end_time, Some(2.0));
    assert!(state.phase.is_terminal());
    // Clamped at the new end: halfway along the original slide.
    let opacity = eng.current_property(id, "opacity").unwrap();
    approx::assert_relative_eq!(opacity.as_float().unwrap(), 0.5);
    assert!(eng
        .events()
        .iter()
        .any(|e| matches!(e, StateEvent::Finalized { target, .. } if *target == StateRef::Animation(anim))));
}

#[test]
fn animation_cancelled_before_start_finishes_without_change() {
    let mut eng = Engine::with_toolkit(RecordingToolkit::new().with_frame_interval(0.25));
    let id = eng.add_element(decls::rect(0.0, 10.0)).unwrap();
    let anim = eng
        .slide(id, Slide::new().start(3.0).duration(1.0).to("opacity", 0.0f32))
        .unwrap();
    eng.advance_to(1.0);
    eng.cancel(anim, 1.0).unwrap();
    eng.advance_to(6.0);
    assert_eq!(eng.animation(anim).unwrap().end_time, Some(3.0));
    assert!(eng.animation(anim).unwrap().phase.is_terminal());
    approx::assert_relative_eq!(
        eng.current_property(id, "opacity").unwrap().as_float().unwrap(),
        1.0
    );
}
