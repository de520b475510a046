use cuekit_core::{
    CueError, ElementDecl, Engine, Phase, StateEvent, StateRef, Value,
};
use cuekit_test_fixtures::{decls, Call, RecordingToolkit, ROOT};

fn engine() -> Engine<RecordingToolkit> {
    let _ = env_logger::builder().is_test(true).try_init();
    Engine::with_toolkit(RecordingToolkit::new())
}

#[test]
fn disappear_is_scheduled_at_start_plus_duration() {
    for (start, duration) in [(0.0, 1.0), (0.5, 2.25), (3.0, 0.125)] {
        let mut eng = engine();
        let id = eng.add_element(decls::rect(start, duration)).unwrap();
        assert_eq!(eng.element(id).unwrap().end_time, Some(start + duration));

        eng.advance_to(start);
        assert_eq!(eng.element(id).unwrap().phase, Phase::OnScreen);
        assert_eq!(eng.next_event_time(), Some(start + duration));

        eng.advance_to(start + duration + 1.0);
        let el = eng.element(id).unwrap();
        assert_eq!(el.phase, Phase::Finalized);
        assert_eq!(el.appear_time, Some(start));
        assert_eq!(el.disappear_time, Some(start + duration));
        assert!(el.appear_time <= el.disappear_time);
    }
}

#[test]
fn element_attaches_to_root_then_detaches() {
    let mut eng = engine();
    let id = eng.add_element(decls::rect(1.0, 1.0)).unwrap();
    let widget = eng.element(id).unwrap().widget;

    eng.advance_to(0.5);
    assert!(!eng.toolkit().is_attached(widget));

    eng.advance_to(1.0);
    assert_eq!(eng.toolkit().children(ROOT), vec![widget]);

    eng.advance_to(3.0);
    assert!(eng.toolkit().children(ROOT).is_empty());
    let attach_calls = eng
        .toolkit()
        .calls()
        .iter()
        .filter(|c| matches!(c, Call::Attach { .. } | Call::Detach { .. }))
        .count();
    assert_eq!(attach_calls, 2);
}

#[test]
fn start_in_the_past_appears_immediately() {
    let mut eng = engine();
    eng.advance_to(4.0);
    let id = eng.add_element(decls::rect(1.0, 10.0)).unwrap();
    eng.advance_to(4.0);
    let el = eng.element(id).unwrap();
    assert_eq!(el.phase, Phase::OnScreen);
    assert_eq!(el.appear_time, Some(4.0));
}

#[test]
fn already_ended_element_flips_once() {
    let mut eng = engine();
    eng.advance_to(4.0);
    let id = eng.add_element(decls::rect(1.0, 1.0)).unwrap();
    eng.advance_to(4.0);
    let el = eng.element(id).unwrap();
    assert_eq!(el.phase, Phase::Finalized);
    assert_eq!(el.appear_time, Some(4.0));
    assert_eq!(el.disappear_time, Some(4.0));
}

#[test]
fn zero_duration_element_appears_then_disappears() {
    let mut eng = engine();
    let id = eng.add_element(decls::rect(2.0, 0.0)).unwrap();
    eng.advance_to(2.0);
    let el = eng.element(id).unwrap();
    assert_eq!(el.phase, Phase::Finalized);
    assert_eq!(el.appear_time, Some(2.0));
    assert_eq!(el.disappear_time, Some(2.0));

    let kinds: Vec<&StateEvent> = eng
        .events()
        .iter()
        .filter(|e| matches!(e, StateEvent::Appeared { .. } | StateEvent::Disappeared { .. }))
        .collect();
    assert!(matches!(kinds[0], StateEvent::Appeared { .. }));
    assert!(matches!(kinds[1], StateEvent::Disappeared { .. }));
}

#[test]
fn open_ended_element_stays_until_cancelled() {
    let mut eng = engine();
    let id = eng.add_element(decls::label("hello", 0.0)).unwrap();
    eng.advance_to(100.0);
    assert_eq!(eng.element(id).unwrap().phase, Phase::OnScreen);
    assert!(eng.is_idle());
    assert_eq!(eng.now(), 100.0);
}

#[test]
fn same_time_elements_fire_in_registration_order() {
    let mut eng = engine();
    let a = eng.add_element(decls::rect(1.0, 1.0)).unwrap();
    let b = eng.add_element(decls::rect(1.0, 1.0)).unwrap();
    eng.advance_to(1.0);
    let appeared: Vec<_> = eng
        .events()
        .iter()
        .filter_map(|e| match e {
            StateEvent::Appeared { element, .. } => Some(*element),
            _ => None,
        })
        .collect();
    assert_eq!(appeared, vec![a, b]);
}

#[test]
fn leave_precedes_finalize_and_record_is_written() {
    let mut eng = engine();
    let id = eng
        .add_element(decls::rect(0.5, 1.0).named("box").param("color", [1.0f32, 0.0, 0.0, 1.0]))
        .unwrap();
    eng.advance_to(5.0);

    let target = StateRef::Element(id);
    let events = eng.drain_events();
    let leave = events
        .iter()
        .position(|e| matches!(e, StateEvent::Leave { target: t, time } if *t == target && *time == 0.5))
        .expect("leave at appear time");
    let fin = events
        .iter()
        .position(|e| matches!(e, StateEvent::Finalized { target: t, .. } if *t == target))
        .expect("finalized");
    assert!(leave < fin);

    let record = &eng.records()[0];
    assert_eq!(record.name.as_deref(), Some("box"));
    assert_eq!(record.class, "Rectangle");
    assert_eq!(record.appear_time, Some(0.5));
    assert_eq!(record.disappear_time, Some(1.5));
    assert_eq!(
        record.params.get("color"),
        Some(&Value::ColorRgba([1.0, 0.0, 0.0, 1.0]))
    );
    assert!(eng.events().is_empty());
}

#[test]
fn attach_failure_is_captured_without_stopping_others() {
    let mut eng = Engine::with_toolkit(RecordingToolkit::new().fail_attach_for("Ellipse"));
    let bad = eng
        .add_element(ElementDecl::new("Ellipse").start(1.0).duration(1.0))
        .unwrap();
    let good = eng.add_element(decls::rect(1.0, 1.0)).unwrap();
    eng.advance_to(5.0);

    assert_eq!(eng.element(bad).unwrap().phase, Phase::Failed);
    assert_eq!(eng.element(good).unwrap().phase, Phase::Finalized);
    let failures = eng.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].target, StateRef::Element(bad));
    assert_eq!(failures[0].phase, "appear");
    assert_eq!(failures[0].time, 1.0);
    assert!(matches!(failures[0].error, CueError::Toolkit { .. }));
    assert!(eng.is_idle());
}

#[test]
fn construct_failure_registers_nothing() {
    let mut eng = Engine::with_toolkit(RecordingToolkit::new().fail_construct_for("Label"));
    let err = eng.add_element(decls::label("x", 0.0)).unwrap_err();
    assert!(matches!(err, CueError::Toolkit { .. }));
    assert!(eng.element(cuekit_core::ElementId(0)).is_none());
    assert!(eng.is_idle());
    assert!(eng.events().is_empty());
}

#[test]
fn subscribe_failure_releases_the_widget() {
    let mut eng = Engine::with_toolkit(RecordingToolkit::new().fail_subscribe_for("Label"));
    let err = eng.add_element(decls::label("x", 0.0)).unwrap_err();
    assert!(matches!(err, CueError::Toolkit { .. }));
    assert!(eng.element(cuekit_core::ElementId(0)).is_none());

    let widget = cuekit_core::WidgetHandle(1);
    assert_eq!(
        eng.toolkit().calls(),
        &[
            Call::Construct {
                widget,
                class: "Label".into()
            },
            Call::Release { widget },
        ]
    );
    assert!(eng.toolkit().widget(widget).is_none());
    assert!(eng.is_idle());
}

#[test]
fn declaration_is_validated() {
    let mut eng = engine();
    let err = eng
        .add_element(ElementDecl::new("Rectangle").param("wobble", 1.0f32))
        .unwrap_err();
    assert_eq!(
        err,
        CueError::UnknownProperty {
            class: "Rectangle".into(),
            name: "wobble".into()
        }
    );

    let err = eng
        .add_element(ElementDecl::new("Rectangle").param("pos", 3.0f32))
        .unwrap_err();
    assert!(matches!(err, CueError::InvalidParam { ref name, .. } if name == "pos"));

    let err = eng.add_element(decls::rect(2.0, -1.0)).unwrap_err();
    assert!(matches!(err, CueError::InvalidTiming { .. }));
    assert!(err.is_usage_error());
    assert!(eng.is_idle());
}

#[test]
fn construction_receives_resolved_parameters() {
    let mut eng = engine();
    let id = eng
        .add_element(
            ElementDecl::new("Label")
                .param("text", "hi")
                .param("pos", [10.0f32, 20.0]),
        )
        .unwrap();
    let widget = eng.element(id).unwrap().widget;
    assert_eq!(
        eng.current_property(id, "text").unwrap(),
        Value::Text("hi".into())
    );
    assert_eq!(eng.current_property(id, "x").unwrap(), Value::Float(10.0));
    let w = eng.toolkit().widget(widget).unwrap();
    assert!(w.subscribed.contains("font_size"));
    assert!(w.placement.horizontal.low);
}

#[test]
fn step_moves_clock_by_delta() {
    let mut eng = engine();
    let id = eng.add_element(decls::rect(0.5, 0.5)).unwrap();
    eng.step(0.25);
    assert_eq!(eng.now(), 0.25);
    assert_eq!(eng.element(id).unwrap().phase, Phase::Pending);
    eng.step(0.25);
    assert_eq!(eng.element(id).unwrap().phase, Phase::OnScreen);
    eng.step(-3.0);
    assert_eq!(eng.now(), 0.5);
}

#[test]
fn run_until_idle_stops_at_last_event() {
    let mut eng = engine();
    let id = eng.add_element(decls::rect(1.0, 2.0)).unwrap();
    eng.run_until_idle(100.0);
    assert!(eng.is_idle());
    assert_eq!(eng.now(), 3.0);
    assert_eq!(eng.element(id).unwrap().phase, Phase::Finalized);
}
