//! Scripted presentation against the recording toolkit.
//!
//! Run with: RUST_LOG=debug cargo run -p cuekit-core --example showcase

use cuekit_core::{ElementDecl, Engine, PosHint, Slide, StateEvent};
use cuekit_test_fixtures::{configs, decls, RecordingToolkit};
use serde_json::to_string_pretty;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cfg = configs::load("fast_display")?;
    let mut eng = Engine::new(cfg, RecordingToolkit::new())?;

    // Title card for two seconds, then a row of dots sliding in.
    let title = eng.add_element(
        decls::label("cuekit", 0.0)
            .named("title")
            .duration(2.0)
            .pos_hint(PosHint {
                top: Some(0.9),
                ..PosHint::default()
            }),
    )?;
    eng.slide(
        title,
        Slide::new().duration(0.5).to("color", [1.0f32, 0.8, 0.2, 1.0]),
    )?;

    let mut dots = Vec::new();
    let row = eng.with_layout(decls::box_layout().named("row").start(2.0), |eng| {
        for i in 0..3 {
            let dot = eng.add_element(
                ElementDecl::new("Ellipse")
                    .named(format!("dot{i}"))
                    .start(2.0 + 0.25 * i as f64)
                    .duration(2.0)
                    .param("size", [20.0f32, 20.0]),
            )?;
            eng.slide(
                dot,
                Slide::new()
                    .start(2.0 + 0.25 * i as f64)
                    .duration(1.0)
                    .to("angle_end", 180.0f32),
            )?;
            dots.push(dot);
        }
        Ok(())
    })?;

    // Drop the last dot early.
    eng.advance_to(2.8);
    eng.cancel(dots[2], 3.0)?;

    eng.advance_to(10.0);

    for event in eng.events() {
        if let StateEvent::GroupCompleted { group, time } = event {
            println!("{group} completed at {time:.3}");
        }
    }
    println!(
        "row lasted until {:?}",
        eng.element(row).and_then(|e| e.disappear_time)
    );
    println!("records:\n{}", to_string_pretty(eng.records())?);
    Ok(())
}
