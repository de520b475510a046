//! Interpolation helpers:
//! - blend_f32 (weighted blend of scalars)
//! - linear_value (component-wise, recursive for nested sequences; step for Bool/Text)

use crate::error::CueError;
use crate::value::Value;

/// `initial * (1 - w) + target * w`.
///
/// Written as a weighted sum rather than `a + (b - a) * w` so that `w == 0`
/// yields `initial` and `w == 1` yields `target` exactly.
#[inline]
pub fn blend_f32(initial: f32, target: f32, w: f32) -> f32 {
    initial * (1.0 - w) + target * w
}

fn blend_components(a: &[f32], b: &[f32], w: f32) -> Vec<f32> {
    a.iter().zip(b).map(|(x, y)| blend_f32(*x, *y, w)).collect()
}

/// Linearly interpolate from `initial` toward `target` with weight `w`.
///
/// Sequences are interpolated component-wise over the shorter of the two
/// lengths. Numeric sequences of different kinds (e.g. a `Vector` of four
/// components against a `ColorRgba`) are accepted; the result takes the
/// target's kind when the lengths agree.
pub fn linear_value(initial: &Value, target: &Value, w: f32) -> Result<Value, CueError> {
    let out = match (initial, target) {
        (Value::Float(a), Value::Float(b)) => Value::Float(blend_f32(*a, *b, w)),
        (Value::Vec2(a), Value::Vec2(b)) => {
            Value::Vec2([blend_f32(a[0], b[0], w), blend_f32(a[1], b[1], w)])
        }
        (Value::ColorRgba(a), Value::ColorRgba(b)) => Value::ColorRgba([
            blend_f32(a[0], b[0], w),
            blend_f32(a[1], b[1], w),
            blend_f32(a[2], b[2], w),
            blend_f32(a[3], b[3], w),
        ]),
        (Value::List(a), Value::List(b)) => Value::List(
            a.iter()
                .zip(b)
                .map(|(x, y)| linear_value(x, y, w))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        // Step kinds: hold the initial value until the end of the span.
        (Value::Bool(_), Value::Bool(_)) | (Value::Text(_), Value::Text(_)) => {
            if w >= 1.0 {
                target.clone()
            } else {
                initial.clone()
            }
        }
        _ => match (initial.components(), target.components()) {
            (Some(a), Some(b)) => {
                let blended = blend_components(a, b, w);
                match target {
                    Value::Vec2(_) if blended.len() == 2 => Value::Vec2([blended[0], blended[1]]),
                    Value::ColorRgba(_) if blended.len() == 4 => {
                        Value::ColorRgba([blended[0], blended[1], blended[2], blended[3]])
                    }
                    _ => Value::Vector(blended),
                }
            }
            _ => {
                return Err(CueError::ValueMismatch {
                    expected: initial.kind(),
                    actual: target.kind(),
                })
            }
        },
    };
    Ok(out)
}
