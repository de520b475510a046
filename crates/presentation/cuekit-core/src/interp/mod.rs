//! Interpolation of live property values.

pub mod functions;

pub use functions::{blend_f32, linear_value};
