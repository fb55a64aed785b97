//! Audio format conversion utilities.
//!
//! Converts the pipeline's internal sample representation to device wire
//! formats:
//! - f64 → f32 narrowing with interleaving and zero-padding
//! - f32 → i16 for devices that only take 16-bit output

mod convert;

pub use convert::{f32_to_i16, f64_to_f32, interleave_into};
