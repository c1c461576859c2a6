//! Sample format conversion and output shaping.
//!
//! - Sample format conversion (i16 ⇄ f32)
//! - Soft clipping of summed output

mod convert;

pub use convert::{f32_to_i16, i16_slice_to_f32, i16_to_f32, soft_clip, soft_clip_in_place};
