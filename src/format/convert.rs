//! Sample format conversion and soft clipping.

/// Divisor mapping the full i16 range onto [-1.0, 1.0).
const I16_SCALE: f32 = 32768.0;

/// Converts an i16 sample to f32.
///
/// `i16::MIN` maps to exactly -1.0 and `i16::MAX` to just under 1.0.
#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    f32::from(sample) / I16_SCALE
}

/// Batch converts i16 samples to f32. No clamping is applied.
pub fn i16_slice_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| i16_to_f32(s)).collect()
}

/// Converts an f32 sample to i16.
///
/// Uses × 32767 (not 32768) for symmetric scaling; values outside
/// [-1.0, 1.0] are clamped.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// Saturates a summed sample.
///
/// Samples within [-1.0, 1.0] pass through untouched; anything beyond is
/// replaced by its hyperbolic tangent.
#[inline]
pub fn soft_clip(sample: f32) -> f32 {
    if sample > 1.0 || sample < -1.0 {
        sample.tanh()
    } else {
        sample
    }
}

/// Applies [`soft_clip`] to every sample of a buffer.
pub fn soft_clip_in_place(buffer: &mut [f32]) {
    for sample in buffer.iter_mut() {
        *sample = soft_clip(*sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i16_to_f32_extremes() {
        assert_eq!(i16_to_f32(i16::MIN), -1.0);
        assert_eq!(i16_to_f32(i16::MAX), 32767.0 / 32768.0);
        assert!(i16_to_f32(i16::MAX) < 1.0);
        assert_eq!(i16_to_f32(0), 0.0);
    }

    #[test]
    fn test_i16_slice_to_f32() {
        let converted = i16_slice_to_f32(&[16384, -16384, 0]);
        assert_eq!(converted, vec![0.5, -0.5, 0.0]);
    }

    #[test]
    fn test_f32_to_i16_clamping() {
        assert_eq!(f32_to_i16(1.0), 32767);
        assert_eq!(f32_to_i16(-1.0), -32767);
        assert_eq!(f32_to_i16(2.0), 32767);
        assert_eq!(f32_to_i16(-2.0), -32768);
    }

    #[test]
    fn test_soft_clip_in_range_is_identity() {
        for &sample in &[-1.0f32, -0.75, -0.001, 0.0, 0.3, 0.999, 1.0] {
            assert_eq!(soft_clip(sample), sample);
        }
    }

    #[test]
    fn test_soft_clip_out_of_range_uses_tanh() {
        assert_eq!(soft_clip(2.0), 2.0f32.tanh());
        assert!((soft_clip(2.0) - 0.964).abs() < 0.001);
        assert_eq!(soft_clip(-3.5), (-3.5f32).tanh());
        assert!(soft_clip(1.0001) < 1.0);
    }

    #[test]
    fn test_soft_clip_in_place() {
        let mut buffer = vec![0.5, 2.0, -2.0, -0.25];
        soft_clip_in_place(&mut buffer);
        assert_eq!(buffer, vec![0.5, 2.0f32.tanh(), (-2.0f32).tanh(), -0.25]);
    }
}
