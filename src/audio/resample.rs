//! Sample-format conversion between the physical input and the pipeline.
//!
//! The pipeline consumes **mono `f32`** at one fixed rate (16 kHz by
//! default).  Whatever format the input device delivers is converted before
//! buffering:
//!
//! 1. [`stereo_to_mono`] — average interleaved channels down to one.
//! 2. [`resample`] — linear interpolation between arbitrary rates.

// ---------------------------------------------------------------------------
// stereo_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging channels.
///
/// The output length is `samples.len() / channels`.  Already-mono input is
/// returned as an owned copy; `channels == 0` yields an empty vector.
pub fn stereo_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Resample mono audio from `from_rate` Hz to `to_rate` Hz using linear
/// interpolation.
///
/// Equal rates return the input unchanged (no interpolation); empty input
/// yields an empty vector.  The output length is approximately
/// `samples.len() × to_rate / from_rate`.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate {
        return samples.to_vec();
    }
    if samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return Vec::new();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f64;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac as f32) + samples[idx + 1] * frac as f32
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- stereo_to_mono ----------------------------------------------------

    #[test]
    fn mono_passthrough() {
        let input = vec![0.1_f32, 0.2, 0.3];
        assert_eq!(stereo_to_mono(&input, 1), input);
    }

    #[test]
    fn two_channel_average() {
        let input = vec![1.0_f32, -1.0, 0.5, 0.5];
        let out = stereo_to_mono(&input, 2);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.0).abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn zero_channels_yields_empty() {
        assert!(stereo_to_mono(&[1.0_f32, 2.0], 0).is_empty());
    }

    // ---- resample ----------------------------------------------------------

    #[test]
    fn equal_rates_are_a_noop() {
        let input: Vec<f32> = (0..160).map(|i| i as f32 / 160.0).collect();
        let out = resample(&input, 16_000, 16_000);
        assert_eq!(out, input);
    }

    #[test]
    fn downsample_48k_to_16k_length() {
        let input = vec![0.5_f32; 480];
        assert_eq!(resample(&input, 48_000, 16_000).len(), 160);
    }

    #[test]
    fn downsample_44100_to_16k_length() {
        let input = vec![0.0_f32; 44_100];
        let out = resample(&input, 44_100, 16_000);
        assert!(out.len().abs_diff(16_000) <= 1);
    }

    #[test]
    fn upsample_8k_to_16k_length() {
        let input = vec![0.0_f32; 80];
        assert_eq!(resample(&input, 8_000, 16_000).len(), 160);
    }

    #[test]
    fn dc_signal_preserves_amplitude() {
        let input = vec![0.5_f32; 480];
        for &s in &resample(&input, 48_000, 16_000) {
            assert!((s - 0.5).abs() < 1e-5, "amplitude drift: {s}");
        }
    }

    #[test]
    fn empty_and_zero_rate_inputs() {
        assert!(resample(&[], 48_000, 16_000).is_empty());
        assert!(resample(&[0.1_f32], 0, 16_000).is_empty());
        assert!(resample(&[0.1_f32], 16_000, 0).is_empty());
    }
}
