//! Composes a set of source elements into a single sidechain envelope
//! (§4.2 "Envelope Engine"): mono timeline buffer → RMS window →
//! compressor curve → 200 Hz linear-gain envelope.
//!
//! Callers (sidechain manager) are responsible for resolving a config's
//! source into the element list this module expects: a track's audio
//! elements directly, or a one-shot definition's markers expanded into
//! one synthetic element per trigger.

use crate::buffer::MonoBuffer;
use crate::config::EnvelopeConfig;
use crate::dsp::{compress, rms_envelope, Envelope};
use timeline_audio_api::SidechainParams;

/// One contributor to a composed sidechain source signal.
pub struct EnvelopeSourceElement {
    /// Already mono-mixed (via [`crate::buffer::mono_mix`]) decoded audio at
    /// the source's native rate.
    pub buffer: MonoBuffer,
    pub start_time: f64,
    pub trim_start: f64,
    pub duration: f64,
    pub looped: bool,
}

/// Full pipeline: compose → RMS → compressor. Zero elements produces a
/// unity envelope (§4.2 edge case).
pub fn compute_envelope(
    elements: &[EnvelopeSourceElement],
    timeline_duration: f64,
    params: &SidechainParams,
    config: &EnvelopeConfig,
) -> Envelope {
    if elements.is_empty() {
        return Envelope::unity(timeline_duration, config.envelope_rate_hz);
    }
    let output_len = (timeline_duration * config.envelope_rate_hz).ceil().max(0.0) as usize;
    let target_rate = elements[0].buffer.sample_rate;
    let composed = compose_timeline_buffer(elements, timeline_duration, target_rate);
    let rms = rms_envelope(&composed, config, output_len);
    let gains = compress(&rms, params, config.envelope_rate_hz);
    Envelope::new(gains, timeline_duration, config.envelope_rate_hz)
}

/// Step 2 of §4.2: sums every element's (resampled, optionally looped)
/// contribution into a single mono buffer at `target_rate`.
fn compose_timeline_buffer(
    elements: &[EnvelopeSourceElement],
    timeline_duration: f64,
    target_rate: f64,
) -> MonoBuffer {
    let output_total_len = (timeline_duration * target_rate).ceil().max(0.0) as usize;
    let mut output = MonoBuffer::zeroed(output_total_len, target_rate);

    for element in elements {
        let rate = element.buffer.sample_rate;
        if rate <= 0.0 || output_total_len == 0 {
            continue;
        }
        let rho = target_rate / rate;
        let source_start_sample = (element.trim_start * rate).floor().max(0.0) as usize;
        let source_len_samples = (element.duration * rate).floor().max(0.0) as usize;
        let resampled_loop_len = ((source_len_samples as f64) * rho).floor().max(1.0) as usize;

        let output_start = (element.start_time * target_rate).floor().max(0.0) as usize;
        if output_start >= output_total_len {
            continue;
        }

        let max_output_samples = if element.looped {
            output_total_len - output_start
        } else {
            ((source_len_samples as f64) * rho).floor() as usize
        };

        for i in 0..max_output_samples {
            let out_idx = output_start + i;
            if out_idx >= output_total_len {
                break;
            }
            let src_offset = if element.looped { i % resampled_loop_len } else { i };
            let src_idx = source_start_sample + (src_offset as f64 / rho).floor() as usize;
            output.samples[out_idx] += sample_or_zero(&element.buffer, src_idx);
        }
    }

    output
}

fn sample_or_zero(buf: &MonoBuffer, idx: usize) -> f64 {
    buf.samples.get(idx).copied().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_buffer(len: usize, rate: f64, amplitude: f64) -> MonoBuffer {
        MonoBuffer {
            samples: vec![amplitude; len],
            sample_rate: rate,
        }
    }

    fn transparent_params() -> SidechainParams {
        SidechainParams {
            threshold_db: -20.0,
            ratio: 1.0,
            attack_s: 0.01,
            release_s: 0.2,
            depth_db: -24.0,
        }
    }

    #[test]
    fn zero_elements_is_unity_envelope() {
        let env = compute_envelope(&[], 2.0, &transparent_params(), &EnvelopeConfig::default());
        assert!(env.gain_values.iter().all(|g| *g == 1.0));
    }

    #[test]
    fn single_non_looped_element_composes_at_the_right_offset() {
        let element = EnvelopeSourceElement {
            buffer: constant_buffer(48_000, 48_000.0, 1.0),
            start_time: 0.5,
            trim_start: 0.0,
            duration: 1.0,
            looped: false,
        };
        let composed = compose_timeline_buffer(&[element], 2.0, 48_000.0);
        assert_eq!(composed.samples[0], 0.0);
        assert_eq!(composed.samples[24_000], 1.0);
        assert_eq!(composed.samples[24_000 + 48_000 - 1], 1.0);
    }

    #[test]
    fn looped_element_tiles_across_the_full_output() {
        let loop_len = 4800;
        let element = EnvelopeSourceElement {
            buffer: constant_buffer(loop_len, 48_000.0, 1.0),
            start_time: 0.0,
            trim_start: 0.0,
            duration: loop_len as f64 / 48_000.0,
            looped: true,
        };
        let composed = compose_timeline_buffer(&[element], 1.0, 48_000.0);
        assert_eq!(composed.samples.len(), 48_000);
        assert!(composed.samples.iter().all(|s| (*s - 1.0).abs() < 1e-9));
    }

    #[test]
    fn overlapping_elements_sum_rather_than_overwrite() {
        let a = EnvelopeSourceElement {
            buffer: constant_buffer(48_000, 48_000.0, 0.5),
            start_time: 0.0,
            trim_start: 0.0,
            duration: 1.0,
            looped: false,
        };
        let b = EnvelopeSourceElement {
            buffer: constant_buffer(48_000, 48_000.0, 0.25),
            start_time: 0.0,
            trim_start: 0.0,
            duration: 1.0,
            looped: false,
        };
        let composed = compose_timeline_buffer(&[a, b], 1.0, 48_000.0);
        assert!((composed.samples[0] - 0.75).abs() < 1e-9);
    }

    /// At ratio=1 the whole pipeline is transparent, so a constant-amplitude
    /// source should produce gain ≡ 1 throughout (property 4, end to end).
    #[test]
    fn transparent_params_yield_unity_gain_for_constant_source() {
        let element = EnvelopeSourceElement {
            buffer: constant_buffer(48_000, 48_000.0, 1.0),
            start_time: 0.0,
            trim_start: 0.0,
            duration: 1.0,
            looped: false,
        };
        let env = compute_envelope(&[element], 1.0, &transparent_params(), &EnvelopeConfig::default());
        for g in &env.gain_values {
            assert!((*g - 1.0).abs() < 1e-6);
        }
    }
}
