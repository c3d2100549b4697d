use crate::buffer::MonoBuffer;
use crate::config::EnvelopeConfig;

/// Resamples a mono signal at `sourceRate` into an RMS envelope at
/// `envelopeRate` (§4.1 "RMS envelope").
///
/// For each output index `i`, the center sample is
/// `c = floor(i * sourceRate / envelopeRate)`; the window spans
/// `[c - W/2, c + W/2]` clamped to the buffer, with
/// `W = floor(rms_window_s * sourceRate)`. Empty windows produce `0.0`.
pub fn rms_envelope(source: &MonoBuffer, config: &EnvelopeConfig, output_len: usize) -> Vec<f64> {
    let source_rate = source.sample_rate;
    let window = (config.rms_window_s * source_rate).floor() as i64;
    let half_window = window / 2;
    let mut out = Vec::with_capacity(output_len);
    for i in 0..output_len {
        let center = ((i as f64 * source_rate / config.envelope_rate_hz).floor()) as i64;
        let lo = (center - half_window).max(0);
        let hi = (center + half_window).min(source.samples.len() as i64 - 1);
        if hi < lo || source.samples.is_empty() {
            out.push(0.0);
            continue;
        }
        let mut sum_sq = 0.0;
        let mut count = 0u64;
        for idx in lo..=hi {
            let s = source.samples[idx as usize];
            sum_sq += s * s;
            count += 1;
        }
        let rms = if count == 0 { 0.0 } else { (sum_sq / count as f64).sqrt() };
        out.push(rms);
    }
    out
}
