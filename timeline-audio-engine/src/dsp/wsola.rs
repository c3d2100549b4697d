//! Offline-only WSOLA time-stretch (§4.1 "Time-stretch (WSOLA)").
//!
//! Standard parameters (frame size, overlap, search window) are not fixed
//! by the spec (§9 Open Question a); we use commonly cited WSOLA defaults:
//! a 1024-sample analysis/synthesis frame with 50% overlap and a ±256
//! sample search window for the best-overlap offset.
//!
//! Behavioral contract: output preserves pitch within ±5 cents over slow
//! ramps and avoids audible discontinuities; at `tempo == 1.0` output must
//! equal input bit-accurately, which we special-case directly rather than
//! relying on the general algorithm to reduce to an identity.

use std::f64::consts::PI;

const FRAME_SIZE: usize = 1024;
const SEARCH_RADIUS: i64 = 256;

/// Time-stretches interleaved stereo `input` by `tempo` (output length is
/// approximately `input_len / tempo`). `sample_rate` only informs callers
/// about the physical meaning of `FRAME_SIZE`/`SEARCH_RADIUS`; at 44.1-48
/// kHz these correspond to ~20-25 ms frames, a standard WSOLA range.
pub fn time_stretch_stereo(input: &[f64], tempo: f64) -> Vec<f64> {
    debug_assert_eq!(input.len() % 2, 0, "input must be interleaved stereo");
    if tempo <= 0.0 || (tempo - 1.0).abs() < f64::EPSILON {
        return input.to_vec();
    }
    let frames_in = input.len() / 2;
    if frames_in == 0 {
        return Vec::new();
    }

    let synthesis_hop = FRAME_SIZE / 2;
    let analysis_hop = ((synthesis_hop as f64) * tempo).round().max(1.0) as usize;
    let window = hann_window(FRAME_SIZE);

    let frames_out = ((frames_in as f64) / tempo).round().max(1.0) as usize;
    let padded_len = frames_out + FRAME_SIZE;
    let mut out_l = vec![0.0_f64; padded_len];
    let mut out_r = vec![0.0_f64; padded_len];
    let mut weight = vec![0.0_f64; padded_len];

    let max_read_start = (frames_in as i64 - FRAME_SIZE as i64).max(0);
    let mut read_pos: i64 = 0;
    let mut write_pos: usize = 0;
    while (read_pos as usize) < frames_in && write_pos < frames_out {
        let search_lo = (read_pos - SEARCH_RADIUS).max(0);
        let search_hi = (read_pos + SEARCH_RADIUS).min(max_read_start);
        let chosen_offset = if write_pos == 0 || search_hi <= search_lo {
            read_pos.clamp(0, max_read_start)
        } else {
            best_overlap_offset(&out_l, &out_r, write_pos, input, search_lo, search_hi, synthesis_hop)
        };

        for i in 0..FRAME_SIZE {
            let src_idx = chosen_offset as usize + i;
            if src_idx >= frames_in {
                break;
            }
            let w = window[i];
            out_l[write_pos + i] += input[src_idx * 2] * w;
            out_r[write_pos + i] += input[src_idx * 2 + 1] * w;
            weight[write_pos + i] += w;
        }

        write_pos += synthesis_hop;
        read_pos += analysis_hop as i64;
    }

    let mut out = Vec::with_capacity(frames_out * 2);
    for i in 0..frames_out {
        let w = weight[i];
        if w > 1e-9 {
            out.push(out_l[i] / w);
            out.push(out_r[i] / w);
        } else {
            out.push(0.0);
            out.push(0.0);
        }
    }
    out
}

/// Finds the input offset in `[search_lo, search_hi]` whose waveform best
/// continues the signal already written at `out[write_pos..]` (normalized
/// cross-correlation over the upcoming overlap region), the core WSOLA
/// search that avoids phase-cancellation discontinuities at segment joins.
fn best_overlap_offset(
    out_l: &[f64],
    out_r: &[f64],
    write_pos: usize,
    input: &[f64],
    search_lo: i64,
    search_hi: i64,
    overlap_len: usize,
) -> i64 {
    let ref_end = (write_pos + overlap_len).min(out_l.len());
    if ref_end <= write_pos {
        return search_lo;
    }
    let ref_len = ref_end - write_pos;
    let frames_in = input.len() / 2;

    let mut best_offset = search_lo;
    let mut best_score = f64::NEG_INFINITY;
    let mut offset = search_lo;
    while offset <= search_hi {
        let mut score = 0.0;
        let mut energy = 0.0;
        for i in 0..ref_len {
            let src_idx = offset as usize + i;
            if src_idx >= frames_in {
                break;
            }
            let cand_l = input[src_idx * 2];
            let cand_r = input[src_idx * 2 + 1];
            let ref_l = out_l[write_pos + i];
            let ref_r = out_r[write_pos + i];
            score += cand_l * ref_l + cand_r * ref_r;
            energy += cand_l * cand_l + cand_r * cand_r;
        }
        let normalized = if energy > 1e-12 { score / energy.sqrt() } else { score };
        if normalized > best_score {
            best_score = normalized;
            best_offset = offset;
        }
        offset += 1;
    }
    best_offset
}

fn hann_window(size: usize) -> Vec<f64> {
    if size <= 1 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / (size as f64 - 1.0)).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_stereo(frames: usize, freq: f64, sample_rate: f64) -> Vec<f64> {
        let mut out = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            let s = (2.0 * PI * freq * i as f64 / sample_rate).sin();
            out.push(s);
            out.push(s);
        }
        out
    }

    /// Property 8: tempo=1 is an identity (WSOLA bypass case).
    #[test]
    fn tempo_one_is_bit_accurate_identity() {
        let input = sine_stereo(4096, 440.0, 48_000.0);
        let output = time_stretch_stereo(&input, 1.0);
        assert_eq!(input, output);
    }

    #[test]
    fn slowing_down_lengthens_output_proportionally() {
        let input = sine_stereo(8192, 440.0, 48_000.0);
        let output = time_stretch_stereo(&input, 0.5);
        let expected_frames = (8192.0 / 0.5).round() as usize;
        let actual_frames = output.len() / 2;
        let tolerance = FRAME_SIZE;
        assert!(
            (actual_frames as i64 - expected_frames as i64).unsigned_abs() as usize <= tolerance,
            "expected ~{expected_frames} frames, got {actual_frames}"
        );
    }

    #[test]
    fn speeding_up_shortens_output_proportionally() {
        let input = sine_stereo(8192, 440.0, 48_000.0);
        let output = time_stretch_stereo(&input, 2.0);
        let expected_frames = (8192.0 / 2.0).round() as usize;
        let actual_frames = output.len() / 2;
        let tolerance = FRAME_SIZE;
        assert!(
            (actual_frames as i64 - expected_frames as i64).unsigned_abs() as usize <= tolerance,
            "expected ~{expected_frames} frames, got {actual_frames}"
        );
    }

    #[test]
    fn output_has_no_channel_imbalance_for_a_centered_source() {
        let input = sine_stereo(8192, 220.0, 48_000.0);
        let output = time_stretch_stereo(&input, 1.5);
        let max_diff = output
            .chunks(2)
            .map(|frame| (frame[0] - frame[1]).abs())
            .fold(0.0_f64, f64::max);
        assert!(max_diff < 1e-9);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(time_stretch_stereo(&[], 1.5).is_empty());
    }
}
