use timeline_audio_api::SidechainParams;

/// Feed-forward compressor curve over an RMS envelope, producing a linear
/// gain-reduction envelope (§4.1 "Compressor curve").
///
/// For each RMS sample `r`:
/// - `rDb = 20*log10(r)`, or `-inf` if `r <= 0`.
/// - `targetReductionDb = clamp((rDb - threshold) * (1 - 1/ratio), 0, |depth|)`
///   if `rDb > threshold`, else `0`.
/// - Single-pole IIR smoothing towards the target, using the attack
///   coefficient while rising and the release coefficient while falling.
/// - `gain = 10^(-smoothed/20)`.
pub fn compress(rms: &[f64], params: &SidechainParams, envelope_rate_hz: f64) -> Vec<f64> {
    let attack_coeff = time_constant_coeff(params.attack_s, envelope_rate_hz);
    let release_coeff = time_constant_coeff(params.release_s, envelope_rate_hz);
    let max_reduction_db = params.depth_db.abs();

    let mut smoothed = 0.0_f64;
    let mut gains = Vec::with_capacity(rms.len());
    for &r in rms {
        let target_db = target_reduction_db(r, params.threshold_db, params.ratio, max_reduction_db);
        let coeff = if target_db > smoothed {
            attack_coeff
        } else {
            release_coeff
        };
        smoothed = coeff * smoothed + (1.0 - coeff) * target_db;
        gains.push(10f64.powf(-smoothed / 20.0));
    }
    gains
}

fn target_reduction_db(rms: f64, threshold_db: f64, ratio: f64, max_reduction_db: f64) -> f64 {
    if rms <= 0.0 {
        // -inf dB is always below threshold: no reduction.
        return 0.0;
    }
    let r_db = 20.0 * rms.log10();
    if r_db <= threshold_db {
        return 0.0;
    }
    let reduction = (r_db - threshold_db) * (1.0 - 1.0 / ratio);
    reduction.clamp(0.0, max_reduction_db)
}

fn time_constant_coeff(tau_s: f64, rate_hz: f64) -> f64 {
    (-1.0 / (tau_s * rate_hz)).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(threshold_db: f64, ratio: f64, attack_s: f64, release_s: f64, depth_db: f64) -> SidechainParams {
        SidechainParams {
            threshold_db,
            ratio,
            attack_s,
            release_s,
            depth_db,
        }
    }

    /// S2: pure 1.0-amplitude signal, threshold=-20dB, ratio=4, depth=-24dB.
    /// After settling, gain should reflect 15 dB of reduction (~0.178).
    #[test]
    fn settles_to_expected_steady_state_gain() {
        let p = params(-20.0, 4.0, 0.01, 0.2, -24.0);
        let rate = 200.0;
        let samples = (rate * 2.0) as usize; // well past 10x the attack time constant
        let rms = vec![1.0; samples];
        let gains = compress(&rms, &p, rate);
        let settled = *gains.last().unwrap();
        assert!((settled - 0.178).abs() < 0.01, "settled gain was {settled}");
    }

    /// Property 3: max reduction never exceeds |depth|.
    #[test]
    fn reduction_never_exceeds_depth() {
        let p = params(-30.0, 10.0, 0.001, 0.01, -18.0);
        let rms = vec![1.0; 4000];
        let gains = compress(&rms, &p, 200.0);
        let min_gain = gains.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_reduction_db = -20.0 * min_gain.log10();
        assert!(max_reduction_db <= 18.0 + 1e-6);
    }

    /// Property 4: at ratio=1, the compressor passes through unmodified.
    #[test]
    fn ratio_one_is_transparent() {
        let p = params(-20.0, 1.0, 0.01, 0.2, -24.0);
        let rms = vec![1.0; 2000];
        let gains = compress(&rms, &p, 200.0);
        for g in gains {
            assert!((g - 1.0).abs() < 1e-9);
        }
    }

    /// Property 5: at threshold above signal peak, gain stays 1.
    #[test]
    fn threshold_above_peak_is_transparent() {
        let p = params(0.0, 4.0, 0.01, 0.2, -24.0);
        let rms = vec![0.5; 2000];
        let gains = compress(&rms, &p, 200.0);
        for g in gains {
            assert!((g - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn silence_has_no_reduction() {
        let p = params(-20.0, 4.0, 0.01, 0.2, -24.0);
        let rms = vec![0.0; 100];
        let gains = compress(&rms, &p, 200.0);
        for g in gains {
            assert!((g - 1.0).abs() < 1e-9);
        }
    }
}
