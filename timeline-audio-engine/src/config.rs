use std::time::Duration;

/// Tunables for the playback scheduler (§4.6). Grouped into one struct with
/// a `Default` matching the literal constants from the spec, instead of
/// scattering them as magic numbers through the scheduler.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SchedulerConfig {
    /// How often the look-ahead loop runs.
    pub tick_period: Duration,
    /// How far past `now` the look-ahead loop pre-enqueues sources.
    pub look_ahead_window: Duration,
    /// How often the gain tick runs.
    pub gain_tick_period: Duration,
    /// Backpressure bound: a clip iterator waits once it's buffered this far
    /// ahead of the current playback time.
    pub backpressure_bound: Duration,
    /// Poll interval while a clip iterator is waiting on backpressure.
    pub backpressure_poll_period: Duration,
    /// Small backward grace window so a one-shot marker just past `now`
    /// still gets scheduled.
    pub one_shot_backward_grace: Duration,
    /// Granularity a clip iterator chunks its source into when scheduling
    /// source nodes. Not specified by §4.6 directly; chosen small enough
    /// that the ~1 s backpressure bound corresponds to several in-flight
    /// chunks rather than one oversized one.
    pub clip_chunk_duration: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(500),
            look_ahead_window: Duration::from_secs(2),
            gain_tick_period: Duration::from_millis(100),
            backpressure_bound: Duration::from_secs(1),
            backpressure_poll_period: Duration::from_millis(100),
            one_shot_backward_grace: Duration::from_millis(100),
            clip_chunk_duration: Duration::from_millis(250),
        }
    }
}

/// Tunables for the envelope engine / DSP primitives (§4.1, §4.2).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EnvelopeConfig {
    /// Fixed sample rate of every computed [`crate::dsp::envelope::Envelope`].
    pub envelope_rate_hz: f64,
    /// RMS window width in seconds.
    pub rms_window_s: f64,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            envelope_rate_hz: 200.0,
            rms_window_s: 0.01,
        }
    }
}

/// Tunables for the offline time-remap mixdown (§4.7).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MixdownConfig {
    /// Output sample rate when the caller doesn't request a specific one.
    pub default_output_rate_hz: f64,
    /// Mixdown reports progress and checks the cancellation predicate every
    /// this many output frames (§5 "Suspension points: ... offline mix
    /// chunk boundaries").
    pub progress_chunk_frames: usize,
}

impl Default for MixdownConfig {
    fn default() -> Self {
        Self {
            default_output_rate_hz: 44_100.0,
            progress_chunk_frames: 44_100,
        }
    }
}
