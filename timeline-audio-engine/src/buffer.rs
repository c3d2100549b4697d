//! PCM buffer types shared by the DSP primitives, envelope engine, clip
//! iterators and offline mixdown. Samples are stored planar (one contiguous
//! run per channel), matching the shape the Media Provider hands decoded
//! PCM in.

/// An owned, fixed-topology block of planar `f64` PCM.
#[derive(Clone)]
pub struct PcmBuffer {
    data: Vec<f64>,
    channel_count: usize,
    frame_count: usize,
    pub sample_rate: f64,
}

impl PcmBuffer {
    pub fn silence(channel_count: usize, frame_count: usize, sample_rate: f64) -> Self {
        Self {
            data: vec![0.0; channel_count * frame_count],
            channel_count,
            frame_count,
            sample_rate,
        }
    }

    pub fn from_planar(data: Vec<f64>, channel_count: usize, sample_rate: f64) -> Self {
        assert!(channel_count > 0, "channel_count must be > 0");
        assert_eq!(
            data.len() % channel_count,
            0,
            "planar data length must be a multiple of channel_count"
        );
        let frame_count = data.len() / channel_count;
        Self {
            data,
            channel_count,
            frame_count,
            sample_rate,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn duration_secs(&self) -> f64 {
        self.frame_count as f64 / self.sample_rate
    }

    pub fn channel(&self, index: usize) -> &[f64] {
        let start = index * self.frame_count;
        &self.data[start..start + self.frame_count]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [f64] {
        let frame_count = self.frame_count;
        let start = index * frame_count;
        &mut self.data[start..start + frame_count]
    }

    /// Sample at `(channel, frame)`, or `0.0` if out of bounds — buffers at
    /// the edge of a source (e.g. the tail of a trimmed clip) are read this
    /// way throughout the engine rather than panicking.
    pub fn sample_or_zero(&self, channel: usize, frame: isize) -> f64 {
        if frame < 0 || frame as usize >= self.frame_count {
            return 0.0;
        }
        self.channel(channel)[frame as usize]
    }
}

/// A mono buffer at a fixed sample rate: the composed timeline signal fed
/// into the RMS window and compressor curve (§4.1, §4.2).
#[derive(Clone)]
pub struct MonoBuffer {
    pub samples: Vec<f64>,
    pub sample_rate: f64,
}

impl MonoBuffer {
    pub fn zeroed(len: usize, sample_rate: f64) -> Self {
        Self {
            samples: vec![0.0; len],
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Sums channels and divides by channel count (§4.1 "Mono mix"). Output
/// length equals input length.
pub fn mono_mix(buf: &PcmBuffer) -> MonoBuffer {
    let mut samples = vec![0.0; buf.frame_count()];
    let channel_count = buf.channel_count().max(1);
    for ch in 0..buf.channel_count() {
        for (i, sample) in buf.channel(ch).iter().enumerate() {
            samples[i] += *sample;
        }
    }
    for sample in &mut samples {
        *sample /= channel_count as f64;
    }
    MonoBuffer {
        samples,
        sample_rate: buf.sample_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_mix_averages_channels() {
        let buf = PcmBuffer::from_planar(vec![1.0, 1.0, -1.0, -1.0], 2, 48_000.0);
        let mono = mono_mix(&buf);
        assert_eq!(mono.samples, vec![0.0, 0.0]);
    }

    #[test]
    fn mono_mix_preserves_length() {
        let buf = PcmBuffer::from_planar(vec![0.5, 0.25, 0.75], 1, 48_000.0);
        let mono = mono_mix(&buf);
        assert_eq!(mono.samples.len(), 3);
    }
}
