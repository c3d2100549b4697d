//! The engine's consumed collaborators (§6 "External Interfaces"): media
//! decode, transport state, read-only timeline queries, and the real-time
//! audio graph. All four are owned by the host application; the engine only
//! ever calls into them.

use crate::buffer::PcmBuffer;
use crate::error::EngineResult;
use async_trait::async_trait;
use std::sync::Arc;
use timeline_audio_api::{MediaAsset, Track};

/// Resolves media assets and URLs into durable handles / decoded PCM.
///
/// Contract: the same asset id always resolves to the same durable handle
/// (so callers may cache on it); blobs may be large and are expected to
/// stream rather than buffer in full.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// A durable, provider-owned handle for `asset`'s blob. Stable across
    /// calls for the same `asset.id`.
    async fn resolve_blob_handle(&self, asset: &MediaAsset) -> EngineResult<String>;

    /// Decodes the PCM audio reachable at `url` (a one-shot's library-sound
    /// URL, or a resolved blob handle). Returns `Err` on decode failure;
    /// callers apply the DecodeFailure policy (§7): skip, log, continue.
    async fn decode_pcm(&self, url: &str) -> EngineResult<PcmBuffer>;
}

/// Read-only view onto host playback state. The scheduler reacts to
/// transport notifications; it never writes transport state back (§6).
pub trait Transport: Send + Sync {
    fn is_playing(&self) -> bool;
    fn current_time(&self) -> f64;
    /// Master volume in `[0, 1]`.
    fn volume(&self) -> f64;
    /// Registers a listener invoked on any transport change, including
    /// seeks (delivered as [`TransportEvent::Seek`]).
    fn subscribe(&self, listener: Box<dyn Fn(&TransportEvent) + Send + Sync>) -> timeline_audio_base::SubscriptionHandle;
    fn unsubscribe(&self, handle: timeline_audio_base::SubscriptionHandle);
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TransportEvent {
    PlayStateChanged { is_playing: bool },
    VolumeChanged { volume: f64 },
    Seek { time: f64 },
}

/// Read-only timeline queries the scheduler and offline mixdown use instead
/// of reaching into the [`timeline_audio_api::Scene`] directly, so the host
/// can interpose its own track caching/ordering concerns (§6).
pub trait TimelineQueries: Send + Sync {
    fn tracks(&self) -> Vec<Track>;
    fn total_duration(&self) -> f64;
    fn track_by_id(&self, id: &timeline_audio_api::TrackId) -> Option<Track>;
    fn subscribe(&self, listener: Box<dyn Fn() + Send + Sync>) -> timeline_audio_base::SubscriptionHandle;
}

/// A single live gain control on the real-time audio graph (§4.6 "Gain
/// tick"). One per active clip and one per live one-shot voice; written at
/// most once per gain-tick period (100 ms), read continuously by the
/// platform audio thread.
pub trait GainNode: Send + Sync {
    fn set_gain(&self, value: f64);
    fn gain(&self) -> f64;
}

/// A scheduled, already-connected source node on the graph (one per clip
/// chunk, or one per triggered one-shot). The scheduler only ever stops or
/// drops these; it never reads samples back out of them.
pub trait SourceNode: Send + Sync {
    /// Stops and disconnects the node. Idempotent: called again during
    /// teardown or after the platform already disposed the node is a no-op,
    /// matching the `Disposed` error policy (§7) of "swallow, exit cleanly".
    fn stop(&self);
}

/// The platform-owned real-time audio graph the scheduler drives (§5): a
/// single-threaded actor schedules future-timestamped source nodes and
/// writes gain-node values; it never pulls samples itself.
pub trait AudioGraph: Send + Sync {
    /// The graph's own monotonic clock ("now"), in seconds. Distinct from
    /// timeline time: `playbackStartContextTime` anchors the two (§4.6).
    fn now(&self) -> f64;

    /// Creates a new gain node feeding the master bus, starting at
    /// `initial_gain`.
    fn create_gain_node(&self, initial_gain: f64) -> Arc<dyn GainNode>;

    /// Schedules `frame_count` frames of `chunk` starting at `frame_offset`
    /// within it to play at `context_time`, routed through `gain_node`. If
    /// `context_time` has already passed, the implementation starts
    /// immediately at the corresponding in-chunk offset (§4.6); the
    /// scheduler itself decides whether to drop a chunk whose offset would
    /// exceed its length before ever calling this.
    fn schedule_source(
        &self,
        chunk: Arc<PcmBuffer>,
        frame_offset: usize,
        frame_count: usize,
        context_time: f64,
        gain_node: &Arc<dyn GainNode>,
    ) -> Box<dyn SourceNode>;
}
