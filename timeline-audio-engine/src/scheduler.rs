//! The playback scheduler (§4.6): a single-threaded cooperative actor that
//! pre-schedules timeline audio clips and triggered one-shots onto the
//! real-time audio graph.
//!
//! The state machine of §4.6 is driven externally: a host pumps
//! [`PlaybackScheduler::look_ahead_tick`] every `tick_period` and
//! [`PlaybackScheduler::gain_tick`] every `gain_tick_period` (typically from
//! two `tokio::time::interval`s on a current-thread runtime), and reacts to
//! [`crate::external::Transport`] notifications by calling
//! [`PlaybackScheduler::play`]/[`stop`](PlaybackScheduler::stop)/[`seek`](PlaybackScheduler::seek).
//! Every tick re-checks `session_id` after any `await`, so a stale
//! in-flight decode (one started before a subsequent stop/seek/timeline
//! edit) never touches the graph (§5 "Cancellation").

use crate::buffer::PcmBuffer;
use crate::config::SchedulerConfig;
use crate::external::{AudioGraph, GainNode, MediaProvider, SourceNode};
use crate::managers::automation_manager::effective_volume;
use crate::managers::oneshot_manager::OneshotManager;
use crate::managers::sidechain_manager::SidechainManager;
use std::sync::Arc;
use timeline_audio_api::{ElementId, MediaAssetId, OneshotDefinitionId, OneshotMarkerId, Scene, TrackId};
use timeline_audio_base::hash_util::{NonCryptoHashMap, NonCryptoHashSet};
use timeline_audio_base::tracing_warn;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SchedulerState {
    Idle,
    Preparing,
    Running,
    Suspended,
}

/// An audio element resolved into scheduling-relevant fields (§4.6 "Per play
/// start", step 1). A track or element flagged `hidden` stands in for
/// "muted" in this data model, so [`collect_audio_clips`] never returns one.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioClip {
    pub element_id: ElementId,
    pub track_id: TrackId,
    pub media_id: MediaAssetId,
    pub start_time: f64,
    pub duration: f64,
    pub trim_start: f64,
    pub trim_end: f64,
    pub base_volume: f64,
    pub looped: bool,
}

impl AudioClip {
    pub fn slice_duration(&self) -> f64 {
        self.trim_end - self.trim_start
    }
}

/// All non-hidden audio elements on non-hidden tracks, as scheduling clips
/// (§4.6 "Collect audio clips from tracks (all audio elements; skip
/// muted)").
pub fn collect_audio_clips(scene: &Scene) -> Vec<AudioClip> {
    scene
        .tracks
        .iter()
        .filter(|t| !t.hidden)
        .flat_map(|t| {
            t.audio_elements().filter(|e| !e.hidden).filter_map(move |e| {
                let data = e.audio_data()?;
                Some(AudioClip {
                    element_id: e.id.clone(),
                    track_id: t.id.clone(),
                    media_id: data.media_id.clone(),
                    start_time: e.start_time,
                    duration: e.duration,
                    trim_start: e.trim_start,
                    trim_end: e.trim_end,
                    base_volume: data.base_volume,
                    looped: data.looped,
                })
            })
        })
        .collect()
}

/// When a clip stops producing audio: the full timeline duration for a
/// looping clip (it keeps tiling its trim slice until the timeline itself
/// ends, regardless of its own box `duration`), or `start_time + duration`
/// otherwise (§4.6 "effectiveEnd: loop ⇒ total timeline duration;
/// otherwise ⇒ startTime + duration").
pub fn clip_effective_end(clip: &AudioClip, timeline_duration: f64) -> f64 {
    if clip.looped {
        timeline_duration
    } else {
        clip.start_time + clip.duration
    }
}

/// Maps a timeline time within a looping clip's active range back into its
/// trim window. The loop period is `trimEnd - trimStart` (the slice being
/// tiled), not the element's own `duration` (its on-timeline box extent) —
/// confirmed by the five-iterations-then-stop count of a 10 s timeline
/// tiling a 2 s slice.
fn loop_position(clip: &AudioClip, timeline_time: f64) -> f64 {
    if !clip.looped {
        return clip.trim_start + (timeline_time - clip.start_time);
    }
    let slice = clip.slice_duration();
    if slice <= 0.0 {
        return clip.trim_start;
    }
    let elapsed = timeline_time - clip.start_time;
    clip.trim_start + elapsed.rem_euclid(slice)
}

/// The next timeline time at or after `cursor` where a looping clip wraps
/// back to `trim_start`. `f64::INFINITY` for a non-looping clip, so callers
/// can `.min()` it unconditionally when capping a chunk window.
fn next_loop_boundary(clip: &AudioClip, cursor: f64) -> f64 {
    if !clip.looped {
        return f64::INFINITY;
    }
    let slice = clip.slice_duration();
    if slice <= 0.0 {
        return f64::INFINITY;
    }
    let elapsed = cursor - clip.start_time;
    let iterations_done = (elapsed / slice).floor();
    clip.start_time + (iterations_done + 1.0) * slice
}

pub struct ChunkPlan {
    pub timeline_start: f64,
    pub source_frame_offset: usize,
    pub frame_count: usize,
}

/// Plans one source-node chunk covering `[cursor, window_end)` of timeline
/// time. The caller is responsible for never crossing a loop boundary
/// within one call (§4.6's clip iterator produces one chunk per backpressure
/// step; a chunk spanning a loop wrap would require two disjoint source
/// ranges, which `AudioGraph::schedule_source` has no way to express).
pub fn next_chunk_plan(clip: &AudioClip, cursor: f64, window_end: f64, sample_rate: f64) -> Option<ChunkPlan> {
    if window_end <= cursor {
        return None;
    }
    let source_start = loop_position(clip, cursor);
    let frame_count = ((window_end - cursor) * sample_rate).round() as usize;
    if frame_count == 0 {
        return None;
    }
    Some(ChunkPlan {
        timeline_start: cursor,
        source_frame_offset: (source_start * sample_rate).round() as usize,
        frame_count,
    })
}

/// If `context_time` has already passed relative to `graph_now`, starts
/// immediately at the corresponding in-chunk offset; drops the chunk
/// entirely if that offset would exceed its length (§4.6 "If contextTime
/// already passed, start immediately at an in-chunk offset, or drop the
/// chunk if the offset exceeds it").
fn resolve_schedule(
    frame_offset: usize,
    frame_count: usize,
    context_time: f64,
    graph_now: f64,
    sample_rate: f64,
) -> Option<(usize, usize, f64)> {
    if context_time >= graph_now {
        return Some((frame_offset, frame_count, context_time));
    }
    let skip_frames = ((graph_now - context_time) * sample_rate).round() as usize;
    if skip_frames >= frame_count {
        return None;
    }
    Some((frame_offset + skip_frames, frame_count - skip_frames, graph_now))
}

struct ActiveClip {
    clip: AudioClip,
    buffer: Arc<PcmBuffer>,
    gain_node: Arc<dyn GainNode>,
    cursor: f64,
    nodes: Vec<Box<dyn SourceNode>>,
}

struct OneshotVoice {
    definition_id: OneshotDefinitionId,
    base_volume: f64,
    gain_node: Arc<dyn GainNode>,
    #[allow(dead_code)]
    node: Box<dyn SourceNode>,
}

/// Drives the real-time audio graph for one timeline's playback. Owns no
/// Scene data itself — every tick takes the live `Scene` and manager
/// references by reference, so a command applied between ticks is picked up
/// on the very next one.
pub struct PlaybackScheduler {
    config: SchedulerConfig,
    graph: Arc<dyn AudioGraph>,
    state: SchedulerState,
    session_id: u64,
    playback_start_time: f64,
    playback_start_context_time: f64,
    active_clips: NonCryptoHashMap<ElementId, ActiveClip>,
    media_cache: NonCryptoHashMap<MediaAssetId, Arc<PcmBuffer>>,
    failed_media: NonCryptoHashSet<MediaAssetId>,
    scheduled_oneshots: NonCryptoHashSet<OneshotMarkerId>,
    oneshot_voices: NonCryptoHashMap<OneshotMarkerId, OneshotVoice>,
}

impl PlaybackScheduler {
    pub fn new(config: SchedulerConfig, graph: Arc<dyn AudioGraph>) -> Self {
        Self {
            config,
            graph,
            state: SchedulerState::Idle,
            session_id: 0,
            playback_start_time: 0.0,
            playback_start_context_time: 0.0,
            active_clips: Default::default(),
            media_cache: Default::default(),
            failed_media: Default::default(),
            scheduled_oneshots: Default::default(),
            oneshot_voices: Default::default(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// The timeline time corresponding to the graph's current clock,
    /// derived from the anchor recorded at the last play/seek/restart
    /// (§4.6 "playbackStartContextTime anchors timeline time to context
    /// time").
    pub fn current_playback_time(&self) -> f64 {
        self.playback_start_time + (self.graph.now() - self.playback_start_context_time)
    }

    /// Starts playback from `at_time` (Idle → Preparing → Running).
    pub async fn play(
        &mut self,
        scene: &Scene,
        one_shot_manager: &mut OneshotManager,
        sidechain_manager: &mut SidechainManager,
        provider: &dyn MediaProvider,
        at_time: f64,
    ) {
        self.begin(SchedulerState::Preparing, scene, one_shot_manager, sidechain_manager, provider, at_time)
            .await;
    }

    /// Stop-then-start at `at_time` if currently playing; otherwise just
    /// stops (§4.6 "Seek").
    pub async fn seek(
        &mut self,
        scene: &Scene,
        one_shot_manager: &mut OneshotManager,
        sidechain_manager: &mut SidechainManager,
        provider: &dyn MediaProvider,
        at_time: f64,
    ) {
        if matches!(self.state, SchedulerState::Running | SchedulerState::Suspended) {
            self.begin(SchedulerState::Preparing, scene, one_shot_manager, sidechain_manager, provider, at_time)
                .await;
        } else {
            self.stop();
        }
    }

    /// Timeline or media mutation while playing: dispose every sink and
    /// clip iterator, then restart at the current playback time with the
    /// same session-id increment (§4.6 "Running ⇄ Suspended on timeline
    /// edit"). A no-op when not currently playing.
    pub async fn on_timeline_mutated(
        &mut self,
        scene: &Scene,
        one_shot_manager: &mut OneshotManager,
        sidechain_manager: &mut SidechainManager,
        provider: &dyn MediaProvider,
    ) {
        if !matches!(self.state, SchedulerState::Running | SchedulerState::Suspended) {
            return;
        }
        let resume_at = self.current_playback_time();
        self.begin(SchedulerState::Suspended, scene, one_shot_manager, sidechain_manager, provider, resume_at)
            .await;
    }

    /// Clears timers, cancels iterators, disconnects every node, and
    /// returns to Idle.
    pub fn stop(&mut self) {
        self.teardown();
        self.session_id += 1;
        self.state = SchedulerState::Idle;
    }

    /// Drops a clip's decoded-audio cache entry, so the next activation
    /// that needs it re-decodes (a replaced or re-uploaded media asset).
    pub fn invalidate_media(&mut self, media_id: &MediaAssetId) {
        self.media_cache.remove(media_id);
        self.failed_media.remove(media_id);
    }

    async fn begin(
        &mut self,
        transitional: SchedulerState,
        scene: &Scene,
        one_shot_manager: &mut OneshotManager,
        sidechain_manager: &mut SidechainManager,
        provider: &dyn MediaProvider,
        at_time: f64,
    ) {
        self.teardown();
        self.session_id += 1;
        let session = self.session_id;
        self.state = transitional;

        let timeline_duration = scene.total_duration();
        one_shot_manager.prepare_for_playback(&scene.oneshot_markers, &scene.oneshot_definitions);
        sidechain_manager
            .prepare_for_playback(scene, one_shot_manager, provider, timeline_duration)
            .await;

        if session != self.session_id {
            // Superseded by a newer stop/seek/restart while awaiting.
            return;
        }
        self.playback_start_time = at_time;
        self.playback_start_context_time = self.graph.now();
        self.state = SchedulerState::Running;
    }

    fn teardown(&mut self) {
        for (_, clip) in self.active_clips.drain() {
            for node in clip.nodes {
                node.stop();
            }
        }
        for (_, voice) in self.oneshot_voices.drain() {
            voice.node.stop();
        }
        self.scheduled_oneshots.clear();
    }

    /// The look-ahead loop (§4.6): activates clips and one-shot markers
    /// entering `[now, now + lookAheadWindow]`, and produces the next
    /// chunk(s) for every already-active clip up to the backpressure bound.
    pub async fn look_ahead_tick(
        &mut self,
        scene: &Scene,
        one_shot_manager: &mut OneshotManager,
        provider: &dyn MediaProvider,
    ) {
        if self.state != SchedulerState::Running {
            return;
        }
        let session = self.session_id;
        let now = self.current_playback_time();
        let window_end = now + self.config.look_ahead_window.as_secs_f64();
        let timeline_duration = scene.total_duration();

        for clip in collect_audio_clips(scene) {
            if self.active_clips.contains_key(&clip.element_id) {
                continue;
            }
            let effective_end = clip_effective_end(&clip, timeline_duration);
            if clip.start_time > window_end || effective_end < now {
                continue;
            }
            let Some(buffer) = self.buffer_for_media(&clip.media_id, scene, provider).await else {
                continue;
            };
            if session != self.session_id {
                return;
            }
            let gain_node = self.graph.create_gain_node(0.0);
            let cursor = clip.start_time.max(now);
            self.active_clips.insert(
                clip.element_id.clone(),
                ActiveClip {
                    clip,
                    buffer,
                    gain_node,
                    cursor,
                    nodes: Vec::new(),
                },
            );
        }

        let backpressure_bound = now + self.config.backpressure_bound.as_secs_f64();
        let schedule_horizon = window_end.min(backpressure_bound);
        let chunk_len = self.config.clip_chunk_duration.as_secs_f64();

        for active in self.active_clips.values_mut() {
            let effective_end = clip_effective_end(&active.clip, timeline_duration);
            loop {
                if active.cursor >= schedule_horizon || active.cursor >= effective_end {
                    break;
                }
                let boundary = next_loop_boundary(&active.clip, active.cursor);
                let window_end = (active.cursor + chunk_len)
                    .min(boundary)
                    .min(schedule_horizon)
                    .min(effective_end);
                if window_end <= active.cursor {
                    break;
                }
                if let Some(plan) = next_chunk_plan(&active.clip, active.cursor, window_end, active.buffer.sample_rate) {
                    let context_time =
                        self.playback_start_context_time + (plan.timeline_start - self.playback_start_time);
                    if let Some((frame_offset, frame_count, effective_context_time)) = resolve_schedule(
                        plan.source_frame_offset,
                        plan.frame_count,
                        context_time,
                        self.graph.now(),
                        active.buffer.sample_rate,
                    ) {
                        let node = self.graph.schedule_source(
                            active.buffer.clone(),
                            frame_offset,
                            frame_count,
                            effective_context_time,
                            &active.gain_node,
                        );
                        active.nodes.push(node);
                    }
                }
                active.cursor = window_end;
            }
        }

        // §4.6: query markers in (now, now+lookahead), then separately admit
        // any whose audioStartTime is within the small backward grace --
        // the grace narrows what the query itself already found, it does
        // not widen the query's own window (a wider `start` bound would let
        // the index's backward scan surface markers whose slice merely
        // happens to still be playing, far earlier than the grace allows).
        let backward_start = now - self.config.one_shot_backward_grace.as_secs_f64();
        let entries = one_shot_manager.markers_in_window(&scene.oneshot_markers, &scene.oneshot_definitions, now, window_end);
        for entry in entries {
            if entry.audio_start_time < backward_start {
                continue;
            }
            if self.scheduled_oneshots.contains(&entry.marker_id) {
                continue;
            }
            let Some(definition) = scene.oneshot_definition(&entry.definition_id) else {
                continue;
            };
            let Some(buffer) = one_shot_manager.buffer_for(definition, provider).await else {
                // A decode failure is permanent for this session: don't retry every tick.
                self.scheduled_oneshots.insert(entry.marker_id.clone());
                continue;
            };
            if session != self.session_id {
                return;
            }
            let Some(marker) = scene.oneshot_marker(&entry.marker_id) else {
                continue;
            };
            self.scheduled_oneshots.insert(entry.marker_id.clone());

            let sample_rate = buffer.sample_rate;
            let frame_offset = (definition.trim_start * sample_rate).round() as usize;
            let frame_count = (definition.slice_duration() * sample_rate).round() as usize;
            let context_time = self.playback_start_context_time + (entry.audio_start_time - self.playback_start_time);
            let Some((frame_offset, frame_count, effective_context_time)) =
                resolve_schedule(frame_offset, frame_count, context_time, self.graph.now(), sample_rate)
            else {
                continue;
            };
            let base_volume = marker.volume.unwrap_or(1.0);
            let gain_node = self.graph.create_gain_node(base_volume);
            let node = self
                .graph
                .schedule_source(buffer, frame_offset, frame_count, effective_context_time, &gain_node);
            self.oneshot_voices.insert(
                entry.marker_id.clone(),
                OneshotVoice {
                    definition_id: entry.definition_id,
                    base_volume,
                    gain_node,
                    node,
                },
            );
        }
    }

    /// The gain tick (§4.6): writes every active clip's and live one-shot
    /// voice's combined automation/sidechain gain.
    pub fn gain_tick(&mut self, scene: &Scene, sidechain_manager: &SidechainManager) {
        if self.state != SchedulerState::Running {
            return;
        }
        let now = self.current_playback_time();
        for active in self.active_clips.values() {
            let base = active.clip.base_volume * 100.0;
            let automated = effective_volume(
                &scene.automation_states,
                &scene.automation_markers,
                &active.clip.track_id,
                &active.clip.element_id,
                now,
                base,
            ) / 100.0;
            let duck = sidechain_manager.gain_for_track(&active.clip.track_id, now);
            active.gain_node.set_gain(automated * duck);
        }
        for voice in self.oneshot_voices.values() {
            let duck = sidechain_manager.gain_for_oneshot(&voice.definition_id, now);
            voice.gain_node.set_gain(voice.base_volume * duck);
        }
    }

    async fn buffer_for_media(
        &mut self,
        media_id: &MediaAssetId,
        scene: &Scene,
        provider: &dyn MediaProvider,
    ) -> Option<Arc<PcmBuffer>> {
        if let Some(buffer) = self.media_cache.get(media_id) {
            return Some(buffer.clone());
        }
        if self.failed_media.contains(media_id) {
            return None;
        }
        let Some(asset) = scene.media_asset(media_id) else {
            return None;
        };
        let handle = match provider.resolve_blob_handle(asset).await {
            Ok(handle) => handle,
            Err(error) => {
                tracing_warn!(media_id = %media_id, kind = %asset.kind, %error, "blob handle resolution failed");
                self.failed_media.insert(media_id.clone());
                return None;
            }
        };
        match provider.decode_pcm(&handle).await {
            Ok(pcm) => {
                let buffer = Arc::new(pcm);
                self.media_cache.insert(media_id.clone(), buffer.clone());
                Some(buffer)
            }
            Err(error) => {
                tracing_warn!(media_id = %media_id, kind = %asset.kind, %error, "clip audio decode failed");
                self.failed_media.insert(media_id.clone());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvelopeConfig;
    use crate::error::{EngineError, EngineResult};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use timeline_audio_api::{
        AudioElementData, Element, ElementKind, MediaAsset, OneshotAudioSource, OneshotDefinition, OneshotMarker,
        Timestamps, Track, TrackKind,
    };

    struct FakeGainNode {
        value: Mutex<f64>,
    }

    impl GainNode for FakeGainNode {
        fn set_gain(&self, value: f64) {
            *self.value.lock().unwrap() = value;
        }
        fn gain(&self) -> f64 {
            *self.value.lock().unwrap()
        }
    }

    struct FakeSourceNode {
        stopped: Arc<AtomicBool>,
    }

    impl SourceNode for FakeSourceNode {
        fn stop(&self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Clone, Debug)]
    struct ScheduledCall {
        frame_offset: usize,
        frame_count: usize,
        context_time: f64,
    }

    struct FakeGraph {
        now: Mutex<f64>,
        calls: Mutex<Vec<ScheduledCall>>,
    }

    impl FakeGraph {
        fn new(now: f64) -> Self {
            Self {
                now: Mutex::new(now),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl AudioGraph for FakeGraph {
        fn now(&self) -> f64 {
            *self.now.lock().unwrap()
        }

        fn create_gain_node(&self, initial_gain: f64) -> Arc<dyn GainNode> {
            Arc::new(FakeGainNode {
                value: Mutex::new(initial_gain),
            })
        }

        fn schedule_source(
            &self,
            _chunk: Arc<PcmBuffer>,
            frame_offset: usize,
            frame_count: usize,
            context_time: f64,
            _gain_node: &Arc<dyn GainNode>,
        ) -> Box<dyn SourceNode> {
            self.calls.lock().unwrap().push(ScheduledCall {
                frame_offset,
                frame_count,
                context_time,
            });
            Box::new(FakeSourceNode {
                stopped: Arc::new(AtomicBool::new(false)),
            })
        }
    }

    struct FakeProvider {
        sample_rate: f64,
    }

    #[async_trait]
    impl MediaProvider for FakeProvider {
        async fn resolve_blob_handle(&self, asset: &MediaAsset) -> EngineResult<String> {
            Ok(asset.source.0.clone())
        }

        async fn decode_pcm(&self, _url: &str) -> EngineResult<PcmBuffer> {
            Ok(PcmBuffer::from_planar(vec![0.0; 200], 1, self.sample_rate))
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl MediaProvider for FailingProvider {
        async fn resolve_blob_handle(&self, asset: &MediaAsset) -> EngineResult<String> {
            Ok(asset.source.0.clone())
        }

        async fn decode_pcm(&self, _url: &str) -> EngineResult<PcmBuffer> {
            Err(EngineError::DecodeFailure {
                source_key: "x".to_string(),
                reason: "boom".to_string(),
            })
        }
    }

    fn clip(start_time: f64, duration: f64, trim_start: f64, trim_end: f64, looped: bool) -> AudioClip {
        AudioClip {
            element_id: ElementId::from("e1"),
            track_id: TrackId::from("t1"),
            media_id: MediaAssetId::from("m1"),
            start_time,
            duration,
            trim_start,
            trim_end,
            base_volume: 1.0,
            looped,
        }
    }

    /// Scenario S3: a 2 s slice looping across a 10 s timeline stops
    /// exactly at the timeline end, independent of its own box duration.
    #[test]
    fn effective_end_of_a_looped_clip_is_the_full_timeline_duration() {
        let looped = clip(0.0, 10.0, 0.0, 2.0, true);
        assert_eq!(clip_effective_end(&looped, 10.0), 10.0);

        let one_shot_clip = clip(0.0, 10.0, 0.0, 2.0, false);
        assert_eq!(clip_effective_end(&one_shot_clip, 10.0), 10.0);
    }

    /// Scenario S3: five successive 2 s iterations across a 10 s timeline.
    #[test]
    fn looped_clip_wraps_through_five_iterations() {
        let looped = clip(0.0, 10.0, 0.0, 2.0, true);
        let boundaries: Vec<f64> = std::iter::successors(Some(0.0_f64), |cursor| {
            let next = next_loop_boundary(&looped, *cursor);
            (next < 10.0).then_some(next)
        })
        .skip(1)
        .collect();
        assert_eq!(boundaries, vec![2.0, 4.0, 6.0, 8.0]);
        assert_eq!(next_loop_boundary(&looped, 8.0), 10.0);

        for t in [0.0, 2.5, 4.9, 7.1, 9.99] {
            let pos = loop_position(&looped, t);
            assert!((0.0..2.0).contains(&pos), "t={t} mapped out of slice: {pos}");
        }
    }

    #[test]
    fn next_chunk_plan_is_none_for_an_empty_window() {
        let c = clip(0.0, 1.0, 0.0, 1.0, false);
        assert!(next_chunk_plan(&c, 1.0, 1.0, 48_000.0).is_none());
    }

    #[test]
    fn collect_audio_clips_skips_hidden_tracks_and_elements() {
        let mut scene = Scene::new();
        scene.tracks.push(Track {
            id: TrackId::from("hidden-track"),
            kind: TrackKind::Audio,
            name: "hidden".to_string(),
            hidden: true,
            elements: vec![audio_element("e1", "m1", false)],
            main: false,
        });
        scene.tracks.push(Track {
            id: TrackId::from("visible-track"),
            kind: TrackKind::Audio,
            name: "visible".to_string(),
            hidden: false,
            elements: vec![audio_element("e2", "m1", true), audio_element("e3", "m1", false)],
            main: false,
        });
        let clips = collect_audio_clips(&scene);
        assert_eq!(clips.len(), 1);
        assert_eq!(clips[0].element_id, ElementId::from("e3"));
    }

    fn audio_element(id: &str, media_id: &str, hidden: bool) -> Element {
        Element {
            id: ElementId::from(id),
            start_time: 0.0,
            duration: 1.0,
            trim_start: 0.0,
            trim_end: 1.0,
            hidden,
            kind: ElementKind::Audio(AudioElementData {
                media_id: MediaAssetId::from(media_id),
                base_volume: 1.0,
                looped: false,
            }),
        }
    }

    fn definition() -> OneshotDefinition {
        OneshotDefinition {
            id: OneshotDefinitionId::from("d1"),
            name: "d1".to_string(),
            color: "#ffffff".to_string(),
            audio_source: OneshotAudioSource::LibrarySound {
                url: "lib://d1".to_string(),
                id: "d1".to_string(),
            },
            trim_start: 0.1,
            trim_end: 0.5,
            cue_point: 0.3,
            audio_duration: 0.5,
            timestamps: Timestamps::now(),
        }
    }

    /// Scenario S1: definition trim=[0.1, 0.5], cue=0.3, marker at t=2.0,
    /// transport playing from t=1.0 ⇒ one source node, offset 0.1 s into
    /// the slice, length 0.4 s, starting at contextTime anchor+0.8.
    #[tokio::test]
    async fn look_ahead_tick_schedules_a_one_shot_matching_scenario_s1() {
        let mut scene = Scene::new();
        scene.oneshot_definitions.push(definition());
        scene.oneshot_markers.push(OneshotMarker {
            id: OneshotMarkerId::from("marker1"),
            oneshot_id: OneshotDefinitionId::from("d1"),
            time: 2.0,
            volume: None,
            created_at: Utc::now().naive_utc(),
        });

        let graph = Arc::new(FakeGraph::new(1.0));
        let mut scheduler = PlaybackScheduler::new(SchedulerConfig::default(), graph.clone());
        let mut one_shots = OneshotManager::new();
        let mut sidechain = SidechainManager::new(EnvelopeConfig::default());
        let provider = FakeProvider { sample_rate: 10.0 };

        scheduler.play(&scene, &mut one_shots, &mut sidechain, &provider, 1.0).await;
        scheduler.look_ahead_tick(&scene, &mut one_shots, &provider).await;

        let calls = graph.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].frame_offset, 1);
        assert_eq!(calls[0].frame_count, 4);
        assert!((calls[0].context_time - 1.8).abs() < 1e-9);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn a_one_shot_whose_decode_fails_is_skipped_and_not_retried() {
        let mut scene = Scene::new();
        scene.oneshot_definitions.push(definition());
        scene.oneshot_markers.push(OneshotMarker {
            id: OneshotMarkerId::from("marker1"),
            oneshot_id: OneshotDefinitionId::from("d1"),
            time: 2.0,
            volume: None,
            created_at: Utc::now().naive_utc(),
        });

        let graph = Arc::new(FakeGraph::new(1.0));
        let mut scheduler = PlaybackScheduler::new(SchedulerConfig::default(), graph.clone());
        let mut one_shots = OneshotManager::new();
        let mut sidechain = SidechainManager::new(EnvelopeConfig::default());
        let provider = FailingProvider;

        scheduler.play(&scene, &mut one_shots, &mut sidechain, &provider, 1.0).await;
        scheduler.look_ahead_tick(&scene, &mut one_shots, &provider).await;
        scheduler.look_ahead_tick(&scene, &mut one_shots, &provider).await;

        assert!(graph.calls.lock().unwrap().is_empty());
        assert!(logs_contain("one-shot audio decode failed"));
    }

    /// §4.6: the backward grace narrows which already-found markers get
    /// admitted; it must never widen the window query itself. A one-shot
    /// whose slice is merely still "playing" from long before `now` (its
    /// `audioStartTime` far earlier than `now - grace`) must not be
    /// scheduled, even though its `audioEndTime` still lies past `now`.
    #[tokio::test]
    async fn a_one_shot_long_past_the_backward_grace_is_not_scheduled() {
        let mut scene = Scene::new();
        scene.oneshot_definitions.push(OneshotDefinition {
            id: OneshotDefinitionId::from("d1"),
            name: "d1".to_string(),
            color: "#ffffff".to_string(),
            audio_source: OneshotAudioSource::LibrarySound {
                url: "lib://d1".to_string(),
                id: "d1".to_string(),
            },
            trim_start: 0.0,
            trim_end: 20.0,
            cue_point: 0.0,
            audio_duration: 20.0,
            timestamps: Timestamps::now(),
        });
        // audioStartTime = -18.5, audioEndTime = 1.5: the slice is still
        // "sounding" past now=1.0, but it started far earlier than the
        // 0.1s backward grace allows.
        scene.oneshot_markers.push(OneshotMarker {
            id: OneshotMarkerId::from("marker1"),
            oneshot_id: OneshotDefinitionId::from("d1"),
            time: -18.5,
            volume: None,
            created_at: Utc::now().naive_utc(),
        });

        let graph = Arc::new(FakeGraph::new(1.0));
        let mut scheduler = PlaybackScheduler::new(SchedulerConfig::default(), graph.clone());
        let mut one_shots = OneshotManager::new();
        let mut sidechain = SidechainManager::new(EnvelopeConfig::default());
        let provider = FakeProvider { sample_rate: 10.0 };

        scheduler.play(&scene, &mut one_shots, &mut sidechain, &provider, 1.0).await;
        scheduler.look_ahead_tick(&scene, &mut one_shots, &provider).await;

        assert!(graph.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stop_disconnects_every_node_and_increments_the_session() {
        let mut scene = Scene::new();
        scene.oneshot_definitions.push(definition());
        scene.oneshot_markers.push(OneshotMarker {
            id: OneshotMarkerId::from("marker1"),
            oneshot_id: OneshotDefinitionId::from("d1"),
            time: 0.0,
            volume: None,
            created_at: Utc::now().naive_utc(),
        });

        let graph = Arc::new(FakeGraph::new(0.0));
        let mut scheduler = PlaybackScheduler::new(SchedulerConfig::default(), graph.clone());
        let mut one_shots = OneshotManager::new();
        let mut sidechain = SidechainManager::new(EnvelopeConfig::default());
        let provider = FakeProvider { sample_rate: 10.0 };

        scheduler.play(&scene, &mut one_shots, &mut sidechain, &provider, 0.0).await;
        let session_after_play = scheduler.session_id();
        scheduler.look_ahead_tick(&scene, &mut one_shots, &provider).await;
        assert_eq!(graph.calls.lock().unwrap().len(), 1);

        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(scheduler.session_id() > session_after_play);
    }

    #[test]
    fn gain_tick_is_a_no_op_when_not_running() {
        let graph = Arc::new(FakeGraph::new(0.0));
        let mut scheduler = PlaybackScheduler::new(SchedulerConfig::default(), graph);
        let scene = Scene::new();
        let sidechain = SidechainManager::new(EnvelopeConfig::default());
        // Should not panic even though nothing was ever activated.
        scheduler.gain_tick(&scene, &sidechain);
    }
}
