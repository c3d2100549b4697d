//! Sidechain config CRUD surface, per-config envelope cache, target lookup
//! tables, and gain queries (§4.5).

use crate::buffer::mono_mix;
use crate::config::EnvelopeConfig;
use crate::dsp::Envelope;
use crate::envelope_engine::{compute_envelope as run_envelope_engine, EnvelopeSourceElement};
use crate::external::MediaProvider;
use timeline_audio_api::{
    audio_start_time, MediaAsset, OneshotDefinitionId, Scene, SidechainConfig, SidechainConfigId,
    SidechainSource, TrackId,
};
use timeline_audio_base::hash_util::NonCryptoHashMap;

/// Computes and caches per-config envelopes, and the `trackId`/
/// `definitionId` lookup tables built by [`SidechainManager::prepare_for_playback`].
#[derive(Default)]
pub struct SidechainManager {
    envelope_config: EnvelopeConfig,
    envelope_cache: NonCryptoHashMap<SidechainConfigId, Envelope>,
    by_track: NonCryptoHashMap<TrackId, Vec<Envelope>>,
    by_oneshot: NonCryptoHashMap<OneshotDefinitionId, Vec<Envelope>>,
}

impl SidechainManager {
    pub fn new(envelope_config: EnvelopeConfig) -> Self {
        Self {
            envelope_config,
            ..Default::default()
        }
    }

    /// Computes (or returns the cached) envelope for `config` against the
    /// live Scene and `timeline_duration`.
    pub async fn envelope_for_config(
        &mut self,
        config: &SidechainConfig,
        scene: &Scene,
        one_shot_manager: &mut crate::managers::oneshot_manager::OneshotManager,
        provider: &dyn MediaProvider,
        timeline_duration: f64,
    ) -> Envelope {
        if let Some(envelope) = self.envelope_cache.get(&config.id) {
            return envelope.clone();
        }
        let elements = resolve_source_elements(config, scene, one_shot_manager, provider).await;
        let envelope = run_envelope_engine(&elements, timeline_duration, &config.params, &self.envelope_config);
        self.envelope_cache.insert(config.id.clone(), envelope.clone());
        envelope
    }

    /// Builds the `trackId -> Vec<envelope>` / `definitionId -> Vec<envelope>`
    /// lookup tables from every enabled config (§4.5 "Playback lookup tables").
    pub async fn prepare_for_playback(
        &mut self,
        scene: &Scene,
        one_shot_manager: &mut crate::managers::oneshot_manager::OneshotManager,
        provider: &dyn MediaProvider,
        timeline_duration: f64,
    ) {
        self.by_track.clear();
        self.by_oneshot.clear();
        for config in scene.sidechain_configs.iter().filter(|c| c.enabled) {
            let envelope = self
                .envelope_for_config(config, scene, one_shot_manager, provider, timeline_duration)
                .await;
            for track_id in &config.target_track_ids {
                self.by_track.entry(track_id.clone()).or_default().push(envelope.clone());
            }
            for definition_id in &config.target_oneshot_definition_ids {
                self.by_oneshot
                    .entry(definition_id.clone())
                    .or_default()
                    .push(envelope.clone());
            }
        }
    }

    /// Multiplicatively combines every targeting config's envelope at `t`
    /// (duck stacking). A track with no targeting config is unaffected.
    pub fn gain_for_track(&self, track_id: &TrackId, t: f64) -> f64 {
        self.by_track
            .get(track_id)
            .map(|envelopes| envelopes.iter().map(|e| e.gain_at(t)).product())
            .unwrap_or(1.0)
    }

    pub fn gain_for_oneshot(&self, definition_id: &OneshotDefinitionId, t: f64) -> f64 {
        self.by_oneshot
            .get(definition_id)
            .map(|envelopes| envelopes.iter().map(|e| e.gain_at(t)).product())
            .unwrap_or(1.0)
    }

    /// Any change to a config's params, source, or the Scene's signal
    /// content invalidates the per-config cache (§4.5); the manager's
    /// subscriber to Scene change notifications calls this unconditionally
    /// rather than trying to classify which changes were "signal-affecting".
    pub fn invalidate_all(&mut self) {
        self.envelope_cache.clear();
        self.by_track.clear();
        self.by_oneshot.clear();
    }

    pub fn invalidate_config(&mut self, id: &SidechainConfigId) {
        self.envelope_cache.remove(id);
    }
}

async fn resolve_source_elements(
    config: &SidechainConfig,
    scene: &Scene,
    one_shot_manager: &mut crate::managers::oneshot_manager::OneshotManager,
    provider: &dyn MediaProvider,
) -> Vec<EnvelopeSourceElement> {
    match &config.source {
        SidechainSource::Track { track_id } => {
            let Some(track) = scene.track(track_id) else {
                return Vec::new();
            };
            let mut elements = Vec::new();
            for element in track.audio_elements() {
                let Some(data) = element.audio_data() else {
                    continue;
                };
                let Some(asset) = scene.media_asset(&data.media_id) else {
                    continue;
                };
                let Some(buffer) = decode_mono(asset, provider).await else {
                    continue;
                };
                elements.push(EnvelopeSourceElement {
                    buffer,
                    start_time: element.start_time,
                    trim_start: element.trim_start,
                    duration: element.duration,
                    looped: data.looped,
                });
            }
            elements
        }
        SidechainSource::Oneshot { definition_id } => {
            let Some(definition) = scene.oneshot_definition(definition_id) else {
                return Vec::new();
            };
            let Some(buffer) = one_shot_manager.buffer_for(definition, provider).await else {
                return Vec::new();
            };
            let mono = mono_mix(&buffer);
            scene
                .oneshot_markers
                .iter()
                .filter(|marker| &marker.oneshot_id == definition_id)
                .map(|marker| EnvelopeSourceElement {
                    buffer: mono.clone(),
                    start_time: audio_start_time(marker, definition),
                    trim_start: definition.trim_start,
                    duration: definition.slice_duration(),
                    looped: false,
                })
                .collect()
        }
    }
}

async fn decode_mono(asset: &MediaAsset, provider: &dyn MediaProvider) -> Option<crate::buffer::MonoBuffer> {
    let handle = provider.resolve_blob_handle(asset).await.ok()?;
    let pcm = provider.decode_pcm(&handle).await.ok()?;
    Some(mono_mix(&pcm))
}
