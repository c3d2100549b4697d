//! One-shot definitions, markers, and their derived timing (§4.3).

use crate::buffer::PcmBuffer;
use crate::external::MediaProvider;
use std::sync::Arc;
use timeline_audio_api::{
    audio_end_time, audio_start_time, OneshotAudioSource, OneshotDefinition, OneshotDefinitionId,
    OneshotMarker, OneshotMarkerId,
};
use timeline_audio_base::hash_util::NonCryptoHashMap;
use timeline_audio_base::tracing_warn;

#[derive(Clone, Debug, PartialEq)]
pub struct OneshotWindowEntry {
    pub marker_id: OneshotMarkerId,
    pub definition_id: OneshotDefinitionId,
    pub audio_start_time: f64,
    pub audio_end_time: f64,
}

/// Cold window query (§4.3): O(N·D) scan, valid before [`OneshotIndex`] is
/// built and always set-equal to the hot query's result (property 6).
pub fn markers_in_window_cold(
    markers: &[OneshotMarker],
    definitions: &[OneshotDefinition],
    start: f64,
    end: f64,
) -> Vec<OneshotWindowEntry> {
    markers
        .iter()
        .filter_map(|m| {
            let def = definitions.iter().find(|d| d.id == m.oneshot_id)?;
            let entry_start = audio_start_time(m, def);
            let entry_end = audio_end_time(m, def);
            (entry_start <= end && entry_end >= start).then(|| OneshotWindowEntry {
                marker_id: m.id.clone(),
                definition_id: def.id.clone(),
                audio_start_time: entry_start,
                audio_end_time: entry_end,
            })
        })
        .collect()
}

/// The hot-path index built by `prepareForPlayback`: entries sorted by
/// `audio_start_time` plus a pre-resolved definition map, giving the window
/// query O(log N + k) via a binary search plus bounded backward/forward
/// scans (§4.3).
pub struct OneshotIndex {
    entries: Vec<OneshotWindowEntry>,
    definitions: NonCryptoHashMap<OneshotDefinitionId, OneshotDefinition>,
}

impl OneshotIndex {
    pub fn build(markers: &[OneshotMarker], definitions: &[OneshotDefinition]) -> Self {
        let definitions: NonCryptoHashMap<_, _> = definitions
            .iter()
            .cloned()
            .map(|d| (d.id.clone(), d))
            .collect();
        let mut entries: Vec<OneshotWindowEntry> = markers
            .iter()
            .filter_map(|m| {
                let def = definitions.get(&m.oneshot_id)?;
                Some(OneshotWindowEntry {
                    marker_id: m.id.clone(),
                    definition_id: def.id.clone(),
                    audio_start_time: audio_start_time(m, def),
                    audio_end_time: audio_end_time(m, def),
                })
            })
            .collect();
        entries.sort_by(|a, b| a.audio_start_time.partial_cmp(&b.audio_start_time).unwrap());
        Self { entries, definitions }
    }

    pub fn definition(&self, id: &OneshotDefinitionId) -> Option<&OneshotDefinition> {
        self.definitions.get(id)
    }

    /// Lower-bound binary search on `audio_start_time >= start`, then a
    /// backward scan while the preceding entry's `audio_end_time > start`
    /// (catching still-playing earlier onsets), then a forward scan until
    /// `audio_start_time >= end`.
    pub fn query(&self, start: f64, end: f64) -> Vec<OneshotWindowEntry> {
        if self.entries.is_empty() {
            return Vec::new();
        }
        let lower_bound = self.entries.partition_point(|e| e.audio_start_time < start);

        let mut backward = Vec::new();
        let mut cursor = lower_bound;
        while cursor > 0 {
            let candidate = &self.entries[cursor - 1];
            if candidate.audio_end_time > start {
                backward.push(candidate.clone());
                cursor -= 1;
            } else {
                break;
            }
        }
        backward.reverse();

        let mut forward = Vec::new();
        let mut cursor = lower_bound;
        while cursor < self.entries.len() && self.entries[cursor].audio_start_time < end {
            if self.entries[cursor].audio_end_time > start {
                forward.push(self.entries[cursor].clone());
            }
            cursor += 1;
        }

        backward.into_iter().chain(forward).collect()
    }
}

/// Owns the decoded-audio cache and (once playback starts) the hot lookup
/// index for one-shot definitions/markers.
#[derive(Default)]
pub struct OneshotManager {
    buffer_cache: NonCryptoHashMap<OneshotDefinitionId, Arc<PcmBuffer>>,
    index: Option<OneshotIndex>,
}

impl OneshotManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prepare_for_playback(&mut self, markers: &[OneshotMarker], definitions: &[OneshotDefinition]) {
        self.index = Some(OneshotIndex::build(markers, definitions));
    }

    /// Uses the hot index when available, falling back to the cold scan.
    pub fn markers_in_window(
        &self,
        markers: &[OneshotMarker],
        definitions: &[OneshotDefinition],
        start: f64,
        end: f64,
    ) -> Vec<OneshotWindowEntry> {
        match &self.index {
            Some(index) => index.query(start, end),
            None => markers_in_window_cold(markers, definitions, start, end),
        }
    }

    /// Lazily decodes and caches a definition's audio, keyed by
    /// `definitionId` (§4.3). Decode failures yield `None` without throwing.
    pub async fn buffer_for(
        &mut self,
        definition: &OneshotDefinition,
        provider: &dyn MediaProvider,
    ) -> Option<Arc<PcmBuffer>> {
        if let Some(buffer) = self.buffer_cache.get(&definition.id) {
            return Some(buffer.clone());
        }
        let url = match &definition.audio_source {
            OneshotAudioSource::LibrarySound { url, .. } => url.as_str(),
            OneshotAudioSource::UserUpload { url, .. } => url.as_str(),
        };
        match provider.decode_pcm(url).await {
            Ok(buffer) => {
                let buffer = Arc::new(buffer);
                self.buffer_cache.insert(definition.id.clone(), buffer.clone());
                Some(buffer)
            }
            Err(error) => {
                tracing_warn!(definition_id = %definition.id, %error, "one-shot audio decode failed");
                None
            }
        }
    }

    pub fn invalidate_definition(&mut self, id: &OneshotDefinitionId) {
        self.buffer_cache.remove(id);
    }

    pub fn clear_cache(&mut self) {
        self.buffer_cache.clear();
        self.index = None;
    }
}
