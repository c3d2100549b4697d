use crate::automation::{AutomationMarker, AutomationState};
use crate::error::ModelError;
use crate::ids::{
    AutomationMarkerId, AutomationStateId, ElementId, MediaAssetId, OneshotDefinitionId,
    OneshotMarkerId, SceneId, SidechainConfigId, TrackId,
};
use crate::media::MediaAsset;
use crate::oneshot::{OneshotDefinition, OneshotMarker};
use crate::sidechain::SidechainConfig;
use crate::track::Track;
use serde::{Deserialize, Serialize};

/// The aggregate root: everything needed to reconstruct an edit session.
///
/// Every field is present field-by-field on save and restored on load (§6);
/// a field missing from persisted JSON defaults to an empty collection via
/// `#[serde(default)]` rather than failing to load.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub media_assets: Vec<MediaAsset>,
    #[serde(default)]
    pub oneshot_definitions: Vec<OneshotDefinition>,
    #[serde(default)]
    pub oneshot_markers: Vec<OneshotMarker>,
    #[serde(default)]
    pub automation_states: Vec<AutomationState>,
    #[serde(default)]
    pub automation_markers: Vec<AutomationMarker>,
    #[serde(default)]
    pub sidechain_configs: Vec<SidechainConfig>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            id: SceneId::new(),
            ..Default::default()
        }
    }

    pub fn track(&self, id: &TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| &t.id == id)
    }

    pub fn track_mut(&mut self, id: &TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| &t.id == id)
    }

    pub fn element(&self, track_id: &TrackId, element_id: &ElementId) -> Option<&crate::element::Element> {
        self.track(track_id)?.element(element_id)
    }

    pub fn media_asset(&self, id: &MediaAssetId) -> Option<&MediaAsset> {
        self.media_assets.iter().find(|a| &a.id == id)
    }

    pub fn oneshot_definition(&self, id: &OneshotDefinitionId) -> Option<&OneshotDefinition> {
        self.oneshot_definitions.iter().find(|d| &d.id == id)
    }

    pub fn oneshot_marker(&self, id: &OneshotMarkerId) -> Option<&OneshotMarker> {
        self.oneshot_markers.iter().find(|m| &m.id == id)
    }

    pub fn automation_state(&self, id: &AutomationStateId) -> Option<&AutomationState> {
        self.automation_states.iter().find(|s| &s.id == id)
    }

    pub fn automation_marker(&self, id: &AutomationMarkerId) -> Option<&AutomationMarker> {
        self.automation_markers.iter().find(|m| &m.id == id)
    }

    pub fn sidechain_config(&self, id: &SidechainConfigId) -> Option<&SidechainConfig> {
        self.sidechain_configs.iter().find(|c| &c.id == id)
    }

    /// Total timeline duration: the furthest-reaching element end time
    /// across every track, `0.0` if there are none. Drives the envelope
    /// engine's composed-buffer length and the scheduler's loop-clip
    /// effective end.
    pub fn total_duration(&self) -> f64 {
        self.tracks
            .iter()
            .flat_map(|t| t.elements.iter())
            .map(|e| e.end_time())
            .fold(0.0, f64::max)
    }

    /// Validates every structural invariant in §3 that doesn't require
    /// reaching into the Media Provider (trim-vs-source-duration is
    /// validated separately by the command layer, which has that access).
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.tracks.iter().filter(|t| t.main).count() > 1 {
            return Err(ModelError::DuplicateElementId(
                "more than one track flagged as main".to_string(),
            ));
        }
        for track in &self.tracks {
            track.validate()?;
        }
        for def in &self.oneshot_definitions {
            def.validate()?;
        }
        for config in &self.sidechain_configs {
            config.validate()?;
        }
        Ok(())
    }
}
