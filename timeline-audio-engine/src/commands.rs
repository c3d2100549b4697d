//! The command pattern over the Scene aggregate (§4.8).
//!
//! Every mutation to a [`Scene`] goes through a [`Command`]: a value object
//! whose [`Command::apply`] either fully applies or fully rejects (§7
//! `InvariantViolation` — the command does not mutate the scene on
//! rejection). [`crate::scene_manager::SceneManager`] wraps `apply` with the
//! snapshot-based undo/redo described in §4.8 and §8 property 9; individual
//! commands stay unaware of undo, matching "Command: value object with
//! execute() and undo()" where the manager supplies the undo half generically
//! via whole-list snapshotting rather than each command inverting itself.

use crate::error::{EngineError, EngineResult};
use timeline_audio_api::{
    AutomationMarker, AutomationMarkerId, AutomationState, AutomationStateId, Element, ElementId,
    OneshotDefinition, OneshotDefinitionId, OneshotMarker, OneshotMarkerId, Scene, SidechainConfig,
    SidechainConfigId, Track, TrackId,
};
use timeline_audio_base::tracing_debug;

/// A single atomic mutation of a [`Scene`]. Implementors validate fully
/// before mutating anything, so a `Result::Err` leaves `scene` untouched.
pub trait Command: std::fmt::Debug + Send + Sync {
    /// A short human-readable label, surfaced in undo/redo history UIs.
    fn label(&self) -> String;

    fn apply(&self, scene: &mut Scene) -> EngineResult<()>;
}

fn not_found(what: &str, id: impl std::fmt::Display) -> EngineError {
    EngineError::NotFound(format!("{what} {id} not found"))
}

#[derive(Debug, Clone)]
pub struct AddTrack {
    pub track: Track,
}

impl Command for AddTrack {
    fn label(&self) -> String {
        format!("Add track {}", self.track.name)
    }

    fn apply(&self, scene: &mut Scene) -> EngineResult<()> {
        self.track.validate()?;
        if scene.track(&self.track.id).is_some() {
            return Err(EngineError::InvariantViolation(format!(
                "track {} already exists",
                self.track.id
            )));
        }
        if self.track.main && scene.tracks.iter().any(|t| t.main) {
            return Err(EngineError::InvariantViolation(
                "scene already has a main track".to_string(),
            ));
        }
        tracing_debug!(track_id = %self.track.id, kind = %self.track.kind, "adding track");
        scene.tracks.push(self.track.clone());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RemoveTrack {
    pub track_id: TrackId,
}

impl Command for RemoveTrack {
    fn label(&self) -> String {
        format!("Remove track {}", self.track_id)
    }

    fn apply(&self, scene: &mut Scene) -> EngineResult<()> {
        let before = scene.tracks.len();
        scene.tracks.retain(|t| t.id != self.track_id);
        if scene.tracks.len() == before {
            return Err(not_found("track", &self.track_id));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AddElement {
    pub track_id: TrackId,
    pub element: Element,
}

impl Command for AddElement {
    fn label(&self) -> String {
        format!("Add element {} to track {}", self.element.id, self.track_id)
    }

    fn apply(&self, scene: &mut Scene) -> EngineResult<()> {
        self.element.validate()?;
        let track = scene
            .track_mut(&self.track_id)
            .ok_or_else(|| not_found("track", &self.track_id))?;
        if track.element(&self.element.id).is_some() {
            return Err(EngineError::InvariantViolation(format!(
                "element id {} already used on track {}",
                self.element.id, self.track_id
            )));
        }
        track.elements.push(self.element.clone());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RemoveElement {
    pub track_id: TrackId,
    pub element_id: ElementId,
}

impl Command for RemoveElement {
    fn label(&self) -> String {
        format!("Remove element {}", self.element_id)
    }

    fn apply(&self, scene: &mut Scene) -> EngineResult<()> {
        let track = scene
            .track_mut(&self.track_id)
            .ok_or_else(|| not_found("track", &self.track_id))?;
        let before = track.elements.len();
        track.elements.retain(|e| e.id != self.element_id);
        if track.elements.len() == before {
            return Err(not_found("element", &self.element_id));
        }
        Ok(())
    }
}

/// Replaces an element's trim window (e.g. dragging a clip's trim handles).
/// Re-validates the element as a whole, not just the changed fields, since
/// trim/duration invariants are checked together (§3).
#[derive(Debug, Clone)]
pub struct UpdateElementTrim {
    pub track_id: TrackId,
    pub element_id: ElementId,
    pub trim_start: f64,
    pub trim_end: f64,
}

impl Command for UpdateElementTrim {
    fn label(&self) -> String {
        format!("Trim element {}", self.element_id)
    }

    fn apply(&self, scene: &mut Scene) -> EngineResult<()> {
        let track = scene
            .track_mut(&self.track_id)
            .ok_or_else(|| not_found("track", &self.track_id))?;
        let element = track
            .element_mut(&self.element_id)
            .ok_or_else(|| not_found("element", &self.element_id))?;
        let mut candidate = element.clone();
        candidate.trim_start = self.trim_start;
        candidate.trim_end = self.trim_end;
        candidate.validate()?;
        *element = candidate;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct UpsertOneshotDefinition {
    pub definition: OneshotDefinition,
}

impl Command for UpsertOneshotDefinition {
    fn label(&self) -> String {
        format!("Update one-shot {}", self.definition.name)
    }

    fn apply(&self, scene: &mut Scene) -> EngineResult<()> {
        self.definition.validate()?;
        match scene
            .oneshot_definitions
            .iter_mut()
            .find(|d| d.id == self.definition.id)
        {
            Some(existing) => *existing = self.definition.clone(),
            None => scene.oneshot_definitions.push(self.definition.clone()),
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RemoveOneshotDefinition {
    pub definition_id: OneshotDefinitionId,
}

impl Command for RemoveOneshotDefinition {
    fn label(&self) -> String {
        format!("Remove one-shot {}", self.definition_id)
    }

    fn apply(&self, scene: &mut Scene) -> EngineResult<()> {
        let before = scene.oneshot_definitions.len();
        scene.oneshot_definitions.retain(|d| d.id != self.definition_id);
        if scene.oneshot_definitions.len() == before {
            return Err(not_found("one-shot definition", &self.definition_id));
        }
        // Markers pointing at a deleted definition are orphaned; drop them
        // too rather than leave dangling references the managers would
        // have to special-case on every lookup.
        scene
            .oneshot_markers
            .retain(|m| m.oneshot_id != self.definition_id);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AddOneshotMarker {
    pub marker: OneshotMarker,
}

impl Command for AddOneshotMarker {
    fn label(&self) -> String {
        format!("Place one-shot marker at {:.3}s", self.marker.time)
    }

    fn apply(&self, scene: &mut Scene) -> EngineResult<()> {
        if scene.oneshot_definition(&self.marker.oneshot_id).is_none() {
            return Err(not_found("one-shot definition", &self.marker.oneshot_id));
        }
        if let Some(volume) = self.marker.volume {
            if !(0.0..=1.0).contains(&volume) {
                return Err(EngineError::InvariantViolation(format!(
                    "marker volume {volume} out of range [0, 1]"
                )));
            }
        }
        scene.oneshot_markers.push(self.marker.clone());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RemoveOneshotMarker {
    pub marker_id: OneshotMarkerId,
}

impl Command for RemoveOneshotMarker {
    fn label(&self) -> String {
        format!("Remove one-shot marker {}", self.marker_id)
    }

    fn apply(&self, scene: &mut Scene) -> EngineResult<()> {
        let before = scene.oneshot_markers.len();
        scene.oneshot_markers.retain(|m| m.id != self.marker_id);
        if scene.oneshot_markers.len() == before {
            return Err(not_found("one-shot marker", &self.marker_id));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct UpsertAutomationState {
    pub state: AutomationState,
}

impl Command for UpsertAutomationState {
    fn label(&self) -> String {
        format!("Update automation state {}", self.state.name)
    }

    fn apply(&self, scene: &mut Scene) -> EngineResult<()> {
        for op in &self.state.operations {
            if !(0.0..=100.0).contains(&op.value) {
                return Err(EngineError::InvariantViolation(format!(
                    "automation value {} out of range [0, 100]",
                    op.value
                )));
            }
        }
        match scene.automation_states.iter_mut().find(|s| s.id == self.state.id) {
            Some(existing) => *existing = self.state.clone(),
            None => scene.automation_states.push(self.state.clone()),
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RemoveAutomationState {
    pub state_id: AutomationStateId,
}

impl Command for RemoveAutomationState {
    fn label(&self) -> String {
        format!("Remove automation state {}", self.state_id)
    }

    fn apply(&self, scene: &mut Scene) -> EngineResult<()> {
        let before = scene.automation_states.len();
        scene.automation_states.retain(|s| s.id != self.state_id);
        if scene.automation_states.len() == before {
            return Err(not_found("automation state", &self.state_id));
        }
        scene.automation_markers.retain(|m| m.state_id != self.state_id);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AddAutomationMarker {
    pub marker: AutomationMarker,
}

impl Command for AddAutomationMarker {
    fn label(&self) -> String {
        "Add automation marker".to_string()
    }

    fn apply(&self, scene: &mut Scene) -> EngineResult<()> {
        if scene.automation_state(&self.marker.state_id).is_none() {
            return Err(not_found("automation state", &self.marker.state_id));
        }
        scene.automation_markers.push(self.marker.clone());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RemoveAutomationMarker {
    pub marker_id: AutomationMarkerId,
}

impl Command for RemoveAutomationMarker {
    fn label(&self) -> String {
        format!("Remove automation marker {}", self.marker_id)
    }

    fn apply(&self, scene: &mut Scene) -> EngineResult<()> {
        let before = scene.automation_markers.len();
        scene.automation_markers.retain(|m| m.id != self.marker_id);
        if scene.automation_markers.len() == before {
            return Err(not_found("automation marker", &self.marker_id));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct UpsertSidechainConfig {
    pub config: SidechainConfig,
}

impl Command for UpsertSidechainConfig {
    fn label(&self) -> String {
        format!("Update sidechain config {}", self.config.name)
    }

    fn apply(&self, scene: &mut Scene) -> EngineResult<()> {
        self.config.validate()?;
        match scene.sidechain_configs.iter_mut().find(|c| c.id == self.config.id) {
            Some(existing) => *existing = self.config.clone(),
            None => scene.sidechain_configs.push(self.config.clone()),
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RemoveSidechainConfig {
    pub config_id: SidechainConfigId,
}

impl Command for RemoveSidechainConfig {
    fn label(&self) -> String {
        format!("Remove sidechain config {}", self.config_id)
    }

    fn apply(&self, scene: &mut Scene) -> EngineResult<()> {
        let before = scene.sidechain_configs.len();
        scene.sidechain_configs.retain(|c| c.id != self.config_id);
        if scene.sidechain_configs.len() == before {
            return Err(not_found("sidechain config", &self.config_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timeline_audio_api::{AudioElementData, ElementKind, MediaAssetId, SceneId, TrackKind};

    fn empty_scene() -> Scene {
        Scene {
            id: SceneId::new(),
            ..Default::default()
        }
    }

    fn audio_element(id: &str) -> Element {
        Element {
            id: ElementId::from(id),
            start_time: 0.0,
            duration: 1.0,
            trim_start: 0.0,
            trim_end: 1.0,
            hidden: false,
            kind: ElementKind::Audio(AudioElementData {
                media_id: MediaAssetId::new(),
                base_volume: 1.0,
                looped: false,
            }),
        }
    }

    #[test]
    fn add_track_then_add_element_succeeds() {
        let mut scene = empty_scene();
        let track_id = TrackId::from("t1");
        AddTrack {
            track: Track {
                id: track_id.clone(),
                kind: TrackKind::Audio,
                name: "Audio 1".to_string(),
                hidden: false,
                elements: vec![],
                main: false,
            },
        }
        .apply(&mut scene)
        .unwrap();

        AddElement {
            track_id: track_id.clone(),
            element: audio_element("e1"),
        }
        .apply(&mut scene)
        .unwrap();

        assert_eq!(scene.track(&track_id).unwrap().elements.len(), 1);
    }

    #[test]
    fn adding_element_to_missing_track_is_not_found() {
        let mut scene = empty_scene();
        let result = AddElement {
            track_id: TrackId::from("missing"),
            element: audio_element("e1"),
        }
        .apply(&mut scene);
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[test]
    fn invalid_trim_update_is_rejected_without_mutating_scene() {
        let mut scene = empty_scene();
        let track_id = TrackId::from("t1");
        AddTrack {
            track: Track {
                id: track_id.clone(),
                kind: TrackKind::Audio,
                name: "Audio 1".to_string(),
                hidden: false,
                elements: vec![audio_element("e1")],
                main: false,
            },
        }
        .apply(&mut scene)
        .unwrap();

        let original = scene.clone();
        let result = UpdateElementTrim {
            track_id,
            element_id: ElementId::from("e1"),
            trim_start: 0.8,
            trim_end: 0.2,
        }
        .apply(&mut scene);
        assert!(result.is_err());
        assert_eq!(scene, original);
    }

    #[test]
    fn removing_a_definition_orphans_its_markers() {
        let mut scene = empty_scene();
        let definition = OneshotDefinition {
            id: OneshotDefinitionId::from("d1"),
            name: "clap".to_string(),
            color: "#fff".to_string(),
            audio_source: timeline_audio_api::OneshotAudioSource::LibrarySound {
                url: "lib://clap".to_string(),
                id: "clap".to_string(),
            },
            trim_start: 0.0,
            trim_end: 1.0,
            cue_point: 0.5,
            audio_duration: 1.0,
            timestamps: timeline_audio_api::Timestamps::now(),
        };
        UpsertOneshotDefinition {
            definition: definition.clone(),
        }
        .apply(&mut scene)
        .unwrap();
        AddOneshotMarker {
            marker: OneshotMarker {
                id: OneshotMarkerId::from("m1"),
                oneshot_id: definition.id.clone(),
                time: 2.0,
                volume: None,
                created_at: chrono::Utc::now().naive_utc(),
            },
        }
        .apply(&mut scene)
        .unwrap();

        RemoveOneshotDefinition {
            definition_id: definition.id,
        }
        .apply(&mut scene)
        .unwrap();

        assert!(scene.oneshot_markers.is_empty());
    }
}
