use crate::error::ModelError;
use crate::ids::{MediaAssetId, OneshotDefinitionId, OneshotMarkerId};
use crate::timestamps::Timestamps;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum OneshotAudioSource {
    #[serde(rename = "library-sound")]
    LibrarySound { url: String, id: String },
    #[serde(rename = "user-upload")]
    UserUpload {
        asset_id: MediaAssetId,
        url: String,
    },
}

/// A reusable triggered-sample definition. `cue_point` is the position
/// within `[trim_start, trim_end]` that aligns with a marker's timeline
/// time — see [`audio_start_time`]/[`audio_end_time`].
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct OneshotDefinition {
    pub id: OneshotDefinitionId,
    pub name: String,
    pub color: String,
    pub audio_source: OneshotAudioSource,
    pub trim_start: f64,
    pub trim_end: f64,
    pub cue_point: f64,
    pub audio_duration: f64,
    pub timestamps: Timestamps,
}

impl OneshotDefinition {
    pub fn slice_duration(&self) -> f64 {
        self.trim_end - self.trim_start
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.trim_start < 0.0 || self.trim_start > self.trim_end {
            return Err(ModelError::TrimOutOfOrder {
                trim_start: self.trim_start,
                trim_end: self.trim_end,
            });
        }
        if self.cue_point < self.trim_start || self.cue_point > self.trim_end {
            return Err(ModelError::CuePointOutOfRange {
                cue_point: self.cue_point,
                trim_start: self.trim_start,
                trim_end: self.trim_end,
            });
        }
        Ok(())
    }
}

/// A timeline-anchored trigger of a one-shot definition: `time` is where the
/// definition's `cue_point` lands on the timeline.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct OneshotMarker {
    pub id: OneshotMarkerId,
    pub oneshot_id: OneshotDefinitionId,
    pub time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    pub created_at: NaiveDateTime,
}

/// `audioStartTime = time - (cuePoint - trimStart)` (§3, §8 invariant 1).
pub fn audio_start_time(marker: &OneshotMarker, def: &OneshotDefinition) -> f64 {
    marker.time - (def.cue_point - def.trim_start)
}

/// `audioEndTime = audioStartTime + (trimEnd - trimStart)`.
pub fn audio_end_time(marker: &OneshotMarker, def: &OneshotDefinition) -> f64 {
    audio_start_time(marker, def) + def.slice_duration()
}
