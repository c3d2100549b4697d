use crate::error::ModelError;
use crate::ids::TrackId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackRemapBehavior {
    Stretch,
    PitchPreserve,
    Loop,
    Fixed,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarkerRemapBehavior {
    Stretch,
    Original,
}

/// Configuration for an offline time-remapped mixdown export (§4.7).
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct TimeRemapConfig {
    /// `0.5` doubles duration, `2.0` halves it. A value `<= 0` means
    /// identity (no remap).
    pub time_scale: f64,
    #[serde(default)]
    pub track_behaviors: BTreeMap<TrackId, TrackRemapBehavior>,
    #[serde(default = "default_marker_behavior")]
    pub marker_trigger_behavior: MarkerRemapBehavior,
    #[serde(default = "default_marker_behavior")]
    pub marker_playback_behavior: MarkerRemapBehavior,
}

fn default_marker_behavior() -> MarkerRemapBehavior {
    MarkerRemapBehavior::Stretch
}

impl TimeRemapConfig {
    /// `timeScale <= 0` is rejected at the command boundary (§7); offline
    /// mixdown itself treats it as identity defensively (§4.7).
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.time_scale <= 0.0 {
            return Err(ModelError::MustBePositive {
                field: "timeScale",
                value: self.time_scale,
            });
        }
        Ok(())
    }

    pub fn behavior_for(&self, track_id: &TrackId) -> TrackRemapBehavior {
        self.track_behaviors
            .get(track_id)
            .copied()
            .unwrap_or(TrackRemapBehavior::Stretch)
    }
}
