use crate::error::ModelError;
use crate::ids::{OneshotDefinitionId, SidechainConfigId, TrackId};
use crate::timestamps::Timestamps;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SidechainParams {
    /// dB, in `[-60, 0]`.
    pub threshold_db: f64,
    /// In `[1, 20]`.
    pub ratio: f64,
    /// Seconds, in `[0.001, 0.5]`.
    pub attack_s: f64,
    /// Seconds, in `[0.01, 2.0]`.
    pub release_s: f64,
    /// dB, in `[-60, 0]`; negative means max reduction.
    pub depth_db: f64,
}

impl Default for SidechainParams {
    fn default() -> Self {
        Self {
            threshold_db: -20.0,
            ratio: 4.0,
            attack_s: 0.01,
            release_s: 0.2,
            depth_db: -24.0,
        }
    }
}

impl SidechainParams {
    pub fn validate(&self) -> Result<(), ModelError> {
        check_range("threshold", self.threshold_db, -60.0, 0.0)?;
        check_range("ratio", self.ratio, 1.0, 20.0)?;
        check_range("attack", self.attack_s, 0.001, 0.5)?;
        check_range("release", self.release_s, 0.01, 2.0)?;
        check_range("depth", self.depth_db, -60.0, 0.0)?;
        Ok(())
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ModelError> {
    if value < min || value > max {
        return Err(ModelError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// What signal feeds the envelope engine for a given config.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SidechainSource {
    Track { track_id: TrackId },
    Oneshot { definition_id: OneshotDefinitionId },
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SidechainConfig {
    pub id: SidechainConfigId,
    pub name: String,
    pub source: SidechainSource,
    #[serde(default)]
    pub target_track_ids: BTreeSet<TrackId>,
    #[serde(default)]
    pub target_oneshot_definition_ids: BTreeSet<OneshotDefinitionId>,
    #[serde(default)]
    pub params: SidechainParams,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub timestamps: Timestamps,
}

fn default_enabled() -> bool {
    true
}

impl SidechainConfig {
    /// A config's source must never appear in its own target sets.
    pub fn validate(&self) -> Result<(), ModelError> {
        self.params.validate()?;
        match &self.source {
            SidechainSource::Track { track_id } if self.target_track_ids.contains(track_id) => {
                Err(ModelError::SourceTargetsItself)
            }
            SidechainSource::Oneshot { definition_id }
                if self
                    .target_oneshot_definition_ids
                    .contains(definition_id) =>
            {
                Err(ModelError::SourceTargetsItself)
            }
            _ => Ok(()),
        }
    }
}
