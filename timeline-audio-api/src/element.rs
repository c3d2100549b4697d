use crate::error::ModelError;
use crate::ids::{ElementId, MediaAssetId};
use serde::{Deserialize, Serialize};

/// Tagged union over the element kinds a track can contain.
///
/// Per the design notes (§9) on discriminated unions: always narrow by
/// binding the tag locally (`match &element.kind`) before reading
/// variant-specific fields, never through chained field access.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ElementKind {
    Video,
    Image,
    Audio(AudioElementData),
    Text,
    Sticker,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AudioElementData {
    pub media_id: MediaAssetId,
    /// Base volume before automation/sidechain are applied, in `[0, 1]`.
    pub base_volume: f64,
    #[serde(rename = "loop")]
    pub looped: bool,
}

/// One clip on a track's timeline.
///
/// Invariants (enforced by [`Element::validate`], checked at the command
/// boundary — never by `Deserialize` itself, so a persisted scene always
/// loads even if hand-edited into a temporarily invalid state):
/// - `0 <= trim_start <= trim_end`
/// - `duration > 0`
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    /// Position on the timeline, in seconds.
    pub start_time: f64,
    pub duration: f64,
    /// Trim window within the source media, in seconds.
    pub trim_start: f64,
    pub trim_end: f64,
    pub hidden: bool,
    pub kind: ElementKind,
}

impl Element {
    pub fn is_audio(&self) -> bool {
        matches!(self.kind, ElementKind::Audio(_))
    }

    pub fn audio_data(&self) -> Option<&AudioElementData> {
        match &self.kind {
            ElementKind::Audio(data) => Some(data),
            _ => None,
        }
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// Validates the element's own invariants. Cross-referencing against a
    /// `MediaAsset`'s `natural_duration` (the full `trim_end <=
    /// sourceDuration` invariant) is the caller's responsibility since it
    /// requires Scene-level lookup.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.duration <= 0.0 {
            return Err(ModelError::MustBePositive {
                field: "duration",
                value: self.duration,
            });
        }
        if self.trim_start < 0.0 || self.trim_start > self.trim_end {
            return Err(ModelError::TrimOutOfOrder {
                trim_start: self.trim_start,
                trim_end: self.trim_end,
            });
        }
        if let ElementKind::Audio(data) = &self.kind {
            if !(0.0..=1.0).contains(&data.base_volume) {
                return Err(ModelError::OutOfRange {
                    field: "baseVolume",
                    value: data.base_volume,
                    min: 0.0,
                    max: 1.0,
                });
            }
        }
        Ok(())
    }

    pub fn validate_against_source_duration(&self, source_duration: f64) -> Result<(), ModelError> {
        self.validate()?;
        if self.trim_end > source_duration {
            return Err(ModelError::OutOfRange {
                field: "trimEnd",
                value: self.trim_end,
                min: 0.0,
                max: source_duration,
            });
        }
        Ok(())
    }
}
