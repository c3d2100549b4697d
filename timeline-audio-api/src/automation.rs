use crate::ids::{AutomationMarkerId, AutomationOperationId, AutomationStateId, ElementId, TrackId};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutomationOperationKind {
    AudioVolume,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AutomationOperation {
    pub id: AutomationOperationId,
    pub kind: AutomationOperationKind,
    pub track_id: TrackId,
    /// Target volume, in `[0, 100]`.
    pub value: f64,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AutomationState {
    pub id: AutomationStateId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub operations: Vec<AutomationOperation>,
}

/// Tagged union distinguishing the two ways a marker can activate a state:
/// *range* markers are active while a specific element is active; *point*
/// markers are active from their time forward until overridden.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum AutomationMarkerKind {
    Range {
        track_id: TrackId,
        element_id: ElementId,
    },
    Point {
        time: f64,
    },
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AutomationMarker {
    pub id: AutomationMarkerId,
    pub state_id: AutomationStateId,
    #[serde(flatten)]
    pub kind: AutomationMarkerKind,
}
