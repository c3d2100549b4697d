use crate::element::Element;
use crate::error::ModelError;
use crate::ids::{ElementId, TrackId};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use timeline_audio_base::ensure_no_duplicate;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    Text,
    Sticker,
}

/// A render-stacking-ordered list of elements. Tracks are themselves ordered
/// within `Scene::tracks` (index = stacking order).
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub kind: TrackKind,
    pub name: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub elements: Vec<Element>,
    /// At most one track in a scene may be flagged `main`.
    #[serde(default)]
    pub main: bool,
}

impl Track {
    pub fn element(&self, id: &ElementId) -> Option<&Element> {
        self.elements.iter().find(|e| &e.id == id)
    }

    pub fn element_mut(&mut self, id: &ElementId) -> Option<&mut Element> {
        self.elements.iter_mut().find(|e| &e.id == id)
    }

    pub fn audio_elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(|e| e.is_audio())
    }

    /// Element ids must be unique within the track.
    pub fn validate(&self) -> Result<(), ModelError> {
        ensure_no_duplicate("element ids", self.elements.iter().map(|e| e.id.0.clone()))
            .map_err(|e| ModelError::DuplicateElementId(e.to_string()))?;
        for element in &self.elements {
            element.validate()?;
        }
        Ok(())
    }
}
