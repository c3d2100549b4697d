use crate::ids::MediaAssetId;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Opaque handle to a file blob owned by the Media Provider (§6). The engine
/// never interprets this value; it is handed back to the Media Provider
/// verbatim to resolve a durable file handle or trigger a PCM decode. Most
/// hosts back this with a filesystem path, so [`BlobHandle::as_utf8_path`]
/// is offered as a typed view without committing the field itself to a path
/// type (a library-sound handle is a URL, not a path).
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobHandle(pub String);

impl BlobHandle {
    pub fn as_utf8_path(&self) -> &Utf8Path {
        Utf8Path::new(&self.0)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
    Image,
}

/// A piece of source media referenced by one or more elements or one-shot
/// definitions. Decode itself is out of scope (§1); this only carries the
/// metadata the engine needs to address and size clips against it.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: MediaAssetId,
    pub kind: MediaKind,
    pub source: BlobHandle,
    pub name: String,
    /// Natural (undecoded-trim) duration of the source media, in seconds.
    pub natural_duration: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_handle_exposes_a_path_view_without_changing_its_wire_shape() {
        let handle = BlobHandle("/srv/media/clip.wav".to_string());
        assert_eq!(handle.as_utf8_path().file_name(), Some("clip.wav"));
        assert_eq!(serde_json::to_string(&handle).unwrap(), "\"/srv/media/clip.wav\"");
    }

    #[test]
    fn media_kind_round_trips_through_display_and_parse() {
        use std::str::FromStr;
        assert_eq!(MediaKind::Audio.to_string(), "audio");
        assert_eq!(MediaKind::from_str("video").unwrap(), MediaKind::Video);
    }
}
