//! Persisted data model for the timeline audio engine.
//!
//! `Scene` is the aggregate root (§3): tracks, elements, one-shot
//! definitions/markers, automation states/markers, and sidechain configs.
//! [`persistence`] wraps it for storage with a versioned migration chain.

pub mod automation;
pub mod element;
pub mod error;
pub mod ids;
pub mod media;
pub mod oneshot;
pub mod persistence;
pub mod scene;
pub mod sidechain;
pub mod time_remap;
pub mod timestamps;
pub mod track;

pub use automation::{AutomationMarker, AutomationMarkerKind, AutomationOperation, AutomationOperationKind, AutomationState};
pub use element::{AudioElementData, Element, ElementKind};
pub use error::ModelError;
pub use ids::*;
pub use media::{BlobHandle, MediaAsset, MediaKind};
pub use oneshot::{audio_end_time, audio_start_time, OneshotAudioSource, OneshotDefinition, OneshotMarker};
pub use persistence::{
    load_document, load_document_binary, load_document_binary_base64, save_document, save_document_binary,
    save_document_binary_base64, PersistedDocument, PersistenceError, CURRENT_SCHEMA_VERSION,
};
pub use scene::Scene;
pub use sidechain::{SidechainConfig, SidechainParams, SidechainSource};
pub use time_remap::{MarkerRemapBehavior, TimeRemapConfig, TrackRemapBehavior};
pub use timestamps::Timestamps;
pub use track::{Track, TrackKind};
