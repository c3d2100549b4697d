//! Opaque stable ids for every entity in the [`crate::scene::Scene`] aggregate.
//!
//! Each id is a newtype around a random [nanoid](https://github.com/ai/nanoid) string, matching
//! the "stable opaque id" requirement for entity identity: ids never get
//! renumbered and survive reorders, renames, and migrations.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Debug, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new() -> Self {
                Self(nanoid::nanoid!())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_string())
            }
        }
    };
}

opaque_id!(SceneId);
opaque_id!(TrackId);
opaque_id!(ElementId);
opaque_id!(MediaAssetId);
opaque_id!(OneshotDefinitionId);
opaque_id!(OneshotMarkerId);
opaque_id!(AutomationStateId);
opaque_id!(AutomationMarkerId);
opaque_id!(AutomationOperationId);
opaque_id!(SidechainConfigId);
