use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Creation/update bookkeeping shared by entities that need it (one-shot
/// definitions, sidechain configs). Kept as a small reusable value type
/// rather than duplicated `created_at`/`updated_at` fields per struct.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Timestamps {
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Timestamps {
    pub fn now() -> Self {
        let now = Utc::now().naive_utc();
        Self {
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now().naive_utc();
    }
}
