//! The three manager views over the active Scene (§2): one-shot, automation,
//! and sidechain. Each is a cache-plus-query surface; the Scene itself stays
//! the single source of truth (§9 design note on cyclic references).

pub mod automation_manager;
pub mod oneshot_manager;
pub mod sidechain_manager;

pub use automation_manager::effective_volume;
pub use oneshot_manager::{markers_in_window_cold, OneshotIndex, OneshotManager, OneshotWindowEntry};
pub use sidechain_manager::SidechainManager;
