//! Playback scheduling, sidechain compression, and time-remapped offline
//! mixdown for a timeline video editor's audio.
//!
//! [`timeline_audio_api`] owns the persisted data model; this crate is
//! everything that runs against a live [`timeline_audio_api::Scene`] —
//! DSP primitives, the three managers (one-shot, automation, sidechain),
//! the playback scheduler, the offline mixdown renderer, and the
//! command/undo-redo layer that mutates scenes in the first place.

pub mod buffer;
pub mod commands;
pub mod config;
pub mod dsp;
pub mod envelope_engine;
pub mod error;
pub mod external;
pub mod managers;
pub mod mixdown;
pub mod scene_manager;
pub mod scheduler;

pub use buffer::{mono_mix, MonoBuffer, PcmBuffer};
pub use commands::Command;
pub use config::{EnvelopeConfig, MixdownConfig, SchedulerConfig};
pub use error::{EngineError, EngineResult};
pub use external::{AudioGraph, GainNode, MediaProvider, SourceNode, TimelineQueries, Transport, TransportEvent};
pub use managers::{effective_volume, OneshotManager, SidechainManager};
pub use mixdown::{render_mixdown, MixdownProgress, MixdownResult};
pub use scene_manager::{SceneChanged, SceneManager};
pub use scheduler::{PlaybackScheduler, SchedulerState};
