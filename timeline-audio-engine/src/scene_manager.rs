//! Scenes as aggregate roots plus the command-driven undo/redo stack
//! (§4.8, §9).
//!
//! The manager owns the full ordered scene list (not just the "current"
//! scene) because undo/redo restores that whole list wholesale (§4.8:
//! "Undo is implemented by snapshotting the affected scene list before
//! execute and restoring it wholesale on undo"). A command always targets
//! one scene by id; "scene mutation is an atomic replace-by-id inside an
//! ordered scene list" describes exactly this: the manager finds the scene,
//! hands it to the command, and on success the scene (and therefore the
//! list) has been replaced in place.

use crate::commands::Command;
use crate::error::{EngineError, EngineResult};
use timeline_audio_api::{Scene, SceneId};
use timeline_audio_base::Observable;

/// Broadcast after every successful command execution, undo, or redo.
/// Deliberately carries no payload beyond which scene changed: downstream
/// managers (one-shot/automation/sidechain) invalidate broadly rather than
/// try to diff what exactly moved (§9 "avoid coalescing... don't try to
/// classify which changes were signal-affecting").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SceneChanged {
    pub scene_id: SceneId,
}

struct HistoryEntry {
    label: String,
    before: Vec<Scene>,
    after: Vec<Scene>,
}

#[derive(Default)]
pub struct SceneManager {
    scenes: Vec<Scene>,
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    observable: Observable<SceneChanged>,
}

impl SceneManager {
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self {
            scenes,
            ..Default::default()
        }
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn scene(&self, id: &SceneId) -> Option<&Scene> {
        self.scenes.iter().find(|s| &s.id == id)
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&SceneChanged) + Send + Sync + 'static,
    ) -> timeline_audio_base::SubscriptionHandle {
        self.observable.subscribe(listener)
    }

    pub fn unsubscribe(&self, handle: timeline_audio_base::SubscriptionHandle) {
        self.observable.unsubscribe(handle)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Applies `command` to the scene identified by `scene_id`. On success,
    /// snapshots the pre- and post-mutation scene list onto the undo stack
    /// and clears the redo stack (§4.8: "separate redo stack cleared on new
    /// execute"). On failure, the scene list is left byte-for-byte
    /// unchanged (§7 `InvariantViolation`).
    pub fn execute(&mut self, scene_id: &SceneId, command: &dyn Command) -> EngineResult<()> {
        let index = self
            .scenes
            .iter()
            .position(|s| &s.id == scene_id)
            .ok_or_else(|| EngineError::NotFound(format!("scene {scene_id} not found")))?;

        let before = self.scenes.clone();
        let mut scene = self.scenes[index].clone();
        command.apply(&mut scene)?;
        self.scenes[index] = scene;
        let after = self.scenes.clone();

        self.undo_stack.push(HistoryEntry {
            label: command.label(),
            before,
            after,
        });
        self.redo_stack.clear();
        self.observable.notify(&SceneChanged {
            scene_id: scene_id.clone(),
        });
        Ok(())
    }

    /// Restores the scene list to its state just before the most recent
    /// still-undone command, and pushes that command onto the redo stack.
    pub fn undo(&mut self) -> EngineResult<()> {
        let entry = self
            .undo_stack
            .pop()
            .ok_or_else(|| EngineError::InvariantViolation("nothing to undo".to_string()))?;
        self.scenes = entry.before.clone();
        self.observable.notify(&SceneChanged {
            scene_id: any_scene_id(&entry.before, &entry.after),
        });
        self.redo_stack.push(entry);
        Ok(())
    }

    /// Re-applies the most recently undone command by restoring its
    /// recorded post-state, rather than re-running `Command::apply` (which
    /// could behave differently against a scene list that's since diverged,
    /// e.g. if another command landed on top and was itself undone out of
    /// order).
    pub fn redo(&mut self) -> EngineResult<()> {
        let entry = self
            .redo_stack
            .pop()
            .ok_or_else(|| EngineError::InvariantViolation("nothing to redo".to_string()))?;
        self.scenes = entry.after.clone();
        self.observable.notify(&SceneChanged {
            scene_id: any_scene_id(&entry.before, &entry.after),
        });
        self.undo_stack.push(entry);
        Ok(())
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.undo_stack.last().map(|e| e.label.as_str())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.redo_stack.last().map(|e| e.label.as_str())
    }
}

/// Best-effort scene id to attach to an undo/redo notification: prefers a
/// scene present in both before/after scene lists (almost always all of
/// them, since commands only ever touch one scene's contents).
fn any_scene_id(before: &[Scene], after: &[Scene]) -> SceneId {
    after
        .first()
        .or_else(|| before.first())
        .map(|s| s.id.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{AddTrack, RemoveTrack};
    use timeline_audio_api::{Track, TrackKind};

    fn scene_with_id(id: &str) -> Scene {
        Scene {
            id: SceneId::from(id),
            ..Default::default()
        }
    }

    fn track(id: &str) -> Track {
        Track {
            id: timeline_audio_api::TrackId::from(id),
            kind: TrackKind::Audio,
            name: "Audio".to_string(),
            hidden: false,
            elements: vec![],
            main: false,
        }
    }

    /// Property 9: execute then undo restores the scene list element-wise.
    #[test]
    fn undo_restores_pre_command_state() {
        let mut manager = SceneManager::new(vec![scene_with_id("s1")]);
        let before = manager.scenes().to_vec();

        manager
            .execute(&SceneId::from("s1"), &AddTrack { track: track("t1") })
            .unwrap();
        assert_eq!(manager.scene(&SceneId::from("s1")).unwrap().tracks.len(), 1);

        manager.undo().unwrap();
        assert_eq!(manager.scenes(), before.as_slice());
    }

    #[test]
    fn redo_reapplies_the_undone_command() {
        let mut manager = SceneManager::new(vec![scene_with_id("s1")]);
        manager
            .execute(&SceneId::from("s1"), &AddTrack { track: track("t1") })
            .unwrap();
        manager.undo().unwrap();
        assert!(manager.scene(&SceneId::from("s1")).unwrap().tracks.is_empty());

        manager.redo().unwrap();
        assert_eq!(manager.scene(&SceneId::from("s1")).unwrap().tracks.len(), 1);
    }

    #[test]
    fn new_execute_clears_the_redo_stack() {
        let mut manager = SceneManager::new(vec![scene_with_id("s1")]);
        manager
            .execute(&SceneId::from("s1"), &AddTrack { track: track("t1") })
            .unwrap();
        manager.undo().unwrap();
        assert!(manager.can_redo());

        manager
            .execute(&SceneId::from("s1"), &AddTrack { track: track("t2") })
            .unwrap();
        assert!(!manager.can_redo());
    }

    #[test]
    fn failed_command_leaves_scene_list_untouched_and_is_not_recorded() {
        let mut manager = SceneManager::new(vec![scene_with_id("s1")]);
        let before = manager.scenes().to_vec();

        let result = manager.execute(
            &SceneId::from("s1"),
            &RemoveTrack {
                track_id: timeline_audio_api::TrackId::from("missing"),
            },
        );
        assert!(result.is_err());
        assert_eq!(manager.scenes(), before.as_slice());
        assert!(!manager.can_undo());
    }

    #[test]
    fn observers_are_notified_on_execute_undo_and_redo() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let mut manager = SceneManager::new(vec![scene_with_id("s1")]);
        let calls = Arc::new(AtomicU32::new(0));
        {
            let calls = calls.clone();
            manager.subscribe(move |_| {
                calls.fetch_add(1, Ordering::Relaxed);
            });
        }
        manager
            .execute(&SceneId::from("s1"), &AddTrack { track: track("t1") })
            .unwrap();
        manager.undo().unwrap();
        manager.redo().unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }
}
