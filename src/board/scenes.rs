//! Scene collection: insertion-ordered narrative units.

use crate::board::model::{new_id, Scene};
use crate::error::{StoryError, StoryResult};

/// Fields supplied when creating a scene.
#[derive(Debug, Clone, Default)]
pub struct SceneDraft {
    pub title: String,
    pub description: String,
}

impl SceneDraft {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// The in-memory list of scenes for one project.
#[derive(Debug, Clone, Default)]
pub struct SceneCollection {
    scenes: Vec<Scene>,
    dirty: bool,
}

impl SceneCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps scenes loaded from storage. The result starts clean.
    pub fn from_scenes(scenes: Vec<Scene>) -> Self {
        Self {
            scenes,
            dirty: false,
        }
    }

    /// Appends a new scene with trimmed fields. Dirties the collection.
    pub fn create(&mut self, draft: SceneDraft) -> Scene {
        let scene = Scene::new(new_id())
            .with_title(draft.title.trim())
            .with_description(draft.description.trim());
        self.scenes.push(scene.clone());
        self.dirty = true;
        scene
    }

    /// Removes a scene. Dirties the collection.
    pub fn remove_by_id(&mut self, id: &str) -> StoryResult<Scene> {
        let idx = self
            .scenes
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| StoryError::scene_not_found(id))?;
        self.dirty = true;
        Ok(self.scenes.remove(idx))
    }

    /// Scenes in insertion order.
    pub fn list(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn get(&self, id: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    fn entry_mut(&mut self, id: &str) -> StoryResult<&mut Scene> {
        self.scenes
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoryError::scene_not_found(id))
    }

    record_setters!(Scene: title, description);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_keeps_insertion_order() {
        let mut scenes = SceneCollection::new();
        let first = scenes.create(SceneDraft::new("  Intro ", "A kitchen"));
        let second = scenes.create(SceneDraft::default());

        let ids: Vec<_> = scenes.list().iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids, vec![first.id.clone(), second.id]);
        assert_eq!(first.title, "Intro");
        assert!(scenes.is_dirty());
    }

    #[test]
    fn test_remove_by_id() {
        let mut scenes = SceneCollection::new();
        let scene = scenes.create(SceneDraft::new("Intro", ""));
        scenes.mark_clean();

        let removed = scenes.remove_by_id(&scene.id).unwrap();
        assert_eq!(removed.title, "Intro");
        assert!(scenes.is_empty());
        assert!(scenes.is_dirty());

        assert!(matches!(
            scenes.remove_by_id(&scene.id),
            Err(StoryError::SceneNotFound(_))
        ));
    }

    #[test]
    fn test_setters() {
        let mut scenes = SceneCollection::from_scenes(vec![Scene::new("s-1")]);
        scenes.set_title("s-1", "Chase").unwrap();
        scenes.set_description("s-1", "Rooftops at night").unwrap();

        let scene = scenes.get("s-1").unwrap();
        assert_eq!(scene.title, "Chase");
        assert!(scene.requires_removal_confirmation());
        assert!(scenes.set_title("s-2", "x").is_err());
    }
}
