//! Key-value persistence.
//!
//! Values are JSON strings under the same keys a browser page keeps in
//! `localStorage`, so a board saved by the CLI and one saved in the page are
//! interchangeable.

mod file;
mod memory;

pub use file::DirStore;
pub use memory::MemoryStore;

use log::{error, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::board::model::{AspectRatio, Panel, Project, Scene, Settings};
use crate::error::StoryResult;

pub const PROJECTS_KEY: &str = "storyboardProjects";
pub const REWRITE_TOKEN_KEY: &str = "openaiApiToken";
pub const GENERATION_TOKEN_KEY: &str = "briaApiToken";
pub const ASPECT_KEY: &str = "aspectChoice";

pub fn panels_key(project_id: &str) -> String {
    format!("storyboardPanels:{project_id}")
}

pub fn scenes_key(project_id: &str) -> String {
    format!("storyboardScenes:{project_id}")
}

/// String-to-string storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> StoryResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> StoryResult<()>;
    fn remove(&mut self, key: &str) -> StoryResult<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &mut S {
    fn get(&self, key: &str) -> StoryResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> StoryResult<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> StoryResult<()> {
        (**self).remove(key)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> StoryResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> StoryResult<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> StoryResult<()> {
        (**self).remove(key)
    }
}

// =============================================================================
// TYPED ACCESS
// =============================================================================

/// Typed records on top of any [`KeyValueStore`].
///
/// Loads are forgiving: a missing key or a value that no longer parses
/// yields an empty list, so one corrupt entry never locks a project.
pub trait StoreExt: KeyValueStore {
    fn load_json<T: DeserializeOwned + Default>(&self, key: &str) -> StoryResult<T> {
        let Some(raw) = self.get(key)? else {
            return Ok(T::default());
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(value),
            Err(e) => {
                error!("discarding unreadable value under '{key}': {e}");
                Ok(T::default())
            }
        }
    }

    fn save_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> StoryResult<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw)
    }

    fn load_projects(&self) -> StoryResult<Vec<Project>> {
        self.load_json(PROJECTS_KEY)
    }

    fn save_projects(&mut self, projects: &[Project]) -> StoryResult<()> {
        self.save_json(PROJECTS_KEY, projects)
    }

    fn load_panels(&self, project_id: &str) -> StoryResult<Vec<Panel>> {
        self.load_json(&panels_key(project_id))
    }

    fn save_panels(&mut self, project_id: &str, panels: &[Panel]) -> StoryResult<()> {
        self.save_json(&panels_key(project_id), panels)
    }

    fn load_scenes(&self, project_id: &str) -> StoryResult<Vec<Scene>> {
        self.load_json(&scenes_key(project_id))
    }

    fn save_scenes(&mut self, project_id: &str, scenes: &[Scene]) -> StoryResult<()> {
        self.save_json(&scenes_key(project_id), scenes)
    }

    /// Drops a project's panel and scene lists.
    fn remove_project_data(&mut self, project_id: &str) -> StoryResult<()> {
        self.remove(&panels_key(project_id))?;
        self.remove(&scenes_key(project_id))
    }

    /// Tokens are stored raw; an unknown aspect falls back to the default.
    fn load_settings(&self) -> StoryResult<Settings> {
        let aspect = match self.get(ASPECT_KEY)? {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!("{e}; using {}", AspectRatio::default());
                AspectRatio::default()
            }),
            None => AspectRatio::default(),
        };
        Ok(Settings {
            rewrite_token: self.get(REWRITE_TOKEN_KEY)?.unwrap_or_default(),
            generation_token: self.get(GENERATION_TOKEN_KEY)?.unwrap_or_default(),
            aspect,
        })
    }

    /// Trimmed tokens are written; blank ones remove the key.
    fn save_settings(&mut self, settings: &Settings) -> StoryResult<()> {
        for (key, token) in [
            (REWRITE_TOKEN_KEY, &settings.rewrite_token),
            (GENERATION_TOKEN_KEY, &settings.generation_token),
        ] {
            match token.trim() {
                "" => self.remove(key)?,
                token => self.set(key, token)?,
            }
        }
        self.set(ASPECT_KEY, settings.aspect.as_str())
    }
}

impl<S: KeyValueStore + ?Sized> StoreExt for S {}
