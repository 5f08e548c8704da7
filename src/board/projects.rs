//! Project registry: the list shown on the home page.

use chrono::{Local, Utc};

use crate::board::model::{new_id, Project, DEFAULT_PROJECT_ID, UNTITLED_PROJECT};
use crate::error::{StoryError, StoryResult};
use crate::store::{KeyValueStore, StoreExt};

/// Shown for projects whose first panel has no imagery.
pub const PLACEHOLDER_THUMBNAIL: &str = "data:image/svg+xml;utf8,%3Csvg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 160 90'%3E%3Crect width='160' height='90' fill='%23eef0f4'/%3E%3Cpath d='M20 70l30-30 20 20 20-25 50 35z' fill='%23c7ccd6'/%3E%3C/svg%3E";

/// Reads the `project` parameter from a URL query string. A leading `?` is
/// accepted; missing or blank values resolve to the default project.
pub fn project_id_from_query(query: &str) -> String {
    query
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
        .find(|(name, _)| *name == "project")
        .map(|(_, value)| {
            let value = value.replace('+', " ");
            urlencoding::decode(&value)
                .map(|v| v.into_owned())
                .unwrap_or(value)
        })
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_PROJECT_ID.to_string())
}

/// Name given to a project created without one, e.g. `"Project Oct 19"`.
pub fn default_project_name() -> String {
    Local::now().format("Project %b %-d").to_string()
}

/// Registered title of a project, or the untitled label.
pub fn title_of<S: KeyValueStore + ?Sized>(store: &S, id: &str) -> StoryResult<String> {
    Ok(store
        .load_projects()?
        .into_iter()
        .find(|p| p.id == id)
        .map(|p| p.title)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| UNTITLED_PROJECT.to_string()))
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Project list operations over a borrowed store.
pub struct ProjectRegistry<'a, S: KeyValueStore + ?Sized> {
    store: &'a mut S,
}

impl<'a, S: KeyValueStore + ?Sized> ProjectRegistry<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// Newest first.
    pub fn list(&self) -> StoryResult<Vec<Project>> {
        let mut projects = self.store.load_projects()?;
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    pub fn get(&self, id: &str) -> StoryResult<Option<Project>> {
        Ok(self.store.load_projects()?.into_iter().find(|p| p.id == id))
    }

    /// Like [`ProjectRegistry::get`], but an unregistered id is an error.
    pub fn require(&self, id: &str) -> StoryResult<Project> {
        self.get(id)?
            .ok_or_else(|| StoryError::project_not_found(id))
    }

    pub fn title_of(&self, id: &str) -> StoryResult<String> {
        title_of(&*self.store, id)
    }

    /// Registers a new project. A blank name gets the dated default.
    pub fn create(&mut self, name: Option<&str>) -> StoryResult<Project> {
        let title = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(default_project_name);
        let project = Project::new(new_id(), title).with_created_at(now_millis());

        let mut projects = self.store.load_projects()?;
        projects.push(project.clone());
        self.store.save_projects(&projects)?;
        log::info!("created project {} ({})", project.id, project.title);
        Ok(project)
    }

    /// Sets a project's title, registering the id if it is not listed yet.
    pub fn rename(&mut self, id: &str, title: &str) -> StoryResult<Project> {
        let title = match title.trim() {
            "" => UNTITLED_PROJECT,
            t => t,
        };
        let mut projects = self.store.load_projects()?;
        let project = match projects.iter_mut().find(|p| p.id == id) {
            Some(existing) => {
                existing.title = title.to_string();
                existing.clone()
            }
            None => {
                let project = Project::new(id, title).with_created_at(now_millis());
                projects.push(project.clone());
                project
            }
        };
        self.store.save_projects(&projects)?;
        Ok(project)
    }

    /// Removes a project and its panel and scene lists. Returns whether it
    /// was registered.
    pub fn delete(&mut self, id: &str) -> StoryResult<bool> {
        let mut projects = self.store.load_projects()?;
        let before = projects.len();
        projects.retain(|p| p.id != id);
        let existed = projects.len() != before;

        self.store.save_projects(&projects)?;
        self.store.remove_project_data(id)?;
        log::info!("deleted project {id}");
        Ok(existed)
    }

    /// First panel's image or drawing, else a placeholder.
    pub fn thumbnail(&self, id: &str) -> StoryResult<String> {
        let panels = self.store.load_panels(id)?;
        let thumb = panels.first().and_then(|p| {
            p.image_url
                .as_deref()
                .filter(|u| !u.is_empty())
                .or(p.drawing.as_deref().filter(|d| !d.is_empty()))
                .map(str::to_string)
        });
        Ok(thumb.unwrap_or_else(|| PLACEHOLDER_THUMBNAIL.to_string()))
    }
}
