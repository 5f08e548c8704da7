use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{StoryError, StoryResult};
use crate::store::KeyValueStore;

/// One file per key inside a directory.
///
/// File names are the percent-encoded key plus `.json`, so
/// `storyboardPanels:default` lands in `storyboardPanels%3Adefault.json`.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Opens (and creates if needed) the directory.
    pub fn open(root: impl Into<PathBuf>) -> StoryResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| StoryError::storage(root.display().to_string(), e.to_string()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", urlencoding::encode(key)))
    }
}

impl KeyValueStore for DirStore {
    fn get(&self, key: &str) -> StoryResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoryError::storage(key, e.to_string())),
        }
    }

    /// Writes to a sibling temp file, then renames over the target.
    fn set(&mut self, key: &str, value: &str) -> StoryResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)
            .and_then(|()| fs::rename(&tmp, &path))
            .map_err(|e| StoryError::storage(key, e.to_string()))
    }

    fn remove(&mut self, key: &str) -> StoryResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoryError::storage(key, e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{panels_key, StoreExt};
    use crate::board::model::Panel;
    use tempfile::TempDir;

    #[test]
    fn test_set_get_remove() {
        let dir = TempDir::new().unwrap();
        let mut store = DirStore::open(dir.path().join("data")).unwrap();

        assert_eq!(store.get("missing").unwrap(), None);
        store.set("storyboardPanels:default", "[]").unwrap();
        assert!(dir
            .path()
            .join("data")
            .join("storyboardPanels%3Adefault.json")
            .exists());
        assert_eq!(store.get("storyboardPanels:default").unwrap().as_deref(), Some("[]"));

        store.remove("storyboardPanels:default").unwrap();
        store.remove("storyboardPanels:default").unwrap();
        assert_eq!(store.get("storyboardPanels:default").unwrap(), None);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let panels = vec![Panel::sketch("a").with_title("One"), Panel::sketch("b")];
        {
            let mut store = DirStore::open(dir.path()).unwrap();
            store.save_panels("p/1", &panels).unwrap();
        }
        let store = DirStore::open(dir.path()).unwrap();
        assert_eq!(store.load_panels("p/1").unwrap(), panels);
        assert!(store.get(&panels_key("p/1")).unwrap().is_some());
    }
}
