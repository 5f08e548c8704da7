//! Ordered panel collection.
//!
//! `PanelCollection` is the authoritative order of a project's panels. The
//! visual layer is a projection of it; during a drag the reorder engine
//! produces an explicit id sequence that is fed back through
//! [`PanelCollection::reorder_from`].
//!
//! Every public mutation dirties the collection. Persisting is the caller's
//! job (see [`crate::board::Board`]).

use std::collections::HashMap;
use std::fmt;

use crate::board::model::{new_id, Panel, PanelMode};
use crate::error::{StoryError, StoryResult};

/// Optional payloads supplied when creating a panel.
#[derive(Debug, Clone, Default)]
pub struct PanelExtras {
    pub drawing: Option<String>,
    pub image_url: Option<String>,
}

impl PanelExtras {
    /// Extras for an image panel.
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            image_url: Some(url.into()),
            ..Default::default()
        }
    }
}

/// 1-based display position of a panel, derived from collection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayPosition {
    pub id: String,
    pub number: usize,
}

impl DisplayPosition {
    /// Label shown in the panel header, e.g. `"Panel 3"`.
    pub fn label(&self) -> String {
        format!("Panel {}", self.number)
    }
}

/// Called with the URL of a transient (`blob:`) image when its panel leaves
/// the collection.
pub type ReleaseHook = Box<dyn Fn(&str)>;

/// The in-memory ordered list of panels for one project.
#[derive(Default)]
pub struct PanelCollection {
    panels: Vec<Panel>,
    dirty: bool,
    release_hook: Option<ReleaseHook>,
}

impl fmt::Debug for PanelCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanelCollection")
            .field("panels", &self.panels)
            .field("dirty", &self.dirty)
            .field("release_hook", &self.release_hook.is_some())
            .finish()
    }
}

impl PanelCollection {
    // =========================================================================
    // INITIALIZATION
    // =========================================================================

    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps panels loaded from storage. The result starts clean.
    pub fn from_panels(panels: Vec<Panel>) -> Self {
        Self {
            panels,
            ..Default::default()
        }
    }

    /// Builder: install the hook that releases transient image URLs.
    pub fn with_release_hook(mut self, hook: impl Fn(&str) + 'static) -> Self {
        self.release_hook = Some(Box::new(hook));
        self
    }

    /// Builds a panel with a fresh id. Does not insert it.
    ///
    /// `Sketch` starts from `extras.drawing` (usually empty); `Image`
    /// requires `extras.image_url`.
    pub fn create(mode: PanelMode, extras: PanelExtras) -> StoryResult<Panel> {
        match mode {
            PanelMode::Sketch => {
                let mut panel = Panel::sketch(new_id());
                panel.drawing = extras.drawing.filter(|d| !d.is_empty());
                Ok(panel)
            }
            PanelMode::Image => {
                let url = extras
                    .image_url
                    .ok_or_else(|| StoryError::invalid_panel("image panel requires a source URL"))?;
                Panel::image(new_id(), url)
            }
        }
    }

    // =========================================================================
    // READ ACCESS
    // =========================================================================

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    pub fn as_slice(&self) -> &[Panel] {
        &self.panels
    }

    pub fn iter(&self) -> impl Iterator<Item = &Panel> {
        self.panels.iter()
    }

    /// Panel ids in authoritative order.
    pub fn ids(&self) -> Vec<String> {
        self.panels.iter().map(|p| p.id.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Panel> {
        self.panels.iter().find(|p| p.id == id)
    }

    /// Index of a panel in the authoritative order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.panels.iter().position(|p| p.id == id)
    }

    /// Left and right neighbors of a panel.
    pub fn neighbors(&self, id: &str) -> (Option<&Panel>, Option<&Panel>) {
        match self.position(id) {
            Some(idx) => {
                let left = idx.checked_sub(1).and_then(|i| self.panels.get(i));
                (left, self.panels.get(idx + 1))
            }
            None => (None, None),
        }
    }

    /// Recomputes 1-based display positions. Derived view only.
    pub fn renumber(&self) -> Vec<DisplayPosition> {
        self.panels
            .iter()
            .enumerate()
            .map(|(idx, p)| DisplayPosition {
                id: p.id.clone(),
                number: idx + 1,
            })
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Marks the collection as persisted.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    fn entry_mut(&mut self, id: &str) -> StoryResult<&mut Panel> {
        self.panels
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoryError::panel_not_found(id))
    }

    fn release(&self, panel: &Panel) {
        if !panel.holds_transient_url() {
            return;
        }
        if let (Some(hook), Some(url)) = (&self.release_hook, panel.image_url.as_deref()) {
            hook(url);
        }
    }

    // =========================================================================
    // STRUCTURAL MUTATIONS
    // =========================================================================

    /// Appends a panel. Dirties the collection.
    pub fn push(&mut self, panel: Panel) -> usize {
        self.panels.push(panel);
        self.dirty = true;
        self.panels.len() - 1
    }

    /// Inserts a panel, clamping `index` to `[0, len]`. Returns the index
    /// actually used. Dirties the collection.
    pub fn insert_at(&mut self, index: usize, panel: Panel) -> usize {
        let index = index.min(self.panels.len());
        self.panels.insert(index, panel);
        self.dirty = true;
        index
    }

    /// Removes a panel and releases its transient image URL, if any.
    /// Dirties the collection.
    pub fn remove_by_id(&mut self, id: &str) -> StoryResult<Panel> {
        let idx = self
            .position(id)
            .ok_or_else(|| StoryError::panel_not_found(id))?;
        let removed = self.panels.remove(idx);
        self.release(&removed);
        self.dirty = true;
        Ok(removed)
    }

    /// Rebuilds the order from a visual id sequence.
    ///
    /// Unknown and repeated ids are ignored. Panels absent from the sequence
    /// are dropped and released. Dirties the collection.
    pub fn reorder_from<S: AsRef<str>>(&mut self, visual_order: &[S]) {
        let mut by_id: HashMap<String, Panel> = self
            .panels
            .drain(..)
            .map(|p| (p.id.clone(), p))
            .collect();

        let mut ordered = Vec::with_capacity(by_id.len());
        for id in visual_order {
            if let Some(panel) = by_id.remove(id.as_ref()) {
                ordered.push(panel);
            }
        }

        if !by_id.is_empty() {
            log::debug!("reorder dropped {} panel(s) missing from visual order", by_id.len());
            for panel in by_id.values() {
                self.release(panel);
            }
        }

        self.panels = ordered;
        self.dirty = true;
    }

    /// Moves a panel to `index` (clamped). Dirties the collection.
    pub fn move_to(&mut self, id: &str, index: usize) -> StoryResult<usize> {
        let from = self
            .position(id)
            .ok_or_else(|| StoryError::panel_not_found(id))?;
        let panel = self.panels.remove(from);
        let index = index.min(self.panels.len());
        self.panels.insert(index, panel);
        self.dirty = true;
        Ok(index)
    }

    // =========================================================================
    // FIELD MUTATIONS
    // =========================================================================

    record_setters!(Panel: title, notes);

    /// Replaces the sketch raster. Only sketch panels carry drawings.
    pub fn set_drawing(&mut self, id: &str, drawing: impl Into<String>) -> StoryResult<()> {
        let panel = self.entry_mut(id)?;
        if panel.mode != PanelMode::Sketch {
            return Err(StoryError::invalid_panel(format!(
                "panel {id} is an image panel and cannot hold a drawing"
            )));
        }
        let drawing = drawing.into();
        panel.drawing = (!drawing.is_empty()).then_some(drawing);
        self.dirty = true;
        Ok(())
    }

    /// Clears the sketch raster. Dirties the collection.
    pub fn clear_drawing(&mut self, id: &str) -> StoryResult<()> {
        self.entry_mut(id)?.drawing = None;
        self.dirty = true;
        Ok(())
    }

    /// Switches a panel to image mode with the given URL and drops its
    /// drawing. Dirties the collection.
    pub fn convert_to_image(&mut self, id: &str, image_url: impl Into<String>) -> StoryResult<()> {
        let panel = self.entry_mut(id)?;
        panel.mode = PanelMode::Image;
        panel.image_url = Some(image_url.into());
        panel.drawing = None;
        self.dirty = true;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn collection(ids: &[&str]) -> PanelCollection {
        PanelCollection::from_panels(ids.iter().map(|id| Panel::sketch(*id)).collect())
    }

    fn order(c: &PanelCollection) -> Vec<String> {
        c.ids()
    }

    #[test]
    fn test_create_sketch_and_image() {
        let sketch = PanelCollection::create(PanelMode::Sketch, PanelExtras::default()).unwrap();
        assert_eq!(sketch.mode, PanelMode::Sketch);
        assert!(sketch.drawing.is_none());
        assert!(!sketch.id.is_empty());

        let image =
            PanelCollection::create(PanelMode::Image, PanelExtras::image("blob:abc")).unwrap();
        assert_eq!(image.image_url.as_deref(), Some("blob:abc"));

        let other = PanelCollection::create(PanelMode::Sketch, PanelExtras::default()).unwrap();
        assert_ne!(sketch.id, other.id);
    }

    #[test]
    fn test_create_image_without_url_fails() {
        let err = PanelCollection::create(PanelMode::Image, PanelExtras::default()).unwrap_err();
        assert!(matches!(err, StoryError::InvalidPanel(_)));
    }

    #[test]
    fn test_insert_at_clamps() {
        let mut c = collection(&["a", "b"]);
        assert_eq!(c.insert_at(99, Panel::sketch("z")), 2);
        assert_eq!(c.insert_at(0, Panel::sketch("y")), 0);
        assert_eq!(order(&c), vec!["y", "a", "b", "z"]);
        assert!(c.is_dirty());
    }

    #[test]
    fn test_remove_by_id_releases_blob_url() {
        let released = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&released);
        let mut c = PanelCollection::from_panels(vec![
            Panel::image("img", "blob:http://localhost/1").unwrap(),
            Panel::image("remote", "https://example.com/a.png").unwrap(),
        ])
        .with_release_hook(move |url| sink.borrow_mut().push(url.to_string()));

        c.remove_by_id("img").unwrap();
        c.remove_by_id("remote").unwrap();

        assert_eq!(*released.borrow(), vec!["blob:http://localhost/1".to_string()]);
        assert!(c.is_empty());
    }

    #[test]
    fn test_remove_missing_reports_not_found() {
        let mut c = collection(&["a"]);
        let err = c.remove_by_id("nope").unwrap_err();
        assert!(matches!(err, StoryError::PanelNotFound(id) if id == "nope"));
        assert!(!c.is_dirty());
    }

    #[test]
    fn test_reorder_from_drops_missing_and_unknown() {
        let mut c = collection(&["a", "b", "c", "d"]);
        c.reorder_from(&["d", "x", "b", "a", "b"]);
        assert_eq!(order(&c), vec!["d", "b", "a"]);
    }

    #[test]
    fn test_reorder_from_is_idempotent() {
        let visual = ["c", "a", "b"];
        let mut once = collection(&["a", "b", "c"]);
        once.reorder_from(&visual);

        let mut twice = collection(&["a", "b", "c"]);
        twice.reorder_from(&visual);
        twice.reorder_from(&visual);

        assert_eq!(order(&once), order(&twice));
    }

    #[test]
    fn test_renumber_follows_order() {
        let mut c = collection(&["a", "b", "c"]);
        c.reorder_from(&["c", "a", "b"]);
        let labels: Vec<_> = c.renumber().iter().map(|p| (p.id.clone(), p.label())).collect();
        assert_eq!(
            labels,
            vec![
                ("c".to_string(), "Panel 1".to_string()),
                ("a".to_string(), "Panel 2".to_string()),
                ("b".to_string(), "Panel 3".to_string()),
            ]
        );
    }

    #[test]
    fn test_neighbors() {
        let c = collection(&["a", "b", "c"]);
        let (left, right) = c.neighbors("a");
        assert!(left.is_none());
        assert_eq!(right.map(|p| p.id.as_str()), Some("b"));

        let (left, right) = c.neighbors("c");
        assert_eq!(left.map(|p| p.id.as_str()), Some("b"));
        assert!(right.is_none());

        assert!(matches!(c.neighbors("zzz"), (None, None)));
    }

    #[test]
    fn test_move_to() {
        let mut c = collection(&["a", "b", "c"]);
        assert_eq!(c.move_to("a", 10).unwrap(), 2);
        assert_eq!(order(&c), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_field_setters_dirty() {
        let mut c = collection(&["a"]);
        c.mark_clean();
        c.set_title("a", "Opening").unwrap();
        c.set_notes("a", "slow push in").unwrap();
        assert!(c.is_dirty());

        let panel = c.get("a").unwrap();
        assert_eq!(panel.title, "Opening");
        assert_eq!(panel.notes, "slow push in");
        assert!(c.set_title("missing", "x").is_err());
    }

    #[test]
    fn test_drawing_only_on_sketch() {
        let mut c = PanelCollection::from_panels(vec![
            Panel::sketch("s"),
            Panel::image("i", "https://example.com/a.png").unwrap(),
        ]);
        c.set_drawing("s", "data:image/png;base64,AAAA").unwrap();
        assert!(c.get("s").unwrap().has_sketch_content());
        assert!(c.set_drawing("i", "data:image/png;base64,AAAA").is_err());

        c.clear_drawing("s").unwrap();
        assert!(c.get("s").unwrap().drawing.is_none());
    }

    #[test]
    fn test_convert_to_image() {
        let mut c = PanelCollection::from_panels(vec![
            Panel::sketch("s").with_drawing("data:image/png;base64,AAAA")
        ]);
        c.convert_to_image("s", "https://cdn.example.com/out.png").unwrap();

        let panel = c.get("s").unwrap();
        assert_eq!(panel.mode, PanelMode::Image);
        assert_eq!(panel.image_url.as_deref(), Some("https://cdn.example.com/out.png"));
        assert!(panel.drawing.is_none());
    }
}
