//! Per-project storyboard state.
//!
//! [`Board`] owns a project's panels and scenes together with its store
//! handle. Every mutation goes through the collection API, is written to the
//! store and then announced to the listener, in that order.

/// Generates `set_<field>` methods for a collection of records.
/// The collection must provide `entry_mut(&mut self, id) -> StoryResult<&mut Record>`
/// and a `dirty` flag.
macro_rules! record_setters {
    ($record:ident: $($field:ident),+ $(,)?) => {
        ::paste::paste! {
            $(
                #[doc = "Sets the `" $field "` of a " $record " by id. Dirties the collection."]
                pub fn [<set_ $field>](
                    &mut self,
                    id: &str,
                    value: impl Into<String>,
                ) -> $crate::error::StoryResult<()> {
                    self.entry_mut(id)?.$field = value.into();
                    self.dirty = true;
                    Ok(())
                }
            )+
        }
    };
}

pub mod model;
pub mod panels;
pub mod projects;
pub mod reorder;
pub mod scenes;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use model::{AspectRatio, Panel, PanelMode, Project, Scene, Settings};
pub use panels::{DisplayPosition, PanelCollection, PanelExtras};
pub use projects::{project_id_from_query, ProjectRegistry};
pub use reorder::{CardRect, DragEngine, DragState, Gap, Point, Rect};
pub use scenes::{SceneCollection, SceneDraft};

use log::{debug, error};

use crate::convert::{ConversionInput, ConversionPipeline, ConversionReport, ConversionRequest, ConvertError, HttpTransport};
use crate::error::StoryResult;
use crate::store::{KeyValueStore, StoreExt};

/// Shown before removing a scene that has a title or description.
pub const SCENE_REMOVAL_PROMPT: &str = "Remove this scene? Its title and description will be lost.";

/// View-side hooks, called after the store has been written.
pub trait BoardListener {
    fn panels_changed(&mut self, _panels: &[Panel], _positions: &[DisplayPosition]) {}
    fn scenes_changed(&mut self, _scenes: &[Scene]) {}
}

/// Controller for one project.
pub struct Board<S: KeyValueStore> {
    project_id: String,
    store: S,
    panels: PanelCollection,
    scenes: SceneCollection,
    drag: DragEngine,
    listener: Option<Box<dyn BoardListener>>,
}

impl<S: KeyValueStore> Board<S> {
    /// Loads a project's panels and scenes.
    pub fn open(store: S, project_id: impl Into<String>) -> StoryResult<Self> {
        let project_id = project_id.into();
        let panels = store.load_panels(&project_id)?;
        let scenes = store.load_scenes(&project_id)?;
        debug!(
            "opened project {project_id}: {} panel(s), {} scene(s)",
            panels.len(),
            scenes.len()
        );
        Ok(Self {
            project_id,
            store,
            panels: PanelCollection::from_panels(panels),
            scenes: SceneCollection::from_scenes(scenes),
            drag: DragEngine::new(),
            listener: None,
        })
    }

    pub fn with_listener(mut self, listener: impl BoardListener + 'static) -> Self {
        self.set_listener(listener);
        self
    }

    pub fn set_listener(&mut self, listener: impl BoardListener + 'static) {
        self.listener = Some(Box::new(listener));
    }

    /// Called with `blob:` URLs of image panels as they leave the board.
    pub fn with_release_hook(mut self, hook: impl Fn(&str) + 'static) -> Self {
        self.panels = std::mem::take(&mut self.panels).with_release_hook(hook);
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn panels(&self) -> &PanelCollection {
        &self.panels
    }

    pub fn scenes(&self) -> &SceneCollection {
        &self.scenes
    }

    pub fn positions(&self) -> Vec<DisplayPosition> {
        self.panels.renumber()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    /// Writes the panel list if dirty, then notifies. A failed write is
    /// logged and the collection stays dirty for the next attempt.
    fn commit_panels(&mut self) {
        if self.panels.is_dirty() {
            match self.store.save_panels(&self.project_id, self.panels.as_slice()) {
                Ok(()) => self.panels.mark_clean(),
                Err(e) => error!("failed to save panels of project {}: {e}", self.project_id),
            }
        }
        if let Some(listener) = &mut self.listener {
            listener.panels_changed(self.panels.as_slice(), &self.panels.renumber());
        }
    }

    fn commit_scenes(&mut self) {
        if self.scenes.is_dirty() {
            match self.store.save_scenes(&self.project_id, self.scenes.list()) {
                Ok(()) => self.scenes.mark_clean(),
                Err(e) => error!("failed to save scenes of project {}: {e}", self.project_id),
            }
        }
        if let Some(listener) = &mut self.listener {
            listener.scenes_changed(self.scenes.list());
        }
    }

    // =========================================================================
    // PANELS
    // =========================================================================

    /// Appends an empty sketch panel.
    pub fn add_panel(&mut self) -> StoryResult<Panel> {
        let panel = PanelCollection::create(PanelMode::Sketch, PanelExtras::default())?;
        self.panels.push(panel.clone());
        self.track_inserted(&panel.id);
        self.commit_panels();
        Ok(panel)
    }

    /// Appends an image panel showing `url`.
    pub fn upload_image(&mut self, url: impl Into<String>) -> StoryResult<Panel> {
        let panel = PanelCollection::create(PanelMode::Image, PanelExtras::image(url))?;
        self.panels.push(panel.clone());
        self.track_inserted(&panel.id);
        self.commit_panels();
        Ok(panel)
    }

    /// Inserts an empty sketch panel at `index` (clamped).
    pub fn insert_blank_at(&mut self, index: usize) -> StoryResult<Panel> {
        let panel = PanelCollection::create(PanelMode::Sketch, PanelExtras::default())?;
        self.panels.insert_at(index, panel.clone());
        self.track_inserted(&panel.id);
        self.commit_panels();
        Ok(panel)
    }

    /// Removes a panel. When the panel carries content, `confirm` is asked
    /// with the prompt and a `false` answer leaves the board untouched.
    pub fn remove_panel(
        &mut self,
        id: &str,
        confirm: impl FnOnce(&str) -> bool,
    ) -> StoryResult<Option<Panel>> {
        let panel = self
            .panels
            .get(id)
            .ok_or_else(|| crate::error::StoryError::panel_not_found(id))?;
        if let Some(prompt) = panel.removal_prompt() {
            if !confirm(prompt) {
                return Ok(None);
            }
        }
        let removed = self.panels.remove_by_id(id)?;
        self.drag.track_remove(id);
        self.commit_panels();
        Ok(Some(removed))
    }

    pub fn set_panel_title(&mut self, id: &str, title: impl Into<String>) -> StoryResult<()> {
        self.panels.set_title(id, title)?;
        self.commit_panels();
        Ok(())
    }

    pub fn set_panel_notes(&mut self, id: &str, notes: impl Into<String>) -> StoryResult<()> {
        self.panels.set_notes(id, notes)?;
        self.commit_panels();
        Ok(())
    }

    /// Stores the sketch raster, a `data:image/png;base64,...` URL.
    pub fn set_panel_drawing(&mut self, id: &str, drawing: impl Into<String>) -> StoryResult<()> {
        self.panels.set_drawing(id, drawing)?;
        self.commit_panels();
        Ok(())
    }

    pub fn clear_panel_drawing(&mut self, id: &str) -> StoryResult<()> {
        self.panels.clear_drawing(id)?;
        self.commit_panels();
        Ok(())
    }

    pub fn move_panel(&mut self, id: &str, index: usize) -> StoryResult<usize> {
        let index = self.panels.move_to(id, index)?;
        self.commit_panels();
        Ok(index)
    }

    /// Adopts an order read from the view.
    pub fn apply_visual_order<T: AsRef<str>>(&mut self, order: &[T]) {
        self.panels.reorder_from(order);
        self.commit_panels();
    }

    // =========================================================================
    // DRAG AND GAPS
    // =========================================================================

    pub fn drag_state(&self) -> &DragState {
        self.drag.state()
    }

    /// Places a panel added mid-drag next to its authoritative predecessor
    /// in the live order, so the drop keeps it.
    fn track_inserted(&mut self, id: &str) {
        let after = self
            .panels
            .position(id)
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| self.panels.as_slice().get(i))
            .map(|p| p.id.clone());
        self.drag.track_insert(id, after.as_deref());
    }

    pub fn begin_drag(&mut self, id: &str) -> StoryResult<()> {
        self.drag.start(id, self.panels.ids())
    }

    /// Live reorder of the visual order only. Returns whether it changed.
    pub fn drag_over(&mut self, over_id: &str, over_rect: Rect, pointer_y: f64) -> bool {
        self.drag.hover(over_id, over_rect, pointer_y)
    }

    /// Order the view should show: the live drag order while dragging.
    pub fn visual_order(&self) -> Vec<String> {
        match self.drag.visual_order() {
            Some(order) => order.to_vec(),
            None => self.panels.ids(),
        }
    }

    /// Ends the drag and adopts its visual order. Returns `false` if no drag
    /// was active.
    pub fn end_drag(&mut self) -> bool {
        match self.drag.end() {
            Some(order) => {
                self.apply_visual_order(&order);
                true
            }
            None => false,
        }
    }

    /// A cancelled gesture still leaves the view in its last visual order,
    /// which is adopted.
    pub fn cancel_drag(&mut self) -> bool {
        match self.drag.cancel() {
            Some(order) => {
                self.apply_visual_order(&order);
                true
            }
            None => false,
        }
    }

    /// Nearest insertion gap to the pointer, if any is close enough.
    pub fn resolve_gap(&self, cards: &[CardRect], pointer: Point) -> Option<Gap> {
        reorder::resolve_gap(cards, &self.visual_order(), pointer)
    }

    /// Inserts a blank panel at an active gap.
    pub fn insert_at_gap(&mut self, gap: &Gap) -> StoryResult<Panel> {
        self.insert_blank_at(gap.index)
    }

    // =========================================================================
    // SCENES
    // =========================================================================

    pub fn add_scene(&mut self, draft: SceneDraft) -> Scene {
        let scene = self.scenes.create(draft);
        self.commit_scenes();
        scene
    }

    /// Removes a scene, asking `confirm` first when it has content.
    pub fn remove_scene(
        &mut self,
        id: &str,
        confirm: impl FnOnce(&str) -> bool,
    ) -> StoryResult<Option<Scene>> {
        let scene = self
            .scenes
            .get(id)
            .ok_or_else(|| crate::error::StoryError::scene_not_found(id))?;
        if scene.requires_removal_confirmation() && !confirm(SCENE_REMOVAL_PROMPT) {
            return Ok(None);
        }
        let removed = self.scenes.remove_by_id(id)?;
        self.commit_scenes();
        Ok(Some(removed))
    }

    pub fn set_scene_title(&mut self, id: &str, title: impl Into<String>) -> StoryResult<()> {
        self.scenes.set_title(id, title)?;
        self.commit_scenes();
        Ok(())
    }

    pub fn set_scene_description(&mut self, id: &str, description: impl Into<String>) -> StoryResult<()> {
        self.scenes.set_description(id, description)?;
        self.commit_scenes();
        Ok(())
    }

    // =========================================================================
    // PROJECT AND SETTINGS
    // =========================================================================

    pub fn project_title(&self) -> StoryResult<String> {
        projects::title_of(&self.store, &self.project_id)
    }

    /// Renames the open project, registering it if needed.
    pub fn rename_project(&mut self, title: &str) -> StoryResult<Project> {
        ProjectRegistry::new(&mut self.store).rename(&self.project_id, title)
    }

    pub fn settings(&self) -> StoryResult<Settings> {
        self.store.load_settings()
    }

    /// Persists settings. A failed write is logged.
    pub fn save_settings(&mut self, settings: &Settings) {
        if let Err(e) = self.store.save_settings(settings) {
            error!("failed to save settings: {e}");
        }
    }

    // =========================================================================
    // CONVERSION
    // =========================================================================

    /// Snapshot for a conversion run, after precondition checks.
    pub fn prepare_conversion(
        &self,
        request: &ConversionRequest,
        require_scene: bool,
    ) -> StoryResult<ConversionInput> {
        let settings = self.settings()?;
        ConversionInput::prepare(&self.panels, &self.scenes, request, &settings, require_scene)
            .map_err(|e| ConvertError::from(e).into())
    }

    /// Turns a sketch panel into the generated image.
    pub fn apply_conversion(&mut self, panel_id: &str, image_url: &str) -> StoryResult<()> {
        self.panels.convert_to_image(panel_id, image_url)?;
        self.commit_panels();
        Ok(())
    }

    /// Runs the pipeline for one panel. The panel changes only on success.
    pub async fn convert_panel<T: HttpTransport>(
        &mut self,
        pipeline: &ConversionPipeline<T>,
        request: &ConversionRequest,
    ) -> StoryResult<ConversionReport> {
        let input = self.prepare_conversion(request, pipeline.config().require_scene)?;
        let report = pipeline.run(&input).await?;
        self.apply_conversion(&report.panel_id, &report.image_url)?;
        Ok(report)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;
    use crate::convert::transport::testing::ScriptedTransport;
    use crate::convert::{PollConfig, PreconditionError, Service, ServiceConfig};
    use crate::error::StoryError;
    use crate::store::{panels_key, MemoryStore};

    #[derive(Default)]
    struct Recorder {
        panel_events: Vec<Vec<String>>,
        scene_events: usize,
    }

    struct Shared(Rc<RefCell<Recorder>>);

    impl BoardListener for Shared {
        fn panels_changed(&mut self, panels: &[Panel], positions: &[DisplayPosition]) {
            assert_eq!(panels.len(), positions.len());
            self.0
                .borrow_mut()
                .panel_events
                .push(panels.iter().map(|p| p.id.clone()).collect());
        }

        fn scenes_changed(&mut self, _scenes: &[Scene]) {
            self.0.borrow_mut().scene_events += 1;
        }
    }

    fn seeded_store(ids: &[&str]) -> MemoryStore {
        let mut store = MemoryStore::new();
        let panels: Vec<_> = ids.iter().map(|id| Panel::sketch(*id)).collect();
        store.save_panels("proj", &panels).unwrap();
        store
    }

    fn stored_ids(store: &MemoryStore) -> Vec<String> {
        store
            .load_panels("proj")
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect()
    }

    #[test]
    fn test_mutations_persist_then_notify() {
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let mut board = Board::open(seeded_store(&["a", "b"]), "proj")
            .unwrap()
            .with_listener(Shared(recorder.clone()));

        let added = board.add_panel().unwrap();
        board.set_panel_title(&added.id, "Third").unwrap();
        board.move_panel(&added.id, 0).unwrap();

        assert_eq!(stored_ids(board.store()), vec![added.id.clone(), "a".into(), "b".into()]);
        assert_eq!(board.store().load_panels("proj").unwrap()[0].title, "Third");
        assert_eq!(recorder.borrow().panel_events.len(), 3);
        assert_eq!(board.positions()[0].label(), "Panel 1");

        board.add_scene(SceneDraft::new("Intro", ""));
        assert_eq!(recorder.borrow().scene_events, 1);
        assert_eq!(board.store().load_scenes("proj").unwrap().len(), 1);
    }

    #[test]
    fn test_remove_panel_confirmation() {
        let mut board = Board::open(seeded_store(&["a", "b"]), "proj").unwrap();

        // blank sketch goes without asking
        let removed = board.remove_panel("a", |_| panic!("should not ask")).unwrap();
        assert_eq!(removed.map(|p| p.id), Some("a".into()));

        board.set_panel_notes("b", "keep me").unwrap();
        let mut asked = None;
        let declined = board
            .remove_panel("b", |prompt| {
                asked = Some(prompt.to_string());
                false
            })
            .unwrap();
        assert!(declined.is_none());
        assert_eq!(asked.as_deref(), Some("Remove this panel? Its sketch and notes will be lost."));
        assert_eq!(stored_ids(board.store()), vec!["b".to_string()]);

        assert!(board.remove_panel("b", |_| true).unwrap().is_some());
        assert!(matches!(board.remove_panel("b", |_| true), Err(StoryError::PanelNotFound(_))));
    }

    #[test]
    fn test_drag_round_trip() {
        let mut board = Board::open(seeded_store(&["a", "b", "c"]), "proj").unwrap();
        board.begin_drag("a").unwrap();
        assert!(board.drag_over("c", Rect::new(200.0, 0.0, 100.0, 100.0), 80.0));
        assert_eq!(board.visual_order(), vec!["b", "c", "a"]);
        // nothing written until the drop
        assert_eq!(stored_ids(board.store()), vec!["a", "b", "c"]);

        assert!(board.end_drag());
        assert_eq!(*board.drag_state(), DragState::Idle);
        assert_eq!(stored_ids(board.store()), vec!["b", "c", "a"]);
        assert!(!board.end_drag());
    }

    #[test]
    fn test_panels_added_during_drag_survive_drop() {
        let mut board = Board::open(seeded_store(&["a", "b"]), "proj").unwrap();
        board.begin_drag("a").unwrap();
        let appended = board.add_panel().unwrap();
        let inserted = board.insert_blank_at(1).unwrap();
        assert_eq!(
            board.visual_order(),
            vec!["a".to_string(), inserted.id.clone(), "b".into(), appended.id.clone()]
        );

        assert!(board.drag_over("b", Rect::new(0.0, 0.0, 100.0, 100.0), 90.0));
        assert!(board.end_drag());

        let expected = vec![inserted.id.clone(), "b".to_string(), "a".into(), appended.id.clone()];
        assert_eq!(board.panels().ids(), expected);
        assert_eq!(stored_ids(board.store()), expected);
    }

    #[test]
    fn test_removal_during_drag() {
        let mut board = Board::open(seeded_store(&["a", "b", "c"]), "proj").unwrap();
        board.begin_drag("a").unwrap();
        board.remove_panel("b", |_| true).unwrap();
        assert_eq!(board.visual_order(), vec!["a", "c"]);

        board.remove_panel("a", |_| true).unwrap();
        assert_eq!(*board.drag_state(), DragState::Idle);
        assert!(!board.end_drag());
        assert_eq!(stored_ids(board.store()), vec!["c"]);
    }

    #[test]
    fn test_insert_at_gap() {
        let mut board = Board::open(seeded_store(&["a", "b", "c", "d"]), "proj").unwrap();
        let cards = vec![
            CardRect::new("a", Rect::new(0.0, 0.0, 100.0, 100.0)),
            CardRect::new("b", Rect::new(120.0, 0.0, 100.0, 100.0)),
            CardRect::new("c", Rect::new(0.0, 120.0, 100.0, 100.0)),
            CardRect::new("d", Rect::new(120.0, 120.0, 100.0, 100.0)),
        ];
        let gap = board.resolve_gap(&cards, Point::new(110.0, 50.0)).unwrap();
        assert_eq!(gap.index, 1);

        let panel = board.insert_at_gap(&gap).unwrap();
        assert_eq!(board.panels().position(&panel.id), Some(1));
        assert_eq!(stored_ids(board.store()).len(), 5);
        assert!(board.resolve_gap(&cards, Point::new(900.0, 900.0)).is_none());
    }

    #[test]
    fn test_storage_failure_keeps_memory_state() {
        let mut store = MemoryStore::with_quota(600);
        store.save_panels("proj", &[Panel::sketch("a")]).unwrap();
        let mut board = Board::open(store, "proj").unwrap();

        let big = format!("data:image/png;base64,{}", "A".repeat(4096));
        board.set_panel_drawing("a", big.clone()).unwrap();
        board.add_panel().unwrap();

        assert_eq!(board.panels().len(), 2);
        assert_eq!(board.panels().get("a").unwrap().drawing.as_deref(), Some(big.as_str()));
        assert!(board.panels().is_dirty());
        // last good write survives
        assert_eq!(stored_ids(board.store()), vec!["a".to_string()]);
    }

    #[test]
    fn test_reopen_round_trip() {
        let mut board = Board::open(MemoryStore::new(), "proj").unwrap();
        let first = board.add_panel().unwrap();
        board.set_panel_drawing(&first.id, "data:image/png;base64,AA").unwrap();
        board.upload_image("https://img/u.png").unwrap();
        let scene = board.add_scene(SceneDraft::new("Intro", "A kitchen"));

        let before: Vec<Panel> = board.panels().as_slice().to_vec();
        let reopened = Board::open(board.into_store(), "proj").unwrap();
        assert_eq!(reopened.panels().as_slice(), before.as_slice());
        assert_eq!(reopened.scenes().get(&scene.id).unwrap().description, "A kitchen");
    }

    #[test]
    fn test_rename_project() {
        let mut board = Board::open(MemoryStore::new(), "proj").unwrap();
        assert_eq!(board.project_title().unwrap(), model::UNTITLED_PROJECT);
        board.rename_project("Heist").unwrap();
        assert_eq!(board.project_title().unwrap(), "Heist");
    }

    fn conversion_board() -> (Board<MemoryStore>, String, String) {
        let mut store = MemoryStore::new();
        store
            .save_settings(&Settings {
                rewrite_token: "sk".into(),
                generation_token: "bria".into(),
                ..Default::default()
            })
            .unwrap();
        let mut board = Board::open(store, "proj").unwrap();
        let panel = board.add_panel().unwrap();
        board
            .set_panel_drawing(&panel.id, "data:image/png;base64,SKETCH")
            .unwrap();
        let scene = board.add_scene(SceneDraft::new("Intro", "A kitchen"));
        (board, panel.id, scene.id)
    }

    fn fast_config() -> ServiceConfig {
        ServiceConfig::default().with_poll(PollConfig::new(Duration::ZERO, 25))
    }

    #[tokio::test]
    async fn test_convert_panel_success() {
        let (mut board, panel_id, scene_id) = conversion_board();
        let (panel_id, scene_id) = (panel_id.as_str(), scene_id.as_str());

        let transport = ScriptedTransport::new()
            .respond(200, r#"{"choices":[{"message":{"content":"Chef, kitchen, close up"}}]}"#)
            .respond(200, r#"{"result":{"image_url":"https://img/gen.png"}}"#);
        let pipeline = ConversionPipeline::new(transport, fast_config());
        let request = ConversionRequest::new(panel_id)
            .with_scene(scene_id)
            .with_details("close up");

        let report = board.convert_panel(&pipeline, &request).await.unwrap();
        assert_eq!(report.image_url, "https://img/gen.png");

        let panel = board.panels().get(panel_id).unwrap();
        assert_eq!(panel.mode, PanelMode::Image);
        assert_eq!(panel.image_url.as_deref(), Some("https://img/gen.png"));
        assert!(panel.drawing.is_none());
        let stored = board.store().load_panels("proj").unwrap();
        assert_eq!(stored[0].mode, PanelMode::Image);

        let body = pipeline.transport().requests()[0].body.clone().unwrap();
        let text = body["messages"][1]["content"][0]["text"].as_str().unwrap().to_string();
        assert!(text.contains("Intro") && text.contains("A kitchen") && text.contains("close up"));
    }

    #[tokio::test]
    async fn test_convert_timeout_leaves_panel() {
        let (mut board, panel_id, scene_id) = conversion_board();
        let (panel_id, scene_id) = (panel_id.as_str(), scene_id.as_str());
        let before = board.panels().get(panel_id).cloned();

        let transport = ScriptedTransport::new()
            .respond(200, r#"{"choices":[{"message":{"content":"prompt"}}]}"#)
            .respond(200, r#"{"status_url":"https://status/1"}"#)
            .otherwise(200, r#"{"result":{"state":"IN_PROGRESS"}}"#);
        let pipeline = ConversionPipeline::new(transport, fast_config());

        let err = board
            .convert_panel(&pipeline, &ConversionRequest::new(panel_id).with_scene(scene_id))
            .await
            .unwrap_err();
        assert!(matches!(err, StoryError::Convert(ConvertError::PollTimeout { .. })));
        assert_eq!(board.panels().get(panel_id).cloned(), before);
        assert_eq!(
            board.store().load_panels("proj").unwrap()[0].mode,
            PanelMode::Sketch
        );
    }

    #[tokio::test]
    async fn test_convert_without_credentials_sends_nothing() {
        let mut store = MemoryStore::new();
        store.save_panels("proj", &[Panel::sketch("p").with_drawing("data:image/png;base64,AA")]).unwrap();
        let mut board = Board::open(store, "proj").unwrap();
        let raw_before = board.store().get(&panels_key("proj")).unwrap();

        let pipeline = ConversionPipeline::new(ScriptedTransport::new(), fast_config().with_require_scene(false));
        let err = board
            .convert_panel(&pipeline, &ConversionRequest::new("p"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoryError::Convert(ConvertError::Precondition(PreconditionError::MissingCredential(Service::Generation)))
        ));
        assert!(err.to_string().contains("image generation"));
        assert!(matches!(err, StoryError::Convert(ref e) if e.is_precondition()));
        assert!(pipeline.transport().requests().is_empty());
        assert_eq!(board.store().get(&panels_key("proj")).unwrap(), raw_before);
    }
}
