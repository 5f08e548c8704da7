//! WASM bindings for the board.
//!
//! The page hands in its `localStorage` (or any object with `getItem`,
//! `setItem` and `removeItem`) and drives a [`Board`] through
//! [`JsBoard`]. Rendering stays in JavaScript; the listener callbacks say
//! when to re-render. Conversion runs the same pipeline as native builds,
//! over `fetch`.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use js_sys::{Array, Function, Reflect};
use serde::{Deserialize, Serialize};
use serde_wasm_bindgen::{from_value, Serializer};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::board::model::{png_data_url, Panel, Scene, Settings};
use crate::board::panels::DisplayPosition;
use crate::board::projects::{project_id_from_query, ProjectRegistry};
use crate::board::reorder::{CardRect, Point, Rect};
use crate::board::scenes::SceneDraft;
use crate::board::{Board, BoardListener};
use crate::convert::ServiceConfig;
use crate::error::{StoryError, StoryResult};
use crate::store::{KeyValueStore, StoreExt};

#[cfg(target_arch = "wasm32")]
use crate::convert::{
    ConversionPipeline, ConversionProgress, ConversionRequest, ConversionStage, Credentials, FetchTransport,
};
#[cfg(target_arch = "wasm32")]
use js_sys::Promise;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen_futures::future_to_promise;

/// Serialize a value to JsValue with maps as plain JS objects.
fn to_js_value<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, serde_wasm_bindgen::Error> {
    value.serialize(&Serializer::new().serialize_maps_as_objects(true))
}

fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

// =============================================================================
// ERROR CONVERSION
// =============================================================================

macro_rules! js_result {
    ($expr:expr) => {
        $expr.map_err(|e: StoryError| JsValue::from_str(&e.to_string()))
    };
}

// =============================================================================
// INIT
// =============================================================================

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = URL, js_name = revokeObjectURL)]
    fn revoke_object_url(url: &str);
}

/// Installs the panic hook and console logging. Call once at page load.
#[wasm_bindgen(js_name = initSketch2Story)]
pub fn init() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug).ok();
}

/// Project id from `location.search`.
#[wasm_bindgen(js_name = projectIdFromQuery)]
pub fn project_id_from_query_js(query: &str) -> String {
    project_id_from_query(query)
}

/// Encodes PNG bytes from a canvas export as a data URL.
#[wasm_bindgen(js_name = pngDataUrl)]
pub fn png_data_url_js(bytes: &[u8]) -> String {
    png_data_url(bytes)
}

// =============================================================================
// STORAGE
// =============================================================================

/// A `localStorage`-like JS object.
#[derive(Clone)]
pub struct JsStorage {
    inner: JsValue,
}

impl JsStorage {
    pub fn new(inner: JsValue) -> Self {
        Self { inner }
    }

    fn method(&self, key: &str, name: &str) -> StoryResult<Function> {
        Reflect::get(&self.inner, &JsValue::from_str(name))
            .ok()
            .and_then(|f| f.dyn_into::<Function>().ok())
            .ok_or_else(|| StoryError::storage(key, format!("storage has no {name}()")))
    }
}

impl KeyValueStore for JsStorage {
    fn get(&self, key: &str) -> StoryResult<Option<String>> {
        let value = self
            .method(key, "getItem")?
            .call1(&self.inner, &JsValue::from_str(key))
            .map_err(|e| StoryError::storage(key, describe(&e)))?;
        Ok(value.as_string())
    }

    /// `setItem` throws on quota; that surfaces as a storage error.
    fn set(&mut self, key: &str, value: &str) -> StoryResult<()> {
        self.method(key, "setItem")?
            .call2(&self.inner, &JsValue::from_str(key), &JsValue::from_str(value))
            .map(|_| ())
            .map_err(|e| StoryError::storage(key, describe(&e)))
    }

    fn remove(&mut self, key: &str) -> StoryResult<()> {
        self.method(key, "removeItem")?
            .call1(&self.inner, &JsValue::from_str(key))
            .map(|_| ())
            .map_err(|e| StoryError::storage(key, describe(&e)))
    }
}

// =============================================================================
// LISTENER
// =============================================================================

/// Forwards board changes to JS callbacks.
struct JsListener {
    on_panels: Option<Function>,
    on_scenes: Option<Function>,
}

impl BoardListener for JsListener {
    fn panels_changed(&mut self, panels: &[Panel], positions: &[DisplayPosition]) {
        let Some(callback) = &self.on_panels else {
            return;
        };
        let labels: Array = positions
            .iter()
            .map(|p| JsValue::from_str(&p.label()))
            .collect();
        match to_js_value(panels) {
            Ok(panels) => {
                if let Err(e) = callback.call2(&JsValue::NULL, &panels, &labels) {
                    log::error!("panels listener threw: {}", describe(&e));
                }
            }
            Err(e) => log::error!("failed to serialize panels: {e}"),
        }
    }

    fn scenes_changed(&mut self, scenes: &[Scene]) {
        let Some(callback) = &self.on_scenes else {
            return;
        };
        match to_js_value(scenes) {
            Ok(scenes) => {
                if let Err(e) = callback.call1(&JsValue::NULL, &scenes) {
                    log::error!("scenes listener threw: {}", describe(&e));
                }
            }
            Err(e) => log::error!("failed to serialize scenes: {e}"),
        }
    }
}

// =============================================================================
// INPUT SHAPES
// =============================================================================

/// One card's bounding box, as from `getBoundingClientRect()`.
#[derive(Deserialize)]
struct CardBox {
    id: String,
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

impl From<CardBox> for CardRect {
    fn from(b: CardBox) -> Self {
        CardRect::new(b.id, Rect::new(b.left, b.top, b.width, b.height))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SettingsView {
    rewrite_token: String,
    generation_token: String,
    aspect: &'static str,
    aspect_css: String,
    has_credentials: bool,
}

impl From<&Settings> for SettingsView {
    fn from(s: &Settings) -> Self {
        Self {
            rewrite_token: s.rewrite_token.clone(),
            generation_token: s.generation_token.clone(),
            aspect: s.aspect.as_str(),
            aspect_css: s.aspect.css_ratio(),
            has_credentials: s.has_credentials(),
        }
    }
}

/// Forwards pipeline stages to a JS callback.
#[cfg(target_arch = "wasm32")]
struct JsProgress {
    callback: Function,
}

#[cfg(target_arch = "wasm32")]
impl ConversionProgress for JsProgress {
    fn stage(&self, stage: ConversionStage) {
        match to_js_value(&stage) {
            Ok(value) => {
                if let Err(e) = self.callback.call1(&JsValue::NULL, &value) {
                    log::error!("stage listener threw: {}", describe(&e));
                }
            }
            Err(e) => log::error!("failed to serialize stage: {e}"),
        }
    }
}

// =============================================================================
// BOARD
// =============================================================================

/// JavaScript-friendly wrapper around [`Board`].
#[wasm_bindgen]
pub struct JsBoard {
    inner: Rc<RefCell<Board<JsStorage>>>,
    config: ServiceConfig,
}

impl JsBoard {
    fn board(&self) -> Ref<'_, Board<JsStorage>> {
        self.inner.borrow()
    }

    fn board_mut(&self) -> RefMut<'_, Board<JsStorage>> {
        self.inner.borrow_mut()
    }
}

#[wasm_bindgen]
impl JsBoard {
    /// Opens the project named in `query` (e.g. `location.search`).
    ///
    /// # Example (JavaScript)
    /// ```js
    /// const board = new JsBoard(window.localStorage, location.search);
    /// ```
    #[wasm_bindgen(constructor)]
    pub fn new(storage: JsValue, query: &str) -> Result<JsBoard, JsValue> {
        let project_id = project_id_from_query(query);
        let inner = js_result!(Board::open(JsStorage::new(storage), project_id))?
            .with_release_hook(revoke_object_url);
        Ok(JsBoard {
            inner: Rc::new(RefCell::new(inner)),
            config: ServiceConfig::default(),
        })
    }

    /// Registers render callbacks: `onPanels(panels, labels)` and
    /// `onScenes(scenes)`.
    #[wasm_bindgen(js_name = setListener)]
    pub fn set_listener(&mut self, on_panels: Option<Function>, on_scenes: Option<Function>) {
        self.board_mut().set_listener(JsListener {
            on_panels,
            on_scenes,
        });
    }

    #[wasm_bindgen(js_name = projectId)]
    pub fn project_id(&self) -> String {
        self.board().project_id().to_string()
    }

    #[wasm_bindgen(js_name = projectTitle)]
    pub fn project_title(&self) -> Result<String, JsValue> {
        js_result!(self.board().project_title())
    }

    #[wasm_bindgen(js_name = renameProject)]
    pub fn rename_project(&mut self, title: &str) -> Result<JsValue, JsValue> {
        let project = js_result!(self.board_mut().rename_project(title))?;
        Ok(to_js_value(&project)?)
    }

    // =========================================================================
    // PANELS
    // =========================================================================

    #[wasm_bindgen(js_name = getPanels)]
    pub fn get_panels(&self) -> Result<JsValue, JsValue> {
        Ok(to_js_value(self.board().panels().as_slice())?)
    }

    /// `"Panel N"` labels in display order.
    #[wasm_bindgen(js_name = panelLabels)]
    pub fn panel_labels(&self) -> Array {
        self.board()
            .positions()
            .iter()
            .map(|p| JsValue::from_str(&p.label()))
            .collect()
    }

    #[wasm_bindgen(js_name = addPanel)]
    pub fn add_panel(&mut self) -> Result<JsValue, JsValue> {
        let panel = js_result!(self.board_mut().add_panel())?;
        Ok(to_js_value(&panel)?)
    }

    /// Adds an image panel for a file the user picked (`URL.createObjectURL`
    /// or a data URL).
    #[wasm_bindgen(js_name = uploadImage)]
    pub fn upload_image(&mut self, url: &str) -> Result<JsValue, JsValue> {
        let panel = js_result!(self.board_mut().upload_image(url))?;
        Ok(to_js_value(&panel)?)
    }

    /// Confirmation text to show before removing, or `undefined`.
    #[wasm_bindgen(js_name = removalPrompt)]
    pub fn removal_prompt(&self, id: &str) -> Option<String> {
        self.board()
            .panels()
            .get(id)
            .and_then(Panel::removal_prompt)
            .map(str::to_string)
    }

    /// Removes a panel. Pass `confirmed = true` once the user accepted the
    /// removal prompt. Returns whether the panel was removed.
    #[wasm_bindgen(js_name = removePanel)]
    pub fn remove_panel(&mut self, id: &str, confirmed: bool) -> Result<bool, JsValue> {
        let removed = js_result!(self.board_mut().remove_panel(id, |_| confirmed))?;
        Ok(removed.is_some())
    }

    #[wasm_bindgen(js_name = setPanelTitle)]
    pub fn set_panel_title(&mut self, id: &str, title: &str) -> Result<(), JsValue> {
        js_result!(self.board_mut().set_panel_title(id, title))
    }

    #[wasm_bindgen(js_name = setPanelNotes)]
    pub fn set_panel_notes(&mut self, id: &str, notes: &str) -> Result<(), JsValue> {
        js_result!(self.board_mut().set_panel_notes(id, notes))
    }

    /// Stores `canvas.toDataURL("image/png")` for a sketch panel.
    #[wasm_bindgen(js_name = setPanelDrawing)]
    pub fn set_panel_drawing(&mut self, id: &str, data_url: &str) -> Result<(), JsValue> {
        js_result!(self.board_mut().set_panel_drawing(id, data_url))
    }

    #[wasm_bindgen(js_name = clearPanelDrawing)]
    pub fn clear_panel_drawing(&mut self, id: &str) -> Result<(), JsValue> {
        js_result!(self.board_mut().clear_panel_drawing(id))
    }

    // =========================================================================
    // DRAG AND GAPS
    // =========================================================================

    #[wasm_bindgen(js_name = beginDrag)]
    pub fn begin_drag(&mut self, id: &str) -> Result<(), JsValue> {
        js_result!(self.board_mut().begin_drag(id))
    }

    /// Pointer is over card `over_id`, whose box starts at `top` and is
    /// `height` tall. Returns whether the visual order changed.
    #[wasm_bindgen(js_name = dragOver)]
    pub fn drag_over(&mut self, over_id: &str, top: f64, height: f64, pointer_y: f64) -> bool {
        self.board_mut()
            .drag_over(over_id, Rect::new(0.0, top, 0.0, height), pointer_y)
    }

    #[wasm_bindgen(js_name = visualOrder)]
    pub fn visual_order(&self) -> Array {
        self.board()
            .visual_order()
            .iter()
            .map(|id| JsValue::from_str(id))
            .collect()
    }

    #[wasm_bindgen(js_name = endDrag)]
    pub fn end_drag(&mut self) -> bool {
        self.board_mut().end_drag()
    }

    #[wasm_bindgen(js_name = cancelDrag)]
    pub fn cancel_drag(&mut self) -> bool {
        self.board_mut().cancel_drag()
    }

    /// Insertion index of the gap nearest the pointer, or `undefined`.
    ///
    /// # Example (JavaScript)
    /// ```js
    /// const cards = [...grid.children].map(el => {
    ///   const r = el.getBoundingClientRect();
    ///   return { id: el.dataset.id, left: r.left, top: r.top, width: r.width, height: r.height };
    /// });
    /// const index = board.resolveGap(cards, event.clientX, event.clientY);
    /// ```
    #[wasm_bindgen(js_name = resolveGap)]
    pub fn resolve_gap(&self, cards: JsValue, x: f64, y: f64) -> Result<Option<u32>, JsValue> {
        let cards: Vec<CardBox> = from_value(cards)?;
        let cards: Vec<CardRect> = cards.into_iter().map(CardRect::from).collect();
        Ok(self
            .inner
            .resolve_gap(&cards, Point::new(x, y))
            .map(|gap| gap.index as u32))
    }

    #[wasm_bindgen(js_name = insertBlankAt)]
    pub fn insert_blank_at(&mut self, index: u32) -> Result<JsValue, JsValue> {
        let panel = js_result!(self.board_mut().insert_blank_at(index as usize))?;
        Ok(to_js_value(&panel)?)
    }

    // =========================================================================
    // SCENES
    // =========================================================================

    #[wasm_bindgen(js_name = getScenes)]
    pub fn get_scenes(&self) -> Result<JsValue, JsValue> {
        Ok(to_js_value(self.board().scenes().list())?)
    }

    #[wasm_bindgen(js_name = addScene)]
    pub fn add_scene(&mut self, title: &str, description: &str) -> Result<JsValue, JsValue> {
        let scene = self.board_mut().add_scene(SceneDraft::new(title, description));
        Ok(to_js_value(&scene)?)
    }

    #[wasm_bindgen(js_name = sceneNeedsConfirmation)]
    pub fn scene_needs_confirmation(&self, id: &str) -> bool {
        self.board()
            .scenes()
            .get(id)
            .is_some_and(Scene::requires_removal_confirmation)
    }

    #[wasm_bindgen(js_name = removeScene)]
    pub fn remove_scene(&mut self, id: &str, confirmed: bool) -> Result<bool, JsValue> {
        let removed = js_result!(self.board_mut().remove_scene(id, |_| confirmed))?;
        Ok(removed.is_some())
    }

    // =========================================================================
    // SETTINGS
    // =========================================================================

    #[wasm_bindgen(js_name = getSettings)]
    pub fn get_settings(&self) -> Result<JsValue, JsValue> {
        let settings = js_result!(self.board().settings())?;
        Ok(to_js_value(&SettingsView::from(&settings))?)
    }

    #[wasm_bindgen(js_name = saveSettings)]
    pub fn save_settings(
        &mut self,
        rewrite_token: &str,
        generation_token: &str,
        aspect: &str,
    ) -> Result<(), JsValue> {
        let settings = Settings {
            rewrite_token: rewrite_token.to_string(),
            generation_token: generation_token.to_string(),
            aspect: js_result!(aspect.parse())?,
        };
        self.board_mut().save_settings(&settings);
        Ok(())
    }

    // =========================================================================
    // CONVERSION
    // =========================================================================

    /// Convert without a selected scene when `false`.
    #[wasm_bindgen(js_name = setRequireScene)]
    pub fn set_require_scene(&mut self, require_scene: bool) {
        self.config.require_scene = require_scene;
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
impl JsBoard {
    /// Runs the conversion for one sketch panel over `fetch`.
    ///
    /// Resolves with `{panelId, rewrittenPrompt, imageUrl, pollAttempts,
    /// rawResponse}` after the panel has become an image panel. Rejects with
    /// the error message and leaves the panel as it was. `onStage` receives
    /// `{stage: "rewriting" | "generating" | "polling", ...}`.
    ///
    /// # Example (JavaScript)
    /// ```js
    /// const report = await board.convertPanel(panelId, sceneId, details, null, null,
    ///   s => status.textContent = s.stage);
    /// ```
    #[wasm_bindgen(js_name = convertPanel)]
    pub fn convert_panel(
        &self,
        panel_id: &str,
        scene_id: Option<String>,
        details: &str,
        rewrite_token: Option<String>,
        generation_token: Option<String>,
        on_stage: Option<Function>,
    ) -> Promise {
        let mut request = ConversionRequest::new(panel_id)
            .with_details(details)
            .with_credentials(Credentials {
                rewrite: rewrite_token,
                generation: generation_token,
            });
        request.scene_id = scene_id;

        let mut pipeline = ConversionPipeline::new(FetchTransport::new(), self.config.clone());
        if let Some(callback) = on_stage {
            pipeline = pipeline.with_progress(JsProgress { callback });
        }
        let board = Rc::clone(&self.inner);

        future_to_promise(async move {
            let require_scene = pipeline.config().require_scene;
            let input = js_result!(board.borrow().prepare_conversion(&request, require_scene))?;
            let report = pipeline
                .run(&input)
                .await
                .map_err(|e| JsValue::from_str(&e.to_string()))?;
            js_result!(board
                .borrow_mut()
                .apply_conversion(&report.panel_id, &report.image_url))?;
            Ok::<JsValue, JsValue>(to_js_value(&report)?)
        })
    }
}

// =============================================================================
// HOME PAGE
// =============================================================================

/// Project list operations for the home page.
#[wasm_bindgen]
pub struct JsProjects {
    storage: JsStorage,
}

#[wasm_bindgen]
impl JsProjects {
    #[wasm_bindgen(constructor)]
    pub fn new(storage: JsValue) -> JsProjects {
        JsProjects {
            storage: JsStorage::new(storage),
        }
    }

    /// Newest first.
    pub fn list(&mut self) -> Result<JsValue, JsValue> {
        let projects = js_result!(ProjectRegistry::new(&mut self.storage).list())?;
        Ok(to_js_value(&projects)?)
    }

    /// Both service tokens are stored; the home page gates project
    /// creation on it.
    #[wasm_bindgen(js_name = hasCredentials)]
    pub fn has_credentials(&self) -> Result<bool, JsValue> {
        Ok(js_result!(self.storage.load_settings())?.has_credentials())
    }

    pub fn create(&mut self, name: Option<String>) -> Result<JsValue, JsValue> {
        let project = js_result!(ProjectRegistry::new(&mut self.storage).create(name.as_deref()))?;
        Ok(to_js_value(&project)?)
    }

    pub fn rename(&mut self, id: &str, title: &str) -> Result<JsValue, JsValue> {
        let project = js_result!(ProjectRegistry::new(&mut self.storage).rename(id, title))?;
        Ok(to_js_value(&project)?)
    }

    #[wasm_bindgen(js_name = deleteProject)]
    pub fn delete(&mut self, id: &str) -> Result<bool, JsValue> {
        js_result!(ProjectRegistry::new(&mut self.storage).delete(id))
    }

    pub fn thumbnail(&mut self, id: &str) -> Result<String, JsValue> {
        js_result!(ProjectRegistry::new(&mut self.storage).thumbnail(id))
    }
}
