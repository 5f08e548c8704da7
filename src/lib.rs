//! Sketch2Story - storyboard state and sketch-to-image conversion.
//!
//! This crate is the core of a browser storyboarding tool:
//!
//! - **Boards**: per-project panels (sketches or images) and scenes, kept in
//!   one authoritative order and written to key-value storage after every change
//! - **Drag and gaps**: an explicit drag state machine and nearest-gap
//!   resolution over the rendered card grid
//! - **Conversion**: a sketch is turned into a generated image by a prompt
//!   rewrite followed by image generation and status polling
//!
//! # Example
//!
//! ```rust
//! use sketch2story::{Board, MemoryStore, SceneDraft};
//!
//! let mut board = Board::open(MemoryStore::new(), "default").unwrap();
//!
//! let panel = board.add_panel().unwrap();
//! board.set_panel_title(&panel.id, "Opening shot").unwrap();
//! board.add_scene(SceneDraft::new("Intro", "A kitchen at dawn"));
//!
//! assert_eq!(board.positions()[0].label(), "Panel 1");
//! ```

pub mod error;

// Board module
pub mod board;

// Persistence
pub mod store;

// Conversion pipeline
pub mod convert;

// Re-exports for convenience
pub use error::{StoryError, StoryResult};
pub use board::{
    AspectRatio, Board, BoardListener, Panel, PanelMode, Project, ProjectRegistry, Scene, SceneDraft,
    Settings,
};
pub use convert::{
    ConversionPipeline, ConversionReport, ConversionRequest, ConvertError, Credentials, HttpTransport,
    ServiceConfig,
};
pub use store::{DirStore, KeyValueStore, MemoryStore, StoreExt};

#[cfg(feature = "http")]
pub use convert::ReqwestTransport;

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub use convert::FetchTransport;

#[cfg(feature = "wasm")]
pub use board::wasm::{JsBoard, JsProjects};
