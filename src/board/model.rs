//! Data models for projects, panels, scenes and settings.
//!
//! Field names on the wire match the records the browser build keeps in
//! `localStorage`, so existing boards load without migration.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use crate::error::{StoryError, StoryResult};

/// Project id used when the navigation surface carries none.
pub const DEFAULT_PROJECT_ID: &str = "default";
/// Title given to projects renamed to nothing.
pub const UNTITLED_PROJECT: &str = "Untitled project";
/// Display label for scenes without a title.
pub const UNTITLED_SCENE: &str = "Untitled scene";

/// Generates a fresh record id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Wraps raw PNG bytes as a `data:` URL, the form sketches are stored in.
pub fn png_data_url(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", BASE64.encode(bytes))
}

// =============================================================================
// PROJECT
// =============================================================================

/// Registry entry for one storyboard project.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    pub id: String,
    pub title: String,
    /// Milliseconds since epoch
    pub created_at: i64,
}

impl Project {
    /// Creates a new Project with the given ID and title.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            created_at: 0,
        }
    }

    /// Builder: Set creation timestamp.
    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }
}

// =============================================================================
// PANEL
// =============================================================================

/// Which payload of a panel is active.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PanelMode {
    /// Freehand sketch; `drawing` is active.
    #[default]
    #[serde(alias = "draw")]
    Sketch,
    /// Uploaded or generated image; `image_url` is active.
    Image,
}

impl fmt::Display for PanelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sketch => write!(f, "sketch"),
            Self::Image => write!(f, "image"),
        }
    }
}

/// One storyboard frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Panel {
    pub id: String,
    pub title: String,
    pub notes: String,
    pub mode: PanelMode,
    /// Encoded raster (`data:image/png;base64,...`) while in sketch mode
    pub drawing: Option<String>,
    /// Image location while in image mode
    pub image_url: Option<String>,
}

impl Panel {
    /// Creates an empty sketch panel.
    pub fn sketch(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Creates an image panel. The URL must not be blank.
    pub fn image(id: impl Into<String>, image_url: impl Into<String>) -> StoryResult<Self> {
        let image_url = image_url.into();
        if image_url.trim().is_empty() {
            return Err(StoryError::invalid_panel("image panel requires a source URL"));
        }
        Ok(Self {
            id: id.into(),
            mode: PanelMode::Image,
            image_url: Some(image_url),
            ..Default::default()
        })
    }

    /// Builder: Set title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Builder: Set notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Builder: Set drawing data.
    pub fn with_drawing(mut self, drawing: impl Into<String>) -> Self {
        self.drawing = Some(drawing.into());
        self
    }

    /// Whether a sketch panel carries rendered content.
    pub fn has_sketch_content(&self) -> bool {
        self.mode == PanelMode::Sketch && self.drawing.as_deref().is_some_and(|d| !d.is_empty())
    }

    /// The imagery this panel currently shows, selected by mode.
    pub fn image_source(&self) -> Option<&str> {
        let source = match self.mode {
            PanelMode::Image => self.image_url.as_deref(),
            PanelMode::Sketch => self.drawing.as_deref(),
        };
        source.filter(|s| !s.is_empty())
    }

    /// Whether the image URL is a page-scoped object URL that must be released.
    pub fn holds_transient_url(&self) -> bool {
        self.image_url.as_deref().is_some_and(|u| u.starts_with("blob:"))
    }

    /// Confirmation message to show before removal, or `None` if the panel
    /// can be removed silently.
    pub fn removal_prompt(&self) -> Option<&'static str> {
        if self.mode == PanelMode::Image {
            return Some("Remove this image panel? This action cannot be undone.");
        }
        let has_title = !self.title.trim().is_empty();
        let has_notes = !self.notes.trim().is_empty();
        if has_title || has_notes || self.drawing.is_some() {
            Some("Remove this panel? Its sketch and notes will be lost.")
        } else {
            None
        }
    }
}

// =============================================================================
// SCENE
// =============================================================================

/// Named narrative unit referenced by panels during conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Scene {
    pub id: String,
    pub title: String,
    pub description: String,
}

impl Scene {
    /// Creates a new Scene with the given ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Builder: Set title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Builder: Set description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Title for display, falling back to a placeholder.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            UNTITLED_SCENE
        } else {
            &self.title
        }
    }

    /// Scenes with any text need confirmation before removal.
    pub fn requires_removal_confirmation(&self) -> bool {
        !self.title.trim().is_empty() || !self.description.trim().is_empty()
    }
}

// =============================================================================
// SETTINGS
// =============================================================================

/// Output aspect ratio accepted by the generation service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AspectRatio {
    Square,
    Portrait2x3,
    Landscape3x2,
    Portrait3x4,
    Landscape4x3,
    Portrait4x5,
    Landscape5x4,
    Portrait9x16,
    #[default]
    Widescreen,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 9] = [
        Self::Square,
        Self::Portrait2x3,
        Self::Landscape3x2,
        Self::Portrait3x4,
        Self::Landscape4x3,
        Self::Portrait4x5,
        Self::Landscape5x4,
        Self::Portrait9x16,
        Self::Widescreen,
    ];

    /// Wire form, e.g. `"16:9"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Portrait2x3 => "2:3",
            Self::Landscape3x2 => "3:2",
            Self::Portrait3x4 => "3:4",
            Self::Landscape4x3 => "4:3",
            Self::Portrait4x5 => "4:5",
            Self::Landscape5x4 => "5:4",
            Self::Portrait9x16 => "9:16",
            Self::Widescreen => "16:9",
        }
    }

    /// CSS `aspect-ratio` value, e.g. `"16 / 9"`.
    pub fn css_ratio(&self) -> String {
        self.as_str().replace(':', " / ")
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = StoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| StoryError::invalid_setting(format!("unsupported aspect ratio '{s}'")))
    }
}

/// Global user settings: service credentials and output aspect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    /// Credential for the prompt rewrite service
    pub rewrite_token: String,
    /// Credential for the image generation service
    pub generation_token: String,
    pub aspect: AspectRatio,
}

impl Settings {
    /// Both credentials are present.
    pub fn has_credentials(&self) -> bool {
        !self.rewrite_token.trim().is_empty() && !self.generation_token.trim().is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
