//! Error types for the storyboard board, store and conversion pipeline.

use thiserror::Error;

use crate::convert::ConvertError;

/// Result type alias for storyboard operations.
pub type StoryResult<T> = Result<T, StoryError>;

/// Errors that can occur while editing or persisting a storyboard.
#[derive(Error, Debug)]
pub enum StoryError {
    /// Panel not found in the collection.
    #[error("Panel not found: {0}")]
    PanelNotFound(String),

    /// Scene not found in the collection.
    #[error("Scene not found: {0}")]
    SceneNotFound(String),

    /// Project not found in the registry.
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    /// Panel creation was asked for something the mode cannot hold.
    #[error("Invalid panel: {0}")]
    InvalidPanel(String),

    /// Stored or supplied setting has an unsupported value.
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    /// Drag state machine received an event it cannot accept in its current state.
    #[error("Invalid drag transition: {0}")]
    InvalidDragTransition(String),

    /// Persistence backend failed to read or write a key.
    #[error("Storage error on '{key}': {message}")]
    Storage { key: String, message: String },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Conversion pipeline failure.
    #[error(transparent)]
    Convert(#[from] ConvertError),
}

impl StoryError {
    /// Creates a PanelNotFound error.
    pub fn panel_not_found(id: impl Into<String>) -> Self {
        Self::PanelNotFound(id.into())
    }

    /// Creates a SceneNotFound error.
    pub fn scene_not_found(id: impl Into<String>) -> Self {
        Self::SceneNotFound(id.into())
    }

    /// Creates a ProjectNotFound error.
    pub fn project_not_found(id: impl Into<String>) -> Self {
        Self::ProjectNotFound(id.into())
    }

    /// Creates an InvalidPanel error.
    pub fn invalid_panel(msg: impl Into<String>) -> Self {
        Self::InvalidPanel(msg.into())
    }

    /// Creates an InvalidSetting error.
    pub fn invalid_setting(msg: impl Into<String>) -> Self {
        Self::InvalidSetting(msg.into())
    }

    /// Creates an InvalidDragTransition error.
    pub fn invalid_drag(msg: impl Into<String>) -> Self {
        Self::InvalidDragTransition(msg.into())
    }

    /// Creates a Storage error.
    pub fn storage(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            key: key.into(),
            message: message.into(),
        }
    }
}
