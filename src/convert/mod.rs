//! Sketch-to-image conversion.
//!
//! A conversion is two sequential calls: a vision chat completion rewrites the
//! user's prompt against the sketch, then an image service renders it, either
//! directly or through a status URL that is polled.

pub mod config;
pub mod pipeline;
pub mod prompt;
pub mod response;
pub mod transport;

use std::fmt;

use thiserror::Error;

pub use config::{PollConfig, ServiceConfig};
pub use pipeline::{
    ConversionInput, ConversionPipeline, ConversionProgress, ConversionReport, ConversionRequest,
    ConversionStage, Credentials,
};
pub use response::{GenerationOutcome, PollOutcome};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, MaybeSendSync, TransportError};

#[cfg(feature = "http")]
pub use transport::ReqwestTransport;

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub use transport::FetchTransport;

/// The two external services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Rewrite,
    Generation,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Rewrite => write!(f, "prompt rewrite"),
            Service::Generation => write!(f, "image generation"),
        }
    }
}

/// Reasons a conversion is refused before any request is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("Panel not found: {0}")]
    PanelNotFound(String),

    #[error("Panel {0} has no sketch to convert")]
    NoSketch(String),

    #[error("Missing API token for the {0} service")]
    MissingCredential(Service),

    #[error("Select a scene before generating")]
    NoSceneSelected,

    #[error("Scene not found: {0}")]
    SceneNotFound(String),
}

/// Conversion pipeline errors.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    /// Any failure of the rewrite stage
    #[error("Prompt rewrite failed: {0}")]
    RewriteFailed(#[source] Box<ConvertError>),

    #[error("{0} service returned no usable text")]
    EmptyResponse(Service),

    /// Non-success status or explicit error payload
    #[error("{service} service error ({status}): {message}")]
    Remote {
        service: Service,
        status: u16,
        message: String,
    },

    #[error("Status check failed ({status}): {body}")]
    PollFailed { status: u16, body: String },

    #[error("Timed out after {attempts} status checks without receiving an image")]
    PollTimeout { attempts: u32 },

    #[error("{service} request failed: {message}")]
    Transport { service: Service, message: String },

    #[error("Failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ConvertError {
    pub fn remote(service: Service, status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            service,
            status,
            message: message.into(),
        }
    }

    pub fn transport(service: Service, err: TransportError) -> Self {
        Self::Transport {
            service,
            message: err.0,
        }
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, ConvertError::Precondition(_))
    }
}
