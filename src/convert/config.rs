//! Service configuration for the conversion pipeline.

use std::time::Duration;

/// Chat completion endpoint used to rewrite prompts.
pub const DEFAULT_REWRITE_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
/// Vision-capable model that reads the sketch.
pub const DEFAULT_REWRITE_MODEL: &str = "gpt-5.1";
/// Completion budget for the rewritten prompt.
pub const DEFAULT_REWRITE_MAX_TOKENS: u32 = 300;
/// Image generation endpoint.
pub const DEFAULT_GENERATION_ENDPOINT: &str = "https://engine.prod.bria-api.com/v2/image/generate";

/// Status polling cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay before every attempt
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1200),
            max_attempts: 25,
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

/// Endpoints and knobs for both external services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub rewrite_endpoint: String,
    pub rewrite_model: String,
    pub rewrite_max_tokens: u32,
    pub generation_endpoint: String,
    pub poll: PollConfig,
    /// Refuse to convert without a selected scene
    pub require_scene: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            rewrite_endpoint: DEFAULT_REWRITE_ENDPOINT.to_string(),
            rewrite_model: DEFAULT_REWRITE_MODEL.to_string(),
            rewrite_max_tokens: DEFAULT_REWRITE_MAX_TOKENS,
            generation_endpoint: DEFAULT_GENERATION_ENDPOINT.to_string(),
            poll: PollConfig::default(),
            require_scene: true,
        }
    }
}

impl ServiceConfig {
    pub fn with_rewrite_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.rewrite_endpoint = endpoint.into();
        self
    }

    pub fn with_rewrite_model(mut self, model: impl Into<String>) -> Self {
        self.rewrite_model = model.into();
        self
    }

    pub fn with_generation_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.generation_endpoint = endpoint.into();
        self
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_require_scene(mut self, require_scene: bool) -> Self {
        self.require_scene = require_scene;
        self
    }
}
