//! Prompt assembly and the rewrite request body.

use serde::Serialize;

use crate::board::model::{AspectRatio, Scene};

/// Used when the user leaves the detail field blank.
pub const DEFAULT_USER_PROMPT: &str = "Generate a storyboard frame based on this layout.";
pub const NO_DESCRIPTION: &str = "No description provided.";

/// Standing instructions for the rewrite service.
pub const REWRITE_INSTRUCTIONS: &str = "You turn rough storyboard sketches into prompts for an image model. \
State what the sketch shows as plain fact, without words such as \"appears\", \"seems\" or \"likely\". \
Describe elements in the same left-to-right order they are drawn, and reorder the user's request if it lists them differently. \
Carry every piece of scene text you are given into the prompt so that none of it is ambiguous. \
Do not introduce any character, object or setting that is not in the sketch. \
The first image is the sketch to follow; images labeled left and right are the neighboring frames and are context only.";

/// Which image a payload is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLabel {
    Sketch,
    Left,
    Right,
}

impl ImageLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageLabel::Sketch => "sketch",
            ImageLabel::Left => "left",
            ImageLabel::Right => "right",
        }
    }

    /// Caption sent before the image part.
    pub fn file_name(&self) -> String {
        format!("{}.png", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledImage {
    pub label: ImageLabel,
    pub url: String,
}

impl LabeledImage {
    pub fn new(label: ImageLabel, url: impl Into<String>) -> Self {
        Self {
            label,
            url: url.into(),
        }
    }
}

/// `Scene title: <t>; Description: <d>` with placeholders for blank fields.
pub fn scene_context(scene: &Scene) -> String {
    let description = scene.description.trim();
    format!(
        "Scene title: {}; Description: {}",
        scene.display_title(),
        if description.is_empty() {
            NO_DESCRIPTION
        } else {
            description
        }
    )
}

/// Scene context followed by the user's detail text.
pub fn combined_prompt(scene: Option<&Scene>, details: &str) -> String {
    let details = match details.trim() {
        "" => DEFAULT_USER_PROMPT,
        d => d,
    };
    match scene {
        Some(scene) => format!("{}\n{}", scene_context(scene), details),
        None => details.to_string(),
    }
}

fn user_instruction(combined: &str) -> String {
    format!(
        "The user wants: \"{combined}\". Rewrite this into one image prompt that matches the attached sketch exactly. \
         Keep the sketch's left-to-right order and the scene details. Reply with the prompt only."
    )
}

// =============================================================================
// WIRE FORMAT
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ImageRef {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageRef },
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: MessageContent,
}

/// Body posted to the chat completion endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RewriteRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_completion_tokens: u32,
}

impl RewriteRequest {
    /// System instructions, then one user message: the prompt text followed by
    /// a caption and an image part per labeled image.
    pub fn new(model: &str, max_tokens: u32, combined: &str, images: &[LabeledImage]) -> Self {
        let mut parts = vec![ContentPart::Text {
            text: user_instruction(combined),
        }];
        for image in images {
            parts.push(ContentPart::Text {
                text: image.label.file_name(),
            });
            parts.push(ContentPart::ImageUrl {
                image_url: ImageRef {
                    url: image.url.clone(),
                },
            });
        }

        Self {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(REWRITE_INSTRUCTIONS.to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(parts),
                },
            ],
            max_completion_tokens: max_tokens,
        }
    }
}

/// Body posted to the generation endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub aspect_ratio: String,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, aspect: AspectRatio) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio: aspect.as_str().to_string(),
        }
    }
}
