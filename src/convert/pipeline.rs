//! Rewrite, generate, poll.

use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::board::model::{AspectRatio, Panel, Scene, Settings};
use crate::board::panels::PanelCollection;
use crate::board::scenes::SceneCollection;
use crate::convert::config::ServiceConfig;
use crate::convert::prompt::{combined_prompt, GenerationRequest, ImageLabel, LabeledImage, RewriteRequest};
use crate::convert::response::{self, GenerationOutcome, PollOutcome};
use crate::convert::transport::{HttpRequest, HttpResponse, HttpTransport, MaybeSendSync};
use crate::convert::{ConvertError, PreconditionError, Service};

// =============================================================================
// INPUTS
// =============================================================================

/// Service tokens. Blank strings count as missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub rewrite: Option<String>,
    pub generation: Option<String>,
}

impl Credentials {
    pub fn new(rewrite: impl Into<String>, generation: impl Into<String>) -> Self {
        Self {
            rewrite: Some(rewrite.into()),
            generation: Some(generation.into()),
        }
    }

    /// Entered tokens override stored ones.
    pub fn resolve(&self, stored: &Settings) -> ResolvedCredentials {
        fn pick(entered: Option<&str>, stored: &str) -> Option<String> {
            entered
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .or_else(|| Some(stored.trim()).filter(|t| !t.is_empty()))
                .map(str::to_string)
        }
        ResolvedCredentials {
            rewrite: pick(self.rewrite.as_deref(), &stored.rewrite_token),
            generation: pick(self.generation.as_deref(), &stored.generation_token),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedCredentials {
    pub rewrite: Option<String>,
    pub generation: Option<String>,
}

/// What the user asked for.
#[derive(Debug, Clone, Default)]
pub struct ConversionRequest {
    pub panel_id: String,
    pub scene_id: Option<String>,
    /// Free-text detail; blank uses the default prompt
    pub details: String,
    /// Tokens typed in for this run
    pub entered: Credentials,
}

impl ConversionRequest {
    pub fn new(panel_id: impl Into<String>) -> Self {
        Self {
            panel_id: panel_id.into(),
            ..Default::default()
        }
    }

    pub fn with_scene(mut self, scene_id: impl Into<String>) -> Self {
        self.scene_id = Some(scene_id.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    pub fn with_credentials(mut self, entered: Credentials) -> Self {
        self.entered = entered;
        self
    }
}

/// Snapshot of everything one run needs. Detached from the board so the
/// board can be mutated only once the run succeeds.
#[derive(Debug, Clone)]
pub struct ConversionInput {
    pub panel_id: String,
    pub sketch: String,
    pub left: Option<String>,
    pub right: Option<String>,
    pub scene: Option<Scene>,
    pub details: String,
    pub rewrite_token: String,
    pub generation_token: String,
    pub aspect: AspectRatio,
}

impl ConversionInput {
    /// Checks preconditions in order: sketch, generation token, rewrite
    /// token, scene.
    pub fn prepare(
        panels: &PanelCollection,
        scenes: &SceneCollection,
        request: &ConversionRequest,
        settings: &Settings,
        require_scene: bool,
    ) -> Result<Self, PreconditionError> {
        let panel = panels
            .get(&request.panel_id)
            .ok_or_else(|| PreconditionError::PanelNotFound(request.panel_id.clone()))?;
        let sketch = match (panel.has_sketch_content(), panel.drawing.as_deref()) {
            (true, Some(d)) => d.to_string(),
            _ => return Err(PreconditionError::NoSketch(panel.id.clone())),
        };

        let tokens = request.entered.resolve(settings);
        let generation_token = tokens
            .generation
            .ok_or(PreconditionError::MissingCredential(Service::Generation))?;
        let rewrite_token = tokens
            .rewrite
            .ok_or(PreconditionError::MissingCredential(Service::Rewrite))?;

        let scene = match request.scene_id.as_deref().filter(|s| !s.is_empty()) {
            Some(id) => Some(
                scenes
                    .get(id)
                    .cloned()
                    .ok_or_else(|| PreconditionError::SceneNotFound(id.to_string()))?,
            ),
            None if require_scene => return Err(PreconditionError::NoSceneSelected),
            None => None,
        };

        let (left, right) = panels.neighbors(&panel.id);
        let source = |p: Option<&Panel>| p.and_then(Panel::image_source).map(str::to_string);

        Ok(Self {
            panel_id: panel.id.clone(),
            sketch,
            left: source(left),
            right: source(right),
            scene,
            details: request.details.clone(),
            rewrite_token,
            generation_token,
            aspect: settings.aspect,
        })
    }

    /// Sketch first, then whichever neighbors have imagery.
    pub fn images(&self) -> Vec<LabeledImage> {
        let mut images = vec![LabeledImage::new(ImageLabel::Sketch, &self.sketch)];
        if let Some(left) = &self.left {
            images.push(LabeledImage::new(ImageLabel::Left, left));
        }
        if let Some(right) = &self.right {
            images.push(LabeledImage::new(ImageLabel::Right, right));
        }
        images
    }
}

// =============================================================================
// OUTPUTS
// =============================================================================

/// A successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionReport {
    pub panel_id: String,
    pub rewritten_prompt: String,
    pub image_url: String,
    /// 0 when the image came back directly
    pub poll_attempts: u32,
    /// Body of the response that carried the image URL
    pub raw_response: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ConversionStage {
    Rewriting,
    Generating,
    Polling { attempt: u32, max_attempts: u32 },
}

/// Observer for long-running stages (spinners, status lines).
pub trait ConversionProgress: MaybeSendSync {
    fn stage(&self, stage: ConversionStage);
}

// =============================================================================
// PIPELINE
// =============================================================================

pub struct ConversionPipeline<T: HttpTransport> {
    transport: T,
    config: ServiceConfig,
    progress: Option<Box<dyn ConversionProgress>>,
}

impl<T: HttpTransport> ConversionPipeline<T> {
    pub fn new(transport: T, config: ServiceConfig) -> Self {
        Self {
            transport,
            config,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: impl ConversionProgress + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn report(&self, stage: ConversionStage) {
        if let Some(progress) = &self.progress {
            progress.stage(stage);
        }
    }

    /// Runs both services for one snapshot. Never touches board state.
    pub async fn run(&self, input: &ConversionInput) -> Result<ConversionReport, ConvertError> {
        self.report(ConversionStage::Rewriting);
        let combined = combined_prompt(input.scene.as_ref(), &input.details);
        let rewritten = self
            .rewrite(&combined, &input.images(), &input.rewrite_token)
            .await
            .map_err(|e| ConvertError::RewriteFailed(Box::new(e)))?;
        info!("rewrote prompt for panel {}", input.panel_id);

        self.report(ConversionStage::Generating);
        let (outcome, status, body) = self
            .generate(&rewritten, input.aspect, &input.generation_token)
            .await?;

        let (image_url, poll_attempts, raw_response) = match outcome {
            GenerationOutcome::Success { image_url } => (image_url, 0, body),
            GenerationOutcome::Pending { status_url } => {
                self.poll(&status_url, &input.generation_token).await?
            }
            GenerationOutcome::Failure { message } => {
                return Err(ConvertError::remote(Service::Generation, status, message));
            }
        };

        Ok(ConversionReport {
            panel_id: input.panel_id.clone(),
            rewritten_prompt: rewritten,
            image_url,
            poll_attempts,
            raw_response,
        })
    }

    async fn rewrite(
        &self,
        combined: &str,
        images: &[LabeledImage],
        token: &str,
    ) -> Result<String, ConvertError> {
        let body = RewriteRequest::new(
            &self.config.rewrite_model,
            self.config.rewrite_max_tokens,
            combined,
            images,
        );
        let request = HttpRequest::post_json(&self.config.rewrite_endpoint, serde_json::to_value(body)?)
            .header("Authorization", format!("Bearer {token}"));

        debug!("POST {} with {} image(s)", self.config.rewrite_endpoint, images.len());
        let resp = self
            .transport
            .send(request)
            .await
            .map_err(|e| ConvertError::transport(Service::Rewrite, e))?;
        let data = read_json(&resp, Service::Rewrite)?;
        if let Some(message) = response::error_message(&data) {
            return Err(ConvertError::remote(Service::Rewrite, resp.status, message));
        }
        response::rewrite_text(&data).ok_or(ConvertError::EmptyResponse(Service::Rewrite))
    }

    async fn generate(
        &self,
        prompt: &str,
        aspect: AspectRatio,
        token: &str,
    ) -> Result<(GenerationOutcome, u16, String), ConvertError> {
        let body = serde_json::to_value(GenerationRequest::new(prompt, aspect))?;
        let request = HttpRequest::post_json(&self.config.generation_endpoint, body).header("api_token", token);

        debug!("POST {} (aspect {aspect})", self.config.generation_endpoint);
        let resp = self
            .transport
            .send(request)
            .await
            .map_err(|e| ConvertError::transport(Service::Generation, e))?;
        let data = read_json(&resp, Service::Generation)?;
        Ok((GenerationOutcome::from_value(&data), resp.status, resp.body))
    }

    /// Sleeps one interval before every attempt. Transport errors are retried
    /// until the budget runs out; reported failures end polling at once.
    async fn poll(&self, status_url: &str, token: &str) -> Result<(String, u32, String), ConvertError> {
        let max_attempts = self.config.poll.max_attempts;
        for attempt in 1..=max_attempts {
            pause(self.config.poll.interval).await;
            self.report(ConversionStage::Polling {
                attempt,
                max_attempts,
            });

            let request = HttpRequest::get(status_url).header("api_token", token);
            let resp = match self.transport.send(request).await {
                Ok(resp) => resp,
                Err(e) if attempt < max_attempts => {
                    warn!("status check {attempt}/{max_attempts} failed: {e}");
                    continue;
                }
                Err(e) => return Err(ConvertError::transport(Service::Generation, e)),
            };

            let data = response::parse_body(&resp.body).unwrap_or_else(|e| {
                warn!("status check {attempt}/{max_attempts} returned unparseable body: {e}");
                response::empty()
            });
            match PollOutcome::from_response(resp.status, &data) {
                PollOutcome::Ready { image_url } => return Ok((image_url, attempt, resp.body)),
                PollOutcome::Failed { state } => {
                    debug!("status check ended in state {state:?}");
                    return Err(ConvertError::PollFailed {
                        status: resp.status,
                        body: resp.body,
                    });
                }
                PollOutcome::Pending { state } => {
                    debug!("status check {attempt}/{max_attempts}: {}", state.as_deref().unwrap_or("pending"));
                }
            }
        }
        Err(ConvertError::PollTimeout {
            attempts: max_attempts,
        })
    }
}

#[cfg(not(all(feature = "wasm", target_arch = "wasm32")))]
async fn pause(interval: Duration) {
    tokio::time::sleep(interval).await;
}

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
async fn pause(interval: Duration) {
    gloo_timers::future::sleep(interval).await;
}

/// Parses a service body. Unparseable success bodies fall back to an empty
/// object; any non-success status is a remote error.
fn read_json(resp: &HttpResponse, service: Service) -> Result<Value, ConvertError> {
    let parsed = response::parse_body(&resp.body);
    if !resp.is_success() {
        let message = parsed
            .ok()
            .and_then(|data| response::error_message(&data))
            .unwrap_or_else(|| match resp.body.trim() {
                "" => format!("HTTP {}", resp.status),
                body => body.to_string(),
            });
        return Err(ConvertError::remote(service, resp.status, message));
    }
    Ok(parsed.unwrap_or_else(|e| {
        warn!("{service} response was not JSON: {e}");
        response::empty()
    }))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::model::Panel;
    use crate::board::scenes::SceneDraft;
    use crate::convert::config::PollConfig;
    use crate::convert::transport::testing::ScriptedTransport;

    const REWRITE_OK: &str = r#"{"choices":[{"message":{"content":"A chef in a kitchen, close up."}}]}"#;
    const STATUS_URL: &str = "https://status.example/req-1";

    fn config() -> ServiceConfig {
        ServiceConfig::default().with_poll(PollConfig::new(Duration::ZERO, 25))
    }

    fn settings() -> Settings {
        Settings {
            rewrite_token: "sk-rewrite".into(),
            generation_token: "bria-token".into(),
            ..Default::default()
        }
    }

    fn board_state() -> (PanelCollection, SceneCollection, String) {
        let panels = PanelCollection::from_panels(vec![
            Panel::image("left", "https://img/left.png").unwrap(),
            Panel::sketch("p-1").with_drawing("data:image/png;base64,SKETCH"),
            Panel::sketch("right"),
        ]);
        let mut scenes = SceneCollection::new();
        let scene = scenes.create(SceneDraft::new("Intro", "A kitchen"));
        (panels, scenes, scene.id)
    }

    fn input() -> ConversionInput {
        let (panels, scenes, scene_id) = board_state();
        let request = ConversionRequest::new("p-1")
            .with_scene(scene_id)
            .with_details("close up");
        ConversionInput::prepare(&panels, &scenes, &request, &settings(), true).unwrap()
    }

    #[test]
    fn test_prepare_collects_neighbors() {
        let input = input();
        assert_eq!(input.left.as_deref(), Some("https://img/left.png"));
        // empty sketch neighbor contributes nothing
        assert_eq!(input.right, None);
        let labels: Vec<_> = input.images().iter().map(|i| i.label).collect();
        assert_eq!(labels, vec![ImageLabel::Sketch, ImageLabel::Left]);
    }

    #[test]
    fn test_prepare_uses_drawn_sketch_neighbor() {
        let (mut panels, scenes, scene_id) = board_state();
        panels.set_drawing("right", "data:image/png;base64,RIGHT").unwrap();
        let request = ConversionRequest::new("p-1").with_scene(scene_id);

        let input = ConversionInput::prepare(&panels, &scenes, &request, &settings(), true).unwrap();
        assert_eq!(input.right.as_deref(), Some("data:image/png;base64,RIGHT"));
        let images = input.images();
        let right = images.iter().find(|i| i.label == ImageLabel::Right).unwrap();
        assert_eq!(right.url, "data:image/png;base64,RIGHT");
        assert_eq!(
            images.iter().map(|i| i.label).collect::<Vec<_>>(),
            vec![ImageLabel::Sketch, ImageLabel::Left, ImageLabel::Right]
        );
    }

    #[test]
    fn test_prepare_preconditions() {
        let (panels, scenes, scene_id) = board_state();

        let empty = ConversionRequest::new("right").with_scene(scene_id.clone());
        assert_eq!(
            ConversionInput::prepare(&panels, &scenes, &empty, &settings(), true).unwrap_err(),
            PreconditionError::NoSketch("right".into())
        );

        let request = ConversionRequest::new("p-1").with_scene(scene_id.clone());
        assert_eq!(
            ConversionInput::prepare(&panels, &scenes, &request, &Settings::default(), true).unwrap_err(),
            PreconditionError::MissingCredential(Service::Generation)
        );

        let only_generation = Settings {
            generation_token: "bria".into(),
            rewrite_token: "   ".into(),
            ..Default::default()
        };
        assert_eq!(
            ConversionInput::prepare(&panels, &scenes, &request, &only_generation, true).unwrap_err(),
            PreconditionError::MissingCredential(Service::Rewrite)
        );

        let entered = request
            .clone()
            .with_credentials(Credentials::new("typed-rewrite", ""));
        let input = ConversionInput::prepare(&panels, &scenes, &entered, &only_generation, true).unwrap();
        assert_eq!(input.rewrite_token, "typed-rewrite");
        assert_eq!(input.generation_token, "bria");

        let no_scene = ConversionRequest::new("p-1");
        assert_eq!(
            ConversionInput::prepare(&panels, &scenes, &no_scene, &settings(), true).unwrap_err(),
            PreconditionError::NoSceneSelected
        );
        assert!(ConversionInput::prepare(&panels, &scenes, &no_scene, &settings(), false).is_ok());
    }

    #[tokio::test]
    async fn test_direct_image_result() {
        let transport = ScriptedTransport::new()
            .respond(200, REWRITE_OK)
            .respond(200, r#"{"result":{"image_url":"https://img/out.png"}}"#);
        let pipeline = ConversionPipeline::new(transport, config());

        let report = pipeline.run(&input()).await.unwrap();
        assert_eq!(report.image_url, "https://img/out.png");
        assert_eq!(report.rewritten_prompt, "A chef in a kitchen, close up.");
        assert_eq!(report.poll_attempts, 0);

        let requests = pipeline.transport().requests();
        assert_eq!(requests.len(), 2);

        let rewrite = &requests[0];
        assert_eq!(rewrite.header_value("authorization"), Some("Bearer sk-rewrite"));
        let body = rewrite.body.as_ref().unwrap();
        let text = body["messages"][1]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("Intro"));
        assert!(text.contains("A kitchen"));
        assert!(text.contains("close up"));

        let generate = &requests[1];
        assert_eq!(generate.header_value("api_token"), Some("bria-token"));
        assert_eq!(generate.body.as_ref().unwrap()["prompt"], "A chef in a kitchen, close up.");
        assert_eq!(generate.body.as_ref().unwrap()["aspect_ratio"], "16:9");
    }

    #[tokio::test]
    async fn test_polls_until_image_arrives() {
        let transport = ScriptedTransport::new()
            .respond(200, REWRITE_OK)
            .respond(202, format!(r#"{{"status_url":"{STATUS_URL}"}}"#))
            .respond(200, r#"{"result":{"state":"IN_PROGRESS"}}"#)
            .respond(200, r#"{"state":"IN_PROGRESS"}"#)
            .respond(200, r#"{"result":{"image_url":"https://img/late.png"}}"#);
        let pipeline = ConversionPipeline::new(transport, config());

        let report = pipeline.run(&input()).await.unwrap();
        assert_eq!(report.image_url, "https://img/late.png");
        assert_eq!(report.poll_attempts, 3);
        assert_eq!(pipeline.transport().requests_to(STATUS_URL), 3);
    }

    #[tokio::test]
    async fn test_poll_timeout() {
        let transport = ScriptedTransport::new()
            .respond(200, REWRITE_OK)
            .respond(200, format!(r#"{{"status_url":"{STATUS_URL}"}}"#))
            .otherwise(200, r#"{"result":{"state":"IN_PROGRESS"}}"#);
        let pipeline = ConversionPipeline::new(transport, config());

        let err = pipeline.run(&input()).await.unwrap_err();
        assert!(matches!(err, ConvertError::PollTimeout { attempts: 25 }));
        assert_eq!(pipeline.transport().requests_to(STATUS_URL), 25);
    }

    #[tokio::test]
    async fn test_poll_failure_state_stops_early() {
        let transport = ScriptedTransport::new()
            .respond(200, REWRITE_OK)
            .respond(200, format!(r#"{{"status_url":"{STATUS_URL}"}}"#))
            .respond(200, r#"{"result":{"state":"FAILED"}}"#)
            .otherwise(200, r#"{"result":{"image_url":"https://img/never.png"}}"#);
        let pipeline = ConversionPipeline::new(transport, config());

        let err = pipeline.run(&input()).await.unwrap_err();
        assert!(matches!(err, ConvertError::PollFailed { status: 200, .. }));
        assert_eq!(pipeline.transport().requests_to(STATUS_URL), 1);
    }

    #[tokio::test]
    async fn test_poll_retries_transport_errors() {
        let transport = ScriptedTransport::new()
            .respond(200, REWRITE_OK)
            .respond(200, format!(r#"{{"status_url":"{STATUS_URL}"}}"#))
            .fail("connection reset")
            .respond(200, r#"{"image_url":"https://img/retry.png"}"#);
        let pipeline = ConversionPipeline::new(transport, config());

        let report = pipeline.run(&input()).await.unwrap();
        assert_eq!(report.poll_attempts, 2);
    }

    #[tokio::test]
    async fn test_rewrite_failures() {
        let empty = ScriptedTransport::new().respond(200, r#"{"choices":[]}"#);
        let err = ConversionPipeline::new(empty, config()).run(&input()).await.unwrap_err();
        assert!(matches!(
            err,
            ConvertError::RewriteFailed(ref inner) if matches!(**inner, ConvertError::EmptyResponse(Service::Rewrite))
        ));

        // unparseable but successful body degrades to "no usable text"
        let garbled = ScriptedTransport::new().respond(200, "<html>oops</html>");
        let err = ConversionPipeline::new(garbled, config()).run(&input()).await.unwrap_err();
        assert!(matches!(
            err,
            ConvertError::RewriteFailed(ref inner) if matches!(**inner, ConvertError::EmptyResponse(_))
        ));

        let rejected = ScriptedTransport::new().respond(401, r#"{"error":{"message":"Incorrect API key"}}"#);
        let pipeline = ConversionPipeline::new(rejected, config());
        let err = pipeline.run(&input()).await.unwrap_err();
        assert!(err.to_string().contains("Incorrect API key"));
        assert_eq!(pipeline.transport().requests().len(), 1);
    }

    #[tokio::test]
    async fn test_rewrite_error_payload_on_success_status() {
        let transport = ScriptedTransport::new()
            .respond(200, r#"{"error":{"message":"model overloaded"}}"#)
            .otherwise(200, r#"{"image_url":"https://img/never.png"}"#);
        let pipeline = ConversionPipeline::new(transport, config());

        match pipeline.run(&input()).await.unwrap_err() {
            ConvertError::RewriteFailed(inner) => assert!(matches!(
                *inner,
                ConvertError::Remote { service: Service::Rewrite, status: 200, ref message } if message == "model overloaded"
            )),
            other => panic!("expected a rewrite failure, got {other}"),
        }
        assert_eq!(pipeline.transport().requests().len(), 1);
    }

    #[tokio::test]
    async fn test_progress_reports_each_stage() {
        #[derive(Clone, Default)]
        struct Stages(std::sync::Arc<std::sync::Mutex<Vec<ConversionStage>>>);

        impl ConversionProgress for Stages {
            fn stage(&self, stage: ConversionStage) {
                self.0.lock().unwrap().push(stage);
            }
        }

        let stages = Stages::default();
        let transport = ScriptedTransport::new()
            .respond(200, REWRITE_OK)
            .respond(200, format!(r#"{{"status_url":"{STATUS_URL}"}}"#))
            .respond(200, r#"{"image_url":"https://img/one.png"}"#);
        let pipeline = ConversionPipeline::new(transport, config()).with_progress(stages.clone());
        pipeline.run(&input()).await.unwrap();

        assert_eq!(
            *stages.0.lock().unwrap(),
            vec![
                ConversionStage::Rewriting,
                ConversionStage::Generating,
                ConversionStage::Polling {
                    attempt: 1,
                    max_attempts: 25
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_generation_error_payload() {
        let transport = ScriptedTransport::new()
            .respond(200, REWRITE_OK)
            .respond(422, r#"{"error":"prompt rejected"}"#);
        let err = ConversionPipeline::new(transport, config()).run(&input()).await.unwrap_err();
        match err {
            ConvertError::Remote {
                service,
                status,
                message,
            } => {
                assert_eq!(service, Service::Generation);
                assert_eq!(status, 422);
                assert_eq!(message, "prompt rejected");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
