//! Gemini client for the generative side of keyplan.
//!
//! Proposes thematic directions, keyword group skeletons (fresh or as an
//! expansion of an existing strategy) and blog articles. Every text call asks
//! for structured JSON output with a response schema; output that does not
//! match the expected shape is a hard error, logged with the raw text.
//! Thumbnail backgrounds come from an Imagen model as JPEG bytes.

mod prompts;

use std::sync::LazyLock;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use regex::Regex;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use keyplan_shared::{
    GeminiConfig, GeneratedArticle, GroupSkeleton, KeyplanError, Result, ThematicDirection,
};

pub use prompts::ArticleBrief;

/// User-Agent string for Gemini requests.
const USER_AGENT: &str = concat!("keyplan/", env!("CARGO_PKG_VERSION"));

/// Service name used in provider error messages.
const SERVICE: &str = "Gemini API";

// ---------------------------------------------------------------------------
// Task kinds
// ---------------------------------------------------------------------------

/// The kinds of generation this client performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    Directions,
    Strategy,
    Expansion,
    Article,
    Thumbnail,
}

impl Task {
    /// Label used in logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Directions => "thematic directions",
            Self::Strategy => "content strategy",
            Self::Expansion => "expanded strategy",
            Self::Article => "generated article",
            Self::Thumbnail => "thumbnail image",
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types (generateContent REST API)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate, trimmed.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Why no text came back, for the error message.
    fn empty_reason(&self) -> String {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return format!("prompt blocked: {reason}");
        }
        match self.candidates.first() {
            None => "no candidates returned".into(),
            Some(c) => format!(
                "empty candidate (finish reason: {})",
                c.finish_reason.as_deref().unwrap_or("unknown")
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types (Imagen predict REST API)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: Vec<PredictInstance<'a>>,
    parameters: PredictParameters,
}

#[derive(Debug, Serialize)]
struct PredictInstance<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters {
    sample_count: u32,
    aspect_ratio: &'static str,
    output_options: OutputOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutputOptions {
    mime_type: &'static str,
}

#[derive(Debug, Default, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    #[serde(default)]
    bytes_base64_encoded: Option<String>,
    #[serde(default)]
    rai_filtered_reason: Option<String>,
}

impl PredictResponse {
    fn image(&self) -> Option<&str> {
        self.predictions
            .iter()
            .find_map(|p| p.bytes_base64_encoded.as_deref())
            .filter(|b| !b.is_empty())
    }

    fn empty_reason(&self) -> String {
        self.predictions
            .iter()
            .find_map(|p| p.rai_filtered_reason.clone())
            .map(|reason| format!("image filtered: {reason}"))
            .unwrap_or_else(|| "no image returned".into())
    }
}

/// Strip a surrounding Markdown code fence, if the model added one.
fn strip_code_fence(text: &str) -> &str {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)^```[A-Za-z]*\s*(.*?)\s*```$").expect("valid regex")
    });

    FENCE_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map_or(text, |m| m.as_str())
}

/// Best-effort message from a Gemini error body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => match json.pointer("/error/message").and_then(|m| m.as_str()) {
            Some(msg) => msg.to_string(),
            None => json.to_string(),
        },
        Err(_) => "No additional information.".to_string(),
    }
}

// ---------------------------------------------------------------------------
// GeminiClient
// ---------------------------------------------------------------------------

/// Handle to the Gemini `generateContent` API. Build once, share by reference.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    strategy_model: String,
    article_model: String,
    image_model: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("strategy_model", &self.strategy_model)
            .field("article_model", &self.article_model)
            .field("image_model", &self.image_model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Create a client. The API key is passed in, never read from the environment here.
    pub fn new(config: &GeminiConfig, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(KeyplanError::config("Gemini API key is empty"));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| KeyplanError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            strategy_model: config.strategy_model.clone(),
            article_model: config.article_model.clone(),
            image_model: config.image_model.clone(),
        })
    }

    /// Propose content axes for a blog concept.
    #[instrument(skip_all)]
    pub async fn thematic_directions(&self, concept: &str) -> Result<Vec<ThematicDirection>> {
        self.generate_json(
            &self.strategy_model,
            Task::Directions,
            &prompts::directions_prompt(concept),
            prompts::directions_schema(),
        )
        .await
    }

    /// Propose a fresh set of keyword group skeletons.
    #[instrument(skip_all, fields(directions = directions.len()))]
    pub async fn strategy_skeleton(
        &self,
        concept: &str,
        directions: &[ThematicDirection],
    ) -> Result<Vec<GroupSkeleton>> {
        self.generate_json(
            &self.strategy_model,
            Task::Strategy,
            &prompts::strategy_prompt(concept, directions),
            prompts::group_skeletons_schema(),
        )
        .await
    }

    /// Propose new keyword groups that extend an existing strategy.
    #[instrument(skip_all, fields(existing = existing_titles.len(), base_priority = base_priority))]
    pub async fn expansion_skeleton(
        &self,
        concept: &str,
        directions: &[ThematicDirection],
        existing_titles: &[String],
        base_priority: u32,
    ) -> Result<Vec<GroupSkeleton>> {
        self.generate_json(
            &self.strategy_model,
            Task::Expansion,
            &prompts::expansion_prompt(concept, directions, existing_titles, base_priority),
            prompts::group_skeletons_schema(),
        )
        .await
    }

    /// Write a blog article for one keyword group.
    #[instrument(skip_all, fields(group = %brief.group_title))]
    pub async fn article(&self, brief: &ArticleBrief) -> Result<GeneratedArticle> {
        self.generate_json(
            &self.article_model,
            Task::Article,
            &prompts::article_prompt(brief),
            prompts::article_schema(),
        )
        .await
    }

    /// Generate a 16:9 JPEG background for an article thumbnail.
    #[instrument(skip_all)]
    pub async fn thumbnail(&self, title: &str) -> Result<Vec<u8>> {
        let task = Task::Thumbnail;
        let model = self.image_model.as_str();
        let url = format!("{}/models/{model}:predict", self.base_url);
        let prompt = prompts::thumbnail_prompt(title);
        let request = PredictRequest {
            instances: vec![PredictInstance { prompt: &prompt }],
            parameters: PredictParameters {
                sample_count: 1,
                aspect_ratio: "16:9",
                output_options: OutputOptions {
                    mime_type: "image/jpeg",
                },
            },
        };

        debug!(model, task = task.as_str(), "sending image request");
        let body = self.post(&url, &request).await?;

        let parsed: PredictResponse = serde_json::from_str(&body).map_err(|e| {
            error!(task = task.as_str(), raw = %body, "unexpected Imagen response envelope");
            KeyplanError::decode(format!("invalid Imagen response envelope: {e}"), body.as_str())
        })?;

        let encoded = parsed.image().ok_or_else(|| {
            KeyplanError::Generation(format!("{}: {}", task.as_str(), parsed.empty_reason()))
        })?;

        let bytes = BASE64_STANDARD.decode(encoded).map_err(|e| {
            KeyplanError::decode(format!("{} is not valid base64: {e}", task.as_str()), encoded)
        })?;

        info!(model, task = task.as_str(), bytes = bytes.len(), "image generation complete");
        Ok(bytes)
    }

    /// POST a JSON body and return the success body text.
    async fn post<B: Serialize>(&self, url: &str, request: &B) -> Result<String> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| KeyplanError::Network(format!("{SERVICE}: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| KeyplanError::Network(format!("{SERVICE}: failed to read body: {e}")))?;

        if !status.is_success() {
            return Err(KeyplanError::Provider {
                service: SERVICE,
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Ok(body)
    }

    /// Run one structured generation and decode its JSON text into `T`.
    async fn generate_json<T: DeserializeOwned>(
        &self,
        model: &str,
        task: Task,
        prompt: &str,
        schema: serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}/models/{model}:generateContent", self.base_url);
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema,
            },
        };

        debug!(model, task = task.as_str(), "sending generation request");
        let body = self.post(&url, &request).await?;

        let parsed: GenerateResponse = serde_json::from_str(&body).map_err(|e| {
            error!(task = task.as_str(), raw = %body, "unexpected Gemini response envelope");
            KeyplanError::decode(format!("invalid Gemini response envelope: {e}"), body.as_str())
        })?;

        let text = parsed.text().ok_or_else(|| {
            KeyplanError::Generation(format!("{}: {}", task.as_str(), parsed.empty_reason()))
        })?;

        let value = serde_json::from_str(strip_code_fence(&text)).map_err(|e| {
            error!(task = task.as_str(), raw = %text, "failed to parse model output");
            KeyplanError::decode(
                format!("received invalid format for {}: {e}", task.as_str()),
                text.as_str(),
            )
        })?;

        let usage = parsed.usage_metadata.unwrap_or_default();
        info!(
            model,
            task = task.as_str(),
            tokens_in = usage.prompt_token_count,
            tokens_out = usage.candidates_token_count,
            "generation complete"
        );

        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const API_KEY: &str = "test-key";

    fn client_for(server: &MockServer) -> GeminiClient {
        let config = GeminiConfig {
            base_url: format!("{}/v1beta/", server.uri()),
            ..GeminiConfig::default()
        };
        GeminiClient::new(&config, API_KEY).expect("client")
    }

    fn candidate(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 120, "candidatesTokenCount": 80 }
        })
    }

    #[test]
    fn task_labels() {
        assert_eq!(Task::Strategy.as_str(), "content strategy");
        assert_eq!(Task::Article.as_str(), "generated article");
        assert_eq!(Task::Thumbnail.as_str(), "thumbnail image");
    }

    #[test]
    fn strip_fence_variants() {
        assert_eq!(strip_code_fence("[1]"), "[1]");
        assert_eq!(strip_code_fence("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fence("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn response_text_joins_parts() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": " [{\"title\":" }, { "text": "\"a\"}] " }] } }]
        }))
        .unwrap();
        assert_eq!(response.text().as_deref(), Some(r#"[{"title":"a"}]"#));
    }

    #[test]
    fn empty_reason_reports_block() {
        let response: GenerateResponse =
            serde_json::from_value(json!({ "promptFeedback": { "blockReason": "SAFETY" } }))
                .unwrap();
        assert!(response.text().is_none());
        assert_eq!(response.empty_reason(), "prompt blocked: SAFETY");

        let response = GenerateResponse::default();
        assert_eq!(response.empty_reason(), "no candidates returned");
    }

    #[test]
    fn error_message_extracts_nested_message() {
        let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(error_message(body), "API key not valid.");
        assert_eq!(error_message("oops"), "No additional information.");
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let err = GeminiClient::new(&GeminiConfig::default(), "  ").unwrap_err();
        assert!(err.to_string().contains("API key is empty"));
    }

    #[tokio::test]
    async fn test_strategy_skeleton_with_mock_server() {
        let server = MockServer::start().await;
        let groups = json!([
            {
                "priority": 1,
                "groupTitle": "自己肯定感の基本",
                "description": "基礎知識",
                "keywords": [{ "keyword": "自己肯定感" }, { "keyword": "自己肯定感とは" }]
            },
            {
                "priority": 2,
                "groupTitle": "高める方法",
                "description": "実践",
                "keywords": [{ "keyword": "自己肯定感を上げる" }]
            }
        ]);

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", API_KEY))
            .and(body_partial_json(json!({
                "generationConfig": { "responseMimeType": "application/json" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate(&groups.to_string())))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let directions = vec![ThematicDirection { title: "基本".into() }];
        let skeletons = client
            .strategy_skeleton("自己肯定感ブログ", &directions)
            .await
            .unwrap();

        assert_eq!(skeletons.len(), 2);
        assert_eq!(skeletons[0].group_title, "自己肯定感の基本");
        assert_eq!(skeletons[0].keywords.len(), 2);
        assert_eq!(skeletons[1].priority, 2);
    }

    #[tokio::test]
    async fn test_article_uses_article_model() {
        let server = MockServer::start().await;
        let article = json!({
            "title": "ジャーナリングで変わった朝",
            "content": "## はじめに\n本文",
            "thumbnailCatchphrase": "朝が変わる"
        });

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-pro:generateContent"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(candidate(&format!("```json\n{article}\n```"))),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let brief = ArticleBrief {
            blog_concept: "concept".into(),
            group_title: "Habits".into(),
            group_description: "Daily routines".into(),
            keywords: vec!["ジャーナリング".into()],
            main_keyword: "ジャーナリング".into(),
        };
        let generated = client.article(&brief).await.unwrap();
        assert_eq!(generated.thumbnail_catchphrase, "朝が変わる");
    }

    #[tokio::test]
    async fn test_thumbnail_decodes_image_bytes() {
        let server = MockServer::start().await;
        let jpeg: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, b'k', b'p', 0xFF, 0xD9];

        Mock::given(method("POST"))
            .and(path("/v1beta/models/imagen-4.0-generate-001:predict"))
            .and(header("x-goog-api-key", API_KEY))
            .and(body_partial_json(json!({
                "parameters": {
                    "sampleCount": 1,
                    "aspectRatio": "16:9",
                    "outputOptions": { "mimeType": "image/jpeg" }
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "predictions": [{
                    "mimeType": "image/jpeg",
                    "bytesBase64Encoded": BASE64_STANDARD.encode(jpeg)
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let bytes = client.thumbnail("ジャーナリングで変わった朝").await.unwrap();
        assert_eq!(bytes, jpeg);
    }

    #[tokio::test]
    async fn test_filtered_thumbnail_is_generation_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "predictions": [{ "raiFilteredReason": "blocked by safety filter" }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.thumbnail("title").await.unwrap_err();
        match err {
            KeyplanError::Generation(message) => {
                assert!(message.contains("thumbnail image"));
                assert!(message.contains("blocked by safety filter"));
            }
            other => panic!("expected Generation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_thumbnail_bad_base64_is_decode_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "predictions": [{ "bytesBase64Encoded": "not*base64!" }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.thumbnail("title").await.unwrap_err();
        assert!(matches!(err, KeyplanError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_invalid_model_output_is_decode_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate("Sure! Here you go")))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.thematic_directions("concept").await.unwrap_err();
        match err {
            KeyplanError::Decode { message, raw } => {
                assert!(message.contains("thematic directions"));
                assert_eq!(raw, "Sure! Here you go");
            }
            other => panic!("expected Decode, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_error_is_provider_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": { "code": 403, "message": "Permission denied.", "status": "PERMISSION_DENIED" }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.thematic_directions("concept").await.unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert!(err.to_string().contains("Permission denied."));
    }

    #[tokio::test]
    async fn test_no_candidates_is_generation_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .expansion_skeleton("concept", &[], &["Basics".to_string()], 3)
            .await
            .unwrap_err();
        assert!(matches!(err, KeyplanError::Generation(_)));
    }
}
