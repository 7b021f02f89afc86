//! Thesis extraction via an OpenAI-compatible chat endpoint.
//!
//! The model is asked for a strict JSON payload matching
//! [`desk_types::ThesisAnalysis`]; the wire values are re-validated here
//! before anything is persisted. Timestamps and the model name are stamped
//! by the caller, not by the API client.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use desk_types::{ConvictionLevel, ThesisAnalysis, TimeHorizon};

use crate::error::ExtractionError;

/// Extracts structured fields from free-text investment theses.
#[async_trait]
pub trait ThesisExtractor: Send + Sync {
    async fn extract(&self, thesis: &str) -> Result<ThesisAnalysis, ExtractionError>;

    /// Model identifier recorded on successful extractions.
    fn model_name(&self) -> &str;
}

/// Configuration for the OpenAI-compatible extractor.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// API base URL (e.g. "https://api.openai.com/v1")
    pub base_url: String,

    /// Chat model (e.g. "gpt-4o-mini")
    pub model: String,

    /// API key
    pub api_key: SecretString,

    /// Request timeout
    pub timeout: Duration,
}

impl ExtractorConfig {
    /// Config for the OpenAI API with default model and timeout.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: SecretString::from(api_key.into()),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Extractor backed by a chat-completions endpoint.
pub struct OpenAiExtractor {
    client: Client,
    config: ExtractorConfig,
}

impl OpenAiExtractor {
    pub fn new(config: ExtractorConfig) -> Result<Self, ExtractionError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExtractionError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }
}

fn extraction_prompt(thesis: &str) -> String {
    format!(
        "Extract structured fields from this investment thesis.\n\n\
         THESIS:\n{thesis}\n\n\
         Return null for any field the thesis does not clearly support. \
         Do not invent catalysts, moats or risks the text does not state."
    )
}

/// Strict response schema for the chat request. Enum casing is enforced
/// again when the payload is parsed, so a sloppy model cannot smuggle
/// unknown values into storage.
fn response_format() -> serde_json::Value {
    serde_json::json!({
        "type": "json_schema",
        "json_schema": {
            "name": "thesis_analysis",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "catalyst": { "type": ["string", "null"] },
                    "competitive_moat": { "type": ["string", "null"] },
                    "key_risks": {
                        "type": "array",
                        "items": { "type": "string" }
                    },
                    "conviction_level": {
                        "type": ["string", "null"],
                        "description": "one of: low, medium, high"
                    },
                    "time_horizon": {
                        "type": ["string", "null"],
                        "description": "one of: short, medium, long"
                    }
                },
                "required": [
                    "catalyst",
                    "competitive_moat",
                    "key_risks",
                    "conviction_level",
                    "time_horizon"
                ],
                "additionalProperties": false
            }
        }
    })
}

/// Payload as the model returns it; enums arrive as plain strings.
#[derive(Debug, Deserialize)]
struct WireAnalysis {
    catalyst: Option<String>,
    competitive_moat: Option<String>,
    #[serde(default)]
    key_risks: Vec<String>,
    conviction_level: Option<String>,
    time_horizon: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn from_wire(wire: WireAnalysis) -> Result<ThesisAnalysis, ExtractionError> {
    let conviction_level = non_blank(wire.conviction_level)
        .map(|v| v.trim().to_lowercase().parse::<ConvictionLevel>())
        .transpose()
        .map_err(|e| ExtractionError::Parse(e.to_string()))?;
    let time_horizon = non_blank(wire.time_horizon)
        .map(|v| v.trim().to_lowercase().parse::<TimeHorizon>())
        .transpose()
        .map_err(|e| ExtractionError::Parse(e.to_string()))?;

    Ok(ThesisAnalysis {
        catalyst: non_blank(wire.catalyst),
        competitive_moat: non_blank(wire.competitive_moat),
        key_risks: wire
            .key_risks
            .into_iter()
            .filter(|r| !r.trim().is_empty())
            .collect(),
        conviction_level,
        time_horizon,
        extracted_at: None,
        extraction_model: None,
    })
}

#[async_trait]
impl ThesisExtractor for OpenAiExtractor {
    async fn extract(&self, thesis: &str) -> Result<ThesisAnalysis, ExtractionError> {
        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: Vec<ChatMessage<'a>>,
            temperature: f32,
            response_format: serde_json::Value,
        }

        #[derive(Serialize)]
        struct ChatMessage<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<ChatChoice>,
        }

        #[derive(Deserialize)]
        struct ChatChoice {
            message: ChatChoiceMessage,
        }

        #[derive(Deserialize)]
        struct ChatChoiceMessage {
            content: String,
        }

        let prompt = extraction_prompt(thesis);
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You extract structured fields from investment theses. \
                              Use only what the text states.",
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: 0.0,
            response_format: response_format(),
        };

        let url = format!("{}/chat/completions", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| ExtractionError::Api(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Api(format!("HTTP {status}: {body}")));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::Parse(e.to_string()))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ExtractionError::Parse("no choices in response".to_string()))?;

        let wire: WireAnalysis = serde_json::from_str(&content)
            .map_err(|e| ExtractionError::Parse(format!("bad analysis payload: {e}")))?;
        from_wire(wire)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Deterministic extractor for tests.
pub struct MockExtractor {
    analysis: ThesisAnalysis,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl MockExtractor {
    /// Always return `analysis` (without stamps; callers add those).
    pub fn returning(analysis: ThesisAnalysis) -> Self {
        Self {
            analysis,
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail every call.
    pub fn failing() -> Self {
        let mock = Self::returning(ThesisAnalysis::default());
        mock.fail.store(true, Ordering::SeqCst);
        mock
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of extraction attempts, including failed ones.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ThesisExtractor for MockExtractor {
    async fn extract(&self, _thesis: &str) -> Result<ThesisAnalysis, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ExtractionError::Api("mock extractor failure".to_string()));
        }
        Ok(self.analysis.clone())
    }

    fn model_name(&self) -> &str {
        "mock-extractor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ExtractorConfig::openai("sk-test");
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_config_builders() {
        let config = ExtractorConfig::openai("sk-test")
            .with_base_url("http://localhost:8080/v1")
            .with_model("local-chat")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.model, "local-chat");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_prompt_contains_thesis_verbatim() {
        let prompt = extraction_prompt("Storage demand doubles by 2027");
        assert!(prompt.contains("Storage demand doubles by 2027"));
    }

    #[test]
    fn test_response_format_is_strict_schema() {
        let format = response_format();
        assert_eq!(format["type"], "json_schema");
        assert_eq!(format["json_schema"]["strict"], true);
        let required = format["json_schema"]["schema"]["required"]
            .as_array()
            .unwrap();
        assert!(required.iter().any(|v| v == "conviction_level"));
    }

    #[test]
    fn test_wire_parsing_normalizes_enum_case() {
        let wire: WireAnalysis = serde_json::from_str(
            r#"{
                "catalyst": "New storage contract",
                "competitive_moat": null,
                "key_risks": ["rate hikes", "  "],
                "conviction_level": "Medium",
                "time_horizon": "LONG"
            }"#,
        )
        .unwrap();
        let analysis = from_wire(wire).unwrap();

        assert_eq!(analysis.catalyst.as_deref(), Some("New storage contract"));
        assert_eq!(analysis.competitive_moat, None);
        assert_eq!(analysis.key_risks, vec!["rate hikes".to_string()]);
        assert_eq!(analysis.conviction_level, Some(ConvictionLevel::Medium));
        assert_eq!(analysis.time_horizon, Some(TimeHorizon::Long));
        // Stamps are the caller's job
        assert_eq!(analysis.extracted_at, None);
        assert_eq!(analysis.extraction_model, None);
    }

    #[test]
    fn test_wire_parsing_rejects_unknown_enum_value() {
        let wire: WireAnalysis = serde_json::from_str(
            r#"{
                "catalyst": null,
                "competitive_moat": null,
                "key_risks": [],
                "conviction_level": "extreme",
                "time_horizon": null
            }"#,
        )
        .unwrap();
        assert!(matches!(
            from_wire(wire),
            Err(ExtractionError::Parse(_))
        ));
    }

    #[test]
    fn test_wire_parsing_treats_blank_strings_as_null() {
        let wire: WireAnalysis = serde_json::from_str(
            r#"{
                "catalyst": "   ",
                "competitive_moat": "",
                "key_risks": [],
                "conviction_level": null,
                "time_horizon": null
            }"#,
        )
        .unwrap();
        let analysis = from_wire(wire).unwrap();
        assert_eq!(analysis.catalyst, None);
        assert_eq!(analysis.competitive_moat, None);
    }

    #[tokio::test]
    async fn test_mock_extractor_round_trip() {
        let mock = MockExtractor::returning(ThesisAnalysis {
            catalyst: Some("contract win".into()),
            conviction_level: Some(ConvictionLevel::High),
            ..Default::default()
        });

        let analysis = mock.extract("any thesis").await.unwrap();
        assert_eq!(analysis.catalyst.as_deref(), Some("contract win"));
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.model_name(), "mock-extractor");
    }

    #[tokio::test]
    async fn test_mock_extractor_failure_toggle() {
        let mock = MockExtractor::failing();
        assert!(mock.extract("thesis").await.is_err());

        mock.set_failing(false);
        assert!(mock.extract("thesis").await.is_ok());
        assert_eq!(mock.call_count(), 2);
    }
}
