//! Google Gemini collaborator for the refinery pipeline.
//!
//! Implements [`GenerativeModel`] over the Generative Language API's
//! `generateContent` endpoint. When the refiner supplies a schema hint, the
//! request asks Gemini for constrained JSON decoding via
//! `responseMimeType: "application/json"` plus a `responseSchema`; the
//! refiner still validates the response text either way.
//!
//! # Example
//!
//! ```no_run
//! use refinery::{Refinery, Schema};
//! use refinery_gemini::GeminiModel;
//! use std::sync::Arc;
//!
//! # async fn example() -> refinery::Result<()> {
//! let model = GeminiModel::new()
//!     .with_api_key("your-api-key")
//!     .with_model("gemini-2.0-flash");
//!
//! let refinery = Refinery::new(Arc::new(model)).with_anchor("personas", "페르소나");
//! let schema = Schema::object(vec![(
//!     "personas".to_string(),
//!     Schema::array(Schema::object(vec![("name".to_string(), Schema::string())])?),
//! )])?;
//! let value = refinery.refine("페르소나1: ...", &schema).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Authentication
//!
//! The API key is read from the `GEMINI_API_KEY` environment variable, or set
//! explicitly with [`GeminiModel::with_api_key`]. Get a key from
//! <https://ai.google.dev/>.

use async_trait::async_trait;
use refinery::{Error, GenerativeModel, Result, Schema};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variable holding the Gemini API key.
pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";

/// Google Gemini text generation over the `generateContent` endpoint.
///
/// # Configuration
///
/// The API key can be set via:
/// - Constructor: `GeminiModel::new().with_api_key("...")`
/// - Environment: `GEMINI_API_KEY`
pub struct GeminiModel {
    /// API key for authentication
    api_key: Option<String>,
    /// Model name (e.g., "gemini-2.0-flash")
    model: String,
    /// Sampling temperature; lower is more deterministic
    temperature: Option<f32>,
    /// HTTP client
    client: Client,
}

impl GeminiModel {
    /// Create a new Gemini model with default settings.
    ///
    /// Defaults:
    /// - Model: `gemini-2.0-flash`
    /// - API key: from `GEMINI_API_KEY` environment variable
    #[must_use]
    pub fn new() -> Self {
        Self {
            api_key: std::env::var(GEMINI_API_KEY).ok(),
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            client: Client::new(),
        }
    }

    /// Set the API key explicitly.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the model name.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    ///
    /// Refinement wants determinism over creativity; values near zero are the
    /// usual choice.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Get the API key, returning an error if not configured.
    fn get_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            Error::configuration(
                "GEMINI_API_KEY not set. Set it via environment variable or with_api_key()",
            )
        })
    }

    fn build_request(&self, instruction: &str, schema_hint: Option<&Schema>) -> GenerateContentRequest {
        let generation_config = match (schema_hint, self.temperature) {
            (None, None) => None,
            (schema, temperature) => Some(GenerationConfig {
                response_mime_type: schema.map(|_| "application/json".to_string()),
                response_schema: schema.map(Schema::to_value),
                temperature,
            }),
        };

        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: instruction.to_string(),
                }],
            }],
            generation_config,
        }
    }
}

impl Default for GeminiModel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GeminiModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiModel")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

#[async_trait]
impl GenerativeModel for GeminiModel {
    async fn _generate(&self, instruction: &str, schema_hint: Option<&Schema>) -> Result<String> {
        let api_key = self.get_api_key()?;
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            API_BASE, self.model, api_key
        );

        let request = self.build_request(instruction, schema_hint);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::collaborator(format!("Gemini API request failed: {e}")))?
            .error_for_status()
            .map_err(|e| Error::collaborator(format!("Gemini API error: {e}")))?;

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::collaborator(format!("Failed to parse Gemini response: {e}")))?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::collaborator("Gemini response contained no candidates"))?
            .content
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect();

        Ok(text)
    }

    fn model_type(&self) -> &str {
        "gemini"
    }
}

// Request/Response types for the Gemini API

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "generationConfig")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none", rename = "responseMimeType")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "responseSchema")]
    response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    // ========================================================================
    // Constructor and Builder Tests
    // ========================================================================

    #[test]
    fn test_default_constructor() {
        let model = GeminiModel::new();
        assert_eq!(model.model, "gemini-2.0-flash");
        assert!(model.temperature.is_none());
    }

    #[test]
    fn test_with_api_key() {
        let model = GeminiModel::new().with_api_key("test-key");
        assert_eq!(model.api_key, Some("test-key".to_string()));
    }

    #[test]
    fn test_with_model() {
        let model = GeminiModel::new().with_model("gemini-2.0-pro");
        assert_eq!(model.model, "gemini-2.0-pro");
    }

    #[test]
    fn test_with_temperature() {
        let model = GeminiModel::new().with_temperature(0.1);
        assert_eq!(model.temperature, Some(0.1));
    }

    #[test]
    fn test_builder_chaining() {
        let model = GeminiModel::new()
            .with_api_key("key")
            .with_model("gemini-2.0-flash")
            .with_temperature(0.0);

        assert_eq!(model.api_key, Some("key".to_string()));
        assert_eq!(model.model, "gemini-2.0-flash");
        assert_eq!(model.temperature, Some(0.0));
    }

    #[test]
    fn test_model_type() {
        assert_eq!(GeminiModel::new().model_type(), "gemini");
    }

    // ========================================================================
    // API Key Validation Tests
    // ========================================================================

    #[test]
    fn test_get_api_key_missing() {
        let model = GeminiModel {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            client: Client::new(),
        };

        let err = model.get_api_key().unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_get_api_key_present() {
        let model = GeminiModel::new().with_api_key("test-key");
        assert_eq!(model.get_api_key().unwrap(), "test-key");
    }

    // ========================================================================
    // Request Serialization Tests
    // ========================================================================

    #[test]
    fn test_request_without_schema_hint_omits_generation_config() {
        let model = GeminiModel::new().with_api_key("k");
        let request = model.build_request("convert this", None);

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("convert this"));
        assert!(!json.contains("generationConfig"));
    }

    #[test]
    fn test_request_with_schema_hint_constrains_decoding() {
        let model = GeminiModel::new().with_api_key("k");
        let schema = Schema::object(vec![("name".to_string(), Schema::string())]).unwrap();
        let request = model.build_request("convert this", Some(&schema));

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""responseMimeType":"application/json""#));
        assert!(json.contains(r#""responseSchema""#));
        assert!(json.contains(r#""type":"OBJECT""#));
    }

    #[test]
    fn test_request_with_temperature_only() {
        let model = GeminiModel::new().with_api_key("k").with_temperature(0.2);
        let request = model.build_request("convert this", None);

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("temperature"));
        assert!(!json.contains("responseMimeType"));
    }

    // ========================================================================
    // Response Deserialization Tests
    // ========================================================================

    #[test]
    fn test_response_deserialization() {
        let json = r#"{"candidates": [{"content": {"parts": [{"text": "{\"x\":1}"}]}}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.candidates.len(), 1);
        assert_eq!(response.candidates[0].content.parts[0].text, r#"{"x":1}"#);
    }

    #[test]
    fn test_response_without_candidates_deserializes_empty() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(response.candidates.is_empty());
    }

    #[test]
    fn test_multi_part_candidate_concatenates() {
        let json = r#"{"candidates": [{"content": {"parts": [{"text": "{\"x\""}, {"text": ":1}"}]}}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        let text: String = response.candidates[0]
            .content
            .parts
            .iter()
            .map(|part| part.text.as_str())
            .collect();
        assert_eq!(text, r#"{"x":1}"#);
    }

    // ========================================================================
    // Constants Tests
    // ========================================================================

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_MODEL, "gemini-2.0-flash");
        assert_eq!(API_BASE, "https://generativelanguage.googleapis.com/v1beta");
    }

    // ========================================================================
    // Live API Tests
    // ========================================================================

    #[tokio::test]
    #[ignore = "requires GEMINI_API_KEY"]
    async fn test_generate_live() {
        let model = GeminiModel::new();
        let schema = Schema::object(vec![("greeting".to_string(), Schema::string())]).unwrap();

        let text = model
            .generate("Reply with a JSON object whose greeting is hello", Some(&schema))
            .await
            .unwrap();
        assert!(!text.is_empty());
    }
}
