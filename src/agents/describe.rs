//! Description agent: image or text in, music description out.
//!
//! `ApiDescriber` calls an OpenAI-compatible `/v1/chat/completions` endpoint.
//! Images are attached as base64 data URLs in the vision message format.  A
//! returned description is accepted only if it is *coherent*: long enough and
//! mentioning at least one musical attribute, so nonsense never reaches the
//! generation agent.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::sync::Arc;
use thiserror::Error;

use crate::agents::endpoint::{EndpointError, ModelEndpoint};
use crate::agents::prompt::PromptBuilder;
use crate::config::DescriptionSettings;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// What the description agent is asked to describe.
#[derive(Debug, Clone)]
pub enum DescriptionSource {
    /// A free-text idea, e.g. "a quiet rainy evening".
    Text(String),
    /// Raw image bytes with their MIME type, e.g. `image/png`.
    Image { bytes: Vec<u8>, mime: String },
}

/// Provenance tag carried on every description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Text,
    Image,
}

impl DescriptionSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            DescriptionSource::Text(_) => SourceKind::Text,
            DescriptionSource::Image { .. } => SourceKind::Image,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DescribeRequest {
    pub source: DescriptionSource,
    /// Target length of the eventual piece, passed to the model as a hint.
    pub duration_secs: f32,
    pub style_hint: Option<String>,
}

/// A coherent music description ready for the generation agent.
#[derive(Debug, Clone, PartialEq)]
pub struct MusicDescription {
    pub prompt: String,
    /// What kind of input produced this description.
    pub source: SourceKind,
    /// Model that produced the description.
    pub model: String,
}

// ---------------------------------------------------------------------------
// DescribeError
// ---------------------------------------------------------------------------

/// Errors that can occur while producing a description.
#[derive(Debug, Error)]
pub enum DescribeError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    /// The model returned a response with no usable text content.
    #[error("description model returned an empty response")]
    EmptyResponse,

    /// The model answered, but the text is not a usable music description.
    #[error("description is not usable: {reason}")]
    Incoherent { reason: String },
}

impl DescribeError {
    /// Only endpoint-level failures are worth retrying; an incoherent or
    /// empty answer from a healthy service would just repeat.
    pub fn is_transient(&self) -> bool {
        match self {
            DescribeError::Endpoint(e) => e.is_transient(),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Describer trait
// ---------------------------------------------------------------------------

/// Async trait for the description stage, mockable in orchestrator tests.
#[async_trait]
pub trait Describer: Send + Sync {
    async fn describe(&self, request: &DescribeRequest) -> Result<MusicDescription, DescribeError>;
}

// ---------------------------------------------------------------------------
// ApiDescriber
// ---------------------------------------------------------------------------

/// Terms whose presence marks a description as musically meaningful.
const MUSICAL_ATTRIBUTES: &[&str] = &[
    "tempo",
    "bpm",
    "mood",
    "instrument",
    "instrumentation",
    "style",
    "genre",
    "melody",
    "rhythm",
    "atmosphere",
    "tone",
    "harmony",
];

/// Calls a chat-completions endpoint and validates the answer.
pub struct ApiDescriber {
    endpoint: Arc<dyn ModelEndpoint>,
    prompts: PromptBuilder,
    settings: DescriptionSettings,
}

impl ApiDescriber {
    pub fn new(endpoint: Arc<dyn ModelEndpoint>, settings: DescriptionSettings) -> Self {
        Self {
            endpoint,
            prompts: PromptBuilder::new(),
            settings,
        }
    }

    /// Build the chat-completions request body for `request`.
    ///
    /// Text sources become a plain user message; image sources use the
    /// vision message format with a base64 data URL.
    fn build_body(&self, request: &DescribeRequest) -> serde_json::Value {
        let (system_msg, user_content) = match &request.source {
            DescriptionSource::Text(text) => {
                let (system_msg, user_msg) = self.prompts.build_text_chat(
                    text,
                    request.duration_secs,
                    request.style_hint.as_deref(),
                );
                (system_msg, serde_json::Value::String(user_msg))
            }
            DescriptionSource::Image { bytes, mime } => {
                let (system_msg, user_msg) = self
                    .prompts
                    .build_image_chat(request.duration_secs, request.style_hint.as_deref());
                let data_url = format!("data:{};base64,{}", mime, BASE64.encode(bytes));
                let content = serde_json::json!([
                    { "type": "text",      "text": user_msg },
                    { "type": "image_url", "image_url": { "url": data_url } }
                ]);
                (system_msg, content)
            }
        };

        serde_json::json!({
            "model":       self.endpoint.name(),
            "messages": [
                { "role": "system", "content": system_msg    },
                { "role": "user",   "content": user_content  }
            ],
            "stream":      false,
            "temperature": self.settings.temperature,
            "max_tokens":  self.settings.max_tokens
        })
    }

    /// Reject descriptions that are too short or mention no musical attribute.
    fn check_coherence(&self, text: &str) -> Result<(), DescribeError> {
        let min_chars = self.settings.min_description_chars;
        if text.chars().count() < min_chars {
            return Err(DescribeError::Incoherent {
                reason: format!("shorter than {min_chars} characters"),
            });
        }

        let lower = text.to_lowercase();
        if !MUSICAL_ATTRIBUTES.iter().any(|term| lower.contains(term)) {
            return Err(DescribeError::Incoherent {
                reason: "mentions no musical attribute".into(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Describer for ApiDescriber {
    async fn describe(&self, request: &DescribeRequest) -> Result<MusicDescription, DescribeError> {
        let body = self.build_body(request);
        let json = self.endpoint.invoke(body).await?;

        let text = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(DescribeError::EmptyResponse)?
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(DescribeError::EmptyResponse);
        }

        self.check_coherence(&text)?;

        log::debug!("description accepted ({} chars)", text.chars().count());
        Ok(MusicDescription {
            prompt: text,
            source: request.source.kind(),
            model: self.endpoint.name().to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Mock endpoint returning a canned response and recording request bodies.
    struct MockEndpoint {
        response: Value,
        bodies: Mutex<Vec<Value>>,
    }

    impl MockEndpoint {
        fn replying(content: &str) -> Self {
            Self {
                response: json!({
                    "choices": [ { "message": { "content": content } } ]
                }),
                bodies: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ModelEndpoint for MockEndpoint {
        fn name(&self) -> &str {
            "mock-describer"
        }

        async fn invoke(&self, body: Value) -> Result<Value, EndpointError> {
            self.bodies.lock().unwrap().push(body);
            Ok(self.response.clone())
        }
    }

    fn make_describer(endpoint: Arc<MockEndpoint>) -> ApiDescriber {
        ApiDescriber::new(endpoint, DescriptionSettings::default())
    }

    fn text_request(text: &str) -> DescribeRequest {
        DescribeRequest {
            source: DescriptionSource::Text(text.into()),
            duration_secs: 10.0,
            style_hint: None,
        }
    }

    const GOOD_DESCRIPTION: &str = "A gentle lo-fi piece at a relaxed tempo around \
         70 BPM, with warm electric piano as the lead instrument and a mellow, \
         rainy-evening atmosphere throughout.";

    #[tokio::test]
    async fn coherent_description_is_accepted() {
        let endpoint = Arc::new(MockEndpoint::replying(GOOD_DESCRIPTION));
        let describer = make_describer(endpoint.clone());

        let result = describer.describe(&text_request("rainy evening")).await.unwrap();
        assert_eq!(result.prompt, GOOD_DESCRIPTION);
        assert_eq!(result.source, SourceKind::Text);
        assert_eq!(result.model, "mock-describer");
        assert_eq!(endpoint.bodies.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn short_description_is_incoherent() {
        let endpoint = Arc::new(MockEndpoint::replying("slow tempo"));
        let describer = make_describer(endpoint);

        let err = describer.describe(&text_request("x")).await.unwrap_err();
        assert!(matches!(err, DescribeError::Incoherent { .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn description_without_musical_terms_is_incoherent() {
        let endpoint = Arc::new(MockEndpoint::replying(
            "This is a lengthy answer about many things, none of which relate \
             to the requested subject matter in any way whatsoever.",
        ));
        let describer = make_describer(endpoint);

        let err = describer.describe(&text_request("x")).await.unwrap_err();
        match err {
            DescribeError::Incoherent { reason } => {
                assert!(reason.contains("musical attribute"));
            }
            other => panic!("expected Incoherent, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_content_is_empty_response() {
        let endpoint = Arc::new(MockEndpoint {
            response: json!({ "choices": [] }),
            bodies: Mutex::new(Vec::new()),
        });
        let describer = make_describer(endpoint);

        let err = describer.describe(&text_request("x")).await.unwrap_err();
        assert!(matches!(err, DescribeError::EmptyResponse));
    }

    #[tokio::test]
    async fn whitespace_only_content_is_empty_response() {
        let endpoint = Arc::new(MockEndpoint::replying("   \n  "));
        let describer = make_describer(endpoint);

        let err = describer.describe(&text_request("x")).await.unwrap_err();
        assert!(matches!(err, DescribeError::EmptyResponse));
    }

    #[tokio::test]
    async fn image_request_attaches_a_data_url() {
        let endpoint = Arc::new(MockEndpoint::replying(GOOD_DESCRIPTION));
        let describer = make_describer(endpoint.clone());

        let request = DescribeRequest {
            source: DescriptionSource::Image {
                bytes: vec![0x89, 0x50, 0x4e, 0x47],
                mime: "image/png".into(),
            },
            duration_secs: 10.0,
            style_hint: None,
        };
        let result = describer.describe(&request).await.unwrap();
        assert_eq!(result.source, SourceKind::Image);

        let bodies = endpoint.bodies.lock().unwrap();
        let url = bodies[0]["messages"][1]["content"][1]["image_url"]["url"]
            .as_str()
            .unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn endpoint_timeout_is_transient() {
        struct TimeoutEndpoint;

        #[async_trait]
        impl ModelEndpoint for TimeoutEndpoint {
            fn name(&self) -> &str {
                "timeout"
            }
            async fn invoke(&self, _body: Value) -> Result<Value, EndpointError> {
                Err(EndpointError::Timeout)
            }
        }

        let describer =
            ApiDescriber::new(Arc::new(TimeoutEndpoint), DescriptionSettings::default());
        let err = describer.describe(&text_request("x")).await.unwrap_err();
        assert!(err.is_transient());
    }
}
