//! Generation agent: music description in, PCM audio out.
//!
//! `ApiGenerator` posts the description plus sampling parameters to a
//! text-to-music service and decodes the returned base64 16-bit PCM into an
//! [`AudioBuffer`].  Parameter bounds are validated *before* any network
//! traffic, so an out-of-range request never reaches the model.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::agents::endpoint::{EndpointError, ModelEndpoint};
use crate::audio::AudioBuffer;
use crate::config::GenerationSettings;

// ---------------------------------------------------------------------------
// Request / bounds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The music description driving generation.
    pub description: String,
    pub duration_secs: f32,
    /// Classifier-free guidance strength.
    pub guidance_scale: f32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Accepted parameter ranges, configurable per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationBounds {
    pub min_duration_secs: f32,
    pub max_duration_secs: f32,
    pub min_guidance: f32,
    pub max_guidance: f32,
    pub min_temperature: f32,
    pub max_temperature: f32,
}

impl Default for GenerationBounds {
    fn default() -> Self {
        Self {
            min_duration_secs: 5.0,
            max_duration_secs: 60.0,
            min_guidance: 1.0,
            max_guidance: 10.0,
            min_temperature: 0.1,
            max_temperature: 2.0,
        }
    }
}

impl GenerationBounds {
    /// Check every parameter of `request` against its range.
    ///
    /// The error names the offending parameter and the accepted range so a
    /// caller can surface it verbatim.
    pub fn validate(&self, request: &GenerationRequest) -> Result<(), GenerateError> {
        let checks = [
            (
                "duration_secs",
                request.duration_secs,
                self.min_duration_secs,
                self.max_duration_secs,
            ),
            (
                "guidance_scale",
                request.guidance_scale,
                self.min_guidance,
                self.max_guidance,
            ),
            (
                "temperature",
                request.temperature,
                self.min_temperature,
                self.max_temperature,
            ),
        ];

        for (name, value, min, max) in checks {
            if !(min..=max).contains(&value) {
                return Err(GenerateError::InvalidParameter {
                    name,
                    value,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GenerateError
// ---------------------------------------------------------------------------

/// Errors that can occur during music generation.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// A request parameter lies outside its accepted range.
    #[error("{name} = {value} outside accepted range [{min}, {max}]")]
    InvalidParameter {
        name: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    /// The service answered 200 but the body could not be decoded into PCM.
    #[error("unusable generation payload: {0}")]
    Payload(String),
}

impl GenerateError {
    pub fn is_transient(&self) -> bool {
        match self {
            GenerateError::Endpoint(e) => e.is_transient(),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Generator trait
// ---------------------------------------------------------------------------

/// Async trait for the generation stage, mockable in orchestrator tests.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<AudioBuffer, GenerateError>;
}

// ---------------------------------------------------------------------------
// ApiGenerator
// ---------------------------------------------------------------------------

/// Calls a text-to-music HTTP service.
///
/// Wire format: request `{ model, prompt, duration, cfg_coef, temperature,
/// sample_rate }`, response `{ audio: <base64 of little-endian i16 PCM>,
/// sample_rate?, channels? }`.  Missing response fields fall back to the
/// configured sample rate and mono.
pub struct ApiGenerator {
    endpoint: Arc<dyn ModelEndpoint>,
    settings: GenerationSettings,
}

impl ApiGenerator {
    pub fn new(endpoint: Arc<dyn ModelEndpoint>, settings: GenerationSettings) -> Self {
        Self { endpoint, settings }
    }

    fn build_body(&self, request: &GenerationRequest) -> serde_json::Value {
        serde_json::json!({
            "model":       self.endpoint.name(),
            "prompt":      request.description,
            "duration":    request.duration_secs,
            "cfg_coef":    request.guidance_scale,
            "temperature": request.temperature,
            "sample_rate": self.settings.sample_rate
        })
    }

    /// Decode the base64 PCM payload into an [`AudioBuffer`].
    fn decode_audio(&self, json: &serde_json::Value) -> Result<AudioBuffer, GenerateError> {
        let encoded = json["audio"]
            .as_str()
            .ok_or_else(|| GenerateError::Payload("missing `audio` field".into()))?;

        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| GenerateError::Payload(format!("invalid base64: {e}")))?;

        if bytes.len() % 2 != 0 {
            return Err(GenerateError::Payload(format!(
                "odd PCM byte count: {}",
                bytes.len()
            )));
        }

        let samples: Vec<f32> = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
            .collect();

        if samples.is_empty() {
            return Err(GenerateError::Payload("empty PCM payload".into()));
        }

        let sample_rate = json["sample_rate"]
            .as_u64()
            .map(|r| r as u32)
            .unwrap_or(self.settings.sample_rate);
        let channels = json["channels"].as_u64().map(|c| c as u16).unwrap_or(1);

        Ok(AudioBuffer::new(samples, sample_rate, channels))
    }
}

#[async_trait]
impl Generator for ApiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<AudioBuffer, GenerateError> {
        // Reject out-of-range parameters before any network traffic.
        self.settings.bounds.validate(request)?;

        let json = self.endpoint.invoke(self.build_body(request)).await?;
        let audio = self.decode_audio(&json)?;

        log::info!(
            "generated {:.2}s of audio at {} Hz",
            audio.duration_secs(),
            audio.sample_rate()
        );
        Ok(audio)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
