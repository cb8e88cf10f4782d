//! Application settings — TOML-backed, with sensible defaults.
//!
//! Every section falls back to its default when missing, so a partial (or
//! absent) settings file always yields a runnable configuration.  Nothing is
//! hardcoded at call sites: endpoint URLs, models, analysis parameters and
//! the safety blocklist all come from here.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::agents::generate::GenerationBounds;
use crate::audio::FeatureConfig;
use crate::notes::DecoderParams;
use crate::safety::SafetyPolicy;

// ---------------------------------------------------------------------------
// EndpointSettings
// ---------------------------------------------------------------------------

/// Connection details for one remote model service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    pub base_url: String,
    /// Bearer token; `None` or empty for local unauthenticated servers.
    pub api_key: Option<String>,
    pub model: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            api_key: None,
            model: String::new(),
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-agent sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptionSettings {
    pub endpoint: EndpointSettings,
    /// Extra attempts after a transient failure (0 disables retry).
    pub max_retries: u32,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Coherence floor: shorter descriptions are rejected.
    pub min_description_chars: usize,
}

impl Default for DescriptionSettings {
    fn default() -> Self {
        Self {
            endpoint: EndpointSettings {
                model: "gpt-4-vision-preview".into(),
                ..EndpointSettings::default()
            },
            max_retries: 1,
            temperature: 0.7,
            max_tokens: 300,
            min_description_chars: 40,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub endpoint: EndpointSettings,
    /// Sample rate requested from the model and assumed when the response
    /// omits one.
    pub sample_rate: u32,
    pub bounds: GenerationBounds,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            endpoint: EndpointSettings {
                model: "musicgen-small".into(),
                timeout_secs: 120,
                ..EndpointSettings::default()
            },
            sample_rate: 32_000,
            bounds: GenerationBounds::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    pub features: FeatureConfig,
    pub decoder: DecoderParams,
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Root of the settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub description: DescriptionSettings,
    pub generation: GenerationSettings,
    pub transcription: TranscriptionSettings,
    pub safety: SafetyPolicy,
}

impl Settings {
    /// Load from the default platform path (see [`crate::config::AppPaths`]).
    pub fn load() -> Result<Self> {
        Self::load_from(&crate::config::AppPaths::new()?.settings_file())
    }

    /// Load from `path`, falling back to defaults when the file is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("no settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("failed to parse settings from {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&crate::config::AppPaths::new()?.settings_file())
    }

    /// Serialize to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(self).context("failed to serialize settings")?;
        std::fs::write(path, text)
            .with_context(|| format!("failed to write settings to {}", path.display()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
