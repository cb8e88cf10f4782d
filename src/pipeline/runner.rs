//! The orchestrator: sequences agents, tracks state, records metrics.
//!
//! # Architecture
//!
//! [`Orchestrator`] owns one instance of every agent behind its trait seam
//! plus the [`MetricLog`].  A request enters through [`Orchestrator::run_task`]
//! (or the per-path `run_music` / `run_transcription`) together with a
//! [`CancelToken`], walks the state machine, and leaves as a
//! [`PipelineReport`] whose terminal state is either `Complete` with an
//! output or `Failed` with a reason.
//!
//! Failure policy:
//!
//! * safety rejection fails the request immediately with the gate's reason,
//!   before any remote call;
//! * the description stage retries once per configured `max_retries` on
//!   transient endpoint failures, with one metric record per attempt;
//! * generation and transcription never retry;
//! * cancellation is observed between stages and across every `.await`.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use thiserror::Error;

use crate::agents::describe::{DescribeError, DescribeRequest, Describer, DescriptionSource};
use crate::agents::generate::{GenerateError, GenerationRequest, Generator};
use crate::agents::transcribe::{TranscriptionAgent, TranscriptionError, TranscriptionResult};
use crate::agents::{AgentKind, ApiDescriber, ApiGenerator, HttpEndpoint, MusicDescription};
use crate::audio::AudioBuffer;
use crate::config::Settings;
use crate::metrics::{AgentMetricRecord, MetricLog};
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::state::{RequestState, StateMachine};
use crate::safety::SafetyGate;

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Terminal failure of one request.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The safety gate rejected the request; payload is the gate's reason.
    #[error("{0}")]
    UnsafeContent(String),

    #[error("description failed: {0}")]
    Describe(#[from] DescribeError),

    #[error("generation failed: {0}")]
    Generate(#[from] GenerateError),

    #[error("transcription failed: {0}")]
    Transcribe(#[from] TranscriptionError),

    #[error("request cancelled")]
    Cancelled,

    /// A bug surfaced as an error instead of a panic.
    #[error("internal pipeline error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// Requests / outputs
// ---------------------------------------------------------------------------

/// A music-creation request (image or text source).
#[derive(Debug, Clone)]
pub struct MusicRequest {
    pub source: DescriptionSource,
    pub duration_secs: f32,
    pub guidance_scale: f32,
    pub temperature: f32,
    pub style_hint: Option<String>,
}

impl MusicRequest {
    /// Text request with default sampling parameters.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            source: DescriptionSource::Text(text.into()),
            duration_secs: 10.0,
            guidance_scale: 3.5,
            temperature: 1.0,
            style_hint: None,
        }
    }

    /// Image request with default sampling parameters.
    pub fn from_image(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            source: DescriptionSource::Image {
                bytes,
                mime: mime.into(),
            },
            duration_secs: 10.0,
            guidance_scale: 3.5,
            temperature: 1.0,
            style_hint: None,
        }
    }

    /// Everything textual about the request, for safety screening.
    fn safety_text(&self) -> String {
        let mut text = match &self.source {
            DescriptionSource::Text(t) => t.clone(),
            DescriptionSource::Image { .. } => String::new(),
        };
        if let Some(hint) = &self.style_hint {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(hint);
        }
        text
    }
}

/// Result of a completed music request, with full provenance: the accepted
/// description and the exact generation parameters used.
#[derive(Debug, Clone)]
pub struct MusicOutput {
    pub description: MusicDescription,
    pub request: GenerationRequest,
    pub audio: AudioBuffer,
}

/// One unit of work for [`Orchestrator::run_task`].
#[derive(Debug, Clone)]
pub enum Task {
    Music(MusicRequest),
    Transcribe(AudioBuffer),
}

#[derive(Debug, Clone)]
pub enum TaskOutput {
    Music(MusicOutput),
    Transcription(TranscriptionResult),
}

// ---------------------------------------------------------------------------
// PipelineReport
// ---------------------------------------------------------------------------

/// Terminal outcome of one request: the final state plus, on success, the
/// output and, on failure, the typed error.
#[derive(Debug)]
pub struct PipelineReport<T> {
    pub state: RequestState,
    pub output: Option<T>,
    pub error: Option<PipelineError>,
}

impl<T> PipelineReport<T> {
    pub fn is_complete(&self) -> bool {
        matches!(self.state, RequestState::Complete)
    }

    /// The `Failed` reason, verbatim.
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.state {
            RequestState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PipelineReport<U> {
        PipelineReport {
            state: self.state,
            output: self.output.map(f),
            error: self.error,
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator {
    safety: SafetyGate,
    describer: Arc<dyn Describer>,
    generator: Arc<dyn Generator>,
    transcriber: TranscriptionAgent,
    metrics: MetricLog,
    max_describe_retries: u32,
}

impl Orchestrator {
    /// Build an orchestrator with injected remote agents (the seam tests
    /// use for mocking).  Local agents come from `settings`.
    pub fn new(
        settings: &Settings,
        describer: Arc<dyn Describer>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            safety: SafetyGate::new(settings.safety.clone()),
            describer,
            generator,
            transcriber: TranscriptionAgent::new(&settings.transcription),
            metrics: MetricLog::new(),
            max_describe_retries: settings.description.max_retries,
        }
    }

    /// Build an orchestrator whose remote agents call the configured HTTP
    /// endpoints.
    pub fn from_settings(settings: &Settings) -> Self {
        let describer = Arc::new(ApiDescriber::new(
            Arc::new(HttpEndpoint::new(
                &settings.description.endpoint,
                "/v1/chat/completions",
            )),
            settings.description.clone(),
        ));
        let generator = Arc::new(ApiGenerator::new(
            Arc::new(HttpEndpoint::new(&settings.generation.endpoint, "/generate")),
            settings.generation.clone(),
        ));
        Self::new(settings, describer, generator)
    }

    pub fn metrics(&self) -> &MetricLog {
        &self.metrics
    }

    // -----------------------------------------------------------------------
    // Task dispatch
    // -----------------------------------------------------------------------

    pub async fn run_task(&self, task: Task, cancel: &CancelToken) -> PipelineReport<TaskOutput> {
        match task {
            Task::Music(request) => self.run_music(request, cancel).await.map(TaskOutput::Music),
            Task::Transcribe(audio) => self
                .run_transcription(audio, cancel)
                .await
                .map(TaskOutput::Transcription),
        }
    }

    // -----------------------------------------------------------------------
    // Music path: safety → describe → generate
    // -----------------------------------------------------------------------

    pub async fn run_music(
        &self,
        request: MusicRequest,
        cancel: &CancelToken,
    ) -> PipelineReport<MusicOutput> {
        let mut machine = StateMachine::new();
        match self.run_music_inner(&request, cancel, &mut machine).await {
            Ok(output) => PipelineReport {
                state: machine.state().clone(),
                output: Some(output),
                error: None,
            },
            Err(error) => self.fail(&mut machine, error),
        }
    }

    async fn run_music_inner(
        &self,
        request: &MusicRequest,
        cancel: &CancelToken,
        machine: &mut StateMachine,
    ) -> Result<MusicOutput, PipelineError> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        // Safety gate runs before anything leaves the process.
        let started_at = SystemTime::now();
        let started = Instant::now();
        let verdict = self.safety.validate(&request.safety_text());
        self.record(
            AgentKind::SafetyGate,
            started_at,
            started.elapsed(),
            verdict.is_safe,
            None,
        );
        if !verdict.is_safe {
            let reason = verdict
                .reason
                .unwrap_or_else(|| "rejected by safety policy".into());
            return Err(PipelineError::UnsafeContent(reason));
        }
        machine.advance(RequestState::Validated).map_err(internal)?;

        machine.advance(RequestState::Describing).map_err(internal)?;
        let description = self.describe_with_retry(request, cancel).await?;
        log::info!("description ready from model {}", description.model);

        machine.advance(RequestState::Generating).map_err(internal)?;
        let generation_request = GenerationRequest {
            description: description.prompt.clone(),
            duration_secs: request.duration_secs,
            guidance_scale: request.guidance_scale,
            temperature: request.temperature,
        };
        let audio = self.invoke_generate(&generation_request, cancel).await?;

        machine.advance(RequestState::Complete).map_err(internal)?;
        Ok(MusicOutput {
            description,
            request: generation_request,
            audio,
        })
    }

    /// Run the description agent, retrying transient failures up to the
    /// configured count.  Every attempt records one metric.
    async fn describe_with_retry(
        &self,
        request: &MusicRequest,
        cancel: &CancelToken,
    ) -> Result<MusicDescription, PipelineError> {
        let describe_request = DescribeRequest {
            source: request.source.clone(),
            duration_secs: request.duration_secs,
            style_hint: request.style_hint.clone(),
        };

        let mut attempt = 0u32;
        loop {
            let started_at = SystemTime::now();
            let started = Instant::now();

            let outcome = tokio::select! {
                _ = cancel.cancelled() => None,
                result = self.describer.describe(&describe_request) => Some(result),
            };
            let Some(result) = outcome else {
                self.record(
                    AgentKind::Description,
                    started_at,
                    started.elapsed(),
                    false,
                    None,
                );
                return Err(PipelineError::Cancelled);
            };

            match result {
                Ok(description) => {
                    self.record(
                        AgentKind::Description,
                        started_at,
                        started.elapsed(),
                        true,
                        None,
                    );
                    return Ok(description);
                }
                Err(e) => {
                    self.record(
                        AgentKind::Description,
                        started_at,
                        started.elapsed(),
                        false,
                        None,
                    );
                    if e.is_transient() && attempt < self.max_describe_retries {
                        attempt += 1;
                        log::warn!("description attempt failed ({e}), retry {attempt}");
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }

    /// Run the generation agent.  Never retried: a failed generation is
    /// either a parameter bug or an expensive model-side problem.
    async fn invoke_generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancelToken,
    ) -> Result<AudioBuffer, PipelineError> {
        let started_at = SystemTime::now();
        let started = Instant::now();

        let outcome = tokio::select! {
            _ = cancel.cancelled() => None,
            result = self.generator.generate(request) => Some(result),
        };
        let Some(result) = outcome else {
            self.record(
                AgentKind::Generation,
                started_at,
                started.elapsed(),
                false,
                None,
            );
            return Err(PipelineError::Cancelled);
        };

        let success = result.is_ok();
        self.record(
            AgentKind::Generation,
            started_at,
            started.elapsed(),
            success,
            None,
        );
        result.map_err(PipelineError::from)
    }

    // -----------------------------------------------------------------------
    // Transcription path: extract → decode → assemble
    // -----------------------------------------------------------------------

    pub async fn run_transcription(
        &self,
        audio: AudioBuffer,
        cancel: &CancelToken,
    ) -> PipelineReport<TranscriptionResult> {
        let mut machine = StateMachine::new();
        match self
            .run_transcription_inner(audio, cancel, &mut machine)
            .await
        {
            Ok(result) => PipelineReport {
                state: machine.state().clone(),
                output: Some(result),
                error: None,
            },
            Err(error) => self.fail(&mut machine, error),
        }
    }

    async fn run_transcription_inner(
        &self,
        audio: AudioBuffer,
        cancel: &CancelToken,
        machine: &mut StateMachine,
    ) -> Result<TranscriptionResult, PipelineError> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let source_duration_secs = audio.duration_secs();
        let sample_rate = audio.sample_rate();

        let started_at = SystemTime::now();
        let started = Instant::now();

        machine.advance(RequestState::Extracting).map_err(internal)?;
        // Feature extraction is pure CPU work; run it off the async runtime.
        // Cancellation takes effect once the current computation finishes.
        let agent = self.transcriber.clone();
        let handle = tokio::task::spawn_blocking(move || agent.extract(&audio));
        let outcome = tokio::select! {
            _ = cancel.cancelled() => None,
            joined = handle => Some(joined),
        };
        let features = match outcome {
            None => {
                self.record(
                    AgentKind::Transcription,
                    started_at,
                    started.elapsed(),
                    false,
                    None,
                );
                return Err(PipelineError::Cancelled);
            }
            Some(joined) => {
                let result = joined.map_err(|e| PipelineError::Internal(e.to_string()))?;
                match result {
                    Ok(features) => features,
                    Err(e) => {
                        self.record(
                            AgentKind::Transcription,
                            started_at,
                            started.elapsed(),
                            false,
                            None,
                        );
                        return Err(TranscriptionError::from(e).into());
                    }
                }
            }
        };

        machine.advance(RequestState::Decoding).map_err(internal)?;
        let notes = self.transcriber.decode(&features);

        machine.advance(RequestState::Transcribing).map_err(internal)?;
        let result = self
            .transcriber
            .assemble(notes, source_duration_secs, sample_rate);
        self.record(
            AgentKind::Transcription,
            started_at,
            started.elapsed(),
            true,
            Some(result.confidence),
        );

        machine.advance(RequestState::Complete).map_err(internal)?;
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Shared helpers
    // -----------------------------------------------------------------------

    fn record(
        &self,
        agent: AgentKind,
        timestamp: SystemTime,
        duration: Duration,
        success: bool,
        quality_score: Option<f32>,
    ) {
        self.metrics.record(AgentMetricRecord {
            agent,
            timestamp,
            duration,
            success,
            quality_score,
        });
    }

    /// Drive the machine to `Failed` and wrap up the report.
    fn fail<T>(&self, machine: &mut StateMachine, error: PipelineError) -> PipelineReport<T> {
        let reason = match &error {
            PipelineError::UnsafeContent(reason) => reason.clone(),
            other => other.to_string(),
        };
        log::error!("request failed in state {}: {reason}", machine.state().label());
        if !machine.state().is_terminal() {
            let _ = machine.advance(RequestState::Failed(reason));
        }
        PipelineReport {
            state: machine.state().clone(),
            output: None,
            error: Some(error),
        }
    }
}

fn internal(e: crate::pipeline::state::InvalidTransition) -> PipelineError {
    PipelineError::Internal(e.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
