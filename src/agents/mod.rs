//! The pipeline's worker agents.
//!
//! Remote agents (description, generation) share the [`ModelEndpoint`] HTTP
//! seam; the transcription agent is pure local compute.  [`AgentKind`] is the
//! closed set of agents the orchestrator dispatches to — adding an agent
//! means adding a variant, which makes every dispatch site a compile error
//! until it handles the newcomer.

pub mod describe;
pub mod endpoint;
pub mod generate;
pub mod prompt;
pub mod transcribe;

pub use describe::{
    ApiDescriber, DescribeError, DescribeRequest, Describer, DescriptionSource, MusicDescription,
    SourceKind,
};
pub use endpoint::{EndpointError, HttpEndpoint, ModelEndpoint};
pub use generate::{
    ApiGenerator, GenerateError, GenerationBounds, GenerationRequest, Generator,
};
pub use prompt::PromptBuilder;
pub use transcribe::{TranscriptionAgent, TranscriptionError, TranscriptionResult};

// ---------------------------------------------------------------------------
// AgentKind
// ---------------------------------------------------------------------------

/// Every agent the orchestrator can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentKind {
    SafetyGate,
    Description,
    Generation,
    Transcription,
}

impl AgentKind {
    pub const ALL: [AgentKind; 4] = [
        AgentKind::SafetyGate,
        AgentKind::Description,
        AgentKind::Generation,
        AgentKind::Transcription,
    ];

    /// Stable identifier used in logs and metric records.
    pub fn name(&self) -> &'static str {
        match self {
            AgentKind::SafetyGate => "safety_gate",
            AgentKind::Description => "description",
            AgentKind::Generation => "generation",
            AgentKind::Transcription => "transcription",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        let mut names: Vec<&str> = AgentKind::ALL.iter().map(|k| k.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), AgentKind::ALL.len());
    }

    #[test]
    fn display_matches_name() {
        for kind in AgentKind::ALL {
            assert_eq!(kind.to_string(), kind.name());
        }
    }
}
