//! Request orchestration: state machine, cancellation, and the runner.

pub mod cancel;
pub mod runner;
pub mod state;

pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use runner::{
    MusicOutput, MusicRequest, Orchestrator, PipelineError, PipelineReport, Task, TaskOutput,
};
pub use state::{RequestState, StateMachine};
