//! Configuration: TOML settings plus platform paths.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    DescriptionSettings, EndpointSettings, GenerationSettings, Settings, TranscriptionSettings,
};
