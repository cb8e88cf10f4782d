//! Platform config-directory resolution.

use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_NAME: &str = "musepipe";

/// Well-known file locations under the platform config directory,
/// e.g. `~/.config/musepipe/` on Linux.
#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Result<Self> {
        let base = dirs::config_dir().context("could not determine the user config directory")?;
        Ok(Self {
            config_dir: base.join(APP_NAME),
        })
    }

    pub fn config_dir(&self) -> &PathBuf {
        &self.config_dir
    }

    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_file_lives_under_the_app_dir() {
        let paths = AppPaths::new().unwrap();
        let file = paths.settings_file();
        assert!(file.ends_with("musepipe/settings.toml"));
        assert!(file.starts_with(paths.config_dir()));
    }
}
