//! Application settings: defaults, then an optional JSON file, then
//! environment variables. CLI flags are applied last by the binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engines::piper::PiperConfig;
use crate::engines::xtts::XttsConfig;
use crate::error::{Error, Result};

pub const DEFAULT_PORT: u16 = 7860;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where the web form writes its WAV files.
    pub output_dir: PathBuf,
    pub port: u16,
    pub piper: PiperConfig,
    pub xtts: XttsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            port: DEFAULT_PORT,
            piper: PiperConfig::default(),
            xtts: XttsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Defaults, overlaid with `file` when given, then the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read '{}': {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("'{}': {e}", path.display())))
    }

    /// Apply the `PIPER_*`, `XTTS_*` and `PORT` variables found by `lookup`.
    /// Blank values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = var("PIPER_VOICE_DIR") {
            self.piper.voice_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("PIPER_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(bin) = var("PIPER_BIN") {
            self.piper.program = bin;
        }
        if let Some(python) = var("XTTS_PYTHON") {
            self.xtts.python = python;
        }
        if let Some(model) = var("XTTS_MODEL") {
            self.xtts.model_name = model;
        }
        if let Some(port) = var("PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("PORT must be a port number, got '{port}'")))?;
        }
        Ok(())
    }
}
