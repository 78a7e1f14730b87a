//! Configuration management for letterbox

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{LetterboxError, Result};

pub mod aspect;
pub use aspect::*;

/// JPEG quality used unless a config file overrides it
pub const DEFAULT_QUALITY: u8 = 90;

/// Main configuration structure
///
/// Every field has a default, so a config file only needs to name the
/// settings it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output directory, source paths are joined onto it
    pub output: PathBuf,

    /// Letterbox bar colour
    pub background: Background,

    /// Aspect ratio string, e.g. "16:9"
    pub aspect: String,

    /// Number of concurrent workers (None = host parallelism)
    pub concurrency: Option<usize>,

    /// Reprocess images even when their output is up to date
    pub force: bool,

    /// JPEG quality (1-100)
    pub quality: u8,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: PathBuf::from("processed"),
            background: Background::Black,
            aspect: "16:9".to_string(),
            concurrency: None,
            force: false,
            quality: DEFAULT_QUALITY,
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Colour of the letterbox bars
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Background {
    #[default]
    Black,
    White,
}

impl Background {
    /// Fully opaque pixel value
    pub fn rgba(self) -> image::Rgba<u8> {
        match self {
            Self::Black => image::Rgba([0, 0, 0, 255]),
            Self::White => image::Rgba([255, 255, 255, 255]),
        }
    }
}

/// Immutable per-run settings shared by every task
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub output_dir: PathBuf,
    pub background: Background,
    pub ratio: AspectRatio,
    pub force: bool,
    pub quality: u8,
}

/// One unit of work: a source path plus the shared run settings
#[derive(Debug, Clone)]
pub struct ImageTask {
    pub source: PathBuf,
    pub config: Arc<RunConfig>,
}

impl ImageTask {
    pub fn new(source: PathBuf, config: Arc<RunConfig>) -> Self {
        Self { source, config }
    }

    /// Destination path: the source joined as-is onto the output directory
    pub fn destination(&self) -> PathBuf {
        output_path(&self.config.output_dir, &self.source)
    }
}

/// `<output_dir>/<source>`, keeping every directory component of `source`.
///
/// Root and drive prefixes are dropped so absolute sources nest under the
/// output directory instead of replacing it.
pub fn output_path(output_dir: &Path, source: &Path) -> PathBuf {
    let mut path = output_dir.to_path_buf();
    for component in source.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {}
            other => path.push(other),
        }
    }
    path
}

impl Config {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            LetterboxError::config(format!(
                "Failed to read config file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;

        match config_extension(path.as_ref()).as_str() {
            "toml" => toml::from_str(&content).map_err(Into::into),
            "yaml" | "yml" => serde_yaml::from_str(&content).map_err(Into::into),
            _ => Err(LetterboxError::config(
                "Unsupported config file format. Use .toml or .yaml",
            )),
        }
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = match config_extension(path.as_ref()).as_str() {
            "toml" => toml::to_string_pretty(self)?,
            "yaml" | "yml" => serde_yaml::to_string(self)?,
            _ => {
                return Err(LetterboxError::config(
                    "Unsupported config file format. Use .toml or .yaml",
                ))
            }
        };

        std::fs::write(&path, content).map_err(|e| {
            LetterboxError::config(format!(
                "Failed to write config file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == Some(0) {
            return Err(LetterboxError::config(
                "Concurrency must be greater than 0",
            ));
        }

        if self.quality == 0 || self.quality > 100 {
            return Err(LetterboxError::config(format!(
                "Quality must be between 1 and 100, got {}",
                self.quality
            )));
        }

        AspectRatio::parse(&self.aspect)?;

        Ok(())
    }

    /// Effective worker count
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Resolve the immutable settings used by every task of a run
    pub fn run_config(&self) -> Result<RunConfig> {
        self.validate()?;

        Ok(RunConfig {
            output_dir: self.output.clone(),
            background: self.background,
            ratio: AspectRatio::parse(&self.aspect)?,
            force: self.force,
            quality: self.quality,
        })
    }
}

fn config_extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase()
}
