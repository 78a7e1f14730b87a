//! Letterbox - concurrent batch letterboxing of images
//!
//! Pads every input image vertically with solid black or white bars until it
//! reaches a fixed aspect ratio, then writes it as a JPEG under an output
//! directory. Images whose output is newer than the source are skipped
//! unless the run is forced.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use letterbox::{Config, Dispatcher};
//!
//! # async fn example() -> letterbox::Result<()> {
//! let config = Config::default();
//! let run_config = Arc::new(config.run_config()?);
//!
//! let dispatcher = Dispatcher::new(Some(4));
//! let stats = dispatcher
//!     .run(vec![PathBuf::from("a.jpg"), PathBuf::from("b.jpg")], run_config)
//!     .await?;
//!
//! println!("{}", stats.summary());
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod parallel;
pub mod processing;

// Re-export commonly used types
pub use config::{AspectRatio, Background, Config, ImageTask, LoggingConfig, RunConfig};
pub use error::{LetterboxError, Phase, Result};
pub use parallel::{Dispatcher, RunStats};
pub use processing::{Letterboxer, ProcessingEngine, SkipDecision, SkipPolicy};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging from `RUST_LOG`
///
/// Installs a tracing subscriber if none is set yet and logs host
/// capabilities. Safe to call more than once.
pub fn init() -> Result<()> {
    if tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .finish(),
    )
    .is_ok()
    {
        info!("letterbox v{} initialized", VERSION);
    }

    validate_system_requirements();

    Ok(())
}

/// Initialize logging from a logging configuration
pub fn init_with_config(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.level).map_err(|e| {
        LetterboxError::config(format!("Invalid log level {:?}: {}", config.level, e))
    })?;

    // stdout is reserved for program output such as `--json`
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = if config.json_format {
        tracing::subscriber::set_global_default(builder.json().finish()).is_ok()
    } else {
        tracing::subscriber::set_global_default(builder.finish()).is_ok()
    };

    if installed {
        info!("letterbox v{} initialized", VERSION);
    }

    validate_system_requirements();

    Ok(())
}

fn validate_system_requirements() {
    use sysinfo::{System, SystemExt};

    let mut system = System::new();
    system.refresh_memory();

    const MIN_MEMORY_MB: u64 = 256;
    let available_memory = system.available_memory();
    if available_memory < MIN_MEMORY_MB * 1024 * 1024 {
        warn!(
            "Low available memory: {}MB (recommended: >{}MB)",
            available_memory / (1024 * 1024),
            MIN_MEMORY_MB
        );
    }

    info!(
        "Detected {} logical CPUs, JPEG decode: {}, PNG decode: {}",
        num_cpus::get(),
        image::ImageFormat::Jpeg.can_read(),
        image::ImageFormat::Png.can_read()
    );
}
