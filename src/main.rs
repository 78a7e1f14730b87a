//! Letterbox CLI - pad a batch of images to a fixed aspect ratio
//!
//! Every image is written as a JPEG to `<output>/<path>`. Without explicit
//! paths, `.jpg`/`.jpeg` files in the current directory are processed.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::debug;

use letterbox::parallel::ProgressUpdate;
use letterbox::processing::list_images;
use letterbox::{Background, Config, Dispatcher, LetterboxError, Phase, SkipDecision};

/// Letterbox - batch-convert images into letterboxed JPEGs
#[derive(Parser)]
#[command(
    name = "letterbox",
    version,
    about = "Pad images with solid bars to a fixed aspect ratio",
    long_about = "Letterbox pads every image vertically with black or white bars until it \
                  reaches the requested aspect ratio and writes it as a JPEG under the output \
                  directory. Images whose output is newer than the source are skipped unless \
                  --force is given."
)]
struct Cli {
    /// Images to process (default: every .jpg/.jpeg in the current directory)
    #[arg(value_name = "IMAGE")]
    images: Vec<PathBuf>,

    /// Image output directory [default: processed]
    #[arg(long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Output a white letterbox
    #[arg(long)]
    white: bool,

    /// Output aspect ratio [default: 16:9]
    #[arg(long, value_name = "A:B")]
    aspect: Option<String>,

    /// Concurrency of image processing [default: number of CPUs]
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Force image reprocess when already exists
    #[arg(long)]
    force: bool,

    /// Configuration file (.toml or .yaml), overridden by flags
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the effective configuration to FILE and exit
    #[arg(long, value_name = "FILE")]
    write_config: Option<PathBuf>,

    /// Show what would be processed without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Print run statistics as JSON
    #[arg(long)]
    json: bool,

    /// Show a progress bar
    #[arg(long)]
    progress: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short = 'Q', long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        report(&e);
        process::exit(1);
    }
}

fn report(e: &anyhow::Error) {
    match e.downcast_ref::<LetterboxError>() {
        Some(err) => {
            let label = if err.is_fatal_setup() {
                "Setup error"
            } else {
                "Error"
            };
            eprintln!("{}: {}", style(label).red().bold(), err.user_message());
        }
        None => eprintln!("{}: {:#}", style("Error").red().bold(), e),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    letterbox::init_with_config(&config.logging)?;

    if let Some(path) = &cli.write_config {
        config.to_file(path)?;
        println!(
            "{}: wrote configuration to {}",
            style("Success").green().bold(),
            path.display()
        );
        return Ok(());
    }

    config.validate().context("invalid configuration")?;

    if !cli.dry_run {
        tokio::fs::create_dir_all(&config.output)
            .await
            .map_err(|e| LetterboxError::io(Phase::CreatingOutputDir, &config.output, e))
            .context("error creating output directory")?;
    }

    let run_config = Arc::new(config.run_config().context("error parsing aspect ratio")?);
    debug!("Run configuration: {:?}", run_config);

    let images = if cli.images.is_empty() {
        list_images(Path::new(".")).context("error listing images")?
    } else {
        cli.images.clone()
    };

    let dispatcher = Dispatcher::new(Some(config.effective_concurrency()));

    if cli.dry_run {
        return print_plan(&dispatcher, &images, &run_config).await;
    }

    let progress = (cli.progress && !cli.json && !cli.quiet)
        .then(|| spawn_progress_bar(dispatcher.tracker().subscribe()));

    let result = dispatcher.run(images, run_config).await;

    if let Some(handle) = progress {
        if result.is_ok() {
            let _ = handle.await;
        } else {
            handle.abort();
        }
    }

    let stats = result.context("processing failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }

    Ok(())
}

/// Built-in defaults, then the config file, then command-line flags
fn load_config(cli: &Cli) -> letterbox::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(output) = &cli.output {
        config.output = output.clone();
    }
    if cli.white {
        config.background = Background::White;
    }
    if let Some(aspect) = &cli.aspect {
        config.aspect = aspect.clone();
    }
    if cli.concurrency.is_some() {
        config.concurrency = cli.concurrency;
    }
    if cli.force {
        config.force = true;
    }

    if cli.verbose {
        config.logging.level = "debug".to_string();
    } else if cli.quiet {
        config.logging.level = "error".to_string();
    }

    Ok(config)
}

async fn print_plan(
    dispatcher: &Dispatcher,
    images: &[PathBuf],
    run_config: &letterbox::RunConfig,
) -> anyhow::Result<()> {
    let plan = dispatcher
        .plan(images, run_config)
        .await
        .context("error checking existing outputs")?;

    let pending = plan
        .iter()
        .filter(|(_, decision)| *decision == SkipDecision::Process)
        .count();

    println!("{} of {} images would be processed:", style(pending).bold(), plan.len());
    for (path, decision) in &plan {
        match decision {
            SkipDecision::Process => println!("  {} {}", style("process").green(), path.display()),
            SkipDecision::Skip => println!("  {} {}", style("skip").dim(), path.display()),
        }
    }

    Ok(())
}

fn spawn_progress_bar(mut updates: broadcast::Receiver<ProgressUpdate>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        loop {
            match updates.recv().await {
                Ok(ProgressUpdate::Started { total }) => pb.set_length(total as u64),
                Ok(ProgressUpdate::FileStarted { path }) => {
                    pb.set_message(path.display().to_string());
                }
                Ok(ProgressUpdate::FileSkipped { .. } | ProgressUpdate::FileCompleted { .. }) => {
                    pb.inc(1);
                }
                Ok(ProgressUpdate::Finished { state }) => {
                    pb.finish_with_message(format!(
                        "done ({:.0}%, {} skipped)",
                        state.completion_percentage(),
                        state.skipped
                    ));
                    return;
                }
                Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(_)) => continue,
            }
        }

        pb.finish_with_message("done");
    })
}
