//! Bounded-concurrency dispatch of letterbox tasks

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::config::{ImageTask, RunConfig};
use crate::error::{LetterboxError, Result};
use crate::processing::{ProcessingEngine, ProcessingResult, SkipDecision, SkipPolicy};

pub mod progress;

pub use progress::*;

/// Runs tasks with at most `concurrency` in flight
pub struct Dispatcher {
    engine: Arc<ProcessingEngine>,
    concurrency: usize,
    progress_tracker: Arc<ProgressTracker>,
    semaphore: Arc<Semaphore>,
}

/// How a single task ended
#[derive(Debug)]
pub enum TaskOutcome {
    Processed(ProcessingResult),
    Skipped,
}

impl Dispatcher {
    /// Create a dispatcher; `None` uses the host's logical CPU count
    pub fn new(concurrency: Option<usize>) -> Self {
        let concurrency = concurrency.unwrap_or_else(num_cpus::get).max(1);

        info!("Initializing dispatcher with {} concurrent workers", concurrency);

        Self {
            engine: Arc::new(ProcessingEngine::new()),
            concurrency,
            progress_tracker: Arc::new(ProgressTracker::new()),
            semaphore: Arc::new(Semaphore::new(concurrency)),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Shared progress tracker, subscribe before calling [`Dispatcher::run`]
    pub fn tracker(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.progress_tracker)
    }

    /// Process every source, in submission order, with bounded parallelism.
    ///
    /// Submission waits for a free worker slot. The first failing task halts
    /// submission; tasks already running finish, then that error is returned.
    pub async fn run(&self, sources: Vec<PathBuf>, config: Arc<RunConfig>) -> Result<RunStats> {
        let start_time = Instant::now();
        let total = sources.len();

        info!("Processing {} images", total);
        self.progress_tracker.start(total);

        let policy = SkipPolicy::new(config.force);
        let halted = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();

        for source in sources {
            let permit = Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .map_err(|e| LetterboxError::system(format!("Worker pool closed: {}", e)))?;

            if halted.load(Ordering::SeqCst) {
                debug!("Halting submission after a failed task");
                break;
            }

            let task = ImageTask::new(source, Arc::clone(&config));
            let engine = Arc::clone(&self.engine);
            let tracker = Arc::clone(&self.progress_tracker);
            let halted = Arc::clone(&halted);

            tasks.spawn(async move {
                let _permit = permit;
                let result = run_task(&task, &engine, policy, &tracker).await;
                if let Err(e) = &result {
                    error!("error converting {:?}: {}", task.source, e);
                    halted.store(true, Ordering::SeqCst);
                }
                result
            });
        }

        // Join barrier: every submitted task has finished past this loop
        let mut processed = 0;
        let mut skipped = 0;
        let mut first_error = None;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(TaskOutcome::Processed(_))) => processed += 1,
                Ok(Ok(TaskOutcome::Skipped)) => skipped += 1,
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error
                        .get_or_insert(LetterboxError::system(format!("Task join error: {}", e)));
                }
            }
        }

        self.progress_tracker.finish();

        if let Some(e) = first_error {
            return Err(e);
        }

        let stats = RunStats {
            total,
            processed,
            skipped,
            elapsed: start_time.elapsed(),
        };

        info!("{}", stats.summary());
        Ok(stats)
    }

    /// Report what a run would do without writing anything
    pub async fn plan(
        &self,
        sources: &[PathBuf],
        config: &RunConfig,
    ) -> Result<Vec<(PathBuf, SkipDecision)>> {
        let policy = SkipPolicy::new(config.force);
        let mut plan = Vec::with_capacity(sources.len());

        for source in sources {
            let decision = policy.evaluate(source, &config.output_dir).await?;
            plan.push((source.clone(), decision));
        }

        Ok(plan)
    }
}

async fn run_task(
    task: &ImageTask,
    engine: &ProcessingEngine,
    policy: SkipPolicy,
    tracker: &Arc<ProgressTracker>,
) -> Result<TaskOutcome> {
    info!("Letterboxing {}", task.source.display());

    if policy.evaluate(&task.source, &task.config.output_dir).await? == SkipDecision::Skip {
        info!("(!) Image {} was already processed", task.source.display());
        tracker.skip_file(&task.source);
        return Ok(TaskOutcome::Skipped);
    }

    let in_flight = tracker.begin_file(&task.source);
    let result = engine.process(task).await?;
    in_flight.complete(result.processing_time);

    debug!(
        "Finished {} in {:.2}s ({} rows of padding)",
        task.source.display(),
        result.processing_time.as_secs_f64(),
        result.padding_rows()
    );

    Ok(TaskOutcome::Processed(result))
}

/// Summary of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

impl RunStats {
    /// Elapsed wall-clock time rounded to the nearest second
    pub fn elapsed_rounded(&self) -> Duration {
        Duration::from_secs(self.elapsed.as_secs_f64().round() as u64)
    }

    /// "Processed N images in Xs"
    pub fn summary(&self) -> String {
        format!(
            "Processed {} images in {}s",
            self.processed,
            self.elapsed_rounded().as_secs()
        )
    }
}

fn serialize_secs<S: Serializer>(
    elapsed: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64())
}
