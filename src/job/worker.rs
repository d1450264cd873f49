// worker.rs - Job orchestrator running the staged pipeline on a private worker pool

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};

use crate::core::command::Toolchain;
use crate::core::distance::{calculate_distance_matrix, CompressedSizes, DistanceMatrix, Scale};
use crate::core::pairs::{merge_pair, plan_merges, PairKey, SortedFile};
use crate::data::extract::{extract_sequences, ExtractOutcome, ExtractParams};
use crate::data::sample::{check_unique_names, NodeRef, Sample, SampleSource, SequenceFormat};
use crate::error::{CbdError, Result};
use crate::job::services::{timestamp, JobResults, JobTracker, ObjectStore};
use crate::job::state::{JobState, Lifecycle, TOTAL_STEPS};
use crate::job::JobLog;
use crate::output::write_matrix_csv;

/// Fewest samples a distance matrix can be built from
pub const MIN_SAMPLES: usize = 2;

/// Seconds ahead of now reported as the estimated completion time
const EST_COMPLETE_SECONDS: i64 = 3600;

const SORTED_EXTENSION: &str = ".sorted";

/// Service-level settings shared by every job a worker runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Parent of the per-job working directories
    pub work_folder: PathBuf,
    /// Number of OS threads in each job's pool
    pub pool_size: usize,
    #[serde(default)]
    pub toolchain: Toolchain,
    #[serde(default)]
    pub show_progress: bool,
}

impl WorkerConfig {
    pub fn new(work_folder: impl Into<PathBuf>, pool_size: usize) -> Self {
        Self {
            work_folder: work_folder.into(),
            pool_size,
            toolchain: Toolchain::default(),
            show_progress: false,
        }
    }
}

/// Parameters and inputs of one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInput {
    /// Inputs held by the object store; deleted when the job ends
    #[serde(default)]
    pub node_refs: Vec<NodeRef>,
    /// Inputs already on the local file system; never deleted
    #[serde(default)]
    pub file_paths: Vec<PathBuf>,
    pub format: SequenceFormat,
    #[serde(default)]
    pub scale: Scale,
    #[serde(default)]
    pub extract: ExtractParams,
    /// Use the slower, stronger compression preset
    #[serde(default)]
    pub extreme: bool,
}

impl JobInput {
    pub fn new(format: SequenceFormat) -> Self {
        Self {
            node_refs: Vec::new(),
            file_paths: Vec::new(),
            format,
            scale: Scale::default(),
            extract: ExtractParams::default(),
            extreme: false,
        }
    }

    pub fn file_count(&self) -> usize {
        self.node_refs.len() + self.file_paths.len()
    }
}

/// Summary of a successful job
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: String,
    pub matrix: DistanceMatrix,
    pub matrix_node: NodeRef,
    /// Samples removed for having too few reads
    pub dropped: Vec<String>,
}

/// Artifact a compressed size belongs to
enum Artifact {
    Single(String),
    Pair(PairKey),
}

/// Runs jobs stage by stage; each stage is a barrier over its units
pub struct Worker {
    config: WorkerConfig,
    store: Arc<dyn ObjectStore>,
    tracker: Arc<dyn JobTracker>,
}

impl Worker {
    pub fn new(config: WorkerConfig, store: Arc<dyn ObjectStore>, tracker: Arc<dyn JobTracker>) -> Self {
        Self {
            config,
            store,
            tracker,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run a job already registered with the tracker under `log.job_id()`.
    /// Cleanup always runs and the tracker is completed exactly once.
    pub fn run(&self, input: &JobInput, log: &JobLog) -> Result<JobReport> {
        let job_dir = self.config.work_folder.join(log.job_id());
        let mut lifecycle = Lifecycle::new();
        log.info(format!("Starting job with {} input files", input.file_count()));

        // The pool lives only inside this closure
        let outcome = self
            .build_pool()
            .and_then(|pool| self.execute(&pool, input, &job_dir, &mut lifecycle, log));

        self.cleanup(input, &job_dir, log);

        let completion = match &outcome {
            Ok(report) => {
                if let Err(e) = lifecycle.advance(JobState::Done) {
                    log.warn(e);
                }
                log.info(format!(
                    "Job done: {} samples, matrix stored as node {}",
                    report.matrix.len(),
                    report.matrix_node
                ));
                let results = JobResults {
                    nodes: vec![report.matrix_node.clone()],
                    store_url: self.store.url(),
                };
                self.tracker.complete_job(log.job_id(), "done", None, &results)
            }
            Err(e) => {
                if let Err(msg) = lifecycle.advance(JobState::Failed) {
                    log.warn(msg);
                }
                let detail = e.completion_detail();
                if let Some(failure) = e.command_failure() {
                    log.debug(format!(
                        "Command '{}' returned {}",
                        failure.command,
                        failure.return_code()
                    ));
                }
                log.error(format!(
                    "Job failed at step {}/{}: {}",
                    lifecycle.step(),
                    TOTAL_STEPS,
                    detail
                ));
                self.tracker
                    .complete_job(log.job_id(), "failed", Some(&detail), &JobResults::default())
            }
        };
        if let Err(e) = completion {
            log.error(format!("Failed to complete job with the tracker: {}", e));
        }

        outcome
    }

    fn build_pool(&self) -> Result<ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.pool_size.max(1))
            .build()
            .map_err(|e| CbdError::Worker(format!("Failed to create worker pool: {}", e)))
    }

    fn execute(
        &self,
        pool: &ThreadPool,
        input: &JobInput,
        job_dir: &Path,
        lifecycle: &mut Lifecycle,
        log: &JobLog,
    ) -> Result<JobReport> {
        let samples = self.resolve_samples(input)?;
        check_unique_names(&samples)?;
        fs::create_dir_all(job_dir).map_err(|e| {
            CbdError::io(format!("Failed to create job folder '{}'", job_dir.display()), e)
        })?;

        self.enter(lifecycle, JobState::Extracting, log);
        let (extracted, dropped) = self.extract_all(pool, &samples, &input.extract, job_dir, log)?;
        if extracted.len() < MIN_SAMPLES {
            return Err(CbdError::InsufficientSamples {
                retained: extracted.len(),
                required: MIN_SAMPLES,
            });
        }

        self.enter(lifecycle, JobState::Sorting, log);
        let tools = &self.config.toolchain;
        let sorted = self.run_stage(pool, "sorting", &extracted, |file| {
            let dest = job_dir.join(format!("{}{}", file.name, SORTED_EXTENSION));
            tools.sort(&file.path, &dest)?;
            Ok(SortedFile {
                name: file.name.clone(),
                path: dest,
            })
        })?;

        self.enter(lifecycle, JobState::Merging, log);
        let plans = plan_merges(&sorted, job_dir, SORTED_EXTENSION);
        let merged = self.run_stage(pool, "merging", &plans, |plan| merge_pair(plan, tools))?;
        log.debug(format!("Merged {} pairs", merged.len()));

        self.enter(lifecycle, JobState::Compressing, log);
        let mut units: Vec<(Artifact, PathBuf)> = sorted
            .iter()
            .map(|f| (Artifact::Single(f.name.clone()), f.path.clone()))
            .collect();
        units.extend(plans.iter().map(|p| (Artifact::Pair(p.pair.clone()), p.output.clone())));
        let compressed = self.run_stage(pool, "compressing", &units, |(_, path)| {
            tools.compress(path, input.extreme)
        })?;
        let mut sizes = CompressedSizes::new();
        for ((artifact, _), size) in units.into_iter().zip(compressed) {
            match artifact {
                Artifact::Single(name) => sizes.insert_single(name, size),
                Artifact::Pair(pair) => sizes.insert_pair(pair, size),
            }
        }

        self.enter(lifecycle, JobState::Computing, log);
        let matrix = pool.install(|| calculate_distance_matrix(&sizes, input.scale))?;
        let matrix_path = job_dir.join(format!("{}.csv", log.job_id()));
        write_matrix_csv(&matrix_path, &matrix)?;

        self.enter(lifecycle, JobState::Storing, log);
        let matrix_node = self.store_matrix(&matrix_path, log)?;

        Ok(JobReport {
            job_id: log.job_id().to_string(),
            matrix,
            matrix_node,
            dropped,
        })
    }

    /// Move to `state` and report it; a tracker failure is only logged
    fn enter(&self, lifecycle: &mut Lifecycle, state: JobState, log: &JobLog) {
        let step = match lifecycle.advance(state) {
            Ok(step) => step,
            Err(e) => {
                log.warn(e);
                return;
            }
        };
        log.info(format!("Step {}/{}: {}", step, TOTAL_STEPS, state.label()));
        if let Err(e) = self.tracker.update_progress(
            log.job_id(),
            state.label(),
            step,
            &timestamp(EST_COMPLETE_SECONDS),
        ) {
            log.warn(format!("Failed to report progress: {}", e));
        }
    }

    fn resolve_samples(&self, input: &JobInput) -> Result<Vec<Sample>> {
        let mut samples = Vec::with_capacity(input.file_count());
        for node in &input.node_refs {
            let file_name = self.store.file_name(node)?;
            samples.push(Sample::remote(node.clone(), &file_name, input.format));
        }
        for path in &input.file_paths {
            samples.push(Sample::local(path, input.format)?);
        }
        Ok(samples)
    }

    /// Extract every sample, waiting for all of them before judging the stage
    fn extract_all(
        &self,
        pool: &ThreadPool,
        samples: &[Sample],
        params: &ExtractParams,
        job_dir: &Path,
        log: &JobLog,
    ) -> Result<(Vec<SortedFile>, Vec<String>)> {
        let bar = self.progress_bar(samples.len(), "extracting");
        let results: Vec<(String, Result<Option<SortedFile>>)> = pool.install(|| {
            samples
                .par_iter()
                .map(|sample| {
                    let result = self.extract_one(sample, params, job_dir);
                    bar.inc(1);
                    (sample.name.clone(), result)
                })
                .collect()
        });
        bar.finish_and_clear();

        let mut extracted = Vec::with_capacity(results.len());
        let mut dropped = Vec::new();
        for (name, result) in results {
            match result? {
                Some(file) => extracted.push(file),
                None => dropped.push(name),
            }
        }
        if !dropped.is_empty() {
            log.info(format!(
                "Dropped {} samples below {} reads: {}",
                dropped.len(),
                params.min_reads,
                dropped.join(", ")
            ));
        }
        Ok((extracted, dropped))
    }

    fn extract_one(&self, sample: &Sample, params: &ExtractParams, job_dir: &Path) -> Result<Option<SortedFile>> {
        let source = match &sample.source {
            SampleSource::Local(path) => path.clone(),
            SampleSource::Remote { node, .. } => {
                let dest = job_dir.join(format!("{}.input", sample.name));
                self.store
                    .download(node, &dest)
                    .map_err(|e| CbdError::ExtractionFailed {
                        path: dest.clone(),
                        reason: e.to_string(),
                    })?;
                dest
            }
        };

        let dest = job_dir.join(format!("{}.sequence", sample.name));
        match extract_sequences(&source, sample.format, &dest, params)? {
            ExtractOutcome::Dropped { .. } => Ok(None),
            ExtractOutcome::Written { path, .. } => {
                let size = fs::metadata(&path)
                    .map_err(|e| CbdError::io(format!("Failed to read '{}'", path.display()), e))?
                    .len();
                if size == 0 {
                    return Err(CbdError::EmptySample { path: source });
                }
                Ok(Some(SortedFile {
                    name: sample.name.clone(),
                    path,
                }))
            }
        }
    }

    /// Run one unit per item on the pool; the first failure stops the stage
    fn run_stage<T, R, F>(&self, pool: &ThreadPool, label: &str, units: &[T], work: F) -> Result<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> Result<R> + Sync + Send,
    {
        let bar = self.progress_bar(units.len(), label);
        let results = pool.install(|| {
            units
                .par_iter()
                .map(|unit| {
                    let result = work(unit);
                    bar.inc(1);
                    result
                })
                .collect::<Result<Vec<R>>>()
        });
        bar.finish_and_clear();
        results
    }

    fn progress_bar(&self, len: usize, label: &str) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        ) {
            pb.set_style(style);
        }
        pb.set_message(label.to_string());
        pb
    }

    /// Upload the matrix; on failure keep it under the work folder for recovery
    fn store_matrix(&self, matrix_path: &Path, log: &JobLog) -> Result<NodeRef> {
        let reason = match self.store.upload(matrix_path) {
            Ok(node) if node.is_valid() => return Ok(node),
            Ok(node) => format!("object store returned an invalid reference '{}'", node),
            Err(e) => e.to_string(),
        };

        let fallback = self.config.work_folder.join(format!("{}.csv", log.job_id()));
        let moved = fs::rename(matrix_path, &fallback)
            .or_else(|_| fs::copy(matrix_path, &fallback).map(|_| ()));
        let recovered = match moved {
            Ok(()) => {
                log.error(format!("Distance matrix kept at '{}'", fallback.display()));
                Some(fallback)
            }
            Err(e) => {
                log.error(format!("Failed to keep distance matrix at '{}': {}", fallback.display(), e));
                None
            }
        };
        Err(CbdError::StorageFailed { reason, recovered })
    }

    fn cleanup(&self, input: &JobInput, job_dir: &Path, log: &JobLog) {
        for node in &input.node_refs {
            if let Err(e) = self.store.delete(node) {
                log.warn(format!("Failed to delete input node {}: {}", node, e));
            }
        }
        if job_dir.exists() {
            if let Err(e) = fs::remove_dir_all(job_dir) {
                log.warn(format!("Failed to remove job folder '{}': {}", job_dir.display(), e));
            }
        }
    }
}
