// submit.rs - Job submission and job data files

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};

use crate::error::{CbdError, Result};
use crate::job::services::{JobResults, JobTracker, ObjectStore};
use crate::job::state::TOTAL_STEPS;
use crate::job::worker::{JobInput, JobReport, Worker, WorkerConfig};
use crate::job::JobLog;

/// File written into each job folder before the worker starts
pub const JOB_DATA_FILE: &str = "jobdata.json";

const SERVICE_NAME: &str = "cbd";

/// Everything needed to run a job, as persisted in `jobdata.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobData {
    pub id: String,
    pub input: JobInput,
    pub config: WorkerConfig,
}

impl JobData {
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| CbdError::Config(format!("Failed to serialize job data: {}", e)))?;
        fs::write(path, content)
            .map_err(|e| CbdError::io(format!("Failed to write job data '{}'", path.display()), e))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CbdError::io(format!("Failed to read job data '{}'", path.display()), e))?;
        serde_json::from_str(&content)
            .map_err(|e| CbdError::Config(format!("Failed to parse job data '{}': {}", path.display(), e)))
    }
}

/// A job running on its own thread
#[derive(Debug)]
pub struct SubmittedJob {
    pub id: String,
    handle: JoinHandle<Result<JobReport>>,
}

impl SubmittedJob {
    /// Block until the job reaches `done` or `failed`
    pub fn wait(self) -> Result<JobReport> {
        let id = self.id;
        self.handle
            .join()
            .map_err(|_| CbdError::Worker(format!("Worker thread for job {} panicked", id)))?
    }
}

/// Register a job, persist its job data and start it in the background.
/// Returns as soon as the job id is known.
pub fn submit_job(
    config: WorkerConfig,
    input: JobInput,
    store: Arc<dyn ObjectStore>,
    tracker: Arc<dyn JobTracker>,
) -> Result<SubmittedJob> {
    let description = format!("cbd-buildmatrix with {} files", input.file_count());
    let id = tracker.create_job(&description, TOTAL_STEPS)?;
    let log = JobLog::new(SERVICE_NAME, &id);

    let data = JobData {
        id: id.clone(),
        input,
        config,
    };
    let job_dir = data.config.work_folder.join(&id);
    if let Err(e) = write_job_data(&data, &job_dir) {
        abort_submission(&data.input, &job_dir, store.as_ref(), tracker.as_ref(), &log, &e);
        return Err(e);
    }

    let JobData { input, config, .. } = data;
    // Kept for the spawn failure path; the thread owns the originals
    let fallback_input = input.clone();
    let fallback_log = log.clone();
    let worker = Worker::new(config, store.clone(), tracker.clone());
    let spawned = thread::Builder::new()
        .name(format!("cbd-{}", id))
        .spawn(move || worker.run(&input, &log));

    match spawned {
        Ok(handle) => Ok(SubmittedJob { id, handle }),
        Err(e) => {
            let e = CbdError::io("Failed to start worker thread", e);
            abort_submission(&fallback_input, &job_dir, store.as_ref(), tracker.as_ref(), &fallback_log, &e);
            Err(e)
        }
    }
}

fn write_job_data(data: &JobData, job_dir: &Path) -> Result<()> {
    fs::create_dir_all(job_dir).map_err(|e| {
        CbdError::io(format!("Failed to create job folder '{}'", job_dir.display()), e)
    })?;
    data.save(&job_dir.join(JOB_DATA_FILE))
}

/// Terminal handling for a job that never reached its worker: the same
/// cleanup a worker performs, then the single completion
fn abort_submission(
    input: &JobInput,
    job_dir: &Path,
    store: &dyn ObjectStore,
    tracker: &dyn JobTracker,
    log: &JobLog,
    error: &CbdError,
) {
    log.error(format!("Failed to start job: {}", error));
    for node in &input.node_refs {
        if let Err(e) = store.delete(node) {
            log.warn(format!("Failed to delete input node {}: {}", node, e));
        }
    }
    if job_dir.exists() {
        if let Err(e) = fs::remove_dir_all(job_dir) {
            log.warn(format!("Failed to remove job folder '{}': {}", job_dir.display(), e));
        }
    }
    let detail = error.completion_detail();
    if let Err(e) = tracker.complete_job(log.job_id(), "failed", Some(&detail), &JobResults::default()) {
        log.error(format!("Failed to complete job with the tracker: {}", e));
    }
}

/// Run a job described by a `jobdata.json` file in the current thread
pub fn run_job_file(
    path: &Path,
    store: Arc<dyn ObjectStore>,
    tracker: Arc<dyn JobTracker>,
) -> Result<JobReport> {
    let data = JobData::load(path)?;
    let log = JobLog::new(SERVICE_NAME, &data.id);
    Worker::new(data.config, store, tracker).run(&data.input, &log)
}
