// mod.rs - Job orchestration module

pub mod services;
pub mod state;
pub mod submit;
pub mod worker;

use std::fmt::Display;

pub use services::{
    timestamp, JobRecord, JobResults, JobTracker, LocalJobTracker, LocalObjectStore, ObjectStore,
};
pub use state::{JobState, Lifecycle, TOTAL_STEPS};
pub use submit::{run_job_file, submit_job, JobData, SubmittedJob, JOB_DATA_FILE};
pub use worker::{JobInput, JobReport, Worker, WorkerConfig};

/// Logging handle scoped to one job; every line carries the service and job id
#[derive(Debug, Clone)]
pub struct JobLog {
    service: String,
    job_id: String,
}

impl JobLog {
    pub fn new(service: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            job_id: job_id.into(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn debug(&self, msg: impl Display) {
        log::debug!(target: "cbdist::job", "[{}] {}: {}", self.service, self.job_id, msg);
    }

    pub fn info(&self, msg: impl Display) {
        log::info!(target: "cbdist::job", "[{}] {}: {}", self.service, self.job_id, msg);
    }

    pub fn warn(&self, msg: impl Display) {
        log::warn!(target: "cbdist::job", "[{}] {}: {}", self.service, self.job_id, msg);
    }

    pub fn error(&self, msg: impl Display) {
        log::error!(target: "cbdist::job", "[{}] {}: {}", self.service, self.job_id, msg);
    }
}
