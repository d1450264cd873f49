// lib.rs - cbdist library root

//! # cbdist - Compression based distances between sequencing samples
//!
//! This library builds a distance matrix between microbial community samples
//! from how well their sequence reads compress together. Every sample's reads
//! are extracted, sorted and compressed; every pair of samples is merged and
//! compressed as well, and the compressed sizes give the distance
//! `1 - 2 * (c1 + c2 - c12) / (c1 + c2)`.
//!
//! ## Features
//!
//! - **Staged jobs**: extraction, sorting, merging and compression run on a
//!   private worker pool, one stage at a time
//! - **External tools**: `sort` and `xz` do the heavy lifting, invoked with
//!   explicit argument vectors
//! - **Two scales**: `std` (0 to 1) and `inf` (0 to infinity)
//! - **Pluggable collaborators**: object store and job tracker are traits, with
//!   local directory-backed implementations
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cbdist::prelude::*;
//!
//! let store = Arc::new(LocalObjectStore::new("/data/cbdist/store")?);
//! let tracker = Arc::new(LocalJobTracker::new("/data/cbdist/jobs")?);
//!
//! let mut input = JobInput::new(SequenceFormat::Fastq);
//! input.file_paths = vec!["day0.fastq".into(), "day7.fastq".into(), "day14.fastq".into()];
//! input.extract.min_reads = 1000;
//!
//! let job = submit_job(WorkerConfig::new("/scratch/cbdist", 8), input, store, tracker)?;
//! let report = job.wait()?;
//! println!("{} samples", report.matrix.len());
//! # Ok::<(), CbdError>(())
//! ```

pub mod cli;
pub mod core;
pub mod data;
pub mod error;
pub mod job;
pub mod output;

// Convenience prelude for common imports
pub mod prelude {
    pub use crate::core::{calculate_distance_matrix, calculate_from_files, cbd_distance};
    pub use crate::core::{CompressedSizes, DistanceMatrix, PairKey, Scale, Toolchain};
    pub use crate::data::{ExtractParams, NodeRef, SequenceFormat};
    pub use crate::error::{CbdError, Result};
    pub use crate::job::{submit_job, JobInput, JobLog, JobReport, Worker, WorkerConfig};
    pub use crate::job::{JobTracker, LocalJobTracker, LocalObjectStore, ObjectStore};
    pub use crate::output::{read_matrix_csv, write_matrix_csv};
}

// Re-export main types at the root level for convenience
pub use core::{DistanceMatrix, PairKey, Scale};
pub use error::{CbdError, Result};
pub use job::{JobInput, Worker, WorkerConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn get_info() -> String {
    format!(
        "cbdist v{} - Compression based distance matrices for sequencing samples",
        VERSION
    )
}
