// error.rs - Error taxonomy for the CBD engine

use std::path::PathBuf;
use thiserror::Error;

use crate::core::command::CommandFailure;

pub type Result<T> = std::result::Result<T, CbdError>;

#[derive(Debug, Error)]
pub enum CbdError {
    #[error("Error extracting sequences from input sequence file '{}': {reason}", .path.display())]
    ExtractionFailed { path: PathBuf, reason: String },

    #[error("Sequence file '{}' has no sequences", .path.display())]
    EmptySample { path: PathBuf },

    #[error("There are not enough sequence files that meet the sequence length or number of sequences criteria ({retained} usable, {required} required)")]
    InsufficientSamples { retained: usize, required: usize },

    #[error("Error sorting sequence file: {0}")]
    SortFailed(CommandFailure),

    #[error("Error merging sequence file: {0}")]
    MergeFailed(CommandFailure),

    #[error("Error compressing sequence file: {0}")]
    CompressFailed(CommandFailure),

    #[error("Distance {distance} is greater than 1.0.  Check sequence read lengths and relative number of sequence reads.  (c1={c1} {name1}, c2={c2} {name2} c12={c12} {pair})")]
    InconsistentSamples {
        distance: f64,
        name1: String,
        c1: u64,
        name2: String,
        c2: u64,
        pair: String,
        c12: u64,
    },

    #[error("Compressed size for '{0}' is missing")]
    MissingArtifact(String),

    #[error("Error saving distance matrix file: {reason}")]
    StorageFailed {
        reason: String,
        recovered: Option<PathBuf>,
    },

    #[error("Duplicate sample name '{0}' (two input files share the same base name)")]
    DuplicateSample(String),

    #[error("Object store error: {0}")]
    ObjectStore(String),

    #[error("Job tracker error: {0}")]
    Tracker(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Worker thread error: {0}")]
    Worker(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl CbdError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        CbdError::Io {
            context: context.into(),
            source,
        }
    }

    /// Short name of the failure class, reported alongside the full detail
    pub fn kind(&self) -> &'static str {
        match self {
            CbdError::ExtractionFailed { .. } => "ExtractionFailed",
            CbdError::EmptySample { .. } => "EmptySample",
            CbdError::InsufficientSamples { .. } => "InsufficientSamplesError",
            CbdError::SortFailed(_) => "SortFailed",
            CbdError::MergeFailed(_) => "MergeFailed",
            CbdError::CompressFailed(_) => "CompressFailed",
            CbdError::InconsistentSamples { .. } => "InconsistentSamplesError",
            CbdError::MissingArtifact(_) => "MissingArtifact",
            CbdError::StorageFailed { .. } => "StorageFailed",
            CbdError::DuplicateSample(_) => "DuplicateSample",
            CbdError::ObjectStore(_) => "ObjectStoreError",
            CbdError::Tracker(_) => "TrackerError",
            CbdError::Config(_) => "ConfigError",
            CbdError::Worker(_) => "WorkerError",
            CbdError::Io { .. } => "IoError",
        }
    }

    /// True when the failure comes from the input data rather than the infrastructure
    pub fn is_data_quality(&self) -> bool {
        matches!(
            self,
            CbdError::ExtractionFailed { .. }
                | CbdError::EmptySample { .. }
                | CbdError::InsufficientSamples { .. }
                | CbdError::InconsistentSamples { .. }
                | CbdError::DuplicateSample(_)
        )
    }

    /// Failure text reported to the job tracker: `<kind>: <message> (cause: ..)`
    pub fn completion_detail(&self) -> String {
        let cause = if self.is_data_quality() { "input data" } else { "infrastructure" };
        format!("{}: {} (cause: {})", self.kind(), self, cause)
    }

    /// Underlying subprocess failure for the command-driven stages
    pub fn command_failure(&self) -> Option<&CommandFailure> {
        match self {
            CbdError::SortFailed(f)
            | CbdError::MergeFailed(f)
            | CbdError::CompressFailed(f) => Some(f),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::command::CommandOutcome;

    fn failure() -> CommandFailure {
        CommandFailure {
            command: "sort --output=a.sorted a.sequence".to_string(),
            message: "'sort' failed with return code 2".to_string(),
            stdout: String::new(),
            stderr: "sort: cannot read: a.sequence".to_string(),
            outcome: CommandOutcome::ExitCode(2),
        }
    }

    #[test]
    fn test_stage_wraps_keep_command_detail() {
        let err = CbdError::SortFailed(failure());
        let text = err.to_string();
        assert!(text.starts_with("Error sorting sequence file:"));
        assert!(text.contains("Command: 'sort --output=a.sorted a.sequence'"));
        assert!(text.contains("Stderr: 'sort: cannot read: a.sequence'"));
        assert_eq!(err.kind(), "SortFailed");
        assert_eq!(err.command_failure().unwrap().return_code(), 2);
        assert!(!err.is_data_quality());
    }

    #[test]
    fn test_inconsistent_samples_names_everything() {
        let err = CbdError::InconsistentSamples {
            distance: 1.25,
            name1: "s1".to_string(),
            c1: 100,
            name2: "s2".to_string(),
            c2: 100,
            pair: "s1-cbdpair-s2".to_string(),
            c12: 225,
        };
        let text = err.to_string();
        for part in ["1.25", "s1", "s2", "100", "225", "s1-cbdpair-s2"] {
            assert!(text.contains(part), "missing {} in {}", part, text);
        }
        assert!(err.is_data_quality());
        assert!(err.completion_detail().starts_with("InconsistentSamplesError: Distance 1.25"));
        assert!(err.completion_detail().ends_with("(cause: input data)"));
    }
}
