// state.rs - Job lifecycle state machine

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of progress steps reported for one job
pub const TOTAL_STEPS: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Initializing,
    Extracting,
    Sorting,
    Merging,
    Compressing,
    Computing,
    Storing,
    Done,
    Failed,
}

impl JobState {
    const ORDER: [JobState; 8] = [
        JobState::Initializing,
        JobState::Extracting,
        JobState::Sorting,
        JobState::Merging,
        JobState::Compressing,
        JobState::Computing,
        JobState::Storing,
        JobState::Done,
    ];

    /// Stage label reported to the job tracker
    pub fn label(&self) -> &'static str {
        match self {
            JobState::Initializing => "initializing",
            JobState::Extracting => "extracting sequence files",
            JobState::Sorting => "sorting sequence files",
            JobState::Merging => "merging all pairs of sequence files",
            JobState::Compressing => "compressing sequence files",
            JobState::Computing => "calculating distance matrix",
            JobState::Storing => "storing output file",
            JobState::Done => "done",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    /// The only non-failure successor of this state
    pub fn next(&self) -> Option<JobState> {
        let pos = Self::ORDER.iter().position(|s| s == self)?;
        Self::ORDER.get(pos + 1).copied()
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Initializing => "initializing",
            JobState::Extracting => "extracting",
            JobState::Sorting => "sorting",
            JobState::Merging => "merging",
            JobState::Compressing => "compressing",
            JobState::Computing => "computing",
            JobState::Storing => "storing",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Current state plus the monotonically increasing step counter
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: JobState,
    step: u32,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: JobState::Initializing,
            step: 0,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    /// Move to `to`; only the linear successor or `Failed` is allowed
    pub fn advance(&mut self, to: JobState) -> Result<u32, String> {
        if self.state.is_terminal() {
            return Err(format!("Job is already {}, cannot move to {}", self.state, to));
        }
        if to != JobState::Failed && self.state.next() != Some(to) {
            return Err(format!("Invalid job transition {} -> {}", self.state, to));
        }
        self.state = to;
        if !to.is_terminal() {
            self.step += 1;
        }
        Ok(self.step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_progression() {
        let mut lc = Lifecycle::new();
        let mut steps = Vec::new();
        for state in [
            JobState::Extracting,
            JobState::Sorting,
            JobState::Merging,
            JobState::Compressing,
            JobState::Computing,
            JobState::Storing,
        ] {
            steps.push(lc.advance(state).unwrap());
        }
        assert_eq!(steps, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(lc.step(), TOTAL_STEPS);
        lc.advance(JobState::Done).unwrap();
        assert!(lc.state().is_terminal());
        assert!(lc.advance(JobState::Failed).is_err());
    }

    #[test]
    fn test_no_skipping_stages() {
        let mut lc = Lifecycle::new();
        lc.advance(JobState::Extracting).unwrap();
        assert!(lc.advance(JobState::Merging).is_err());
        assert_eq!(lc.state(), JobState::Extracting);
    }

    #[test]
    fn test_fail_from_any_working_state() {
        let mut lc = Lifecycle::new();
        lc.advance(JobState::Failed).unwrap();
        assert_eq!(lc.state(), JobState::Failed);

        let mut lc = Lifecycle::new();
        lc.advance(JobState::Extracting).unwrap();
        lc.advance(JobState::Sorting).unwrap();
        lc.advance(JobState::Failed).unwrap();
        assert_eq!(lc.step(), 2);
    }

    #[test]
    fn test_labels() {
        assert_eq!(JobState::Merging.label(), "merging all pairs of sequence files");
        assert_eq!(JobState::Computing.to_string(), "computing");
    }
}
