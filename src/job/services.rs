// services.rs - Object store and job tracker collaborators

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data::NodeRef;
use crate::error::{CbdError, Result};

/// Storage for input sequence files and result artifacts
pub trait ObjectStore: Send + Sync {
    /// Original file name of a stored node
    fn file_name(&self, node: &NodeRef) -> Result<String>;
    fn download(&self, node: &NodeRef, dest: &Path) -> Result<()>;
    /// A returned reference may be blank; callers must check `is_valid`
    fn upload(&self, path: &Path) -> Result<NodeRef>;
    fn delete(&self, node: &NodeRef) -> Result<()>;
    /// Location reported with job results
    fn url(&self) -> String;
}

/// References to the artifacts a finished job produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResults {
    pub nodes: Vec<NodeRef>,
    pub store_url: String,
}

/// Progress and completion reporting for jobs
pub trait JobTracker: Send + Sync {
    fn create_job(&self, description: &str, total_steps: u32) -> Result<String>;
    fn update_progress(&self, job_id: &str, stage: &str, steps_completed: u32, est_complete: &str) -> Result<()>;
    /// Called exactly once per job
    fn complete_job(&self, job_id: &str, status: &str, error: Option<&str>, results: &JobResults) -> Result<()>;
}

/// UTC timestamp `delta_seconds` from now, in the tracker's format
pub fn timestamp(delta_seconds: i64) -> String {
    (chrono::Utc::now() + chrono::Duration::seconds(delta_seconds))
        .format("%Y-%m-%dT%H:%M:%S+0000")
        .to_string()
}

fn unique_id(prefix: &str) -> String {
    format!("{}{}", prefix, Uuid::new_v4())
}

/// Directory-backed object store; each node is `<root>/<id>/<file name>`
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            CbdError::io(format!("Failed to create object store '{}'", root.display()), e)
        })?;
        Ok(Self { root })
    }

    fn node_dir(&self, node: &NodeRef) -> Result<PathBuf> {
        let id = node.as_str();
        if !node.is_valid() || id.contains('/') || id.contains('\\') || id == "." || id == ".." {
            return Err(CbdError::ObjectStore(format!("Invalid node id '{}'", id)));
        }
        Ok(self.root.join(id))
    }

    fn node_file(&self, node: &NodeRef) -> Result<PathBuf> {
        let dir = self.node_dir(node)?;
        let mut entries = fs::read_dir(&dir)
            .map_err(|e| CbdError::ObjectStore(format!("Node {} not found: {}", node, e)))?;
        entries
            .next()
            .and_then(|entry| entry.ok())
            .map(|entry| entry.path())
            .ok_or_else(|| CbdError::ObjectStore(format!("Node {} has no file", node)))
    }
}

impl ObjectStore for LocalObjectStore {
    fn file_name(&self, node: &NodeRef) -> Result<String> {
        let path = self.node_file(node)?;
        Ok(path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default())
    }

    fn download(&self, node: &NodeRef, dest: &Path) -> Result<()> {
        let path = self.node_file(node)?;
        fs::copy(&path, dest).map_err(|e| {
            CbdError::ObjectStore(format!("Failed to download node {} to '{}': {}", node, dest.display(), e))
        })?;
        Ok(())
    }

    fn upload(&self, path: &Path) -> Result<NodeRef> {
        let file_name = path
            .file_name()
            .ok_or_else(|| CbdError::ObjectStore(format!("'{}' is not a file", path.display())))?;
        let node = NodeRef::new(unique_id(""));
        let dir = self.node_dir(&node)?;
        fs::create_dir_all(&dir)
            .and_then(|_| fs::copy(path, dir.join(file_name)))
            .map_err(|e| CbdError::ObjectStore(format!("Failed to upload '{}': {}", path.display(), e)))?;
        log::debug!("Stored '{}' as node {}", path.display(), node);
        Ok(node)
    }

    fn delete(&self, node: &NodeRef) -> Result<()> {
        let dir = self.node_dir(node)?;
        fs::remove_dir_all(&dir)
            .map_err(|e| CbdError::ObjectStore(format!("Failed to delete node {}: {}", node, e)))
    }

    fn url(&self) -> String {
        format!("file://{}", self.root.display())
    }
}

/// Tracker record for one job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub description: String,
    pub stage: String,
    pub status: String,
    pub started: String,
    pub last_update: String,
    pub total_progress: u32,
    pub max_progress: u32,
    pub est_complete: String,
    pub complete: bool,
    pub error: Option<String>,
    pub results: Option<JobResults>,
}

/// Job tracker keeping one JSON record per job under a directory
#[derive(Debug)]
pub struct LocalJobTracker {
    root: PathBuf,
    lock: Mutex<()>,
}

impl LocalJobTracker {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            CbdError::io(format!("Failed to create job store '{}'", root.display()), e)
        })?;
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    fn record_path(&self, job_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", job_id))
    }

    pub fn read_job(&self, job_id: &str) -> Result<JobRecord> {
        let path = self.record_path(job_id);
        let content = fs::read_to_string(&path)
            .map_err(|e| CbdError::Tracker(format!("Job {} not found: {}", job_id, e)))?;
        serde_json::from_str(&content)
            .map_err(|e| CbdError::Tracker(format!("Failed to parse job record '{}': {}", path.display(), e)))
    }

    fn write_job(&self, record: &JobRecord) -> Result<()> {
        let content = serde_json::to_string_pretty(record)
            .map_err(|e| CbdError::Tracker(format!("Failed to serialize job {}: {}", record.id, e)))?;
        fs::write(self.record_path(&record.id), content)
            .map_err(|e| CbdError::Tracker(format!("Failed to save job {}: {}", record.id, e)))
    }

    /// Write a new record; an existing record with the same id is an error
    fn create_record(&self, record: &JobRecord) -> Result<()> {
        let content = serde_json::to_string_pretty(record)
            .map_err(|e| CbdError::Tracker(format!("Failed to serialize job {}: {}", record.id, e)))?;
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.record_path(&record.id))
            .and_then(|mut file| file.write_all(content.as_bytes()))
            .map_err(|e| CbdError::Tracker(format!("Failed to create job {}: {}", record.id, e)))
    }

    fn update<F>(&self, job_id: &str, change: F) -> Result<()>
    where
        F: FnOnce(&mut JobRecord) -> Result<()>,
    {
        let _guard = self.lock.lock().map_err(|_| CbdError::Tracker("tracker lock poisoned".to_string()))?;
        let mut record = self.read_job(job_id)?;
        if record.complete {
            return Err(CbdError::Tracker(format!("Job {} is already complete", job_id)));
        }
        change(&mut record)?;
        record.last_update = timestamp(0);
        self.write_job(&record)
    }
}

impl JobTracker for LocalJobTracker {
    fn create_job(&self, description: &str, total_steps: u32) -> Result<String> {
        let _guard = self.lock.lock().map_err(|_| CbdError::Tracker("tracker lock poisoned".to_string()))?;
        let now = timestamp(0);
        let record = JobRecord {
            id: unique_id("job-"),
            description: description.to_string(),
            stage: "initializing".to_string(),
            status: "initializing".to_string(),
            started: now.clone(),
            last_update: now,
            total_progress: 0,
            max_progress: total_steps,
            est_complete: timestamp(3600),
            complete: false,
            error: None,
            results: None,
        };
        self.create_record(&record)?;
        Ok(record.id)
    }

    fn update_progress(&self, job_id: &str, stage: &str, steps_completed: u32, est_complete: &str) -> Result<()> {
        self.update(job_id, |record| {
            record.stage = stage.to_string();
            record.status = stage.to_string();
            record.total_progress = steps_completed;
            record.est_complete = est_complete.to_string();
            Ok(())
        })
    }

    fn complete_job(&self, job_id: &str, status: &str, error: Option<&str>, results: &JobResults) -> Result<()> {
        self.update(job_id, |record| {
            record.status = status.to_string();
            record.stage = "complete".to_string();
            record.complete = true;
            record.error = error.map(str::to_string);
            record.results = Some(results.clone());
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_format() {
        let ts = timestamp(3600);
        assert_eq!(ts.len(), "2024-01-01T00:00:00+0000".len());
        assert!(ts.ends_with("+0000"));
        assert!(timestamp(3600) > timestamp(0));
    }

    #[test]
    fn test_object_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().join("store")).unwrap();
        let src = dir.path().join("sample1.fasta");
        fs::write(&src, ">r\nACGT\n").unwrap();

        let node = store.upload(&src).unwrap();
        assert!(node.is_valid());
        assert_eq!(store.file_name(&node).unwrap(), "sample1.fasta");

        let dest = dir.path().join("copy.fasta");
        store.download(&node, &dest).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), ">r\nACGT\n");

        store.delete(&node).unwrap();
        assert!(store.file_name(&node).is_err());
        assert!(store.delete(&NodeRef::new("../escape")).is_err());
    }

    #[test]
    fn test_upload_ids_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().join("store")).unwrap();
        let src = dir.path().join("m.csv");
        fs::write(&src, "ID\n").unwrap();
        let a = store.upload(&src).unwrap();
        let b = store.upload(&src).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_job_ids_never_reuse_a_record() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = LocalJobTracker::new(dir.path()).unwrap();
        let a = tracker.create_job("first", 6).unwrap();
        let b = tracker.create_job("second", 6).unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("job-"));
        assert_eq!(tracker.read_job(&a).unwrap().description, "first");

        // a clashing id must not overwrite the existing record
        let mut clash = tracker.read_job(&a).unwrap();
        clash.description = "intruder".to_string();
        assert!(matches!(tracker.create_record(&clash), Err(CbdError::Tracker(_))));
        assert_eq!(tracker.read_job(&a).unwrap().description, "first");
    }

    #[test]
    fn test_tracker_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = LocalJobTracker::new(dir.path()).unwrap();
        let id = tracker.create_job("cbd-buildmatrix with 3 files", 6).unwrap();

        tracker.update_progress(&id, "sorting sequence files", 2, &timestamp(3600)).unwrap();
        let record = tracker.read_job(&id).unwrap();
        assert_eq!(record.stage, "sorting sequence files");
        assert_eq!(record.total_progress, 2);
        assert_eq!(record.max_progress, 6);

        let results = JobResults { nodes: vec![NodeRef::new("n1")], store_url: "file:///s".to_string() };
        tracker.complete_job(&id, "done", None, &results).unwrap();
        let record = tracker.read_job(&id).unwrap();
        assert!(record.complete);
        assert_eq!(record.status, "done");
        assert_eq!(record.results, Some(results.clone()));

        // completion happens once
        assert!(tracker.complete_job(&id, "failed", Some("again"), &results).is_err());
    }
}
