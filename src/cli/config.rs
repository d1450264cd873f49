// config.rs - Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    // Service
    pub work_folder_path: Option<String>,
    pub num_pool_processes: Option<usize>,
    pub sort_program: Option<String>,
    pub compress_program: Option<String>,
    pub object_store_path: Option<String>,
    pub job_store_path: Option<String>,

    // Job defaults
    pub format: Option<String>,
    pub scale: Option<String>,
    pub trim: Option<usize>,
    pub min_reads: Option<usize>,
    pub max_reads: Option<usize>,
    pub extreme: Option<bool>,
}

impl Config {
    /// Create a new empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        log::info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(path, content)
            .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))?;

        log::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Generate a sample configuration file with comments
    pub fn generate_sample() -> String {
        r#"# cbdist.toml - Configuration file for cbdist
# Command line arguments will override these settings

# =============================================================================
# SERVICE
# =============================================================================

# Folder holding one working directory per job (created if missing)
work_folder_path = "/scratch/cbdist"

# Number of worker threads per job
num_pool_processes = 8

# Executables used for sorting/merging and for compression
sort_program = "sort"
compress_program = "xz"

# Local object store and job record folders
# (default: <work_folder_path>/store and <work_folder_path>/jobs)
# object_store_path = "/data/cbdist/store"
# job_store_path = "/data/cbdist/jobs"

# =============================================================================
# JOB DEFAULTS
# =============================================================================

# Input format: fasta, fastq (omit to infer from file extensions)
# format = "fastq"

# Scale of distance values: std (0 to 1), inf (0 to infinity)
scale = "std"

# Trim reads to this length, dropping shorter reads (0 = no trimming)
trim = 0

# Drop samples with fewer reads (0 = keep all)
min_reads = 0

# Use at most this many reads per sample (0 = all)
max_reads = 0

# Use the slower extreme compression preset
extreme = false
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_config_parses() {
        let config: Config = toml::from_str(&Config::generate_sample()).unwrap();
        assert_eq!(config.work_folder_path.as_deref(), Some("/scratch/cbdist"));
        assert_eq!(config.num_pool_processes, Some(8));
        assert_eq!(config.compress_program.as_deref(), Some("xz"));
        assert_eq!(config.scale.as_deref(), Some("std"));
        assert_eq!(config.format, None);
        assert_eq!(config.extreme, Some(false));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cbdist.toml");
        let config = Config {
            work_folder_path: Some("/w".to_string()),
            min_reads: Some(1000),
            ..Default::default()
        };
        config.to_file(&path).unwrap();
        assert_eq!(Config::from_file(&path).unwrap(), config);
        assert!(Config::from_file(dir.path().join("missing.toml")).is_err());
    }
}
