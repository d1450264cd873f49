// merge.rs - Merge configuration file with CLI arguments

use crate::cli::args::{BuildArgs, Command};
use crate::cli::{Args, Config};

impl Args {
    /// Merge with configuration from file
    /// CLI arguments take precedence over config file values
    pub fn merge_with_config(mut self, config: Config) -> Self {
        // Service
        if self.work_folder.is_none() {
            self.work_folder = config.work_folder_path.clone();
        }
        if self.threads.is_none() {
            self.threads = config.num_pool_processes;
        }
        if self.sort_program.is_none() {
            self.sort_program = config.sort_program.clone();
        }
        if self.compress_program.is_none() {
            self.compress_program = config.compress_program.clone();
        }
        if self.object_store.is_none() {
            self.object_store = config.object_store_path.clone();
        }
        if self.job_store.is_none() {
            self.job_store = config.job_store_path.clone();
        }

        if let Some(Command::Build(build)) = self.command.as_mut() {
            build.merge_with_config(&config);
        }

        self
    }

    /// Load configuration and merge with CLI args
    pub fn with_config_file(self, config_path: &str) -> Result<Self, String> {
        let config = Config::from_file(config_path)?;
        Ok(self.merge_with_config(config))
    }
}

impl BuildArgs {
    /// Job defaults from the config only replace values left at their CLI default
    fn merge_with_config(&mut self, config: &Config) {
        if self.format.is_none() {
            self.format = config.format.clone();
        }
        if self.scale == "std" {
            if let Some(scale) = &config.scale {
                self.scale = scale.clone();
            }
        }
        if self.trim == 0 {
            self.trim = config.trim.unwrap_or(0);
        }
        if self.min_reads == 0 {
            self.min_reads = config.min_reads.unwrap_or(0);
        }
        if self.max_reads == 0 {
            self.max_reads = config.max_reads.unwrap_or(0);
        }
        if !self.extreme && config.extreme.unwrap_or(false) {
            self.extreme = true;
        }
    }
}
