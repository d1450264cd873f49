// validation.rs - Input validation utilities

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::cli::args::{Args, BuildArgs};
use crate::core::{Scale, ToolCommand, Toolchain};
use crate::data::extract::ExtractParams;
use crate::data::sample::{parse_input_file, SequenceFormat};
use crate::job::{JobInput, WorkerConfig};

/// Validated service settings
pub struct ServiceSettings {
    pub worker: WorkerConfig,
    pub object_store_path: PathBuf,
    pub job_store_path: PathBuf,
}

/// Validate service-level arguments; creates the work folder and resolves tools
pub fn validate_service(args: &Args) -> Result<ServiceSettings, String> {
    let work_folder = args
        .work_folder
        .as_ref()
        .ok_or("--work-folder is required (or work_folder_path in the config file)")?;
    let work_folder = PathBuf::from(work_folder);
    std::fs::create_dir_all(&work_folder).map_err(|e| {
        format!("Failed to create work folder '{}': {}", work_folder.display(), e)
    })?;

    let pool_size = args.threads.unwrap_or_else(rayon::current_num_threads);
    if pool_size == 0 {
        return Err("Number of threads must be at least 1".to_string());
    }

    let toolchain = Toolchain {
        sort: ToolCommand::new(args.sort_program.as_deref().unwrap_or("sort")),
        compress: ToolCommand::new(args.compress_program.as_deref().unwrap_or("xz")),
        ..Default::default()
    };
    for tool in [&toolchain.sort, &toolchain.compress] {
        let resolved = tool.resolve()?;
        log::debug!("Using '{}' for '{}'", resolved.display(), tool.program);
    }

    let object_store_path = args
        .object_store
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| work_folder.join("store"));
    let job_store_path = job_store_path(args)?;

    Ok(ServiceSettings {
        worker: WorkerConfig {
            work_folder,
            pool_size,
            toolchain,
            show_progress: !args.no_progress,
        },
        object_store_path,
        job_store_path,
    })
}

/// Job store location, defaulting to `<work folder>/jobs`
pub fn job_store_path(args: &Args) -> Result<PathBuf, String> {
    match (&args.job_store, &args.work_folder) {
        (Some(path), _) => Ok(PathBuf::from(path)),
        (None, Some(work_folder)) => Ok(Path::new(work_folder).join("jobs")),
        (None, None) => Err("--job-store or --work-folder is required".to_string()),
    }
}

/// Validate `build` arguments and turn the list file into a job input
pub fn validate_build(build: &BuildArgs) -> Result<JobInput, String> {
    let list = parse_input_file(Path::new(&build.input)).map_err(|e| e.to_string())?;
    if !list.missing.is_empty() {
        return Err(format!(
            "{} input sequence files do not exist (first: '{}')",
            list.missing.len(),
            list.missing[0].display()
        ));
    }
    if list.files.is_empty() {
        return Err(format!("No input sequence files listed in '{}'", build.input));
    }

    let format = match &build.format {
        Some(f) => SequenceFormat::from_str(f)?,
        None => list.infer_format()?,
    };
    let scale = Scale::from_str(&build.scale)?;

    Ok(JobInput {
        node_refs: Vec::new(),
        file_paths: list.files,
        format,
        scale,
        extract: ExtractParams {
            trim_length: build.trim,
            min_reads: build.min_reads,
            max_reads: build.max_reads,
        },
        extreme: build.extreme,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use argh::FromArgs;

    fn args(cli: &[&str]) -> Args {
        Args::from_args(&["cbdist"], cli).unwrap()
    }

    fn build_args(list: &Path, extra: &[&str]) -> BuildArgs {
        let mut cli = vec!["build", list.to_str().unwrap()];
        cli.extend_from_slice(extra);
        match args(&cli).command {
            Some(crate::cli::args::Command::Build(b)) => b,
            _ => panic!("expected build subcommand"),
        }
    }

    #[test]
    fn test_validate_build_infers_format() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.fq");
        let b = dir.path().join("b.fq");
        std::fs::write(&a, "@r\nACGT\n+\nIIII\n").unwrap();
        std::fs::write(&b, "@r\nACGT\n+\nIIII\n").unwrap();
        let list = dir.path().join("inputs.txt");
        std::fs::write(&list, format!("{}\n{}\n", a.display(), b.display())).unwrap();

        let input = validate_build(&build_args(&list, &["--scale", "inf", "--min-reads", "10", "--extreme"])).unwrap();
        assert_eq!(input.format, SequenceFormat::Fastq);
        assert_eq!(input.scale, Scale::Inf);
        assert_eq!(input.extract.min_reads, 10);
        assert!(input.extreme);
        assert_eq!(input.file_paths, vec![a, b]);
    }

    #[test]
    fn test_validate_build_rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.fasta");
        std::fs::write(&a, ">r\nACGT\n").unwrap();
        let list = dir.path().join("inputs.txt");
        std::fs::write(&list, format!("{}\n", a.display())).unwrap();

        assert!(validate_build(&build_args(&list, &["--scale", "log"])).is_err());
        assert!(validate_build(&build_args(&list, &["--format", "genbank"])).is_err());

        std::fs::write(&list, format!("{}\n{}\n", a.display(), dir.path().join("gone.fasta").display())).unwrap();
        let err = validate_build(&build_args(&list, &[])).unwrap_err();
        assert!(err.contains("do not exist"));
    }

    #[test]
    fn test_validate_service_defaults() {
        if which::which("xz").is_err() {
            eprintln!("xz not installed, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("work");
        let settings = validate_service(&args(&["--work-folder", work.to_str().unwrap(), "--threads", "3", "status", "x"])).unwrap();
        assert!(work.is_dir());
        assert_eq!(settings.worker.pool_size, 3);
        assert_eq!(settings.object_store_path, work.join("store"));
        assert_eq!(settings.job_store_path, work.join("jobs"));
        assert_eq!(settings.worker.toolchain.compress.program, "xz");
    }

    #[test]
    fn test_validate_service_missing_tool() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("work");
        let err = validate_service(&args(&[
            "--work-folder",
            work.to_str().unwrap(),
            "--sort-program",
            "/nonexistent/cbdist-sort",
            "status",
            "x",
        ]))
        .err()
        .unwrap();
        assert!(err.contains("/nonexistent/cbdist-sort"));
    }

    #[test]
    fn test_validate_service_requires_work_folder() {
        assert!(validate_service(&args(&["status", "x"])).is_err());
        assert!(job_store_path(&args(&["status", "x"])).is_err());
        assert_eq!(
            job_store_path(&args(&["--job-store", "/jobs", "status", "x"])).unwrap(),
            PathBuf::from("/jobs")
        );
    }
}
