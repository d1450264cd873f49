// main.rs - CLI entry point

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use cbdist::cli::args::{BuildArgs, CalculateArgs, FilterArgs, RunJobArgs, StatusArgs};
use cbdist::cli::{job_store_path, validate_build, validate_service, Args, Command, Config};
use cbdist::data::parse_input_file;
use cbdist::job::run_job_file;
use cbdist::output::{filter_matrix, load_groups, split_group_list, GroupFilter};
use cbdist::prelude::*;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run_main() {
        eprintln!("❌ ERROR: {}", e);
        std::process::exit(1);
    }
}

fn run_main() -> std::result::Result<(), String> {
    let mut args: Args = argh::from_env();

    // Handle generate config first
    if args.generate_config {
        let sample_config = Config::generate_sample();
        println!("{}", sample_config);
        println!("\n💡 Save this content to a .toml file and use --config /path/to/config.toml");
        return Ok(());
    }

    // Load configuration file if specified
    if let Some(config_path) = args.config.clone() {
        args = args.with_config_file(&config_path)?;
    }

    let command = args
        .command
        .take()
        .ok_or("A subcommand is required: build, runjob, calculate, filter, status")?;

    println!("🚀 cbdist v{}", cbdist::VERSION);

    match command {
        Command::Build(build) => run_build(&args, &build),
        Command::RunJob(run) => run_job(&args, &run),
        Command::Calculate(calculate) => run_calculate(&calculate),
        Command::Filter(filter) => run_filter(&filter),
        Command::Status(status) => run_status(&args, &status),
    }
}

fn run_build(args: &Args, build: &BuildArgs) -> std::result::Result<(), String> {
    let settings = validate_service(args)?;
    let input = validate_build(build)?;

    println!("📂 Input files: {} ({})", input.file_count(), input.format);
    println!("📏 Scale: {}", input.scale);
    println!("🧵 Threads: {}", settings.worker.pool_size);
    if input.extract.trim_length > 0 {
        println!("✂️  Trim length: {}", input.extract.trim_length);
    }

    let store = Arc::new(LocalObjectStore::new(&settings.object_store_path).map_err(|e| e.to_string())?);
    let tracker = Arc::new(LocalJobTracker::new(&settings.job_store_path).map_err(|e| e.to_string())?);

    let start = Instant::now();
    let job = submit_job(settings.worker, input, store, tracker).map_err(|e| e.to_string())?;
    println!("🆔 Job: {}", job.id);

    let report = job.wait().map_err(|e| {
        if let CbdError::StorageFailed { recovered: Some(path), .. } = &e {
            eprintln!("💾 Distance matrix kept at: {}", path.display());
        }
        e.to_string()
    })?;

    println!(
        "✅ Distance matrix for {} samples computed in {:.2?}",
        report.matrix.len(),
        start.elapsed()
    );
    if !report.dropped.is_empty() {
        println!("⚠️  Dropped samples: {}", report.dropped.join(", "));
    }
    println!("📦 Stored as node: {}", report.matrix_node);

    if let Some(output) = &build.output {
        write_matrix_csv(Path::new(output), &report.matrix).map_err(|e| e.to_string())?;
        println!("💾 Saved: {}", output);
    }
    Ok(())
}

fn run_job(args: &Args, run: &RunJobArgs) -> std::result::Result<(), String> {
    let settings = validate_service(args)?;
    let store = Arc::new(LocalObjectStore::new(&settings.object_store_path).map_err(|e| e.to_string())?);
    let tracker = Arc::new(LocalJobTracker::new(&settings.job_store_path).map_err(|e| e.to_string())?);

    let report = run_job_file(Path::new(&run.job_data), store, tracker).map_err(|e| e.to_string())?;
    println!(
        "✅ Job {} done: {} samples, stored as node {}",
        report.job_id,
        report.matrix.len(),
        report.matrix_node
    );
    Ok(())
}

fn run_calculate(calculate: &CalculateArgs) -> std::result::Result<(), String> {
    let scale: Scale = calculate.scale.parse()?;
    let list = parse_input_file(Path::new(&calculate.input)).map_err(|e| e.to_string())?;
    if !list.missing.is_empty() {
        return Err(format!("{} compressed files do not exist", list.missing.len()));
    }
    println!("📂 Compressed files: {}", list.files.len());

    let start = Instant::now();
    let matrix = calculate_from_files(&list.files, scale).map_err(|e| e.to_string())?;
    write_matrix_csv(Path::new(&calculate.output), &matrix).map_err(|e| e.to_string())?;
    println!(
        "✅ Distance matrix for {} samples computed in {:.2?}",
        matrix.len(),
        start.elapsed()
    );
    println!("💾 Saved: {}", calculate.output);
    Ok(())
}

fn run_filter(filter: &FilterArgs) -> std::result::Result<(), String> {
    let group_filter: GroupFilter = filter.filter.parse()?;
    let matrix = read_matrix_csv(Path::new(&filter.matrix)).map_err(|e| e.to_string())?;
    let groups = load_groups(Path::new(&filter.groups)).map_err(|e| e.to_string())?;

    let selected = split_group_list(&filter.group);
    let filtered = filter_matrix(&matrix, &groups, group_filter, &selected).map_err(|e| e.to_string())?;
    println!(
        "🔍 Filter '{}' kept {} of {} samples",
        filter.filter,
        filtered.len(),
        matrix.len()
    );
    write_matrix_csv(Path::new(&filter.output), &filtered).map_err(|e| e.to_string())?;
    println!("💾 Saved: {}", filter.output);
    Ok(())
}

fn run_status(args: &Args, status: &StatusArgs) -> std::result::Result<(), String> {
    let tracker = LocalJobTracker::new(job_store_path(args)?).map_err(|e| e.to_string())?;
    let record = tracker.read_job(&status.job_id).map_err(|e| e.to_string())?;

    println!("🆔 Job: {}", record.id);
    println!("📋 Description: {}", record.description);
    println!(
        "⏳ Stage: {} ({}/{})",
        record.stage, record.total_progress, record.max_progress
    );
    println!("📌 Status: {}", record.status);
    println!("🕐 Started: {}", record.started);
    println!("🕐 Last update: {}", record.last_update);
    if !record.complete {
        println!("🕐 Estimated completion: {}", record.est_complete);
    }
    if let Some(error) = &record.error {
        println!("❌ Error: {}", error);
    }
    if let Some(results) = &record.results {
        for node in &results.nodes {
            println!("📦 Result: {}/{}", results.store_url, node);
        }
    }
    Ok(())
}
