// args.rs - Command line arguments definition

use argh::FromArgs;

#[derive(FromArgs)]
/// cbdist - Compression based distance matrices for sequencing samples
pub struct Args {
    /// path to TOML configuration file
    #[argh(option)]
    pub config: Option<String>,

    /// generate sample configuration file and exit
    #[argh(switch)]
    pub generate_config: bool,

    /// folder holding per-job working directories
    #[argh(option)]
    pub work_folder: Option<String>,

    /// number of worker threads per job (default: auto-detect)
    #[argh(option)]
    pub threads: Option<usize>,

    /// sort executable used for sorting and merging (default: sort)
    #[argh(option)]
    pub sort_program: Option<String>,

    /// compress executable (default: xz)
    #[argh(option)]
    pub compress_program: Option<String>,

    /// folder of the local object store (default: <work-folder>/store)
    #[argh(option)]
    pub object_store: Option<String>,

    /// folder of the local job records (default: <work-folder>/jobs)
    #[argh(option)]
    pub job_store: Option<String>,

    /// hide progress bars
    #[argh(switch)]
    pub no_progress: bool,

    #[argh(subcommand)]
    pub command: Option<Command>,
}

#[derive(FromArgs)]
#[argh(subcommand)]
pub enum Command {
    Build(BuildArgs),
    RunJob(RunJobArgs),
    Calculate(CalculateArgs),
    Filter(FilterArgs),
    Status(StatusArgs),
}

#[derive(FromArgs)]
/// Build a distance matrix from a list of sequence files
#[argh(subcommand, name = "build")]
pub struct BuildArgs {
    /// file listing one input sequence file per line
    #[argh(positional)]
    pub input: String,

    /// copy the distance matrix to this file
    #[argh(option)]
    pub output: Option<String>,

    /// format of the input files: fasta, fastq (default: from file extensions)
    #[argh(option)]
    pub format: Option<String>,

    /// scale of distance values: std (0 to 1), inf (0 to infinity) (default: std)
    #[argh(option, default = "String::from(\"std\")")]
    pub scale: String,

    /// trim reads to this length, dropping shorter reads (default: 0 = no trimming)
    #[argh(option, default = "0")]
    pub trim: usize,

    /// drop samples with fewer reads (default: 0 = keep all)
    #[argh(option, default = "0")]
    pub min_reads: usize,

    /// use at most this many reads per sample (default: 0 = all)
    #[argh(option, default = "0")]
    pub max_reads: usize,

    /// use the slower extreme compression preset
    #[argh(switch)]
    pub extreme: bool,
}

#[derive(FromArgs)]
/// Run a job from its job data file
#[argh(subcommand, name = "runjob")]
pub struct RunJobArgs {
    /// path to jobdata.json
    #[argh(positional)]
    pub job_data: String,
}

#[derive(FromArgs)]
/// Calculate a distance matrix from already compressed sorted files
#[argh(subcommand, name = "calculate")]
pub struct CalculateArgs {
    /// file listing one compressed file per line
    #[argh(positional)]
    pub input: String,

    /// output distance matrix file
    #[argh(option)]
    pub output: String,

    /// scale of distance values: std, inf (default: std)
    #[argh(option, default = "String::from(\"std\")")]
    pub scale: String,
}

#[derive(FromArgs)]
/// Select samples of a distance matrix by group
#[argh(subcommand, name = "filter")]
pub struct FilterArgs {
    /// distance matrix file to filter
    #[argh(positional)]
    pub matrix: String,

    /// group file with lines of path<TAB>group1;group2
    #[argh(option)]
    pub groups: String,

    /// filter: within, without, between (default: within)
    #[argh(option, default = "String::from(\"within\")")]
    pub filter: String,

    /// groups to select, separated by ';' or given repeatedly
    #[argh(option)]
    pub group: Vec<String>,

    /// output distance matrix file
    #[argh(option)]
    pub output: String,
}

#[derive(FromArgs)]
/// Show the status of a job
#[argh(subcommand, name = "status")]
pub struct StatusArgs {
    /// job identifier
    #[argh(positional)]
    pub job_id: String,
}
