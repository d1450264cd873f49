// command.rs - External command runner and sort/compress toolchain

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{CbdError, Result};

/// Return code reported when the executable could not be started at all
pub const SPAWN_FAILED_CODE: i32 = 255;

/// How an external process finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Success,
    ExitCode(i32),
    Signaled(i32),
    SpawnFailed,
}

impl CommandOutcome {
    pub fn from_status(status: ExitStatus) -> Self {
        if status.success() {
            return CommandOutcome::Success;
        }
        if let Some(code) = status.code() {
            return CommandOutcome::ExitCode(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return CommandOutcome::Signaled(signal);
            }
        }
        CommandOutcome::ExitCode(SPAWN_FAILED_CODE)
    }

    /// Numeric return code, negative for signals
    pub fn return_code(&self) -> i32 {
        match self {
            CommandOutcome::Success => 0,
            CommandOutcome::ExitCode(code) => *code,
            CommandOutcome::Signaled(signal) => -signal,
            CommandOutcome::SpawnFailed => SPAWN_FAILED_CODE,
        }
    }
}

/// Structured failure of an external command
#[derive(Debug, Clone, Error)]
#[error("{message}\nCommand: '{command}'\nStdout: '{stdout}'\nStderr: '{stderr}'")]
pub struct CommandFailure {
    pub command: String,
    pub message: String,
    pub stdout: String,
    pub stderr: String,
    pub outcome: CommandOutcome,
}

impl CommandFailure {
    pub fn return_code(&self) -> i32 {
        self.outcome.return_code()
    }
}

/// Captured output of a successful command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run an argument vector as a subprocess. No retry is attempted.
pub fn run_command(argv: &[String]) -> std::result::Result<CommandOutput, CommandFailure> {
    let command_line = argv.join(" ");
    let program = match argv.first() {
        Some(p) => p,
        None => {
            return Err(CommandFailure {
                command: command_line,
                message: "Failed to run an empty command".to_string(),
                stdout: String::new(),
                stderr: String::new(),
                outcome: CommandOutcome::SpawnFailed,
            })
        }
    };

    log::debug!("Running '{}'", command_line);
    let output = match Command::new(program).args(&argv[1..]).output() {
        Ok(o) => o,
        Err(e) => {
            return Err(CommandFailure {
                command: command_line,
                message: format!("Failed to run '{}': {}", program, e),
                stdout: String::new(),
                stderr: String::new(),
                outcome: CommandOutcome::SpawnFailed,
            })
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    match CommandOutcome::from_status(output.status) {
        CommandOutcome::Success => Ok(CommandOutput { stdout, stderr }),
        outcome => {
            let message = match outcome {
                CommandOutcome::Signaled(signal) => {
                    format!("'{}' was terminated by signal {}", program, signal)
                }
                _ => format!("'{}' failed with return code {}", program, outcome.return_code()),
            };
            Err(CommandFailure {
                command: command_line,
                message,
                stdout,
                stderr,
                outcome,
            })
        }
    }
}

/// An executable plus leading arguments placed before the generated ones
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    fn argv<I, S>(&self, rest: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = Vec::with_capacity(self.args.len() + 4);
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv.extend(rest.into_iter().map(Into::into));
        argv
    }

    /// Resolve the program on PATH (or as given if it is a path)
    pub fn resolve(&self) -> std::result::Result<PathBuf, String> {
        which::which(&self.program)
            .map_err(|e| format!("Executable '{}' not found: {}", self.program, e))
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Sort, merge and compress executables used by the pipeline stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toolchain {
    pub sort: ToolCommand,
    pub compress: ToolCommand,
    /// Extension the compressor appends to its output file
    pub compressed_suffix: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            sort: ToolCommand::new("sort"),
            compress: ToolCommand::new("xz"),
            compressed_suffix: ".xz".to_string(),
        }
    }
}

impl Toolchain {
    pub fn sort_argv(&self, source: &Path, dest: &Path) -> Vec<String> {
        self.sort.argv([format!("--output={}", path_arg(dest)), path_arg(source)])
    }

    pub fn merge_argv(&self, first: &Path, second: &Path, dest: &Path) -> Vec<String> {
        self.sort.argv([
            "-m".to_string(),
            format!("--output={}", path_arg(dest)),
            path_arg(first),
            path_arg(second),
        ])
    }

    pub fn compress_argv(&self, source: &Path, extreme: bool) -> Vec<String> {
        let level = if extreme { "-9e" } else { "-9" };
        self.compress.argv([
            "--keep".to_string(),
            level.to_string(),
            "--no-warn".to_string(),
            path_arg(source),
        ])
    }

    /// Path the compressor writes for `source`
    pub fn compressed_path(&self, source: &Path) -> PathBuf {
        let mut name = source.as_os_str().to_os_string();
        name.push(&self.compressed_suffix);
        PathBuf::from(name)
    }

    /// Sort a raw sequence file into `dest`
    pub fn sort(&self, source: &Path, dest: &Path) -> Result<()> {
        run_command(&self.sort_argv(source, dest))
            .map(|_| ())
            .map_err(CbdError::SortFailed)
    }

    /// Merge two already sorted files into `dest` without a full resort
    pub fn merge(&self, first: &Path, second: &Path, dest: &Path) -> Result<()> {
        run_command(&self.merge_argv(first, second, dest))
            .map(|_| ())
            .map_err(CbdError::MergeFailed)
    }

    /// Compress a sorted file, keeping the input, and return the compressed byte size
    pub fn compress(&self, source: &Path, extreme: bool) -> Result<u64> {
        run_command(&self.compress_argv(source, extreme)).map_err(CbdError::CompressFailed)?;
        let compressed = self.compressed_path(source);
        let size = std::fs::metadata(&compressed)
            .map_err(|e| {
                CbdError::io(
                    format!("Failed to read compressed file '{}'", compressed.display()),
                    e,
                )
            })?
            .len();
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_successful_command_captures_output() {
        let out = run_command(&argv(&["sh", "-c", "echo hello; echo warn >&2"])).unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "warn");
    }

    #[test]
    fn test_nonzero_exit_is_failure() {
        let err = run_command(&argv(&["sh", "-c", "echo partial; echo broken >&2; exit 3"]))
            .unwrap_err();
        assert_eq!(err.outcome, CommandOutcome::ExitCode(3));
        assert_eq!(err.return_code(), 3);
        assert_eq!(err.stdout.trim(), "partial");
        assert_eq!(err.stderr.trim(), "broken");
        assert!(err.message.contains("failed with return code 3"));
        assert_eq!(err.command, "sh -c echo partial; echo broken >&2; exit 3");
    }

    #[cfg(unix)]
    #[test]
    fn test_signal_is_tagged_separately() {
        let err = run_command(&argv(&["sh", "-c", "kill -9 $$"])).unwrap_err();
        assert_eq!(err.outcome, CommandOutcome::Signaled(9));
        assert_eq!(err.return_code(), -9);
        assert!(err.message.contains("terminated by signal 9"));
    }

    #[test]
    fn test_missing_executable() {
        let err = run_command(&argv(&["/nonexistent/cbdist-tool", "x"])).unwrap_err();
        assert_eq!(err.outcome, CommandOutcome::SpawnFailed);
        assert_eq!(err.return_code(), SPAWN_FAILED_CODE);
        assert!(err.message.starts_with("Failed to run"));
    }

    #[test]
    fn test_empty_command() {
        let err = run_command(&[]).unwrap_err();
        assert_eq!(err.outcome, CommandOutcome::SpawnFailed);
    }

    #[test]
    fn test_toolchain_argument_vectors() {
        let tools = Toolchain::default();
        let src = Path::new("/w/a.sequence");
        let dest = Path::new("/w/a.sorted");
        assert_eq!(
            tools.sort_argv(src, dest),
            argv(&["sort", "--output=/w/a.sorted", "/w/a.sequence"])
        );
        assert_eq!(
            tools.merge_argv(Path::new("/w/a.sorted"), Path::new("/w/b.sorted"), Path::new("/w/a-cbdpair-b.sorted")),
            argv(&["sort", "-m", "--output=/w/a-cbdpair-b.sorted", "/w/a.sorted", "/w/b.sorted"])
        );
        assert_eq!(
            tools.compress_argv(dest, false),
            argv(&["xz", "--keep", "-9", "--no-warn", "/w/a.sorted"])
        );
        assert_eq!(
            tools.compress_argv(dest, true),
            argv(&["xz", "--keep", "-9e", "--no-warn", "/w/a.sorted"])
        );
        assert_eq!(tools.compressed_path(dest), PathBuf::from("/w/a.sorted.xz"));
    }

    #[test]
    fn test_leading_tool_args_are_kept() {
        let mut tools = Toolchain::default();
        tools.sort.args = vec!["-S".to_string(), "1G".to_string()];
        let v = tools.sort_argv(Path::new("in"), Path::new("out"));
        assert_eq!(v, argv(&["sort", "-S", "1G", "--output=out", "in"]));
    }

    #[test]
    fn test_sort_and_merge_with_system_sort() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.sequence");
        let b = dir.path().join("b.sequence");
        std::fs::write(&a, "TTT\nAAA\nCCC\n").unwrap();
        std::fs::write(&b, "GGG\nAAC\n").unwrap();

        let tools = Toolchain::default();
        let a_sorted = dir.path().join("a.sorted");
        let b_sorted = dir.path().join("b.sorted");
        tools.sort(&a, &a_sorted).unwrap();
        tools.sort(&b, &b_sorted).unwrap();
        assert_eq!(std::fs::read_to_string(&a_sorted).unwrap(), "AAA\nCCC\nTTT\n");

        let merged = dir.path().join("a-cbdpair-b.sorted");
        tools.merge(&a_sorted, &b_sorted, &merged).unwrap();
        assert_eq!(
            std::fs::read_to_string(&merged).unwrap(),
            "AAA\nAAC\nCCC\nGGG\nTTT\n"
        );
    }

    #[test]
    fn test_sort_failure_is_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let tools = Toolchain::default();
        let err = tools
            .sort(&dir.path().join("missing.sequence"), &dir.path().join("x.sorted"))
            .unwrap_err();
        match err {
            CbdError::SortFailed(f) => {
                assert!(f.return_code() > 0);
                assert!(!f.stderr.is_empty());
            }
            other => panic!("expected SortFailed, got {:?}", other),
        }
    }
}
