// sample.rs - Input samples and input list parsing

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::pairs::PAIR_SEPARATOR;
use crate::error::{CbdError, Result};

/// Sequence file formats understood by the extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceFormat {
    Fasta,
    Fastq,
}

impl FromStr for SequenceFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fasta" | "fa" | "fas" | "fna" => Ok(SequenceFormat::Fasta),
            "fastq" | "fq" => Ok(SequenceFormat::Fastq),
            _ => Err(format!("Invalid sequence format: {}. Use: fasta, fastq", s)),
        }
    }
}

impl fmt::Display for SequenceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceFormat::Fasta => write!(f, "fasta"),
            SequenceFormat::Fastq => write!(f, "fastq"),
        }
    }
}

/// Reference to a file held by the object store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeRef(pub String);

impl NodeRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A reference is usable only when it carries a non-blank id
    pub fn is_valid(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a sample's sequence file lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleSource {
    Local(PathBuf),
    Remote { node: NodeRef, file_name: String },
}

/// One input sequence file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub name: String,
    pub source: SampleSource,
    pub format: SequenceFormat,
}

impl Sample {
    pub fn local(path: &Path, format: SequenceFormat) -> Result<Self> {
        std::fs::metadata(path)
            .map_err(|e| CbdError::io(format!("Failed to read input file '{}'", path.display()), e))?;
        Ok(Self {
            name: sample_name(path),
            source: SampleSource::Local(path.to_path_buf()),
            format,
        })
    }

    pub fn remote(node: NodeRef, file_name: &str, format: SequenceFormat) -> Self {
        Self {
            name: sample_name(Path::new(file_name)),
            source: SampleSource::Remote {
                node,
                file_name: file_name.to_string(),
            },
            format,
        }
    }
}

/// Stable sample name: base name without its last extension, with any
/// pair separator replaced so merged file names stay unambiguous
pub fn sample_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.replace(PAIR_SEPARATOR, "-")
}

/// Reject input sets where two files map to the same sample name
pub fn check_unique_names(samples: &[Sample]) -> Result<()> {
    let mut seen = HashSet::new();
    for sample in samples {
        if !seen.insert(sample.name.as_str()) {
            return Err(CbdError::DuplicateSample(sample.name.clone()));
        }
    }
    Ok(())
}

/// Parsed list file of input sequence files
#[derive(Debug, Default)]
pub struct InputList {
    pub files: Vec<PathBuf>,
    pub extensions: BTreeSet<String>,
    pub missing: Vec<PathBuf>,
}

impl InputList {
    /// Format implied by the file extensions, when they all agree
    pub fn infer_format(&self) -> std::result::Result<SequenceFormat, String> {
        if self.extensions.len() != 1 {
            return Err("The format of the sequence files could not be determined. Set the format with the --format argument.".to_string());
        }
        let ext = self.extensions.iter().next().map(String::as_str).unwrap_or("");
        ext.parse()
    }
}

/// Parse a list file: one path per line, extra tab fields ignored,
/// blank lines and `#` comments skipped
pub fn parse_input_file(list_path: &Path) -> Result<InputList> {
    let file = File::open(list_path).map_err(|e| {
        CbdError::io(format!("Error opening input list file '{}'", list_path.display()), e)
    })?;
    let reader = BufReader::new(file);
    let mut list = InputList::default();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| {
            CbdError::io(
                format!("Failed to read line {} from '{}'", line_num + 1, list_path.display()),
                e,
            )
        })?;
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let path = PathBuf::from(line.split('\t').next().unwrap_or(line));
        if path.is_file() {
            if let Some(ext) = path.extension() {
                list.extensions.insert(ext.to_string_lossy().into_owned());
            }
            list.files.push(path);
        } else {
            log::warn!("'{}' does not exist", path.display());
            list.missing.push(path);
        }
    }

    Ok(list)
}
