// extract.rs - Raw sequence extraction with length and read-count filtering

use std::fmt::Display;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use bio::io::{fasta, fastq};
use serde::{Deserialize, Serialize};

use crate::data::sample::SequenceFormat;
use crate::error::{CbdError, Result};

/// Filtering parameters; zero disables the corresponding bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtractParams {
    /// Trim reads to this length, dropping shorter reads
    pub trim_length: usize,
    /// Drop the whole sample when fewer reads are written
    pub min_reads: usize,
    /// Stop after this many reads
    pub max_reads: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    Written { path: PathBuf, reads: usize },
    /// Too few reads; the destination file was removed
    Dropped { reads: usize },
}

/// Extract one sequence per line from `source` into `dest`
pub fn extract_sequences(
    source: &Path,
    format: SequenceFormat,
    dest: &Path,
    params: &ExtractParams,
) -> Result<ExtractOutcome> {
    let failed = |reason: String| CbdError::ExtractionFailed {
        path: source.to_path_buf(),
        reason,
    };

    let input = File::open(source).map_err(|e| failed(format!("cannot open: {}", e)))?;
    let output = File::create(dest)
        .map_err(|e| failed(format!("cannot create '{}': {}", dest.display(), e)))?;
    let mut writer = BufWriter::new(output);

    let reads = match format {
        SequenceFormat::Fasta => {
            let records = fasta::Reader::new(BufReader::new(input))
                .records()
                .map(|r| r.map(|rec| rec.seq().to_vec()));
            write_filtered(records, &mut writer, params)
        }
        SequenceFormat::Fastq => {
            let records = fastq::Reader::new(BufReader::new(input))
                .records()
                .map(|r| r.map(|rec| rec.seq().to_vec()));
            write_filtered(records, &mut writer, params)
        }
    }
    .map_err(failed)?;

    writer
        .flush()
        .map_err(|e| failed(format!("cannot write '{}': {}", dest.display(), e)))?;
    drop(writer);

    if params.min_reads > 0 && reads < params.min_reads {
        std::fs::remove_file(dest)
            .map_err(|e| failed(format!("cannot remove '{}': {}", dest.display(), e)))?;
        log::info!(
            "Dropped '{}': {} reads is below the minimum of {}",
            source.display(),
            reads,
            params.min_reads
        );
        return Ok(ExtractOutcome::Dropped { reads });
    }

    Ok(ExtractOutcome::Written {
        path: dest.to_path_buf(),
        reads,
    })
}

fn write_filtered<I, E, W>(records: I, writer: &mut W, params: &ExtractParams) -> std::result::Result<usize, String>
where
    I: Iterator<Item = std::result::Result<Vec<u8>, E>>,
    E: Display,
    W: Write,
{
    let mut reads = 0;
    for record in records {
        let mut seq = record.map_err(|e| format!("invalid record: {}", e))?;
        if params.trim_length > 0 {
            if seq.len() < params.trim_length {
                continue;
            }
            seq.truncate(params.trim_length);
        }
        writer
            .write_all(&seq)
            .and_then(|_| writer.write_all(b"\n"))
            .map_err(|e| format!("write error: {}", e))?;
        reads += 1;
        if params.max_reads > 0 && reads == params.max_reads {
            break;
        }
    }
    Ok(reads)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FASTA: &str = ">r1\nACGTACGTAC\n>r2\nACG\n>r3\nTTTTGGGGCCCCAAAA\n>r4\nGGGGGGGG\n";
    const FASTQ: &str = "@r1\nACGTAC\n+\nIIIIII\n@r2\nTTGG\n+\nIIII\n";

    fn setup(content: &str, name: &str) -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join(name);
        std::fs::write(&source, content).unwrap();
        let dest = dir.path().join("out.sequence");
        (dir, source, dest)
    }

    #[test]
    fn test_passthrough_without_trimming() {
        let (_dir, source, dest) = setup(FASTA, "s.fasta");
        let outcome = extract_sequences(&source, SequenceFormat::Fasta, &dest, &ExtractParams::default()).unwrap();
        assert_eq!(outcome, ExtractOutcome::Written { path: dest.clone(), reads: 4 });
        assert_eq!(
            std::fs::read_to_string(&dest).unwrap(),
            "ACGTACGTAC\nACG\nTTTTGGGGCCCCAAAA\nGGGGGGGG\n"
        );
    }

    #[test]
    fn test_trimming_drops_short_and_truncates_long() {
        let (_dir, source, dest) = setup(FASTA, "s.fasta");
        let params = ExtractParams { trim_length: 8, ..Default::default() };
        extract_sequences(&source, SequenceFormat::Fasta, &dest, &params).unwrap();
        let content = std::fs::read_to_string(&dest).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["ACGTACGT", "TTTTGGGG", "GGGGGGGG"]);
        assert!(lines.iter().all(|l| l.len() == 8));
    }

    #[test]
    fn test_max_reads_stops_early() {
        let (_dir, source, dest) = setup(FASTA, "s.fasta");
        let params = ExtractParams { trim_length: 8, max_reads: 2, ..Default::default() };
        let outcome = extract_sequences(&source, SequenceFormat::Fasta, &dest, &params).unwrap();
        assert_eq!(outcome, ExtractOutcome::Written { path: dest.clone(), reads: 2 });

        let params = ExtractParams { max_reads: 1, ..Default::default() };
        extract_sequences(&source, SequenceFormat::Fasta, &dest, &params).unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "ACGTACGTAC\n");
    }

    #[test]
    fn test_min_reads_drops_sample() {
        let (_dir, source, dest) = setup(FASTA, "s.fasta");
        let params = ExtractParams { min_reads: 100, ..Default::default() };
        let outcome = extract_sequences(&source, SequenceFormat::Fasta, &dest, &params).unwrap();
        assert_eq!(outcome, ExtractOutcome::Dropped { reads: 4 });
        assert!(!dest.exists());
        assert!(source.exists());
    }

    #[test]
    fn test_fastq_records() {
        let (_dir, source, dest) = setup(FASTQ, "s.fastq");
        extract_sequences(&source, SequenceFormat::Fastq, &dest, &ExtractParams::default()).unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "ACGTAC\nTTGG\n");
    }

    #[test]
    fn test_malformed_input_fails_with_path() {
        let (_dir, source, dest) = setup("this is not fasta\n", "bad.fasta");
        let err = extract_sequences(&source, SequenceFormat::Fasta, &dest, &ExtractParams::default()).unwrap_err();
        match err {
            CbdError::ExtractionFailed { path, .. } => assert_eq!(path, source),
            other => panic!("expected ExtractionFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_sequences(
            &dir.path().join("nope.fasta"),
            SequenceFormat::Fasta,
            &dir.path().join("out"),
            &ExtractParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CbdError::ExtractionFailed { .. }));
    }
}
