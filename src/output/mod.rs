// mod.rs - Distance matrix output formatting

pub mod filter;

use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::core::DistanceMatrix;
use crate::error::{CbdError, Result};

pub use filter::{filter_matrix, load_groups, split_group_list, GroupFilter};

/// Ensure parent directory exists before creating file
fn ensure_parent_dir(file_path: &Path) -> Result<()> {
    if let Some(parent) = file_path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent).map_err(|e| {
                CbdError::io(format!("Failed to create parent directory '{}'", parent.display()), e)
            })?;
        }
    }
    Ok(())
}

/// Format like `%g`: six significant digits, trailing zeros removed,
/// scientific notation for very small or very large magnitudes
pub fn format_general(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // Rounding to six significant digits decides the exponent
    let sci = format!("{:.5e}", value);
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if !(-4..6).contains(&exponent) {
        let mantissa = trim_fraction(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    } else {
        let decimals = (5 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Write the matrix as `ID,<names>` followed by one row per sample
pub fn write_matrix_csv(file_path: &Path, matrix: &DistanceMatrix) -> Result<()> {
    let write_err = |e: std::io::Error| {
        CbdError::io(format!("Failed to write distance matrix '{}'", file_path.display()), e)
    };

    ensure_parent_dir(file_path)?;
    let file = File::create(file_path).map_err(|e| {
        CbdError::io(format!("Failed to create output file '{}'", file_path.display()), e)
    })?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "ID,{}", matrix.names().join(",")).map_err(write_err)?;
    for (i, name) in matrix.names().iter().enumerate() {
        let row: Vec<String> = matrix.row(i).iter().map(|v| format_general(*v)).collect();
        writeln!(writer, "{},{}", name, row.join(",")).map_err(write_err)?;
    }

    writer.flush().map_err(write_err)?;
    log::info!("Distance matrix written to: {}", file_path.display());
    Ok(())
}

/// Read a matrix written by `write_matrix_csv`
pub fn read_matrix_csv(file_path: &Path) -> Result<DistanceMatrix> {
    let bad = |msg: String| CbdError::Config(format!("Invalid distance matrix '{}': {}", file_path.display(), msg));

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(file_path)
        .map_err(|e| bad(e.to_string()))?;

    let headers = reader.headers().map_err(|e| bad(e.to_string()))?.clone();
    let names: Vec<String> = headers.iter().skip(1).map(|s| s.to_string()).collect();

    let mut values = Vec::with_capacity(names.len());
    for (row_num, record) in reader.records().enumerate() {
        let record = record.map_err(|e| bad(e.to_string()))?;
        let row = record
            .iter()
            .skip(1)
            .map(|field| {
                field
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| bad(format!("row {} has non-numeric value '{}'", row_num + 1, field)))
            })
            .collect::<Result<Vec<f64>>>()?;
        values.push(row);
    }

    DistanceMatrix::from_parts(names, values).map_err(bad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_general_matches_percent_g() {
        assert_eq!(format_general(0.0), "0");
        assert_eq!(format_general(1.0), "1");
        assert_eq!(format_general(0.5), "0.5");
        assert_eq!(format_general(0.35714285714), "0.357143");
        assert_eq!(format_general(2.0 / 3.0), "0.666667");
        assert_eq!(format_general(0.0001), "0.0001");
        assert_eq!(format_general(0.00001), "1e-05");
        assert_eq!(format_general(0.000012345678), "1.23457e-05");
        assert_eq!(format_general(123456.0), "123456");
        assert_eq!(format_general(1234567.0), "1.23457e+06");
        assert_eq!(format_general(-0.25), "-0.25");
        assert_eq!(format_general(f64::INFINITY), "inf");
        assert_eq!(format_general(0.9999999), "1");
    }

    #[test]
    fn test_write_and_read_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("job.csv");
        let m = DistanceMatrix::from_parts(
            vec!["a".into(), "b".into(), "c".into()],
            vec![vec![0.0, 0.25, 0.5], vec![0.25, 0.0, 0.125], vec![0.5, 0.125, 0.0]],
        )
        .unwrap();
        write_matrix_csv(&path, &m).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "ID,a,b,c");
        assert_eq!(lines[1], "a,0,0.25,0.5");
        assert!(lines.iter().all(|l| l.split(',').count() == 4));

        assert_eq!(read_matrix_csv(&path).unwrap(), m);
    }

    #[test]
    fn test_read_rejects_ragged_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "ID,a,b\na,0,x\nb,0.1,0\n").unwrap();
        assert!(read_matrix_csv(&path).is_err());
    }
}
