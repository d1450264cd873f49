// distance.rs - Compression based distance calculation

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::pairs::{enumerate_pairs, PairKey, PAIR_SEPARATOR};
use crate::error::{CbdError, Result};

/// File name suffix of compressed sorted artifacts
pub const COMPRESSED_SORTED_SUFFIX: &str = ".sorted.xz";

/// Scale of distance values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    /// 0 to 1
    #[default]
    Std,
    /// 0 to infinity
    Inf,
}

impl FromStr for Scale {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "std" => Ok(Scale::Std),
            "inf" => Ok(Scale::Inf),
            _ => Err(format!("Invalid scale: {}. Use: std, inf", s)),
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scale::Std => write!(f, "std"),
            Scale::Inf => write!(f, "inf"),
        }
    }
}

/// Standard-scale distance from two single and one combined compressed size
pub fn cbd_distance(c1: u64, c2: u64, c12: u64) -> f64 {
    let c1 = c1 as f64;
    let c2 = c2 as f64;
    let c12 = c12 as f64;
    1.0 - (2.0 * ((c1 + c2 - c12) / (c1 + c2)))
}

/// Map a standard-scale value onto [0, inf)
pub fn to_inf_scale(distance: f64) -> f64 {
    distance / (1.0 - distance)
}

/// Compressed byte sizes of every single-sample and pair artifact
#[derive(Debug, Clone, Default)]
pub struct CompressedSizes {
    singles: BTreeMap<String, u64>,
    pairs: BTreeMap<PairKey, u64>,
}

impl CompressedSizes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_single(&mut self, name: impl Into<String>, size: u64) {
        self.singles.insert(name.into(), size);
    }

    pub fn insert_pair(&mut self, pair: PairKey, size: u64) {
        self.pairs.insert(pair, size);
    }

    pub fn single(&self, name: &str) -> Option<u64> {
        self.singles.get(name).copied()
    }

    pub fn pair(&self, pair: &PairKey) -> Option<u64> {
        self.pairs.get(pair).copied()
    }

    /// Sample names in lexicographic order
    pub fn sample_names(&self) -> Vec<String> {
        self.singles.keys().cloned().collect()
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    /// Classify compressed files by name and record their sizes.
    /// Names holding the pair separator are pair artifacts.
    pub fn from_files(paths: &[PathBuf]) -> Result<Self> {
        let mut sizes = Self::new();
        for path in paths {
            let size = std::fs::metadata(path)
                .map_err(|e| {
                    CbdError::io(
                        format!("Failed to read compressed file '{}'", path.display()),
                        e,
                    )
                })?
                .len();
            let name = artifact_name(path);
            if name.contains(PAIR_SEPARATOR) {
                let pair = PairKey::from_file_stem(&name).ok_or_else(|| {
                    CbdError::Config(format!("Invalid pair file name '{}'", path.display()))
                })?;
                sizes.insert_pair(pair, size);
            } else {
                sizes.insert_single(name, size);
            }
        }
        Ok(sizes)
    }
}

/// Strip the directory and the compressed-sorted suffix from an artifact path
fn artifact_name(path: &Path) -> String {
    let base = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match base.strip_suffix(COMPRESSED_SORTED_SUFFIX) {
        Some(stem) => stem.to_string(),
        None => Path::new(&base)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(base),
    }
}

/// Square, symmetric matrix indexed by lexicographically sorted sample names
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    names: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl DistanceMatrix {
    /// Build from names and rows; rows must form a square matrix
    pub fn from_parts(names: Vec<String>, values: Vec<Vec<f64>>) -> std::result::Result<Self, String> {
        if values.len() != names.len() || values.iter().any(|row| row.len() != names.len()) {
            return Err(format!(
                "Matrix is not square: {} names, {} rows",
                names.len(),
                values.len()
            ));
        }
        Ok(Self { names, values })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i]
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i][j]
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn value(&self, a: &str, b: &str) -> Option<f64> {
        Some(self.values[self.index_of(a)?][self.index_of(b)?])
    }

    pub fn is_symmetric(&self) -> bool {
        (0..self.len()).all(|i| (0..i).all(|j| self.values[i][j].to_bits() == self.values[j][i].to_bits()))
    }

    /// Restrict the matrix to the selected rows/columns, keeping order
    pub fn subset(&self, keep: &[bool]) -> DistanceMatrix {
        let idx: Vec<usize> = (0..self.len()).filter(|&i| keep.get(i).copied().unwrap_or(false)).collect();
        DistanceMatrix {
            names: idx.iter().map(|&i| self.names[i].clone()).collect(),
            values: idx
                .iter()
                .map(|&i| idx.iter().map(|&j| self.values[i][j]).collect())
                .collect(),
        }
    }
}

/// Calculate the full distance matrix from compressed sizes
pub fn calculate_distance_matrix(sizes: &CompressedSizes, scale: Scale) -> Result<DistanceMatrix> {
    let names = sizes.sample_names();
    let n = names.len();

    for pair in sizes.pairs.keys() {
        for member in [pair.first(), pair.second()] {
            if sizes.single(member).is_none() {
                return Err(CbdError::MissingArtifact(member.to_string()));
            }
        }
    }

    let cells: Vec<(usize, usize, f64)> = enumerate_pairs(&names)
        .into_par_iter()
        .map(|pair| {
            let c1 = sizes.single(pair.first()).unwrap_or_default();
            let c2 = sizes.single(pair.second()).unwrap_or_default();
            let c12 = sizes
                .pair(&pair)
                .ok_or_else(|| CbdError::MissingArtifact(pair.file_stem()))?;

            let distance = cbd_distance(c1, c2, c12);
            if distance > 1.0 {
                return Err(CbdError::InconsistentSamples {
                    distance,
                    name1: pair.first().to_string(),
                    c1,
                    name2: pair.second().to_string(),
                    c2,
                    pair: pair.file_stem(),
                    c12,
                });
            }
            let value = match scale {
                Scale::Std => distance,
                Scale::Inf => to_inf_scale(distance),
            };

            // names are sorted, so the canonical pair order matches index order
            let i = names.binary_search_by(|s| s.as_str().cmp(pair.first())).unwrap_or(0);
            let j = names.binary_search_by(|s| s.as_str().cmp(pair.second())).unwrap_or(0);
            Ok((i, j, value))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut values = vec![vec![0.0; n]; n];
    for (i, j, value) in cells {
        values[i][j] = value;
        values[j][i] = value;
    }

    log::info!("Distance matrix computed for {} samples ({} pairs)", n, n * n.saturating_sub(1) / 2);
    Ok(DistanceMatrix { names, values })
}

/// Calculate the matrix straight from compressed artifact files
pub fn calculate_from_files(paths: &[PathBuf], scale: Scale) -> Result<DistanceMatrix> {
    let sizes = CompressedSizes::from_files(paths)?;
    log::info!(
        "Read {} single and {} pair compressed sizes",
        sizes.singles.len(),
        sizes.pair_count()
    );
    calculate_distance_matrix(&sizes, scale)
}
