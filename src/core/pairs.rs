// pairs.rs - Pair keys and pairwise combination of sorted sample files

use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::command::Toolchain;
use crate::error::Result;

/// Separator between the two member names in a merged file name.
/// Only used at the file-naming boundary; in memory pairs are `PairKey`.
pub const PAIR_SEPARATOR: &str = "-cbdpair-";

/// Unordered pair of two distinct sample names, stored in canonical order
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    first: String,
    second: String,
}

impl PairKey {
    /// Returns `None` when both names are the same sample
    pub fn new(a: &str, b: &str) -> Option<Self> {
        match a.cmp(b) {
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Less => Some(Self {
                first: a.to_string(),
                second: b.to_string(),
            }),
            std::cmp::Ordering::Greater => Some(Self {
                first: b.to_string(),
                second: a.to_string(),
            }),
        }
    }

    pub fn first(&self) -> &str {
        &self.first
    }

    pub fn second(&self) -> &str {
        &self.second
    }

    /// On-disk stem, e.g. `s1-cbdpair-s2`
    pub fn file_stem(&self) -> String {
        format!("{}{}{}", self.first, PAIR_SEPARATOR, self.second)
    }

    /// Recover a pair from an on-disk stem
    pub fn from_file_stem(stem: &str) -> Option<Self> {
        let (a, b) = stem.split_once(PAIR_SEPARATOR)?;
        if a.is_empty() || b.is_empty() || b.contains(PAIR_SEPARATOR) {
            return None;
        }
        Self::new(a, b)
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_stem())
    }
}

/// Every unordered pair of distinct names, each exactly once
pub fn enumerate_pairs(names: &[String]) -> Vec<PairKey> {
    let n = names.len();
    let mut pairs = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            if let Some(pair) = PairKey::new(&names[i], &names[j]) {
                pairs.push(pair);
            }
        }
    }
    pairs
}

/// A per-sample sorted file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortedFile {
    pub name: String,
    pub path: PathBuf,
}

/// One unit of work for the merging stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    pub pair: PairKey,
    pub first: PathBuf,
    pub second: PathBuf,
    pub output: PathBuf,
}

/// Plan one merged file per unordered pair of sorted files
pub fn plan_merges(sorted: &[SortedFile], dir: &Path, extension: &str) -> Vec<MergePlan> {
    let mut plans = Vec::with_capacity(sorted.len() * sorted.len().saturating_sub(1) / 2);
    for (i, p) in sorted.iter().enumerate() {
        for q in &sorted[i + 1..] {
            let Some(pair) = PairKey::new(&p.name, &q.name) else {
                continue;
            };
            // Inputs follow the canonical pair order so the merge is reproducible
            let (first, second) = if pair.first() == p.name {
                (p.path.clone(), q.path.clone())
            } else {
                (q.path.clone(), p.path.clone())
            };
            let output = dir.join(format!("{}{}", pair.file_stem(), extension));
            plans.push(MergePlan {
                pair,
                first,
                second,
                output,
            });
        }
    }
    plans
}

/// Produce the merged sorted file for one pair
pub fn merge_pair(plan: &MergePlan, tools: &Toolchain) -> Result<SortedFile> {
    tools.merge(&plan.first, &plan.second, &plan.output)?;
    Ok(SortedFile {
        name: plan.pair.file_stem(),
        path: plan.output.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("sample{:02}", i)).collect()
    }

    #[test]
    fn test_pair_key_is_unordered() {
        let a = PairKey::new("s2", "s1").unwrap();
        let b = PairKey::new("s1", "s2").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.first(), "s1");
        assert_eq!(a.second(), "s2");
        assert!(PairKey::new("s1", "s1").is_none());
    }

    #[test]
    fn test_file_stem_roundtrip() {
        let pair = PairKey::new("gut_b", "gut_a").unwrap();
        assert_eq!(pair.file_stem(), "gut_a-cbdpair-gut_b");
        assert_eq!(PairKey::from_file_stem("gut_b-cbdpair-gut_a"), Some(pair));
        assert!(PairKey::from_file_stem("plain_sample").is_none());
        assert!(PairKey::from_file_stem("a-cbdpair-").is_none());
        assert!(PairKey::from_file_stem("a-cbdpair-b-cbdpair-c").is_none());
    }

    #[test]
    fn test_enumerate_pairs_counts() {
        for n in 0..12 {
            let pairs = enumerate_pairs(&names(n));
            assert_eq!(pairs.len(), n * n.saturating_sub(1) / 2);
            let unique: HashSet<_> = pairs.iter().cloned().collect();
            assert_eq!(unique.len(), pairs.len());
            assert!(pairs.iter().all(|p| p.first() != p.second()));
        }
    }

    #[test]
    fn test_plan_merges_names_and_order() {
        let sorted = vec![
            SortedFile { name: "zeta".to_string(), path: PathBuf::from("/w/zeta.sorted") },
            SortedFile { name: "alpha".to_string(), path: PathBuf::from("/w/alpha.sorted") },
            SortedFile { name: "mid".to_string(), path: PathBuf::from("/w/mid.sorted") },
        ];
        let plans = plan_merges(&sorted, Path::new("/w"), ".sorted");
        assert_eq!(plans.len(), 3);

        let first = &plans[0];
        assert_eq!(first.pair, PairKey::new("alpha", "zeta").unwrap());
        assert_eq!(first.first, PathBuf::from("/w/alpha.sorted"));
        assert_eq!(first.second, PathBuf::from("/w/zeta.sorted"));
        assert_eq!(first.output, PathBuf::from("/w/alpha-cbdpair-zeta.sorted"));

        let outputs: HashSet<_> = plans.iter().map(|p| p.output.clone()).collect();
        assert_eq!(outputs.len(), 3);
    }
}
