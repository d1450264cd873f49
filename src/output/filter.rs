// filter.rs - Select sample groups from a distance matrix

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use crate::core::DistanceMatrix;
use crate::data::sample::sample_name;
use crate::error::{CbdError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupFilter {
    /// Samples of exactly one group
    Within,
    /// Samples outside exactly one group
    Without,
    /// Samples belonging to any of several groups
    Between,
}

impl FromStr for GroupFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "within" => Ok(GroupFilter::Within),
            "without" => Ok(GroupFilter::Without),
            "between" => Ok(GroupFilter::Between),
            _ => Err(format!("Filter '{}' is not supported. Use: within, without, between", s)),
        }
    }
}

/// Load `path<TAB>group1;group2[<TAB>label]` lines into group -> sample names
pub fn load_groups(file_path: &Path) -> Result<HashMap<String, HashSet<String>>> {
    let file = File::open(file_path).map_err(|e| {
        CbdError::io(format!("Error opening input list file '{}'", file_path.display()), e)
    })?;
    let mut groups: HashMap<String, HashSet<String>> = HashMap::new();

    for (line_num, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| {
            CbdError::io(format!("Failed to read line {} from '{}'", line_num + 1, file_path.display()), e)
        })?;
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 2 || fields.len() > 3 {
            return Err(CbdError::Config(format!(
                "Line {} must contain a path and group list and an optional label, found {} fields",
                line_num + 1,
                fields.len()
            )));
        }

        let name = sample_name(Path::new(fields[0]));
        for group in fields[1].split(';').filter(|g| !g.is_empty()) {
            groups.entry(group.to_string()).or_default().insert(name.clone());
        }
    }

    Ok(groups)
}

/// Flatten `--group` values, each of which may hold a `;` separated list
pub fn split_group_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(';'))
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keep the rows/columns selected by the filter
pub fn filter_matrix(
    matrix: &DistanceMatrix,
    groups: &HashMap<String, HashSet<String>>,
    filter: GroupFilter,
    selected: &[String],
) -> Result<DistanceMatrix> {
    if matches!(filter, GroupFilter::Within | GroupFilter::Without) && selected.len() != 1 {
        return Err(CbdError::Config(format!(
            "Only one group can be specified with filter '{}'",
            if filter == GroupFilter::Within { "within" } else { "without" }
        )));
    }

    let empty = HashSet::new();
    let in_group = |name: &str| {
        selected
            .iter()
            .any(|g| groups.get(g).unwrap_or(&empty).contains(name))
    };

    let keep: Vec<bool> = matrix
        .names()
        .iter()
        .map(|name| match filter {
            GroupFilter::Within | GroupFilter::Between => in_group(name),
            GroupFilter::Without => !in_group(name),
        })
        .collect();

    Ok(matrix.subset(&keep))
}
