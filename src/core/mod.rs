// mod.rs - Core logic module

pub mod command;
pub mod distance;
pub mod pairs;

// Re-export main types for convenience
pub use command::{run_command, CommandFailure, CommandOutcome, ToolCommand, Toolchain};
pub use distance::{
    calculate_distance_matrix, calculate_from_files, cbd_distance, to_inf_scale, CompressedSizes,
    DistanceMatrix, Scale,
};
pub use pairs::{enumerate_pairs, merge_pair, plan_merges, MergePlan, PairKey, SortedFile, PAIR_SEPARATOR};
