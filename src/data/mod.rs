// mod.rs - Data structures module

pub mod extract;
pub mod sample;

// Re-export main types for convenience
pub use extract::{extract_sequences, ExtractOutcome, ExtractParams};
pub use sample::{parse_input_file, InputList, NodeRef, Sample, SampleSource, SequenceFormat};
