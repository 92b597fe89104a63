// mod.rs - Data structures module

pub mod alignment;
pub mod store;

// Re-export main types for convenience
pub use alignment::{Alignment, AlignmentBlock, GapFilterReport, SequenceRecord};
pub use store::{CodonPositionStore, StoreMetadata, StrainAccumulator};
