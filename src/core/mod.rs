// mod.rs - Core logic module

pub mod calculator;
pub mod codon;
pub mod nucl_cov;
pub mod pipeline;
pub mod results;
pub mod synonymous;

// Re-export main types for convenience
pub use calculator::{pair_id, Calculator, CodonSource, Resampled, ScanSettings};
pub use codon::{Codon, CodonPair, CodonSequence, GeneticCode, StrainCodons, GAP_CODON};
pub use nucl_cov::NuclCov;
pub use pipeline::{
    CancelToken, PipelineBuilder, PipelineState, ScanHandle, ScanPipeline, ScanStats, ScanVariant, WorkSource,
    WorkUnit, ALL_KEY,
};
pub use results::{CorrResult, CorrResults, ResultType};
pub use synonymous::SynonymousGrouper;
