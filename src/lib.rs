// lib.rs - mcorr library root

//! # mcorr - Correlation profiles of nucleotide differences from coding alignments
//!
//! This library computes the probability that two strains differ at two sites as
//! a function of the distance between the sites, from already-aligned, multi-strain
//! coding sequences. Comparisons can be restricted to synonymous codon pairs.
//!
//! ## Features
//!
//! - **Parallel scans**: bounded producer/worker pipeline with cancellation
//! - **Scan variants**: whole-collection, per-position, cross-clade, per strain pair, bootstrap
//! - **Codon store**: position-indexed codon alleles, persisted with bincode + LZ4
//! - **Outputs**: CSV profiles normalised by the lag-0 diversity, raw JSON lines
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mcorr::prelude::*;
//!
//! let alignment = Alignment::from_file("core_genes.xmfa")?;
//! let store = CodonPositionStore::build_from(&alignment, 0)?;
//! let strains = Arc::new(store.to_strain_codons());
//!
//! let pipeline = ScanPipeline::builder().threads(4).build();
//! let source = WorkSource::lags(0, 100, strains.num_positions());
//! let handle = pipeline.run(source, ScanVariant::SingleClade(strains), CancelToken::new())?;
//! for profile in handle.results().iter() {
//!     println!("{:?}", profile);
//! }
//! handle.join()?;
//! # Ok::<(), mcorr::McorrError>(())
//! ```

// Re-export all main modules
pub mod cli;
pub mod core;
pub mod data;
pub mod error;
pub mod output;

// Convenience prelude for common imports
pub mod prelude {
    pub use crate::cli::{validate_args, Args, ScanMode, ValidationResult};
    pub use crate::core::{
        CancelToken, Calculator, CodonSource, CorrResult, CorrResults, GeneticCode, NuclCov, ResultType,
        ScanPipeline, ScanSettings, ScanVariant, StrainCodons, SynonymousGrouper, WorkSource, WorkUnit,
    };
    pub use crate::data::{Alignment, CodonPositionStore};
    pub use crate::error::McorrError;
    pub use crate::output::{write_pairs_csv, write_positions_csv, write_profile_csv, ResultAggregator};
}

// Re-export main types at the root level for convenience
pub use cli::{Args, ValidationResult};
pub use crate::core::{CorrResult, CorrResults, NuclCov, ScanPipeline, ScanVariant};
pub use data::{Alignment, CodonPositionStore};
pub use error::McorrError;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn get_info() -> String {
    format!(
        "mcorr v{} - Correlation profiles of nucleotide differences",
        VERSION
    )
}
