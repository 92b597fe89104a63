// validation.rs - Input validation utilities

use std::path::Path;
use std::str::FromStr;

use crate::cli::args::Args;
use crate::core::GeneticCode;

/// What a run computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Profile,
    Positions,
    Pairs,
    KsPairs,
    Bootstrap,
    BuildStore,
    Store,
}

impl FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "profile" | "xmfa" => Ok(ScanMode::Profile),
            "positions" | "ld" => Ok(ScanMode::Positions),
            "pairs" => Ok(ScanMode::Pairs),
            "ks-pairs" | "ks" => Ok(ScanMode::KsPairs),
            "bootstrap" => Ok(ScanMode::Bootstrap),
            "build-store" => Ok(ScanMode::BuildStore),
            "store" => Ok(ScanMode::Store),
            _ => Err(format!(
                "Invalid mode: {}. Use: profile, positions, pairs, ks-pairs, bootstrap, build-store, store",
                s
            )),
        }
    }
}

impl ScanMode {
    pub fn description(&self) -> &str {
        match self {
            ScanMode::Profile => "correlation profile over all strains",
            ScanMode::Positions => "per-position joint probabilities",
            ScanMode::Pairs => "correlation profile per strain pair",
            ScanMode::KsPairs => "synonymous diversity per strain pair",
            ScanMode::Bootstrap => "bootstrapped correlation profiles",
            ScanMode::BuildStore => "build and persist a codon-position store",
            ScanMode::Store => "correlation profile from a persisted store",
        }
    }

    /// Whether the mode writes result files under an output prefix.
    pub fn writes_results(&self) -> bool {
        !matches!(self, ScanMode::BuildStore)
    }
}

#[derive(Debug)]
pub struct ValidationResult {
    pub mode: ScanMode,
    /// Zero-based nucleotide within the codon; `None` compares all three.
    pub codon_position: Option<usize>,
    /// Lag range in codons; `max_lag` 0 means the whole sequence.
    pub min_lag: usize,
    pub max_lag: usize,
    pub genetic_code: GeneticCode,
    pub output_prefix: Option<String>,
}

/// Map a 1-based codon position to a nucleotide offset; 0 and out-of-range values select all three.
pub fn codon_position_offset(position: usize) -> Option<usize> {
    match position {
        1..=3 => Some(position - 1),
        _ => None,
    }
}

/// Validate all command line arguments
pub fn validate_args(args: &Args) -> Result<ValidationResult, String> {
    let mode = ScanMode::from_str(&args.mode)?;

    // Input files
    match mode {
        ScanMode::Store => {
            let store = args.store.as_ref().ok_or("--store is required in store mode")?;
            if !Path::new(store).exists() {
                return Err(format!("Store file not found: {}", store));
            }
        }
        ScanMode::BuildStore => {
            args.input.as_ref().ok_or("--input is required")?;
            args.store.as_ref().ok_or("--store is required in build-store mode")?;
        }
        _ => {
            args.input.as_ref().ok_or("--input is required")?;
        }
    }
    for path in args.input.iter().chain(args.mate_aln.iter()) {
        if mode != ScanMode::Store && !Path::new(path).exists() {
            return Err(format!("Alignment file not found: {}", path));
        }
    }

    let output_prefix = if mode.writes_results() {
        Some(args.output.clone().ok_or("--output is required")?)
    } else {
        None
    };

    // Clade options
    if args.between_clades {
        if args.mate_aln.is_none() {
            return Err("--between-clades requires --mate-aln".to_string());
        }
        if mode != ScanMode::Profile {
            return Err(format!(
                "--between-clades is only supported in profile mode, not {}",
                args.mode
            ));
        }
    }

    // Lags
    let min_lag = args.min_corr_length / 3;
    let max_lag = args.max_corr_length / 3;
    if args.max_corr_length > 0 && max_lag == 0 {
        return Err("--max-corr-length must be at least 3 nucleotides".to_string());
    }
    if max_lag > 0 && min_lag >= max_lag {
        return Err(format!(
            "--min-corr-length ({}) must be smaller than --max-corr-length ({})",
            args.min_corr_length, args.max_corr_length
        ));
    }

    // Gap filter
    if let Some(fraction) = args.max_gap_fraction {
        if !(0.0..=1.0).contains(&fraction) {
            return Err("Max gap fraction must be between 0.0 and 1.0".to_string());
        }
    } else if args.fill_gaps {
        return Err("--fill-gaps requires --max-gap-fraction".to_string());
    }

    if args.threads == Some(0) {
        return Err("--threads must be at least 1".to_string());
    }

    if args.codon_position > 3 {
        log::warn!(
            "Codon position {} is out of range, comparing all three nucleotides",
            args.codon_position
        );
    }

    let genetic_code = GeneticCode::from_id(args.genetic_code)?;

    Ok(ValidationResult {
        mode,
        codon_position: codon_position_offset(args.codon_position),
        min_lag,
        max_lag,
        genetic_code,
        output_prefix,
    })
}
