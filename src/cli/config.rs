// config.rs - Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    // Input/Output
    pub input: Option<String>,
    pub output: Option<String>,
    pub mate_aln: Option<String>,
    pub store: Option<String>,
    pub gene_list: Option<String>,

    // Scan settings
    pub mode: Option<String>,
    pub max_corr_length: Option<usize>,
    pub min_corr_length: Option<usize>,
    pub codon_position: Option<usize>,
    pub codon_offset: Option<usize>,
    pub genetic_code: Option<u8>,
    pub min_allele_num: Option<usize>,
    pub num_boot: Option<usize>,
    pub seed: Option<u64>,

    // Performance
    pub threads: Option<usize>,

    // Gap filtering
    pub max_gap_fraction: Option<f64>,

    // Flags
    pub non_synonymous: Option<bool>,
    pub between_clades: Option<bool>,
    pub fill_gaps: Option<bool>,
    pub json: Option<bool>,
    pub show_progress: Option<bool>,
}

impl Config {
    /// Create a new empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        println!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(path, content)
            .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))?;

        println!("📄 Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Generate a sample configuration file with comments
    pub fn generate_sample() -> String {
        r#"# mcorr.toml - Configuration file for mcorr
# Command line arguments will override these settings

# =============================================================================
# INPUT/OUTPUT
# =============================================================================

# XMFA alignment of coding sequences
input = "/path/to/core_genes.xmfa"

# Output prefix: results go to <prefix>.csv and, with json = true, <prefix>.json
output = "mcorr_out"

# Mate alignment of a second clade (pooled unless between_clades = true)
# mate_aln = "/path/to/clade2.xmfa"

# Persisted codon-position store (build-store writes it, store reads it)
# store = "genes.lz4"

# =============================================================================
# SCAN SETTINGS
# =============================================================================

# Mode: profile, positions, pairs, ks-pairs, bootstrap, build-store, store
mode = "profile"

# Correlation distances in nucleotides (max 0 scans the whole sequence)
max_corr_length = 300
min_corr_length = 0

# Nucleotide within the codon to compare (1-3, 0 = all three)
codon_position = 3

# Reading-frame offset of the first codon
codon_offset = 0

# NCBI genetic code id (only 11 is supported)
genetic_code = 11

# Minimum count a doublet cell needs to contribute
min_allele_num = 0

# Bootstrap replicates and seed
num_boot = 1000
# seed = 42

# =============================================================================
# PERFORMANCE
# =============================================================================

# Number of threads (omit for auto-detection)
threads = 8

# =============================================================================
# GAP FILTERING
# =============================================================================

# Drop sequences whose gap/N fraction exceeds this value
# max_gap_fraction = 0.1

# Replace filtered sequences with all-gap sequences instead of dropping them
fill_gaps = false

# =============================================================================
# FLAGS
# =============================================================================

# Compare all codon pairs instead of synonymous ones only
non_synonymous = false

# Correlate the mate alignment against the input
between_clades = false

# Write raw results as JSON lines
json = false

# Show a progress bar
show_progress = true
"#
        .to_string()
    }
}
