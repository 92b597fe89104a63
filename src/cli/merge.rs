// merge.rs - Merge configuration file with CLI arguments

use crate::cli::{Args, Config};

impl Args {
    /// Merge with configuration from file
    /// CLI arguments take precedence over config file values
    pub fn merge_with_config(mut self, config: Config) -> Self {
        // Input/Output
        if self.input.is_none() {
            self.input = config.input;
        }
        if self.output.is_none() {
            self.output = config.output;
        }
        if self.mate_aln.is_none() {
            self.mate_aln = config.mate_aln;
        }
        if self.store.is_none() {
            self.store = config.store;
        }
        if self.gene_list.is_none() {
            self.gene_list = config.gene_list;
        }

        // Scan settings (only override defaults, not explicit CLI values)
        if self.mode == "profile" {
            if let Some(mode) = config.mode {
                self.mode = mode;
            }
        }
        if self.max_corr_length == 300 {
            if let Some(value) = config.max_corr_length {
                self.max_corr_length = value;
            }
        }
        if self.min_corr_length == 0 {
            if let Some(value) = config.min_corr_length {
                self.min_corr_length = value;
            }
        }
        if self.codon_position == 3 {
            if let Some(value) = config.codon_position {
                self.codon_position = value;
            }
        }
        if self.codon_offset == 0 {
            if let Some(value) = config.codon_offset {
                self.codon_offset = value;
            }
        }
        if self.genetic_code == 11 {
            if let Some(value) = config.genetic_code {
                self.genetic_code = value;
            }
        }
        if self.min_allele_num == 0 {
            if let Some(value) = config.min_allele_num {
                self.min_allele_num = value;
            }
        }
        if self.num_boot == 1000 {
            if let Some(value) = config.num_boot {
                self.num_boot = value;
            }
        }
        if self.seed.is_none() {
            self.seed = config.seed;
        }

        // Performance
        if self.threads.is_none() {
            self.threads = config.threads;
        }

        // Gap filtering
        if self.max_gap_fraction.is_none() {
            self.max_gap_fraction = config.max_gap_fraction;
        }

        // Flags (CLI flags take precedence, config only sets if not explicitly set)
        if !self.non_synonymous && config.non_synonymous.unwrap_or(false) {
            self.non_synonymous = true;
        }
        if !self.between_clades && config.between_clades.unwrap_or(false) {
            self.between_clades = true;
        }
        if !self.fill_gaps && config.fill_gaps.unwrap_or(false) {
            self.fill_gaps = true;
        }
        if !self.json && config.json.unwrap_or(false) {
            self.json = true;
        }
        if !self.show_progress && config.show_progress.unwrap_or(false) {
            self.show_progress = true;
        }

        self
    }

    /// Load configuration and merge with CLI args
    pub fn with_config_file(self, config_path: &str) -> Result<Self, String> {
        let config = Config::from_file(config_path)?;
        Ok(self.merge_with_config(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_fills_defaults_only() {
        let mut args = Args::with_defaults();
        args.output = Some("cli_out".to_string());
        args.codon_position = 1;

        let config = Config {
            input: Some("aln.xmfa".to_string()),
            output: Some("config_out".to_string()),
            mode: Some("bootstrap".to_string()),
            codon_position: Some(2),
            num_boot: Some(50),
            json: Some(true),
            ..Config::default()
        };
        let merged = args.merge_with_config(config);

        assert_eq!(merged.input.as_deref(), Some("aln.xmfa"));
        assert_eq!(merged.output.as_deref(), Some("cli_out"));
        assert_eq!(merged.mode, "bootstrap");
        assert_eq!(merged.codon_position, 1);
        assert_eq!(merged.num_boot, 50);
        assert!(merged.json);
        assert!(!merged.non_synonymous);
    }
}
