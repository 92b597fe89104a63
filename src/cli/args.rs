// args.rs - Command line arguments definition

use argh::FromArgs;

#[derive(FromArgs)]
/// mcorr - Correlation profiles of nucleotide differences from multi-strain coding alignments
pub struct Args {
    /// path to the XMFA alignment of coding sequences
    #[argh(option)]
    pub input: Option<String>,

    /// output prefix; results are written to <prefix>.csv (and <prefix>.json)
    #[argh(option)]
    pub output: Option<String>,

    /// scan mode: profile, positions, pairs, ks-pairs, bootstrap, build-store, store (default: profile)
    #[argh(option, default = "String::from(\"profile\")")]
    pub mode: String,

    /// number of worker threads (default: auto-detect)
    #[argh(option)]
    pub threads: Option<usize>,

    /// maximum distance of correlation in nucleotides (default: 300, 0 = whole sequence)
    #[argh(option, default = "300")]
    pub max_corr_length: usize,

    /// minimum distance of correlation in nucleotides (default: 0)
    #[argh(option, default = "0")]
    pub min_corr_length: usize,

    /// compare all codon pairs instead of synonymous ones only
    #[argh(switch)]
    pub non_synonymous: bool,

    /// nucleotide within the codon to compare, 1-3; 0 compares all three (default: 3)
    #[argh(option, default = "3")]
    pub codon_position: usize,

    /// reading-frame offset of the first codon (default: 0)
    #[argh(option, default = "0")]
    pub codon_offset: usize,

    /// NCBI genetic code id (default: 11)
    #[argh(option, default = "11")]
    pub genetic_code: u8,

    /// mate alignment of a second clade
    #[argh(option)]
    pub mate_aln: Option<String>,

    /// correlate the mate alignment against the input instead of pooling their strains
    #[argh(switch)]
    pub between_clades: bool,

    /// number of bootstrap replicates (default: 1000)
    #[argh(option, default = "1000")]
    pub num_boot: usize,

    /// random seed for bootstrap resampling
    #[argh(option)]
    pub seed: Option<u64>,

    /// minimum count a doublet cell needs to contribute (default: 0)
    #[argh(option, default = "0")]
    pub min_allele_num: usize,

    /// drop sequences whose gap/N fraction exceeds this value (0.0-1.0)
    #[argh(option)]
    pub max_gap_fraction: Option<f64>,

    /// replace filtered sequences with all-gap sequences instead of dropping them
    #[argh(switch)]
    pub fill_gaps: bool,

    /// path of the persisted codon-position store (.lz4)
    #[argh(option)]
    pub store: Option<String>,

    /// write the gene start list next to the store (default: <store>.genes.txt)
    #[argh(option)]
    pub gene_list: Option<String>,

    /// also write raw results as JSON lines to <prefix>.json
    #[argh(switch)]
    pub json: bool,

    /// show a progress bar over work units
    #[argh(switch)]
    pub show_progress: bool,

    /// enable debug logging
    #[argh(switch)]
    pub verbose: bool,

    /// path to TOML configuration file
    #[argh(option)]
    pub config: Option<String>,

    /// generate sample configuration file and exit
    #[argh(switch)]
    pub generate_config: bool,
}

impl Args {
    /// Arguments with every option at its default, as argh would produce them.
    pub fn with_defaults() -> Self {
        Self {
            input: None,
            output: None,
            mode: "profile".to_string(),
            threads: None,
            max_corr_length: 300,
            min_corr_length: 0,
            non_synonymous: false,
            codon_position: 3,
            codon_offset: 0,
            genetic_code: 11,
            mate_aln: None,
            between_clades: false,
            num_boot: 1000,
            seed: None,
            min_allele_num: 0,
            max_gap_fraction: None,
            fill_gaps: false,
            store: None,
            gene_list: None,
            json: false,
            show_progress: false,
            verbose: false,
            config: None,
            generate_config: false,
        }
    }
}
