// main.rs - CLI entry point

use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};

use mcorr::cli::Config;
use mcorr::core::{CodonSource, PipelineBuilder};
use mcorr::prelude::*;

fn main() {
    if let Err(e) = run_main() {
        eprintln!("❌ ERROR: {}", e);
        std::process::exit(1);
    }
}

fn run_main() -> Result<(), String> {
    let mut args: Args = argh::from_env();
    let command_line = std::env::args().collect::<Vec<String>>().join(" ");

    // Handle generate config first
    if args.generate_config {
        let sample_config = Config::generate_sample();
        println!("{}", sample_config);
        println!("\n💡 Save this content to a .toml file and use --config /path/to/config.toml");
        return Ok(());
    }

    // Load configuration file if specified
    if let Some(config_path) = args.config.clone() {
        args = args.with_config_file(&config_path)?;
    }

    init_logging(args.verbose);

    let validation = validate_args(&args)?;

    println!("🚀 mcorr v{}", env!("CARGO_PKG_VERSION"));
    println!("🧬 Mode: {} ({})", args.mode, validation.mode.description());

    // Configure thread pool
    if let Some(n) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .map_err(|e| format!("Failed to configure thread pool: {}", e))?;
        println!("🧵 Threads: {}", n);
    } else {
        let num_threads = rayon::current_num_threads();
        println!("🧵 Threads: {} (auto-detected)", num_threads);
    }

    let total_start = Instant::now();

    match validation.mode {
        ScanMode::BuildStore => build_store(&args)?,
        mode => {
            let prefix = validation
                .output_prefix
                .clone()
                .ok_or("--output is required")?;
            let profiles = run_scan(&args, &validation, mode, &prefix)?;
            let csv_path = format!("{}.csv", prefix);
            match mode {
                ScanMode::Positions => write_positions_csv(&csv_path, &profiles, &command_line)?,
                ScanMode::Pairs | ScanMode::KsPairs => write_pairs_csv(&csv_path, &profiles, &command_line)?,
                _ => write_profile_csv(&csv_path, &profiles, &command_line)?,
            }
        }
    }

    println!("🎉 Completed in {:.2}s", total_start.elapsed().as_secs_f64());
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    // RUST_LOG, when set, refines the default level
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.format_timestamp(None).format_target(false).init();
}

/// Read an alignment, order its genes and apply the gap filter.
fn load_alignment(path: &str, args: &Args) -> Result<Alignment, String> {
    println!("📂 Loading alignment from {}...", path);
    let mut alignment =
        Alignment::from_file(path).map_err(|e| format!("Failed to load alignment '{}': {}", path, e))?;
    alignment.sort_by_start();

    if let Some(max_fraction) = args.max_gap_fraction {
        let report = alignment.filter_gaps(max_fraction, args.fill_gaps);
        println!(
            "🧹 Gap filter ({:.0}%): kept {}, dropped {}, filled {}",
            max_fraction * 100.0,
            report.kept,
            report.dropped,
            report.filled
        );
    }
    println!("✅ Loaded {} genes", alignment.len());
    Ok(alignment)
}

/// Input alignment, pooled with the mate alignment unless clades are compared.
fn load_input(args: &Args) -> Result<Alignment, String> {
    let input = args.input.as_ref().ok_or("--input is required")?;
    let mut alignment = load_alignment(input, args)?;
    if let Some(mate) = args.mate_aln.as_ref().filter(|_| !args.between_clades) {
        let mate_alignment = load_alignment(mate, args)?;
        alignment.pool_with(mate_alignment);
        println!("🔗 Pooled strains of {} into the input alignment", mate);
    }
    Ok(alignment)
}

fn load_strains(alignment: &Alignment, codon_offset: usize) -> Result<Arc<StrainCodons>, String> {
    let store = CodonPositionStore::build_from(alignment, codon_offset)
        .map_err(|e| format!("Failed to build codon store: {}", e))?;
    let strains = store.to_strain_codons();
    println!(
        "🧬 {} strains, {} codon positions",
        strains.len(),
        strains.num_positions()
    );
    Ok(Arc::new(strains))
}

fn build_store(args: &Args) -> Result<(), String> {
    let store_path = args.store.as_ref().ok_or("--store is required in build-store mode")?;
    let alignment = load_input(args)?;

    let start = Instant::now();
    let store = CodonPositionStore::build_from(&alignment, args.codon_offset)
        .map_err(|e| format!("Failed to build codon store: {}", e))?;
    println!(
        "🧬 Built store: {} strains, {} positions, {} genes in {:.2}s",
        store.strain_names().len(),
        store.len(),
        store.gene_starts().len(),
        start.elapsed().as_secs_f64()
    );

    store
        .save(store_path)
        .map_err(|e| format!("Failed to save store '{}': {}", store_path, e))?;

    let gene_list = args
        .gene_list
        .clone()
        .unwrap_or_else(|| format!("{}.genes.txt", store_path));
    store
        .write_gene_starts(&gene_list)
        .map_err(|e| format!("Failed to write gene list '{}': {}", gene_list, e))?;
    println!("📋 Gene start list written to: {}", gene_list);
    Ok(())
}

/// Lags in codons, clamped to the sequence length.
fn lag_range(validation: &ValidationResult, num_positions: usize) -> Range<usize> {
    if validation.max_lag == 0 {
        0..num_positions
    } else {
        validation.min_lag..validation.max_lag.min(num_positions)
    }
}

fn pipeline_builder(args: &Args, validation: &ValidationResult) -> PipelineBuilder {
    ScanPipeline::builder()
        .threads(args.threads.unwrap_or(0))
        .synonymous(!args.non_synonymous)
        .codon_position(validation.codon_position)
        .genetic_code(validation.genetic_code.clone())
        .min_allele_num(args.min_allele_num)
}

fn run_scan(
    args: &Args,
    validation: &ValidationResult,
    mode: ScanMode,
    prefix: &str,
) -> Result<Vec<CorrResults>, String> {
    let (source, variant) = match mode {
        ScanMode::Store => {
            let store_path = args.store.as_ref().ok_or("--store is required in store mode")?;
            let store = CodonPositionStore::load(store_path)
                .map_err(|e| format!("Failed to load store '{}': {}", store_path, e))?;
            let lags = lag_range(validation, store.num_positions());
            (WorkSource::Lags(lags), ScanVariant::SingleClade(Arc::new(store)))
        }
        ScanMode::Profile if args.between_clades => {
            let first = load_strains(&load_input(args)?, args.codon_offset)?;
            let mate = args.mate_aln.as_ref().ok_or("--between-clades requires --mate-aln")?;
            let second = load_strains(&load_alignment(mate, args)?, args.codon_offset)?;
            let num_positions = first.num_positions().min(second.num_positions());
            (
                WorkSource::Lags(lag_range(validation, num_positions)),
                ScanVariant::CrossClade { first, second },
            )
        }
        ScanMode::Profile => {
            let strains = load_strains(&load_input(args)?, args.codon_offset)?;
            let lags = lag_range(validation, strains.num_positions());
            (WorkSource::Lags(lags), ScanVariant::SingleClade(strains))
        }
        ScanMode::Positions => {
            let strains = load_strains(&load_input(args)?, args.codon_offset)?;
            let lags = lag_range(validation, strains.num_positions());
            (WorkSource::Lags(lags), ScanVariant::PerPosition(strains))
        }
        ScanMode::Pairs => {
            let strains = load_strains(&load_input(args)?, args.codon_offset)?;
            let max_lag = lag_range(validation, strains.num_positions()).end;
            let source = WorkSource::StrainPairs {
                num_strains: strains.len(),
            };
            (source, ScanVariant::AllPairs { strains, max_lag })
        }
        ScanMode::KsPairs => {
            let strains = load_strains(&load_input(args)?, args.codon_offset)?;
            let source = WorkSource::StrainPairs {
                num_strains: strains.len(),
            };
            (source, ScanVariant::PairwiseKs(strains))
        }
        ScanMode::Bootstrap => {
            let strains = load_strains(&load_input(args)?, args.codon_offset)?;
            let lags = lag_range(validation, strains.num_positions());
            let source = WorkSource::Bootstrap {
                num_strains: strains.len(),
                replicates: args.num_boot,
                seed: args.seed,
            };
            println!("🎲 Bootstrap: {} replicates", args.num_boot);
            (source, ScanVariant::Bootstrap { strains, lags })
        }
        ScanMode::BuildStore => return Err("build-store mode does not scan".to_string()),
    };

    let pipeline = pipeline_builder(args, validation).build();
    let total_units = source.len();
    println!(
        "⚡ Scanning {} work units with {} workers ({})",
        total_units,
        pipeline.threads(),
        variant.name()
    );
    debug!("[Main] scan settings: {:?}", pipeline.settings());

    let progress = if args.show_progress {
        Some(progress_bar(total_units as u64)?)
    } else {
        None
    };

    let mut aggregator = ResultAggregator::new();
    if args.json {
        aggregator = aggregator.with_json_dump(&format!("{}.json", prefix))?;
    }

    let start = Instant::now();
    let cancel = CancelToken::new();
    let handle = pipeline
        .run(source, variant, cancel.clone())
        .map_err(|e| format!("Failed to start scan: {}", e))?;
    aggregator.collect(&handle, &cancel, progress.as_ref())?;
    let stats = handle.join().map_err(|e| format!("Scan failed: {}", e))?;

    if let Some(pb) = progress {
        pb.finish_with_message("✅ Scan complete!");
    }
    info!(
        "[Main] {} units sent, {} results received",
        stats.units_sent,
        aggregator.received()
    );
    println!(
        "✅ Scanned {} units in {:.2}s",
        stats.results_sent,
        start.elapsed().as_secs_f64()
    );

    aggregator.into_profiles()
}

fn progress_bar(len: u64) -> Result<ProgressBar, String> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {per_sec} ETA: {eta}",
        )
        .map_err(|e| format!("Invalid progress template: {}", e))?
        .progress_chars("#>-"),
    );
    Ok(pb)
}
