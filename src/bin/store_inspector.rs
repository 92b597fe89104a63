// store_inspector.rs - Standalone utility to inspect persisted codon-position stores

use clap::{Arg, ArgAction, Command};

use mcorr::core::codon::codons_to_bytes;
use mcorr::data::CodonPositionStore;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = Command::new("Store Inspector")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Shows metadata and codon columns of a persisted mcorr codon store")
        .arg(Arg::new("store")
            .long("store")
            .value_name("FILE")
            .help("Path to the persisted store (.lz4)")
            .required(true))
        .arg(Arg::new("position")
            .long("position")
            .value_name("CODON")
            .help("Print the codons of every strain at this codon position"))
        .arg(Arg::new("strains")
            .long("strains")
            .help("List strain names in store order")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("genes")
            .long("genes")
            .help("List gene start positions")
            .action(ArgAction::SetTrue))
        .get_matches();

    let store_path = matches
        .get_one::<String>("store")
        .ok_or("--store is required")?;

    println!("🔍 mcorr Store Inspector");
    println!("==========================");

    let metadata = CodonPositionStore::read_metadata(store_path)
        .map_err(|e| format!("Failed to read store '{}': {}", store_path, e))?;
    let compressed_size = std::fs::metadata(store_path)?.len();

    println!("=== METADATA ===");
    println!("Version: {}", metadata.version);
    println!("Created: {}", metadata.created);
    println!("Format version: {}", metadata.format_version);
    println!("Strains: {}", metadata.strain_names.len());
    println!("Codon positions: {}", metadata.num_positions);
    println!("Genes: {}", metadata.gene_starts.len());
    println!("Checksum: {:08x}", metadata.checksum);
    println!("File size: {:.2} KB", compressed_size as f64 / 1024.0);

    if matches.get_flag("strains") {
        println!();
        println!("=== STRAINS ===");
        for (i, name) in metadata.strain_names.iter().enumerate() {
            println!("{:>6}  {}", i, name);
        }
    }

    if matches.get_flag("genes") {
        println!();
        println!("=== GENE STARTS ===");
        for (i, start) in metadata.gene_starts.iter().enumerate() {
            println!("gene {:>5}: codon {}", i, start);
        }
    }

    if let Some(position) = matches.get_one::<String>("position") {
        let position: usize = position
            .parse()
            .map_err(|_| format!("Invalid codon position: {}", position))?;
        // Full load verifies the checksum and codon widths
        let store = CodonPositionStore::load(store_path)
            .map_err(|e| format!("Failed to load store '{}': {}", store_path, e))?;
        let codons = store.get(position);

        println!();
        println!("=== POSITION {} ===", position);
        if codons.is_empty() {
            println!("⚠️  Position {} is not in the store", position);
        }
        for (name, codon) in store.strain_names().iter().zip(codons) {
            println!("{:<30} {}", name, String::from_utf8_lossy(&codons_to_bytes(&[*codon])));
        }
    }

    println!();
    println!("✅ Store is readable");
    Ok(())
}
