// store.rs - Codon-position store: build, random access and persistence

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::calculator::CodonSource;
use crate::core::codon::{
    bytes_to_codons, codons_to_bytes, extract_codons, Codon, CodonPair, CodonSequence, StrainCodons, GAP_CODON,
};
use crate::data::alignment::{Alignment, AlignmentBlock};
use crate::error::{McorrError, Result};

/// Current on-disk layout of a persisted store.
pub const STORE_FORMAT_VERSION: u32 = 1;

/// Per-strain codons of one alignment block, keyed by disambiguated strain name.
#[derive(Debug, Default)]
pub struct StrainAccumulator {
    codons: HashMap<String, CodonSequence>,
    /// Names in record order of the block.
    order: Vec<String>,
}

#[derive(Default)]
struct AccumulatorState {
    codons: HashMap<String, CodonSequence>,
    duplicates: HashMap<String, usize>,
    names: Vec<Option<String>>,
}

impl StrainAccumulator {
    /// Extract codons of every record in parallel.
    ///
    /// Repeated strain labels get `_1`, `_2`, ... suffixes in arrival order.
    pub fn build_from(block: &AlignmentBlock, codon_offset: usize) -> Self {
        let state = Mutex::new(AccumulatorState {
            names: vec![None; block.records.len()],
            ..AccumulatorState::default()
        });

        block.records.par_iter().enumerate().for_each(|(idx, record)| {
            let codons = extract_codons(&record.seq, codon_offset);
            let mut guard = match state.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let seen = guard.duplicates.entry(record.strain.clone()).or_insert(0);
            let name = if *seen == 0 {
                record.strain.clone()
            } else {
                format!("{}_{}", record.strain, seen)
            };
            *seen += 1;
            guard.codons.entry(name.clone()).or_default().extend(codons);
            guard.names[idx] = Some(name);
        });

        let state = match state.into_inner() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        Self {
            codons: state.codons,
            order: state.names.into_iter().flatten().collect(),
        }
    }

    pub fn strain_names(&self) -> &[String] {
        &self.order
    }

    pub fn codons(&self, strain: &str) -> Option<&[Codon]> {
        self.codons.get(strain).map(|c| c.as_slice())
    }

    /// Absolute codon position to per-strain codons, strains in `strain_order`.
    ///
    /// Strains absent from this block contribute gap codons.
    pub fn materialize_at(&self, start_codon: usize, strain_order: &[String]) -> BTreeMap<usize, Vec<Codon>> {
        let length = self.codons.values().map(|c| c.len()).max().unwrap_or(0);
        let mut positions: BTreeMap<usize, Vec<Codon>> = BTreeMap::new();
        for k in 0..length {
            let column = strain_order
                .iter()
                .map(|strain| {
                    self.codons
                        .get(strain)
                        .and_then(|c| c.get(k))
                        .copied()
                        .unwrap_or(GAP_CODON)
                })
                .collect();
            positions.insert(start_codon + k, column);
        }
        positions
    }
}

/// Metadata saved next to the codon payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub version: String,
    pub created: String,
    pub format_version: u32,
    pub strain_names: Vec<String>,
    pub num_positions: usize,
    pub gene_starts: Vec<usize>,
    pub checksum: u32,
}

#[derive(Serialize, Deserialize)]
struct PersistedStore {
    metadata: StoreMetadata,
    data: BTreeMap<String, Vec<u8>>,
}

/// Codon position to one codon per strain, in a strain order fixed at build time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodonPositionStore {
    strain_names: Vec<String>,
    entries: BTreeMap<usize, Vec<Codon>>,
    gene_starts: Vec<usize>,
}

impl CodonPositionStore {
    pub fn new(strain_names: Vec<String>) -> Self {
        Self {
            strain_names,
            entries: BTreeMap::new(),
            gene_starts: Vec::new(),
        }
    }

    /// Build from every block of an alignment, concatenated in genomic order.
    pub fn build_from(alignment: &Alignment, codon_offset: usize) -> Result<Self> {
        let mut blocks: Vec<&AlignmentBlock> = alignment.blocks.iter().collect();
        blocks.sort_by_key(|b| (b.start().is_none(), b.start().unwrap_or(0)));

        let mut store = CodonPositionStore::default();
        let mut start_codon = 0;
        for (i, block) in blocks.iter().enumerate() {
            let acc = StrainAccumulator::build_from(block, codon_offset);
            if i == 0 {
                store.strain_names = acc.strain_names().to_vec();
            } else {
                for strain in acc.strain_names() {
                    if !store.strain_names.contains(strain) {
                        warn!("Strain {} not in first gene, ignored in {}", strain, block.id);
                    }
                }
            }
            let positions = acc.materialize_at(start_codon, &store.strain_names);
            let span = block.codon_length(codon_offset);
            if positions.len() > span {
                warn!(
                    "Gene {} aligns to {} codons, longer than its {} codon header span",
                    block.id,
                    positions.len(),
                    span
                );
            }
            store.gene_starts.push(start_codon);
            debug!("Gene {} starts at codon {}", block.id, start_codon);
            // The next gene starts after every codon this one wrote
            start_codon += span.max(positions.len());
            store.entries.extend(positions);
        }

        if store.strain_names.is_empty() {
            return Err(McorrError::EmptyAlignment("no sequences in alignment".to_string()));
        }
        info!(
            "Built codon store: {} strains, {} positions, {} genes",
            store.strain_names.len(),
            store.entries.len(),
            store.gene_starts.len()
        );
        Ok(store)
    }

    pub fn put(&mut self, position: usize, codons: Vec<Codon>) {
        self.entries.insert(position, codons);
    }

    /// Codons at a position; empty when the position is unknown.
    pub fn get(&self, position: usize) -> &[Codon] {
        self.entries.get(&position).map(|c| c.as_slice()).unwrap_or(&[])
    }

    pub fn strain_names(&self) -> &[String] {
        &self.strain_names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored positions in ascending order.
    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.keys().copied()
    }

    /// Starting codon index of every gene.
    pub fn gene_starts(&self) -> &[usize] {
        &self.gene_starts
    }

    /// Per-strain codon sequences over all stored positions.
    pub fn to_strain_codons(&self) -> StrainCodons {
        let mut strains = StrainCodons::new();
        for (s, name) in self.strain_names.iter().enumerate() {
            let codons = self
                .entries
                .values()
                .map(|column| column.get(s).copied().unwrap_or(GAP_CODON))
                .collect();
            strains.push(name.clone(), codons);
        }
        strains
    }

    fn payload(&self) -> BTreeMap<String, Vec<u8>> {
        self.entries
            .iter()
            .map(|(pos, codons)| (pos.to_string(), codons_to_bytes(codons)))
            .collect()
    }

    /// Persist as LZ4-compressed bincode with metadata and CRC32 checksum.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        println!("💾 Saving codon store to {}...", path.display());
        let start = Instant::now();

        let data = self.payload();
        let checksum = checksum(&data)?;
        let metadata = StoreMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            created: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            format_version: STORE_FORMAT_VERSION,
            strain_names: self.strain_names.clone(),
            num_positions: self.entries.len(),
            gene_starts: self.gene_starts.clone(),
            checksum,
        };
        let encoded = bincode::serialize(&PersistedStore { metadata, data })
            .map_err(|e| McorrError::MalformedStore(format!("failed to serialize: {}", e)))?;
        let compressed = lz4_flex::compress_prepend_size(&encoded);
        fs::write(path, &compressed)?;

        println!(
            "✅ Store saved in {:.2}s ({} positions, {} KB)",
            start.elapsed().as_secs_f64(),
            self.entries.len(),
            compressed.len() / 1024
        );
        Ok(())
    }

    /// Load a persisted store, verifying checksum and codon widths.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        println!("📂 Loading codon store from {}...", path.display());
        let (metadata, data) = read_persisted(path)?;

        let mut entries = BTreeMap::new();
        for (key, bytes) in data {
            let position: usize = key
                .parse()
                .map_err(|_| McorrError::MalformedStore(format!("invalid position key '{}'", key)))?;
            if bytes.len() % 3 != 0 {
                return Err(McorrError::MalformedStore(format!(
                    "position {} holds {} bytes, not a multiple of 3",
                    position,
                    bytes.len()
                )));
            }
            let codons = bytes_to_codons(&bytes);
            if codons.len() != metadata.strain_names.len() {
                return Err(McorrError::MalformedStore(format!(
                    "position {} holds {} codons for {} strains",
                    position,
                    codons.len(),
                    metadata.strain_names.len()
                )));
            }
            entries.insert(position, codons);
        }

        println!(
            "✅ Loaded {} positions for {} strains (created {})",
            entries.len(),
            metadata.strain_names.len(),
            metadata.created
        );
        Ok(Self {
            strain_names: metadata.strain_names,
            entries,
            gene_starts: metadata.gene_starts,
        })
    }

    /// Read only the metadata of a persisted store.
    pub fn read_metadata<P: AsRef<Path>>(path: P) -> Result<StoreMetadata> {
        read_persisted(path.as_ref()).map(|(metadata, _)| metadata)
    }

    /// Write the gene start list, one codon index per line.
    pub fn write_gene_starts<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = fs::File::create(path)?;
        for start in &self.gene_starts {
            writeln!(file, "{}", start)?;
        }
        Ok(())
    }
}

fn checksum(data: &BTreeMap<String, Vec<u8>>) -> Result<u32> {
    let bytes = bincode::serialize(data)
        .map_err(|e| McorrError::MalformedStore(format!("failed to serialize payload: {}", e)))?;
    Ok(crc32fast::hash(&bytes))
}

fn read_persisted(path: &Path) -> Result<(StoreMetadata, BTreeMap<String, Vec<u8>>)> {
    let compressed = fs::read(path)?;
    let decompressed = lz4_flex::decompress_size_prepended(&compressed)
        .map_err(|e| McorrError::MalformedStore(format!("failed to decompress {}: {}", path.display(), e)))?;
    let persisted: PersistedStore = bincode::deserialize(&decompressed)
        .map_err(|e| McorrError::MalformedStore(format!("failed to decode {}: {}", path.display(), e)))?;

    if persisted.metadata.format_version != STORE_FORMAT_VERSION {
        return Err(McorrError::MalformedStore(format!(
            "unsupported format version {} (expected {})",
            persisted.metadata.format_version, STORE_FORMAT_VERSION
        )));
    }
    let actual = checksum(&persisted.data)?;
    if actual != persisted.metadata.checksum {
        return Err(McorrError::MalformedStore(format!(
            "checksum mismatch: stored {:08x}, computed {:08x}",
            persisted.metadata.checksum, actual
        )));
    }
    Ok((persisted.metadata, persisted.data))
}

impl CodonSource for CodonPositionStore {
    fn num_positions(&self) -> usize {
        self.entries.keys().next_back().map(|&last| last + 1).unwrap_or(0)
    }

    fn codon_pairs(&self, i: usize, j: usize) -> Vec<CodonPair> {
        self.get(i)
            .iter()
            .zip(self.get(j).iter())
            .map(|(&a, &b)| CodonPair::new(a, b))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn alignment(text: &str) -> Alignment {
        Alignment::from_reader(Cursor::new(text), "test").unwrap()
    }

    const TWO_GENES: &str = ">g2 10+15 s1\nGGGTTT\n>g2 10+15 s2\nGGATTA\n=\n\
>g1 1+6 s1\nATGAAA\n>g1 1+6 s2\nATGAAG\n>g1 1+6 s3\nATGCCC\n=\n";

    #[test]
    fn test_accumulator_duplicate_suffixes() {
        let aln = alignment(">g 1+3 a\nATG\n>g 1+3 a\nATA\n>g 1+3 a\nATC\n>g 1+3 b\nTTT\n");
        let acc = StrainAccumulator::build_from(&aln.blocks[0], 0);

        let mut names = acc.strain_names().to_vec();
        names.sort();
        assert_eq!(names, vec!["a", "a_1", "a_2", "b"]);
        assert_eq!(acc.codons("b"), Some(&[*b"TTT"][..]));
    }

    #[test]
    fn test_materialize_fills_missing_strains() {
        let aln = alignment(">g 1+6 a\nATGAAA\n");
        let acc = StrainAccumulator::build_from(&aln.blocks[0], 0);
        let order = vec!["a".to_string(), "missing".to_string()];
        let positions = acc.materialize_at(10, &order);

        assert_eq!(positions.keys().copied().collect::<Vec<_>>(), vec![10, 11]);
        assert_eq!(positions[&11], vec![*b"AAA", GAP_CODON]);
    }

    #[test]
    fn test_build_concatenates_genes_in_genomic_order() {
        let store = CodonPositionStore::build_from(&alignment(TWO_GENES), 0).unwrap();

        assert_eq!(store.strain_names(), &["s1", "s2", "s3"]);
        assert_eq!(store.gene_starts(), &[0, 2]);
        assert_eq!(store.len(), 4);
        assert_eq!(store.get(1), &[*b"AAA", *b"AAG", *b"CCC"]);
        // s3 is absent from the second gene
        assert_eq!(store.get(3), &[*b"TTT", *b"TTA", GAP_CODON]);
        assert!(store.get(99).is_empty());
        assert_eq!(store.positions().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_gene_longer_than_header_span_keeps_codons() {
        // g1 spans 2 codons by header but 3 once gap columns are aligned in
        let aln = alignment(
            ">g1 1+6 s1\nATG---AAA\n>g1 1+6 s2\nATG---AAG\n=\n\
             >g2 10+15 s1\nGGGTTT\n>g2 10+15 s2\nGGATTA\n=\n",
        );
        let store = CodonPositionStore::build_from(&aln, 0).unwrap();

        assert_eq!(store.gene_starts(), &[0, 3]);
        assert_eq!(store.len(), 5);
        assert_eq!(store.get(2), &[*b"AAA", *b"AAG"]);
        assert_eq!(store.get(3), &[*b"GGG", *b"GGA"]);
        assert_eq!(store.get(4), &[*b"TTT", *b"TTA"]);
    }

    #[test]
    fn test_put_get_preserves_strain_order() {
        let mut store = CodonPositionStore::new(vec!["x".to_string(), "y".to_string()]);
        store.put(5, vec![*b"ATG", *b"CTG"]);
        assert_eq!(store.get(5), &[*b"ATG", *b"CTG"]);
        assert_eq!(store.num_positions(), 6);

        let pairs = store.codon_pairs(5, 5);
        assert_eq!(pairs[1], CodonPair::new(*b"CTG", *b"CTG"));
    }

    #[test]
    fn test_persisted_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codons.lz4");
        let store = CodonPositionStore::build_from(&alignment(TWO_GENES), 0).unwrap();
        store.save(&path).unwrap();

        let loaded = CodonPositionStore::load(&path).unwrap();
        assert_eq!(loaded, store);

        let metadata = CodonPositionStore::read_metadata(&path).unwrap();
        assert_eq!(metadata.num_positions, 4);
        assert_eq!(metadata.format_version, STORE_FORMAT_VERSION);
    }

    #[test]
    fn test_truncated_store_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codons.lz4");
        let store = CodonPositionStore::build_from(&alignment(TWO_GENES), 0).unwrap();
        store.save(&path).unwrap();

        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
        assert!(matches!(
            CodonPositionStore::load(&path),
            Err(McorrError::MalformedStore(_))
        ));
    }

    #[test]
    fn test_bad_codon_width_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codons.lz4");
        let mut data = BTreeMap::new();
        data.insert("0".to_string(), b"ATGA".to_vec());
        let metadata = StoreMetadata {
            version: "test".to_string(),
            created: "now".to_string(),
            format_version: STORE_FORMAT_VERSION,
            strain_names: vec!["a".to_string()],
            num_positions: 1,
            gene_starts: vec![0],
            checksum: checksum(&data).unwrap(),
        };
        let encoded = bincode::serialize(&PersistedStore { metadata, data }).unwrap();
        fs::write(&path, lz4_flex::compress_prepend_size(&encoded)).unwrap();

        assert!(matches!(
            CodonPositionStore::load(&path),
            Err(McorrError::MalformedStore(_))
        ));
    }

    #[test]
    fn test_checksum_mismatch_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codons.lz4");
        let mut data = BTreeMap::new();
        data.insert("0".to_string(), b"ATG".to_vec());
        let metadata = StoreMetadata {
            version: "test".to_string(),
            created: "now".to_string(),
            format_version: STORE_FORMAT_VERSION,
            strain_names: vec!["a".to_string()],
            num_positions: 1,
            gene_starts: vec![0],
            checksum: 42,
        };
        let encoded = bincode::serialize(&PersistedStore { metadata, data }).unwrap();
        fs::write(&path, lz4_flex::compress_prepend_size(&encoded)).unwrap();

        assert!(matches!(
            CodonPositionStore::load(&path),
            Err(McorrError::MalformedStore(_))
        ));
    }

    #[test]
    fn test_gene_start_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genes.txt");
        let store = CodonPositionStore::build_from(&alignment(TWO_GENES), 0).unwrap();
        store.write_gene_starts(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "0\n2\n");
    }

    #[test]
    fn test_to_strain_codons() {
        let store = CodonPositionStore::build_from(&alignment(TWO_GENES), 0).unwrap();
        let strains = store.to_strain_codons();
        assert_eq!(strains.len(), 3);
        assert_eq!(strains.name(2), "s3");
        assert_eq!(strains.sequence(2), &[*b"ATG", *b"CCC", GAP_CODON, GAP_CODON]);
    }
}
