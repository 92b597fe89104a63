// codon.rs - Codons, codon extraction and the bacterial genetic code

use serde::{Deserialize, Serialize};

/// A three-nucleotide unit of a coding sequence.
pub type Codon = [u8; 3];

/// Ordered codons of one strain; index = codon position.
pub type CodonSequence = Vec<Codon>;

/// Codon used to pad strains that are absent from a gene block.
pub const GAP_CODON: Codon = [b'-', b'-', b'-'];

/// Nucleotide alphabet used by the doublet matrices.
pub const NUCLEOTIDES: &[u8] = b"ATGC";

/// Two codons from sites i and i+lag of the same strain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodonPair {
    pub a: Codon,
    pub b: Codon,
}

impl CodonPair {
    pub fn new(a: Codon, b: Codon) -> Self {
        Self { a, b }
    }

    /// True when either codon holds a gap or an ambiguous base.
    pub fn has_gap(&self) -> bool {
        is_gapped(&self.a) || is_gapped(&self.b)
    }
}

pub fn is_gapped(codon: &Codon) -> bool {
    codon.iter().any(|&b| b == b'-' || b == b'N')
}

/// Split a nucleotide sequence into codons, starting at `offset`.
/// A trailing partial codon is dropped.
pub fn extract_codons(seq: &[u8], offset: usize) -> CodonSequence {
    if offset >= seq.len() {
        return Vec::new();
    }
    seq[offset..]
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect()
}

/// Flatten codons into raw bytes, 3 bytes per codon, no separators.
pub fn codons_to_bytes(codons: &[Codon]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(codons.len() * 3);
    for codon in codons {
        bytes.extend_from_slice(codon);
    }
    bytes
}

/// Inverse of [`codons_to_bytes`]; trailing bytes that do not form a full codon are ignored.
pub fn bytes_to_codons(bytes: &[u8]) -> Vec<Codon> {
    bytes
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect()
}

/// Codon sequences of a set of named strains, in a fixed strain order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrainCodons {
    names: Vec<String>,
    sequences: Vec<CodonSequence>,
}

impl StrainCodons {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract codons from raw `(name, sequence)` records.
    pub fn from_sequences<'a, I>(records: I, offset: usize) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let mut strains = Self::new();
        for (name, seq) in records {
            strains.push(name, extract_codons(seq, offset));
        }
        strains
    }

    pub fn push(&mut self, name: impl Into<String>, codons: CodonSequence) {
        self.names.push(name.into());
        self.sequences.push(codons);
    }

    /// Append the strains of `other` after the current ones.
    pub fn extend(&mut self, other: StrainCodons) {
        self.names.extend(other.names);
        self.sequences.extend(other.sequences);
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn sequences(&self) -> &[CodonSequence] {
        &self.sequences
    }

    pub fn name(&self, idx: usize) -> &str {
        &self.names[idx]
    }

    pub fn sequence(&self, idx: usize) -> &[Codon] {
        &self.sequences[idx]
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Codon positions of the first strain; the shared position domain.
    pub fn num_positions(&self) -> usize {
        self.sequences.first().map(|s| s.len()).unwrap_or(0)
    }
}

// Codon order: AAA, AAC, AAG, AAT, ACA, ... , TTT (A=0, C=1, G=2, T=3)
const TABLE11_AA: [u8; 64] = [
    b'K', b'N', b'K', b'N', b'T', b'T', b'T', b'T', b'R', b'S', b'R', b'S',
    b'I', b'I', b'M', b'I', b'Q', b'H', b'Q', b'H', b'P', b'P', b'P', b'P',
    b'R', b'R', b'R', b'R', b'L', b'L', b'L', b'L', b'E', b'D', b'E', b'D',
    b'A', b'A', b'A', b'A', b'G', b'G', b'G', b'G', b'V', b'V', b'V', b'V',
    b'*', b'Y', b'*', b'Y', b'S', b'S', b'S', b'S', b'*', b'C', b'W', b'C',
    b'L', b'F', b'L', b'F',
];

/// Amino acid assigned to codons that are not in the table.
pub const UNKNOWN_AMINO_ACID: u8 = b'X';

fn base_index(b: u8) -> Option<usize> {
    match b {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

/// Codon translation table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneticCode {
    pub id: u8,
    pub name: String,
    table: Vec<u8>,
}

impl GeneticCode {
    /// NCBI table 11: bacterial, archaeal and plant plastid code.
    pub fn bacterial() -> Self {
        Self {
            id: 11,
            name: "Bacterial, Archaeal and Plant Plastid".to_string(),
            table: TABLE11_AA.to_vec(),
        }
    }

    /// Look up a genetic code by its NCBI identifier.
    pub fn from_id(id: u8) -> Result<Self, String> {
        match id {
            11 => Ok(Self::bacterial()),
            _ => Err(format!("Unsupported genetic code table: {} (available: 11)", id)),
        }
    }

    /// Translate a codon, `None` when it holds a base outside ACGT.
    pub fn translate(&self, codon: &Codon) -> Option<u8> {
        let idx = base_index(codon[0])? * 16 + base_index(codon[1])? * 4 + base_index(codon[2])?;
        Some(self.table[idx])
    }

    /// Translate, mapping untranslatable codons to [`UNKNOWN_AMINO_ACID`].
    pub fn translate_or_unknown(&self, codon: &Codon) -> u8 {
        self.translate(codon).unwrap_or(UNKNOWN_AMINO_ACID)
    }

    /// Ordered amino-acid pair of a codon pair.
    pub fn translate_pair(&self, pair: &CodonPair) -> [u8; 2] {
        [self.translate_or_unknown(&pair.a), self.translate_or_unknown(&pair.b)]
    }
}

impl Default for GeneticCode {
    fn default() -> Self {
        Self::bacterial()
    }
}
