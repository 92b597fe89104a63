// alignment.rs - XMFA alignment reader and gap filtering

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use bio::io::fasta;
use log::{debug, warn};
use regex::Regex;

use crate::error::{McorrError, Result};

/// One aligned sequence of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub gene_id: String,
    pub strain: String,
    pub seq: Vec<u8>,
}

/// One gene: aligned, equal-length sequences of several strains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentBlock {
    pub id: String,
    /// Genomic start/stop parsed from the `start+stop` header term.
    pub coordinates: Option<(usize, usize)>,
    pub records: Vec<SequenceRecord>,
}

impl AlignmentBlock {
    pub fn start(&self) -> Option<usize> {
        self.coordinates.map(|(start, _)| start)
    }

    /// Number of codon positions the block spans.
    ///
    /// Taken from the coordinates when present, otherwise from the longest record.
    pub fn codon_length(&self, codon_offset: usize) -> usize {
        match self.coordinates {
            Some((start, stop)) if stop >= start => (stop - start + 1) / 3,
            _ => self
                .records
                .iter()
                .map(|r| r.seq.len().saturating_sub(codon_offset) / 3)
                .max()
                .unwrap_or(0),
        }
    }
}

/// Outcome of a gap filter pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GapFilterReport {
    pub kept: usize,
    pub dropped: usize,
    pub filled: usize,
}

/// Blocks of an XMFA file, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alignment {
    pub blocks: Vec<AlignmentBlock>,
}

/// Parser for `>geneID start+stop strainName ...` headers.
struct HeaderParser {
    coords: Regex,
}

impl HeaderParser {
    fn new() -> Result<Self> {
        let coords = Regex::new(r"^(\d+)\+(\d+)$")
            .map_err(|e| McorrError::MalformedAlignment(format!("coordinate pattern: {}", e)))?;
        Ok(Self { coords })
    }

    fn coordinates(&self, desc: Option<&str>) -> Option<(usize, usize)> {
        let term = desc?.split_whitespace().next()?;
        let caps = self.coords.captures(term)?;
        let start = caps.get(1)?.as_str().parse().ok()?;
        let stop = caps.get(2)?.as_str().parse().ok()?;
        Some((start, stop))
    }

    /// Third header term, falling back to the record id.
    fn strain(&self, id: &str, desc: Option<&str>) -> String {
        desc.and_then(|d| d.split_whitespace().nth(1))
            .unwrap_or(id)
            .to_string()
    }
}

impl Alignment {
    /// Read an XMFA file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let alignment = Self::from_reader(BufReader::new(file), &path.display().to_string())?;
        if alignment.blocks.is_empty() {
            return Err(McorrError::EmptyAlignment(path.display().to_string()));
        }
        Ok(alignment)
    }

    /// Parse XMFA text; blocks end at lines starting with `=`.
    pub fn from_reader<R: BufRead>(reader: R, source: &str) -> Result<Self> {
        let parser = HeaderParser::new()?;
        let mut blocks = Vec::new();
        let mut buffer = String::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                McorrError::MalformedAlignment(format!("{} line {}: {}", source, line_num + 1, e))
            })?;
            if line.starts_with('=') {
                if let Some(block) = parse_block(&parser, &buffer, source)? {
                    blocks.push(block);
                }
                buffer.clear();
            } else {
                buffer.push_str(&line);
                buffer.push('\n');
            }
        }
        if let Some(block) = parse_block(&parser, &buffer, source)? {
            blocks.push(block);
        }

        debug!("Read {} alignment blocks from {}", blocks.len(), source);
        Ok(Self { blocks })
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Order blocks by genomic start; blocks without coordinates keep file order at the end.
    pub fn sort_by_start(&mut self) {
        self.blocks
            .sort_by_key(|b| (b.start().is_none(), b.start().unwrap_or(0)));
    }

    /// Pool the strains of a mate alignment into the matching blocks.
    ///
    /// Blocks are matched by start coordinate, or by gene id when coordinates are missing.
    pub fn pool_with(&mut self, mate: Alignment) {
        let mut by_start: HashMap<usize, AlignmentBlock> = HashMap::new();
        let mut by_id: HashMap<String, AlignmentBlock> = HashMap::new();
        for block in mate.blocks {
            match block.start() {
                Some(start) => {
                    by_start.insert(start, block);
                }
                None => {
                    by_id.insert(block.id.clone(), block);
                }
            }
        }
        for block in &mut self.blocks {
            let mate_block = match block.start() {
                Some(start) => by_start.remove(&start),
                None => by_id.remove(&block.id),
            };
            match mate_block {
                Some(m) => block.records.extend(m.records),
                None => warn!("No mate block for gene {}", block.id),
            }
        }
    }

    /// Drop records whose gap/N fraction exceeds `max_fraction`, or with `fill`
    /// replace them with an all-gap sequence of the same length.
    pub fn filter_gaps(&mut self, max_fraction: f64, fill: bool) -> GapFilterReport {
        let mut report = GapFilterReport::default();
        for block in &mut self.blocks {
            let mut records = Vec::with_capacity(block.records.len());
            for mut record in block.records.drain(..) {
                if gap_fraction(&record.seq) <= max_fraction {
                    report.kept += 1;
                    records.push(record);
                } else if fill {
                    record.seq.iter_mut().for_each(|b| *b = b'-');
                    report.filled += 1;
                    records.push(record);
                } else {
                    report.dropped += 1;
                }
            }
            block.records = records;
        }
        self.blocks.retain(|b| !b.records.is_empty());
        report
    }
}

fn parse_block(parser: &HeaderParser, text: &str, source: &str) -> Result<Option<AlignmentBlock>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let reader = fasta::Reader::new(text.as_bytes());
    let mut records = Vec::new();
    let mut coordinates = None;
    let mut id = String::new();

    for record_result in reader.records() {
        let record = record_result
            .map_err(|e| McorrError::MalformedAlignment(format!("{}: {}", source, e)))?;
        if records.is_empty() {
            id = record.id().to_string();
            coordinates = parser.coordinates(record.desc());
        }
        records.push(SequenceRecord {
            gene_id: record.id().to_string(),
            strain: parser.strain(record.id(), record.desc()),
            seq: record.seq().to_ascii_uppercase(),
        });
    }

    if records.is_empty() {
        return Ok(None);
    }
    Ok(Some(AlignmentBlock {
        id,
        coordinates,
        records,
    }))
}

/// Fraction of `-` and `N` symbols in a sequence.
pub fn gap_fraction(seq: &[u8]) -> f64 {
    if seq.is_empty() {
        return 0.0;
    }
    let gaps = seq.iter().filter(|&&b| b == b'-' || b == b'N').count();
    gaps as f64 / seq.len() as f64
}
