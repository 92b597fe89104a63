// mod.rs - Result aggregation and CSV/JSON writers

use std::collections::BTreeMap;
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use indicatif::ProgressBar;
use log::{debug, warn};

use crate::core::pipeline::{CancelToken, ScanHandle};
use crate::core::results::{CorrResult, CorrResults, ResultType};

/// Ensure parent directory exists before creating file
fn ensure_parent_dir(file_path: &str) -> Result<(), String> {
    if let Some(parent) = Path::new(file_path).parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent)
                .map_err(|e| format!("Failed to create parent directory '{}': {}", parent.display(), e))?;
        }
    }
    Ok(())
}

fn create_writer(file_path: &str) -> Result<BufWriter<File>, String> {
    ensure_parent_dir(file_path)?;
    let file = File::create(file_path)
        .map_err(|e| format!("Failed to create output file '{}': {}", file_path, e))?;
    Ok(BufWriter::new(file))
}

/// Shortest round-trip float text; `NaN`, `inf` and `-inf` for non-finite values.
pub fn format_float(value: f64) -> String {
    format!("{}", value)
}

/// Collects per-unit results by key as they arrive from a scan.
///
/// Raw results can be mirrored to a JSON-lines dump before any normalisation.
pub struct ResultAggregator {
    profiles: BTreeMap<String, CorrResults>,
    json: Option<(String, BufWriter<File>)>,
    received: usize,
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self {
            profiles: BTreeMap::new(),
            json: None,
            received: 0,
        }
    }

    /// Also write every received result to `path` as one JSON object per line.
    pub fn with_json_dump(mut self, path: &str) -> Result<Self, String> {
        let writer = create_writer(path)?;
        self.json = Some((path.to_string(), writer));
        Ok(self)
    }

    pub fn add(&mut self, results: CorrResults) -> Result<(), String> {
        if let Some((path, writer)) = self.json.as_mut() {
            let line = serde_json::to_string(&results)
                .map_err(|e| format!("Failed to serialize results: {}", e))?;
            writeln!(writer, "{}", line).map_err(|e| format!("Write error on '{}': {}", path, e))?;
        }
        self.received += 1;
        self.profiles
            .entry(results.key.clone())
            .or_insert_with(|| CorrResults::new(results.key.clone()))
            .results
            .extend(results.results);
        Ok(())
    }

    /// Drain a running scan until its result channel closes or `cancel` fires.
    pub fn collect(
        &mut self,
        handle: &ScanHandle,
        cancel: &CancelToken,
        progress: Option<&ProgressBar>,
    ) -> Result<usize, String> {
        let before = self.received;
        for results in handle.results().iter() {
            if cancel.is_cancelled() {
                debug!("Aggregator stopping on cancellation");
                break;
            }
            self.add(results)?;
            if let Some(pb) = progress {
                pb.inc(1);
            }
        }
        Ok(self.received - before)
    }

    /// Number of per-unit results received so far.
    pub fn received(&self) -> usize {
        self.received
    }

    /// Profiles by key, rows ordered by lag then position.
    pub fn into_profiles(mut self) -> Result<Vec<CorrResults>, String> {
        if let Some((path, mut writer)) = self.json.take() {
            writer.flush().map_err(|e| format!("Flush error on '{}': {}", path, e))?;
            println!("📄 Raw results written to: {}", path);
        }
        let mut profiles: Vec<CorrResults> = std::mem::take(&mut self.profiles).into_values().collect();
        for profile in &mut profiles {
            profile.results.sort_by_key(|r| (r.lag, r.x.unwrap_or(0)));
        }
        Ok(profiles)
    }
}

/// Divide every non-zero lag mean by the lag-0 mean of the same profile.
///
/// A zero baseline yields `inf`/`NaN` rows. Profiles scanned without lag 0
/// have nothing to divide by and keep their raw means.
pub fn normalize(profile: &CorrResults) -> Vec<CorrResult> {
    let baseline = profile.baseline();
    if baseline.is_none() && !profile.is_empty() {
        warn!("Profile {} has no lag-0 row, writing raw means", profile.key);
    }
    profile
        .results
        .iter()
        .map(|r| {
            let mut row = r.clone();
            if let Some(ks) = baseline {
                if row.lag != 0 {
                    row.mean /= ks;
                }
            }
            row
        })
        .collect()
}

const PROFILE_PREAMBLE: &[&str] = &[
    "# l: the distance between two genomic positions",
    "# m: the mean value of the correlation profile",
    "# v: the variance of the correlation profile",
    "# n: the total number of codon pairs used for calculation",
    "# t: the type of result: Ks is for d_sample, and P2 is for correlation profile",
    "# b: the profile key (all means all strains; boot_i a bootstrap replicate; a_vs_b a strain pair)",
];

const POSITION_PREAMBLE: &[&str] = &[
    "# x: the initial position of the probability",
    "# l: the distance between two genomic positions",
    "# P11: joint probability of difference",
    "# P1a: probability of difference at site x",
    "# P1b: probability of difference at site x+l",
    "# n: the total number of seq pairs used for calculation",
    "# t: the type of result: ds is for d_sample, and Qs is for joint probability",
    "# g: the gene name",
    "# pos: position of gene on the genome",
];

fn write_preamble<W: Write>(writer: &mut W, lines: &[&str], command_line: &str) -> Result<(), String> {
    writeln!(writer, "# Command: {}", command_line).map_err(|e| format!("Write error: {}", e))?;
    writeln!(writer, "# Generated: {}", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"))
        .map_err(|e| format!("Write error: {}", e))?;
    writeln!(writer, "# mcorr v{}", env!("CARGO_PKG_VERSION")).map_err(|e| format!("Write error: {}", e))?;
    for line in lines {
        writeln!(writer, "{}", line).map_err(|e| format!("Write error: {}", e))?;
    }
    Ok(())
}

fn profile_record(row: &CorrResult, key: &str) -> [String; 6] {
    [
        row.lag.to_string(),
        format_float(row.mean),
        format_float(row.variance),
        row.n.to_string(),
        row.kind.to_string(),
        key.to_string(),
    ]
}

/// Write normalised lag profiles as `l,m,v,n,t,b`.
pub fn write_profile_csv(file_path: &str, profiles: &[CorrResults], command_line: &str) -> Result<(), String> {
    let mut writer = create_writer(file_path)?;
    write_preamble(&mut writer, PROFILE_PREAMBLE, command_line)?;

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record(["l", "m", "v", "n", "t", "b"])
        .map_err(|e| format!("Write error: {}", e))?;
    let mut rows = 0;
    for profile in profiles {
        for row in normalize(profile) {
            csv_writer
                .write_record(profile_record(&row, &profile.key))
                .map_err(|e| format!("Write error: {}", e))?;
            rows += 1;
        }
    }
    csv_writer.flush().map_err(|e| format!("Flush error: {}", e))?;
    println!("✅ Correlation profile written to: {} ({} rows)", file_path, rows);
    Ok(())
}

/// Write strain-pair profiles; a pair's rows stop after a zero Ks.
pub fn write_pairs_csv(file_path: &str, profiles: &[CorrResults], command_line: &str) -> Result<(), String> {
    let mut writer = create_writer(file_path)?;
    write_preamble(&mut writer, PROFILE_PREAMBLE, command_line)?;

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record(["l", "m", "v", "n", "t", "b"])
        .map_err(|e| format!("Write error: {}", e))?;
    let mut rows = 0;
    for profile in profiles {
        for row in pair_rows(profile) {
            csv_writer
                .write_record(profile_record(&row, &profile.key))
                .map_err(|e| format!("Write error: {}", e))?;
            rows += 1;
        }
    }
    csv_writer.flush().map_err(|e| format!("Flush error: {}", e))?;
    println!("✅ Pair profiles written to: {} ({} rows)", file_path, rows);
    Ok(())
}

/// Normalised rows of one pair, truncated right after a zero Ks row.
pub fn pair_rows(profile: &CorrResults) -> Vec<CorrResult> {
    let mut rows = Vec::new();
    for row in normalize(profile) {
        let stop = row.kind == ResultType::Ks && row.mean == 0.0;
        rows.push(row);
        if stop {
            break;
        }
    }
    rows
}

/// Write per-position rows as `x,l,P11,P1a,P1b,n,t,g,pos`.
pub fn write_positions_csv(file_path: &str, profiles: &[CorrResults], command_line: &str) -> Result<(), String> {
    let mut writer = create_writer(file_path)?;
    write_preamble(&mut writer, POSITION_PREAMBLE, command_line)?;

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record(["x", "l", "P11", "P1a", "P1b", "n", "t", "g", "pos"])
        .map_err(|e| format!("Write error: {}", e))?;
    let mut rows = 0;
    for profile in profiles {
        for row in &profile.results {
            csv_writer
                .write_record([
                    row.x.unwrap_or(0).to_string(),
                    row.lag.to_string(),
                    format_float(row.mean),
                    format_float(row.p1a.unwrap_or(f64::NAN)),
                    format_float(row.p1b.unwrap_or(f64::NAN)),
                    row.n.to_string(),
                    row.kind.to_string(),
                    "all CDS".to_string(),
                    "n/a".to_string(),
                ])
                .map_err(|e| format!("Write error: {}", e))?;
            rows += 1;
        }
    }
    csv_writer.flush().map_err(|e| format!("Flush error: {}", e))?;
    println!("✅ Per-position profile written to: {} ({} rows)", file_path, rows);
    Ok(())
}
