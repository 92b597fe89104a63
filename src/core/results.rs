// results.rs - Correlation result records

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of statistic a result row carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultType {
    /// Lag-0 baseline (synonymous diversity).
    Ks,
    /// Joint probability of difference at lag > 0.
    P2,
    /// Per-position joint probability at lag > 0.
    Qs,
    /// Per-position lag-0 baseline (d_sample).
    #[serde(rename = "ds")]
    Ds,
}

impl ResultType {
    /// Tag for profile rows: `Ks` at lag 0, `P2` otherwise.
    pub fn for_profile_lag(lag: usize) -> Self {
        if lag == 0 {
            ResultType::Ks
        } else {
            ResultType::P2
        }
    }

    /// Tag for per-position rows: `ds` at lag 0, `Qs` otherwise.
    pub fn for_position_lag(lag: usize) -> Self {
        if lag == 0 {
            ResultType::Ds
        } else {
            ResultType::Qs
        }
    }

    pub fn is_baseline(&self) -> bool {
        matches!(self, ResultType::Ks | ResultType::Ds)
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ResultType::Ks => "Ks",
            ResultType::P2 => "P2",
            ResultType::Qs => "Qs",
            ResultType::Ds => "ds",
        };
        write!(f, "{}", tag)
    }
}

/// One correlation statistic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrResult {
    /// Distance between the two sites in nucleotides.
    pub lag: usize,
    /// First site in nucleotides, per-position scans only.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub x: Option<usize>,
    pub mean: f64,
    pub variance: f64,
    pub n: usize,
    #[serde(rename = "type")]
    pub kind: ResultType,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub p1a: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub p1b: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub key: Option<String>,
}

impl CorrResult {
    /// Lag-profile row; `lag` in nucleotides.
    pub fn profile(lag: usize, mean: f64, n: usize) -> Self {
        Self {
            lag,
            x: None,
            mean,
            variance: 0.0,
            n,
            kind: ResultType::for_profile_lag(lag),
            p1a: None,
            p1b: None,
            key: None,
        }
    }

    /// Per-position row with marginal difference probabilities.
    pub fn position(x: usize, lag: usize, mean: f64, p1a: f64, p1b: f64, n: usize) -> Self {
        Self {
            lag,
            x: Some(x),
            mean,
            variance: 0.0,
            n,
            kind: ResultType::for_position_lag(lag),
            p1a: Some(p1a),
            p1b: Some(p1b),
            key: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// Ordered results of one profile (strain pair, bootstrap replicate or `all`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrResults {
    pub key: String,
    pub results: Vec<CorrResult>,
}

impl CorrResults {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            results: Vec::new(),
        }
    }

    /// Mean of the lag-0 baseline row, if present.
    pub fn baseline(&self) -> Option<f64> {
        self.results
            .iter()
            .find(|r| r.lag == 0 && r.kind.is_baseline())
            .map(|r| r.mean)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_type_tags() {
        assert_eq!(ResultType::for_profile_lag(0), ResultType::Ks);
        assert_eq!(ResultType::for_profile_lag(3), ResultType::P2);
        assert_eq!(ResultType::for_position_lag(0).to_string(), "ds");
        assert_eq!(ResultType::for_position_lag(6).to_string(), "Qs");
    }

    #[test]
    fn test_baseline_lookup() {
        let mut profile = CorrResults::new("all");
        profile.results.push(CorrResult::profile(3, 0.1, 10));
        assert_eq!(profile.baseline(), None);

        profile.results.push(CorrResult::profile(0, 0.25, 12));
        assert_eq!(profile.baseline(), Some(0.25));
        assert_eq!(profile.len(), 2);
    }

    #[test]
    fn test_json_shape() {
        let row = CorrResult::profile(0, 0.5, 4).with_key("a_vs_b");
        let json = serde_json::to_string(&row).unwrap();
        assert!(json.contains("\"type\":\"Ks\""));
        assert!(json.contains("\"key\":\"a_vs_b\""));
        assert!(!json.contains("p1a"));

        let ds = CorrResult::position(0, 0, 0.1, 0.2, 0.3, 5);
        assert!(serde_json::to_string(&ds).unwrap().contains("\"type\":\"ds\""));
    }
}
