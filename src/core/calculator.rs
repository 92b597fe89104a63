// calculator.rs - Per-unit correlation computations for every scan variant

use std::ops::Range;

use log::trace;

use crate::core::codon::{Codon, CodonPair, GeneticCode, StrainCodons, NUCLEOTIDES};
use crate::core::nucl_cov::{ratio, NuclCov};
use crate::core::results::{CorrResult, CorrResults};
use crate::core::synonymous::SynonymousGrouper;

/// Position-indexed codon data a scan reads from.
///
/// Implementations must list strains in the same order for every position.
pub trait CodonSource: Send + Sync {
    /// Number of codon positions in the shared position domain.
    fn num_positions(&self) -> usize;

    /// Codon pairs `(codon at i, codon at j)` of every strain covering both sites.
    fn codon_pairs(&self, i: usize, j: usize) -> Vec<CodonPair>;
}

impl CodonSource for StrainCodons {
    fn num_positions(&self) -> usize {
        StrainCodons::num_positions(self)
    }

    fn codon_pairs(&self, i: usize, j: usize) -> Vec<CodonPair> {
        self.sequences()
            .iter()
            .filter(|seq| i < seq.len() && j < seq.len())
            .map(|seq| CodonPair::new(seq[i], seq[j]))
            .collect()
    }
}

/// Strains of a base collection picked by index, repeats allowed.
pub struct Resampled<'a> {
    base: &'a StrainCodons,
    picks: &'a [usize],
}

impl<'a> Resampled<'a> {
    pub fn new(base: &'a StrainCodons, picks: &'a [usize]) -> Self {
        Self { base, picks }
    }
}

impl CodonSource for Resampled<'_> {
    fn num_positions(&self) -> usize {
        self.picks
            .first()
            .map(|&idx| self.base.sequence(idx).len())
            .unwrap_or(0)
    }

    fn codon_pairs(&self, i: usize, j: usize) -> Vec<CodonPair> {
        self.picks
            .iter()
            .map(|&idx| self.base.sequence(idx))
            .filter(|seq| i < seq.len() && j < seq.len())
            .map(|seq| CodonPair::new(seq[i], seq[j]))
            .collect()
    }
}

/// Parameters shared by all computations of a scan.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub synonymous: bool,
    /// Zero-based nucleotide within the codon; `None` selects all three.
    pub codon_position: Option<usize>,
    pub genetic_code: GeneticCode,
    pub min_allele_num: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            synonymous: true,
            codon_position: Some(2),
            genetic_code: GeneticCode::bacterial(),
            min_allele_num: 0,
        }
    }
}

impl ScanSettings {
    /// Nucleotide offsets within a codon that are compared.
    pub fn codon_positions(&self) -> Vec<usize> {
        match self.codon_position {
            Some(p) if p < 3 => vec![p],
            _ => vec![0, 1, 2],
        }
    }
}

/// Doublet matrix of one nucleotide offset over a group of codon pairs.
fn doublets(group: &[CodonPair], position: usize) -> NuclCov {
    let mut nc = NuclCov::new(NUCLEOTIDES);
    for pair in group {
        if let Err(e) = nc.add(pair.a[position], pair.b[position]) {
            trace!("skipping codon pair: {}", e);
        }
    }
    nc
}

/// Joint matrix plus the two diagonal matrices (site a vs itself, site b vs itself).
fn doublets_with_marginals(group: &[CodonPair], position: usize) -> (NuclCov, NuclCov, NuclCov) {
    let mut nc = NuclCov::new(NUCLEOTIDES);
    let mut na = NuclCov::new(NUCLEOTIDES);
    let mut nb = NuclCov::new(NUCLEOTIDES);
    for pair in group {
        let a = pair.a[position];
        let b = pair.b[position];
        if nc.add(a, b).is_ok() {
            // Both symbols are valid, so the diagonal adds cannot fail
            let _ = na.add(a, a);
            let _ = nb.add(b, b);
        }
    }
    (nc, na, nb)
}

#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    xy: f64,
    xa: f64,
    xb: f64,
    n: usize,
}

/// Pair id with the two names in lexicographic order.
pub fn pair_id(a: &str, b: &str) -> String {
    if a > b {
        format!("{}_vs_{}", b, a)
    } else {
        format!("{}_vs_{}", a, b)
    }
}

/// Stateless calculator; one instance is shared by all workers.
#[derive(Debug, Clone)]
pub struct Calculator {
    settings: ScanSettings,
    grouper: SynonymousGrouper,
    positions: Vec<usize>,
}

impl Calculator {
    pub fn new(settings: ScanSettings) -> Self {
        let grouper = SynonymousGrouper::new(settings.genetic_code.clone(), settings.synonymous);
        let positions = settings.codon_positions();
        Self {
            settings,
            grouper,
            positions,
        }
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    fn site_totals(&self, source: &dyn CodonSource, i: usize, j: usize) -> Totals {
        let mut totals = Totals::default();
        let min = self.settings.min_allele_num;
        for group in self.grouper.group(source.codon_pairs(i, j)) {
            if group.len() < 2 {
                continue;
            }
            for &p in &self.positions {
                let (nc, na, nb) = doublets_with_marginals(&group, p);
                let (xy, n) = nc.p11(min);
                totals.xy += xy;
                totals.xa += na.p11(min).0;
                totals.xb += nb.p11(min).0;
                totals.n += n;
            }
        }
        totals
    }

    /// Single-clade profile row for a lag in codons, summed over all first sites.
    pub fn profile_at_lag(&self, source: &dyn CodonSource, lag: usize) -> CorrResult {
        let len = source.num_positions();
        let mut xy = 0.0;
        let mut n = 0;
        let mut i = 0;
        while i + lag < len {
            let totals = self.site_totals(source, i, i + lag);
            xy += totals.xy;
            n += totals.n;
            i += 1;
        }
        CorrResult::profile(lag * 3, ratio(xy, n), n)
    }

    /// One row per first site for a lag in codons, with P1a/P1b marginals.
    ///
    /// Sites without any valid pair are still reported with NaN and N = 0.
    pub fn positions_at_lag(&self, source: &dyn CodonSource, lag: usize) -> Vec<CorrResult> {
        let len = source.num_positions();
        let mut rows = Vec::with_capacity(len.saturating_sub(lag));
        let mut i = 0;
        while i + lag < len {
            let t = self.site_totals(source, i, i + lag);
            rows.push(CorrResult::position(
                i * 3,
                lag * 3,
                ratio(t.xy, t.n),
                ratio(t.xa, t.n),
                ratio(t.xb, t.n),
                t.n,
            ));
            i += 1;
        }
        rows
    }

    /// Cross-clade profile row: pairs one strain from each clade.
    ///
    /// In synonymous mode only groups encoding the same amino-acid pair in
    /// both clades are compared.
    pub fn mates_at_lag(&self, first: &dyn CodonSource, second: &dyn CodonSource, lag: usize) -> CorrResult {
        let len = first.num_positions();
        let min = self.settings.min_allele_num;
        let mut xy = 0.0;
        let mut n = 0;
        let mut i = 0;
        while i + lag < len {
            let j = i + lag;
            let groups1 = self.grouper.group(first.codon_pairs(i, j));
            let groups2 = self.grouper.group(second.codon_pairs(i, j));
            for g1 in &groups1 {
                let key1 = self.grouper.group_key(g1);
                for g2 in &groups2 {
                    if self.settings.synonymous && key1 != self.grouper.group_key(g2) {
                        continue;
                    }
                    for &p in &self.positions {
                        let (pxy, pn) = doublets(g1, p).mate_p11(&doublets(g2, p), min);
                        xy += pxy;
                        n += pn;
                    }
                }
            }
            i += 1;
        }
        CorrResult::profile(lag * 3, ratio(xy, n), n)
    }

    // (d, t): double differences and compared nucleotides for one strain pair at a lag.
    fn pair_counts(&self, s1: &[Codon], s2: &[Codon], lag: usize) -> (f64, usize) {
        let code = &self.settings.genetic_code;
        let len = s1.len().min(s2.len());
        let mut d = 0.0;
        let mut t = 0;
        let mut k = 0;
        while k + lag < len {
            let (c1, c2) = (&s1[k], &s2[k]);
            let same_first = matches!(
                (code.translate(c1), code.translate(c2)),
                (Some(a1), Some(a2)) if a1 == a2
            );
            if same_first {
                let (b1, b2) = (&s1[k + lag], &s2[k + lag]);
                let good = !self.settings.synonymous
                    || matches!(
                        (code.translate(b1), code.translate(b2)),
                        (Some(a1), Some(a2)) if a1 == a2
                    );
                if good {
                    for &p in &self.positions {
                        if c1[p] != c2[p] && b1[p] != b2[p] {
                            d += 1.0;
                        }
                        t += 1;
                    }
                }
            }
            k += 1;
        }
        (d, t)
    }

    /// Lag profile of one strain pair over lags `0..max_lag` (codons).
    pub fn pair_profile(&self, strains: &StrainCodons, a: usize, b: usize, max_lag: usize) -> CorrResults {
        let key = pair_id(strains.name(a), strains.name(b));
        let mut profile = CorrResults::new(key.clone());
        for lag in 0..max_lag {
            let (d, t) = self.pair_counts(strains.sequence(a), strains.sequence(b), lag);
            profile
                .results
                .push(CorrResult::profile(lag * 3, ratio(d, t), t).with_key(key.clone()));
        }
        profile
    }

    /// Lag-0 synonymous distance of one strain pair, `None` when nothing was compared.
    pub fn pair_ks(&self, strains: &StrainCodons, a: usize, b: usize) -> Option<CorrResult> {
        let (d, t) = self.pair_counts(strains.sequence(a), strains.sequence(b), 0);
        if t == 0 {
            return None;
        }
        let key = pair_id(strains.name(a), strains.name(b));
        Some(CorrResult::profile(0, d / t as f64, t).with_key(key))
    }

    /// Full single-clade profile of a resampled strain set.
    pub fn replicate_profile(
        &self,
        strains: &StrainCodons,
        id: &str,
        picks: &[usize],
        lags: Range<usize>,
    ) -> CorrResults {
        let view = Resampled::new(strains, picks);
        let mut profile = CorrResults::new(id);
        for lag in lags {
            profile
                .results
                .push(self.profile_at_lag(&view, lag).with_key(id));
        }
        profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::results::ResultType;

    fn strains(records: &[(&str, &str)]) -> StrainCodons {
        StrainCodons::from_sequences(records.iter().map(|(n, s)| (*n, s.as_bytes())), 0)
    }

    fn non_synonymous(codon_position: Option<usize>) -> Calculator {
        Calculator::new(ScanSettings {
            synonymous: false,
            codon_position,
            ..ScanSettings::default()
        })
    }

    #[test]
    fn test_ks_third_codon_position() {
        let data = strains(&[("s1", "ATGAAATAA"), ("s2", "ATGAAATAG")]);
        let row = non_synonymous(Some(2)).profile_at_lag(&data, 0);

        assert_eq!(row.lag, 0);
        assert_eq!(row.kind, ResultType::Ks);
        assert_eq!(row.n, 3);
        assert!((row.mean - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_codon_positions_summed() {
        let data = strains(&[("s1", "ATGAAATAA"), ("s2", "ATGAAATAG")]);
        let row = non_synonymous(None).profile_at_lag(&data, 0);
        assert_eq!(row.n, 9);
        assert!((row.mean - 1.0 / 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_profile_lag_in_nucleotides() {
        let data = strains(&[("s1", "ATGAAATAA"), ("s2", "ATGAAATAG")]);
        let row = non_synonymous(Some(2)).profile_at_lag(&data, 1);
        assert_eq!(row.lag, 3);
        assert_eq!(row.kind, ResultType::P2);
        // (G,A) (A,A) vs (G,A) (A,G): the second site differs only at site b
        assert_eq!(row.n, 2);
        assert_eq!(row.mean, 0.0);
    }

    #[test]
    fn test_empty_lag_gives_nan() {
        let data = strains(&[("s1", "ATGAAATAA")]);
        let row = non_synonymous(Some(2)).profile_at_lag(&data, 0);
        assert!(row.mean.is_nan());
        assert_eq!(row.n, 0);

        let beyond = non_synonymous(Some(2)).profile_at_lag(&strains(&[("a", "ATG"), ("b", "ATG")]), 5);
        assert!(beyond.mean.is_nan());
    }

    #[test]
    fn test_synonymous_groups_need_two_members() {
        // ATG (Met) vs CTG (Leu): different amino acids, one strain per group
        let data = strains(&[("s1", "ATGAAA"), ("s2", "CTGAAA")]);
        let calc = Calculator::new(ScanSettings {
            codon_position: Some(0),
            ..ScanSettings::default()
        });
        let row = calc.profile_at_lag(&data, 0);
        assert_eq!(row.n, 1);
        assert_eq!(row.mean, 0.0);
    }

    #[test]
    fn test_positions_with_marginals() {
        let data = strains(&[("s1", "ATGAAATAA"), ("s2", "ATGAAATAG")]);
        let rows = non_synonymous(Some(2)).positions_at_lag(&data, 1);
        assert_eq!(rows.len(), 2);

        let second = &rows[1];
        assert_eq!(second.x, Some(3));
        assert_eq!(second.lag, 3);
        assert_eq!(second.kind, ResultType::Qs);
        assert_eq!(second.mean, 0.0);
        assert_eq!(second.p1a, Some(0.0));
        assert_eq!(second.p1b, Some(1.0));

        let baseline = non_synonymous(Some(2)).positions_at_lag(&data, 0);
        assert_eq!(baseline.len(), 3);
        assert!(baseline.iter().all(|r| r.kind == ResultType::Ds));
    }

    #[test]
    fn test_positions_report_gaps_as_nan() {
        let data = strains(&[("s1", "---AAA"), ("s2", "---AAG")]);
        let rows = non_synonymous(Some(2)).positions_at_lag(&data, 0);
        assert_eq!(rows[0].n, 0);
        assert!(rows[0].mean.is_nan());
        assert!(rows[0].p1a.unwrap().is_nan());
        assert_eq!(rows[1].n, 1);
    }

    #[test]
    fn test_mates_require_same_amino_acid_pair() {
        let clade1 = strains(&[("a1", "GCTAAA"), ("a2", "GCTAAA")]);
        let clade2 = strains(&[("b1", "GCCAAG")]);
        let calc = Calculator::new(ScanSettings::default());

        // Ala/Lys in both clades, third positions differ at both sites
        let row = calc.mates_at_lag(&clade1, &clade2, 1);
        assert_eq!(row.n, 2);
        assert_eq!(row.mean, 1.0);

        let other = strains(&[("b1", "ATGAAG")]);
        let none = calc.mates_at_lag(&clade1, &other, 1);
        assert_eq!(none.n, 0);
        assert!(none.mean.is_nan());
    }

    #[test]
    fn test_pair_profile_and_id_order() {
        let data = strains(&[("zeta", "GCTAAAGGT"), ("alpha", "GCCAAGGGT")]);
        let calc = Calculator::new(ScanSettings::default());
        let profile = calc.pair_profile(&data, 0, 1, 2);

        assert_eq!(profile.key, "alpha_vs_zeta");
        assert_eq!(profile.results.len(), 2);
        let ks = &profile.results[0];
        assert_eq!(ks.kind, ResultType::Ks);
        assert_eq!(ks.n, 3);
        assert!((ks.mean - 2.0 / 3.0).abs() < 1e-12);
        // lag 1: (GCT,AAA)/(GCC,AAG) double diff, (AAA,GGT)/(AAG,GGT) not
        assert_eq!(profile.results[1].n, 2);
        assert_eq!(profile.results[1].mean, 0.5);
    }

    #[test]
    fn test_pair_ks_skips_empty_pairs() {
        let calc = Calculator::new(ScanSettings::default());
        let data = strains(&[("a", "ATG"), ("b", "CTG")]);
        assert!(calc.pair_ks(&data, 0, 1).is_none());

        let same = strains(&[("b", "GCT"), ("a", "GCC")]);
        let ks = calc.pair_ks(&same, 0, 1).unwrap();
        assert_eq!(ks.key.as_deref(), Some("a_vs_b"));
        assert_eq!(ks.mean, 1.0);
    }

    #[test]
    fn test_replicate_profile_uses_picks() {
        let data = strains(&[("s1", "ATGAAATAA"), ("s2", "ATGAAATAG")]);
        let calc = non_synonymous(Some(2));

        let all = calc.replicate_profile(&data, "all", &[0, 1], 0..2);
        assert_eq!(all.key, "all");
        assert_eq!(all.results.len(), 2);
        assert!((all.results[0].mean - 1.0 / 3.0).abs() < 1e-12);

        let clones = calc.replicate_profile(&data, "boot_0", &[0, 0], 0..1);
        assert_eq!(clones.results[0].mean, 0.0);
        assert_eq!(clones.results[0].key.as_deref(), Some("boot_0"));
    }
}
