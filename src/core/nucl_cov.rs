// nucl_cov.rs - Doublet matrix of nucleotide pairs at two sites

use crate::error::{McorrError, Result};

/// Joint nucleotide counts for a pair of sites across strains.
///
/// Cell `(a, b)` counts strains showing symbol `a` at the first site and `b`
/// at the second. Row-major, `alphabet.len()²` cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NuclCov {
    alphabet: Vec<u8>,
    doublets: Vec<usize>,
}

impl NuclCov {
    pub fn new(alphabet: &[u8]) -> Self {
        let size = alphabet.len();
        Self {
            alphabet: alphabet.to_vec(),
            doublets: vec![0; size * size],
        }
    }

    pub fn alphabet(&self) -> &[u8] {
        &self.alphabet
    }

    pub fn doublets(&self) -> &[usize] {
        &self.doublets
    }

    fn index_of(&self, symbol: u8) -> Option<usize> {
        self.alphabet.iter().position(|&s| s == symbol)
    }

    /// Record one strain observing `a` at the first site and `b` at the second.
    ///
    /// Symbols outside the alphabet leave the matrix untouched.
    pub fn add(&mut self, a: u8, b: u8) -> Result<()> {
        match (self.index_of(a), self.index_of(b)) {
            (Some(ia), Some(ib)) => {
                let size = self.alphabet.len();
                self.doublets[ia * size + ib] += 1;
                Ok(())
            }
            (ia, ib) => Err(McorrError::UnknownSymbol {
                first: if ia.is_none() { Some(a) } else { None },
                second: if ib.is_none() { Some(b) } else { None },
                alphabet: self.alphabet.clone(),
            }),
        }
    }

    /// Total number of recorded observations.
    pub fn count(&self) -> usize {
        self.doublets.iter().sum()
    }

    // Cells i and j differ at both sites.
    fn differ_at_both(&self, i: usize, j: usize) -> bool {
        let size = self.alphabet.len();
        i % size != j % size && i / size != j / size
    }

    /// Pair count over all strain pairs whose cells exceed `min_allele_num`,
    /// with the number of pairs that differ at both sites.
    pub fn p11(&self, min_allele_num: usize) -> (f64, usize) {
        let mut xy = 0.0;
        let mut n = 0;
        for i in 0..self.doublets.len() {
            let ci = self.doublets[i];
            if ci <= min_allele_num {
                continue;
            }
            for j in (i + 1)..self.doublets.len() {
                let cj = self.doublets[j];
                if cj > min_allele_num {
                    if self.differ_at_both(i, j) {
                        xy += (ci * cj) as f64;
                    }
                    n += ci * cj;
                }
            }
            n += ci * (ci - 1) / 2;
        }
        (xy, n)
    }

    /// Same pair count as [`NuclCov::p11`], counting pairs identical at both sites.
    pub fn p00(&self, min_allele_num: usize) -> (f64, usize) {
        let mut xy = 0.0;
        let mut n = 0;
        for i in 0..self.doublets.len() {
            let ci = self.doublets[i];
            if ci <= min_allele_num {
                continue;
            }
            for j in (i + 1)..self.doublets.len() {
                let cj = self.doublets[j];
                if cj > min_allele_num {
                    n += ci * cj;
                }
            }
            let same = ci * (ci - 1) / 2;
            n += same;
            xy += same as f64;
        }
        (xy, n)
    }

    /// Double differences between strains of this clade and strains of `other`.
    ///
    /// Only cross pairs are counted: n is the product of both totals.
    pub fn mate_p11(&self, other: &NuclCov, min_allele_num: usize) -> (f64, usize) {
        let mut xy = 0.0;
        for (i, &ci) in self.doublets.iter().enumerate() {
            if ci <= min_allele_num {
                continue;
            }
            for (j, &cj) in other.doublets.iter().enumerate() {
                if i != j && cj > min_allele_num && self.differ_at_both(i, j) {
                    xy += (ci * cj) as f64;
                }
            }
        }
        (xy, self.count() * other.count())
    }

    /// Cross-clade pairs identical at both sites.
    pub fn mate_p00(&self, other: &NuclCov) -> (f64, usize) {
        let xy = self
            .doublets
            .iter()
            .zip(other.doublets.iter())
            .map(|(&a, &b)| (a * b) as f64)
            .sum();
        (xy, self.count() * other.count())
    }

    /// Joint counts of the differ-at-both event together with the squared
    /// cell counts of each contributing pair: `(xy, xx, yy, n)`.
    pub fn cov_xy(&self, min_allele_num: usize) -> (f64, f64, f64, usize) {
        let mut xy = 0.0;
        let mut xx = 0.0;
        let mut yy = 0.0;
        let mut n = 0;
        for i in 0..self.doublets.len() {
            let ci = self.doublets[i];
            if ci <= min_allele_num {
                continue;
            }
            for j in (i + 1)..self.doublets.len() {
                let cj = self.doublets[j];
                if cj > min_allele_num {
                    if self.differ_at_both(i, j) {
                        xy += (ci * cj) as f64;
                        xx += (ci * ci) as f64;
                        yy += (cj * cj) as f64;
                    }
                    n += ci * cj;
                }
            }
            n += ci * (ci - 1) / 2;
        }
        (xy, xx, yy, n)
    }

    /// Merge the counts of `other` into this matrix.
    pub fn append(&mut self, other: &NuclCov) -> Result<()> {
        if self.alphabet != other.alphabet {
            return Err(McorrError::AlphabetMismatch(
                self.alphabet.clone(),
                other.alphabet.clone(),
            ));
        }
        for (a, b) in self.doublets.iter_mut().zip(other.doublets.iter()) {
            *a += *b;
        }
        Ok(())
    }
}

/// Ratio of a count pair, NaN when nothing was compared.
pub fn ratio(xy: f64, n: usize) -> f64 {
    if n == 0 {
        f64::NAN
    } else {
        xy / n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codon::NUCLEOTIDES;

    fn matrix_with(pairs: &[(u8, u8, usize)]) -> NuclCov {
        let mut nc = NuclCov::new(NUCLEOTIDES);
        for &(a, b, times) in pairs {
            for _ in 0..times {
                nc.add(a, b).unwrap();
            }
        }
        nc
    }

    #[test]
    fn test_count_after_adds() {
        let nc = matrix_with(&[(b'A', b'T', 3), (b'G', b'C', 2), (b'C', b'C', 4)]);
        assert_eq!(nc.count(), 9);
    }

    #[test]
    fn test_unknown_symbol_leaves_matrix_unchanged() {
        let mut nc = matrix_with(&[(b'A', b'A', 1)]);
        let before = nc.clone();

        match nc.add(b'N', b'A') {
            Err(McorrError::UnknownSymbol { first, second, .. }) => {
                assert_eq!(first, Some(b'N'));
                assert_eq!(second, None);
            }
            other => panic!("expected UnknownSymbol, got {:?}", other),
        }
        match nc.add(b'A', b'-') {
            Err(McorrError::UnknownSymbol { first, second, .. }) => {
                assert_eq!(first, None);
                assert_eq!(second, Some(b'-'));
            }
            other => panic!("expected UnknownSymbol, got {:?}", other),
        }
        assert!(nc.add(b'-', b'N').is_err());
        assert_eq!(nc, before);
    }

    #[test]
    fn test_p11_single_cell() {
        let nc = matrix_with(&[(b'A', b'T', 100)]);
        assert_eq!(nc.p11(0), (0.0, 4950));
    }

    #[test]
    fn test_p11_two_cells() {
        let nc = matrix_with(&[(b'A', b'T', 3), (b'G', b'C', 2)]);
        // 3*2 cross pairs differ at both sites, plus 3 + 1 self pairs
        assert_eq!(nc.p11(0), (6.0, 10));
    }

    #[test]
    fn test_p11_min_allele_threshold() {
        let nc = matrix_with(&[(b'A', b'T', 3), (b'G', b'C', 1)]);
        // (G,C) does not exceed the threshold of 1
        assert_eq!(nc.p11(1), (0.0, 3));
    }

    #[test]
    fn test_p11_transposition_symmetry() {
        let pairs = [(b'A', b'T', 3), (b'G', b'C', 2), (b'A', b'C', 5), (b'T', b'T', 1)];
        let nc = matrix_with(&pairs);
        let transposed: Vec<(u8, u8, usize)> = pairs.iter().map(|&(a, b, k)| (b, a, k)).collect();
        let nt = matrix_with(&transposed);
        assert_eq!(nc.p11(0), nt.p11(0));
    }

    #[test]
    fn test_p11_single_site_difference_not_counted() {
        // Differ only at the second site
        let nc = matrix_with(&[(b'A', b'T', 2), (b'A', b'G', 2)]);
        let (xy, n) = nc.p11(0);
        assert_eq!(xy, 0.0);
        assert_eq!(n, 6);
    }

    #[test]
    fn test_p00() {
        let nc = matrix_with(&[(b'A', b'T', 3), (b'G', b'C', 2)]);
        assert_eq!(nc.p00(0), (4.0, 10));
    }

    #[test]
    fn test_mate_statistics() {
        let a = matrix_with(&[(b'A', b'T', 2)]);
        let b = matrix_with(&[(b'G', b'C', 3), (b'A', b'T', 1)]);

        assert_eq!(a.mate_p11(&b, 0), (6.0, 8));
        assert_eq!(a.mate_p00(&b), (2.0, 8));
    }

    #[test]
    fn test_cov_xy() {
        let nc = matrix_with(&[(b'A', b'T', 3), (b'G', b'C', 2)]);
        assert_eq!(nc.cov_xy(0), (6.0, 9.0, 4.0, 10));
    }

    #[test]
    fn test_append() {
        let mut a = matrix_with(&[(b'A', b'T', 2)]);
        let b = matrix_with(&[(b'A', b'T', 1), (b'G', b'G', 1)]);
        a.append(&b).unwrap();
        assert_eq!(a.count(), 4);

        let other = NuclCov::new(b"ACGT");
        assert!(matches!(a.append(&other), Err(McorrError::AlphabetMismatch(_, _))));
        assert_eq!(a.count(), 4);
    }

    #[test]
    fn test_ratio_nan_when_empty() {
        assert!(ratio(0.0, 0).is_nan());
        assert_eq!(ratio(1.0, 4), 0.25);
    }
}
