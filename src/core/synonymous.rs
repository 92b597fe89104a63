// synonymous.rs - Grouping of codon pairs by encoded amino-acid pair

use std::collections::HashMap;

use crate::core::codon::{CodonPair, GeneticCode};

/// Partitions codon pairs into groups encoding the same ordered amino-acid pair.
#[derive(Debug, Clone)]
pub struct SynonymousGrouper {
    code: GeneticCode,
    synonymous: bool,
}

impl SynonymousGrouper {
    pub fn new(code: GeneticCode, synonymous: bool) -> Self {
        Self { code, synonymous }
    }

    /// Group codon pairs. Groups come out in first-seen key order and keep
    /// the input order of their members.
    ///
    /// With synonymy disabled the whole input is returned as one group, gaps included.
    pub fn group(&self, pairs: Vec<CodonPair>) -> Vec<Vec<CodonPair>> {
        if !self.synonymous {
            return if pairs.is_empty() { Vec::new() } else { vec![pairs] };
        }

        let mut index: HashMap<[u8; 2], usize> = HashMap::new();
        let mut groups: Vec<Vec<CodonPair>> = Vec::new();
        for pair in pairs {
            if pair.has_gap() {
                continue;
            }
            let key = self.code.translate_pair(&pair);
            let slot = *index.entry(key).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(pair);
        }
        groups
    }

    /// Ordered amino-acid pair a group encodes, `None` for an empty group.
    pub fn group_key(&self, group: &[CodonPair]) -> Option<[u8; 2]> {
        group.first().map(|pair| self.code.translate_pair(pair))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(a: &[u8; 3], b: &[u8; 3]) -> CodonPair {
        CodonPair::new(*a, *b)
    }

    #[test]
    fn test_all_gap_input_gives_no_groups() {
        let grouper = SynonymousGrouper::new(GeneticCode::bacterial(), true);
        let groups = grouper.group(vec![pair(b"---", b"---"), pair(b"NNN", b"AAA")]);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_same_amino_acid_pair_single_group_in_order() {
        let grouper = SynonymousGrouper::new(GeneticCode::bacterial(), true);
        // GCT/GCC/GCA all encode Ala; AAA/AAG encode Lys
        let input = vec![
            pair(b"GCT", b"AAA"),
            pair(b"GCC", b"AAG"),
            pair(b"GCA", b"AAA"),
        ];
        let groups = grouper.group(input.clone());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0], input);
        assert_eq!(grouper.group_key(&groups[0]), Some(*b"AK"));
    }

    #[test]
    fn test_first_seen_group_order() {
        let grouper = SynonymousGrouper::new(GeneticCode::bacterial(), true);
        let groups = grouper.group(vec![
            pair(b"ATG", b"TAA"),
            pair(b"GCT", b"AAA"),
            pair(b"ATG", b"TAG"),
            pair(b"A-G", b"TAG"),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(grouper.group_key(&groups[0]), Some(*b"M*"));
        assert_eq!(grouper.group_key(&groups[1]), Some(*b"AK"));
    }

    #[test]
    fn test_order_of_amino_acids_matters() {
        let grouper = SynonymousGrouper::new(GeneticCode::bacterial(), true);
        let groups = grouper.group(vec![pair(b"ATG", b"AAA"), pair(b"AAA", b"ATG")]);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_untranslatable_codons_group_together() {
        let grouper = SynonymousGrouper::new(GeneticCode::bacterial(), true);
        let groups = grouper.group(vec![pair(b"RAA", b"AAA"), pair(b"AYA", b"AAG")]);
        assert_eq!(groups.len(), 1);
        assert_eq!(grouper.group_key(&groups[0]), Some(*b"XK"));
    }

    #[test]
    fn test_non_synonymous_keeps_everything() {
        let grouper = SynonymousGrouper::new(GeneticCode::bacterial(), false);
        let input = vec![pair(b"---", b"AAA"), pair(b"ATG", b"TAG")];
        let groups = grouper.group(input.clone());
        assert_eq!(groups, vec![input]);
        assert!(grouper.group(Vec::new()).is_empty());
    }
}
