//! Merging per-document keyword sets into one weight table.

use lexicloud_core::config::MergeMode;
use lexicloud_core::term::normalize_term;
use lexicloud_core::types::DocumentKeywordSet;
use serde::Serialize;
use std::collections::BTreeMap;

/// Combined weight of every term across the corpus. Keys are unique
/// normalized terms.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatedWeights {
    weights: BTreeMap<String, f64>,
}

impl AggregatedWeights {
    pub fn get(&self, term: &str) -> Option<f64> {
        self.weights.get(&normalize_term(term)).copied()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Terms in lexical order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(t, w)| (t.as_str(), *w))
    }

    pub fn max_weight(&self) -> Option<f64> {
        self.weights.values().copied().reduce(f64::max)
    }

    /// Terms with positive weight, heaviest first; equal weights in lexical order
    pub fn ranked(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self.iter().filter(|(_, w)| *w > 0.0).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }

    /// Every weight divided by the largest one, so the heaviest term has weight 1
    pub fn normalized_by_max(&self) -> Self {
        match self.max_weight() {
            Some(max) if max > 0.0 => Self {
                weights: self
                    .weights
                    .iter()
                    .map(|(t, w)| (t.clone(), w / max))
                    .collect(),
            },
            _ => self.clone(),
        }
    }
}

impl FromIterator<(String, f64)> for AggregatedWeights {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut collected: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for (term, weight) in iter {
            let term = normalize_term(&term);
            if !term.is_empty() {
                collected.entry(term).or_default().push(weight);
            }
        }
        Self {
            weights: collected.into_iter().map(|(t, ws)| (t, ordered_sum(ws))).collect(),
        }
    }
}

/// Sum in a fixed order so the result does not depend on input order
fn ordered_sum(mut weights: Vec<f64>) -> f64 {
    weights.sort_by(f64::total_cmp);
    weights.into_iter().sum()
}

/// Merges keyword sets by sum of weights or by document count
#[derive(Debug, Clone, Copy, Default)]
pub struct Aggregator {
    mode: MergeMode,
}

impl Aggregator {
    pub fn new(mode: MergeMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> MergeMode {
        self.mode
    }

    pub fn aggregate<'a, I>(&self, sets: I) -> AggregatedWeights
    where
        I: IntoIterator<Item = &'a DocumentKeywordSet>,
    {
        let mode = self.mode;
        sets.into_iter()
            .flat_map(|set| set.iter())
            .map(|entry| {
                let weight = match mode {
                    MergeMode::Sum => entry.weight,
                    MergeMode::DocumentFrequency => 1.0,
                };
                (entry.term.clone(), weight)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lexicloud_core::types::KeywordEntry;
    use proptest::prelude::*;

    fn set(entries: &[(&str, f64)]) -> DocumentKeywordSet {
        DocumentKeywordSet::new(
            entries.iter().map(|(t, w)| KeywordEntry::new(*t, *w)),
            usize::MAX,
        )
    }

    #[test]
    fn test_sum_mode() {
        let sets = vec![set(&[("系统", 0.5), ("Rust", 0.25)]), set(&[("系统", 0.3), ("rust", 0.5)])];
        let weights = Aggregator::new(MergeMode::Sum).aggregate(&sets);
        assert_eq!(weights.len(), 2);
        assert_relative_eq!(weights.get("系统").unwrap(), 0.8);
        assert_relative_eq!(weights.get("RUST").unwrap(), 0.75);
    }

    #[test]
    fn test_document_frequency_mode() {
        let sets = vec![
            set(&[("系统", 0.5), ("设计", 0.1)]),
            set(&[("系统", 0.3)]),
            set(&[("系统", 0.9), ("测试", 0.2)]),
        ];
        let weights = Aggregator::new(MergeMode::DocumentFrequency).aggregate(&sets);
        assert_eq!(weights.get("系统"), Some(3.0));
        assert_eq!(weights.get("设计"), Some(1.0));
    }

    #[test]
    fn test_every_term_comes_from_some_set() {
        let sets = vec![set(&[("a", 0.1)]), set(&[("b", 0.2)]), DocumentKeywordSet::empty()];
        let weights = Aggregator::default().aggregate(&sets);
        for (term, _) in weights.iter() {
            assert!(sets.iter().any(|s| s.weight_of(term).is_some()));
        }
    }

    #[test]
    fn test_normalized_and_ranked() {
        let sets = vec![set(&[("a", 2.0), ("b", 1.0), ("c", 1.0), ("z", 0.0)])];
        let weights = Aggregator::default().aggregate(&sets).normalized_by_max();
        assert_eq!(weights.max_weight(), Some(1.0));
        assert_eq!(weights.ranked(), vec![("a", 1.0), ("b", 0.5), ("c", 0.5)]);
    }

    #[test]
    fn test_empty_input() {
        let weights = Aggregator::default().aggregate(&Vec::<DocumentKeywordSet>::new());
        assert!(weights.is_empty());
        assert_eq!(weights.max_weight(), None);
        assert!(weights.normalized_by_max().is_empty());
    }

    fn arb_sets() -> impl Strategy<Value = Vec<DocumentKeywordSet>> {
        let entry = ("[a-eA-E]{1,2}", 0.0f64..10.0);
        prop::collection::vec(prop::collection::vec(entry, 0..6), 0..6).prop_map(|sets| {
            sets.into_iter()
                .map(|entries| {
                    DocumentKeywordSet::new(
                        entries.into_iter().map(|(t, w)| KeywordEntry::new(t, w)),
                        usize::MAX,
                    )
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn test_aggregation_order_independent(sets in arb_sets(), seed in any::<u64>()) {
            let mut shuffled = sets.clone();
            // deterministic permutation derived from the seed
            let len = shuffled.len();
            if len > 1 {
                for i in 0..len {
                    let j = ((seed >> (i % 64)) as usize + i) % len;
                    shuffled.swap(i, j);
                }
            }
            shuffled.reverse();

            for mode in [MergeMode::Sum, MergeMode::DocumentFrequency] {
                let aggregator = Aggregator::new(mode);
                prop_assert_eq!(aggregator.aggregate(&sets), aggregator.aggregate(&shuffled));
            }
        }
    }
}
