use bit_set::BitSet;
use fxhash::{FxHashMap, FxHashSet};

use super::layer_set_builder::LayerSetCollection;
use super::layer_weight::LayerWeight;
use super::subset::LayerIndex;

/// The score of one candidate layer subset
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SubsetScore {
    /// Weighted objective used to rank candidates
    pub score: f64,
    /// Number of not-yet-covered trajectories containing every layer of the subset
    pub num_tracks: usize,
    /// Fraction of those trajectories for which the subset was a run of adjacent layers
    pub adjacency: f64,
}

/// All trajectories sharing one exact set of layers
#[derive(Debug, Clone)]
struct DistinctSet {
    mask: BitSet,
    multiplicity: usize,
    // window layer set -> number of trajectories of this group having that window
    adjacent: FxHashMap<BitSet, usize>,
    used: bool,
}

/// SubsetScorer scores candidate layer subsets against the trajectories not covered yet.
///
/// Trajectories are grouped by their exact layer set. Marking a subset as used removes every
/// group containing it from all later scores, so scores can only go down as the greedy search
/// proceeds.
#[derive(Debug, Clone)]
pub struct SubsetScorer {
    sets: Vec<DistinctSet>,
    layer_weights: Vec<f64>,
    adjacence_multiplier: f64,
    n_used: usize,
}

impl SubsetScorer {
    pub fn new(collection: &LayerSetCollection, index: &LayerIndex, weights: &LayerWeight) -> Self {
        let mut sets: Vec<DistinctSet> = Vec::new();
        let mut positions: FxHashMap<BitSet, usize> = FxHashMap::default();

        for trajectory in collection.trajectories.iter() {
            let Some(mask) = index.to_mask(trajectory.layers.iter()) else {
                continue;
            };
            let pos = *positions.entry(mask.clone()).or_insert_with(|| {
                sets.push(DistinctSet {
                    mask,
                    multiplicity: 0,
                    adjacent: FxHashMap::default(),
                    used: false,
                });
                sets.len() - 1
            });
            let group = &mut sets[pos];
            group.multiplicity += 1;

            // A trajectory counts once per distinct window set
            let windows: FxHashSet<BitSet> = trajectory
                .windows
                .iter()
                .filter_map(|w| index.to_mask(w.iter()))
                .collect();
            for window in windows {
                *group.adjacent.entry(window).or_insert(0) += 1;
            }
        }

        let layer_weights = (0..index.len())
            .map(|pos| weights.weight(index.layer(pos)))
            .collect();

        Self {
            sets,
            layer_weights,
            adjacence_multiplier: weights.adjacence_multiplier,
            n_used: 0,
        }
    }

    /// Number of distinct trajectory layer sets
    pub fn n_distinct(&self) -> usize {
        self.sets.len()
    }

    pub fn n_unused(&self) -> usize {
        self.sets.len() - self.n_used
    }

    pub fn all_used(&self) -> bool {
        self.n_used == self.sets.len()
    }

    /// Product of the weights of the layers in the subset
    pub fn weight(&self, subset: &BitSet) -> f64 {
        subset.iter().map(|pos| self.layer_weights[pos]).product()
    }

    /// Number of unused trajectories whose layer set contains the subset
    pub fn num_tracks(&self, subset: &BitSet) -> usize {
        self.sets
            .iter()
            .filter(|s| !s.used && s.mask.is_superset(subset))
            .map(|s| s.multiplicity)
            .sum()
    }

    pub fn score(&self, subset: &BitSet) -> SubsetScore {
        let mut num_tracks = 0;
        let mut n_adjacent = 0;
        for set in self
            .sets
            .iter()
            .filter(|s| !s.used && s.mask.is_superset(subset))
        {
            num_tracks += set.multiplicity;
            n_adjacent += set.adjacent.get(subset).copied().unwrap_or(0);
        }

        if num_tracks == 0 {
            return SubsetScore::default();
        }

        let adjacency = n_adjacent as f64 / num_tracks as f64;
        SubsetScore {
            score: num_tracks as f64
                * self.weight(subset)
                * (1.0 + adjacency * self.adjacence_multiplier),
            num_tracks,
            adjacency,
        }
    }

    /// Mark every distinct layer set containing the subset as covered.
    ///
    /// Returns the number of distinct sets that became covered.
    pub fn mark_used(&mut self, subset: &BitSet) -> usize {
        let mut n_marked = 0;
        for set in self
            .sets
            .iter_mut()
            .filter(|s| !s.used && s.mask.is_superset(subset))
        {
            set.used = true;
            n_marked += 1;
        }
        self.n_used += n_marked;
        n_marked
    }

    /// Every distinct layer set (covered or not) containing the subset
    pub fn supersets<'a>(&'a self, subset: &'a BitSet) -> impl Iterator<Item = &'a BitSet> {
        self.sets
            .iter()
            .filter(move |s| s.mask.is_superset(subset))
            .map(|s| &s.mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{BarrelEndcapFlag, Layer};
    use crate::layer_set_builder::Trajectory;
    use std::collections::BTreeSet;

    fn barrel(l: i32) -> Layer {
        Layer::new("SiTrackerBarrel", l, BarrelEndcapFlag::BARREL)
    }

    fn trajectory(layers: &[i32], windows: &[&[i32]]) -> Trajectory {
        Trajectory {
            layers: layers.iter().map(|l| barrel(*l)).collect(),
            windows: windows
                .iter()
                .map(|w| w.iter().map(|l| barrel(*l)).collect())
                .collect(),
        }
    }

    fn setup(weights: &LayerWeight) -> (LayerIndex, SubsetScorer) {
        let collection = LayerSetCollection {
            trajectories: vec![
                trajectory(&[0, 1, 2, 3], &[&[0, 1], &[1, 2], &[2, 3]]),
                trajectory(&[0, 1, 2, 3], &[&[0, 1]]),
                trajectory(&[0, 1, 4], &[]),
                trajectory(&[2, 3, 4], &[&[3, 4]]),
            ],
            n_events: 4,
        };
        let index = LayerIndex::new(&collection.all_layers());
        let scorer = SubsetScorer::new(&collection, &index, weights);
        (index, scorer)
    }

    fn mask(index: &LayerIndex, layers: &[i32]) -> BitSet {
        let layers: BTreeSet<Layer> = layers.iter().map(|l| barrel(*l)).collect();
        index.to_mask(layers.iter()).unwrap()
    }

    #[test]
    fn test_unweighted_score() {
        let (index, scorer) = setup(&LayerWeight::default());
        assert_eq!(scorer.n_distinct(), 3);
        assert_eq!(scorer.num_tracks(&mask(&index, &[0, 1])), 3);
        assert_eq!(scorer.num_tracks(&mask(&index, &[2, 3])), 3);
        assert_eq!(scorer.num_tracks(&mask(&index, &[1, 4])), 1);
        assert_eq!(scorer.num_tracks(&mask(&index, &[0, 4])), 1);
    }

    #[test]
    fn test_weighted_score_with_adjacency() {
        let mut weights = LayerWeight::default();
        weights.adjacence_multiplier = 1.0;
        weights.set_weight(barrel(0), 2.0);
        let (index, scorer) = setup(&weights);

        // Two of the three covering trajectories have {0, 1} as a window
        let score = scorer.score(&mask(&index, &[0, 1]));
        assert_eq!(score.num_tracks, 3);
        assert!((score.adjacency - 2.0 / 3.0).abs() < 1.0e-12);
        assert!((score.score - 3.0 * 2.0 * (1.0 + 2.0 / 3.0)).abs() < 1.0e-9);

        let none = scorer.score(&mask(&index, &[0, 1, 2, 3, 4]));
        assert_eq!(none, SubsetScore::default());
    }

    #[test]
    fn test_mark_used_only_decreases_scores() {
        let (index, mut scorer) = setup(&LayerWeight::default());
        let candidates: Vec<BitSet> = crate::subset::all_subset_masks(&index, 2);
        let before: Vec<usize> = candidates.iter().map(|c| scorer.num_tracks(c)).collect();

        assert_eq!(scorer.mark_used(&mask(&index, &[0, 1])), 2);
        assert_eq!(scorer.n_unused(), 1);
        let after: Vec<usize> = candidates.iter().map(|c| scorer.num_tracks(c)).collect();
        for (b, a) in before.iter().zip(after.iter()) {
            assert!(a <= b);
        }
        assert_eq!(scorer.num_tracks(&mask(&index, &[0, 1])), 0);
        // Covered sets are still reported as supersets
        assert_eq!(scorer.supersets(&mask(&index, &[0, 1])).count(), 2);

        assert_eq!(scorer.mark_used(&mask(&index, &[3, 4])), 1);
        assert!(scorer.all_used());
    }
}
