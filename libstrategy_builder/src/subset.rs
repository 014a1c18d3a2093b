use std::collections::BTreeSet;

use bit_set::BitSet;
use fxhash::FxHashMap;

use super::layer::Layer;

/// Dense numbering of every layer seen in the data, so that layer sets can be bitsets.
///
/// Layers are numbered in layer order, which makes every enumeration over the index
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct LayerIndex {
    layers: Vec<Layer>,
    positions: FxHashMap<Layer, usize>,
}

impl LayerIndex {
    pub fn new(all_layers: &BTreeSet<Layer>) -> Self {
        let layers: Vec<Layer> = all_layers.iter().cloned().collect();
        let positions = layers
            .iter()
            .enumerate()
            .map(|(idx, layer)| (layer.clone(), idx))
            .collect();
        Self { layers, positions }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn position(&self, layer: &Layer) -> Option<usize> {
        self.positions.get(layer).copied()
    }

    pub fn layer(&self, position: usize) -> &Layer {
        &self.layers[position]
    }

    /// Convert layers to a bitset. Returns None if any layer is not in the index.
    pub fn to_mask<'a>(&self, layers: impl IntoIterator<Item = &'a Layer>) -> Option<BitSet> {
        let mut mask = BitSet::with_capacity(self.len());
        for layer in layers {
            mask.insert(self.position(layer)?);
        }
        Some(mask)
    }

    /// Convert a bitset back to layers, in layer order
    pub fn to_layers(&self, mask: &BitSet) -> Vec<Layer> {
        mask.iter().map(|pos| self.layers[pos].clone()).collect()
    }
}

/// All k-element subsets of `0..n`, in lexicographic order.
///
/// Yields nothing if `k == 0` or `k > n`.
pub fn combinations(n: usize, k: usize) -> Combinations {
    Combinations {
        n,
        current: if k == 0 || k > n {
            None
        } else {
            Some((0..k).collect())
        },
    }
}

#[derive(Debug, Clone)]
pub struct Combinations {
    n: usize,
    current: Option<Vec<usize>>,
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.current.clone()?;
        let k = result.len();

        // Advance: find the rightmost position that can still move right
        let mut next = result.clone();
        let mut pos = k;
        while pos > 0 {
            pos -= 1;
            if next[pos] < self.n - k + pos {
                next[pos] += 1;
                for follow in (pos + 1)..k {
                    next[follow] = next[follow - 1] + 1;
                }
                self.current = Some(next);
                return Some(result);
            }
        }
        self.current = None;
        Some(result)
    }
}

/// Number of k-subsets of an n-set, saturating at `u64::MAX`
pub fn n_choose_k(n: usize, k: usize) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    (0..k)
        .try_fold(1u128, |acc, i| {
            acc.checked_mul((n - i) as u128)
                .map(|product| product / (i + 1) as u128)
        })
        .and_then(|count| u64::try_from(count).ok())
        .unwrap_or(u64::MAX)
}

/// All k-element subsets of a set of layers as bitsets over the index, in lexicographic order
pub fn all_subset_masks(index: &LayerIndex, k: usize) -> Vec<BitSet> {
    combinations(index.len(), k)
        .map(|combo| {
            let mut mask = BitSet::with_capacity(index.len());
            for pos in combo {
                mask.insert(pos);
            }
            mask
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::BarrelEndcapFlag;

    #[test]
    fn test_combinations() {
        let all: Vec<Vec<usize>> = combinations(4, 2).collect();
        assert_eq!(
            all,
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );
        assert_eq!(combinations(3, 3).count(), 1);
        assert_eq!(combinations(3, 4).count(), 0);
        assert_eq!(combinations(3, 0).count(), 0);
        assert_eq!(combinations(12, 4).count() as u64, n_choose_k(12, 4));
        assert_eq!(n_choose_k(12, 4), 495);
    }

    #[test]
    fn test_n_choose_k_large_layer_counts() {
        assert_eq!(n_choose_k(64, 32), 1_832_624_140_942_590_534);
        assert_eq!(n_choose_k(70, 35), u64::MAX);
        assert_eq!(n_choose_k(200, 100), u64::MAX);
        assert_eq!(n_choose_k(3, 5), 0);
    }

    #[test]
    fn test_layer_index() {
        let layers: BTreeSet<Layer> = (0..5)
            .map(|l| Layer::new("SiTrackerBarrel", l, BarrelEndcapFlag::BARREL))
            .collect();
        let index = LayerIndex::new(&layers);
        assert_eq!(index.len(), 5);
        let pick = [
            Layer::new("SiTrackerBarrel", 3, BarrelEndcapFlag::BARREL),
            Layer::new("SiTrackerBarrel", 1, BarrelEndcapFlag::BARREL),
        ];
        let mask = index.to_mask(pick.iter()).unwrap();
        assert!(mask.contains(1) && mask.contains(3));
        assert_eq!(index.to_layers(&mask)[0].layer_number, 1);

        let unknown = [Layer::new("SiVertexBarrel", 0, BarrelEndcapFlag::BARREL)];
        assert!(index.to_mask(unknown.iter()).is_none());
        assert_eq!(all_subset_masks(&index, 3).len(), 10);
    }
}
