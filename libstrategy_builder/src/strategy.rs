use std::collections::BTreeSet;

use super::constants::*;
use super::layer::{Layer, SeedLayer, SeedType};

/// Track-finding cutoffs carried by every strategy
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyCutoffs {
    pub min_pt: f64,
    pub max_dca: f64,
    pub max_z0: f64,
    pub max_chisq: f64,
    pub bad_hit_chisq: f64,
    pub min_confirm: i32,
    pub min_hits: i32,
}

impl Default for StrategyCutoffs {
    fn default() -> Self {
        Self {
            min_pt: DEFAULT_MIN_PT,
            max_dca: DEFAULT_MAX_DCA,
            max_z0: DEFAULT_MAX_Z0,
            max_chisq: DEFAULT_MAX_CHISQ,
            bad_hit_chisq: DEFAULT_BAD_HIT_CHISQ,
            min_confirm: DEFAULT_MIN_CONFIRM,
            min_hits: DEFAULT_MIN_HITS,
        }
    }
}

/// A seed-finding strategy: which layers seed, confirm and extend a track, and the cutoffs
/// applied while doing so.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedStrategy {
    pub name: String,
    pub layers: Vec<SeedLayer>,
    pub cutoffs: StrategyCutoffs,
}

impl SeedStrategy {
    pub fn new(name: &str, layers: Vec<SeedLayer>) -> Self {
        Self {
            name: name.to_string(),
            layers,
            cutoffs: StrategyCutoffs::default(),
        }
    }

    /// The layers with a given role, in strategy order
    pub fn layers_of(&self, kind: SeedType) -> Vec<&SeedLayer> {
        self.layers.iter().filter(|l| l.kind == kind).collect()
    }

    /// Copy the cutoffs (by value) from another strategy. Name and layers are untouched.
    pub fn copy_cutoffs_from(&mut self, other: &SeedStrategy) {
        self.cutoffs = other.cutoffs.clone();
    }

    /// The seed and confirm layers of this strategy as a set.
    ///
    /// If `ignore_north_south` is set, north and south endcap layers are folded onto `ENDCAP`
    /// so that the two halves of a symmetrized strategy map to the same set.
    pub fn relevant_set(&self, ignore_north_south: bool) -> BTreeSet<Layer> {
        self.layers
            .iter()
            .filter(|l| l.kind != SeedType::Extend)
            .map(|l| {
                if ignore_north_south {
                    l.layer.with_flag(l.layer.be_flag.fold_north_south())
                } else {
                    l.layer.clone()
                }
            })
            .collect()
    }
}
