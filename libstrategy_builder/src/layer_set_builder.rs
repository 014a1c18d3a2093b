use std::collections::{BTreeSet, VecDeque};

use fxhash::FxHashMap;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use super::constants::RANDOM_SEED;
use super::event::{SimEvent, SimTrackerHit};
use super::layer::{BarrelEndcapFlag, Layer};
use super::layer_weight::LayerWeight;
use super::particle_filter::ParticleFilter;

/// The layers one accepted particle went through
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    /// Every layer hit, after inefficiency sampling
    pub layers: BTreeSet<Layer>,
    /// Runs of consecutive-in-time distinct layers, each exactly seed + confirm long
    pub windows: Vec<Vec<Layer>>,
}

/// Every accepted trajectory of a set of events
#[derive(Debug, Clone, Default)]
pub struct LayerSetCollection {
    pub trajectories: Vec<Trajectory>,
    pub n_events: u64,
}

impl LayerSetCollection {
    /// Add the trajectories of one event
    pub fn push_event(&mut self, mut trajectories: Vec<Trajectory>) {
        self.trajectories.append(&mut trajectories);
        self.n_events += 1;
    }

    /// Every layer seen by any trajectory, in layer order
    pub fn all_layers(&self) -> BTreeSet<Layer> {
        self.trajectories
            .iter()
            .flat_map(|t| t.layers.iter().cloned())
            .collect()
    }
}

/// LayerSetBuilder turns simulated events into trajectories.
///
/// Hits are thinned according to the readout efficiencies of the LayerWeight, grouped by
/// particle, filtered and then reduced to the set of layers each particle crossed. The random
/// draws are seeded per file so that the same hits are dropped on every run.
pub struct LayerSetBuilder {
    weights: LayerWeight,
    filter: Box<dyn ParticleFilter>,
    rng: ChaCha20Rng,
    min_layers: usize,
    window_size: usize,
    symmetrize: bool,
}

impl LayerSetBuilder {
    pub fn new(
        weights: LayerWeight,
        filter: Box<dyn ParticleFilter>,
        min_layers: usize,
        window_size: usize,
        symmetrize: bool,
    ) -> Self {
        Self {
            weights,
            filter,
            rng: ChaCha20Rng::seed_from_u64(RANDOM_SEED),
            min_layers,
            window_size,
            symmetrize,
        }
    }

    /// Restart the inefficiency sampling for the file with the given index
    pub fn reseed(&mut self, file_index: usize) {
        self.rng = ChaCha20Rng::seed_from_u64(RANDOM_SEED + file_index as u64);
    }

    /// Build the trajectories of one event
    pub fn process_event(&mut self, event: &SimEvent) -> Vec<Trajectory> {
        self.filter.set_event(event);

        // Sampling order has to be fixed for the sampling to be reproducible
        let mut collections: Vec<_> = event.collections.iter().collect();
        collections.sort_by_key(|c| c.name.to_lowercase());

        let mut order: Vec<u64> = Vec::new();
        let mut hits_by_particle: FxHashMap<u64, Vec<&SimTrackerHit>> = FxHashMap::default();
        for collection in collections {
            let mut hits: Vec<&SimTrackerHit> = collection.hits.iter().collect();
            hits.sort_by(|a, b| {
                a.time
                    .total_cmp(&b.time)
                    .then(a.cell_id.cmp(&b.cell_id))
                    .then(a.dedx.total_cmp(&b.dedx))
                    .then(a.path_length.total_cmp(&b.path_length))
            });

            let efficiency = self.weights.readout_efficiency(&collection.name);
            for hit in hits {
                if self.rng.gen::<f64>() < efficiency {
                    hits_by_particle
                        .entry(hit.particle)
                        .or_insert_with(|| {
                            order.push(hit.particle);
                            Vec::new()
                        })
                        .push(hit);
                }
            }
        }

        let mut trajectories = Vec::new();
        for id in order {
            let Some(particle) = event.particle(id) else {
                continue;
            };
            if !self.filter.passes(particle) {
                continue;
            }
            if let Some(mut hits) = hits_by_particle.remove(&id) {
                hits.sort_by(|a, b| a.time.total_cmp(&b.time));
                if let Some(trajectory) = self.make_trajectory(&hits) {
                    trajectories.push(trajectory);
                }
            }
        }
        trajectories
    }

    /// Collect the layers and adjacency windows of one particle's time-ordered hits.
    ///
    /// Returns None if the particle crossed fewer than the minimum number of layers.
    fn make_trajectory(&self, hits: &[&SimTrackerHit]) -> Option<Trajectory> {
        let mut layers = BTreeSet::new();
        let mut open: VecDeque<Vec<Layer>> = VecDeque::new();
        let mut windows = Vec::new();

        for hit in hits {
            let Some(layer) = hit.layer() else {
                continue;
            };
            let layer = self.normalize_layer(layer);
            layers.insert(layer.clone());

            // Doubled hits on one layer must not start a second window
            if open.back().map_or(true, |w| !w.contains(&layer)) {
                open.push_back(Vec::new());
            }

            let mut still_open = VecDeque::with_capacity(open.len());
            for mut window in open.drain(..) {
                if !window.contains(&layer) {
                    window.push(layer.clone());
                }
                if window.len() == self.window_size {
                    windows.push(window);
                } else {
                    still_open.push_back(window);
                }
            }
            open = still_open;
        }

        if layers.len() >= self.min_layers {
            Some(Trajectory { layers, windows })
        } else {
            None
        }
    }

    /// Some geometries number tracker endcap layers in pairs; those are halved here.
    /// When symmetrizing, north and south are not distinguished.
    fn normalize_layer(&self, mut layer: Layer) -> Layer {
        if layer.be_flag.is_endcap() {
            let name = layer.detector_name.as_str();
            if self.weights.divide_by_two_in_tracker_forward
                && (name.contains("TrackerForward") || name.contains("TkrForward"))
            {
                layer.layer_number /= 2;
            } else if self.weights.divide_by_two_in_tracker_endcap
                && (name.contains("TrackerEndcap") || name.contains("TkrEndcap"))
            {
                layer.layer_number /= 2;
            }
            if self.symmetrize {
                layer.be_flag = BarrelEndcapFlag::ENDCAP;
            }
        }
        layer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{HitCollection, McParticle};
    use crate::particle_filter::AcceptAllFilter;

    fn hit(particle: u64, time: f64, detector: &str, layer: i32, be_flag: BarrelEndcapFlag) -> SimTrackerHit {
        SimTrackerHit {
            particle,
            time,
            cell_id: 0,
            dedx: 0.0,
            path_length: 0.0,
            detector: Some(detector.to_string()),
            layer,
            be_flag,
        }
    }

    fn particle(id: u64) -> McParticle {
        McParticle {
            id,
            pdg: 13,
            charge: 1.0,
            momentum: [5.0, 0.0, 0.0],
            origin: [0.0, 0.0, 0.0],
        }
    }

    fn barrel_event(n_layers: i32) -> SimEvent {
        let hits = (0..n_layers)
            .rev()
            .map(|l| hit(1, l as f64, "SiTrackerBarrel", l, BarrelEndcapFlag::BARREL))
            .collect();
        SimEvent {
            event_number: 0,
            particles: vec![particle(1)],
            collections: vec![HitCollection {
                name: String::from("SiTrackerBarrelHits"),
                hits,
            }],
        }
    }

    fn builder(weights: LayerWeight, min_layers: usize, symmetrize: bool) -> LayerSetBuilder {
        LayerSetBuilder::new(weights, Box::new(AcceptAllFilter), min_layers, 3, symmetrize)
    }

    #[test]
    fn test_windows_follow_time_order() {
        let mut evb = builder(LayerWeight::default(), 3, true);
        let trajectories = evb.process_event(&barrel_event(5));
        assert_eq!(trajectories.len(), 1);
        let t = &trajectories[0];
        assert_eq!(t.layers.len(), 5);
        // 5 layers in a row give 3 windows of 3
        assert_eq!(t.windows.len(), 3);
        let first: Vec<i32> = t.windows[0].iter().map(|l| l.layer_number).collect();
        assert_eq!(first, vec![0, 1, 2]);
        let last: Vec<i32> = t.windows[2].iter().map(|l| l.layer_number).collect();
        assert_eq!(last, vec![2, 3, 4]);
    }

    #[test]
    fn test_min_layers() {
        let mut evb = builder(LayerWeight::default(), 6, true);
        assert!(evb.process_event(&barrel_event(5)).is_empty());
    }

    #[test]
    fn test_doubled_hits_do_not_double_windows() {
        let mut event = barrel_event(4);
        event.collections[0]
            .hits
            .push(hit(1, 1.5, "SiTrackerBarrel", 1, BarrelEndcapFlag::BARREL));
        let mut evb = builder(LayerWeight::default(), 3, true);
        let t = &evb.process_event(&event)[0];
        assert_eq!(t.layers.len(), 4);
        assert_eq!(t.windows.len(), 2);
    }

    #[test]
    fn test_zero_efficiency_drops_everything() {
        let mut weights = LayerWeight::default();
        weights
            .set_readout_efficiency("SiTrackerBarrelHits", 0.0)
            .unwrap();
        let mut evb = builder(weights, 1, true);
        assert!(evb.process_event(&barrel_event(5)).is_empty());
    }

    #[test]
    fn test_sampling_is_reproducible() {
        let mut weights = LayerWeight::default();
        weights
            .set_readout_efficiency("SiTrackerBarrelHits", 0.6)
            .unwrap();
        let mut a = builder(weights.clone(), 1, true);
        let mut b = builder(weights, 1, true);
        a.reseed(3);
        b.reseed(3);
        let event = barrel_event(20);
        for _ in 0..5 {
            assert_eq!(a.process_event(&event), b.process_event(&event));
        }
    }

    #[test]
    fn test_endcap_normalization() {
        let mut weights = LayerWeight::default();
        weights.divide_by_two_in_tracker_endcap = true;
        let event = SimEvent {
            event_number: 0,
            particles: vec![particle(1)],
            collections: vec![HitCollection {
                name: String::from("SiTrackerEndcapHits"),
                hits: vec![
                    hit(1, 0.0, "SiTrackerEndcap", 4, BarrelEndcapFlag::ENDCAP_NORTH),
                    hit(1, 1.0, "SiTrackerEndcap", 5, BarrelEndcapFlag::ENDCAP_NORTH),
                    hit(1, 2.0, "SiVertexEndcap", 3, BarrelEndcapFlag::ENDCAP_SOUTH),
                ],
            }],
        };

        let mut evb = builder(weights.clone(), 1, true);
        let t = &evb.process_event(&event)[0];
        assert_eq!(t.layers.len(), 2);
        assert!(t
            .layers
            .contains(&Layer::new("SiTrackerEndcap", 2, BarrelEndcapFlag::ENDCAP)));
        assert!(t
            .layers
            .contains(&Layer::new("SiVertexEndcap", 3, BarrelEndcapFlag::ENDCAP)));

        let mut evb = builder(weights, 1, false);
        let t = &evb.process_event(&event)[0];
        assert!(t.layers.contains(&Layer::new(
            "SiTrackerEndcap",
            2,
            BarrelEndcapFlag::ENDCAP_NORTH
        )));
    }
}
