use std::collections::BTreeSet;

use bit_set::BitSet;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::constants::*;
use super::error::BuilderError;
use super::layer::{Layer, SeedLayer, SeedType};
use super::layer_set_builder::LayerSetCollection;
use super::layer_weight::LayerWeight;
use super::strategy::SeedStrategy;
use super::strategy_xml::StrategyXmlMetadata;
use super::subset::{all_subset_masks, n_choose_k, LayerIndex};
use super::subset_scorer::{SubsetScore, SubsetScorer};
use super::symmetrize::symmetrize_strategies;

/// Knobs of the strategy search
#[derive(Debug, Clone, PartialEq)]
pub struct BuilderParams {
    /// Particles crossing fewer layers are ignored
    pub min_layers: usize,
    pub confirm_layers: usize,
    pub seed_layers: usize,
    /// A subset must cover more than this many new trajectories to become a strategy
    pub min_unweighted_score: usize,
    pub symmetrize: bool,
    /// Always pick confirm layers by weight, ignoring adjacency
    pub old_confirm: bool,
}

impl Default for BuilderParams {
    fn default() -> Self {
        Self {
            min_layers: DEFAULT_MIN_LAYERS,
            confirm_layers: DEFAULT_CONFIRM_LAYERS,
            seed_layers: DEFAULT_SEED_LAYERS,
            min_unweighted_score: DEFAULT_MIN_UNWEIGHTED_SCORE,
            symmetrize: DEFAULT_SYMMETRIZE,
            old_confirm: false,
        }
    }
}

impl BuilderParams {
    /// Size of every candidate subset: seed plus confirm layers
    pub fn subset_size(&self) -> usize {
        self.seed_layers + self.confirm_layers
    }
}

/// Fail if the weights were made for another detector
pub fn check_detector(weights: &LayerWeight, detector: &str) -> Result<(), BuilderError> {
    if weights.has_target_detector() && weights.target_detector != detector {
        return Err(BuilderError::DetectorMismatch(
            detector.to_string(),
            weights.target_detector.clone(),
        ));
    }
    Ok(())
}

/// The final product: strategies ready to be written and their metadata.
///
/// `scores[i]` is the score `strategies[i]` was selected with. Symmetrized copies carry the
/// score of the strategy they were split from.
#[derive(Debug, Clone)]
pub struct BuiltStrategies {
    pub strategies: Vec<SeedStrategy>,
    pub scores: Vec<SubsetScore>,
    pub meta: StrategyXmlMetadata,
}

/// A subset picked by the greedy search
#[derive(Debug, Clone)]
struct Selection {
    layers: Vec<Layer>,
    score: SubsetScore,
    extension: Vec<Layer>,
}

/// Keeps the first strictly-greatest score seen, and how many later candidates tied it
#[derive(Debug, Default)]
struct BestCandidate {
    best: Option<(usize, SubsetScore)>,
    run_length: usize,
}

impl BestCandidate {
    fn offer(&mut self, idx: usize, score: SubsetScore) {
        let best_score = self.best.map_or(0.0, |(_, s)| s.score);
        if score.score > best_score {
            self.best = Some((idx, score));
            self.run_length = 0;
        } else if self.best.is_some() && score.score == best_score {
            self.run_length += 1;
        }
    }
}

/// StrategyBuilder synthesizes seed-finding strategies from the layer sets of simulated
/// trajectories by a greedy weighted set cover.
#[derive(Debug)]
pub struct StrategyBuilder<'a> {
    params: &'a BuilderParams,
    weights: &'a LayerWeight,
    prototype: &'a SeedStrategy,
    starting_strategies: &'a [SeedStrategy],
}

impl<'a> StrategyBuilder<'a> {
    pub fn new(
        params: &'a BuilderParams,
        weights: &'a LayerWeight,
        prototype: &'a SeedStrategy,
        starting_strategies: &'a [SeedStrategy],
    ) -> Self {
        Self {
            params,
            weights,
            prototype,
            starting_strategies,
        }
    }

    /// Run the full search over the given trajectories.
    ///
    /// The strategies come back symmetrized (if configured) and ordered by the number of
    /// trajectories they can find, most first.
    pub fn build(
        &self,
        collection: &LayerSetCollection,
        detector: &str,
    ) -> Result<BuiltStrategies, BuilderError> {
        check_detector(self.weights, detector)?;

        let all_layers = collection.all_layers();
        spdlog::info!("{} total layers.", all_layers.len());
        let index = LayerIndex::new(&all_layers);
        let mut scorer = SubsetScorer::new(collection, &index, self.weights);
        spdlog::info!(
            "{} trajectories with {} distinct layer sets.",
            collection.trajectories.len(),
            scorer.n_distinct()
        );

        let mut scored: Vec<(SeedStrategy, SubsetScore)> = Vec::new();
        let mut meta = StrategyXmlMetadata {
            comment: Some(generation_comment()),
            target_detector: Some(detector.to_string()),
            ..Default::default()
        };

        // Starting strategies go first so that nothing they already find is rebuilt
        spdlog::info!(
            "{} starting strategies defined.",
            self.starting_strategies.len()
        );
        for starter in self.starting_strategies.iter() {
            let relevant = starter.relevant_set(true);
            if relevant.is_empty() {
                return Err(BuilderError::EmptyStartingStrategy(starter.name.clone()));
            }
            let score = match index.to_mask(relevant.iter()) {
                Some(mask) => {
                    let score = scorer.score(&mask);
                    scorer.mark_used(&mask);
                    score
                }
                None => {
                    spdlog::warn!(
                        "Starting strategy {} uses layers never hit in the data",
                        starter.name
                    );
                    SubsetScore::default()
                }
            };
            meta.strategy_comments.insert(
                starter.name.clone(),
                format!(
                    "Num findable tracks (total, not additional): {}",
                    score.num_tracks
                ),
            );
            scored.push((starter.clone(), score));
        }

        let selections = self.greedy_cover(&index, &mut scorer);

        for (counter, selection) in selections.iter().enumerate() {
            let strategy = self.make_strategy(counter, selection, collection);
            meta.strategy_comments.insert(
                strategy.name.clone(),
                format!(
                    "AUTOGEN STATISTICS: Score: {} Unweighted Score (num new tracks): {} Adjacency: {}",
                    selection.score.score, selection.score.num_tracks, selection.score.adjacency
                ),
            );
            scored.push((strategy, selection.score));
        }

        if self.params.symmetrize {
            spdlog::info!("Symmetrizing...");
            scored = symmetrize_strategies(scored, &mut meta);
        }

        spdlog::debug!("Sorting output");
        scored.sort_by_key(|(_, score)| std::cmp::Reverse(score.num_tracks));
        let (strategies, scores) = scored.into_iter().unzip();

        Ok(BuiltStrategies {
            strategies,
            scores,
            meta,
        })
    }

    /// Repeatedly take the best scoring candidate until every trajectory is covered or no
    /// candidate covers enough new trajectories
    fn greedy_cover(&self, index: &LayerIndex, scorer: &mut SubsetScorer) -> Vec<Selection> {
        let subset_size = self.params.subset_size();
        spdlog::info!(
            "{} possible subsets of size {}",
            n_choose_k(index.len(), subset_size),
            subset_size
        );
        let candidates = all_subset_masks(index, subset_size);
        let mut selected = vec![false; candidates.len()];
        let mut selections = Vec::new();

        loop {
            spdlog::debug!("{} entries left to be covered.", scorer.n_unused());
            if scorer.all_used() {
                break;
            }

            let mut best = BestCandidate::default();
            for (idx, candidate) in candidates.iter().enumerate() {
                if selected[idx] {
                    continue;
                }
                best.offer(idx, scorer.score(candidate));
            }

            let Some((best_idx, best_score)) = best.best else {
                break;
            };
            if best_score.num_tracks <= self.params.min_unweighted_score {
                break;
            }
            if best.run_length > 0 {
                spdlog::debug!(
                    "{} candidates tied for the best score {}; taking the first",
                    best.run_length + 1,
                    best_score.score
                );
            }

            let winner = &candidates[best_idx];
            let extension = extension_layers(index, scorer, winner, self.weights);
            scorer.mark_used(winner);
            selected[best_idx] = true;

            let layers = index.to_layers(winner);
            spdlog::debug!(
                "Selected {:?} with score {} covering {} tracks",
                layers.iter().map(|l| l.to_string()).collect::<Vec<_>>(),
                best_score.score,
                best_score.num_tracks
            );
            selections.push(Selection {
                layers,
                score: best_score,
                extension,
            });
        }

        spdlog::info!("Done finding strategies: {} found", selections.len());
        selections
    }

    /// Turn a selected subset into a strategy, deciding which layers seed and which confirm
    fn make_strategy(
        &self,
        counter: usize,
        selection: &Selection,
        collection: &LayerSetCollection,
    ) -> SeedStrategy {
        let ordered = self.order_for_roles(&selection.layers, collection);

        let mut seeds = Vec::new();
        let mut confirms = Vec::new();
        for (idx, layer) in ordered.into_iter().enumerate() {
            if idx < self.params.confirm_layers {
                confirms.push(SeedLayer::new(layer, SeedType::Confirm));
            } else {
                seeds.push(SeedLayer::new(layer, SeedType::Seed));
            }
        }

        let mut layers = seeds;
        layers.append(&mut confirms);
        layers.extend(
            selection
                .extension
                .iter()
                .map(|l| SeedLayer::new(l.clone(), SeedType::Extend)),
        );

        let name = format!("AUTOGEN{}_{}", counter, fxhash::hash32(&layers));
        let mut strategy = SeedStrategy::new(&name, layers);
        strategy.copy_cutoffs_from(self.prototype);
        strategy
    }

    /// Order the layers of a subset so that the first `confirm_layers` are the confirm layers.
    ///
    /// Adjacent layers make the best seeds. If the whole subset was seen as a run of adjacent
    /// layers, the run is kept in order and confirmed from whichever end is lighter. If only a
    /// seed-sized part was, that part seeds and the rest confirm. Otherwise the lightest layers
    /// confirm.
    fn order_for_roles(&self, layers: &[Layer], collection: &LayerSetCollection) -> Vec<Layer> {
        let mut by_weight = layers.to_vec();
        by_weight.sort_by(|a, b| self.weights.compare(a, b));
        if self.params.old_confirm {
            return by_weight;
        }

        let subset: BTreeSet<&Layer> = layers.iter().collect();
        let windows = || collection.trajectories.iter().flat_map(|t| t.windows.iter());

        let full = windows().find(|w| {
            w.len() == subset.len() && w.iter().all(|l| subset.contains(l))
        });
        if let Some(window) = full {
            let mut ordered = window.clone();
            if let (Some(first), Some(last)) = (ordered.first(), ordered.last()) {
                if self.weights.weight(first) > self.weights.weight(last) {
                    ordered.reverse();
                }
            }
            return ordered;
        }

        let seed_layers = self.params.seed_layers;
        if seed_layers == 0 {
            return by_weight;
        }
        let partial = windows().find_map(|w| {
            w.windows(seed_layers)
                .find(|run| run.iter().all(|l| subset.contains(l)))
        });
        if let Some(run) = partial {
            let mut ordered: Vec<Layer> = by_weight
                .into_iter()
                .filter(|l| !run.contains(l))
                .collect();
            ordered.extend(run.iter().cloned());
            return ordered;
        }

        by_weight
    }
}

/// Layers of covering trajectories that are not in the subset, lightest first
fn extension_layers(
    index: &LayerIndex,
    scorer: &SubsetScorer,
    subset: &BitSet,
    weights: &LayerWeight,
) -> Vec<Layer> {
    let mut extra = BitSet::with_capacity(index.len());
    for set in scorer.supersets(subset) {
        extra.union_with(set);
    }
    extra.difference_with(subset);
    let mut layers = index.to_layers(&extra);
    layers.sort_by(|a, b| weights.compare(a, b));
    layers
}

fn generation_comment() -> String {
    let date = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("an unknown date"));
    format!("Strategy list autogenerated by {} on {date}.", env!("CARGO_PKG_NAME"))
}
