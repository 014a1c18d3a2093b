use super::layer::{BarrelEndcapFlag, SeedLayer, SeedType};
use super::strategy::SeedStrategy;
use super::strategy_xml::StrategyXmlMetadata;

const SYMMETRIZED_NOTE: &str =
    "NOTE: These layers are combined for both endcaps of this symmetrized strategy";

const HALVES: [BarrelEndcapFlag; 2] = [
    BarrelEndcapFlag::ENDCAP_NORTH,
    BarrelEndcapFlag::ENDCAP_SOUTH,
];

/// Split strategies built with north and south endcaps folded together back into per-endcap
/// strategies.
///
/// A strategy seeding or confirming on an `ENDCAP` layer is replaced by a north and a south copy
/// (named with the flag appended). A strategy that only extends onto `ENDCAP` layers is kept,
/// with every such layer replaced by its north and south variants. Barrel layers and layers
/// already flagged north or south are untouched. Mirrored copies are appended after the
/// remaining strategies.
///
/// Each strategy travels with a value (its score); both mirrored copies get their parent's.
pub fn symmetrize_strategies<T: Copy>(
    strategies: Vec<(SeedStrategy, T)>,
    meta: &mut StrategyXmlMetadata,
) -> Vec<(SeedStrategy, T)> {
    let mut kept = Vec::with_capacity(strategies.len());
    let mut mirrored = Vec::new();

    for (strategy, value) in strategies {
        let seeds_on_endcap = strategy
            .layers
            .iter()
            .any(|l| l.kind != SeedType::Extend && l.layer.be_flag == BarrelEndcapFlag::ENDCAP);

        if seeds_on_endcap {
            let comment = meta.strategy_comments.remove(&strategy.name);
            for half in HALVES {
                let mirror = mirror_strategy(&strategy, half);
                let note = match &comment {
                    Some(c) => format!("{c}\n{SYMMETRIZED_NOTE}"),
                    None => SYMMETRIZED_NOTE.to_string(),
                };
                meta.strategy_comments.insert(mirror.name.clone(), note);
                mirrored.push((mirror, value));
            }
        } else {
            kept.push((split_extension_layers(strategy), value));
        }
    }

    spdlog::debug!(
        "Symmetrized {} strategies into {}",
        mirrored.len() / 2,
        mirrored.len()
    );
    kept.append(&mut mirrored);
    kept
}

/// Copy of the strategy with every unsplit non-barrel layer moved to one half
fn mirror_strategy(strategy: &SeedStrategy, half: BarrelEndcapFlag) -> SeedStrategy {
    let layers = strategy
        .layers
        .iter()
        .map(|l| {
            if matches!(
                l.layer.be_flag,
                BarrelEndcapFlag::ENDCAP | BarrelEndcapFlag::UNKNOWN
            ) {
                SeedLayer::new(l.layer.with_flag(half), l.kind)
            } else {
                l.clone()
            }
        })
        .collect();
    let mut mirror = SeedStrategy::new(&format!("{}{}", strategy.name, half), layers);
    mirror.copy_cutoffs_from(strategy);
    mirror
}

/// Replace each `ENDCAP` extension layer by its north and south variants, in place
fn split_extension_layers(mut strategy: SeedStrategy) -> SeedStrategy {
    let mut layers = Vec::with_capacity(strategy.layers.len());
    for l in strategy.layers.drain(..) {
        if l.kind == SeedType::Extend && l.layer.be_flag == BarrelEndcapFlag::ENDCAP {
            for half in HALVES {
                layers.push(SeedLayer::new(l.layer.with_flag(half), SeedType::Extend));
            }
        } else {
            layers.push(l);
        }
    }
    strategy.layers = layers;
    strategy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Layer;

    fn layer(name: &str, number: i32, be_flag: BarrelEndcapFlag, kind: SeedType) -> SeedLayer {
        SeedLayer::new(Layer::new(name, number, be_flag), kind)
    }

    #[test]
    fn test_endcap_seeds_are_mirrored() {
        let mut strategy = SeedStrategy::new(
            "AUTOGEN0_1",
            vec![
                layer("SiTrackerEndcap", 0, BarrelEndcapFlag::ENDCAP, SeedType::Seed),
                layer("SiTrackerEndcap", 1, BarrelEndcapFlag::ENDCAP, SeedType::Seed),
                layer("SiTrackerBarrel", 0, BarrelEndcapFlag::BARREL, SeedType::Confirm),
                layer("SiTrackerEndcap", 2, BarrelEndcapFlag::ENDCAP, SeedType::Extend),
            ],
        );
        strategy.cutoffs.min_pt = 0.5;
        let mut meta = StrategyXmlMetadata::default();
        meta.strategy_comments
            .insert(strategy.name.clone(), String::from("stats"));

        let result = symmetrize_strategies(vec![(strategy.clone(), 7usize)], &mut meta);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].0.name, "AUTOGEN0_1ENDCAP_NORTH");
        assert_eq!(result[1].0.name, "AUTOGEN0_1ENDCAP_SOUTH");
        for ((mirror, value), half) in result.iter().zip(HALVES) {
            assert_eq!(*value, 7);
            assert_eq!(mirror.cutoffs, strategy.cutoffs);
            assert_eq!(mirror.layers.len(), 4);
            assert_eq!(mirror.layers[0].layer.be_flag, half);
            assert_eq!(mirror.layers[2].layer.be_flag, BarrelEndcapFlag::BARREL);
            assert_eq!(mirror.layers[3].layer.be_flag, half);
            assert_eq!(mirror.relevant_set(true), strategy.relevant_set(true));
            assert!(meta.strategy_comments[&mirror.name].starts_with("stats\n"));
        }
        assert!(!meta.strategy_comments.contains_key("AUTOGEN0_1"));
    }

    #[test]
    fn test_endcap_extensions_are_split() {
        let strategy = SeedStrategy::new(
            "barrel",
            vec![
                layer("SiTrackerBarrel", 0, BarrelEndcapFlag::BARREL, SeedType::Seed),
                layer("SiTrackerBarrel", 1, BarrelEndcapFlag::BARREL, SeedType::Confirm),
                layer("SiTrackerEndcap", 0, BarrelEndcapFlag::ENDCAP, SeedType::Extend),
                layer("SiTrackerBarrel", 2, BarrelEndcapFlag::BARREL, SeedType::Extend),
            ],
        );
        let mut meta = StrategyXmlMetadata::default();
        let result = symmetrize_strategies(vec![(strategy, 3usize)], &mut meta);
        assert_eq!(result.len(), 1);
        let flags: Vec<BarrelEndcapFlag> = result[0].0.layers.iter().map(|l| l.layer.be_flag).collect();
        assert_eq!(
            flags,
            vec![
                BarrelEndcapFlag::BARREL,
                BarrelEndcapFlag::BARREL,
                BarrelEndcapFlag::ENDCAP_NORTH,
                BarrelEndcapFlag::ENDCAP_SOUTH,
                BarrelEndcapFlag::BARREL,
            ]
        );
        assert_eq!(result[0].0.name, "barrel");
        assert_eq!(result[0].1, 3);
    }

    #[test]
    fn test_split_endcaps_are_untouched() {
        let strategy = SeedStrategy::new(
            "north",
            vec![
                layer("SiTrackerEndcap", 0, BarrelEndcapFlag::ENDCAP_NORTH, SeedType::Seed),
                layer("SiTrackerEndcap", 1, BarrelEndcapFlag::ENDCAP_NORTH, SeedType::Confirm),
            ],
        );
        let mut meta = StrategyXmlMetadata::default();
        let result = symmetrize_strategies(vec![(strategy.clone(), ())], &mut meta);
        assert_eq!(result, vec![(strategy, ())]);
    }
}
