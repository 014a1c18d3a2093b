use std::path::Path;

use fxhash::FxHashMap;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::Deserialize;

use super::constants::{SCHEMA_NAMESPACE, STRATEGY_SCHEMA_LOCATION};
use super::error::StrategyXmlError;
use super::layer::{BarrelEndcapFlag, Layer, SeedLayer, SeedType};
use super::strategy::{SeedStrategy, StrategyCutoffs};

/// The `<StrategyList>` document. Its `TargetDetector` is informational and not read back.
#[derive(Debug, Deserialize)]
struct StrategyListDoc {
    #[serde(rename = "Strategy", default)]
    strategies: Vec<StrategyDoc>,
}

#[derive(Debug, Deserialize)]
struct StrategyDoc {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "MinPT")]
    min_pt: f64,
    #[serde(rename = "MaxDCA")]
    max_dca: f64,
    #[serde(rename = "MaxZ0")]
    max_z0: f64,
    #[serde(rename = "MaxChisq")]
    max_chisq: f64,
    #[serde(rename = "BadHitChisq")]
    bad_hit_chisq: f64,
    #[serde(rename = "MinConfirm")]
    min_confirm: i32,
    #[serde(rename = "MinHits")]
    min_hits: i32,
    #[serde(rename = "Layers")]
    layers: SeedLayersDoc,
}

#[derive(Debug, Deserialize)]
struct SeedLayersDoc {
    #[serde(rename = "Layer", default)]
    layers: Vec<SeedLayerDoc>,
}

#[derive(Debug, Deserialize)]
struct SeedLayerDoc {
    #[serde(rename = "@type")]
    kind: SeedType,
    #[serde(rename = "@layer_number")]
    layer_number: i32,
    #[serde(rename = "@detector_name")]
    detector_name: String,
    #[serde(rename = "@be_flag")]
    be_flag: BarrelEndcapFlag,
}

impl From<StrategyDoc> for SeedStrategy {
    fn from(doc: StrategyDoc) -> Self {
        let layers = doc
            .layers
            .layers
            .into_iter()
            .map(|l| {
                SeedLayer::new(
                    Layer::new(&l.detector_name, l.layer_number, l.be_flag),
                    l.kind,
                )
            })
            .collect();
        let mut strategy = SeedStrategy::new(&doc.name, layers);
        strategy.cutoffs = StrategyCutoffs {
            min_pt: doc.min_pt,
            max_dca: doc.max_dca,
            max_z0: doc.max_z0,
            max_chisq: doc.max_chisq,
            bad_hit_chisq: doc.bad_hit_chisq,
            min_confirm: doc.min_confirm,
            min_hits: doc.min_hits,
        };
        strategy
    }
}

/// Extra information written alongside a strategy list.
///
/// Per-strategy comments are keyed by strategy name.
#[derive(Debug, Clone, Default)]
pub struct StrategyXmlMetadata {
    pub comment: Option<String>,
    pub target_detector: Option<String>,
    pub strategy_comments: FxHashMap<String, String>,
}

/// Read a list of strategies from an XML file
pub fn read_strategy_file(path: &Path) -> Result<Vec<SeedStrategy>, StrategyXmlError> {
    if !path.exists() {
        return Err(StrategyXmlError::BadFilePath(path.to_path_buf()));
    }
    let xml = std::fs::read_to_string(path)?;
    read_strategy_list(&xml)
}

/// Read the `index`-th strategy of a file to use as a prototype
pub fn read_prototype(path: &Path, index: usize) -> Result<SeedStrategy, StrategyXmlError> {
    let mut strategies = read_strategy_file(path)?;
    let n_strategies = strategies.len();
    if index >= n_strategies {
        return Err(StrategyXmlError::BadPrototypeIndex(index, n_strategies));
    }
    Ok(strategies.swap_remove(index))
}

/// Parse a strategy list document. Any malformed strategy fails the whole list.
pub fn read_strategy_list(xml: &str) -> Result<Vec<SeedStrategy>, StrategyXmlError> {
    let doc: StrategyListDoc = quick_xml::de::from_str(xml)?;
    Ok(doc.strategies.into_iter().map(SeedStrategy::from).collect())
}

/// Render a strategy list (with optional metadata) as an XML document
pub fn write_strategy_list(
    strategies: &[SeedStrategy],
    meta: Option<&StrategyXmlMetadata>,
) -> Result<String, StrategyXmlError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("StrategyList");
    root.push_attribute(("xmlns:xs", SCHEMA_NAMESPACE));
    root.push_attribute(("xs:noNamespaceSchemaLocation", STRATEGY_SCHEMA_LOCATION));
    writer.write_event(Event::Start(root))?;

    if let Some(comment) = meta.and_then(|m| m.comment.as_ref()) {
        write_comment(&mut writer, comment)?;
    }
    let target = meta
        .and_then(|m| m.target_detector.as_deref())
        .unwrap_or("None specified");
    write_text_element(&mut writer, "TargetDetector", target)?;

    for (idx, strategy) in strategies.iter().enumerate() {
        write_comment(&mut writer, &(idx + 1).to_string())?;

        let mut element = BytesStart::new("Strategy");
        element.push_attribute(("name", strategy.name.as_str()));
        writer.write_event(Event::Start(element))?;

        if let Some(comment) = meta.and_then(|m| m.strategy_comments.get(&strategy.name)) {
            write_comment(&mut writer, comment)?;
        }

        write_comment(&mut writer, "Cutoffs")?;
        let cutoffs = &strategy.cutoffs;
        write_text_element(&mut writer, "MinPT", &cutoffs.min_pt.to_string())?;
        write_text_element(&mut writer, "MinHits", &cutoffs.min_hits.to_string())?;
        write_text_element(&mut writer, "MinConfirm", &cutoffs.min_confirm.to_string())?;
        write_text_element(&mut writer, "MaxDCA", &cutoffs.max_dca.to_string())?;
        write_text_element(&mut writer, "MaxZ0", &cutoffs.max_z0.to_string())?;
        write_text_element(&mut writer, "MaxChisq", &cutoffs.max_chisq.to_string())?;
        write_text_element(&mut writer, "BadHitChisq", &cutoffs.bad_hit_chisq.to_string())?;

        write_comment(&mut writer, "Layers")?;
        writer.write_event(Event::Start(BytesStart::new("Layers")))?;
        for layer in strategy.layers.iter() {
            let mut element = BytesStart::new("Layer");
            element.push_attribute(("type", layer.kind.as_str()));
            element.push_attribute((
                "layer_number",
                layer.layer.layer_number.to_string().as_str(),
            ));
            element.push_attribute(("detector_name", layer.layer.detector_name.as_str()));
            element.push_attribute(("be_flag", layer.layer.be_flag.as_str()));
            writer.write_event(Event::Empty(element))?;
        }
        writer.write_event(Event::End(BytesEnd::new("Layers")))?;
        writer.write_event(Event::End(BytesEnd::new("Strategy")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("StrategyList")))?;
    Ok(String::from_utf8_lossy(&writer.into_inner()).to_string())
}

/// Write a strategy list to an XML file
pub fn write_strategy_file(
    strategies: &[SeedStrategy],
    path: &Path,
    meta: Option<&StrategyXmlMetadata>,
) -> Result<(), StrategyXmlError> {
    std::fs::write(path, write_strategy_list(strategies, meta)?)?;
    Ok(())
}

fn write_comment<W: std::io::Write>(
    writer: &mut Writer<W>,
    comment: &str,
) -> Result<(), StrategyXmlError> {
    // "--" is not allowed inside an XML comment
    let cleaned = comment.replace("--", "- -");
    writer.write_event(Event::Comment(BytesText::from_escaped(format!(" {cleaned} "))))?;
    Ok(())
}

fn write_text_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    value: &str,
) -> Result<(), StrategyXmlError> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
