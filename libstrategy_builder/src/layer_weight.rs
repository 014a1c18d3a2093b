use std::cmp::Ordering;
use std::path::Path;

use fxhash::FxHashMap;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::Deserialize;

use super::constants::*;
use super::error::LayerWeightError;
use super::layer::{BarrelEndcapFlag, Layer};

/// The `<LayerWeight>` document as written on disk
#[derive(Debug, Deserialize)]
struct LayerWeightDoc {
    #[serde(rename = "DefaultWeight")]
    default_weight: f64,
    #[serde(rename = "DefaultReadoutEfficiency")]
    default_efficiency: f64,
    #[serde(rename = "AdjacenceMultiplier")]
    adjacence_multiplier: Option<f64>,
    #[serde(rename = "TargetDetector", default)]
    target_detectors: Vec<TargetDetectorDoc>,
    #[serde(rename = "ReadoutEfficiencies")]
    readout_efficiencies: Option<ReadoutEfficienciesDoc>,
    #[serde(rename = "Layers")]
    layers: WeightedLayersDoc,
}

#[derive(Debug, Deserialize)]
struct TargetDetectorDoc {
    #[serde(rename = "@divide_by_two_in_tracker_endcap")]
    divide_by_two_in_tracker_endcap: Option<bool>,
    #[serde(rename = "@divide_by_two_in_tracker_forward")]
    divide_by_two_in_tracker_forward: Option<bool>,
    #[serde(rename = "$text", default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ReadoutEfficienciesDoc {
    #[serde(rename = "ReadoutEfficiency", default)]
    readouts: Vec<ReadoutEfficiencyDoc>,
}

#[derive(Debug, Deserialize)]
struct ReadoutEfficiencyDoc {
    #[serde(rename = "@readout")]
    readout: String,
    #[serde(rename = "$text")]
    efficiency: f64,
}

#[derive(Debug, Deserialize)]
struct WeightedLayersDoc {
    #[serde(rename = "Layer", default)]
    layers: Vec<WeightedLayerDoc>,
}

#[derive(Debug, Deserialize)]
struct WeightedLayerDoc {
    #[serde(rename = "@layer_number")]
    layer_number: i32,
    #[serde(rename = "@detector_name")]
    detector_name: String,
    #[serde(rename = "@be_flag")]
    be_flag: BarrelEndcapFlag,
    #[serde(rename = "$text")]
    weight: f64,
}

/// LayerWeight carries the per-layer importance used by the SubsetScorer and to decide
/// which layers confirm and which seed. It also carries the per-readout hit efficiencies
/// used to model detector inefficiency.
#[derive(Debug, Clone)]
pub struct LayerWeight {
    weights: FxHashMap<Layer, f64>,
    readout_efficiencies: FxHashMap<String, f64>,
    pub default_weight: f64,
    pub adjacence_multiplier: f64,
    default_efficiency: f64,
    pub target_detector: String,
    pub divide_by_two_in_tracker_endcap: bool,
    pub divide_by_two_in_tracker_forward: bool,
}

impl Default for LayerWeight {
    fn default() -> Self {
        Self {
            weights: FxHashMap::default(),
            readout_efficiencies: FxHashMap::default(),
            default_weight: DEFAULT_WEIGHT,
            adjacence_multiplier: DEFAULT_ADJACENCE_MULTIPLIER,
            default_efficiency: DEFAULT_READOUT_EFFICIENCY,
            target_detector: NO_TARGET_DETECTOR.to_string(),
            divide_by_two_in_tracker_endcap: false,
            divide_by_two_in_tracker_forward: false,
        }
    }
}

fn check_efficiency(efficiency: f64, name: &str) -> Result<(), LayerWeightError> {
    if !(0.0..=1.0 + EFFICIENCY_TOLERANCE).contains(&efficiency) {
        return Err(LayerWeightError::BadEfficiency(
            efficiency,
            name.to_string(),
        ));
    }
    Ok(())
}

impl LayerWeight {
    pub fn set_weight(&mut self, layer: Layer, weight: f64) {
        self.weights.insert(layer, weight);
    }

    pub fn weight(&self, layer: &Layer) -> f64 {
        self.weights
            .get(layer)
            .copied()
            .unwrap_or(self.default_weight)
    }

    /// Product of the weights of every layer
    pub fn weight_of_set<'a>(&self, layers: impl IntoIterator<Item = &'a Layer>) -> f64 {
        layers.into_iter().map(|l| self.weight(l)).product()
    }

    pub fn set_readout_efficiency(
        &mut self,
        readout: &str,
        efficiency: f64,
    ) -> Result<(), LayerWeightError> {
        check_efficiency(efficiency, readout)?;
        self.readout_efficiencies
            .insert(readout.to_string(), efficiency);
        Ok(())
    }

    pub fn set_default_efficiency(&mut self, efficiency: f64) -> Result<(), LayerWeightError> {
        check_efficiency(efficiency, "default")?;
        self.default_efficiency = efficiency;
        Ok(())
    }

    pub fn readout_efficiency(&self, readout: &str) -> f64 {
        self.readout_efficiencies
            .get(readout)
            .copied()
            .unwrap_or(self.default_efficiency)
    }

    /// True if the weights were made for a specific detector
    pub fn has_target_detector(&self) -> bool {
        self.target_detector != NO_TARGET_DETECTOR
    }

    /// Orders layers by ascending weight
    pub fn compare(&self, a: &Layer, b: &Layer) -> Ordering {
        self.weight(a).total_cmp(&self.weight(b))
    }

    /// Read the weights from an XML file
    pub fn read_file(path: &Path) -> Result<Self, LayerWeightError> {
        if !path.exists() {
            return Err(LayerWeightError::BadFilePath(path.to_path_buf()));
        }
        let xml = std::fs::read_to_string(path)?;
        Self::from_xml(&xml)
    }

    pub fn from_xml(xml: &str) -> Result<Self, LayerWeightError> {
        let doc: LayerWeightDoc = quick_xml::de::from_str(xml)?;
        let mut lw = LayerWeight {
            default_weight: doc.default_weight,
            ..Default::default()
        };
        lw.set_default_efficiency(doc.default_efficiency)?;

        if let Some(multiplier) = doc.adjacence_multiplier {
            lw.adjacence_multiplier = multiplier;
        }

        // The divide-by-two attributes may sit on any of the TargetDetector elements
        for target in doc.target_detectors {
            lw.target_detector = target.name.trim().to_string();
            if let Some(divide) = target.divide_by_two_in_tracker_endcap {
                lw.divide_by_two_in_tracker_endcap = divide;
            }
            if let Some(divide) = target.divide_by_two_in_tracker_forward {
                lw.divide_by_two_in_tracker_forward = divide;
            }
        }

        for element in doc.layers.layers {
            let layer = Layer::new(&element.detector_name, element.layer_number, element.be_flag);
            lw.set_weight(layer, element.weight);
        }

        for element in doc
            .readout_efficiencies
            .map(|r| r.readouts)
            .unwrap_or_default()
        {
            lw.set_readout_efficiency(&element.readout, element.efficiency)?;
        }

        Ok(lw)
    }

    /// Render the weights as an XML document
    pub fn to_xml(&self) -> Result<String, LayerWeightError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut root = BytesStart::new("LayerWeight");
        root.push_attribute(("xmlns:xs", SCHEMA_NAMESPACE));
        root.push_attribute(("xs:noNamespaceSchemaLocation", STRATEGY_SCHEMA_LOCATION));
        writer.write_event(Event::Start(root))?;

        write_text_element(&mut writer, "DefaultWeight", &self.default_weight.to_string())?;
        write_text_element(
            &mut writer,
            "DefaultReadoutEfficiency",
            &self.default_efficiency.to_string(),
        )?;

        let mut target = BytesStart::new("TargetDetector");
        target.push_attribute((
            "divide_by_two_in_tracker_endcap",
            self.divide_by_two_in_tracker_endcap.to_string().as_str(),
        ));
        target.push_attribute((
            "divide_by_two_in_tracker_forward",
            self.divide_by_two_in_tracker_forward.to_string().as_str(),
        ));
        writer.write_event(Event::Start(target))?;
        writer.write_event(Event::Text(BytesText::new(&self.target_detector)))?;
        writer.write_event(Event::End(BytesEnd::new("TargetDetector")))?;

        write_text_element(
            &mut writer,
            "AdjacenceMultiplier",
            &self.adjacence_multiplier.to_string(),
        )?;

        writer.write_event(Event::Start(BytesStart::new("ReadoutEfficiencies")))?;
        let mut readouts: Vec<(&String, &f64)> = self.readout_efficiencies.iter().collect();
        readouts.sort_by(|a, b| a.0.cmp(b.0));
        for (readout, efficiency) in readouts {
            let mut element = BytesStart::new("ReadoutEfficiency");
            element.push_attribute(("readout", readout.as_str()));
            writer.write_event(Event::Start(element))?;
            writer.write_event(Event::Text(BytesText::new(&efficiency.to_string())))?;
            writer.write_event(Event::End(BytesEnd::new("ReadoutEfficiency")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("ReadoutEfficiencies")))?;

        writer.write_event(Event::Start(BytesStart::new("Layers")))?;
        let mut layers: Vec<(&Layer, &f64)> = self.weights.iter().collect();
        layers.sort_by(|a, b| a.0.cmp(b.0));
        for (layer, weight) in layers {
            let mut element = BytesStart::new("Layer");
            element.push_attribute(("layer_number", layer.layer_number.to_string().as_str()));
            element.push_attribute(("detector_name", layer.detector_name.as_str()));
            element.push_attribute(("be_flag", layer.be_flag.as_str()));
            writer.write_event(Event::Start(element))?;
            writer.write_event(Event::Text(BytesText::new(&weight.to_string())))?;
            writer.write_event(Event::End(BytesEnd::new("Layer")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("Layers")))?;

        writer.write_event(Event::End(BytesEnd::new("LayerWeight")))?;
        Ok(String::from_utf8_lossy(&writer.into_inner()).to_string())
    }

    /// Write the weights to an XML file
    pub fn write_file(&self, path: &Path) -> Result<(), LayerWeightError> {
        std::fs::write(path, self.to_xml()?)?;
        Ok(())
    }
}

fn write_text_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    value: &str,
) -> Result<(), LayerWeightError> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEIGHTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<LayerWeight>
    <DefaultWeight>1.0</DefaultWeight>
    <DefaultReadoutEfficiency>0.99</DefaultReadoutEfficiency>
    <TargetDetector divide_by_two_in_tracker_endcap="true">sid02</TargetDetector>
    <AdjacenceMultiplier>2.0</AdjacenceMultiplier>
    <ReadoutEfficiencies>
        <ReadoutEfficiency readout="SiTrackerBarrelHits">0.95</ReadoutEfficiency>
    </ReadoutEfficiencies>
    <Layers>
        <Layer layer_number="0" detector_name="SiVertexBarrel" be_flag="BARREL">1.5</Layer>
        <Layer layer_number="4" detector_name="SiTrackerBarrel" be_flag="BARREL">0.5</Layer>
    </Layers>
</LayerWeight>"#;

    #[test]
    fn test_read_weights() {
        let lw = LayerWeight::from_xml(WEIGHTS).unwrap();
        let vtx = Layer::new("SiVertexBarrel", 0, BarrelEndcapFlag::BARREL);
        let trk = Layer::new("SiTrackerBarrel", 4, BarrelEndcapFlag::BARREL);
        let other = Layer::new("SiTrackerBarrel", 3, BarrelEndcapFlag::BARREL);
        assert_eq!(lw.weight(&vtx), 1.5);
        assert_eq!(lw.weight(&other), 1.0);
        assert_eq!(lw.weight_of_set([&vtx, &trk, &other]), 0.75);
        assert_eq!(lw.adjacence_multiplier, 2.0);
        assert_eq!(lw.target_detector, "sid02");
        assert!(lw.has_target_detector());
        assert!(lw.divide_by_two_in_tracker_endcap);
        assert!(!lw.divide_by_two_in_tracker_forward);
        assert_eq!(lw.readout_efficiency("SiTrackerBarrelHits"), 0.95);
        assert_eq!(lw.readout_efficiency("SiVertexBarrelHits"), 0.99);
        assert_eq!(lw.compare(&trk, &vtx), Ordering::Less);
    }

    #[test]
    fn test_missing_default_weight_fails() {
        let xml = "<LayerWeight><DefaultReadoutEfficiency>1.0</DefaultReadoutEfficiency><Layers/></LayerWeight>";
        match LayerWeight::from_xml(xml) {
            Err(LayerWeightError::ParsingError(e)) => assert!(e.to_string().contains("DefaultWeight")),
            other => panic!("Expected a parsing error, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_layer_flag_fails() {
        let xml = WEIGHTS.replace("be_flag=\"BARREL\">0.5", "be_flag=\"BARRLE\">0.5");
        assert!(matches!(
            LayerWeight::from_xml(&xml),
            Err(LayerWeightError::ParsingError(_))
        ));
    }

    #[test]
    fn test_minimal_weights_use_defaults() {
        let xml = "<LayerWeight><DefaultWeight>2.0</DefaultWeight><DefaultReadoutEfficiency>1.0</DefaultReadoutEfficiency><Layers/></LayerWeight>";
        let lw = LayerWeight::from_xml(xml).unwrap();
        let layer = Layer::new("SiTrackerBarrel", 1, BarrelEndcapFlag::BARREL);
        assert_eq!(lw.weight(&layer), 2.0);
        assert_eq!(lw.adjacence_multiplier, DEFAULT_ADJACENCE_MULTIPLIER);
        assert!(!lw.has_target_detector());
        assert_eq!(lw.readout_efficiency("SiTrackerBarrelHits"), 1.0);
    }

    #[test]
    fn test_bad_efficiency_fails() {
        let mut lw = LayerWeight::default();
        assert!(lw.set_readout_efficiency("hits", 1.2).is_err());
        assert!(lw.set_readout_efficiency("hits", -0.1).is_err());
        assert!(lw.set_readout_efficiency("hits", 1.000000001).is_ok());
    }

    #[test]
    fn test_write_then_read_file() {
        let original = LayerWeight::from_xml(WEIGHTS).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.xml");
        original.write_file(&path).unwrap();
        let read = LayerWeight::read_file(&path).unwrap();
        let vtx = Layer::new("SiVertexBarrel", 0, BarrelEndcapFlag::BARREL);
        assert_eq!(read.weight(&vtx), 1.5);
        assert_eq!(read.target_detector, "sid02");
        assert!(read.divide_by_two_in_tracker_endcap);
        assert_eq!(read.readout_efficiency("SiTrackerBarrelHits"), 0.95);
        assert_eq!(read.readout_efficiency("anything"), 0.99);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            LayerWeight::read_file(Path::new("/no/such/weights.xml")),
            Err(LayerWeightError::BadFilePath(_))
        ));
    }
}
