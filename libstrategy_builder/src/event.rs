use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::EventFileError;
use super::layer::{BarrelEndcapFlag, Layer};

/// A simulated particle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McParticle {
    pub id: u64,
    #[serde(default)]
    pub pdg: i32,
    pub charge: f64,
    /// GeV
    pub momentum: [f64; 3],
    /// Production vertex, mm
    #[serde(default)]
    pub origin: [f64; 3],
}

impl McParticle {
    pub fn pt(&self) -> f64 {
        self.momentum[0].hypot(self.momentum[1])
    }
}

/// A simulated tracker hit.
///
/// The detector element has already been resolved to a layer; hits that did not land in a
/// known detector element have no `detector`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimTrackerHit {
    pub particle: u64,
    pub time: f64,
    #[serde(default)]
    pub cell_id: i64,
    #[serde(default)]
    pub dedx: f64,
    #[serde(default)]
    pub path_length: f64,
    #[serde(default)]
    pub detector: Option<String>,
    #[serde(default)]
    pub layer: i32,
    #[serde(default)]
    pub be_flag: BarrelEndcapFlag,
}

impl SimTrackerHit {
    /// The layer of this hit, if it hit a detector element
    pub fn layer(&self) -> Option<Layer> {
        self.detector
            .as_ref()
            .map(|name| Layer::new(name, self.layer, self.be_flag))
    }
}

/// A named collection of hits; the name is the readout the hits came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitCollection {
    pub name: String,
    pub hits: Vec<SimTrackerHit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    pub event_number: u64,
    pub particles: Vec<McParticle>,
    pub collections: Vec<HitCollection>,
}

impl SimEvent {
    pub fn particle(&self, id: u64) -> Option<&McParticle> {
        self.particles.iter().find(|p| p.id == id)
    }
}

/// One file of simulated events, all made with the same detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFile {
    pub detector: String,
    pub events: Vec<SimEvent>,
}

impl EventFile {
    /// Read an event file in the YAML event format
    pub fn read(path: &Path) -> Result<Self, EventFileError> {
        if !path.exists() {
            return Err(EventFileError::BadFilePath(path.to_path_buf()));
        }
        let yaml_str = std::fs::read_to_string(path)?;
        let file = serde_yaml::from_str::<Self>(&yaml_str)?;
        file.check_hits()?;
        Ok(file)
    }

    /// Every hit must belong to a particle of its event
    fn check_hits(&self) -> Result<(), EventFileError> {
        for event in self.events.iter() {
            for collection in event.collections.iter() {
                for hit in collection.hits.iter() {
                    if event.particle(hit.particle).is_none() {
                        return Err(EventFileError::UnknownParticle(
                            collection.name.clone(),
                            hit.particle,
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENTS: &str = r#"
detector: sid02
events:
  - event_number: 0
    particles:
      - id: 1
        pdg: 13
        charge: -1.0
        momentum: [3.0, 4.0, 1.0]
    collections:
      - name: SiTrackerBarrelHits
        hits:
          - particle: 1
            time: 0.5
            detector: SiTrackerBarrel
            layer: 2
            be_flag: BARREL
          - particle: 1
            time: 0.7
"#;

    #[test]
    fn test_read_event_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.yml");
        std::fs::write(&path, EVENTS).unwrap();
        let file = EventFile::read(&path).unwrap();
        assert_eq!(file.detector, "sid02");
        let event = &file.events[0];
        assert_eq!(event.particle(1).unwrap().pt(), 5.0);
        assert_eq!(event.particle(1).unwrap().origin, [0.0, 0.0, 0.0]);
        let hits = &event.collections[0].hits;
        assert_eq!(
            hits[0].layer(),
            Some(Layer::new("SiTrackerBarrel", 2, BarrelEndcapFlag::BARREL))
        );
        assert_eq!(hits[1].layer(), None);
    }

    #[test]
    fn test_unknown_particle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.yml");
        std::fs::write(&path, EVENTS.replace("- particle: 1\n            time: 0.7", "- particle: 9\n            time: 0.7")).unwrap();
        assert!(matches!(
            EventFile::read(&path),
            Err(EventFileError::UnknownParticle(_, 9))
        ));
    }
}
