use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::LayerError;

/// Detector region of a layer.
///
/// The plain `ENDCAP` flag is the unsigned endcap: both north and south folded together.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[allow(non_camel_case_types, clippy::upper_case_acronyms)]
pub enum BarrelEndcapFlag {
    #[default]
    UNKNOWN,
    BARREL,
    ENDCAP,
    ENDCAP_NORTH,
    ENDCAP_SOUTH,
}

impl BarrelEndcapFlag {
    pub fn is_barrel(&self) -> bool {
        *self == Self::BARREL
    }

    pub fn is_endcap(&self) -> bool {
        matches!(self, Self::ENDCAP | Self::ENDCAP_NORTH | Self::ENDCAP_SOUTH)
    }

    /// North and south both become the unsigned `ENDCAP`
    pub fn fold_north_south(self) -> Self {
        if self.is_endcap() {
            Self::ENDCAP
        } else {
            self
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UNKNOWN => "UNKNOWN",
            Self::BARREL => "BARREL",
            Self::ENDCAP => "ENDCAP",
            Self::ENDCAP_NORTH => "ENDCAP_NORTH",
            Self::ENDCAP_SOUTH => "ENDCAP_SOUTH",
        }
    }
}

impl FromStr for BarrelEndcapFlag {
    type Err = LayerError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNKNOWN" => Ok(Self::UNKNOWN),
            "BARREL" => Ok(Self::BARREL),
            "ENDCAP" => Ok(Self::ENDCAP),
            "ENDCAP_NORTH" => Ok(Self::ENDCAP_NORTH),
            "ENDCAP_SOUTH" => Ok(Self::ENDCAP_SOUTH),
            _ => Err(LayerError::BadBarrelEndcapFlag(s.to_string())),
        }
    }
}

impl Display for BarrelEndcapFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A detector layer, identified only by where it is. Two hits on the same layer of the same
/// subdetector region compare equal regardless of which sensor they hit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Layer {
    pub detector_name: String,
    pub layer_number: i32,
    pub be_flag: BarrelEndcapFlag,
}

impl Layer {
    pub fn new(detector_name: &str, layer_number: i32, be_flag: BarrelEndcapFlag) -> Self {
        Self {
            detector_name: detector_name.to_string(),
            layer_number,
            be_flag,
        }
    }

    /// Same layer with a different region flag
    pub fn with_flag(&self, be_flag: BarrelEndcapFlag) -> Self {
        Self {
            detector_name: self.detector_name.clone(),
            layer_number: self.layer_number,
            be_flag,
        }
    }
}

impl Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.detector_name, self.layer_number, self.be_flag
        )
    }
}

/// The role a layer plays in a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SeedType {
    Seed,
    Confirm,
    Extend,
}

impl SeedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seed => "Seed",
            Self::Confirm => "Confirm",
            Self::Extend => "Extend",
        }
    }
}

impl FromStr for SeedType {
    type Err = LayerError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Seed" => Ok(Self::Seed),
            "Confirm" => Ok(Self::Confirm),
            "Extend" => Ok(Self::Extend),
            _ => Err(LayerError::BadSeedType(s.to_string())),
        }
    }
}

impl Display for SeedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A layer with its role in a strategy
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeedLayer {
    pub layer: Layer,
    pub kind: SeedType,
}

impl SeedLayer {
    pub fn new(layer: Layer, kind: SeedType) -> Self {
        Self { layer, kind }
    }
}
