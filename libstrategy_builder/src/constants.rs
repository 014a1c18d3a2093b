// Builder defaults
pub const DEFAULT_MIN_LAYERS: usize = 7;
pub const DEFAULT_CONFIRM_LAYERS: usize = 1;
pub const DEFAULT_SEED_LAYERS: usize = 3;
pub const DEFAULT_MIN_UNWEIGHTED_SCORE: usize = 1;
pub const DEFAULT_SYMMETRIZE: bool = true;

/// Inefficiency sampling is reproducible: file N is sampled with RANDOM_SEED + N
pub const RANDOM_SEED: u64 = 1234;

// Strategy cutoff defaults
pub const DEFAULT_MIN_PT: f64 = 1.0; // GeV
pub const DEFAULT_MAX_DCA: f64 = 10.0; // mm
pub const DEFAULT_MAX_Z0: f64 = 10.0; // mm
pub const DEFAULT_MAX_CHISQ: f64 = 100.0;
pub const DEFAULT_BAD_HIT_CHISQ: f64 = 15.0;
pub const DEFAULT_MIN_CONFIRM: i32 = 1;
pub const DEFAULT_MIN_HITS: i32 = 7;

// LayerWeight defaults
pub const DEFAULT_WEIGHT: f64 = 1.0;
pub const DEFAULT_ADJACENCE_MULTIPLIER: f64 = 1.0;
pub const DEFAULT_READOUT_EFFICIENCY: f64 = 1.0;
pub const NO_TARGET_DETECTOR: &str = "None Specified";
// Slack for efficiencies written as 1.0000000001 by other tools
pub const EFFICIENCY_TOLERANCE: f64 = 1.0e-8;

/// Solenoid field used for helix parameters when none is configured, Tesla
pub const DEFAULT_B_FIELD: f64 = 5.0;
/// Speed of light in GeV / (T mm)
pub const SPEED_OF_LIGHT: f64 = 2.99792458e-4;

pub const SCHEMA_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const STRATEGY_SCHEMA_LOCATION: &str =
    "http://lcsim.org/recon/tracking/seedtracker/strategybuilder/strategies.xsd";
pub const DEFAULT_OUTPUT_NAME: &str = "BuiltStrategies.xml";
