use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::constants::*;
use super::error::{ConfigError, LayerWeightError, StrategyXmlError};
use super::layer_weight::LayerWeight;
use super::particle_filter::{AcceptAllFilter, ParticleFilter, StrategyBasedFilter};
use super::strategy::SeedStrategy;
use super::strategy_builder::BuilderParams;
use super::strategy_xml::{read_prototype, read_strategy_file};

/// Which particles the strategies should be able to find
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// Particles passing the prototype strategy's pT, DCA and z0 cutoffs
    #[default]
    Strategy,
    /// Every particle
    All,
}

/// Structure representing the application configuration. Contains pathing and run information
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml.
/// Any field missing from the YAML takes its default value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Event files, or directories of event files
    pub event_paths: Vec<PathBuf>,
    /// Output strategy list. If a directory, the list is written there as BuiltStrategies.xml
    pub output_path: PathBuf,
    pub layer_weight_path: Option<PathBuf>,
    pub starting_strategy_path: Option<PathBuf>,
    pub prototype_path: Option<PathBuf>,
    pub prototype_index: usize,
    pub min_layers: usize,
    pub confirm_layers: usize,
    pub seed_layers: usize,
    pub min_unweighted_score: usize,
    pub symmetrize: bool,
    pub old_confirm: bool,
    /// Maximum events used over the whole run, counted across files in file order
    pub max_events: Option<usize>,
    /// Solenoid field in Tesla, used by the strategy filter
    pub b_field: f64,
    pub filter: FilterKind,
    pub n_threads: i32,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            event_paths: Vec::new(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_NAME),
            layer_weight_path: None,
            starting_strategy_path: None,
            prototype_path: None,
            prototype_index: 0,
            min_layers: DEFAULT_MIN_LAYERS,
            confirm_layers: DEFAULT_CONFIRM_LAYERS,
            seed_layers: DEFAULT_SEED_LAYERS,
            min_unweighted_score: DEFAULT_MIN_UNWEIGHTED_SCORE,
            symmetrize: DEFAULT_SYMMETRIZE,
            old_confirm: false,
            max_events: None,
            b_field: DEFAULT_B_FIELD,
            filter: FilterKind::default(),
            n_threads: 1,
            verbose: false,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the configuration to a YAML file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }

    /// Check everything that can be checked before any file is opened
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_paths.is_empty() {
            return Err(ConfigError::NoEventFiles);
        }
        if self.seed_layers == 0 {
            return Err(ConfigError::NoSeedLayers);
        }
        if !self.is_n_threads_valid() {
            return Err(ConfigError::BadThreadCount(self.n_threads));
        }
        Ok(())
    }

    /// Every event file to read, in a fixed order. Directories are expanded to the YAML files
    /// they contain, sorted by name.
    pub fn event_files(&self) -> Result<Vec<PathBuf>, ConfigError> {
        let mut files = Vec::new();
        for path in self.event_paths.iter() {
            if !path.exists() {
                return Err(ConfigError::BadFilePath(path.clone()));
            }
            if path.is_dir() {
                let mut entries: Vec<PathBuf> = std::fs::read_dir(path)?
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .filter(|p| {
                        p.is_file()
                            && p.extension()
                                .is_some_and(|ext| ext == "yml" || ext == "yaml")
                    })
                    .collect();
                entries.sort();
                files.append(&mut entries);
            } else {
                files.push(path.clone());
            }
        }
        if files.is_empty() {
            return Err(ConfigError::NoEventFiles);
        }
        Ok(files)
    }

    /// Get the path to the output strategy list
    pub fn output_file(&self) -> PathBuf {
        if self.output_path.is_dir() {
            self.output_path.join(DEFAULT_OUTPUT_NAME)
        } else {
            self.output_path.clone()
        }
    }

    pub fn builder_params(&self) -> BuilderParams {
        BuilderParams {
            min_layers: self.min_layers,
            confirm_layers: self.confirm_layers,
            seed_layers: self.seed_layers,
            min_unweighted_score: self.min_unweighted_score,
            symmetrize: self.symmetrize,
            old_confirm: self.old_confirm,
        }
    }

    /// The configured weights, or uniform weights if none are configured
    pub fn load_layer_weight(&self) -> Result<LayerWeight, LayerWeightError> {
        match &self.layer_weight_path {
            Some(path) => LayerWeight::read_file(path),
            None => Ok(LayerWeight::default()),
        }
    }

    /// The strategy whose cutoffs every generated strategy copies
    pub fn load_prototype(&self) -> Result<SeedStrategy, StrategyXmlError> {
        match &self.prototype_path {
            Some(path) => read_prototype(path, self.prototype_index),
            None => Ok(SeedStrategy::new("Prototype", Vec::new())),
        }
    }

    pub fn load_starting_strategies(&self) -> Result<Vec<SeedStrategy>, StrategyXmlError> {
        match &self.starting_strategy_path {
            Some(path) => read_strategy_file(path),
            None => Ok(Vec::new()),
        }
    }

    pub fn make_filter(&self, prototype: &SeedStrategy) -> Box<dyn ParticleFilter> {
        match self.filter {
            FilterKind::Strategy => Box::new(StrategyBasedFilter::new(
                &prototype.cutoffs,
                self.b_field,
            )),
            FilterKind::All => Box::new(AcceptAllFilter),
        }
    }
}
