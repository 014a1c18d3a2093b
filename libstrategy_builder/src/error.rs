use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::WorkerStatus;

#[derive(Debug, Clone, Error)]
pub enum LayerError {
    #[error("Invalid barrel/endcap flag {0} found")]
    BadBarrelEndcapFlag(String),
    #[error("Invalid seed layer type {0} found")]
    BadSeedType(String),
}

#[derive(Debug, Error)]
pub enum LayerWeightError {
    #[error("Could not load LayerWeight because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("LayerWeight failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("LayerWeight failed to parse XML: {0}")]
    ParsingError(#[from] quick_xml::DeError),
    #[error("LayerWeight failed to write XML: {0}")]
    WriteError(#[from] quick_xml::Error),
    #[error("Readout efficiency {0} for {1} must be between 0 and 1")]
    BadEfficiency(f64, String),
}

#[derive(Debug, Error)]
pub enum StrategyXmlError {
    #[error("Could not load strategy list because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Strategy list failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Strategy list failed to parse XML: {0}")]
    ParsingError(#[from] quick_xml::DeError),
    #[error("Strategy list failed to write XML: {0}")]
    WriteError(#[from] quick_xml::Error),
    #[error("Prototype index {0} is out of range for a strategy list of {1} strategies")]
    BadPrototypeIndex(usize, usize),
}

#[derive(Debug, Error)]
pub enum EventFileError {
    #[error("Could not open event file because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Event file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Event file failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Hit in collection {0} refers to unknown particle {1}")]
    UnknownParticle(String, u64),
}

#[derive(Debug, Error)]
pub enum EventStackError {
    #[error("EventStack was given no event files")]
    NoMatchingFiles,
    #[error("EventStack failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("EventStack failed due to event file error: {0}")]
    FileError(#[from] EventFileError),
    #[error("Event file {0:?} was made with detector {1}, but the run uses detector {2}")]
    DetectorChanged(PathBuf, String, String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config has no event files to process")]
    NoEventFiles,
    #[error("Config requires at least one seed layer")]
    NoSeedLayers,
    #[error("Config requires at least one worker thread, found {0}")]
    BadThreadCount(i32),
}

#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("Layer weights target detector {1}, but the data was made with detector {0}")]
    DetectorMismatch(String, String),
    #[error("Starting strategy {0} has no seed or confirm layers")]
    EmptyStartingStrategy(String),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to LayerWeight error: {0}")]
    WeightError(#[from] LayerWeightError),
    #[error("Processor failed due to strategy list error: {0}")]
    StrategyError(#[from] StrategyXmlError),
    #[error("Processor failed due to EventStack error: {0}")]
    StackError(#[from] EventStackError),
    #[error("Processor failed due to StrategyBuilder error: {0}")]
    BuilderError(#[from] BuilderError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed because a worker thread panicked")]
    WorkerPanic,
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
