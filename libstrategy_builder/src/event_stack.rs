use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::error::{EventFileError, EventStackError};
use super::event::EventFile;

/// Just enough of an event file to know which detector it was made with
#[derive(Debug, Deserialize)]
struct EventFileHeader {
    detector: String,
}

/// Read only the detector name of an event file
pub fn read_detector_name(path: &Path) -> Result<String, EventFileError> {
    if !path.exists() {
        return Err(EventFileError::BadFilePath(path.to_path_buf()));
    }
    let yaml_str = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str::<EventFileHeader>(&yaml_str)?.detector)
}

/// The collection of event files handled by one worker.
///
/// Files are opened one at a time, in the order given. Each file keeps the index it has in
/// the full configured list so that its inefficiency sampling does not depend on which worker
/// reads it. Every file must have been made with the same detector.
#[derive(Debug)]
pub struct EventStack {
    file_stack: VecDeque<(usize, PathBuf)>,
    pub total_stack_size_bytes: u64,
    detector: String,
    max_events: Option<usize>,
}

impl EventStack {
    /// Create a stack over the given (index, path) pairs, expecting data from `detector`
    pub fn new(
        files: Vec<(usize, PathBuf)>,
        detector: &str,
        max_events: Option<usize>,
    ) -> Result<Self, EventStackError> {
        if files.is_empty() {
            return Err(EventStackError::NoMatchingFiles);
        }

        let mut total_stack_size_bytes = 0;
        for (_, path) in files.iter() {
            if !path.exists() {
                return Err(EventStackError::FileError(EventFileError::BadFilePath(
                    path.clone(),
                )));
            }
            total_stack_size_bytes += path.metadata()?.len();
        }

        Ok(Self {
            file_stack: files.into(),
            total_stack_size_bytes,
            detector: detector.to_string(),
            max_events,
        })
    }

    pub fn n_files_remaining(&self) -> usize {
        self.file_stack.len()
    }

    /// Open the next file of the stack.
    ///
    /// Returns a `Result<Option<(usize, EventFile)>>`. The Option is None if the stack has no more
    /// files. If a maximum event count was given, the file is truncated to it.
    pub fn get_next_file(&mut self) -> Result<Option<(usize, EventFile)>, EventStackError> {
        let Some((index, path)) = self.file_stack.pop_front() else {
            return Ok(None);
        };

        let mut file = EventFile::read(&path)?;
        if file.detector != self.detector {
            return Err(EventStackError::DetectorChanged(
                path,
                file.detector,
                self.detector.clone(),
            ));
        }
        if let Some(max) = self.max_events {
            file.events.truncate(max);
        }
        Ok(Some((index, file)))
    }
}
