#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BarColor {
    #[default]
    CYAN,
    GREEN,
}

/// Progress message sent from a layer-set worker to whoever is watching (typically the CLI).
///
/// `file_index` is the position of the file currently being read in the configured event list.
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub file_index: usize,
    pub worker_id: usize,
    pub color: BarColor,
}

impl WorkerStatus {
    pub fn new(progress: f32, file_index: usize, worker_id: usize, color: BarColor) -> Self {
        Self {
            progress,
            file_index,
            worker_id,
            color,
        }
    }
}
