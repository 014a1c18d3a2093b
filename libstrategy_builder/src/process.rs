use std::path::PathBuf;
use std::sync::mpsc::Sender;

use super::config::Config;
use super::error::{EventStackError, ProcessorError};
use super::event::EventFile;
use super::event_stack::{read_detector_name, EventStack};
use super::layer_set_builder::{LayerSetBuilder, LayerSetCollection, Trajectory};
use super::layer_weight::LayerWeight;
use super::strategy::SeedStrategy;
use super::strategy_builder::{check_detector, StrategyBuilder};
use super::strategy_xml::write_strategy_file;
use super::worker_status::{BarColor, WorkerStatus};

/// Trajectories of each event of one file, in event order
type FileTrajectories = Vec<Vec<Trajectory>>;

/// Build the trajectories of every event in one file, reporting progress as we go
fn process_file(
    builder: &mut LayerSetBuilder,
    file_index: usize,
    file: &EventFile,
    tx: &Sender<WorkerStatus>,
    worker_id: usize,
) -> Result<FileTrajectories, ProcessorError> {
    builder.reseed(file_index);
    let mut events = Vec::with_capacity(file.events.len());

    let n_events = file.events.len();
    let flush_val = (n_events / 100).max(1);
    tx.send(WorkerStatus::new(0.0, file_index, worker_id, BarColor::CYAN))?;
    for (count, event) in file.events.iter().enumerate() {
        events.push(builder.process_event(event));
        if (count + 1) % flush_val == 0 {
            tx.send(WorkerStatus::new(
                (count + 1) as f32 / n_events as f32,
                file_index,
                worker_id,
                BarColor::CYAN,
            ))?;
        }
    }
    tx.send(WorkerStatus::new(1.0, file_index, worker_id, BarColor::CYAN))?;

    Ok(events)
}

/// Process a subset of event files.
///
/// Returns the per-event trajectories of each file, tagged with the file's index in the full
/// list. No file is read past `max_events` events.
pub fn process_subset(
    config: Config,
    weights: LayerWeight,
    prototype: SeedStrategy,
    detector: String,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
    subset: Vec<(usize, PathBuf)>,
) -> Result<Vec<(usize, FileTrajectories)>, ProcessorError> {
    let mut stack = EventStack::new(subset, &detector, config.max_events)?;
    spdlog::info!(
        "Worker {worker_id} reading {} files with total size {}",
        stack.n_files_remaining(),
        human_bytes::human_bytes(stack.total_stack_size_bytes as f64)
    );

    let params = config.builder_params();
    let filter = config.make_filter(&prototype);
    let mut builder = LayerSetBuilder::new(
        weights,
        filter,
        params.min_layers,
        params.subset_size(),
        params.symmetrize,
    );

    let mut results = Vec::new();
    while let Some((file_index, file)) = stack.get_next_file()? {
        spdlog::info!("Processing file {file_index}...");
        let events = process_file(&mut builder, file_index, &file, &tx, worker_id)?;
        spdlog::info!(
            "Finished file {file_index}: {} trajectories from {} events.",
            events.iter().map(|e| e.len()).sum::<usize>(),
            events.len()
        );
        results.push((file_index, events));
    }
    Ok(results)
}

/// Divide the event files in to a set of subsets (per thread/worker), round robin.
/// Each file keeps its index in the full list.
pub fn create_subsets(files: &[PathBuf], n_threads: usize) -> Vec<Vec<(usize, PathBuf)>> {
    let mut subsets: Vec<Vec<(usize, PathBuf)>> = vec![Vec::new(); n_threads.max(1)];
    let n_subsets = subsets.len();

    for (idx, file) in files.iter().enumerate() {
        subsets[idx % n_subsets].push((idx, file.clone()))
    }

    subsets
}

/// Merge the per-file results in file order, whichever worker made them.
///
/// With a maximum, only the first `max_events` events of the run are kept, counted across
/// files in file order.
fn merge_file_results(
    mut per_file: Vec<(usize, FileTrajectories)>,
    max_events: Option<usize>,
) -> LayerSetCollection {
    per_file.sort_by_key(|(idx, _)| *idx);
    let mut remaining = max_events.unwrap_or(usize::MAX);
    let mut collection = LayerSetCollection::default();
    for (file_index, events) in per_file {
        if remaining == 0 {
            spdlog::info!("Event limit reached, file {file_index} is not used");
            continue;
        }
        let n_used = events.len().min(remaining);
        for trajectories in events.into_iter().take(n_used) {
            collection.push_event(trajectories);
        }
        remaining -= n_used;
    }
    collection
}

/// The main loop of strategy_builder.
///
/// This takes in a config (and progress monitor), gathers the layer sets of every event file
/// using `n_threads` workers, builds the strategies and writes them to the output file.
pub fn process(config: Config, tx: Sender<WorkerStatus>) -> Result<(), ProcessorError> {
    config.validate()?;
    let files = config.event_files()?;
    let weights = config.load_layer_weight()?;
    let prototype = config.load_prototype()?;
    let starting_strategies = config.load_starting_strategies()?;

    // The first file decides the detector; every other file is checked against it as it is read
    let detector = read_detector_name(&files[0]).map_err(EventStackError::from)?;
    check_detector(&weights, &detector)?;
    spdlog::info!(
        "Building strategies for detector {detector} from {} files",
        files.len()
    );

    let mut workers = Vec::new();
    for (worker_id, subset) in create_subsets(&files, config.n_threads as usize)
        .into_iter()
        .enumerate()
    {
        // Dont make empty workers
        if subset.is_empty() {
            continue;
        }
        let conf = config.clone();
        let weights = weights.clone();
        let prototype = prototype.clone();
        let detector = detector.clone();
        let tx = tx.clone();
        workers.push(std::thread::spawn(move || {
            process_subset(conf, weights, prototype, detector, tx, worker_id, subset)
        }));
    }

    // Every worker is joined before any failure is reported
    let mut per_file = Vec::new();
    let mut failure: Option<ProcessorError> = None;
    for worker in workers {
        match worker.join() {
            Ok(Ok(mut result)) => per_file.append(&mut result),
            Ok(Err(e)) => {
                spdlog::error!("A worker failed: {e}");
                failure.get_or_insert(e);
            }
            Err(_) => {
                spdlog::error!("An error occurred joining one of the workers!");
                failure.get_or_insert(ProcessorError::WorkerPanic);
            }
        }
    }
    if let Some(e) = failure {
        return Err(e);
    }

    let collection = merge_file_results(per_file, config.max_events);
    spdlog::info!(
        "Found {} trajectories in {} events.",
        collection.trajectories.len(),
        collection.n_events
    );

    tx.send(WorkerStatus::new(0.0, files.len(), 0, BarColor::GREEN))?;
    let params = config.builder_params();
    let builder = StrategyBuilder::new(&params, &weights, &prototype, &starting_strategies);
    let built = builder.build(&collection, &detector)?;
    tx.send(WorkerStatus::new(1.0, files.len(), 0, BarColor::GREEN))?;

    let output = config.output_file();
    write_strategy_file(&built.strategies, &output, Some(&built.meta))?;
    spdlog::info!(
        "Wrote {} strategies to {}",
        built.strategies.len(),
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterKind;
    use crate::event::{HitCollection, McParticle, SimEvent, SimTrackerHit};
    use crate::layer::BarrelEndcapFlag;
    use crate::strategy_xml::read_strategy_file;
    use std::path::Path;
    use std::sync::mpsc::{self, TryRecvError};

    /// One muon per event crossing `n_layers` barrel layers in order
    fn write_events(dir: &Path, name: &str, detector: &str, n_events: u64, n_layers: i32) -> PathBuf {
        let events = (0..n_events)
            .map(|event_number| SimEvent {
                event_number,
                particles: vec![McParticle {
                    id: 1,
                    pdg: 13,
                    charge: -1.0,
                    momentum: [4.0, 3.0, 0.5],
                    origin: [0.0, 0.0, 0.0],
                }],
                collections: vec![HitCollection {
                    name: String::from("SiTrackerBarrelHits"),
                    hits: (0..n_layers)
                        .map(|l| SimTrackerHit {
                            particle: 1,
                            time: l as f64,
                            cell_id: 0,
                            dedx: 0.0,
                            path_length: 0.0,
                            detector: Some(String::from("SiTrackerBarrel")),
                            layer: l,
                            be_flag: BarrelEndcapFlag::BARREL,
                        })
                        .collect(),
                }],
            })
            .collect();
        let file = EventFile {
            detector: detector.to_string(),
            events,
        };
        let path = dir.join(name);
        std::fs::write(&path, serde_yaml::to_string(&file).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_create_subsets() {
        let files: Vec<PathBuf> = (0..5).map(|i| PathBuf::from(format!("{i}.yml"))).collect();
        let subsets = create_subsets(&files, 2);
        assert_eq!(subsets.len(), 2);
        let first: Vec<usize> = subsets[0].iter().map(|(idx, _)| *idx).collect();
        assert_eq!(first, vec![0, 2, 4]);
        assert_eq!(subsets[1][0], (1, PathBuf::from("1.yml")));
    }

    #[test]
    fn test_process_writes_strategies() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            event_paths: vec![
                write_events(dir.path(), "a.yml", "sid02", 4, 5),
                write_events(dir.path(), "b.yml", "sid02", 3, 5),
                write_events(dir.path(), "c.yml", "sid02", 2, 5),
            ],
            output_path: dir.path().to_path_buf(),
            min_layers: 3,
            filter: FilterKind::All,
            n_threads: 2,
            ..Default::default()
        };

        let (tx, rx) = mpsc::channel::<WorkerStatus>();
        process(config.clone(), tx).unwrap();
        let statuses: Vec<WorkerStatus> = rx.try_iter().collect();
        assert!(statuses.iter().any(|s| s.color == BarColor::GREEN));
        assert!(statuses.iter().any(|s| s.file_index == 2 && s.progress == 1.0));

        let strategies = read_strategy_file(&config.output_file()).unwrap();
        assert_eq!(strategies.len(), 1);
        assert_eq!(strategies[0].layers.len(), 5);
    }

    #[test]
    fn test_max_events_counts_whole_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            event_paths: vec![
                write_events(dir.path(), "a.yml", "sid02", 4, 5),
                write_events(dir.path(), "b.yml", "sid02", 3, 5),
                write_events(dir.path(), "c.yml", "sid02", 2, 5),
            ],
            output_path: dir.path().to_path_buf(),
            min_layers: 3,
            filter: FilterKind::All,
            n_threads: 2,
            max_events: Some(5),
            ..Default::default()
        };

        let (tx, _rx) = mpsc::channel::<WorkerStatus>();
        process(config.clone(), tx).unwrap();
        // Four events of the first file and one of the second
        let written = std::fs::read_to_string(config.output_file()).unwrap();
        assert!(written.contains("Unweighted Score (num new tracks): 5 Adjacency"));
    }

    #[test]
    fn test_merge_file_results_in_file_order() {
        let layer = |l: i32| crate::layer::Layer::new("SiTrackerBarrel", l, BarrelEndcapFlag::BARREL);
        let event = |l: i32| {
            vec![Trajectory {
                layers: [layer(l)].into_iter().collect(),
                windows: Vec::new(),
            }]
        };
        let per_file = vec![
            (2, vec![event(20)]),
            (0, vec![event(0), vec![], event(2)]),
            (1, vec![event(10), event(11)]),
        ];

        let all = merge_file_results(per_file.clone(), None);
        assert_eq!(all.n_events, 6);
        assert_eq!(all.trajectories.len(), 5);

        let capped = merge_file_results(per_file, Some(4));
        assert_eq!(capped.n_events, 4);
        let numbers: Vec<i32> = capped
            .trajectories
            .iter()
            .flat_map(|t| t.layers.iter().map(|l| l.layer_number))
            .collect();
        assert_eq!(numbers, vec![0, 2, 10]);
    }

    #[test]
    fn test_failed_worker_waits_for_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        // Worker 0 fails on its second file while worker 1 is still reading
        let config = Config {
            event_paths: vec![
                write_events(dir.path(), "a.yml", "sid02", 1, 5),
                write_events(dir.path(), "b.yml", "sid02", 300, 8),
                write_events(dir.path(), "c.yml", "sidloi3", 1, 5),
                write_events(dir.path(), "d.yml", "sid02", 300, 8),
            ],
            output_path: dir.path().to_path_buf(),
            filter: FilterKind::All,
            n_threads: 2,
            ..Default::default()
        };

        let (tx, rx) = mpsc::channel::<WorkerStatus>();
        assert!(matches!(
            process(config, tx),
            Err(ProcessorError::StackError(
                EventStackError::DetectorChanged(_, _, _)
            ))
        ));
        // Worker 1 finished both of its files before the error came back
        let statuses: Vec<WorkerStatus> = rx.try_iter().collect();
        assert!(statuses
            .iter()
            .any(|s| s.file_index == 3 && s.progress == 1.0));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Disconnected)));
    }

    #[test]
    fn test_process_detector_changed() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            event_paths: vec![
                write_events(dir.path(), "a.yml", "sid02", 1, 5),
                write_events(dir.path(), "b.yml", "sidloi3", 1, 5),
            ],
            output_path: dir.path().to_path_buf(),
            filter: FilterKind::All,
            ..Default::default()
        };
        let (tx, _rx) = mpsc::channel::<WorkerStatus>();
        assert!(matches!(
            process(config, tx),
            Err(ProcessorError::StackError(
                EventStackError::DetectorChanged(_, _, _)
            ))
        ));
    }
}
