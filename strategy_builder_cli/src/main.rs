//! # strategy_builder_cli
//!
//! Command line front end of strategy_builder.
//!
//! Run with `strategy_builder_cli -p config.yml`. To make a template configuration use
//! `strategy_builder_cli -p config.yml new`. Progress of each worker is shown as a bar; the
//! detailed log of the run is written to `strategy_builder.log` in the working directory.
use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;

use libstrategy_builder::config::Config;
use libstrategy_builder::process::process;
use libstrategy_builder::worker_status::{BarColor, WorkerStatus};

fn make_template_config(path: &Path) {
    let config = Config {
        event_paths: vec![PathBuf::from("./events/")],
        ..Default::default()
    };
    match config.write_config_file(path) {
        Ok(()) => log::info!("Done."),
        Err(e) => log::error!("Could not write template config: {e}"),
    }
}

/// Library logging goes to a file so it doesn't fight with the progress bars
fn init_file_logger() {
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(PathBuf::from("./strategy_builder.log"))
            .formatter(Box::new(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!(
                    "[{date_short} {time_short}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
                ),
            )))
            .truncate(true)
            .build()
            .expect("Could not create log file!"),
    );
    let logger = Arc::new(
        spdlog::Logger::builder()
            .flush_level_filter(spdlog::LevelFilter::All)
            .sink(file_sink)
            .build()
            .expect("Could not create logger!"),
    );
    spdlog::set_default_logger(logger);
}

fn make_bar(pb_manager: &MultiProgress, status: &WorkerStatus) -> ProgressBar {
    let template = match status.color {
        BarColor::CYAN => "{prefix:>24} [{bar:40.cyan/blue}] {percent:>3}%",
        BarColor::GREEN => "{prefix:>24} [{bar:40.green/blue}] {percent:>3}%",
    };
    let pb = pb_manager.add(ProgressBar::new(100));
    pb.set_style(
        ProgressStyle::with_template(template)
            .expect("Bad progress template!")
            .progress_chars("=> "),
    );
    pb
}

fn main() {
    // Create a cli
    let matches = Command::new("strategy_builder_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");

    // Parse the cli
    let config_path = PathBuf::from(matches.get_one::<String>("path").expect("We require args"));

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        make_template_config(&config_path);
        return;
    }

    init_file_logger();
    spdlog::info!("Starting strategy_builder_cli");

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Config successfully loaded.");
    for path in config.event_paths.iter() {
        log::info!("Event Path: {}", path.to_string_lossy());
    }
    log::info!("Output Path: {}", config.output_path.to_string_lossy());
    if let Some(path) = &config.layer_weight_path {
        log::info!("Layer Weights: {}", path.to_string_lossy());
    }
    if let Some(path) = &config.starting_strategy_path {
        log::info!("Starting Strategies: {}", path.to_string_lossy());
    }
    if let Some(path) = &config.prototype_path {
        log::info!(
            "Prototype: strategy {} of {}",
            config.prototype_index,
            path.to_string_lossy()
        );
    }
    log::info!(
        "Seed Layers: {} Confirm Layers: {} Min Layers: {}",
        config.seed_layers,
        config.confirm_layers,
        config.min_layers
    );
    log::info!("Number of Workers: {}", config.n_threads);

    if config.verbose {
        spdlog::default_logger()
            .set_level_filter(spdlog::LevelFilter::MoreSevereEqual(spdlog::Level::Debug));
    }

    // Spawn the task!
    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    let handle = std::thread::spawn(move || process(config, tx));

    // One bar per worker, plus one for the strategy search
    let mut bars: HashMap<(usize, bool), ProgressBar> = HashMap::new();
    loop {
        match rx.recv_timeout(std::time::Duration::from_millis(500)) {
            Ok(status) => {
                let is_search = status.color == BarColor::GREEN;
                let pb = bars
                    .entry((status.worker_id, is_search))
                    .or_insert_with(|| make_bar(&pb_manager, &status));
                if is_search {
                    pb.set_prefix("Building strategies");
                } else {
                    pb.set_prefix(format!(
                        "Worker {} file {}",
                        status.worker_id, status.file_index
                    ));
                }
                pb.set_position((status.progress * 100.0) as u64);
            }
            Err(RecvTimeoutError::Timeout) => (),
            // Every sender is gone: the processing is over
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    for pb in bars.values() {
        pb.finish();
    }

    match handle.join() {
        Ok(result) => match result {
            Ok(_) => log::info!("Successfully built strategies!"),
            Err(e) => {
                log::error!("Building strategies failed with error: {e}");
                log::error!("Check strategy_builder.log for details.");
            }
        },
        Err(_) => log::error!("Failed to join processing task!"),
    }

    log::info!("Done.");
}
