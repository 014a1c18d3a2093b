//! # strategy_builder
//!
//! strategy_builder generates seed-tracking strategy lists from simulated events, written in
//! Rust. It reads simulated tracker hits, works out which detector layers each findable
//! particle crossed, and then picks a small set of layer combinations (seed + confirm layers)
//! that together can seed as many of those particles as possible. The result is written as a
//! strategy list XML document that a seed tracker can load directly.
//!
//! ## Installation
//!
//! The only method of install is from source.
//!
//! ### Rust
//!
//! If you have not used Rust before, you will most likely need to install the Rust tool
//! chain. See the [Rust docs](https://www.rust-lang.org/tools/install) for installation
//! instructions.
//!
//! ### Building & Install
//!
//! To build and install the CLI use `cargo install --path ./strategy_builder_cli` from the
//! top level repository. The binary will be installed to your cargo install location
//! (typically something like `~/.cargo/bin/`).
//!
//! ## How it works
//!
//! 1. Every event file is read by one of `n_threads` workers. Hits are thinned according to
//! the readout efficiencies of the layer weights (reproducibly: file N is always sampled with
//! the same random seed), grouped by particle, and particles failing the filter are dropped.
//! Each remaining particle becomes a trajectory: the set of layers it crossed, plus every run
//! of `seed_layers + confirm_layers` distinct layers it crossed consecutively in time
//! (an adjacency window).
//! 2. Every combination of `seed_layers + confirm_layers` layers is scored as
//! `tracks * product(layer weights) * (1 + adjacency * adjacence_multiplier)`, where `tracks`
//! is the number of trajectories not yet covered that contain the combination and
//! `adjacency` is the fraction of them for which the combination was an adjacency window.
//! 3. The best combination becomes a strategy and its trajectories are marked as covered.
//! This repeats until every trajectory is covered or the best combination covers no more
//! than `min_unweighted_score` new trajectories.
//! 4. Each strategy gets its confirm layers (light layers, or the end of an adjacency
//! window), and every other layer crossed by the trajectories it covers as extension layers.
//! 5. If symmetrizing, strategies built on the folded endcap are split into north and south
//! copies.
//!
//! ## Configuration
//!
//! The CLI reads a YAML configuration. A template can be made with
//! `strategy_builder_cli -p config.yml new`. Any field left out takes its default:
//!
//! ```yml
//! event_paths:
//! - ./events/
//! output_path: BuiltStrategies.xml
//! layer_weight_path: null
//! starting_strategy_path: null
//! prototype_path: null
//! prototype_index: 0
//! min_layers: 7
//! confirm_layers: 1
//! seed_layers: 3
//! min_unweighted_score: 1
//! symmetrize: true
//! old_confirm: false
//! max_events: null
//! b_field: 5.0
//! filter: strategy
//! n_threads: 1
//! verbose: false
//! ```
//!
//! - event_paths: Event files, or directories whose `.yml`/`.yaml` files are all read (in
//! name order). Every file must come from the same detector.
//! - output_path: The output strategy list. If it is a directory, `BuiltStrategies.xml` is
//! written inside it.
//! - layer_weight_path: A layer weight XML file. Without one every layer weighs 1.
//! - starting_strategy_path: A strategy list whose strategies are always kept; trajectories
//! they can find are not used to build new strategies.
//! - prototype_path/prototype_index: The strategy (0-indexed) whose cutoffs every generated
//! strategy copies. Without one the default cutoffs are used.
//! - max_events: Use at most this many events over the whole run, counted across files in
//! file order.
//! - filter: `strategy` keeps particles passing the prototype's pT, DCA and z0 cutoffs
//! (using `b_field`, in Tesla); `all` keeps every particle.
//! - old_confirm: Always pick the lightest layers as confirm layers, ignoring adjacency.
//! - verbose: Log every selection step.
//!
//! ### Event Format
//!
//! ```yml
//! detector: sid02
//! events:
//! - event_number: 0
//!   particles:
//!   - id: 1
//!     pdg: 13
//!     charge: -1.0
//!     momentum: [3.0, 4.0, 1.0] # GeV
//!     origin: [0.0, 0.0, 0.0]   # mm, optional
//!   collections:
//!   - name: SiTrackerBarrelHits
//!     hits:
//!     - particle: 1
//!       time: 0.5
//!       detector: SiTrackerBarrel # omit for hits outside any detector element
//!       layer: 2
//!       be_flag: BARREL
//! ```
//!
//! The collection name is the readout name used to look up readout efficiencies.
//!
//! ## Output
//!
//! strategy_builder will output two files: the strategy list XML and a log file
//! (`strategy_builder.log`). Each strategy in the list carries a comment with its score, and
//! strategies are ordered by the number of trajectories they can find, most first.
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod event_stack;
pub mod layer;
pub mod layer_set_builder;
pub mod layer_weight;
pub mod particle_filter;
pub mod process;
pub mod strategy;
pub mod strategy_builder;
pub mod strategy_xml;
pub mod subset;
pub mod subset_scorer;
pub mod symmetrize;
pub mod worker_status;
