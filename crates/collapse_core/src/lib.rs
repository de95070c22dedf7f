//! Wave Function Collapse for tile grids.
//!
//! This crate provides:
//! - `Ruleset`: weighted tiles and symmetric adjacency rules
//! - `WfcSolver`: observe/propagate loop with entropy-based cell selection
//! - `solve_with_retries`: restart-with-new-seed policy around the solver
//! - Tileset XML loading and JSON run configuration
//!
//! ```ignore
//! use collapse_core::{RulesetBuilder, SolverConfig, StdRandom, WfcSolver};
//!
//! let mut rules = RulesetBuilder::new();
//! let sea = rules.add_tile("sea", 3.0);
//! let land = rules.add_tile("land", 1.0);
//! rules.allow_all_directions(sea, sea);
//! rules.allow_all_directions(sea, land);
//! rules.allow_all_directions(land, land);
//!
//! let mut solver = WfcSolver::new(SolverConfig::new(16, 16), rules.build()?);
//! solver.startup()?;
//! solver.run(&mut StdRandom::from_seed(42));
//! ```

pub mod config;
pub mod retry;
pub mod rng;
pub mod ruleset;
pub mod solver;
pub mod tileset;
pub mod wave;

pub use config::{ConfigLoadError, RunConfig};
pub use retry::{solve_once, solve_with_retries, RetryPolicy, Solution, SolveError};
pub use rng::{DotNetRandom, RandomSource, RngKind, StdRandom};
pub use ruleset::{Direction, Ruleset, RulesetBuilder, RulesetError, Tile};
pub use solver::{ConfigError, Observation, SolverConfig, SolverState, WfcSolver};
pub use tileset::{load_tileset, parse_tileset, LoadError};
pub use wave::Wave;
