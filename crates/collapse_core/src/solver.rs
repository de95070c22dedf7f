//! Wave Function Collapse solver.
//!
//! Drives the observe/propagate loop over a grid:
//! - `startup()` - Validate the configuration and seed wave state
//! - `observe()` - Pick the minimum entropy cell and collapse it
//! - `ban()` - Remove one candidate and update entropy
//! - `propagate()` - Stack-based arc consistency until fixpoint
//!
//! There is no backtracking. A contradiction ends the run; restarting with
//! another seed is the caller's job (see `retry`).

use crate::rng::RandomSource;
use crate::ruleset::{Direction, Ruleset, DIRECTIONS, DX, DY, OPPOSITE};
use crate::wave::Wave;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace, warn};

/// Magnitude of the tie-break noise added to entropies during selection.
const ENTROPY_NOISE: f64 = 1e-6;

/// Grid shape and selection options for one solve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub width: usize,
    pub height: usize,
    /// Whether the grid wraps around (toroidal)
    pub periodic: bool,
    /// Cells skipped when scanning for the next cell to observe
    pub excluded_cells: Vec<usize>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            width: 8,
            height: 8,
            periodic: false,
            excluded_cells: Vec::new(),
        }
    }
}

impl SolverConfig {
    /// Non-periodic grid of `width` x `height` cells with no exclusions.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Set whether neighbours wrap around the grid edges.
    pub fn periodic(mut self, periodic: bool) -> Self {
        self.periodic = periodic;
        self
    }

    /// Replace the set of cells skipped by the observation scan.
    ///
    /// Excluded cells still take part in propagation and are collapsed last,
    /// once every other cell is decided.
    pub fn with_excluded_cells(mut self, cells: impl IntoIterator<Item = usize>) -> Self {
        self.excluded_cells = cells.into_iter().collect();
        self
    }

    /// Total cell count, or `None` if `width * height` overflows.
    pub fn cells(&self) -> Option<usize> {
        self.width.checked_mul(self.height)
    }
}

/// Invalid solver configuration, reported by `startup()`.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    EmptyGrid { width: usize, height: usize },
    EmptyTileSet,
    /// Weights must be finite and strictly positive
    InvalidWeight { tile: usize, weight: f64 },
    ExcludedCellOutOfRange { cell: usize, cells: usize },
    /// Grid dimensions overflow the cell or counter indexing
    GridTooLarge { width: usize, height: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyGrid { width, height } => {
                write!(f, "grid must not be empty (got {}x{})", width, height)
            }
            ConfigError::EmptyTileSet => write!(f, "tile set is empty"),
            ConfigError::InvalidWeight { tile, weight } => {
                write!(f, "tile {} has weight {}, weights must be positive", tile, weight)
            }
            ConfigError::ExcludedCellOutOfRange { cell, cells } => {
                write!(f, "excluded cell {} is outside the grid of {} cells", cell, cells)
            }
            ConfigError::GridTooLarge { width, height } => {
                write!(f, "grid of {}x{} cells is too large", width, height)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// State of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    Unstarted,
    Running,
    /// Every cell holds exactly one tile
    Solved,
    /// Some cell ran out of candidates
    Contradiction,
}

/// Result of a single `observe()` step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Continue,
    Contradiction,
    Solved,
}

enum Selection {
    Cell(usize),
    Decided,
    Empty(usize),
}

/// Owns all wave state for one solve.
pub struct WfcSolver {
    config: SolverConfig,
    rules: Ruleset,

    weights: Vec<f64>,
    weight_log_weights: Vec<f64>,
    sum_of_weights: f64,
    sum_of_weight_log_weights: f64,
    starting_entropy: f64,

    wave: Wave,
    excluded: Vec<bool>,

    /// Pending bans: (cell, tile)
    stack: Vec<(usize, usize)>,

    /// Reused buffer for weighted sampling
    distribution: Vec<f64>,

    observed: Vec<usize>,
    state: SolverState,
    /// First non-excluded cell emptied by a ban
    first_empty: Option<usize>,
    contradiction_cell: Option<usize>,
    observations: usize,
}

impl WfcSolver {
    /// Create an unstarted solver. Nothing is validated or allocated until `startup()`.
    pub fn new(config: SolverConfig, rules: Ruleset) -> Self {
        Self {
            config,
            rules,
            weights: Vec::new(),
            weight_log_weights: Vec::new(),
            sum_of_weights: 0.0,
            sum_of_weight_log_weights: 0.0,
            starting_entropy: 0.0,
            wave: Wave::new(0, 0),
            excluded: Vec::new(),
            stack: Vec::new(),
            distribution: Vec::new(),
            observed: Vec::new(),
            state: SolverState::Unstarted,
            first_empty: None,
            contradiction_cell: None,
            observations: 0,
        }
    }

    /// Validate the configuration, allocate wave state and apply the bans
    /// implied by the rule table alone.
    ///
    /// A tile that no possible neighbour supports is removed up front. If that
    /// empties a cell the solver goes straight to `Contradiction`.
    pub fn startup(&mut self) -> Result<(), ConfigError> {
        let (width, height) = (self.config.width, self.config.height);
        if width == 0 || height == 0 {
            return Err(ConfigError::EmptyGrid { width, height });
        }
        if self.rules.is_empty() {
            return Err(ConfigError::EmptyTileSet);
        }
        for (tile, t) in self.rules.tiles().iter().enumerate() {
            if !(t.weight.is_finite() && t.weight > 0.0) {
                return Err(ConfigError::InvalidWeight {
                    tile,
                    weight: t.weight,
                });
            }
        }

        let tiles = self.rules.len();
        let cells = self
            .config
            .cells()
            .filter(|_| width <= i32::MAX as usize && height <= i32::MAX as usize)
            .filter(|&cells| {
                cells
                    .checked_mul(tiles)
                    .and_then(|n| n.checked_mul(DIRECTIONS))
                    .is_some()
            })
            .ok_or(ConfigError::GridTooLarge { width, height })?;
        let mut excluded = vec![false; cells];
        for &cell in &self.config.excluded_cells {
            if cell >= cells {
                return Err(ConfigError::ExcludedCellOutOfRange { cell, cells });
            }
            excluded[cell] = true;
        }
        self.excluded = excluded;

        self.weights = self.rules.weights();
        self.weight_log_weights = self.weights.iter().map(|&w| w * w.ln()).collect();
        self.sum_of_weights = self.weights.iter().sum();
        self.sum_of_weight_log_weights = self.weight_log_weights.iter().sum();
        self.starting_entropy =
            self.sum_of_weights.ln() - self.sum_of_weight_log_weights / self.sum_of_weights;

        self.wave = Wave::new(cells, tiles);
        self.wave.init(
            self.rules.propagator(),
            self.sum_of_weights,
            self.sum_of_weight_log_weights,
            self.starting_entropy,
        );
        self.stack = Vec::with_capacity(cells * tiles);
        self.distribution = vec![0.0; tiles];
        self.observed.clear();
        self.first_empty = None;
        self.contradiction_cell = None;
        self.observations = 0;
        self.state = SolverState::Running;

        debug!(
            width,
            height,
            tiles,
            periodic = self.config.periodic,
            starting_entropy = self.starting_entropy,
            "solver started"
        );

        for cell in 0..cells {
            for dir in 0..DIRECTIONS {
                if self.neighbor_index(cell, OPPOSITE[dir]).is_none() {
                    continue;
                }
                for tile in 0..tiles {
                    if self.wave.get_data(cell, tile) && self.wave.get_compatible(cell, tile, dir) == 0
                    {
                        self.ban(cell, tile);
                    }
                }
            }
        }

        if !self.propagate() {
            let cell = self.first_empty.unwrap_or(0);
            self.fail(cell);
        }

        Ok(())
    }

    /// Perform one observation step.
    ///
    /// Panics if called before `startup()`. On a finished solver this returns
    /// the terminal result again.
    pub fn observe(&mut self, rng: &mut dyn RandomSource) -> Observation {
        match self.state {
            SolverState::Unstarted => panic!("observe() called before startup()"),
            SolverState::Solved => return Observation::Solved,
            SolverState::Contradiction => return Observation::Contradiction,
            SolverState::Running => {}
        }

        let cell = match self.next_unobserved_cell(rng) {
            Selection::Cell(cell) => cell,
            Selection::Decided => match self.undecided_excluded_cell() {
                Some(cell) => cell,
                None => return self.finish(),
            },
            Selection::Empty(cell) => return self.fail(cell),
        };

        self.observations += 1;
        let chosen = self.sample_candidate(cell, rng);
        trace!(cell, tile = chosen, entropy = self.wave.entropy(cell), "observe");

        for tile in 0..self.wave.tiles {
            if tile != chosen && self.wave.get_data(cell, tile) {
                self.ban(cell, tile);
            }
        }

        if !self.propagate() {
            let empty = self.first_empty.unwrap_or(cell);
            return self.fail(empty);
        }

        Observation::Continue
    }

    /// Find the minimum entropy cell with more than one candidate.
    ///
    /// Ties are broken by a small random perturbation instead of scan order.
    fn next_unobserved_cell(&self, rng: &mut dyn RandomSource) -> Selection {
        let mut min_entropy = f64::INFINITY;
        let mut argmin = None;

        for cell in 0..self.wave.length {
            if self.excluded[cell] {
                continue;
            }

            let remaining = self.wave.remaining(cell);
            if remaining == 0 {
                return Selection::Empty(cell);
            }

            if remaining > 1 {
                let entropy = self.wave.entropy(cell);
                if entropy <= min_entropy {
                    let noise = ENTROPY_NOISE * rng.float_in_range(0.0, 1.0);
                    if entropy + noise < min_entropy {
                        min_entropy = entropy + noise;
                        argmin = Some(cell);
                    }
                }
            }
        }

        match argmin {
            Some(cell) => Selection::Cell(cell),
            None => Selection::Decided,
        }
    }

    /// First excluded cell still holding more than one candidate.
    ///
    /// Only consulted once every other cell is decided, so excluded cells are
    /// collapsed last and in index order.
    fn undecided_excluded_cell(&self) -> Option<usize> {
        (0..self.wave.length).find(|&cell| self.excluded[cell] && self.wave.remaining(cell) > 1)
    }

    /// Weighted random pick among the tiles still possible at `cell`.
    ///
    /// Panics if the cell has no candidates.
    pub fn sample_candidate(&mut self, cell: usize, rng: &mut dyn RandomSource) -> usize {
        for tile in 0..self.wave.tiles {
            self.distribution[tile] = if self.wave.get_data(cell, tile) {
                self.weights[tile]
            } else {
                0.0
            };
        }

        match weighted_pick(&self.distribution, rng) {
            Some(tile) => tile,
            None => panic!("cell {} has no candidates to sample", cell),
        }
    }

    /// Remove `tile` from the candidates of `cell` and queue it for propagation.
    ///
    /// Panics if `tile` is not currently a candidate there.
    pub fn ban(&mut self, cell: usize, tile: usize) {
        assert!(
            self.wave.get_data(cell, tile),
            "ban of tile {} at cell {} which is not a candidate",
            tile,
            cell
        );

        self.wave.set_data(cell, tile, false);
        self.stack.push((cell, tile));
        self.wave
            .remove_weight(cell, self.weights[tile], self.weight_log_weights[tile]);
        trace!(cell, tile, remaining = self.wave.remaining(cell), "ban");

        if self.wave.remaining(cell) == 0 && !self.excluded[cell] && self.first_empty.is_none() {
            self.first_empty = Some(cell);
        }
    }

    /// Drain the ban stack until the wave is arc consistent.
    ///
    /// Returns false if a non-excluded cell was left without candidates.
    pub fn propagate(&mut self) -> bool {
        while let Some((cell1, tile1)) = self.stack.pop() {
            for dir in 0..DIRECTIONS {
                let Some(cell2) = self.neighbor_index(cell1, dir) else {
                    continue;
                };

                let supported = self.rules.propagator()[dir][tile1].len();
                for k in 0..supported {
                    let tile2 = self.rules.propagator()[dir][tile1][k];
                    let count = self.wave.decrement_compatible(cell2, tile2, dir);
                    if count == 0 && self.wave.get_data(cell2, tile2) {
                        self.ban(cell2, tile2);
                    }
                }
            }
        }

        self.first_empty.is_none()
    }

    /// Observe until the solve ends.
    pub fn run(&mut self, rng: &mut dyn RandomSource) -> SolverState {
        self.run_bounded(rng, None)
    }

    /// Observe until the solve ends or `max_observations` cells have been
    /// collapsed. An exhausted budget is treated as a contradiction.
    pub fn run_bounded(
        &mut self,
        rng: &mut dyn RandomSource,
        max_observations: Option<usize>,
    ) -> SolverState {
        loop {
            if let Some(max) = max_observations {
                if self.state == SolverState::Running
                    && self.observations >= max
                    && !self.is_decided()
                {
                    warn!(
                        observations = self.observations,
                        "observation budget exhausted, abandoning solve"
                    );
                    self.state = SolverState::Contradiction;
                    return self.state;
                }
            }

            if self.observe(rng) != Observation::Continue {
                return self.state;
            }
        }
    }

    fn finish(&mut self) -> Observation {
        let mut observed = Vec::with_capacity(self.wave.length);
        for cell in 0..self.wave.length {
            match self.wave.first_candidate(cell) {
                Some(tile) => observed.push(tile),
                None => return self.fail(cell),
            }
        }

        self.observed = observed;
        self.state = SolverState::Solved;
        debug!(observations = self.observations, "solve complete");
        Observation::Solved
    }

    fn fail(&mut self, cell: usize) -> Observation {
        self.state = SolverState::Contradiction;
        self.contradiction_cell = Some(cell);
        debug!(
            cell,
            observations = self.observations,
            "contradiction, no candidates left"
        );
        Observation::Contradiction
    }

    fn is_decided(&self) -> bool {
        (0..self.wave.length).all(|cell| self.wave.remaining(cell) <= 1)
    }

    fn neighbor_index(&self, cell: usize, dir: usize) -> Option<usize> {
        let (width, height) = (self.config.width as i32, self.config.height as i32);
        let mut x = (cell % self.config.width) as i32 + DX[dir];
        let mut y = (cell / self.config.width) as i32 + DY[dir];

        if self.config.periodic {
            x = x.rem_euclid(width);
            y = y.rem_euclid(height);
        } else if x < 0 || y < 0 || x >= width || y >= height {
            return None;
        }

        Some(y as usize * self.config.width + x as usize)
    }

    /// Cell adjacent to `cell` in direction `dir`, wrapping when periodic.
    pub fn neighbor(&self, cell: usize, dir: Direction) -> Option<usize> {
        self.neighbor_index(cell, dir.index())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SolverState {
        self.state
    }

    /// Grid configuration as given to `new`.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// The rule table the solver was built with.
    pub fn rules(&self) -> &Ruleset {
        &self.rules
    }

    /// Resolved tile per cell (`index = y * width + x`), only once solved.
    pub fn observed(&self) -> Option<&[usize]> {
        match self.state {
            SolverState::Solved => Some(&self.observed),
            _ => None,
        }
    }

    /// Tile chosen at `(x, y)`. `None` outside the grid or before the solve succeeds.
    pub fn tile_at(&self, x: usize, y: usize) -> Option<usize> {
        if x >= self.config.width || y >= self.config.height {
            return None;
        }
        self.observed()
            .map(|tiles| tiles[y * self.config.width + x])
    }

    /// Tiles still possible at `cell`, in index order.
    pub fn candidates(&self, cell: usize) -> Vec<usize> {
        self.wave.candidates(cell)
    }

    /// Number of candidates left at `cell`.
    pub fn remaining(&self, cell: usize) -> usize {
        self.wave.remaining(cell).max(0) as usize
    }

    /// Shannon entropy of the candidate weights at `cell`. Zero when empty.
    pub fn entropy(&self, cell: usize) -> f64 {
        self.wave.entropy(cell)
    }

    /// Support counter for `tile` at `cell`.
    ///
    /// Counts the candidates of the neighbour opposite to `dir` that allow
    /// `tile` in direction `dir`. Banned tiles keep exact counts too.
    pub fn compatible(&self, cell: usize, tile: usize, dir: Direction) -> i32 {
        self.wave.get_compatible(cell, tile, dir.index())
    }

    /// Entropy of a cell holding every tile.
    pub fn starting_entropy(&self) -> f64 {
        self.starting_entropy
    }

    /// Cell found empty when the solve failed. `None` if the run was abandoned.
    pub fn contradiction_cell(&self) -> Option<usize> {
        self.contradiction_cell
    }

    /// Number of cells collapsed by `observe()` so far.
    pub fn observations(&self) -> usize {
        self.observations
    }

    /// Bans queued but not yet propagated.
    pub fn pending_bans(&self) -> usize {
        self.stack.len()
    }
}

/// Select an index with probability proportional to its weight.
/// Zero weights are never chosen. Returns `None` if every weight is zero.
fn weighted_pick(distribution: &[f64], rng: &mut dyn RandomSource) -> Option<usize> {
    let sum: f64 = distribution.iter().sum();
    if !(sum > 0.0) {
        return None;
    }

    let threshold = rng.float_in_range(0.0, sum);
    let mut partial_sum = 0.0;
    let mut last = None;

    for (i, &w) in distribution.iter().enumerate() {
        if w <= 0.0 {
            continue;
        }
        partial_sum += w;
        last = Some(i);
        if partial_sum > threshold {
            return Some(i);
        }
    }

    // Float drift can leave the threshold just past the final partial sum.
    last
}
