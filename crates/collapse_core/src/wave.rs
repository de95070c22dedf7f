//! Wave state for the collapse.
//!
//! Tracks which tiles are still possible at each cell, the compatibility
//! counters used by propagation, and the running sums that give O(1)
//! Shannon entropy per cell. Everything is stored in flat vectors.

use crate::ruleset::{DIRECTIONS, OPPOSITE};

/// Per-cell candidate sets, compatibility counters and entropy statistics.
#[derive(Debug, Clone)]
pub struct Wave {
    /// `data[cell * tiles + tile]` = tile still possible at cell.
    pub data: Vec<bool>,

    /// `compatible[(cell * tiles + tile) * 4 + dir]` = number of candidates in the
    /// cell lying opposite to `dir` that allow `tile` in direction `dir`.
    /// Reaching 0 bans the tile.
    pub compatible: Vec<i32>,

    /// Number of remaining candidates per cell.
    pub sums_of_ones: Vec<i32>,

    /// Sum of weights of remaining candidates per cell.
    pub sums_of_weights: Vec<f64>,

    /// Sum of `w * ln(w)` of remaining candidates per cell.
    pub sums_of_weight_log_weights: Vec<f64>,

    /// Shannon entropy per cell.
    pub entropies: Vec<f64>,

    /// Number of cells
    pub length: usize,

    /// Number of tiles
    pub tiles: usize,
}

impl Wave {
    pub fn new(length: usize, tiles: usize) -> Self {
        Self {
            data: vec![true; length * tiles],
            compatible: vec![0; length * tiles * DIRECTIONS],
            sums_of_ones: vec![0; length],
            sums_of_weights: vec![0.0; length],
            sums_of_weight_log_weights: vec![0.0; length],
            entropies: vec![0.0; length],
            length,
            tiles,
        }
    }

    /// Reset every cell to "all tiles possible".
    ///
    /// Counters come from the opposite direction of the propagator, which is
    /// exact because rule tables are symmetric.
    pub fn init(
        &mut self,
        propagator: &[Vec<Vec<usize>>],
        sum_of_weights: f64,
        sum_of_weight_log_weights: f64,
        starting_entropy: f64,
    ) {
        for cell in 0..self.length {
            for tile in 0..self.tiles {
                self.set_data(cell, tile, true);
                for dir in 0..DIRECTIONS {
                    let count = propagator[OPPOSITE[dir]][tile].len() as i32;
                    self.set_compatible(cell, tile, dir, count);
                }
            }

            self.sums_of_ones[cell] = self.tiles as i32;
            self.sums_of_weights[cell] = sum_of_weights;
            self.sums_of_weight_log_weights[cell] = sum_of_weight_log_weights;
            self.entropies[cell] = starting_entropy;
        }
    }

    #[inline]
    pub fn get_data(&self, cell: usize, tile: usize) -> bool {
        self.data[cell * self.tiles + tile]
    }

    #[inline]
    pub fn set_data(&mut self, cell: usize, tile: usize, value: bool) {
        self.data[cell * self.tiles + tile] = value;
    }

    #[inline]
    fn compatible_index(&self, cell: usize, tile: usize, dir: usize) -> usize {
        (cell * self.tiles + tile) * DIRECTIONS + dir
    }

    #[inline]
    pub fn get_compatible(&self, cell: usize, tile: usize, dir: usize) -> i32 {
        self.compatible[self.compatible_index(cell, tile, dir)]
    }

    #[inline]
    pub fn set_compatible(&mut self, cell: usize, tile: usize, dir: usize, value: i32) {
        let idx = self.compatible_index(cell, tile, dir);
        self.compatible[idx] = value;
    }

    /// Decrement the counter and return the new value.
    #[inline]
    pub fn decrement_compatible(&mut self, cell: usize, tile: usize, dir: usize) -> i32 {
        let idx = self.compatible_index(cell, tile, dir);
        self.compatible[idx] -= 1;
        self.compatible[idx]
    }

    #[inline]
    pub fn remaining(&self, cell: usize) -> i32 {
        self.sums_of_ones[cell]
    }

    #[inline]
    pub fn entropy(&self, cell: usize) -> f64 {
        self.entropies[cell]
    }

    /// Remove one tile's contribution from a cell's statistics and recompute
    /// its entropy from the running sums.
    pub fn remove_weight(&mut self, cell: usize, weight: f64, weight_log_weight: f64) {
        self.sums_of_ones[cell] -= 1;
        self.sums_of_weights[cell] -= weight;
        self.sums_of_weight_log_weights[cell] -= weight_log_weight;

        let sum = self.sums_of_weights[cell];
        self.entropies[cell] = if self.sums_of_ones[cell] > 0 && sum > 0.0 {
            // Clamp away float drift below zero for a single survivor.
            (sum.ln() - self.sums_of_weight_log_weights[cell] / sum).max(0.0)
        } else {
            0.0
        };
    }

    /// First remaining tile at a cell, if any.
    pub fn first_candidate(&self, cell: usize) -> Option<usize> {
        (0..self.tiles).find(|&t| self.get_data(cell, t))
    }

    pub fn candidates(&self, cell: usize) -> Vec<usize> {
        (0..self.tiles).filter(|&t| self.get_data(cell, t)).collect()
    }
}
