//! Tile set and adjacency rules.
//!
//! A `Ruleset` is the read-only input to a solve: an ordered list of weighted
//! tiles plus, for each direction and tile, the tiles allowed in the
//! neighbouring cell. The table is always kept symmetric.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of cardinal directions.
pub const DIRECTIONS: usize = 4;

/// Cell offsets per direction, in `Direction` order.
pub const DX: [i32; DIRECTIONS] = [1, 0, -1, 0];
pub const DY: [i32; DIRECTIONS] = [0, 1, 0, -1];

/// Opposite direction indices.
pub const OPPOSITE: [usize; DIRECTIONS] = [2, 3, 0, 1];

/// Cardinal direction on the grid. Rows grow downward (`index = y * width + x`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// +X
    Right = 0,
    /// +Y
    Down = 1,
    /// -X
    Left = 2,
    /// -Y
    Up = 3,
}

impl Direction {
    pub const ALL: [Direction; DIRECTIONS] = [
        Direction::Right,
        Direction::Down,
        Direction::Left,
        Direction::Up,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn opposite(self) -> Direction {
        Direction::ALL[OPPOSITE[self.index()]]
    }
}

/// A tile kind with its sampling weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub name: String,
    pub weight: f64,
}

/// Error building a rule table.
#[derive(Debug, Clone, PartialEq)]
pub enum RulesetError {
    /// A rule referenced a tile index past the end of the tile set.
    UnknownTile { tile: usize, tiles: usize },
}

impl fmt::Display for RulesetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RulesetError::UnknownTile { tile, tiles } => {
                write!(f, "rule references tile {} but only {} tiles exist", tile, tiles)
            }
        }
    }
}

impl std::error::Error for RulesetError {}

/// Tile set plus symmetric adjacency table.
#[derive(Debug, Clone, PartialEq)]
pub struct Ruleset {
    tiles: Vec<Tile>,
    /// `propagator[dir][tile]` = sorted tiles allowed in direction `dir` of `tile`.
    propagator: Vec<Vec<Vec<usize>>>,
}

impl Ruleset {
    /// Build from raw weights and a per-tile, per-direction table of allowed
    /// neighbours. Missing reverse entries are added.
    ///
    /// `table[tile][dir]` lists the tiles allowed in direction `dir` of `tile`.
    pub fn from_table(
        weights: &[f64],
        table: &[[Vec<usize>; DIRECTIONS]],
    ) -> Result<Self, RulesetError> {
        let mut builder = RulesetBuilder::new();
        for (i, &w) in weights.iter().enumerate() {
            builder.add_tile(i.to_string(), w);
        }
        for (a, dirs) in table.iter().enumerate() {
            for (d, allowed) in dirs.iter().enumerate() {
                for &b in allowed {
                    builder.allow(a, Direction::ALL[d], b);
                }
            }
        }
        builder.build()
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn weights(&self) -> Vec<f64> {
        self.tiles.iter().map(|t| t.weight).collect()
    }

    pub fn tile_index(&self, name: &str) -> Option<usize> {
        self.tiles.iter().position(|t| t.name == name)
    }

    /// Tiles allowed in direction `dir` of `tile`.
    #[inline]
    pub fn allowed(&self, tile: usize, dir: Direction) -> &[usize] {
        &self.propagator[dir.index()][tile]
    }

    pub fn is_allowed(&self, a: usize, dir: Direction, b: usize) -> bool {
        self.allowed(a, dir).binary_search(&b).is_ok()
    }

    /// Sparse table indexed `[dir][tile]`.
    pub fn propagator(&self) -> &[Vec<Vec<usize>>] {
        &self.propagator
    }
}

/// Incremental builder for a `Ruleset`.
#[derive(Debug, Clone, Default)]
pub struct RulesetBuilder {
    tiles: Vec<Tile>,
    pairs: Vec<(usize, Direction, usize)>,
}

impl RulesetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tile and return its index.
    pub fn add_tile(&mut self, name: impl Into<String>, weight: f64) -> usize {
        self.tiles.push(Tile {
            name: name.into(),
            weight,
        });
        self.tiles.len() - 1
    }

    /// Allow `b` in direction `dir` of `a` (and `a` in the opposite direction of `b`).
    pub fn allow(&mut self, a: usize, dir: Direction, b: usize) -> &mut Self {
        self.pairs.push((a, dir, b));
        self
    }

    /// Allow `a` and `b` next to each other in every direction.
    pub fn allow_all_directions(&mut self, a: usize, b: usize) -> &mut Self {
        for dir in Direction::ALL {
            self.allow(a, dir, b);
        }
        self
    }

    pub fn build(&self) -> Result<Ruleset, RulesetError> {
        let n = self.tiles.len();

        let mut dense = vec![vec![vec![false; n]; n]; DIRECTIONS];
        for &(a, dir, b) in &self.pairs {
            for tile in [a, b] {
                if tile >= n {
                    return Err(RulesetError::UnknownTile { tile, tiles: n });
                }
            }
            dense[dir.index()][a][b] = true;
            dense[dir.opposite().index()][b][a] = true;
        }

        let propagator = dense
            .iter()
            .map(|per_tile| {
                per_tile
                    .iter()
                    .map(|row| (0..n).filter(|&t| row[t]).collect())
                    .collect()
            })
            .collect();

        Ok(Ruleset {
            tiles: self.tiles.clone(),
            propagator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite_directions() {
        assert_eq!(Direction::Right.opposite(), Direction::Left);
        assert_eq!(Direction::Down.opposite(), Direction::Up);
        for dir in Direction::ALL {
            assert_eq!(dir.opposite().opposite(), dir);
            assert_eq!(DX[dir.index()], -DX[dir.opposite().index()]);
            assert_eq!(DY[dir.index()], -DY[dir.opposite().index()]);
        }
    }

    #[test]
    fn test_allow_is_symmetric() {
        let mut builder = RulesetBuilder::new();
        let grass = builder.add_tile("grass", 2.0);
        let road = builder.add_tile("road", 1.0);
        builder.allow(grass, Direction::Right, road);
        let rules = builder.build().unwrap();

        assert!(rules.is_allowed(grass, Direction::Right, road));
        assert!(rules.is_allowed(road, Direction::Left, grass));
        assert!(!rules.is_allowed(road, Direction::Right, grass));
        assert!(rules.allowed(grass, Direction::Down).is_empty());
    }

    #[test]
    fn test_duplicate_rules_are_deduplicated() {
        let mut builder = RulesetBuilder::new();
        let a = builder.add_tile("a", 1.0);
        builder.allow(a, Direction::Down, a);
        builder.allow(a, Direction::Up, a);
        builder.allow(a, Direction::Down, a);
        let rules = builder.build().unwrap();

        assert_eq!(rules.allowed(a, Direction::Down), &[0]);
        assert_eq!(rules.allowed(a, Direction::Up), &[0]);
    }

    #[test]
    fn test_from_table_symmetrises() {
        let table = vec![
            [vec![1], vec![], vec![], vec![]],
            [vec![], vec![], vec![], vec![]],
        ];
        let rules = Ruleset::from_table(&[1.0, 3.0], &table).unwrap();

        assert_eq!(rules.len(), 2);
        assert_eq!(rules.weights(), vec![1.0, 3.0]);
        assert!(rules.is_allowed(1, Direction::Left, 0));
        assert_eq!(rules.tile_index("1"), Some(1));
    }

    #[test]
    fn test_unknown_tile_rejected() {
        let table = vec![[vec![5], vec![], vec![], vec![]]];
        let err = Ruleset::from_table(&[1.0], &table).unwrap_err();
        assert_eq!(err, RulesetError::UnknownTile { tile: 5, tiles: 1 });
    }
}
