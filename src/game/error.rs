use std::path::PathBuf;
use thiserror::Error;

use super::state::Cell;

/// Configuration rejected before a game can be built
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("grid must be at least {min}x{min}, got {width}x{height}")]
    GridTooSmall {
        width: usize,
        height: usize,
        min: usize,
    },
    #[error("grid must be at most {max}x{max}, got {width}x{height}")]
    GridTooLarge {
        width: usize,
        height: usize,
        max: usize,
    },
    #[error("initial snake of length {length} does not fit a grid {width} cells wide")]
    SnakeDoesNotFit { length: usize, width: usize },
    #[error("food reward must be positive")]
    ZeroReward,
    #[error("tick interval must be positive")]
    ZeroTickInterval,
    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// A hand-built game state that breaks one of the board invariants
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("snake has no segments")]
    EmptySnake,
    #[error("cell {0} lies outside the grid")]
    OutOfBounds(Cell),
    #[error("segments {0} and {1} are not one step apart")]
    Disconnected(Cell, Cell),
    #[error("snake occupies {0} more than once")]
    Overlap(Cell),
    #[error("food at {0} sits on the snake")]
    FoodOnSnake(Cell),
    #[error("state grid {actual:?} does not match configured grid {expected:?}")]
    GridMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
}
