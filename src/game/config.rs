use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::ConfigError;

/// Smallest allowed grid side
pub const MIN_GRID_SIDE: usize = 3;

/// Largest allowed grid side; keeps every coordinate and cell count in range
pub const MAX_GRID_SIDE: usize = u16::MAX as usize;

/// Configuration for the game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Width of the game grid
    pub grid_width: usize,
    /// Height of the game grid
    pub grid_height: usize,
    /// Initial length of the snake
    pub initial_snake_length: usize,
    /// Score awarded per food eaten
    pub food_reward: u32,
    /// Period between ticks when driven by a scheduler
    pub tick_interval_ms: u64,
    /// Seed for food placement; `None` draws one from the OS
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            grid_width: 20,
            grid_height: 20,
            initial_snake_length: 3,
            food_reward: 10,
            tick_interval_ms: 100,
            seed: None,
        }
    }
}

impl GameConfig {
    /// Create a new configuration with custom grid size
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            grid_width: width,
            grid_height: height,
            ..Default::default()
        }
    }

    /// Create a small grid for testing
    pub fn small() -> Self {
        Self::new(10, 10)
    }

    /// Same configuration with a fixed RNG seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Load a configuration from a TOML file; missing keys keep their defaults
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn total_cells(&self) -> usize {
        self.grid_width * self.grid_height
    }

    /// Check that a game can be built from this configuration.
    ///
    /// The initial snake is laid out leftwards from its head on the middle
    /// row, so it fits as long as it is no longer than the grid is wide.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_width < MIN_GRID_SIDE || self.grid_height < MIN_GRID_SIDE {
            return Err(ConfigError::GridTooSmall {
                width: self.grid_width,
                height: self.grid_height,
                min: MIN_GRID_SIDE,
            });
        }
        if self.grid_width > MAX_GRID_SIDE || self.grid_height > MAX_GRID_SIDE {
            return Err(ConfigError::GridTooLarge {
                width: self.grid_width,
                height: self.grid_height,
                max: MAX_GRID_SIDE,
            });
        }
        if self.initial_snake_length == 0 || self.initial_snake_length > self.grid_width {
            return Err(ConfigError::SnakeDoesNotFit {
                length: self.initial_snake_length,
                width: self.grid_width,
            });
        }
        if self.food_reward == 0 {
            return Err(ConfigError::ZeroReward);
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroTickInterval);
        }
        Ok(())
    }
}
