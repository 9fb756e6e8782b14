//! Core game logic module for Snake
//!
//! This module contains all the game logic without any I/O or rendering dependencies.
//! An [`Engine`] owns one [`GameState`]; front ends drive it with `tick`,
//! `request_direction` and `reset`, and draw from [`GameStateSnapshot`]s.

pub mod action;
pub mod config;
pub mod engine;
pub mod error;
pub mod state;

// Re-export commonly used types
pub use action::{Command, Direction};
pub use config::GameConfig;
pub use engine::{Engine, TickOutcome};
pub use error::{ConfigError, StateError};
pub use state::{Cell, GameState, GameStateSnapshot, Snake, TerminalReason};
