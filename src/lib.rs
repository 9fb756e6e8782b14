//! Grid Snake - a tick-driven Snake game
//!
//! This library provides:
//! - Core game logic (game module): movement, turn arbitration, collisions, food and score
//! - Keyboard translation (input module)
//! - TUI rendering of state snapshots (render module)
//! - Session statistics (metrics module)
//! - The interactive terminal front end (modes module)

pub mod game;
pub mod input;
pub mod metrics;
pub mod modes;
pub mod render;
