use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fmt;

use super::{action::Direction, error::StateError};

/// A cell on the game grid, addressed by column and row from the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub col: i32,
    pub row: i32,
}

impl Cell {
    pub fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    /// The neighbouring cell one step in `direction`
    pub fn step(self, direction: Direction) -> Self {
        let (d_col, d_row) = direction.delta();
        Self {
            col: self.col + d_col,
            row: self.row + d_row,
        }
    }

    /// True when the two cells share an edge
    pub fn is_adjacent(self, other: Cell) -> bool {
        (self.col - other.col).abs() + (self.row - other.row).abs() == 1
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

/// The snake in the game
#[derive(Debug, Clone, PartialEq)]
pub struct Snake {
    /// Body segments, with head at the front
    body: VecDeque<Cell>,
    /// Current direction of movement
    pub direction: Direction,
}

impl Snake {
    /// Create a straight snake whose body trails behind `head`, opposite to `direction`
    pub fn new(head: Cell, direction: Direction, length: usize) -> Self {
        let mut body = VecDeque::with_capacity(length.max(1));
        let back = direction.opposite();
        let mut cell = head;
        body.push_back(cell);
        for _ in 1..length {
            cell = cell.step(back);
            body.push_back(cell);
        }

        Self { body, direction }
    }

    /// Build a snake from explicit segments, head first
    pub fn from_cells(cells: impl IntoIterator<Item = Cell>, direction: Direction) -> Self {
        Self {
            body: cells.into_iter().collect(),
            direction,
        }
    }

    /// Get the head position
    ///
    /// # Panics
    ///
    /// On an empty snake, which [`GameState::validate`] rejects.
    pub fn head(&self) -> Cell {
        self.body[0]
    }

    /// Get the tail position (last segment)
    pub fn tail(&self) -> Cell {
        self.body[self.body.len() - 1]
    }

    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.body.iter().copied()
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.body.contains(&cell)
    }

    /// Would a head moving onto `cell` hit the body?
    ///
    /// The tail is left out: it moves off its cell in the same tick the head
    /// arrives, unless the snake grows, and food never sits on the snake.
    pub fn blocks(&self, cell: Cell) -> bool {
        let keep = self.body.len().saturating_sub(1);
        self.body.iter().take(keep).any(|&segment| segment == cell)
    }

    /// Push a new head, dropping the tail unless the snake grows
    pub(crate) fn advance(&mut self, new_head: Cell, grow: bool) {
        self.body.push_front(new_head);
        if !grow {
            self.body.pop_back();
        }
    }

    /// Get the length of the snake
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Check if the snake is empty (never true for a validated state)
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Why a game ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminalReason {
    /// The head left the grid
    #[serde(rename = "wall")]
    Wall,
    /// The head ran into the body
    #[serde(rename = "self")]
    SelfCollision,
    /// The snake covers every cell, nowhere is left for food
    #[serde(rename = "filled")]
    Filled,
}

impl TerminalReason {
    pub fn as_str(self) -> &'static str {
        match self {
            TerminalReason::Wall => "wall",
            TerminalReason::SelfCollision => "self",
            TerminalReason::Filled => "filled",
        }
    }

    /// Collisions lose, a full board wins
    pub fn is_collision(self) -> bool {
        !matches!(self, TerminalReason::Filled)
    }
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Complete game state
#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    pub snake: Snake,
    /// `None` only once the board is full
    pub food: Option<Cell>,
    pub grid_width: usize,
    pub grid_height: usize,
    pub score: u32,
    pub steps: u32,
    pub(crate) turn_locked: bool,
    pub(crate) terminal: Option<TerminalReason>,
}

impl GameState {
    /// Create a new game state
    pub fn new(snake: Snake, food: Option<Cell>, grid_width: usize, grid_height: usize) -> Self {
        Self {
            snake,
            food,
            grid_width,
            grid_height,
            score: 0,
            steps: 0,
            turn_locked: false,
            terminal: None,
        }
    }

    /// Check if a position is within the grid bounds
    pub fn is_in_bounds(&self, cell: Cell) -> bool {
        cell.col >= 0
            && (cell.col as usize) < self.grid_width
            && cell.row >= 0
            && (cell.row as usize) < self.grid_height
    }

    /// Check if a position is occupied by the snake
    pub fn is_occupied_by_snake(&self, cell: Cell) -> bool {
        self.snake.contains(cell)
    }

    pub fn is_game_over(&self) -> bool {
        self.terminal.is_some()
    }

    pub fn terminal_reason(&self) -> Option<TerminalReason> {
        self.terminal
    }

    /// Whether a turn was already accepted in the current tick window
    pub fn is_turn_locked(&self) -> bool {
        self.turn_locked
    }

    pub fn total_cells(&self) -> usize {
        self.grid_width * self.grid_height
    }

    /// Check the board invariants: a connected, in-bounds, non-overlapping
    /// snake and food on a free cell.
    pub fn validate(&self) -> Result<(), StateError> {
        if self.snake.is_empty() {
            return Err(StateError::EmptySnake);
        }

        let mut seen = HashSet::with_capacity(self.snake.len());
        let mut prev: Option<Cell> = None;
        for cell in self.snake.cells() {
            if !self.is_in_bounds(cell) {
                return Err(StateError::OutOfBounds(cell));
            }
            if !seen.insert(cell) {
                return Err(StateError::Overlap(cell));
            }
            if let Some(prev) = prev {
                if !prev.is_adjacent(cell) {
                    return Err(StateError::Disconnected(prev, cell));
                }
            }
            prev = Some(cell);
        }

        if let Some(food) = self.food {
            if !self.is_in_bounds(food) {
                return Err(StateError::OutOfBounds(food));
            }
            if seen.contains(&food) {
                return Err(StateError::FoodOnSnake(food));
            }
        }

        Ok(())
    }

    /// Read-only copy for renderers and other observers
    pub fn snapshot(&self) -> GameStateSnapshot {
        GameStateSnapshot {
            snake: self.snake.cells().collect(),
            direction: self.snake.direction,
            food: self.food,
            score: self.score,
            steps: self.steps,
            grid_width: self.grid_width,
            grid_height: self.grid_height,
            game_over: self.is_game_over(),
            reason: self.terminal,
        }
    }
}

/// Everything a front end needs to draw one frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStateSnapshot {
    /// Snake cells, head first
    pub snake: Vec<Cell>,
    pub direction: Direction,
    pub food: Option<Cell>,
    pub score: u32,
    pub steps: u32,
    pub grid_width: usize,
    pub grid_height: usize,
    pub game_over: bool,
    pub reason: Option<TerminalReason>,
}

impl GameStateSnapshot {
    pub fn head(&self) -> Option<Cell> {
        self.snake.first().copied()
    }
}
