use super::{
    action::Direction,
    config::GameConfig,
    error::{ConfigError, StateError},
    state::{Cell, GameState, GameStateSnapshot, Snake, TerminalReason},
};
use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use std::collections::HashSet;

/// Random draws per grid cell before food placement stops guessing and
/// enumerates the free cells instead
const FOOD_DRAWS_PER_CELL: usize = 4;

/// Result of one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    /// State after the tick
    pub state: GameStateSnapshot,
    /// Whether the game has ended, on this tick or earlier
    pub terminal: bool,
    /// Why the game ended
    pub reason: Option<TerminalReason>,
    /// Whether the snake ate food this tick
    pub ate_food: bool,
}

impl TickOutcome {
    fn new(state: &GameState, ate_food: bool) -> Self {
        Self {
            state: state.snapshot(),
            terminal: state.is_game_over(),
            reason: state.terminal_reason(),
            ate_food,
        }
    }
}

/// The game engine: owns the state and every rule that changes it
pub struct Engine {
    config: GameConfig,
    rng: StdRng,
    state: Option<GameState>,
}

impl Engine {
    /// Create an engine for `config`. No game exists until [`Engine::reset`].
    pub fn new(config: GameConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            config,
            rng,
            state: None,
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// The live state, if a game has been set up
    pub fn state(&self) -> Option<&GameState> {
        self.state.as_ref()
    }

    /// Read-only copy of the current state.
    ///
    /// # Panics
    ///
    /// If called before [`Engine::reset`] or [`Engine::load_state`].
    pub fn snapshot(&self) -> GameStateSnapshot {
        match &self.state {
            Some(state) => state.snapshot(),
            None => panic!("Engine::snapshot called before reset"),
        }
    }

    /// Throw away any current game and start a fresh one
    pub fn reset(&mut self) -> GameStateSnapshot {
        // Centred where it fits; pushed right on narrow grids so the body stays inside
        let length = self.config.initial_snake_length;
        let head = Cell::new(
            (self.config.grid_width / 2).max(length - 1) as i32,
            (self.config.grid_height / 2) as i32,
        );
        let snake = Snake::new(head, Direction::Right, length);

        let mut state = GameState::new(
            snake,
            None,
            self.config.grid_width,
            self.config.grid_height,
        );
        state.food = Self::generate_food(&mut self.rng, &state);

        log::info!(
            "new game on {}x{} grid, food at {:?}",
            state.grid_width,
            state.grid_height,
            state.food
        );

        let snapshot = state.snapshot();
        self.state = Some(state);
        snapshot
    }

    /// Install a hand-built state in place of the current game.
    ///
    /// Food is placed if the state has none and a free cell exists; a state
    /// whose snake already covers the grid starts out finished.
    pub fn load_state(&mut self, mut state: GameState) -> Result<GameStateSnapshot, StateError> {
        let expected = (self.config.grid_width, self.config.grid_height);
        let actual = (state.grid_width, state.grid_height);
        if expected != actual {
            return Err(StateError::GridMismatch { expected, actual });
        }
        state.validate()?;

        state.turn_locked = false;
        if state.food.is_none() {
            state.food = Self::generate_food(&mut self.rng, &state);
            if state.food.is_none() {
                state.terminal = Some(TerminalReason::Filled);
            }
        }

        let snapshot = state.snapshot();
        self.state = Some(state);
        Ok(snapshot)
    }

    /// Ask the snake to turn.
    ///
    /// Returns false, leaving the state alone, when a turn was already taken
    /// since the last tick, when `direction` reverses the snake, or when the
    /// game is over.
    ///
    /// # Panics
    ///
    /// If called before [`Engine::reset`] or [`Engine::load_state`].
    pub fn request_direction(&mut self, direction: Direction) -> bool {
        let Some(state) = self.state.as_mut() else {
            panic!("Engine::request_direction called before reset");
        };

        if state.is_game_over()
            || state.turn_locked
            || state.snake.direction.is_opposite(direction)
        {
            return false;
        }

        state.snake.direction = direction;
        state.turn_locked = true;
        log::debug!("turn accepted: {:?}", direction);
        true
    }

    /// Advance the game by one step.
    ///
    /// A finished game is left as it is and reported again.
    ///
    /// # Panics
    ///
    /// If called before [`Engine::reset`] or [`Engine::load_state`].
    pub fn tick(&mut self) -> TickOutcome {
        let Some(state) = self.state.as_mut() else {
            panic!("Engine::tick called before reset");
        };

        if state.is_game_over() {
            return TickOutcome::new(state, false);
        }

        state.turn_locked = false;
        state.steps += 1;

        let new_head = state.snake.head().step(state.snake.direction);

        // Both checks run against the pre-move body; nothing moves on a hit.
        if let Some(reason) = Self::check_collision(state, new_head) {
            state.terminal = Some(reason);
            log::info!(
                "game over ({}) at step {}, head {} -> {}, score {}",
                reason,
                state.steps,
                state.snake.head(),
                new_head,
                state.score
            );
            return TickOutcome::new(state, false);
        }

        let ate_food = state.food == Some(new_head);
        state.snake.advance(new_head, ate_food);

        if ate_food {
            state.score = state.score.saturating_add(self.config.food_reward);
            state.food = Self::generate_food(&mut self.rng, state);
            log::debug!(
                "ate food at {}, score {}, length {}, next food {:?}",
                new_head,
                state.score,
                state.snake.len(),
                state.food
            );

            if state.food.is_none() {
                state.terminal = Some(TerminalReason::Filled);
                log::info!("board filled at step {}, score {}", state.steps, state.score);
            }
        }

        log::trace!("step {}: head {}", state.steps, new_head);
        TickOutcome::new(state, ate_food)
    }

    /// Check if the new head position causes a collision
    fn check_collision(state: &GameState, head: Cell) -> Option<TerminalReason> {
        if !state.is_in_bounds(head) {
            return Some(TerminalReason::Wall);
        }

        if state.snake.blocks(head) {
            return Some(TerminalReason::SelfCollision);
        }

        None
    }

    /// Pick a uniformly random cell not covered by the snake, or `None` when
    /// the snake covers the whole grid.
    fn generate_food(rng: &mut StdRng, state: &GameState) -> Option<Cell> {
        let total = state.total_cells();
        if state.snake.len() >= total {
            return None;
        }

        for _ in 0..total.saturating_mul(FOOD_DRAWS_PER_CELL) {
            let cell = Cell::new(
                rng.gen_range(0..state.grid_width) as i32,
                rng.gen_range(0..state.grid_height) as i32,
            );
            if !state.is_occupied_by_snake(cell) {
                return Some(cell);
            }
        }

        let occupied: HashSet<Cell> = state.snake.cells().collect();
        let free: Vec<Cell> = (0..state.grid_height)
            .flat_map(|row| (0..state.grid_width).map(move |col| Cell::new(col as i32, row as i32)))
            .filter(|cell| !occupied.contains(cell))
            .collect();
        log::debug!("food sampling fell back to {} free cells", free.len());

        free.choose(rng).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(width: usize, height: usize) -> GameConfig {
        GameConfig::new(width, height).with_seed(42)
    }

    fn engine_with(
        config: GameConfig,
        cells: &[(i32, i32)],
        direction: Direction,
        food: Option<(i32, i32)>,
    ) -> Engine {
        let snake = Snake::from_cells(cells.iter().map(|&(c, r)| Cell::new(c, r)), direction);
        let state = GameState::new(
            snake,
            food.map(|(c, r)| Cell::new(c, r)),
            config.grid_width,
            config.grid_height,
        );
        let mut engine = Engine::new(config).unwrap();
        engine.load_state(state).unwrap();
        engine
    }

    fn cells(list: &[(i32, i32)]) -> Vec<Cell> {
        list.iter().map(|&(c, r)| Cell::new(c, r)).collect()
    }

    #[test]
    fn test_reset() {
        let mut engine = Engine::new(seeded(20, 20)).unwrap();
        let state = engine.reset();

        assert!(!state.game_over);
        assert_eq!(state.reason, None);
        assert_eq!(state.score, 0);
        assert_eq!(state.steps, 0);
        assert_eq!(state.direction, Direction::Right);
        assert_eq!(state.snake, cells(&[(10, 10), (9, 10), (8, 10)]));

        let food = state.food.unwrap();
        assert!(!state.snake.contains(&food));
        assert!(food.col >= 0 && food.col < 20 && food.row >= 0 && food.row < 20);
    }

    #[test]
    fn test_reset_abandons_running_game() {
        let mut engine = Engine::new(seeded(10, 10)).unwrap();
        engine.reset();
        engine.request_direction(Direction::Up);
        for _ in 0..20 {
            engine.tick();
        }
        assert!(engine.snapshot().game_over);

        let state = engine.reset();
        assert!(!state.game_over);
        assert_eq!(state.direction, Direction::Right);
        assert!(!engine.state().unwrap().is_turn_locked());
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        assert!(matches!(
            Engine::new(GameConfig::new(2, 20)),
            Err(ConfigError::GridTooSmall { .. })
        ));
    }

    #[test]
    fn test_oversized_grid_fails_fast() {
        assert!(matches!(
            Engine::new(GameConfig::new(5_000_000_000, 3)),
            Err(ConfigError::GridTooLarge { .. })
        ));
    }

    #[test]
    fn test_smallest_grid_plays_with_defaults() {
        let mut engine = Engine::new(GameConfig::new(3, 3).with_seed(5)).unwrap();
        let state = engine.reset();

        assert_eq!(state.snake, cells(&[(2, 1), (1, 1), (0, 1)]));
        let food = state.food.unwrap();
        assert!(!state.snake.contains(&food));

        // Heading right from column 2 leaves the grid
        let result = engine.tick();
        assert!(result.terminal);
        assert_eq!(result.reason, Some(TerminalReason::Wall));

        let state = engine.reset();
        assert!(engine.request_direction(Direction::Up));
        let result = engine.tick();
        assert!(!result.terminal);
        assert_eq!(result.state.head(), Some(Cell::new(2, 0)));
        assert!(result.state.snake.len() >= state.snake.len());
    }

    #[test]
    fn test_narrow_grid_keeps_snake_inside() {
        let mut engine = Engine::new(GameConfig::new(3, 20).with_seed(8)).unwrap();
        let state = engine.reset();

        assert_eq!(state.snake, cells(&[(2, 10), (1, 10), (0, 10)]));
    }

    #[test]
    #[should_panic(expected = "before reset")]
    fn test_tick_before_reset_panics() {
        let mut engine = Engine::new(GameConfig::small()).unwrap();
        engine.tick();
    }

    #[test]
    #[should_panic(expected = "before reset")]
    fn test_turn_before_reset_panics() {
        let mut engine = Engine::new(GameConfig::small()).unwrap();
        engine.request_direction(Direction::Up);
    }

    #[test]
    fn test_basic_movement() {
        let mut engine = engine_with(
            seeded(20, 20),
            &[(10, 10), (9, 10), (8, 10)],
            Direction::Right,
            Some((0, 0)),
        );

        let result = engine.tick();

        assert!(!result.terminal);
        assert!(!result.ate_food);
        assert_eq!(result.state.steps, 1);
        assert_eq!(result.state.snake, cells(&[(11, 10), (10, 10), (9, 10)]));
        assert_eq!(result.state.food, Some(Cell::new(0, 0)));
    }

    #[test]
    fn test_food_consumption() {
        let mut engine = engine_with(
            seeded(20, 20),
            &[(10, 10), (9, 10), (8, 10)],
            Direction::Right,
            Some((11, 10)),
        );

        let result = engine.tick();

        assert!(!result.terminal);
        assert!(result.ate_food);
        assert_eq!(result.state.score, 10);
        assert_eq!(
            result.state.snake,
            cells(&[(11, 10), (10, 10), (9, 10), (8, 10)])
        );
        let food = result.state.food.unwrap();
        assert!(!result.state.snake.contains(&food));
    }

    #[test]
    fn test_custom_reward() {
        let mut config = seeded(10, 10);
        config.food_reward = 25;
        let mut engine = engine_with(config, &[(5, 5)], Direction::Up, Some((5, 4)));

        assert_eq!(engine.tick().state.score, 25);
    }

    #[test]
    fn test_wall_collision() {
        let mut engine = engine_with(
            seeded(10, 10),
            &[(0, 5), (1, 5), (2, 5)],
            Direction::Left,
            Some((5, 5)),
        );
        let before = engine.snapshot();

        let result = engine.tick();

        assert!(result.terminal);
        assert_eq!(result.reason, Some(TerminalReason::Wall));
        assert_eq!(result.state.snake, before.snake);
        assert_eq!(result.state.food, before.food);
        assert_eq!(result.state.score, before.score);
    }

    #[test]
    fn test_wall_collision_every_edge() {
        let cases = [
            ((0, 4), Direction::Left),
            ((9, 4), Direction::Right),
            ((4, 0), Direction::Up),
            ((4, 9), Direction::Down),
        ];
        for ((col, row), direction) in cases {
            let mut engine = engine_with(seeded(10, 10), &[(col, row)], direction, Some((5, 5)));
            assert_eq!(engine.tick().reason, Some(TerminalReason::Wall));
        }
    }

    #[test]
    fn test_self_collision() {
        // Heading left from (5,6) lands on (4,6), a body cell that is not the tail
        let mut engine = engine_with(
            seeded(10, 10),
            &[(5, 6), (5, 5), (4, 5), (4, 6), (4, 7)],
            Direction::Left,
            Some((8, 8)),
        );
        let before = engine.snapshot();

        let result = engine.tick();

        assert!(result.terminal);
        assert_eq!(result.reason, Some(TerminalReason::SelfCollision));
        assert_eq!(result.state.snake, before.snake);
    }

    #[test]
    fn test_self_collision_by_turning() {
        let mut engine = Engine::new(seeded(10, 10)).unwrap();
        engine
            .load_state(GameState::new(
                Snake::new(Cell::new(5, 5), Direction::Right, 5),
                Some(Cell::new(8, 8)),
                10,
                10,
            ))
            .unwrap();

        // (5,5) -> (5,6) -> (4,6) -> (4,5), which the body still covers
        assert!(engine.request_direction(Direction::Down));
        assert!(!engine.tick().terminal);
        assert!(engine.request_direction(Direction::Left));
        assert!(!engine.tick().terminal);
        assert!(engine.request_direction(Direction::Up));
        let result = engine.tick();

        assert!(result.terminal);
        assert_eq!(result.reason, Some(TerminalReason::SelfCollision));
    }

    #[test]
    fn test_head_may_take_vacating_tail_cell() {
        // A 2x2 loop: moving down from (1,1) enters the tail cell (1,2)
        let mut engine = engine_with(
            seeded(5, 5),
            &[(1, 1), (2, 1), (2, 2), (1, 2)],
            Direction::Down,
            Some((4, 4)),
        );

        let result = engine.tick();

        assert!(!result.terminal);
        assert_eq!(result.state.snake, cells(&[(1, 2), (1, 1), (2, 1), (2, 2)]));
    }

    #[test]
    fn test_single_segment_never_self_collides() {
        let mut engine = engine_with(seeded(5, 5), &[(2, 2)], Direction::Right, Some((0, 0)));
        assert!(engine.request_direction(Direction::Up));
        assert!(!engine.tick().terminal);
        assert!(engine.request_direction(Direction::Left));
        assert!(!engine.tick().terminal);
        assert!(engine.request_direction(Direction::Down));
        assert!(!engine.tick().terminal);
    }

    #[test]
    fn test_reversal_is_ignored() {
        let mut engine = engine_with(
            seeded(10, 10),
            &[(5, 5), (4, 5), (3, 5)],
            Direction::Right,
            Some((0, 0)),
        );

        assert!(!engine.request_direction(Direction::Left));
        assert_eq!(engine.snapshot().direction, Direction::Right);
        assert!(!engine.state().unwrap().is_turn_locked());

        // Still ignored once the lock is held
        assert!(engine.request_direction(Direction::Up));
        assert!(!engine.request_direction(Direction::Down));
        assert_eq!(engine.snapshot().direction, Direction::Up);
    }

    #[test]
    fn test_one_turn_per_tick() {
        let mut engine = engine_with(
            seeded(10, 10),
            &[(5, 5), (4, 5), (3, 5)],
            Direction::Right,
            Some((0, 0)),
        );

        assert!(engine.request_direction(Direction::Up));
        assert!(!engine.request_direction(Direction::Left));
        assert_eq!(engine.snapshot().direction, Direction::Up);

        let result = engine.tick();
        assert_eq!(result.state.head(), Some(Cell::new(5, 4)));

        // The tick opened a new window
        assert!(engine.request_direction(Direction::Left));
        assert_eq!(engine.tick().state.head(), Some(Cell::new(4, 4)));
    }

    #[test]
    fn test_same_direction_request_takes_the_lock() {
        let mut engine = engine_with(
            seeded(10, 10),
            &[(5, 5), (4, 5)],
            Direction::Right,
            Some((0, 0)),
        );

        assert!(engine.request_direction(Direction::Right));
        assert!(!engine.request_direction(Direction::Up));
        assert_eq!(engine.snapshot().direction, Direction::Right);
    }

    #[test]
    fn test_terminal_tick_is_idempotent() {
        let mut engine = engine_with(
            seeded(10, 10),
            &[(0, 5), (1, 5), (2, 5)],
            Direction::Left,
            Some((5, 5)),
        );

        let first = engine.tick();
        let second = engine.tick();
        let third = engine.tick();

        assert!(first.terminal);
        assert_eq!(first, second);
        assert_eq!(second, third);
        assert_eq!(third.state.steps, 1);
    }

    #[test]
    fn test_turns_rejected_after_game_over() {
        let mut engine = engine_with(seeded(10, 10), &[(0, 5)], Direction::Left, Some((5, 5)));
        engine.tick();

        assert!(!engine.request_direction(Direction::Up));
        assert_eq!(engine.snapshot().direction, Direction::Left);
    }

    #[test]
    fn test_board_full_is_terminal() {
        let config = seeded(3, 3);
        // Eight cells covered, food on the ninth right in front of the head
        let mut engine = engine_with(
            config,
            &[
                (1, 0),
                (2, 0),
                (2, 1),
                (1, 1),
                (0, 1),
                (0, 2),
                (1, 2),
                (2, 2),
            ],
            Direction::Left,
            Some((0, 0)),
        );

        let result = engine.tick();

        assert!(result.ate_food);
        assert!(result.terminal);
        assert_eq!(result.reason, Some(TerminalReason::Filled));
        assert_eq!(result.state.score, 10);
        assert_eq!(result.state.snake.len(), 9);
        assert_eq!(result.state.food, None);

        assert_eq!(engine.tick(), TickOutcome { ate_food: false, ..result });
    }

    #[test]
    fn test_food_finds_last_free_cell() {
        let config = seeded(3, 3);
        let engine = engine_with(
            config,
            &[
                (1, 0),
                (2, 0),
                (2, 1),
                (1, 1),
                (0, 1),
                (0, 2),
                (1, 2),
                (2, 2),
            ],
            Direction::Left,
            None,
        );
        // load_state placed the missing food on the one free cell
        assert_eq!(engine.snapshot().food, Some(Cell::new(0, 0)));

        let state = engine.state().unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            assert_eq!(
                Engine::generate_food(&mut rng, state),
                Some(Cell::new(0, 0))
            );
        }
    }

    #[test]
    fn test_load_state_rejects_bad_states() {
        let mut engine = Engine::new(seeded(10, 10)).unwrap();

        let wrong_grid = GameState::new(
            Snake::new(Cell::new(5, 5), Direction::Right, 3),
            None,
            12,
            10,
        );
        assert_eq!(
            engine.load_state(wrong_grid),
            Err(StateError::GridMismatch {
                expected: (10, 10),
                actual: (12, 10)
            })
        );

        let food_on_snake = GameState::new(
            Snake::new(Cell::new(5, 5), Direction::Right, 3),
            Some(Cell::new(4, 5)),
            10,
            10,
        );
        assert_eq!(
            engine.load_state(food_on_snake),
            Err(StateError::FoodOnSnake(Cell::new(4, 5)))
        );
        assert!(engine.state().is_none());
    }

    #[test]
    fn test_seed_makes_games_reproducible() {
        let mut a = Engine::new(seeded(12, 9)).unwrap();
        let mut b = Engine::new(seeded(12, 9)).unwrap();

        assert_eq!(a.reset(), b.reset());
        for _ in 0..5 {
            assert_eq!(a.tick(), b.tick());
        }
    }

    #[test]
    fn test_invariants_hold_over_random_play() {
        let config = GameConfig::new(8, 8).with_seed(7);
        let initial_length = config.initial_snake_length;
        let mut engine = Engine::new(config).unwrap();
        let mut rng = StdRng::seed_from_u64(99);
        let mut state = engine.reset();
        let mut games = 0;

        for _ in 0..5_000 {
            if rng.gen_bool(0.3) {
                let direction = *Direction::ALL.choose(&mut rng).unwrap();
                engine.request_direction(direction);
            }

            let result = engine.tick();
            let next = &result.state;

            if result.terminal && !result.ate_food {
                // Collisions leave the board untouched
                assert_eq!(next.snake, state.snake);
                assert_eq!(next.score, state.score);
                games += 1;
                state = engine.reset();
                continue;
            }

            let unique: HashSet<Cell> = next.snake.iter().copied().collect();
            assert_eq!(unique.len(), next.snake.len());
            assert!(next.snake.len() >= state.snake.len());
            assert!(next.score >= state.score);
            assert_eq!(
                next.score as usize,
                (next.snake.len() - initial_length) * 10
            );
            for pair in next.snake.windows(2) {
                assert!(pair[0].is_adjacent(pair[1]));
            }
            if let Some(food) = next.food {
                assert!(!unique.contains(&food));
            }

            if result.terminal {
                games += 1;
                state = engine.reset();
            } else {
                state = result.state;
            }
        }

        assert!(games > 0);
    }
}
