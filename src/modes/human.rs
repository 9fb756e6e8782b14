use anyhow::{Context, Result};
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{Stdout, stdout};
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};

use crate::game::{Command, Engine, GameConfig, GameStateSnapshot};
use crate::input::{InputHandler, KeyAction};
use crate::metrics::GameMetrics;
use crate::render::Renderer;

/// Where the session is between runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Board laid out, waiting for the player to start
    Ready,
    /// Ticks are firing
    Running,
    /// The last run ended; ticks are stopped until the next start
    Over,
}

/// Interactive play: schedules ticks, forwards keys, draws frames.
///
/// Key events, ticks and frames are all handled on one task, so a turn
/// request can never interleave with a tick.
pub struct HumanMode {
    engine: Engine,
    state: GameStateSnapshot,
    phase: Phase,
    metrics: GameMetrics,
    renderer: Renderer,
    input_handler: InputHandler,
    should_quit: bool,
}

impl HumanMode {
    pub fn new(config: GameConfig) -> Result<Self> {
        let mut engine = Engine::new(config).context("Invalid game configuration")?;
        let state = engine.reset();

        Ok(Self {
            engine,
            state,
            phase: Phase::Ready,
            metrics: GameMetrics::new(),
            renderer: Renderer::new(),
            input_handler: InputHandler::new(),
            should_quit: false,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &GameStateSnapshot {
        &self.state
    }

    pub async fn run(&mut self) -> Result<()> {
        // Setup terminal
        enable_raw_mode().context("Failed to enable raw mode")?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;
        terminal.hide_cursor().context("Failed to hide cursor")?;
        terminal.clear().context("Failed to clear terminal")?;

        // Run game loop with cleanup
        let result = self.run_game_loop(&mut terminal).await;

        // Cleanup terminal
        self.cleanup_terminal(&mut terminal)?;

        result
    }

    async fn run_game_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ) -> Result<()> {
        let mut event_stream = EventStream::new();

        let tick_interval = Duration::from_millis(self.engine.config().tick_interval_ms);
        let mut tick_timer = interval(tick_interval);
        tick_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Render at 30 FPS (33ms per frame)
        let render_interval = Duration::from_millis(33);
        let mut render_timer = interval(render_interval);

        loop {
            tokio::select! {
                // Handle terminal events
                maybe_event = event_stream.next() => {
                    match maybe_event {
                        Some(Ok(event)) => {
                            if self.handle_event(event) {
                                // A fresh run gets a full period before its first move
                                tick_timer.reset();
                            }
                        }
                        Some(Err(err)) => {
                            return Err(err).context("Failed to read terminal event");
                        }
                        None => self.should_quit = true,
                    }
                }

                // Game logic tick
                _ = tick_timer.tick() => {
                    self.on_tick();
                }

                // Render frame
                _ = render_timer.tick() => {
                    if self.phase == Phase::Running {
                        self.metrics.update();
                    }
                    terminal.draw(|frame| {
                        self.renderer.render(frame, &self.state, &self.metrics, self.phase);
                    }).context("Failed to draw frame")?;
                }

                // Handle Ctrl+C
                _ = tokio::signal::ctrl_c() => {
                    self.should_quit = true;
                }
            }

            if self.should_quit {
                break;
            }
        }

        log::info!(
            "session ended after {} games, best score {}",
            self.metrics.games_played,
            self.metrics.best_score
        );
        Ok(())
    }

    /// Apply one terminal event. Returns true when it started a new run.
    fn handle_event(&mut self, event: Event) -> bool {
        let Event::Key(key) = event else {
            return false;
        };

        // Only process key press events, not release
        if key.kind != KeyEventKind::Press {
            return false;
        }

        match self.input_handler.handle_key_event(key) {
            KeyAction::Game(Command::Turn(direction)) => {
                if self.engine.request_direction(direction) {
                    self.state = self.engine.snapshot();
                }
                false
            }
            KeyAction::Game(Command::Start) => {
                self.start_game();
                true
            }
            KeyAction::Quit => {
                self.should_quit = true;
                false
            }
            KeyAction::None => false,
        }
    }

    /// Scheduler callback: only a running game advances
    fn on_tick(&mut self) {
        if self.phase != Phase::Running {
            return;
        }

        let outcome = self.engine.tick();
        if outcome.ate_food {
            self.metrics.on_food_eaten();
        }
        self.state = outcome.state;

        if let Some(reason) = outcome.reason {
            self.phase = Phase::Over;
            self.metrics.on_game_over(self.state.score, reason);
        }
    }

    fn start_game(&mut self) {
        self.state = self.engine.reset();
        self.phase = Phase::Running;
        self.metrics.on_game_start();
    }

    fn cleanup_terminal(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ) -> Result<()> {
        disable_raw_mode().context("Failed to disable raw mode")?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)
            .context("Failed to leave alternate screen")?;
        terminal.show_cursor().context("Failed to show cursor")?;
        Ok(())
    }
}
