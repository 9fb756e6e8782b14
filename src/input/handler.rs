use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::game::{Command, Direction};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    Game(Command),
    Quit,
    None,
}

/// Maps physical keys to logical commands; knows nothing about game rules
pub struct InputHandler;

impl InputHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn handle_key_event(&self, key: KeyEvent) -> KeyAction {
        // Handle Ctrl+C
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return KeyAction::Quit;
        }

        match key.code {
            // Movement - Arrow keys
            KeyCode::Up => Self::turn(Direction::Up),
            KeyCode::Down => Self::turn(Direction::Down),
            KeyCode::Left => Self::turn(Direction::Left),
            KeyCode::Right => Self::turn(Direction::Right),

            // Movement - WASD
            KeyCode::Char(c) if c.eq_ignore_ascii_case(&'w') => Self::turn(Direction::Up),
            KeyCode::Char(c) if c.eq_ignore_ascii_case(&'s') => Self::turn(Direction::Down),
            KeyCode::Char(c) if c.eq_ignore_ascii_case(&'a') => Self::turn(Direction::Left),
            KeyCode::Char(c) if c.eq_ignore_ascii_case(&'d') => Self::turn(Direction::Right),

            // Controls
            KeyCode::Enter | KeyCode::Char(' ') => KeyAction::Game(Command::Start),
            KeyCode::Char('r') | KeyCode::Char('R') => KeyAction::Game(Command::Start),
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => KeyAction::Quit,

            _ => KeyAction::None,
        }
    }

    fn turn(direction: Direction) -> KeyAction {
        KeyAction::Game(Command::Turn(direction))
    }
}

impl Default for InputHandler {
    fn default() -> Self {
        Self::new()
    }
}
