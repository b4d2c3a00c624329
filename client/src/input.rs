//! Keyboard input mapped to game commands, with auto-repeat for held movement keys

use crate::game_loop::InputCommand;
use macroquad::prelude::*;
use std::time::{Duration, Instant};

/// Delay before a held key starts repeating
const REPEAT_DELAY: Duration = Duration::from_millis(170);
/// Interval between repeats once repeating
const REPEAT_INTERVAL: Duration = Duration::from_millis(50);

/// Edge detection plus delayed auto-repeat for one key
#[derive(Debug, Default)]
struct KeyRepeat {
    pressed_at: Option<Instant>,
    last_fired: Option<Instant>,
}

impl KeyRepeat {
    /// Returns true when the key should fire this frame
    fn update(&mut self, down: bool, now: Instant, repeats: bool) -> bool {
        if !down {
            self.pressed_at = None;
            self.last_fired = None;
            return false;
        }

        let Some(pressed_at) = self.pressed_at else {
            self.pressed_at = Some(now);
            self.last_fired = Some(now);
            return true;
        };

        if !repeats || now.duration_since(pressed_at) < REPEAT_DELAY {
            return false;
        }

        let due = self
            .last_fired
            .map_or(true, |last| now.duration_since(last) >= REPEAT_INTERVAL);
        if due {
            self.last_fired = Some(now);
        }
        due
    }
}

/// Key bindings, in the order they are sampled each frame
const BINDINGS: [(InputCommand, &[KeyCode], bool); 8] = [
    (InputCommand::Left, &[KeyCode::Left, KeyCode::A], true),
    (InputCommand::Right, &[KeyCode::Right, KeyCode::D], true),
    (InputCommand::Down, &[KeyCode::Down, KeyCode::S], true),
    (InputCommand::RotateCw, &[KeyCode::Up, KeyCode::X, KeyCode::W], false),
    (InputCommand::RotateCcw, &[KeyCode::Z], false),
    (InputCommand::HardDrop, &[KeyCode::Space], false),
    (InputCommand::TogglePause, &[KeyCode::P], false),
    (InputCommand::NextOpponent, &[KeyCode::Tab], false),
];

/// Samples the keyboard once per frame and produces game commands
pub struct InputManager {
    keys: [KeyRepeat; 8],
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            keys: Default::default(),
        }
    }

    /// Commands triggered since the previous frame
    pub fn update(&mut self) -> Vec<InputCommand> {
        let now = Instant::now();
        let mut commands = Vec::new();

        for ((command, codes, repeats), state) in BINDINGS.iter().zip(self.keys.iter_mut()) {
            let down = codes.iter().any(|code| is_key_down(*code));
            if state.update(down, now, *repeats) {
                commands.push(*command);
            }
        }
        commands
    }

    /// True once the player asked to quit
    pub fn quit_requested(&self) -> bool {
        is_key_pressed(KeyCode::Escape)
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}
