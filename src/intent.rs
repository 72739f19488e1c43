// Operator intents derived from single key presses

use serde::{Deserialize, Serialize};

/// Key bindings shown to the operator at startup
pub const BANNER: &str = "\
=== Sabertooth WASD Control (Smooth Ramp) ===
W - Forward
S - Backward
A - Turn Left
D - Turn Right
Space - Stop
Q - Quit
";

/// What the operator asked for on this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionIntent {
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
    Stop,
    Quit,
    NoOp,
}

impl MotionIntent {
    /// Map a key to an intent; unbound keys are `NoOp`
    pub fn from_key(key: char) -> Self {
        match key {
            'w' | 'W' => MotionIntent::Forward,
            's' | 'S' => MotionIntent::Backward,
            'a' | 'A' => MotionIntent::TurnLeft,
            'd' | 'D' => MotionIntent::TurnRight,
            ' ' => MotionIntent::Stop,
            'q' | 'Q' => MotionIntent::Quit,
            _ => MotionIntent::NoOp,
        }
    }

    /// Transcript line for an accepted key
    pub fn label(self) -> Option<&'static str> {
        match self {
            MotionIntent::Forward => Some("Forward"),
            MotionIntent::Backward => Some("Backward"),
            MotionIntent::TurnLeft => Some("Turn Left"),
            MotionIntent::TurnRight => Some("Turn Right"),
            MotionIntent::Stop => Some("Stop"),
            MotionIntent::Quit => Some("Quit"),
            MotionIntent::NoOp => None,
        }
    }
}

impl From<Option<char>> for MotionIntent {
    fn from(key: Option<char>) -> Self {
        key.map_or(MotionIntent::NoOp, MotionIntent::from_key)
    }
}
