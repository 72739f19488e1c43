// Non-blocking single-key sampling from the operator terminal
//
// The terminal is only put in raw (no echo, non-canonical) mode for the
// duration of one check, and a guard restores it on every exit path.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, is_raw_mode_enabled};
use tracing::warn;

/// Source of at most one operator key per call
pub trait KeySource {
    /// Return a pending key without waiting. `Ok(None)` means nothing was
    /// pending, which is the normal case.
    fn poll_key(&mut self) -> io::Result<Option<char>>;
}

/// Restores the terminal mode it found when dropped
struct RawModeGuard {
    was_raw: bool,
}

impl RawModeGuard {
    fn enter() -> io::Result<Self> {
        let was_raw = is_raw_mode_enabled()?;
        if !was_raw {
            enable_raw_mode()?;
        }
        Ok(Self { was_raw })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if !self.was_raw {
            if let Err(e) = disable_raw_mode() {
                warn!("Failed to restore terminal mode: {}", e);
            }
        }
    }
}

/// Keys from the controlling terminal via crossterm
#[derive(Debug, Default)]
pub struct TerminalKeys;

impl TerminalKeys {
    pub fn new() -> Self {
        Self
    }
}

impl KeySource for TerminalKeys {
    fn poll_key(&mut self) -> io::Result<Option<char>> {
        let _raw = RawModeGuard::enter()?;

        if !event::poll(Duration::ZERO)? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) => Ok(plain_char(key)),
            _ => Ok(None),
        }
    }
}

/// Character of a plain or shifted key press. Control and Alt chords are
/// not operator keys.
fn plain_char(key: KeyEvent) -> Option<char> {
    let chord = key.modifiers.difference(KeyModifiers::SHIFT);
    if key.kind != KeyEventKind::Press || !chord.is_empty() {
        return None;
    }
    match key.code {
        KeyCode::Char(c) => Some(c),
        _ => None,
    }
}

/// Replays a fixed key sequence, one entry per poll. Once exhausted it keeps
/// returning `None`.
#[derive(Debug, Default, Clone)]
pub struct ScriptedKeys {
    keys: VecDeque<Option<char>>,
}

impl ScriptedKeys {
    pub fn new<I: IntoIterator<Item = Option<char>>>(keys: I) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }
}

impl KeySource for ScriptedKeys {
    fn poll_key(&mut self) -> io::Result<Option<char>> {
        Ok(self.keys.pop_front().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_keys_replay_in_order() {
        let mut keys = ScriptedKeys::new([Some('w'), None, Some('q')]);
        assert_eq!(keys.poll_key().unwrap(), Some('w'));
        assert_eq!(keys.poll_key().unwrap(), None);
        assert_eq!(keys.poll_key().unwrap(), Some('q'));
        assert_eq!(keys.poll_key().unwrap(), None);
    }

    #[test]
    fn test_plain_and_shifted_keys_pass() {
        let w = KeyEvent::new(KeyCode::Char('w'), KeyModifiers::NONE);
        assert_eq!(plain_char(w), Some('w'));

        let shift_w = KeyEvent::new(KeyCode::Char('W'), KeyModifiers::SHIFT);
        assert_eq!(plain_char(shift_w), Some('W'));
    }

    #[test]
    fn test_control_and_alt_chords_are_ignored() {
        for (c, modifiers) in [
            ('a', KeyModifiers::CONTROL),
            ('d', KeyModifiers::CONTROL),
            ('w', KeyModifiers::ALT),
            ('S', KeyModifiers::SHIFT | KeyModifiers::CONTROL),
        ] {
            let key = KeyEvent::new(KeyCode::Char(c), modifiers);
            assert_eq!(plain_char(key), None, "{modifiers:?}+{c}");
        }
    }

    #[test]
    fn test_releases_and_non_char_keys_are_ignored() {
        let release = KeyEvent::new_with_kind(
            KeyCode::Char('w'),
            KeyModifiers::NONE,
            KeyEventKind::Release,
        );
        assert_eq!(plain_char(release), None);
        assert_eq!(plain_char(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)), None);
    }
}
