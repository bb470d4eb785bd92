//! Keyboard state handed to applications each frame.

use std::collections::HashSet;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    /// Letter key, stored upper-case.
    Character(char),
    Digit(u8),
}

impl KeyCode {
    /// Parses names such as `Space`, `ArrowLeft`, `a` or `7`.
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(key) = NamedKey::from_name(name) {
            return Some(Self::Named(key));
        }
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) if ch.is_ascii_alphabetic() => {
                Some(Self::Character(ch.to_ascii_uppercase()))
            }
            (Some(ch), None) => ch.to_digit(10).map(|digit| Self::Digit(digit as u8)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Space,
    Left,
    Right,
    Up,
    Down,
}

impl NamedKey {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "Space" => Self::Space,
            "Left" | "ArrowLeft" => Self::Left,
            "Right" | "ArrowRight" => Self::Right,
            "Up" | "ArrowUp" => Self::Up,
            "Down" | "ArrowDown" => Self::Down,
            _ => return None,
        })
    }
}

/// Read-only key queries passed to [`crate::app::Application::update`].
pub trait KeyState {
    /// Key is currently held.
    fn is_pressed(&self, key: KeyCode) -> bool;
    /// Key went down since the last reset.
    fn is_down(&self, key: KeyCode) -> bool;
    /// Key went up since the last reset.
    fn is_up(&self, key: KeyCode) -> bool;

    fn is_pressed_by_name(&self, name: &str) -> bool {
        KeyCode::from_name(name).is_some_and(|key| self.is_pressed(key))
    }
}

#[derive(Debug, Default)]
struct KeySets {
    pressed: HashSet<KeyCode>,
    down: HashSet<KeyCode>,
    up: HashSet<KeyCode>,
}

/// Input snapshot fed by the windowing layer.
///
/// `down` and `up` only hold transitions since the last [`InputState::reset`],
/// which the frame loop calls after every update.
#[derive(Debug, Default)]
pub struct InputState {
    keys: RwLock<KeySets>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key_down(&self, key: KeyCode) {
        let mut keys = self.keys.write();
        // Auto-repeat does not count as a new press.
        if keys.pressed.insert(key) {
            keys.down.insert(key);
        }
    }

    pub fn set_key_up(&self, key: KeyCode) {
        let mut keys = self.keys.write();
        if keys.pressed.remove(&key) {
            keys.up.insert(key);
        }
    }

    /// Clears the per-frame transitions; held keys stay pressed.
    pub fn reset(&self) {
        let mut keys = self.keys.write();
        keys.down.clear();
        keys.up.clear();
    }

    pub fn pressed_count(&self) -> usize {
        self.keys.read().pressed.len()
    }
}

impl KeyState for InputState {
    fn is_pressed(&self, key: KeyCode) -> bool {
        self.keys.read().pressed.contains(&key)
    }

    fn is_down(&self, key: KeyCode) -> bool {
        self.keys.read().down.contains(&key)
    }

    fn is_up(&self, key: KeyCode) -> bool {
        self.keys.read().up.contains(&key)
    }
}
