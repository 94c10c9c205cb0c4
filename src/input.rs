//! Input injection.
//! `EnigoSink` drives the real pointer and keyboard; the player only sees the
//! `InputSink` trait so replay logic can run against a recorder in tests.
//! macOS: the terminal needs Accessibility permission to post events.

use enigo::{Coordinate, Direction, Enigo, Keyboard, Mouse, Settings};
use std::thread;
use std::time::Duration;

use crate::action::MouseButton;
use crate::error::{MacroError, MacroResult};
use crate::keys::KeyCode;

pub trait InputSink {
    fn click(&mut self, button: MouseButton, x: i32, y: i32) -> MacroResult<()>;
    fn tap_key(&mut self, key: KeyCode) -> MacroResult<()>;
}

pub struct EnigoSink {
    enigo: Enigo,
    settle: Duration,
}

impl EnigoSink {
    /// `settle` is the wait between moving and clicking, and between key press and release.
    pub fn new(settle: Duration) -> MacroResult<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| MacroError::input(format!("failed to connect to input system: {}", e)))?;
        Ok(Self { enigo, settle })
    }
}

fn to_enigo_button(button: MouseButton) -> enigo::Button {
    match button {
        MouseButton::Left => enigo::Button::Left,
        MouseButton::Right => enigo::Button::Right,
        MouseButton::Middle => enigo::Button::Middle,
    }
}

impl InputSink for EnigoSink {
    fn click(&mut self, button: MouseButton, x: i32, y: i32) -> MacroResult<()> {
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| MacroError::input(format!("move to ({}, {}) failed: {}", x, y, e)))?;
        thread::sleep(self.settle);
        self.enigo
            .button(to_enigo_button(button), Direction::Click)
            .map_err(|e| MacroError::input(format!("{} click failed: {}", button, e)))
    }

    fn tap_key(&mut self, key: KeyCode) -> MacroResult<()> {
        let Some(k) = key.to_enigo() else {
            tracing::warn!(%key, "key has no injectable equivalent, skipping");
            return Ok(());
        };
        self.enigo
            .key(k, Direction::Press)
            .map_err(|e| MacroError::input(format!("press '{}' failed: {}", key, e)))?;
        thread::sleep(self.settle);
        self.enigo
            .key(k, Direction::Release)
            .map_err(|e| MacroError::input(format!("release '{}' failed: {}", key, e)))
    }
}
