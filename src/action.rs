//! Recorded actions and scripts.
//! A script is an ordered list of mouse clicks and key taps, each carrying the
//! interval (seconds) to wait before it fires. Mouse actions may carry a color
//! target, which makes the player click the nearest matching blob of that color
//! inside a search area instead of the recorded position.
//! Scripts are stored as a JSON array of actions.

use serde::{Deserialize, Serialize};

use crate::error::{MacroError, MacroResult};
use crate::keys::KeyCode;

pub const DEFAULT_TOLERANCE: u8 = 5;

/// Longest delay a single action may carry, in seconds (one day).
pub const MAX_DELAY: f64 = 86_400.0;

fn check_delay(delay: f64) -> MacroResult<()> {
    // NaN fails the range check too
    if !(0.0..=MAX_DELAY).contains(&delay) {
        return Err(MacroError::invalid_action(format!(
            "delay {} is outside 0..={} seconds",
            delay, MAX_DELAY
        )));
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub fn from_rdev(button: rdev::Button) -> Option<MouseButton> {
        match button {
            rdev::Button::Left => Some(MouseButton::Left),
            rdev::Button::Right => Some(MouseButton::Right),
            rdev::Button::Middle => Some(MouseButton::Middle),
            rdev::Button::Unknown(_) => None,
        }
    }
}

impl std::fmt::Display for MouseButton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MouseButton::Left => write!(f, "left"),
            MouseButton::Right => write!(f, "right"),
            MouseButton::Middle => write!(f, "middle"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl std::str::FromStr for Rgb {
    type Err = MacroError;

    /// Parses "r,g,b".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(MacroError::invalid_action(format!(
                "color must be 'r,g,b', got '{}'",
                s
            )));
        }
        let channel = |p: &str| {
            p.parse::<u8>().map_err(|_| {
                MacroError::invalid_action(format!("color channel '{}' is not in 0-255", p))
            })
        };
        Ok(Rgb(channel(parts[0])?, channel(parts[1])?, channel(parts[2])?))
    }
}

/// Screen rectangle. The origin may lie off-screen; capture clamps it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn centered_on(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x: x.saturating_sub((width / 2) as i32),
            y: y.saturating_sub((height / 2) as i32),
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Intersection with another region, `None` when they do not overlap.
    pub fn intersect(&self, other: &Region) -> Option<Region> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x as i64 + self.width as i64).min(other.x as i64 + other.width as i64);
        let y1 = (self.y as i64 + self.height as i64).min(other.y as i64 + other.height as i64);
        if x1 <= x0 as i64 || y1 <= y0 as i64 {
            return None;
        }
        Some(Region {
            x: x0,
            y: y0,
            width: (x1 - x0 as i64) as u32,
            height: (y1 - y0 as i64) as u32,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorTarget {
    pub color: Rgb,
    pub area: Region,
    #[serde(default = "default_tolerance")]
    pub tolerance: u8,
}

fn default_tolerance() -> u8 {
    DEFAULT_TOLERANCE
}

/// Random multiplier applied to an action's delay, drawn uniformly from `[min, max]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DelayJitter {
    pub min: f64,
    pub max: f64,
}

impl DelayJitter {
    pub fn validate(&self) -> MacroResult<()> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min < 0.0 {
            return Err(MacroError::invalid_action(format!(
                "jitter multipliers must be finite and non-negative, got {}..{}",
                self.min, self.max
            )));
        }
        if self.min > self.max {
            return Err(MacroError::invalid_action(format!(
                "jitter min {} exceeds max {}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MouseAction {
    pub delay: f64,
    #[serde(default)]
    pub button: MouseButton,
    pub position: (i32, i32),
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter: Option<DelayJitter>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyboardAction {
    pub delay: f64,
    pub key: KeyCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter: Option<DelayJitter>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Action {
    Mouse(MouseAction),
    Keyboard(KeyboardAction),
}

impl Action {
    pub fn delay(&self) -> f64 {
        match self {
            Action::Mouse(m) => m.delay,
            Action::Keyboard(k) => k.delay,
        }
    }

    pub fn jitter(&self) -> Option<DelayJitter> {
        match self {
            Action::Mouse(m) => m.jitter,
            Action::Keyboard(k) => k.jitter,
        }
    }

    fn delay_mut(&mut self) -> &mut f64 {
        match self {
            Action::Mouse(m) => &mut m.delay,
            Action::Keyboard(k) => &mut k.delay,
        }
    }

    fn jitter_mut(&mut self) -> &mut Option<DelayJitter> {
        match self {
            Action::Mouse(m) => &mut m.jitter,
            Action::Keyboard(k) => &mut k.jitter,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Action::Mouse(m) => {
                let mut s = format!("{} click at ({}, {})", m.button, m.position.0, m.position.1);
                if let Some(target) = &m.color {
                    s.push_str(&format!(
                        " [color {},{},{} ±{} in {}x{}@{},{}]",
                        target.color.0,
                        target.color.1,
                        target.color.2,
                        target.tolerance,
                        target.area.width,
                        target.area.height,
                        target.area.x,
                        target.area.y
                    ));
                }
                s
            }
            Action::Keyboard(k) => format!("key {}", k.key),
        }
    }
}

/// Ordered list of actions; serialized as a bare JSON array.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Script {
    pub actions: Vec<Action>,
}

impl Script {
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    /// Builds a script from actions stamped with absolute times (seconds).
    /// Every action after the first gets the gap to its predecessor as its delay;
    /// the first keeps its own delay.
    pub fn from_timestamps(events: Vec<(f64, Action)>) -> Self {
        let mut previous: Option<f64> = None;
        let actions = events
            .into_iter()
            .map(|(at, mut action)| {
                if let Some(last) = previous {
                    *action.delay_mut() = (at - last).max(0.0);
                }
                previous = Some(at);
                action
            })
            .collect();
        Self { actions }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Sum of recorded delays, ignoring jitter.
    pub fn total_delay(&self) -> f64 {
        self.actions.iter().map(Action::delay).sum()
    }

    pub fn validate(&self) -> MacroResult<()> {
        for (i, action) in self.actions.iter().enumerate() {
            check_delay(action.delay()).map_err(|_| {
                MacroError::invalid_action(format!("action {} has invalid delay {}", i, action.delay()))
            })?;
            if let Some(jitter) = action.jitter() {
                jitter.validate()?;
            }
            if let Action::Mouse(MouseAction {
                color: Some(target),
                ..
            }) = action
            {
                if target.area.is_empty() {
                    return Err(MacroError::invalid_action(format!(
                        "action {} has an empty color search area",
                        i
                    )));
                }
            }
        }
        Ok(())
    }

    fn get_mut(&mut self, index: usize) -> MacroResult<&mut Action> {
        let len = self.actions.len();
        self.actions.get_mut(index).ok_or_else(|| {
            MacroError::invalid_action(format!("action index {} out of range (0..{})", index, len))
        })
    }

    pub fn set_delay(&mut self, index: usize, delay: f64) -> MacroResult<()> {
        check_delay(delay)?;
        *self.get_mut(index)?.delay_mut() = delay;
        Ok(())
    }

    pub fn set_jitter(&mut self, index: usize, jitter: Option<DelayJitter>) -> MacroResult<()> {
        if let Some(j) = &jitter {
            j.validate()?;
        }
        *self.get_mut(index)?.jitter_mut() = jitter;
        Ok(())
    }

    /// Enables color correction on a mouse action with a search area of the given
    /// size centered on its recorded position.
    pub fn set_color(
        &mut self,
        index: usize,
        color: Rgb,
        area_width: u32,
        area_height: u32,
        tolerance: u8,
    ) -> MacroResult<()> {
        if area_width == 0 || area_height == 0 {
            return Err(MacroError::invalid_action("color search area must not be empty"));
        }
        match self.get_mut(index)? {
            Action::Mouse(m) => {
                let (x, y) = m.position;
                m.color = Some(ColorTarget {
                    color,
                    area: Region::centered_on(x, y, area_width, area_height),
                    tolerance,
                });
                Ok(())
            }
            Action::Keyboard(_) => Err(MacroError::invalid_action(format!(
                "action {} is a key press; only mouse actions take a color",
                index
            ))),
        }
    }

    pub fn clear_color(&mut self, index: usize) -> MacroResult<()> {
        if let Action::Mouse(m) = self.get_mut(index)? {
            m.color = None;
        }
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> MacroResult<Action> {
        self.get_mut(index)?;
        Ok(self.actions.remove(index))
    }

    pub fn scale_delays(&mut self, factor: f64) -> MacroResult<()> {
        if !factor.is_finite() || factor < 0.0 {
            return Err(MacroError::invalid_action(format!("invalid scale factor {}", factor)));
        }
        for action in &self.actions {
            check_delay(action.delay() * factor)?;
        }
        for action in &mut self.actions {
            *action.delay_mut() *= factor;
        }
        Ok(())
    }
}
