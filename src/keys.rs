//! Key names.
//! Scripts and settings store keys as short lowercase strings ("space", "f5", "a").
//! `KeyCode` is the typed form; it converts from `rdev` listener keys and into
//! `enigo` injection keys so neither library's types leak into saved scripts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MacroError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum KeyCode {
    Char(char),
    Space,
    Enter,
    Tab,
    Escape,
    Backspace,
    Delete,
    Shift,
    Control,
    Alt,
    Meta,
    CapsLock,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    F(u8),
}

const NAMED: &[(&str, KeyCode)] = &[
    ("space", KeyCode::Space),
    ("enter", KeyCode::Enter),
    ("tab", KeyCode::Tab),
    ("escape", KeyCode::Escape),
    ("backspace", KeyCode::Backspace),
    ("delete", KeyCode::Delete),
    ("shift", KeyCode::Shift),
    ("control", KeyCode::Control),
    ("alt", KeyCode::Alt),
    ("meta", KeyCode::Meta),
    ("capslock", KeyCode::CapsLock),
    ("up", KeyCode::Up),
    ("down", KeyCode::Down),
    ("left", KeyCode::Left),
    ("right", KeyCode::Right),
    ("home", KeyCode::Home),
    ("end", KeyCode::End),
    ("pageup", KeyCode::PageUp),
    ("pagedown", KeyCode::PageDown),
];

impl KeyCode {
    /// Case-insensitive match used for hotkeys, so "S" stops playback like "s".
    pub fn matches(&self, other: &KeyCode) -> bool {
        match (self, other) {
            (KeyCode::Char(a), KeyCode::Char(b)) => a.to_lowercase().eq(b.to_lowercase()),
            _ => self == other,
        }
    }

    /// Maps a key reported by the global listener. Keys with no stable name are dropped.
    pub fn from_rdev(key: rdev::Key) -> Option<KeyCode> {
        use rdev::Key as R;
        let code = match key {
            R::Space => KeyCode::Space,
            R::Return | R::KpReturn => KeyCode::Enter,
            R::Tab => KeyCode::Tab,
            R::Escape => KeyCode::Escape,
            R::Backspace => KeyCode::Backspace,
            R::Delete => KeyCode::Delete,
            R::ShiftLeft | R::ShiftRight => KeyCode::Shift,
            R::ControlLeft | R::ControlRight => KeyCode::Control,
            R::Alt | R::AltGr => KeyCode::Alt,
            R::MetaLeft | R::MetaRight => KeyCode::Meta,
            R::CapsLock => KeyCode::CapsLock,
            R::UpArrow => KeyCode::Up,
            R::DownArrow => KeyCode::Down,
            R::LeftArrow => KeyCode::Left,
            R::RightArrow => KeyCode::Right,
            R::Home => KeyCode::Home,
            R::End => KeyCode::End,
            R::PageUp => KeyCode::PageUp,
            R::PageDown => KeyCode::PageDown,
            R::F1 => KeyCode::F(1),
            R::F2 => KeyCode::F(2),
            R::F3 => KeyCode::F(3),
            R::F4 => KeyCode::F(4),
            R::F5 => KeyCode::F(5),
            R::F6 => KeyCode::F(6),
            R::F7 => KeyCode::F(7),
            R::F8 => KeyCode::F(8),
            R::F9 => KeyCode::F(9),
            R::F10 => KeyCode::F(10),
            R::F11 => KeyCode::F(11),
            R::F12 => KeyCode::F(12),
            R::Num0 | R::Kp0 => KeyCode::Char('0'),
            R::Num1 | R::Kp1 => KeyCode::Char('1'),
            R::Num2 | R::Kp2 => KeyCode::Char('2'),
            R::Num3 | R::Kp3 => KeyCode::Char('3'),
            R::Num4 | R::Kp4 => KeyCode::Char('4'),
            R::Num5 | R::Kp5 => KeyCode::Char('5'),
            R::Num6 | R::Kp6 => KeyCode::Char('6'),
            R::Num7 | R::Kp7 => KeyCode::Char('7'),
            R::Num8 | R::Kp8 => KeyCode::Char('8'),
            R::Num9 | R::Kp9 => KeyCode::Char('9'),
            R::KeyA => KeyCode::Char('a'),
            R::KeyB => KeyCode::Char('b'),
            R::KeyC => KeyCode::Char('c'),
            R::KeyD => KeyCode::Char('d'),
            R::KeyE => KeyCode::Char('e'),
            R::KeyF => KeyCode::Char('f'),
            R::KeyG => KeyCode::Char('g'),
            R::KeyH => KeyCode::Char('h'),
            R::KeyI => KeyCode::Char('i'),
            R::KeyJ => KeyCode::Char('j'),
            R::KeyK => KeyCode::Char('k'),
            R::KeyL => KeyCode::Char('l'),
            R::KeyM => KeyCode::Char('m'),
            R::KeyN => KeyCode::Char('n'),
            R::KeyO => KeyCode::Char('o'),
            R::KeyP => KeyCode::Char('p'),
            R::KeyQ => KeyCode::Char('q'),
            R::KeyR => KeyCode::Char('r'),
            R::KeyS => KeyCode::Char('s'),
            R::KeyT => KeyCode::Char('t'),
            R::KeyU => KeyCode::Char('u'),
            R::KeyV => KeyCode::Char('v'),
            R::KeyW => KeyCode::Char('w'),
            R::KeyX => KeyCode::Char('x'),
            R::KeyY => KeyCode::Char('y'),
            R::KeyZ => KeyCode::Char('z'),
            R::Minus | R::KpMinus => KeyCode::Char('-'),
            R::Equal => KeyCode::Char('='),
            R::KpPlus => KeyCode::Char('+'),
            R::KpMultiply => KeyCode::Char('*'),
            R::KpDivide | R::Slash => KeyCode::Char('/'),
            R::Comma => KeyCode::Char(','),
            R::Dot => KeyCode::Char('.'),
            R::SemiColon => KeyCode::Char(';'),
            R::Quote => KeyCode::Char('\''),
            R::BackQuote => KeyCode::Char('`'),
            R::LeftBracket => KeyCode::Char('['),
            R::RightBracket => KeyCode::Char(']'),
            R::BackSlash | R::IntlBackslash => KeyCode::Char('\\'),
            _ => return None,
        };
        Some(code)
    }

    pub fn to_enigo(self) -> Option<enigo::Key> {
        use enigo::Key as E;
        let key = match self {
            KeyCode::Char(c) => E::Unicode(c),
            KeyCode::Space => E::Space,
            KeyCode::Enter => E::Return,
            KeyCode::Tab => E::Tab,
            KeyCode::Escape => E::Escape,
            KeyCode::Backspace => E::Backspace,
            KeyCode::Delete => E::Delete,
            KeyCode::Shift => E::Shift,
            KeyCode::Control => E::Control,
            KeyCode::Alt => E::Alt,
            KeyCode::Meta => E::Meta,
            KeyCode::CapsLock => E::CapsLock,
            KeyCode::Up => E::UpArrow,
            KeyCode::Down => E::DownArrow,
            KeyCode::Left => E::LeftArrow,
            KeyCode::Right => E::RightArrow,
            KeyCode::Home => E::Home,
            KeyCode::End => E::End,
            KeyCode::PageUp => E::PageUp,
            KeyCode::PageDown => E::PageDown,
            KeyCode::F(1) => E::F1,
            KeyCode::F(2) => E::F2,
            KeyCode::F(3) => E::F3,
            KeyCode::F(4) => E::F4,
            KeyCode::F(5) => E::F5,
            KeyCode::F(6) => E::F6,
            KeyCode::F(7) => E::F7,
            KeyCode::F(8) => E::F8,
            KeyCode::F(9) => E::F9,
            KeyCode::F(10) => E::F10,
            KeyCode::F(11) => E::F11,
            KeyCode::F(12) => E::F12,
            KeyCode::F(_) => return None,
        };
        Some(key)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyCode::Char(c) => write!(f, "{}", c),
            KeyCode::F(n) => write!(f, "f{}", n),
            named => {
                let name = NAMED
                    .iter()
                    .find(|(_, k)| k == named)
                    .map(|(name, _)| *name)
                    .unwrap_or("?");
                f.write_str(name)
            }
        }
    }
}

impl FromStr for KeyCode {
    type Err = MacroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // a lone space is the space key, not padding
        let trimmed = if s.trim().is_empty() { s } else { s.trim() };
        let mut chars = trimmed.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Ok(KeyCode::Char(c));
        }

        let lower = trimmed.to_ascii_lowercase();
        if let Some((_, key)) = NAMED.iter().find(|(name, _)| *name == lower) {
            return Ok(*key);
        }
        if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
            if (1..=12).contains(&n) {
                return Ok(KeyCode::F(n));
            }
        }
        Err(MacroError::invalid_action(format!("unknown key name '{}'", s)))
    }
}

impl TryFrom<String> for KeyCode {
    type Error = MacroError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeyCode> for String {
    fn from(key: KeyCode) -> Self {
        key.to_string()
    }
}
