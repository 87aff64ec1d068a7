//! Triggers: key presses and situational events in the finder's binding vocabulary
//!
//! The finder only understands a fixed spelling for each key and event
//! (`ctrl-a`, `alt-x`, `f5`, `start`, `load`, ...). `Trigger` is a closed
//! enumeration of that vocabulary: `Display` produces the finder's spelling
//! and `FromStr` parses it back, so a trigger that renders always re-parses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Something the finder can attach a binding to: a key press or an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    /// A key chord the user presses.
    Key(Key),
    /// A situational event raised by the finder itself.
    Event(SituationalEvent),
}

impl Trigger {
    /// Shorthand for `Trigger::Key(..)` from a key-name string.
    pub fn key(name: &str) -> Result<Self, Error> {
        Ok(Self::Key(name.parse()?))
    }
}

impl From<Key> for Trigger {
    fn from(key: Key) -> Self {
        Self::Key(key)
    }
}

impl From<SituationalEvent> for Trigger {
    fn from(event: SituationalEvent) -> Self {
        Self::Event(event)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => key.fmt(f),
            Self::Event(event) => event.fmt(f),
        }
    }
}

impl FromStr for Trigger {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(event) = s.parse::<SituationalEvent>() {
            return Ok(Self::Event(event));
        }
        Ok(Self::Key(s.parse()?))
    }
}

/// Situational events in the finder's binding vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SituationalEvent {
    /// Finder process finished starting up.
    Start,
    /// Entry list finished loading.
    Load,
    /// Query string changed.
    Change,
    /// Cursor moved to a different entry.
    Focus,
    /// Match result list was recomputed.
    Result,
    /// Terminal was resized.
    Resize,
    /// A multi-selection was made or cleared.
    Multi,
    /// Query matches nothing.
    Zero,
    /// Query matches exactly one entry.
    One,
    /// Backspace pressed on an empty query.
    BackwardEof,
    /// Jump label mode entered.
    Jump,
    /// Jump label mode cancelled.
    JumpCancel,
    /// Header line clicked.
    ClickHeader,
}

impl SituationalEvent {
    /// The finder's spelling for this event.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Load => "load",
            Self::Change => "change",
            Self::Focus => "focus",
            Self::Result => "result",
            Self::Resize => "resize",
            Self::Multi => "multi",
            Self::Zero => "zero",
            Self::One => "one",
            Self::BackwardEof => "backward-eof",
            Self::Jump => "jump",
            Self::JumpCancel => "jump-cancel",
            Self::ClickHeader => "click-header",
        }
    }
}

impl fmt::Display for SituationalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SituationalEvent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "load" => Ok(Self::Load),
            "change" => Ok(Self::Change),
            "focus" => Ok(Self::Focus),
            "result" => Ok(Self::Result),
            "resize" => Ok(Self::Resize),
            "multi" => Ok(Self::Multi),
            "zero" => Ok(Self::Zero),
            "one" => Ok(Self::One),
            "backward-eof" => Ok(Self::BackwardEof),
            "jump" => Ok(Self::Jump),
            "jump-cancel" => Ok(Self::JumpCancel),
            "click-header" => Ok(Self::ClickHeader),
            other => Err(Error::unknown_event(other)),
        }
    }
}

/// A key chord in the finder's binding vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Enter,
    Esc,
    Tab,
    ShiftTab,
    Space,
    Backspace,
    Delete,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    DoubleClick,
    /// `ctrl-a` .. `ctrl-z` (lowercase ASCII letter).
    Ctrl(char),
    /// `alt-a` .. `alt-z` (lowercase ASCII letter).
    Alt(char),
    /// `f1` .. `f12`.
    F(u8),
    /// A plain printable character.
    Char(char),
}

impl Key {
    /// `ctrl-<c>` after validating the letter.
    pub fn ctrl(c: char) -> Result<Self, Error> {
        if c.is_ascii_lowercase() {
            Ok(Self::Ctrl(c))
        } else {
            Err(Error::unknown_key(format!("ctrl-{c}")))
        }
    }

    /// `alt-<c>` after validating the letter.
    pub fn alt(c: char) -> Result<Self, Error> {
        if c.is_ascii_lowercase() {
            Ok(Self::Alt(c))
        } else {
            Err(Error::unknown_key(format!("alt-{c}")))
        }
    }

    /// `f1` .. `f12` after validating the number.
    pub fn function(n: u8) -> Result<Self, Error> {
        if (1..=12).contains(&n) {
            Ok(Self::F(n))
        } else {
            Err(Error::unknown_key(format!("f{n}")))
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enter => f.write_str("enter"),
            Self::Esc => f.write_str("esc"),
            Self::Tab => f.write_str("tab"),
            Self::ShiftTab => f.write_str("shift-tab"),
            Self::Space => f.write_str("space"),
            Self::Backspace => f.write_str("bspace"),
            Self::Delete => f.write_str("del"),
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
            Self::Home => f.write_str("home"),
            Self::End => f.write_str("end"),
            Self::PageUp => f.write_str("page-up"),
            Self::PageDown => f.write_str("page-down"),
            Self::Insert => f.write_str("insert"),
            Self::DoubleClick => f.write_str("double-click"),
            Self::Ctrl(c) => write!(f, "ctrl-{c}"),
            Self::Alt(c) => write!(f, "alt-{c}"),
            Self::F(n) => write!(f, "f{n}"),
            Self::Char(c) => write!(f, "{c}"),
        }
    }
}

impl FromStr for Key {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enter" | "return" => return Ok(Self::Enter),
            "esc" => return Ok(Self::Esc),
            "tab" => return Ok(Self::Tab),
            "shift-tab" | "btab" => return Ok(Self::ShiftTab),
            "space" => return Ok(Self::Space),
            "bspace" | "bs" => return Ok(Self::Backspace),
            "del" => return Ok(Self::Delete),
            "up" => return Ok(Self::Up),
            "down" => return Ok(Self::Down),
            "left" => return Ok(Self::Left),
            "right" => return Ok(Self::Right),
            "home" => return Ok(Self::Home),
            "end" => return Ok(Self::End),
            "page-up" | "pgup" => return Ok(Self::PageUp),
            "page-down" | "pgdn" => return Ok(Self::PageDown),
            "insert" => return Ok(Self::Insert),
            "double-click" => return Ok(Self::DoubleClick),
            _ => {}
        }

        if let Some(rest) = s.strip_prefix("ctrl-") {
            let mut chars = rest.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                return Self::ctrl(c);
            }
            return Err(Error::unknown_key(s));
        }
        if let Some(rest) = s.strip_prefix("alt-") {
            let mut chars = rest.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                return Self::alt(c);
            }
            return Err(Error::unknown_key(s));
        }
        if let Some(rest) = s.strip_prefix('f') {
            if let Ok(n) = rest.parse::<u8>() {
                return Self::function(n);
            }
        }

        let mut chars = s.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if !c.is_whitespace() && !c.is_control() {
                return Ok(Self::Char(c));
            }
        }
        Err(Error::unknown_key(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display_round_trip() {
        let keys = [
            Key::Enter,
            Key::Esc,
            Key::ShiftTab,
            Key::Backspace,
            Key::PageUp,
            Key::DoubleClick,
            Key::Ctrl('a'),
            Key::Alt('z'),
            Key::F(5),
            Key::Char('?'),
        ];
        for key in keys {
            let rendered = key.to_string();
            let parsed: Key = rendered.parse().expect("rendered key must re-parse");
            assert_eq!(parsed, key, "round trip of {rendered}");
        }
    }

    #[test]
    fn test_event_display_round_trip() {
        let events = [
            SituationalEvent::Start,
            SituationalEvent::Load,
            SituationalEvent::BackwardEof,
            SituationalEvent::JumpCancel,
            SituationalEvent::ClickHeader,
        ];
        for event in events {
            let rendered = event.to_string();
            let parsed: SituationalEvent = rendered.parse().expect("event must re-parse");
            assert_eq!(parsed, event);
        }
    }

    #[test]
    fn test_trigger_parse_prefers_events() {
        // "start" is an event, never the four-character key sequence
        let trigger: Trigger = "start".parse().unwrap();
        assert_eq!(trigger, Trigger::Event(SituationalEvent::Start));

        let trigger: Trigger = "ctrl-r".parse().unwrap();
        assert_eq!(trigger, Trigger::Key(Key::Ctrl('r')));
    }

    #[test]
    fn test_invalid_keys_rejected() {
        assert!("ctrl-A".parse::<Key>().is_err());
        assert!("ctrl-aa".parse::<Key>().is_err());
        assert!("f13".parse::<Key>().is_err());
        assert!("f0".parse::<Key>().is_err());
        assert!("not-a-key".parse::<Key>().is_err());
        assert!("".parse::<Key>().is_err());
    }

    #[test]
    fn test_key_aliases() {
        assert_eq!("btab".parse::<Key>().unwrap(), Key::ShiftTab);
        assert_eq!("pgup".parse::<Key>().unwrap(), Key::PageUp);
        assert_eq!("return".parse::<Key>().unwrap(), Key::Enter);
    }
}
