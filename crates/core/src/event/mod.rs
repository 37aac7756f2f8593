//! Event names, recorded input events and the per-scene listener table.
//!
//! Listener names follow the `type_name` convention (`scene_drawn`,
//! `key_space`, `mouse_left`). They are parsed into [`EventName`] once, when
//! a configuration is applied, so the frame loop only ever deals with the
//! closed enumeration.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{CallbackError, SceneControl, SceneError};

/// Lifecycle points of a scene that can carry a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneHook {
    /// The content function bound with `SceneBuilder::bind`.
    Setup,
    /// Fired once, right after the first draw.
    Drawn,
    /// Fired at the start of every redraw.
    Frame,
}

impl SceneHook {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Drawn => "drawn",
            Self::Frame => "frame",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

impl MouseButton {
    /// Buttons in the order input devices report them.
    pub const ALL: [MouseButton; 3] = [Self::Left, Self::Middle, Self::Right];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Middle => "middle",
            Self::Right => "right",
        }
    }
}

impl FromStr for MouseButton {
    type Err = SceneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|button| button.as_str() == s)
            .ok_or_else(|| SceneError::UnknownEvent(format!("mouse_{s}")))
    }
}

/// Key part of a `key_*` event name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyName {
    /// Matches every key press.
    Any,
    /// A toolkit key name such as `space`, `f` or `num_1`.
    Named(String),
}

impl KeyName {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Any => "any",
            Self::Named(name) => name,
        }
    }

    /// A key name is a single digit or a run of lowercase ASCII letters,
    /// optionally prefixed with `num_`.
    pub fn is_valid(name: &str) -> bool {
        let body = name.strip_prefix("num_").unwrap_or(name);
        match body.as_bytes() {
            [] => false,
            [b] if b.is_ascii_digit() => true,
            bytes => bytes.iter().all(u8::is_ascii_lowercase),
        }
    }
}

/// A recognised listener slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventName {
    Scene(SceneHook),
    Key(KeyName),
    Mouse(MouseButton),
}

impl EventName {
    pub fn key(name: impl Into<String>) -> Self {
        let name = name.into();
        if name == "any" {
            Self::Key(KeyName::Any)
        } else {
            Self::Key(KeyName::Named(name))
        }
    }

    /// Parses a configuration key, accepting an optional `on_` prefix.
    pub fn from_listener_key(key: &str) -> Result<Self, SceneError> {
        key.strip_prefix("on_").unwrap_or(key).parse()
    }
}

impl FromStr for EventName {
    type Err = SceneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || SceneError::UnknownEvent(s.to_string());
        let (kind, name) = s.split_once('_').ok_or_else(unknown)?;
        match kind {
            "scene" => match name {
                "setup" => Ok(Self::Scene(SceneHook::Setup)),
                "drawn" => Ok(Self::Scene(SceneHook::Drawn)),
                "frame" => Ok(Self::Scene(SceneHook::Frame)),
                _ => Err(unknown()),
            },
            "mouse" => name.parse().map(Self::Mouse).map_err(|_| unknown()),
            "key" if name == "any" => Ok(Self::Key(KeyName::Any)),
            "key" if KeyName::is_valid(name) => Ok(Self::Key(KeyName::Named(name.to_string()))),
            _ => Err(unknown()),
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scene(hook) => write!(f, "scene_{}", hook.as_str()),
            Self::Key(key) => write!(f, "key_{}", key.as_str()),
            Self::Mouse(button) => write!(f, "mouse_{}", button.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Key,
    Mouse,
}

/// A single input occurrence recorded while a scene was shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: InputKind,
    /// Key name or mouse button name.
    pub name: String,
    /// Seconds since the scene's first draw.
    pub rt: f64,
}

impl Event {
    pub fn new(kind: InputKind, name: impl Into<String>, rt: f64) -> Self {
        Self {
            kind,
            name: name.into(),
            rt,
        }
    }

    /// The listener slot fired by this event, not counting `key_any`.
    ///
    /// Key names outside the listener grammar (`f1`, `lshift`) still map to
    /// a slot; it simply can never hold a listener. Unknown mouse buttons
    /// have no slot at all.
    pub fn event_name(&self) -> Option<EventName> {
        match self.kind {
            InputKind::Key => Some(EventName::Key(KeyName::Named(self.name.clone()))),
            InputKind::Mouse => self.name.parse().ok().map(EventName::Mouse),
        }
    }
}

/// Callback invoked when an event fires.
pub type Listener = Box<dyn FnMut(&mut SceneControl<'_>) -> Result<(), CallbackError>>;

/// Listener table with at most one callback per event name.
#[derive(Default)]
pub struct EventEmitter {
    listeners: HashMap<EventName, Listener>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener. Fails if one is already registered for `event`.
    pub fn on(&mut self, event: EventName, listener: Listener) -> Result<&mut Self, SceneError> {
        if self.listeners.contains_key(&event) {
            return Err(SceneError::DuplicateListener(event.to_string()));
        }
        self.listeners.insert(event, listener);
        Ok(self)
    }

    /// Removes a listener. Does nothing if none is registered.
    pub fn off(&mut self, event: &EventName) -> &mut Self {
        self.listeners.remove(event);
        self
    }

    pub fn contains(&self, event: &EventName) -> bool {
        self.listeners.contains_key(event)
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Invokes the listener for `event`, if any.
    pub fn emit(
        &mut self,
        event: &EventName,
        control: &mut SceneControl<'_>,
    ) -> Result<(), SceneError> {
        match self.listeners.get_mut(event) {
            Some(listener) => listener(control).map_err(|err| SceneError::callback(event, err)),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.listeners.keys().map(ToString::to_string).collect();
        names.sort();
        f.debug_struct("EventEmitter").field("listeners", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_recognised_names() {
        let cases = [
            ("scene_drawn", EventName::Scene(SceneHook::Drawn)),
            ("mouse_right", EventName::Mouse(MouseButton::Right)),
            ("key_any", EventName::Key(KeyName::Any)),
            ("key_escape", EventName::key("escape")),
            ("key_num_7", EventName::key("num_7")),
            ("key_3", EventName::key("3")),
        ];
        for (name, expected) in cases {
            assert_eq!(name.parse::<EventName>().unwrap(), expected);
        }
    }

    #[test]
    fn rejects_malformed_names() {
        let malformed = [
            "scene_close",
            "mouse_wheel",
            "key_F",
            "key_12",
            "key_",
            "space",
            "touch_left",
            "key_num_",
        ];
        for name in malformed {
            let err = name.parse::<EventName>().unwrap_err();
            assert!(matches!(err, SceneError::UnknownEvent(_)), "{name} should be rejected");
        }
    }

    #[test]
    fn strips_listener_prefix() {
        let space = EventName::key("space");
        assert_eq!(EventName::from_listener_key("on_key_space").unwrap(), space);
        assert_eq!(EventName::from_listener_key("key_space").unwrap(), space);
    }

    #[test]
    fn display_round_trips_through_parse() {
        for name in ["scene_setup", "scene_frame", "mouse_middle", "key_any", "key_num_0"] {
            assert_eq!(name.parse::<EventName>().unwrap().to_string(), name);
        }
    }

    #[test]
    fn duplicate_listener_is_rejected() {
        let mut emitter = EventEmitter::new();
        emitter.on(EventName::key("escape"), Box::new(|_| Ok(()))).unwrap();
        let err = emitter
            .on(EventName::key("escape"), Box::new(|_| Ok(())))
            .err()
            .expect("second registration should fail");
        assert!(matches!(err, SceneError::DuplicateListener(name) if name == "key_escape"));
    }

    #[test]
    fn off_frees_the_slot() {
        let mut emitter = EventEmitter::new();
        let event = EventName::Mouse(MouseButton::Left);
        emitter.on(event.clone(), Box::new(|_| Ok(()))).unwrap();
        emitter.off(&event);
        assert!(emitter.is_empty());
        assert!(emitter.on(event, Box::new(|_| Ok(()))).is_ok());
        emitter.off(&EventName::key("q"));
        assert_eq!(emitter.len(), 1);
    }

    #[test]
    fn event_maps_to_listener_slot() {
        assert_eq!(Event::new(InputKind::Key, "f", 0.3).event_name(), Some(EventName::key("f")));
        assert_eq!(
            Event::new(InputKind::Mouse, "left", 0.1).event_name(),
            Some(EventName::Mouse(MouseButton::Left))
        );
        assert_eq!(Event::new(InputKind::Mouse, "x1", 0.1).event_name(), None);
    }
}
