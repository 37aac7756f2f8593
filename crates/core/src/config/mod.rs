use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::event::{EventName, Listener, SceneHook};
use crate::{CallbackError, Result, SceneControl, SceneError};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub display: DisplayConfig,
    pub defaults: StimulusDefaults,
    /// Where collected data is written. `.csv` or `.json`.
    pub output: Option<PathBuf>,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing sections use defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Configuration specific to the display surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub frame_rate: f64,
    pub size: [u32; 2],
    pub fullscreen: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60.0,
            size: [1280, 720],
            fullscreen: false,
        }
    }
}

/// Defaults used by the `text`, `fixation` and `blank` convenience scenes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StimulusDefaults {
    pub text_height: f32,
    pub text_color: String,
    pub fixation_duration: Option<f64>,
    pub blank_duration: Option<f64>,
}

impl Default for StimulusDefaults {
    fn default() -> Self {
        Self {
            text_height: 0.1,
            text_color: "white".to_string(),
            fixation_duration: Some(0.5),
            blank_duration: Some(0.5),
        }
    }
}

/// Declarative scene configuration: duration, close triggers and listeners.
///
/// Building a config never fails. Names and durations are validated when the
/// config is applied through `Context::scene` or `Scene::config`, so every
/// problem surfaces before the scene is first drawn.
///
/// ```
/// use stimscene_core::SceneConfig;
///
/// let config = SceneConfig::new()
///     .duration(1.0)
///     .close_on("key_escape")
///     .on("on_key_space", |scene| {
///         scene.set("pressed_space", true);
///         Ok(())
///     });
/// ```
#[derive(Default)]
pub struct SceneConfig {
    /// `None` leaves the scene's duration untouched when merging.
    duration: Option<Option<f64>>,
    close_on: Vec<String>,
    listeners: Vec<(String, Listener)>,
}

impl SceneConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds to keep drawing. Without a duration the scene runs until a
    /// close trigger fires.
    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration = Some(Some(seconds));
        self
    }

    /// Sets or clears the duration; `None` means "until closed".
    pub fn maybe_duration(mut self, seconds: Option<f64>) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn until_closed(self) -> Self {
        self.maybe_duration(None)
    }

    /// Ends the frame loop when `event` fires.
    pub fn close_on(mut self, event: impl Into<String>) -> Self {
        self.close_on.push(event.into());
        self
    }

    pub fn close_on_all<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.close_on.extend(events.into_iter().map(Into::into));
        self
    }

    /// Registers a listener under an `on_<type>_<name>` (or `<type>_<name>`)
    /// key.
    pub fn on<F>(mut self, event: impl Into<String>, listener: F) -> Self
    where
        F: FnMut(&mut SceneControl<'_>) -> std::result::Result<(), CallbackError> + 'static,
    {
        self.listeners.push((event.into(), Box::new(listener)));
        self
    }

    pub fn on_event<F>(self, event: EventName, listener: F) -> Self
    where
        F: FnMut(&mut SceneControl<'_>) -> std::result::Result<(), CallbackError> + 'static,
    {
        self.on(event.to_string(), listener)
    }

    /// Checks every name and the duration, producing the typed form.
    pub(crate) fn validate(self) -> Result<ValidatedConfig> {
        if let Some(Some(seconds)) = self.duration {
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(SceneError::InvalidDuration(seconds));
            }
        }

        let mut close_on = HashSet::new();
        for name in &self.close_on {
            close_on.insert(EventName::from_listener_key(name)?);
        }

        let mut seen = HashSet::new();
        let mut listeners = Vec::with_capacity(self.listeners.len());
        for (key, listener) in self.listeners {
            let event = EventName::from_listener_key(&key)?;
            if event == EventName::Scene(SceneHook::Setup) {
                return Err(SceneError::ReservedEvent(event.to_string()));
            }
            if !seen.insert(event.clone()) {
                return Err(SceneError::DuplicateListener(event.to_string()));
            }
            listeners.push((event, listener));
        }

        Ok(ValidatedConfig {
            duration: self.duration,
            close_on,
            listeners,
        })
    }
}

impl fmt::Debug for SceneConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners: Vec<&str> = self.listeners.iter().map(|(key, _)| key.as_str()).collect();
        f.debug_struct("SceneConfig")
            .field("duration", &self.duration)
            .field("close_on", &self.close_on)
            .field("listeners", &listeners)
            .finish()
    }
}

pub(crate) struct ValidatedConfig {
    pub duration: Option<Option<f64>>,
    pub close_on: HashSet<EventName>,
    pub listeners: Vec<(EventName, Listener)>,
}
