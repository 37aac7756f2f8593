//! Declarative scenes for frame-based psychology experiments.
//!
//! A [`Scene`] bundles a setup function that produces stimuli, a
//! configuration (duration, close triggers, event listeners) and the data
//! collected while it was on screen. A [`Context`] holds the resources shared
//! by every scene of a session (window, input device, clock and the
//! experiment data sink) and builds scenes from a [`SceneConfig`].
//!
//! Rendering, frame pacing and device polling stay behind the traits in
//! [`toolkit`]; the [`headless`] module provides deterministic
//! implementations for tests and dry runs.

pub mod config;
pub mod context;
pub mod data;
pub mod error;
pub mod event;
pub mod headless;
pub mod scene;
pub mod toolkit;

pub use config::{AppConfig, DisplayConfig, SceneConfig, StimulusDefaults};
pub use context::Context;
pub use data::{DataCollector, ExperimentData, Row, Value};
pub use error::{CallbackError, Result, SceneError};
pub use event::{
    Event, EventEmitter, EventName, InputKind, KeyName, Listener, MouseButton, SceneHook,
};
pub use headless::{HeadlessWindow, ScriptedInput, SystemClock, VirtualClock};
pub use scene::{Scene, SceneBuilder, SceneControl, EVENTS, SHOW_TIME};
pub use toolkit::{Clock, Drawable, InputDevice, RawInput, Stimuli, TextStim, Toolkit, Window};
