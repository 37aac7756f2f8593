//! Scenes: a setup function, a declarative configuration and the data
//! collected while the scene was on screen.
//!
//! A scene runs a fixed lifecycle on every [`Scene::show`]:
//!
//! 1. the setup function produces the stimuli,
//! 2. the stimuli are drawn once and `show_time` is recorded,
//! 3. `scene_drawn` fires,
//! 4. frames repeat (`scene_frame`, redraw, poll input, dispatch) until the
//!    duration elapses or a close trigger fires,
//! 5. `show` returns.

use std::collections::HashSet;
use std::fmt;

use crate::config::{SceneConfig, ValidatedConfig};
use crate::data::{DataCollector, Row, Value};
use crate::event::{Event, EventEmitter, EventName, InputKind, KeyName, SceneHook};
use crate::toolkit::{Stimuli, Toolkit};
use crate::{CallbackError, Result, SceneError};

/// Data key holding the clock time of the first draw.
pub const SHOW_TIME: &str = "show_time";
/// Data key holding the recorded input events.
pub const EVENTS: &str = "events";

type SetupFn<A> = Box<dyn FnMut(A) -> std::result::Result<Stimuli, CallbackError>>;

/// Handle passed to listeners while a scene is running.
pub struct SceneControl<'a> {
    data: &'a mut DataCollector,
    closing: &'a mut bool,
    elapsed: f64,
}

impl<'a> SceneControl<'a> {
    pub(crate) fn new(data: &'a mut DataCollector, closing: &'a mut bool, elapsed: f64) -> Self {
        Self {
            data,
            closing,
            elapsed,
        }
    }

    pub fn get(&self, key: &str) -> Result<&Value> {
        self.data.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.data.set(key, value);
        self
    }

    /// Events recorded so far in this run, oldest first.
    pub fn events(&self) -> &[Event] {
        self.data.get_events(EVENTS).unwrap_or(&[])
    }

    /// Seconds since the first draw; zero before it.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Requests the frame loop to stop once the current frame's callbacks
    /// have run.
    pub fn close(&mut self) {
        *self.closing = true;
    }

    pub fn is_closing(&self) -> bool {
        *self.closing
    }
}

/// Duration, close triggers and listeners of a scene.
#[derive(Debug, Default)]
struct Settings {
    duration: Option<f64>,
    close_on: HashSet<EventName>,
    emitter: EventEmitter,
}

impl Settings {
    /// Merges a validated config. Nothing changes if any listener clashes
    /// with one already registered.
    fn apply(&mut self, config: ValidatedConfig) -> Result<()> {
        if let Some((event, _)) = config
            .listeners
            .iter()
            .find(|(event, _)| self.emitter.contains(event))
        {
            return Err(SceneError::DuplicateListener(event.to_string()));
        }

        if let Some(duration) = config.duration {
            self.duration = duration;
        }
        self.close_on.extend(config.close_on);
        for (event, listener) in config.listeners {
            self.emitter.on(event, listener)?;
        }
        Ok(())
    }
}

/// A configured scene still waiting for its setup function.
///
/// Created by `Context::scene`; [`SceneBuilder::bind`] attaches the function
/// that produces the stimuli.
#[derive(Debug)]
pub struct SceneBuilder {
    toolkit: Toolkit,
    settings: Settings,
}

impl SceneBuilder {
    pub(crate) fn new(toolkit: Toolkit, config: SceneConfig) -> Result<Self> {
        let mut settings = Settings::default();
        settings.apply(config.validate()?)?;
        Ok(Self { toolkit, settings })
    }

    /// Merges more configuration before binding.
    pub fn config(mut self, config: SceneConfig) -> Result<Self> {
        self.settings.apply(config.validate()?)?;
        Ok(self)
    }

    /// Binds the setup function. It receives the arguments passed to
    /// [`Scene::show`] and returns one stimulus or a sequence of them.
    pub fn bind<A, F, S>(self, mut setup: F) -> Scene<A>
    where
        A: 'static,
        F: FnMut(A) -> std::result::Result<S, CallbackError> + 'static,
        S: Into<Stimuli>,
    {
        Scene {
            toolkit: self.toolkit,
            setup: Box::new(move |args: A| -> std::result::Result<Stimuli, CallbackError> {
                setup(args).map(Into::into)
            }),
            settings: self.settings,
            data: DataCollector::new(),
            stimuli: Stimuli::default(),
            runs: 0,
        }
    }
}

/// A configurable, reusable presentation unit.
pub struct Scene<A = ()> {
    toolkit: Toolkit,
    setup: SetupFn<A>,
    settings: Settings,
    data: DataCollector,
    stimuli: Stimuli,
    runs: usize,
}

impl<A> Scene<A> {
    /// Merges `config` into the scene. Same surface and checks as
    /// `Context::scene`; re-registering an event is an error.
    pub fn config(&mut self, config: SceneConfig) -> Result<&mut Self> {
        self.settings.apply(config.validate()?)?;
        Ok(self)
    }

    /// Removes the listener registered for `event`, if any.
    pub fn off(&mut self, event: &str) -> Result<&mut Self> {
        let event = EventName::from_listener_key(event)?;
        self.settings.emitter.off(&event);
        Ok(self)
    }

    pub fn duration(&self) -> Option<f64> {
        self.settings.duration
    }

    pub fn closes_on(&self, event: &str) -> bool {
        EventName::from_listener_key(event)
            .map(|event| self.settings.close_on.contains(&event))
            .unwrap_or(false)
    }

    pub fn has_listener(&self, event: &str) -> bool {
        EventName::from_listener_key(event)
            .map(|event| self.settings.emitter.contains(&event))
            .unwrap_or(false)
    }

    /// Number of completed or attempted `show` calls.
    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Runs the scene's lifecycle with `args` passed to the setup function.
    ///
    /// `show_time` and `events` are reset on every call; other keys set with
    /// [`Scene::set`] carry over between runs.
    pub fn show(&mut self, args: A) -> Result<&mut Self> {
        self.runs += 1;
        self.data.remove(SHOW_TIME);
        self.data.remove(EVENTS);
        let mut closing = false;

        let stimuli = (self.setup)(args)
            .map_err(|err| SceneError::callback(EventName::Scene(SceneHook::Setup), err))?;
        self.stimuli = stimuli;
        self.close_if_triggered(&EventName::Scene(SceneHook::Setup), &mut closing);
        self.toolkit.input()?.clear_events();
        tracing::debug!(run = self.runs, stimuli = self.stimuli.len(), "scene setup complete");

        let show_time = self.toolkit.present(&self.stimuli)?;
        // absorbs rounding in accumulated flip times
        let tolerance = self.toolkit.frame_period()? * 1e-6;
        self.data.set(SHOW_TIME, show_time);
        self.data.set(EVENTS, Vec::<Event>::new());
        tracing::debug!(show_time, duration = ?self.settings.duration, "scene first drawn");

        self.fire(&EventName::Scene(SceneHook::Drawn), &mut closing, 0.0)?;

        let mut frames = 1usize;
        loop {
            let elapsed = self.toolkit.now() - show_time;
            let expired = self
                .settings
                .duration
                .is_some_and(|duration| elapsed >= duration - tolerance);
            if closing || expired {
                break;
            }

            self.fire(&EventName::Scene(SceneHook::Frame), &mut closing, elapsed)?;
            self.toolkit.present(&self.stimuli)?;
            frames += 1;
            tracing::trace!(frame = frames, elapsed, "scene frame drawn");

            let mut inputs = self.toolkit.input()?.poll();
            inputs.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
            for input in inputs {
                let rt = (input.timestamp - show_time).max(0.0);
                let event = Event::new(input.kind, input.name, rt);
                let slots = listener_slots(&event);
                self.data.push_event(EVENTS, event);
                let elapsed = self.toolkit.now() - show_time;
                for slot in &slots {
                    self.fire(slot, &mut closing, elapsed)?;
                }
            }
        }

        tracing::debug!(
            frames,
            events = self.events().map(<[Event]>::len).unwrap_or(0),
            elapsed = self.toolkit.now() - show_time,
            "scene closed"
        );
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Result<&Value> {
        self.data.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Result<f64> {
        self.data.get_f64(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.data.set(key, value);
        self
    }

    /// Clock time of the most recent first draw.
    pub fn show_time(&self) -> Result<f64> {
        self.data.get_f64(SHOW_TIME)
    }

    /// Events recorded during the most recent run.
    pub fn events(&self) -> Result<&[Event]> {
        self.data.get_events(EVENTS)
    }

    pub fn data(&self) -> &DataCollector {
        &self.data
    }

    /// Flattens the scene data into an experiment row: every scalar entry,
    /// plus `response` and `rt` taken from the first recorded event.
    pub fn to_row(&self) -> Row {
        let mut row: Row = self
            .data
            .iter()
            .filter(|(_, value)| !matches!(value, Value::Events(_)))
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();
        if let Some(first) = self.events().ok().and_then(<[Event]>::first) {
            row.insert("response".to_string(), Value::from(first.name.as_str()));
            row.insert("rt".to_string(), Value::from(first.rt));
        }
        row
    }

    fn fire(&mut self, event: &EventName, closing: &mut bool, elapsed: f64) -> Result<()> {
        let mut control = SceneControl::new(&mut self.data, closing, elapsed);
        self.settings.emitter.emit(event, &mut control)?;
        self.close_if_triggered(event, closing);
        Ok(())
    }

    fn close_if_triggered(&self, event: &EventName, closing: &mut bool) {
        if self.settings.close_on.contains(event) && !*closing {
            tracing::debug!(%event, "close requested");
            *closing = true;
        }
    }
}

impl<A> fmt::Debug for Scene<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("settings", &self.settings)
            .field("data", &self.data)
            .field("runs", &self.runs)
            .finish()
    }
}

/// Listener slots an event fires, in dispatch order.
fn listener_slots(event: &Event) -> Vec<EventName> {
    match event.kind {
        InputKind::Key => event
            .event_name()
            .into_iter()
            .chain(std::iter::once(EventName::Key(KeyName::Any)))
            .collect(),
        InputKind::Mouse => event.event_name().into_iter().collect(),
    }
}
