use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use crate::config::{SceneConfig, StimulusDefaults};
use crate::data::{ExperimentData, Value};
use crate::scene::{Scene, SceneBuilder};
use crate::toolkit::{Clock, InputDevice, TextStim, Toolkit, Window};
use crate::{Result, SceneError};

/// Experiment-wide resources and the factory for scenes.
///
/// The window, input device and clock are shared with the caller, who keeps
/// its own handles and decides when to tear them down.
#[derive(Debug)]
pub struct Context {
    toolkit: Toolkit,
    data: Rc<RefCell<ExperimentData>>,
    defaults: StimulusDefaults,
}

impl Context {
    pub fn new<W, I, C>(window: Rc<RefCell<W>>, input: Rc<RefCell<I>>, clock: C) -> Self
    where
        W: Window + 'static,
        I: InputDevice + 'static,
        C: Clock + 'static,
    {
        Self::from_toolkit(Toolkit::new(window, input, Rc::new(clock)))
    }

    pub fn from_toolkit(toolkit: Toolkit) -> Self {
        Self {
            toolkit,
            data: Rc::new(RefCell::new(ExperimentData::new())),
            defaults: StimulusDefaults::default(),
        }
    }

    /// Shares an existing data sink instead of the fresh one.
    pub fn with_data(mut self, data: Rc<RefCell<ExperimentData>>) -> Self {
        self.data = data;
        self
    }

    pub fn with_defaults(mut self, defaults: StimulusDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn toolkit(&self) -> &Toolkit {
        &self.toolkit
    }

    pub fn defaults(&self) -> &StimulusDefaults {
        &self.defaults
    }

    /// Handle to the shared data sink.
    pub fn data(&self) -> Rc<RefCell<ExperimentData>> {
        Rc::clone(&self.data)
    }

    /// Validates `config` and returns a builder to bind the setup function
    /// to.
    ///
    /// ```
    /// # use std::{cell::RefCell, rc::Rc};
    /// # use stimscene_core::{
    /// #     Context, HeadlessWindow, SceneConfig, ScriptedInput, TextStim, VirtualClock,
    /// # };
    /// # let clock = VirtualClock::new();
    /// # let window = Rc::new(RefCell::new(HeadlessWindow::new(clock.clone(), 60.0)));
    /// # let input = Rc::new(RefCell::new(ScriptedInput::new(clock.clone())));
    /// let ctx = Context::new(window, input, clock);
    /// let mut probe = ctx
    ///     .scene(SceneConfig::new().duration(0.5).close_on("key_f"))?
    ///     .bind(|word: &'static str| Ok(TextStim::new(word)));
    /// probe.show("GREEN")?;
    /// assert!(probe.show_time().is_ok());
    /// # Ok::<(), stimscene_core::SceneError>(())
    /// ```
    pub fn scene(&self, config: SceneConfig) -> Result<SceneBuilder> {
        SceneBuilder::new(self.toolkit.clone(), config)
    }

    /// Static text scene styled with the context defaults.
    pub fn text(&self, content: impl Into<String>) -> Result<Scene> {
        let stim = TextStim::new(content)
            .with_height(self.defaults.text_height)
            .with_color(self.defaults.text_color.clone());
        self.text_stim(stim)
    }

    /// Static scene showing a caller-styled text stimulus.
    pub fn text_stim(&self, stim: TextStim) -> Result<Scene> {
        Ok(self.scene(SceneConfig::new())?.bind(move |()| Ok(stim.clone())))
    }

    /// Central `+`. `None` falls back to the configured fixation duration.
    pub fn fixation(&self, duration: Option<f64>) -> Result<Scene> {
        let duration = duration.or(self.defaults.fixation_duration);
        let mut scene = self.text("+")?;
        scene.config(SceneConfig::new().maybe_duration(duration))?;
        Ok(scene)
    }

    /// Empty screen. `None` falls back to the configured blank duration.
    pub fn blank(&self, duration: Option<f64>) -> Result<Scene> {
        let duration = duration.or(self.defaults.blank_duration);
        let mut scene = self.text("")?;
        scene.config(SceneConfig::new().maybe_duration(duration))?;
        Ok(scene)
    }

    /// Appends one row of named values to the shared data sink.
    pub fn add_row<K, V, F>(&self, fields: F) -> Result<()>
    where
        K: Into<String>,
        V: Into<Value>,
        F: IntoIterator<Item = (K, V)>,
    {
        self.data
            .try_borrow_mut()
            .map_err(|_| SceneError::SurfaceBusy("experiment data"))?
            .add_row(fields);
        Ok(())
    }

    /// Appends the flattened data of `scene` as one row.
    pub fn add_row_from<A>(&self, scene: &Scene<A>) -> Result<()> {
        self.add_row(scene.to_row())
    }

    /// Writes the collected rows; the extension picks the format
    /// (`.json` for JSON, anything else for CSV).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = self
            .data
            .try_borrow()
            .map_err(|_| SceneError::SurfaceBusy("experiment data"))?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => data.save_json(path),
            _ => data.save_csv(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessWindow, ScriptedInput, VirtualClock};

    fn context() -> (Context, VirtualClock, Rc<RefCell<HeadlessWindow>>) {
        let clock = VirtualClock::new();
        let window = Rc::new(RefCell::new(HeadlessWindow::new(clock.clone(), 64.0)));
        let input = Rc::new(RefCell::new(ScriptedInput::new(clock.clone())));
        let ctx = Context::new(window.clone(), input, clock.clone());
        (ctx, clock, window)
    }

    #[test]
    fn add_row_appends_one_row() {
        let (ctx, _, _) = context();
        ctx.add_row([("a", Value::from(1)), ("b", Value::from("x"))]).unwrap();

        let data = ctx.data();
        let data = data.borrow();
        assert_eq!(data.len(), 1);
        assert_eq!(data.rows()[0].len(), 2);
        assert_eq!(data.rows()[0]["b"], Value::Text("x".into()));
    }

    #[test]
    fn shares_a_caller_supplied_sink() {
        let sink = Rc::new(RefCell::new(ExperimentData::new()));
        let (ctx, _, _) = context();
        let ctx = ctx.with_data(sink.clone());

        ctx.add_row([("block", "main")]).unwrap();
        assert_eq!(sink.borrow().len(), 1);
    }

    #[test]
    fn scene_rejects_bad_config_before_drawing() {
        let (ctx, _, window) = context();
        let config = SceneConfig::new()
            .on("on_key_escape", |_| Ok(()))
            .on("on_key_escape", |_| Ok(()));
        let err = ctx.scene(config).unwrap_err();

        assert!(err.is_configuration());
        assert_eq!(window.borrow().flip_count(), 0);
    }

    #[test]
    fn fixation_uses_default_duration() {
        let (ctx, clock, window) = context();
        let mut fixation = ctx.fixation(None).unwrap();
        assert_eq!(fixation.duration(), Some(0.5));

        fixation.show(()).unwrap();

        assert!(clock.now() - fixation.show_time().unwrap() >= 0.5);
        assert!(window.borrow().frames().iter().all(|frame| frame == &["+"]));
    }

    #[test]
    fn blank_draws_empty_text() {
        let (ctx, _, window) = context();
        let mut blank = ctx.blank(Some(0.0)).unwrap();
        blank.show(()).unwrap();

        assert_eq!(window.borrow().frames(), [vec![String::new()]]);
    }

    #[test]
    fn text_applies_context_defaults() {
        let (ctx, _, _) = context();
        let ctx = ctx.with_defaults(StimulusDefaults {
            fixation_duration: None,
            ..StimulusDefaults::default()
        });
        let fixation = ctx.fixation(None).unwrap();
        assert_eq!(fixation.duration(), None);

        assert!(ctx.fixation(Some(-1.0)).unwrap_err().is_configuration());
    }

    #[test]
    fn save_picks_format_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _, _) = context();
        ctx.add_row([("rt", 0.25)]).unwrap();

        ctx.save(dir.path().join("out.json")).unwrap();
        ctx.save(dir.path().join("out.csv")).unwrap();

        let json = std::fs::read_to_string(dir.path().join("out.json")).unwrap();
        let csv = std::fs::read_to_string(dir.path().join("out.csv")).unwrap();
        assert!(json.trim_start().starts_with('['));
        assert_eq!(csv, "rt\n0.25\n");
    }
}
