//! Seams to the presentation toolkit.
//!
//! Rendering, frame pacing and device polling all live behind these traits.
//! A scene only ever asks a [`Window`] to draw and flip, an [`InputDevice`]
//! for the presses it saw since the last poll, and a [`Clock`] for the time.

use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::{InputKind, Result, SceneError};

/// Monotonic time source, in seconds.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Display surface. Drawing is buffered until [`Window::flip`].
pub trait Window {
    fn draw_text(&mut self, text: &TextStim) -> Result<()>;

    /// Presents the back buffer, blocking until the next refresh, and returns
    /// the presentation timestamp in seconds.
    fn flip(&mut self) -> Result<f64>;

    /// Nominal refresh interval in seconds.
    fn frame_period(&self) -> f64;
}

/// A key or button press as reported by the toolkit.
#[derive(Debug, Clone, PartialEq)]
pub struct RawInput {
    pub kind: InputKind,
    pub name: String,
    /// Clock time of the press, in seconds.
    pub timestamp: f64,
}

impl RawInput {
    pub fn key(name: impl Into<String>, timestamp: f64) -> Self {
        Self {
            kind: InputKind::Key,
            name: name.into(),
            timestamp,
        }
    }

    pub fn mouse(name: impl Into<String>, timestamp: f64) -> Self {
        Self {
            kind: InputKind::Mouse,
            name: name.into(),
            timestamp,
        }
    }
}

pub trait InputDevice {
    /// Drops any presses that are buffered but not yet polled.
    fn clear_events(&mut self);

    /// Returns presses observed since the previous poll, in the order the
    /// device reports them.
    fn poll(&mut self) -> Vec<RawInput>;
}

/// Shared handles to the toolkit resources of one experiment session.
///
/// The caller constructs the window and devices and keeps its own handles;
/// every scene created from the same context sees the same instances.
#[derive(Clone)]
pub struct Toolkit {
    window: Rc<RefCell<dyn Window>>,
    input: Rc<RefCell<dyn InputDevice>>,
    clock: Rc<dyn Clock>,
}

impl Toolkit {
    pub fn new(
        window: Rc<RefCell<dyn Window>>,
        input: Rc<RefCell<dyn InputDevice>>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        Self {
            window,
            input,
            clock,
        }
    }

    pub(crate) fn window(&self) -> Result<RefMut<'_, dyn Window + 'static>> {
        self.window
            .try_borrow_mut()
            .map_err(|_| SceneError::SurfaceBusy("window"))
    }

    pub(crate) fn input(&self) -> Result<RefMut<'_, dyn InputDevice + 'static>> {
        self.input
            .try_borrow_mut()
            .map_err(|_| SceneError::SurfaceBusy("input device"))
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Refresh interval of the shared window.
    pub fn frame_period(&self) -> Result<f64> {
        Ok(self.window()?.frame_period())
    }

    /// Draws `stimuli` and presents them, returning the flip timestamp.
    pub(crate) fn present(&self, stimuli: &Stimuli) -> Result<f64> {
        let mut window = self.window()?;
        stimuli.draw_all(&mut *window)?;
        window.flip()
    }
}

impl std::fmt::Debug for Toolkit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolkit").field("now", &self.clock.now()).finish()
    }
}

/// Anything a scene can put on screen.
pub trait Drawable {
    fn draw(&self, window: &mut dyn Window) -> Result<()>;
}

impl<D: Drawable + ?Sized> Drawable for Box<D> {
    fn draw(&self, window: &mut dyn Window) -> Result<()> {
        (**self).draw(window)
    }
}

/// Static text stimulus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStim {
    pub text: String,
    /// Letter height in window units.
    pub height: f32,
    pub pos: [f32; 2],
    pub color: String,
}

impl TextStim {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_height(mut self, height: f32) -> Self {
        self.height = height;
        self
    }

    pub fn with_pos(mut self, x: f32, y: f32) -> Self {
        self.pos = [x, y];
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }
}

impl Default for TextStim {
    fn default() -> Self {
        Self {
            text: String::new(),
            height: 0.1,
            pos: [0.0, 0.0],
            color: "white".to_string(),
        }
    }
}

impl Drawable for TextStim {
    fn draw(&self, window: &mut dyn Window) -> Result<()> {
        window.draw_text(self)
    }
}

/// The drawables produced by a scene's setup function. A single stimulus is
/// a one-element sequence.
#[derive(Default)]
pub struct Stimuli(Vec<Box<dyn Drawable>>);

impl Stimuli {
    pub fn many(items: Vec<Box<dyn Drawable>>) -> Self {
        Self(items)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Draws every stimulus in order.
    pub fn draw_all(&self, window: &mut dyn Window) -> Result<()> {
        for item in &self.0 {
            item.draw(window)?;
        }
        Ok(())
    }
}

impl<D: Drawable + 'static> From<D> for Stimuli {
    fn from(item: D) -> Self {
        Self(vec![Box::new(item)])
    }
}

impl FromIterator<Box<dyn Drawable>> for Stimuli {
    fn from_iter<I: IntoIterator<Item = Box<dyn Drawable>>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl std::fmt::Debug for Stimuli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stimuli").field("len", &self.0.len()).finish()
    }
}
