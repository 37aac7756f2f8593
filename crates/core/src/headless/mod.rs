//! Deterministic toolkit backends.
//!
//! [`HeadlessWindow`] records what was drawn instead of rendering it and
//! advances a shared [`VirtualClock`] by one refresh interval per flip.
//! [`ScriptedInput`] releases pre-scheduled presses once the clock reaches
//! them. Together they let whole experiments run without a display.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Instant;

use crate::toolkit::{Clock, InputDevice, RawInput, TextStim, Window};
use crate::Result;

/// Manually advanced clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    now: Rc<Cell<f64>>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, seconds: f64) {
        self.now.set(self.now.get() + seconds.max(0.0));
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}

/// Wall-clock time since construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::start()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Window that records the text drawn in each presented frame.
#[derive(Debug)]
pub struct HeadlessWindow {
    clock: VirtualClock,
    frame_period: f64,
    pending: Vec<String>,
    frames: Vec<Vec<String>>,
}

impl HeadlessWindow {
    pub fn new(clock: VirtualClock, frame_rate: f64) -> Self {
        let frame_rate = if frame_rate.is_finite() && frame_rate > 0.0 {
            frame_rate
        } else {
            60.0
        };
        Self {
            clock,
            frame_period: 1.0 / frame_rate,
            pending: Vec::new(),
            frames: Vec::new(),
        }
    }

    /// Text drawn in every flipped frame, oldest first.
    pub fn frames(&self) -> &[Vec<String>] {
        &self.frames
    }

    pub fn flip_count(&self) -> usize {
        self.frames.len()
    }
}

impl Window for HeadlessWindow {
    fn draw_text(&mut self, text: &TextStim) -> Result<()> {
        self.pending.push(text.text.clone());
        Ok(())
    }

    fn flip(&mut self) -> Result<f64> {
        self.clock.advance(self.frame_period);
        self.frames.push(std::mem::take(&mut self.pending));
        Ok(self.clock.now())
    }

    fn frame_period(&self) -> f64 {
        self.frame_period
    }
}

/// Input device replaying a fixed schedule of presses.
#[derive(Debug)]
pub struct ScriptedInput {
    clock: VirtualClock,
    queue: VecDeque<RawInput>,
}

impl ScriptedInput {
    pub fn new(clock: VirtualClock) -> Self {
        Self {
            clock,
            queue: VecDeque::new(),
        }
    }

    /// Schedules a press at an absolute clock time.
    pub fn push(&mut self, input: RawInput) -> &mut Self {
        let at = self
            .queue
            .iter()
            .position(|queued| queued.timestamp > input.timestamp)
            .unwrap_or(self.queue.len());
        self.queue.insert(at, input);
        self
    }

    /// Schedules a key press `delay` seconds from now.
    pub fn press_key_in(&mut self, key: &str, delay: f64) -> &mut Self {
        let at = self.clock.now() + delay;
        self.push(RawInput::key(key, at))
    }

    /// Schedules a mouse click `delay` seconds from now.
    pub fn click_in(&mut self, button: &str, delay: f64) -> &mut Self {
        let at = self.clock.now() + delay;
        self.push(RawInput::mouse(button, at))
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl InputDevice for ScriptedInput {
    fn clear_events(&mut self) {
        let now = self.clock.now();
        self.queue.retain(|input| input.timestamp > now);
    }

    fn poll(&mut self) -> Vec<RawInput> {
        let now = self.clock.now();
        let due = self
            .queue
            .iter()
            .take_while(|input| input.timestamp <= now)
            .count();
        self.queue.drain(..due).collect()
    }
}
