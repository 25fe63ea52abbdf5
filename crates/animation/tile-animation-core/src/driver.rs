//! Automatic frame advance.
//!
//! The driver owns no timer. The host calls [`AnimationDriver::poll`] from
//! its per-frame callback and advances the animation whenever it answers
//! `true`.

use crate::config::DEFAULT_FRAME_RATE_MS;

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationDriver {
    frame_rate_ms: f64,
    last_advance_ms: Option<f64>,
}

impl Default for AnimationDriver {
    fn default() -> Self {
        Self {
            frame_rate_ms: DEFAULT_FRAME_RATE_MS,
            last_advance_ms: None,
        }
    }
}

impl AnimationDriver {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn frame_rate_ms(&self) -> f64 {
        self.frame_rate_ms
    }

    /// NaN is ignored; negative rates clamp to 0 (advance on every poll).
    pub fn set_frame_rate(&mut self, frame_rate_ms: f64) -> bool {
        if frame_rate_ms.is_nan() {
            log::warn!("ignoring NaN frame rate");
            return false;
        }
        self.frame_rate_ms = frame_rate_ms.max(0.0);
        true
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.last_advance_ms.is_some()
    }

    /// Start counting from `now_ms`. A running driver keeps its phase.
    pub fn start(&mut self, now_ms: f64) {
        if self.last_advance_ms.is_none() {
            self.last_advance_ms = Some(now_ms);
        }
    }

    pub fn pause(&mut self) {
        self.last_advance_ms = None;
    }

    /// Whether a frame is due. The interval restarts from the poll that
    /// advanced, not from the ideal deadline.
    pub fn poll(&mut self, now_ms: f64) -> bool {
        match self.last_advance_ms {
            Some(last) if last + self.frame_rate_ms < now_ms => {
                self.last_advance_ms = Some(now_ms);
                true
            }
            _ => false,
        }
    }
}
