//! Which frame is on screen, and how the others fade away.
//!
//! The fade stack lists the frames taking part in the current cross-fade,
//! oldest first; its last entry is the current frame. When a new frame is
//! shown every member fades toward its next trail opacity, the oldest
//! members drop out, and the newcomer fades in to the animation opacity.

use crate::config::FadeTimings;
use crate::easing::Easing;
use crate::frame::Frame;
use crate::renderer::Renderer;
use crate::scheduler::FrameScheduler;
use crate::time::Timestamp;
use crate::transition::{PropertyTarget, TransitionEngine};

/// Frame opacities addressed by sequence index.
struct FrameOpacity<'a> {
    frames: &'a [Frame],
    renderer: &'a mut dyn Renderer,
}

impl PropertyTarget<usize> for FrameOpacity<'_> {
    fn get(&self, key: &usize) -> Option<f64> {
        self.frames.get(*key)?.opacity(&*self.renderer)
    }

    fn set(&mut self, key: &usize, value: f64) {
        if let Some(frame) = self.frames.get(*key) {
            frame.set_opacity(&mut *self.renderer, value);
        }
    }
}

/// Everything a presentation change touches, borrowed for one call.
pub struct Stage<'a> {
    pub scheduler: &'a FrameScheduler,
    pub renderer: &'a mut dyn Renderer,
    pub transitions: &'a mut TransitionEngine<usize>,
    pub timings: &'a FadeTimings,
    pub now_ms: f64,
}

impl Stage<'_> {
    pub fn fade_in(&mut self, index: usize, opacity: f64) {
        let (easing, duration) = (self.timings.fade_in_easing, self.timings.fade_in_ms);
        self.fade(index, opacity, easing, duration);
    }

    pub fn fade_out(&mut self, index: usize, opacity: f64) {
        let (easing, duration) = (self.timings.fade_out_easing, self.timings.fade_out_ms);
        self.fade(index, opacity, easing, duration);
    }

    /// Advance every running fade to `now_ms`.
    pub fn step_transitions(&mut self) {
        let mut target = FrameOpacity {
            frames: self.scheduler.frames(),
            renderer: &mut *self.renderer,
        };
        self.transitions.step(&mut target, self.now_ms);
    }

    fn fade(&mut self, index: usize, opacity: f64, easing: Easing, duration_ms: f64) {
        let mut target = FrameOpacity {
            frames: self.scheduler.frames(),
            renderer: &mut *self.renderer,
        };
        self.transitions
            .animate(&mut target, index, opacity, easing, duration_ms, self.now_ms);
    }
}

/// Result of a request to show a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowOutcome {
    /// The current frame changed to this index.
    Changed(usize),
    /// The current frame was shown again.
    Refreshed(usize),
    /// Out of range, not ready, or outside the completed groups.
    Rejected,
    /// The time lies outside the animation; the whole stack faded out.
    FadedOut,
    /// No frame at that time.
    NotFound,
}

impl ShowOutcome {
    #[inline]
    pub fn changed(&self) -> Option<usize> {
        match self {
            Self::Changed(index) => Some(*index),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PresentationController {
    fade_stack: Vec<usize>,
    /// Trail opacities aligned with the stack: entry 0 is for the oldest member.
    fade_out_opacities: Option<Vec<f64>>,
    opacity: f64,
}

impl Default for PresentationController {
    fn default() -> Self {
        Self {
            fade_stack: Vec::new(),
            fade_out_opacities: None,
            opacity: 1.0,
        }
    }
}

impl PresentationController {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn fade_stack(&self) -> &[usize] {
        &self.fade_stack
    }

    #[inline]
    pub fn current(&self) -> Option<usize> {
        self.fade_stack.last().copied()
    }

    /// Global opacity the current frame fades in to.
    #[inline]
    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    /// The configured trail, most recently replaced first.
    pub fn fade_out_opacities(&self) -> Option<Vec<f64>> {
        self.fade_out_opacities
            .as_ref()
            .map(|steps| steps.iter().rev().copied().collect())
    }

    #[inline]
    pub fn max_stack_len(&self) -> usize {
        self.fade_out_opacities.as_ref().map_or(1, Vec::len).max(1)
    }

    /// `None` or an empty list removes the trail. A list with any value
    /// outside `[0, 1]` is rejected and the previous trail kept.
    pub fn set_fade_out_opacities(&mut self, opacities: Option<&[f64]>) -> bool {
        let Some(opacities) = opacities.filter(|o| !o.is_empty()) else {
            self.fade_out_opacities = None;
            return true;
        };
        if let Some(bad) = opacities
            .iter()
            .find(|o| !(0.0..=1.0).contains(*o))
        {
            log::warn!("ignoring fade-out opacities {opacities:?}: {bad} is out of range");
            return false;
        }
        self.fade_out_opacities = Some(opacities.iter().rev().copied().collect());
        true
    }

    /// Show the frame at `index`, unless it is not allowed yet. `force`
    /// skips the check, for re-showing a frame whose content was refreshed.
    pub fn show(&mut self, stage: &mut Stage<'_>, index: usize, force: bool) -> ShowOutcome {
        if index >= stage.scheduler.len() || !(force || stage.scheduler.allow_show(index)) {
            return ShowOutcome::Rejected;
        }
        let current = self.current();
        if current == Some(index) {
            stage.fade_in(index, self.opacity);
            return ShowOutcome::Refreshed(index);
        }

        self.fade_stack.retain(|&member| member != index);
        let len = self.fade_stack.len();
        let previous = len.checked_sub(2).map(|i| self.fade_stack[i]);
        // direction changed, or wrapped around
        let looping = match (previous, current) {
            (Some(prev), Some(cur)) => {
                !((prev < cur && cur < index) || (prev > cur && cur > index))
            }
            _ => false,
        };
        let remove = if looping {
            len
        } else {
            (len + 1).saturating_sub(self.max_stack_len())
        };
        for position in 0..len {
            let target = self.departing_opacity(position, looping);
            stage.fade_out(self.fade_stack[position], target);
        }
        self.fade_stack.drain(..remove);
        self.fade_stack.push(index);

        stage.fade_in(index, self.opacity);
        log::debug!("showing frame {index} (looping={looping})");
        ShowOutcome::Changed(index)
    }

    fn departing_opacity(&self, position: usize, looping: bool) -> f64 {
        let Some(steps) = self.fade_out_opacities.as_deref() else {
            return 0.0;
        };
        let Some(&settled) = steps.first() else {
            return 0.0;
        };
        if looping {
            return self.opacity * settled;
        }
        // a stack that is still filling starts further into the trail
        let offset = steps.len().saturating_sub(self.fade_stack.len());
        let slot = (position + offset).min(steps.len() - 1);
        self.opacity * steps[slot]
    }

    /// Show the frame at exactly `time`.
    ///
    /// A time one resolution step or more outside the sequence, or one that
    /// can only mean a wrap-around elsewhere (past the end while the first
    /// frame is current, before the start while the last is current), fades
    /// the whole stack out instead.
    pub fn show_time(
        &mut self,
        stage: &mut Stage<'_>,
        time: Timestamp,
        resolution_ms: u64,
    ) -> ShowOutcome {
        let frames = stage.scheduler.frames();
        let (Some(first), Some(last)) = (frames.first(), frames.last()) else {
            return ShowOutcome::NotFound;
        };
        let time = time.as_millis();
        let resolution = resolution_ms as i64;
        let first_time = first.time().as_millis();
        let last_time = last.time().as_millis();
        let last_index = frames.len() - 1;
        let current = self.current();

        let outside = time <= first_time - resolution
            || time >= last_time + resolution
            || (current == Some(0) && time > last_time)
            || (current == Some(last_index) && time < first_time);
        if outside {
            self.fade_out_all(stage);
            return ShowOutcome::FadedOut;
        }
        match stage.scheduler.index_of_time(Timestamp::from_millis(time)) {
            Some(index) => self.show(stage, index, false),
            None => ShowOutcome::NotFound,
        }
    }

    /// Step forward by the display stride, wrapping to the first frame.
    pub fn show_next(&mut self, stage: &mut Stage<'_>) -> ShowOutcome {
        let len = stage.scheduler.len();
        let step = stage.scheduler.display_step();
        if len == 0 || !(step < len || step == 1) {
            return ShowOutcome::Rejected;
        }
        let index = match self.current() {
            // realign in case the stride changed under a running animation
            Some(current) if current + step < len => current + step - current % step,
            _ => 0,
        };
        self.show(stage, index, false)
    }

    /// Step back by the display stride, wrapping to the last aligned frame.
    pub fn show_previous(&mut self, stage: &mut Stage<'_>) -> ShowOutcome {
        let len = stage.scheduler.len();
        let step = stage.scheduler.display_step();
        if len == 0 || !(step < len || step == 1) {
            return ShowOutcome::Rejected;
        }
        let index = match self.current() {
            Some(current) if current >= step => current - step,
            _ => (len - 1) / step * step,
        };
        self.show(stage, index, false)
    }

    /// Fade every stack member to transparent and empty the stack, so the
    /// next advance starts from the first frame.
    pub fn fade_out_all(&mut self, stage: &mut Stage<'_>) {
        for index in self.fade_stack.drain(..) {
            stage.fade_out(index, 0.0);
        }
    }

    /// Forget the stack without touching opacities.
    pub fn clear(&mut self) {
        self.fade_stack.clear();
    }

    /// Store the global opacity without touching any frame. Values are
    /// clamped to `[0, 1]`; returns whether the value changed.
    pub fn set_global_opacity(&mut self, opacity: f64) -> bool {
        if !opacity.is_finite() {
            log::warn!("ignoring opacity {opacity}");
            return false;
        }
        let opacity = opacity.clamp(0.0, 1.0);
        if opacity == self.opacity {
            return false;
        }
        self.opacity = opacity;
        true
    }

    /// Rescale frames that are currently visible. Transparent frames and
    /// frames still fading out are left alone. A fade-in still running on
    /// the current frame is restarted toward the new opacity.
    pub fn set_opacity(&mut self, stage: &mut Stage<'_>, opacity: f64) -> bool {
        if !self.set_global_opacity(opacity) {
            return false;
        }
        let current = self.current();
        let visible: Vec<usize> = stage
            .scheduler
            .frames()
            .iter()
            .enumerate()
            .filter(|(_, frame)| frame.opacity(&*stage.renderer).is_some_and(|o| o > 0.0))
            .map(|(index, _)| index)
            .collect();
        for index in visible {
            if stage.transitions.is_animating(&index) {
                if Some(index) == current {
                    stage.fade_in(index, self.opacity);
                }
                continue;
            }
            if let Some(frame) = stage.scheduler.frame(index) {
                frame.set_opacity(&mut *stage.renderer, self.opacity);
            }
        }
        true
    }
}
