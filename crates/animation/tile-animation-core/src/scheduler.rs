//! Progressive frame loading.
//!
//! Frames are requested in binary-subdivision order: every `load_step`-th
//! frame first, then the step is halved and the gaps are filled in. With a
//! step of 4 over 9 frames the order is 0 4 8, 2 6, 1 3 5 7. Partial
//! progress therefore always covers the whole period at a coarser rate.
//!
//! Completion is tracked per group. Group `g` is the set of indices that are
//! multiples of `g`; `group_load_step` is the finest group not yet known to
//! be complete, and reaches 0 once every frame is ready.

use crate::frame::Frame;
use crate::renderer::{RenderHandle, Renderer};
use crate::time::Timestamp;

/// A group that finished with the completion of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupProgress {
    /// Indices of the completed group, ascending.
    pub frames: Vec<usize>,
    /// Every frame of the sequence is ready.
    pub finished: bool,
}

#[derive(Debug)]
pub struct FrameScheduler {
    frames: Vec<Frame>,
    load_step: usize,
    group_load_step: usize,
    max_async_load_count: i64,
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self {
            frames: Vec::new(),
            load_step: 1,
            group_load_step: 1,
            max_async_load_count: -1,
        }
    }
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    #[inline]
    pub fn frames_mut(&mut self) -> &mut [Frame] {
        &mut self.frames
    }

    #[inline]
    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    #[inline]
    pub fn frame_mut(&mut self, index: usize) -> Option<&mut Frame> {
        self.frames.get_mut(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn index_of_handle(&self, handle: RenderHandle) -> Option<usize> {
        self.frames
            .iter()
            .position(|frame| frame.handle() == Some(handle))
    }

    pub fn index_of_time(&self, time: Timestamp) -> Option<usize> {
        self.frames
            .binary_search_by_key(&time, Frame::time)
            .ok()
    }

    #[inline]
    pub fn load_step(&self) -> usize {
        self.load_step
    }

    #[inline]
    pub fn group_load_step(&self) -> usize {
        self.group_load_step
    }

    /// `None` when loads are not capped.
    pub fn max_async_load_count(&self) -> Option<usize> {
        (self.max_async_load_count > 0).then_some(self.max_async_load_count as usize)
    }

    /// Zero, negative or `None` lifts the cap.
    pub fn set_max_async_load_count(&mut self, count: Option<i64>) {
        self.max_async_load_count = match count {
            Some(count) if count > 0 => count,
            _ => -1,
        };
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.group_load_step == 0
    }

    /// Index stride for navigation: twice the finest incomplete group, or
    /// every frame once loading has finished.
    #[inline]
    pub fn display_step(&self) -> usize {
        if self.group_load_step == 0 {
            1
        } else {
            self.group_load_step * 2
        }
    }

    /// Whether the frame at `index` may be presented: in bounds, part of an
    /// already completed group and ready.
    pub fn allow_show(&self, index: usize) -> bool {
        index < self.frames.len()
            && index % self.display_step() == 0
            && self.frames[index].is_loaded()
    }

    /// Replace the sequence. The caller releases the old frames first.
    pub fn build(&mut self, frames: Vec<Frame>) {
        self.frames = frames;
        self.reset_load_step();
    }

    /// Restart subdivision from the coarsest step: the largest power of two
    /// not above half the sequence length, and at least 1.
    pub fn reset_load_step(&mut self) {
        let len = self.frames.len();
        let mut step = 1;
        while step * 4 <= len {
            step *= 2;
        }
        self.load_step = step;
        self.group_load_step = step;
    }

    /// Request loads until the concurrency budget is spent or every frame
    /// has been requested. Returns the indices requested in this pass.
    pub fn schedule(&mut self, renderer: &mut dyn Renderer) -> Vec<usize> {
        let mut started = Vec::new();
        if self.load_step == 0 {
            return started;
        }
        let cap = self.max_async_load_count().unwrap_or(self.frames.len());
        let in_flight = self.frames.iter().filter(|f| f.is_loading()).count();
        let mut budget = cap.saturating_sub(in_flight);

        while budget > 0 && self.load_step > 0 {
            for index in (0..self.frames.len()).step_by(self.load_step) {
                let frame = &mut self.frames[index];
                if frame.is_default_state() {
                    frame.load(renderer);
                    started.push(index);
                    budget -= 1;
                    if budget == 0 {
                        break;
                    }
                }
            }
            if budget > 0 {
                self.load_step /= 2;
            }
        }
        if !started.is_empty() {
            log::debug!(
                "scheduled {} frame load(s) {:?}, load_step={}",
                started.len(),
                started,
                self.load_step
            );
        }
        started
    }

    /// Account for a frame that just became ready.
    ///
    /// Completions arrive in any order, so coarser groups are re-checked
    /// first: one completion can close several nested groups at once.
    pub fn complete_frame(&mut self) -> Option<GroupProgress> {
        if self.group_load_step == 0 {
            return None;
        }
        self.rescan_group_step();

        let step = self.group_load_step;
        let group: Vec<usize> = (0..self.frames.len()).step_by(step).collect();
        if !group.iter().all(|&i| self.frames[i].is_loaded()) {
            return None;
        }
        self.group_load_step /= 2;
        log::debug!(
            "group {step} complete ({} frames), group_load_step={}",
            group.len(),
            self.group_load_step
        );
        Some(GroupProgress {
            frames: group,
            finished: self.group_load_step == 0,
        })
    }

    /// Move `group_load_step` down to the finest group whose coarser
    /// parents are all complete, leaving it on a complete group.
    fn rescan_group_step(&mut self) {
        if self.group_load_step <= 1 {
            return;
        }
        let mut step = self.group_load_step;
        while step > 0 && self.group_is_loaded(step) {
            step /= 2;
        }
        // `step` is now the first incomplete group, or 0
        if step * 2 < self.group_load_step {
            self.group_load_step = (step * 2).max(1);
        }
    }

    fn group_is_loaded(&self, step: usize) -> bool {
        (0..self.frames.len())
            .step_by(step)
            .all(|i| self.frames[i].is_loaded())
    }

    /// Release every frame and empty the sequence. The released frames are
    /// returned so the caller can report them.
    pub fn release_all(&mut self, renderer: &mut dyn Renderer) -> Vec<Frame> {
        let mut released: Vec<Frame> = self.frames.drain(..).collect();
        for frame in &mut released {
            frame.release(renderer);
        }
        self.reset_load_step();
        released
    }
}
