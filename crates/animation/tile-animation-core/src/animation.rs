//! `FrameAnimation`: the animation layer as seen by a host.
//!
//! Owns the frame sequence, the fade stack, running transitions and the
//! advance timer, and talks to the outside world through three seams: a
//! [`Renderer`] for layers, a [`Clock`] for time and an optional
//! [`AnimationObserver`] for progress.
//!
//! All work happens inside calls from the host. Nothing blocks: loads are
//! requested and the host reports back through [`FrameAnimation::frame_load_started`],
//! [`FrameAnimation::frame_tile_error`] and [`FrameAnimation::frame_load_finished`];
//! fades and automatic advances progress on [`FrameAnimation::tick`].

use crate::clock::Clock;
use crate::config::{AnimationConfig, FadeTimings};
use crate::driver::AnimationDriver;
use crate::error::AnimationError;
use crate::frame::Frame;
use crate::inputs::ControllerCommand;
use crate::observer::AnimationObserver;
use crate::presentation::{PresentationController, ShowOutcome, Stage};
use crate::renderer::{RenderHandle, Renderer};
use crate::scheduler::{FrameScheduler, GroupProgress};
use crate::source::{specialize, LayerSource};
use crate::time::{TimeInput, TimeWindow, Timestamp};
use crate::transition::TransitionEngine;
use crate::Result;

/// Borrow the presentation context out of `self` field by field, so the
/// presentation controller itself stays free for a mutable call.
macro_rules! stage {
    ($self:ident, $renderer:expr) => {
        Stage {
            scheduler: &$self.scheduler,
            renderer: $renderer,
            transitions: &mut $self.transitions,
            timings: &$self.timings,
            now_ms: $self.clock.now_ms(),
        }
    };
}

pub struct FrameAnimation<R: Renderer, C: Clock> {
    renderer: Option<R>,
    clock: C,
    source: Option<LayerSource>,
    config: AnimationConfig,
    timings: FadeTimings,
    window: TimeWindow,
    scheduler: FrameScheduler,
    presentation: PresentationController,
    transitions: TransitionEngine<usize>,
    driver: AnimationDriver,
    observer: Option<Box<dyn AnimationObserver>>,
    visible: bool,
    z_index: Option<i32>,
}

impl<R: Renderer, C: Clock> FrameAnimation<R, C> {
    /// An animation with no render target yet.
    pub fn new(clock: C) -> Self {
        Self {
            renderer: None,
            clock,
            source: None,
            config: AnimationConfig::default(),
            timings: FadeTimings::default(),
            window: TimeWindow::new(),
            scheduler: FrameScheduler::new(),
            presentation: PresentationController::new(),
            transitions: TransitionEngine::new(),
            driver: AnimationDriver::new(),
            observer: None,
            visible: true,
            z_index: None,
        }
    }

    pub fn with_renderer(renderer: R, clock: C) -> Self {
        let mut animation = Self::new(clock);
        animation.renderer = Some(renderer);
        animation
    }

    pub fn set_observer(&mut self, observer: impl AnimationObserver + 'static) {
        self.observer = Some(Box::new(observer));
    }

    pub fn take_observer(&mut self) -> Option<Box<dyn AnimationObserver>> {
        self.observer.take()
    }

    // ---- render target ------------------------------------------------------

    /// Bind a render target, replacing (and resetting) any previous one.
    /// Loads right away when the configuration asks for `auto_load`.
    pub fn attach(&mut self, renderer: R) -> Option<R> {
        let previous = self.detach();
        self.renderer = Some(renderer);
        if self.config.auto_load {
            self.auto_load();
        }
        previous
    }

    /// Reset the animation and hand the render target back.
    pub fn detach(&mut self) -> Option<R> {
        if self.renderer.is_some() {
            self.reset();
        }
        self.renderer.take()
    }

    #[inline]
    pub fn is_attached(&self) -> bool {
        self.renderer.is_some()
    }

    #[inline]
    pub fn renderer(&self) -> Option<&R> {
        self.renderer.as_ref()
    }

    #[inline]
    pub fn renderer_mut(&mut self) -> Option<&mut R> {
        self.renderer.as_mut()
    }

    #[inline]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    // ---- configuration ------------------------------------------------------

    /// Takes effect on the next load.
    pub fn set_source(&mut self, source: LayerSource) -> Result<()> {
        source.validate()?;
        self.source = Some(source);
        Ok(())
    }

    #[inline]
    pub fn source(&self) -> Option<&LayerSource> {
        self.source.as_ref()
    }

    /// Apply window, pacing and fade settings from `config`. Invalid values
    /// are skipped, keeping the current ones.
    pub fn set_config(&mut self, config: AnimationConfig) {
        self.window.set_begin(config.begin_time.as_ref());
        self.window.set_end(config.end_time.as_ref());
        self.window.set_resolution(config.resolution_time);
        self.scheduler
            .set_max_async_load_count(config.max_async_load_count);
        if let Some(rate) = config.frame_rate {
            self.driver.set_frame_rate(rate);
        }
        if let Some(fade_out) = &config.fade_out {
            self.presentation
                .set_fade_out_opacities(fade_out.opacities.as_deref());
        }
        self.timings = config.fade_timings();
        self.config = config;
        if self.config.auto_load && self.renderer.is_some() {
            self.auto_load();
        }
    }

    pub fn set_config_json(&mut self, text: &str) -> Result<()> {
        self.set_config(AnimationConfig::from_json(text)?);
        Ok(())
    }

    #[inline]
    pub fn config(&self) -> &AnimationConfig {
        &self.config
    }

    pub fn set_begin_time(&mut self, time: impl Into<TimeInput>) -> bool {
        self.window.set_begin(Some(&time.into()))
    }

    pub fn set_end_time(&mut self, time: impl Into<TimeInput>) -> bool {
        self.window.set_end(Some(&time.into()))
    }

    pub fn set_resolution_time(&mut self, resolution_ms: f64) -> bool {
        self.window.set_resolution(Some(resolution_ms))
    }

    /// Set the time window in one go. Absent values keep their current
    /// setting; a present but invalid one rejects the whole call and
    /// nothing changes.
    pub fn set_window(
        &mut self,
        begin: Option<TimeInput>,
        end: Option<TimeInput>,
        resolution_ms: Option<f64>,
    ) -> Result<()> {
        let coerce = |input: &Option<TimeInput>| -> Result<Option<TimeInput>> {
            match input {
                None => Ok(None),
                Some(value) if value.to_timestamp().is_some() => Ok(Some(value.clone())),
                Some(value) => Err(AnimationError::InvalidTime {
                    value: format!("{value:?}"),
                }),
            }
        };
        let begin = coerce(&begin)?;
        let end = coerce(&end)?;
        if let Some(ms) = resolution_ms {
            if !(ms.is_finite() && ms >= 1.0) {
                return Err(AnimationError::invalid_window(format!(
                    "resolution {ms} must be at least 1 ms"
                )));
            }
        }
        self.window.set_begin(begin.as_ref());
        self.window.set_end(end.as_ref());
        self.window.set_resolution(resolution_ms);
        Ok(())
    }

    #[inline]
    pub fn window(&self) -> &TimeWindow {
        &self.window
    }

    #[inline]
    pub fn begin_time(&self) -> Option<Timestamp> {
        self.window.begin()
    }

    #[inline]
    pub fn end_time(&self) -> Option<Timestamp> {
        self.window.end()
    }

    /// 0 while unset.
    #[inline]
    pub fn resolution_time(&self) -> u64 {
        self.window.resolution_ms()
    }

    pub fn set_frame_rate(&mut self, frame_rate_ms: f64) -> bool {
        self.driver.set_frame_rate(frame_rate_ms)
    }

    #[inline]
    pub fn frame_rate(&self) -> f64 {
        self.driver.frame_rate_ms()
    }

    /// `None`, zero or negative lifts the cap.
    pub fn set_max_concurrent_loads(&mut self, count: Option<i64>) {
        self.scheduler.set_max_async_load_count(count);
    }

    pub fn set_fade_out_opacities(&mut self, opacities: Option<&[f64]>) -> bool {
        self.presentation.set_fade_out_opacities(opacities)
    }

    #[inline]
    pub fn fade_out_opacities(&self) -> Option<Vec<f64>> {
        self.presentation.fade_out_opacities()
    }

    /// Applied to existing frames and to frames created later.
    pub fn set_z_index(&mut self, index: i32) {
        self.z_index = Some(index);
        if let Some(renderer) = self.renderer.as_mut() {
            for frame in self.scheduler.frames() {
                frame.set_z_index(&mut *renderer, index);
            }
        }
    }

    #[inline]
    pub fn z_index(&self) -> Option<i32> {
        self.z_index
    }

    // ---- loading ------------------------------------------------------------

    /// Rebuild the frame sequence for the current window and start loading.
    ///
    /// Fails without side effects when the window is incomplete or
    /// reversed, no source is set or no render target is bound. Returns the
    /// number of frames.
    pub fn load_animation(&mut self) -> Result<usize> {
        let times = self.window.frame_times()?;
        let source = self.source.as_ref().ok_or(AnimationError::MissingSource)?;
        if self.renderer.is_none() {
            return Err(AnimationError::NotAttached);
        }
        let frames: Vec<Frame> = times
            .into_iter()
            .map(|time| Frame::new(specialize(source, &self.config, time, self.z_index)))
            .collect();
        let count = frames.len();

        self.reset();
        self.scheduler.build(frames);
        log::debug!(
            "built {count} frames from {:?} to {:?}",
            self.window.begin(),
            self.window.end()
        );
        self.load_all();
        Ok(count)
    }

    fn auto_load(&mut self) {
        if let Err(err) = self.load_animation() {
            log::warn!("auto load skipped ({}): {err}", err.category());
        }
    }

    /// Stop playback, empty the fade stack and release every frame. Safe at
    /// any point, including while loads are in flight.
    pub fn reset(&mut self) {
        self.driver.pause();
        self.presentation.clear();
        self.transitions.clear();
        let released = match self.renderer.as_mut() {
            Some(renderer) => self.scheduler.release_all(renderer),
            None => {
                self.scheduler.build(Vec::new());
                Vec::new()
            }
        };
        if let Some(observer) = self.observer.as_mut() {
            for frame in &released {
                observer.frame_content_released(frame);
            }
        }
    }

    /// Restart loading from the coarsest step.
    fn load_all(&mut self) {
        if !self.visible {
            return;
        }
        if let Some(observer) = self.observer.as_mut() {
            observer.load_started();
        }
        self.scheduler.reset_load_step();
        self.load_next();
    }

    fn load_next(&mut self) {
        if let Some(renderer) = self.renderer.as_mut() {
            self.scheduler.schedule(renderer);
        }
    }

    fn lookup(&self, handle: RenderHandle, signal: &str) -> Option<usize> {
        let index = self.scheduler.index_of_handle(handle);
        if index.is_none() {
            log::warn!("ignoring {signal} for unknown render handle {}", handle.0);
        }
        index
    }

    /// The renderer started fetching tiles for `handle`. A frame that is not
    /// on screen is made transparent so partial tiles never flash.
    pub fn frame_load_started(&mut self, handle: RenderHandle) {
        let Some(index) = self.lookup(handle, "load start") else {
            return;
        };
        let loading = self
            .scheduler
            .frame_mut(index)
            .is_some_and(Frame::begin_loading);
        if !loading {
            log::debug!("ignoring load start for released frame {index}");
            return;
        }
        if self.presentation.current() != Some(index) {
            self.transitions.cancel(&index);
            if let (Some(renderer), Some(frame)) =
                (self.renderer.as_mut(), self.scheduler.frame(index))
            {
                frame.set_opacity(renderer, 0.0);
            }
        }
        if let (Some(observer), Some(frame)) = (self.observer.as_mut(), self.scheduler.frame(index))
        {
            observer.frame_load_started(frame);
        }
    }

    pub fn frame_tile_error(&mut self, handle: RenderHandle, info: impl Into<String>) {
        let Some(index) = self.lookup(handle, "tile error") else {
            return;
        };
        let info = info.into();
        let recorded = self
            .scheduler
            .frame_mut(index)
            .is_some_and(|frame| frame.record_tile_error(info.as_str()));
        if recorded {
            log::debug!("tile error on frame {index}: {info}");
        } else {
            log::debug!("ignoring tile error for released frame {index}");
        }
    }

    /// The renderer finished `handle`, with or without tile errors.
    pub fn frame_load_finished(&mut self, handle: RenderHandle) {
        let Some(index) = self.lookup(handle, "load end") else {
            return;
        };
        let ready = self
            .scheduler
            .frame_mut(index)
            .is_some_and(Frame::finish_loading);
        if !ready {
            log::debug!("ignoring load end for released frame {index}");
            return;
        }

        let progress = self.scheduler.complete_frame();
        self.report_load_complete(index, progress.as_ref());

        // refreshed content of the frame on screen, e.g. after a pan
        if self.presentation.current() == Some(index) {
            if let Some(renderer) = self.renderer.as_mut() {
                let mut stage = stage!(self, renderer);
                self.presentation.show(&mut stage, index, true);
            }
        }

        self.load_next();

        if progress.is_some_and(|p| p.finished) && self.config.auto_start {
            self.start();
        }
    }

    fn report_load_complete(&mut self, index: usize, progress: Option<&GroupProgress>) {
        let Some(observer) = self.observer.as_mut() else {
            return;
        };
        let frames = self.scheduler.frames();
        if let Some(frame) = frames.get(index) {
            observer.frame_load_complete(frame);
        }
        if let Some(progress) = progress {
            let group: Vec<&Frame> = progress
                .frames
                .iter()
                .filter_map(|&i| frames.get(i))
                .collect();
            observer.group_progress(&group);
            if progress.finished {
                observer.animation_complete(&group);
            }
        }
    }

    /// The map started panning or zooming. Every frame except the one on
    /// screen is hidden and loading restarts in subdivision order; the
    /// current frame stays up and is re-shown once its tiles are refreshed.
    pub fn viewport_changed(&mut self) {
        let current = self.presentation.current();
        if let Some(renderer) = self.renderer.as_mut() {
            for (index, frame) in self.scheduler.frames_mut().iter_mut().enumerate() {
                if Some(index) != current {
                    frame.set_visibility(&mut *renderer, false);
                }
            }
        }
        self.report_released();
        self.load_all();
    }

    fn report_released(&mut self) {
        if let Some(observer) = self.observer.as_mut() {
            for frame in self.scheduler.frames() {
                observer.frame_content_released(frame);
            }
        }
    }

    // ---- presentation -------------------------------------------------------

    /// Hiding stops playback and drops all content at once, without fades.
    /// Showing again reloads from the coarsest step.
    pub fn set_visibility(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;
        if visible {
            self.load_all();
            return;
        }
        self.driver.pause();
        self.presentation.clear();
        self.transitions.clear();
        if let Some(renderer) = self.renderer.as_mut() {
            for frame in self.scheduler.frames_mut() {
                frame.set_visibility(&mut *renderer, false);
            }
        }
        self.report_released();
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_opacity(&mut self, opacity: f64) -> bool {
        match self.renderer.as_mut() {
            Some(renderer) => {
                let mut stage = stage!(self, renderer);
                self.presentation.set_opacity(&mut stage, opacity)
            }
            None => self.presentation.set_global_opacity(opacity),
        }
    }

    #[inline]
    pub fn opacity(&self) -> f64 {
        self.presentation.opacity()
    }

    /// Show the frame at `time`. Invalid times are ignored.
    pub fn show_frame(&mut self, time: impl Into<TimeInput>) -> ShowOutcome {
        let input = time.into();
        let Some(time) = input.to_timestamp() else {
            log::warn!("ignoring show request for invalid time {input:?}");
            return ShowOutcome::NotFound;
        };
        let resolution = self.window.resolution_ms();
        let Some(renderer) = self.renderer.as_mut() else {
            return ShowOutcome::Rejected;
        };
        let mut stage = stage!(self, renderer);
        let outcome = self.presentation.show_time(&mut stage, time, resolution);
        self.report_change(outcome);
        outcome
    }

    pub fn show_next_frame(&mut self) -> ShowOutcome {
        let Some(renderer) = self.renderer.as_mut() else {
            return ShowOutcome::Rejected;
        };
        let mut stage = stage!(self, renderer);
        let outcome = self.presentation.show_next(&mut stage);
        self.report_change(outcome);
        outcome
    }

    pub fn show_previous_frame(&mut self) -> ShowOutcome {
        let Some(renderer) = self.renderer.as_mut() else {
            return ShowOutcome::Rejected;
        };
        let mut stage = stage!(self, renderer);
        let outcome = self.presentation.show_previous(&mut stage);
        self.report_change(outcome);
        outcome
    }

    fn report_change(&mut self, outcome: ShowOutcome) {
        let Some(index) = outcome.changed() else {
            return;
        };
        if let (Some(observer), Some(frame)) = (self.observer.as_mut(), self.scheduler.frame(index))
        {
            observer.frame_changed(frame);
        }
    }

    fn fade_out_all(&mut self) {
        match self.renderer.as_mut() {
            Some(renderer) => {
                let mut stage = stage!(self, renderer);
                self.presentation.fade_out_all(&mut stage);
            }
            None => self.presentation.clear(),
        }
    }

    // ---- playback -----------------------------------------------------------

    /// Advance automatically every frame-rate interval, driven by [`tick`](Self::tick).
    pub fn start(&mut self) {
        let now = self.clock.now_ms();
        self.driver.start(now);
    }

    /// Stop advancing; the frame on screen stays.
    pub fn pause(&mut self) {
        self.driver.pause();
    }

    /// Pause and fade everything out, so playback restarts from the first frame.
    pub fn stop(&mut self) {
        self.driver.pause();
        self.fade_out_all();
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.driver.is_running()
    }

    /// The host's per-frame callback: steps running fades and advances the
    /// animation when a frame is due.
    pub fn tick(&mut self) {
        if let Some(renderer) = self.renderer.as_mut() {
            let mut stage = stage!(self, renderer);
            stage.step_transitions();
        }
        let now = self.clock.now_ms();
        if self.driver.poll(now) {
            self.show_next_frame();
        }
    }

    pub fn apply_command(&mut self, command: ControllerCommand) -> Result<()> {
        log::debug!("controller command {command:?}");
        match command {
            ControllerCommand::SetPeriod {
                begin,
                end,
                resolution,
            } => {
                self.set_window(begin, end, resolution)?;
                if self.renderer.is_some() {
                    self.load_animation()?;
                }
            }
            ControllerCommand::Reload => {
                self.load_animation()?;
            }
            ControllerCommand::ShowTime { time } => {
                self.show_frame(time);
            }
            ControllerCommand::Start => self.start(),
            ControllerCommand::Pause => self.pause(),
            ControllerCommand::Stop => self.stop(),
            ControllerCommand::Previous => {
                self.show_previous_frame();
            }
            ControllerCommand::Next => {
                self.show_next_frame();
            }
            ControllerCommand::SetFrameRate { value } => {
                self.set_frame_rate(value);
            }
        }
        Ok(())
    }

    // ---- state --------------------------------------------------------------

    #[inline]
    pub fn frames(&self) -> &[Frame] {
        self.scheduler.frames()
    }

    #[inline]
    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.scheduler.frame(index)
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.scheduler.len()
    }

    #[inline]
    pub fn current_index(&self) -> Option<usize> {
        self.presentation.current()
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.presentation
            .current()
            .and_then(|index| self.scheduler.frame(index))
    }

    /// Frame indices in the cross-fade, oldest first.
    #[inline]
    pub fn fade_stack(&self) -> &[usize] {
        self.presentation.fade_stack()
    }

    #[inline]
    pub fn load_step(&self) -> usize {
        self.scheduler.load_step()
    }

    #[inline]
    pub fn group_load_step(&self) -> usize {
        self.scheduler.group_load_step()
    }

    #[inline]
    pub fn is_load_complete(&self) -> bool {
        !self.scheduler.is_empty() && self.scheduler.is_complete()
    }

    /// Transitions still running.
    #[inline]
    pub fn active_transitions(&self) -> usize {
        self.transitions.len()
    }
}
