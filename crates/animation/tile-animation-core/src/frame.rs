//! One time-stamped layer of the animation and its load-state machine.
//!
//! ```text
//! Unloaded ──load──▶ PreLoading ──signal──▶ Loading ──signal──▶ Ready
//!     ▲                                                            │
//!     └────────────────────── release / hide ─────────────────────┘
//! ```
//!
//! `Ready` is terminal for a load: a frame with a tile error is still ready,
//! it just renders blank. Only a release or hide puts it back to `Unloaded`.

use serde::{Deserialize, Serialize};

use crate::renderer::{RenderHandle, Renderer};
use crate::source::FrameConfig;
use crate::time::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameState {
    #[default]
    Unloaded,
    /// Requested from the renderer, waiting for its first signal.
    PreLoading,
    Loading,
    Ready,
}

#[derive(Debug, Clone)]
pub struct Frame {
    config: FrameConfig,
    handle: Option<RenderHandle>,
    state: FrameState,
    error: Option<String>,
}

impl Frame {
    pub fn new(config: FrameConfig) -> Self {
        Self {
            config,
            handle: None,
            state: FrameState::Unloaded,
            error: None,
        }
    }

    #[inline]
    pub fn time(&self) -> Timestamp {
        self.config.time
    }

    #[inline]
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    #[inline]
    pub fn handle(&self) -> Option<RenderHandle> {
        self.handle
    }

    #[inline]
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Last tile error reported during the current load.
    #[inline]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Never loaded, or released since.
    #[inline]
    pub fn is_default_state(&self) -> bool {
        self.state == FrameState::Unloaded && self.error.is_none()
    }

    #[inline]
    pub fn is_loading(&self) -> bool {
        matches!(self.state, FrameState::PreLoading | FrameState::Loading)
    }

    /// Ready, whether or not the load succeeded.
    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.state == FrameState::Ready
    }

    /// Create the renderer layer on first use and make it visible, which
    /// starts the fetch. Does nothing for a layer that is already visible.
    /// Returns whether a load was requested.
    pub fn load(&mut self, renderer: &mut dyn Renderer) -> bool {
        let handle = match self.handle {
            Some(handle) => handle,
            None => {
                let handle = renderer.create(&self.config);
                if let Some(index) = self.config.z_index {
                    renderer.set_z_index(handle, index);
                }
                self.handle = Some(handle);
                handle
            }
        };
        if renderer.visibility(handle) == Some(true) {
            return false;
        }
        self.state = FrameState::PreLoading;
        renderer.set_visibility(handle, true);
        true
    }

    /// The renderer started fetching tiles. Clears any earlier error.
    /// Ignored for a frame that was released or hidden; returns whether
    /// the frame is now loading.
    pub fn begin_loading(&mut self) -> bool {
        if self.state == FrameState::Unloaded {
            return false;
        }
        self.error = None;
        self.state = FrameState::Loading;
        true
    }

    /// The renderer finished fetching tiles. Ignored for a frame that was
    /// released or hidden in the meantime; returns whether the frame became ready.
    pub fn finish_loading(&mut self) -> bool {
        if self.state == FrameState::Unloaded {
            return false;
        }
        self.state = FrameState::Ready;
        true
    }

    /// Record a failed tile. The load itself carries on. A late error for
    /// released or hidden content is dropped, so the frame stays eligible
    /// for the next load; returns whether it was recorded.
    pub fn record_tile_error(&mut self, info: impl Into<String>) -> bool {
        if self.state == FrameState::Unloaded {
            return false;
        }
        self.error = Some(info.into());
        true
    }

    /// Destroy the renderer layer and return to `Unloaded`.
    pub fn release(&mut self, renderer: &mut dyn Renderer) {
        if let Some(handle) = self.handle.take() {
            renderer.destroy(handle);
        }
        self.reset_state();
    }

    /// Hiding drops the loaded content; showing again triggers a reload.
    pub fn set_visibility(&mut self, renderer: &mut dyn Renderer, visible: bool) {
        if let Some(handle) = self.handle {
            if !visible {
                self.reset_state();
            }
            renderer.set_visibility(handle, visible);
        }
    }

    pub fn visibility(&self, renderer: &dyn Renderer) -> Option<bool> {
        self.handle.and_then(|handle| renderer.visibility(handle))
    }

    pub fn opacity(&self, renderer: &dyn Renderer) -> Option<f64> {
        self.handle.and_then(|handle| renderer.opacity(handle))
    }

    pub fn set_opacity(&self, renderer: &mut dyn Renderer, value: f64) {
        if let Some(handle) = self.handle {
            renderer.set_opacity(handle, value);
        }
    }

    pub fn z_index(&self, renderer: &dyn Renderer) -> Option<i32> {
        self.handle.and_then(|handle| renderer.z_index(handle))
    }

    pub fn set_z_index(&self, renderer: &mut dyn Renderer, index: i32) {
        if let Some(handle) = self.handle {
            renderer.set_z_index(handle, index);
        }
    }

    fn reset_state(&mut self) {
        self.state = FrameState::Unloaded;
        self.error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnimationConfig;
    use crate::renderer::MemoryRenderer;
    use crate::source::{specialize, LayerSource};

    fn frame_at(ms: i64) -> Frame {
        let source = LayerSource::wms("http://wms", "radar").unwrap();
        Frame::new(specialize(
            &source,
            &AnimationConfig::default(),
            Timestamp::from_millis(ms),
            Some(3),
        ))
    }

    #[test]
    fn load_creates_once_and_shows() {
        let mut renderer = MemoryRenderer::new();
        let mut frame = frame_at(0);
        assert!(frame.is_default_state());
        assert!(frame.load(&mut renderer));
        assert_eq!(frame.state(), FrameState::PreLoading);
        assert!(frame.is_loading());
        let handle = frame.handle().unwrap();
        assert_eq!(renderer.visibility(handle), Some(true));
        assert_eq!(renderer.z_index(handle), Some(3));

        // already visible: nothing to do
        assert!(!frame.load(&mut renderer));
        assert_eq!(frame.handle(), Some(handle));
        assert_eq!(renderer.len(), 1);
    }

    #[test]
    fn error_is_recorded_but_load_completes() {
        let mut renderer = MemoryRenderer::new();
        let mut frame = frame_at(0);
        frame.load(&mut renderer);
        frame.begin_loading();
        assert_eq!(frame.state(), FrameState::Loading);
        assert!(frame.record_tile_error("tileerror"));
        assert!(frame.finish_loading());
        assert!(frame.is_loaded());
        assert_eq!(frame.error(), Some("tileerror"));
        assert!(!frame.is_default_state());

        // a new load attempt starts clean
        frame.begin_loading();
        assert_eq!(frame.error(), None);
    }

    #[test]
    fn hide_resets_state_and_reload_reuses_handle() {
        let mut renderer = MemoryRenderer::new();
        let mut frame = frame_at(0);
        frame.load(&mut renderer);
        frame.begin_loading();
        frame.finish_loading();
        let handle = frame.handle().unwrap();

        frame.set_visibility(&mut renderer, false);
        assert!(frame.is_default_state());
        assert_eq!(renderer.visibility(handle), Some(false));
        // late signals for hidden content are ignored
        assert!(!frame.begin_loading());
        assert!(!frame.record_tile_error("aborted"));
        assert!(!frame.finish_loading());
        assert!(frame.is_default_state());

        assert!(frame.load(&mut renderer));
        assert_eq!(frame.handle(), Some(handle));
    }

    #[test]
    fn release_destroys_layer() {
        let mut renderer = MemoryRenderer::new();
        let mut frame = frame_at(0);
        frame.load(&mut renderer);
        let handle = frame.handle().unwrap();
        frame.release(&mut renderer);
        assert!(frame.handle().is_none());
        assert!(frame.is_default_state());
        assert_eq!(renderer.destroyed(), &[handle]);
        assert_eq!(frame.opacity(&renderer), None);
    }
}
