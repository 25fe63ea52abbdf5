//! Render target seam.
//!
//! The core never fetches or draws tiles. It creates one layer per frame
//! through a [`Renderer`] and afterwards addresses it by [`RenderHandle`].
//! The host reports load progress back through the animation's load-signal
//! entry points using the same handle.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::source::FrameConfig;
use crate::time::Timestamp;

/// Opaque id of a layer owned by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RenderHandle(pub u32);

/// Operations the core needs from the map/tiling collaborator.
///
/// Getters return `None` for handles the renderer does not know.
pub trait Renderer {
    /// Create the layer for a frame. It starts hidden.
    fn create(&mut self, config: &FrameConfig) -> RenderHandle;
    fn destroy(&mut self, handle: RenderHandle);
    fn opacity(&self, handle: RenderHandle) -> Option<f64>;
    fn set_opacity(&mut self, handle: RenderHandle, value: f64);
    fn visibility(&self, handle: RenderHandle) -> Option<bool>;
    /// Showing a hidden layer makes the host (re)fetch its tiles.
    fn set_visibility(&mut self, handle: RenderHandle, visible: bool);
    fn z_index(&self, handle: RenderHandle) -> Option<i32>;
    fn set_z_index(&mut self, handle: RenderHandle, index: i32);
}

/// State of one layer held by [`MemoryRenderer`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryLayer {
    pub config: FrameConfig,
    pub opacity: f64,
    pub visible: bool,
    pub z_index: i32,
}

/// Headless renderer that keeps layer state in memory.
///
/// Used by hosts without a map (server-side previews, tests) and as the
/// reference behaviour for [`Renderer`] implementations. It records every
/// visibility request so callers can observe the order in which frames were
/// asked to load.
#[derive(Debug, Default)]
pub struct MemoryRenderer {
    next_handle: u32,
    layers: HashMap<RenderHandle, MemoryLayer>,
    shown: Vec<Timestamp>,
    destroyed: Vec<RenderHandle>,
}

impl MemoryRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn layer(&self, handle: RenderHandle) -> Option<&MemoryLayer> {
        self.layers.get(&handle)
    }

    /// Live layers.
    #[inline]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Frame times in the order their layers were made visible.
    #[inline]
    pub fn shown(&self) -> &[Timestamp] {
        &self.shown
    }

    #[inline]
    pub fn destroyed(&self) -> &[RenderHandle] {
        &self.destroyed
    }
}

impl Renderer for MemoryRenderer {
    fn create(&mut self, config: &FrameConfig) -> RenderHandle {
        self.next_handle += 1;
        let handle = RenderHandle(self.next_handle);
        self.layers.insert(
            handle,
            MemoryLayer {
                config: config.clone(),
                opacity: 1.0,
                visible: false,
                z_index: config.z_index.unwrap_or(0),
            },
        );
        handle
    }

    fn destroy(&mut self, handle: RenderHandle) {
        if self.layers.remove(&handle).is_some() {
            self.destroyed.push(handle);
        }
    }

    fn opacity(&self, handle: RenderHandle) -> Option<f64> {
        self.layers.get(&handle).map(|layer| layer.opacity)
    }

    fn set_opacity(&mut self, handle: RenderHandle, value: f64) {
        if let Some(layer) = self.layers.get_mut(&handle) {
            layer.opacity = value;
        }
    }

    fn visibility(&self, handle: RenderHandle) -> Option<bool> {
        self.layers.get(&handle).map(|layer| layer.visible)
    }

    fn set_visibility(&mut self, handle: RenderHandle, visible: bool) {
        if let Some(layer) = self.layers.get_mut(&handle) {
            if visible && !layer.visible {
                self.shown.push(layer.config.time);
            }
            layer.visible = visible;
        }
    }

    fn z_index(&self, handle: RenderHandle) -> Option<i32> {
        self.layers.get(&handle).map(|layer| layer.z_index)
    }

    fn set_z_index(&mut self, handle: RenderHandle, index: i32) {
        if let Some(layer) = self.layers.get_mut(&handle) {
            layer.z_index = index;
        }
    }
}
