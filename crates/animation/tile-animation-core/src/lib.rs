//! Tile Animation Core (renderer-agnostic)
//!
//! Plays a time-ordered sequence of map tile layers ("frames"). Two parts do
//! the real work:
//! - a progressive loader that requests frames in binary-subdivision order
//!   under a concurrency cap and reports completion group by group;
//! - a cross-fade presenter that keeps one frame (plus a short fading trail)
//!   on screen while frames finish loading in any order.
//!
//! Rendering, tile fetching and map events stay with the host behind the
//! [`Renderer`] trait and the load-signal methods of [`FrameAnimation`].

pub mod animation;
pub mod clock;
pub mod config;
pub mod driver;
pub mod easing;
pub mod error;
pub mod frame;
pub mod inputs;
pub mod observer;
pub mod presentation;
pub mod renderer;
pub mod scheduler;
pub mod source;
pub mod time;
pub mod transition;

// Re-exports for consumers (adapters)
pub use animation::FrameAnimation;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AnimationConfig, FadeConfig, FadeOutConfig, FadeTimings, LayerOverride};
pub use driver::AnimationDriver;
pub use easing::Easing;
pub use error::AnimationError;
pub use frame::{Frame, FrameState};
pub use inputs::ControllerCommand;
pub use observer::{AnimationEvent, AnimationObserver, EventKind, EventQueue, FrameReport};
pub use presentation::{PresentationController, ShowOutcome, Stage};
pub use renderer::{MemoryLayer, MemoryRenderer, RenderHandle, Renderer};
pub use scheduler::{FrameScheduler, GroupProgress};
pub use source::{specialize, FrameConfig, LayerSource, WmsOptions, WmsParams, WmsSource, WmtsSource};
pub use time::{TimeInput, TimeWindow, Timestamp, MAX_FRAME_COUNT};
pub use transition::{PropertyTarget, TransitionEngine, TransitionRecord};

pub type Result<T> = core::result::Result<T, AnimationError>;
