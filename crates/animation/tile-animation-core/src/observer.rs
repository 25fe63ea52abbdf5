//! Progress and presentation notifications.
//!
//! Hosts implement [`AnimationObserver`] and override the callbacks they
//! care about. [`EventQueue`] is a ready-made observer that stores every
//! notification as a serializable [`AnimationEvent`] for hosts that poll.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::frame::Frame;
use crate::time::Timestamp;

/// Every callback defaults to a no-op.
pub trait AnimationObserver {
    /// A load pass over the whole sequence is about to start.
    fn load_started(&mut self) {}
    fn frame_load_started(&mut self, _frame: &Frame) {}
    /// Fires for failed loads too; check [`Frame::error`].
    fn frame_load_complete(&mut self, _frame: &Frame) {}
    /// A group of frames finished loading.
    fn group_progress(&mut self, _frames: &[&Frame]) {}
    /// Every frame finished loading, successfully or not.
    fn animation_complete(&mut self, _frames: &[&Frame]) {}
    /// The frame's content was dropped and must be loaded again to be shown.
    fn frame_content_released(&mut self, _frame: &Frame) {}
    fn frame_changed(&mut self, _frame: &Frame) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AnimationLoadStarted,
    FrameLoadStarted,
    FrameLoadComplete,
    AnimationLoadGroupProgress,
    AnimationLoadComplete,
    AnimationFrameContentReleased,
    FrameChanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameReport {
    pub time: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Frame> for FrameReport {
    fn from(frame: &Frame) -> Self {
        Self {
            time: frame.time(),
            error: frame.error().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationEvent {
    pub kind: EventKind,
    pub frames: Vec<FrameReport>,
}

impl AnimationEvent {
    fn single(kind: EventKind, frame: &Frame) -> Self {
        Self {
            kind,
            frames: vec![frame.into()],
        }
    }

    fn many(kind: EventKind, frames: &[&Frame]) -> Self {
        Self {
            kind,
            frames: frames.iter().map(|frame| FrameReport::from(*frame)).collect(),
        }
    }

    /// Frame times in milliseconds, in report order.
    pub fn times(&self) -> Vec<i64> {
        self.frames.iter().map(|f| f.time.as_millis()).collect()
    }
}

/// Observer that queues events. Clones share the queue, so a host keeps one
/// handle and gives the other to the animation.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: Rc<RefCell<Vec<AnimationEvent>>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every queued event, oldest first.
    pub fn drain(&self) -> Vec<AnimationEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    fn push(&self, event: AnimationEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl AnimationObserver for EventQueue {
    fn load_started(&mut self) {
        self.push(AnimationEvent {
            kind: EventKind::AnimationLoadStarted,
            frames: Vec::new(),
        });
    }

    fn frame_load_started(&mut self, frame: &Frame) {
        self.push(AnimationEvent::single(EventKind::FrameLoadStarted, frame));
    }

    fn frame_load_complete(&mut self, frame: &Frame) {
        self.push(AnimationEvent::single(EventKind::FrameLoadComplete, frame));
    }

    fn group_progress(&mut self, frames: &[&Frame]) {
        self.push(AnimationEvent::many(
            EventKind::AnimationLoadGroupProgress,
            frames,
        ));
    }

    fn animation_complete(&mut self, frames: &[&Frame]) {
        self.push(AnimationEvent::many(EventKind::AnimationLoadComplete, frames));
    }

    fn frame_content_released(&mut self, frame: &Frame) {
        self.push(AnimationEvent::single(
            EventKind::AnimationFrameContentReleased,
            frame,
        ));
    }

    fn frame_changed(&mut self, frame: &Frame) {
        self.push(AnimationEvent::single(EventKind::FrameChanged, frame));
    }
}
