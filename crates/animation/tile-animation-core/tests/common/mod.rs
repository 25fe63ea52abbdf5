#![allow(dead_code)]

use tile_animation_core::{
    AnimationConfig, AnimationEvent, EventKind, EventQueue, Frame, FrameAnimation, LayerSource,
    ManualClock, MemoryRenderer, RenderHandle, TimeInput,
};

pub type TestAnimation = FrameAnimation<MemoryRenderer, ManualClock>;

pub fn approx(a: f64, b: f64, eps: f64) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

/// An animation bound to an in-memory renderer, a manual clock and an
/// event queue, with a WMS source already set.
pub struct Harness {
    pub animation: TestAnimation,
    pub clock: ManualClock,
    pub events: EventQueue,
}

impl Harness {
    pub fn new() -> Self {
        let clock = ManualClock::new(0.0);
        let events = EventQueue::new();
        let mut animation = FrameAnimation::with_renderer(MemoryRenderer::new(), clock.clone());
        animation.set_observer(events.clone());
        animation
            .set_source(LayerSource::wms("https://maps.example.org/wms", "radar").unwrap())
            .unwrap();
        Self {
            animation,
            clock,
            events,
        }
    }

    /// Window in epoch milliseconds with instant fades.
    pub fn with_window(begin_ms: i64, end_ms: i64, resolution_ms: f64) -> Self {
        let mut harness = Self::new();
        harness.animation.set_config(AnimationConfig {
            fade_in: tile_animation_core::FadeConfig {
                time: Some(0.0),
                timing_function: None,
            },
            fade_out: Some(tile_animation_core::FadeOutConfig {
                transition: tile_animation_core::FadeConfig {
                    time: Some(0.0),
                    timing_function: None,
                },
                opacities: None,
            }),
            ..Default::default()
        });
        harness
            .animation
            .set_window(
                Some(TimeInput::from(begin_ms)),
                Some(TimeInput::from(end_ms)),
                Some(resolution_ms),
            )
            .unwrap();
        harness
    }

    pub fn from_fixture(name: &str) -> Self {
        let config: AnimationConfig =
            tile_animation_test_fixtures::configs::load(name).expect("load config fixture");
        let mut harness = Self::new();
        harness.animation.set_config(config);
        harness
    }

    pub fn renderer(&self) -> &MemoryRenderer {
        self.animation.renderer().expect("renderer attached")
    }

    pub fn handle(&self, index: usize) -> RenderHandle {
        self.animation
            .frame(index)
            .and_then(Frame::handle)
            .expect("frame has a render handle")
    }

    /// Report a full successful load of the frame at `index`.
    pub fn finish(&mut self, index: usize) {
        let handle = self.handle(index);
        self.animation.frame_load_started(handle);
        self.animation.frame_load_finished(handle);
    }

    /// Report a load of the frame at `index` that hit a tile error.
    pub fn fail(&mut self, index: usize, info: &str) {
        let handle = self.handle(index);
        self.animation.frame_load_started(handle);
        self.animation.frame_tile_error(handle, info);
        self.animation.frame_load_finished(handle);
    }

    /// Finish loads in request order until nothing is in flight.
    pub fn finish_all(&mut self) {
        while let Some(index) = self.animation.frames().iter().position(Frame::is_loading) {
            self.finish(index);
        }
    }

    /// Frame times in the order they were requested from the renderer.
    pub fn requested_times(&self) -> Vec<i64> {
        self.renderer()
            .shown()
            .iter()
            .map(|time| time.as_millis())
            .collect()
    }

    pub fn opacity(&self, index: usize) -> f64 {
        let handle = self.handle(index);
        self.renderer()
            .layer(handle)
            .map(|layer| layer.opacity)
            .expect("layer exists")
    }

    pub fn advance(&mut self, ms: f64) {
        self.clock.advance(ms);
        self.animation.tick();
    }

    pub fn drain(&self) -> Vec<AnimationEvent> {
        self.events.drain()
    }

    pub fn drain_kinds(&self) -> Vec<EventKind> {
        self.events.drain().into_iter().map(|e| e.kind).collect()
    }
}
