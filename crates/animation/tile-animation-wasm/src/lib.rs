use std::cell::RefCell;
use std::collections::VecDeque;

use js_sys::{Date, Function, Reflect};
use serde::Serialize;
use serde_wasm_bindgen as swb;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use tile_animation_core::{
    AnimationConfig, ControllerCommand, EventQueue, Frame, FrameAnimation, FrameConfig,
    FrameState, LayerSource, ManualClock, RenderHandle, Renderer, TimeInput,
};

fn jsvalue_is_undefined_or_null(v: &JsValue) -> bool {
    v.is_undefined() || v.is_null()
}

/// Plain objects instead of `Map`s, so frame configs and events read like JSON on the JS side.
fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, swb::Error> {
    value.serialize(&swb::Serializer::json_compatible())
}

/// Forwards layer operations to a JS host object with the methods
/// `createLayer(handle, config)`, `destroyLayer(handle)`,
/// `getOpacity(handle)`, `setOpacity(handle, value)`,
/// `getVisibility(handle)`, `setVisibility(handle, visible)`,
/// `getZIndex(handle)` and `setZIndex(handle, index)`.
///
/// Handles are allocated here; the host only maps them to its layers.
struct JsRenderer {
    host: JsValue,
    next_handle: u32,
}

impl JsRenderer {
    fn new(host: JsValue) -> Self {
        Self {
            host,
            next_handle: 0,
        }
    }

    fn call(&self, name: &str, args: &[JsValue]) -> Option<JsValue> {
        let method = Reflect::get(&self.host, &JsValue::from_str(name))
            .ok()
            .and_then(|v| v.dyn_into::<Function>().ok());
        let Some(method) = method else {
            log::warn!("renderer host has no {name}()");
            return None;
        };
        let result = match args {
            [] => method.call0(&self.host),
            [a] => method.call1(&self.host, a),
            [a, b, ..] => method.call2(&self.host, a, b),
        };
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                log::warn!("renderer host {name}() threw: {err:?}");
                None
            }
        }
    }
}

fn handle_arg(handle: RenderHandle) -> JsValue {
    JsValue::from(handle.0)
}

impl Renderer for JsRenderer {
    fn create(&mut self, config: &FrameConfig) -> RenderHandle {
        self.next_handle += 1;
        let handle = RenderHandle(self.next_handle);
        match to_js(config) {
            Ok(value) => {
                self.call("createLayer", &[handle_arg(handle), value]);
            }
            Err(err) => log::warn!("cannot pass frame config to the host: {err}"),
        }
        handle
    }

    fn destroy(&mut self, handle: RenderHandle) {
        self.call("destroyLayer", &[handle_arg(handle)]);
    }

    fn opacity(&self, handle: RenderHandle) -> Option<f64> {
        self.call("getOpacity", &[handle_arg(handle)])?.as_f64()
    }

    fn set_opacity(&mut self, handle: RenderHandle, value: f64) {
        self.call("setOpacity", &[handle_arg(handle), JsValue::from_f64(value)]);
    }

    fn visibility(&self, handle: RenderHandle) -> Option<bool> {
        self.call("getVisibility", &[handle_arg(handle)])?.as_bool()
    }

    fn set_visibility(&mut self, handle: RenderHandle, visible: bool) {
        self.call("setVisibility", &[handle_arg(handle), JsValue::from_bool(visible)]);
    }

    fn z_index(&self, handle: RenderHandle) -> Option<i32> {
        self.call("getZIndex", &[handle_arg(handle)])?
            .as_f64()
            .map(|z| z as i32)
    }

    fn set_z_index(&mut self, handle: RenderHandle, index: i32) {
        self.call("setZIndex", &[handle_arg(handle), JsValue::from(index)]);
    }
}

#[derive(Serialize)]
struct FrameSummary<'a> {
    time: i64,
    time_param: &'a str,
    state: FrameState,
    handle: Option<u32>,
    error: Option<&'a str>,
}

impl<'a> From<&'a Frame> for FrameSummary<'a> {
    fn from(frame: &'a Frame) -> Self {
        Self {
            time: frame.time().as_millis(),
            time_param: &frame.config().time_param,
            state: frame.state(),
            handle: frame.handle().map(|h| h.0),
            error: frame.error(),
        }
    }
}

/// Accepts epoch milliseconds, ISO-8601 strings and `Date` objects.
fn time_input(value: JsValue) -> Result<TimeInput, JsError> {
    if let Some(date) = value.dyn_ref::<Date>() {
        return Ok(TimeInput::Epoch(date.get_time()));
    }
    swb::from_value(value).map_err(|e| JsError::new(&format!("time error: {e}")))
}

type Core = FrameAnimation<JsRenderer, ManualClock>;

/// A load signal from the host, applied once the core is free.
#[derive(Debug)]
enum HostSignal {
    Started(u32),
    TileError(u32, String),
    Finished(u32),
}

fn busy() -> JsError {
    JsError::new("animation is busy: call it again after the current call returns")
}

/// Every method takes `&self`, so the host may call back from inside a
/// renderer or listener callback. Load signals that arrive while the core
/// is busy are queued and applied before the outer call returns; other
/// re-entrant calls are refused.
#[wasm_bindgen]
pub struct WebFrameAnimation {
    core: RefCell<Core>,
    clock: ManualClock,
    signals: RefCell<VecDeque<HostSignal>>,
    events: EventQueue,
    listener: RefCell<Option<Function>>,
}

#[wasm_bindgen]
impl WebFrameAnimation {
    /// Create an animation bound to a renderer host object.
    /// `source` and `config` are optional JSON objects; with `autoLoad`
    /// set in `config` loading starts right away.
    /// Example:
    ///   new WebFrameAnimation(host, { kind: "wms", url, params: { layers: "radar" } }, { beginTime, endTime, resolutionTime: 600000 })
    #[wasm_bindgen(constructor)]
    pub fn new(
        host: JsValue,
        source: JsValue,
        config: JsValue,
    ) -> Result<WebFrameAnimation, JsError> {
        console_error_panic_hook::set_once();

        if jsvalue_is_undefined_or_null(&host) {
            return Err(JsError::new("renderer host is null/undefined"));
        }
        let clock = ManualClock::new(0.0);
        let events = EventQueue::new();
        let mut core = FrameAnimation::new(clock.clone());
        core.set_observer(events.clone());

        let animation = WebFrameAnimation {
            core: RefCell::new(core),
            clock,
            signals: RefCell::new(VecDeque::new()),
            events,
            listener: RefCell::new(None),
        };
        if !jsvalue_is_undefined_or_null(&source) {
            animation.set_source(source)?;
        }
        if !jsvalue_is_undefined_or_null(&config) {
            animation.set_config(config)?;
        }
        animation
            .with_core(|core| core.attach(JsRenderer::new(host)))
            .ok_or_else(busy)?;
        Ok(animation)
    }

    /// Call `listener(event)` for every event from now on instead of
    /// queueing them for [`drain_events`](Self::drain_events).
    #[wasm_bindgen(js_name = set_event_listener)]
    pub fn set_event_listener(&self, listener: Option<Function>) {
        *self.listener.borrow_mut() = listener;
        self.flush();
    }

    /// Queued events as an array of `{ kind, frames: [{ time, error? }] }`.
    #[wasm_bindgen(js_name = drain_events)]
    pub fn drain_events(&self) -> Result<JsValue, JsError> {
        let events = self.events.drain();
        to_js(&events).map_err(|e| JsError::new(&format!("events error: {e}")))
    }

    // ---- configuration ------------------------------------------------------

    #[wasm_bindgen(js_name = set_source)]
    pub fn set_source(&self, source: JsValue) -> Result<(), JsError> {
        let source: LayerSource =
            swb::from_value(source).map_err(|e| JsError::new(&format!("source error: {e}")))?;
        self.with_core(|core| core.set_source(source))
            .ok_or_else(busy)?
            .map_err(|e| JsError::new(&e.to_string()))
    }

    #[wasm_bindgen(js_name = set_config)]
    pub fn set_config(&self, config: JsValue) -> Result<(), JsError> {
        let config: AnimationConfig =
            swb::from_value(config).map_err(|e| JsError::new(&format!("config error: {e}")))?;
        self.with_core(|core| core.set_config(config))
            .ok_or_else(busy)
    }

    #[wasm_bindgen(js_name = set_frame_rate)]
    pub fn set_frame_rate(&self, frame_rate_ms: f64) -> bool {
        self.with_core(|core| core.set_frame_rate(frame_rate_ms))
            .unwrap_or(false)
    }

    #[wasm_bindgen(js_name = frame_rate)]
    pub fn frame_rate(&self) -> f64 {
        self.read(Core::frame_rate).unwrap_or(f64::NAN)
    }

    /// `undefined`, zero or negative lifts the cap.
    #[wasm_bindgen(js_name = set_max_concurrent_loads)]
    pub fn set_max_concurrent_loads(&self, count: Option<i32>) {
        self.with_core(|core| core.set_max_concurrent_loads(count.map(i64::from)));
    }

    #[wasm_bindgen(js_name = set_fade_out_opacities)]
    pub fn set_fade_out_opacities(&self, opacities: Option<Vec<f64>>) -> bool {
        self.with_core(|core| core.set_fade_out_opacities(opacities.as_deref()))
            .unwrap_or(false)
    }

    #[wasm_bindgen(js_name = set_z_index)]
    pub fn set_z_index(&self, index: i32) {
        self.with_core(|core| core.set_z_index(index));
    }

    // ---- loading ------------------------------------------------------------

    /// Rebuild the frames for the current window and start loading.
    /// Returns the number of frames.
    #[wasm_bindgen(js_name = load_animation)]
    pub fn load_animation(&self) -> Result<u32, JsError> {
        let count = self
            .with_core(Core::load_animation)
            .ok_or_else(busy)?
            .map_err(|e| JsError::new(&e.to_string()))?;
        Ok(count as u32)
    }

    pub fn reset(&self) {
        self.with_core(Core::reset);
    }

    /// Safe to call from inside `setVisibility`: the signal is queued
    /// while the animation is busy.
    #[wasm_bindgen(js_name = frame_load_started)]
    pub fn frame_load_started(&self, handle: u32) {
        self.signal(HostSignal::Started(handle));
    }

    #[wasm_bindgen(js_name = frame_tile_error)]
    pub fn frame_tile_error(&self, handle: u32, info: String) {
        self.signal(HostSignal::TileError(handle, info));
    }

    #[wasm_bindgen(js_name = frame_load_finished)]
    pub fn frame_load_finished(&self, handle: u32) {
        self.signal(HostSignal::Finished(handle));
    }

    #[wasm_bindgen(js_name = viewport_changed)]
    pub fn viewport_changed(&self) {
        self.with_core(Core::viewport_changed);
    }

    // ---- presentation -------------------------------------------------------

    #[wasm_bindgen(js_name = set_visibility)]
    pub fn set_visibility(&self, visible: bool) {
        self.with_core(|core| core.set_visibility(visible));
    }

    #[wasm_bindgen(js_name = is_visible)]
    pub fn is_visible(&self) -> bool {
        self.read(Core::is_visible).unwrap_or(false)
    }

    #[wasm_bindgen(js_name = set_opacity)]
    pub fn set_opacity(&self, opacity: f64) -> bool {
        self.with_core(|core| core.set_opacity(opacity))
            .unwrap_or(false)
    }

    pub fn opacity(&self) -> f64 {
        self.read(Core::opacity).unwrap_or(f64::NAN)
    }

    /// Returns whether the frame on screen changed.
    #[wasm_bindgen(js_name = show_frame)]
    pub fn show_frame(&self, time: JsValue) -> Result<bool, JsError> {
        let time = time_input(time)?;
        self.with_core(|core| core.show_frame(time).changed().is_some())
            .ok_or_else(busy)
    }

    #[wasm_bindgen(js_name = show_next_frame)]
    pub fn show_next_frame(&self) -> bool {
        self.with_core(|core| core.show_next_frame().changed().is_some())
            .unwrap_or(false)
    }

    #[wasm_bindgen(js_name = show_previous_frame)]
    pub fn show_previous_frame(&self) -> bool {
        self.with_core(|core| core.show_previous_frame().changed().is_some())
            .unwrap_or(false)
    }

    // ---- playback -----------------------------------------------------------

    pub fn start(&self) {
        self.with_core(Core::start);
    }

    pub fn pause(&self) {
        self.with_core(Core::pause);
    }

    pub fn stop(&self) {
        self.with_core(Core::stop);
    }

    #[wasm_bindgen(js_name = is_running)]
    pub fn is_running(&self) -> bool {
        self.read(Core::is_running).unwrap_or(false)
    }

    /// Drive fades and automatic advance from `requestAnimationFrame`;
    /// `now_ms` is the callback timestamp.
    pub fn tick(&self, now_ms: f64) {
        self.clock.set(now_ms);
        self.with_core(Core::tick);
    }

    /// Apply a controller command, e.g. `"Start"` or
    /// `{ ShowTime: { time: "2013-03-01T12:00:00Z" } }`.
    pub fn command(&self, command: JsValue) -> Result<(), JsError> {
        let command: ControllerCommand =
            swb::from_value(command).map_err(|e| JsError::new(&format!("command error: {e}")))?;
        self.with_core(|core| core.apply_command(command))
            .ok_or_else(busy)?
            .map_err(|e| JsError::new(&e.to_string()))
    }

    // ---- state --------------------------------------------------------------
    //
    // Getters read through a shared borrow and return empty values while a
    // renderer callback is running.

    #[wasm_bindgen(js_name = frame_count)]
    pub fn frame_count(&self) -> u32 {
        self.read(|core| core.frame_count() as u32).unwrap_or(0)
    }

    /// Epoch milliseconds of the frame on screen.
    #[wasm_bindgen(js_name = current_time)]
    pub fn current_time(&self) -> Option<f64> {
        self.read(|core| {
            core.current_frame()
                .map(|frame| frame.time().as_millis() as f64)
        })
        .flatten()
    }

    #[wasm_bindgen(js_name = begin_time)]
    pub fn begin_time(&self) -> Option<f64> {
        self.read(|core| core.begin_time().map(|t| t.as_millis() as f64))
            .flatten()
    }

    #[wasm_bindgen(js_name = end_time)]
    pub fn end_time(&self) -> Option<f64> {
        self.read(|core| core.end_time().map(|t| t.as_millis() as f64))
            .flatten()
    }

    #[wasm_bindgen(js_name = load_step)]
    pub fn load_step(&self) -> u32 {
        self.read(|core| core.load_step() as u32).unwrap_or(0)
    }

    #[wasm_bindgen(js_name = group_load_step)]
    pub fn group_load_step(&self) -> u32 {
        self.read(|core| core.group_load_step() as u32).unwrap_or(0)
    }

    #[wasm_bindgen(js_name = is_load_complete)]
    pub fn is_load_complete(&self) -> bool {
        self.read(Core::is_load_complete).unwrap_or(false)
    }

    /// Array of `{ time, time_param, state, handle, error }`.
    pub fn frames(&self) -> Result<JsValue, JsError> {
        self.read(|core| {
            let frames: Vec<FrameSummary<'_>> = core.frames().iter().map(Into::into).collect();
            to_js(&frames).map_err(|e| JsError::new(&format!("frames error: {e}")))
        })
        .ok_or_else(busy)?
    }

    /// Load signals waiting for the current call to return.
    #[wasm_bindgen(js_name = pending_signals)]
    pub fn pending_signals(&self) -> u32 {
        self.signals.borrow().len() as u32
    }
}

impl WebFrameAnimation {
    /// Run `f` on the core, apply load signals the host sent in the
    /// meantime and deliver events. `None` when the core is already borrowed
    /// further up the stack.
    fn with_core<T>(&self, f: impl FnOnce(&mut Core) -> T) -> Option<T> {
        let result = {
            let Ok(mut core) = self.core.try_borrow_mut() else {
                log::warn!("refusing re-entrant call while the animation is busy");
                return None;
            };
            let result = f(&mut *core);
            self.apply_signals(&mut *core);
            result
        };
        self.flush();
        Some(result)
    }

    fn read<T>(&self, f: impl FnOnce(&Core) -> T) -> Option<T> {
        match self.core.try_borrow() {
            Ok(core) => Some(f(&*core)),
            Err(_) => {
                log::debug!("state read while the animation is busy");
                None
            }
        }
    }

    /// Queue a host signal, applying it right away when the core is free.
    fn signal(&self, signal: HostSignal) {
        self.signals.borrow_mut().push_back(signal);
        let applied = match self.core.try_borrow_mut() {
            Ok(mut core) => {
                self.apply_signals(&mut *core);
                true
            }
            Err(_) => false,
        };
        if applied {
            self.flush();
        }
    }

    /// Signals raised while applying others (a finished load scheduling the
    /// next one) join the queue and are handled in the same loop.
    fn apply_signals(&self, core: &mut Core) {
        loop {
            let next = self.signals.borrow_mut().pop_front();
            let Some(signal) = next else {
                break;
            };
            match signal {
                HostSignal::Started(handle) => core.frame_load_started(RenderHandle(handle)),
                HostSignal::TileError(handle, info) => {
                    core.frame_tile_error(RenderHandle(handle), info)
                }
                HostSignal::Finished(handle) => core.frame_load_finished(RenderHandle(handle)),
            }
        }
    }

    /// Hand queued events to the listener, if one is set. The listener may
    /// call back into the animation.
    fn flush(&self) {
        let Some(listener) = self.listener.borrow().clone() else {
            return;
        };
        for event in self.events.drain() {
            match to_js(&event) {
                Ok(value) => {
                    if let Err(err) = listener.call1(&JsValue::UNDEFINED, &value) {
                        log::warn!("event listener threw: {err:?}");
                    }
                }
                Err(err) => log::warn!("cannot pass event to the listener: {err}"),
            }
        }
    }
}

/// Numeric ABI version for compatibility checks at init.
#[wasm_bindgen]
pub fn abi_version() -> u32 {
    1
}
