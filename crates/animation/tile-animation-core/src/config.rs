//! Animation configuration.
//!
//! Mirrors the `animation` block a host hands to the layer: time window,
//! pacing, fades and time-ranged layer overrides. Every field is optional;
//! values that fail validation are ignored by the setters that consume them.

use serde::{Deserialize, Serialize};

use crate::easing::Easing;
use crate::error::AnimationError;
use crate::time::{TimeInput, Timestamp};

pub const DEFAULT_FRAME_RATE_MS: f64 = 500.0;
pub const DEFAULT_FADE_IN_MS: f64 = 50.0;
pub const DEFAULT_FADE_OUT_MS: f64 = 200.0;
/// Tiles buffered around the viewport when the source does not say otherwise.
pub const DEFAULT_GRID_BUFFER: u32 = 1;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Display name shared by every frame unless an override replaces it.
    pub name: Option<String>,
    #[serde(alias = "hasLegend")]
    pub has_legend: Option<bool>,
    #[serde(alias = "beginTime")]
    pub begin_time: Option<TimeInput>,
    #[serde(alias = "endTime")]
    pub end_time: Option<TimeInput>,
    /// Milliseconds between frames.
    #[serde(alias = "resolutionTime")]
    pub resolution_time: Option<f64>,
    /// Milliseconds between automatic advances.
    #[serde(alias = "frameRate")]
    pub frame_rate: Option<f64>,
    /// Concurrent frame loads; zero or negative means unbounded.
    #[serde(alias = "maxAsyncLoadCount")]
    pub max_async_load_count: Option<i64>,
    #[serde(alias = "autoLoad")]
    pub auto_load: bool,
    #[serde(alias = "autoStart")]
    pub auto_start: bool,
    #[serde(alias = "fadeIn")]
    pub fade_in: FadeConfig,
    /// Absent leaves the current trail in place.
    #[serde(alias = "fadeOut")]
    pub fade_out: Option<FadeOutConfig>,
    /// Per-period replacements for layer id, name and legend flag.
    pub layers: Vec<LayerOverride>,
}

impl AnimationConfig {
    pub fn from_json(text: &str) -> Result<Self, AnimationError> {
        Ok(serde_json::from_str(text)?)
    }

    /// First override whose period contains `time`.
    pub fn layer_override(&self, time: Timestamp) -> Option<&LayerOverride> {
        self.layers.iter().find(|layer| layer.covers(time))
    }

    pub fn fade_timings(&self) -> FadeTimings {
        let fade_out = self
            .fade_out
            .as_ref()
            .map(|fade_out| fade_out.transition.clone())
            .unwrap_or_default();
        FadeTimings {
            fade_in_ms: self.fade_in.duration_ms(DEFAULT_FADE_IN_MS),
            fade_in_easing: self.fade_in.easing(),
            fade_out_ms: fade_out.duration_ms(DEFAULT_FADE_OUT_MS),
            fade_out_easing: fade_out.easing(),
        }
    }
}

/// Duration and curve of one kind of fade.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FadeConfig {
    /// Milliseconds; must be finite and non-negative to take effect.
    pub time: Option<f64>,
    #[serde(alias = "timingFunction")]
    pub timing_function: Option<String>,
}

impl FadeConfig {
    pub fn duration_ms(&self, default_ms: f64) -> f64 {
        match self.time {
            Some(ms) if ms.is_finite() && ms >= 0.0 => ms,
            _ => default_ms,
        }
    }

    /// Configured easing, or the default `ease-out` when absent or unknown.
    pub fn easing(&self) -> Easing {
        match self.timing_function.as_deref() {
            None => Easing::default(),
            Some(name) => Easing::from_name(name).unwrap_or_else(|| {
                log::warn!("unknown timing function {name:?}, using {}", Easing::default().name());
                Easing::default()
            }),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FadeOutConfig {
    #[serde(flatten)]
    pub transition: FadeConfig,
    /// Opacity trail for departing frames, most recently replaced first.
    pub opacities: Option<Vec<f64>>,
}

/// Resolved fade parameters used by the presentation layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FadeTimings {
    pub fade_in_ms: f64,
    pub fade_in_easing: Easing,
    pub fade_out_ms: f64,
    pub fade_out_easing: Easing,
}

impl Default for FadeTimings {
    fn default() -> Self {
        AnimationConfig::default().fade_timings()
    }
}

/// Layer settings that apply to frames whose time falls in `[begin_time, end_time]`.
/// An absent end leaves the period open.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerOverride {
    #[serde(alias = "beginTime")]
    pub begin_time: TimeInput,
    #[serde(default, alias = "endTime")]
    pub end_time: Option<TimeInput>,
    #[serde(default)]
    pub layer: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "hasLegend")]
    pub has_legend: Option<bool>,
}

impl LayerOverride {
    /// An override with an unparsable begin or end never matches.
    pub fn covers(&self, time: Timestamp) -> bool {
        let Some(begin) = self.begin_time.to_timestamp() else {
            return false;
        };
        let end = match &self.end_time {
            Some(input) => match input.to_timestamp() {
                Some(end) => Some(end),
                None => return false,
            },
            None => None,
        };
        begin <= time && end.map_or(true, |end| time <= end)
    }
}
