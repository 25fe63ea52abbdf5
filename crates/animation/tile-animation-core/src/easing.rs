//! Easing curves for opacity transitions.
//!
//! A fixed catalogue reproducing the curve shapes of the Raphaël easing
//! formulas. Every function maps normalized elapsed time `n` in [0, 1] to
//! normalized progress; `back-*` and `elastic` overshoot on purpose.

use std::f64::consts::PI;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AnimationError;

const BACK_OVERSHOOT: f64 = 1.70158;
const BOUNCE_SCALE: f64 = 7.5625;
const BOUNCE_SPAN: f64 = 2.75;

/// Supported easing functions. `EaseOut` is the default for fades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Easing {
    #[serde(rename = "linear")]
    Linear,
    #[serde(rename = "ease-in", alias = "easeIn", alias = "<")]
    EaseIn,
    #[default]
    #[serde(rename = "ease-out", alias = "easeOut", alias = ">")]
    EaseOut,
    #[serde(rename = "ease-in-out", alias = "easeInOut", alias = "<>")]
    EaseInOut,
    #[serde(rename = "back-in", alias = "backIn")]
    BackIn,
    #[serde(rename = "back-out", alias = "backOut")]
    BackOut,
    #[serde(rename = "bounce")]
    Bounce,
    #[serde(rename = "elastic")]
    Elastic,
}

impl Easing {
    pub const ALL: [Easing; 8] = [
        Easing::Linear,
        Easing::EaseIn,
        Easing::EaseOut,
        Easing::EaseInOut,
        Easing::BackIn,
        Easing::BackOut,
        Easing::Bounce,
        Easing::Elastic,
    ];

    /// Look up an easing by canonical name or alias.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "linear" => Some(Self::Linear),
            "ease-in" | "easeIn" | "<" => Some(Self::EaseIn),
            "ease-out" | "easeOut" | ">" => Some(Self::EaseOut),
            "ease-in-out" | "easeInOut" | "<>" => Some(Self::EaseInOut),
            "back-in" | "backIn" => Some(Self::BackIn),
            "back-out" | "backOut" => Some(Self::BackOut),
            "bounce" => Some(Self::Bounce),
            "elastic" => Some(Self::Elastic),
            _ => None,
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::EaseIn => "ease-in",
            Self::EaseOut => "ease-out",
            Self::EaseInOut => "ease-in-out",
            Self::BackIn => "back-in",
            Self::BackOut => "back-out",
            Self::Bounce => "bounce",
            Self::Elastic => "elastic",
        }
    }

    /// Map normalized time to normalized progress.
    pub fn apply(&self, n: f64) -> f64 {
        match self {
            Self::Linear => n,
            Self::EaseIn => n.powf(1.7),
            Self::EaseOut => n.powf(0.48),
            Self::EaseInOut => ease_in_out(n),
            Self::BackIn => n * n * ((BACK_OVERSHOOT + 1.0) * n - BACK_OVERSHOOT),
            Self::BackOut => {
                let m = n - 1.0;
                m * m * ((BACK_OVERSHOOT + 1.0) * m + BACK_OVERSHOOT) + 1.0
            }
            Self::Elastic => {
                if n == 0.0 || n == 1.0 {
                    return n;
                }
                2f64.powf(-10.0 * n) * ((n - 0.075) * (2.0 * PI) / 0.3).sin() + 1.0
            }
            Self::Bounce => bounce(n),
        }
    }
}

impl FromStr for Easing {
    type Err = AnimationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| AnimationError::UnknownEasing {
            name: s.to_string(),
        })
    }
}

/// Closed-form inverse of the cubic bezier (0.42, 0, 0.58, 1) timing curve.
fn ease_in_out(n: f64) -> f64 {
    let q = 0.48 - n / 1.04;
    let big_q = (0.1734 + q * q).sqrt();
    let x = (big_q - q).cbrt();
    let y = (-big_q - q).cbrt();
    let t = x + y + 0.5;
    (1.0 - t) * 3.0 * t * t + t * t * t
}

fn bounce(n: f64) -> f64 {
    if n < 1.0 / BOUNCE_SPAN {
        BOUNCE_SCALE * n * n
    } else if n < 2.0 / BOUNCE_SPAN {
        let m = n - 1.5 / BOUNCE_SPAN;
        BOUNCE_SCALE * m * m + 0.75
    } else if n < 2.5 / BOUNCE_SPAN {
        let m = n - 2.25 / BOUNCE_SPAN;
        BOUNCE_SCALE * m * m + 0.9375
    } else {
        let m = n - 2.625 / BOUNCE_SPAN;
        BOUNCE_SCALE * m * m + 0.984375
    }
}
