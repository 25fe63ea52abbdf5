//! Error types for the frame animation core.
//!
//! Only configuration problems are errors. A frame that fails to load is
//! data (see [`crate::frame::Frame::error`]) and never surfaces here.

use serde::{Deserialize, Serialize};

/// Errors returned synchronously by rejected calls.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum AnimationError {
    /// A layer source or animation configuration is missing mandatory fields.
    #[error("Configuration error: {reason}")]
    InvalidConfig { reason: String },

    /// The time window cannot produce a frame sequence.
    #[error("Invalid time window: {reason}")]
    InvalidWindow { reason: String },

    /// No render target is bound, so frames cannot be created.
    #[error("No render target attached")]
    NotAttached,

    /// No layer source has been set for the animation.
    #[error("No layer source configured")]
    MissingSource,

    /// Easing name outside the supported catalogue.
    #[error("Unknown easing function: {name}")]
    UnknownEasing { name: String },

    /// A time value that cannot be coerced into an instant.
    #[error("Invalid time value: {value}")]
    InvalidTime { value: String },
}

impl AnimationError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub fn invalid_window(reason: impl Into<String>) -> Self {
        Self::InvalidWindow {
            reason: reason.into(),
        }
    }

    /// Errors the caller can fix by retrying later without changing configuration.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotAttached)
    }

    /// Get error category for logging
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } | Self::MissingSource => "config",
            Self::InvalidWindow { .. } | Self::InvalidTime { .. } => "time",
            Self::NotAttached => "target",
            Self::UnknownEasing { .. } => "transition",
        }
    }
}

impl From<serde_json::Error> for AnimationError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidConfig {
            reason: err.to_string(),
        }
    }
}
