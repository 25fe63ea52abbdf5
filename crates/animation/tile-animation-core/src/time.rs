//! Time handling for frame animations.
//!
//! Frames are addressed by absolute instants with millisecond precision
//! (epoch milliseconds, UTC). Hosts hand us times in several shapes: an
//! absolute date, an epoch number or an ISO-8601 string. [`TimeInput`]
//! accepts all of them and coerces lazily, so a bad value can be rejected
//! without disturbing whatever was set before.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AnimationError;

/// Largest epoch offset a date can carry (±100 000 000 days).
const MAX_EPOCH_MS: f64 = 8.64e15;

/// Most frames one window may produce.
pub const MAX_FRAME_COUNT: u64 = 100_000;

/// An instant in epoch milliseconds (UTC).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Timestamp(i64);

impl Timestamp {
    #[inline]
    pub fn from_millis(milliseconds: i64) -> Self {
        Self(milliseconds)
    }

    #[inline]
    pub fn as_millis(&self) -> i64 {
        self.0
    }

    #[inline]
    pub fn from_datetime(datetime: &DateTime<Utc>) -> Self {
        Self(datetime.timestamp_millis())
    }

    /// `None` when the instant lies outside the calendar range chrono supports.
    #[inline]
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.0)
    }

    /// Parse an RFC 3339 / ISO-8601 string with offset.
    pub fn parse(text: &str) -> Result<Self, AnimationError> {
        DateTime::parse_from_rfc3339(text.trim())
            .map(|dt| Self(dt.with_timezone(&Utc).timestamp_millis()))
            .map_err(|_| AnimationError::InvalidTime {
                value: text.to_string(),
            })
    }

    /// ISO-8601 with millisecond precision and a `Z` suffix, e.g.
    /// `2013-03-01T12:00:00.000Z`. This is the value sent as the `TIME`
    /// parameter of every frame request.
    pub fn to_iso_string(&self) -> String {
        match self.to_datetime() {
            Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
            None => self.0.to_string(),
        }
    }

    #[inline]
    pub fn offset(&self, milliseconds: i64) -> Self {
        Self(self.0.saturating_add(milliseconds))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso_string())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(datetime: DateTime<Utc>) -> Self {
        Self::from_datetime(&datetime)
    }
}

impl From<Timestamp> for i64 {
    fn from(time: Timestamp) -> Self {
        time.0
    }
}

/// A loosely typed time value as supplied by configuration or a controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeInput {
    /// Epoch milliseconds. Fractions are truncated.
    Epoch(f64),
    /// An absolute instant.
    Absolute(DateTime<Utc>),
    /// Anything else; parsed as RFC 3339 on coercion.
    Text(String),
}

impl TimeInput {
    /// Coerce into an instant, or `None` if the value is not a valid time.
    pub fn to_timestamp(&self) -> Option<Timestamp> {
        match self {
            Self::Epoch(ms) => {
                if ms.is_finite() && ms.abs() <= MAX_EPOCH_MS {
                    Some(Timestamp(ms.trunc() as i64))
                } else {
                    None
                }
            }
            Self::Absolute(dt) => Some(Timestamp::from_datetime(dt)),
            Self::Text(text) => Timestamp::parse(text).ok(),
        }
    }
}

impl From<Timestamp> for TimeInput {
    fn from(time: Timestamp) -> Self {
        Self::Epoch(time.0 as f64)
    }
}

impl From<i64> for TimeInput {
    fn from(ms: i64) -> Self {
        Self::Epoch(ms as f64)
    }
}

impl From<f64> for TimeInput {
    fn from(ms: f64) -> Self {
        Self::Epoch(ms)
    }
}

impl From<DateTime<Utc>> for TimeInput {
    fn from(datetime: DateTime<Utc>) -> Self {
        Self::Absolute(datetime)
    }
}

impl From<&str> for TimeInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for TimeInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Begin, end and resolution of the animation period.
///
/// Setters never clear a valid value: missing or invalid input is ignored
/// and reported through the boolean return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    begin: Option<Timestamp>,
    end: Option<Timestamp>,
    resolution_ms: Option<u64>,
}

impl TimeWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_begin(&mut self, input: Option<&TimeInput>) -> bool {
        match input.and_then(TimeInput::to_timestamp) {
            Some(time) => {
                self.begin = Some(time);
                true
            }
            None => {
                if input.is_some() {
                    log::warn!("ignoring invalid begin time {:?}", input);
                }
                false
            }
        }
    }

    pub fn set_end(&mut self, input: Option<&TimeInput>) -> bool {
        match input.and_then(TimeInput::to_timestamp) {
            Some(time) => {
                self.end = Some(time);
                true
            }
            None => {
                if input.is_some() {
                    log::warn!("ignoring invalid end time {:?}", input);
                }
                false
            }
        }
    }

    /// Accepts finite values of at least one millisecond; the value is floored.
    pub fn set_resolution(&mut self, resolution_ms: Option<f64>) -> bool {
        match resolution_ms {
            Some(ms) if ms.is_finite() && ms >= 1.0 => {
                self.resolution_ms = Some(ms.floor() as u64);
                true
            }
            Some(ms) => {
                log::warn!("ignoring invalid resolution {ms}");
                false
            }
            None => false,
        }
    }

    #[inline]
    pub fn begin(&self) -> Option<Timestamp> {
        self.begin
    }

    #[inline]
    pub fn end(&self) -> Option<Timestamp> {
        self.end
    }

    /// Resolution in milliseconds, 0 while unset.
    #[inline]
    pub fn resolution_ms(&self) -> u64 {
        self.resolution_ms.unwrap_or(0)
    }

    /// Check that the window can produce a frame sequence.
    pub fn validate(&self) -> Result<(Timestamp, Timestamp, u64), AnimationError> {
        let begin = self
            .begin
            .ok_or_else(|| AnimationError::invalid_window("begin time is not set"))?;
        let end = self
            .end
            .ok_or_else(|| AnimationError::invalid_window("end time is not set"))?;
        let resolution = self
            .resolution_ms
            .ok_or_else(|| AnimationError::invalid_window("resolution is not set"))?;
        if begin > end {
            return Err(AnimationError::invalid_window(format!(
                "begin {begin} is after end {end}"
            )));
        }
        Ok((begin, end, resolution))
    }

    /// One instant per tick from begin to end inclusive. Windows with more
    /// than [`MAX_FRAME_COUNT`] ticks are rejected.
    pub fn frame_times(&self) -> Result<Vec<Timestamp>, AnimationError> {
        let (begin, end, resolution) = self.validate()?;
        let span = end.as_millis().abs_diff(begin.as_millis());
        let count = span / resolution + 1;
        if count > MAX_FRAME_COUNT {
            return Err(AnimationError::invalid_window(format!(
                "{count} frames exceed the limit of {MAX_FRAME_COUNT}"
            )));
        }
        Ok((0..count)
            .map(|i| begin.offset((i * resolution) as i64))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_string_matches_javascript_format() {
        let t = Timestamp::from_millis(1_362_139_200_000);
        assert_eq!(t.to_iso_string(), "2013-03-01T12:00:00.000Z");
        assert_eq!(Timestamp::parse("2013-03-01T12:00:00Z").unwrap(), t);
        assert_eq!(Timestamp::parse("2013-03-01T14:00:00+02:00").unwrap(), t);
    }

    #[test]
    fn time_input_coercion() {
        assert_eq!(
            TimeInput::Epoch(1500.9).to_timestamp(),
            Some(Timestamp::from_millis(1500))
        );
        assert_eq!(TimeInput::Epoch(f64::NAN).to_timestamp(), None);
        assert_eq!(TimeInput::Epoch(1e20).to_timestamp(), None);
        assert_eq!(TimeInput::from("not a date").to_timestamp(), None);
        let dt = DateTime::from_timestamp_millis(42).unwrap();
        assert_eq!(
            TimeInput::from(dt).to_timestamp(),
            Some(Timestamp::from_millis(42))
        );
    }

    #[test]
    fn time_input_deserializes_numbers_and_strings() {
        let n: TimeInput = serde_json::from_str("1000").unwrap();
        assert_eq!(n.to_timestamp(), Some(Timestamp::from_millis(1000)));
        let s: TimeInput = serde_json::from_str("\"1970-01-01T00:00:01Z\"").unwrap();
        assert_eq!(s.to_timestamp(), Some(Timestamp::from_millis(1000)));
        let bad: TimeInput = serde_json::from_str("\"yesterday\"").unwrap();
        assert_eq!(bad.to_timestamp(), None);
    }

    #[test]
    fn invalid_input_keeps_previous_value() {
        let mut w = TimeWindow::new();
        assert!(w.set_begin(Some(&TimeInput::from(0i64))));
        assert!(!w.set_begin(Some(&TimeInput::from("garbage"))));
        assert!(!w.set_begin(None));
        assert_eq!(w.begin(), Some(Timestamp::from_millis(0)));

        assert!(w.set_resolution(Some(1000.7)));
        assert_eq!(w.resolution_ms(), 1000);
        assert!(!w.set_resolution(Some(0.5)));
        assert!(!w.set_resolution(Some(f64::NAN)));
        assert!(!w.set_resolution(None));
        assert_eq!(w.resolution_ms(), 1000);
    }

    #[test]
    fn frame_times_are_inclusive_and_strictly_increasing() {
        let mut w = TimeWindow::new();
        w.set_begin(Some(&TimeInput::from(0i64)));
        w.set_end(Some(&TimeInput::from(3500i64)));
        w.set_resolution(Some(1000.0));
        let times = w.frame_times().unwrap();
        assert_eq!(
            times.iter().map(Timestamp::as_millis).collect::<Vec<_>>(),
            vec![0, 1000, 2000, 3000]
        );
    }

    #[test]
    fn frame_times_reject_incomplete_or_reversed_windows() {
        let mut w = TimeWindow::new();
        assert!(w.frame_times().is_err());
        w.set_begin(Some(&TimeInput::from(5000i64)));
        w.set_end(Some(&TimeInput::from(0i64)));
        w.set_resolution(Some(1000.0));
        assert!(matches!(
            w.frame_times(),
            Err(AnimationError::InvalidWindow { .. })
        ));
        w.set_end(Some(&TimeInput::from(5000i64)));
        assert_eq!(w.frame_times().unwrap().len(), 1);
    }

    #[test]
    fn frame_times_reject_oversized_windows() {
        let mut w = TimeWindow::new();
        w.set_begin(Some(&TimeInput::from(0i64)));
        w.set_end(Some(&TimeInput::from(8_000_000_000_000_000i64)));
        w.set_resolution(Some(1.0));
        assert!(matches!(
            w.frame_times(),
            Err(AnimationError::InvalidWindow { .. })
        ));

        w.set_end(Some(&TimeInput::from((MAX_FRAME_COUNT as i64 - 1) * 1000)));
        w.set_resolution(Some(1000.0));
        assert_eq!(w.frame_times().unwrap().len(), MAX_FRAME_COUNT as usize);
    }
}
