//! Eased property transitions.
//!
//! The engine owns at most one live [`TransitionRecord`] per target key.
//! Starting a new transition on a key replaces the old one, so two fades on
//! the same frame never race each other. The property itself lives outside
//! the engine and is reached through [`PropertyTarget`].

use std::hash::Hash;

use hashbrown::HashMap;

use crate::easing::Easing;

/// Read/write access to one numeric property per key.
pub trait PropertyTarget<K> {
    /// Current value, or `None` if the target cannot be read.
    fn get(&self, key: &K) -> Option<f64>;
    fn set(&mut self, key: &K, value: f64);
}

/// One running transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionRecord {
    pub begin_value: f64,
    pub end_value: f64,
    pub easing: Easing,
    pub duration_ms: f64,
    pub start_ms: f64,
}

impl TransitionRecord {
    /// Value at `now_ms` and whether the transition has finished.
    /// A finished transition always yields exactly `end_value`.
    pub fn sample(&self, now_ms: f64) -> (f64, bool) {
        let elapsed = now_ms - self.start_ms;
        if self.duration_ms <= 0.0 || elapsed >= self.duration_ms {
            return (self.end_value, true);
        }
        let n = (elapsed / self.duration_ms).max(0.0);
        let progress = self.easing.apply(n);
        (
            self.begin_value + (self.end_value - self.begin_value) * progress,
            false,
        )
    }
}

#[derive(Debug)]
pub struct TransitionEngine<K> {
    live: HashMap<K, TransitionRecord>,
}

impl<K> Default for TransitionEngine<K> {
    fn default() -> Self {
        Self {
            live: HashMap::new(),
        }
    }
}

impl<K> TransitionEngine<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive `key` from its current value to `end_value`.
    ///
    /// Any live transition on `key` is cancelled first. The first step runs
    /// immediately, so a zero duration writes the end value before returning.
    /// Returns `false` when the transition was dropped: non-finite end value,
    /// negative or NaN duration, or an unreadable start value.
    pub fn animate(
        &mut self,
        target: &mut dyn PropertyTarget<K>,
        key: K,
        end_value: f64,
        easing: Easing,
        duration_ms: f64,
        now_ms: f64,
    ) -> bool {
        self.live.remove(&key);

        // NaN fails the comparison as well
        if !end_value.is_finite() || !(duration_ms >= 0.0) {
            log::trace!("dropping transition on {key:?}: end={end_value} duration={duration_ms}");
            return false;
        }
        let begin_value = match target.get(&key) {
            Some(v) if v.is_finite() => v,
            _ => {
                log::trace!("dropping transition on {key:?}: no readable start value");
                return false;
            }
        };

        let record = TransitionRecord {
            begin_value,
            end_value,
            easing,
            duration_ms,
            start_ms: now_ms,
        };
        let (value, done) = record.sample(now_ms);
        target.set(&key, value);
        if !done {
            self.live.insert(key, record);
        }
        true
    }

    /// Like [`animate`](Self::animate) with the easing given by name.
    /// An unknown name cancels the live transition on `key` and starts nothing.
    pub fn animate_named(
        &mut self,
        target: &mut dyn PropertyTarget<K>,
        key: K,
        end_value: f64,
        easing: &str,
        duration_ms: f64,
        now_ms: f64,
    ) -> bool {
        match Easing::from_name(easing) {
            Some(easing) => self.animate(target, key, end_value, easing, duration_ms, now_ms),
            None => {
                log::trace!("dropping transition on {key:?}: unknown easing {easing:?}");
                self.live.remove(&key);
                false
            }
        }
    }

    /// Advance every live transition to `now_ms`; finished ones are removed.
    pub fn step(&mut self, target: &mut dyn PropertyTarget<K>, now_ms: f64) {
        self.live.retain(|key, record| {
            let (value, done) = record.sample(now_ms);
            target.set(key, value);
            !done
        });
    }

    /// Stop the transition on `key` where it is. Returns whether one was live.
    #[inline]
    pub fn cancel(&mut self, key: &K) -> bool {
        self.live.remove(key).is_some()
    }

    #[inline]
    pub fn is_animating(&self, key: &K) -> bool {
        self.live.contains_key(key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.live.clear();
    }
}
