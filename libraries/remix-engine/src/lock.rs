//! Speed/pitch lock coordination
//!
//! Tracks the two rate controls and whether they move together. While
//! locked, a change to either control is copied onto the other; entering the
//! locked state copies the most recently touched control onto the other.

use crate::error::{EngineError, Result};
use crate::time_scale::{sanitize_ratio, semitone_offset};
use serde::{Deserialize, Serialize};

/// Ratio both controls return to on reset
pub const DEFAULT_RATIO: f64 = 1.0;

/// One of the two rate controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateControl {
    /// Playback speed (time compression/expansion)
    Speed,
    /// Perceived pitch
    Pitch,
}

/// Lock mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockState {
    /// Speed and pitch are forced equal
    Locked,
    /// Speed and pitch vary independently
    Unlocked,
}

impl LockState {
    /// Check if locked
    pub fn is_locked(self) -> bool {
        self == LockState::Locked
    }

    fn from_bool(locked: bool) -> Self {
        if locked {
            LockState::Locked
        } else {
            LockState::Unlocked
        }
    }
}

/// Snapshot of both rate controls
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateState {
    /// Playback speed multiplier (> 0, finite)
    pub speed: f64,

    /// Pitch multiplier (> 0, finite)
    pub pitch: f64,

    /// Whether the controls are locked together
    pub locked: bool,

    /// Control the user changed most recently
    pub last_touched: RateControl,
}

impl RateState {
    /// Semitone offset the pitch node needs for this state
    pub fn semitones(&self) -> f64 {
        semitone_offset(self.speed, self.pitch)
    }

    /// Current lock mode
    pub fn lock_state(&self) -> LockState {
        LockState::from_bool(self.locked)
    }

    /// Value of one control
    pub fn value(&self, control: RateControl) -> f64 {
        match control {
            RateControl::Speed => self.speed,
            RateControl::Pitch => self.pitch,
        }
    }
}

impl Default for RateState {
    fn default() -> Self {
        Self {
            speed: DEFAULT_RATIO,
            pitch: DEFAULT_RATIO,
            locked: true,
            last_touched: RateControl::Speed,
        }
    }
}

/// Lock coordinator state machine
#[derive(Debug, Clone, Default)]
pub struct LockCoordinator {
    state: RateState,
}

impl LockCoordinator {
    /// Create a coordinator with the given initial ratios and lock mode
    ///
    /// If `locked`, pitch is forced to the speed value.
    pub fn new(speed: f64, pitch: f64, locked: bool) -> Self {
        let speed = sanitize_ratio(speed);
        let pitch = if locked { speed } else { sanitize_ratio(pitch) };
        Self {
            state: RateState {
                speed,
                pitch,
                locked,
                last_touched: RateControl::Speed,
            },
        }
    }

    /// Current state snapshot
    pub fn state(&self) -> RateState {
        self.state
    }

    /// Current lock mode
    pub fn lock_state(&self) -> LockState {
        self.state.lock_state()
    }

    /// Set the speed control
    pub fn set_speed(&mut self, value: f64) -> Result<RateState> {
        self.set(RateControl::Speed, value)
    }

    /// Set the pitch control
    pub fn set_pitch(&mut self, value: f64) -> Result<RateState> {
        self.set(RateControl::Pitch, value)
    }

    /// Set one control, propagating to the other while locked
    ///
    /// NaN and infinite input is rejected; non-positive input is clamped to
    /// the smallest representable ratio.
    pub fn set(&mut self, control: RateControl, value: f64) -> Result<RateState> {
        if !value.is_finite() {
            return Err(EngineError::InvalidRatio(value));
        }
        let value = sanitize_ratio(value);

        match control {
            RateControl::Speed => self.state.speed = value,
            RateControl::Pitch => self.state.pitch = value,
        }
        if self.state.locked {
            self.state.speed = value;
            self.state.pitch = value;
        }
        self.state.last_touched = control;

        Ok(self.state)
    }

    /// Reset one control to 1.0 (propagates while locked)
    pub fn reset(&mut self, control: RateControl) -> RateState {
        match control {
            RateControl::Speed => self.state.speed = DEFAULT_RATIO,
            RateControl::Pitch => self.state.pitch = DEFAULT_RATIO,
        }
        if self.state.locked {
            self.state.speed = DEFAULT_RATIO;
            self.state.pitch = DEFAULT_RATIO;
        }
        self.state.last_touched = control;
        self.state
    }

    /// Flip the lock mode
    pub fn toggle(&mut self) -> RateState {
        self.set_locked(!self.state.locked)
    }

    /// Set the lock mode explicitly
    ///
    /// Entering `Locked` copies the last-touched control onto the other one.
    /// Setting the mode it is already in changes nothing.
    pub fn set_locked(&mut self, locked: bool) -> RateState {
        if self.state.locked == locked {
            return self.state;
        }
        self.state.locked = locked;

        if locked {
            let authoritative = self.state.value(self.state.last_touched);
            self.state.speed = authoritative;
            self.state.pitch = authoritative;
        }

        self.state
    }
}
