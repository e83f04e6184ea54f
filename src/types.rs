// src/types.rs
use std::f64::consts::PI;
use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::signal::StreamError;

/// Number of simulated leads. Every channel set, snapshot and parameter table has exactly
/// this many entries.
pub const CHANNEL_COUNT: usize = 12;

/// One simulated lead, numbered 1..=12.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ChannelId(u8);

impl ChannelId {
    pub const FIRST: ChannelId = ChannelId(1);
    pub const LAST: ChannelId = ChannelId(CHANNEL_COUNT as u8);

    pub fn new(lead: u8) -> Result<Self, StreamError> {
        if (1..=CHANNEL_COUNT as u8).contains(&lead) {
            Ok(Self(lead))
        } else {
            Err(StreamError::InvalidChannel(lead))
        }
    }

    /// Zero-based slot used for the fixed-size per-channel arrays.
    pub fn from_index(index: usize) -> Option<Self> {
        (index < CHANNEL_COUNT).then(|| Self(index as u8 + 1))
    }

    pub fn all() -> impl Iterator<Item = ChannelId> {
        (1..=CHANNEL_COUNT as u8).map(ChannelId)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    /// R-wave height multiplier: leads cycle through 1.0, 1.5, 2.0 by `id mod 3`.
    pub fn r_scale(self) -> f64 {
        1.0 + f64::from(self.0 % 3) * 0.5
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lead {}", self.0)
    }
}

/// Per-lead baseline constants, derived once from the channel id.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaveformParameters {
    pub frequency: f64,
    pub amplitude: f64,
    pub phase: f64,
}

impl WaveformParameters {
    pub fn for_channel(id: ChannelId) -> Self {
        let lead = f64::from(id.get());
        Self {
            frequency: 0.4 + 0.05 * lead,
            amplitude: 0.5 + (0.1 * lead) % 1.0,
            phase: lead * PI / 6.0,
        }
    }

    /// Baseline sinusoid at time-axis position `x`.
    pub fn baseline(&self, x: f64) -> f64 {
        (x * self.frequency + self.phase).sin() * self.amplitude
    }
}

/// Commands sent from the engine owner to the scheduler thread.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamCommand {
    Pause,
    Resume,
    SetPeriod(Duration),
    Stop,
}

/// How a stop request ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopOutcome {
    /// The scheduler thread exited and its state was reclaimed.
    Joined,
    /// The thread did not exit within the bounded wait and was detached.
    TimedOut,
    /// The thread panicked; its state is gone.
    Crashed,
    /// Nothing was running.
    NotRunning,
}
