//! Synthetic ECG lead generator.
//!
//! Each lead is a slow baseline sinusoid shaped by [`WaveformParameters`]. The initial window
//! additionally carries a P-QRS-T complex every [`BEAT_PITCH`] samples; streaming steps carry
//! only the baseline plus an occasional R-like spike. All randomness comes from a per-lead
//! seeded RNG, so a fixed seed reproduces every sample.
use std::f64::consts::PI;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use crate::signal::StreamError;
use crate::types::{ChannelId, WaveformParameters};
/// Samples between consecutive heartbeat anchors.
pub const BEAT_PITCH: usize = 50;
/// Anchor (Q position) of the first complex in the window.
pub const FIRST_BEAT: usize = 15;
/// Time-axis span covered by one full window.
pub const WINDOW_SPAN: f64 = 10.0 * PI;
const P_WIDTH: usize = 10;
const P_HEIGHT: f64 = 0.2;
const Q_DEPTH: f64 = 0.2;
const R_PEAK: f64 = 2.0;
const S_START: f64 = 0.5;
const S_SCALE: f64 = 0.3;
const T_OFFSET: usize = 8;
const T_WIDTH: usize = 7;
const T_HEIGHT: f64 = 0.3;
/// Tuning shared by every lead.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SynthSettings {
    pub buffer_len: usize,
    pub spike_probability: f64,
    pub spike_gain: f64,
    pub fill_noise_std: f64,
    pub step_noise_std: f64,
}
impl Default for SynthSettings {
    fn default() -> Self {
        Self {
            buffer_len: 500,
            spike_probability: 0.2,
            spike_gain: 1.2,
            fill_noise_std: 0.03,
            step_noise_std: 0.05,
        }
    }
}
/// New trailing samples for one lead, plus where a spike was injected (if any).
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelStep {
    pub samples: Vec<f64>,
    pub spike: Option<usize>,
}
struct LeadGenerator {
    id: ChannelId,
    params: WaveformParameters,
    rng: StdRng,
    // Next sample index on the continuous time axis.
    cursor: u64,
}
pub struct WaveformSynthesizer {
    leads: Vec<LeadGenerator>,
    settings: SynthSettings,
    dx: f64,
    fill_noise: Normal<f64>,
    step_noise: Normal<f64>,
}
impl WaveformSynthesizer {
    /// `seed = None` draws a fresh base seed; it is logged so the run can be replayed.
    pub fn new(settings: SynthSettings, seed: Option<u64>) -> Result<Self, StreamError> {
        if settings.buffer_len == 0 {
            return Err(StreamError::Config("buffer length must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&settings.spike_probability) {
            return Err(StreamError::Config(format!(
                "spike probability must be within [0, 1], got {}",
                settings.spike_probability
            )));
        }
        if !settings.spike_gain.is_finite() || settings.spike_gain < 0.0 {
            return Err(StreamError::Config(format!(
                "spike gain must be finite and non-negative, got {}",
                settings.spike_gain
            )));
        }
        let fill_noise = noise(settings.fill_noise_std)?;
        let step_noise = noise(settings.step_noise_std)?;
        let base_seed = seed.unwrap_or_else(|| {
            let drawn = rand::thread_rng().gen();
            info!("no seed configured; synthesizer seeded with {drawn}");
            drawn
        });
        let leads = ChannelId::all()
            .map(|id| LeadGenerator {
                id,
                params: WaveformParameters::for_channel(id),
                rng: StdRng::seed_from_u64(lead_seed(base_seed, id)),
                cursor: 0,
            })
            .collect();
        let dx = if settings.buffer_len > 1 {
            WINDOW_SPAN / (settings.buffer_len - 1) as f64
        } else {
            0.0
        };
        Ok(Self {
            leads,
            settings,
            dx,
            fill_noise,
            step_noise,
        })
    }
    pub fn settings(&self) -> &SynthSettings {
        &self.settings
    }
    pub fn parameters(&self, id: ChannelId) -> WaveformParameters {
        self.leads[id.index()].params
    }
    /// Next time-axis sample index for the lead.
    pub fn cursor(&self, id: ChannelId) -> u64 {
        self.leads[id.index()].cursor
    }
    /// Full window for one lead: baseline, heartbeat complexes and fill noise.
    /// Restarts the lead's time axis at zero.
    pub fn initial_fill(&mut self, id: ChannelId) -> Vec<f64> {
        let len = self.settings.buffer_len;
        let overlay = morphology(len, id);
        let lead = &mut self.leads[id.index()];
        let samples = overlay
            .iter()
            .enumerate()
            .map(|(i, beat)| {
                lead.params.baseline(i as f64 * self.dx)
                    + beat
                    + self.fill_noise.sample(&mut lead.rng)
            })
            .collect();
        lead.cursor = len as u64;
        debug!("{} filled with {len} samples", lead.id);
        samples
    }
    /// Initial windows for all leads, in channel order.
    pub fn fill_all(&mut self) -> Vec<Vec<f64>> {
        ChannelId::all().map(|id| self.initial_fill(id)).collect()
    }
    /// `k` samples continuing the lead's baseline on the same time axis as the initial fill.
    pub fn incremental_step(
        &mut self,
        id: ChannelId,
        k: usize,
    ) -> Result<ChannelStep, StreamError> {
        if k == 0 {
            return Err(StreamError::EmptyStep);
        }
        if k > self.settings.buffer_len {
            return Err(StreamError::RollTooLarge {
                requested: k,
                capacity: self.settings.buffer_len,
            });
        }
        let lead = &mut self.leads[id.index()];
        let start = lead.cursor;
        let mut samples: Vec<f64> = (0..k as u64)
            .map(|j| lead.params.baseline((start + j) as f64 * self.dx))
            .collect();
        let spike = if lead.rng.gen_bool(self.settings.spike_probability) {
            let at = lead.rng.gen_range(0..k);
            samples[at] += self.settings.spike_gain * id.r_scale();
            Some(at)
        } else {
            None
        };
        for sample in &mut samples {
            *sample += self.step_noise.sample(&mut lead.rng);
        }
        lead.cursor = start + k as u64;
        Ok(ChannelStep { samples, spike })
    }
}
fn noise(std_dev: f64) -> Result<Normal<f64>, StreamError> {
    if !std_dev.is_finite() || std_dev < 0.0 {
        return Err(StreamError::Config(format!(
            "noise std must be finite and non-negative, got {std_dev}"
        )));
    }
    Normal::new(0.0, std_dev)
        .map_err(|e| StreamError::Config(format!("noise std {std_dev} rejected: {e}")))
}
fn lead_seed(base: u64, id: ChannelId) -> u64 {
    base.rotate_left(8) ^ u64::from(id.get())
}
/// Heartbeat overlay for a window of `len` samples. Depends only on the index and the lead.
pub fn morphology(len: usize, id: ChannelId) -> Vec<f64> {
    let mut overlay = vec![0.0; len];
    let r_scale = id.r_scale();
    for anchor in (FIRST_BEAT..len).step_by(BEAT_PITCH) {
        if anchor >= P_WIDTH {
            for j in 0..P_WIDTH {
                overlay[anchor - P_WIDTH + j] += half_sine(j, P_WIDTH) * P_HEIGHT;
            }
        }
        if anchor + 3 < len {
            overlay[anchor] -= Q_DEPTH;
            for j in 0..2 {
                overlay[anchor + 1 + j] += linspace_at(0.0, R_PEAK, 2, j) * r_scale;
            }
        }
        if anchor + 5 < len {
            for j in 0..2 {
                overlay[anchor + 3 + j] -= linspace_at(S_START, 0.0, 2, j) * S_SCALE;
            }
        }
        if anchor + T_OFFSET + T_WIDTH < len {
            for j in 0..T_WIDTH {
                overlay[anchor + T_OFFSET + j] += half_sine(j, T_WIDTH) * T_HEIGHT;
            }
        }
    }
    overlay
}
fn linspace_at(start: f64, end: f64, count: usize, i: usize) -> f64 {
    if count < 2 {
        return start;
    }
    start + (end - start) * i as f64 / (count - 1) as f64
}
fn half_sine(i: usize, width: usize) -> f64 {
    linspace_at(0.0, PI, width, i).sin()
}
/// Upper bound on |sample| for a lead, ignoring noise: baseline amplitude plus the tallest
/// overlay (R wave or injected spike, whichever is larger).
pub fn envelope(id: ChannelId, spike_gain: f64) -> f64 {
    let params = WaveformParameters::for_channel(id);
    params.amplitude + (R_PEAK * id.r_scale()).max(spike_gain * id.r_scale())
}
