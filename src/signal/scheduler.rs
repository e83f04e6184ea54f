use std::sync::Arc;
use std::time::Duration;
use log::trace;
use crate::signal::{ChannelSet, SnapshotPublisher, StreamError, TickUpdate, WaveformSynthesizer};
use crate::types::{ChannelId, CHANNEL_COUNT};
/// Outcome of one generate-commit-publish cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct TickReport {
    pub version: u64,
    /// Leads that received an injected spike this tick, with the offset inside the new samples.
    pub spikes: Vec<(ChannelId, usize)>,
}
/// Owns the synthesizer and the live channel set; every tick rolls all leads by the same
/// number of samples and publishes the result.
pub struct StreamScheduler {
    synth: WaveformSynthesizer,
    channels: ChannelSet,
    publisher: Arc<SnapshotPublisher>,
    samples_per_tick: usize,
    period: Duration,
}
impl StreamScheduler {
    /// Fills every lead and publishes the initial window as version 0.
    pub fn new(
        mut synth: WaveformSynthesizer,
        samples_per_tick: usize,
        period: Duration,
    ) -> Result<Self, StreamError> {
        let buffer_len = synth.settings().buffer_len;
        if samples_per_tick == 0 {
            return Err(StreamError::EmptyStep);
        }
        if samples_per_tick > buffer_len {
            return Err(StreamError::RollTooLarge {
                requested: samples_per_tick,
                capacity: buffer_len,
            });
        }
        let channels = ChannelSet::from_fills(synth.fill_all(), buffer_len)?;
        let publisher = Arc::new(SnapshotPublisher::new(&channels)?);
        Ok(Self {
            synth,
            channels,
            publisher,
            samples_per_tick,
            period,
        })
    }
    pub fn publisher(&self) -> Arc<SnapshotPublisher> {
        Arc::clone(&self.publisher)
    }
    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }
    pub fn samples_per_tick(&self) -> usize {
        self.samples_per_tick
    }
    pub fn period(&self) -> Duration {
        self.period
    }
    pub fn set_period(&mut self, period: Duration) {
        self.period = period;
    }
    pub fn tick(&mut self) -> Result<TickReport, StreamError> {
        let k = self.samples_per_tick;
        let mut fresh = Vec::with_capacity(CHANNEL_COUNT);
        let mut spikes = Vec::new();
        for id in ChannelId::all() {
            let step = self.synth.incremental_step(id, k)?;
            if let Some(at) = step.spike {
                spikes.push((id, at));
            }
            fresh.push(step.samples);
        }
        let update = TickUpdate::new(fresh)?;
        if update.samples_per_channel() != k {
            return Err(StreamError::SampleCountMismatch {
                channel: ChannelId::FIRST.get(),
                expected: k,
                actual: update.samples_per_channel(),
            });
        }
        let version = self.channels.commit(&update)?;
        self.publisher.publish(&self.channels)?;
        trace!("tick {version} published, {} spike(s)", spikes.len());
        Ok(TickReport { version, spikes })
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SynthSettings;
    fn scheduler(k: usize, seed: u64) -> StreamScheduler {
        let synth = WaveformSynthesizer::new(SynthSettings::default(), Some(seed)).unwrap();
        StreamScheduler::new(synth, k, Duration::from_millis(100)).unwrap()
    }
    #[test]
    fn new_publishes_initial_fill() {
        let s = scheduler(5, 42);
        let snapshot = s.publisher().read();
        assert_eq!(snapshot.version(), 0);
        assert_eq!(snapshot.buffer_len(), 500);
        assert_eq!(snapshot.iter().count(), 12);
    }
    #[test]
    fn tick_rolls_every_lead_and_publishes() {
        let mut s = scheduler(5, 42);
        let publisher = s.publisher();
        let before = publisher.read();
        let report = s.tick().unwrap();
        assert_eq!(report.version, 1);
        let after = publisher.read();
        assert_eq!(after.version(), 1);
        for ((id, old), (_, new)) in before.iter().zip(after.iter()) {
            assert_eq!(new.len(), 500);
            assert_eq!(&new[..495], &old[5..], "{id}");
            assert_eq!(new, s.channels().channel(id).to_vec().as_slice());
        }
        for (id, at) in report.spikes {
            assert!(at < 5, "{id}");
        }
    }
    #[test]
    fn rejects_step_larger_than_window() {
        let synth = WaveformSynthesizer::new(SynthSettings::default(), Some(1)).unwrap();
        assert!(matches!(
            StreamScheduler::new(synth, 501, Duration::from_millis(10)),
            Err(StreamError::RollTooLarge { .. })
        ));
    }
}
