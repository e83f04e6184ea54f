use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use serde::Serialize;
use crate::signal::{ChannelSet, StreamError};
use crate::types::ChannelId;
/// Samples of one lead inside a snapshot, oldest first.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LeadSamples {
    pub lead: ChannelId,
    pub samples: Vec<f64>,
}
/// Immutable copy of every lead at one committed tick.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    version: u64,
    buffer_len: usize,
    channels: Vec<LeadSamples>,
}
impl Snapshot {
    /// Deep-copies the set. Every lead must still hold exactly `buffer_len` samples.
    pub fn capture(set: &ChannelSet) -> Result<Self, StreamError> {
        let buffer_len = set.buffer_len();
        let mut channels = Vec::with_capacity(crate::types::CHANNEL_COUNT);
        for (lead, buffer) in set.iter() {
            if buffer.len() != buffer_len {
                return Err(StreamError::LengthDrift {
                    channel: lead.get(),
                    expected: buffer_len,
                    actual: buffer.len(),
                });
            }
            channels.push(LeadSamples {
                lead,
                samples: buffer.to_vec(),
            });
        }
        Ok(Self {
            version: set.tick(),
            buffer_len,
            channels,
        })
    }
    pub fn version(&self) -> u64 {
        self.version
    }
    pub fn buffer_len(&self) -> usize {
        self.buffer_len
    }
    pub fn channel(&self, id: ChannelId) -> &[f64] {
        &self.channels[id.index()].samples
    }
    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, &[f64])> {
        self.channels
            .iter()
            .map(|c| (c.lead, c.samples.as_slice()))
    }
    pub fn summary(&self, id: ChannelId) -> ChannelSummary {
        ChannelSummary::of(self.channel(id))
    }
}
/// Range and energy of one lead's window.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ChannelSummary {
    pub min: f64,
    pub max: f64,
    pub rms: f64,
}
impl ChannelSummary {
    pub fn of(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self {
                min: 0.0,
                max: 0.0,
                rms: 0.0,
            };
        }
        let mut min = f64::MAX;
        let mut max = f64::MIN;
        let mut sum_sq = 0.0;
        for &s in samples {
            min = min.min(s);
            max = max.max(s);
            sum_sq += s * s;
        }
        Self {
            min,
            max,
            rms: (sum_sq / samples.len() as f64).sqrt(),
        }
    }
}
/// Single-slot mailbox holding the newest snapshot.
///
/// The producer builds each snapshot before taking the lock, so the critical section is a
/// pointer swap; readers clone the `Arc` and never hold the lock while rendering.
pub struct SnapshotPublisher {
    latest: Mutex<Arc<Snapshot>>,
    fresh: Condvar,
}
impl SnapshotPublisher {
    /// Starts the mailbox with the set's current state as the first snapshot.
    pub fn new(initial: &ChannelSet) -> Result<Self, StreamError> {
        Ok(Self {
            latest: Mutex::new(Arc::new(Snapshot::capture(initial)?)),
            fresh: Condvar::new(),
        })
    }
    pub fn publish(&self, set: &ChannelSet) -> Result<Arc<Snapshot>, StreamError> {
        let snapshot = Arc::new(Snapshot::capture(set)?);
        {
            let mut latest = self.lock();
            if snapshot.version <= latest.version {
                return Err(StreamError::StaleSnapshot {
                    current: latest.version,
                    offered: snapshot.version,
                });
            }
            *latest = Arc::clone(&snapshot);
        }
        self.fresh.notify_all();
        Ok(snapshot)
    }
    /// Newest published snapshot. Calling again before the next tick returns the same one.
    pub fn read(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.lock())
    }
    pub fn version(&self) -> u64 {
        self.lock().version
    }
    /// Blocks until a snapshot newer than `after` is published, or the timeout passes.
    pub fn wait_newer(&self, after: u64, timeout: Duration) -> Option<Arc<Snapshot>> {
        let guard = self.lock();
        let (guard, _) = self
            .fresh
            .wait_timeout_while(guard, timeout, |latest| latest.version <= after)
            .unwrap_or_else(PoisonError::into_inner);
        (guard.version > after).then(|| Arc::clone(&*guard))
    }
    fn lock(&self) -> MutexGuard<'_, Arc<Snapshot>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
