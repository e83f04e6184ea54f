use std::collections::VecDeque;
use crate::signal::StreamError;
use crate::types::{ChannelId, CHANNEL_COUNT};
/// Fixed-length rolling window for one lead. Index 0 is the oldest sample.
#[derive(Clone, Debug)]
pub struct ChannelBuffer {
    samples: VecDeque<f64>,
    capacity: usize,
}
impl ChannelBuffer {
    /// The window length is taken from the initial fill and never changes afterwards.
    pub fn from_samples(initial: Vec<f64>) -> Self {
        let capacity = initial.len();
        Self {
            samples: VecDeque::from(initial),
            capacity,
        }
    }
    pub fn len(&self) -> usize {
        self.samples.len()
    }
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
    /// Drop the oldest `new_samples.len()` entries and append the new ones at the tail.
    pub fn roll_append(&mut self, new_samples: &[f64]) -> Result<(), StreamError> {
        if new_samples.len() > self.capacity {
            return Err(StreamError::RollTooLarge {
                requested: new_samples.len(),
                capacity: self.capacity,
            });
        }
        self.samples.drain(..new_samples.len());
        self.samples.extend(new_samples.iter().copied());
        Ok(())
    }
    pub fn to_vec(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }
    /// The newest `count` samples, oldest first.
    pub fn newest(&self, count: usize) -> Vec<f64> {
        let skip = self.samples.len().saturating_sub(count);
        self.samples.iter().skip(skip).copied().collect()
    }
}
/// One tick's worth of generator output: the same number of new samples for every lead.
#[derive(Clone, Debug)]
pub struct TickUpdate {
    samples: [Vec<f64>; CHANNEL_COUNT],
    per_channel: usize,
}
impl TickUpdate {
    pub fn new(samples: Vec<Vec<f64>>) -> Result<Self, StreamError> {
        let samples: [Vec<f64>; CHANNEL_COUNT] = samples
            .try_into()
            .map_err(|rejected: Vec<Vec<f64>>| StreamError::ChannelMismatch {
                expected: CHANNEL_COUNT,
                actual: rejected.len(),
            })?;
        let per_channel = samples[0].len();
        if per_channel == 0 {
            return Err(StreamError::EmptyStep);
        }
        for (idx, channel) in samples.iter().enumerate() {
            if channel.len() != per_channel {
                return Err(StreamError::SampleCountMismatch {
                    channel: idx as u8 + 1,
                    expected: per_channel,
                    actual: channel.len(),
                });
            }
        }
        Ok(Self {
            samples,
            per_channel,
        })
    }
    pub fn samples_per_channel(&self) -> usize {
        self.per_channel
    }
}
/// All twelve lead buffers plus the number of ticks committed into them.
#[derive(Clone, Debug)]
pub struct ChannelSet {
    buffers: [ChannelBuffer; CHANNEL_COUNT],
    buffer_len: usize,
    tick: u64,
}
impl ChannelSet {
    pub fn from_fills(fills: Vec<Vec<f64>>, buffer_len: usize) -> Result<Self, StreamError> {
        if fills.len() != CHANNEL_COUNT {
            return Err(StreamError::ChannelMismatch {
                expected: CHANNEL_COUNT,
                actual: fills.len(),
            });
        }
        for (idx, fill) in fills.iter().enumerate() {
            if fill.len() != buffer_len {
                return Err(StreamError::LengthDrift {
                    channel: idx as u8 + 1,
                    expected: buffer_len,
                    actual: fill.len(),
                });
            }
        }
        let buffers: Vec<ChannelBuffer> = fills
            .into_iter()
            .map(ChannelBuffer::from_samples)
            .collect();
        let buffers: [ChannelBuffer; CHANNEL_COUNT] = buffers
            .try_into()
            .map_err(|rejected: Vec<ChannelBuffer>| StreamError::ChannelMismatch {
                expected: CHANNEL_COUNT,
                actual: rejected.len(),
            })?;
        Ok(Self {
            buffers,
            buffer_len,
            tick: 0,
        })
    }
    /// Roll every lead by the update and bump the tick counter. The update is checked in full
    /// before any buffer is touched, so a rejected update leaves the set unchanged.
    pub fn commit(&mut self, update: &TickUpdate) -> Result<u64, StreamError> {
        let k = update.samples_per_channel();
        if k > self.buffer_len {
            return Err(StreamError::RollTooLarge {
                requested: k,
                capacity: self.buffer_len,
            });
        }
        for (buffer, new_samples) in self.buffers.iter_mut().zip(update.samples.iter()) {
            buffer.roll_append(new_samples)?;
        }
        self.tick += 1;
        Ok(self.tick)
    }
    pub fn tick(&self) -> u64 {
        self.tick
    }
    pub fn buffer_len(&self) -> usize {
        self.buffer_len
    }
    pub fn channel(&self, id: ChannelId) -> &ChannelBuffer {
        &self.buffers[id.index()]
    }
    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, &ChannelBuffer)> {
        ChannelId::all().zip(self.buffers.iter())
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    fn ramp_fills(len: usize) -> Vec<Vec<f64>> {
        (0..CHANNEL_COUNT)
            .map(|ch| (0..len).map(|i| (ch * 1000 + i) as f64).collect())
            .collect()
    }
    fn constant_update(k: usize, value: f64) -> TickUpdate {
        TickUpdate::new(vec![vec![value; k]; CHANNEL_COUNT]).unwrap()
    }
    #[test]
    fn roll_append_keeps_length_and_order() {
        let mut buffer = ChannelBuffer::from_samples((0..10).map(f64::from).collect());
        let before = buffer.to_vec();
        buffer.roll_append(&[100.0, 101.0, 102.0]).unwrap();
        let after = buffer.to_vec();
        assert_eq!(after.len(), 10);
        assert_eq!(&after[..7], &before[3..]);
        assert_eq!(&after[7..], &[100.0, 101.0, 102.0]);
        assert_eq!(buffer.newest(2), vec![101.0, 102.0]);
    }
    #[test]
    fn roll_append_rejects_oversized_input_without_mutation() {
        let mut buffer = ChannelBuffer::from_samples(vec![1.0; 4]);
        let err = buffer.roll_append(&[0.0; 5]).unwrap_err();
        assert!(matches!(
            err,
            StreamError::RollTooLarge {
                requested: 5,
                capacity: 4
            }
        ));
        assert_eq!(buffer.to_vec(), vec![1.0; 4]);
    }
    #[test]
    fn full_width_roll_replaces_everything() {
        let mut buffer = ChannelBuffer::from_samples(vec![1.0; 4]);
        buffer.roll_append(&[2.0; 4]).unwrap();
        assert_eq!(buffer.to_vec(), vec![2.0; 4]);
    }
    #[test]
    fn tick_update_requires_twelve_equal_channels() {
        assert!(matches!(
            TickUpdate::new(vec![vec![0.0; 2]; 11]),
            Err(StreamError::ChannelMismatch {
                expected: 12,
                actual: 11
            })
        ));
        let mut uneven = vec![vec![0.0; 2]; CHANNEL_COUNT];
        uneven[6] = vec![0.0; 3];
        assert!(matches!(
            TickUpdate::new(uneven),
            Err(StreamError::SampleCountMismatch { channel: 7, .. })
        ));
        assert!(matches!(
            TickUpdate::new(vec![Vec::new(); CHANNEL_COUNT]),
            Err(StreamError::EmptyStep)
        ));
    }
    #[test]
    fn commit_advances_all_channels_together() {
        let mut set = ChannelSet::from_fills(ramp_fills(20), 20).unwrap();
        let previous: Vec<Vec<f64>> = set.iter().map(|(_, b)| b.to_vec()).collect();
        let tick = set.commit(&constant_update(5, -1.0)).unwrap();
        assert_eq!(tick, 1);
        assert_eq!(set.tick(), 1);
        for ((_, buffer), old) in set.iter().zip(&previous) {
            let now = buffer.to_vec();
            assert_eq!(now.len(), 20);
            assert_eq!(&now[..15], &old[5..]);
            assert_eq!(&now[15..], &[-1.0; 5]);
        }
    }
    #[test]
    fn oversized_commit_leaves_set_untouched() {
        let mut set = ChannelSet::from_fills(ramp_fills(4), 4).unwrap();
        let before: Vec<Vec<f64>> = set.iter().map(|(_, b)| b.to_vec()).collect();
        assert!(set.commit(&constant_update(5, 0.0)).is_err());
        let after: Vec<Vec<f64>> = set.iter().map(|(_, b)| b.to_vec()).collect();
        assert_eq!(before, after);
        assert_eq!(set.tick(), 0);
    }
    #[test]
    fn from_fills_checks_shape() {
        assert!(matches!(
            ChannelSet::from_fills(ramp_fills(8), 9),
            Err(StreamError::LengthDrift { channel: 1, .. })
        ));
        assert!(ChannelSet::from_fills(vec![vec![0.0; 8]; 3], 8).is_err());
    }
}
