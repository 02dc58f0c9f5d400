use std::collections::VecDeque;
use crate::acquisition::{Channel, Sample, SampleBatch};
/// Rolling time window of plotted samples.
///
/// Batches may repeat pairs already seen (history emission); sequence
/// numbers make absorbing them idempotent.
pub struct TraceWindow {
    samples: VecDeque<Sample>,
    window_secs: f64,
    next_seq: u64,
}
impl TraceWindow {
    pub fn new(window_secs: f64) -> Self {
        Self {
            samples: VecDeque::new(),
            window_secs: window_secs.max(0.1),
            next_seq: 0,
        }
    }
    /// Appends the pairs of `batch` not seen before and returns how many.
    pub fn absorb(&mut self, batch: &SampleBatch) -> usize {
        let skip = self.next_seq.saturating_sub(batch.first_seq) as usize;
        let before = self.samples.len();
        for sample in batch.samples().skip(skip) {
            self.samples.push_back(sample);
        }
        self.next_seq = self.next_seq.max(batch.end_seq());
        let added = self.samples.len() - before;
        if let Some(newest) = self.samples.back().map(|s| s.elapsed) {
            self.prune(newest);
        }
        added
    }
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }
    pub fn len(&self) -> usize {
        self.samples.len()
    }
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
    /// Forgets the visible samples but keeps deduplication state.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
    /// `[elapsed, value]` pairs of one channel. Non-finite readings are left
    /// out, so a stray `inf` or `NaN` leaves a gap instead of wrecking the axes.
    pub fn points(&self, channel: Channel) -> Vec<[f64; 2]> {
        self.samples
            .iter()
            .map(|s| match channel {
                Channel::A => [s.elapsed, s.channel_a],
                Channel::B => [s.elapsed, s.channel_b],
            })
            .filter(|[_, v]| v.is_finite())
            .collect()
    }
    fn prune(&mut self, newest: f64) {
        let threshold = newest - self.window_secs;
        while let Some(front) = self.samples.front() {
            if front.elapsed < threshold {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }
}
