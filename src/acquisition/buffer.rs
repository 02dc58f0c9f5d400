use std::collections::VecDeque;
use std::time::Instant;
use serde::Deserialize;
use crate::acquisition::{Channel, Reading};
/// One synchronized pair of channel values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    /// Seconds since the session started.
    pub elapsed: f64,
    pub channel_a: f64,
    pub channel_b: f64,
}
/// Paired samples handed to the sinks. `first_seq` numbers the first pair of
/// the batch within its session; later pairs follow contiguously.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleBatch {
    pub first_seq: u64,
    pub timestamps: Vec<f64>,
    pub channel_a: Vec<f64>,
    pub channel_b: Vec<f64>,
}
impl SampleBatch {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
    /// Sequence number one past the last pair.
    pub fn end_seq(&self) -> u64 {
        self.first_seq + self.len() as u64
    }
    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.timestamps
            .iter()
            .zip(&self.channel_a)
            .zip(&self.channel_b)
            .map(|((&elapsed, &channel_a), &channel_b)| Sample {
                elapsed,
                channel_a,
                channel_b,
            })
    }
    /// Folds a later batch into this one. Pairs that `newer` also carries are
    /// replaced, so overlapping history batches and disjoint drained batches
    /// both merge without duplicates.
    pub fn merge(&mut self, newer: SampleBatch) {
        if self.is_empty() || newer.first_seq <= self.first_seq {
            *self = newer;
            return;
        }
        let keep = ((newer.first_seq - self.first_seq) as usize).min(self.len());
        self.timestamps.truncate(keep);
        self.channel_a.truncate(keep);
        self.channel_b.truncate(keep);
        self.timestamps.extend(newer.timestamps);
        self.channel_a.extend(newer.channel_a);
        self.channel_b.extend(newer.channel_b);
    }
}
/// What a pairing event hands out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmitMode {
    /// Every batch repeats the whole retained history.
    #[default]
    History,
    /// Every batch carries only the pairs completed since the previous one,
    /// which then leave the buffer.
    Drain,
}
/// Per-channel queues that turn interleaved readings into paired samples.
pub struct PairingBuffer {
    channel_a: VecDeque<f64>,
    channel_b: VecDeque<f64>,
    timestamps: VecDeque<f64>,
    mode: EmitMode,
    history_limit: Option<usize>,
    first_seq: u64,
    started_at: Instant,
    last_elapsed: f64,
}
impl PairingBuffer {
    /// `history_limit` caps the number of complete pairs kept; the oldest are
    /// dropped first. `None` keeps everything for the whole session.
    pub fn new(mode: EmitMode, history_limit: Option<usize>) -> Self {
        Self {
            channel_a: VecDeque::new(),
            channel_b: VecDeque::new(),
            timestamps: VecDeque::new(),
            mode,
            history_limit,
            first_seq: 0,
            started_at: Instant::now(),
            last_elapsed: 0.0,
        }
    }
    /// Queue lengths as `(channel A, channel B, timestamps)`.
    pub fn pending(&self) -> (usize, usize, usize) {
        (
            self.channel_a.len(),
            self.channel_b.len(),
            self.timestamps.len(),
        )
    }
    pub fn record(&mut self, reading: Reading) -> Option<SampleBatch> {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        self.record_at(reading, elapsed)
    }
    /// Same as [`record`](Self::record) with an explicit clock reading.
    /// Channel B arrivals close a pair, so only they stamp time.
    pub fn record_at(&mut self, reading: Reading, elapsed: f64) -> Option<SampleBatch> {
        match reading.channel {
            Channel::A => self.channel_a.push_back(reading.value),
            Channel::B => {
                self.channel_b.push_back(reading.value);
                // Never step backwards, even if a caller's clock does.
                let stamp = elapsed.max(self.last_elapsed);
                self.last_elapsed = stamp;
                self.timestamps.push_back(stamp);
            }
        }
        self.enforce_limit();
        let paired = self.channel_a.len();
        if paired > 0 && paired == self.channel_b.len() {
            Some(self.emit())
        } else {
            None
        }
    }
    fn enforce_limit(&mut self) {
        let Some(limit) = self.history_limit else {
            return;
        };
        while self.channel_a.len().min(self.channel_b.len()) > limit {
            self.channel_a.pop_front();
            self.channel_b.pop_front();
            self.timestamps.pop_front();
            self.first_seq += 1;
        }
    }
    fn emit(&mut self) -> SampleBatch {
        let first_seq = self.first_seq;
        match self.mode {
            EmitMode::History => SampleBatch {
                first_seq,
                timestamps: self.timestamps.iter().copied().collect(),
                channel_a: self.channel_a.iter().copied().collect(),
                channel_b: self.channel_b.iter().copied().collect(),
            },
            EmitMode::Drain => {
                let batch = SampleBatch {
                    first_seq,
                    timestamps: self.timestamps.drain(..).collect(),
                    channel_a: self.channel_a.drain(..).collect(),
                    channel_b: self.channel_b.drain(..).collect(),
                };
                self.first_seq = batch.end_seq();
                batch
            }
        }
    }
}
