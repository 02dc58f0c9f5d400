//! Software stand-in for the two-channel sensor board.
//!
//! The board samples two 12-bit ADC pins behind a 10k/1k voltage divider,
//! smooths each with a first-order low-pass filter, and prints both voltages
//! with `%f` once per period.
use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::acquisition::{ChannelIdentifier, LineFormat, LineRead, LineSource, TransportError};
/// ADC reference voltage.
pub const VREF: f64 = 3.3;
/// Full-scale count of the 12-bit ADC.
pub const ADC_LEVEL_RESOLUTION: f64 = 4095.0;
/// Divider resistors (kΩ).
pub const R1: f64 = 10.0;
pub const R2: f64 = 1.0;
pub const VOLTAGE_DIVIDER_RATIO: f64 = (R1 + R2) / R2;
/// Low-pass smoothing factor.
pub const ALPHA: f64 = 0.5;
pub fn adc_to_voltage(adc_value: u16, ratio: f64) -> f64 {
    adc_value as f64 * (VREF / ADC_LEVEL_RESOLUTION) * ratio
}
/// First-order IIR filter; the first value passes through unfiltered.
#[derive(Clone, Debug)]
pub struct LowPass {
    alpha: f64,
    state: Option<f64>,
}
impl LowPass {
    pub fn new(alpha: f64) -> Self {
        Self { alpha, state: None }
    }
    pub fn filter(&mut self, value: f64) -> f64 {
        let next = match self.state {
            Some(prev) => self.alpha * value + (1.0 - self.alpha) * prev,
            None => value,
        };
        self.state = Some(next);
        next
    }
}
pub struct SimulatedSensor {
    identifiers: [String; 2],
    format: LineFormat,
    period: Duration,
    poll: Duration,
    next_due: Instant,
    rng: StdRng,
    levels: [f64; 2],
    filters: [LowPass; 2],
    queue: VecDeque<String>,
}
impl SimulatedSensor {
    /// `poll` bounds how long one `next_line` call may sleep, so callers keep
    /// seeing [`LineRead::Idle`] between samples.
    pub fn new(
        first: &ChannelIdentifier,
        second: &ChannelIdentifier,
        format: LineFormat,
        period: Duration,
        poll: Duration,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            identifiers: [first.as_str().to_string(), second.as_str().to_string()],
            format,
            period,
            poll,
            next_due: Instant::now(),
            rng,
            levels: [1200.0, 2400.0],
            filters: [LowPass::new(ALPHA), LowPass::new(ALPHA)],
            queue: VecDeque::new(),
        }
    }
    fn sample(&mut self) -> [f64; 2] {
        let mut volts = [0.0; 2];
        for (idx, level) in self.levels.iter_mut().enumerate() {
            *level = (*level + self.rng.gen_range(-40.0..40.0)).clamp(0.0, ADC_LEVEL_RESOLUTION);
            let raw = adc_to_voltage(level.round() as u16, VOLTAGE_DIVIDER_RATIO);
            volts[idx] = self.filters[idx].filter(raw);
        }
        volts
    }
    fn print(&mut self) {
        let volts = self.sample();
        let fields: Vec<String> = self
            .identifiers
            .iter()
            .zip(volts)
            .map(|(id, v)| format_field(id, v))
            .collect();
        match self.format {
            LineFormat::Compound => self.queue.push_back(fields.join(" ")),
            LineFormat::Single => self.queue.extend(fields),
        }
    }
}
fn format_field(identifier: &str, value: f64) -> String {
    if identifier.ends_with(':') {
        format!("{identifier}{value:.6}")
    } else {
        format!("{identifier}:{value:.6}")
    }
}
impl LineSource for SimulatedSensor {
    fn next_line(&mut self) -> Result<LineRead, TransportError> {
        if let Some(line) = self.queue.pop_front() {
            return Ok(LineRead::Line(line));
        }
        let now = Instant::now();
        if now >= self.next_due {
            // After a stall, resume the schedule from now instead of bursting.
            self.next_due = self.next_due.max(now) + self.period;
            self.print();
            return Ok(self
                .queue
                .pop_front()
                .map_or(LineRead::Idle, LineRead::Line));
        }
        thread::sleep((self.next_due - now).min(self.poll));
        Ok(LineRead::Idle)
    }
}
