use std::io::Cursor;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use log::{info, warn};
use plotters::prelude::*;
use crate::acquisition::{Channel, PlotError, SampleBatch, TraceWindow};
/// Receiver of paired batches for display. Rendering problems stay inside
/// the sink; acquisition never sees them.
pub trait PlotSink {
    fn render(&mut self, batch: &SampleBatch);
    /// Called once when the session closes, for the final static render.
    fn finish(&mut self) {}
}
impl<P: PlotSink> PlotSink for Option<P> {
    fn render(&mut self, batch: &SampleBatch) {
        if let Some(sink) = self {
            sink.render(batch);
        }
    }
    fn finish(&mut self) {
        if let Some(sink) = self {
            sink.finish();
        }
    }
}
impl<A: PlotSink, B: PlotSink> PlotSink for (A, B) {
    fn render(&mut self, batch: &SampleBatch) {
        self.0.render(batch);
        self.1.render(batch);
    }
    fn finish(&mut self) {
        self.0.finish();
        self.1.finish();
    }
}
/// Rate-limits an inner sink to one render per `interval`. Batches that
/// arrive in between are merged and delivered with the next render.
pub struct PacedPlot<P: PlotSink> {
    inner: P,
    interval: Duration,
    last_render: Option<Instant>,
    pending: Option<SampleBatch>,
}
impl<P: PlotSink> PacedPlot<P> {
    pub fn new(inner: P, interval: Duration) -> Self {
        Self {
            inner,
            interval,
            last_render: None,
            pending: None,
        }
    }
    pub fn into_inner(self) -> P {
        self.inner
    }
    fn flush(&mut self) {
        if let Some(batch) = self.pending.take() {
            self.inner.render(&batch);
            self.last_render = Some(Instant::now());
        }
    }
}
impl<P: PlotSink> PlotSink for PacedPlot<P> {
    fn render(&mut self, batch: &SampleBatch) {
        match &mut self.pending {
            Some(pending) => pending.merge(batch.clone()),
            None => self.pending = Some(batch.clone()),
        }
        let due = self
            .last_render
            .map_or(true, |at| at.elapsed() >= self.interval);
        if due {
            self.flush();
        }
    }
    fn finish(&mut self) {
        self.flush();
        self.inner.finish();
    }
}
#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub palette: [RGBColor; 2],
}
impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 900,
            height: 400,
            background: RGBColor(10, 10, 10),
            palette: [RED, BLUE],
        }
    }
}
/// Keeps a rolling window and writes it as a PNG when the session closes.
pub struct PngPlotSink {
    path: PathBuf,
    labels: [String; 2],
    trace: TraceWindow,
    style: PlotStyle,
}
impl PngPlotSink {
    pub fn new(path: impl Into<PathBuf>, labels: [String; 2], window_secs: f64) -> Self {
        Self {
            path: path.into(),
            labels,
            trace: TraceWindow::new(window_secs),
            style: PlotStyle::default(),
        }
    }
    pub fn trace(&self) -> &TraceWindow {
        &self.trace
    }
    pub fn save(&self) -> Result<(), PlotError> {
        let png = render_voltage_png(&self.trace, &self.labels, &self.style)?;
        std::fs::write(&self.path, png).map_err(|source| PlotError::Save {
            path: self.path.clone(),
            source,
        })
    }
}
impl PlotSink for PngPlotSink {
    fn render(&mut self, batch: &SampleBatch) {
        self.trace.absorb(batch);
    }
    fn finish(&mut self) {
        match self.save() {
            Ok(()) => info!("Final plot written to {}", self.path.display()),
            Err(PlotError::Empty) => info!("No samples to plot"),
            Err(e) => warn!("Could not write final plot: {e}"),
        }
    }
}
pub fn render_voltage_png(
    trace: &TraceWindow,
    labels: &[String; 2],
    style: &PlotStyle,
) -> Result<Vec<u8>, PlotError> {
    // Only finite values shape the axes; an `inf` reading must not stretch them.
    let traces = [trace.points(Channel::A), trace.points(Channel::B)];
    let mut points = traces.iter().flatten();
    let Some(&[t0, v0]) = points.next() else {
        return Err(PlotError::Empty);
    };
    let (x_min, x_max, y_min, y_max) = points.fold(
        (t0, t0, v0, v0),
        |(x0, x1, y0, y1), &[t, v]| (x0.min(t), x1.max(t), y0.min(v), y1.max(v)),
    );
    let x_bounds = if x_max - x_min < f64::EPSILON {
        (x_min, x_min + 1.0)
    } else {
        (x_min, x_max)
    };
    let span = y_max - y_min;
    let pad = if span.is_finite() { (span * 0.1).max(0.1) } else { 0.0 };
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption("Voltage", ("sans-serif", 20).into_font().color(&WHITE))
            .set_label_area_size(LabelAreaPosition::Left, 45)
            .set_label_area_size(LabelAreaPosition::Bottom, 40)
            .build_cartesian_2d(x_bounds.0..x_bounds.1, (y_min - pad)..(y_max + pad))?;
        chart
            .configure_mesh()
            .x_desc("Time (s)")
            .y_desc("Voltage (V)")
            .light_line_style(&WHITE.mix(0.1))
            .draw()?;
        for (idx, points) in traces.iter().enumerate() {
            let color = style.palette[idx];
            let series = points.iter().map(|&[t, v]| (t, v));
            chart
                .draw_series(LineSeries::new(series, &color))?
                .label(format!("{} Voltage", labels[idx]))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
        }
        chart
            .configure_series_labels()
            .border_style(&WHITE.mix(0.2))
            .background_style(&style.background)
            .draw()?;
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}
fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, PlotError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| PlotError::Render("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{ChannelIdentifier, EmitMode, LineFormat, PairingBuffer, SampleParser};
    #[derive(Default)]
    struct Recorder {
        renders: Vec<SampleBatch>,
        finished: bool,
    }
    impl PlotSink for Recorder {
        fn render(&mut self, batch: &SampleBatch) {
            self.renders.push(batch.clone());
        }
        fn finish(&mut self) {
            self.finished = true;
        }
    }
    fn drained(first_seq: u64, value: f64) -> SampleBatch {
        SampleBatch {
            first_seq,
            timestamps: vec![value],
            channel_a: vec![value],
            channel_b: vec![value],
        }
    }
    #[test]
    fn zero_interval_renders_every_batch() {
        let mut paced = PacedPlot::new(Recorder::default(), Duration::ZERO);
        paced.render(&drained(0, 0.0));
        paced.render(&drained(1, 1.0));
        assert_eq!(paced.into_inner().renders.len(), 2);
    }
    #[test]
    fn throttled_batches_are_merged_and_flushed_on_finish() {
        let mut paced = PacedPlot::new(Recorder::default(), Duration::from_secs(3600));
        paced.render(&drained(0, 0.0));
        paced.render(&drained(1, 1.0));
        paced.render(&drained(2, 2.0));
        paced.finish();
        let recorder = paced.into_inner();
        assert!(recorder.finished);
        assert_eq!(recorder.renders.len(), 2);
        assert_eq!(recorder.renders[1].first_seq, 1);
        assert_eq!(recorder.renders[1].channel_a, vec![1.0, 2.0]);
    }
    #[test]
    fn combinators_fan_out() {
        let mut sinks = (Recorder::default(), Some(Recorder::default()));
        sinks.render(&drained(0, 0.0));
        sinks.finish();
        assert_eq!(sinks.0.renders.len(), 1);
        assert!(sinks.1.as_ref().map_or(false, |r| r.finished));
        let mut none: Option<Recorder> = None;
        none.render(&drained(0, 0.0));
    }
    #[test]
    fn empty_trace_is_not_rendered() {
        let trace = TraceWindow::new(10.0);
        let labels = ["A2".to_string(), "A3".to_string()];
        assert!(matches!(
            render_voltage_png(&trace, &labels, &PlotStyle::default()),
            Err(PlotError::Empty)
        ));
    }
    fn sink_fed_with(dir: &std::path::Path, lines: &[&str]) -> PngPlotSink {
        let parser = SampleParser::new(
            ChannelIdentifier::new("A2:"),
            ChannelIdentifier::new("A3:"),
            LineFormat::Single,
        );
        let mut buffer = PairingBuffer::new(EmitMode::History, None);
        let mut sink = PngPlotSink::new(dir.join("plot.png"), ["A2".into(), "A3".into()], 60.0);
        for (i, line) in lines.iter().enumerate() {
            for reading in parser.parse_line(line).unwrap() {
                if let Some(batch) = buffer.record_at(reading, i as f64) {
                    sink.render(&batch);
                }
            }
        }
        sink
    }
    #[test]
    fn final_render_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = sink_fed_with(dir.path(), &["A2:1.0", "A3:2.0", "A2:1.5", "A3:2.5"]);
        let png = render_voltage_png(sink.trace(), &["A2".into(), "A3".into()], &PlotStyle::default())
            .unwrap();
        assert!(png.starts_with(b"\x89PNG\r\n\x1a\n"));
        sink.finish();
        let written = std::fs::read(dir.path().join("plot.png")).unwrap();
        assert!(written.starts_with(b"\x89PNG"));
    }
    #[test]
    fn infinite_reading_still_renders() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = sink_fed_with(dir.path(), &["A2:inf", "A3:1.0", "A2:2.0", "A3:-inf"]);
        assert_eq!(sink.trace().len(), 2);
        sink.finish();
        assert!(dir.path().join("plot.png").exists());
    }
    #[test]
    fn all_nan_trace_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = sink_fed_with(dir.path(), &["A2:NaN", "A3:NaN"]);
        assert_eq!(sink.trace().len(), 1);
        assert!(matches!(sink.save(), Err(PlotError::Empty)));
        sink.finish();
        assert!(!dir.path().join("plot.png").exists());
    }
    #[test]
    fn png_sink_collects_unique_samples() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = PngPlotSink::new(
            dir.path().join("plot.png"),
            ["A2".into(), "A3".into()],
            60.0,
        );
        let history = SampleBatch {
            first_seq: 0,
            timestamps: vec![0.0, 1.0],
            channel_a: vec![1.0, 2.0],
            channel_b: vec![3.0, 4.0],
        };
        sink.render(&history);
        sink.render(&history);
        assert_eq!(sink.trace().len(), 2);
    }
}
