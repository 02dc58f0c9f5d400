use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use log::{debug, error, info, warn};
use crate::acquisition::{
    ChannelIdentifier, EmitMode, LineFormat, LineRead, LineSource, PairingBuffer, PlotSink,
    SampleBatch, SampleParser, SessionError, TransportError,
};
use crate::recorder::{write_snapshot, CsvRecorder, Persistence};
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Opening,
    Streaming,
    Closed,
    Failed,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    Cancelled,
    EndOfStream,
}
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub lines: u64,
    pub readings: u64,
    pub parse_errors: u64,
    pub batches: u64,
    pub storage_errors: u64,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionReport {
    pub reason: CloseReason,
    pub stats: SessionStats,
}
/// Shared stop flag, checked by the session between line reads.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);
impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub identifiers: [ChannelIdentifier; 2],
    pub line_format: LineFormat,
    pub emit_mode: EmitMode,
    pub history_limit: Option<usize>,
    pub persistence: Persistence,
    pub csv_path: PathBuf,
}
impl SessionSettings {
    pub fn labels(&self) -> [String; 2] {
        [
            self.identifiers[0].label().to_string(),
            self.identifiers[1].label().to_string(),
        ]
    }
}
enum Storage {
    Append(CsvRecorder),
    Overwrite { path: PathBuf, labels: [String; 2] },
}
/// One streaming session: parser, pairing buffer and CSV log around an
/// already opened line source.
pub struct Session<S: LineSource> {
    source: S,
    parser: SampleParser,
    buffer: PairingBuffer,
    storage: Storage,
    stats: SessionStats,
}
impl<S: LineSource> Session<S> {
    pub fn new(source: S, settings: &SessionSettings) -> Self {
        let [first, second] = settings.identifiers.clone();
        let mut stats = SessionStats::default();
        let storage = match settings.persistence {
            Persistence::Append => {
                let mut recorder = CsvRecorder::new(&settings.csv_path, &settings.labels());
                if let Err(e) = recorder.open() {
                    warn!("{e}; will retry on the next batch");
                    stats.storage_errors += 1;
                }
                Storage::Append(recorder)
            }
            Persistence::Overwrite => Storage::Overwrite {
                path: settings.csv_path.clone(),
                labels: settings.labels(),
            },
        };
        Self {
            source,
            parser: SampleParser::new(first, second, settings.line_format),
            buffer: PairingBuffer::new(settings.emit_mode, settings.history_limit),
            storage,
            stats,
        }
    }
    pub fn stats(&self) -> SessionStats {
        self.stats
    }
    pub fn buffer(&self) -> &PairingBuffer {
        &self.buffer
    }
    /// Pulls and handles one read. Returns `false` once the source has ended.
    pub fn pump_once(&mut self, plot: &mut impl PlotSink) -> Result<bool, TransportError> {
        match self.source.next_line()? {
            LineRead::Line(line) => {
                self.process_line(&line, plot);
                Ok(true)
            }
            LineRead::Idle => Ok(true),
            LineRead::End => Ok(false),
        }
    }
    pub fn process_line(&mut self, line: &str, plot: &mut impl PlotSink) {
        self.stats.lines += 1;
        debug!("line: {line}");
        let readings = match self.parser.parse_line(line) {
            Ok(readings) => readings,
            Err(e) => {
                self.stats.parse_errors += 1;
                warn!("Dropped line: {e}");
                return;
            }
        };
        for reading in readings {
            self.stats.readings += 1;
            if let Some(batch) = self.buffer.record(reading) {
                self.publish(&batch, plot);
            }
        }
    }
    fn publish(&mut self, batch: &SampleBatch, plot: &mut impl PlotSink) {
        self.stats.batches += 1;
        let stored = match &mut self.storage {
            Storage::Append(recorder) => recorder.append(batch),
            Storage::Overwrite { path, labels } => write_snapshot(path, labels, batch),
        };
        match stored {
            Ok(rows) => debug!("Stored {rows} rows"),
            Err(e) => {
                self.stats.storage_errors += 1;
                warn!("Batch not persisted: {e}");
            }
        }
        plot.render(batch);
    }
    /// Releases the transport and the log.
    pub fn close(self) -> SessionStats {
        let Self {
            source,
            storage,
            stats,
            ..
        } = self;
        drop(source);
        if let Storage::Append(mut recorder) = storage {
            recorder.close();
        }
        stats
    }
}
/// Drives a whole session through OPENING, STREAMING and finally CLOSED or
/// FAILED. `observe` sees every state as it is entered.
pub fn run_session<S, P>(
    open: impl FnOnce() -> Result<S, TransportError>,
    settings: &SessionSettings,
    plot: &mut P,
    cancel: &CancelToken,
    mut observe: impl FnMut(SessionState),
) -> Result<SessionReport, SessionError>
where
    S: LineSource,
    P: PlotSink,
{
    observe(SessionState::Opening);
    let source = match open() {
        Ok(source) => source,
        Err(e) => {
            error!("Session failed while opening: {e}");
            observe(SessionState::Failed);
            return Err(e.into());
        }
    };
    let mut session = Session::new(source, settings);
    observe(SessionState::Streaming);
    info!("Streaming");
    let outcome = loop {
        if cancel.is_cancelled() {
            break Ok(CloseReason::Cancelled);
        }
        match session.pump_once(plot) {
            Ok(true) => {}
            Ok(false) => break Ok(CloseReason::EndOfStream),
            Err(e) => break Err(e),
        }
    };
    let stats = session.close();
    match outcome {
        Ok(reason) => {
            plot.finish();
            observe(SessionState::Closed);
            info!(
                "Session closed ({reason:?}): {} lines, {} readings, {} dropped, {} batches, {} storage errors",
                stats.lines, stats.readings, stats.parse_errors, stats.batches, stats.storage_errors
            );
            Ok(SessionReport { reason, stats })
        }
        Err(e) => {
            error!("Session failed: {e}");
            observe(SessionState::Failed);
            Err(e.into())
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::ScriptedSource;
    use std::io;
    use std::path::Path;
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
    fn settings(csv_path: &Path) -> SessionSettings {
        SessionSettings {
            identifiers: [ChannelIdentifier::new("A2:"), ChannelIdentifier::new("A3:")],
            line_format: LineFormat::Single,
            emit_mode: EmitMode::History,
            history_limit: None,
            persistence: Persistence::Append,
            csv_path: csv_path.to_path_buf(),
        }
    }
    fn data_rows(path: &Path) -> usize {
        std::fs::read_to_string(path).unwrap().lines().skip(1).count()
    }
    fn run_lines(
        lines: &[&str],
        settings: &SessionSettings,
    ) -> (Result<SessionReport, SessionError>, Recorder, Vec<SessionState>) {
        let mut plot = Recorder::default();
        let mut states = Vec::new();
        let source = ScriptedSource::new(lines.iter().copied());
        let result = run_session(
            || Ok(source),
            settings,
            &mut plot,
            &CancelToken::new(),
            |s| states.push(s),
        );
        (result, plot, states)
    }
    #[test]
    fn interleaved_lines_emit_two_cumulative_batches() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir.path().join("log.csv"));
        let (result, plot, states) =
            run_lines(&["A2:1.0", "A3:2.0", "A2:3.0", "A3:4.0"], &settings);
        let report = result.unwrap();
        assert_eq!(report.reason, CloseReason::EndOfStream);
        assert_eq!(report.stats.batches, 2);
        assert_eq!(plot.renders.len(), 2);
        assert_eq!(plot.renders[1].channel_a, vec![1.0, 3.0]);
        assert_eq!(plot.renders[1].channel_b, vec![2.0, 4.0]);
        assert!(plot.finished);
        assert_eq!(
            states,
            vec![SessionState::Opening, SessionState::Streaming, SessionState::Closed]
        );
        // Full history is appended on every batch: 1 + 2 rows.
        assert_eq!(data_rows(&settings.csv_path), 3);
    }
    #[test]
    fn noise_and_malformed_lines_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir.path().join("log.csv"));
        let (result, plot, _) = run_lines(
            &["boot ok", "A2:notanumber", "A2:1.0", "", "A3:oops", "A3:2.0"],
            &settings,
        );
        let stats = result.unwrap().stats;
        assert_eq!(stats.lines, 6);
        assert_eq!(stats.parse_errors, 2);
        assert_eq!(stats.readings, 2);
        assert_eq!(plot.renders.len(), 1);
        assert_eq!(plot.renders[0].channel_a, vec![1.0]);
    }
    #[test]
    fn malformed_line_leaves_queues_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut plot = Recorder::default();
        let mut session = Session::new(
            ScriptedSource::new(Vec::<String>::new()),
            &settings(&dir.path().join("log.csv")),
        );
        session.process_line("A2:1.0", &mut plot);
        session.process_line("A2:notanumber", &mut plot);
        session.process_line("unrelated", &mut plot);
        assert_eq!(session.buffer().pending(), (1, 0, 0));
        assert_eq!(session.stats().parse_errors, 1);
        assert!(plot.renders.is_empty());
    }
    #[test]
    fn drain_mode_appends_each_pair_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings(&dir.path().join("log.csv"));
        settings.emit_mode = EmitMode::Drain;
        let (result, _, _) = run_lines(&["A2:1", "A3:2", "A2:3", "A3:4", "A2:5", "A3:6"], &settings);
        assert_eq!(result.unwrap().stats.batches, 3);
        assert_eq!(data_rows(&settings.csv_path), 3);
    }
    #[test]
    fn overwrite_mode_keeps_latest_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings(&dir.path().join("snap.csv"));
        settings.persistence = Persistence::Overwrite;
        let (result, _, _) = run_lines(&["A2:1", "A3:2", "A2:3", "A3:4"], &settings);
        result.unwrap();
        assert_eq!(data_rows(&settings.csv_path), 2);
    }
    #[test]
    fn compound_lines_pair_within_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings(&dir.path().join("log.csv"));
        settings.line_format = LineFormat::Compound;
        let (result, plot, _) =
            run_lines(&["A2:1.0 A3:2.0", "A2:3.0 A3:bad", "A2:5.0 A3:6.0"], &settings);
        assert_eq!(result.unwrap().stats.parse_errors, 1);
        assert_eq!(plot.renders.len(), 2);
        assert_eq!(plot.renders[1].channel_a, vec![1.0, 5.0]);
    }
    #[test]
    fn storage_failure_does_not_stop_acquisition() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir.path().join("missing").join("log.csv"));
        let (result, plot, _) = run_lines(&["A2:1", "A3:2", "A2:3", "A3:4"], &settings);
        let stats = result.unwrap().stats;
        // One failed open plus one per batch.
        assert_eq!(stats.storage_errors, 3);
        assert_eq!(plot.renders.len(), 2);
    }
    #[test]
    fn open_failure_fails_without_samples() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir.path().join("log.csv"));
        let mut plot = Recorder::default();
        let mut states = Vec::new();
        let result = run_session(
            || -> Result<ScriptedSource, TransportError> {
                Err(TransportError::Open {
                    port: "COM99".into(),
                    baud_rate: 9600,
                    source: serialport::Error::new(serialport::ErrorKind::NoDevice, "absent"),
                })
            },
            &settings,
            &mut plot,
            &CancelToken::new(),
            |s| states.push(s),
        );
        assert!(matches!(
            result,
            Err(SessionError::Transport(TransportError::Open { .. }))
        ));
        assert_eq!(states, vec![SessionState::Opening, SessionState::Failed]);
        assert!(plot.renders.is_empty());
        assert!(!plot.finished);
        assert!(!settings.csv_path.exists());
    }
    struct BrokenSource {
        lines: Vec<&'static str>,
    }
    impl LineSource for BrokenSource {
        fn next_line(&mut self) -> Result<LineRead, TransportError> {
            match self.lines.pop() {
                Some(line) => Ok(LineRead::Line(line.into())),
                None => Err(TransportError::Read(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "unplugged",
                ))),
            }
        }
    }
    #[test]
    fn read_failure_fails_session() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir.path().join("log.csv"));
        let mut plot = Recorder::default();
        let mut last_state = None;
        let result = run_session(
            || Ok(BrokenSource { lines: vec!["A3:2", "A2:1"] }),
            &settings,
            &mut plot,
            &CancelToken::new(),
            |s| last_state = Some(s),
        );
        assert!(matches!(result, Err(SessionError::Transport(TransportError::Read(_)))));
        assert_eq!(last_state, Some(SessionState::Failed));
        assert_eq!(plot.renders.len(), 1);
        // The row written before the failure stays on disk.
        assert_eq!(data_rows(&settings.csv_path), 1);
    }
    /// Never ends on its own; cancels the session after a few idle reads.
    struct IdleSource {
        reads: usize,
        cancel_after: usize,
        cancel: CancelToken,
    }
    impl LineSource for IdleSource {
        fn next_line(&mut self) -> Result<LineRead, TransportError> {
            self.reads += 1;
            if self.reads == self.cancel_after {
                self.cancel.cancel();
            }
            Ok(LineRead::Idle)
        }
    }
    #[test]
    fn cancellation_is_seen_between_reads() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir.path().join("log.csv"));
        let cancel = CancelToken::new();
        let mut plot = Recorder::default();
        let source = IdleSource {
            reads: 0,
            cancel_after: 3,
            cancel: cancel.clone(),
        };
        let report = run_session(|| Ok(source), &settings, &mut plot, &cancel, |_| {}).unwrap();
        assert_eq!(report.reason, CloseReason::Cancelled);
        assert_eq!(report.stats.lines, 0);
        assert!(plot.finished);
        assert!(cancel.is_cancelled());
    }
}
