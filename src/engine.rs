// src/engine.rs
use crate::acquisition::{
    open_serial, run_session, CancelToken, LineSource, PacedPlot, PlotSink, PngPlotSink,
    SampleBatch, SessionError, SessionReport, SimulatedSensor, TransportError,
};
use crate::config::{Config, SourceKind};
use crate::types::SessionEvent;
use anyhow::{Context, Result};
use log::{info, warn};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
/// Forwards batches to the GUI thread. Sending never blocks.
pub struct ChannelPlotSink {
    tx: Sender<SessionEvent>,
}
impl ChannelPlotSink {
    pub fn new(tx: Sender<SessionEvent>) -> Self {
        Self { tx }
    }
}
impl PlotSink for ChannelPlotSink {
    fn render(&mut self, batch: &SampleBatch) {
        // A closed window just stops listening.
        self.tx.send(SessionEvent::Batch(batch.clone())).ok();
    }
}
pub fn open_source(config: &Config) -> Result<Box<dyn LineSource + Send>, TransportError> {
    let [first, second] = config.identifiers();
    let source: Box<dyn LineSource + Send> = match config.source {
        SourceKind::Serial => Box::new(open_serial(
            &config.port,
            config.baud_rate,
            config.read_timeout(),
        )?),
        SourceKind::Simulated => {
            info!("Using simulated sensor");
            Box::new(SimulatedSensor::new(
                &first,
                &second,
                config.line_format,
                config.sim_period(),
                config.read_timeout(),
                config.sim_seed,
            ))
        }
    };
    Ok(source)
}
fn png_sink(config: &Config) -> Option<PngPlotSink> {
    let labels = config.session_settings().labels();
    config
        .final_plot_path()
        .map(|path| PngPlotSink::new(path, labels, config.plot_window_secs))
}
/// Runs one session on the calling thread. A session that closes (Ctrl-C or
/// end of stream) leaves its final render at [`Config::final_plot_path`].
pub fn run_headless(config: &Config, cancel: &CancelToken) -> Result<SessionReport, SessionError> {
    let mut plot = PacedPlot::new(png_sink(config), config.pacing());
    run_session(
        || open_source(config),
        &config.session_settings(),
        &mut plot,
        cancel,
        |state| info!("Session state: {state:?}"),
    )
}
/// Runs the session on a background thread, reporting to the GUI through `tx`.
pub fn spawn_thread(
    config: Config,
    cancel: CancelToken,
    tx: Sender<SessionEvent>,
) -> JoinHandle<Result<SessionReport, SessionError>> {
    thread::spawn(move || {
        let sinks = (ChannelPlotSink::new(tx.clone()), png_sink(&config));
        let mut plot = PacedPlot::new(sinks, config.pacing());
        let state_tx = tx.clone();
        let result = run_session(
            || open_source(&config),
            &config.session_settings(),
            &mut plot,
            &cancel,
            |state| {
                state_tx.send(SessionEvent::State(state)).ok();
            },
        );
        let summary = match &result {
            Ok(report) => Ok(*report),
            Err(e) => Err(e.to_string()),
        };
        tx.send(SessionEvent::Finished(summary)).ok();
        result
    })
}
/// Cancels `token` on the first Ctrl-C. A second Ctrl-C exits the process
/// at once, for when the final plot window is no longer wanted.
pub fn cancel_on_ctrl_c(token: CancelToken) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the signal runtime")?;
    thread::Builder::new()
        .name("ctrl-c".into())
        .spawn(move || {
            runtime.block_on(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Ctrl-C handler unavailable: {e}");
                    return;
                }
                info!("Interrupt received, closing session");
                token.cancel();
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Second interrupt, exiting");
                    std::process::exit(130);
                }
            })
        })
        .context("failed to spawn the signal thread")?;
    Ok(())
}
