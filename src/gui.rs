// src/gui.rs
use eframe::egui;
use egui::Color32;
use egui_plot::{Legend, Line, Plot, PlotPoints};
use std::sync::mpsc::Receiver;
use std::time::Duration;
use crate::acquisition::{CancelToken, Channel, SessionState, TraceWindow};
use crate::config::{Config, SourceKind};
use crate::types::SessionEvent;

pub struct LoggerApp {
    // Session status
    state: SessionState,
    source_label: String,
    csv_path: String,

    // Plot data
    labels: [String; 2],
    trace: TraceWindow,
    batches_seen: u64,

    // UI log
    log_messages: Vec<String>,

    // Links to the acquisition thread
    rx: Receiver<SessionEvent>,
    cancel: CancelToken,
    interrupted: CancelToken,
}

impl LoggerApp {
    pub fn new(
        config: &Config,
        rx: Receiver<SessionEvent>,
        cancel: CancelToken,
        interrupted: CancelToken,
    ) -> Self {
        let source_label = match config.source {
            SourceKind::Serial => {
                format!("{} @ {} baud", config.port, config.baud_rate)
            }
            SourceKind::Simulated => "simulated sensor".to_owned(),
        };
        Self {
            state: SessionState::Opening,
            source_label,
            csv_path: config.csv_path.display().to_string(),
            labels: config.session_settings().labels(),
            trace: TraceWindow::new(config.plot_window_secs),
            batches_seen: 0,
            log_messages: vec!["voltlog ready.".to_owned()],
            rx,
            cancel,
            interrupted,
        }
    }

    fn log(&mut self, msg: &str) {
        self.log_messages.push(format!("> {}", msg));
        if self.log_messages.len() > 8 {
            self.log_messages.remove(0);
        }
    }

    fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::State(state) => {
                self.state = state;
                self.log(&format!("Session {:?}", state));
            }
            SessionEvent::Batch(batch) => {
                self.batches_seen += 1;
                self.trace.absorb(&batch);
            }
            SessionEvent::Finished(Ok(report)) => {
                let s = report.stats;
                self.log(&format!(
                    "Closed ({:?}): {} batches, {} dropped lines",
                    report.reason, s.batches, s.parse_errors
                ));
            }
            SessionEvent::Finished(Err(e)) => self.log(&format!("Failed: {}", e)),
        }
    }

    /// Ends the session on Ctrl-C but keeps the window, so the final plot
    /// stays on screen until the user closes it.
    fn poll_interrupt(&mut self) {
        if self.interrupted.is_cancelled() && !self.cancel.is_cancelled() {
            self.cancel.cancel();
            self.log("Interrupted; close the window to exit.");
        }
    }

    fn state_text(&self) -> egui::RichText {
        let (text, color) = match self.state {
            SessionState::Opening => ("OPENING", Color32::YELLOW),
            SessionState::Streaming => ("STREAMING", Color32::GREEN),
            SessionState::Closed => ("CLOSED", Color32::GRAY),
            SessionState::Failed => ("FAILED", Color32::RED),
        };
        egui::RichText::new(text).strong().color(color)
    }
}

impl eframe::App for LoggerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // 1. Ctrl-C in the terminal stops the session like STOP
        self.poll_interrupt();

        // 2. Drain acquisition events
        while let Ok(event) = self.rx.try_recv() {
            self.handle(event);
        }

        // 3. UI
        egui::SidePanel::left("L").min_width(260.0).show(ctx, |ui| {
            ui.add_space(10.0);
            ui.heading("voltlog");
            ui.label("Two-channel voltage logger");
            ui.separator();

            ui.horizontal(|ui| {
                ui.label("State:");
                ui.label(self.state_text());
            });
            ui.label(format!("Source: {}", self.source_label));
            ui.label(format!("Log: {}", self.csv_path));
            ui.label(format!("Batches: {}", self.batches_seen));
            ui.add_space(10.0);

            let streaming = self.state == SessionState::Streaming;
            if ui
                .add_enabled(streaming, egui::Button::new("⏹ STOP"))
                .clicked()
            {
                self.cancel.cancel();
            }
            if ui.button("🔄 RESET VIEW").clicked() {
                self.trace.clear();
            }

            ui.add_space(10.0);
            egui::ScrollArea::vertical().max_height(160.0).show(ui, |ui| {
                for m in &self.log_messages {
                    ui.monospace(m);
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            Plot::new("voltage_plot")
                .legend(Legend::default())
                .auto_bounds_x()
                .auto_bounds_y()
                .show(ui, |plot_ui| {
                    let traces = [
                        (Channel::A, Color32::from_rgb(230, 60, 60)),
                        (Channel::B, Color32::from_rgb(70, 110, 240)),
                    ];
                    for (idx, (channel, color)) in traces.into_iter().enumerate() {
                        let points = self.trace.points(channel);
                        if !points.is_empty() {
                            plot_ui.line(
                                Line::new(PlotPoints::new(points))
                                    .name(format!("{} Voltage", self.labels[idx]))
                                    .color(color),
                            );
                        }
                    }
                });
            ui.label("Time (s) vs Voltage (V)");
        });

        // Keep polling for events and the interrupt flag
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}
