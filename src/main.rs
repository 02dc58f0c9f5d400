// src/main.rs
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use eframe::egui;
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::channel;
use voltlog::acquisition::{CancelToken, SessionError, SessionReport};
use voltlog::config::{Config, SourceKind};
use voltlog::{engine, gui};

/// Logs two voltage channels from a serial sensor to CSV with a live plot.
#[derive(Parser, Debug)]
#[command(name = "voltlog", version)]
struct Cli {
    /// TOML (or .json) configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Serial port, e.g. COM4 or /dev/ttyACM0
    #[arg(long)]
    port: Option<String>,
    #[arg(long)]
    baud_rate: Option<u32>,
    /// CSV log path
    #[arg(long)]
    csv_path: Option<PathBuf>,
    /// Use the built-in simulated sensor instead of a serial port
    #[arg(long)]
    simulate: bool,
    /// Run without a window; Ctrl-C ends the session
    #[arg(long)]
    headless: bool,
    /// Print the available serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(port) = &self.port {
            config.port = port.clone();
        }
        if let Some(baud_rate) = self.baud_rate {
            config.baud_rate = baud_rate;
        }
        if let Some(csv_path) = &self.csv_path {
            config.csv_path = csv_path.clone();
        }
        if self.simulate {
            config.source = SourceKind::Simulated;
        }
    }
}

fn list_ports() -> Result<()> {
    let ports = serialport::available_ports().context("failed to enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found.");
    }
    for port in ports {
        println!("{}\t{:?}", port.port_name, port.port_type);
    }
    Ok(())
}

fn run_headless(config: &Config) -> Result<Result<SessionReport, SessionError>> {
    let cancel = CancelToken::new();
    engine::cancel_on_ctrl_c(cancel.clone())?;
    Ok(engine::run_headless(config, &cancel))
}

fn run_gui(config: Config) -> Result<Result<SessionReport, SessionError>> {
    let cancel = CancelToken::new();
    let interrupted = CancelToken::new();
    engine::cancel_on_ctrl_c(interrupted.clone())?;
    let (tx, rx) = channel();
    let handle = engine::spawn_thread(config.clone(), cancel.clone(), tx);
    let app = gui::LoggerApp::new(&config, rx, cancel.clone(), interrupted);
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1100.0, 640.0])
        .with_min_inner_size([720.0, 420.0])
        .with_title("voltlog");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    let ui_result = eframe::run_native("voltlog", options, Box::new(move |_cc| Box::new(app)));
    // Closing the window ends the session too.
    cancel.cancel();
    let outcome = handle
        .join()
        .map_err(|_| anyhow!("acquisition thread panicked"))?;
    ui_result.map_err(|e| anyhow!("GUI failed: {e}"))?;
    Ok(outcome)
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    if cli.list_ports {
        list_ports()?;
        return Ok(ExitCode::SUCCESS);
    }
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Config::default(),
    };
    cli.apply(&mut config);
    config.validate()?;
    let outcome = if cli.headless {
        run_headless(&config)?
    } else {
        run_gui(config)?
    };
    Ok(match outcome {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Session failed: {e}");
            ExitCode::FAILURE
        }
    })
}

// Entry point
fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
