use std::io;
use std::path::PathBuf;
use thiserror::Error;
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to open serial port {port} at {baud_rate} baud: {source}")]
    Open {
        port: String,
        baud_rate: u32,
        #[source]
        source: serialport::Error,
    },
    #[error("failed to read from transport: {0}")]
    Read(#[from] io::Error),
}
/// Why a single line was dropped. Never fatal to a session.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("no ':' separator in {0:?}")]
    MissingSeparator(String),
    #[error("empty value in {0:?}")]
    EmptyValue(String),
    #[error("value {value:?} in {line:?} is not a number")]
    InvalidNumber { line: String, value: String },
    #[error("unexpected extra field in {0:?}")]
    ExtraField(String),
}
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to open log {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write log {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}
#[derive(Debug, Error)]
pub enum PlotError {
    #[error("nothing to plot yet")]
    Empty,
    #[error("failed to render plot: {0}")]
    Render(String),
    #[error("failed to save plot to {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for PlotError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        PlotError::Render(format!("{value:?}"))
    }
}
impl From<image::ImageError> for PlotError {
    fn from(value: image::ImageError) -> Self {
        PlotError::Render(value.to_string())
    }
}
/// Terminal failure of an acquisition session (the FAILED state).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),
}
