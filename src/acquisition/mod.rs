// src/acquisition/mod.rs
pub mod buffer;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod plot;
pub mod simulator;
pub mod source;
pub mod trace;
pub use buffer::{EmitMode, PairingBuffer, Sample, SampleBatch};
pub use error::{ParseError, PlotError, SessionError, StorageError, TransportError};
pub use parser::{Channel, ChannelIdentifier, LineFormat, Reading, SampleParser};
pub use pipeline::{
    run_session, CancelToken, CloseReason, Session, SessionReport, SessionSettings, SessionState,
    SessionStats,
};
pub use plot::{PacedPlot, PlotSink, PngPlotSink};
pub use simulator::SimulatedSensor;
pub use source::{open_serial, LineRead, LineSource, ScriptedSource};
pub use trace::TraceWindow;
