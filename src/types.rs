// src/types.rs
use crate::acquisition::{SampleBatch, SessionReport, SessionState};
// Messages the acquisition thread sends to the GUI
#[derive(Clone, Debug)]
pub enum SessionEvent {
    State(SessionState),
    Batch(SampleBatch),
    // Err carries the rendered SessionError
    Finished(Result<SessionReport, String>),
}
