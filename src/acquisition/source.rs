use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader};
use std::time::Duration;
use log::info;
use serialport::SerialPort;
use crate::acquisition::TransportError;
/// Outcome of one pull from a line source.
#[derive(Clone, Debug, PartialEq)]
pub enum LineRead {
    /// A decoded line with its terminator and surrounding whitespace removed.
    Line(String),
    /// Nothing arrived within the read timeout; ask again.
    Idle,
    /// The transport has no more data.
    End,
}
/// Trait representing something that yields text lines on demand.
pub trait LineSource {
    fn next_line(&mut self) -> Result<LineRead, TransportError>;
}
impl<S: LineSource + ?Sized> LineSource for Box<S> {
    fn next_line(&mut self) -> Result<LineRead, TransportError> {
        (**self).next_line()
    }
}
/// Splits any buffered byte stream into lines.
///
/// A read timeout surfaces as [`LineRead::Idle`]; bytes received before the
/// timeout are kept and completed by later reads.
pub struct LineReader<R: BufRead> {
    reader: R,
    pending: Vec<u8>,
}
impl<R: BufRead> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: Vec::new(),
        }
    }
    fn take_line(&mut self) -> String {
        let bytes = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&bytes).trim().to_string()
    }
}
impl<R: BufRead> LineSource for LineReader<R> {
    fn next_line(&mut self) -> Result<LineRead, TransportError> {
        loop {
            match self.reader.read_until(b'\n', &mut self.pending) {
                Ok(0) if self.pending.is_empty() => return Ok(LineRead::End),
                // EOF after an unterminated tail: hand out what we have.
                Ok(0) => return Ok(LineRead::Line(self.take_line())),
                Ok(_) if self.pending.ends_with(b"\n") => {
                    return Ok(LineRead::Line(self.take_line()))
                }
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                    ) =>
                {
                    return Ok(LineRead::Idle)
                }
                Err(e) => return Err(TransportError::Read(e)),
            }
        }
    }
}
pub type SerialLineSource = LineReader<BufReader<Box<dyn SerialPort>>>;
/// Opens a serial port whose reads give up after `read_timeout`, so callers
/// can check for cancellation between lines. The port closes on drop.
pub fn open_serial(
    port: &str,
    baud_rate: u32,
    read_timeout: Duration,
) -> Result<SerialLineSource, TransportError> {
    let handle = serialport::new(port, baud_rate)
        .timeout(read_timeout)
        .open()
        .map_err(|source| TransportError::Open {
            port: port.to_string(),
            baud_rate,
            source,
        })?;
    info!("Opened serial port {} at {} baud", port, baud_rate);
    Ok(LineReader::new(BufReader::new(handle)))
}
/// In-memory source useful for tests and deterministic playback.
pub struct ScriptedSource {
    queue: VecDeque<LineRead>,
}
impl ScriptedSource {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_reads(lines.into_iter().map(|l| LineRead::Line(l.into())))
    }
    pub fn from_reads(reads: impl IntoIterator<Item = LineRead>) -> Self {
        Self {
            queue: reads.into_iter().collect(),
        }
    }
}
impl LineSource for ScriptedSource {
    fn next_line(&mut self) -> Result<LineRead, TransportError> {
        Ok(self.queue.pop_front().unwrap_or(LineRead::End))
    }
}
