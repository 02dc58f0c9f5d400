use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use log::info;
use serde::Deserialize;
use crate::acquisition::{SampleBatch, StorageError};
/// How emitted batches reach the CSV log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persistence {
    /// One log for the session, header written only into an empty file.
    #[default]
    Append,
    /// Every batch replaces the file with a fresh snapshot.
    Overwrite,
}
fn header_row(labels: &[String; 2]) -> [String; 3] {
    [
        "Timestamp".to_string(),
        format!("{} Voltage", labels[0]),
        format!("{} Voltage", labels[1]),
    ]
}
fn write_rows(
    writer: &mut csv::Writer<File>,
    batch: &SampleBatch,
) -> Result<(), csv::Error> {
    for sample in batch.samples() {
        writer.serialize((sample.elapsed, sample.channel_a, sample.channel_b))?;
    }
    writer.flush()?;
    Ok(())
}
/// Append-mode CSV log, kept open for the whole session.
pub struct CsvRecorder {
    path: PathBuf,
    header: [String; 3],
    writer: Option<csv::Writer<File>>,
}
impl CsvRecorder {
    pub fn new(path: impl Into<PathBuf>, labels: &[String; 2]) -> Self {
        Self {
            path: path.into(),
            header: header_row(labels),
            writer: None,
        }
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }
    /// Opens the log for appending; an empty file gets the header first.
    pub fn open(&mut self) -> Result<(), StorageError> {
        let open_err = |source| StorageError::Open {
            path: self.path.clone(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(open_err)?;
        let is_empty = file.metadata().map_err(open_err)?.len() == 0;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_empty {
            writer
                .write_record(&self.header)
                .and_then(|_| writer.flush().map_err(csv::Error::from))
                .map_err(|source| StorageError::Write {
                    path: self.path.clone(),
                    source,
                })?;
        }
        info!("Recording to {}", self.path.display());
        self.writer = Some(writer);
        Ok(())
    }
    /// Appends every row of `batch`. A log that failed to open earlier is
    /// retried here.
    pub fn append(&mut self, batch: &SampleBatch) -> Result<usize, StorageError> {
        if self.writer.is_none() {
            self.open()?;
        }
        let Some(writer) = self.writer.as_mut() else {
            return Ok(0);
        };
        write_rows(writer, batch).map_err(|source| StorageError::Write {
            path: self.path.clone(),
            source,
        })?;
        Ok(batch.len())
    }
    pub fn close(&mut self) {
        if let Some(mut w) = self.writer.take() {
            w.flush().ok();
            info!("Recording saved to {}", self.path.display());
        }
    }
}
impl Drop for CsvRecorder {
    fn drop(&mut self) {
        self.close();
    }
}
/// Replaces `path` with a header plus exactly the rows of `batch`.
pub fn write_snapshot(
    path: &Path,
    labels: &[String; 2],
    batch: &SampleBatch,
) -> Result<usize, StorageError> {
    let file = File::create(path).map_err(|source| StorageError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer
        .write_record(header_row(labels))
        .and_then(|_| write_rows(&mut writer, batch))
        .map_err(|source| StorageError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(batch.len())
}
