// Pipeline progress tracing
// Append-only JSONL trace file, one entry per stage transition

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::pipeline::Stage;

/// Errors that can occur during trace operations
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// A single trace entry in the pipeline execution log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// ISO 8601 timestamp of when this entry was created
    pub timestamp: String,

    /// Request this entry belongs to
    pub request_id: Uuid,

    pub stage: Stage,

    /// Progress through the pipeline [0.0, 1.0]
    pub progress: f32,

    pub message: String,

    /// Optional structured data (sample counts, feature width, label...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TraceEntry {
    pub fn new(request_id: Uuid, stage: Stage, message: String) -> Self {
        TraceEntry {
            timestamp: Utc::now().to_rfc3339(),
            request_id,
            stage,
            progress: stage.progress(),
            message,
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Serialize to JSON line (with newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Manages an append-only JSONL trace file
#[derive(Debug, Clone)]
pub struct TraceWriter {
    file_path: PathBuf,
}

impl TraceWriter {
    pub fn new(file_path: PathBuf) -> Self {
        TraceWriter { file_path }
    }

    /// Append a trace entry, creating the file if needed
    pub fn write(&self, entry: &TraceEntry) -> Result<(), TraceError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        let json_line = entry.to_json_line()?;
        file.write_all(json_line.as_bytes())?;
        file.flush()?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Per-request trace handle; write failures are logged, never raised
///
/// Tracks the request's current stage, starting at `Stage::Idle`. Nothing is
/// recorded once the request reached a terminal stage.
pub struct RequestTrace<'a> {
    request_id: Uuid,
    writer: Option<&'a TraceWriter>,
    stage: Cell<Stage>,
}

impl<'a> RequestTrace<'a> {
    pub fn new(request_id: Uuid, writer: Option<&'a TraceWriter>) -> Self {
        RequestTrace {
            request_id,
            writer,
            stage: Cell::new(Stage::Idle),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Stage most recently entered
    pub fn stage(&self) -> Stage {
        self.stage.get()
    }

    pub fn record(&self, stage: Stage, message: impl Into<String>) {
        if self.enter(stage) {
            self.emit(TraceEntry::new(self.request_id, stage, message.into()));
        }
    }

    pub fn record_with_data(
        &self,
        stage: Stage,
        message: impl Into<String>,
        data: serde_json::Value,
    ) {
        if self.enter(stage) {
            self.emit(TraceEntry::new(self.request_id, stage, message.into()).with_data(data));
        }
    }

    fn enter(&self, stage: Stage) -> bool {
        let current = self.stage.get();
        if current.is_terminal() {
            log::warn!(
                "Request {} already {}; ignoring {}",
                self.request_id,
                current,
                stage
            );
            return false;
        }
        if stage != Stage::Failed && stage != current.next() {
            log::warn!(
                "Request {} moved from {} to {} out of order",
                self.request_id,
                current,
                stage
            );
        }
        self.stage.set(stage);
        true
    }

    fn emit(&self, entry: TraceEntry) {
        if let Some(writer) = self.writer {
            if let Err(e) = writer.write(&entry) {
                log::warn!(
                    "Failed to write trace entry to {}: {}",
                    writer.path().display(),
                    e
                );
            }
        }
    }
}

/// Read trace entries from a JSONL file
pub fn read_trace_file(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let entry: TraceEntry = serde_json::from_str(line)?;
        entries.push(entry);
    }

    Ok(entries)
}
