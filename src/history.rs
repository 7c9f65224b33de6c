//! Boundary to the persistence collaborator
//!
//! The scanner never writes storage itself. Committing a session hands its
//! codes to a [`HistorySink`] in sequence order.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::HistoryError;
use crate::models::DetectedCode;

/// One committed payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: Uuid,
    pub payload: String,
    pub detected_at: DateTime<Utc>,
}

impl From<&DetectedCode> for HistoryRecord {
    fn from(code: &DetectedCode) -> Self {
        Self {
            id: code.id,
            payload: code.payload.clone(),
            detected_at: code.first_detected,
        }
    }
}

/// Receives committed sessions
pub trait HistorySink {
    /// Store `records`; an error leaves the session untouched
    fn save(&mut self, records: &[HistoryRecord]) -> Result<(), HistoryError>;
}

/// Sink that keeps everything in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    pub records: Vec<HistoryRecord>,
    /// Number of `save` calls
    pub commits: usize,
}

impl HistorySink for MemoryHistory {
    fn save(&mut self, records: &[HistoryRecord]) -> Result<(), HistoryError> {
        self.records.extend_from_slice(records);
        self.commits += 1;
        Ok(())
    }
}

/// Sink appending to a JSON array on disk
#[derive(Debug, Clone)]
pub struct JsonFileHistory {
    path: PathBuf,
}

impl JsonFileHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records already stored; a missing file holds none
    pub fn load(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }
}

impl HistorySink for JsonFileHistory {
    fn save(&mut self, records: &[HistoryRecord]) -> Result<(), HistoryError> {
        let mut all = self.load()?;
        all.extend_from_slice(records);
        let text = serde_json::to_string_pretty(&all)?;
        fs::write(&self.path, text)?;
        debug!(path = %self.path.display(), total = all.len(), "history written");
        Ok(())
    }
}
