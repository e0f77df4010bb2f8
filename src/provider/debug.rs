//! JSONL debug sink for provider streams.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

/// Thread-safe append-only JSONL writer.
///
/// Every component that accepts a sink accepts an `Option`; absence is
/// indistinguishable from presence to the rest of the pipeline.
pub struct DebugSink {
    file: Mutex<File>,
}

impl DebugSink {
    /// Open (or create) a sink appending to `path`.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Write one record as a JSON line. Serialization failures are dropped;
    /// a debug sink never disturbs the stream it observes.
    pub fn log(&self, record: &DebugRecord) {
        let Ok(line) = serde_json::to_string(record) else {
            return;
        };
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{line}");
        }
    }
}

/// A normalized JSONL entry.
#[derive(Debug, Serialize)]
pub struct DebugRecord {
    pub time: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub provider: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: serde_json::Value,
}

impl DebugRecord {
    pub fn new(kind: impl Into<String>, data: impl Serialize) -> Self {
        Self {
            time: Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
            provider: String::new(),
            model: String::new(),
            kind: kind.into(),
            data: serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
        }
    }

    pub fn with_source(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.provider = provider.into();
        self.model = model.into();
        self
    }
}
