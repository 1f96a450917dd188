use std::path::Path;

use serde::{Serialize, de::DeserializeOwned};

use crate::error::ConfigError;
use crate::pipeline::RunSummary;

/// Serializes an object to a JSON file.
pub fn object_to_json<T: Serialize>(output_path: impl AsRef<Path>, object: &T) -> std::io::Result<()> {
    let j = serde_json::to_string_pretty(object)?;
    std::fs::write(output_path, j)
}

/// Deserializes an object from a JSON file.
pub fn object_from_json<T: DeserializeOwned>(file_path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let path = file_path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|e| ConfigError::Malformed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[derive(Serialize)]
struct SessionReport<'a> {
    timestamp: String,
    hit_rate: f64,
    #[serde(flatten)]
    summary: &'a RunSummary,
}

fn now_string() -> String {
    time::OffsetDateTime::now_local()
        .unwrap_or_else(|_| time::OffsetDateTime::now_utc())
        .to_string()
}

/// Writes the counters of a finished run, stamped with the local time.
pub fn write_session_report(output_path: impl AsRef<Path>, summary: &RunSummary) -> std::io::Result<()> {
    let report = SessionReport {
        timestamp: now_string(),
        hit_rate: summary.hit_rate(),
        summary,
    };
    object_to_json(output_path, &report)
}
