//! Export: the channel dump hook and JSON report writer.
//!
//! The dump format is a convenience for plotting tools: one file per
//! channel, one `<timestamp> <value>` line per retained sample.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::set::{MetricSet, MetricsReport};
use crate::error::{EngineError, Result};

pub const DUMP_EXTENSION: &str = "dat";

/// Write every retained channel of `metrics` into `dir`, creating it if needed.
/// Returns the files written.
pub fn save_channels(metrics: &MetricSet, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .map_err(|e| EngineError::from(e).with_context(format!("creating {}", dir.display())))?;

    let mut written = Vec::new();
    for store in metrics.stores() {
        if store.values().is_empty() {
            continue;
        }
        let path = dir.join(format!("{}.{}", store.tag().slug(), DUMP_EXTENSION));
        let file = File::create(&path)
            .map_err(|e| EngineError::from(e).with_context(format!("creating {}", path.display())))?;
        let mut out = BufWriter::new(file);
        for (ts, value) in store.series() {
            writeln!(out, "{} {}", ts, value)?;
        }
        out.flush()?;
        written.push(path);
    }

    tracing::info!(files = written.len(), dir = %dir.display(), "export: channels saved");
    Ok(written)
}

/// Serialize a report as pretty JSON.
pub fn write_report<W: Write>(report: &MetricsReport, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, report)
        .map_err(|e| EngineError::Io(std::io::Error::other(e)))
}
