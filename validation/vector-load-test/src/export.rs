//! Writes recorded latency series to disk.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::OutputConfig;
use crate::error::{HarnessError, Result};
use crate::metrics::{RunSummary, SampleRecorder};
use crate::workload::OperationClass;

/// One written series.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedSeries {
    pub class: OperationClass,
    pub path: PathBuf,
    pub samples: usize,
}

/// Drains a recorder into one file per operation class.
pub struct ResultExporter<'a> {
    output: &'a OutputConfig,
}

impl<'a> ResultExporter<'a> {
    pub fn new(output: &'a OutputConfig) -> Self {
        Self { output }
    }

    /// Write both series. Existing files are truncated.
    pub fn export(&self, recorder: &SampleRecorder) -> Result<Vec<ExportedSeries>> {
        OperationClass::ALL
            .iter()
            .map(|&class| {
                let path = self.output.path_for(class);
                let samples = recorder.drain(class);
                write_series(&path, &samples)?;
                info!(%class, path = %path.display(), num = samples.len(), "Wrote latency samples");
                Ok(ExportedSeries {
                    class,
                    path,
                    samples: samples.len(),
                })
            })
            .collect()
    }

    /// Write the run summary as pretty JSON.
    pub fn write_summary(&self, summary: &RunSummary) -> Result<PathBuf> {
        let path = self.output.summary_path();
        let json = serde_json::to_string_pretty(summary)
            .map_err(|e| HarnessError::export(&path, std::io::Error::other(e)))?;
        ensure_parent(&path)?;
        std::fs::write(&path, json).map_err(|e| HarnessError::export(&path, e))?;
        Ok(path)
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| HarnessError::export(parent, e))?;
    }
    Ok(())
}

/// Write one sample per line, in the given order, replacing any previous content.
pub fn write_series(path: &Path, samples: &[u64]) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path).map_err(|e| HarnessError::export(path, e))?;
    let mut writer = BufWriter::new(file);
    for sample in samples {
        writeln!(writer, "{}", sample).map_err(|e| HarnessError::export(path, e))?;
    }
    writer.flush().map_err(|e| HarnessError::export(path, e))?;
    Ok(())
}
