//! Bin assignment reports and the completion marker.
//!
//! The text report has one line per bin, in creation order:
//!
//! ```text
//! Bin 0: SAMEA1, SAMEA2; Cardinality: 90.0
//! Bin 1: SAMEA3; Cardinality: 30.0
//! ```
//!
//! Downstream stages wait for `<label>_binned.done`, which only appears once the report has been
//! written completely. A run that fails leaves no marker behind.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::packer::PackingResult;

/// Report serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat {
    /// `Bin <index>: <ids>; Cardinality: <value>` lines
    #[default]
    Text,
    /// JSON array of bin summaries
    Json,
}

impl ReportFormat {
    fn extension(self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
        }
    }
}

/// Serializes packing results
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportWriter {
    format: ReportFormat,
}

impl ReportWriter {
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> ReportFormat {
        self.format
    }

    /// Write `result` to `out`
    pub fn write<W: Write, S>(&self, mut out: W, result: &PackingResult<S>) -> Result<()> {
        match self.format {
            ReportFormat::Text => {
                for bin in result.bins() {
                    writeln!(
                        out,
                        "Bin {}: {}; Cardinality: {:?}",
                        bin.index(),
                        bin.members().join(", "),
                        bin.cardinality()
                    )
                    .map_err(|e| Error::io("<report>", e))?;
                }
            }
            ReportFormat::Json => {
                serde_json::to_writer_pretty(&mut out, &result.summaries())?;
                writeln!(out).map_err(|e| Error::io("<report>", e))?;
            }
        }
        out.flush().map_err(|e| Error::io("<report>", e))
    }

    /// Render `result` into a string
    pub fn render<S>(&self, result: &PackingResult<S>) -> Result<String> {
        let mut buf = Vec::new();
        self.write(&mut buf, result)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Locations of the report and completion marker of a labelled run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    output_dir: PathBuf,
    completion_dir: PathBuf,
    label: String,
}

impl OutputLayout {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        completion_dir: impl Into<PathBuf>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            completion_dir: completion_dir.into(),
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// `<output_dir>/<label>_bin_assignment.<txt|json>`
    pub fn report_path(&self, format: ReportFormat) -> PathBuf {
        self.output_dir.join(format!(
            "{}_bin_assignment.{}",
            self.label,
            format.extension()
        ))
    }

    /// `<completion_dir>/<label>_binned.done`
    pub fn marker_path(&self) -> PathBuf {
        self.completion_dir
            .join(format!("{}_binned.done", self.label))
    }

    /// Remove a marker left by an earlier run so a failing rerun is not mistaken for success.
    pub fn clear_marker(&self) -> Result<()> {
        let marker = self.marker_path();
        match fs::remove_file(&marker) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(Error::io(marker, e)),
            _ => Ok(()),
        }
    }

    /// Write the report, then create the completion marker. Returns the report path.
    pub fn publish<S>(&self, writer: &ReportWriter, result: &PackingResult<S>) -> Result<PathBuf> {
        let report = self.report_path(writer.format());
        create_parent(&report)?;
        let file = File::create(&report).map_err(|e| Error::io(&report, e))?;
        writer
            .write(BufWriter::new(file), result)
            .map_err(|e| match e {
                Error::Io { source, .. } => Error::io(&report, source),
                other => other,
            })?;

        let marker = self.marker_path();
        create_parent(&marker)?;
        File::create(&marker).map_err(|e| Error::io(&marker, e))?;
        info!(
            report = %report.display(),
            marker = %marker.display(),
            bins = result.len(),
            "published bin assignment"
        );
        Ok(report)
    }
}

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Item;
    use crate::error::OracleError;
    use crate::packer::{pack, PackerConfig};

    fn scenario() -> PackingResult<f64> {
        let items = vec![
            Item::new("A", 40.0),
            Item::new("B", 50.0),
            Item::new("C", 30.5),
        ];
        let cardinality = |s: &f64| -> std::result::Result<f64, OracleError> { Ok(*s) };
        let union = |a: &f64, b: &f64| -> std::result::Result<f64, OracleError> { Ok(a + b) };
        pack(items, &PackerConfig::new(100.0).unwrap(), &cardinality, &union).unwrap()
    }

    fn empty() -> PackingResult<f64> {
        let cardinality = |s: &f64| -> std::result::Result<f64, OracleError> { Ok(*s) };
        let union = |a: &f64, b: &f64| -> std::result::Result<f64, OracleError> { Ok(a + b) };
        pack(Vec::new(), &PackerConfig::new(1.0).unwrap(), &cardinality, &union).unwrap()
    }

    #[test]
    fn test_text_report() {
        let text = ReportWriter::default().render(&scenario()).unwrap();
        assert_eq!(
            text,
            "Bin 0: A, B; Cardinality: 90.0\nBin 1: C; Cardinality: 30.5\n"
        );
    }

    #[test]
    fn test_json_report() {
        let json = ReportWriter::new(ReportFormat::Json)
            .render(&scenario())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["members"], serde_json::json!(["A", "B"]));
        assert_eq!(value[0]["cardinality"], serde_json::json!(90.0));
        assert_eq!(value[1]["index"], serde_json::json!(1));
        assert_eq!(value[1]["saturated"], serde_json::json!(false));
    }

    #[test]
    fn test_publish_empty_result() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(
            dir.path().join("output"),
            dir.path().join("tmp/completion"),
            "run1",
        );

        let report = layout.publish(&ReportWriter::default(), &empty()).unwrap();

        assert_eq!(report, dir.path().join("output/run1_bin_assignment.txt"));
        assert_eq!(fs::read_to_string(&report).unwrap(), "");
        assert!(dir.path().join("tmp/completion/run1_binned.done").exists());
    }

    #[test]
    fn test_clear_marker() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path(), dir.path(), "x");
        layout.clear_marker().unwrap();

        fs::write(layout.marker_path(), b"").unwrap();
        layout.clear_marker().unwrap();
        assert!(!layout.marker_path().exists());
    }
}
