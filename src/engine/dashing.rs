//! ## Dashing engine
//! Runs the external `dashing` binary for every query:
//! - cardinality: `dashing card --presketched <sketch>`, the estimate being the last
//!   tab-separated field of its standard output;
//! - union: `dashing union -o <output> <lhs> <rhs>`.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::trace;

use super::SketchBackend;
use crate::error::OracleError;

/// Environment variable overriding the `dashing` executable
pub const DASHING_BIN_ENV: &str = "DASHING_BIN";
/// Executable name looked up on `PATH`
const DASHING_BIN: &str = "dashing";

/// Adapter around a `dashing` executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashingEngine {
    binary: PathBuf,
}

impl DashingEngine {
    /// Creates new `DashingEngine` using the given executable
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Locate `dashing` through `DASHING_BIN`, then `PATH`
    pub fn locate() -> Result<Self, OracleError> {
        match std::env::var_os(DASHING_BIN_ENV).filter(|v| !v.is_empty()) {
            Some(binary) => Ok(Self::with_binary(binary)),
            None => Self::on_path(),
        }
    }

    /// Locate `dashing` on `PATH` only
    pub fn on_path() -> Result<Self, OracleError> {
        which::which(DASHING_BIN)
            .map(Self::with_binary)
            .map_err(|source| OracleError::EngineNotFound {
                binary: DASHING_BIN.to_string(),
                source,
            })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Run `dashing` with `args`, failing on a non-zero exit status
    fn run(&self, args: &[&OsStr]) -> Result<Output, OracleError> {
        let command = self.describe(args);
        trace!(%command, "running sketch engine");
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .map_err(|source| OracleError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            let detail = if !stderr.is_empty() {
                stderr
            } else if !stdout.is_empty() {
                stdout
            } else {
                "no output".to_string()
            };
            return Err(OracleError::CommandFailed {
                command,
                status: output.status,
                detail,
            });
        }
        Ok(output)
    }

    fn describe(&self, args: &[&OsStr]) -> String {
        std::iter::once(self.binary.as_os_str())
            .chain(args.iter().copied())
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl SketchBackend for DashingEngine {
    fn cardinality(&self, sketch: &Path) -> Result<f64, OracleError> {
        let output = self.run(&[
            OsStr::new("card"),
            OsStr::new("--presketched"),
            sketch.as_os_str(),
        ])?;
        parse_cardinality(&String::from_utf8_lossy(&output.stdout))
    }

    fn union(&self, lhs: &Path, rhs: &Path, output: &Path) -> Result<(), OracleError> {
        self.run(&[
            OsStr::new("union"),
            OsStr::new("-o"),
            output.as_os_str(),
            lhs.as_os_str(),
            rhs.as_os_str(),
        ])?;
        Ok(())
    }

    fn extension(&self) -> &'static str {
        "hll"
    }
}

/// Extract the estimate from `dashing card` output
pub(crate) fn parse_cardinality(stdout: &str) -> Result<f64, OracleError> {
    let trimmed = stdout.trim();
    trimmed
        .rsplit('\t')
        .next()
        .and_then(|field| field.trim().parse::<f64>().ok())
        .ok_or_else(|| OracleError::UnparsableCardinality {
            output: trimmed.to_string(),
        })
}
