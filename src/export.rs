//! Optional high-fidelity export through an external converter program.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::logging::EXPORT;

pub trait Exporter {
    /// Whether the collaborator can run at all on this machine.
    fn is_available(&self) -> bool;

    fn export(&self, source: &Path, target: &Path) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Exported(PathBuf),
    Unavailable,
    Failed(String),
}

/// Runs `<program> [args...] <source> <target>`.
#[derive(Debug, Clone)]
pub struct CommandExporter {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandExporter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandExporter {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Extra arguments placed before the source and target paths.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Full path of the executable, looked up on `PATH` when the program is
    /// given by name only.
    pub fn resolve(&self) -> Option<PathBuf> {
        which::which(&self.program).ok()
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

impl Exporter for CommandExporter {
    fn is_available(&self) -> bool {
        self.resolve().is_some()
    }

    fn export(&self, source: &Path, target: &Path) -> Result<()> {
        let program = self.resolve().ok_or_else(|| Error::Export {
            program: self.program_name(),
            reason: "program not found".to_string(),
        })?;
        debug!(target: EXPORT, program = %program.display(), source = %source.display(), "running converter");

        let output = Command::new(&program)
            .args(&self.args)
            .arg(source)
            .arg(target)
            .output()
            .map_err(|e| Error::Export {
                program: self.program_name(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Export {
                program: self.program_name(),
                reason: format!("{}: {}", output.status, stderr.trim()),
            });
        }
        Ok(())
    }
}

/// Exports when the collaborator is present. Absence and failures are
/// logged and reported, never raised.
pub fn export_or_skip<E: Exporter + ?Sized>(exporter: &E, source: &Path, target: &Path) -> ExportOutcome {
    if !exporter.is_available() {
        warn!(target: EXPORT, source = %source.display(), "export collaborator not available, skipping");
        return ExportOutcome::Unavailable;
    }
    match exporter.export(source, target) {
        Ok(()) => {
            info!(target: EXPORT, target_path = %target.display(), "exported");
            ExportOutcome::Exported(target.to_path_buf())
        }
        Err(err) => {
            warn!(target: EXPORT, source = %source.display(), error = %err, "export failed");
            ExportOutcome::Failed(err.to_string())
        }
    }
}
