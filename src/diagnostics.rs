use std::path::PathBuf;

use log::{error, info};

use crate::utils::RenewalError;

/// Side channel for diagnostic artifacts captured at failure points.
///
/// The engine calls `capture` at defined places (login failure, end-of-run
/// failure) instead of scattering file I/O through the workflow. Captures are
/// best-effort: a sink failure is logged by the caller and never masks the
/// error that triggered the capture.
pub trait DiagnosticsSink: Send + Sync {
    fn capture(&self, label: &str, png: &[u8]) -> Result<PathBuf, RenewalError>;
}

/// Writes screenshots as `{dir}/{label}.png`.
pub struct FileDiagnostics {
    dir: PathBuf,
}

impl FileDiagnostics {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileDiagnostics { dir: dir.into() }
    }
}

impl DiagnosticsSink for FileDiagnostics {
    fn capture(&self, label: &str, png: &[u8]) -> Result<PathBuf, RenewalError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            RenewalError::Config(format!(
                "failed to create artifacts dir {}: {}",
                self.dir.display(),
                e
            ))
        })?;
        let path = self.dir.join(format!("{}.png", label));
        std::fs::write(&path, png).map_err(|e| {
            RenewalError::Config(format!("failed to write {}: {}", path.display(), e))
        })?;
        info!("diagnostic screenshot saved to {}", path.display());
        Ok(path)
    }
}

/// Logs a failed capture without letting it replace the primary error.
pub fn capture_best_effort(sink: &dyn DiagnosticsSink, label: &str, png: &[u8]) {
    if let Err(e) = sink.capture(label, png) {
        error!("failed to save diagnostic screenshot {}: {}", label, e);
    }
}
