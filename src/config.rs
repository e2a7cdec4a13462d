use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utils::RenewalError;

const PORTAL_BASE: &str = "https://sites.redeipiranga.com.br/WAPortranNew";

/// Portal credentials, read from the environment.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub const USER_VAR: &'static str = "PORTRAN_USER";
    pub const PASSWORD_VAR: &'static str = "PORTRAN_PASSWORD";

    /// Reads `PORTRAN_USER` / `PORTRAN_PASSWORD`. Absent or empty values are
    /// an authentication error: the engine must not reach the portal without
    /// both.
    pub fn from_env() -> Result<Self, RenewalError> {
        let user = std::env::var(Self::USER_VAR).ok().filter(|v| !v.is_empty());
        let password = std::env::var(Self::PASSWORD_VAR)
            .ok()
            .filter(|v| !v.is_empty());
        match (user, password) {
            (Some(user), Some(password)) => Ok(Credentials { user, password }),
            _ => Err(RenewalError::Authentication(format!(
                "{} and {} must be set in the environment",
                Self::USER_VAR,
                Self::PASSWORD_VAR
            ))),
        }
    }
}

/// Addresses and switches for the operator portal and the WebDriver endpoint.
/// These are configuration values, not protocol: any portal exposing the same
/// page structure works.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// WebDriver endpoint (chromedriver/geckodriver).
    pub webdriver_url: String,
    pub headless: bool,
    pub login_url: String,
    /// Post-login success signal: the browser must land here.
    pub dashboard_url: String,
    /// Vehicle list filtered to expired documents.
    pub expired_list_url: String,
    /// Vehicle list filtered to documents expiring soon.
    pub expiring_list_url: String,
    /// Optional unfiltered list, searched as a last resort when set.
    pub all_vehicles_url: Option<String>,
    /// URL fragment that confirms the page-level save redirected back to the
    /// vehicle list.
    pub vehicle_list_fragment: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        PortalConfig {
            webdriver_url: "http://localhost:4444".to_string(),
            headless: true,
            login_url: format!("{PORTAL_BASE}/usuario/exibir"),
            dashboard_url: format!("{PORTAL_BASE}/dashboard/index"),
            expired_list_url: format!(
                "{PORTAL_BASE}/veiculo/index?situacoesDocumentos=2&status=1,2,3,4,7"
            ),
            expiring_list_url: format!(
                "{PORTAL_BASE}/veiculo/index?situacoesDocumentos=3&status=1,2,3,4,7"
            ),
            all_vehicles_url: None,
            vehicle_list_fragment: "/veiculo/index".to_string(),
        }
    }
}

/// Nested timeouts for the portal workflow. Individual waits stay well inside
/// the overall deadline so a stuck step fails the step, not the whole driver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Bound on the whole login-through-save workflow.
    pub overall_deadline_secs: u64,
    /// Default bound for a single navigation or element wait.
    pub step_timeout_secs: u64,
    /// Bound for the vehicle results table to appear; non-appearance means
    /// "no rows in this view", not an error.
    pub table_timeout_secs: u64,
    /// First, fail-fast wait for the post-login dashboard redirect.
    pub dashboard_short_secs: u64,
    /// Second dashboard wait after recovering from the transient error page.
    pub dashboard_long_secs: u64,
    /// Pause before reloading when the transient error page is detected.
    pub login_recovery_pause_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            overall_deadline_secs: 90,
            step_timeout_secs: 60,
            table_timeout_secs: 30,
            dashboard_short_secs: 15,
            dashboard_long_secs: 60,
            login_recovery_pause_secs: 5,
        }
    }
}

impl TimingConfig {
    pub fn overall_deadline(&self) -> Duration {
        Duration::from_secs(self.overall_deadline_secs)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    pub fn table_timeout(&self) -> Duration {
        Duration::from_secs(self.table_timeout_secs)
    }

    pub fn dashboard_short(&self) -> Duration {
        Duration::from_secs(self.dashboard_short_secs)
    }

    pub fn dashboard_long(&self) -> Duration {
        Duration::from_secs(self.dashboard_long_secs)
    }

    pub fn login_recovery_pause(&self) -> Duration {
        Duration::from_secs(self.login_recovery_pause_secs)
    }
}

/// Fractional region of interest on a rendered page, all values in 0.0..=1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OcrRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Knobs for the OCR field-extraction pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Render resolution for PDF pages. Small printed fields need at least
    /// 300 DPI to recognize reliably.
    pub dpi: u32,
    /// Tesseract language model.
    pub language: String,
    /// Regions of interest to OCR instead of the whole page. Empty means
    /// whole-page recognition.
    pub regions: Vec<OcrRegion>,
    pub deskew: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        ExtractionConfig {
            dpi: 300,
            language: "por".to_string(),
            regions: Vec::new(),
            deskew: true,
        }
    }
}

/// Attempt-lifecycle settings owned by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Attempt ceiling: a record whose incremented attempt count exceeds this
    /// is permanently failed without touching the browser.
    pub max_attempts: u32,
    /// Where diagnostic screenshots are written.
    pub artifacts_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_attempts: 3,
            artifacts_dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub portal: PortalConfig,
    pub timing: TimingConfig,
    pub extraction: ExtractionConfig,
    pub engine: EngineConfig,
}

impl Config {
    /// Loads configuration from a JSON file; missing keys keep their
    /// defaults.
    pub fn from_file(path: &Path) -> Result<Self, RenewalError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RenewalError::Config(format!("failed to read config {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            RenewalError::Config(format!("failed to parse config {}: {}", path.display(), e))
        })
    }
}

/// Tests touching `PORTRAN_USER`/`PORTRAN_PASSWORD` serialize through this
/// lock; the environment is process-global and cargo runs tests in parallel.
#[cfg(test)]
pub(crate) fn lock_credentials_env() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}
