use log::{info, warn};

use crate::config::{Credentials, PortalConfig, TimingConfig};
use crate::diagnostics::{capture_best_effort, DiagnosticsSink};
use crate::portal::driver::{BrowserDriver, DriverError};
use crate::portal::selectors;
use crate::utils::RenewalError;

/// Authenticates the browser session against the portal.
///
/// The portal intermittently serves an "unexpected error" page instead of the
/// post-login dashboard redirect. That page is a known instability, not a
/// credential problem: the session usually is authenticated underneath, so
/// the recovery is a short pause, a reload, and a second, more patient wait
/// for the dashboard. Any other missed redirect is unrecoverable.
///
/// Every login failure captures a screenshot before propagating.
pub async fn login(
    driver: &mut dyn BrowserDriver,
    portal: &PortalConfig,
    timing: &TimingConfig,
    credentials: &Credentials,
    diagnostics: &dyn DiagnosticsSink,
) -> Result<(), RenewalError> {
    if credentials.user.is_empty() || credentials.password.is_empty() {
        return Err(RenewalError::Authentication(
            "portal credentials are empty".to_string(),
        ));
    }

    match attempt_login(driver, portal, timing, credentials).await {
        Ok(()) => {
            info!("authenticated against the portal");
            Ok(())
        }
        Err(e) => {
            if let Ok(png) = driver.screenshot().await {
                capture_best_effort(diagnostics, "login_error", &png);
            }
            Err(e)
        }
    }
}

async fn attempt_login(
    driver: &mut dyn BrowserDriver,
    portal: &PortalConfig,
    timing: &TimingConfig,
    credentials: &Credentials,
) -> Result<(), RenewalError> {
    driver
        .goto(&portal.login_url)
        .await
        .map_err(|e| RenewalError::Navigation(format!("failed to open login page: {}", e)))?;
    driver
        .wait_visible(selectors::LOGIN_USER_INPUT, timing.step_timeout())
        .await
        .map_err(|e| RenewalError::Navigation(format!("login form never appeared: {}", e)))?;

    driver
        .fill(selectors::LOGIN_USER_INPUT, &credentials.user)
        .await
        .map_err(|e| RenewalError::Authentication(format!("failed to fill username: {}", e)))?;
    driver
        .fill(selectors::LOGIN_PASSWORD_INPUT, &credentials.password)
        .await
        .map_err(|e| RenewalError::Authentication(format!("failed to fill password: {}", e)))?;
    driver
        .click(selectors::LOGIN_SUBMIT)
        .await
        .map_err(|e| RenewalError::Authentication(format!("failed to submit login: {}", e)))?;

    // Fail fast on the first dashboard wait so the instability check runs
    // while there is still deadline budget left.
    match driver
        .wait_url_contains(&portal.dashboard_url, timing.dashboard_short())
        .await
    {
        Ok(()) => Ok(()),
        Err(original @ DriverError::WaitTimeout { .. }) => {
            warn!("dashboard redirect missed; checking for the transient error page");
            if transient_error_visible(driver).await {
                warn!("transient error page detected, recovering the session");
                tokio::time::sleep(timing.login_recovery_pause()).await;
                driver.reload().await.map_err(|e| {
                    RenewalError::Navigation(format!("reload during login recovery failed: {}", e))
                })?;
                driver
                    .wait_url_contains(&portal.dashboard_url, timing.dashboard_long())
                    .await
                    .map_err(|e| {
                        RenewalError::Navigation(format!(
                            "dashboard not reached after recovery: {}",
                            e
                        ))
                    })
            } else {
                Err(RenewalError::Navigation(format!(
                    "dashboard not reached after login: {}",
                    original
                )))
            }
        }
        Err(e) => Err(RenewalError::Navigation(format!(
            "dashboard redirect check failed: {}",
            e
        ))),
    }
}

async fn transient_error_visible(driver: &mut dyn BrowserDriver) -> bool {
    match driver
        .visible_texts(selectors::TRANSIENT_ERROR_CONTAINER)
        .await
    {
        Ok(texts) => texts
            .iter()
            .any(|t| t.contains(selectors::TRANSIENT_ERROR_TEXT)),
        Err(_) => false,
    }
}
