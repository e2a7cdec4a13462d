use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::Mutex;

use crate::config::{Config, Credentials};
use crate::diagnostics::{capture_best_effort, DiagnosticsSink};
use crate::extraction::FieldExtract;
use crate::models::{CertificateRecord, CertificateStatus, ExtractedFields};
use crate::portal::driver::{BrowserDriver, DriverFactory};
use crate::portal::{certificates, session, vehicles};
use crate::storage::CertificateStore;
use crate::utils::RenewalError;

/// Bound on post-deadline cleanup so a wedged browser cannot hold the worker
/// hostage after the run already failed.
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(10);

type SessionSlot = Arc<Mutex<Option<Box<dyn BrowserDriver>>>>;

/// Owns the attempt lifecycle of one certificate record.
///
/// `run` is the engine's whole external surface: increment the attempt
/// counter, enforce the ceiling, drive extraction and the portal workflow
/// under one overall deadline, classify the outcome, and release the browser
/// session no matter what. Retry is never internal; it is a counted
/// re-invocation by the external queue.
pub struct RenewalEngine {
    config: Config,
    store: Arc<dyn CertificateStore>,
    extractor: Arc<dyn FieldExtract>,
    driver_factory: Arc<dyn DriverFactory>,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl RenewalEngine {
    pub fn new(
        config: Config,
        store: Arc<dyn CertificateStore>,
        extractor: Arc<dyn FieldExtract>,
        driver_factory: Arc<dyn DriverFactory>,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        RenewalEngine {
            config,
            store,
            extractor,
            driver_factory,
            diagnostics,
        }
    }

    pub async fn run(&self, certificate_id: u64) -> Result<(), RenewalError> {
        let mut record = self.store.load(certificate_id)?;
        record.attempt_count += 1;
        self.store.update(&record)?;
        info!(
            "certificate {}: attempt {} of {} (plate {}, certificate {:?})",
            record.id,
            record.attempt_count,
            self.config.engine.max_attempts,
            record.vehicle_plate,
            record.certificate_name
        );

        if record.attempt_count > self.config.engine.max_attempts {
            let err = RenewalError::MaxAttemptsExceeded {
                attempts: record.attempt_count,
                ceiling: self.config.engine.max_attempts,
            };
            error!("certificate {}: {}", record.id, err);
            record.transition(CertificateStatus::FailedMaxAttempts, Some(err.to_string()));
            self.store.update(&record)?;
            return Err(err);
        }

        // The driver lives in a shared slot so cleanup can reach it even
        // when the deadline cancels the workflow mid-step.
        let session_slot: SessionSlot = Arc::new(Mutex::new(None));
        let deadline = self.config.timing.overall_deadline();
        let outcome = match tokio::time::timeout(
            deadline,
            self.attempt_renewal(&record, Arc::clone(&session_slot)),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(RenewalError::Timeout(
                self.config.timing.overall_deadline_secs,
            )),
        };

        self.release_session(&record, &outcome, session_slot).await;
        self.classify_outcome(&mut record, outcome)
    }

    /// The linear workflow: extract, open a browser, log in, locate the
    /// vehicle, match the certificate, submit, guard and save.
    async fn attempt_renewal(
        &self,
        record: &CertificateRecord,
        session_slot: SessionSlot,
    ) -> Result<(), RenewalError> {
        if !record.source_file.exists() {
            return Err(RenewalError::Extraction(format!(
                "source file {} does not exist",
                record.source_file.display()
            )));
        }

        // OCR and image work are CPU-bound; keep them off the async workers.
        let extractor = Arc::clone(&self.extractor);
        let source = record.source_file.clone();
        let fields: ExtractedFields =
            tokio::task::spawn_blocking(move || extractor.extract(&source))
                .await
                .map_err(|e| {
                    RenewalError::Extraction(format!("extraction task panicked: {}", e))
                })??;

        let credentials = Credentials::from_env()?;
        let driver = self.driver_factory.create().await.map_err(|e| {
            RenewalError::Navigation(format!("failed to open a browser session: {}", e))
        })?;

        let mut slot = session_slot.lock().await;
        let driver = slot.insert(driver).as_mut();

        session::login(
            driver,
            &self.config.portal,
            &self.config.timing,
            &credentials,
            self.diagnostics.as_ref(),
        )
        .await?;
        let view = vehicles::find_vehicle(
            driver,
            &self.config.portal,
            &self.config.timing,
            &record.vehicle_plate,
        )
        .await?;
        info!(
            "certificate {}: vehicle {} opened from the {} view",
            record.id, record.vehicle_plate, view
        );
        let block = certificates::find_expired_certificate(
            driver,
            &self.config.timing,
            &record.certificate_name,
        )
        .await?;
        certificates::submit_certificate(
            driver,
            &self.config.timing,
            &block,
            &fields,
            &record.source_file,
        )
        .await?;
        certificates::guard_and_save(
            driver,
            &self.config.timing,
            &record.certificate_name,
            &record.vehicle_plate,
        )
        .await
    }

    /// Captures a failure screenshot and closes the browser, best-effort and
    /// time-bounded; neither step may mask the primary outcome.
    async fn release_session(
        &self,
        record: &CertificateRecord,
        outcome: &Result<(), RenewalError>,
        session_slot: SessionSlot,
    ) {
        let mut driver = match session_slot.lock().await.take() {
            Some(driver) => driver,
            None => return,
        };

        if outcome.is_err() {
            let label = format!("error_cert_{}", record.id);
            match tokio::time::timeout(CLEANUP_TIMEOUT, driver.screenshot()).await {
                Ok(Ok(png)) => capture_best_effort(self.diagnostics.as_ref(), &label, &png),
                Ok(Err(e)) => warn!("certificate {}: screenshot failed: {}", record.id, e),
                Err(_) => warn!("certificate {}: screenshot timed out", record.id),
            }
        }

        match tokio::time::timeout(CLEANUP_TIMEOUT, driver.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(
                "certificate {}: failed to close the browser session: {}",
                record.id, e
            ),
            Err(_) => warn!(
                "certificate {}: browser session close timed out",
                record.id
            ),
        }
    }

    /// Maps the workflow outcome onto the record's terminal or retryable
    /// status. The status write is the invocation's last act for the record.
    fn classify_outcome(
        &self,
        record: &mut CertificateRecord,
        outcome: Result<(), RenewalError>,
    ) -> Result<(), RenewalError> {
        match outcome {
            Ok(()) => {
                info!("certificate {}: renewal sent", record.id);
                record.transition(CertificateStatus::Sent, None);
                self.store.update(record)?;
                Ok(())
            }
            Err(RenewalError::OtherExpiredCertificate(msg)) => {
                error!("certificate {}: {}", record.id, msg);
                record.transition(CertificateStatus::FailedOtherExpired, Some(msg.clone()));
                self.store.update(record)?;
                Err(RenewalError::OtherExpiredCertificate(msg))
            }
            Err(err) => {
                error!("certificate {}: attempt failed: {}", record.id, err);
                record.transition(CertificateStatus::Failed, Some(err.to_string()));
                self.store.update(record)?;
                Err(err)
            }
        }
    }
}
