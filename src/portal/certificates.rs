use lazy_static::lazy_static;
use log::{info, warn};
use regex::Regex;

use crate::config::TimingConfig;
use crate::models::{CertificateBlock, ExtractedFields};
use crate::portal::driver::BrowserDriver;
use crate::portal::selectors;
use crate::utils::RenewalError;

use std::path::Path;

lazy_static! {
    /// The portal numbers each block's form fields at render time; the only
    /// reliable source for the suffix is the id of the block's own number
    /// input, read immediately before filling.
    static ref FIELD_SUFFIX: Regex = Regex::new(r"licenca-numero-(\d+)").unwrap();
}

async fn block_title(
    driver: &mut dyn BrowserDriver,
    index: usize,
) -> Result<String, RenewalError> {
    let titles = driver
        .texts_within(
            selectors::CERTIFICATE_BLOCK,
            index,
            selectors::CERTIFICATE_TITLE,
        )
        .await
        .map_err(|e| {
            RenewalError::Navigation(format!("failed to read certificate title: {}", e))
        })?;
    Ok(titles.first().map(|t| t.trim().to_string()).unwrap_or_default())
}

/// A block is expired when it carries the red badge and the badge says so;
/// the badge class alone also marks other warnings on some portal skins.
async fn block_is_expired(
    driver: &mut dyn BrowserDriver,
    index: usize,
) -> Result<bool, RenewalError> {
    let badges = driver
        .texts_within(selectors::CERTIFICATE_BLOCK, index, selectors::EXPIRED_BADGE)
        .await
        .map_err(|e| {
            RenewalError::Navigation(format!("failed to read certificate badge: {}", e))
        })?;
    Ok(badges
        .iter()
        .any(|text| text.contains(selectors::EXPIRED_BADGE_TEXT)))
}

async fn enumerate_blocks(
    driver: &mut dyn BrowserDriver,
) -> Result<Vec<CertificateBlock>, RenewalError> {
    let count = driver
        .count(selectors::CERTIFICATE_BLOCK)
        .await
        .map_err(|e| {
            RenewalError::Navigation(format!("failed to count certificate blocks: {}", e))
        })?;
    let mut blocks = Vec::with_capacity(count);
    for index in 0..count {
        blocks.push(CertificateBlock {
            index,
            displayed_name: block_title(driver, index).await?,
            is_expired: block_is_expired(driver, index).await?,
        });
    }
    Ok(blocks)
}

/// Opens the certificates tab and finds the one block whose title contains
/// `certificate_name` (case-insensitively) and that is marked expired.
///
/// An unexpired block with a matching name is skipped: only expired
/// certificates are eligible for renewal.
pub async fn find_expired_certificate(
    driver: &mut dyn BrowserDriver,
    timing: &TimingConfig,
    certificate_name: &str,
) -> Result<CertificateBlock, RenewalError> {
    driver
        .click(selectors::CERTIFICATES_TAB)
        .await
        .map_err(|e| {
            RenewalError::Navigation(format!("failed to open the certificates tab: {}", e))
        })?;
    driver
        .wait_visible(selectors::CERTIFICATE_BLOCK, timing.step_timeout())
        .await
        .map_err(|_| {
            RenewalError::NotFound("vehicle has no certificate blocks".to_string())
        })?;

    let wanted = certificate_name.trim().to_uppercase();
    let blocks = enumerate_blocks(driver).await?;
    info!("found {} certificate block(s)", blocks.len());

    for block in blocks {
        let name_matches = block.displayed_name.to_uppercase().contains(&wanted);
        if name_matches && block.is_expired {
            info!(
                "certificate {:?} (expired) found at block {}",
                block.displayed_name, block.index
            );
            return Ok(block);
        }
        if name_matches {
            info!(
                "certificate {:?} matches but is not expired, skipping",
                block.displayed_name
            );
        }
    }

    Err(RenewalError::NotFound(format!(
        "no expired certificate matching {:?} on this vehicle",
        certificate_name
    )))
}

/// Fills the matched block's update form with the extracted fields, attaches
/// the scanned file and submits, waiting for the portal's explicit success
/// area. A fixed post-submit delay is not a success signal.
pub async fn submit_certificate(
    driver: &mut dyn BrowserDriver,
    timing: &TimingConfig,
    block: &CertificateBlock,
    fields: &ExtractedFields,
    source_file: &Path,
) -> Result<(), RenewalError> {
    driver
        .click_within(
            selectors::CERTIFICATE_BLOCK,
            block.index,
            selectors::UPDATE_BUTTON,
        )
        .await
        .map_err(|e| RenewalError::Submission(format!("failed to open the update form: {}", e)))?;
    driver
        .wait_visible_within(
            selectors::CERTIFICATE_BLOCK,
            block.index,
            selectors::NUMBER_INPUT,
            timing.step_timeout(),
        )
        .await
        .map_err(|e| RenewalError::Submission(format!("update form never appeared: {}", e)))?;

    let input_id = driver
        .attr_within(
            selectors::CERTIFICATE_BLOCK,
            block.index,
            selectors::NUMBER_INPUT,
            "id",
        )
        .await
        .map_err(|e| RenewalError::Submission(format!("failed to read the field id: {}", e)))?
        .unwrap_or_default();
    let suffix = FIELD_SUFFIX
        .captures(&input_id)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| {
            RenewalError::Submission(format!(
                "could not extract the dynamic field suffix from id {:?}",
                input_id
            ))
        })?;

    driver
        .fill(
            &format!("#licenca-numero-{}", suffix),
            &fields.document_number,
        )
        .await
        .map_err(|e| {
            RenewalError::Submission(format!("failed to fill the document number: {}", e))
        })?;
    driver
        .fill(
            &format!("#licenca-vencimento-{}", suffix),
            &fields.expiry_date,
        )
        .await
        .map_err(|e| RenewalError::Submission(format!("failed to fill the expiry date: {}", e)))?;
    driver
        .upload_within(
            selectors::CERTIFICATE_BLOCK,
            block.index,
            selectors::FILE_INPUT,
            source_file,
        )
        .await
        .map_err(|e| RenewalError::Submission(format!("failed to attach the document: {}", e)))?;
    driver
        .click_text_within(
            selectors::CERTIFICATE_BLOCK,
            block.index,
            selectors::BLOCK_BUTTONS,
            selectors::SUBMIT_BUTTON_TEXT,
        )
        .await
        .map_err(|e| RenewalError::Submission(format!("failed to submit the form: {}", e)))?;
    driver
        .wait_visible(selectors::SUCCESS_AREA, timing.step_timeout())
        .await
        .map_err(|e| {
            RenewalError::Submission(format!("no success confirmation after submit: {}", e))
        })?;

    info!(
        "certificate {} submitted with number {} valid until {}",
        block.displayed_name, fields.document_number, fields.expiry_date
    );
    Ok(())
}

/// The pre-save guard: the portal refuses to persist a vehicle carrying any
/// unresolved expired certificate, so saving with one present would fail
/// server-side with a far less actionable message.
///
/// "Other" is decided by displayed name, not block index: the just-submitted
/// block keeps its badge until the page-level save, and the blocks may
/// re-render between submission and this check.
pub async fn guard_and_save(
    driver: &mut dyn BrowserDriver,
    timing: &TimingConfig,
    target_name: &str,
    plate: &str,
) -> Result<(), RenewalError> {
    let wanted = target_name.trim().to_uppercase();
    for block in enumerate_blocks(driver).await? {
        if block.is_expired && !block.displayed_name.to_uppercase().contains(&wanted) {
            warn!(
                "refusing to save: certificate {:?} is still expired",
                block.displayed_name
            );
            return Err(RenewalError::OtherExpiredCertificate(format!(
                "another expired certificate ({}) blocks saving vehicle {}",
                block.displayed_name, plate
            )));
        }
    }

    info!("no other expired certificate, saving the vehicle");
    driver
        .click(selectors::SAVE_BUTTON)
        .await
        .map_err(|e| RenewalError::Submission(format!("failed to trigger save: {}", e)))?;
    driver
        .wait_url_contains("/veiculo/index", timing.step_timeout())
        .await
        .map_err(|e| {
            RenewalError::Submission(format!("save was not confirmed by redirect: {}", e))
        })?;
    Ok(())
}
