use log::{info, warn};

use crate::config::{PortalConfig, TimingConfig};
use crate::portal::driver::BrowserDriver;
use crate::portal::selectors;
use crate::utils::RenewalError;

/// Walks the candidate list views in order and opens the detail page of the
/// vehicle whose plate matches. Returns the name of the view that held it.
///
/// A view whose table never appears simply has no rows; that is expected for
/// a fleet with nothing expired and moves the search on to the next view.
/// Only exhausting every view is an error.
pub async fn find_vehicle(
    driver: &mut dyn BrowserDriver,
    portal: &PortalConfig,
    timing: &TimingConfig,
    plate: &str,
) -> Result<String, RenewalError> {
    let plate_upper = plate.trim().to_uppercase();
    let mut views: Vec<(&str, &str)> = vec![
        ("expired", portal.expired_list_url.as_str()),
        ("expiring-soon", portal.expiring_list_url.as_str()),
    ];
    if let Some(all) = &portal.all_vehicles_url {
        views.push(("all-vehicles", all.as_str()));
    }

    for (view_name, url) in &views {
        info!("searching for plate {} in the {} view", plate, view_name);
        if let Err(e) = driver.goto(url).await {
            warn!("could not open the {} view: {}", view_name, e);
            continue;
        }
        if driver
            .wait_visible(selectors::VEHICLE_TABLE, timing.table_timeout())
            .await
            .is_err()
        {
            info!("no vehicle table in the {} view", view_name);
            continue;
        }

        let rows = driver
            .count(selectors::VEHICLE_ROWS)
            .await
            .map_err(|e| RenewalError::Navigation(format!("failed to read vehicle rows: {}", e)))?;
        for row in 0..rows {
            let cells = driver
                .texts_within(selectors::VEHICLE_ROWS, row, selectors::VEHICLE_PLATE_CELL)
                .await
                .map_err(|e| {
                    RenewalError::Navigation(format!("failed to read plate cell: {}", e))
                })?;
            let cell_plate = cells.first().map(|s| s.trim().to_uppercase());
            let matched = cell_plate
                .as_deref()
                .is_some_and(|cell| cell.contains(&plate_upper));
            if !matched {
                continue;
            }

            info!("plate {} found in the {} view, opening it", plate, view_name);
            driver
                .click_within(selectors::VEHICLE_ROWS, row, selectors::VEHICLE_EDIT_LINK)
                .await
                .map_err(|e| {
                    RenewalError::Navigation(format!("failed to open the vehicle row: {}", e))
                })?;
            driver
                .wait_visible(selectors::CERTIFICATES_TAB, timing.step_timeout())
                .await
                .map_err(|e| {
                    RenewalError::Navigation(format!("vehicle detail page never loaded: {}", e))
                })?;
            return Ok(view_name.to_string());
        }
    }

    let searched: Vec<&str> = views.iter().map(|(name, _)| *name).collect();
    Err(RenewalError::NotFound(format!(
        "vehicle with plate {} not found in views: {}",
        plate,
        searched.join(", ")
    )))
}
