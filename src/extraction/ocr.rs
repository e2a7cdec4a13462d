use std::io::{Cursor, Write};

use image::{DynamicImage, GrayImage, ImageOutputFormat};
use log::debug;
use tempfile::NamedTempFile;
use tesseract::{PageSegMode, Tesseract};

use crate::utils::RenewalError;

/// Page segmentation hint for a recognition pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrMode {
    /// Whole page with automatic layout analysis.
    Document,
    /// A cropped region known to hold a single block of text.
    Block,
}

/// Boundary to the OCR engine, so the extraction pipeline can be exercised
/// with scripted text in tests.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &GrayImage, mode: OcrMode) -> Result<String, RenewalError>;
}

/// Tesseract-backed engine. Each call writes the page to a temporary PNG and
/// runs a fresh Tesseract instance; the engine itself holds no state between
/// calls.
pub struct TesseractOcr {
    language: String,
    dpi: u32,
}

impl TesseractOcr {
    pub fn new(language: &str, dpi: u32) -> Self {
        TesseractOcr {
            language: language.to_string(),
            dpi,
        }
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, image: &GrayImage, mode: OcrMode) -> Result<String, RenewalError> {
        let mut png = Vec::new();
        DynamicImage::ImageLuma8(image.clone())
            .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
            .map_err(|e| RenewalError::Extraction(format!("failed to encode page for OCR: {}", e)))?;

        let mut temp_file = NamedTempFile::new()
            .map_err(|e| RenewalError::Extraction(format!("failed to create temporary file: {}", e)))?;
        temp_file
            .write_all(&png)
            .map_err(|e| RenewalError::Extraction(format!("failed to write temporary file: {}", e)))?;
        let path_str = temp_file
            .path()
            .to_str()
            .ok_or_else(|| RenewalError::Extraction("temporary path is not valid UTF-8".to_string()))?;

        let mut tess = Tesseract::new(None, Some(&self.language))
            .map_err(|e| RenewalError::Extraction(format!("failed to initialize Tesseract: {}", e)))?
            // The rendered PNG carries no DPI metadata, so tell Tesseract.
            .set_variable("user_defined_dpi", &self.dpi.to_string())
            .map_err(|e| RenewalError::Extraction(format!("failed to set Tesseract variable: {}", e)))?;

        // Set page seg mode separately as it modifies in-place.
        tess.set_page_seg_mode(match mode {
            OcrMode::Document => PageSegMode::PsmAuto,
            OcrMode::Block => PageSegMode::PsmSingleBlock,
        });

        tess = tess
            .set_image(path_str)
            .map_err(|e| RenewalError::Extraction(format!("failed to set image: {}", e)))?;
        let text = tess
            .get_text()
            .map_err(|e| RenewalError::Extraction(format!("failed to extract text: {}", e)))?;

        debug!("OCR pass ({:?}) produced {} characters", mode, text.len());
        Ok(text)
    }
}
