pub mod date;
pub mod normalize;
pub mod ocr;
pub mod parser;
pub mod pdf;

use std::path::Path;

use image::imageops;
use image::GrayImage;
use log::{debug, info};

use crate::config::{ExtractionConfig, OcrRegion};
use crate::models::ExtractedFields;
use crate::utils::RenewalError;

pub use normalize::PageNormalizer;
pub use ocr::{OcrEngine, OcrMode, TesseractOcr};
pub use pdf::{PageRenderer, PdfiumRenderer};

/// Boundary the engine drives the OCR pipeline through; lets the whole
/// browser workflow be tested without Tesseract or PDFium installed.
pub trait FieldExtract: Send + Sync {
    fn extract(&self, source: &Path) -> Result<ExtractedFields, RenewalError>;
}

/// Extracts the certificate number and expiry date from a scanned document.
///
/// PDFs are rendered page by page; plain raster scans are decoded directly.
/// Each page is normalized, then recognized region by region (when regions
/// are configured) and finally whole-page. Fields may be found on different
/// pages; extraction stops as soon as both are in hand.
pub struct FieldExtractor {
    renderer: Box<dyn PageRenderer>,
    ocr: Box<dyn OcrEngine>,
    normalizer: PageNormalizer,
    config: ExtractionConfig,
}

impl FieldExtractor {
    pub fn new(
        config: ExtractionConfig,
        renderer: Box<dyn PageRenderer>,
        ocr: Box<dyn OcrEngine>,
    ) -> Self {
        let normalizer = PageNormalizer::new(config.deskew);
        FieldExtractor {
            renderer,
            ocr,
            normalizer,
            config,
        }
    }

    /// Production wiring: PDFium for rendering, Tesseract for recognition.
    pub fn with_defaults(config: ExtractionConfig) -> Result<Self, RenewalError> {
        let renderer = Box::new(PdfiumRenderer::new()?);
        let ocr = Box::new(TesseractOcr::new(&config.language, config.dpi));
        Ok(Self::new(config, renderer, ocr))
    }
}

impl FieldExtract for FieldExtractor {
    fn extract(&self, source: &Path) -> Result<ExtractedFields, RenewalError> {
        let bytes = std::fs::read(source).map_err(|e| {
            RenewalError::Extraction(format!("failed to read {}: {}", source.display(), e))
        })?;

        let pages = if pdf::looks_like_pdf(&bytes) {
            self.renderer.render_pages(&bytes, self.config.dpi)?
        } else {
            let img = image::load_from_memory(&bytes).map_err(|e| {
                RenewalError::Extraction(format!(
                    "{} is neither a PDF nor a readable image: {}",
                    source.display(),
                    e
                ))
            })?;
            vec![img]
        };
        if pages.is_empty() {
            return Err(RenewalError::Extraction(format!(
                "{} contains no pages",
                source.display()
            )));
        }

        let mut document_number: Option<String> = None;
        let mut expiry_date: Option<String> = None;

        for (page_index, page) in pages.iter().enumerate() {
            let normalized = self.normalizer.normalize(page);

            let mut targets: Vec<(GrayImage, OcrMode)> = self
                .config
                .regions
                .iter()
                .map(|region| (crop_region(&normalized, region), OcrMode::Block))
                .collect();
            targets.push((normalized, OcrMode::Document));

            for (target, mode) in &targets {
                if document_number.is_some() && expiry_date.is_some() {
                    break;
                }
                let text = self.ocr.recognize(target, *mode)?;
                let cleaned = parser::clean_ocr_text(&text);
                if document_number.is_none() {
                    document_number = parser::extract_document_number(&cleaned);
                }
                if expiry_date.is_none() {
                    expiry_date = parser::extract_expiry_date(&cleaned);
                }
            }

            if document_number.is_some() && expiry_date.is_some() {
                debug!("both fields in hand after page {}", page_index);
                break;
            }
        }

        match (document_number, expiry_date) {
            (Some(document_number), Some(expiry_date)) => {
                info!(
                    "extracted certificate {} valid until {} from {}",
                    document_number,
                    expiry_date,
                    source.display()
                );
                Ok(ExtractedFields {
                    document_number,
                    expiry_date,
                })
            }
            (None, _) => Err(RenewalError::Extraction(format!(
                "could not locate the certificate number in {}",
                source.display()
            ))),
            (_, None) => Err(RenewalError::Extraction(format!(
                "could not locate the expiry date in {}",
                source.display()
            ))),
        }
    }
}

/// Cuts a fractional region out of a normalized page, clamped to the page
/// bounds and never empty.
fn crop_region(page: &GrayImage, region: &OcrRegion) -> GrayImage {
    let (width, height) = page.dimensions();
    let x = ((region.x.clamp(0.0, 1.0) * width as f32) as u32).min(width.saturating_sub(1));
    let y = ((region.y.clamp(0.0, 1.0) * height as f32) as u32).min(height.saturating_sub(1));
    let w = ((region.width.clamp(0.0, 1.0) * width as f32) as u32).clamp(1, width - x);
    let h = ((region.height.clamp(0.0, 1.0) * height as f32) as u32).clamp(1, height - y);
    imageops::crop_imm(page, x, y, w, h).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Luma};
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct BlankRenderer {
        pages: usize,
        calls: Arc<AtomicUsize>,
    }

    impl BlankRenderer {
        fn new(pages: usize) -> Self {
            BlankRenderer {
                pages,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn calls_handle(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.calls)
        }
    }

    impl PageRenderer for BlankRenderer {
        fn render_pages(
            &self,
            _file_bytes: &[u8],
            _dpi: u32,
        ) -> Result<Vec<DynamicImage>, RenewalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..self.pages)
                .map(|_| DynamicImage::ImageLuma8(GrayImage::from_pixel(60, 40, Luma([255u8]))))
                .collect())
        }
    }

    struct ScriptedOcr {
        responses: Vec<String>,
        cursor: Arc<Mutex<usize>>,
        modes: Arc<Mutex<Vec<OcrMode>>>,
    }

    impl ScriptedOcr {
        fn new(responses: &[&str]) -> Self {
            ScriptedOcr {
                responses: responses.iter().map(|s| s.to_string()).collect(),
                cursor: Arc::new(Mutex::new(0)),
                modes: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Call count and recognition modes, observable after the engine is
        /// boxed away.
        fn probes(&self) -> (Arc<Mutex<usize>>, Arc<Mutex<Vec<OcrMode>>>) {
            (Arc::clone(&self.cursor), Arc::clone(&self.modes))
        }
    }

    impl OcrEngine for ScriptedOcr {
        fn recognize(&self, _image: &GrayImage, mode: OcrMode) -> Result<String, RenewalError> {
            self.modes.lock().unwrap().push(mode);
            let mut cursor = self.cursor.lock().unwrap();
            let index = (*cursor).min(self.responses.len() - 1);
            *cursor += 1;
            Ok(self.responses[index].clone())
        }
    }

    fn fake_pdf_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"%PDF-1.4 scripted").unwrap();
        file
    }

    fn plain_config() -> ExtractionConfig {
        ExtractionConfig {
            deskew: false,
            ..ExtractionConfig::default()
        }
    }

    #[test]
    fn test_extracts_both_fields_from_one_page() {
        let file = fake_pdf_file();
        let extractor = FieldExtractor::new(
            plain_config(),
            Box::new(BlankRenderer::new(1)),
            Box::new(ScriptedOcr::new(&["CIPP Nº: A 123456 VÁLIDO ATÉ: 05/FEV/26"])),
        );
        let fields = extractor.extract(file.path()).unwrap();
        assert_eq!(fields.document_number, "123456");
        assert_eq!(fields.expiry_date, "05/02/2026");
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let file = fake_pdf_file();
        let extractor = FieldExtractor::new(
            plain_config(),
            Box::new(BlankRenderer::new(1)),
            Box::new(ScriptedOcr::new(&["CIPP Nº: A 760379 VALIDADE 01/JAN/27"])),
        );
        let first = extractor.extract(file.path()).unwrap();
        let second = extractor.extract(file.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_fields_may_come_from_different_pages() {
        let file = fake_pdf_file();
        let extractor = FieldExtractor::new(
            plain_config(),
            Box::new(BlankRenderer::new(2)),
            Box::new(ScriptedOcr::new(&[
                "CERTIFICADO Nº 111222 sem data legível",
                "VENCIMENTO 01/JAN/27",
            ])),
        );
        let fields = extractor.extract(file.path()).unwrap();
        assert_eq!(fields.document_number, "111222");
        assert_eq!(fields.expiry_date, "01/01/2027");
    }

    #[test]
    fn test_missing_expiry_is_an_extraction_error() {
        let file = fake_pdf_file();
        let extractor = FieldExtractor::new(
            plain_config(),
            Box::new(BlankRenderer::new(1)),
            Box::new(ScriptedOcr::new(&["CIPP Nº A 123456 e nada mais"])),
        );
        let err = extractor.extract(file.path()).unwrap_err();
        assert!(matches!(err, RenewalError::Extraction(_)));
    }

    #[test]
    fn test_raster_scan_bypasses_pdf_renderer() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let scan = DynamicImage::ImageLuma8(GrayImage::from_pixel(30, 30, Luma([255u8])));
        let mut png = Vec::new();
        scan.write_to(
            &mut std::io::Cursor::new(&mut png),
            image::ImageOutputFormat::Png,
        )
        .unwrap();
        file.write_all(&png).unwrap();

        let renderer = BlankRenderer::new(1);
        let renderer_calls = renderer.calls_handle();
        let extractor = FieldExtractor::new(
            plain_config(),
            Box::new(renderer),
            Box::new(ScriptedOcr::new(&["C1PP N 998877 VALIDO ATE 10/MAR/28"])),
        );
        let fields = extractor.extract(file.path()).unwrap();
        assert_eq!(fields.document_number, "998877");
        assert_eq!(fields.expiry_date, "10/03/2028");
        assert_eq!(renderer_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_configured_region_is_recognized_first() {
        let file = fake_pdf_file();
        let mut config = plain_config();
        config.regions = vec![OcrRegion {
            x: 0.0,
            y: 0.5,
            width: 1.0,
            height: 0.5,
        }];
        let ocr = ScriptedOcr::new(&["CIPP Nº A 555666 VALIDADE 09/SET/29"]);
        let (calls, modes) = ocr.probes();
        let extractor = FieldExtractor::new(config, Box::new(BlankRenderer::new(1)), Box::new(ocr));
        let fields = extractor.extract(file.path()).unwrap();
        assert_eq!(fields.document_number, "555666");
        // Both fields came out of the region pass; the whole-page pass never
        // ran.
        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(modes.lock().unwrap()[0], OcrMode::Block);
    }

    #[test]
    fn test_unreadable_source_is_an_extraction_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not a document at all").unwrap();
        let extractor = FieldExtractor::new(
            plain_config(),
            Box::new(BlankRenderer::new(1)),
            Box::new(ScriptedOcr::new(&["irrelevant"])),
        );
        let err = extractor.extract(file.path()).unwrap_err();
        assert!(matches!(err, RenewalError::Extraction(_)));
    }
}
