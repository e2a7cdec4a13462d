use image::DynamicImage;
use log::{debug, warn};
use pdfium_render::prelude::*;

use crate::utils::RenewalError;

/// Hard cap on rendered page dimensions, guarding against absurd page sizes
/// or DPI settings exhausting memory.
const MAX_DIMENSION_PX: u32 = 4096;

/// PDF points per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Scanned certificates arrive either as PDFs or as plain raster images;
/// this signature sniff picks the decode path.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

/// Renders the pages of a source document at the given DPI.
pub trait PageRenderer: Send + Sync {
    fn render_pages(&self, file_bytes: &[u8], dpi: u32) -> Result<Vec<DynamicImage>, RenewalError>;
}

/// PDFium-backed renderer. Stateless: the upstream `Pdfium` handle is
/// `!Send`, so each call binds the library anew. The OS caches the
/// underlying dlopen, which makes repeat binds cheap.
pub struct PdfiumRenderer;

impl PdfiumRenderer {
    /// Fails fast when the PDFium library cannot be found.
    pub fn new() -> Result<Self, RenewalError> {
        let _ = bind_library()?;
        Ok(PdfiumRenderer)
    }
}

/// Locates the PDFium dynamic library: `PDFIUM_DYNAMIC_LIB_PATH` first,
/// then next to the running executable, then the system search path.
fn bind_library() -> Result<Pdfium, RenewalError> {
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| {
            RenewalError::Extraction(format!("failed to load PDFium from {}: {}", path, e))
        })?;
        return Ok(Pdfium::new(bindings));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            let lib_path =
                Pdfium::pdfium_platform_library_name_at_path(exe_dir.to_string_lossy().as_ref());
            if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                debug!("loaded PDFium from {}", exe_dir.display());
                return Ok(Pdfium::new(bindings));
            }
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        RenewalError::Extraction(format!(
            "PDFium library not found; set PDFIUM_DYNAMIC_LIB_PATH or install it: {}",
            e
        ))
    })?;
    Ok(Pdfium::new(bindings))
}

fn map_load_error(e: PdfiumError) -> RenewalError {
    let msg = format!("{}", e).to_lowercase();
    if msg.contains("password") || msg.contains("encrypt") {
        RenewalError::Extraction("PDF is password protected".to_string())
    } else {
        RenewalError::Extraction(format!("failed to load PDF: {}", e))
    }
}

/// Pixel dimensions for a rendered page, clamped to `MAX_DIMENSION_PX` with
/// the aspect ratio preserved.
fn render_dimensions(width_points: f32, height_points: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let largest = raw_w.max(raw_h);
    if largest > MAX_DIMENSION_PX as f32 {
        let ratio = MAX_DIMENSION_PX as f32 / largest;
        (
            ((raw_w * ratio) as u32).clamp(1, MAX_DIMENSION_PX),
            ((raw_h * ratio) as u32).clamp(1, MAX_DIMENSION_PX),
        )
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

impl PageRenderer for PdfiumRenderer {
    fn render_pages(&self, file_bytes: &[u8], dpi: u32) -> Result<Vec<DynamicImage>, RenewalError> {
        let pdfium = bind_library()?;
        let document = pdfium
            .load_pdf_from_byte_slice(file_bytes, None)
            .map_err(map_load_error)?;

        let mut pages = Vec::new();
        for (index, page) in document.pages().iter().enumerate() {
            let (target_w, target_h) =
                render_dimensions(page.width().value, page.height().value, dpi);
            if target_w == MAX_DIMENSION_PX || target_h == MAX_DIMENSION_PX {
                warn!("page {} capped to {}px for rendering", index, MAX_DIMENSION_PX);
            }

            let config = PdfRenderConfig::new()
                .set_target_width(target_w as i32)
                .set_maximum_height(target_h as i32);
            let bitmap = page.render_with_config(&config).map_err(|e| {
                RenewalError::Extraction(format!("failed to render page {}: {}", index, e))
            })?;
            pages.push(bitmap.as_image());
        }

        debug!("rendered {} page(s) at {} dpi", pages.len(), dpi);
        Ok(pages)
    }
}
