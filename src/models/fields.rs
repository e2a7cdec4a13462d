/// Fields extracted from a scanned certificate document.
///
/// Produced once per invocation by the field extractor and consumed once by
/// the submission step. Extraction is all-or-nothing: a document that yields
/// only one of the two fields fails the whole record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFields {
    /// Certificate document number, digits only.
    pub document_number: String,
    /// Expiry date in canonical DD/MM/YYYY form.
    pub expiry_date: String,
}

/// One certificate section discovered at runtime on the vehicle detail page.
///
/// The portal numbers the block's form fields dynamically, so the field id
/// suffix is deliberately absent here: it must be read from a live attribute
/// of the block's own inputs immediately before filling.
#[derive(Debug, Clone)]
pub struct CertificateBlock {
    /// Position within the enumerated certificate blocks.
    pub index: usize,
    pub displayed_name: String,
    pub is_expired: bool,
}
