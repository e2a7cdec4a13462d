use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use crate::extraction::date::normalize_expiry_date;

lazy_static! {
    /// Anchors for the certificate number: the document-type keyword (with
    /// its most common misread) or the word CERTIFICADO, followed by an
    /// optional "N" label, an optional series letter, and the digit run.
    /// Ordered by specificity; the first pattern with a hit wins.
    static ref DOCUMENT_NUMBER_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"C[I1]PP\s+(?:N[ºO0]?\s+)?((?:[A-Z]\s+)?\d{4,})").unwrap(),
        Regex::new(r"CERTIFICADO\s+(?:N[ºO0]?\s+)?((?:[A-Z]\s+)?\d{4,})").unwrap(),
    ];

    /// Slash-separated date with OCR slack: the day tolerates digit-shaped
    /// letters, the month tolerates letters and digits, the year is 2 or 4
    /// digits.
    static ref DATE_PATTERN: Regex =
        Regex::new(r"([0-9OISZ]{1,2})\s*/\s*([A-Z0-9]{3,4}|\d{1,2})\s*/\s*(\d{4}|\d{2})").unwrap();
}

/// Flattens raw OCR output into a single searchable line: everything that is
/// not alphanumeric, a space, or a slash becomes a space, runs of whitespace
/// collapse, and the result is uppercased. Slashes survive because dates
/// depend on them.
pub fn clean_ocr_text(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '/' {
                c
            } else {
                ' '
            }
        })
        .collect();
    mapped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Finds the certificate number in cleaned text. The series letter and any
/// spacing are stripped: the stored number is digits only.
pub fn extract_document_number(text: &str) -> Option<String> {
    for pattern in DOCUMENT_NUMBER_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            let digits: String = caps[1].chars().filter(|c| c.is_ascii_digit()).collect();
            if !digits.is_empty() {
                debug!("document number {:?} from match {:?}", digits, &caps[1]);
                return Some(digits);
            }
        }
    }
    None
}

/// Finds the expiry date in cleaned text and normalizes it to `DD/MM/YYYY`.
/// Certificates print the issue date before the validity date, so the last
/// date on the page is the one that counts.
pub fn extract_expiry_date(text: &str) -> Option<String> {
    let last = DATE_PATTERN.captures_iter(text).last()?;
    let normalized = normalize_expiry_date(&last[1], &last[2], &last[3]);
    if normalized.is_none() {
        debug!(
            "date-shaped text {:?}/{:?}/{:?} did not normalize to a real date",
            &last[1], &last[2], &last[3]
        );
    }
    normalized
}
