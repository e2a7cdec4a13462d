use std::collections::HashMap;

use chrono::NaiveDate;
use lazy_static::lazy_static;
use log::debug;

lazy_static! {
    /// Portuguese month abbreviations as printed on the certificates, plus
    /// the misreads Tesseract produces for them on low-contrast scans.
    static ref MONTH_TOKENS: HashMap<&'static str, u32> = {
        let mut m = HashMap::new();
        m.insert("JAN", 1);
        m.insert("FEV", 2);
        m.insert("MAR", 3);
        m.insert("ABR", 4);
        m.insert("MAI", 5);
        m.insert("JUN", 6);
        m.insert("JUL", 7);
        m.insert("AGO", 8);
        m.insert("SET", 9);
        m.insert("OUT", 10);
        m.insert("NOV", 11);
        m.insert("DEZ", 12);
        // Common OCR confusions observed on real scans.
        m.insert("FEY", 2);
        m.insert("AG0", 8);
        m.insert("0UT", 10);
        m.insert("5ET", 9);
        m
    };
}

/// Maps characters Tesseract commonly substitutes for digits in the day
/// field back to the digit they stand for.
fn correct_digit(c: char) -> char {
    match c {
        'O' | 'o' => '0',
        'I' | 'i' | 'l' => '1',
        'S' | 's' => '5',
        'Z' | 'z' => '2',
        other => other,
    }
}

/// Resolves a month token to its number. Accepts plain numerals as well as
/// the Portuguese abbreviations and their known misreads.
pub fn month_number(token: &str) -> Option<u32> {
    let token = token.trim().to_uppercase();
    if let Ok(n) = token.parse::<u32>() {
        return (1..=12).contains(&n).then_some(n);
    }
    MONTH_TOKENS.get(token.as_str()).copied()
}

/// Expands a two-digit year around the pivot: values below 50 land in the
/// 2000s, the rest in the 1900s. Four-digit years pass through.
pub fn expand_year(raw: &str) -> Option<i32> {
    let digits: String = raw.chars().map(correct_digit).filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        2 => {
            let short: i32 = digits.parse().ok()?;
            Some(if short < 50 { 2000 + short } else { 1900 + short })
        }
        4 => digits.parse().ok(),
        _ => None,
    }
}

/// Normalizes the raw day/month/year captures from an OCR'd expiry date into
/// `DD/MM/YYYY`, correcting digit confusions and validating the result as a
/// real calendar date. Returns `None` when the captures do not form one.
pub fn normalize_expiry_date(day_raw: &str, month_raw: &str, year_raw: &str) -> Option<String> {
    let day_digits: String = day_raw
        .chars()
        .map(correct_digit)
        .filter(|c| c.is_ascii_digit())
        .collect();
    let day: u32 = day_digits.parse().ok()?;
    let month = month_number(month_raw)?;
    let year = expand_year(year_raw)?;

    if NaiveDate::from_ymd_opt(year, month, day).is_none() {
        debug!(
            "rejected implausible date {:02}/{:02}/{:04} from captures ({:?}, {:?}, {:?})",
            day, month, year, day_raw, month_raw, year_raw
        );
        return None;
    }

    Some(format!("{:02}/{:02}/{:04}", day, month, year))
}
