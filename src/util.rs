// Parsing and formatting helpers.
//
// Sheet cells arrive as free text; everything that turns them into numbers
// or turns numbers back into display strings lives here.
use num_format::{Locale, ToFormattedString};

/// Largest gap between two amounts still treated as a rounding difference.
pub const TOLERANCE: f64 = 0.01;

/// Absorbs binary representation error so a gap of exactly one cent
/// (e.g. `128.94 - 128.93`) stays inside the tolerance.
const TOLERANCE_SLACK: f64 = 1e-9;

/// Result of reading a numeric cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// The column is absent or the cell is blank.
    Missing,
    /// The cell has text that is not a number.
    Invalid(String),
    Value(f64),
}

/// Parse a numeric cell while being forgiving about formatting that is
/// common in spreadsheet exports.
///
/// - Trims whitespace.
/// - Strips a leading `$` and thousands separators like `","`.
/// - Rejects values that contain alphabetic characters.
pub fn parse_cell(s: Option<&str>) -> CellValue {
    let Some(s) = s.map(str::trim) else {
        return CellValue::Missing;
    };
    if s.is_empty() {
        return CellValue::Missing;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return CellValue::Invalid(s.to_string());
    }
    let cleaned: String = s.chars().filter(|c| *c != ',' && *c != '$').collect();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => CellValue::Value(v),
        _ => CellValue::Invalid(s.to_string()),
    }
}

/// Round an amount to whole hundredths, staying in floating point so
/// amounts of any size keep their sign.
pub fn round_cents(n: f64) -> f64 {
    (n * 100.0).round() / 100.0
}

/// True when `a` and `b` differ by no more than one cent.
pub fn within_tolerance(a: f64, b: f64) -> bool {
    (a - b).abs() <= TOLERANCE + TOLERANCE_SLACK
}

/// Insert the locale's thousands separator into a run of ASCII digits.
fn group_digits(digits: &str) -> String {
    let sep = Locale::en.separator();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 * sep.len());
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push_str(sep);
        }
        out.push(c);
    }
    out
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus locale-aware thousands separators,
    // e.g. `1,234,567.89`. The integer digits are grouped as text so
    // amounts beyond the `i64` range still print in full.
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let mut res = group_digits(int_part);
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    // `-0.00` reads as noise in a table.
    if n.is_sign_negative() && res.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

/// `$1,234.56`, or `-$1,234.56` for negative amounts.
pub fn format_currency(n: f64) -> String {
    let body = format_number(n.abs(), 2);
    if round_cents(n) < 0.0 {
        format!("-${}", body)
    } else {
        format!("${}", body)
    }
}

/// Currency with an explicit sign: `+$` undercharge, `-$` overcharge.
pub fn format_signed_currency(n: f64) -> String {
    let cents = round_cents(n);
    if cents == 0.0 {
        "$0.00".to_string()
    } else if cents > 0.0 {
        format!("+{}", format_currency(n))
    } else {
        format_currency(n)
    }
}
