// Utility helpers for parsing and number formatting.
//
// This module centralizes all the "dirty" cell handling so the rest of the
// code can assume clean, typed values.
use num_format::{Locale, ToFormattedString};

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in spreadsheet exports.
///
/// - Accepts `Option<&str>` so callers can pass through optional fields.
/// - Trims whitespace.
/// - Strips thousands separators like `","` before parsing.
/// - Returns `None` for anything that does not parse to a finite number
///   (`"NaN"` and `"inf"` included).
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let s = s.replace(',', "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse an integer cell. Spreadsheet readers hand integers back as floats,
/// so `"2020.0"` is accepted; `"2020.5"` is not.
pub fn parse_i64_safe(s: Option<&str>) -> Option<i64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let s = s.replace(',', "");
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    let f = s.parse::<f64>().ok().filter(|v| v.is_finite())?;
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Trimmed text, or `None` when the cell is blank.
pub fn non_blank(s: Option<String>) -> Option<String> {
    let s = s?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Format a floating-point value with:
    // - a fixed number of decimal places, and
    // - locale-aware thousands separators (e.g., `1,234,567.89`).
    let abs_n = n.abs();
    let s = format!("{:.*}", decimals, abs_n);
    // `-0.4` rounded to zero decimals prints as `0`, not `-0`.
    let neg = n < 0.0 && s.chars().any(|c| matches!(c, '1'..='9'));
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

/// Like [`format_number`] but always carries a sign, for deltas.
pub fn format_signed(n: f64, decimals: usize) -> String {
    if n > 0.0 {
        format!("+{}", format_number(n, decimals))
    } else {
        format_number(n, decimals)
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

// `tabled` display hooks.

pub fn display_amount(v: &f64) -> String {
    format_number(*v, 0)
}

pub fn display_opt_amount(v: &Option<f64>) -> String {
    match v {
        Some(v) => format_number(*v, 0),
        None => "-".to_string(),
    }
}
