//! Locale-tolerant amount parsing and French display formatting.
//!
//! Amounts are typed by hand, so parsing accepts either `,` or `.` as the
//! decimal separator and ignores any whitespace used for grouping. Display
//! always uses a space between thousands and a comma before decimals.
//!
//! Nothing in here fails loudly: unparseable input becomes `None`, `"0"` or
//! a best-effort rendering of what was typed.

use tracing::debug;

/// Fraction digits kept by `format_comma_number`
pub const MAX_FRACTION_DIGITS: usize = 2;

const GROUP_SEPARATOR: char = ' ';
const DECIMAL_SEPARATOR: char = ',';

/// Parse a hand-typed amount.
///
/// Whitespace anywhere is dropped and `,` counts as the decimal point.
/// Returns `None` for empty input, a lone `.` or `-`, anything that is not a
/// number and non-finite results.
pub fn to_number_loose(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    if cleaned.is_empty() || cleaned == "." || cleaned == "-" {
        return None;
    }

    match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(n),
        _ => {
            debug!("Could not parse amount {:?}", raw);
            None
        }
    }
}

/// Render a number as "1 234,5".
pub fn format_comma_number(n: f64) -> String {
    if !n.is_finite() {
        return "0".to_string();
    }

    let fixed = format!("{:.*}", MAX_FRACTION_DIGITS, n.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac = frac_part.trim_end_matches('0');

    let mut out = String::new();
    // -0.001 rounds to zero and shows without a sign
    if n < 0.0 && (int_part != "0" || !frac.is_empty()) {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    if !frac.is_empty() {
        out.push(DECIMAL_SEPARATOR);
        out.push_str(frac);
    }
    out
}

/// Loose parse then French formatting, `"0"` when the input is not a number.
pub fn format_number_text_fr(raw: &str) -> String {
    to_number_loose(raw)
        .map(format_comma_number)
        .unwrap_or_else(|| "0".to_string())
}

/// Format an amount while it is being typed.
///
/// Works on the characters only, never on a parsed value, so "12," and
/// "12,0" survive as typed. The first `.` or `,` is the decimal separator
/// and is always shown as `,`.
pub fn format_input_number_display(raw: &str) -> String {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let (negative, body) = match compact.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, compact.as_str()),
    };

    let (int_raw, frac_raw) = match body.find(|c: char| c == '.' || c == ',') {
        Some(pos) => (&body[..pos], Some(&body[pos + 1..])),
        None => (body, None),
    };

    let int_digits: String = int_raw.chars().filter(char::is_ascii_digit).collect();

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    match frac_raw {
        Some(frac_raw) => {
            if int_digits.is_empty() {
                out.push('0');
            } else {
                out.push_str(&group_thousands(&int_digits));
            }
            out.push(DECIMAL_SEPARATOR);
            out.extend(frac_raw.chars().filter(char::is_ascii_digit));
        }
        None => out.push_str(&group_thousands(&int_digits)),
    }
    out
}

/// Insert a space every three digits from the right.
pub(crate) fn group_thousands(digits: &str) -> String {
    let len = digits.chars().count();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(GROUP_SEPARATOR);
        }
        out.push(c);
    }
    out
}
