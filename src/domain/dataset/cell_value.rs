// ============================================================
// CELL VALUE
// ============================================================
// A single value in a dataset: string, number or null

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cell. Serialized as a bare JSON `null`, number or string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Number(f64),
    Text(String),
}

/// Coarse type of a cell, used for column profiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellKind {
    Null,
    Number,
    Text,
}

impl CellValue {
    /// Interpret a raw text field the way report exports are usually read:
    /// blank is null, finite decimals are numbers, everything else is text.
    ///
    /// Identifiers with leading zeros ("00123") stay text so they survive
    /// a store round-trip unchanged.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Null;
        }

        match parse_number(trimmed) {
            Some(n) => CellValue::Number(n),
            None => CellValue::Text(trimmed.to_string()),
        }
    }

    /// A value that is already typed as text: blank is null, nothing is parsed.
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            CellValue::Null
        } else {
            CellValue::Text(trimmed.to_string())
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn kind(&self) -> CellKind {
        match self {
            CellValue::Null => CellKind::Null,
            CellValue::Number(_) => CellKind::Number,
            CellValue::Text(_) => CellKind::Text,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        if value.is_finite() {
            CellValue::Number(value)
        } else {
            CellValue::Null
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

const MAX_EXACT_DIGITS: usize = 15;

fn parse_number(value: &str) -> Option<f64> {
    let unsigned = value
        .strip_prefix('-')
        .or_else(|| value.strip_prefix('+'))
        .unwrap_or(value);

    let bytes = unsigned.as_bytes();
    if bytes.len() > 1 && bytes[0] == b'0' && bytes[1].is_ascii_digit() {
        return None;
    }

    // Integers beyond f64's exact range keep their digits as text
    if unsigned.bytes().all(|b| b.is_ascii_digit()) && unsigned.len() > MAX_EXACT_DIGITS {
        return None;
    }

    // Only plain decimal notation; "inf", "NaN" and friends stay text.
    if !unsigned
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+'))
    {
        return None;
    }

    value.parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_classifies_values() {
        assert_eq!(CellValue::from_raw("  "), CellValue::Null);
        assert_eq!(CellValue::from_raw("12.5"), CellValue::Number(12.5));
        assert_eq!(CellValue::from_raw("-3"), CellValue::Number(-3.0));
        assert_eq!(CellValue::from_raw("Acme Corp"), CellValue::text("Acme Corp"));
    }

    #[test]
    fn test_leading_zero_identifiers_stay_text() {
        assert_eq!(CellValue::from_raw("00123"), CellValue::text("00123"));
        assert_eq!(CellValue::from_raw("0.75"), CellValue::Number(0.75));
        assert_eq!(CellValue::from_raw("0"), CellValue::Number(0.0));
    }

    #[test]
    fn test_long_integer_identifiers_stay_text() {
        assert_eq!(
            CellValue::from_raw("12345678901234567"),
            CellValue::text("12345678901234567")
        );
        assert_eq!(
            CellValue::from_raw("-4000123412341234"),
            CellValue::text("-4000123412341234")
        );
        assert_eq!(
            CellValue::from_raw("123456789012345"),
            CellValue::Number(123_456_789_012_345.0)
        );
        assert_eq!(CellValue::from_raw("1234567.891234567"), CellValue::Number(1234567.891234567));
    }

    #[test]
    fn test_non_finite_words_stay_text() {
        assert_eq!(CellValue::from_raw("NaN"), CellValue::text("NaN"));
        assert_eq!(CellValue::from_raw("inf"), CellValue::text("inf"));
    }

    #[test]
    fn test_display_drops_integral_fraction() {
        assert_eq!(CellValue::Number(42.0).to_string(), "42");
        assert_eq!(CellValue::Number(4.25).to_string(), "4.25");
        assert_eq!(CellValue::Null.to_string(), "");
    }

    #[test]
    fn test_json_shape_is_untagged() {
        let cells = vec![
            CellValue::Null,
            CellValue::Number(1.5),
            CellValue::text("x"),
        ];
        let json = serde_json::to_string(&cells).unwrap();
        assert_eq!(json, r#"[null,1.5,"x"]"#);

        let back: Vec<CellValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cells);
    }
}
