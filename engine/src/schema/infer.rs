//! Scalar type inference for a single cell value.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use super::ColumnType;

/// Infer the type of one value in isolation. Empty or whitespace-only input
/// infers `Text`; the caller is responsible for treating it as a nullability
/// observation instead of a type observation.
pub fn infer_type(value: &str) -> ColumnType {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return ColumnType::Text;
    }
    if trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("false") {
        return ColumnType::Boolean;
    }
    if is_whole_number(trimmed) {
        return ColumnType::WholeNumber;
    }
    if is_floating_point(trimmed) {
        return ColumnType::FloatingPoint;
    }
    if parse_timestamp(trimmed).is_some() {
        return ColumnType::Timestamp;
    }
    ColumnType::Text
}

/// A 64-bit integer whose canonical rendering reproduces the input exactly.
/// "007" and "+5" would lose their spelling on a round trip, so they stay
/// `Text`.
fn is_whole_number(trimmed: &str) -> bool {
    match trimmed.parse::<i64>() {
        Ok(value) => value.to_string() == trimmed,
        Err(_) => false,
    }
}

/// Decimal or scientific notation. Non-finite spellings, explicit plus signs,
/// and leading-zero integers ("007.5") are rejected; "0.5" is canonical and
/// accepted.
fn is_floating_point(trimmed: &str) -> bool {
    if trimmed.starts_with('+') {
        return false;
    }
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    if digits.len() > 1 && digits.starts_with('0') && digits.as_bytes()[1].is_ascii_digit() {
        return false;
    }
    digits.bytes().any(|b| b.is_ascii_digit())
        && trimmed.parse::<f64>().is_ok_and(f64::is_finite)
}

/// Parse ISO-8601 and the common locale formats the inference and filter
/// paths accept. Date-only input lands at midnight.
pub fn parse_timestamp(trimmed: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }

    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
    ];
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt);
        }
    }

    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d %b %Y", "%B %d, %Y"];
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date.and_time(NaiveTime::MIN));
        }
    }
    None
}
