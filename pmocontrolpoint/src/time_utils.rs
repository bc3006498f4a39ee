//! Conversions between UPnP time strings and milliseconds.
//!
//! UPnP renderers and chapter indexes use `H+:MM:SS[.F+]` (fractions of a
//! second) while the rest of the crate works with integer milliseconds.

use crate::errors::ControlPointError;

/// Parses `H:MM:SS`, `H:MM:SS.mmm` (or `MM:SS[.mmm]`) into milliseconds.
///
/// # Examples
/// ```
/// # use pmocontrolpoint::time_utils::parse_hms_to_ms;
/// assert_eq!(parse_hms_to_ms("0:01:02.5").unwrap(), 62_500);
/// assert_eq!(parse_hms_to_ms("1:00:00").unwrap(), 3_600_000);
/// assert!(parse_hms_to_ms("0:61:00").is_err());
/// ```
pub fn parse_hms_to_ms(input: &str) -> Result<u64, ControlPointError> {
    let trimmed = input.trim();
    let invalid = || {
        ControlPointError::InvalidTimeFormat(format!(
            "Invalid time '{}': expected H:MM:SS[.mmm]",
            input
        ))
    };

    let (clock, fraction) = match trimmed.split_once('.') {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (trimmed, None),
    };

    let parts: Vec<&str> = clock.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => ("0", *m, *s),
        _ => return Err(invalid()),
    };

    let hours: u64 = hours.parse().map_err(|_| invalid())?;
    let minutes: u64 = minutes.parse().map_err(|_| invalid())?;
    let seconds: u64 = seconds.parse().map_err(|_| invalid())?;
    if minutes >= 60 || seconds >= 60 {
        return Err(invalid());
    }

    let millis = match fraction {
        None => 0,
        Some(f) if f.is_empty() || !f.chars().all(|c| c.is_ascii_digit()) => {
            return Err(invalid());
        }
        // Seules les trois premières décimales comptent
        Some(f) => {
            let digits: String = f.chars().chain("000".chars()).take(3).collect();
            digits.parse::<u64>().map_err(|_| invalid())?
        }
    };

    hours
        .checked_mul(60)
        .and_then(|m| m.checked_add(minutes))
        .and_then(|m| m.checked_mul(60))
        .and_then(|s| s.checked_add(seconds))
        .and_then(|s| s.checked_mul(1000))
        .and_then(|ms| ms.checked_add(millis))
        .ok_or_else(invalid)
}

/// Parses a floating point number of seconds (`"12.5"`) into milliseconds.
pub fn parse_seconds_to_ms(input: &str) -> Result<u64, ControlPointError> {
    let seconds: f64 = input.trim().parse().map_err(|_| {
        ControlPointError::InvalidTimeFormat(format!("Invalid seconds value '{}'", input))
    })?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(ControlPointError::InvalidTimeFormat(format!(
            "Seconds value out of range '{}'",
            input
        )));
    }
    Ok((seconds * 1000.0).round() as u64)
}

/// Formats milliseconds as `H:MM:SS` (UPnP `REL_TIME` target).
pub fn format_ms_as_hms(ms: u64) -> String {
    let total = ms / 1000;
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Parses an optional UPnP duration, treating `NOT_IMPLEMENTED` and empty values as absent.
pub fn parse_optional_hms(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("NOT_IMPLEMENTED") {
        return None;
    }
    parse_hms_to_ms(trimmed).ok()
}
