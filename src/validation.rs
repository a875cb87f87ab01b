// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Field validators for the onboarding forms.
//!
//! Messages here are rendered verbatim next to the offending input field by
//! the mobile client, so the exact strings are part of the API contract.

use crate::error::FieldErrors;
use chrono::NaiveDate;
use validator::ValidateEmail;

/// Required prefix of every wearable QR pairing payload.
pub const QR_PREFIX: &str = "HEALTHOS-";

/// Record a field check result in the error map.
pub fn apply(fields: &mut FieldErrors, field: &str, result: Option<&'static str>) {
    if let Some(message) = result {
        fields.insert(field.to_string(), message.to_string());
    }
}

/// Normalize raw date-of-birth input to a slash-separated date.
///
/// Strips everything but digits, caps at 8 digits, and inserts slashes after
/// the second and fourth digit, so "01021990" and "01/02/19/90" both become
/// "01/02/1990". The result depends only on the digit sequence, not on where
/// separators appeared in the input.
pub fn format_dob_digits(input: &str) -> String {
    let mut out = String::with_capacity(10);
    for (i, digit) in input
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(8)
        .enumerate()
    {
        if i == 2 || i == 4 {
            out.push('/');
        }
        out.push(digit);
    }
    out
}

/// Required field with a caller-chosen message (the sign-up form spells
/// out the field name, the patient form just says "Required").
pub fn require(value: &str, message: &'static str) -> Option<&'static str> {
    if value.trim().is_empty() {
        Some(message)
    } else {
        None
    }
}

pub fn check_required(value: &str) -> Option<&'static str> {
    require(value, "Required")
}

pub fn check_email(value: &str) -> Option<&'static str> {
    if value.trim().is_empty() {
        Some("Email is required")
    } else if !value.validate_email() {
        Some("Valid email required")
    } else {
        None
    }
}

pub fn check_password(value: &str) -> Option<&'static str> {
    if value.is_empty() {
        Some("Password is required")
    } else if value.len() < 8 {
        Some("Password must be at least 8 characters")
    } else {
        None
    }
}

/// Sign-up date of birth: MM/DD/YYYY.
pub fn check_dob_mdy(value: &str) -> Option<&'static str> {
    if value.is_empty() {
        return Some("Date of birth is required");
    }
    if !has_date_shape(value) {
        return Some("Use MM/DD/YYYY format");
    }
    if NaiveDate::parse_from_str(value, "%m/%d/%Y").is_err() {
        return Some("Invalid date");
    }
    None
}

/// Patient profile date of birth: DD/MM/YYYY.
///
/// Unlike the sign-up form, the patient form gives one hint for both the
/// shape and calendar failures.
pub fn check_dob_dmy(value: &str) -> Option<&'static str> {
    if !has_date_shape(value) || NaiveDate::parse_from_str(value, "%d/%m/%Y").is_err() {
        return Some("Use DD/MM/YYYY");
    }
    None
}

/// "NN/NN/NNNN" shape check, done before the calendar parse so the user
/// gets a format hint rather than "Invalid date" for partial input.
fn has_date_shape(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes[2] == b'/'
        && bytes[5] == b'/'
        && value
            .char_indices()
            .all(|(i, c)| if i == 2 || i == 5 { c == '/' } else { c.is_ascii_digit() })
}

/// Weight/height inputs: plain positive numbers.
///
/// Empty input reports "Invalid number" too, matching the single error the
/// form shows for these fields.
pub fn parse_positive_number(value: &str) -> Result<f64, &'static str> {
    match value.trim().parse::<f64>() {
        Ok(n) if n > 0.0 && n.is_finite() => Ok(n),
        _ => Err("Invalid number"),
    }
}

/// QR pairing payloads must carry the wearable prefix.
///
/// Checked before any remote call so a mis-scanned code never mutates
/// pairing state.
pub fn check_qr_payload(value: &str) -> Option<&'static str> {
    if value.starts_with(QR_PREFIX) {
        None
    } else {
        Some("Invalid QR format")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dob_mask_plain_digits() {
        assert_eq!(format_dob_digits("01021990"), "01/02/1990");
    }

    #[test]
    fn test_dob_mask_ignores_separator_positions() {
        // The mask is a function of the digit sequence only.
        assert_eq!(format_dob_digits("01/02/1990"), "01/02/1990");
        assert_eq!(format_dob_digits("01-02-1990"), "01/02/1990");
        assert_eq!(format_dob_digits("0/1021/990"), "01/02/1990");
    }

    #[test]
    fn test_dob_mask_partial_input() {
        assert_eq!(format_dob_digits(""), "");
        assert_eq!(format_dob_digits("0"), "0");
        assert_eq!(format_dob_digits("010"), "01/0");
        assert_eq!(format_dob_digits("01021"), "01/02/1");
    }

    #[test]
    fn test_dob_mask_truncates_to_eight_digits() {
        assert_eq!(format_dob_digits("010219901234"), "01/02/1990");
    }

    #[test]
    fn test_dob_mdy_shape_vs_calendar() {
        assert_eq!(check_dob_mdy(""), Some("Date of birth is required"));
        assert_eq!(check_dob_mdy("1/2/1990"), Some("Use MM/DD/YYYY format"));
        assert_eq!(check_dob_mdy("01-02-1990"), Some("Use MM/DD/YYYY format"));
        // Shape is fine, but February 30th does not exist.
        assert_eq!(check_dob_mdy("02/30/2000"), Some("Invalid date"));
        assert_eq!(check_dob_mdy("12/31/1999"), None);
    }

    #[test]
    fn test_dob_dmy_swaps_day_and_month() {
        // 31/12 is valid day-first but not month-first.
        assert_eq!(check_dob_dmy("31/12/1999"), None);
        assert_eq!(check_dob_dmy("12/31/1999"), Some("Use DD/MM/YYYY"));
        assert_eq!(check_dob_dmy("3/1/1999"), Some("Use DD/MM/YYYY"));
    }

    #[test]
    fn test_email_messages() {
        assert_eq!(check_email(""), Some("Email is required"));
        assert_eq!(check_email("   "), Some("Email is required"));
        assert_eq!(check_email("not-an-email"), Some("Valid email required"));
        assert_eq!(check_email("a@b.co"), None);
    }

    #[test]
    fn test_password_boundary() {
        assert_eq!(check_password(""), Some("Password is required"));
        assert_eq!(check_password("1234567"), Some("Password must be at least 8 characters"));
        assert_eq!(check_password("12345678"), None);
    }

    #[test]
    fn test_require_uses_given_message() {
        assert_eq!(require("", "First name is required"), Some("First name is required"));
        assert_eq!(require("  ", "Phone is required"), Some("Phone is required"));
        assert_eq!(require("Pat", "Required"), None);
    }

    #[test]
    fn test_positive_number() {
        assert_eq!(parse_positive_number("72.5"), Ok(72.5));
        assert_eq!(parse_positive_number(""), Err("Invalid number"));
        assert_eq!(parse_positive_number("abc"), Err("Invalid number"));
        assert_eq!(parse_positive_number("-3"), Err("Invalid number"));
        assert_eq!(parse_positive_number("0"), Err("Invalid number"));
    }

    #[test]
    fn test_qr_prefix() {
        assert_eq!(check_qr_payload("HEALTHOS-ABC123"), None);
        assert_eq!(check_qr_payload("healthos-abc123"), Some("Invalid QR format"));
        assert_eq!(check_qr_payload("XYZ-123"), Some("Invalid QR format"));
        assert_eq!(check_qr_payload(""), Some("Invalid QR format"));
    }
}
