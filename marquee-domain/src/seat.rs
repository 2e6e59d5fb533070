use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeatIdError {
    #[error("malformed seat id: {0}")]
    Malformed(String),
    #[error("no seat ids supplied")]
    Empty,
}

// Canonical seat id: 1-3 uppercase letters followed by 1-3 digits (A1, AA12).
fn seat_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z]{1,3}[0-9]{1,3}$").expect("seat id regex"))
}

/// Normalizes a raw seat id list into canonical form:
/// trim + uppercase, skip blanks, validate format, dedupe, sort.
pub fn normalize_seat_ids<S: AsRef<str>>(input: &[S]) -> Result<Vec<String>, SeatIdError> {
    let mut seen = BTreeSet::new();

    for raw in input {
        let s = raw.as_ref().trim().to_uppercase();
        if s.is_empty() {
            continue;
        }
        if !seat_id_pattern().is_match(&s) {
            return Err(SeatIdError::Malformed(s));
        }
        seen.insert(s);
    }

    if seen.is_empty() {
        return Err(SeatIdError::Empty);
    }
    Ok(seen.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_uppercases_dedupes_and_sorts() {
        let got = normalize_seat_ids(&[" a1 ", "A1", "b2"]).unwrap();
        assert_eq!(got, vec!["A1".to_string(), "B2".to_string()]);
    }

    #[test]
    fn rejects_digit_first_ids() {
        assert_eq!(
            normalize_seat_ids(&["1A"]),
            Err(SeatIdError::Malformed("1A".into()))
        );
    }

    #[test]
    fn rejects_overlong_rows_and_numbers() {
        assert!(normalize_seat_ids(&["AAAA1"]).is_err());
        assert!(normalize_seat_ids(&["A1234"]).is_err());
        assert!(normalize_seat_ids(&["AAA123"]).is_ok());
    }

    #[test]
    fn blank_entries_are_skipped_but_all_blank_is_empty() {
        let got = normalize_seat_ids(&["", "  ", "C5"]).unwrap();
        assert_eq!(got, vec!["C5".to_string()]);
        assert_eq!(normalize_seat_ids(&["", "  "]), Err(SeatIdError::Empty));
        assert_eq!(normalize_seat_ids::<&str>(&[]), Err(SeatIdError::Empty));
    }
}
