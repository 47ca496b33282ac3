//! Field rules applied when a new credential is registered.
//!
//! Presence and format checks on the raw request live next to the handler;
//! the rules here need a clock or a default and are shared with tests.

use chrono::{Datelike, NaiveDate};

use crate::error::CoreError;
use crate::types::Timestamp;

/// Role assigned when the signup request does not name one.
pub const DEFAULT_ROLE: &str = "USER";

/// Minimum username length in characters.
pub const MIN_USERNAME_LEN: usize = 4;

/// Users must be strictly older than this many calendar years.
pub const MIN_AGE_YEARS: i32 = 13;

/// Parse a `YYYY-MM-DD` birth date and check the minimum age against `now`.
///
/// Age is the difference of calendar years, so a user born in 2010 is
/// treated as 14 for the whole of 2024.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use fleetwise_core::signup::parse_birth_date;
///
/// let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
/// assert!(parse_birth_date("1990-04-12", now).is_ok());
/// assert!(parse_birth_date("2011-01-01", now).is_err());
/// ```
pub fn parse_birth_date(raw: &str, now: Timestamp) -> Result<NaiveDate, CoreError> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| CoreError::Validation(format!("Invalid birth date '{raw}': {e}")))?;

    let age = now.year() - date.year();
    if age <= MIN_AGE_YEARS {
        return Err(CoreError::Validation(format!(
            "User must be older than {MIN_AGE_YEARS} years"
        )));
    }
    Ok(date)
}

/// Resolve the role to store, falling back to [`DEFAULT_ROLE`] for blanks.
pub fn resolve_role(requested: Option<&str>) -> String {
    match requested.map(str::trim) {
        Some(role) if !role.is_empty() => role.to_string(),
        _ => DEFAULT_ROLE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn adult_birth_date_is_accepted() {
        let date = parse_birth_date("1988-02-29", now()).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(1988, 2, 29).unwrap());
    }

    #[test]
    fn exactly_thirteen_years_is_rejected() {
        assert_matches!(
            parse_birth_date("2011-12-31", now()),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn fourteen_calendar_years_is_accepted() {
        assert!(parse_birth_date("2010-12-31", now()).is_ok());
    }

    #[test]
    fn malformed_birth_date_is_rejected() {
        let err = parse_birth_date("12/31/1990", now()).unwrap_err();
        assert!(err.to_string().contains("Invalid birth date"));
    }

    #[test]
    fn blank_role_falls_back_to_default() {
        assert_eq!(resolve_role(None), "USER");
        assert_eq!(resolve_role(Some("   ")), "USER");
        assert_eq!(resolve_role(Some("ADMIN")), "ADMIN");
    }
}
