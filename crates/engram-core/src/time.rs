//! Timestamp Handling
//!
//! All timestamps in the engine are UTC and serialised RFC-3339 with a
//! trailing `Z`. Client-supplied timestamps are rejected unless they parse
//! and carry the `Z` suffix.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{EngramError, Result};

/// Serialise a UTC timestamp as RFC-3339 with trailing `Z`
pub fn to_rfc3339_z(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a client-supplied timestamp, requiring UTC with trailing `Z`
pub fn parse_rfc3339_z(s: &str) -> Result<DateTime<Utc>> {
    if !s.ends_with('Z') {
        return Err(EngramError::InvalidRequest(format!(
            "timestamp must be UTC with trailing 'Z': {s}"
        )));
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EngramError::InvalidRequest(format!("timestamp does not parse: {s} ({e})")))
}

/// Parse a timestamp previously written by the engine itself.
///
/// Storage rows only ever contain engine-serialised values, so a parse
/// failure here is a storage corruption, not a client error.
pub fn parse_stored(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EngramError::Storage(format!("corrupt timestamp {s:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_has_z_suffix() {
        let now = Utc::now();
        let s = to_rfc3339_z(now);
        assert!(s.ends_with('Z'));
        let back = parse_rfc3339_z(&s).unwrap();
        assert_eq!(back.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn test_offset_form_rejected() {
        let err = parse_rfc3339_z("2026-08-01T10:00:00+00:00");
        assert!(err.is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(parse_rfc3339_z("last tuesdayZ").is_err());
    }
}
