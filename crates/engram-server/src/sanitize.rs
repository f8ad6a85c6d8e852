//! Input Sanitisation
//!
//! Rejects script-injection patterns and oversize payloads before text
//! reaches the engine. Patterns are matched case-insensitively:
//! `<script`, `javascript:`, `vbscript:`, and inline event handlers
//! (`onload=`, `onerror=`, ...).

use regex::Regex;
use std::sync::LazyLock;

use engram_core::{EngramError, Result};

static INJECTION_PATTERNS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(<script|javascript:|vbscript:|\bon[a-z]+\s*=)")
        .expect("injection pattern compiles")
});

/// Validate a text field against the injection patterns and a byte
/// ceiling. `field` names the offending path in the error.
pub fn check_text(field: &str, value: &str, max_bytes: usize) -> Result<()> {
    if value.len() > max_bytes {
        return Err(EngramError::InvalidRequest(format!(
            "{field} exceeds {max_bytes} bytes ({} given)",
            value.len()
        )));
    }
    if let Some(found) = INJECTION_PATTERNS.find(value) {
        return Err(EngramError::InvalidRequest(format!(
            "{field} contains a disallowed pattern: {}",
            found.as_str()
        )));
    }
    Ok(())
}
