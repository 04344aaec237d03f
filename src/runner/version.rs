//! Tool version gate
//!
//! Decides between "tool is recent enough" and "reinstall it" from a
//! version string a tool printed about itself.

use regex::Regex;
use std::sync::OnceLock;

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+(?:\.\d+)+|\d+").expect("valid version regex"))
}

/// Parse a dotted version into numeric components.
///
/// Each component contributes its leading digits; parsing stops at the first
/// component without any (`"2.0.0.rc1"` is `[2, 0, 0]`, `"1.10.6-beta"` is
/// `[1, 10, 6]`). A component too large for `u64` saturates. Returns `None`
/// if the first component is not numeric.
pub fn parse_version(s: &str) -> Option<Vec<u64>> {
    let mut components = Vec::new();

    for part in s.trim().split('.') {
        let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            break;
        }
        // only overflow can fail, the string is all digits
        components.push(digits.parse::<u64>().unwrap_or(u64::MAX));
        if digits.len() != part.len() {
            // trailing suffix such as "-beta" ends the version
            break;
        }
    }

    if components.is_empty() {
        None
    } else {
        Some(components)
    }
}

/// True if `observed` is at least `major.minor`.
///
/// Unparseable input is treated as too old.
pub fn is_at_least(observed: &str, minimum_major: u64, minimum_minor: u64) -> bool {
    match parse_version(observed) {
        Some(components) => {
            let major = components[0];
            let minor = components.get(1).copied().unwrap_or(0);
            (major, minor) >= (minimum_major, minimum_minor)
        }
        None => false,
    }
}

/// Parse a "MAJOR.MINOR" minimum
pub fn parse_minimum(s: &str) -> Option<(u64, u64)> {
    let components = parse_version(s)?;
    Some((components[0], components.get(1).copied().unwrap_or(0)))
}

/// Find the first version-looking token in a tool's output,
/// e.g. `"Bundler version 1.16.1"` gives `"1.16.1"`.
pub fn extract_version(output: &str) -> Option<&str> {
    version_pattern().find(output).map(|m| m.as_str())
}
