//! Variable interpolation for strings
//!
//! This module handles parsing and replacing variables in strings using the ${var} syntax.

use crate::error::{InterpolationError, InterpolationResult};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid interpolation regex"))
}

/// Interpolate variables in a string
///
/// `${var}` is replaced by `lookup(var)`; names the lookup does not know are
/// left untouched so the shell can still expand them. The first lookup error
/// is returned.
pub fn interpolate<F>(s: &str, lookup: F) -> InterpolationResult<String>
where
    F: Fn(&str) -> InterpolationResult<Option<String>>,
{
    let re = var_pattern();

    let mut result = s.to_string();
    let mut seen = HashSet::new();
    let mut failure = None;

    // Loop to handle nested interpolation
    loop {
        let mut changed = false;

        result = re
            .replace_all(&result, |caps: &regex::Captures| {
                let var_name = &caps[1];

                // A name expanding to itself again would never settle
                if !seen.insert(var_name.to_string()) {
                    return format!("${{{}}}", var_name);
                }

                match lookup(var_name) {
                    Ok(Some(value)) => {
                        changed = true;
                        value
                    }
                    Ok(None) => format!("${{{}}}", var_name),
                    Err(e) => {
                        failure.get_or_insert(e);
                        format!("${{{}}}", var_name)
                    }
                }
            })
            .to_string();

        if let Some(e) = failure.take() {
            return Err(e);
        }

        if !changed {
            break;
        }

        if seen.len() > 100 {
            return Err(InterpolationError::RecursiveInterpolation);
        }
    }

    Ok(result)
}
