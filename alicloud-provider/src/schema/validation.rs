//! Reusable attribute validators.

use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use super::Validator;

fn expect_str(value: &Value) -> Result<&str, String> {
    value.as_str().ok_or_else(|| "expected a string".to_string())
}

/// String length (in characters) within `[min, max]`.
pub fn string_len_between(min: usize, max: usize) -> Validator {
    Arc::new(move |value: &Value| {
        let len = expect_str(value)?.chars().count();
        if (min..=max).contains(&len) {
            Ok(())
        } else {
            Err(format!("length must be between {min} and {max}, got {len}"))
        }
    })
}

/// String is one of `allowed`.
pub fn string_in_slice(allowed: &'static [&'static str], ignore_case: bool) -> Validator {
    Arc::new(move |value: &Value| {
        let s = expect_str(value)?;
        let found = allowed.iter().any(|a| {
            if ignore_case {
                a.eq_ignore_ascii_case(s)
            } else {
                *a == s
            }
        });
        if found {
            Ok(())
        } else {
            Err(format!(
                "expected one of [{}], got '{s}'",
                allowed.join(", ")
            ))
        }
    })
}

/// String matches `pattern`; `message` explains the rule.
pub fn string_match(pattern: &'static str, message: &'static str) -> Validator {
    Arc::new(move |value: &Value| {
        let s = expect_str(value)?;
        let re = Regex::new(pattern).map_err(|e| format!("invalid pattern: {e}"))?;
        if re.is_match(s) {
            Ok(())
        } else {
            Err(format!("'{s}' is invalid: {message}"))
        }
    })
}

/// String must not start with any of `prefixes`.
pub fn string_does_not_start_with(prefixes: &'static [&'static str]) -> Validator {
    Arc::new(move |value: &Value| {
        let s = expect_str(value)?;
        match prefixes.iter().find(|p| s.starts_with(**p)) {
            Some(p) => Err(format!("must not start with '{p}'")),
            None => Ok(()),
        }
    })
}

/// Integer within `[min, max]`.
pub fn int_between(min: i64, max: i64) -> Validator {
    Arc::new(move |value: &Value| {
        let n = value
            .as_i64()
            .ok_or_else(|| "expected an integer".to_string())?;
        if (min..=max).contains(&n) {
            Ok(())
        } else {
            Err(format!("must be between {min} and {max}, got {n}"))
        }
    })
}

/// A compilable regular expression.
pub fn valid_regex() -> Validator {
    Arc::new(|value: &Value| {
        Regex::new(expect_str(value)?)
            .map(|_| ())
            .map_err(|e| e.to_string())
    })
}

/// IPv4 CIDR block (e.g. `10.0.0.0/16`).
pub fn cidr() -> Validator {
    Arc::new(|value: &Value| validate_cidr(expect_str(value)?))
}

/// Port range `from/to`; `-1/-1` means all ports.
pub fn port_range() -> Validator {
    Arc::new(|value: &Value| validate_port_range(expect_str(value)?))
}

/// Validate CIDR block format (e.g., "10.0.0.0/16")
pub fn validate_cidr(cidr: &str) -> Result<(), String> {
    let Some((ip, prefix)) = cidr.split_once('/') else {
        return Err(format!("Invalid CIDR format '{cidr}': expected IP/prefix"));
    };

    let octets: Vec<&str> = ip.split('.').collect();
    if octets.len() != 4 {
        return Err(format!("Invalid IP address '{ip}': expected 4 octets"));
    }
    if let Some(octet) = octets.iter().find(|o| o.parse::<u8>().is_err()) {
        return Err(format!(
            "Invalid octet '{octet}' in IP address: must be 0-255"
        ));
    }

    match prefix.parse::<u8>() {
        Ok(p) if p <= 32 => Ok(()),
        Ok(p) => Err(format!("Invalid prefix length '{p}': must be 0-32")),
        Err(_) => Err(format!(
            "Invalid prefix length '{prefix}': must be a number"
        )),
    }
}

/// Validate a `from/to` port range.
pub fn validate_port_range(range: &str) -> Result<(), String> {
    if range == "-1/-1" {
        return Ok(());
    }
    let parsed = range
        .split_once('/')
        .and_then(|(from, to)| Some((from.parse::<u16>().ok()?, to.parse::<u16>().ok()?)));
    match parsed {
        Some((from, to)) if from >= 1 && from <= to => Ok(()),
        _ => Err(format!(
            "Invalid port range '{range}': expected 'from/to' with 1 <= from <= to <= 65535, or '-1/-1'"
        )),
    }
}
