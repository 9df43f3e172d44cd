//! Utility modules.

/// Timestamp formatting for state attributes.
pub mod datetime;

/// Dotted-path lookups into vendor responses.
pub mod json_path;

/// Log sanitization utilities to prevent sensitive data exposure.
pub mod log_sanitizer;
