use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::log_error;

lazy_static! {
    // First parenthesized group in a direction token, e.g. the "0" in "Read(0)"
    static ref PAREN_RE: Regex = Regex::new(r"\(([^)]*)\)").unwrap();
}

/// Normalized I/O direction of a trace record.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IOType {
    Read,
    Write,
}

impl IOType {
    /// Classify a heterogeneous direction token. Providers encode direction
    /// as "Read(0)", "Write(1)", "0", "1", "read", "W" and so on, sometimes
    /// with surrounding quotes. Numeric-in-parentheses forms are checked
    /// before the bare-word substrings so that "Read(0)" is decided by the
    /// digit, not the word. Never fails: unknown tokens count as writes
    /// with a non-fatal diagnostic.
    pub fn normalize(token: &str) -> IOType {
        let trimmed = token.trim().trim_matches('"');
        let lower = trimmed.to_lowercase();

        if let Some(caps) = PAREN_RE.captures(&lower) {
            match caps[1].trim() {
                "0" => return IOType::Read,
                "1" => return IOType::Write,
                _ => {}
            }
        }

        if lower.contains("read") {
            return IOType::Read;
        }
        if lower.contains("write") {
            return IOType::Write;
        }

        match lower.as_str() {
            "0" => return IOType::Read,
            "1" => return IOType::Write,
            _ => {}
        }

        if lower.starts_with('r') {
            return IOType::Read;
        }
        if lower.starts_with('w') {
            return IOType::Write;
        }

        log_error!("unknown IOType '{}', counting as write", token);
        IOType::Write
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IOType::Read => "Read",
            IOType::Write => "Write",
        }
    }
}
