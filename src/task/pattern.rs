//! Compiled regular expressions used by task rules

use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::fmt;

/// A regular expression compiled when the task file is loaded
///
/// Matching is unanchored: a pattern matches if it is found anywhere in the
/// candidate, so `example\.com/book` matches `https://example.com/book/1`.
#[derive(Clone)]
pub struct Pattern(Regex);

impl Pattern {
    /// Compiles a pattern from its source text
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Regex::new(source).map(Self)
    }

    /// Returns true if the pattern is found anywhere in `candidate`
    pub fn is_match(&self, candidate: &str) -> bool {
        self.0.is_match(candidate)
    }

    /// The source text of the pattern
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn regex(&self) -> &Regex {
        &self.0
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({:?})", self.0.as_str())
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let source = String::deserialize(deserializer)?;
        Pattern::new(&source).map_err(|e| {
            serde::de::Error::custom(format!("invalid pattern {:?}: {}", source, e))
        })
    }
}
