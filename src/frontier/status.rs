/// Frontier entry status definitions
///
/// This module defines the states a URL moves through inside the frontier.
use std::fmt;

/// Represents the current state of a URL in the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryStatus {
    // ===== Active States =====
    /// URL is waiting to be claimed by the crawl loop
    Queued,

    /// URL has been claimed and is being fetched
    Processing,

    // ===== Terminal States =====
    /// URL was fetched and processed successfully
    Visited,

    /// URL exhausted its retry budget
    Failed,
}

impl EntryStatus {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Visited | Self::Failed)
    }

    /// Returns true if the URL may still be fetched
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Processing)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Visited => "visited",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "visited" => Some(Self::Visited),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all() -> [Self; 4] {
        [Self::Queued, Self::Processing, Self::Visited, Self::Failed]
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
