//! The closed set of file-record sources (indexers).

use std::fmt;

/// Provenance of a file record: which indexer discovered it.
///
/// `Wanted` records come from an explicit operator request and are served
/// ahead of everything else by the scheduler. The enum is closed on purpose:
/// the scheduler and the filter pipeline both match exhaustively, so adding
/// a source forces updating both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// Discovered via the live chain-event subscription.
    ChainEvent,
    /// Discovered via a full database/chain scan.
    DbScan,
    /// Inserted on explicit operator request.
    Wanted,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Wanted, Source::ChainEvent, Source::DbScan];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::ChainEvent => "chainEvent",
            Source::DbScan => "dbScan",
            Source::Wanted => "wanted",
        }
    }

    pub fn parse(s: &str) -> Option<Source> {
        match s {
            "chainEvent" => Some(Source::ChainEvent),
            "dbScan" => Some(Source::DbScan),
            "wanted" => Some(Source::Wanted),
            _ => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_roundtrip() {
        for s in Source::ALL {
            assert_eq!(Source::parse(s.as_str()), Some(s));
        }
        assert_eq!(Source::parse("bogus"), None);
    }
}
