use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transport-level failure, raised only after the insecure fallback also failed.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("invalid URL {url}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Outcome of a single source scraper.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// An expected pattern, attribute or element is absent.
    #[error("parse error: {0}")]
    Parse(String),

    /// A search/autocomplete step returned nothing usable.
    #[error("lookup returned no usable result: {0}")]
    Lookup(String),
}

impl ScrapeError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup(msg.into())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ScrapeError::Fetch(_) => FailureKind::Fetch,
            ScrapeError::Parse(_) => FailureKind::Parse,
            ScrapeError::Lookup(_) => FailureKind::Lookup,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Fetch,
    Parse,
    Lookup,
    /// A prerequisite field (the internal id) was unavailable.
    Skipped,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::Fetch => "fetch",
            FailureKind::Parse => "parse",
            FailureKind::Lookup => "lookup",
            FailureKind::Skipped => "skipped",
        };
        f.write_str(s)
    }
}
