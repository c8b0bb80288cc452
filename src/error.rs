use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{url} is blocked from access")]
    BlockedSite { url: String },
    #[error("{url} is blocked by robots.txt")]
    BlockedByRobots { url: String },
    #[error("{url} has no mementos and was never archived")]
    NoMemento { url: String },
    #[error("Memento at {url} could not be played{}", display_reason(.reason))]
    MementoPlayback {
        url: String,
        reason: Option<String>,
    },
    #[error("Memento at {url} is circular")]
    CircularMemento { url: String },
    #[error("View-mode response at {url} looks like a redirect, but the target could not be found on the page")]
    ViewRedirectTargetMissing { url: String },
    #[error("Could not parse CDX output: {text:?} (query: {query})")]
    UnexpectedResponseFormat { text: String, query: String },
    #[error("HTTP {status} error for CDX search (query: {query})")]
    CdxSearchFailed { status: u16, query: String },
    #[error("Wayback rate limit exceeded")]
    RateLimitExceeded { retry_after: Option<Duration> },
    #[error("Retried {retries} times over {elapsed:?} (error: {cause})")]
    RetryExhausted {
        retries: u32,
        elapsed: Duration,
        #[source]
        cause: reqwest::Error,
    },
    #[error("This session has already been closed and cannot send new HTTP requests")]
    SessionClosed,
    #[error("{url:?} is not a memento URL")]
    InvalidMementoUrl { url: String },
    #[error("Invalid Wayback timestamp: {0:?}")]
    InvalidTimestamp(String),
    #[error("A timestamp is required when requesting a memento of a plain URL")]
    MissingTimestamp,
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_reason(reason: &Option<String>) -> String {
    reason
        .as_ref()
        .map_or_else(String::new, |value| format!(": {}", value))
}
