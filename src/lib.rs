pub mod cdx;
pub mod client;
pub mod error;
pub mod http;
pub mod limit;
pub mod memento;
mod util;

pub use cdx::{CdxRecord, MatchType, Search, SearchOptions};
pub use client::{Client, MementoOptions, MementoTarget};
pub use error::{Error, Result};
pub use http::{Link, Session, SessionOptions, Timeout};
pub use limit::RateLimit;
pub use memento::{Memento, Mode};
