use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, CONTENT_TYPE, LOCATION};
use std::collections::HashMap;
use std::fmt;
use url::Url;

use crate::error::Result;
use crate::http::{HttpResponse, Link};
use crate::util;

/// The playback mode of a memento: how (or whether) the Wayback Machine
/// rewrites the archived body before serving it.
///
/// `Original` returns the body exactly as captured; `View` rewrites it for
/// viewing in a browser (this is what the Wayback Machine's own web UI
/// serves); `Javascript`, `Css`, and `Image` are the equivalent rewriting
/// disciplines for those content types. The server also understands suffixes
/// this library doesn't know about, so unrecognized values are carried
/// through unchanged rather than rejected.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Mode {
    Original,
    View,
    Javascript,
    Css,
    Image,
    Other(String),
}

impl Mode {
    /// The suffix used for this mode in playback URLs, including the
    /// trailing underscore (empty for view mode).
    pub fn suffix(&self) -> &str {
        match self {
            Mode::Original => "id_",
            Mode::View => "",
            Mode::Javascript => "js_",
            Mode::Css => "cs_",
            Mode::Image => "im_",
            Mode::Other(value) => value,
        }
    }

    pub fn from_suffix(value: &str) -> Mode {
        match value {
            "id_" => Mode::Original,
            "" => Mode::View,
            "js_" => Mode::Javascript,
            "cs_" => Mode::Css,
            "im_" => Mode::Image,
            other => Mode::Other(other.to_string()),
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Original
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// An archived HTTP response at a particular capture time.
///
/// The `headers` field holds the *historical* headers recorded at capture
/// time, not the Wayback Machine's own metadata headers. Like a live HTTP
/// response, a memento holds a network connection until its body is read:
/// `content` and `text` read and cache the body (and release the
/// connection), and `close` must be called if neither is used.
pub struct Memento {
    /// The URL the capture is of. This can differ from the requested URL
    /// because the index matches on a canonicalized (SURT) form.
    pub url: String,
    /// Capture time, always UTC.
    pub timestamp: DateTime<Utc>,
    pub mode: Mode,
    /// The playback URL this memento was actually served from.
    pub memento_url: String,
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub encoding: Option<String>,
    /// Entries from the `Link` header, keyed by `rel`. Memento references are
    /// rewritten to use this memento's playback mode.
    pub links: HashMap<String, Link>,
    /// Mementos of historical redirects that were followed to reach this one.
    pub history: Vec<Memento>,
    /// Every playback URL visited along the way, including archive-side
    /// redirects that were not themselves mementos.
    pub debug_history: Vec<String>,
    response: HttpResponse,
}

impl Memento {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_response(
        response: HttpResponse,
        url: String,
        timestamp: DateTime<Utc>,
        mode: Mode,
        links: HashMap<String, Link>,
        links_mode: &Mode,
        history: Vec<Memento>,
        debug_history: Vec<String>,
    ) -> Result<Memento> {
        let headers = parse_memento_headers(&response.headers, &response.url)?;

        Ok(Memento {
            url,
            timestamp,
            mode,
            memento_url: response.url.clone(),
            status_code: response.status.as_u16(),
            headers,
            encoding: response.encoding.clone(),
            links: clean_memento_links(links, links_mode),
            history,
            debug_history,
            response,
        })
    }

    /// Whether the archived response had a non-error status (< 400).
    pub fn ok(&self) -> bool {
        self.status_code < 400
    }

    /// Whether the archived response was a redirect (3xx).
    pub fn is_redirect(&self) -> bool {
        self.ok() && self.status_code >= 300
    }

    /// The archived response body. The first read consumes the network
    /// connection; the result is cached, so reads are idempotent.
    pub async fn content(&mut self) -> Result<Bytes> {
        self.response.content().await
    }

    /// The archived response body decoded as text.
    pub async fn text(&mut self) -> Result<String> {
        self.response.text().await
    }

    /// Release this memento's network connection. Safe to call repeatedly;
    /// unnecessary once `content` or `text` has been read.
    pub async fn close(&mut self) {
        self.response.close().await
    }
}

const HISTORICAL_HEADER_PREFIX: &str = "x-archive-orig-";

/// Extract the historical headers from a memento response's headers.
///
/// Archived headers are reproduced on the response prefixed with
/// `X-Archive-Orig-`. `Content-Type` is served unprefixed (the browser needs
/// it) and is copied over; a historical `Content-Encoding` cannot be
/// recovered from the Wayback Machine, so none is ever synthesized. The
/// `Location` of a captured redirect has no prefixed form either: it is
/// recovered by resolving the response's own `Location` (which points at the
/// next *Wayback* URL) and pulling out the captured URL.
pub(crate) fn parse_memento_headers(
    raw_headers: &HeaderMap,
    url: &str,
) -> Result<HashMap<String, String>> {
    let mut headers = HashMap::new();

    for (name, value) in raw_headers {
        if let Some(stripped) = name.as_str().strip_prefix(HISTORICAL_HEADER_PREFIX) {
            if let Ok(value) = value.to_str() {
                headers.insert(titlecase_header(stripped), value.to_string());
            }
        }
    }

    if let Some(content_type) = raw_headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
    {
        headers.insert("Content-Type".to_string(), content_type.to_string());
    }

    if !headers.contains_key("Location") {
        if let Some(location) = raw_headers
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
        {
            // Not all Wayback redirects provide a complete URL in `Location`.
            let absolute = Url::parse(url)
                .and_then(|base| base.join(location))
                .map(|joined| joined.to_string())
                .unwrap_or_else(|_| location.to_string());
            let (captured_url, _, _) = util::memento_url_data(&absolute)?;

            headers.insert("Location".to_string(), captured_url);
        }
    }

    Ok(headers)
}

// The HTTP stack lowercases header names; historical names are restored to
// the conventional Title-Case form.
fn titlecase_header(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join("-")
}

/// Rewrite the URL of every memento reference in a links map to use the
/// given mode. The server always emits view-mode URLs regardless of the mode
/// it is serving the current memento in.
pub(crate) fn clean_memento_links(
    links: HashMap<String, Link>,
    mode: &Mode,
) -> HashMap<String, Link> {
    links
        .into_iter()
        .map(|(key, mut link)| {
            if key.contains("memento") {
                match util::set_memento_url_mode(&link.url, mode) {
                    Ok(updated) => link.url = updated,
                    Err(_) => log::warn!(
                        "The link {:?} should have had a memento URL in the url field, but instead it was: {:?}",
                        key,
                        link.url
                    ),
                }
            }

            (key, link)
        })
        .collect()
}
