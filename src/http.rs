use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE, LINK, LOCATION,
    RETRY_AFTER,
};
use reqwest::{redirect, StatusCode};
use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use url::Url;

use crate::error::{Error, Result};
use crate::limit::{
    RateLimit, DEFAULT_CDX_RATE_LIMIT, DEFAULT_MEMENTO_RATE_LIMIT, DEFAULT_TIMEMAP_RATE_LIMIT,
};
use crate::util;

const DEFAULT_RETRIES: u32 = 6;
const DEFAULT_BACKOFF: f64 = 2.0;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const TCP_KEEPALIVE: Duration = Duration::from_secs(20);
const MAX_REDIRECTS: usize = 10;

// A rate limit response without a Retry-After header still deserves a real
// pause before the next attempt.
const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_secs(60);

// Wayback produces 500s (and friends) for transient issues often enough that
// they are worth retrying, which would usually not be the case elsewhere.
const RETRYABLE_STATUSES: [u16; 7] = [413, 421, 500, 502, 503, 504, 599];

/// Connect and read timeouts for requests made through a [`Session`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Timeout {
    None,
    /// One duration for both the connect and read phases.
    Global(Duration),
    PerPhase {
        connect: Duration,
        read: Duration,
    },
}

impl Timeout {
    pub(crate) fn connect(&self) -> Option<Duration> {
        match self {
            Timeout::None => None,
            Timeout::Global(value) => Some(*value),
            Timeout::PerPhase { connect, .. } => Some(*connect),
        }
    }

    pub(crate) fn read(&self) -> Option<Duration> {
        match self {
            Timeout::None => None,
            Timeout::Global(value) => Some(*value),
            Timeout::PerPhase { read, .. } => Some(*read),
        }
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Timeout::Global(DEFAULT_TIMEOUT)
    }
}

impl From<Duration> for Timeout {
    fn from(value: Duration) -> Self {
        Timeout::Global(value)
    }
}

impl From<(Duration, Duration)> for Timeout {
    fn from((connect, read): (Duration, Duration)) -> Self {
        Timeout::PerPhase { connect, read }
    }
}

/// Configuration for a [`Session`].
///
/// The rate limit fields default to process-wide shared buckets, so that
/// every session created without an explicit limit throttles in aggregate
/// with the others. To share a custom limit between sessions, clone one
/// `Arc<RateLimit>` into each options value.
pub struct SessionOptions {
    pub retries: u32,
    /// Base for exponential retry backoff, in seconds: the nth retry waits
    /// `backoff * 2 ^ (n - 1)` seconds (unless the server asks for more).
    pub backoff: f64,
    pub timeout: Timeout,
    pub user_agent: Option<String>,
    pub search_rate_limit: Arc<RateLimit>,
    pub memento_rate_limit: Arc<RateLimit>,
    pub timemap_rate_limit: Arc<RateLimit>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            retries: DEFAULT_RETRIES,
            backoff: DEFAULT_BACKOFF,
            timeout: Timeout::default(),
            user_agent: None,
            search_rate_limit: DEFAULT_CDX_RATE_LIMIT.clone(),
            memento_rate_limit: DEFAULT_MEMENTO_RATE_LIMIT.clone(),
            timemap_rate_limit: DEFAULT_TIMEMAP_RATE_LIMIT.clone(),
        }
    }
}

/// Manages HTTP requests to Wayback Machine servers: connection pooling,
/// retries, rate limiting, and timeouts. A session may be shared freely
/// between tasks; once closed it rejects all new requests.
pub struct Session {
    transport: Mutex<Option<reqwest::Client>>,
    retries: u32,
    backoff: f64,
    timeout: Timeout,
    rate_limits: Vec<(&'static str, Arc<RateLimit>)>,
    fallback_limit: Arc<RateLimit>,
}

impl Session {
    pub fn new() -> Session {
        Session::with_options(SessionOptions::default())
    }

    pub fn with_options(options: SessionOptions) -> Session {
        let user_agent = options.user_agent.unwrap_or_else(|| {
            format!(
                "wayback-rs/{} (+{})",
                env!("CARGO_PKG_VERSION"),
                env!("CARGO_PKG_REPOSITORY")
            )
        });

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate"));

        let mut builder = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .tcp_keepalive(Some(TCP_KEEPALIVE))
            .redirect(redirect::Policy::none());

        if let Some(connect) = options.timeout.connect() {
            builder = builder.connect_timeout(connect);
        }
        if let Some(read) = options.timeout.read() {
            builder = builder.timeout(read);
        }

        Session {
            transport: Mutex::new(Some(builder.build().unwrap())),
            retries: options.retries,
            backoff: options.backoff,
            timeout: options.timeout,
            rate_limits: vec![
                ("/web/timemap", options.timemap_rate_limit),
                ("/cdx", options.search_rate_limit),
            ],
            fallback_limit: options.memento_rate_limit,
        }
    }

    /// Close the session, dropping its connection pool. Closing is permanent:
    /// every request after this fails with [`Error::SessionClosed`].
    pub fn close(&self) {
        self.transport
            .lock()
            .expect("session transport lock poisoned")
            .take();
    }

    fn transport(&self) -> Result<reqwest::Client> {
        self.transport
            .lock()
            .expect("session transport lock poisoned")
            .clone()
            .ok_or(Error::SessionClosed)
    }

    fn rate_limit_for(&self, url: &str) -> &Arc<RateLimit> {
        if let Ok(parsed) = Url::parse(url) {
            for (prefix, limit) in &self.rate_limits {
                if parsed.path().starts_with(prefix) {
                    return limit;
                }
            }
        }

        &self.fallback_limit
    }

    /// Issue a GET request, retrying retriable failures with backoff.
    ///
    /// Redirects are handled here rather than in the connection pool so that
    /// every hop passes through the rate limit gate for its own endpoint.
    pub(crate) async fn get(
        &self,
        url: &str,
        params: Option<&[(String, String)]>,
        follow_redirects: bool,
        timeout: Option<Timeout>,
    ) -> Result<HttpResponse> {
        let transport = self.transport()?;

        let mut target = url.to_string();
        if let Some(params) = params {
            let serialized = serialize_query(params);
            if !serialized.is_empty() {
                target.push(if target.contains('?') { '&' } else { '?' });
                target.push_str(&serialized);
            }
        }

        let mut response = self.send_one(&transport, &target, timeout).await?;
        let mut hops = 0;

        while follow_redirects && hops < MAX_REDIRECTS {
            let next = match response.redirect_url() {
                Some(next) => next,
                None => break,
            };
            response.drain().await;
            response = self.send_one(&transport, &next, timeout).await?;
            hops += 1;
        }

        Ok(response)
    }

    async fn send_one(
        &self,
        transport: &reqwest::Client,
        url: &str,
        timeout: Option<Timeout>,
    ) -> Result<HttpResponse> {
        let rate_limit = self.rate_limit_for(url).clone();
        let read_timeout = timeout.unwrap_or(self.timeout).read();
        let start = Instant::now();
        let mut retries = 0;

        loop {
            rate_limit.wait().await;
            log::debug!("Sending HTTP request GET {}", url);

            let mut request = transport.get(url);
            if let Some(read) = read_timeout {
                request = request.timeout(read);
            }

            let delay;

            match request.send().await {
                Ok(raw) => {
                    let mut response = HttpResponse::new(raw);
                    delay = self.retry_delay(retries, Some(&response));

                    if retries >= self.retries || !should_retry(&response) {
                        if response.status == StatusCode::TOO_MANY_REQUESTS {
                            let retry_after = response
                                .headers
                                .get(RETRY_AFTER)
                                .and_then(|value| value.to_str().ok())
                                .map(util::parse_retry_after);
                            response.close().await;

                            return Err(Error::RateLimitExceeded { retry_after });
                        }

                        return Ok(response);
                    }

                    log::debug!(
                        "Received error response (status {}), will retry",
                        response.status
                    );
                    response.drain().await;
                }
                Err(error) => {
                    if retries >= self.retries {
                        return Err(Error::RetryExhausted {
                            retries,
                            elapsed: start.elapsed(),
                            cause: error,
                        });
                    } else if is_retryable_error(&error) {
                        delay = self.retry_delay(retries, None);
                        log::info!("Caught exception during request, will retry: {}", error);
                    } else {
                        return Err(Error::from(error));
                    }
                }
            }

            log::debug!("Will retry after sleeping for {:?}", delay);
            tokio::time::sleep(delay).await;
            retries += 1;
        }
    }

    fn retry_delay(&self, retries: u32, response: Option<&HttpResponse>) -> Duration {
        let mut delay = Duration::from_secs(0);

        if let Some(response) = response {
            if let Some(value) = response
                .headers
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
            {
                delay = util::parse_retry_after(value);
            }

            if response.status == StatusCode::TOO_MANY_REQUESTS && delay.as_nanos() == 0 {
                delay = DEFAULT_RATE_LIMIT_DELAY;
            }
        }

        // No default backoff on the first retry.
        if retries > 0 {
            delay = delay.max(Duration::from_secs_f64(
                self.backoff * f64::powi(2.0, retries as i32 - 1),
            ));
        }

        delay
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

fn should_retry(response: &HttpResponse) -> bool {
    // A memento may be a capture of an error response, so its status says
    // nothing about whether the request itself went wrong.
    if response.is_memento() {
        return false;
    }

    RETRYABLE_STATUSES.contains(&response.status.as_u16())
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}

fn serialize_query(params: &[(String, String)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());

    for (key, value) in params {
        serializer.append_pair(key, value);
    }

    serializer.finish()
}

// Wayback screws up the Content-Encoding header on mementos of gzipped
// responses, emitting both an empty value and "gzip", which would otherwise
// suppress decompression. This runs when response headers are first wrapped,
// before any body decoding.
fn repair_content_encoding(headers: &mut HeaderMap) {
    let values = headers
        .get_all(CONTENT_ENCODING)
        .iter()
        .cloned()
        .collect::<Vec<HeaderValue>>();

    let has_empty = values.iter().any(|value| value.as_bytes().is_empty());
    let has_gzip = values.iter().any(|value| value.as_bytes() == b"gzip");

    if has_empty && has_gzip {
        headers.remove(CONTENT_ENCODING);
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    }
}

fn encoding_from_headers(headers: &HeaderMap) -> Option<String> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let mut tokens = content_type.split(';');
    let mime = tokens.next().unwrap_or("").trim().to_lowercase();

    for param in tokens {
        let mut parts = param.splitn(2, '=');
        let key = parts.next().unwrap_or("").trim().to_lowercase();

        if key == "charset" {
            if let Some(value) = parts.next() {
                return Some(value.trim().trim_matches(&['\'', '"'][..]).to_string());
            }
        }
    }

    if mime.contains("text") {
        Some("ISO-8859-1".to_string())
    } else if mime.contains("application/json") {
        // RFC 4627 defaults JSON to UTF-8 when no charset is declared.
        Some("utf-8".to_string())
    } else {
        None
    }
}

fn decode_body(headers: &HeaderMap, raw: Bytes) -> Result<Bytes> {
    if raw.is_empty() {
        return Ok(raw);
    }

    let encoding = headers
        .get(CONTENT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .trim()
        .to_lowercase();

    match encoding.as_str() {
        "gzip" => {
            let mut decoded = Vec::new();
            flate2::read::MultiGzDecoder::new(raw.as_ref()).read_to_end(&mut decoded)?;
            Ok(Bytes::from(decoded))
        }
        "deflate" => {
            // "deflate" on the wire is usually zlib-wrapped, but some servers
            // send raw deflate data.
            let mut decoded = Vec::new();
            if flate2::read::ZlibDecoder::new(raw.as_ref())
                .read_to_end(&mut decoded)
                .is_err()
            {
                decoded.clear();
                flate2::read::DeflateDecoder::new(raw.as_ref()).read_to_end(&mut decoded)?;
            }
            Ok(Bytes::from(decoded))
        }
        _ => Ok(raw),
    }
}

fn decode_text(content: &[u8], encoding: Option<&str>) -> String {
    let normalized = encoding.map(|name| name.trim().to_lowercase());

    match normalized.as_deref() {
        Some("iso-8859-1") | Some("latin-1") | Some("latin1") => {
            content.iter().map(|byte| *byte as char).collect()
        }
        _ => String::from_utf8_lossy(content).into_owned(),
    }
}

/// One entry parsed from a `Link` header.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Link {
    pub url: String,
    pub params: HashMap<String, String>,
}

impl Link {
    pub fn rel(&self) -> Option<&str> {
        self.params.get("rel").map(String::as_str)
    }
}

// Parses RFC-style parameterized link headers, e.g.
//   <http://.../front.jpeg>; rel=front; type="image/jpeg",
//   <http://.../back.jpeg>; rel=back
// keyed by each entry's rel (or its URL when rel is absent). Tolerates
// missing quotes and stray whitespace.
pub(crate) fn parse_link_header(value: &str) -> HashMap<String, Link> {
    lazy_static! {
        static ref LINK_SPLIT_RE: Regex = Regex::new(", *<").unwrap();
    }
    const STRIP: &[char] = &[' ', '\'', '"'];

    let mut links = HashMap::new();
    let trimmed = value.trim_matches(STRIP);
    if trimmed.is_empty() {
        return links;
    }

    for entry in LINK_SPLIT_RE.split(trimmed) {
        let mut pieces = entry.splitn(2, ';');
        let raw_url = pieces.next().unwrap_or("");
        let raw_params = pieces.next().unwrap_or("");

        let url = raw_url
            .trim_matches(&['<', '>', ' ', '\'', '"'][..])
            .to_string();
        let mut params = HashMap::new();

        for param in raw_params.split(';') {
            let mut parts = param.splitn(2, '=');
            let key = parts.next().map(|part| part.trim_matches(STRIP));
            let value = parts.next().map(|part| part.trim_matches(STRIP));

            match (key, value) {
                (Some(key), Some(value)) if !key.is_empty() => {
                    params.insert(key.to_string(), value.to_string());
                }
                _ => break,
            }
        }

        let key = params
            .get("rel")
            .cloned()
            .unwrap_or_else(|| url.clone());

        links.insert(key, Link { url, params });
    }

    links
}

enum Body {
    Pending(reqwest::Response),
    Done,
}

/// Internal wrapper for HTTP responses: repaired headers, lazily cached body
/// content, and the drain-then-release close discipline. Never exposed to
/// user code; [`crate::Memento`] owns one for its body.
pub(crate) struct HttpResponse {
    pub(crate) url: String,
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) encoding: Option<String>,
    body: Body,
    content: Option<Bytes>,
    redirect_override: Option<String>,
}

impl HttpResponse {
    /// A response with no network connection behind it, for tests.
    #[cfg(test)]
    pub(crate) fn synthetic(
        url: &str,
        status: StatusCode,
        mut headers: HeaderMap,
        content: Bytes,
    ) -> HttpResponse {
        repair_content_encoding(&mut headers);
        let encoding = encoding_from_headers(&headers);

        HttpResponse {
            url: url.to_string(),
            status,
            headers,
            encoding,
            body: Body::Done,
            content: Some(content),
            redirect_override: None,
        }
    }

    fn new(raw: reqwest::Response) -> HttpResponse {
        let url = raw.url().to_string();
        let status = raw.status();
        let mut headers = raw.headers().clone();
        repair_content_encoding(&mut headers);
        let encoding = encoding_from_headers(&headers);

        HttpResponse {
            url,
            status,
            headers,
            encoding,
            body: Body::Pending(raw),
            content: None,
            redirect_override: None,
        }
    }

    pub(crate) fn is_memento(&self) -> bool {
        self.headers.contains_key("memento-datetime")
    }

    /// The absolute URL this response redirects to, if it is a redirect.
    pub(crate) fn redirect_url(&self) -> Option<String> {
        if let Some(target) = &self.redirect_override {
            return Some(target.clone());
        }

        if !self.status.is_redirection() {
            return None;
        }

        let location = self.headers.get(LOCATION)?.to_str().ok()?;

        Url::parse(&self.url)
            .and_then(|base| base.join(location))
            .map(|joined| joined.to_string())
            .ok()
    }

    pub(crate) fn set_redirect(&mut self, target: String) {
        self.redirect_override = Some(target);
    }

    pub(crate) fn links(&self) -> HashMap<String, Link> {
        let combined = self
            .headers
            .get_all(LINK)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect::<Vec<&str>>()
            .join(", ");

        if combined.is_empty() {
            HashMap::new()
        } else {
            parse_link_header(&combined)
        }
    }

    /// The decompressed response body. The first read consumes the wire and
    /// releases the pooled connection; the bytes are cached, so reading is
    /// idempotent.
    pub(crate) async fn content(&mut self) -> Result<Bytes> {
        if let Some(content) = &self.content {
            return Ok(content.clone());
        }

        let raw = match std::mem::replace(&mut self.body, Body::Done) {
            Body::Pending(response) => response.bytes().await?,
            Body::Done => Bytes::new(),
        };

        let decoded = decode_body(&self.headers, raw)?;
        self.content = Some(decoded.clone());

        Ok(decoded)
    }

    /// The response body decoded per the declared encoding.
    pub(crate) async fn text(&mut self) -> Result<String> {
        let content = self.content().await?;

        Ok(decode_text(&content, self.encoding.as_deref()))
    }

    /// Read the rest of the response off the wire, caching the body, and
    /// release the connection. Decode failures fall back to the raw bytes.
    pub(crate) async fn close(&mut self) {
        if self.content.is_some() {
            self.body = Body::Done;
            return;
        }

        if let Body::Pending(response) = std::mem::replace(&mut self.body, Body::Done) {
            match response.bytes().await {
                Ok(raw) => {
                    let decoded = decode_body(&self.headers, raw.clone()).unwrap_or(raw);
                    self.content = Some(decoded);
                }
                Err(error) => log::debug!("Error draining response body: {}", error),
            }
        }
    }

    /// Read and discard the rest of the response, releasing the connection
    /// without caching anything.
    pub(crate) async fn drain(&mut self) {
        if let Body::Pending(response) = std::mem::replace(&mut self.body, Body::Done) {
            if let Err(error) = response.bytes().await {
                log::debug!("Error draining response body: {}", error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_map(values: Vec<(&str, &str)>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        for (name, value) in values {
            headers.append(
                reqwest::header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }

        headers
    }

    #[test]
    fn test_repair_content_encoding() {
        let mut headers = header_map(vec![
            ("content-encoding", ""),
            ("content-encoding", "gzip"),
        ]);

        repair_content_encoding(&mut headers);

        let values = headers
            .get_all(CONTENT_ENCODING)
            .iter()
            .map(|value| value.to_str().unwrap().to_string())
            .collect::<Vec<String>>();

        assert_eq!(values, vec!["gzip"]);
    }

    #[test]
    fn test_repair_content_encoding_leaves_single_values_alone() {
        let mut headers = header_map(vec![("content-encoding", "gzip")]);

        repair_content_encoding(&mut headers);

        assert_eq!(headers.get_all(CONTENT_ENCODING).iter().count(), 1);

        let mut empty_only = header_map(vec![("content-encoding", "")]);

        repair_content_encoding(&mut empty_only);

        assert_eq!(
            empty_only.get(CONTENT_ENCODING).unwrap().as_bytes(),
            b""
        );
    }

    #[test]
    fn test_encoding_from_headers() {
        let pairs = vec![
            ("text/html; charset=utf-8", Some("utf-8")),
            ("text/html; charset=\"utf-8\"", Some("utf-8")),
            ("text/html", Some("ISO-8859-1")),
            ("application/json", Some("utf-8")),
            ("application/octet-stream", None),
        ];

        for (content_type, expected) in pairs {
            let headers = header_map(vec![("content-type", content_type)]);

            assert_eq!(
                encoding_from_headers(&headers).as_deref(),
                expected,
                "content type: {}",
                content_type
            );
        }

        assert_eq!(encoding_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn test_decode_body_gzip() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"archived page").unwrap();
        let compressed = encoder.finish().unwrap();

        let headers = header_map(vec![("content-encoding", "gzip")]);
        let decoded = decode_body(&headers, Bytes::from(compressed)).unwrap();

        assert_eq!(decoded.as_ref(), b"archived page");
    }

    #[test]
    fn test_decode_body_identity() {
        let decoded = decode_body(&HeaderMap::new(), Bytes::from_static(b"plain")).unwrap();

        assert_eq!(decoded.as_ref(), b"plain");
    }

    #[test]
    fn test_decode_text_latin_1() {
        assert_eq!(decode_text(&[0x63, 0x61, 0x66, 0xe9], Some("ISO-8859-1")), "café");
        assert_eq!(decode_text("café".as_bytes(), Some("utf-8")), "café");
        assert_eq!(decode_text("café".as_bytes(), None), "café");
    }

    #[test]
    fn test_parse_link_header() {
        let value = concat!(
            "<http://www.fws.gov/birds/>; rel=\"original\", ",
            "<https://web.archive.org/web/timemap/link/http://www.fws.gov/birds/>; rel=\"timemap\"; ",
            "type=\"application/link-format\", ",
            "<https://web.archive.org/web/20030409164903/http://www.fws.gov:80/birds>; ",
            "rel=\"first memento\"; datetime=\"Wed, 09 Apr 2003 16:49:03 GMT\""
        );

        let links = parse_link_header(value);

        assert_eq!(links.len(), 3);
        assert_eq!(links["original"].url, "http://www.fws.gov/birds/");
        assert_eq!(
            links["first memento"].url,
            "https://web.archive.org/web/20030409164903/http://www.fws.gov:80/birds"
        );
        assert_eq!(
            links["first memento"].params["datetime"],
            "Wed, 09 Apr 2003 16:49:03 GMT"
        );
    }

    #[test]
    fn test_parse_link_header_without_rel_keys_by_url() {
        let links = parse_link_header("<http://example.com/a>; type=\"text/html\"");

        assert_eq!(links["http://example.com/a"].url, "http://example.com/a");
    }

    #[test]
    fn test_parse_link_header_tolerates_missing_quotes() {
        let links = parse_link_header("<http://example.com/a>; rel=original");

        assert_eq!(links["original"].url, "http://example.com/a");
    }

    #[test]
    fn test_parse_link_header_empty() {
        assert!(parse_link_header("").is_empty());
        assert!(parse_link_header("  ").is_empty());
    }

    #[test]
    fn test_serialize_query() {
        let params = vec![
            ("url".to_string(), "nasa.gov".to_string()),
            ("filter".to_string(), "statuscode:200".to_string()),
            ("filter".to_string(), "!mimetype:warc/revisit".to_string()),
        ];

        assert_eq!(
            serialize_query(&params),
            "url=nasa.gov&filter=statuscode%3A200&filter=%21mimetype%3Awarc%2Frevisit"
        );
    }

    #[test]
    fn test_timeout_phases() {
        assert_eq!(Timeout::None.connect(), None);
        assert_eq!(Timeout::None.read(), None);

        let global = Timeout::from(Duration::from_secs(60));
        assert_eq!(global.connect(), Some(Duration::from_secs(60)));
        assert_eq!(global.read(), Some(Duration::from_secs(60)));

        let pair = Timeout::from((Duration::from_secs(5), Duration::from_secs(30)));
        assert_eq!(pair.connect(), Some(Duration::from_secs(5)));
        assert_eq!(pair.read(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_rate_limit_selection() {
        let session = Session::new();

        assert!(Arc::ptr_eq(
            session.rate_limit_for("https://web.archive.org/cdx/search/cdx?url=example.com"),
            &DEFAULT_CDX_RATE_LIMIT
        ));
        assert!(Arc::ptr_eq(
            session.rate_limit_for("https://web.archive.org/web/timemap/link/http://example.com"),
            &DEFAULT_TIMEMAP_RATE_LIMIT
        ));
        assert!(Arc::ptr_eq(
            session.rate_limit_for(
                "https://web.archive.org/web/20171124151315id_/https://www.fws.gov/birds/"
            ),
            &DEFAULT_MEMENTO_RATE_LIMIT
        ));
    }
}
