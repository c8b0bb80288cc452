use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::HeaderValue;
use reqwest::StatusCode;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

use crate::cdx::{CdxRecord, Search, SearchOptions};
use crate::error::{Error, Result};
use crate::http::{HttpResponse, Session};
use crate::memento::{Memento, Mode};
use crate::util;

/// What to fetch a memento of: a plain URL (which needs a timestamp from the
/// options), a capture record from [`Client::search`], or a complete
/// playback URL (which carries its own timestamp and mode).
#[derive(Clone, Debug)]
pub enum MementoTarget {
    Url(String),
    Capture {
        url: String,
        timestamp: DateTime<Utc>,
    },
}

impl From<&str> for MementoTarget {
    fn from(value: &str) -> Self {
        MementoTarget::Url(value.to_string())
    }
}

impl From<String> for MementoTarget {
    fn from(value: String) -> Self {
        MementoTarget::Url(value)
    }
}

impl From<&CdxRecord> for MementoTarget {
    fn from(record: &CdxRecord) -> Self {
        MementoTarget::Capture {
            url: record.url.clone(),
            timestamp: record.timestamp,
        }
    }
}

/// Options for [`Client::get_memento`].
#[derive(Clone, Debug)]
pub struct MementoOptions {
    /// The time to retrieve a capture of. Required when the target is a
    /// plain URL; ignored when the target carries its own timestamp.
    pub timestamp: Option<DateTime<Utc>>,
    pub mode: Mode,
    /// When false, a capture close in time to the requested one (within
    /// `target_window`) is acceptable when the exact one can't be played.
    pub exact: bool,
    /// Like `exact`, but for the targets of captured redirects. Defaults to
    /// the value of `exact`.
    pub exact_redirects: Option<bool>,
    /// The permitted gap between the requested time and the capture time of
    /// a followed redirect's target.
    pub target_window: Duration,
    /// Follow captured (historical) redirects to the content a browser
    /// would ultimately have displayed.
    pub follow_redirects: bool,
}

impl Default for MementoOptions {
    fn default() -> Self {
        MementoOptions {
            timestamp: None,
            mode: Mode::Original,
            exact: true,
            exact_redirects: None,
            target_window: Duration::from_secs(24 * 60 * 60),
            follow_redirects: true,
        }
    }
}

impl MementoOptions {
    #[deprecated(since = "0.1.0", note = "renamed to the `timestamp` field")]
    pub fn datetime(mut self, value: DateTime<Utc>) -> MementoOptions {
        self.timestamp = Some(value);
        self
    }
}

fn resolve_target(
    target: MementoTarget,
    options: &MementoOptions,
) -> Result<(String, DateTime<Utc>, Mode)> {
    match target {
        MementoTarget::Capture { url, timestamp } => Ok((url, timestamp, options.mode.clone())),
        MementoTarget::Url(url) => match util::memento_url_data(&url) {
            Ok(parsed) => Ok(parsed),
            Err(_) => {
                let timestamp = options.timestamp.ok_or(Error::MissingTimestamp)?;

                Ok((url, timestamp, options.mode.clone()))
            }
        },
    }
}

lazy_static! {
    static ref REDIRECT_PAGE_RE: Regex =
        Regex::new(r"(?i)Got an? HTTP 3\d\d response at crawl time").unwrap();
    static ref PROTOCOL_AND_WWW_RE: Regex = Regex::new(r"^https?://(www\d?\.)?").unwrap();
}

// The redirect page links to the target as another capture with the same
// timestamp; matching on the timestamp avoids picking up unrelated links.
// Two alternations cover the quote styles, since the regex crate has no
// backreferences.
fn find_view_redirect_target(text: &str, current_timestamp: &str) -> Option<String> {
    let pattern = format!(
        "(?i)<a\\s(?:[^>\\s]+\\s)*href=(?:\"((?:(?:https?:)//[^/\"]+)?/web/{ts}/[^\"]*?)\"|'((?:(?:https?:)//[^/']+)?/web/{ts}/[^']*?)')[\\s|>]",
        ts = current_timestamp
    );

    let groups = Regex::new(&pattern).ok()?.captures(text)?;

    groups
        .get(1)
        .or_else(|| groups.get(2))
        .map(|m| m.as_str().to_string())
}

/// In view mode, historical redirects aren't served as actual 3xx responses:
/// the server sends a normal page describing the redirect, which JavaScript
/// would eventually follow in a browser. Detect that page and extract the
/// target URL. A page that looks like a redirect but has no findable target
/// is an error, not a pass-through.
async fn detect_view_mode_redirect(
    response: &mut HttpResponse,
    current_date: &DateTime<Utc>,
) -> Result<Option<String>> {
    if response.status != StatusCode::OK || !response.headers.contains_key("x-archive-src") {
        return Ok(None);
    }

    let text = response.text().await?;

    if !REDIRECT_PAGE_RE.is_match(&text) {
        return Ok(None);
    }

    match find_view_redirect_target(&text, &util::format_timestamp(current_date)) {
        Some(target) => {
            if target.starts_with('/') {
                let base = Url::parse(&response.url)?;

                Ok(Some(base.join(&target)?.to_string()))
            } else {
                Ok(Some(target))
            }
        }
        None => Err(Error::ViewRedirectTargetMissing {
            url: response.url.clone(),
        }),
    }
}

// Redirects point at the closest-in-time capture by SURT key, so the URL
// will often differ in scheme or www-prefix from the one that was asked for.
fn loose_url_eq(left: &str, right: &str) -> bool {
    PROTOCOL_AND_WWW_RE.replace(left, "").to_lowercase()
        == PROTOCOL_AND_WWW_RE.replace(right, "").to_lowercase()
}

// The exactness requirements differ between redirects from memento playbacks
// and from non-playbacks: even with strict matching, a memento that redirects
// to a non-memento is normal, since the redirect's target will rarely have
// been captured at the same moment as the redirect itself.
fn may_follow_archive_redirect(
    exact: bool,
    exact_redirects: bool,
    history_is_empty: bool,
    previous_was_memento: bool,
) -> bool {
    (history_is_empty && !exact)
        || (!history_is_empty && (previous_was_memento || !exact_redirects))
}

// A non-memento redirect goes to the *closest* capture of the target URL,
// not the next one, so it has to fit the target window; with exact matching
// the target also has to be (loosely) the same URL.
fn is_redirect_target_playable(
    current_url: &str,
    target_url: &str,
    target_date: &DateTime<Utc>,
    original_date: &DateTime<Utc>,
    target_window: Duration,
    exact_redirects: bool,
) -> bool {
    let gap = (*target_date - *original_date).num_seconds().abs();

    if gap > target_window.as_secs() as i64 {
        return false;
    }

    !exact_redirects || loose_url_eq(current_url, target_url)
}

// Wayback sometimes has circular memento redirects. The current hop is
// recorded before the target is checked, so a response redirecting to
// itself is caught immediately.
fn is_circular_redirect(
    seen_urls: &mut HashSet<String>,
    current_url: &str,
    redirect_target: &str,
) -> bool {
    seen_urls.insert(current_url.to_string());

    seen_urls.contains(redirect_target)
}

// Maps a refused (non-playable) response to the error the caller sees,
// based on the server's runtime-error header and the body text.
fn classify_refusal(
    requested_url: &str,
    status: u16,
    runtime_error: &str,
    body_text: &str,
) -> Error {
    if runtime_error.contains("AdministrativeAccessControlException")
        || body_text.contains("URL has been excluded")
    {
        Error::BlockedSite {
            url: requested_url.to_string(),
        }
    } else if runtime_error.contains("RobotAccessControlException")
        || body_text.contains("robots.txt")
    {
        Error::BlockedByRobots {
            url: requested_url.to_string(),
        }
    } else if !runtime_error.is_empty() {
        Error::MementoPlayback {
            url: requested_url.to_string(),
            reason: Some(runtime_error.to_string()),
        }
    } else if (200..300).contains(&status) {
        // A redirect was present but refused: the requested capture, or the
        // redirect's target, wasn't playable under the exactness and window
        // settings.
        Error::MementoPlayback {
            url: requested_url.to_string(),
            reason: None,
        }
    } else if status == 404 {
        Error::NoMemento {
            url: requested_url.to_string(),
        }
    } else {
        Error::MementoPlayback {
            url: requested_url.to_string(),
            reason: Some(format!("HTTP {} error", status)),
        }
    }
}

/// A client for retrieving captures from the Internet Archive's Wayback
/// Machine: search the CDX index with [`Client::search`] and play back
/// individual captures with [`Client::get_memento`].
///
/// The client owns a [`Session`] (one is constructed if not provided) and
/// closes it when [`Client::close`] is called.
pub struct Client {
    session: Session,
    cdx_url: String,
}

impl Client {
    const CDX_SEARCH_URL: &'static str = "https://web.archive.org/cdx/search/cdx";

    pub fn new() -> Client {
        Client::with_session(Session::new())
    }

    pub fn with_session(session: Session) -> Client {
        Client {
            session,
            cdx_url: Client::CDX_SEARCH_URL.to_string(),
        }
    }

    /// Point CDX searches at a different index endpoint.
    pub fn cdx_url(mut self, url: &str) -> Client {
        self.cdx_url = url.to_string();
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Close the client's session.
    pub fn close(&self) {
        self.session.close();
    }

    /// Search the CDX index for captures of a URL.
    ///
    /// Results are matched by a canonicalized SURT key, so captures of
    /// similar URLs (`http` vs. `https`, with and without `www.`) are
    /// included. The returned cursor pages through the full result set
    /// lazily; stop advancing it to stop fetching.
    pub fn search(&self, url: &str, options: SearchOptions) -> Search<'_> {
        Search::new(&self.session, self.cdx_url.clone(), url, options)
    }

    /// Fetch a memento (an archived HTTP response) from the Wayback Machine.
    ///
    /// Not every capture can be played back exactly as requested; depending
    /// on `options.exact` and `options.exact_redirects` this either returns
    /// the closest capture within `options.target_window` or fails with a
    /// typed error. When `options.follow_redirects` is set (the default),
    /// captured redirects are followed the way a browser at capture time
    /// would have followed them, and the intermediate hops are recorded in
    /// the result's `history` and `debug_history`.
    pub async fn get_memento<T: Into<MementoTarget>>(
        &self,
        target: T,
        options: MementoOptions,
    ) -> Result<Memento> {
        let exact_redirects = options.exact_redirects.unwrap_or(options.exact);
        let (original_url, original_date, mode) = resolve_target(target.into(), &options)?;

        let requested_url = util::format_memento_url(
            &original_url,
            &util::format_timestamp(&original_date),
            &mode,
        );

        // Following redirects correctly is the subtle part. An error status
        // or redirect may come from the memento itself or from the Wayback
        // Machine; a memento of a redirect normally has its target captured
        // seconds to hours later, so playing it back involves an
        // archive-side redirect to the closest capture of the target, which
        // must be sanity checked (Wayback will sometimes redirect to
        // captures months away).
        let mut history: Vec<Memento> = Vec::new();
        let mut debug_history: Vec<String> = Vec::new();
        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut previous_was_memento = false;

        let mut response = self.session.get(&requested_url, None, false, None).await?;

        loop {
            let (mut current_url, current_date, current_mode) =
                util::memento_url_data(&response.url)?;

            if current_mode == Mode::View {
                if let Some(target) = detect_view_mode_redirect(&mut response, &current_date).await?
                {
                    // Fix up the response so view-mode redirects flow through
                    // the same logic as every other mode.
                    response.set_redirect(target);
                    if let Ok(value) = HeaderValue::from_str(
                        &current_date.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
                    ) {
                        response.headers.insert("memento-datetime", value);
                    }
                }
            }

            let is_memento = response.is_memento();
            let links = response.links();

            // A memento URL matches captures by SURT key, so the capture may
            // be of a different URL than the one in the request; the
            // `original` link has the captured URL.
            if let Some(original) = links.get("original") {
                current_url = original.url.clone();
            }

            if is_memento {
                if !options.follow_redirects {
                    return Memento::from_response(
                        response,
                        current_url,
                        current_date,
                        current_mode,
                        links,
                        &mode,
                        history,
                        debug_history,
                    );
                }
            } else {
                let redirect_url = response.redirect_url();
                let mut playable = false;

                if let Some(redirect_target) = &redirect_url {
                    if may_follow_archive_redirect(
                        options.exact,
                        exact_redirects,
                        history.is_empty(),
                        previous_was_memento,
                    ) {
                        let (target_url, target_date, _) = util::memento_url_data(redirect_target)?;

                        playable = is_redirect_target_playable(
                            &current_url,
                            &target_url,
                            &target_date,
                            &original_date,
                            options.target_window,
                            exact_redirects,
                        );
                    }
                }

                if !playable {
                    response.close().await;
                    let message = response
                        .headers
                        .get("x-archive-wayback-runtime-error")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    let text = response.text().await.unwrap_or_default();

                    return Err(classify_refusal(
                        &requested_url,
                        response.status.as_u16(),
                        &message,
                        &text,
                    ));
                }
            }

            match response.redirect_url() {
                Some(redirect_target) => {
                    previous_was_memento = is_memento;
                    response.close().await;

                    if is_circular_redirect(&mut seen_urls, &response.url, &redirect_target) {
                        return Err(Error::CircularMemento {
                            url: requested_url.clone(),
                        });
                    }

                    // Every hop lands in `debug_history`; only hops that were
                    // themselves mementos land in `history`.
                    let debug_snapshot = debug_history.clone();
                    debug_history.push(response.url.clone());

                    if is_memento {
                        let hop = Memento::from_response(
                            response,
                            current_url,
                            current_date,
                            current_mode,
                            links,
                            &mode,
                            Vec::new(),
                            debug_snapshot,
                        )?;
                        history.push(hop);
                    }

                    response = self.session.get(&redirect_target, None, false, None).await?;
                }
                None => {
                    // Non-mementos without a redirect were refused above, so
                    // this response is the memento itself.
                    return Memento::from_response(
                        response,
                        current_url,
                        current_date,
                        current_mode,
                        links,
                        &mode,
                        history,
                        debug_history,
                    );
                }
            }
        }
    }
}

impl Default for Client {
    fn default() -> Self {
        Client::new()
    }
}
