use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use lazy_static::lazy_static;
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::memento::Mode;

pub(crate) const URL_DATE_FORMAT: &str = "%Y%m%d%H%M%S";

lazy_static! {
    static ref MEMENTO_URL_RE: Regex =
        Regex::new(r"^https?://web\.archive\.org/web/(\d+)(\w\w_)?/(.+)$").unwrap();
}

pub(crate) fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.format(URL_DATE_FORMAT).to_string()
}

/// Format a date as a Wayback-style timestamp (midnight UTC).
pub(crate) fn format_date(date: &NaiveDate) -> String {
    date.and_hms(0, 0, 0).format(URL_DATE_FORMAT).to_string()
}

/// Parse a 14-digit Wayback timestamp into a UTC instant.
///
/// A handful of year-2000 captures have an extra "00" inserted before the
/// month or day, pushing the rest of the timestamp out by two characters and
/// truncating the seconds. Those two corruptions are repaired here by pulling
/// the "00" out and padding the seconds; anything else that fails to parse is
/// an error.
pub(crate) fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    let cleaned = if text.get(4..6) == Some("00") {
        log::warn!("Found invalid timestamp with month 00: {}", text);
        format!("{}{}00", &text[0..4], &text[6..])
    } else if text.get(6..8) == Some("00") {
        log::warn!("Found invalid timestamp with day 00: {}", text);
        format!("{}{}00", &text[0..6], &text[8..])
    } else {
        text.to_string()
    };

    NaiveDateTime::parse_from_str(&cleaned, URL_DATE_FORMAT)
        .map(|value| DateTime::from_utc(value, Utc))
        .map_err(|_| Error::InvalidTimestamp(text.to_string()))
}

/// Parse a `Retry-After` header value (either a number of seconds or an HTTP
/// date). Values in the past and unparseable values are treated as zero.
pub(crate) fn parse_retry_after(value: &str) -> Duration {
    let seconds = match value.trim().parse::<i64>() {
        Ok(seconds) => seconds,
        Err(_) => DateTime::parse_from_rfc2822(value)
            .map(|date| date.signed_duration_since(Utc::now()).num_seconds())
            .unwrap_or(0),
    };

    Duration::from_secs(seconds.max(0) as u64)
}

// The captured URL embedded in a memento URL may have been percent encoded.
// Decode only when the scheme itself is encoded so that an ordinary query
// string is left untouched.
fn clean_memento_url_component(url: &str) -> String {
    let lower = url.to_lowercase();

    if lower.starts_with("http%3a") || lower.starts_with("https%3a") {
        percent_decode_str(url).decode_utf8_lossy().into_owned()
    } else {
        url.to_string()
    }
}

/// Extract the captured URL, capture time, and playback mode from a memento
/// URL such as
/// `https://web.archive.org/web/20170813195036id_/https://arpa-e.energy.gov/`.
pub(crate) fn memento_url_data(memento_url: &str) -> Result<(String, DateTime<Utc>, Mode)> {
    let groups = MEMENTO_URL_RE
        .captures(memento_url)
        .ok_or_else(|| Error::InvalidMementoUrl {
            url: memento_url.to_string(),
        })?;

    let time = parse_timestamp(groups.get(1).map_or("", |m| m.as_str()))?;
    let mode = Mode::from_suffix(groups.get(2).map_or("", |m| m.as_str()));
    let url = clean_memento_url_component(groups.get(3).map_or("", |m| m.as_str()));

    Ok((url, time, mode))
}

/// Build the playback URL for a capture of `url` at `timestamp` (already in
/// Wayback's 14-digit form) in the given mode.
pub(crate) fn format_memento_url(url: &str, timestamp: &str, mode: &Mode) -> String {
    format!(
        "https://web.archive.org/web/{}{}/{}",
        timestamp,
        mode.suffix(),
        url
    )
}

/// Return a memento URL with the mode component replaced.
pub(crate) fn set_memento_url_mode(url: &str, mode: &Mode) -> Result<String> {
    let (captured_url, timestamp, _) = memento_url_data(url)?;

    Ok(format_memento_url(
        &captured_url,
        &format_timestamp(&timestamp),
        mode,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_timestamp() {
        let time = Utc.ymd(2017, 11, 24).and_hms(15, 13, 15);

        assert_eq!(format_timestamp(&time), "20171124151315");
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(&NaiveDate::from_ymd(1996, 10, 1)), "19961001000000");
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(
            parse_timestamp("20171124151315").unwrap(),
            Utc.ymd(2017, 11, 24).and_hms(15, 13, 15)
        );
    }

    #[test]
    fn test_parse_timestamp_round_trip() {
        let values = vec!["19961231235847", "20000824173151", "20201102232816"];

        for value in values {
            assert_eq!(format_timestamp(&parse_timestamp(value).unwrap()), value);
        }
    }

    #[test]
    fn test_parse_timestamp_repairs_month_zero() {
        // The inserted "00" is dropped and the truncated seconds are padded.
        assert_eq!(
            parse_timestamp("20000012170449").unwrap(),
            Utc.ymd(2000, 12, 17).and_hms(4, 49, 0)
        );
    }

    #[test]
    fn test_parse_timestamp_repairs_day_zero() {
        assert_eq!(
            parse_timestamp("20000800241623").unwrap(),
            Utc.ymd(2000, 8, 24).and_hms(16, 23, 0)
        );
    }

    #[test]
    fn test_parse_timestamp_rejects_other_corruption() {
        assert!(matches!(
            parse_timestamp("2000"),
            Err(Error::InvalidTimestamp(_))
        ));
        assert!(matches!(
            parse_timestamp("20171399151315"),
            Err(Error::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("10"), Duration::from_secs(10));
        assert_eq!(parse_retry_after("0"), Duration::from_secs(0));
        assert_eq!(parse_retry_after("-3"), Duration::from_secs(0));
        // Dates in the past clamp to zero.
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"),
            Duration::from_secs(0)
        );
        assert_eq!(parse_retry_after("not a delay"), Duration::from_secs(0));
    }

    #[test]
    fn test_memento_url_data() {
        let (url, time, mode) = memento_url_data(
            "https://web.archive.org/web/20170813195036id_/https://arpa-e.energy.gov/?q=engage/events-workshops",
        )
        .unwrap();

        assert_eq!(url, "https://arpa-e.energy.gov/?q=engage/events-workshops");
        assert_eq!(time, Utc.ymd(2017, 8, 13).and_hms(19, 50, 36));
        assert_eq!(mode, Mode::Original);
    }

    #[test]
    fn test_memento_url_data_view_mode() {
        let (url, time, mode) =
            memento_url_data("http://web.archive.org/web/20181023233237/http://noaa.gov/").unwrap();

        assert_eq!(url, "http://noaa.gov/");
        assert_eq!(time, Utc.ymd(2018, 10, 23).and_hms(23, 32, 37));
        assert_eq!(mode, Mode::View);
    }

    #[test]
    fn test_memento_url_data_decodes_encoded_captures() {
        let (url, _, _) = memento_url_data(
            "https://web.archive.org/web/20181023233237id_/http%3A%2F%2Fnoaa.gov%2F",
        )
        .unwrap();

        assert_eq!(url, "http://noaa.gov/");
    }

    #[test]
    fn test_memento_url_data_leaves_query_encoding_alone() {
        let (url, _, _) = memento_url_data(
            "https://web.archive.org/web/20181023233237id_/http://noaa.gov/?q=a%20b",
        )
        .unwrap();

        assert_eq!(url, "http://noaa.gov/?q=a%20b");
    }

    #[test]
    fn test_memento_url_data_rejects_other_urls() {
        let values = vec![
            "http://archive.org/web/20181023233237id_/http://noaa.gov/",
            "https://web.archive.org/cdx/search/cdx?url=noaa.gov",
            "http://noaa.gov/",
        ];

        for value in values {
            assert!(matches!(
                memento_url_data(value),
                Err(Error::InvalidMementoUrl { .. })
            ));
        }
    }

    #[test]
    fn test_format_memento_url() {
        assert_eq!(
            format_memento_url("http://www.nasa.gov/", "19961231235847", &Mode::Original),
            "https://web.archive.org/web/19961231235847id_/http://www.nasa.gov/"
        );
        assert_eq!(
            format_memento_url("http://www.nasa.gov/", "19961231235847", &Mode::View),
            "https://web.archive.org/web/19961231235847/http://www.nasa.gov/"
        );
    }

    #[test]
    fn test_set_memento_url_mode() {
        assert_eq!(
            set_memento_url_mode(
                "https://web.archive.org/web/19961231235847/http://www.nasa.gov/",
                &Mode::Original
            )
            .unwrap(),
            "https://web.archive.org/web/19961231235847id_/http://www.nasa.gov/"
        );
    }

    #[test]
    fn test_memento_url_round_trip() {
        let url = "https://web.archive.org/web/20171124151315id_/https://www.fws.gov/birds/";
        let (captured, time, mode) = memento_url_data(url).unwrap();

        assert_eq!(
            format_memento_url(&captured, &format_timestamp(&time), &mode),
            url
        );
    }
}
