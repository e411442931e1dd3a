//! Upstream payloads and their merge into a [`Comic`]

use crate::error::FetchError;
use crate::explain::extract_explanation;
use chrono::{NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use sxkcd_common::Comic;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// xkcd `info.0.json` response
///
/// Date parts arrive as strings without leading zeros (`"1"`, `"5"`, `"2016"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XkcdComic {
    pub title: String,
    #[serde(default)]
    pub safe_title: String,
    pub num: u32,
    #[serde(default)]
    pub alt: String,
    pub img: String,
    #[serde(default)]
    pub transcript: String,
    pub day: String,
    pub month: String,
    pub year: String,
}

/// MediaWiki `action=parse` response: `{"parse":{"wikitext":{"*":"..."}}}`
///
/// Every level defaults, so an error object or a missing page decodes to an
/// empty wikitext instead of failing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExplainResponse {
    #[serde(default)]
    pub parse: ExplainParse,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExplainParse {
    #[serde(default)]
    pub wikitext: HashMap<String, String>,
}

impl ExplainResponse {
    /// Wrap raw wikitext the way the API nests it
    pub fn from_wikitext(wikitext: impl Into<String>) -> Self {
        Self {
            parse: ExplainParse {
                wikitext: HashMap::from([("*".to_string(), wikitext.into())]),
            },
        }
    }

    pub fn wikitext(&self) -> &str {
        self.parse.wikitext.get("*").map(String::as_str).unwrap_or("")
    }
}

/// Merge both payloads into the canonical record stored under `id`.
///
/// Fails only when the date parts do not form a calendar date.
pub fn assemble(id: u32, xkcd: XkcdComic, explain: &ExplainResponse) -> Result<Comic, FetchError> {
    let date_string = format!(
        "{}-{}-{}",
        xkcd.year.trim(),
        zero_pad(&xkcd.month),
        zero_pad(&xkcd.day)
    );
    let date = NaiveDate::parse_from_str(&date_string, DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .ok_or(FetchError::DateParse { value: date_string })?;

    let title = if xkcd.title.is_empty() {
        xkcd.safe_title
    } else {
        xkcd.title
    };

    Ok(Comic {
        id,
        title,
        alt: non_empty(xkcd.alt),
        transcript: non_empty(xkcd.transcript),
        image_url: xkcd.img,
        explanation: extract_explanation(explain.wikitext()),
        date,
    })
}

fn zero_pad(part: &str) -> String {
    let part = part.trim();
    if part.chars().count() <= 1 {
        format!("0{}", part)
    } else {
        part.to_string()
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xkcd(num: u32, day: &str, month: &str, year: &str) -> XkcdComic {
        XkcdComic {
            title: "foo".to_string(),
            num,
            img: "https://example.com".to_string(),
            day: day.to_string(),
            month: month.to_string(),
            year: year.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_assemble_end_to_end() {
        let explain = ExplainResponse::from_wikitext("\n==Explanation==\nHello World\n==Trivia==\nX");
        let comic = assemble(100, xkcd(100, "1", "5", "2016"), &explain).unwrap();

        assert_eq!(comic.id, 100);
        assert_eq!(comic.title, "foo");
        assert_eq!(comic.explanation, "Hello World");
        assert_eq!(comic.image_url, "https://example.com");
        assert_eq!(comic.date, Utc.with_ymd_and_hms(2016, 5, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_unpadded_date_equals_padded() {
        let explain = ExplainResponse::default();
        let unpadded = assemble(250, xkcd(250, "1", "1", "2010"), &explain).unwrap();
        let padded = assemble(250, xkcd(250, "01", "01", "2010"), &explain).unwrap();

        assert_eq!(unpadded.date, padded.date);
        assert_eq!(unpadded.date, Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_two_digit_parts() {
        let comic = assemble(250, xkcd(250, "25", "11", "2015"), &ExplainResponse::default()).unwrap();
        assert_eq!(comic.date, Utc.with_ymd_and_hms(2015, 11, 25, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_invalid_date_names_composite() {
        let err = assemble(1, xkcd(1, "31", "2", "2015"), &ExplainResponse::default()).unwrap_err();
        match err {
            FetchError::DateParse { value } => assert_eq!(value, "2015-02-31"),
            other => panic!("expected DateParse, got {:?}", other),
        }

        assert!(matches!(
            assemble(1, xkcd(1, "", "", ""), &ExplainResponse::default()),
            Err(FetchError::DateParse { .. })
        ));
    }

    #[test]
    fn test_caller_id_wins_over_reported_num() {
        let comic = assemble(7, xkcd(8, "1", "1", "2006"), &ExplainResponse::default()).unwrap();
        assert_eq!(comic.id, 7);
    }

    #[test]
    fn test_empty_optionals_and_missing_explanation() {
        let comic = assemble(3, xkcd(3, "1", "1", "2006"), &ExplainResponse::default()).unwrap();
        assert_eq!(comic.alt, None);
        assert_eq!(comic.transcript, None);
        assert_eq!(comic.explanation, "");
    }

    #[test]
    fn test_safe_title_fallback() {
        let mut payload = xkcd(5, "1", "1", "2006");
        payload.title = String::new();
        payload.safe_title = "Safe".to_string();
        payload.alt = "hover".to_string();

        let comic = assemble(5, payload, &ExplainResponse::default()).unwrap();
        assert_eq!(comic.title, "Safe");
        assert_eq!(comic.alt.as_deref(), Some("hover"));
    }

    #[test]
    fn test_explain_error_object_decodes_empty() {
        let resp: ExplainResponse =
            serde_json::from_str(r#"{"error":{"code":"missingtitle","info":"The page you specified doesn't exist."}}"#)
                .unwrap();
        assert_eq!(resp.wikitext(), "");
    }
}
