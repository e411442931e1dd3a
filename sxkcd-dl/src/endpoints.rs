//! Request URLs for the two upstream APIs
//!
//! - xkcd: `<base>/info.0.json` (latest) or `<base>/<num>/info.0.json`
//! - explainxkcd: MediaWiki `action=parse` query for the Explanation section

use crate::error::FetchError;
use reqwest::Url;
use std::fmt;

const XKCD_LEAF: &str = "info.0.json";

/// Fixed MediaWiki parameters; `page` is added per request
const EXPLAIN_QUERY: [(&str, &str); 5] = [
    ("action", "parse"),
    ("format", "json"),
    ("redirects", "true"),
    ("prop", "wikitext"),
    ("sectiontitle", "Explanation"),
];

/// xkcd comic number, where 0 means "most recent"
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComicId(u32);

impl ComicId {
    pub const LATEST: ComicId = ComicId(0);

    pub fn new(id: u32) -> Self {
        ComicId(id)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn is_latest(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for ComicId {
    fn from(id: u32) -> Self {
        ComicId(id)
    }
}

impl TryFrom<i64> for ComicId {
    type Error = FetchError;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        if id < 0 {
            return Err(FetchError::InvalidArgument(format!(
                "comic id cannot be negative: {}",
                id
            )));
        }
        u32::try_from(id)
            .map(ComicId)
            .map_err(|_| FetchError::InvalidArgument(format!("comic id out of range: {}", id)))
    }
}

impl fmt::Display for ComicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_latest() {
            f.write_str("latest")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

/// Resolves comic ids to request URLs
///
/// Bases are parsed once; resolving clones them, so one `Endpoints` can be
/// shared across concurrent tasks.
#[derive(Debug, Clone)]
pub struct Endpoints {
    xkcd: Url,
    explain: Url,
}

impl Endpoints {
    pub fn new(xkcd_base: &str, explain_base: &str) -> Result<Self, FetchError> {
        let xkcd = parse_base(xkcd_base)?;
        let mut explain = parse_base(explain_base)?;

        // Keep unrelated query parameters from the configured base
        let retained: Vec<(String, String)> = explain
            .query_pairs()
            .filter(|(k, _)| k != "page" && !EXPLAIN_QUERY.iter().any(|(fixed, _)| k == *fixed))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        explain
            .query_pairs_mut()
            .clear()
            .extend_pairs(retained)
            .extend_pairs(EXPLAIN_QUERY);

        Ok(Self { xkcd, explain })
    }

    /// xkcd JSON URL for a comic (or the latest comic)
    pub fn xkcd(&self, id: ComicId) -> Url {
        let mut url = self.xkcd.clone();
        let base = url.path().trim_end_matches('/').to_string();
        let path = if id.is_latest() {
            format!("{}/{}", base, XKCD_LEAF)
        } else {
            format!("{}/{}/{}", base, id.get(), XKCD_LEAF)
        };
        url.set_path(&path);
        url
    }

    /// explainxkcd wikitext URL for a comic
    pub fn explain(&self, id: u32) -> Url {
        let mut url = self.explain.clone();
        url.query_pairs_mut().append_pair("page", &id.to_string());
        url
    }
}

fn parse_base(base: &str) -> Result<Url, FetchError> {
    let url = Url::parse(base)
        .map_err(|e| FetchError::InvalidArgument(format!("failed to parse {:?}: {}", base, e)))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(FetchError::InvalidArgument(format!(
            "not an http(s) base URL: {:?}",
            base
        )));
    }
    Ok(url)
}
