//! Canonical comic record shared with collaborators
//!
//! The JSON shape of [`Comic`] and [`ComicSet`] is the output artifact
//! consumed by the indexer and the web server: an object keyed by decimal
//! comic numbers whose values are comic records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap, Entry};

/// One merged comic: xkcd metadata plus the explainxkcd explanation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comic {
    /// Comic number as requested by the caller (the map key)
    #[serde(rename = "num")]
    pub id: u32,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(rename = "img_url")]
    pub image_url: String,
    /// Cleaned explanation text, empty when the wiki had none
    #[serde(default)]
    pub explanation: String,
    /// Publication date (midnight UTC), serialized as Unix seconds
    #[serde(with = "chrono::serde::ts_seconds")]
    pub date: DateTime<Utc>,
}

/// Comics keyed by comic number
///
/// Each number is written at most once; a second insert for the same
/// number is rejected and leaves the first record in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComicSet(BTreeMap<u32, Comic>);

impl ComicSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a comic under its own number.
    ///
    /// Returns `false` (and keeps the existing record) if the number is
    /// already present.
    pub fn insert(&mut self, comic: Comic) -> bool {
        match self.0.entry(comic.id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(comic);
                true
            }
        }
    }

    pub fn get(&self, id: u32) -> Option<&Comic> {
        self.0.get(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.0.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Highest comic number present
    pub fn latest_id(&self) -> Option<u32> {
        self.0.keys().next_back().copied()
    }

    /// Comic numbers in ascending order
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> btree_map::Values<'_, u32, Comic> {
        self.0.values()
    }
}

impl IntoIterator for ComicSet {
    type Item = Comic;
    type IntoIter = btree_map::IntoValues<u32, Comic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_values()
    }
}

impl FromIterator<Comic> for ComicSet {
    fn from_iter<I: IntoIterator<Item = Comic>>(iter: I) -> Self {
        let mut set = ComicSet::new();
        for comic in iter {
            set.insert(comic);
        }
        set
    }
}
