use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static ITEM_PATH_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/item/([0-9]+)").expect("item id pattern is valid"));
static TRAILING_NUMERIC_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/([0-9]+)/?(?:\?|$)").expect("trailing id pattern is valid"));

/// One scraped marketplace result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub link: String,
    pub price: String,
    pub title: String,
}

impl Listing {
    pub fn new(link: impl Into<String>, price: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            price: price.into(),
            title: title.into(),
        }
    }

    pub fn listing_id(&self) -> String {
        extract_listing_id(&self.link)
    }

    /// Case-insensitive substring test against the raw title.
    pub fn contains_excluded_word(&self, excluded_words: &[String]) -> bool {
        if excluded_words.is_empty() {
            return false;
        }
        let title = self.title.to_lowercase();
        excluded_words
            .iter()
            .any(|word| title.contains(&word.to_lowercase()))
    }
}

/// Stable identifier for a listing link: the `/item/<digits>` id, else a
/// trailing numeric path segment, else the link itself.
pub fn extract_listing_id(link: &str) -> String {
    if let Some(caps) = ITEM_PATH_ID.captures(link) {
        return caps[1].to_string();
    }
    if let Some(caps) = TRAILING_NUMERIC_SEGMENT.captures(link) {
        return caps[1].to_string();
    }
    link.to_string()
}
