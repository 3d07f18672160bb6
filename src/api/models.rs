//! Search query options and the normalized result item.
//!
//! The API returns loosely-populated JSON objects. Everything is normalized
//! into [`CrawlItem`] here so the crawl engine never inspects raw JSON.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::constants::ARTWORK_URL_PREFIX;

/// Which fields the search word is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchTarget {
    /// Tags containing the word.
    #[default]
    PartialMatchForTags,
    /// Tags equal to the word.
    ExactMatchForTags,
    /// Title and caption text.
    TitleAndCaption,
}

impl SearchTarget {
    /// API parameter value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PartialMatchForTags => "partial_match_for_tags",
            Self::ExactMatchForTags => "exact_match_for_tags",
            Self::TitleAndCaption => "title_and_caption",
        }
    }
}

impl FromStr for SearchTarget {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "partial_match_for_tags" | "partial" => Ok(Self::PartialMatchForTags),
            "exact_match_for_tags" | "exact" => Ok(Self::ExactMatchForTags),
            "title_and_caption" | "title" => Ok(Self::TitleAndCaption),
            other => Err(format!(
                "unknown search target '{other}' (expected partial, exact, or title)"
            )),
        }
    }
}

impl fmt::Display for SearchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result ordering requested from the API.
///
/// `popular_desc` requires a premium account; other accounts get an empty
/// or date-ordered result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Newest first.
    #[default]
    DateDesc,
    /// Oldest first.
    DateAsc,
    /// Most bookmarked first.
    PopularDesc,
}

impl SortOrder {
    /// API parameter value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DateDesc => "date_desc",
            Self::DateAsc => "date_asc",
            Self::PopularDesc => "popular_desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "date_desc" => Ok(Self::DateDesc),
            "date_asc" => Ok(Self::DateAsc),
            "popular_desc" => Ok(Self::PopularDesc),
            other => Err(format!(
                "unknown sort order '{other}' (expected date_desc, date_asc, or popular_desc)"
            )),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to search for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Search word (tag or keyword).
    pub word: String,
    /// Field selection.
    pub target: SearchTarget,
    /// Result ordering.
    pub sort: SortOrder,
}

impl SearchQuery {
    /// Query with default target and ordering.
    #[must_use]
    pub fn new(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            target: SearchTarget::default(),
            sort: SortOrder::default(),
        }
    }
}

/// Image URLs attached to an item, by size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageUrls {
    /// Small square crop.
    pub thumbnail: Option<String>,
    /// Large preview (master image).
    pub preview: Option<String>,
    /// Full-resolution original of the first page.
    pub original: Option<String>,
}

/// One search result, normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlItem {
    pub id: u64,
    pub title: String,
    pub creator: String,
    /// 0 for general content; greater than 0 for age-restricted content.
    pub rating_flag: u8,
    /// Bookmark count.
    pub popularity_count: u64,
    /// ISO-8601 creation timestamp as sent by the server.
    pub created_at: Option<String>,
    pub image_urls: ImageUrls,
}

impl CrawlItem {
    /// Whether the item is flagged as age-restricted.
    #[must_use]
    pub fn is_restricted(&self) -> bool {
        self.rating_flag > 0
    }

    /// Public artwork page for this item.
    #[must_use]
    pub fn artwork_url(&self) -> String {
        format!("{ARTWORK_URL_PREFIX}{}", self.id)
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub items: Vec<CrawlItem>,
    /// Continuation cursor; `None` when the server signals the last page.
    pub next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSearchResponse {
    #[serde(default)]
    illusts: Vec<RawIllust>,
    #[serde(default)]
    next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawIllust {
    id: u64,
    title: Option<String>,
    user: Option<RawUser>,
    x_restrict: Option<u8>,
    total_bookmarks: Option<u64>,
    create_date: Option<String>,
    image_urls: Option<RawImageUrls>,
    meta_single_page: Option<RawMetaSinglePage>,
    #[serde(default)]
    meta_pages: Vec<RawMetaPage>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawImageUrls {
    square_medium: Option<String>,
    medium: Option<String>,
    large: Option<String>,
    original: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMetaSinglePage {
    original_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMetaPage {
    #[serde(default)]
    image_urls: RawImageUrls,
}

impl From<RawSearchResponse> for SearchPage {
    fn from(raw: RawSearchResponse) -> Self {
        Self {
            items: raw.illusts.into_iter().map(CrawlItem::from).collect(),
            next_url: raw.next_url.filter(|url| !url.trim().is_empty()),
        }
    }
}

impl From<RawIllust> for CrawlItem {
    fn from(raw: RawIllust) -> Self {
        let urls = raw.image_urls.unwrap_or_default();

        let original = raw
            .meta_single_page
            .and_then(|single| non_empty(single.original_image_url))
            .or_else(|| {
                raw.meta_pages
                    .into_iter()
                    .next()
                    .and_then(|page| non_empty(page.image_urls.original))
            })
            .or_else(|| non_empty(urls.large.clone()));

        let preview = non_empty(urls.large).or_else(|| non_empty(urls.medium));

        Self {
            id: raw.id,
            title: non_empty(raw.title).unwrap_or_else(|| "Untitled".to_string()),
            creator: raw
                .user
                .and_then(|user| non_empty(user.name))
                .unwrap_or_else(|| "Unknown".to_string()),
            rating_flag: raw.x_restrict.unwrap_or(0),
            popularity_count: raw.total_bookmarks.unwrap_or(0),
            created_at: non_empty(raw.create_date),
            image_urls: ImageUrls {
                thumbnail: non_empty(urls.square_medium),
                preview,
                original,
            },
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
