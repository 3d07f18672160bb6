//! Search request parameters and continuation-cursor parsing.
//!
//! The first request of a crawl is built from the query and a numeric offset.
//! Every later request reuses, verbatim, the parameters the server encoded
//! into the previous page's `next_url`. Cursors are never assembled by hand.

use thiserror::Error;
use url::{Url, form_urlencoded};

use super::constants::PAGE_SIZE;
use super::models::SearchQuery;

/// Errors that can occur while parsing a continuation cursor.
#[derive(Debug, Error)]
pub enum CursorError {
    /// Cursor is not a valid absolute URL.
    #[error("malformed continuation cursor '{cursor}': {source}")]
    InvalidUrl {
        /// The cursor as received.
        cursor: String,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },

    /// Cursor URL carries no query parameters.
    #[error("continuation cursor '{cursor}' has no query parameters")]
    NoParameters {
        /// The cursor as received.
        cursor: String,
    },
}

/// Parameter set for one search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    pairs: Vec<(String, String)>,
}

impl SearchParams {
    /// Parameters for the first request of a crawl.
    ///
    /// `start_page` is 1-based; the offset is `(start_page - 1) * 30`.
    #[must_use]
    pub fn initial(query: &SearchQuery, start_page: u32) -> Self {
        let mut pairs = vec![
            ("word".to_string(), query.word.clone()),
            ("search_target".to_string(), query.target.as_str().to_string()),
            ("sort".to_string(), query.sort.as_str().to_string()),
            ("filter".to_string(), "for_ios".to_string()),
            ("merge_plain_keyword_results".to_string(), "true".to_string()),
            ("include_translated_tag_results".to_string(), "true".to_string()),
        ];
        let offset = initial_offset(start_page);
        if offset > 0 {
            pairs.push(("offset".to_string(), offset.to_string()));
        }
        Self { pairs }
    }

    /// Parses a server-provided continuation cursor into request parameters.
    ///
    /// # Errors
    ///
    /// Returns [`CursorError`] when the cursor is not a URL or has no query.
    pub fn from_cursor(cursor: &str) -> Result<Self, CursorError> {
        let url = Url::parse(cursor).map_err(|source| CursorError::InvalidUrl {
            cursor: cursor.to_string(),
            source,
        })?;

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        if pairs.is_empty() {
            return Err(CursorError::NoParameters {
                cursor: cursor.to_string(),
            });
        }

        Ok(Self { pairs })
    }

    /// First value for `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// All parameters in request order.
    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Numeric offset carried by these parameters (0 when absent).
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.get("offset")
            .and_then(|value| value.parse().ok())
            .unwrap_or(0)
    }

    /// URL-encoded query string for these parameters.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish()
    }
}

/// Offset of the first item on a 1-based page number.
#[must_use]
pub fn initial_offset(start_page: u32) -> u64 {
    u64::from(start_page.saturating_sub(1)) * u64::from(PAGE_SIZE)
}
