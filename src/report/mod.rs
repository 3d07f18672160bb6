//! HTML gallery of accepted items.
//!
//! Cards are sorted by popularity, image hosts are rewritten to a public
//! mirror (the origin CDN rejects requests without a pixiv `Referer`), and the
//! page can re-sort itself by likes or date in the browser.

use std::path::{Path, PathBuf};

use askama::Template;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::api::CrawlItem;

/// File name of the generated report inside the output directory.
pub const REPORT_FILE_NAME: &str = "output.html";

/// Image host that requires a pixiv `Referer`.
pub const ORIGIN_IMAGE_HOST: &str = "i.pximg.net";

/// Public mirror that serves the same paths without a `Referer`.
pub const MIRROR_IMAGE_HOST: &str = "i.pixiv.re";

/// Shown when an item has no usable image URL.
pub const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/300?text=No+Image";

/// Errors that can occur while writing the report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Template rendering failed.
    #[error("failed to render report: {0}")]
    Render(#[from] askama::Error),

    /// The report could not be written.
    #[error("failed to write report to {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl ReportError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One card as rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportCard {
    pub id: u64,
    pub title: String,
    pub creator: String,
    pub likes: u64,
    /// Full timestamp, used for client-side sorting.
    pub created_at: String,
    /// First ten characters of the timestamp (the date part).
    pub date: String,
    pub thumb_src: String,
    pub preview_src: String,
    /// Mirror URL of the full-size original, when the item has one.
    pub original_src: Option<String>,
    pub artwork_url: String,
}

impl From<&CrawlItem> for ReportCard {
    fn from(item: &CrawlItem) -> Self {
        let created_at = item.created_at.clone().unwrap_or_default();
        Self {
            id: item.id,
            title: item.title.clone(),
            creator: item.creator.clone(),
            likes: item.popularity_count,
            date: created_at.chars().take(10).collect(),
            created_at,
            thumb_src: mirror_image_url(item.image_urls.thumbnail.as_deref()),
            preview_src: mirror_image_url(item.image_urls.preview.as_deref()),
            original_src: item
                .image_urls
                .original
                .as_deref()
                .filter(|url| !url.is_empty())
                .map(|url| url.replace(ORIGIN_IMAGE_HOST, MIRROR_IMAGE_HOST)),
            artwork_url: item.artwork_url(),
        }
    }
}

#[derive(Template)]
#[template(path = "report.html")]
struct ReportTemplate<'a> {
    query: &'a str,
    threshold: u64,
    cards: Vec<ReportCard>,
}

/// Rewrites the origin image host to the mirror; placeholder for missing URLs.
#[must_use]
pub fn mirror_image_url(url: Option<&str>) -> String {
    match url.filter(|url| !url.is_empty()) {
        Some(url) => url.replace(ORIGIN_IMAGE_HOST, MIRROR_IMAGE_HOST),
        None => PLACEHOLDER_IMAGE.to_string(),
    }
}

/// Cards for `items`, most popular first. Ties keep arrival order.
#[must_use]
pub fn build_cards(items: &[CrawlItem]) -> Vec<ReportCard> {
    let mut cards: Vec<ReportCard> = items.iter().map(ReportCard::from).collect();
    cards.sort_by(|a, b| b.likes.cmp(&a.likes));
    cards
}

/// Renders the report to a string.
///
/// # Errors
///
/// Returns [`ReportError::Render`] if the template fails.
pub fn render_html(items: &[CrawlItem], query: &str, threshold: u64) -> Result<String, ReportError> {
    let template = ReportTemplate {
        query,
        threshold,
        cards: build_cards(items),
    };
    Ok(template.render()?)
}

/// Writes `<output_dir>/output.html` and returns its absolute path.
///
/// # Errors
///
/// Returns [`ReportError`] if rendering or writing fails.
#[instrument(skip(items), fields(items = items.len()))]
pub fn render_report(
    items: &[CrawlItem],
    query: &str,
    threshold: u64,
    output_dir: &Path,
) -> Result<PathBuf, ReportError> {
    let html = render_html(items, query, threshold)?;
    std::fs::create_dir_all(output_dir).map_err(|source| ReportError::io(output_dir, source))?;
    let path = output_dir.join(REPORT_FILE_NAME);
    std::fs::write(&path, html).map_err(|source| ReportError::io(&path, source))?;
    let path = std::fs::canonicalize(&path).unwrap_or(path);
    debug!(path = %path.display(), "report written");
    Ok(path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::ImageUrls;
    use tempfile::TempDir;

    fn item(id: u64, likes: u64, title: &str) -> CrawlItem {
        CrawlItem {
            id,
            title: title.to_string(),
            creator: "artist".to_string(),
            rating_flag: 0,
            popularity_count: likes,
            created_at: Some("2024-03-05T12:34:56+09:00".to_string()),
            image_urls: ImageUrls {
                thumbnail: Some(format!("https://i.pximg.net/c/360x360/{id}_square.jpg")),
                preview: Some(format!("https://i.pximg.net/c/600x1200/{id}_master.jpg")),
                original: None,
            },
        }
    }

    #[test]
    fn test_mirror_image_url() {
        assert_eq!(
            mirror_image_url(Some("https://i.pximg.net/img/1.png")),
            "https://i.pixiv.re/img/1.png"
        );
        assert_eq!(mirror_image_url(None), PLACEHOLDER_IMAGE);
        assert_eq!(mirror_image_url(Some("")), PLACEHOLDER_IMAGE);
    }

    #[test]
    fn test_cards_sorted_by_likes_descending() {
        let cards = build_cards(&[item(1, 10, "a"), item(2, 300, "b"), item(3, 50, "c")]);
        let ids: Vec<u64> = cards.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert_eq!(cards[0].date, "2024-03-05");
        assert_eq!(cards[0].artwork_url, "https://www.pixiv.net/en/artworks/2");
    }

    #[test]
    fn test_render_html_escapes_and_rewrites_hosts() {
        let html = render_html(&[item(9, 1200, "<script>x</script>")], "cat & dog", 1000).unwrap();
        assert!(!html.contains("cat & dog"));
        assert!(!html.contains("<script>x</script>"));
        assert!(html.contains("https://i.pixiv.re/c/360x360/9_square.jpg"));
        assert!(!html.contains("i.pximg.net"));
        assert!(html.contains("data-likes=\"1200\""));
        assert!(html.contains("1 images found"));
    }

    #[test]
    fn test_render_report_writes_output_file() {
        let tempdir = TempDir::new().unwrap();
        let out = tempdir.path().join("results");
        let path = render_report(&[item(1, 5, "t")], "q", 1, &out).unwrap();
        assert!(path.ends_with("output.html"));
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.contains("https://www.pixiv.net/en/artworks/1"));
    }

    #[test]
    fn test_render_html_links_original_for_download() {
        let mut with_original = item(4, 900, "full");
        with_original.image_urls.original =
            Some("https://i.pximg.net/img-original/img/4_p0.png".to_string());
        let without_original = item(5, 100, "none");

        let cards = build_cards(&[with_original.clone(), without_original.clone()]);
        assert_eq!(
            cards[0].original_src.as_deref(),
            Some("https://i.pixiv.re/img-original/img/4_p0.png")
        );
        assert_eq!(cards[1].original_src, None);

        let html = render_html(&[with_original], "q", 1).unwrap();
        assert!(html.contains(r#"href="https://i.pixiv.re/img-original/img/4_p0.png" download"#));

        let html = render_html(&[without_original], "q", 1).unwrap();
        assert!(!html.contains(" download>"));
    }
}
