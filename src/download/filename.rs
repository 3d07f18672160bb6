//! Download naming: per-item file names and the per-run destination folder.

use std::path::{Path, PathBuf};

use url::Url;

/// Maximum suffix tried when resolving a unique folder name.
const MAX_UNIQUE_SUFFIX: u32 = 10_000;

/// Keeps alphanumerics, space, `_`, and `-`; trims surrounding whitespace.
#[must_use]
pub fn sanitize_folder_term(term: &str) -> String {
    term.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Extension (with leading dot) of the URL path's last segment, or `""`.
#[must_use]
pub fn extension_from_url(url: &str) -> String {
    let path = Url::parse(url)
        .map(|parsed| parsed.path().to_string())
        .unwrap_or_else(|_| url.split(['?', '#']).next().unwrap_or_default().to_string());
    let last_segment = path.rsplit('/').next().unwrap_or_default();
    match last_segment.rfind('.') {
        Some(pos) if pos > 0 => {
            let ext = &last_segment[pos..];
            if ext.len() > 1 && ext[1..].chars().all(|c| c.is_ascii_alphanumeric()) {
                ext.to_string()
            } else {
                String::new()
            }
        }
        _ => String::new(),
    }
}

/// `<id><ext>` file name for a downloaded image.
#[must_use]
pub fn image_filename(id: u64, url: &str) -> String {
    format!("{id}{}", extension_from_url(url))
}

/// Chooses `<base>/<term> <threshold>`, adding ` (1)`, ` (2)`, … when taken.
///
/// Does not create the directory.
#[must_use]
pub fn unique_download_dir(base: &Path, query: &str, threshold: u64) -> PathBuf {
    let folder = format!("{} {threshold}", sanitize_folder_term(query))
        .trim()
        .to_string();
    let candidate = base.join(&folder);
    if !candidate.exists() {
        return candidate;
    }

    for counter in 1..MAX_UNIQUE_SUFFIX {
        let next = base.join(format!("{folder} ({counter})"));
        if !next.exists() {
            return next;
        }
    }

    base.join(format!("{folder} ({MAX_UNIQUE_SUFFIX})"))
}
