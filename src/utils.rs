//! Small helpers for logging, URL handling and file system checks.
//!
//! - String truncation for log previews
//! - Keyword templating for feed and page URLs
//! - Link normalization used by deduplication
//! - Slugs for output file names
//! - Output directory validation

use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};
use url::Url;

/// Placeholder replaced by the URL-encoded keyword in source templates.
pub const KEYWORD_PLACEHOLDER: &str = "%s";

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a char boundary) with an
/// ellipsis and a count of the dropped bytes appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Substitute the URL-encoded keyword into a `%s` template.
///
/// Templates without a placeholder are returned unchanged.
pub fn expand_template(template: &str, keyword: &str) -> String {
    if template.contains(KEYWORD_PLACEHOLDER) {
        template.replace(KEYWORD_PLACEHOLDER, &urlencoding::encode(keyword))
    } else {
        template.to_string()
    }
}

/// Normalize a link so that trivially different spellings compare equal.
///
/// Lowercases scheme and host, drops the fragment, a default port and a
/// trailing slash on the path. Strings that do not parse as URLs are only
/// trimmed and lowercased.
pub fn normalize_link(link: &str) -> String {
    match Url::parse(link.trim()) {
        Ok(mut url) => {
            // Parsing already lowercases the host and strips default ports.
            url.set_fragment(None);
            let mut out = url.to_string();
            if out.ends_with('/') && url.query().is_none() {
                out.pop();
            }
            out
        }
        Err(_) => link.trim().to_lowercase(),
    }
}

/// Convert a keyword to a file-name friendly slug.
///
/// Lowercases the text, removes special characters and replaces spaces with
/// hyphens. An input with nothing left becomes `"all"`.
pub fn slugify(text: &str) -> String {
    let slug = text
        .trim()
        .to_lowercase()
        .replace(|c: char| !c.is_alphanumeric() && c != ' ' && c != '-', "")
        .replace(' ', "-");
    if slug.is_empty() { "all".to_string() } else { slug }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}
