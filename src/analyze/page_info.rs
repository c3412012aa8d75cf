use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, CONTENT_TYPE, SERVER};
use scraper::{Html, Node, Selector};
use serde::{Deserialize, Serialize};

use crate::analyze::file_analysis::{analyze_non_html_file, FileAnalysis, RequestedFile};
use crate::analyze::patterns;
use crate::error::BypassError;
use crate::utils::truncate_chars;

/// Extensions whose responses may legitimately be HTML
const MARKUP_EXTENSIONS: [&str; 6] = ["html", "htm", "php", "asp", "aspx", "jsp"];

/// HTML-typed bodies above this size are considered full pages
const LARGE_HTML_BYTES: usize = 10_000;
const HTML_SNIFF_CHARS: usize = 1000;
const PREVIEW_CHARS: usize = 500;

static HTML_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<!DOCTYPE|<html|<head|<body").unwrap());
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Evidence pulled out of a page reached through a bypass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub title: Option<String>,
    pub content_length: usize,
    pub content_type: String,
    pub server: String,
    pub sensitive_keywords: BTreeSet<String>,
    pub emails: Vec<String>,
    /// Secret categories that matched at least once
    pub interesting_patterns: Vec<String>,
    /// `"{category}: {masked value}"`
    pub secrets: Vec<String>,
    pub config_vars: Vec<String>,
    pub database_info: Vec<String>,
    pub file_paths: Vec<String>,
    pub preview: String,
    pub is_likely_false_positive: bool,
    pub false_positive_reason: Option<String>,
    pub file_type_analysis: Option<FileAnalysis>,
    pub analysis_error: Option<String>,
}

fn header_or_unknown(headers: &HeaderMap, name: reqwest::header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn looks_like_html(text: &str) -> bool {
    HTML_MARKER.is_match(truncate_chars(text, HTML_SNIFF_CHARS))
}

/// Homepage or error page served in place of the requested file.
///
/// Dynamic extensions (php, asp, jsp...) are never flagged.
pub fn false_positive_reason(
    extension: Option<&str>,
    is_html: bool,
    html_content_type: bool,
    content_length: usize,
) -> Option<String> {
    let ext = extension?;
    if MARKUP_EXTENSIONS.contains(&ext) {
        return None;
    }
    if is_html || (html_content_type && content_length > LARGE_HTML_BYTES) {
        Some(format!(
            "Requested .{} file but received HTML content (likely homepage/error page)",
            ext
        ))
    } else {
        None
    }
}

fn with_ellipsis(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        format!("{}...", truncate_chars(text, PREVIEW_CHARS))
    } else {
        text.to_string()
    }
}

fn parse_selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn page_title(document: &Html) -> Option<String> {
    let selector = parse_selector("title")?;
    let title = document.select(&selector).next()?.text().collect::<String>();
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// Text a browser would show: body text nodes outside script/style.
fn visible_text(document: &Html) -> Option<String> {
    let selector = parse_selector("body")?;
    let body = document.select(&selector).next()?;
    let mut parts = Vec::new();
    for node in body.descendants() {
        if let Node::Text(text) = node.value() {
            let hidden = node
                .parent()
                .and_then(|p| p.value().as_element().map(|e| matches!(e.name(), "script" | "style" | "noscript")))
                .unwrap_or(false);
            let trimmed = text.trim();
            if !hidden && !trimmed.is_empty() {
                parts.push(trimmed.to_string());
            }
        }
    }
    Some(parts.join(" "))
}

fn stripped_text(text: &str) -> String {
    let no_tags = TAG.replace_all(text, " ");
    WHITESPACE.replace_all(&no_tags, " ").trim().to_string()
}

/// Classify a status-200 body fetched for `requested_url`.
///
/// Decoding problems land in `analysis_error`; this never fails.
pub fn extract_page_info(body: &[u8], headers: &HeaderMap, requested_url: &str) -> PageInfo {
    let (text, analysis_error) = match std::str::from_utf8(body) {
        Ok(s) => (std::borrow::Cow::Borrowed(s), None),
        Err(e) => {
            let err = BypassError::Classification(format!("body is not valid UTF-8 ({}), decoded lossily", e));
            (String::from_utf8_lossy(body), Some(err.to_string()))
        }
    };
    let text = text.as_ref();

    let mut info = PageInfo {
        content_length: body.len(),
        content_type: header_or_unknown(headers, CONTENT_TYPE),
        server: header_or_unknown(headers, SERVER),
        analysis_error,
        ..Default::default()
    };

    let file = RequestedFile::from_url(requested_url);
    let is_html = looks_like_html(text);
    let html_content_type = info.content_type.to_lowercase().contains("html");

    info.false_positive_reason =
        false_positive_reason(file.extension.as_deref(), is_html, html_content_type, info.content_length);
    info.is_likely_false_positive = info.false_positive_reason.is_some();

    if !is_html {
        info.file_type_analysis = Some(analyze_non_html_file(text, &file));
    }

    let document = Html::parse_document(text);
    info.title = page_title(&document);

    info.sensitive_keywords = patterns::find_sensitive_keywords(text);
    info.emails = patterns::find_emails(text);
    let (categories, secrets) = patterns::find_secrets(text);
    info.interesting_patterns = categories;
    info.secrets = secrets;
    info.config_vars = patterns::find_config_vars(text);
    info.database_info = patterns::find_database_info(text);
    info.file_paths = patterns::find_file_paths(text);

    let preview_source = if is_html {
        visible_text(&document).unwrap_or_else(|| stripped_text(text))
    } else {
        stripped_text(text)
    };
    info.preview = with_ellipsis(&preview_source);

    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(content_type: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        h.insert(SERVER, HeaderValue::from_static("nginx"));
        h
    }

    fn big_html() -> String {
        format!("<!DOCTYPE html><html><head><title>Home</title></head><body>{}</body></html>", "<p>welcome</p>".repeat(800))
    }

    #[test]
    fn html_markers_only_in_head_of_body() {
        assert!(looks_like_html("<!doctype html><p>x</p>"));
        assert!(looks_like_html("  <HTML>"));
        let late = format!("{}<html>", "a".repeat(1200));
        assert!(!looks_like_html(&late));
    }

    #[test]
    fn env_returning_html_is_false_positive() {
        let body = big_html();
        assert!(body.len() >= 10_000);
        let info = extract_page_info(body.as_bytes(), &headers("text/html"), "http://x/.env");
        assert!(info.is_likely_false_positive);
        assert!(info.false_positive_reason.as_deref().unwrap_or("").contains(".env"));
        assert!(info.file_type_analysis.is_none());
    }

    #[test]
    fn php_returning_html_is_not_flagged() {
        let body = big_html();
        let info = extract_page_info(body.as_bytes(), &headers("text/html"), "http://x/config.php");
        assert!(!info.is_likely_false_positive);
        assert!(info.false_positive_reason.is_none());
    }

    #[test]
    fn large_html_content_type_without_markers() {
        let body = "x".repeat(10_001);
        let info = extract_page_info(body.as_bytes(), &headers("text/html; charset=utf-8"), "http://x/backup.sql");
        assert!(info.is_likely_false_positive);
        // Small bodies with an HTML content type alone are not enough
        let info = extract_page_info(b"plain", &headers("text/html"), "http://x/backup.sql");
        assert!(!info.is_likely_false_positive);
    }

    #[test]
    fn no_extension_is_never_flagged() {
        let info = extract_page_info(big_html().as_bytes(), &headers("text/html"), "http://x/admin");
        assert!(!info.is_likely_false_positive);
    }

    #[test]
    fn env_body_gets_file_analysis() {
        let info = extract_page_info(b"DB_PASSWORD=secret123\nother=1", &headers("text/plain"), "http://x/.env");
        let analysis = info.file_type_analysis.expect("file analysis");
        assert!(analysis.configurations.iter().any(|c| c.contains("DB_PASSWORD=secret123")));
        assert_eq!(info.config_vars, vec!["DB_PASSWORD=secret123"]);
        assert!(info.sensitive_keywords.contains("password"));
        assert_eq!(info.preview, "DB_PASSWORD=secret123 other=1");
    }

    #[test]
    fn title_and_visible_preview() {
        let body = "<html><head><title> Admin </title><style>.x{}</style></head><body><h1>Panel</h1><script>var s=1;</script><p>Users</p></body></html>";
        let info = extract_page_info(body.as_bytes(), &headers("text/html"), "http://x/admin");
        assert_eq!(info.title.as_deref(), Some("Admin"));
        assert_eq!(info.preview, "Panel Users");
        assert_eq!(info.server, "nginx");
    }

    #[test]
    fn long_preview_is_truncated() {
        let body = format!("<html><body><p>{}</p></body></html>", "word ".repeat(200));
        let info = extract_page_info(body.as_bytes(), &HeaderMap::new(), "http://x/admin");
        assert!(info.preview.ends_with("..."));
        assert_eq!(info.preview.chars().count(), 503);
        assert_eq!(info.content_type, "unknown");
    }

    #[test]
    fn invalid_utf8_is_recorded_not_fatal() {
        let body = b"password=\xff\xfe oops";
        let info = extract_page_info(body, &headers("text/plain"), "http://x/secret.txt");
        assert!(info.analysis_error.is_some());
        assert!(info.sensitive_keywords.contains("password"));
    }

    #[test]
    fn classification_is_deterministic() {
        let body = "<html><title>T</title>a@x.com b@x.com api_key=abcdefghijklmnopqrstuvwxyz /etc/passwd</html>";
        let a = extract_page_info(body.as_bytes(), &headers("text/html"), "http://x/panel");
        let b = extract_page_info(body.as_bytes(), &headers("text/html"), "http://x/panel");
        assert_eq!(a, b);
    }
}
