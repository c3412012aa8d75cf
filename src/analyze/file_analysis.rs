use serde::{Deserialize, Serialize};

use crate::utils::truncate_chars;

const APACHE_DIRECTIVES: [&str; 10] = [
    "RewriteRule", "RewriteCond", "Redirect", "Allow", "Deny", "Order",
    "DirectoryIndex", "ErrorDocument", "Options", "SetEnv",
];

const KEY_VALUE_EXTENSIONS: [&str; 5] = ["env", "config", "conf", "ini", "properties"];

const PREVIEW_SCAN_LINES: usize = 50;
const MAX_PREVIEW_LINES: usize = 20;
const COMMENT_SCAN_LINES: usize = 20;
const MAX_COMMENTS: usize = 5;

/// Raw-file view of a non-HTML response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub file_type: String,
    pub line_count: usize,
    pub directives: Vec<String>,
    pub configurations: Vec<String>,
    pub comments: Vec<String>,
    pub preview_lines: Vec<String>,
}

/// File the original request asked for, as far as the URL tells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestedFile {
    /// Last path segment
    pub name: Option<String>,
    /// Lower-cased text after the last `.` of the last segment
    pub extension: Option<String>,
}

impl RequestedFile {
    pub fn from_url(raw: &str) -> Self {
        let path = match url::Url::parse(raw) {
            Ok(u) => u.path().to_string(),
            Err(_) => return Self::default(),
        };
        let name = path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let extension = name
            .as_deref()
            .and_then(|n| n.rsplit_once('.'))
            .map(|(_, ext)| ext.to_lowercase())
            .filter(|ext| !ext.is_empty());
        Self { name, extension }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// `.htaccess` and friends
    ApacheConfig,
    /// `.env`, `.ini`, `.properties`...
    KeyValueConfig,
    Generic,
}

impl FileKind {
    pub fn detect(file: &RequestedFile) -> Self {
        let ext = file.extension.as_deref().unwrap_or("");
        let name = file.name.as_deref().unwrap_or("").to_lowercase();
        if ext == "htaccess" || name.contains(".htaccess") {
            FileKind::ApacheConfig
        } else if KEY_VALUE_EXTENSIONS.contains(&ext) || name.starts_with(".env") {
            FileKind::KeyValueConfig
        } else {
            FileKind::Generic
        }
    }
}

fn is_comment(stripped: &str) -> bool {
    stripped.starts_with('#') || stripped.starts_with("//")
}

pub fn analyze_non_html_file(content: &str, file: &RequestedFile) -> FileAnalysis {
    let lines: Vec<&str> = content.split('\n').collect();
    let mut analysis = FileAnalysis {
        file_type: file.extension.clone().unwrap_or_else(|| "unknown".to_string()),
        line_count: lines.len(),
        ..Default::default()
    };

    analysis.preview_lines = lines
        .iter()
        .take(PREVIEW_SCAN_LINES)
        .filter(|line| {
            let stripped = line.trim();
            !stripped.is_empty() && !is_comment(stripped)
        })
        .take(MAX_PREVIEW_LINES)
        .map(|line| truncate_chars(line.trim_end(), 100).to_string())
        .collect();

    let body_lines = lines
        .iter()
        .map(|l| l.trim())
        .filter(|s| !s.is_empty() && !is_comment(s));

    match FileKind::detect(file) {
        FileKind::ApacheConfig => {
            analysis.directives = body_lines
                .filter(|s| APACHE_DIRECTIVES.iter().any(|d| s.contains(d)))
                .map(|s| truncate_chars(s, 150).to_string())
                .collect();
        }
        FileKind::KeyValueConfig => {
            analysis.configurations = body_lines
                .filter(|s| s.contains('='))
                .map(|s| truncate_chars(s, 150).to_string())
                .collect();
        }
        FileKind::Generic => {}
    }

    analysis.comments = lines
        .iter()
        .take(COMMENT_SCAN_LINES)
        .map(|l| l.trim())
        .filter(|s| is_comment(s))
        .take(MAX_COMMENTS)
        .map(|s| truncate_chars(s, 100).to_string())
        .collect();

    analysis
}
