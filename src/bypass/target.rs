use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{BypassError, Result};

/// Record handed over by the sensitive-path fuzzer. Extra fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub url: String,
    pub status: u16,
}

/// A restricted endpoint worth probing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BypassTarget {
    pub url: String,
    pub original_status: u16,
}

impl BypassTarget {
    pub fn new(url: impl Into<String>, original_status: u16) -> Self {
        Self { url: url.into(), original_status }
    }

    /// Only 401 and 403 responses are considered restricted.
    pub fn is_restricted(status: u16) -> bool {
        status == 401 || status == 403
    }

    pub fn from_record(record: &CandidateRecord) -> Option<Self> {
        Self::is_restricted(record.status).then(|| Self::new(record.url.clone(), record.status))
    }
}

/// The pieces of a target URL that techniques rewrite.
#[derive(Debug, Clone)]
pub struct TargetUrl {
    original: String,
    scheme: String,
    netloc: String,
    base_path: String,
    query: Option<String>,
    fragment: Option<String>,
}

impl TargetUrl {
    pub fn parse(raw: &str) -> Result<Self> {
        let parsed = Url::parse(raw).map_err(|e| BypassError::invalid_target(raw, e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| BypassError::invalid_target(raw, "missing host"))?;
        let netloc = match parsed.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Ok(Self {
            original: raw.to_string(),
            scheme: parsed.scheme().to_string(),
            netloc,
            base_path: parsed.path().trim_end_matches('/').to_string(),
            query: parsed.query().map(str::to_string),
            fragment: parsed.fragment().map(str::to_string),
        })
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    /// Path without trailing slashes; empty for the site root.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// `scheme://host[:port]`
    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme, self.netloc)
    }

    /// Rebuild the URL with `path` swapped in, keeping query and fragment.
    pub fn with_path(&self, path: &str) -> String {
        let mut out = format!("{}{}", self.origin(), path);
        if let Some(q) = &self.query {
            out.push('?');
            out.push_str(q);
        }
        if let Some(f) = &self.fragment {
            out.push('#');
            out.push_str(f);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_401_and_403_qualify() {
        let ok = CandidateRecord { url: "http://x/a".into(), status: 403 };
        let auth = CandidateRecord { url: "http://x/b".into(), status: 401 };
        let nope = CandidateRecord { url: "http://x/c".into(), status: 404 };
        assert!(BypassTarget::from_record(&ok).is_some());
        assert!(BypassTarget::from_record(&auth).is_some());
        assert!(BypassTarget::from_record(&nope).is_none());
    }

    #[test]
    fn splits_url_parts() {
        let t = TargetUrl::parse("https://example.com:8443/admin/?debug=1").unwrap();
        assert_eq!(t.base_path(), "/admin");
        assert_eq!(t.origin(), "https://example.com:8443");
        assert_eq!(t.with_path("/admin;"), "https://example.com:8443/admin;?debug=1");
    }

    #[test]
    fn default_port_is_dropped() {
        let t = TargetUrl::parse("http://example.com:80/x").unwrap();
        assert_eq!(t.origin(), "http://example.com");
    }

    #[test]
    fn rejects_relative_urls() {
        assert!(matches!(TargetUrl::parse("/admin"), Err(BypassError::InvalidTarget { .. })));
    }
}
