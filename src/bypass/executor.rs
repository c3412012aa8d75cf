use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, Method, Response};

use crate::analyze::extract_page_info;
use crate::analyze::PageInfo;
use crate::bypass::outcome::{is_bypass_status, BypassHit, BypassOutcome, OutcomeBuilder, ProbeOutcome};
use crate::bypass::target::{BypassTarget, TargetUrl};
use crate::bypass::technique::Catalog;
use crate::config::Config;
use crate::error::Result;
use crate::http_client::create_bypass_client;

/// Request counters, for progress output and tests.
#[derive(Debug, Default)]
pub struct ProbeStats {
    pub(crate) catalog_requests: AtomicUsize,
    pub(crate) fallback_requests: AtomicUsize,
    pub(crate) transport_errors: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeStatsSnapshot {
    pub catalog_requests: usize,
    pub fallback_requests: usize,
    pub transport_errors: usize,
}

impl ProbeStats {
    pub fn snapshot(&self) -> ProbeStatsSnapshot {
        ProbeStatsSnapshot {
            catalog_requests: self.catalog_requests.load(Ordering::Relaxed),
            fallback_requests: self.fallback_requests.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }
}

/// Runs the per-target pipeline: catalog, then verb fallback, then
/// classification of a winning 200.
pub struct Prober {
    client: Client,
    catalog: Arc<Catalog>,
    pub(crate) methods: Vec<Method>,
    delay: Duration,
    max_body_bytes: usize,
    pub(crate) stats: ProbeStats,
}

impl Prober {
    pub fn new(config: &Config, catalog: Arc<Catalog>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: create_bypass_client(config)?,
            catalog,
            methods: config.methods()?,
            delay: config.technique_delay(),
            max_body_bytes: config.max_body_bytes,
            stats: ProbeStats::default(),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn stats(&self) -> ProbeStatsSnapshot {
        self.stats.snapshot()
    }

    /// Probe one target to completion. Always yields exactly one outcome.
    pub async fn probe_target(&self, target: &BypassTarget) -> BypassOutcome {
        let mut builder = OutcomeBuilder::new(target.clone());

        let parsed = match TargetUrl::parse(&target.url) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(url = %target.url, error = %e, "cannot probe target");
                return builder.exhausted(0).build();
            }
        };

        if let Some(hit) = self.run_catalog(&parsed, &mut builder).await {
            return self.settle(builder, hit);
        }

        tracing::debug!(url = %target.url, "catalog exhausted, trying alternate methods");
        if let Some(hit) = self.run_method_fallback(&parsed, &mut builder).await {
            return self.settle(builder, hit);
        }

        let attempts = builder.attempts();
        tracing::debug!(url = %target.url, attempts, "no bypass found");
        builder.exhausted(attempts).build()
    }

    fn settle(&self, builder: OutcomeBuilder, hit: BypassHit) -> BypassOutcome {
        tracing::info!(
            url = %builder.target().url,
            technique = %hit.technique,
            original_status = builder.target().original_status,
            status = hit.status,
            "BYPASS SUCCESS"
        );
        builder.bypassed(hit).build()
    }

    /// Catalog techniques in order, GET only, first success wins.
    async fn run_catalog(&self, target: &TargetUrl, builder: &mut OutcomeBuilder) -> Option<BypassHit> {
        for request in self.catalog.instantiate(target) {
            self.pace(builder).await;
            builder.record_attempt();
            self.stats.catalog_requests.fetch_add(1, Ordering::Relaxed);

            let outcome = self
                .send(&request.name, Method::GET, &request.url, request.headers, target)
                .await;
            if let Some(hit) = self.observe(target, &request.name, outcome) {
                return Some(hit);
            }
        }
        None
    }

    /// Wait between two probes of the same target; the first goes out at once.
    pub(crate) async fn pace(&self, builder: &OutcomeBuilder) {
        if builder.attempts() > 0 && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    /// Log a probe result and pull out the hit, if any.
    pub(crate) fn observe(&self, target: &TargetUrl, technique: &str, outcome: ProbeOutcome) -> Option<BypassHit> {
        match outcome {
            ProbeOutcome::Hit(hit) => Some(hit),
            ProbeOutcome::Rejected { status } => {
                tracing::trace!(url = %target.original(), technique, status, "probe rejected");
                None
            }
            ProbeOutcome::Failed(e) => {
                if e.is_transport() {
                    self.stats.transport_errors.fetch_add(1, Ordering::Relaxed);
                }
                tracing::debug!(url = %target.original(), technique, error = %e, "probe failed");
                None
            }
        }
    }

    /// Send one probe. Transport failures come back as `ProbeOutcome::Failed`.
    pub(crate) async fn send(
        &self,
        technique: &str,
        method: Method,
        url: &str,
        headers: HeaderMap,
        target: &TargetUrl,
    ) -> ProbeOutcome {
        let response = match self.client.request(method, url).headers(headers).send().await {
            Ok(r) => r,
            Err(e) => return ProbeOutcome::Failed(e.into()),
        };

        let status = response.status().as_u16();
        if !is_bypass_status(status) {
            return ProbeOutcome::Rejected { status };
        }

        let page_info = if status == 200 {
            self.classify(response, target).await
        } else {
            None
        };

        ProbeOutcome::Hit(BypassHit {
            technique: technique.to_string(),
            status,
            url: url.to_string(),
            page_info,
        })
    }

    /// Read the body and analyze it. `None` when the body cannot be read.
    async fn classify(&self, response: Response, target: &TargetUrl) -> Option<PageInfo> {
        let headers = response.headers().clone();
        match self.read_body(response).await {
            Ok(body) => {
                if body.truncated {
                    tracing::debug!(url = %target.original(), limit = self.max_body_bytes, "body truncated for analysis");
                }
                Some(extract_page_info(&body.bytes, &headers, target.original()))
            }
            Err(e) => {
                tracing::warn!(url = %target.original(), error = %e, "could not read bypassed page body");
                None
            }
        }
    }

    /// At most `max_body_bytes` of the body. `truncated` is set only when
    /// bytes past the limit were actually received.
    async fn read_body(&self, mut response: Response) -> Result<BodyPrefix> {
        let mut body = BodyPrefix::default();
        while let Some(chunk) = response.chunk().await? {
            let room = self.max_body_bytes.saturating_sub(body.bytes.len());
            if chunk.len() > room {
                body.bytes.extend_from_slice(&chunk[..room]);
                body.truncated = true;
                break;
            }
            body.bytes.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[derive(Debug, Default)]
struct BodyPrefix {
    bytes: Vec<u8>,
    truncated: bool,
}
