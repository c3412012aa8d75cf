//! Alternate-verb stage: once the catalog is exhausted the untouched URL is
//! replayed with each configured verb.

use std::sync::atomic::Ordering;

use reqwest::header::HeaderMap;

use crate::bypass::executor::Prober;
use crate::bypass::outcome::{BypassHit, OutcomeBuilder};
use crate::bypass::target::TargetUrl;

impl Prober {
    /// Configured verbs in order against the original URL, first success wins.
    pub(crate) async fn run_method_fallback(
        &self,
        target: &TargetUrl,
        builder: &mut OutcomeBuilder,
    ) -> Option<BypassHit> {
        for method in &self.methods {
            let name = format!("HTTP Method: {}", method);
            self.pace(builder).await;
            builder.record_attempt();
            self.stats.fallback_requests.fetch_add(1, Ordering::Relaxed);

            let outcome = self
                .send(&name, method.clone(), target.original(), HeaderMap::new(), target)
                .await;
            if let Some(hit) = self.observe(target, &name, outcome) {
                return Some(hit);
            }
        }
        None
    }
}
