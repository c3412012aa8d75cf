use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bypass::executor::Prober;
use crate::bypass::outcome::BypassOutcome;
use crate::bypass::target::{BypassTarget, CandidateRecord};
use crate::bypass::technique::Catalog;
use crate::concurrent::AdmissionPool;
use crate::config::Config;
use crate::error::Result;

/// `url -> outcome` for one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BypassResults {
    outcomes: BTreeMap<String, BypassOutcome>,
}

impl BypassResults {
    pub fn get(&self, url: &str) -> Option<&BypassOutcome> {
        self.outcomes.get(url)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BypassOutcome)> {
        self.outcomes.iter()
    }

    pub fn successful_bypasses(&self) -> usize {
        self.outcomes.values().filter(|o| o.bypassed).count()
    }

    fn insert(&mut self, outcome: BypassOutcome) {
        self.outcomes.insert(outcome.url.clone(), outcome);
    }
}

impl FromIterator<BypassOutcome> for BypassResults {
    fn from_iter<I: IntoIterator<Item = BypassOutcome>>(iter: I) -> Self {
        let mut results = Self::default();
        for outcome in iter {
            results.insert(outcome);
        }
        results
    }
}

/// Drives the bypass pipeline over a batch of candidates.
pub struct BypassEngine {
    prober: Arc<Prober>,
    pool: AdmissionPool,
}

impl BypassEngine {
    /// Engine with the catalog named in the config, or the built-in one.
    pub fn new(config: &Config) -> Result<Self> {
        let catalog = match &config.catalog_path {
            Some(path) => Catalog::from_file(path)?,
            None => Catalog::standard(),
        };
        Self::with_catalog(config, catalog)
    }

    pub fn with_catalog(config: &Config, catalog: Catalog) -> Result<Self> {
        let prober = Prober::new(config, Arc::new(catalog))?;
        Ok(Self {
            prober: Arc::new(prober),
            pool: AdmissionPool::new(config.concurrency),
        })
    }

    pub fn prober(&self) -> &Prober {
        &self.prober
    }

    pub fn pool(&self) -> &AdmissionPool {
        &self.pool
    }

    /// Keep restricted records only, one per URL (first record wins).
    pub fn select_targets(records: &[CandidateRecord]) -> Vec<BypassTarget> {
        let mut seen = HashSet::new();
        records
            .iter()
            .filter_map(BypassTarget::from_record)
            .filter(|t| seen.insert(t.url.clone()))
            .collect()
    }

    pub async fn run(&self, records: &[CandidateRecord]) -> BypassResults {
        let targets = Self::select_targets(records);
        let skipped = records.len() - targets.len();
        if skipped > 0 {
            tracing::debug!(skipped, "ignoring records that are not restricted or are duplicates");
        }
        self.run_targets(targets).await
    }

    pub async fn run_targets(&self, targets: Vec<BypassTarget>) -> BypassResults {
        if targets.is_empty() {
            return BypassResults::default();
        }

        tracing::info!(targets = targets.len(), "attempting to bypass restricted URLs");

        let prober = self.prober.clone();
        let finished = self
            .pool
            .execute(targets, move |target: BypassTarget| {
                let prober = prober.clone();
                async move { prober.probe_target(&target).await }
            })
            .await;

        let results = collect_outcomes(finished);

        let successes = results.successful_bypasses();
        if successes > 0 {
            tracing::info!(successes, total = results.len(), "bypass(es) successful");
        } else {
            tracing::info!(total = results.len(), "no successful bypasses");
        }
        results
    }
}

/// One outcome per pooled target; a task that died yields "not bypassed".
fn collect_outcomes(finished: Vec<(BypassTarget, Option<BypassOutcome>)>) -> BypassResults {
    finished
        .into_iter()
        .map(|(target, outcome)| {
            outcome.unwrap_or_else(|| {
                tracing::warn!(url = %target.url, "bypass pipeline aborted, recording as not bypassed");
                BypassOutcome::not_bypassed(&target)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_targets_filters_and_dedups() {
        let records = vec![
            CandidateRecord { url: "http://x/a".into(), status: 403 },
            CandidateRecord { url: "http://x/b".into(), status: 200 },
            CandidateRecord { url: "http://x/a".into(), status: 401 },
            CandidateRecord { url: "http://x/c".into(), status: 401 },
            CandidateRecord { url: "http://x/d".into(), status: 404 },
        ];
        let targets = BypassEngine::select_targets(&records);
        assert_eq!(
            targets,
            vec![BypassTarget::new("http://x/a", 403), BypassTarget::new("http://x/c", 401)]
        );
    }

    #[tokio::test]
    async fn empty_batch_makes_no_requests() {
        let engine = BypassEngine::new(&Config::default()).unwrap();
        let records = vec![CandidateRecord { url: "http://127.0.0.1:1/ok".into(), status: 200 }];
        let results = engine.run(&records).await;
        assert!(results.is_empty());
        assert_eq!(engine.prober().stats().catalog_requests, 0);
    }

    #[tokio::test]
    async fn unparseable_target_still_gets_an_outcome() {
        let engine = BypassEngine::new(&Config::default()).unwrap();
        let records = vec![CandidateRecord { url: "not a url".into(), status: 403 }];
        let results = engine.run(&records).await;
        let outcome = results.get("not a url").unwrap();
        assert!(!outcome.bypassed);
        assert!(outcome.technique.is_none());
    }

    #[tokio::test]
    async fn panicking_target_still_gets_one_outcome() {
        let engine = BypassEngine::new(&Config::default()).unwrap();
        let prober = engine.prober.clone();
        let targets = vec![
            BypassTarget::new("not a url", 403),
            BypassTarget::new("http://x/crash", 403),
            BypassTarget::new("also not a url", 401),
        ];

        let finished = engine
            .pool()
            .execute(targets, move |target: BypassTarget| {
                let prober = prober.clone();
                async move {
                    if target.url.ends_with("/crash") {
                        panic!("pipeline crashed");
                    }
                    prober.probe_target(&target).await
                }
            })
            .await;
        let results = collect_outcomes(finished);

        assert_eq!(results.len(), 3);
        let crashed = results.get("http://x/crash").unwrap();
        assert_eq!(crashed, &BypassOutcome::not_bypassed(&BypassTarget::new("http://x/crash", 403)));
        assert!(results.get("not a url").is_some());
        assert_eq!(results.get("also not a url").unwrap().original_status, 401);
        assert_eq!(engine.pool().get_stats().1, 1);
    }
}
