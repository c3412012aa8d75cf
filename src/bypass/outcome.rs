use serde::{Deserialize, Serialize};

use crate::analyze::PageInfo;
use crate::bypass::target::BypassTarget;
use crate::error::BypassError;

/// 200 or any redirect counts as getting past the access check.
pub fn is_bypass_status(status: u16) -> bool {
    status == 200 || (300..400).contains(&status)
}

/// Terminal result for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BypassOutcome {
    pub url: String,
    pub original_status: u16,
    pub bypassed: bool,
    pub technique: Option<String>,
    pub final_status: Option<u16>,
    pub bypass_url: Option<String>,
    pub page_info: Option<PageInfo>,
}

impl BypassOutcome {
    /// Outcome for a target nothing got through on (or that could not be probed).
    pub fn not_bypassed(target: &BypassTarget) -> Self {
        OutcomeBuilder::new(target.clone()).exhausted(0).build()
    }
}

/// The winning probe of a target.
#[derive(Debug, Clone)]
pub struct BypassHit {
    pub technique: String,
    pub status: u16,
    pub url: String,
    pub page_info: Option<PageInfo>,
}

/// Result of one probe attempt.
#[derive(Debug)]
pub enum ProbeOutcome {
    Hit(BypassHit),
    Rejected { status: u16 },
    Failed(BypassError),
}

#[derive(Debug)]
enum AttemptState {
    Pending,
    Probing { attempts: usize },
    Bypassed(BypassHit),
    Exhausted { attempts: usize },
}

/// Staged construction of a [`BypassOutcome`]: pending, probing, then either
/// bypassed or exhausted. `build` is the only way out.
#[derive(Debug)]
pub struct OutcomeBuilder {
    target: BypassTarget,
    state: AttemptState,
}

impl OutcomeBuilder {
    pub fn new(target: BypassTarget) -> Self {
        Self { target, state: AttemptState::Pending }
    }

    pub fn target(&self) -> &BypassTarget {
        &self.target
    }

    /// Count one more probe sent. No effect once the target is settled.
    pub fn record_attempt(&mut self) {
        self.state = match std::mem::replace(&mut self.state, AttemptState::Pending) {
            AttemptState::Pending => AttemptState::Probing { attempts: 1 },
            AttemptState::Probing { attempts } => AttemptState::Probing { attempts: attempts + 1 },
            settled => settled,
        };
    }

    pub fn attempts(&self) -> usize {
        match &self.state {
            AttemptState::Pending | AttemptState::Bypassed(_) => 0,
            AttemptState::Probing { attempts } | AttemptState::Exhausted { attempts } => *attempts,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.state, AttemptState::Bypassed(_) | AttemptState::Exhausted { .. })
    }

    /// Settle on a winning probe. A hit whose status is not a bypass status
    /// is treated as exhaustion so the outcome invariant cannot break.
    pub fn bypassed(mut self, hit: BypassHit) -> Self {
        if is_bypass_status(hit.status) {
            self.state = AttemptState::Bypassed(hit);
        } else {
            let attempts = self.attempts();
            self.state = AttemptState::Exhausted { attempts };
        }
        self
    }

    pub fn exhausted(mut self, attempts: usize) -> Self {
        let attempts = attempts.max(self.attempts());
        self.state = AttemptState::Exhausted { attempts };
        self
    }

    pub fn build(self) -> BypassOutcome {
        let BypassTarget { url, original_status } = self.target;
        match self.state {
            AttemptState::Bypassed(hit) => BypassOutcome {
                url,
                original_status,
                bypassed: true,
                technique: Some(hit.technique),
                final_status: Some(hit.status),
                bypass_url: Some(hit.url),
                // Only a 200 carries page evidence
                page_info: if hit.status == 200 { hit.page_info } else { None },
            },
            AttemptState::Pending | AttemptState::Probing { .. } | AttemptState::Exhausted { .. } => {
                BypassOutcome {
                    url,
                    original_status,
                    bypassed: false,
                    technique: None,
                    final_status: None,
                    bypass_url: None,
                    page_info: None,
                }
            }
        }
    }
}
