// 401/403 bypass engine: technique catalog, sequential prober with verb
// fallback, and the batch orchestrator.

pub mod target;
pub mod technique;
pub mod outcome;
pub mod executor;
pub mod fallback;
pub mod orchestrator;

pub use target::{BypassTarget, CandidateRecord, TargetUrl};
pub use technique::{Catalog, HeaderOverride, HeaderValueSource, PathTransform, ProbeRequest, Technique};
pub use outcome::{is_bypass_status, BypassHit, BypassOutcome, OutcomeBuilder, ProbeOutcome};
pub use executor::{ProbeStatsSnapshot, Prober};
pub use orchestrator::{BypassEngine, BypassResults};
