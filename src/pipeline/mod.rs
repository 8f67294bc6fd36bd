//! Pipeline entry points for acquisition runs.
//!
//! - `validate_config`: Schedule and budget checks before any network call
//! - `AcquisitionOrchestrator`: Fetch, dedupe, back up and export one group
//! - `replay_records`: Push a backup into the export sink again
//! - `check_trends`: One connectivity fetch for the `health` command

pub mod disposition;
pub mod health;
pub mod replay;
pub mod run;
pub mod summary;
pub mod validate;

pub use disposition::{DispositionCheck, DispositionConfig, DispositionPolicy};
pub use health::{TrendsHealth, check_trends, health_item};
pub use replay::{ReplayOutcome, replay_records};
pub use run::AcquisitionOrchestrator;
pub use summary::{log_summary, summary_lines};
pub use validate::{log_estimate, preflight, validate_config};
