//! Temporal event scoring.
//!
//! Raw detector events are collapsed into debounced episodes per category
//! (`episodes`), the episode counts are turned into capped flat deductions and
//! an integrity score (`integrity`), and `report` assembles and persists the
//! per-session report.

pub mod episodes;
pub mod integrity;
pub mod labels;
pub mod report;
pub mod types;

pub use episodes::collapse_episodes;
pub use integrity::{score, Deductions, Integrity};
pub use report::{build_report, Report, ReportEnvelope, ReportService};
pub use types::{Category, EpisodeCounts};
