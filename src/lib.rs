//! # Kidney Match
//!
//! A donor-recipient compatibility evaluation and ranking engine for kidney
//! transplant candidates.
//!
//! ## Features
//!
//! - Ordered hard-exclusion pipeline: unacceptable antigens, ABO/Rh blood
//!   type, actual positive crossmatch, donor-specific antibodies
//! - Per-locus HLA matching across A, B, C, DR, DQ, DP with primary (A, B,
//!   DR) and aggregate match counts
//! - Crossmatch resolution from actual lab results with a virtual
//!   (PRA-based) fallback
//! - 0-100 compatibility scoring and descending ranking of every donor
//! - Multi-threaded evaluation of the donor pool
//! - Donor/recipient record ingestion from JSON files and CSV/TSV rosters
//! - Configurable match policy thresholds with clinically established defaults
//! - Multiple report formats (HTML, CSV, JSON, TSV)

pub mod hla;
pub mod matching;
pub mod policy;
pub mod records;
pub mod registry;
pub mod report;
pub mod types;

// Re-export key types
pub use matching::{
    compatibility_score, is_blood_type_compatible, match_hla, resolve_crossmatch,
    screen_unacceptable_antigens, HardExclusion, MatchEvaluator,
};
pub use policy::MatchPolicy;
pub use records::{DonorRosterParser, JsonRecordParser};
pub use registry::{LoadSummary, MatchError, MatchRegistry};
pub use report::{ReportFormat, ReportGenerator};
pub use types::*;
