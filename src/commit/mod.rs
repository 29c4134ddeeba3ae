//! Commit message handling: cleaning, validation and inline scoring.
//!
//! Pure text processing with no I/O. The attempt runner uses these stages in
//! order: [`clean_message`], [`find_artifact`], [`ConventionalCommit::parse`],
//! and [`score_heuristically`] when the judge cannot score.

pub mod clean;
pub mod conventional;
pub mod heuristic;

pub use clean::{clean_message, find_artifact};
pub use conventional::{ConventionalCommit, ValidationIssue, ALLOWED_TYPES, MAX_HEADER_LEN};
pub use heuristic::{score_heuristically, touched_identifiers};
