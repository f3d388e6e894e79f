pub mod assignment;
pub mod error;
pub mod lifecycle;
pub mod model;

pub use assignment::{select_replacement, select_reviewers, DEFAULT_REVIEWER_COUNT};
pub use error::{Entity, ErrorCode, ReviewError};
pub use lifecycle::{MergeTransition, Reassignment};
pub use model::*;
