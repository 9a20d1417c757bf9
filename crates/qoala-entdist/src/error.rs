// =============================================================================
// Qoala Node Runtime - EntDist Errors
// =============================================================================
// Table of Contents:
//   1. EntDistError - Pairing failures
// =============================================================================

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EntDistError {
    #[error("request's timeslot window elapsed without a matching peer request")]
    NoMatch,
    #[error("request's per-request timeout elapsed before delivery")]
    Timeout,
}
