// =============================================================================
// Qoala Node Runtime - Classical Value Domain
// =============================================================================
// Table of Contents:
//   1. Value - Scalar or vector classical word
//   2. Template - Unresolved placeholder before instantiation
// =============================================================================
// Purpose: Classical memory slots, shared-memory words and routine return
//          variables are either a single integer or a fixed-size vector of
//          integers, matching the Python source's scalar/vector split.
// =============================================================================

use serde::{Deserialize, Serialize};

// =============================================================================
// 1. Value - Scalar or vector classical word
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    IntVec(Vec<i64>),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::IntVec(_) => None,
        }
    }

    pub fn as_int_vec(&self) -> Option<&[i64]> {
        match self {
            Value::IntVec(v) => Some(v),
            Value::Int(_) => None,
        }
    }

    /// Flattened word count this value occupies in a shared-memory region.
    pub fn word_len(&self) -> usize {
        match self {
            Value::Int(_) => 1,
            Value::IntVec(v) => v.len(),
        }
    }

    pub fn to_words(&self) -> Vec<i64> {
        match self {
            Value::Int(v) => vec![*v],
            Value::IntVec(v) => v.clone(),
        }
    }
}

// =============================================================================
// 2. Template - Unresolved placeholder before instantiation
// =============================================================================

/// A `{name}` placeholder appearing in request/routine metadata (`remote_id`,
/// `fidelity`, vector sizes, ...). Resolved against a process's `inputs` map
/// when the process is initialized; see `qoala_runtime::template`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Template<T> {
    Literal(T),
    Placeholder(String),
}

impl<T> Template<T> {
    pub fn literal(value: T) -> Self {
        Template::Literal(value)
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Template::Placeholder(_))
    }
}
