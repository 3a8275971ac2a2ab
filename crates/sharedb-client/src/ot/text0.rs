// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TEXT0: the string-edit subtype JSON0 embeds at string leaves.
//!
//! A TEXT0 op list is applied directly against a plain string (not a [`crate::value::Json`]
//! tree) — each op carries its own single-element path `[offset]` plus exactly one of
//! `i` (insert) or `d` (delete).

use serde::{Deserialize, Serialize};

use crate::error::OtError;
use crate::value::Utf16String;

/// A single TEXT0 operation: insert or delete at a UTF-16 offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text0Op {
    /// Single-element path holding the character offset.
    pub p: (usize,),
    #[serde(skip_serializing_if = "Option::is_none")]
    pub i: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
}

impl Text0Op {
    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        Text0Op { p: (offset,), i: Some(text.into()), d: None }
    }

    pub fn delete(offset: usize, text: impl Into<String>) -> Self {
        Text0Op { p: (offset,), i: None, d: Some(text.into()) }
    }

    fn offset(&self) -> usize {
        self.p.0
    }
}

/// Apply a list of TEXT0 ops, in order, to `value`.
pub fn apply(ops: &[Text0Op], value: &mut Utf16String) -> Result<(), OtError> {
    for op in ops {
        match (&op.i, &op.d) {
            (Some(text), None) => value.insert(op.offset(), text)?,
            (None, Some(text)) => value.delete(op.offset(), text)?,
            _ => return Err(OtError::UnsupportedOperation),
        }
    }
    Ok(())
}

/// Invert a TEXT0 op list: reverse order, swap `i`/`d` on each op.
pub fn inverse(ops: &[Text0Op]) -> Vec<Text0Op> {
    ops.iter()
        .rev()
        .map(|op| Text0Op { p: op.p, i: op.d.clone(), d: op.i.clone() })
        .collect()
}

#[cfg(test)]
#[path = "text0_tests.rs"]
mod tests;
