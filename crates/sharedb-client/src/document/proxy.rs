// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The JSON proxy `change()` hands to the caller's closure (spec §4.5).
//!
//! The proxy never touches the document's snapshot directly — every mutating accessor
//! enqueues an [`Op`] onto the shared [`Transaction`]; the collected op list is what
//! `change()` later applies locally and sends. Each pushed op is built so its
//! precondition (§4.2) holds against the snapshot the proxy was built from; if the
//! document's authoritative value has since moved on (a concurrent remote op landed),
//! the actor's local `apply` will reject the op list with `OldDataMismatch` and the
//! caller must retry — the same optimistic-concurrency shape as the queue discipline
//! itself.

use std::cell::RefCell;

use crate::error::OtError;
use crate::ot::{Op, OpKind};
use crate::value::{Json, Path, PathToken};

/// Collects the ops a `change()` closure produces, in call order.
#[derive(Default)]
pub struct Transaction {
    ops: RefCell<Vec<Op>>,
}

impl Transaction {
    pub fn new() -> Self {
        Transaction::default()
    }

    fn push(&self, op: Op) {
        self.ops.borrow_mut().push(op);
    }

    pub fn into_ops(self) -> Vec<Op> {
        self.ops.into_inner()
    }
}

/// A path-addressed view over a document snapshot.
///
/// Obtained from the root via [`Proxy::get`]/[`Proxy::index`]; every method that
/// mutates enqueues an operation on the shared transaction rather than touching the
/// snapshot.
pub struct Proxy<'a> {
    root: &'a Json,
    path: Path,
    txn: &'a Transaction,
}

impl<'a> Proxy<'a> {
    pub fn root(root: &'a Json, txn: &'a Transaction) -> Self {
        Proxy { root, path: Vec::new(), txn }
    }

    /// Descend into a mapping key or sequence index.
    pub fn get(&self, token: impl Into<PathToken>) -> Proxy<'a> {
        let mut path = self.path.clone();
        path.push(token.into());
        Proxy { root: self.root, path, txn: self.txn }
    }

    /// The snapshot value currently addressed by this proxy (`Json::Undefined` if absent).
    pub fn value(&self) -> Result<&'a Json, OtError> {
        self.root.get(&self.path)
    }

    /// Set this slot to `new_value`.
    ///
    /// Produces an object/list insert if the slot is currently undefined, otherwise a
    /// replace carrying the current value as the precondition.
    pub fn set(&self, new_value: impl Into<Json>) -> Result<(), OtError> {
        let new_value = new_value.into();
        let current = self.value()?;
        let last = self.path.last().ok_or(OtError::InvalidPath)?;
        let kind = match (last, current.is_undefined()) {
            (PathToken::Key(_), true) => OpKind::ObjectInsert { value: new_value },
            (PathToken::Key(_), false) => {
                OpKind::ObjectReplace { old: current.clone(), new: new_value }
            }
            (PathToken::Index(idx), _) => {
                let parent = self.root.get(&self.path[..self.path.len() - 1])?;
                let len = match parent {
                    Json::List(items) => items.len(),
                    _ => return Err(OtError::InvalidPath),
                };
                if *idx >= len {
                    OpKind::ListInsert { value: new_value }
                } else {
                    OpKind::ListReplace { old: current.clone(), new: new_value }
                }
            }
        };
        self.txn.push(Op { p: self.path.clone(), kind });
        Ok(())
    }

    /// Remove this slot (object key delete, or list element delete).
    pub fn remove(&self) -> Result<(), OtError> {
        let current = self.value()?;
        if current.is_undefined() {
            return Err(OtError::InvalidPath);
        }
        let last = self.path.last().ok_or(OtError::InvalidPath)?;
        let kind = match last {
            PathToken::Key(_) => OpKind::ObjectDelete { old: current.clone() },
            PathToken::Index(_) => OpKind::ListDelete { old: current.clone() },
        };
        self.txn.push(Op { p: self.path.clone(), kind });
        Ok(())
    }

    /// Insert a new element into the list at this slot's path + `index`.
    pub fn insert_at(&self, index: usize, value: impl Into<Json>) -> Result<(), OtError> {
        let mut path = self.path.clone();
        path.push(PathToken::Index(index));
        self.txn.push(Op { p: path, kind: OpKind::ListInsert { value: value.into() } });
        Ok(())
    }

    /// Numeric-add convenience: `na` on an int or decimal leaf.
    pub fn add(&self, delta: impl Into<Json>) -> Result<(), OtError> {
        self.txn.push(Op { p: self.path.clone(), kind: OpKind::NumberAdd { delta: delta.into() } });
        Ok(())
    }

    /// String-splice convenience: insert `text` at UTF-16 offset `offset`.
    pub fn string_insert(&self, offset: usize, text: impl Into<String>) -> Result<(), OtError> {
        let mut path = self.path.clone();
        path.push(PathToken::Index(offset));
        self.txn.push(Op { p: path, kind: OpKind::StringInsert { text: text.into() } });
        Ok(())
    }

    /// String-splice convenience: delete `text` at UTF-16 offset `offset`.
    pub fn string_delete(&self, offset: usize, text: impl Into<String>) -> Result<(), OtError> {
        let mut path = self.path.clone();
        path.push(PathToken::Index(offset));
        self.txn.push(Op { p: path, kind: OpKind::StringDelete { text: text.into() } });
        Ok(())
    }
}

#[cfg(test)]
#[path = "proxy_tests.rs"]
mod tests;
