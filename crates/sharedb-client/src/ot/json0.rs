// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON0: apply, invert, and append operations against a [`Json`] tree.
//!
//! `apply` never partially mutates its input — it clones into a scratch value and only
//! commits the clone once every op in the list has succeeded, so a failed op list leaves
//! the caller's value untouched (spec §7: "the document must not be partially mutated").

use serde::{Deserialize, Serialize};

use crate::error::OtError;
use crate::value::{Json, Path, PathToken};

use super::text0::{self, Text0Op};

/// Supported subtype identifiers embeddable via `t`/`o`.
const SUBTYPE_TEXT0: &str = "text0";

/// A single JSON0 operation: a path plus exactly one keyed payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Op {
    pub p: Path,
    pub kind: OpKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    /// `oi` only.
    ObjectInsert { value: Json },
    /// `od` only.
    ObjectDelete { old: Json },
    /// `oi` + `od`.
    ObjectReplace { old: Json, new: Json },
    /// `li` only.
    ListInsert { value: Json },
    /// `ld` only.
    ListDelete { old: Json },
    /// `li` + `ld`.
    ListReplace { old: Json, new: Json },
    /// `na`.
    NumberAdd { delta: Json },
    /// `si`.
    StringInsert { text: String },
    /// `sd`.
    StringDelete { text: String },
    /// `t` + `o`.
    Subtype { name: String, ops: Vec<Text0Op> },
}

impl Op {
    fn last_index(&self) -> Result<usize, OtError> {
        match self.p.last() {
            Some(PathToken::Index(i)) => Ok(*i),
            _ => Err(OtError::InvalidPath),
        }
    }
}

/// Navigate to an existing intermediate container; every segment must already exist.
fn navigate_mut<'a>(value: &'a mut Json, path: &[PathToken]) -> Result<&'a mut Json, OtError> {
    let mut cur = value;
    for tok in path {
        cur = match (cur, tok) {
            (Json::Object(fields), PathToken::Key(k)) => {
                let idx = fields.iter().position(|(key, _)| key == k).ok_or(OtError::InvalidPath)?;
                &mut fields[idx].1
            }
            (Json::List(items), PathToken::Index(i)) => {
                items.get_mut(*i).ok_or(OtError::InvalidPath)?
            }
            _ => return Err(OtError::InvalidPath),
        };
    }
    Ok(cur)
}

fn apply_one(op: &Op, root: &mut Json) -> Result<(), OtError> {
    if op.p.is_empty() {
        return Err(OtError::InvalidPath);
    }
    let (parent_path, last) = op.p.split_at(op.p.len() - 1);
    let last = &last[0];

    match &op.kind {
        OpKind::ObjectInsert { value } => {
            let key = match last {
                PathToken::Key(k) => k.clone(),
                PathToken::Index(_) => return Err(OtError::InvalidPath),
            };
            let parent = navigate_mut(root, parent_path)?;
            let Json::Object(fields) = parent else { return Err(OtError::InvalidPath) };
            if fields.iter().any(|(k, _)| *k == key) {
                return Err(OtError::OldDataMismatch);
            }
            fields.push((key, value.clone()));
            Ok(())
        }
        OpKind::ObjectDelete { old } => {
            let key = match last {
                PathToken::Key(k) => k.clone(),
                PathToken::Index(_) => return Err(OtError::InvalidPath),
            };
            let parent = navigate_mut(root, parent_path)?;
            let Json::Object(fields) = parent else { return Err(OtError::InvalidPath) };
            let idx = fields.iter().position(|(k, _)| *k == key).ok_or(OtError::InvalidPath)?;
            if fields[idx].1 != *old {
                return Err(OtError::OldDataMismatch);
            }
            fields.remove(idx);
            Ok(())
        }
        OpKind::ObjectReplace { old, new } => {
            let key = match last {
                PathToken::Key(k) => k.clone(),
                PathToken::Index(_) => return Err(OtError::InvalidPath),
            };
            let parent = navigate_mut(root, parent_path)?;
            let Json::Object(fields) = parent else { return Err(OtError::InvalidPath) };
            let idx = fields.iter().position(|(k, _)| *k == key).ok_or(OtError::InvalidPath)?;
            if fields[idx].1 != *old {
                return Err(OtError::OldDataMismatch);
            }
            fields[idx].1 = new.clone();
            Ok(())
        }
        OpKind::ListInsert { value } => {
            let index = op.last_index()?;
            let parent = navigate_mut(root, parent_path)?;
            let Json::List(items) = parent else { return Err(OtError::InvalidPath) };
            if index > items.len() {
                return Err(OtError::InvalidPath);
            }
            items.insert(index, value.clone());
            Ok(())
        }
        OpKind::ListDelete { old } => {
            let index = op.last_index()?;
            let parent = navigate_mut(root, parent_path)?;
            let Json::List(items) = parent else { return Err(OtError::InvalidPath) };
            if index >= items.len() {
                return Err(OtError::InvalidPath);
            }
            if items[index] != *old {
                return Err(OtError::OldDataMismatch);
            }
            items.remove(index);
            Ok(())
        }
        OpKind::ListReplace { old, new } => {
            let index = op.last_index()?;
            let parent = navigate_mut(root, parent_path)?;
            let Json::List(items) = parent else { return Err(OtError::InvalidPath) };
            if index >= items.len() {
                return Err(OtError::InvalidPath);
            }
            if items[index] != *old {
                return Err(OtError::OldDataMismatch);
            }
            items[index] = new.clone();
            Ok(())
        }
        OpKind::NumberAdd { delta } => {
            let current = root.get(&op.p)?;
            let updated = match (current, delta) {
                (Json::Int(cur), Json::Int(d)) => Json::Int(cur + d),
                (Json::Number(cur), Json::Number(d)) => Json::Number(cur + d),
                _ => return Err(OtError::InvalidJSONData),
            };
            root.set(&op.p, updated)
        }
        OpKind::StringInsert { text } => {
            let offset = op.last_index()?;
            let s = root.as_str_mut(parent_path)?;
            s.insert(offset, text)
        }
        OpKind::StringDelete { text } => {
            let offset = op.last_index()?;
            let s = root.as_str_mut(parent_path)?;
            s.delete(offset, text)
        }
        OpKind::Subtype { name, ops } => {
            if name != SUBTYPE_TEXT0 {
                return Err(OtError::UnsupportedSubtype);
            }
            let s = root.as_str_mut(&op.p)?;
            text0::apply(ops, s)
        }
    }
}

/// Apply an ordered list of JSON0 operations to `value`, returning the new value.
///
/// Ops are applied strictly in list order with no internal reordering. On failure the
/// original `value` is left conceptually untouched (the error is returned before any
/// caller-visible state changes, since callers apply against a clone).
pub fn apply(ops: &[Op], value: &Json) -> Result<Json, OtError> {
    let mut result = value.clone();
    for op in ops {
        apply_one(op, &mut result)?;
    }
    Ok(result)
}

fn invert_one(op: &Op) -> Op {
    let kind = match &op.kind {
        OpKind::ObjectInsert { value } => OpKind::ObjectDelete { old: value.clone() },
        OpKind::ObjectDelete { old } => OpKind::ObjectInsert { value: old.clone() },
        OpKind::ObjectReplace { old, new } => {
            OpKind::ObjectReplace { old: new.clone(), new: old.clone() }
        }
        OpKind::ListInsert { value } => OpKind::ListDelete { old: value.clone() },
        OpKind::ListDelete { old } => OpKind::ListInsert { value: old.clone() },
        OpKind::ListReplace { old, new } => {
            OpKind::ListReplace { old: new.clone(), new: old.clone() }
        }
        OpKind::NumberAdd { delta } => OpKind::NumberAdd { delta: negate(delta) },
        OpKind::StringInsert { text } => OpKind::StringDelete { text: text.clone() },
        OpKind::StringDelete { text } => OpKind::StringInsert { text: text.clone() },
        OpKind::Subtype { name, ops } => {
            OpKind::Subtype { name: name.clone(), ops: text0::inverse(ops) }
        }
    };
    Op { p: op.p.clone(), kind }
}

fn negate(value: &Json) -> Json {
    match value {
        Json::Int(i) => Json::Int(-i),
        Json::Number(n) => Json::Number(-n),
        other => other.clone(),
    }
}

/// Invert an op list: applying `inverse(ops)` to `apply(ops, value)` returns `value`.
pub fn inverse(ops: &[Op]) -> Vec<Op> {
    ops.iter().rev().map(invert_one).collect()
}

/// Append `op` onto a pending op list for local queue compaction.
///
/// List concatenation is a correct (if non-minimal) implementation: applying the
/// concatenation in order is equivalent to applying the two lists in sequence.
pub fn append(op: Op, mut list: Vec<Op>) -> Vec<Op> {
    list.push(op);
    list
}

// -- Wire (de)serialization ---------------------------------------------------

/// Flat wire representation of a JSON0 op, matching spec §4.3's short field names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireOp {
    pub p: Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oi: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub od: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub li: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ld: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub na: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub si: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub o: Option<Vec<Text0Op>>,
}

impl TryFrom<WireOp> for Op {
    type Error = OtError;

    fn try_from(w: WireOp) -> Result<Self, OtError> {
        let kind = match (w.oi, w.od, w.li, w.ld, w.na, w.si, w.sd, w.t, w.o) {
            (Some(oi), None, None, None, None, None, None, None, None) => {
                OpKind::ObjectInsert { value: oi }
            }
            (None, Some(od), None, None, None, None, None, None, None) => {
                OpKind::ObjectDelete { old: od }
            }
            (Some(oi), Some(od), None, None, None, None, None, None, None) => {
                OpKind::ObjectReplace { old: od, new: oi }
            }
            (None, None, Some(li), None, None, None, None, None, None) => {
                OpKind::ListInsert { value: li }
            }
            (None, None, None, Some(ld), None, None, None, None, None) => {
                OpKind::ListDelete { old: ld }
            }
            (None, None, Some(li), Some(ld), None, None, None, None, None) => {
                OpKind::ListReplace { old: ld, new: li }
            }
            (None, None, None, None, Some(na), None, None, None, None) => {
                OpKind::NumberAdd { delta: na }
            }
            (None, None, None, None, None, Some(si), None, None, None) => {
                OpKind::StringInsert { text: si }
            }
            (None, None, None, None, None, None, Some(sd), None, None) => {
                OpKind::StringDelete { text: sd }
            }
            (None, None, None, None, None, None, None, Some(t), Some(o)) => {
                OpKind::Subtype { name: t, ops: o }
            }
            _ => return Err(OtError::UnsupportedOperation),
        };
        Ok(Op { p: w.p, kind })
    }
}

impl From<Op> for WireOp {
    fn from(op: Op) -> Self {
        let mut w = WireOp {
            p: op.p,
            oi: None,
            od: None,
            li: None,
            ld: None,
            na: None,
            si: None,
            sd: None,
            t: None,
            o: None,
        };
        match op.kind {
            OpKind::ObjectInsert { value } => w.oi = Some(value),
            OpKind::ObjectDelete { old } => w.od = Some(old),
            OpKind::ObjectReplace { old, new } => {
                w.oi = Some(new);
                w.od = Some(old);
            }
            OpKind::ListInsert { value } => w.li = Some(value),
            OpKind::ListDelete { old } => w.ld = Some(old),
            OpKind::ListReplace { old, new } => {
                w.li = Some(new);
                w.ld = Some(old);
            }
            OpKind::NumberAdd { delta } => w.na = Some(delta),
            OpKind::StringInsert { text } => w.si = Some(text),
            OpKind::StringDelete { text } => w.sd = Some(text),
            OpKind::Subtype { name, ops } => {
                w.t = Some(name);
                w.o = Some(ops);
            }
        }
        w
    }
}

impl Serialize for Op {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        WireOp::from(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Op {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let wire = WireOp::deserialize(deserializer)?;
        Op::try_from(wire).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "json0_tests.rs"]
mod tests;
