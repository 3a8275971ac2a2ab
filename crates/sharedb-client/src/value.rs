// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The untyped JSON value model operations are applied against.
//!
//! Strings are stored as UTF-16 code unit vectors so that `si`/`sd` offsets
//! (spec'd as "pick one encoding and document it") line up with the offsets
//! a JavaScript-origin ShareDB peer would have produced.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::error::OtError;

/// A single path component: either an object key or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathToken {
    Key(String),
    Index(usize),
}

impl From<&str> for PathToken {
    fn from(s: &str) -> Self {
        PathToken::Key(s.to_owned())
    }
}

impl From<String> for PathToken {
    fn from(s: String) -> Self {
        PathToken::Key(s)
    }
}

impl From<usize> for PathToken {
    fn from(i: usize) -> Self {
        PathToken::Index(i)
    }
}

/// An ordered sequence of path tokens addressing a location in a [`Json`] tree.
pub type Path = Vec<PathToken>;

/// Build a [`Path`] from a list of path-token-convertible literals.
///
/// ```ignore
/// path![\"numClicks\"]
/// path![\"items\", 0, \"name\"]
/// ```
#[macro_export]
macro_rules! path {
    ($($tok:expr),* $(,)?) => {
        vec![$(::std::convert::Into::into($tok)),*]
    };
}

/// The JSON value model documents are stored as.
///
/// `Undefined` is a sentinel only ever produced by a path lookup that misses;
/// it is never constructed from decoded wire data and never serialized.
#[derive(Debug, Clone)]
pub enum Json {
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Number(f64),
    Str(Utf16String),
    List(Vec<Json>),
    Object(Vec<(String, Json)>),
}

/// Structural equality with order-independent object comparison (spec §3: "mappings
/// preserve no order"; "Equality is structural"). A derived `PartialEq` would compare
/// `Object`'s backing `Vec` positionally, which would reject two documents as unequal
/// purely because their fields arrived in a different order — exactly the failure mode
/// that otherwise surfaces as a spurious `OldDataMismatch` on an `od`/`ld` precondition
/// check whenever a server-sent pre-image's key order differs from the local snapshot.
impl PartialEq for Json {
    fn eq(&self, other: &Json) -> bool {
        match (self, other) {
            (Json::Undefined, Json::Undefined) => true,
            (Json::Null, Json::Null) => true,
            (Json::Bool(a), Json::Bool(b)) => a == b,
            (Json::Int(a), Json::Int(b)) => a == b,
            (Json::Number(a), Json::Number(b)) => a == b,
            (Json::Str(a), Json::Str(b)) => a == b,
            (Json::List(a), Json::List(b)) => a == b,
            (Json::Object(a), Json::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.iter().any(|(k2, v2)| k == k2 && v == v2))
            }
            _ => false,
        }
    }
}

/// A string stored as UTF-16 code units so `si`/`sd` offsets are well defined.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Utf16String(Vec<u16>);

impl Utf16String {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn insert(&mut self, offset: usize, text: &str) -> Result<(), OtError> {
        if offset > self.0.len() {
            return Err(OtError::IndexOutOfRange);
        }
        let units: Vec<u16> = text.encode_utf16().collect();
        self.0.splice(offset..offset, units);
        Ok(())
    }

    pub fn delete(&mut self, offset: usize, expected: &str) -> Result<(), OtError> {
        let units: Vec<u16> = expected.encode_utf16().collect();
        let end = offset.checked_add(units.len()).ok_or(OtError::IndexOutOfRange)?;
        if end > self.0.len() {
            return Err(OtError::IndexOutOfRange);
        }
        if self.0[offset..end] != units[..] {
            return Err(OtError::OldDataMismatch);
        }
        self.0.drain(offset..end);
        Ok(())
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.0)
    }
}

impl From<&str> for Utf16String {
    fn from(s: &str) -> Self {
        Utf16String(s.encode_utf16().collect())
    }
}

impl From<String> for Utf16String {
    fn from(s: String) -> Self {
        Utf16String::from(s.as_str())
    }
}

impl fmt::Display for Utf16String {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl Json {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Json::Undefined)
    }

    /// Decode a JSON value from a raw byte stream (a received wire frame's payload, say).
    pub fn from_slice(bytes: &[u8]) -> Result<Self, OtError> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|_| OtError::InvalidJSONData)?;
        Ok(Json::from(value))
    }

    pub fn to_serde(&self) -> serde_json::Value {
        match self {
            Json::Undefined => serde_json::Value::Null,
            Json::Null => serde_json::Value::Null,
            Json::Bool(b) => serde_json::Value::Bool(*b),
            Json::Int(i) => serde_json::Value::Number((*i).into()),
            Json::Number(n) => Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Json::Str(s) => serde_json::Value::String(s.to_string_lossy()),
            Json::List(items) => {
                serde_json::Value::Array(items.iter().map(Json::to_serde).collect())
            }
            Json::Object(fields) => serde_json::Value::Object(
                fields.iter().map(|(k, v)| (k.clone(), v.to_serde())).collect(),
            ),
        }
    }

    /// Read the child at `path`, or `Json::Undefined` if the terminal element is absent.
    ///
    /// Fails with [`OtError::InvalidPath`] if a non-terminal segment is missing or the
    /// parent container is the wrong kind.
    pub fn get(&self, path: &[PathToken]) -> Result<&Json, OtError> {
        let Some((head, rest)) = path.split_first() else {
            return Ok(self);
        };
        let child = match (self, head) {
            (Json::Object(fields), PathToken::Key(k)) => {
                fields.iter().find(|(key, _)| key == k).map(|(_, v)| v)
            }
            (Json::List(items), PathToken::Index(i)) => items.get(*i),
            _ => return Err(OtError::InvalidPath),
        };
        match child {
            Some(v) if rest.is_empty() => Ok(v),
            Some(v) => v.get(rest),
            None if rest.is_empty() => Ok(&Json::Undefined),
            None => Err(OtError::InvalidPath),
        }
    }

    /// Replace (or insert) the terminal element addressed by `path`.
    ///
    /// Every non-terminal segment's parent container must already exist and be of the
    /// correct kind; only the final segment may be newly created.
    pub fn set(&mut self, path: &[PathToken], value: Json) -> Result<(), OtError> {
        let Some((head, rest)) = path.split_first() else {
            *self = value;
            return Ok(());
        };
        if rest.is_empty() {
            return self.set_terminal(head, value);
        }
        let child = match (self, head) {
            (Json::Object(fields), PathToken::Key(k)) => {
                fields.iter_mut().find(|(key, _)| key == k).map(|(_, v)| v)
            }
            (Json::List(items), PathToken::Index(i)) => items.get_mut(*i),
            _ => return Err(OtError::InvalidPath),
        };
        match child {
            Some(v) => v.set(rest, value),
            None => Err(OtError::InvalidPath),
        }
    }

    fn set_terminal(&mut self, token: &PathToken, value: Json) -> Result<(), OtError> {
        match (self, token) {
            (Json::Object(fields), PathToken::Key(k)) => {
                if let Some(slot) = fields.iter_mut().find(|(key, _)| key == k) {
                    slot.1 = value;
                } else {
                    fields.push((k.clone(), value));
                }
                Ok(())
            }
            (Json::List(items), PathToken::Index(i)) => {
                if *i < items.len() {
                    items[*i] = value;
                    Ok(())
                } else if *i == items.len() {
                    items.push(value);
                    Ok(())
                } else {
                    Err(OtError::InvalidPath)
                }
            }
            _ => Err(OtError::InvalidPath),
        }
    }

    /// Remove and return the terminal element addressed by `path`.
    pub fn remove(&mut self, path: &[PathToken]) -> Result<Json, OtError> {
        let Some((head, rest)) = path.split_first() else {
            return Err(OtError::InvalidPath);
        };
        if !rest.is_empty() {
            let child = match (self, head) {
                (Json::Object(fields), PathToken::Key(k)) => {
                    fields.iter_mut().find(|(key, _)| key == k).map(|(_, v)| v)
                }
                (Json::List(items), PathToken::Index(i)) => items.get_mut(*i),
                _ => return Err(OtError::InvalidPath),
            };
            return match child {
                Some(v) => v.remove(rest),
                None => Err(OtError::InvalidPath),
            };
        }
        match (self, head) {
            (Json::Object(fields), PathToken::Key(k)) => {
                let idx = fields.iter().position(|(key, _)| key == k).ok_or(OtError::InvalidPath)?;
                Ok(fields.remove(idx).1)
            }
            (Json::List(items), PathToken::Index(i)) => {
                if *i < items.len() {
                    Ok(items.remove(*i))
                } else {
                    Err(OtError::InvalidPath)
                }
            }
            _ => Err(OtError::InvalidPath),
        }
    }

    /// Insert `value` into a list at `index`, or an object at key (object insert is
    /// [`Json::set_terminal`] since keys have no ordering); lists need a dedicated insert
    /// that shifts trailing elements rather than overwriting.
    pub fn list_insert(&mut self, path: &[PathToken], value: Json) -> Result<(), OtError> {
        let Some((head, rest)) = path.split_first() else {
            return Err(OtError::InvalidPath);
        };
        if !rest.is_empty() {
            let child = match (self, head) {
                (Json::Object(fields), PathToken::Key(k)) => {
                    fields.iter_mut().find(|(key, _)| key == k).map(|(_, v)| v)
                }
                (Json::List(items), PathToken::Index(i)) => items.get_mut(*i),
                _ => return Err(OtError::InvalidPath),
            };
            return match child {
                Some(v) => v.list_insert(rest, value),
                None => Err(OtError::InvalidPath),
            };
        }
        match (self, head) {
            (Json::List(items), PathToken::Index(i)) => {
                if *i > items.len() {
                    return Err(OtError::InvalidPath);
                }
                items.insert(*i, value);
                Ok(())
            }
            _ => Err(OtError::InvalidPath),
        }
    }

    pub fn as_str_mut(&mut self, path: &[PathToken]) -> Result<&mut Utf16String, OtError> {
        let Some((head, rest)) = path.split_first() else {
            return match self {
                Json::Str(s) => Ok(s),
                _ => Err(OtError::InvalidPath),
            };
        };
        let child = match (self, head) {
            (Json::Object(fields), PathToken::Key(k)) => {
                fields.iter_mut().find(|(key, _)| key == k).map(|(_, v)| v)
            }
            (Json::List(items), PathToken::Index(i)) => items.get_mut(*i),
            _ => return Err(OtError::InvalidPath),
        };
        match child {
            Some(v) => v.as_str_mut(rest),
            None => Err(OtError::InvalidPath),
        }
    }
}

impl From<i64> for Json {
    fn from(v: i64) -> Self {
        Json::Int(v)
    }
}

impl From<f64> for Json {
    fn from(v: f64) -> Self {
        Json::Number(v)
    }
}

impl From<bool> for Json {
    fn from(v: bool) -> Self {
        Json::Bool(v)
    }
}

impl From<&str> for Json {
    fn from(v: &str) -> Self {
        Json::Str(v.into())
    }
}

impl From<serde_json::Value> for Json {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Json::Null,
            serde_json::Value::Bool(b) => Json::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Json::Int(i)
                } else {
                    Json::Number(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Json::Str(Utf16String::from(s)),
            serde_json::Value::Array(items) => {
                Json::List(items.into_iter().map(Json::from).collect())
            }
            serde_json::Value::Object(fields) => {
                Json::Object(fields.into_iter().map(|(k, v)| (k, Json::from(v))).collect())
            }
        }
    }
}

impl From<Json> for serde_json::Value {
    fn from(value: Json) -> Self {
        value.to_serde()
    }
}

impl Serialize for Json {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_serde().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Json {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(Json::from(value))
    }
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod tests;
