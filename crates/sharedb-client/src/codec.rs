// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire codec: every ShareDB frame is a JSON object discriminated by `a` (action).
//!
//! Decoding is two-phase, the same shape as the teacher's `RouteInfo` peek in
//! `upstream/bridge.rs`: first a cheap [`RawEnvelope`] peek at `a`/`error`, then a full
//! typed decode of the matched variant. A frame that fails the full decode is logged and
//! dropped (spec §7) rather than treated as fatal.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, ServerErrorCode};
use crate::ot::Op;
use crate::value::Json;

/// Cheap first-pass peek at the action tag and optional error envelope.
#[derive(Debug, Deserialize)]
pub struct RawEnvelope {
    pub a: String,
    #[serde(default)]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorBody {
    pub code: ServerErrorCode,
    pub message: String,
}

/// The OT type URL a handshake may announce as the server's default.
pub const JSON0_TYPE_URL: &str = "http://sharejs.org/types/JSONv0";

/// Client -> server handshake frame.
#[derive(Debug, Clone, Serialize)]
pub struct HandshakeRequest {
    pub a: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub protocol: u32,
    #[serde(rename = "protocolMinor")]
    pub protocol_minor: u32,
}

impl HandshakeRequest {
    pub fn new(client_id: Option<String>) -> Self {
        HandshakeRequest { a: "hs", id: client_id, protocol: 1, protocol_minor: 1 }
    }
}

/// Server -> client handshake reply.
#[derive(Debug, Clone, Deserialize)]
pub struct HandshakeReply {
    pub id: String,
    #[serde(default)]
    pub r#type: Option<String>,
}

/// Client -> server subscribe frame.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest {
    pub a: &'static str,
    pub c: String,
    pub d: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v: Option<u64>,
}

/// Server -> client subscribe reply payload.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeReply {
    pub c: String,
    pub d: String,
    #[serde(default)]
    pub data: Option<SubscribeSnapshot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeSnapshot {
    pub v: u64,
    #[serde(default)]
    pub data: Option<Json>,
    #[serde(default)]
    pub r#type: Option<String>,
}

/// The payload an operation frame carries — exactly one of create/op/delete.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationData {
    Create { r#type: String, data: Json },
    Update { ops: Vec<Op> },
    Delete { is_deleted: bool },
}

/// Client -> server (or server -> client) operation frame.
#[derive(Debug, Clone)]
pub struct OperationMessage {
    pub c: String,
    pub d: String,
    pub src: String,
    pub seq: u32,
    pub v: u64,
    pub data: OperationData,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireCreate {
    r#type: String,
    data: Json,
}

/// Flat wire shape of an operation frame, matching spec §4.3/§6.
#[derive(Debug, Serialize, Deserialize)]
struct WireOperation {
    a: String,
    c: String,
    d: String,
    src: String,
    seq: u32,
    v: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    create: Option<WireCreate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    op: Option<Vec<Op>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    del: Option<bool>,
}

impl OperationMessage {
    pub fn encode(&self) -> Result<String, ClientError> {
        let wire = WireOperation {
            a: "op".to_owned(),
            c: self.c.clone(),
            d: self.d.clone(),
            src: self.src.clone(),
            seq: self.seq,
            v: self.v,
            create: match &self.data {
                OperationData::Create { r#type, data } => {
                    Some(WireCreate { r#type: r#type.clone(), data: data.clone() })
                }
                _ => None,
            },
            op: match &self.data {
                OperationData::Update { ops } => Some(ops.clone()),
                _ => None,
            },
            del: match &self.data {
                OperationData::Delete { is_deleted } => Some(*is_deleted),
                _ => None,
            },
        };
        serde_json::to_string(&wire).map_err(ClientError::from)
    }

    pub fn decode(value: &Value) -> Result<Self, ClientError> {
        let wire: WireOperation = serde_json::from_value(value.clone())?;
        let data = match (wire.create, wire.op, wire.del) {
            (Some(c), None, None) => OperationData::Create { r#type: c.r#type, data: c.data },
            (None, Some(ops), None) => OperationData::Update { ops },
            (None, None, Some(is_deleted)) => OperationData::Delete { is_deleted },
            _ => {
                return Err(ClientError::Codec(serde::de::Error::custom(
                    "operation frame must carry exactly one of create/op/del",
                )))
            }
        };
        Ok(OperationMessage { c: wire.c, d: wire.d, src: wire.src, seq: wire.seq, v: wire.v, data })
    }
}

/// Client -> server query subscribe frame.
#[derive(Debug, Clone, Serialize)]
pub struct QuerySubscribeRequest {
    pub a: &'static str,
    pub id: u32,
    pub c: String,
    pub q: Value,
}

/// Server -> client initial query snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct QuerySubscribeReply {
    pub id: u32,
    #[serde(default)]
    pub data: Vec<QueryDocEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryDocEntry {
    #[serde(rename = "d")]
    pub document: String,
    pub v: u64,
    #[serde(default)]
    pub data: Option<Json>,
    #[serde(default)]
    pub r#type: Option<String>,
}

/// Server -> client query diff frame.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryDiffReply {
    pub id: u32,
    pub diff: Vec<QueryDiffOp>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QueryDiffOp {
    Move { from: usize, to: usize, #[serde(rename = "howMany")] how_many: usize },
    Insert { index: usize, values: Vec<QueryDocEntry> },
    Remove { index: usize, #[serde(rename = "howMany")] how_many: usize },
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
