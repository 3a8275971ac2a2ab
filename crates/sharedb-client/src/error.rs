// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure modes of the JSON0/TEXT0 transformer (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OtError {
    #[error("invalid path")]
    InvalidPath,
    #[error("old data mismatch")]
    OldDataMismatch,
    #[error("index out of range")]
    IndexOutOfRange,
    #[error("invalid JSON data")]
    InvalidJSONData,
    #[error("unsupported operation")]
    UnsupportedOperation,
    #[error("unsupported subtype")]
    UnsupportedSubtype,
}

/// The closed set of server-reported error codes (spec §6/§7).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerErrorCode {
    #[serde(rename = "ERR_OP_SUBMIT_REJECTED")]
    OpSubmitRejected,
    #[serde(rename = "ERR_PENDING_OP_REMOVED_BY_OP_SUBMIT_REJECTED")]
    PendingOpRemovedByOpSubmitRejected,
    #[serde(rename = "ERR_OP_ALREADY_SUBMITTED")]
    OpAlreadySubmitted,
    #[serde(rename = "ERR_SUBMIT_TRANSFORM_OPS_NOT_FOUND")]
    SubmitTransformOpsNotFound,
    #[serde(rename = "ERR_MAX_SUBMIT_RETRIES_EXCEEDED")]
    MaxSubmitRetriesExceeded,
    #[serde(rename = "ERR_DOC_ALREADY_CREATED")]
    DocAlreadyCreated,
    #[serde(rename = "ERR_DOC_WAS_DELETED")]
    DocWasDeleted,
    #[serde(rename = "ERR_DOC_TYPE_NOT_RECOGNIZED")]
    DocTypeNotRecognized,
    #[serde(rename = "ERR_DEFAULT_TYPE_MISMATCH")]
    DefaultTypeMismatch,
    #[serde(rename = "ERR_OP_NOT_ALLOWED_IN_PROJECTION")]
    OpNotAllowedInProjection,
    #[serde(rename = "ERR_TYPE_CANNOT_BE_PROJECTED")]
    TypeCannotBeProjected,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ServerErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A document state-machine transition that is illegal from the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot apply `{event}` from state `{from}`")]
pub struct StateEventError {
    pub from: &'static str,
    pub event: &'static str,
}

/// Top-level client error, covering connection, document, and OT failures.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Ot(#[from] OtError),

    #[error("connection is not established (handshake not yet acknowledged)")]
    NotConnected,

    #[error("document already subscribed")]
    AlreadySubscribed,

    #[error(transparent)]
    StateEvent(#[from] StateEventError),

    #[error("document entity type mismatch")]
    DocumentEntityType,

    #[error("unknown document `{collection}/{key}`")]
    UnknownDocument { collection: String, key: String },

    #[error("unknown query id {0}")]
    UnknownQuery(u32),

    #[error("unsupported OT type `{0}`")]
    UnsupportedType(String),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("server error {code}: {message}")]
    Server { code: ServerErrorCode, message: String },

    #[error("outbound sequence counter exhausted, forcing reconnect")]
    SeqExhausted,
}
