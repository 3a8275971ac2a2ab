// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A ShareDB client core: the connection state machine and message multiplexer, the
//! per-document inflight/queue discipline, and the JSON0 (with embedded TEXT0)
//! operational transform engine.
//!
//! The WebSocket transport itself, a demonstration UI, and projections/custom OT types
//! beyond JSON0/TEXT0 are out of scope — see `connection::transport::WsTransport` for
//! the seam a caller substitutes a transport at, and `ot` for the transform engine.

pub mod codec;
pub mod config;
pub mod connection;
pub mod document;
pub mod error;
pub mod ot;
pub mod query;
pub mod value;

pub use config::ClientConfig;
pub use connection::Connection;
pub use document::{DocState, DocumentHandle, DocumentId};
pub use error::{ClientError, OtError, ServerErrorCode};
pub use query::QueryHandle;
pub use value::{Json, Path, PathToken};
