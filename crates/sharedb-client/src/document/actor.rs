// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The document actor: one task per document, owning its state, version, inflight op,
//! and FIFO retry queue (spec §4.5, §9). Every public [`super::DocumentHandle`] method
//! is a thin `send` against this actor's command channel, so the state machine below
//! is the sole writer of document state — no locks needed.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use tokio::sync::{mpsc, oneshot, watch};

use crate::codec::{OperationData, OperationMessage, SubscribeRequest};
use crate::connection::ConnectionCore;
use crate::error::{ClientError, ServerErrorCode, StateEventError};
use crate::ot::{self, Op};
use crate::value::Json;

use super::{DocState, DocumentId};

/// Commands sent to a document's actor task.
pub(crate) enum DocCommand {
    Subscribe { reply: oneshot::Sender<Result<(), ClientError>> },
    Create { data: Json, type_url: String, reply: oneshot::Sender<Result<(), ClientError>> },
    Delete { reply: oneshot::Sender<Result<(), ClientError>> },
    Change { ops: Vec<Op>, reply: oneshot::Sender<Result<(), ClientError>> },
    Put { version: u64, data: Option<Json>, type_url: Option<String>, reply: oneshot::Sender<()> },
    SetNotCreated { reply: oneshot::Sender<()> },
    Sync { data: OperationData, version: u64 },
    Ack { version: u64, seq: u32 },
    Pause,
    Resume,
    ServerError { code: ServerErrorCode },
    Snapshot { reply: oneshot::Sender<(DocState, Option<Json>, Option<u64>)> },
}

/// The four transition events not already named by a [`DocCommand`] variant.
enum Event {
    Fetch,
    Put,
    Apply,
    Pause,
    Resume,
    Delete,
    Fail,
    SetNotCreated,
}

impl Event {
    fn as_str(&self) -> &'static str {
        match self {
            Event::Fetch => "fetch",
            Event::Put => "put",
            Event::Apply => "apply",
            Event::Pause => "pause",
            Event::Resume => "resume",
            Event::Delete => "delete",
            Event::Fail => "fail",
            Event::SetNotCreated => "setNotCreated",
        }
    }
}

struct DocumentState {
    id: DocumentId,
    state: DocState,
    version: Option<u64>,
    value: Option<Json>,
    type_url: String,
    inflight: Option<OperationData>,
    queue: VecDeque<OperationData>,
}

impl DocumentState {
    /// The state transition table (spec §4.5). Every transition not named here is
    /// illegal and surfaces as `ClientError::StateEvent`.
    fn transition(&self, event: Event) -> Result<DocState, ClientError> {
        use DocState::*;
        let next = match (self.state, &event) {
            (Blank, Event::Fetch) => Pending,
            (Blank, Event::Put) => Ready,
            (Blank, Event::Fail) => FetchError,
            (Pending, Event::Put) => Ready,
            (Pending, Event::Fail) => FetchError,
            (Pending, Event::SetNotCreated) => NotCreated,
            (Ready, Event::Put) => Ready,
            (Ready, Event::Apply) => Ready,
            (Ready, Event::Pause) => Paused,
            (Ready, Event::Resume) => Ready,
            (Ready, Event::Delete) => Deleted,
            (Paused, Event::Apply) => Paused,
            (Paused, Event::Resume) => Ready,
            (Paused, Event::Delete) => Deleted,
            _ => {
                return Err(ClientError::StateEvent(StateEventError {
                    from: self.state.as_str(),
                    event: event.as_str(),
                }))
            }
        };
        Ok(next)
    }

    async fn handle_subscribe(&mut self, conn: &Weak<ConnectionCore>) -> Result<(), ClientError> {
        if self.state != DocState::Blank {
            return Err(ClientError::AlreadySubscribed);
        }
        let conn = conn.upgrade().ok_or(ClientError::NotConnected)?;
        let frame = SubscribeRequest {
            a: "s",
            c: self.id.collection.clone(),
            d: self.id.key.clone(),
            v: self.version,
        };
        let text = serde_json::to_string(&frame)?;
        match conn.write_raw(text).await {
            Ok(()) => {
                self.state = self.transition(Event::Fetch)?;
                Ok(())
            }
            Err(e) => {
                self.state = self.transition(Event::Fail)?;
                Err(e)
            }
        }
    }

    async fn handle_create(
        &mut self,
        conn: &Weak<ConnectionCore>,
        data: Json,
        type_url: String,
        value_tx: &watch::Sender<Option<Json>>,
    ) -> Result<(), ClientError> {
        if !matches!(self.state, DocState::NotCreated | DocState::Blank) {
            return Err(ClientError::StateEvent(StateEventError {
                from: self.state.as_str(),
                event: "create",
            }));
        }
        self.apply_put(0, Some(data.clone()), Some(type_url.clone()), value_tx);
        self.do_send(conn, OperationData::Create { r#type: type_url, data }).await
    }

    async fn handle_delete(&mut self, conn: &Weak<ConnectionCore>) -> Result<(), ClientError> {
        self.state = self.transition(Event::Delete)?;
        self.do_send(conn, OperationData::Delete { is_deleted: true }).await
    }

    async fn handle_change(
        &mut self,
        conn: &Weak<ConnectionCore>,
        ops: Vec<Op>,
        value_tx: &watch::Sender<Option<Json>>,
    ) -> Result<(), ClientError> {
        if ops.is_empty() {
            return Ok(());
        }
        let Some(current) = self.value.clone() else {
            return Err(ClientError::StateEvent(StateEventError { from: "no local value", event: "change" }));
        };
        let updated = ot::apply(&ops, &current)?;
        self.value = Some(updated.clone());
        let _ = value_tx.send(Some(updated));
        self.state = self.transition(Event::Apply)?;
        self.do_send(conn, OperationData::Update { ops }).await
    }

    /// `send(op)`: queue while there is no client id, no confirmed version, or an op
    /// already inflight; otherwise write immediately and install `op` as inflight.
    async fn do_send(&mut self, conn: &Weak<ConnectionCore>, op: OperationData) -> Result<(), ClientError> {
        let Some(conn) = conn.upgrade() else {
            self.queue.push_back(op);
            return Err(ClientError::NotConnected);
        };
        let client_id = conn.client_id().await;
        let (Some(src), Some(v)) = (client_id, self.version) else {
            self.queue.push_back(op);
            return Ok(());
        };
        if self.inflight.is_some() {
            self.queue.push_back(op);
            return Ok(());
        }
        let msg = OperationMessage {
            c: self.id.collection.clone(),
            d: self.id.key.clone(),
            src,
            seq: 0,
            v,
            data: op.clone(),
        };
        match conn.write_operation(msg).await {
            Ok(()) => {
                self.inflight = Some(op);
                Ok(())
            }
            Err(e) => {
                self.queue.push_back(op);
                Err(e)
            }
        }
    }

    fn apply_put(
        &mut self,
        version: u64,
        data: Option<Json>,
        type_url: Option<String>,
        value_tx: &watch::Sender<Option<Json>>,
    ) {
        if let Some(t) = type_url {
            self.type_url = t;
        }
        self.version = Some(version);
        self.value = data.clone();
        let _ = value_tx.send(data);
        match self.transition(Event::Put) {
            Ok(next) => self.state = next,
            Err(e) => tracing::warn!(collection = %self.id.collection, key = %self.id.key, error = %e, "put from illegal state"),
        }
    }

    fn handle_set_not_created(&mut self) {
        match self.transition(Event::SetNotCreated) {
            Ok(next) => self.state = next,
            Err(e) => tracing::warn!(collection = %self.id.collection, key = %self.id.key, error = %e, "setNotCreated from illegal state"),
        }
    }

    /// `ack(v, seq)`: requires an inflight op; advances the confirmed version and
    /// drains the next queued op, if any.
    async fn handle_ack(&mut self, conn: &Weak<ConnectionCore>, version: u64, _seq: u32) {
        if self.inflight.take().is_none() {
            tracing::warn!(collection = %self.id.collection, key = %self.id.key, "ack with no inflight op");
            return;
        }
        let expected = self.version.map(|v| v + 1);
        if expected != Some(version + 1) {
            tracing::warn!(
                collection = %self.id.collection, key = %self.id.key,
                expected = ?expected, got = version + 1,
                "document version monotonicity violated on ack",
            );
        }
        self.version = Some(version + 1);
        self.handle_resume(conn).await;
    }

    /// `sync(data, v)`: apply a remote update, install a create, or drive a delete.
    async fn handle_sync(
        &mut self,
        data: OperationData,
        version: u64,
        value_tx: &watch::Sender<Option<Json>>,
    ) {
        match data {
            OperationData::Update { ops } => {
                let expected = self.version.map(|v| v + 1);
                if expected != Some(version + 1) {
                    tracing::warn!(
                        collection = %self.id.collection, key = %self.id.key,
                        expected = ?expected, got = version + 1,
                        "dropping remote op with unexpected version",
                    );
                    return;
                }
                let Some(current) = self.value.clone() else { return };
                match ot::apply(&ops, &current) {
                    Ok(updated) => {
                        self.value = Some(updated.clone());
                        self.version = Some(version + 1);
                        let _ = value_tx.send(Some(updated));
                        if let Ok(next) = self.transition(Event::Apply) {
                            self.state = next;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(collection = %self.id.collection, key = %self.id.key, error = %e, "failed to apply remote op")
                    }
                }
            }
            OperationData::Create { r#type, data } => {
                self.apply_put(version, Some(data), Some(r#type), value_tx);
            }
            OperationData::Delete { .. } => {
                if let Ok(next) = self.transition(Event::Delete) {
                    self.state = next;
                    self.value = None;
                    let _ = value_tx.send(None);
                }
            }
        }
    }

    fn handle_pause(&mut self) {
        match self.transition(Event::Pause) {
            Ok(next) => self.state = next,
            Err(e) => {
                tracing::debug!(collection = %self.id.collection, key = %self.id.key, error = %e, "pause from illegal state");
                return;
            }
        }
        if let Some(op) = self.inflight.take() {
            self.queue.push_front(op);
        }
    }

    /// `resume`: transition `Paused -> Ready` (a no-op when already `Ready`), then
    /// drain the next queued op.
    async fn handle_resume(&mut self, conn: &Weak<ConnectionCore>) {
        match self.transition(Event::Resume) {
            Ok(next) => self.state = next,
            Err(e) => {
                tracing::debug!(collection = %self.id.collection, key = %self.id.key, error = %e, "resume from illegal state");
                return;
            }
        }
        if self.inflight.is_none() {
            if let Some(op) = self.queue.pop_front() {
                let _ = self.do_send(conn, op).await;
            }
        }
    }

    /// Server-side rejection of the inflight op (spec §7).
    async fn handle_server_error(
        &mut self,
        conn: &Weak<ConnectionCore>,
        code: ServerErrorCode,
        value_tx: &watch::Sender<Option<Json>>,
    ) {
        match code {
            ServerErrorCode::DocAlreadyCreated => {
                self.inflight = None;
                self.handle_resume(conn).await;
            }
            ServerErrorCode::DocWasDeleted | ServerErrorCode::DocTypeNotRecognized => {
                if let Ok(next) = self.transition(Event::Delete) {
                    self.state = next;
                    self.value = None;
                    let _ = value_tx.send(None);
                }
                self.inflight = None;
            }
            ServerErrorCode::OpSubmitRejected => {
                if let Some(OperationData::Update { ops }) = self.inflight.take() {
                    if let Some(current) = self.value.clone() {
                        match ot::apply(&ot::inverse(&ops), &current) {
                            Ok(rolled_back) => {
                                self.value = Some(rolled_back.clone());
                                let _ = value_tx.send(Some(rolled_back));
                            }
                            Err(e) => tracing::warn!(
                                collection = %self.id.collection, key = %self.id.key, error = %e,
                                "failed to roll back rejected op",
                            ),
                        }
                    }
                }
                self.handle_resume(conn).await;
            }
            other => {
                tracing::warn!(collection = %self.id.collection, key = %self.id.key, code = %other, "server rejected inflight op");
                self.inflight = None;
                self.handle_resume(conn).await;
            }
        }
    }
}

pub(crate) fn spawn(
    id: DocumentId,
    conn: Weak<ConnectionCore>,
    default_type: String,
) -> (mpsc::Sender<DocCommand>, watch::Receiver<Option<Json>>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (value_tx, value_rx) = watch::channel(None);
    tokio::spawn(run(id, conn, default_type, cmd_rx, value_tx));
    (cmd_tx, value_rx)
}

async fn run(
    id: DocumentId,
    conn: Weak<ConnectionCore>,
    default_type: String,
    mut cmd_rx: mpsc::Receiver<DocCommand>,
    value_tx: watch::Sender<Option<Json>>,
) {
    let mut doc = DocumentState {
        id,
        state: DocState::Blank,
        version: None,
        value: None,
        type_url: default_type,
        inflight: None,
        queue: VecDeque::new(),
    };

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            DocCommand::Subscribe { reply } => {
                let result = doc.handle_subscribe(&conn).await;
                let _ = reply.send(result);
            }
            DocCommand::Create { data, type_url, reply } => {
                let result = doc.handle_create(&conn, data, type_url, &value_tx).await;
                let _ = reply.send(result);
            }
            DocCommand::Delete { reply } => {
                let result = doc.handle_delete(&conn).await;
                let _ = reply.send(result);
            }
            DocCommand::Change { ops, reply } => {
                let result = doc.handle_change(&conn, ops, &value_tx).await;
                let _ = reply.send(result);
            }
            DocCommand::Put { version, data, type_url, reply } => {
                doc.apply_put(version, data, type_url, &value_tx);
                let _ = reply.send(());
            }
            DocCommand::SetNotCreated { reply } => {
                doc.handle_set_not_created();
                let _ = reply.send(());
            }
            DocCommand::Sync { data, version } => {
                doc.handle_sync(data, version, &value_tx).await;
            }
            DocCommand::Ack { version, seq } => {
                doc.handle_ack(&conn, version, seq).await;
            }
            DocCommand::Pause => doc.handle_pause(),
            DocCommand::Resume => doc.handle_resume(&conn).await,
            DocCommand::ServerError { code } => {
                doc.handle_server_error(&conn, code, &value_tx).await;
            }
            DocCommand::Snapshot { reply } => {
                let _ = reply.send((doc.state, doc.value.clone(), doc.version));
            }
        }
    }
}

#[cfg(test)]
#[path = "actor_tests.rs"]
mod tests;
