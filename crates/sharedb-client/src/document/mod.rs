// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-document state machine: inflight/queue discipline, version tracking, the change
//! proxy, and subscribe/create/delete (spec §4.5).
//!
//! Each document is driven by its own actor task (spec §5's "actor-per-document"
//! option): a [`DocumentHandle`] is a cheap, cloneable reference that sends commands
//! over an `mpsc` channel rather than touching shared state directly, so state
//! transitions are serialized per document without explicit locks.

pub mod actor;
pub mod proxy;

use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};

use crate::codec::OperationData;
use crate::connection::ConnectionCore;
use crate::error::{ClientError, ServerErrorCode};
use crate::ot::Op;
use crate::value::Json;

use self::actor::DocCommand;
use self::proxy::{Proxy, Transaction};

/// `(collection, key)` pair; globally unique within a [`crate::connection::Connection`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentId {
    pub collection: String,
    pub key: String,
}

/// Document state machine states (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocState {
    Blank,
    Pending,
    Ready,
    Paused,
    Deleted,
    FetchError,
    NotCreated,
}

impl DocState {
    pub fn as_str(self) -> &'static str {
        match self {
            DocState::Blank => "Blank",
            DocState::Pending => "Pending",
            DocState::Ready => "Ready",
            DocState::Paused => "Paused",
            DocState::Deleted => "Deleted",
            DocState::FetchError => "FetchError",
            DocState::NotCreated => "NotCreated",
        }
    }
}

/// The non-generic, type-erased document actor handle held in the connection's
/// registry. Entity typing lives one layer up, at [`DocumentHandle`].
pub(crate) struct DocumentCore {
    pub(crate) id: DocumentId,
    cmd_tx: mpsc::Sender<DocCommand>,
    watch_rx: watch::Receiver<Option<Json>>,
    entity_type: OnceLock<&'static str>,
}

impl DocumentCore {
    pub(crate) async fn pause(&self) {
        let _ = self.cmd_tx.send(DocCommand::Pause).await;
    }

    pub(crate) async fn resume(&self) {
        let _ = self.cmd_tx.send(DocCommand::Resume).await;
    }

    pub(crate) async fn put(&self, version: u64, data: Option<Json>, type_url: Option<String>) {
        let (tx, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(DocCommand::Put { version, data, type_url, reply: tx })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }

    pub(crate) async fn set_not_created(&self) {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(DocCommand::SetNotCreated { reply: tx }).await.is_ok() {
            let _ = rx.await;
        }
    }

    pub(crate) async fn ack(&self, version: u64, seq: u32) {
        let _ = self.cmd_tx.send(DocCommand::Ack { version, seq }).await;
    }

    pub(crate) async fn sync(&self, data: OperationData, version: u64) {
        let _ = self.cmd_tx.send(DocCommand::Sync { data, version }).await;
    }

    pub(crate) async fn handle_server_error(&self, code: ServerErrorCode) {
        let _ = self.cmd_tx.send(DocCommand::ServerError { code }).await;
    }

    /// Best-effort subscribe used internally by [`crate::query`] when installing
    /// documents from a query snapshot — errors (e.g. already subscribed) are swallowed
    /// since the query path does not surface a per-document subscribe failure.
    pub(crate) async fn subscribe_best_effort(&self) {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(DocCommand::Subscribe { reply: tx }).await.is_ok() {
            let _ = rx.await;
        }
    }
}

/// A typed, cloneable reference to one document.
///
/// `E` is the user's decoded entity type; the document's JSON snapshot is re-derived
/// into `E` on every update before subscribers are notified (spec §3's "JSON value and
/// the decoded entity are always in sync" invariant) — concretely, this is deserialized
/// lazily whenever [`DocumentHandle::entity`] or a watch subscriber polls, from the
/// single underlying `Json` snapshot broadcast by the actor.
pub struct DocumentHandle<E> {
    core: Arc<DocumentCore>,
    rx: watch::Receiver<Option<Json>>,
    _marker: PhantomData<E>,
}

impl<E> Clone for DocumentHandle<E> {
    fn clone(&self) -> Self {
        DocumentHandle { core: Arc::clone(&self.core), rx: self.rx.clone(), _marker: PhantomData }
    }
}

impl<E> DocumentHandle<E>
where
    E: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn id(&self) -> &DocumentId {
        &self.core.id
    }

    /// Decode the current snapshot into `E`, or `None` if the document has no value yet.
    pub fn entity(&self) -> Result<Option<E>, ClientError> {
        match &*self.rx.borrow() {
            Some(json) => Ok(Some(serde_json::from_value(json.to_serde())?)),
            None => Ok(None),
        }
    }

    /// A cloneable raw value-stream receiver; decode with [`Json::to_serde`] + `serde_json`
    /// or simply re-poll [`DocumentHandle::entity`] after each `changed().await`.
    pub fn watch(&self) -> watch::Receiver<Option<Json>> {
        self.rx.clone()
    }

    /// Subscribe to server updates for this document (spec §4.5 `subscribe`).
    ///
    /// Requires `Blank`; a second call in any other state fails with `AlreadySubscribed`.
    pub async fn subscribe(&self) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();
        self.core
            .cmd_tx
            .send(DocCommand::Subscribe { reply: tx })
            .await
            .map_err(|_| ClientError::NotConnected)?;
        rx.await.map_err(|_| ClientError::NotConnected)?
    }

    /// Create this document with `entity` as its initial snapshot.
    pub async fn create(&self, entity: &E, type_url: Option<String>) -> Result<(), ClientError> {
        let data = Json::from(serde_json::to_value(entity)?);
        let type_url = type_url.unwrap_or_else(|| crate::codec::JSON0_TYPE_URL.to_owned());
        let (tx, rx) = oneshot::channel();
        self.core
            .cmd_tx
            .send(DocCommand::Create { data, type_url, reply: tx })
            .await
            .map_err(|_| ClientError::NotConnected)?;
        rx.await.map_err(|_| ClientError::NotConnected)?
    }

    /// Delete this document.
    pub async fn delete(&self) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();
        self.core
            .cmd_tx
            .send(DocCommand::Delete { reply: tx })
            .await
            .map_err(|_| ClientError::NotConnected)?;
        rx.await.map_err(|_| ClientError::NotConnected)?
    }

    /// Apply a local mutation through the JSON proxy.
    ///
    /// `f` is handed a [`Proxy`] addressed at the document root, built from a snapshot
    /// of the current value; the ops it enqueues are applied locally (against the
    /// document's *authoritative* value, which may have moved on since the snapshot
    /// was taken — a concurrent remote op surfaces as `OldDataMismatch`) and then sent.
    /// An empty op list returns silently.
    pub async fn change<F>(&self, f: F) -> Result<(), ClientError>
    where
        F: FnOnce(&Proxy) -> Result<(), crate::error::OtError>,
    {
        let (tx, rx) = oneshot::channel();
        self.core
            .cmd_tx
            .send(DocCommand::Snapshot { reply: tx })
            .await
            .map_err(|_| ClientError::NotConnected)?;
        let (_state, value, _version) = rx.await.map_err(|_| ClientError::NotConnected)?;
        let Some(value) = value else {
            return Err(ClientError::StateEvent(crate::error::StateEventError {
                from: "no local value",
                event: "change",
            }));
        };

        let txn = Transaction::new();
        let root = Proxy::root(&value, &txn);
        f(&root)?;
        let ops: Vec<Op> = txn.into_ops();
        if ops.is_empty() {
            return Ok(());
        }

        let (tx2, rx2) = oneshot::channel();
        self.core
            .cmd_tx
            .send(DocCommand::Change { ops, reply: tx2 })
            .await
            .map_err(|_| ClientError::NotConnected)?;
        rx2.await.map_err(|_| ClientError::NotConnected)?
    }
}

/// Look up or create the document at `id`, checking (or establishing) the entity type
/// this `DocumentId` is addressed with — a second lookup under a different `E` fails
/// with `DocumentEntityType` (spec §4.4 `get_document`).
pub(crate) async fn get_or_create<E>(
    conn_core: &Arc<ConnectionCore>,
    id: DocumentId,
) -> Result<DocumentHandle<E>, ClientError>
where
    E: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    let type_name = std::any::type_name::<E>();

    if let Some(core) = conn_core.documents.read().await.get(&id) {
        return wrap_checked(core, type_name);
    }

    let mut docs = conn_core.documents.write().await;
    if let Some(core) = docs.get(&id) {
        return wrap_checked(core, type_name);
    }

    let default_type = conn_core.default_type().await;
    let conn_weak = Arc::downgrade(conn_core);
    let (cmd_tx, watch_rx) = actor::spawn(id.clone(), conn_weak, default_type);
    let entity_type = OnceLock::new();
    let _ = entity_type.set(type_name);
    let core = Arc::new(DocumentCore { id: id.clone(), cmd_tx, watch_rx: watch_rx.clone(), entity_type });
    docs.insert(id, Arc::clone(&core));
    Ok(DocumentHandle { core, rx: watch_rx, _marker: PhantomData })
}

fn wrap_checked<E: 'static>(
    core: &Arc<DocumentCore>,
    type_name: &'static str,
) -> Result<DocumentHandle<E>, ClientError> {
    let stored = *core.entity_type.get_or_init(|| type_name);
    if stored != type_name {
        return Err(ClientError::DocumentEntityType);
    }
    Ok(DocumentHandle {
        core: Arc::clone(core),
        rx: core.watch_rx.clone(),
        _marker: PhantomData,
    })
}

/// Look up or create the raw, type-erased document core — used by [`crate::query`],
/// which installs documents from a query snapshot without a caller-specified entity type.
pub(crate) async fn get_or_create_raw(
    conn_core: &Arc<ConnectionCore>,
    id: DocumentId,
) -> Arc<DocumentCore> {
    if let Some(core) = conn_core.documents.read().await.get(&id) {
        return Arc::clone(core);
    }
    let mut docs = conn_core.documents.write().await;
    if let Some(core) = docs.get(&id) {
        return Arc::clone(core);
    }
    let default_type = conn_core.default_type().await;
    let conn_weak = Arc::downgrade(conn_core);
    let (cmd_tx, watch_rx) = actor::spawn(id.clone(), conn_weak, default_type);
    let core = Arc::new(DocumentCore {
        id: id.clone(),
        cmd_tx,
        watch_rx,
        entity_type: OnceLock::new(),
    });
    docs.insert(id, Arc::clone(&core));
    core
}
