// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The connection: socket lifecycle, handshake, document/query registries, and
//! outbound sequencing (spec §4.4). A single background task owns the transport
//! exclusively and serializes every outbound write through it, so the wire-level
//! `seq` stamped on each operation frame is strictly monotonic per connection.

pub mod actor;
pub mod transport;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::codec::{OperationMessage, QuerySubscribeRequest, JSON0_TYPE_URL};
use crate::config::ClientConfig;
use crate::document::{self, DocumentCore, DocumentHandle, DocumentId};
use crate::error::ClientError;
use crate::query::{self, QueryCore, QueryHandle};

use self::transport::{Reconnector, TungsteniteTransport, WsTransport};

/// A queued write: either a raw control frame or an operation awaiting a `seq` stamp.
pub(crate) enum OutboundFrame {
    Raw(String),
    Operation(OperationMessage),
}

pub(crate) struct WriteRequest {
    pub frame: OutboundFrame,
    pub reply: oneshot::Sender<Result<(), ClientError>>,
}

/// Shared connection state, reachable from documents and queries via a `Weak` back
/// reference so neither keeps the connection alive on its own.
pub(crate) struct ConnectionCore {
    client_id: RwLock<Option<String>>,
    default_type: RwLock<String>,
    pub(crate) documents: RwLock<HashMap<DocumentId, Arc<DocumentCore>>>,
    pub(crate) queries: RwLock<HashMap<u32, Arc<QueryCore>>>,
    next_seq: AtomicU32,
    next_query_id: AtomicU32,
    write_tx: mpsc::Sender<WriteRequest>,
    shutdown: CancellationToken,
}

impl ConnectionCore {
    pub(crate) async fn client_id(&self) -> Option<String> {
        self.client_id.read().await.clone()
    }

    pub(crate) async fn set_client_id(&self, id: String) {
        *self.client_id.write().await = Some(id);
    }

    /// Drop the retained clientID so the next handshake asks the server for a fresh one
    /// rather than resuming the current session (used when forcing a new identity on
    /// `seq` exhaustion; see `connection::actor::reconnect_cycle`).
    pub(crate) async fn clear_client_id(&self) {
        *self.client_id.write().await = None;
    }

    pub(crate) async fn default_type(&self) -> String {
        self.default_type.read().await.clone()
    }

    pub(crate) async fn set_default_type(&self, type_url: String) {
        *self.default_type.write().await = type_url;
    }

    pub(crate) async fn write_raw(&self, text: String) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();
        self.write_tx
            .send(WriteRequest { frame: OutboundFrame::Raw(text), reply: tx })
            .await
            .map_err(|_| ClientError::NotConnected)?;
        rx.await.map_err(|_| ClientError::NotConnected)?
    }

    pub(crate) async fn write_operation(&self, msg: OperationMessage) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();
        self.write_tx
            .send(WriteRequest { frame: OutboundFrame::Operation(msg), reply: tx })
            .await
            .map_err(|_| ClientError::NotConnected)?;
        rx.await.map_err(|_| ClientError::NotConnected)?
    }

    /// Stamp the next outbound `seq`; the connection is forced to reconnect with a
    /// fresh session once the counter is exhausted (spec §9).
    pub(crate) fn next_seq(&self) -> Result<u32, ClientError> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        if seq == u32::MAX {
            return Err(ClientError::SeqExhausted);
        }
        Ok(seq)
    }

    pub(crate) fn reset_seq(&self) {
        self.next_seq.store(1, Ordering::SeqCst);
    }
}

/// A live ShareDB connection.
///
/// Cloned handles ([`DocumentHandle`], [`QueryHandle`]) may outlive this value; dropping
/// it only drops the background task's join handle, it does not tear the task down —
/// call [`Connection::sync_shutdown`] for a clean stop.
pub struct Connection {
    core: Arc<ConnectionCore>,
    task: JoinHandle<()>,
}

impl Connection {
    /// Dial `config.url` and start the connection's background task.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = TungsteniteTransport::connect(&config.url).await?;
        let reconnector = Arc::new(Reconnector::new(config.url.clone()));
        Ok(Self::spawn_with_reconnect(config, transport, move || {
            let reconnector = Arc::clone(&reconnector);
            async move { reconnector.reconnect().await }
        }))
    }

    /// Build a connection around an already-established transport, reconnecting via
    /// `reconnect` on socket loss. Exposed so integration tests can substitute a
    /// transport that talks to a local/in-memory fake server.
    pub fn spawn_with_reconnect<T, F, Fut>(config: ClientConfig, transport: T, reconnect: F) -> Self
    where
        T: WsTransport + Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        let (write_tx, write_rx) = mpsc::channel(64);
        let shutdown = CancellationToken::new();
        let core = Arc::new(ConnectionCore {
            client_id: RwLock::new(None),
            default_type: RwLock::new(JSON0_TYPE_URL.to_owned()),
            documents: RwLock::new(HashMap::new()),
            queries: RwLock::new(HashMap::new()),
            next_seq: AtomicU32::new(1),
            next_query_id: AtomicU32::new(1),
            write_tx,
            shutdown: shutdown.clone(),
        });

        let task = tokio::spawn(actor::run(
            Arc::clone(&core),
            transport,
            config,
            write_rx,
            shutdown,
            reconnect,
        ));
        Connection { core, task }
    }

    /// Look up or create the document at `(collection, key)`, addressed as entity `E`.
    pub async fn get_document<E>(
        &self,
        collection: impl Into<String>,
        key: impl Into<String>,
    ) -> Result<DocumentHandle<E>, ClientError>
    where
        E: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        document::get_or_create(&self.core, DocumentId { collection: collection.into(), key: key.into() }).await
    }

    /// `get_document` followed by `subscribe`.
    pub async fn subscribe_document<E>(
        &self,
        collection: impl Into<String>,
        key: impl Into<String>,
    ) -> Result<DocumentHandle<E>, ClientError>
    where
        E: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let handle = self.get_document::<E>(collection, key).await?;
        handle.subscribe().await?;
        Ok(handle)
    }

    /// Create a new document with a random key under `collection`.
    pub async fn create<E>(
        &self,
        collection: impl Into<String>,
        entity: &E,
    ) -> Result<DocumentHandle<E>, ClientError>
    where
        E: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let key = Uuid::new_v4().to_string();
        let handle = self.get_document::<E>(collection, key).await?;
        handle.create(entity, None).await?;
        Ok(handle)
    }

    /// Subscribe to a live query over `collection`.
    pub async fn subscribe_query<E>(
        &self,
        collection: impl Into<String>,
        query_expr: serde_json::Value,
    ) -> Result<QueryHandle<E>, ClientError>
    where
        E: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let collection = collection.into();
        let id = self.core.next_query_id.fetch_add(1, Ordering::SeqCst);
        let handle = query::register::<E>(&self.core, id, collection.clone()).await;
        let frame = QuerySubscribeRequest { a: "qs", id, c: collection, q: query_expr };
        let text = serde_json::to_string(&frame)?;
        self.core.write_raw(text).await?;
        Ok(handle)
    }

    /// Pause every registered document without tearing down the background task
    /// (spec §4.4 `disconnect`).
    pub async fn disconnect(&self) {
        let docs: Vec<_> = self.core.documents.read().await.values().cloned().collect();
        for doc in docs {
            doc.pause().await;
        }
    }

    /// Pause all documents, cancel the background task, and wait for it to exit.
    pub async fn sync_shutdown(self) {
        self.disconnect().await;
        self.core.shutdown.cancel();
        let _ = self.task.await;
    }
}

/// Build a bare [`ConnectionCore`] with no background actor, for document/query unit
/// tests that drive state-machine methods directly against a captured write channel.
#[cfg(test)]
pub(crate) fn test_harness() -> (Arc<ConnectionCore>, mpsc::Receiver<WriteRequest>) {
    let (write_tx, write_rx) = mpsc::channel(64);
    let core = Arc::new(ConnectionCore {
        client_id: RwLock::new(None),
        default_type: RwLock::new(JSON0_TYPE_URL.to_owned()),
        documents: RwLock::new(HashMap::new()),
        queries: RwLock::new(HashMap::new()),
        next_seq: AtomicU32::new(1),
        next_query_id: AtomicU32::new(1),
        write_tx,
        shutdown: CancellationToken::new(),
    });
    (core, write_rx)
}
