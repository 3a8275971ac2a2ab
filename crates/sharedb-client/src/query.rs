// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Query collections: a list-of-documents subscription driven by server diffs
//! (spec §4.6). Inbound routing shares the connection's dispatch path with documents
//! (`connection::actor` looks queries up by `id` the same way it looks documents up by
//! `(c, d)`), but a query never owns its member documents — it only tracks an ordered
//! list of [`DocumentId`]s and republishes that list on every snapshot or diff.

use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{watch, RwLock};

use crate::codec::{QueryDiffOp, QueryDocEntry};
use crate::connection::ConnectionCore;
use crate::document::{self, DocumentHandle, DocumentId};

/// The non-generic query state held in the connection's registry. Entity typing lives
/// one layer up, at [`QueryHandle`], the same split as [`document::DocumentCore`] /
/// [`DocumentHandle`].
pub(crate) struct QueryCore {
    pub(crate) id: u32,
    pub(crate) collection: String,
    docs: RwLock<Vec<DocumentId>>,
    watch_tx: watch::Sender<Vec<DocumentId>>,
}

impl QueryCore {
    fn doc_id(&self, entry: &QueryDocEntry) -> DocumentId {
        DocumentId { collection: self.collection.clone(), key: entry.document.clone() }
    }

    /// Install each entry's document (installing its snapshot and subscribing it),
    /// then publish the resulting ordered list as the collection's value.
    pub(crate) async fn put(&self, conn_core: &Arc<ConnectionCore>, entries: Vec<QueryDocEntry>) {
        let mut ids = Vec::with_capacity(entries.len());
        for entry in entries {
            let id = self.doc_id(&entry);
            self.install(conn_core, &entry).await;
            ids.push(id);
        }
        *self.docs.write().await = ids.clone();
        let _ = self.watch_tx.send(ids);
    }

    /// Apply a server diff list against the published sequence (spec §4.6 `sync`).
    pub(crate) async fn sync(&self, conn_core: &Arc<ConnectionCore>, diffs: Vec<QueryDiffOp>) {
        let mut ids = self.docs.read().await.clone();
        for diff in diffs {
            match diff {
                QueryDiffOp::Move { from, to, how_many } => {
                    if from + how_many > ids.len() {
                        tracing::warn!(id = self.id, from, to, how_many, "query move diff out of range");
                        continue;
                    }
                    let moved: Vec<DocumentId> = ids.splice(from..from + how_many, []).collect();
                    let insert_at = to.min(ids.len());
                    ids.splice(insert_at..insert_at, moved);
                }
                QueryDiffOp::Insert { index, values } => {
                    let mut inserted = Vec::with_capacity(values.len());
                    for entry in &values {
                        self.install(conn_core, entry).await;
                        inserted.push(self.doc_id(entry));
                    }
                    let at = index.min(ids.len());
                    ids.splice(at..at, inserted);
                }
                QueryDiffOp::Remove { index, how_many } => {
                    let end = (index + how_many).min(ids.len());
                    if index < end {
                        ids.drain(index..end);
                    }
                }
            }
        }
        *self.docs.write().await = ids.clone();
        let _ = self.watch_tx.send(ids);
    }

    async fn install(&self, conn_core: &Arc<ConnectionCore>, entry: &QueryDocEntry) {
        let id = self.doc_id(entry);
        let core = document::get_or_create_raw(conn_core, id).await;
        if let Some(data) = entry.data.clone() {
            core.put(entry.v, Some(data), entry.r#type.clone()).await;
        }
        core.subscribe_best_effort().await;
    }
}

/// A typed, cloneable reference to one live query.
pub struct QueryHandle<E> {
    core: Arc<QueryCore>,
    conn: Weak<ConnectionCore>,
    rx: watch::Receiver<Vec<DocumentId>>,
    _marker: PhantomData<E>,
}

impl<E> Clone for QueryHandle<E> {
    fn clone(&self) -> Self {
        QueryHandle {
            core: Arc::clone(&self.core),
            conn: self.conn.clone(),
            rx: self.rx.clone(),
            _marker: PhantomData,
        }
    }
}

impl<E> QueryHandle<E>
where
    E: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn id(&self) -> u32 {
        self.core.id
    }

    pub fn collection(&self) -> &str {
        &self.core.collection
    }

    /// A cloneable receiver over the query's current member list, in order.
    pub fn watch(&self) -> watch::Receiver<Vec<DocumentId>> {
        self.rx.clone()
    }

    /// Resolve the current member list into typed document handles.
    ///
    /// A member whose document was first addressed elsewhere under a different entity
    /// type fails that one lookup with `DocumentEntityType`; other members still resolve.
    pub async fn documents(&self) -> Vec<DocumentHandle<E>> {
        let Some(conn_core) = self.conn.upgrade() else { return Vec::new() };
        let ids = self.rx.borrow().clone();
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Ok(handle) = document::get_or_create::<E>(&conn_core, id).await {
                out.push(handle);
            }
        }
        out
    }
}

/// Register a fresh query collection under `id`, to be populated by the `qs`/`q` frames
/// the caller is about to send/receive (spec §4.4 `subscribe_query`).
pub(crate) async fn register<E>(
    conn_core: &Arc<ConnectionCore>,
    id: u32,
    collection: String,
) -> QueryHandle<E>
where
    E: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    let (watch_tx, watch_rx) = watch::channel(Vec::new());
    let core = Arc::new(QueryCore { id, collection, docs: RwLock::new(Vec::new()), watch_tx });
    conn_core.queries.write().await.insert(id, Arc::clone(&core));
    QueryHandle { core, conn: Arc::downgrade(conn_core), rx: watch_rx, _marker: PhantomData }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
