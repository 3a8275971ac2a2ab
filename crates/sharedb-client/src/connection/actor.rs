// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The connection's background task: handshake, inbound frame routing (spec §4.4),
//! outbound write serialization, and reconnect-with-backoff.
//!
//! `run` is generic over the transport (and the factory that rebuilds one after a
//! drop), but that genericity never reaches the public API — `Connection::connect`
//! and `Connection::spawn_with_reconnect` hand the generic future to `tokio::spawn`,
//! which erases it into a plain `JoinHandle<()>`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::codec::{
    HandshakeReply, HandshakeRequest, OperationMessage, QueryDiffReply, QuerySubscribeReply,
    RawEnvelope, SubscribeReply, JSON0_TYPE_URL,
};
use crate::config::ClientConfig;
use crate::document::DocumentId;
use crate::error::ClientError;

use super::transport::{WsEvent, WsTransport};
use super::{ConnectionCore, OutboundFrame, WriteRequest};

pub(crate) async fn run<T, F, Fut>(
    core: Arc<ConnectionCore>,
    mut transport: T,
    config: ClientConfig,
    mut write_rx: mpsc::Receiver<WriteRequest>,
    shutdown: CancellationToken,
    reconnect: F,
) where
    T: WsTransport,
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, ClientError>>,
{
    let mut backoff = config.initial_backoff();

    if let Err(e) = do_handshake(&core, &mut transport).await {
        tracing::warn!(error = %e, "initial handshake failed");
    }

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                tracing::debug!("connection shutting down");
                break;
            }

            req = write_rx.recv() => {
                let Some(WriteRequest { frame, reply }) = req else { break };
                let result = encode_and_send(&core, &mut transport, frame).await;
                let needs_reconnect = matches!(result, Err(ClientError::SeqExhausted));
                let _ = reply.send(result);
                if needs_reconnect {
                    // `seq` is exhausted: force a brand new identity (spec §9) rather than
                    // resuming the session that just ran out of sequence numbers.
                    if !reconnect_cycle(&core, &mut transport, &config, &shutdown, &reconnect, &mut backoff, true).await {
                        break;
                    }
                }
            }

            event = transport.recv() => {
                match event {
                    Some(Ok(WsEvent::Text(text))) => handle_inbound(&core, &text).await,
                    Some(Ok(WsEvent::Closed)) | None => {
                        tracing::warn!("socket closed");
                        if !config.reconnect { break; }
                        if !reconnect_cycle(&core, &mut transport, &config, &shutdown, &reconnect, &mut backoff, false).await {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "transport error");
                        if !config.reconnect { break; }
                        if !reconnect_cycle(&core, &mut transport, &config, &shutdown, &reconnect, &mut backoff, false).await {
                            break;
                        }
                    }
                }
            }
        }
    }

    pause_all(&core).await;
}

/// Pause every document, reconnect with backoff, re-handshake, then resume every
/// document — the queue discipline (spec §4.5) replays whatever piled up while paused.
///
/// `new_identity` controls whether this reconnect starts a fresh client session or
/// resumes the old one (spec §4.4: "replay the handshake using the retained clientID;
/// the server resumes the session"). A session-resuming reconnect (socket drop,
/// transport error) must retain the clientID and must NOT reset `seq` — the server
/// tracks `seq` monotonicity per client session (spec §5/§9), and restarting it under a
/// retained identity would replay a `seq` value the server has already seen. Only a
/// genuinely new identity (currently: `seq` exhaustion) clears the retained clientID
/// before re-handshaking and resets `seq` once the fresh identity is in hand.
///
/// Returns `false` if shutdown was requested mid-reconnect.
async fn reconnect_cycle<T, F, Fut>(
    core: &Arc<ConnectionCore>,
    transport: &mut T,
    config: &ClientConfig,
    shutdown: &CancellationToken,
    reconnect: &F,
    backoff: &mut Duration,
    new_identity: bool,
) -> bool
where
    T: WsTransport,
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, ClientError>>,
{
    pause_all(core).await;
    if new_identity {
        core.clear_client_id().await;
    }
    match reconnect_loop(config, shutdown, reconnect, backoff).await {
        Some(new_transport) => {
            *transport = new_transport;
            *backoff = config.initial_backoff();
            if new_identity {
                core.reset_seq();
            }
            if let Err(e) = do_handshake(core, transport).await {
                tracing::warn!(error = %e, "handshake after reconnect failed");
            }
            resume_all(core).await;
            true
        }
        None => false,
    }
}

async fn reconnect_loop<T, F, Fut>(
    config: &ClientConfig,
    shutdown: &CancellationToken,
    reconnect: &F,
    backoff: &mut Duration,
) -> Option<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, ClientError>>,
{
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return None,
            result = reconnect() => {
                match result {
                    Ok(transport) => return Some(transport),
                    Err(e) => tracing::warn!(error = %e, backoff_ms = backoff.as_millis() as u64, "reconnect attempt failed"),
                }
            }
        }
        tokio::select! {
            _ = shutdown.cancelled() => return None,
            _ = tokio::time::sleep(*backoff) => {}
        }
        *backoff = (*backoff * 2).min(config.max_backoff());
    }
}

async fn pause_all(core: &Arc<ConnectionCore>) {
    let docs: Vec<_> = core.documents.read().await.values().cloned().collect();
    for doc in docs {
        doc.pause().await;
    }
}

async fn resume_all(core: &Arc<ConnectionCore>) {
    let docs: Vec<_> = core.documents.read().await.values().cloned().collect();
    for doc in docs {
        doc.resume().await;
    }
}

async fn encode_and_send<T: WsTransport>(
    core: &Arc<ConnectionCore>,
    transport: &mut T,
    frame: OutboundFrame,
) -> Result<(), ClientError> {
    let text = match frame {
        OutboundFrame::Raw(text) => text,
        OutboundFrame::Operation(mut msg) => {
            msg.seq = core.next_seq()?;
            msg.encode()?
        }
    };
    transport.send(text).await
}

async fn do_handshake<T: WsTransport>(core: &Arc<ConnectionCore>, transport: &mut T) -> Result<(), ClientError> {
    let existing_id = core.client_id().await;
    let req = HandshakeRequest::new(existing_id);
    let text = serde_json::to_string(&req)?;
    transport.send(text).await?;

    loop {
        match transport.recv().await {
            Some(Ok(WsEvent::Text(text))) => {
                let envelope: RawEnvelope = match serde_json::from_str(&text) {
                    Ok(e) => e,
                    Err(_) => {
                        tracing::warn!("dropping malformed frame while awaiting handshake reply");
                        continue;
                    }
                };
                if envelope.a != "hs" {
                    handle_inbound(core, &text).await;
                    continue;
                }
                let reply: HandshakeReply = serde_json::from_str(&text)?;
                core.set_client_id(reply.id).await;
                if let Some(type_url) = reply.r#type {
                    if type_url != JSON0_TYPE_URL {
                        tracing::warn!(%type_url, "server default OT type is not json0");
                        return Err(ClientError::UnsupportedType(type_url));
                    }
                    core.set_default_type(type_url).await;
                }
                return Ok(());
            }
            Some(Ok(WsEvent::Closed)) | None => {
                return Err(ClientError::Transport("socket closed during handshake".into()))
            }
            Some(Err(e)) => return Err(e),
        }
    }
}

async fn handle_inbound(core: &Arc<ConnectionCore>, text: &str) {
    let envelope: RawEnvelope = match serde_json::from_str(text) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(error = %e, "dropping malformed inbound frame");
            return;
        }
    };

    if let Some(error) = envelope.error {
        handle_error_frame(core, &envelope.a, error, text).await;
        return;
    }

    match envelope.a.as_str() {
        "hs" => {
            if let Ok(reply) = serde_json::from_str::<HandshakeReply>(text) {
                core.set_client_id(reply.id).await;
                if let Some(type_url) = reply.r#type {
                    core.set_default_type(type_url).await;
                }
            }
        }
        "s" => handle_subscribe_reply(core, text).await,
        "qs" => handle_query_subscribe_reply(core, text).await,
        "q" => handle_query_diff(core, text).await,
        "op" => handle_operation_frame(core, text).await,
        other => tracing::debug!(action = other, "dropping frame with unrecognized action"),
    }
}

async fn handle_subscribe_reply(core: &Arc<ConnectionCore>, text: &str) {
    let reply: SubscribeReply = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "malformed subscribe reply");
            return;
        }
    };
    let id = DocumentId { collection: reply.c, key: reply.d };
    let Some(doc) = core.documents.read().await.get(&id).cloned() else {
        tracing::warn!(collection = %id.collection, key = %id.key, "subscribe reply for unknown document");
        return;
    };
    match reply.data {
        Some(snapshot) if snapshot.data.is_some() => {
            doc.put(snapshot.v, snapshot.data, snapshot.r#type).await;
        }
        // NotCreated requires BOTH `data` and `type` absent (spec §4.3); a type-only
        // snapshot still installs (with no value payload) rather than being mis-routed
        // to NotCreated.
        Some(snapshot) if snapshot.r#type.is_some() => {
            doc.put(snapshot.v, None, snapshot.r#type).await;
        }
        Some(_) => doc.set_not_created().await,
        None => tracing::warn!(collection = %id.collection, key = %id.key, "subscribe reply missing data"),
    }
}

async fn handle_query_subscribe_reply(core: &Arc<ConnectionCore>, text: &str) {
    let reply: QuerySubscribeReply = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "malformed query subscribe reply");
            return;
        }
    };
    let Some(query) = core.queries.read().await.get(&reply.id).cloned() else {
        tracing::warn!(id = reply.id, "query subscribe reply for unknown query");
        return;
    };
    query.put(core, reply.data).await;
}

async fn handle_query_diff(core: &Arc<ConnectionCore>, text: &str) {
    let reply: QueryDiffReply = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "malformed query diff frame");
            return;
        }
    };
    let Some(query) = core.queries.read().await.get(&reply.id).cloned() else {
        tracing::warn!(id = reply.id, "query diff for unknown query");
        return;
    };
    query.sync(core, reply.diff).await;
}

async fn handle_operation_frame(core: &Arc<ConnectionCore>, text: &str) {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "malformed operation frame");
            return;
        }
    };
    let msg = match OperationMessage::decode(&value) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(error = %e, "malformed operation frame");
            return;
        }
    };
    let id = DocumentId { collection: msg.c.clone(), key: msg.d.clone() };
    let Some(doc) = core.documents.read().await.get(&id).cloned() else {
        tracing::warn!(collection = %id.collection, key = %id.key, "operation frame for unknown document");
        return;
    };
    let my_id = core.client_id().await;
    if my_id.as_deref() == Some(msg.src.as_str()) {
        doc.ack(msg.v, msg.seq).await;
    } else {
        doc.sync(msg.data, msg.v).await;
    }
}

async fn handle_error_frame(
    core: &Arc<ConnectionCore>,
    action: &str,
    error: crate::codec::ErrorBody,
    text: &str,
) {
    tracing::warn!(code = %error.code, message = %error.message, "server error frame");
    if action != "op" {
        return;
    }
    let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else { return };
    let (Some(c), Some(d)) = (
        value.get("c").and_then(|v| v.as_str()),
        value.get("d").and_then(|v| v.as_str()),
    ) else {
        return;
    };
    let id = DocumentId { collection: c.to_owned(), key: d.to_owned() };
    let Some(doc) = core.documents.read().await.get(&id).cloned() else { return };
    doc.handle_server_error(error.code).await;
}
