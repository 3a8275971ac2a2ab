// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The WebSocket transport is an external collaborator (spec §1): text frames, close
//! notifications, and a reconnect hook. This trait is the seam the connection actor
//! (`connection::actor`) drives against — [`TungsteniteTransport`] is the production
//! implementation; `tests/sharedb-specs` substitutes its own against a local listener.
//!
//! `run_loop` (in `actor.rs`) is generic over `T: WsTransport`, but that genericity
//! never leaks into the public [`crate::connection::Connection`] type: `tokio::spawn`
//! erases it into a plain `JoinHandle<()>` once the task is spawned.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::MaybeTlsStream;

use crate::error::ClientError;

/// An event surfaced by the transport while reading.
#[derive(Debug)]
pub enum WsEvent {
    Text(String),
    Closed,
}

/// Minimal surface a WebSocket connection must provide.
///
/// Spelled with explicit `-> impl Future<..> + Send` rather than `async fn` sugar: the
/// connection actor task is spawned onto `tokio::spawn`, which requires the whole future
/// (and therefore every future `.await`ed inside it) to be `Send`, and native
/// async-fn-in-trait does not add that bound on its own.
pub trait WsTransport: Send {
    fn send(&mut self, text: String) -> impl std::future::Future<Output = Result<(), ClientError>> + Send;
    fn recv(&mut self) -> impl std::future::Future<Output = Option<Result<WsEvent, ClientError>>> + Send;
}

type TungsteniteStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Production transport: a single `tokio-tungstenite` client connection.
pub struct TungsteniteTransport {
    stream: TungsteniteStream,
}

impl TungsteniteTransport {
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(TungsteniteTransport { stream })
    }
}

impl WsTransport for TungsteniteTransport {
    async fn send(&mut self, text: String) -> Result<(), ClientError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<WsEvent, ClientError>> {
        loop {
            return match self.stream.next().await {
                Some(Ok(Message::Text(text))) => Some(Ok(WsEvent::Text(text.to_string()))),
                Some(Ok(Message::Close(_))) => Some(Ok(WsEvent::Closed)),
                Some(Ok(_)) => continue, // ping/pong/binary ignored
                Some(Err(e)) => Some(Err(ClientError::Transport(e.to_string()))),
                None => None,
            };
        }
    }
}

/// A reconnect hook: builds a fresh transport for the same URL.
pub struct Reconnector {
    url: String,
}

impl Reconnector {
    pub fn new(url: impl Into<String>) -> Self {
        Reconnector { url: url.into() }
    }

    pub async fn reconnect(&self) -> Result<TungsteniteTransport, ClientError> {
        TungsteniteTransport::connect(&self.url).await
    }
}
