// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A scripted fake ShareDB server: a local `tokio-tungstenite` listener that accepts one
//! client connection and lets a test send/receive frames against it directly, driving
//! the real `sharedb-client` over an actual (loopback) WebSocket rather than a stub.

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

pub struct MockServer {
    listener: TcpListener,
    port: u16,
}

impl MockServer {
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        Ok(MockServer { listener, port })
    }

    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    /// Accept the single inbound connection a test's client will make.
    pub async fn accept(self) -> anyhow::Result<ServerSide> {
        let (stream, _addr) = self.listener.accept().await?;
        let ws = tokio_tungstenite::accept_async(stream).await?;
        Ok(ServerSide { ws })
    }
}

/// The server half of one accepted connection: send scripted frames, read whatever the
/// client wrote.
pub struct ServerSide {
    ws: WebSocketStream<TcpStream>,
}

impl ServerSide {
    pub async fn send_json(&mut self, value: Value) -> anyhow::Result<()> {
        self.ws.send(Message::Text(value.to_string().into())).await?;
        Ok(())
    }

    /// Read the next text frame from the client, decoded as JSON.
    pub async fn recv_json(&mut self) -> anyhow::Result<Value> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => return Ok(serde_json::from_str(&text)?),
                Some(Ok(_)) => continue,
                Some(Err(e)) => anyhow::bail!("websocket error: {e}"),
                None => anyhow::bail!("client closed the connection"),
            }
        }
    }

    /// Reply to the handshake the client sends on connect, assigning `client_id`.
    pub async fn handshake(&mut self, client_id: &str) -> anyhow::Result<()> {
        let hs = self.recv_json().await?;
        anyhow::ensure!(hs["a"] == "hs", "expected handshake frame, got {hs}");
        self.send_json(serde_json::json!({"a": "hs", "id": client_id})).await
    }
}
