// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Black-box scenarios from spec §8, driven against the real client over a loopback
//! WebSocket served by a scripted fake ShareDB server.

use serde_json::{json, Value};

use sharedb_client::ClientConfig;
use sharedb_client::Connection;
use sharedb_specs::MockServer;

async fn dial(server: &MockServer) -> tokio::task::JoinHandle<Result<Connection, sharedb_client::ClientError>> {
    let mut config = ClientConfig::new(server.url());
    config.reconnect = false;
    tokio::spawn(Connection::connect(config))
}

#[tokio::test]
async fn handshake_then_subscribe_observes_snapshot() -> anyhow::Result<()> {
    let server = MockServer::bind().await?;
    let client_task = dial(&server).await;
    let mut server_side = server.accept().await?;
    server_side.handshake("c1").await?;
    let conn = client_task.await??;

    let doc = conn.subscribe_document::<Value>("examples", "counter").await?;

    let subscribe_frame = server_side.recv_json().await?;
    assert_eq!(subscribe_frame["a"], "s");
    assert_eq!(subscribe_frame["c"], "examples");
    assert_eq!(subscribe_frame["d"], "counter");

    server_side
        .send_json(json!({
            "a": "s", "c": "examples", "d": "counter",
            "data": {"v": 3, "data": {"numClicks": 5}}
        }))
        .await?;

    let mut watch = doc.watch();
    watch.changed().await?;
    let entity = doc.entity()?.expect("snapshot installed");
    assert_eq!(entity, json!({"numClicks": 5}));

    conn.sync_shutdown().await;
    Ok(())
}

#[tokio::test]
async fn local_increment_sends_update_and_acks() -> anyhow::Result<()> {
    let server = MockServer::bind().await?;
    let client_task = dial(&server).await;
    let mut server_side = server.accept().await?;
    server_side.handshake("c1").await?;
    let conn = client_task.await??;

    let doc = conn.subscribe_document::<Value>("examples", "counter").await?;
    server_side.recv_json().await?; // subscribe frame
    server_side
        .send_json(json!({
            "a": "s", "c": "examples", "d": "counter",
            "data": {"v": 3, "data": {"numClicks": 5}}
        }))
        .await?;
    doc.watch().changed().await?;

    doc.change(|root| root.get("numClicks").set(6)).await?;

    let op_frame = server_side.recv_json().await?;
    assert_eq!(op_frame["a"], "op");
    assert_eq!(op_frame["src"], "c1");
    assert_eq!(op_frame["seq"], 1);
    assert_eq!(op_frame["v"], 3);
    assert_eq!(op_frame["op"], json!([{"p": ["numClicks"], "oi": 6, "od": 5}]));
    assert_eq!(doc.entity()?.unwrap(), json!({"numClicks": 6}));

    // Ack: the server echoes the op back with our own clientID as `src`.
    server_side
        .send_json(json!({
            "a": "op", "c": "examples", "d": "counter",
            "src": "c1", "seq": 1, "v": 3,
            "op": [{"p": ["numClicks"], "oi": 6, "od": 5}]
        }))
        .await?;

    // Version only advances visibly through a later remote/local op; assert indirectly
    // by driving a second change and checking its stamped version is v+1.
    doc.change(|root| root.get("numClicks").set(7)).await?;
    let second = server_side.recv_json().await?;
    assert_eq!(second["v"], 4, "ack must have advanced the confirmed version to 4");

    conn.sync_shutdown().await;
    Ok(())
}

#[tokio::test]
async fn concurrent_remote_op_while_inflight_applies_then_ack_advances() -> anyhow::Result<()> {
    let server = MockServer::bind().await?;
    let client_task = dial(&server).await;
    let mut server_side = server.accept().await?;
    server_side.handshake("c1").await?;
    let conn = client_task.await??;

    let doc = conn.subscribe_document::<Value>("examples", "counter").await?;
    server_side.recv_json().await?;
    server_side
        .send_json(json!({
            "a": "s", "c": "examples", "d": "counter",
            "data": {"v": 3, "data": {"numClicks": 5}}
        }))
        .await?;
    doc.watch().changed().await?;

    doc.change(|root| root.get("numClicks").set(6)).await?;
    let sent = server_side.recv_json().await?;
    assert_eq!(sent["v"], 3);

    // A remote peer's op lands at v:3 before our ack does.
    server_side
        .send_json(json!({
            "a": "op", "c": "examples", "d": "counter",
            "src": "other-client", "seq": 1, "v": 3,
            "op": [{"p": ["numClicks"], "na": 2}]
        }))
        .await?;

    let mut watch = doc.watch();
    loop {
        watch.changed().await?;
        if doc.entity()?.unwrap() == json!({"numClicks": 8}) {
            break;
        }
    }

    server_side
        .send_json(json!({
            "a": "op", "c": "examples", "d": "counter",
            "src": "c1", "seq": 1, "v": 4,
            "op": [{"p": ["numClicks"], "oi": 6, "od": 5}]
        }))
        .await?;

    doc.change(|root| root.get("numClicks").add(1)).await?;
    let next = server_side.recv_json().await?;
    assert_eq!(next["v"], 5, "ack at v:4 must advance confirmed version to 5");

    conn.sync_shutdown().await;
    Ok(())
}

#[tokio::test]
async fn rejected_create_resumes_document() -> anyhow::Result<()> {
    let server = MockServer::bind().await?;
    let client_task = dial(&server).await;
    let mut server_side = server.accept().await?;
    server_side.handshake("c1").await?;
    let conn = client_task.await??;

    let doc = conn.get_document::<Value>("examples", "x").await?;
    // `create` only suspends for the outbound write (spec §5), not for the server's
    // reply, so this resolves before the rejection below is sent.
    doc.create(&json!({"numClicks": 0}), None).await?;

    let frame = server_side.recv_json().await?;
    assert_eq!(frame["a"], "op");
    assert!(frame["create"].is_object());
    server_side
        .send_json(json!({
            "a": "op", "c": "examples", "d": "x",
            "error": {"code": "ERR_DOC_ALREADY_CREATED", "message": "already exists"}
        }))
        .await?;

    // A later subscribe snapshot applies cleanly on top of the resumed document.
    server_side
        .send_json(json!({
            "a": "s", "c": "examples", "d": "x",
            "data": {"v": 7, "data": {"numClicks": 42}}
        }))
        .await?;
    let mut watch = doc.watch();
    loop {
        watch.changed().await?;
        if doc.entity()?.unwrap() == json!({"numClicks": 42}) {
            break;
        }
    }

    conn.sync_shutdown().await;
    Ok(())
}
