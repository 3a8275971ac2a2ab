// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A thin terminal front-end for `sharedb-client`: dials a ShareDB server, subscribes
//! to one document, prints each snapshot as it arrives, and — if a patch is piped in on
//! stdin — applies it as a sequence of top-level field sets. The interesting engineering
//! lives in the library; this binary is wiring, in the same spirit as the teacher's
//! `coopmux` entry point.

use std::io::Read;

use clap::Parser;
use serde_json::Value;
use sharedb_client::{ClientConfig, Connection};

/// Subscribe to a ShareDB document and print its snapshots as they change.
#[derive(Parser, Debug)]
#[command(name = "sharedb-cli")]
struct Cli {
    #[command(flatten)]
    config: ClientConfig,

    /// Collection the document lives in.
    #[arg(long)]
    collection: String,

    /// Document key within the collection.
    #[arg(long)]
    document: String,

    /// Apply the JSON object read from stdin as top-level field sets, then exit.
    #[arg(long)]
    patch: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let conn = Connection::connect(cli.config).await?;
    let doc = conn.subscribe_document::<Value>(cli.collection, cli.document).await?;

    if cli.patch {
        let mut input = String::new();
        std::io::stdin().read_to_string(&mut input)?;
        let patch: Value = serde_json::from_str(&input)?;
        let Value::Object(fields) = patch else {
            anyhow::bail!("patch must be a JSON object of top-level field sets");
        };
        for (key, value) in fields {
            doc.change(|root| root.get(key.as_str()).set(value.clone())).await?;
        }
        println!("{}", serde_json::to_string_pretty(&doc.entity()?)?);
        conn.sync_shutdown().await;
        return Ok(());
    }

    let mut watch = doc.watch();
    loop {
        let current = watch.borrow().clone();
        if let Some(json) = current {
            println!("{}", serde_json::to_string_pretty(&json.to_serde())?);
        }
        if watch.changed().await.is_err() {
            break;
        }
    }

    Ok(())
}
