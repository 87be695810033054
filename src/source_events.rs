//! Event relay feed
//!
//! The relay pushes already-decoded event lists tagged with the block hash
//! they belong to. Each list is paired with its height through a header
//! lookup before it reaches the session. Lookups run one at a time so
//! batches are delivered in relay order.

use crate::{
    runtime::{resolve_batch, ChainRuntime},
    types::{AppEvent, RelayPayload},
};
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc::UnboundedSender, watch};
use tokio_tungstenite::connect_async;
use tungstenite::protocol::Message;

pub async fn run_events(
    url: &str,
    runtime: &dyn ChainRuntime,
    tx: UnboundedSender<AppEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let (ws, _) = connect_async(url)
        .await
        .with_context(|| format!("connecting to {url}"))?;
    let (mut ws_write, mut ws_read) = ws.split();
    log::info!("event relay connected: {url}");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            msg = ws_read.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        log::warn!("event relay error: {e}");
                        break;
                    }
                    None => break,
                };
                if !msg.is_text() {
                    continue;
                }
                let text = msg.into_text().unwrap_or_default();
                let payload = match serde_json::from_str::<RelayPayload>(&text) {
                    Ok(p) => p,
                    Err(e) => {
                        log::debug!("ignoring relay frame: {e}");
                        continue;
                    }
                };
                match payload {
                    RelayPayload::Events { at, records } => {
                        match resolve_batch(runtime, at, records).await {
                            Ok(batch) => {
                                if tx.send(AppEvent::Events(batch)).is_err() {
                                    break;
                                }
                            }
                            Err(e) => log::warn!("dropping events for {at}: {e:#}"),
                        }
                    }
                    RelayPayload::Ping => {}
                }
            }
        }
    }

    let _ = ws_write.close().await;
    Ok(())
}
