//! Header subscription over the node's WebSocket JSON-RPC
//!
//! This module is only available on native targets.

use crate::{
    config::Config,
    header::RpcHeader,
    rpc_utils::{request, rpc_result},
    types::AppEvent,
};
use anyhow::{anyhow, Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc::UnboundedSender, watch};
use tokio_tungstenite::connect_async;
use tungstenite::protocol::Message;

/// A frame received on the subscription socket
#[derive(Debug)]
pub enum Frame {
    /// Reply to the subscribe call
    Subscribed(Value),
    /// Error reply to a call we made
    Rejected(String),
    Header(Box<RpcHeader>),
    Ignored,
}

pub fn parse_frame(text: &str) -> Result<Frame> {
    let v: Value = serde_json::from_str(text)?;
    if v.get("id").is_some() {
        return Ok(match rpc_result(v) {
            Ok(id) => Frame::Subscribed(id),
            Err(e) => Frame::Rejected(e.to_string()),
        });
    }
    match v.get("params").and_then(|p| p.get("result")) {
        Some(result) => {
            let header: RpcHeader =
                serde_json::from_value(result.clone()).context("decoding header notification")?;
            Ok(Frame::Header(Box::new(header)))
        }
        None => Ok(Frame::Ignored),
    }
}

pub async fn run_heads(
    cfg: &Config,
    tx: UnboundedSender<AppEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let (ws, _) = connect_async(&cfg.node_ws_url)
        .await
        .with_context(|| format!("connecting to {}", cfg.node_ws_url))?;
    let (mut ws_write, mut ws_read) = ws.split();

    let (subscribe, unsubscribe) = cfg.head_mode.methods();
    ws_write
        .send(Message::Text(request(subscribe, json!([])).to_string()))
        .await?;
    log::info!("{subscribe} sent to {}", cfg.node_ws_url);

    let mut subscription: Option<Value> = None;
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
                        log::warn!("header socket error: {e}");
                        break;
                    }
                    None => break,
                };
                if !msg.is_text() {
                    continue;
                }
                let text = msg.into_text().unwrap_or_default();
                match parse_frame(&text) {
                    Ok(Frame::Subscribed(id)) => {
                        log::debug!("subscription id {id}");
                        subscription = Some(id);
                    }
                    Ok(Frame::Header(rpc)) => match rpc.into_header() {
                        Ok(header) => {
                            if tx.send(AppEvent::NewHead(header)).is_err() {
                                break;
                            }
                        }
                        Err(e) => log::warn!("skipping header: {e:#}"),
                    },
                    // A rejected subscribe leaves nothing to read
                    Ok(Frame::Rejected(e)) if subscription.is_none() => {
                        return Err(anyhow!("{subscribe} failed: {e}"));
                    }
                    Ok(Frame::Rejected(e)) => log::warn!("node rejected a call: {e}"),
                    Ok(Frame::Ignored) => {}
                    Err(e) => log::warn!("bad frame on header socket: {e:#}"),
                }
            }
        }
    }

    if let Some(id) = subscription {
        let _ = ws_write
            .send(Message::Text(request(unsubscribe, json!([id])).to_string()))
            .await;
        log::debug!("{unsubscribe} sent");
    }
    let _ = ws_write.close().await;
    Ok(())
}
