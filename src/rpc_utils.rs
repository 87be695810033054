use crate::constants::rpc::REQUEST_ID;
use crate::header::RpcHeader;
use crate::types::{decode_hex, AuthorityId, AuxData, BlockHash, BlockHeader};
use anyhow::{anyhow, Context, Result};
use parity_scale_codec::DecodeAll;
use serde_json::{json, Value};
use std::sync::OnceLock;
use tokio::time::{sleep, Duration};

static HTTP: OnceLock<reqwest::Client> = OnceLock::new();

fn http_client() -> &'static reqwest::Client {
    HTTP.get_or_init(|| {
        reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .tcp_nodelay(true)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("falling back to default HTTP client: {e}");
                reqwest::Client::new()
            })
    })
}

pub fn request(method: &str, params: Value) -> Value {
    json!({"jsonrpc":"2.0","id":REQUEST_ID,"method":method,"params":params})
}

pub async fn rpc_post(url: &str, body: &Value, timeout_ms: u64) -> Result<Value> {
    // Small, bounded retry on transient HTTP failures
    let mut attempt = 0u32;
    loop {
        let res = http_client()
            .post(url)
            .json(body)
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await?;
        if res.status().is_success() {
            let v: Value = res.json().await?;
            return rpc_result(v);
        }
        // Retry only on transient statuses
        if matches!(res.status().as_u16(), 429 | 500 | 502 | 503 | 504) && attempt < 2 {
            attempt += 1;
            log::debug!("http {} from {url}, retry {attempt}", res.status());
            sleep(Duration::from_millis(150 * attempt as u64)).await;
            continue;
        }
        return Err(anyhow!("http {}", res.status()));
    }
}

/// Unwrap a JSON-RPC response envelope into its `result`
pub fn rpc_result(v: Value) -> Result<Value> {
    if let Some(err) = v.get("error") {
        let code = err.get("code").and_then(|c| c.as_i64()).unwrap_or_default();
        let msg = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("rpc error");
        return Err(anyhow!("rpc {code} {msg}"));
    }
    match v.get("result") {
        Some(r) => Ok(r.clone()),
        None => Err(anyhow!("invalid rpc payload (no result)")),
    }
}

/// Header by hash: the companion lookup for event batches
pub async fn get_header(url: &str, hash: &BlockHash, timeout_ms: u64) -> Result<BlockHeader> {
    let v = rpc_post(
        url,
        &request("chain_getHeader", json!([hash.to_string()])),
        timeout_ms,
    )
    .await?;
    if v.is_null() {
        return Err(anyhow!("unknown block {hash}"));
    }
    let rpc: RpcHeader = serde_json::from_value(v).context("decoding chain_getHeader result")?;
    let header = rpc.into_header()?;
    if header.hash != *hash {
        log::warn!("header lookup for {hash} hashed to {}", header.hash);
    }
    Ok(BlockHeader {
        hash: *hash,
        ..header
    })
}

/// Runtime API call; returns the raw SCALE bytes of the result
pub async fn state_call(url: &str, method: &str, data: &[u8], timeout_ms: u64) -> Result<Vec<u8>> {
    let v = rpc_post(
        url,
        &request("state_call", json!([method, format!("0x{}", hex::encode(data))])),
        timeout_ms,
    )
    .await?;
    let s = v
        .as_str()
        .ok_or_else(|| anyhow!("state_call {method}: expected hex string, got {v}"))?;
    decode_hex(s)
}

pub async fn fetch_aux_data(url: &str, method: &str, timeout_ms: u64) -> Result<AuxData> {
    let raw = state_call(url, method, &[], timeout_ms).await?;
    AuxData::decode(&raw).with_context(|| format!("decoding {method} result"))
}

/// Decode a SCALE `Vec<([u8; 32], u32)>` points table
pub fn decode_era_points(raw: &[u8]) -> Result<Vec<(AuthorityId, u32)>> {
    let entries = <Vec<([u8; 32], u32)>>::decode_all(&mut &raw[..])?;
    Ok(entries
        .into_iter()
        .map(|(id, points)| (AuthorityId(id), points))
        .collect())
}

pub async fn fetch_era_points(
    url: &str,
    method: &str,
    timeout_ms: u64,
) -> Result<Vec<(AuthorityId, u32)>> {
    let raw = state_call(url, method, &[], timeout_ms).await?;
    decode_era_points(&raw).with_context(|| format!("decoding {method} result"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_envelope() {
        let r = request("chain_getHeader", json!(["0x00"]));
        assert_eq!(r["jsonrpc"], "2.0");
        assert_eq!(r["id"], REQUEST_ID);
        assert_eq!(r["method"], "chain_getHeader");
        assert_eq!(r["params"][0], "0x00");
    }

    #[test]
    fn era_points_table_decodes() {
        use parity_scale_codec::Encode;
        let raw = vec![([1u8; 32], 20u32), ([2u8; 32], 7u32)].encode();
        assert_eq!(
            decode_era_points(&raw).unwrap(),
            vec![(AuthorityId([1; 32]), 20), (AuthorityId([2; 32]), 7)]
        );
        assert!(decode_era_points(&raw[..raw.len() - 1]).is_err());
    }

    #[test]
    fn result_and_error_envelopes() {
        assert_eq!(rpc_result(json!({"result": 5})).unwrap(), json!(5));
        let err = rpc_result(json!({"error": {"code": -32601, "message": "Method not found"}}))
            .unwrap_err();
        assert_eq!(err.to_string(), "rpc -32601 Method not found");
        assert!(rpc_result(json!({"id": 1})).is_err());
    }
}
