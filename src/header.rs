//! JSON-RPC header objects
//!
//! Subscriptions deliver headers without their hash, with the number as a hex
//! string and each digest log as hex-encoded SCALE. The hash is recomputed as
//! blake2b-256 over the SCALE encoding of the header.

use anyhow::{anyhow, Context, Result};
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use parity_scale_codec::{Compact, Encode};
use serde::Deserialize;

use crate::digest::DigestLog;
use crate::types::{decode_hex, BlockHash, BlockHeader};

type Blake2b256 = Blake2b<U32>;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcHeader {
    pub parent_hash: BlockHash,
    pub number: String,
    pub state_root: BlockHash,
    pub extrinsics_root: BlockHash,
    pub digest: RpcDigest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcDigest {
    pub logs: Vec<String>,
}

/// Block numbers arrive as `0x`-prefixed hex, occasionally as decimal
pub fn parse_number(s: &str) -> Result<u64> {
    match s.strip_prefix("0x") {
        Some(h) => u64::from_str_radix(h, 16).map_err(|e| anyhow!("bad block number '{s}': {e}")),
        None => s.parse().map_err(|e| anyhow!("bad block number '{s}': {e}")),
    }
}

impl RpcHeader {
    pub fn into_header(self) -> Result<BlockHeader> {
        let number = parse_number(&self.number)?;
        let raw_logs = self
            .digest
            .logs
            .iter()
            .map(|l| decode_hex(l))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("digest of #{number}"))?;

        let mut encoded = Vec::with_capacity(128 + raw_logs.iter().map(Vec::len).sum::<usize>());
        encoded.extend_from_slice(&self.parent_hash.0);
        Compact(number).encode_to(&mut encoded);
        encoded.extend_from_slice(&self.state_root.0);
        encoded.extend_from_slice(&self.extrinsics_root.0);
        Compact(raw_logs.len() as u64).encode_to(&mut encoded);
        for raw in &raw_logs {
            encoded.extend_from_slice(raw);
        }

        // The hash covers the raw bytes; an item we can't read is kept opaque
        let digest = raw_logs
            .into_iter()
            .map(|raw| {
                DigestLog::from_scale(&raw).unwrap_or_else(|e| {
                    log::debug!("opaque digest item in #{number}: {e}");
                    DigestLog::Other(raw)
                })
            })
            .collect();

        Ok(BlockHeader {
            number,
            hash: blake2_256(&encoded),
            parent_hash: self.parent_hash,
            digest,
        })
    }
}

pub fn blake2_256(data: &[u8]) -> BlockHash {
    let out = Blake2b256::digest(data);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&out);
    BlockHash(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::EngineId;

    fn sample_json() -> serde_json::Value {
        serde_json::json!({
            "parentHash": format!("0x{}", "11".repeat(32)),
            "number": "0x1b4",
            "stateRoot": format!("0x{}", "22".repeat(32)),
            "extrinsicsRoot": format!("0x{}", "33".repeat(32)),
            "digest": { "logs": [
                // PreRuntime aura, slot 0x0102
                "0x0661757261200201000000000000",
                // Seal aura, 4 opaque bytes
                "0x05617572611001020304"
            ]}
        })
    }

    #[test]
    fn parses_number_and_digest() {
        let rpc: RpcHeader = serde_json::from_value(sample_json()).unwrap();
        let h = rpc.into_header().unwrap();
        assert_eq!(h.number, 436);
        assert_eq!(h.parent_hash, BlockHash([0x11; 32]));
        assert_eq!(
            h.digest[0],
            DigestLog::PreRuntime { engine: EngineId::AURA, data: 0x0102u64.to_le_bytes().to_vec() }
        );
        assert!(matches!(h.digest[1], DigestLog::Seal { .. }));
    }

    #[test]
    fn hash_changes_with_digest() {
        let base: RpcHeader = serde_json::from_value(sample_json()).unwrap();
        let h1 = base.clone().into_header().unwrap().hash;
        assert_eq!(h1, base.clone().into_header().unwrap().hash);

        let mut other = base;
        other.digest.logs.pop();
        assert_ne!(h1, other.into_header().unwrap().hash);
    }

    #[test]
    fn unreadable_digest_item_keeps_the_header() {
        let mut json = sample_json();
        json["digest"]["logs"][1] = "0x0104deadbeef".into();
        let rpc: RpcHeader = serde_json::from_value(json).unwrap();
        let h = rpc.into_header().unwrap();
        assert_eq!(h.digest[1], DigestLog::Other(vec![0x01, 0x04, 0xde, 0xad, 0xbe, 0xef]));
        assert_eq!(crate::digest::DigestDecoder::default().slot(&h), Some(0x0102));
    }

    #[test]
    fn number_formats() {
        assert_eq!(parse_number("0x10").unwrap(), 16);
        assert_eq!(parse_number("42").unwrap(), 42);
        assert!(parse_number("0xzz").is_err());
    }

    #[test]
    fn blake2_256_of_empty_input() {
        assert_eq!(
            blake2_256(&[]).to_string(),
            "0x0e5751c026e543b2e8ab2eb06099daa1d1e5df47778f7787faab45cdf12fe3a8"
        );
    }
}
