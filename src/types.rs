use anyhow::{anyhow, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::digest::DigestLog;

/// 32-byte block hash, displayed and serialized as `0x`-prefixed hex
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BlockHash(pub [u8; 32]);

impl BlockHash {
    pub fn from_hex(s: &str) -> Result<Self> {
        Ok(BlockHash(decode_hex_array(s, "block hash")?))
    }

    /// Shortened form for narrow table columns: `0x1234…cdef`
    pub fn short(&self) -> String {
        let full = hex::encode(self.0);
        format!("0x{}…{}", &full[..4], &full[full.len() - 4..])
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({self})")
    }
}

impl Serialize for BlockHash {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for BlockHash {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        BlockHash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Validator identity (32-byte public key)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AuthorityId(pub [u8; 32]);

impl AuthorityId {
    pub fn short(&self) -> String {
        let full = hex::encode(self.0);
        format!("0x{}…{}", &full[..6], &full[full.len() - 6..])
    }
}

impl fmt::Display for AuthorityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for AuthorityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthorityId({})", self.short())
    }
}

impl Serialize for AuthorityId {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

/// Strip an optional `0x` prefix and decode into a fixed-size array
pub fn decode_hex_array<const N: usize>(s: &str, what: &str) -> Result<[u8; N]> {
    let bytes = decode_hex(s)?;
    bytes
        .try_into()
        .map_err(|v: Vec<u8>| anyhow!("{what} must be {N} bytes, got {}", v.len()))
}

pub fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|e| anyhow!("invalid hex '{s}': {e}"))
}

/// A block header as observed from the head subscription
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BlockHeader {
    pub number: u64,
    pub hash: BlockHash,
    pub parent_hash: BlockHash,
    pub digest: Vec<DigestLog>,
}

/// Authority set plus rotation length, as returned by the aux-data runtime call
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuxData {
    pub authorities: Vec<AuthorityId>,
    pub session_length: u64,
}

/// One raw runtime event, positioned by its index within the block's batch
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub section: String,
    pub method: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Full event list of one block, resolved to its height and hash
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EventBatch {
    pub block_number: u64,
    pub block_hash: BlockHash,
    pub records: Vec<RawEvent>,
}

/// Items flowing from the sources into the session
#[derive(Debug, Clone)]
pub enum AppEvent {
    NewHead(BlockHeader),
    AuxData(AuxData),
    AuxDataFailed(String),
    /// Points per authority in the current era
    EraPoints(Vec<(AuthorityId, u32)>),
    EraPointsFailed(String),
    Events(EventBatch),
    Quit,
}

/// Payloads pushed by the event relay socket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RelayPayload {
    #[serde(rename = "events")]
    Events {
        /// Hash of the block whose state produced these records
        at: BlockHash,
        records: Vec<RawEvent>,
    },
    #[serde(rename = "ping")]
    Ping,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_hash_hex_round_trip_through_display() {
        let h = BlockHash([0xab; 32]);
        let s = h.to_string();
        assert!(s.starts_with("0xabab"));
        assert_eq!(BlockHash::from_hex(&s).unwrap(), h);
        assert_eq!(h.short(), "0xabab…abab");
    }

    #[test]
    fn wrong_length_hash_is_rejected() {
        assert!(BlockHash::from_hex("0x1234").is_err());
        assert!(BlockHash::from_hex("zz").is_err());
    }

    #[test]
    fn relay_payload_parses_events() {
        let json = format!(
            r#"{{"type":"events","at":"{}","records":[{{"section":"balances","method":"Transfer","data":[1,2]}}]}}"#,
            BlockHash([1; 32])
        );
        let payload: RelayPayload = serde_json::from_str(&json).unwrap();
        match payload {
            RelayPayload::Events { at, records } => {
                assert_eq!(at, BlockHash([1; 32]));
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].method, "Transfer");
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
