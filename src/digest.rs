//! Header digest logs and slot extraction
//!
//! A header carries consensus metadata as an ordered list of digest logs. The
//! slot lives in the pre-runtime log, whose payload layout depends on the
//! consensus engine that wrote it, so decoding is a strategy looked up by
//! engine id. A header whose engine we don't know simply has no slot.

use anyhow::Result;
use parity_scale_codec::{Decode, DecodeAll, Encode};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::types::BlockHeader;

/// Four-byte consensus engine identifier (`b"aura"`, `b"BABE"`, ...)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Encode, Decode)]
pub struct EngineId(pub [u8; 4]);

impl EngineId {
    pub const AURA: EngineId = EngineId(*b"aura");
    pub const BABE: EngineId = EngineId(*b"BABE");
}

impl fmt::Debug for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "{s}"),
            Err(_) => write!(f, "0x{}", hex::encode(self.0)),
        }
    }
}

/// One digest item, SCALE-encoded with the item kind as the variant index
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Encode, Decode)]
pub enum DigestLog {
    #[codec(index = 6)]
    PreRuntime { engine: EngineId, data: Vec<u8> },
    #[codec(index = 4)]
    Consensus { engine: EngineId, data: Vec<u8> },
    #[codec(index = 5)]
    Seal { engine: EngineId, data: Vec<u8> },
    #[codec(index = 8)]
    RuntimeEnvironmentUpdated,
    #[codec(index = 0)]
    Other(Vec<u8>),
}

impl DigestLog {
    /// Decode one item (the hex strings in `digest.logs`), rejecting trailing bytes
    pub fn from_scale(bytes: &[u8]) -> Result<Self> {
        Ok(DigestLog::decode_all(&mut &bytes[..])?)
    }
}

/// Engine-specific decoding of a pre-runtime payload into a slot number
pub trait SlotDecoder: Send + Sync {
    fn decode_slot(&self, payload: &[u8]) -> Option<u64>;
}

fn u64_le_at(payload: &[u8], offset: usize) -> Option<u64> {
    let b = payload.get(offset..offset + 8)?;
    Some(u64::from_le_bytes(b.try_into().ok()?))
}

/// Aura: the payload is the slot, u64 little endian
pub struct AuraSlot;

impl SlotDecoder for AuraSlot {
    fn decode_slot(&self, payload: &[u8]) -> Option<u64> {
        if payload.len() != 8 {
            return None;
        }
        u64_le_at(payload, 0)
    }
}

/// BABE: variant byte, u32 authority index, then the u64 slot
pub struct BabeSlot;

impl SlotDecoder for BabeSlot {
    fn decode_slot(&self, payload: &[u8]) -> Option<u64> {
        match payload.first()? {
            // primary, secondary plain, secondary VRF
            1..=3 => u64_le_at(payload, 5),
            _ => None,
        }
    }
}

/// Reads the first 8 bytes of any payload as a u64 slot.
/// Used as the catch-all for engines without a registered decoder.
pub struct LeadingU64Slot;

impl SlotDecoder for LeadingU64Slot {
    fn decode_slot(&self, payload: &[u8]) -> Option<u64> {
        u64_le_at(payload, 0)
    }
}

pub struct DigestDecoder {
    strategies: HashMap<EngineId, Box<dyn SlotDecoder>>,
    fallback: Option<Box<dyn SlotDecoder>>,
}

impl Default for DigestDecoder {
    fn default() -> Self {
        let mut d = DigestDecoder::empty();
        d.register(EngineId::AURA, Box::new(AuraSlot));
        d.register(EngineId::BABE, Box::new(BabeSlot));
        d
    }
}

impl DigestDecoder {
    pub fn empty() -> Self {
        DigestDecoder {
            strategies: HashMap::new(),
            fallback: None,
        }
    }

    pub fn register(&mut self, engine: EngineId, decoder: Box<dyn SlotDecoder>) {
        self.strategies.insert(engine, decoder);
    }

    pub fn with_fallback(mut self, decoder: Box<dyn SlotDecoder>) -> Self {
        self.fallback = Some(decoder);
        self
    }

    /// Slot of the first pre-runtime log, if its engine can be decoded
    pub fn slot(&self, header: &BlockHeader) -> Option<u64> {
        let (engine, data) = header.digest.iter().find_map(|log| match log {
            DigestLog::PreRuntime { engine, data } => Some((engine, data)),
            _ => None,
        })?;
        match self.strategies.get(engine) {
            Some(decoder) => decoder.decode_slot(data),
            None => self.fallback.as_ref()?.decode_slot(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BlockHash;

    fn header(digest: Vec<DigestLog>) -> BlockHeader {
        BlockHeader {
            number: 1,
            hash: BlockHash::default(),
            parent_hash: BlockHash::default(),
            digest,
        }
    }

    fn babe_primary(slot: u64) -> Vec<u8> {
        let mut p = vec![1u8];
        p.extend_from_slice(&7u32.to_le_bytes());
        p.extend_from_slice(&slot.to_le_bytes());
        p.extend_from_slice(&[0u8; 64]);
        p
    }

    #[test]
    fn aura_slot_from_first_pre_runtime_log() {
        let h = header(vec![
            DigestLog::Seal { engine: EngineId::AURA, data: vec![9; 64] },
            DigestLog::PreRuntime { engine: EngineId::AURA, data: 42u64.to_le_bytes().to_vec() },
            DigestLog::PreRuntime { engine: EngineId::AURA, data: 99u64.to_le_bytes().to_vec() },
        ]);
        assert_eq!(DigestDecoder::default().slot(&h), Some(42));
    }

    #[test]
    fn babe_slot_skips_variant_and_authority_index() {
        let h = header(vec![DigestLog::PreRuntime {
            engine: EngineId::BABE,
            data: babe_primary(123_456),
        }]);
        assert_eq!(DigestDecoder::default().slot(&h), Some(123_456));
    }

    #[test]
    fn no_pre_runtime_log_means_no_slot() {
        let h = header(vec![DigestLog::Other(vec![1, 2, 3])]);
        assert_eq!(DigestDecoder::default().slot(&h), None);
        assert_eq!(DigestDecoder::default().slot(&header(vec![])), None);
    }

    #[test]
    fn unknown_engine_needs_fallback() {
        let h = header(vec![DigestLog::PreRuntime {
            engine: EngineId(*b"spin"),
            data: 77u64.to_le_bytes().to_vec(),
        }]);
        assert_eq!(DigestDecoder::default().slot(&h), None);
        let d = DigestDecoder::default().with_fallback(Box::new(LeadingU64Slot));
        assert_eq!(d.slot(&h), Some(77));
    }

    #[test]
    fn malformed_payload_is_a_miss() {
        let h = header(vec![DigestLog::PreRuntime { engine: EngineId::AURA, data: vec![1, 2, 3] }]);
        assert_eq!(DigestDecoder::default().slot(&h), None);
    }

    #[test]
    fn digest_item_decodes_from_scale() {
        // 0x06 'aura' compact(8)=0x20 then the slot
        let mut bytes = vec![6u8];
        bytes.extend_from_slice(b"aura");
        bytes.push(0x20);
        bytes.extend_from_slice(&5u64.to_le_bytes());
        let log = DigestLog::from_scale(&bytes).unwrap();
        assert_eq!(
            log,
            DigestLog::PreRuntime { engine: EngineId::AURA, data: 5u64.to_le_bytes().to_vec() }
        );
        assert_eq!(log.encode(), bytes);

        bytes.push(0);
        assert!(DigestLog::from_scale(&bytes).is_err());
        assert!(DigestLog::from_scale(&[7]).is_err());
        assert_eq!(DigestLog::from_scale(&[8]).unwrap(), DigestLog::RuntimeEnvironmentUpdated);
    }
}
