//! Round-robin block author resolution
//!
//! The author of a slot is picked by rotating through the authority set once
//! per session: `authorities[(slot / session_length) % len]`.

use anyhow::Result;
use parity_scale_codec::DecodeAll;

use crate::types::{AuthorityId, AuxData};

/// Expected author of `slot`, or `None` when the inputs can't name one
pub fn resolve<A>(slot: u64, authorities: &[A], session_length: u64) -> Option<&A> {
    if authorities.is_empty() || session_length == 0 {
        return None;
    }
    let virtual_step = slot / session_length;
    let index = virtual_step % authorities.len() as u64;
    authorities.get(index as usize)
}

/// Tunables applied on top of [`resolve`]
///
/// Deployments disagree on the slot granularity: some report slots that
/// advance in steps of 256 per block. `slot_step` divides the raw slot before
/// resolution. `session_length_override` replaces the runtime-reported value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeaderParams {
    pub slot_step: u64,
    pub session_length_override: Option<u64>,
}

impl Default for LeaderParams {
    fn default() -> Self {
        LeaderParams {
            slot_step: 1,
            session_length_override: None,
        }
    }
}

impl LeaderParams {
    pub fn session_length(&self, aux: &AuxData) -> u64 {
        self.session_length_override.unwrap_or(aux.session_length)
    }

    /// Rotation index the slot falls into, used to spot session boundaries
    pub fn virtual_step(&self, slot: u64, aux: &AuxData) -> Option<u64> {
        let session_length = self.session_length(aux);
        if self.slot_step == 0 || session_length == 0 {
            return None;
        }
        Some(slot / self.slot_step / session_length)
    }

    pub fn author<'a>(&self, slot: u64, aux: &'a AuxData) -> Option<&'a AuthorityId> {
        if self.slot_step == 0 {
            return None;
        }
        resolve(slot / self.slot_step, &aux.authorities, self.session_length(aux))
    }
}

impl AuxData {
    /// Decode the runtime call result: SCALE `(Vec<[u8; 32]>, u32)`
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (authorities, session_length) = <(Vec<[u8; 32]>, u32)>::decode_all(&mut &bytes[..])?;
        Ok(AuxData {
            authorities: authorities.into_iter().map(AuthorityId).collect(),
            session_length: u64::from(session_length),
        })
    }
}
