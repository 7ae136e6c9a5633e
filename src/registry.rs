//! `CallInstanceRegistry` — maps local/peer call instance ids to channels.
//!
//! The original driver kept a pair of flat arrays indexed by instance id
//! (`VariantCC` in the spec's terms); we keep the same O(1) lookup shape
//! with typed errors instead of sentinel values.

use std::collections::HashMap;

use isdn_wire::{ChannelId, MAX_INSTID};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("local call instance ids exhausted (max {MAX_INSTID})")]
    IdsExhausted,
    #[error("peer instance id {0} is already bound to a different channel")]
    PeerIdCollision(u32),
    #[error("no channel registered for local instance id {0}")]
    UnknownLocalId(u32),
    #[error("no channel registered for peer instance id {0}")]
    UnknownPeerId(u32),
}

/// Per-span table of live call instance ids. One registry per span; ids are
/// span-local, never shared across spans.
#[derive(Debug, Default)]
pub struct CallInstanceRegistry {
    next_local: u32,
    local_to_chan: HashMap<u32, ChannelId>,
    peer_to_chan: HashMap<u32, ChannelId>,
}

impl CallInstanceRegistry {
    pub fn new() -> Self {
        Self {
            next_local: 1,
            local_to_chan: HashMap::new(),
            peer_to_chan: HashMap::new(),
        }
    }

    /// Allocate a fresh local call instance id bound to `chan_id`.
    ///
    /// Ids are handed out round-robin from `1..=MAX_INSTID`, skipping any
    /// still in use, matching the original driver's wraparound search.
    pub fn alloc_local(&mut self, chan_id: ChannelId) -> Result<u32, RegistryError> {
        let start = self.next_local;
        loop {
            let candidate = self.next_local;
            self.next_local = if self.next_local >= MAX_INSTID {
                1
            } else {
                self.next_local + 1
            };

            if !self.local_to_chan.contains_key(&candidate) {
                self.local_to_chan.insert(candidate, chan_id);
                return Ok(candidate);
            }
            if self.next_local == start {
                return Err(RegistryError::IdsExhausted);
            }
        }
    }

    /// Bind a peer-reported instance id to the channel holding `local_inst`.
    pub fn bind_peer(&mut self, peer_inst: u32, chan_id: ChannelId) -> Result<(), RegistryError> {
        if let Some(&existing) = self.peer_to_chan.get(&peer_inst) {
            if existing != chan_id {
                return Err(RegistryError::PeerIdCollision(peer_inst));
            }
            return Ok(());
        }
        self.peer_to_chan.insert(peer_inst, chan_id);
        Ok(())
    }

    pub fn find_by_local(&self, local_inst: u32) -> Result<ChannelId, RegistryError> {
        self.local_to_chan
            .get(&local_inst)
            .copied()
            .ok_or(RegistryError::UnknownLocalId(local_inst))
    }

    pub fn find_by_peer(&self, peer_inst: u32) -> Result<ChannelId, RegistryError> {
        self.peer_to_chan
            .get(&peer_inst)
            .copied()
            .ok_or(RegistryError::UnknownPeerId(peer_inst))
    }

    /// Release every entry associated with `local_inst` (and its bound peer
    /// id, if any). Matches `TransitionEffects::RELEASE_REGISTRY_ENTRIES`.
    pub fn release(&mut self, local_inst: u32, peer_inst: Option<u32>) {
        self.local_to_chan.remove(&local_inst);
        if let Some(peer_inst) = peer_inst {
            self.peer_to_chan.remove(&peer_inst);
        }
    }

    pub fn len(&self) -> usize {
        self.local_to_chan.len()
    }

    pub fn is_empty(&self) -> bool {
        self.local_to_chan.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_find_round_trip() {
        let mut reg = CallInstanceRegistry::new();
        let id = reg.alloc_local(3).unwrap();
        assert_eq!(reg.find_by_local(id).unwrap(), 3);
    }

    #[test]
    fn bind_peer_and_find() {
        let mut reg = CallInstanceRegistry::new();
        let id = reg.alloc_local(3).unwrap();
        reg.bind_peer(99, 3).unwrap();
        assert_eq!(reg.find_by_peer(99).unwrap(), 3);
        let _ = id;
    }

    #[test]
    fn peer_id_collision_is_rejected() {
        let mut reg = CallInstanceRegistry::new();
        reg.alloc_local(1).unwrap();
        reg.alloc_local(2).unwrap();
        reg.bind_peer(99, 1).unwrap();
        let err = reg.bind_peer(99, 2).unwrap_err();
        assert_eq!(err, RegistryError::PeerIdCollision(99));
    }

    #[test]
    fn release_forgets_both_mappings() {
        let mut reg = CallInstanceRegistry::new();
        let id = reg.alloc_local(1).unwrap();
        reg.bind_peer(50, 1).unwrap();
        reg.release(id, Some(50));
        assert!(reg.find_by_local(id).is_err());
        assert!(reg.find_by_peer(50).is_err());
    }

    #[test]
    fn ids_exhausted_when_every_slot_is_taken() {
        let mut reg = CallInstanceRegistry::new();
        for i in 0..MAX_INSTID {
            reg.alloc_local(i as ChannelId).unwrap();
        }
        let err = reg.alloc_local(0).unwrap_err();
        assert_eq!(err, RegistryError::IdsExhausted);
    }
}
