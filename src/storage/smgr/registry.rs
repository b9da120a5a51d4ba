use std::collections::HashMap;

use anyhow::{bail, Result};

use crate::{
    errors::Error,
    relation::{fork::NUM_FORKS, ForkNumber, RelationLocatorBackend},
    storage::{BlockNumber, INVALID_BLOCK_NUMBER},
};

use super::{backend::SmgrWhich, unpinned::UnpinnedList};

/// Reference to a storage manager relation handle.
///
/// The handle data is owned by the registry; this is only an index into it.
/// A reference stays valid until the handle is destroyed, after that every
/// operation that receives it fails with [Error::StaleHandle], even if a new
/// handle was created on the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SMgrRelation {
    slot: u32,
    generation: u32,
}

/// Storage manager state of an open relation.
#[derive(Debug)]
pub struct SMgrRelationData {
    /// Relation physical identifier, the registry key.
    pub(crate) rlocator: RelationLocatorBackend,

    /// Dispatch table entry governing this relation.
    pub(crate) which: SmgrWhich,

    /// Last known size of each fork, or [INVALID_BLOCK_NUMBER] when unknown.
    pub(crate) cached_nblocks: [BlockNumber; NUM_FORKS],

    /// Current insertion target block, or [INVALID_BLOCK_NUMBER].
    pub(crate) targblock: BlockNumber,

    pub(crate) pincount: u32,
}

impl SMgrRelationData {
    pub(crate) fn new(rlocator: RelationLocatorBackend, which: SmgrWhich) -> Self {
        Self {
            rlocator,
            which,
            cached_nblocks: [INVALID_BLOCK_NUMBER; NUM_FORKS],
            targblock: INVALID_BLOCK_NUMBER,
            pincount: 0,
        }
    }

    pub fn rlocator(&self) -> RelationLocatorBackend {
        self.rlocator
    }

    pub fn which(&self) -> SmgrWhich {
        self.which
    }

    /// Temporary relations are never synced to durable storage.
    pub fn is_temp(&self) -> bool {
        self.rlocator.is_temp()
    }

    pub fn pincount(&self) -> u32 {
        self.pincount
    }

    /// Raw cached size of a fork. Only a hint, see
    /// [nblocks_cached](super::StorageManager::nblocks_cached).
    pub fn cached_nblocks(&self, fork: ForkNumber) -> BlockNumber {
        self.cached_nblocks[fork.index()]
    }

    pub fn targblock(&self) -> BlockNumber {
        self.targblock
    }

    /// Forget every cached fork size and the target block.
    pub(crate) fn reset_cache(&mut self) {
        self.cached_nblocks = [INVALID_BLOCK_NUMBER; NUM_FORKS];
        self.targblock = INVALID_BLOCK_NUMBER;
    }
}

struct Slot {
    generation: u32,
    data: Option<SMgrRelationData>,
}

/// Relation handle registry.
///
/// Handles live on an arena of slots; a hash map enforces that there is at
/// most one handle per relation locator and the unpinned list tracks the
/// handles with a pin count of 0. Pin and unpin are only done here so that
/// list membership always matches the pin count.
pub(crate) struct Registry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    map: HashMap<RelationLocatorBackend, SMgrRelation>,
    unpinned: UnpinnedList,
}

impl Registry {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            map: HashMap::with_capacity(capacity),
            unpinned: UnpinnedList::new(capacity),
        }
    }

    pub fn lookup(&self, rlocator: &RelationLocatorBackend) -> Option<SMgrRelation> {
        self.map.get(rlocator).copied()
    }

    /// Create a new unpinned handle. The locator must not be registered yet.
    pub fn insert(&mut self, rlocator: RelationLocatorBackend, which: SmgrWhich) -> SMgrRelation {
        debug_assert!(!self.map.contains_key(&rlocator));

        let data = SMgrRelationData::new(rlocator, which);
        let reln = match self.free.pop() {
            Some(slot) => {
                let entry = &mut self.slots[slot as usize];
                entry.data = Some(data);
                SMgrRelation {
                    slot,
                    generation: entry.generation,
                }
            }
            None => {
                let slot = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    data: Some(data),
                });
                SMgrRelation {
                    slot,
                    generation: 0,
                }
            }
        };

        self.map.insert(rlocator, reln);
        self.unpinned.unpin(reln.slot);
        reln
    }

    pub fn get(&self, reln: SMgrRelation) -> Result<&SMgrRelationData> {
        match self.slots.get(reln.slot as usize) {
            Some(Slot {
                generation,
                data: Some(data),
            }) if *generation == reln.generation => Ok(data),
            _ => bail!(Error::StaleHandle),
        }
    }

    pub fn get_mut(&mut self, reln: SMgrRelation) -> Result<&mut SMgrRelationData> {
        match self.slots.get_mut(reln.slot as usize) {
            Some(Slot {
                generation,
                data: Some(data),
            }) if *generation == reln.generation => Ok(data),
            _ => bail!(Error::StaleHandle),
        }
    }

    pub fn pin(&mut self, reln: SMgrRelation) -> Result<()> {
        let data = self.get_mut(reln)?;
        data.pincount += 1;
        if data.pincount == 1 {
            self.unpinned.pin(reln.slot);
        }
        Ok(())
    }

    pub fn unpin(&mut self, reln: SMgrRelation) -> Result<()> {
        let data = self.get_mut(reln)?;
        if data.pincount == 0 {
            bail!(Error::NotPinned(data.rlocator));
        }
        data.pincount -= 1;
        if data.pincount == 0 {
            self.unpinned.unpin(reln.slot);
        }
        Ok(())
    }

    pub fn is_unpinned(&self, reln: SMgrRelation) -> bool {
        self.get(reln).is_ok() && self.unpinned.contains(reln.slot)
    }

    /// Remove an unpinned handle from the unpinned list, the map and the
    /// arena, returning its data.
    pub fn remove(&mut self, reln: SMgrRelation) -> Result<SMgrRelationData> {
        let rlocator = {
            let data = self.get(reln)?;
            if data.pincount > 0 {
                bail!(Error::RegistryCorrupted);
            }
            data.rlocator
        };

        if !self.unpinned.pin(reln.slot) {
            bail!(Error::RegistryCorrupted);
        }
        match self.map.remove(&rlocator) {
            Some(found) if found == reln => {}
            _ => bail!(Error::RegistryCorrupted),
        }

        let slot = &mut self.slots[reln.slot as usize];
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(reln.slot);
        slot.data.take().ok_or_else(|| Error::RegistryCorrupted.into())
    }

    /// Every registered handle, pinned or not.
    pub fn handles(&self) -> Vec<SMgrRelation> {
        self.map.values().copied().collect()
    }

    /// Handles with a pin count of 0, in the order they became unpinned.
    pub fn unpinned(&self) -> Result<Vec<SMgrRelation>> {
        self.unpinned
            .slots()
            .into_iter()
            .map(|slot| match self.slots.get(slot as usize) {
                Some(Slot {
                    generation,
                    data: Some(_),
                }) => Ok(SMgrRelation {
                    slot,
                    generation: *generation,
                }),
                _ => bail!(Error::RegistryCorrupted),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn unpinned_len(&self) -> usize {
        self.unpinned.size()
    }
}
