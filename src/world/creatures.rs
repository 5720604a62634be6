use crate::config::CreatureIdRanges;
use crate::entities::creature::{Creature, CreatureHandle, CreatureId, CreatureKind};
use crate::net::error::DecodeError;
use std::collections::HashMap;

/// Identity cache for every creature the server has introduced on this
/// connection, keyed by the server-assigned id.
#[derive(Debug, Default)]
pub struct CreatureRegistry {
    ranges: CreatureIdRanges,
    creatures: HashMap<u32, CreatureHandle>,
    local_player: Option<CreatureHandle>,
}

impl CreatureRegistry {
    pub fn new(ranges: CreatureIdRanges) -> Self {
        Self {
            ranges,
            creatures: HashMap::new(),
            local_player: None,
        }
    }

    /// Creates the handle for the client's own character. It joins the cache
    /// only once the server introduces it on the map.
    pub fn set_local_player(&mut self, id: u32) -> CreatureHandle {
        let handle = CreatureHandle::new(Creature::new(
            CreatureId(id),
            String::new(),
            CreatureKind::LocalPlayer,
        ));
        self.local_player = Some(handle.clone());
        handle
    }

    pub fn local_player(&self) -> Option<&CreatureHandle> {
        self.local_player.as_ref()
    }

    pub fn is_local_player(&self, handle: &CreatureHandle) -> bool {
        self.local_player
            .as_ref()
            .map(|local| local.ptr_eq(handle))
            .unwrap_or(false)
    }

    pub fn get(&self, id: u32) -> Option<CreatureHandle> {
        self.creatures.get(&id).cloned()
    }

    pub fn resolve_known(&self, id: u32) -> Result<CreatureHandle, DecodeError> {
        self.get(id)
            .ok_or(DecodeError::UnresolvedCreatureReference(id))
    }

    pub fn remove(&mut self, id: u32) -> Option<CreatureHandle> {
        self.creatures.remove(&id)
    }

    pub fn classify(&self, id: u32) -> Result<CreatureKind, DecodeError> {
        let local_id = self.local_player.as_ref().map(|local| local.id().0);
        let ranges = &self.ranges;
        if local_id == Some(id) {
            Ok(CreatureKind::LocalPlayer)
        } else if (ranges.player_start..ranges.player_end).contains(&id) {
            Ok(CreatureKind::Player)
        } else if (ranges.monster_start..ranges.monster_end).contains(&id) {
            Ok(CreatureKind::Monster)
        } else if (ranges.npc_start..ranges.npc_end).contains(&id) {
            Ok(CreatureKind::Npc)
        } else {
            Err(DecodeError::InvalidCreatureIdRange(id))
        }
    }

    /// Registers a creature on its first full description. The local player
    /// reuses the handle created at game start.
    pub fn introduce(&mut self, id: u32, name: String) -> Result<CreatureHandle, DecodeError> {
        let kind = self.classify(id)?;
        let handle = match (kind, self.local_player.as_ref()) {
            (CreatureKind::LocalPlayer, Some(local)) => {
                local.borrow_mut().name = name;
                local.clone()
            }
            _ => CreatureHandle::new(Creature::new(CreatureId(id), name, kind)),
        };
        self.creatures.insert(id, handle.clone());
        Ok(handle)
    }

    /// Caches an existing handle under its own id without range checks.
    #[cfg(test)]
    pub(crate) fn register(&mut self, handle: CreatureHandle) {
        self.creatures.insert(handle.id().0, handle);
    }

    pub fn len(&self) -> usize {
        self.creatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.creatures.is_empty()
    }
}
