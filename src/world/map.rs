use crate::entities::creature::CreatureHandle;
use crate::net::error::DecodeError;
use crate::net::events::{CreatureField, GameEvent, Thing, WorldSink};
use crate::world::position::Position;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tile {
    pub things: Vec<Thing>,
}

impl Tile {
    pub fn creature_index(&self, creature: &CreatureHandle) -> Option<usize> {
        self.things.iter().position(|thing| {
            thing
                .as_creature()
                .map(|handle| handle.ptr_eq(creature))
                .unwrap_or(false)
        })
    }
}

/// Client-side copy of the tiles the server has streamed, plus a journal of
/// every non-tile notification.
#[derive(Debug, Default)]
pub struct MapMirror {
    tiles: HashMap<Position, Tile>,
    center: Option<Position>,
    pub cleared: Vec<Position>,
    /// Stack positions as reported by the decoder, before clamping.
    pub added: Vec<(Position, u8)>,
    pub updates: Vec<(u32, CreatureField)>,
    pub evicted: Vec<u32>,
    pub events: Vec<GameEvent>,
    pub aborts: Vec<(u8, DecodeError)>,
}

impl MapMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn center(&self) -> Option<Position> {
        self.center
    }

    pub fn tile(&self, position: Position) -> Option<&Tile> {
        self.tiles.get(&position)
    }

    pub fn things(&self, position: Position) -> Vec<Thing> {
        self.tiles
            .get(&position)
            .map(|tile| tile.things.clone())
            .unwrap_or_default()
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn thing_count(&self) -> usize {
        self.tiles.values().map(|tile| tile.things.len()).sum()
    }

    pub fn creature_count(&self) -> usize {
        self.tiles
            .values()
            .flat_map(|tile| tile.things.iter())
            .filter(|thing| thing.as_creature().is_some())
            .count()
    }

    /// Drops journal entries while keeping the tiles.
    pub fn clear_journal(&mut self) {
        self.cleared.clear();
        self.added.clear();
        self.updates.clear();
        self.evicted.clear();
        self.events.clear();
        self.aborts.clear();
    }
}

impl WorldSink for MapMirror {
    fn tile_cleared(&mut self, position: Position) {
        self.tiles.remove(&position);
        self.cleared.push(position);
    }

    fn thing_added(&mut self, position: Position, thing: Thing, stack_pos: u8) {
        self.added.push((position, stack_pos));
        let tile = self.tiles.entry(position).or_default();
        let index = usize::from(stack_pos).min(tile.things.len());
        tile.things.insert(index, thing);
    }

    fn thing_removed(&mut self, position: Position, stack_pos: u8) -> bool {
        let Some(tile) = self.tiles.get_mut(&position) else {
            return false;
        };
        let index = usize::from(stack_pos);
        if index >= tile.things.len() {
            return false;
        }
        tile.things.remove(index);
        if tile.things.is_empty() {
            self.tiles.remove(&position);
        }
        true
    }

    fn thing_at(&self, position: Position, stack_pos: u8) -> Option<Thing> {
        self.tiles
            .get(&position)
            .and_then(|tile| tile.things.get(usize::from(stack_pos)))
            .cloned()
    }

    fn creature_moved(&mut self, creature: &CreatureHandle, from: Position, to: Position) {
        let removed = match self.tiles.get_mut(&from) {
            Some(tile) => match tile.creature_index(creature) {
                Some(index) => {
                    tile.things.remove(index);
                    true
                }
                None => false,
            },
            None => false,
        };
        if !removed {
            tracing::warn!(creature_id = creature.id().0, %from, "moved creature missing from tile");
        }
        self.tiles
            .entry(to)
            .or_default()
            .things
            .push(Thing::Creature(creature.clone()));
    }

    fn creature_updated(&mut self, creature_id: u32, field: CreatureField) {
        self.updates.push((creature_id, field));
    }

    fn creature_evicted(&mut self, creature_id: u32) {
        self.evicted.push(creature_id);
    }

    fn window_recentered(&mut self, center: Position) {
        self.center = Some(center);
    }

    fn decode_aborted(&mut self, opcode: u8, error: &DecodeError) {
        self.aborts.push((opcode, error.clone()));
    }

    fn game_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }
}
