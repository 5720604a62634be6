use crate::entities::creature::{CreatureHandle, Light, Outfit, EFFECT_OUTFIT_ID};
use crate::entities::item::{Item, ItemTypeId};
use crate::net::error::DecodeError;
use crate::net::events::{CreatureField, Thing, WorldSink};
use crate::net::packet::PacketReader;
use crate::world::creatures::CreatureRegistry;
use crate::world::item_types::ItemTypeIndex;
use crate::world::position::Direction;
use crate::world::tasks::{DeferredTask, TaskQueue};

pub const CREATURE_MARKER_NEW: u16 = 0x0061;
pub const CREATURE_MARKER_KNOWN: u16 = 0x0062;
pub const CREATURE_MARKER_TURN: u16 = 0x0063;

/// Outcome of decoding one thing slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedThing {
    Thing(Thing),
    /// The slot carried a creature turn instead of a thing.
    Turned { creature_id: u32 },
    /// The bytes were consumed but the creature could not be resolved.
    Skipped(DecodeError),
}

#[derive(Debug, Clone, Copy)]
pub struct ItemCodec<'a> {
    item_types: Option<&'a ItemTypeIndex>,
}

impl<'a> ItemCodec<'a> {
    pub fn new(item_types: Option<&'a ItemTypeIndex>) -> Self {
        Self { item_types }
    }

    /// Reads an item; `id` is passed when the caller already consumed it.
    pub fn read_item(&self, reader: &mut PacketReader, id: Option<u16>) -> Result<Item, DecodeError> {
        let type_id = match id {
            Some(id) => ItemTypeId(id),
            None => ItemTypeId(reader.read_u16_le()?),
        };
        let mut item = Item::new(type_id);
        if self.has_count(type_id) {
            item.count_or_subtype = Some(reader.read_u8()?);
        }
        Ok(item)
    }

    fn has_count(&self, type_id: ItemTypeId) -> bool {
        self.item_types
            .map(|types| types.has_count(type_id))
            .unwrap_or(false)
    }
}

pub fn read_outfit(reader: &mut PacketReader) -> Result<Outfit, DecodeError> {
    let look_type = reader.read_u16_le()?;
    if look_type != 0 {
        return Ok(Outfit::Creature {
            look_type,
            head: reader.read_u8()?,
            body: reader.read_u8()?,
            legs: reader.read_u8()?,
            feet: reader.read_u8()?,
            addons: reader.read_u8()?,
        });
    }
    let look_item = reader.read_u16_le()?;
    if look_item == 0 {
        Ok(Outfit::Effect {
            id: EFFECT_OUTFIT_ID,
        })
    } else {
        Ok(Outfit::Item { look_item })
    }
}

pub fn read_light(reader: &mut PacketReader) -> Result<Light, DecodeError> {
    let intensity = reader.read_u8()?;
    let color = reader.read_u8()?;
    Ok(Light { intensity, color })
}

struct CreatureDescription {
    health_percent: u8,
    direction: u8,
    outfit: Outfit,
    light: Light,
    speed: u16,
    skull: u8,
    shield: u8,
    emblem: Option<u8>,
    passable: bool,
}

pub struct ThingDecoder<'a> {
    pub creatures: &'a mut CreatureRegistry,
    pub items: ItemCodec<'a>,
    pub tasks: &'a mut TaskQueue,
}

impl<'a> ThingDecoder<'a> {
    pub fn read_thing(
        &mut self,
        reader: &mut PacketReader,
        sink: &mut dyn WorldSink,
    ) -> Result<DecodedThing, DecodeError> {
        let thing_id = reader.read_u16_le()?;
        match thing_id {
            CREATURE_MARKER_NEW | CREATURE_MARKER_KNOWN => {
                self.read_creature(reader, sink, thing_id)
            }
            CREATURE_MARKER_TURN => self.read_creature_turn(reader, sink),
            _ => {
                let item = self.items.read_item(reader, Some(thing_id))?;
                Ok(DecodedThing::Thing(Thing::Item(item)))
            }
        }
    }

    /// Creature id and new direction, applied to an already known creature.
    pub fn read_creature_turn(
        &mut self,
        reader: &mut PacketReader,
        sink: &mut dyn WorldSink,
    ) -> Result<DecodedThing, DecodeError> {
        let creature_id = reader.read_u32_le()?;
        let raw_direction = reader.read_u8()?;
        let handle = match self.creatures.resolve_known(creature_id) {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(creature_id, "turn for unknown creature");
                return Ok(DecodedThing::Skipped(err));
            }
        };
        match Direction::from_u8(raw_direction) {
            Some(direction) => {
                handle.borrow_mut().direction = direction;
                sink.creature_updated(creature_id, CreatureField::Direction(direction));
            }
            None => tracing::warn!(creature_id, raw_direction, "invalid turn direction"),
        }
        Ok(DecodedThing::Turned { creature_id })
    }

    fn read_creature(
        &mut self,
        reader: &mut PacketReader,
        sink: &mut dyn WorldSink,
        marker: u16,
    ) -> Result<DecodedThing, DecodeError> {
        let resolved = if marker == CREATURE_MARKER_KNOWN {
            let id = reader.read_u32_le()?;
            self.creatures.resolve_known(id)
        } else {
            let remove_id = reader.read_u32_le()?;
            let id = reader.read_u32_le()?;
            let name = capitalize_name(reader.read_string()?);
            if self.creatures.remove(remove_id).is_some() {
                sink.creature_evicted(remove_id);
            }
            self.creatures.introduce(id, name)
        };

        let description = CreatureDescription {
            health_percent: reader.read_u8()?,
            direction: reader.read_u8()?,
            outfit: read_outfit(reader)?,
            light: read_light(reader)?,
            speed: reader.read_u16_le()?,
            skull: reader.read_u8()?,
            shield: reader.read_u8()?,
            emblem: if marker == CREATURE_MARKER_NEW {
                Some(reader.read_u8()?)
            } else {
                None
            },
            passable: reader.read_u8()? == 0,
        };

        let handle = match resolved {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(error = %err, "creature description dropped");
                return Ok(DecodedThing::Skipped(err));
            }
        };
        self.apply_description(&handle, description);
        Ok(DecodedThing::Thing(Thing::Creature(handle)))
    }

    fn apply_description(&mut self, handle: &CreatureHandle, description: CreatureDescription) {
        let first_sighting = {
            let mut creature = handle.borrow_mut();
            creature.health_percent = description.health_percent;
            match Direction::from_u8(description.direction) {
                Some(direction) => creature.direction = direction,
                None => tracing::warn!(
                    creature_id = creature.id.0,
                    raw_direction = description.direction,
                    "invalid creature direction"
                ),
            }
            creature.outfit = description.outfit;
            creature.light = description.light;
            creature.speed = description.speed;
            creature.skull = description.skull;
            creature.shield = description.shield;
            if let Some(emblem) = description.emblem {
                creature.emblem = Some(emblem);
            }
            creature.passable = description.passable;
            let first_sighting = !creature.known;
            creature.known = true;
            first_sighting
        };

        if first_sighting && self.creatures.is_local_player(handle) {
            tracing::debug!(creature_id = handle.id().0, "local player described, login complete queued");
            self.tasks.schedule(DeferredTask::LoginComplete);
        }
    }
}

/// Creature names always start with a capital letter.
fn capitalize_name(mut name: String) -> String {
    if let Some(first) = name.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    name
}
