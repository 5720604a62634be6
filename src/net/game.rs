use crate::config::ProtocolConfig;
use crate::entities::item::Item;
use crate::net::error::DecodeError;
use crate::net::events::{
    CreatureField, GameEvent, OutfitChoice, PlayerStats, SkillLevel, SpeakTarget, Thing,
    WorldSink,
};
use crate::net::map_stream::{read_floors, read_tile_things};
use crate::net::packet::PacketReader;
use crate::net::thing::{
    read_light, read_outfit, DecodedThing, ItemCodec, ThingDecoder, CREATURE_MARKER_KNOWN,
    CREATURE_MARKER_NEW, CREATURE_MARKER_TURN,
};
use crate::world::creatures::CreatureRegistry;
use crate::world::item_types::ItemTypeIndex;
use crate::world::position::{read_position, Direction};
use crate::world::tasks::{DeferredTask, TaskQueue};
use crate::world::viewport::{FloorSlice, InterestWindow, ScrollDirection, WindowShift};

pub const OPCODE_INIT_GAME: u8 = 0x0a;
pub const OPCODE_RIGHTS: u8 = 0x0b;
pub const OPCODE_LOGIN_ERROR: u8 = 0x14;
pub const OPCODE_LOGIN_ADVICE: u8 = 0x15;
pub const OPCODE_LOGIN_WAIT: u8 = 0x16;
pub const OPCODE_PING: u8 = 0x1e;
pub const OPCODE_DEATH: u8 = 0x28;
pub const OPCODE_MAP_DESCRIPTION: u8 = 0x64;
pub const OPCODE_MAP_ROW_NORTH: u8 = 0x65;
pub const OPCODE_MAP_ROW_EAST: u8 = 0x66;
pub const OPCODE_MAP_ROW_SOUTH: u8 = 0x67;
pub const OPCODE_MAP_ROW_WEST: u8 = 0x68;
pub const OPCODE_FIELD_DATA: u8 = 0x69;
pub const OPCODE_TILE_ADD_THING: u8 = 0x6a;
pub const OPCODE_TILE_CHANGE_THING: u8 = 0x6b;
pub const OPCODE_TILE_REMOVE_THING: u8 = 0x6c;
pub const OPCODE_MOVE_CREATURE: u8 = 0x6d;
pub const OPCODE_OPEN_CONTAINER: u8 = 0x6e;
pub const OPCODE_CLOSE_CONTAINER: u8 = 0x6f;
pub const OPCODE_CONTAINER_ADD: u8 = 0x70;
pub const OPCODE_CONTAINER_UPDATE: u8 = 0x71;
pub const OPCODE_CONTAINER_REMOVE: u8 = 0x72;
pub const OPCODE_INVENTORY_SET: u8 = 0x78;
pub const OPCODE_INVENTORY_RESET: u8 = 0x79;
pub const OPCODE_SHOP_OPEN: u8 = 0x7a;
pub const OPCODE_SHOP_SELL_LIST: u8 = 0x7b;
pub const OPCODE_SHOP_CLOSE: u8 = 0x7c;
pub const OPCODE_TRADE_OFFER: u8 = 0x7d;
pub const OPCODE_TRADE_COUNTER: u8 = 0x7e;
pub const OPCODE_TRADE_CLOSE: u8 = 0x7f;
pub const OPCODE_WORLD_LIGHT: u8 = 0x82;
pub const OPCODE_GRAPHICAL_EFFECT: u8 = 0x83;
pub const OPCODE_TEXTUAL_EFFECT: u8 = 0x84;
pub const OPCODE_MISSILE_EFFECT: u8 = 0x85;
pub const OPCODE_CREATURE_MARK: u8 = 0x86;
pub const OPCODE_CREATURE_HEALTH: u8 = 0x8c;
pub const OPCODE_CREATURE_LIGHT: u8 = 0x8d;
pub const OPCODE_CREATURE_OUTFIT: u8 = 0x8e;
pub const OPCODE_CREATURE_SPEED: u8 = 0x8f;
pub const OPCODE_CREATURE_SKULL: u8 = 0x90;
pub const OPCODE_CREATURE_PARTY: u8 = 0x91;
pub const OPCODE_EDIT_TEXT: u8 = 0x96;
pub const OPCODE_EDIT_LIST: u8 = 0x97;
pub const OPCODE_PLAYER_DATA: u8 = 0xa0;
pub const OPCODE_PLAYER_SKILLS: u8 = 0xa1;
pub const OPCODE_PLAYER_STATE: u8 = 0xa2;
pub const OPCODE_CLEAR_TARGET: u8 = 0xa3;
pub const OPCODE_TALK: u8 = 0xaa;
pub const OPCODE_CHANNEL_LIST: u8 = 0xab;
pub const OPCODE_OPEN_CHANNEL: u8 = 0xac;
pub const OPCODE_PRIVATE_CHANNEL: u8 = 0xad;
pub const OPCODE_OPEN_REQUEST_QUEUE: u8 = 0xae;
pub const OPCODE_DELETE_REQUEST: u8 = 0xaf;
pub const OPCODE_FINISH_REQUEST: u8 = 0xb0;
pub const OPCODE_CLOSE_REQUEST: u8 = 0xb1;
pub const OPCODE_OPEN_OWN_CHANNEL: u8 = 0xb2;
pub const OPCODE_CLOSE_CHANNEL: u8 = 0xb3;
pub const OPCODE_MESSAGE: u8 = 0xb4;
pub const OPCODE_SNAPBACK: u8 = 0xb5;
pub const OPCODE_FLOOR_CHANGE_UP: u8 = 0xbe;
pub const OPCODE_FLOOR_CHANGE_DOWN: u8 = 0xbf;
pub const OPCODE_OUTFIT_DIALOG: u8 = 0xc8;
pub const OPCODE_BUDDY_DATA: u8 = 0xd2;
pub const OPCODE_BUDDY_STATUS_ONLINE: u8 = 0xd3;
pub const OPCODE_BUDDY_STATUS_OFFLINE: u8 = 0xd4;
pub const OPCODE_TUTORIAL_HINT: u8 = 0xdc;
pub const OPCODE_AUTOMAP_FLAG: u8 = 0xdd;
pub const OPCODE_QUEST_LOG: u8 = 0xf0;
pub const OPCODE_QUEST_LINE: u8 = 0xf1;

const FIELD_CLEARED_MARKER: u16 = 0xff01;
const GM_ACTION_COUNT: usize = 20;
const SKILL_COUNT: usize = 7;
const DEFAULT_DEATH_PENALTY: u8 = 100;

const TALK_TYPES_POSITION: [u8; 6] = [0x01, 0x02, 0x03, 0x05, 0x13, 0x14];
const TALK_TYPES_CHANNEL: [u8; 5] = [0x07, 0x08, 0x0d, 0x0f, 0x11];
const TALK_TYPES_UNTARGETED: [u8; 4] = [0x04, 0x06, 0x0c, 0x0e];
const TALK_TYPE_RULE_VIOLATION: u8 = 0x09;

/// Decoding state for one game connection: the creature identity cache,
/// the interest window and the deferred task queue.
#[derive(Debug)]
pub struct ProtocolGame {
    config: ProtocolConfig,
    creatures: CreatureRegistry,
    window: InterestWindow,
    item_types: Option<ItemTypeIndex>,
    tasks: TaskQueue,
}

impl ProtocolGame {
    pub fn new(config: ProtocolConfig, item_types: Option<ItemTypeIndex>) -> Self {
        let creatures = CreatureRegistry::new(config.creature_ids);
        let window = InterestWindow::new(config.aware, config.floors);
        Self {
            config,
            creatures,
            window,
            item_types,
            tasks: TaskQueue::new(),
        }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn creatures(&self) -> &CreatureRegistry {
        &self.creatures
    }

    pub fn window(&self) -> &InterestWindow {
        &self.window
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Decodes every opcode in one server message. A message-fatal error
    /// abandons the rest of the message and is reported to the sink; state
    /// applied before the failure is kept.
    pub fn parse_message(
        &mut self,
        data: &[u8],
        sink: &mut dyn WorldSink,
    ) -> Result<(), DecodeError> {
        let mut reader = PacketReader::new(data);
        while !reader.is_empty() {
            let opcode = reader.read_u8()?;
            tracing::trace!(opcode, "opcode");
            if let Err(err) = self.parse_opcode(opcode, &mut reader, sink) {
                tracing::error!(
                    opcode,
                    offset = reader.position(),
                    error = %err,
                    "message decode aborted"
                );
                sink.decode_aborted(opcode, &err);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Runs tasks queued while decoding. Call after `parse_message` returns.
    pub fn run_deferred(&mut self, sink: &mut dyn WorldSink) -> usize {
        let mut ran = 0;
        while let Some(task) = self.tasks.pop() {
            match task {
                DeferredTask::LoginComplete => {
                    tracing::info!("login complete");
                    sink.game_event(GameEvent::LoginComplete);
                }
            }
            ran += 1;
        }
        ran
    }

    fn parse_opcode(
        &mut self,
        opcode: u8,
        reader: &mut PacketReader,
        sink: &mut dyn WorldSink,
    ) -> Result<(), DecodeError> {
        match opcode {
            OPCODE_INIT_GAME => self.parse_init_game(reader, sink),
            OPCODE_RIGHTS => reader.skip(GM_ACTION_COUNT),
            OPCODE_LOGIN_ERROR => {
                sink.game_event(GameEvent::LoginError(reader.read_string()?));
                Ok(())
            }
            OPCODE_LOGIN_ADVICE => {
                sink.game_event(GameEvent::LoginAdvice(reader.read_string()?));
                Ok(())
            }
            OPCODE_LOGIN_WAIT => {
                let message = reader.read_string()?;
                let seconds = reader.read_u8()?;
                sink.game_event(GameEvent::LoginWait { message, seconds });
                Ok(())
            }
            OPCODE_PING => {
                sink.game_event(GameEvent::Ping);
                Ok(())
            }
            OPCODE_DEATH => {
                let penalty = if self.config.has_death_penalty() {
                    reader.read_u8()?
                } else {
                    DEFAULT_DEATH_PENALTY
                };
                sink.game_event(GameEvent::Death { penalty });
                Ok(())
            }
            OPCODE_MAP_DESCRIPTION => self.parse_map_description(reader, sink),
            OPCODE_MAP_ROW_NORTH => self.parse_scroll(reader, sink, ScrollDirection::North),
            OPCODE_MAP_ROW_EAST => self.parse_scroll(reader, sink, ScrollDirection::East),
            OPCODE_MAP_ROW_SOUTH => self.parse_scroll(reader, sink, ScrollDirection::South),
            OPCODE_MAP_ROW_WEST => self.parse_scroll(reader, sink, ScrollDirection::West),
            OPCODE_FIELD_DATA => self.parse_field_data(reader, sink),
            OPCODE_TILE_ADD_THING => self.parse_tile_add(reader, sink),
            OPCODE_TILE_CHANGE_THING => self.parse_tile_change(reader, sink),
            OPCODE_TILE_REMOVE_THING => {
                let position = read_position(reader)?;
                let stack_pos = reader.read_u8()?;
                if !sink.thing_removed(position, stack_pos) {
                    tracing::warn!(%position, stack_pos, "could not remove thing");
                }
                Ok(())
            }
            OPCODE_MOVE_CREATURE => parse_move_creature(reader, sink),
            OPCODE_OPEN_CONTAINER => self.parse_open_container(reader, sink),
            OPCODE_CLOSE_CONTAINER => {
                let container_id = reader.read_u8()?;
                sink.game_event(GameEvent::ContainerClosed { container_id });
                Ok(())
            }
            OPCODE_CONTAINER_ADD => {
                let container_id = reader.read_u8()?;
                let item = self.item_codec().read_item(reader, None)?;
                sink.game_event(GameEvent::ContainerItemAdded { container_id, item });
                Ok(())
            }
            OPCODE_CONTAINER_UPDATE => {
                let container_id = reader.read_u8()?;
                let slot = reader.read_u8()?;
                let item = self.item_codec().read_item(reader, None)?;
                sink.game_event(GameEvent::ContainerItemUpdated {
                    container_id,
                    slot,
                    item,
                });
                Ok(())
            }
            OPCODE_CONTAINER_REMOVE => {
                let container_id = reader.read_u8()?;
                let slot = reader.read_u8()?;
                sink.game_event(GameEvent::ContainerItemRemoved { container_id, slot });
                Ok(())
            }
            OPCODE_INVENTORY_SET => {
                let slot = reader.read_u8()?;
                let item = self.item_codec().read_item(reader, None)?;
                sink.game_event(GameEvent::InventoryChanged {
                    slot,
                    item: Some(item),
                });
                Ok(())
            }
            OPCODE_INVENTORY_RESET => {
                let slot = reader.read_u8()?;
                sink.game_event(GameEvent::InventoryChanged { slot, item: None });
                Ok(())
            }
            OPCODE_SHOP_OPEN => skip_npc_offer(reader),
            OPCODE_SHOP_SELL_LIST => skip_player_goods(reader),
            OPCODE_SHOP_CLOSE => Ok(()),
            OPCODE_TRADE_OFFER | OPCODE_TRADE_COUNTER => {
                let name = reader.read_string()?;
                let items = self.read_item_list(reader)?;
                sink.game_event(GameEvent::TradeOffer {
                    counter: opcode == OPCODE_TRADE_COUNTER,
                    name,
                    items,
                });
                Ok(())
            }
            OPCODE_TRADE_CLOSE => {
                sink.game_event(GameEvent::TradeClosed);
                Ok(())
            }
            OPCODE_WORLD_LIGHT => {
                sink.game_event(GameEvent::WorldLight(read_light(reader)?));
                Ok(())
            }
            OPCODE_GRAPHICAL_EFFECT => {
                let position = read_position(reader)?;
                let effect = reader.read_u8()?;
                sink.game_event(GameEvent::MagicEffect { position, effect });
                Ok(())
            }
            OPCODE_TEXTUAL_EFFECT => {
                let position = read_position(reader)?;
                let color = reader.read_u8()?;
                let text = reader.read_string()?;
                sink.game_event(GameEvent::AnimatedText {
                    position,
                    color,
                    text,
                });
                Ok(())
            }
            OPCODE_MISSILE_EFFECT => {
                let from = read_position(reader)?;
                let to = read_position(reader)?;
                let missile = reader.read_u8()?;
                sink.game_event(GameEvent::Missile { from, to, missile });
                Ok(())
            }
            OPCODE_CREATURE_MARK => {
                let id = reader.read_u32_le()?;
                let color = reader.read_u8()?;
                self.update_creature(sink, id, CreatureField::Square(color));
                Ok(())
            }
            OPCODE_CREATURE_HEALTH => {
                let id = reader.read_u32_le()?;
                let health = reader.read_u8()?;
                self.update_creature(sink, id, CreatureField::Health(health));
                Ok(())
            }
            OPCODE_CREATURE_LIGHT => {
                let id = reader.read_u32_le()?;
                let light = read_light(reader)?;
                self.update_creature(sink, id, CreatureField::Light(light));
                Ok(())
            }
            OPCODE_CREATURE_OUTFIT => {
                let id = reader.read_u32_le()?;
                let outfit = read_outfit(reader)?;
                self.update_creature(sink, id, CreatureField::Outfit(outfit));
                Ok(())
            }
            OPCODE_CREATURE_SPEED => {
                let id = reader.read_u32_le()?;
                let speed = reader.read_u16_le()?;
                self.update_creature(sink, id, CreatureField::Speed(speed));
                Ok(())
            }
            OPCODE_CREATURE_SKULL => {
                let id = reader.read_u32_le()?;
                let skull = reader.read_u8()?;
                self.update_creature(sink, id, CreatureField::Skull(skull));
                Ok(())
            }
            OPCODE_CREATURE_PARTY => {
                let id = reader.read_u32_le()?;
                let shield = reader.read_u8()?;
                self.update_creature(sink, id, CreatureField::Shield(shield));
                Ok(())
            }
            OPCODE_EDIT_TEXT => {
                reader.skip(4 + 2 + 2)?;
                for _ in 0..3 {
                    reader.read_string()?;
                }
                Ok(())
            }
            OPCODE_EDIT_LIST => {
                reader.skip(1 + 4)?;
                reader.read_string()?;
                Ok(())
            }
            OPCODE_PLAYER_DATA => {
                sink.game_event(GameEvent::PlayerStats(read_player_stats(reader)?));
                Ok(())
            }
            OPCODE_PLAYER_SKILLS => {
                let mut skills = Vec::with_capacity(SKILL_COUNT);
                for _ in 0..SKILL_COUNT {
                    let level = reader.read_u8()?;
                    let percent = reader.read_u8()?;
                    skills.push(SkillLevel { level, percent });
                }
                sink.game_event(GameEvent::PlayerSkills(skills));
                Ok(())
            }
            OPCODE_PLAYER_STATE => {
                sink.game_event(GameEvent::PlayerIcons(reader.read_u16_le()?));
                Ok(())
            }
            OPCODE_CLEAR_TARGET => {
                reader.read_u32_le()?;
                sink.game_event(GameEvent::AttackCancelled);
                Ok(())
            }
            OPCODE_TALK => parse_talk(reader, sink),
            OPCODE_CHANNEL_LIST => {
                let count = reader.read_u8()?;
                let mut channels = Vec::with_capacity(usize::from(count));
                for _ in 0..count {
                    let id = reader.read_u16_le()?;
                    let name = reader.read_string()?;
                    channels.push((id, name));
                }
                sink.game_event(GameEvent::ChannelList(channels));
                Ok(())
            }
            OPCODE_OPEN_CHANNEL => {
                let channel_id = reader.read_u16_le()?;
                let name = reader.read_string()?;
                sink.game_event(GameEvent::ChannelOpened { channel_id, name });
                Ok(())
            }
            OPCODE_PRIVATE_CHANNEL => {
                let name = reader.read_string()?;
                sink.game_event(GameEvent::PrivateChannelOpened { name });
                Ok(())
            }
            OPCODE_OPEN_REQUEST_QUEUE => reader.skip(2),
            OPCODE_DELETE_REQUEST | OPCODE_FINISH_REQUEST => {
                reader.read_string()?;
                Ok(())
            }
            OPCODE_CLOSE_REQUEST => Ok(()),
            OPCODE_OPEN_OWN_CHANNEL => {
                let channel_id = reader.read_u16_le()?;
                let name = reader.read_string()?;
                sink.game_event(GameEvent::OwnChannelOpened { channel_id, name });
                Ok(())
            }
            OPCODE_CLOSE_CHANNEL => {
                let channel_id = reader.read_u16_le()?;
                sink.game_event(GameEvent::ChannelClosed { channel_id });
                Ok(())
            }
            OPCODE_MESSAGE => {
                let message_type = reader.read_u8()?;
                let text = reader.read_string()?;
                sink.game_event(GameEvent::TextMessage { message_type, text });
                Ok(())
            }
            OPCODE_SNAPBACK => {
                let raw_direction = reader.read_u8()?;
                match Direction::from_u8(raw_direction) {
                    Some(direction) => sink.game_event(GameEvent::WalkCancelled(direction)),
                    None => tracing::warn!(raw_direction, "invalid walk cancel direction"),
                }
                Ok(())
            }
            OPCODE_FLOOR_CHANGE_UP => {
                let shift = self.window.floor_up()?;
                self.apply_shift(reader, sink, shift)
            }
            OPCODE_FLOOR_CHANGE_DOWN => {
                let shift = self.window.floor_down()?;
                self.apply_shift(reader, sink, shift)
            }
            OPCODE_OUTFIT_DIALOG => {
                let outfit = read_outfit(reader)?;
                let count = reader.read_u8()?;
                let mut choices = Vec::with_capacity(usize::from(count));
                for _ in 0..count {
                    let look_type = reader.read_u16_le()?;
                    let name = reader.read_string()?;
                    let addons = reader.read_u8()?;
                    choices.push(OutfitChoice {
                        look_type,
                        name,
                        addons,
                    });
                }
                sink.game_event(GameEvent::OutfitWindow { outfit, choices });
                Ok(())
            }
            OPCODE_BUDDY_DATA => {
                let id = reader.read_u32_le()?;
                let name = reader.read_string()?;
                let online = reader.read_u8()? != 0;
                sink.game_event(GameEvent::VipAdded { id, name, online });
                Ok(())
            }
            OPCODE_BUDDY_STATUS_ONLINE | OPCODE_BUDDY_STATUS_OFFLINE => {
                let id = reader.read_u32_le()?;
                sink.game_event(GameEvent::VipStateChanged {
                    id,
                    online: opcode == OPCODE_BUDDY_STATUS_ONLINE,
                });
                Ok(())
            }
            OPCODE_TUTORIAL_HINT => reader.skip(1),
            OPCODE_AUTOMAP_FLAG => {
                read_position(reader)?;
                reader.read_u8()?;
                reader.read_string()?;
                Ok(())
            }
            OPCODE_QUEST_LOG => {
                let count = reader.read_u16_le()?;
                for _ in 0..count {
                    reader.read_u16_le()?;
                    reader.read_string()?;
                    reader.read_u8()?;
                }
                Ok(())
            }
            OPCODE_QUEST_LINE => {
                reader.read_u16_le()?;
                let missions = reader.read_u8()?;
                for _ in 0..missions {
                    reader.read_string()?;
                    reader.read_string()?;
                }
                Ok(())
            }
            _ => Err(DecodeError::UnknownOpcode(opcode)),
        }
    }

    fn item_codec(&self) -> ItemCodec<'_> {
        ItemCodec::new(self.item_types.as_ref())
    }

    fn thing_decoder(&mut self) -> ThingDecoder<'_> {
        ThingDecoder {
            creatures: &mut self.creatures,
            items: ItemCodec::new(self.item_types.as_ref()),
            tasks: &mut self.tasks,
        }
    }

    fn read_item_list(&self, reader: &mut PacketReader) -> Result<Vec<Item>, DecodeError> {
        let codec = self.item_codec();
        let count = reader.read_u8()?;
        let mut items = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            items.push(codec.read_item(reader, None)?);
        }
        Ok(items)
    }

    fn read_slices(
        &mut self,
        reader: &mut PacketReader,
        sink: &mut dyn WorldSink,
        slices: &[FloorSlice],
    ) -> Result<(), DecodeError> {
        let max_tile_things = self.config.max_tile_things;
        let mut decoder = self.thing_decoder();
        read_floors(reader, &mut decoder, sink, slices, max_tile_things)?;
        Ok(())
    }

    fn parse_init_game(
        &mut self,
        reader: &mut PacketReader,
        sink: &mut dyn WorldSink,
    ) -> Result<(), DecodeError> {
        let player_id = reader.read_u32_le()?;
        let server_beat = reader.read_u16_le()?;
        let can_report_bugs = reader.read_u8()? != 0;
        self.creatures.set_local_player(player_id);
        tracing::info!(player_id, server_beat, "game started");
        sink.game_event(GameEvent::GameStarted {
            player_id,
            server_beat,
            can_report_bugs,
        });
        Ok(())
    }

    fn parse_map_description(
        &mut self,
        reader: &mut PacketReader,
        sink: &mut dyn WorldSink,
    ) -> Result<(), DecodeError> {
        let center = read_position(reader)?;
        self.window.set_center(center);
        sink.window_recentered(center);
        let slices = self.window.full_map(center);
        tracing::debug!(%center, floors = slices.len(), "full map description");
        self.read_slices(reader, sink, &slices)
    }

    fn parse_scroll(
        &mut self,
        reader: &mut PacketReader,
        sink: &mut dyn WorldSink,
        direction: ScrollDirection,
    ) -> Result<(), DecodeError> {
        let shift = self.window.scroll(direction)?;
        self.apply_shift(reader, sink, shift)
    }

    /// Decodes the newly visible floors, then moves the window.
    fn apply_shift(
        &mut self,
        reader: &mut PacketReader,
        sink: &mut dyn WorldSink,
        shift: WindowShift,
    ) -> Result<(), DecodeError> {
        self.read_slices(reader, sink, &shift.slices)?;
        self.window.set_center(shift.center);
        sink.window_recentered(shift.center);
        Ok(())
    }

    fn parse_field_data(
        &mut self,
        reader: &mut PacketReader,
        sink: &mut dyn WorldSink,
    ) -> Result<(), DecodeError> {
        let position = read_position(reader)?;
        sink.tile_cleared(position);
        if reader.peek_u16_le()? != FIELD_CLEARED_MARKER {
            let max_tile_things = self.config.max_tile_things;
            let mut decoder = self.thing_decoder();
            read_tile_things(reader, &mut decoder, sink, position, max_tile_things)?;
        }
        reader.read_u16_le()?;
        Ok(())
    }

    fn parse_tile_add(
        &mut self,
        reader: &mut PacketReader,
        sink: &mut dyn WorldSink,
    ) -> Result<(), DecodeError> {
        let position = read_position(reader)?;
        let stack_pos = reader.read_u8()?;
        let decoded = self.thing_decoder().read_thing(reader, sink)?;
        if let DecodedThing::Thing(thing) = decoded {
            sink.thing_added(position, thing, stack_pos);
        }
        Ok(())
    }

    fn parse_tile_change(
        &mut self,
        reader: &mut PacketReader,
        sink: &mut dyn WorldSink,
    ) -> Result<(), DecodeError> {
        let position = read_position(reader)?;
        let stack_pos = reader.read_u8()?;
        let thing_id = reader.read_u16_le()?;
        match thing_id {
            CREATURE_MARKER_NEW | CREATURE_MARKER_KNOWN | CREATURE_MARKER_TURN => {
                self.thing_decoder().read_creature_turn(reader, sink)?;
            }
            _ => {
                let item = self.item_codec().read_item(reader, Some(thing_id))?;
                if !sink.thing_removed(position, stack_pos) {
                    tracing::warn!(%position, stack_pos, "could not remove thing");
                }
                sink.thing_added(position, Thing::Item(item), stack_pos);
            }
        }
        Ok(())
    }

    fn parse_open_container(
        &mut self,
        reader: &mut PacketReader,
        sink: &mut dyn WorldSink,
    ) -> Result<(), DecodeError> {
        let container_id = reader.read_u8()?;
        let item_id = reader.read_u16_le()?;
        let name = reader.read_string()?;
        let capacity = reader.read_u8()?;
        let has_parent = reader.read_u8()? != 0;
        let items = self.read_item_list(reader)?;
        sink.game_event(GameEvent::ContainerOpened {
            container_id,
            item_id,
            name,
            capacity,
            has_parent,
            items,
        });
        Ok(())
    }

    fn update_creature(&mut self, sink: &mut dyn WorldSink, creature_id: u32, field: CreatureField) {
        let Some(handle) = self.creatures.get(creature_id) else {
            tracing::warn!(creature_id, ?field, "update for unknown creature");
            return;
        };
        {
            let mut creature = handle.borrow_mut();
            match field {
                CreatureField::Health(health) => creature.health_percent = health,
                CreatureField::Direction(direction) => creature.direction = direction,
                CreatureField::Outfit(outfit) => creature.outfit = outfit,
                CreatureField::Light(light) => creature.light = light,
                CreatureField::Speed(speed) => creature.speed = speed,
                CreatureField::Skull(skull) => creature.skull = skull,
                CreatureField::Shield(shield) => creature.shield = shield,
                CreatureField::Square(color) => creature.square = Some(color),
            }
        }
        sink.creature_updated(creature_id, field);
    }
}

fn parse_move_creature(
    reader: &mut PacketReader,
    sink: &mut dyn WorldSink,
) -> Result<(), DecodeError> {
    let from = read_position(reader)?;
    let stack_pos = reader.read_u8()?;
    let to = read_position(reader)?;
    let Some(thing) = sink.thing_at(from, stack_pos) else {
        tracing::warn!(%from, stack_pos, "no thing to move");
        return Ok(());
    };
    match thing.as_creature() {
        Some(creature) => sink.creature_moved(creature, from, to),
        None => tracing::warn!(%from, stack_pos, "moved thing is not a creature"),
    }
    Ok(())
}

fn parse_talk(reader: &mut PacketReader, sink: &mut dyn WorldSink) -> Result<(), DecodeError> {
    reader.read_u32_le()?;
    let name = reader.read_string()?;
    let level = reader.read_u16_le()?;
    let speak_type = reader.read_u8()?;
    let target = if TALK_TYPES_POSITION.contains(&speak_type) {
        SpeakTarget::Position(read_position(reader)?)
    } else if TALK_TYPES_CHANNEL.contains(&speak_type) {
        SpeakTarget::Channel(reader.read_u16_le()?)
    } else if TALK_TYPES_UNTARGETED.contains(&speak_type) {
        SpeakTarget::Untargeted
    } else if speak_type == TALK_TYPE_RULE_VIOLATION {
        SpeakTarget::RuleViolation(reader.read_u32_le()?)
    } else {
        tracing::warn!(speak_type, "unknown speak type");
        SpeakTarget::Unknown
    };
    let message = reader.read_string()?;
    sink.game_event(GameEvent::CreatureSpeak {
        name,
        level,
        speak_type,
        target,
        message,
    });
    Ok(())
}

fn read_player_stats(reader: &mut PacketReader) -> Result<PlayerStats, DecodeError> {
    Ok(PlayerStats {
        health: reader.read_u16_le()?,
        max_health: reader.read_u16_le()?,
        free_capacity: reader.read_u32_le()?,
        experience: reader.read_u32_le()?,
        level: reader.read_u16_le()?,
        level_percent: reader.read_u8()?,
        mana: reader.read_u16_le()?,
        max_mana: reader.read_u16_le()?,
        magic_level: reader.read_u8()?,
        magic_level_percent: reader.read_u8()?,
        soul: reader.read_u8()?,
        stamina: reader.read_u16_le()?,
    })
}

fn skip_npc_offer(reader: &mut PacketReader) -> Result<(), DecodeError> {
    let count = reader.read_u8()?;
    for _ in 0..count {
        reader.skip(2 + 1)?;
        reader.read_string()?;
        reader.skip(4 * 3)?;
    }
    Ok(())
}

fn skip_player_goods(reader: &mut PacketReader) -> Result<(), DecodeError> {
    reader.skip(4)?;
    let count = reader.read_u8()?;
    reader.skip(usize::from(count) * 3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::creature::Light;
    use crate::entities::item::ItemTypeId;
    use crate::net::packet::PacketWriter;
    use crate::net::thing::fixtures;
    use crate::world::map::MapMirror;
    use crate::world::position::{write_position, Position};

    const LOCAL_ID: u32 = 0x1000_0001;
    const RAT: u32 = 0x4000_0001;

    fn message(build: impl FnOnce(&mut PacketWriter)) -> Vec<u8> {
        let mut writer = PacketWriter::new();
        build(&mut writer);
        writer.into_vec()
    }

    fn game() -> ProtocolGame {
        ProtocolGame::new(ProtocolConfig::default(), None)
    }

    /// A full description of an empty surface window: one skip marker per
    /// floor covers all 18x14 cells.
    fn write_empty_map(writer: &mut PacketWriter, center: Position) {
        writer.write_u8(OPCODE_MAP_DESCRIPTION);
        write_position(writer, center);
        for _ in 0..=7 {
            writer.write_u16_le(0xff00 | (18 * 14 - 1));
        }
    }

    fn write_add_creature(writer: &mut PacketWriter, position: Position, id: u32, name: &str) {
        writer.write_u8(OPCODE_TILE_ADD_THING);
        write_position(writer, position);
        writer.write_u8(0);
        fixtures::write_new_creature(writer, 0, id, name);
    }

    fn started(sink: &mut MapMirror) -> ProtocolGame {
        let mut game = game();
        let data = message(|w| write_empty_map(w, Position::new(100, 100, 7)));
        game.parse_message(&data, sink).expect("map");
        game
    }

    #[test]
    fn empty_full_map_clears_window() {
        let mut sink = MapMirror::new();
        let game = started(&mut sink);
        assert_eq!(game.window().center(), Some(Position::new(100, 100, 7)));
        assert_eq!(sink.center(), Some(Position::new(100, 100, 7)));
        assert_eq!(sink.cleared.len(), 8 * 18 * 14);
        assert_eq!(sink.cleared[0], Position::new(92, 94, 7));
        assert_eq!(sink.thing_count(), 0);
    }

    #[test]
    fn local_player_on_full_map_completes_login_once() {
        let mut sink = MapMirror::new();
        let mut game = game();
        let center = Position::new(100, 100, 7);
        let data = message(|w| {
            w.write_u8(OPCODE_INIT_GAME);
            w.write_u32_le(LOCAL_ID);
            w.write_u16_le(50);
            w.write_u8(1);
            w.write_u8(OPCODE_MAP_DESCRIPTION);
            write_position(w, center);
            // Center cell is column 8, row 6 of the first floor.
            w.write_u16_le(0xff00 | (8 * 14 + 6 - 1));
            fixtures::write_new_creature(w, 0, LOCAL_ID, "knight");
            w.write_u16_le(0xff00 | (18 * 14 - (8 * 14 + 6) - 1));
            for _ in 0..7 {
                w.write_u16_le(0xff00 | (18 * 14 - 1));
            }
        });
        game.parse_message(&data, &mut sink).expect("message");
        let things = sink.things(center);
        let local = things[0].as_creature().expect("creature");
        assert_eq!(local.borrow().name, "Knight");
        assert!(game.creatures().is_local_player(local));
        assert_eq!(game.pending_tasks(), 1);
        assert_eq!(game.run_deferred(&mut sink), 1);
        assert_eq!(game.run_deferred(&mut sink), 0);
        assert_eq!(
            sink.events,
            vec![
                GameEvent::GameStarted {
                    player_id: LOCAL_ID,
                    server_beat: 50,
                    can_report_bugs: true
                },
                GameEvent::LoginComplete
            ]
        );
    }

    #[test]
    fn unknown_opcode_aborts_only_current_message() {
        let mut sink = MapMirror::new();
        let mut game = game();
        let result = game.parse_message(&[OPCODE_PING, 0xee, OPCODE_PING], &mut sink);
        assert_eq!(result, Err(DecodeError::UnknownOpcode(0xee)));
        assert_eq!(sink.events, vec![GameEvent::Ping]);
        assert_eq!(sink.aborts, vec![(0xee, DecodeError::UnknownOpcode(0xee))]);
        game.parse_message(&[OPCODE_PING], &mut sink).expect("next message");
        assert_eq!(sink.events, vec![GameEvent::Ping, GameEvent::Ping]);
    }

    #[test]
    fn truncated_message_reports_underflow() {
        let mut sink = MapMirror::new();
        let mut game = game();
        let result = game.parse_message(&[OPCODE_CREATURE_HEALTH, 0x01, 0x00], &mut sink);
        assert!(matches!(result, Err(DecodeError::Underflow { .. })));
        assert_eq!(sink.aborts.len(), 1);
        assert_eq!(sink.aborts[0].0, OPCODE_CREATURE_HEALTH);
    }

    #[test]
    fn scroll_without_window_is_fatal() {
        let mut sink = MapMirror::new();
        let mut game = game();
        for opcode in [
            OPCODE_MAP_ROW_NORTH,
            OPCODE_MAP_ROW_EAST,
            OPCODE_FLOOR_CHANGE_UP,
            OPCODE_FLOOR_CHANGE_DOWN,
        ] {
            assert_eq!(
                game.parse_message(&[opcode], &mut sink),
                Err(DecodeError::NoInterestWindow)
            );
        }
        assert_eq!(sink.aborts.len(), 4);
    }

    #[test]
    fn scroll_north_decodes_strip_then_moves_window() {
        let mut sink = MapMirror::new();
        let mut game = started(&mut sink);
        sink.clear_journal();
        let data = message(|w| {
            w.write_u8(OPCODE_MAP_ROW_NORTH);
            for _ in 0..=7 {
                w.write_u16_le(0xff00 | (18 - 1));
            }
        });
        game.parse_message(&data, &mut sink).expect("scroll");
        assert_eq!(game.window().center(), Some(Position::new(100, 99, 7)));
        assert_eq!(sink.center(), Some(Position::new(100, 99, 7)));
        assert_eq!(sink.cleared.len(), 8 * 18);
        assert_eq!(sink.cleared[0], Position::new(92, 93, 7));
        assert_eq!(sink.cleared[1], Position::new(93, 93, 7));
    }

    #[test]
    fn scroll_east_strip_is_one_column() {
        let mut sink = MapMirror::new();
        let mut game = started(&mut sink);
        sink.clear_journal();
        let data = message(|w| {
            w.write_u8(OPCODE_MAP_ROW_EAST);
            for _ in 0..=7 {
                w.write_u16_le(0xff00 | (14 - 1));
            }
        });
        game.parse_message(&data, &mut sink).expect("scroll");
        assert_eq!(game.window().center(), Some(Position::new(101, 100, 7)));
        assert_eq!(sink.cleared[0], Position::new(110, 94, 7));
        assert_eq!(sink.cleared[13], Position::new(110, 107, 7));
    }

    #[test]
    fn floor_change_down_decodes_three_floors() {
        let mut sink = MapMirror::new();
        let mut game = started(&mut sink);
        sink.clear_journal();
        let data = message(|w| {
            w.write_u8(OPCODE_FLOOR_CHANGE_DOWN);
            for _ in 0..3 {
                w.write_u16_le(0xff00 | (18 * 14 - 1));
            }
        });
        game.parse_message(&data, &mut sink).expect("floor down");
        assert_eq!(game.window().center(), Some(Position::new(99, 99, 8)));
        assert_eq!(sink.cleared.len(), 3 * 18 * 14);
        assert_eq!(sink.cleared[0], Position::new(91, 93, 8));
    }

    #[test]
    fn truncated_scroll_keeps_window() {
        let mut sink = MapMirror::new();
        let mut game = started(&mut sink);
        let result = game.parse_message(&[OPCODE_MAP_ROW_SOUTH, 0x11, 0xff], &mut sink);
        assert!(matches!(result, Err(DecodeError::Underflow { .. })));
        assert_eq!(game.window().center(), Some(Position::new(100, 100, 7)));
    }

    #[test]
    fn move_creature_relocates_thing() {
        let mut sink = MapMirror::new();
        let mut game = started(&mut sink);
        let from = Position::new(100, 100, 7);
        let to = Position::new(100, 101, 7);
        let data = message(|w| {
            write_add_creature(w, from, RAT, "rat");
            w.write_u8(OPCODE_MOVE_CREATURE);
            write_position(w, from);
            w.write_u8(0);
            write_position(w, to);
        });
        game.parse_message(&data, &mut sink).expect("move");
        assert!(sink.things(from).is_empty());
        let moved = sink.thing_at(to, 0).expect("moved");
        let rat = game.creatures().get(RAT).expect("rat");
        assert!(moved.as_creature().expect("creature").ptr_eq(&rat));
    }

    #[test]
    fn move_of_item_is_ignored() {
        let mut sink = MapMirror::new();
        let mut game = started(&mut sink);
        let from = Position::new(100, 100, 7);
        let data = message(|w| {
            w.write_u8(OPCODE_TILE_ADD_THING);
            write_position(w, from);
            w.write_u8(0);
            w.write_u16_le(0x0c80);
            w.write_u8(OPCODE_MOVE_CREATURE);
            write_position(w, from);
            w.write_u8(0);
            write_position(w, Position::new(101, 100, 7));
            w.write_u8(OPCODE_PING);
        });
        game.parse_message(&data, &mut sink).expect("message");
        assert_eq!(
            sink.things(from),
            vec![Thing::Item(Item::new(ItemTypeId(0x0c80)))]
        );
        assert_eq!(sink.events, vec![GameEvent::Ping]);
    }

    #[test]
    fn transform_with_creature_marker_turns_creature() {
        let mut sink = MapMirror::new();
        let mut game = started(&mut sink);
        let position = Position::new(100, 100, 7);
        let data = message(|w| {
            write_add_creature(w, position, RAT, "rat");
            w.write_u8(OPCODE_TILE_CHANGE_THING);
            write_position(w, position);
            w.write_u8(0);
            w.write_u16_le(CREATURE_MARKER_KNOWN);
            w.write_u32_le(RAT);
            w.write_u8(3);
        });
        game.parse_message(&data, &mut sink).expect("turn");
        let rat = game.creatures().get(RAT).expect("rat");
        assert_eq!(rat.borrow().direction, Direction::West);
        assert_eq!(sink.things(position).len(), 1);
        assert_eq!(
            sink.updates,
            vec![(RAT, CreatureField::Direction(Direction::West))]
        );
    }

    #[test]
    fn transform_item_replaces_stack_position() {
        let mut sink = MapMirror::new();
        let mut game = started(&mut sink);
        let position = Position::new(100, 100, 7);
        let data = message(|w| {
            w.write_u8(OPCODE_TILE_ADD_THING);
            write_position(w, position);
            w.write_u8(0);
            w.write_u16_le(0x0101);
            w.write_u8(OPCODE_TILE_CHANGE_THING);
            write_position(w, position);
            w.write_u8(0);
            w.write_u16_le(0x0202);
        });
        game.parse_message(&data, &mut sink).expect("transform");
        assert_eq!(
            sink.things(position),
            vec![Thing::Item(Item::new(ItemTypeId(0x0202)))]
        );
    }

    #[test]
    fn field_data_redescribes_or_clears_tile() {
        let mut sink = MapMirror::new();
        let mut game = started(&mut sink);
        let position = Position::new(100, 100, 7);
        let described = message(|w| {
            w.write_u8(OPCODE_FIELD_DATA);
            write_position(w, position);
            w.write_u16_le(0x0101);
            w.write_u16_le(0x0102);
            w.write_u16_le(0xff00);
        });
        game.parse_message(&described, &mut sink).expect("describe");
        assert_eq!(sink.things(position).len(), 2);

        let cleared = message(|w| {
            w.write_u8(OPCODE_FIELD_DATA);
            write_position(w, position);
            w.write_u16_le(FIELD_CLEARED_MARKER);
        });
        game.parse_message(&cleared, &mut sink).expect("clear");
        assert!(sink.tile(position).is_none());
    }

    #[test]
    fn creature_field_updates_apply_to_known_creature() {
        let mut sink = MapMirror::new();
        let mut game = started(&mut sink);
        let data = message(|w| {
            write_add_creature(w, Position::new(100, 100, 7), RAT, "rat");
            w.write_u8(OPCODE_CREATURE_HEALTH);
            w.write_u32_le(RAT);
            w.write_u8(40);
            w.write_u8(OPCODE_CREATURE_LIGHT);
            w.write_u32_le(RAT);
            w.write_u8(3);
            w.write_u8(0xd7);
            w.write_u8(OPCODE_CREATURE_SPEED);
            w.write_u32_le(RAT);
            w.write_u16_le(300);
            w.write_u8(OPCODE_CREATURE_MARK);
            w.write_u32_le(RAT);
            w.write_u8(9);
        });
        game.parse_message(&data, &mut sink).expect("updates");
        let rat = game.creatures().get(RAT).expect("rat");
        let rat = rat.borrow();
        assert_eq!(rat.health_percent, 40);
        assert_eq!(rat.light, Light { intensity: 3, color: 0xd7 });
        assert_eq!(rat.speed, 300);
        assert_eq!(rat.square, Some(9));
        assert_eq!(sink.updates.len(), 4);
    }

    #[test]
    fn creature_field_for_unknown_id_is_consumed() {
        let mut sink = MapMirror::new();
        let mut game = game();
        let data = message(|w| {
            w.write_u8(OPCODE_CREATURE_OUTFIT);
            w.write_u32_le(RAT);
            w.write_u16_le(0);
            w.write_u16_le(0x0bb8);
            w.write_u8(OPCODE_PING);
        });
        game.parse_message(&data, &mut sink).expect("message");
        assert!(sink.updates.is_empty());
        assert_eq!(sink.events, vec![GameEvent::Ping]);
    }

    #[test]
    fn death_penalty_depends_on_protocol_version() {
        let mut sink = MapMirror::new();
        let mut old = game();
        old.parse_message(&[OPCODE_DEATH], &mut sink).expect("860");
        let mut config = ProtocolConfig::default();
        config.protocol_version = 862;
        let mut new = ProtocolGame::new(config, None);
        new.parse_message(&[OPCODE_DEATH, 30], &mut sink).expect("862");
        assert_eq!(
            sink.events,
            vec![
                GameEvent::Death { penalty: 100 },
                GameEvent::Death { penalty: 30 }
            ]
        );
    }

    #[test]
    fn talk_targets_follow_speak_type() {
        let mut sink = MapMirror::new();
        let mut game = game();
        let data = message(|w| {
            w.write_u8(OPCODE_TALK);
            w.write_u32_le(0);
            w.write_string_str("Knight");
            w.write_u16_le(20);
            w.write_u8(0x01);
            write_position(w, Position::new(100, 100, 7));
            w.write_string_str("hi");
            w.write_u8(OPCODE_TALK);
            w.write_u32_le(0);
            w.write_string_str("Knight");
            w.write_u16_le(20);
            w.write_u8(0x07);
            w.write_u16_le(5);
            w.write_string_str("trade");
            w.write_u8(OPCODE_TALK);
            w.write_u32_le(0);
            w.write_string_str("Gamemaster");
            w.write_u16_le(1);
            w.write_u8(0x0c);
            w.write_string_str("server save");
        });
        game.parse_message(&data, &mut sink).expect("talk");
        let targets: Vec<SpeakTarget> = sink
            .events
            .iter()
            .filter_map(|event| match event {
                GameEvent::CreatureSpeak { target, .. } => Some(target.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            targets,
            vec![
                SpeakTarget::Position(Position::new(100, 100, 7)),
                SpeakTarget::Channel(5),
                SpeakTarget::Untargeted
            ]
        );
    }

    #[test]
    fn container_open_reads_counted_items() {
        let mut sink = MapMirror::new();
        let mut items = ItemTypeIndex::default();
        items
            .insert(crate::world::item_types::ItemType {
                id: ItemTypeId(3031),
                name: "gold coin".to_string(),
                stackable: true,
                fluid_container: false,
                fluid: false,
            })
            .expect("insert");
        let mut game = ProtocolGame::new(ProtocolConfig::default(), Some(items));
        let data = message(|w| {
            w.write_u8(OPCODE_OPEN_CONTAINER);
            w.write_u8(0);
            w.write_u16_le(1987);
            w.write_string_str("bag");
            w.write_u8(8);
            w.write_u8(0);
            w.write_u8(2);
            w.write_u16_le(3031);
            w.write_u8(50);
            w.write_u16_le(2160);
        });
        game.parse_message(&data, &mut sink).expect("container");
        assert_eq!(
            sink.events,
            vec![GameEvent::ContainerOpened {
                container_id: 0,
                item_id: 1987,
                name: "bag".to_string(),
                capacity: 8,
                has_parent: false,
                items: vec![
                    Item {
                        type_id: ItemTypeId(3031),
                        count_or_subtype: Some(50)
                    },
                    Item::new(ItemTypeId(2160)),
                ],
            }]
        );
    }

    #[test]
    fn discarded_windows_are_skipped_exactly() {
        let mut sink = MapMirror::new();
        let mut game = game();
        let data = message(|w| {
            w.write_u8(OPCODE_SHOP_OPEN);
            w.write_u8(1);
            w.write_u16_le(2160);
            w.write_u8(0);
            w.write_string_str("crystal coin");
            w.write_u32_le(10);
            w.write_u32_le(10000);
            w.write_u32_le(10000);
            w.write_u8(OPCODE_SHOP_SELL_LIST);
            w.write_u32_le(500);
            w.write_u8(1);
            w.write_u16_le(2160);
            w.write_u8(1);
            w.write_u8(OPCODE_QUEST_LINE);
            w.write_u16_le(4);
            w.write_u8(1);
            w.write_string_str("mission");
            w.write_string_str("description");
            w.write_u8(OPCODE_RIGHTS);
            for _ in 0..GM_ACTION_COUNT {
                w.write_u8(0);
            }
            w.write_u8(OPCODE_PING);
        });
        game.parse_message(&data, &mut sink).expect("message");
        assert_eq!(sink.events, vec![GameEvent::Ping]);
    }
}
