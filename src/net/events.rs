use crate::entities::creature::{CreatureHandle, Light, Outfit};
use crate::entities::item::Item;
use crate::net::error::DecodeError;
use crate::world::position::{Direction, Position};

/// A decoded map entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Thing {
    Creature(CreatureHandle),
    Item(Item),
}

impl Thing {
    pub fn as_creature(&self) -> Option<&CreatureHandle> {
        match self {
            Thing::Creature(handle) => Some(handle),
            Thing::Item(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatureField {
    Health(u8),
    Direction(Direction),
    Outfit(Outfit),
    Light(Light),
    Speed(u16),
    Skull(u8),
    Shield(u8),
    Square(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerStats {
    pub health: u16,
    pub max_health: u16,
    /// Hundredths of an ounce.
    pub free_capacity: u32,
    pub experience: u32,
    pub level: u16,
    pub level_percent: u8,
    pub mana: u16,
    pub max_mana: u16,
    pub magic_level: u8,
    pub magic_level_percent: u8,
    pub soul: u8,
    pub stamina: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkillLevel {
    pub level: u8,
    pub percent: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutfitChoice {
    pub look_type: u16,
    pub name: String,
    pub addons: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakTarget {
    Position(Position),
    Channel(u16),
    /// Private messages and broadcasts carry no location.
    Untargeted,
    RuleViolation(u32),
    Unknown,
}

/// Everything the decoder reports besides tile and creature mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    GameStarted {
        player_id: u32,
        server_beat: u16,
        can_report_bugs: bool,
    },
    LoginComplete,
    LoginError(String),
    LoginAdvice(String),
    LoginWait {
        message: String,
        seconds: u8,
    },
    Ping,
    Death {
        penalty: u8,
    },
    WorldLight(Light),
    MagicEffect {
        position: Position,
        effect: u8,
    },
    AnimatedText {
        position: Position,
        color: u8,
        text: String,
    },
    Missile {
        from: Position,
        to: Position,
        missile: u8,
    },
    ContainerOpened {
        container_id: u8,
        item_id: u16,
        name: String,
        capacity: u8,
        has_parent: bool,
        items: Vec<Item>,
    },
    ContainerClosed {
        container_id: u8,
    },
    ContainerItemAdded {
        container_id: u8,
        item: Item,
    },
    ContainerItemUpdated {
        container_id: u8,
        slot: u8,
        item: Item,
    },
    ContainerItemRemoved {
        container_id: u8,
        slot: u8,
    },
    InventoryChanged {
        slot: u8,
        item: Option<Item>,
    },
    TradeOffer {
        counter: bool,
        name: String,
        items: Vec<Item>,
    },
    TradeClosed,
    PlayerStats(PlayerStats),
    PlayerSkills(Vec<SkillLevel>),
    PlayerIcons(u16),
    AttackCancelled,
    CreatureSpeak {
        name: String,
        level: u16,
        speak_type: u8,
        target: SpeakTarget,
        message: String,
    },
    ChannelList(Vec<(u16, String)>),
    ChannelOpened {
        channel_id: u16,
        name: String,
    },
    PrivateChannelOpened {
        name: String,
    },
    OwnChannelOpened {
        channel_id: u16,
        name: String,
    },
    ChannelClosed {
        channel_id: u16,
    },
    TextMessage {
        message_type: u8,
        text: String,
    },
    WalkCancelled(Direction),
    OutfitWindow {
        outfit: Outfit,
        choices: Vec<OutfitChoice>,
    },
    VipAdded {
        id: u32,
        name: String,
        online: bool,
    },
    VipStateChanged {
        id: u32,
        online: bool,
    },
}

/// The world model the decoder writes into.
pub trait WorldSink {
    fn tile_cleared(&mut self, position: Position);

    fn thing_added(&mut self, position: Position, thing: Thing, stack_pos: u8);

    /// Returns false when nothing sits at `stack_pos`.
    fn thing_removed(&mut self, position: Position, stack_pos: u8) -> bool;

    fn thing_at(&self, position: Position, stack_pos: u8) -> Option<Thing>;

    fn creature_moved(&mut self, creature: &CreatureHandle, from: Position, to: Position);

    fn creature_updated(&mut self, creature_id: u32, field: CreatureField);

    fn creature_evicted(&mut self, _creature_id: u32) {}

    fn window_recentered(&mut self, center: Position);

    fn decode_aborted(&mut self, opcode: u8, error: &DecodeError);

    fn game_event(&mut self, _event: GameEvent) {}
}
