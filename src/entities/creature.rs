use crate::world::position::Direction;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

pub const EFFECT_OUTFIT_ID: u16 = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CreatureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatureKind {
    LocalPlayer,
    Player,
    Monster,
    Npc,
}

/// Visual descriptor of a creature. A zero look id escapes to an item or
/// effect appearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outfit {
    Creature {
        look_type: u16,
        head: u8,
        body: u8,
        legs: u8,
        feet: u8,
        addons: u8,
    },
    Item { look_item: u16 },
    Effect { id: u16 },
}

impl Default for Outfit {
    fn default() -> Self {
        Outfit::Effect {
            id: EFFECT_OUTFIT_ID,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Light {
    pub intensity: u8,
    pub color: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Creature {
    pub id: CreatureId,
    pub name: String,
    pub kind: CreatureKind,
    pub health_percent: u8,
    pub direction: Direction,
    pub outfit: Outfit,
    pub light: Light,
    pub speed: u16,
    pub skull: u8,
    pub shield: u8,
    pub emblem: Option<u8>,
    pub passable: bool,
    pub square: Option<u8>,
    /// Set once the server has described this creature to the client.
    pub known: bool,
}

impl Creature {
    pub fn new(id: CreatureId, name: String, kind: CreatureKind) -> Self {
        Self {
            id,
            name,
            kind,
            health_percent: 100,
            direction: Direction::South,
            outfit: Outfit::default(),
            light: Light::default(),
            speed: 0,
            skull: 0,
            shield: 0,
            emblem: None,
            passable: false,
            square: None,
            known: false,
        }
    }
}

/// Shared handle to a creature owned by the identity registry. Clones point
/// at the same creature.
#[derive(Debug, Clone)]
pub struct CreatureHandle(Rc<RefCell<Creature>>);

impl CreatureHandle {
    pub fn new(creature: Creature) -> Self {
        Self(Rc::new(RefCell::new(creature)))
    }

    pub fn id(&self) -> CreatureId {
        self.0.borrow().id
    }

    pub fn borrow(&self) -> Ref<'_, Creature> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Creature> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &CreatureHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for CreatureHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for CreatureHandle {}
