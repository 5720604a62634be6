pub mod creatures;
pub mod item_types;
pub mod map;
pub mod position;
pub mod tasks;
pub mod viewport;
