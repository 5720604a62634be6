pub mod creature;
pub mod item;
