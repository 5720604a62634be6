pub mod capture;
pub mod error;
pub mod events;
pub mod game;
pub mod map_stream;
pub mod packet;
pub mod thing;
