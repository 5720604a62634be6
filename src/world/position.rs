use crate::net::error::DecodeError;
use crate::net::packet::PacketReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: u16,
    pub y: u16,
    pub z: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    North,
    East,
    South,
    West,
    Northeast,
    Southeast,
    Southwest,
    Northwest,
}

impl Position {
    pub fn new(x: u16, y: u16, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Builds a map coordinate from window arithmetic, wrapping like the
    /// 16-bit wire fields do.
    pub fn wrapping(x: i32, y: i32, z: u8) -> Self {
        Self {
            x: x as u16,
            y: y as u16,
            z,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl Direction {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Direction::North),
            1 => Some(Direction::East),
            2 => Some(Direction::South),
            3 => Some(Direction::West),
            4 => Some(Direction::Northeast),
            5 => Some(Direction::Southeast),
            6 => Some(Direction::Southwest),
            7 => Some(Direction::Northwest),
            _ => None,
        }
    }
}

pub fn read_position(reader: &mut PacketReader) -> Result<Position, DecodeError> {
    let x = reader.read_u16_le()?;
    let y = reader.read_u16_le()?;
    let z = reader.read_u8()?;
    Ok(Position { x, y, z })
}

#[cfg(test)]
pub(crate) fn write_position(writer: &mut crate::net::packet::PacketWriter, position: Position) {
    writer.write_u16_le(position.x);
    writer.write_u16_le(position.y);
    writer.write_u8(position.z);
}
