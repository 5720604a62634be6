use crate::net::error::DecodeError;
use crate::net::events::WorldSink;
use crate::net::packet::PacketReader;
use crate::net::thing::{DecodedThing, ThingDecoder};
use crate::world::position::Position;
use crate::world::viewport::FloorSlice;

/// Any u16 at or above this value ends a tile and encodes a skip count.
pub const TILE_END_MARKER: u16 = 0xff00;

/// Decodes things onto one tile until the end marker, which is left unread.
pub fn read_tile_things(
    reader: &mut PacketReader,
    decoder: &mut ThingDecoder<'_>,
    sink: &mut dyn WorldSink,
    position: Position,
    max_tile_things: usize,
) -> Result<(), DecodeError> {
    let mut slots = 0usize;
    let mut added = 0usize;
    while reader.peek_u16_le()? < TILE_END_MARKER {
        if slots == max_tile_things {
            tracing::warn!(%position, limit = max_tile_things, "tile exceeds stack limit");
        }
        match decoder.read_thing(reader, sink)? {
            DecodedThing::Thing(thing) => {
                let stack_pos = u8::try_from(added).unwrap_or(u8::MAX);
                sink.thing_added(position, thing, stack_pos);
                added += 1;
            }
            DecodedThing::Turned { .. } => {}
            DecodedThing::Skipped(err) => {
                tracing::debug!(%position, slot = slots, error = %err, "tile thing skipped");
            }
        }
        slots += 1;
    }
    Ok(())
}

/// Decodes one floor slice and returns the run-length skip left over for the
/// next slice.
pub fn read_floor(
    reader: &mut PacketReader,
    decoder: &mut ThingDecoder<'_>,
    sink: &mut dyn WorldSink,
    slice: &FloorSlice,
    mut skip: u16,
    max_tile_things: usize,
) -> Result<u16, DecodeError> {
    for dx in 0..slice.width {
        for dy in 0..slice.height {
            let position = slice.cell(dx, dy);
            sink.tile_cleared(position);
            if skip > 0 {
                skip -= 1;
                continue;
            }
            if reader.peek_u16_le()? < TILE_END_MARKER {
                read_tile_things(reader, decoder, sink, position, max_tile_things)?;
            }
            skip = reader.read_u16_le()? & 0x00ff;
        }
    }
    Ok(skip)
}

/// Decodes several slices sharing one skip counter.
pub fn read_floors(
    reader: &mut PacketReader,
    decoder: &mut ThingDecoder<'_>,
    sink: &mut dyn WorldSink,
    slices: &[FloorSlice],
    max_tile_things: usize,
) -> Result<u16, DecodeError> {
    let mut skip = 0;
    for slice in slices {
        skip = read_floor(reader, decoder, sink, slice, skip, max_tile_things)?;
    }
    Ok(skip)
}
