use crate::config::{AwareRange, FloorLayout};
use crate::net::error::DecodeError;
use crate::world::position::Position;

/// One floor's rectangle of cells in a map stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloorSlice {
    pub origin_x: i32,
    pub origin_y: i32,
    pub z: u8,
    pub width: u16,
    pub height: u16,
    /// Perspective shift applied to both axes.
    pub offset: i32,
}

impl FloorSlice {
    pub fn cell(&self, dx: u16, dy: u16) -> Position {
        Position::wrapping(
            self.origin_x + i32::from(dx) + self.offset,
            self.origin_y + i32::from(dy) + self.offset,
            self.z,
        )
    }

    pub fn cell_count(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    North,
    East,
    South,
    West,
}

/// A pending recenter together with the floors to decode for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowShift {
    pub center: Position,
    pub slices: Vec<FloorSlice>,
}

/// Tracks the area of the world the server currently streams to the client.
#[derive(Debug, Clone)]
pub struct InterestWindow {
    center: Option<Position>,
    aware: AwareRange,
    floors: FloorLayout,
}

impl InterestWindow {
    pub fn new(aware: AwareRange, floors: FloorLayout) -> Self {
        Self {
            center: None,
            aware,
            floors,
        }
    }

    pub fn center(&self) -> Option<Position> {
        self.center
    }

    pub fn set_center(&mut self, center: Position) {
        self.center = Some(center);
    }

    /// Floors covered by a full description around `center`.
    pub fn full_map(&self, center: Position) -> Vec<FloorSlice> {
        let (x, y) = self.top_left(center);
        self.visible_floors(center, x, y, self.aware.width(), self.aware.height())
    }

    pub fn scroll(&self, direction: ScrollDirection) -> Result<WindowShift, DecodeError> {
        let current = self.require_center()?;
        let (cx, cy) = (i32::from(current.x), i32::from(current.y));
        let (cx, cy) = match direction {
            ScrollDirection::North => (cx, cy - 1),
            ScrollDirection::East => (cx + 1, cy),
            ScrollDirection::South => (cx, cy + 1),
            ScrollDirection::West => (cx - 1, cy),
        };
        let center = Position::wrapping(cx, cy, current.z);
        let (left, top) = self.top_left(center);
        let (x, y, width, height) = match direction {
            ScrollDirection::North => (left, top, self.aware.width(), 1),
            ScrollDirection::West => (left, top, 1, self.aware.height()),
            ScrollDirection::East => (
                i32::from(center.x) + i32::from(self.aware.right),
                top,
                1,
                self.aware.height(),
            ),
            ScrollDirection::South => (
                left,
                i32::from(center.y) + i32::from(self.aware.bottom),
                self.aware.width(),
                1,
            ),
        };
        Ok(WindowShift {
            center,
            slices: self.visible_floors(center, x, y, width, height),
        })
    }

    /// The new floor coming into view when the client climbs one level.
    pub fn floor_up(&self) -> Result<WindowShift, DecodeError> {
        let current = self.require_center()?;
        let z = current.z.saturating_sub(1);
        let floors = &self.floors;
        let planes: Vec<u8> = if z == floors.sea_floor {
            (0..=floors.sea_floor - floors.underground_range).rev().collect()
        } else if z > floors.sea_floor {
            vec![z - floors.underground_range]
        } else {
            Vec::new()
        };
        let slices = self.change_slices(current, &planes);
        let center = Position::wrapping(i32::from(current.x) + 1, i32::from(current.y) + 1, z);
        Ok(WindowShift { center, slices })
    }

    /// The new floor coming into view when the client descends one level.
    pub fn floor_down(&self) -> Result<WindowShift, DecodeError> {
        let current = self.require_center()?;
        let z = current.z.saturating_add(1);
        let floors = &self.floors;
        let planes: Vec<u8> = if z == floors.underground_floor {
            (z..=z + floors.underground_range).collect()
        } else if z > floors.underground_floor
            && u16::from(z) + u16::from(floors.underground_range) <= u16::from(floors.max_z)
        {
            vec![z + floors.underground_range]
        } else {
            Vec::new()
        };
        let slices = self.change_slices(current, &planes);
        let center = Position::wrapping(i32::from(current.x) - 1, i32::from(current.y) - 1, z);
        Ok(WindowShift { center, slices })
    }

    fn require_center(&self) -> Result<Position, DecodeError> {
        self.center.ok_or(DecodeError::NoInterestWindow)
    }

    fn top_left(&self, center: Position) -> (i32, i32) {
        (
            i32::from(center.x) - i32::from(self.aware.left),
            i32::from(center.y) - i32::from(self.aware.top),
        )
    }

    fn visible_floors(
        &self,
        center: Position,
        x: i32,
        y: i32,
        width: u16,
        height: u16,
    ) -> Vec<FloorSlice> {
        let floors = &self.floors;
        let z = center.z;
        let planes: Vec<u8> = if z > floors.sea_floor {
            let start = z.saturating_sub(floors.underground_range);
            let end = z.saturating_add(floors.underground_range).min(floors.max_z);
            (start..=end).collect()
        } else {
            (0..=floors.sea_floor).rev().collect()
        };
        planes
            .into_iter()
            .map(|plane| FloorSlice {
                origin_x: x,
                origin_y: y,
                z: plane,
                width,
                height,
                offset: i32::from(z) - i32::from(plane),
            })
            .collect()
    }

    /// Floor change strips are laid out against the window before the move,
    /// so the offset is taken from the old floor.
    fn change_slices(&self, current: Position, planes: &[u8]) -> Vec<FloorSlice> {
        let (x, y) = self.top_left(current);
        planes
            .iter()
            .map(|&plane| FloorSlice {
                origin_x: x,
                origin_y: y,
                z: plane,
                width: self.aware.width(),
                height: self.aware.height(),
                offset: i32::from(current.z) - i32::from(plane),
            })
            .collect()
    }
}
