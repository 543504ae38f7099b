//! Grid coordinates and headings.
//!
//! `x` grows towards [`Direction::East`], `y` grows towards
//! [`Direction::South`]. Both types are small `Copy` values. Stepping
//! is checked: the coordinate space ends at the `i32` limits.

use std::fmt;

/// A cell coordinate on the playfield.
///
/// # Examples
///
/// ```
/// use gridsim_core::{Direction, Position};
///
/// let origin = Position::new(0, 0);
/// assert_eq!(origin.adjacent(Direction::East), Some(Position::new(1, 0)));
/// assert_eq!(origin.adjacent(Direction::North), Some(Position::new(0, -1)));
/// assert_eq!(Position::new(i32::MAX, 0).adjacent(Direction::East), None);
/// assert_eq!(origin.to_string(), "(x=0, y=0)");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    /// Column; negative towards West, positive towards East.
    pub x: i32,
    /// Row; negative towards North, positive towards South.
    pub y: i32,
}

impl Position {
    /// Create a position from its coordinates.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The position shifted by `(dx, dy)`, or `None` past the edge of
    /// the `i32` coordinate space.
    pub const fn offset(self, dx: i32, dy: i32) -> Option<Self> {
        match (self.x.checked_add(dx), self.y.checked_add(dy)) {
            (Some(x), Some(y)) => Some(Self::new(x, y)),
            _ => None,
        }
    }

    /// The neighbouring cell in `direction`; `None` at the coordinate edge.
    pub fn adjacent(self, direction: Direction) -> Option<Self> {
        let (dx, dy) = direction.offset();
        self.offset(dx, dy)
    }

    /// Manhattan distance to `other`.
    pub fn manhattan(self, other: Position) -> u64 {
        u64::from(self.x.abs_diff(other.x)) + u64::from(self.y.abs_diff(other.y))
    }

    /// Whether `other` is one of the four cells sharing an edge with `self`.
    pub fn is_adjacent_to(self, other: Position) -> bool {
        self.manhattan(other) == 1
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(x={}, y={})", self.x, self.y)
    }
}

/// One of the four headings an entity can face.
///
/// The set is closed; rotation walks the enumeration in clockwise order
/// `North -> East -> South -> West -> North`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    /// Towards negative `y`.
    North,
    /// Towards positive `x`. The heading of freshly spawned entities.
    #[default]
    East,
    /// Towards positive `y`.
    South,
    /// Towards negative `x`.
    West,
}

impl Direction {
    /// All directions in clockwise order starting at North.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    fn ordinal(self) -> usize {
        self as usize
    }

    /// The next direction turning right.
    pub fn clockwise(self) -> Self {
        Self::ALL[(self.ordinal() + 1) % 4]
    }

    /// The next direction turning left.
    pub fn counter_clockwise(self) -> Self {
        Self::ALL[(self.ordinal() + 3) % 4]
    }

    /// The direction facing the other way.
    pub fn opposite(self) -> Self {
        Self::ALL[(self.ordinal() + 2) % 4]
    }

    /// Unit offset vector `(dx, dy)`.
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn clockwise_cycles_through_all() {
        let mut d = Direction::North;
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(d);
            d = d.clockwise();
        }
        assert_eq!(seen, Direction::ALL.to_vec());
        assert_eq!(d, Direction::North);
    }

    #[test]
    fn default_heading_is_east() {
        assert_eq!(Direction::default(), Direction::East);
    }

    #[test]
    fn position_arithmetic() {
        let a = Position::new(2, -1);
        let b = Position::new(-3, 4);
        assert_eq!(a.offset(b.x, b.y), Some(Position::new(-1, 3)));
        assert_eq!(a.manhattan(b), 10);
        assert!(a.is_adjacent_to(Position::new(2, 0)));
        assert!(!a.is_adjacent_to(Position::new(3, 0)));
    }

    #[test]
    fn stepping_off_the_coordinate_space_is_none() {
        let corner = Position::new(i32::MAX, i32::MIN);
        assert_eq!(corner.adjacent(Direction::East), None);
        assert_eq!(corner.adjacent(Direction::North), None);
        assert_eq!(corner.adjacent(Direction::West), Some(Position::new(i32::MAX - 1, i32::MIN)));
        assert_eq!(corner.offset(i32::MIN, 0), Some(Position::new(-1, i32::MIN)));
        let far = Position::new(i32::MIN, i32::MIN);
        assert_eq!(far.manhattan(Position::new(i32::MAX, i32::MAX)), 2 * u64::from(u32::MAX));
    }

    fn arb_direction() -> impl Strategy<Value = Direction> {
        prop::sample::select(Direction::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn left_undoes_right(d in arb_direction()) {
            prop_assert_eq!(d.clockwise().counter_clockwise(), d);
            prop_assert_eq!(d.opposite().opposite(), d);
            prop_assert_eq!(d.clockwise().clockwise(), d.opposite());
        }

        #[test]
        fn stepping_there_and_back_is_identity(
            x in -1000i32..1000,
            y in -1000i32..1000,
            d in arb_direction(),
        ) {
            let p = Position::new(x, y);
            let next = p.adjacent(d).unwrap();
            prop_assert_eq!(next.adjacent(d.opposite()), Some(p));
            prop_assert!(next.is_adjacent_to(p));
        }
    }
}
