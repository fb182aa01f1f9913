use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;
use thiserror::Error;

/// A position on the board, measured in blocks from the top-left corner.
///
/// Coordinates are signed and unconstrained; a snake's head is allowed to
/// leave the board, and it's the collision check that notices.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub(crate) struct Coord {
    pub(crate) x: i32,
    pub(crate) y: i32,
}

impl Coord {
    pub(crate) const fn new(x: i32, y: i32) -> Coord {
        Coord { x, y }
    }

    /// Manhattan distance between two coordinates
    pub(crate) fn distance(self, other: Coord) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl Add<(i32, i32)> for Coord {
    type Output = Coord;

    fn add(self, (dx, dy): (i32, i32)) -> Coord {
        Coord {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }
}

impl From<(i32, i32)> for Coord {
    fn from((x, y): (i32, i32)) -> Coord {
        Coord { x, y }
    }
}

impl From<Coord> for (i32, i32) {
    fn from(c: Coord) -> (i32, i32) {
        (c.x, c.y)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The dimensions of the board in blocks.  Both dimensions are always
/// positive.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(into = "(u16, u16)")]
pub(crate) struct Grid {
    width: u16,
    height: u16,
}

impl Grid {
    pub(crate) fn new(width: u16, height: u16) -> Result<Grid, GridError> {
        if width == 0 || height == 0 {
            Err(GridError { width, height })
        } else {
            Ok(Grid { width, height })
        }
    }

    pub(crate) fn width(self) -> u16 {
        self.width
    }

    pub(crate) fn height(self) -> u16 {
        self.height
    }

    /// Is `pos` within `[0, width) × [0, height)`?
    pub(crate) fn contains(self, pos: Coord) -> bool {
        (0..i32::from(self.width)).contains(&pos.x) && (0..i32::from(self.height)).contains(&pos.y)
    }

    /// Iterate over every cell of the grid, row by row
    pub(crate) fn cells(self) -> impl Iterator<Item = Coord> {
        (0..i32::from(self.height))
            .flat_map(move |y| (0..i32::from(self.width)).map(move |x| Coord::new(x, y)))
    }
}

impl From<Grid> for (u16, u16) {
    fn from(g: Grid) -> (u16, u16) {
        (g.width, g.height)
    }
}

#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error("grid dimensions must be positive, got {width}x{height}")]
pub(crate) struct GridError {
    width: u16,
    height: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn zero_sized_grid_is_rejected() {
        assert!(Grid::new(0, 10).is_err());
        assert!(Grid::new(10, 0).is_err());
        assert!(Grid::new(1, 1).is_ok());
    }

    #[rstest]
    #[case(Coord::new(0, 0), true)]
    #[case(Coord::new(19, 9), true)]
    #[case(Coord::new(20, 9), false)]
    #[case(Coord::new(19, 10), false)]
    #[case(Coord::new(-1, 5), false)]
    #[case(Coord::new(5, -1), false)]
    fn test_contains(#[case] pos: Coord, #[case] inside: bool) {
        let grid = Grid::new(20, 10).unwrap();
        assert_eq!(grid.contains(pos), inside);
    }

    #[test]
    fn cells_cover_grid() {
        let grid = Grid::new(3, 2).unwrap();
        let cells = grid.cells().collect::<Vec<_>>();
        assert_eq!(
            cells,
            [
                Coord::new(0, 0),
                Coord::new(1, 0),
                Coord::new(2, 0),
                Coord::new(0, 1),
                Coord::new(1, 1),
                Coord::new(2, 1),
            ]
        );
    }

    #[test]
    fn coord_serializes_as_pair() {
        let s = serde_json::to_string(&vec![Coord::new(5, 5), Coord::new(-1, 3)]).unwrap();
        assert_eq!(s, "[[5,5],[-1,3]]");
    }
}
