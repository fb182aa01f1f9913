use super::direction::Direction;
use super::grid::Coord;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// A display color given as red, green & blue components
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub(crate) struct Rgb {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
}

impl Rgb {
    pub(crate) const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub(crate) const fn new(r: u8, g: u8, b: u8) -> Rgb {
        Rgb { r, g, b }
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Rgb {
        Rgb { r, g, b }
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(c: Rgb) -> [u8; 3] {
        [c.r, c.g, c.b]
    }
}

impl From<Rgb> for ratatui::style::Color {
    fn from(c: Rgb) -> ratatui::style::Color {
        ratatui::style::Color::Rgb(c.r, c.g, c.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Snake state.
///
/// The body is stored head-first.  It is never empty, and its length is fixed
/// when the snake is created: moving pushes a new head and drops the tail.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Snake {
    color: Rgb,
    coords: VecDeque<Coord>,
}

impl Snake {
    /// Create a one-segment snake with its head at `head`
    pub(crate) fn new(color: Rgb, head: Coord) -> Snake {
        Snake {
            color,
            coords: VecDeque::from([head]),
        }
    }

    /// Create a snake from an explicit head-first body.  Returns `None` if
    /// `coords` is empty.
    #[cfg(test)]
    pub(crate) fn with_body<I: IntoIterator<Item = Coord>>(color: Rgb, coords: I) -> Option<Snake> {
        let coords = coords.into_iter().collect::<VecDeque<_>>();
        (!coords.is_empty()).then_some(Snake { color, coords })
    }

    pub(crate) fn color(&self) -> Rgb {
        self.color
    }

    /// Return the position of the snake's head
    pub(crate) fn head(&self) -> Coord {
        self.coords.front().copied().unwrap_or_default()
    }

    /// Return every cell of the snake, head first
    pub(crate) fn coords(&self) -> &VecDeque<Coord> {
        &self.coords
    }

    /// Return every cell of the snake except the head
    pub(crate) fn tail(&self) -> impl Iterator<Item = &Coord> {
        self.coords.iter().skip(1)
    }

    /// Move the snake one block in `direction`.  No bounds or collision
    /// checking happens here; the new position is judged on the snake's next
    /// turn.
    pub(crate) fn advance(&mut self, direction: Direction) {
        let new_head = self.head() + direction.delta();
        self.coords.push_front(new_head);
        let _ = self.coords.pop_back();
    }
}

impl fmt::Display for Snake {
    /// Formats as `Color: (r, g, b)` followed by a `Coords: [...]` line
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Color: {}", self.color)?;
        write!(f, "Coords: [")?;
        for (i, c) in self.coords.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, "]")
    }
}
