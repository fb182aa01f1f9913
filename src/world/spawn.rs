use super::grid::{Coord, Grid};
use super::snake::{Rgb, Snake};
use rand::{
    seq::{IteratorRandom, SliceRandom},
    Rng,
};
use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use thiserror::Error;

/// Create one single-segment snake per color, each at a distinct cell whose
/// coordinates both lie in `start` (clamped to the grid).  If that square is
/// too small to fit everyone, the whole grid is used instead.
pub(crate) fn spawn_snakes<R: Rng>(
    colors: &[Rgb],
    grid: Grid,
    start: RangeInclusive<i32>,
    rng: &mut R,
) -> Result<Vec<Snake>, SpawnError> {
    let mut candidates = grid
        .cells()
        .filter(|c| start.contains(&c.x) && start.contains(&c.y))
        .collect::<Vec<_>>();
    if candidates.len() < colors.len() {
        candidates = grid.cells().collect();
    }
    if candidates.len() < colors.len() {
        return Err(SpawnError {
            snakes: colors.len(),
            grid,
        });
    }
    let mut heads = candidates.into_iter().choose_multiple(rng, colors.len());
    // `choose_multiple` does not promise a random order
    heads.shuffle(rng);
    Ok(colors
        .iter()
        .zip(heads)
        .map(|(&color, head)| Snake::new(color, head))
        .collect())
}

/// Scatter `count` pieces of food over distinct cells of the grid.  Fewer are
/// placed if the grid has fewer than `count` cells.
pub(crate) fn spawn_food<R: Rng>(grid: Grid, count: usize, rng: &mut R) -> BTreeSet<Coord> {
    grid.cells().choose_multiple(rng, count).into_iter().collect()
}

#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error("cannot place {snakes} snakes on a {}x{} grid", grid.width(), grid.height())]
pub(crate) struct SpawnError {
    snakes: usize,
    grid: Grid,
}
