use super::grid::Grid;
use super::snake::Snake;

/// Is the head of `roster[index]` in a losing position?
///
/// A head collides when it is off the board, when it lies on its own body, or
/// when it lies on any cell (head included) of another snake in the roster.
/// Snakes are told apart by their position in the roster, so two snakes that
/// happen to be equal are still checked against each other.
///
/// Returns `false` if `index` is out of range.
pub(crate) fn is_colliding(index: usize, roster: &[Snake], grid: Grid) -> bool {
    let Some(snake) = roster.get(index) else {
        return false;
    };
    let head = snake.head();
    !grid.contains(head)
        || snake.tail().any(|&c| c == head)
        || roster
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != index)
            .any(|(_, other)| other.coords().contains(&head))
}
