use super::{Decision, DecisionOutcome, DecisionProvider, DecisionRequest, ProviderError};
use crate::world::{Coord, Direction};

/// Offline provider: step towards the nearest food without leaving the board
/// or running into a snake
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct GreedyProvider;

impl GreedyProvider {
    pub(crate) fn choose(request: &DecisionRequest<'_>) -> Decision {
        let head = request.snake().head();
        let best = Direction::ALL
            .into_iter()
            .map(|d| (d, head + d.delta()))
            .filter(|&(_, pos)| request.grid().contains(pos) && !request.occupied(pos))
            .min_by_key(|&(_, pos)| nearest_food(pos, request));
        match best {
            Some((d, pos)) => {
                let explanation = match nearest_food(pos, request) {
                    Some(dist) => format!("Free cell, {dist} blocks from the nearest food"),
                    None => String::from("Free cell, no food on the board"),
                };
                Decision::new(d).with_explanation(explanation)
            }
            None => Decision::new(Direction::Up).with_explanation("Boxed in"),
        }
    }
}

/// Distance from `pos` to the closest food.  `None` sorts before any
/// distance, which is fine as it means there is no food at all.
fn nearest_food(pos: Coord, request: &DecisionRequest<'_>) -> Option<u32> {
    request.food().iter().map(|&f| pos.distance(f)).min()
}

impl DecisionProvider for GreedyProvider {
    fn decide(&mut self, request: &DecisionRequest<'_>) -> Result<DecisionOutcome, ProviderError> {
        Ok(DecisionOutcome::Valid(GreedyProvider::choose(request)))
    }
}
