//! Asking an outside party which way each snake should go
mod gemini;
mod greedy;
mod reply;
pub(crate) use self::gemini::GeminiProvider;
pub(crate) use self::greedy::GreedyProvider;
pub(crate) use self::reply::{build_prompt, parse_reply};
use crate::config::{ProviderConfig, ProviderKind};
use crate::world::{Coord, Direction, Grid, ParseDirectionError, Snake};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;

/// A move chosen for one snake on one tick
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Decision {
    pub(crate) direction: Direction,

    /// The provider's reasoning, if it gave any, flattened onto one line
    pub(crate) explanation: Option<String>,
}

impl Decision {
    pub(crate) fn new(direction: Direction) -> Decision {
        Decision {
            direction,
            explanation: None,
        }
    }

    pub(crate) fn with_explanation<S: Into<String>>(mut self, explanation: S) -> Decision {
        self.explanation = Some(explanation.into());
        self
    }

    /// Extract a decision from a reply object of the form `{"move": "up",
    /// "explanation": "..."}`.  A non-string explanation is ignored.
    pub(crate) fn from_reply(value: &Value) -> Result<Decision, InvalidMove> {
        let Some(obj) = value.as_object() else {
            return Err(InvalidMove::NotAnObject);
        };
        let direction = match obj.get("move") {
            None | Some(Value::Null) => return Err(InvalidMove::Missing),
            Some(Value::String(s)) => s.parse::<Direction>()?,
            Some(other) => return Err(InvalidMove::NotAString(other.to_string())),
        };
        let explanation = obj
            .get("explanation")
            .and_then(Value::as_str)
            .map(|s| s.replace('\n', " "));
        Ok(Decision {
            direction,
            explanation,
        })
    }
}

/// What a provider made of one request
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum DecisionOutcome {
    Valid(Decision),
    /// The provider produced nothing usable yet; ask again
    Empty,
    /// The provider replied, but not with a recognizable move
    Malformed(InvalidMove),
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub(crate) enum InvalidMove {
    #[error("reply is not valid JSON: {0}")]
    NotJson(String),
    #[error("reply is not a JSON object")]
    NotAnObject,
    #[error("reply does not contain a move")]
    Missing,
    #[error("move is not a string: {0}")]
    NotAString(String),
    #[error(transparent)]
    Unrecognized(#[from] ParseDirectionError),
}

/// Everything a provider gets to see when choosing a move for one snake
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct DecisionRequest<'a> {
    index: usize,
    snake: &'a Snake,
    opponents: Vec<&'a Snake>,
    food: &'a BTreeSet<Coord>,
    grid: Grid,
}

impl<'a> DecisionRequest<'a> {
    /// Build the request for `roster[index]`.  Returns `None` if `index` is
    /// out of range.
    pub(crate) fn new(
        index: usize,
        roster: &'a [Snake],
        food: &'a BTreeSet<Coord>,
        grid: Grid,
    ) -> Option<DecisionRequest<'a>> {
        let snake = roster.get(index)?;
        let opponents = roster
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != index)
            .map(|(_, s)| s)
            .collect();
        Some(DecisionRequest {
            index,
            snake,
            opponents,
            food,
            grid,
        })
    }

    /// Position of the snake in the roster
    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn snake(&self) -> &'a Snake {
        self.snake
    }

    pub(crate) fn opponents(&self) -> &[&'a Snake] {
        &self.opponents
    }

    pub(crate) fn food(&self) -> &'a BTreeSet<Coord> {
        self.food
    }

    pub(crate) fn grid(&self) -> Grid {
        self.grid
    }

    /// Is `pos` covered by any snake, this one included?
    pub(crate) fn occupied(&self, pos: Coord) -> bool {
        self.snake.coords().contains(&pos) || self.opponents.iter().any(|s| s.coords().contains(&pos))
    }
}

/// Something that can pick a move for a snake
pub(crate) trait DecisionProvider: fmt::Debug {
    /// Make one attempt at a decision.  `Err` means the provider itself
    /// failed and the session cannot go on.
    fn decide(&mut self, request: &DecisionRequest<'_>) -> Result<DecisionOutcome, ProviderError>;
}

impl<P: DecisionProvider + ?Sized> DecisionProvider for Box<P> {
    fn decide(&mut self, request: &DecisionRequest<'_>) -> Result<DecisionOutcome, ProviderError> {
        (**self).decide(request)
    }
}

/// Construct the provider selected by the configuration
pub(crate) fn from_config(config: &ProviderConfig) -> Result<Box<dyn DecisionProvider>, ProviderError> {
    match config.kind {
        ProviderKind::Gemini => Ok(Box::new(GeminiProvider::new(config)?)),
        ProviderKind::Greedy => Ok(Box::new(GreedyProvider)),
    }
}

#[derive(Debug, Error)]
pub(crate) enum ProviderError {
    #[error("environment variable {0} holding the API key is not set")]
    MissingApiKey(String),
    #[error("failed to read system prompt")]
    ReadPrompt(#[source] std::io::Error),
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),
    #[error("request to text-generation API failed")]
    Http(#[from] reqwest::Error),
    #[error("text-generation API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// How to treat a provider that keeps replying with nothing
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct PollPolicy {
    pub(crate) interval: Duration,
    pub(crate) max_polls: Option<NonZeroU32>,
}

impl PollPolicy {
    pub(crate) fn from_config(config: &ProviderConfig) -> PollPolicy {
        PollPolicy {
            interval: config.poll_interval(),
            max_polls: config.max_polls,
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum DecisionFailure {
    #[error(transparent)]
    Invalid(#[from] InvalidMove),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("no decision after {0} polls")]
    Exhausted(u32),
}

/// Ask `provider` for a decision, asking again after `policy.interval`
/// whenever it comes back empty.  Without a `max_polls` limit this blocks
/// until the provider answers.
pub(crate) fn poll_decision<P: DecisionProvider + ?Sized>(
    provider: &mut P,
    request: &DecisionRequest<'_>,
    policy: PollPolicy,
) -> Result<Decision, DecisionFailure> {
    let mut polls = 0u32;
    loop {
        polls = polls.saturating_add(1);
        match provider.decide(request)? {
            DecisionOutcome::Valid(decision) => {
                tracing::debug!(
                    snake = request.index(),
                    polls,
                    direction = %decision.direction,
                    "Received decision"
                );
                return Ok(decision);
            }
            DecisionOutcome::Malformed(e) => return Err(e.into()),
            DecisionOutcome::Empty => {
                if policy.max_polls.is_some_and(|max| polls >= max.get()) {
                    return Err(DecisionFailure::Exhausted(polls));
                }
                tracing::warn!(snake = request.index(), polls, "Empty decision; asking again");
                std::thread::sleep(policy.interval);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;

    /// A provider that plays back canned outcomes in order and records which
    /// snake each request was for
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedProvider {
        script: VecDeque<Result<DecisionOutcome, ProviderError>>,
        pub(crate) asked: Vec<usize>,
        pub(crate) heads_seen: Vec<Coord>,
    }

    impl ScriptedProvider {
        pub(crate) fn new<I>(script: I) -> ScriptedProvider
        where
            I: IntoIterator<Item = Result<DecisionOutcome, ProviderError>>,
        {
            ScriptedProvider {
                script: script.into_iter().collect(),
                asked: Vec::new(),
                heads_seen: Vec::new(),
            }
        }

        pub(crate) fn moves<I: IntoIterator<Item = Direction>>(moves: I) -> ScriptedProvider {
            ScriptedProvider::new(
                moves
                    .into_iter()
                    .map(|d| Ok(DecisionOutcome::Valid(Decision::new(d)))),
            )
        }

        pub(crate) fn remaining(&self) -> usize {
            self.script.len()
        }
    }

    impl DecisionProvider for ScriptedProvider {
        fn decide(&mut self, request: &DecisionRequest<'_>) -> Result<DecisionOutcome, ProviderError> {
            self.asked.push(request.index());
            self.heads_seen
                .extend(request.opponents().iter().map(|s| s.head()));
            self.script.pop_front().unwrap_or(Ok(DecisionOutcome::Empty))
        }
    }

    pub(crate) fn server_error() -> ProviderError {
        ProviderError::Status {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            body: String::from("boom"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{server_error, ScriptedProvider};
    use super::*;
    use crate::world::Rgb;
    use rstest::rstest;
    use serde_json::json;

    fn policy(max_polls: Option<u32>) -> PollPolicy {
        PollPolicy {
            interval: Duration::ZERO,
            max_polls: max_polls.and_then(NonZeroU32::new),
        }
    }

    fn roster() -> Vec<Snake> {
        vec![
            Snake::new(Rgb::new(255, 0, 0), Coord::new(1, 1)),
            Snake::new(Rgb::new(0, 255, 0), Coord::new(2, 2)),
            Snake::new(Rgb::new(0, 0, 255), Coord::new(3, 3)),
        ]
    }

    #[rstest]
    #[case(json!({}), InvalidMove::Missing)]
    #[case(json!({"move": null}), InvalidMove::Missing)]
    #[case(json!({"explanation": "hmm"}), InvalidMove::Missing)]
    #[case(json!({"move": "diagonal"}), InvalidMove::Unrecognized("diagonal".parse::<Direction>().unwrap_err()))]
    #[case(json!({"move": 3}), InvalidMove::NotAString(String::from("3")))]
    #[case(json!(["up"]), InvalidMove::NotAnObject)]
    fn rejected_replies(#[case] value: Value, #[case] err: InvalidMove) {
        assert_eq!(Decision::from_reply(&value), Err(err));
    }

    #[test]
    fn up_without_explanation() {
        let d = Decision::from_reply(&json!({"move": "up"})).unwrap();
        assert_eq!(d, Decision::new(Direction::Up));
        assert_eq!(d.direction.delta(), (0, -1));
    }

    #[test]
    fn explanation_is_flattened() {
        let d = Decision::from_reply(&json!({"move": "left", "explanation": "food\nis\nthere"}))
            .unwrap();
        assert_eq!(d, Decision::new(Direction::Left).with_explanation("food is there"));
    }

    #[test]
    fn request_excludes_own_snake() {
        let roster = roster();
        let food = BTreeSet::new();
        let grid = Grid::new(10, 10).unwrap();
        let req = DecisionRequest::new(1, &roster, &food, grid).unwrap();
        assert_eq!(req.snake().head(), Coord::new(2, 2));
        assert_eq!(
            req.opponents().iter().map(|s| s.head()).collect::<Vec<_>>(),
            [Coord::new(1, 1), Coord::new(3, 3)]
        );
        assert!(req.occupied(Coord::new(3, 3)));
        assert!(!req.occupied(Coord::new(4, 4)));
        assert!(DecisionRequest::new(3, &roster, &food, grid).is_none());
    }

    #[test]
    fn empty_replies_are_polled_until_valid() {
        let roster = roster();
        let food = BTreeSet::new();
        let req = DecisionRequest::new(0, &roster, &food, Grid::new(10, 10).unwrap()).unwrap();
        let mut provider = ScriptedProvider::new([
            Ok(DecisionOutcome::Empty),
            Ok(DecisionOutcome::Empty),
            Ok(DecisionOutcome::Valid(Decision::new(Direction::Down))),
        ]);
        let d = poll_decision(&mut provider, &req, policy(None)).unwrap();
        assert_eq!(d.direction, Direction::Down);
        assert_eq!(provider.asked, [0, 0, 0]);
    }

    #[test]
    fn polling_gives_up_at_limit() {
        let roster = roster();
        let food = BTreeSet::new();
        let req = DecisionRequest::new(0, &roster, &food, Grid::new(10, 10).unwrap()).unwrap();
        let mut provider = ScriptedProvider::new([]);
        let r = poll_decision(&mut provider, &req, policy(Some(4)));
        assert!(matches!(r, Err(DecisionFailure::Exhausted(4))));
        assert_eq!(provider.asked.len(), 4);
    }

    #[test]
    fn provider_error_is_not_retried() {
        let roster = roster();
        let food = BTreeSet::new();
        let req = DecisionRequest::new(0, &roster, &food, Grid::new(10, 10).unwrap()).unwrap();
        let mut provider = ScriptedProvider::new([
            Err(server_error()),
            Ok(DecisionOutcome::Valid(Decision::new(Direction::Down))),
        ]);
        let r = poll_decision(&mut provider, &req, policy(None));
        assert!(matches!(r, Err(DecisionFailure::Provider(_))));
        assert_eq!(provider.remaining(), 1);
    }

    #[test]
    fn malformed_reply_is_not_retried() {
        let roster = roster();
        let food = BTreeSet::new();
        let req = DecisionRequest::new(0, &roster, &food, Grid::new(10, 10).unwrap()).unwrap();
        let mut provider = ScriptedProvider::new([
            Ok(DecisionOutcome::Malformed(InvalidMove::Missing)),
            Ok(DecisionOutcome::Valid(Decision::new(Direction::Down))),
        ]);
        let r = poll_decision(&mut provider, &req, policy(None));
        assert!(matches!(r, Err(DecisionFailure::Invalid(InvalidMove::Missing))));
    }
}
