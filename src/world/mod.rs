//! The board, the snakes on it, and the turn-by-turn rules
mod collision;
mod direction;
mod grid;
mod snake;
mod spawn;
pub(crate) use self::collision::is_colliding;
pub(crate) use self::direction::{Direction, ParseDirectionError};
pub(crate) use self::grid::{Coord, Grid, GridError};
pub(crate) use self::snake::{Rgb, Snake};
pub(crate) use self::spawn::{spawn_food, spawn_snakes, SpawnError};
use crate::config::Config;
use crate::decision::{poll_decision, Decision, DecisionFailure, DecisionProvider, DecisionRequest, PollPolicy};
use rand::Rng;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// One simulated session: the board, the roster in turn order, and the food
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Session {
    id: Uuid,
    grid: Grid,
    roster: Vec<Snake>,
    food: BTreeSet<Coord>,
    tick: u64,
    state: SessionState,
}

impl Session {
    pub(crate) fn new(id: Uuid, grid: Grid, roster: Vec<Snake>, food: BTreeSet<Coord>) -> Session {
        Session {
            id,
            grid,
            roster,
            food,
            tick: 0,
            state: SessionState::Running,
        }
    }

    /// Lay out a fresh session as described by `config`
    pub(crate) fn from_config<R: Rng>(config: &Config, rng: &mut R) -> Result<Session, SetupError> {
        let grid = Grid::new(config.game.width, config.game.height)?;
        let roster = spawn_snakes(&config.game.snakes, grid, config.game.start_range(), rng)?;
        let food = spawn_food(grid, config.food.count(roster.len()), rng);
        Ok(Session::new(Uuid::new_v4(), grid, roster, food))
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn grid(&self) -> Grid {
        self.grid
    }

    pub(crate) fn roster(&self) -> &[Snake] {
        &self.roster
    }

    pub(crate) fn food(&self) -> &BTreeSet<Coord> {
        &self.food
    }

    /// The number of the tick being played or most recently played.  This is
    /// 0 before the first tick.
    pub(crate) fn tick(&self) -> u64 {
        self.tick
    }

    pub(crate) fn state(&self) -> &SessionState {
        &self.state
    }

    pub(crate) fn running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// Stop the session at the user's request.  Has no effect on a session
    /// that has already ended.
    pub(crate) fn quit(&mut self) {
        self.end(EndReason::Quit);
    }

    fn end(&mut self, reason: EndReason) {
        if self.running() {
            tracing::info!(tick = self.tick, %reason, "Session ended");
            self.state = SessionState::Ended(reason);
        }
    }

    /// Play one tick: each snake in roster order is checked for a collision,
    /// asked for a decision, and moved.  `on_move` is called after every
    /// move.  The first collision or failed decision ends the session and
    /// skips the remaining snakes.
    ///
    /// Returns the decisions applied during the tick, paired with the index
    /// of the snake they were for.
    pub(crate) fn play_tick<P, F>(
        &mut self,
        provider: &mut P,
        policy: PollPolicy,
        mut on_move: F,
    ) -> Vec<(usize, Decision)>
    where
        P: DecisionProvider + ?Sized,
        F: FnMut(&Session, usize, &Decision),
    {
        let mut applied = Vec::new();
        if !self.running() {
            return applied;
        }
        self.tick += 1;
        tracing::debug!(tick = self.tick, "Starting tick");
        for index in 0..self.roster.len() {
            if is_colliding(index, &self.roster, self.grid) {
                self.end(EndReason::Collision { snake: index });
                break;
            }
            let outcome = match DecisionRequest::new(index, &self.roster, &self.food, self.grid) {
                Some(request) => poll_decision(provider, &request, policy),
                None => break,
            };
            let decision = match outcome {
                Ok(d) => d,
                Err(DecisionFailure::Invalid(e)) => {
                    tracing::error!(snake = index, error = %e, "Invalid move");
                    self.end(EndReason::InvalidMove {
                        snake: index,
                        detail: e.to_string(),
                    });
                    break;
                }
                Err(e) => {
                    tracing::error!(snake = index, error = %e, "Decision failed");
                    self.end(EndReason::DecisionError {
                        snake: index,
                        message: error_chain(&e),
                    });
                    break;
                }
            };
            self.roster[index].advance(decision.direction);
            on_move(self, index, &decision);
            applied.push((index, decision));
        }
        applied
    }
}

/// Join an error's message with those of all its sources
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(src) = source {
        msg.push_str(": ");
        msg.push_str(&src.to_string());
        source = src.source();
    }
    msg
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum SessionState {
    Running,
    Ended(EndReason),
}

/// Why a session stopped
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum EndReason {
    /// The snake at this roster index was found colliding at the start of
    /// its turn
    Collision { snake: usize },
    InvalidMove { snake: usize, detail: String },
    DecisionError { snake: usize, message: String },
    Quit,
}

impl EndReason {
    /// The roster index of the snake that ended the session, if any
    pub(crate) fn snake(&self) -> Option<usize> {
        match *self {
            EndReason::Collision { snake }
            | EndReason::InvalidMove { snake, .. }
            | EndReason::DecisionError { snake, .. } => Some(snake),
            EndReason::Quit => None,
        }
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::Collision { .. } => write!(f, "Game Over! A snake collided."),
            EndReason::InvalidMove { .. } => write!(f, "Invalid move or movement error"),
            EndReason::DecisionError { message, .. } => write!(f, "{message}"),
            EndReason::Quit => write!(f, "Session closed by user"),
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum SetupError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Spawn(#[from] SpawnError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::testing::{server_error, ScriptedProvider};
    use crate::decision::{parse_reply, DecisionOutcome, InvalidMove};
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;
    use std::collections::VecDeque;
    use std::time::Duration;

    const RED: Rgb = Rgb::new(255, 0, 0);
    const BLUE: Rgb = Rgb::new(0, 0, 255);

    fn policy() -> PollPolicy {
        PollPolicy {
            interval: Duration::ZERO,
            max_polls: None,
        }
    }

    fn session(roster: Vec<Snake>) -> Session {
        Session::new(
            Uuid::nil(),
            Grid::new(20, 20).unwrap(),
            roster,
            BTreeSet::from([Coord::new(10, 10)]),
        )
    }

    fn no_op(_: &Session, _: usize, _: &Decision) {}

    #[test]
    fn three_moves_right() {
        let mut s = session(vec![Snake::new(RED, Coord::new(5, 5))]);
        let mut provider = ScriptedProvider::new(
            std::iter::repeat_with(|| Ok(parse_reply(r#"{"move":"right"}"#))).take(3),
        );
        for t in 1..=3 {
            let applied = s.play_tick(&mut provider, policy(), no_op);
            assert_eq!(applied, [(0, Decision::new(Direction::Right))]);
            assert_eq!(s.tick(), t);
            assert!(s.running());
            assert!(!is_colliding(0, s.roster(), s.grid()));
        }
        assert_eq!(s.roster()[0].coords(), &VecDeque::from([Coord::new(8, 5)]));
    }

    #[test]
    fn moving_onto_other_snake_ends_next_tick() {
        let a = Snake::with_body(RED, [Coord::new(4, 6), Coord::new(3, 6)]).unwrap();
        let b = Snake::with_body(BLUE, [Coord::new(5, 5), Coord::new(5, 6), Coord::new(5, 7)])
            .unwrap();
        let mut s = session(vec![a, b]);
        let mut provider = ScriptedProvider::moves([Direction::Right, Direction::Up]);
        let _ = s.play_tick(&mut provider, policy(), no_op);
        assert!(s.running());
        assert_eq!(s.roster()[0].head(), Coord::new(5, 6));
        assert_eq!(
            s.roster()[1].coords(),
            &VecDeque::from([Coord::new(5, 4), Coord::new(5, 5), Coord::new(5, 6)])
        );
        assert!(is_colliding(0, s.roster(), s.grid()));
        let mut provider = ScriptedProvider::moves([Direction::Right]);
        let applied = s.play_tick(&mut provider, policy(), no_op);
        assert!(applied.is_empty());
        assert_eq!(
            s.state(),
            &SessionState::Ended(EndReason::Collision { snake: 0 })
        );
        assert_eq!(s.tick(), 2);
        assert_eq!(provider.remaining(), 1);
    }

    #[test]
    fn later_snakes_see_earlier_moves() {
        let mut s = session(vec![
            Snake::new(RED, Coord::new(2, 2)),
            Snake::new(BLUE, Coord::new(9, 9)),
        ]);
        let mut provider = ScriptedProvider::moves([Direction::Down, Direction::Up]);
        let mut moved = Vec::new();
        let _ = s.play_tick(&mut provider, policy(), |sess, i, d| {
            moved.push((i, d.direction, sess.roster()[i].head()));
        });
        assert_eq!(provider.asked, [0, 1]);
        assert_eq!(provider.heads_seen, [Coord::new(9, 9), Coord::new(2, 3)]);
        assert_eq!(
            moved,
            [
                (0, Direction::Down, Coord::new(2, 3)),
                (1, Direction::Up, Coord::new(9, 8)),
            ]
        );
    }

    #[test]
    fn collision_skips_remaining_snakes() {
        let mut s = session(vec![
            Snake::new(RED, Coord::new(-1, 2)),
            Snake::new(BLUE, Coord::new(9, 9)),
        ]);
        let mut provider = ScriptedProvider::moves([Direction::Down, Direction::Up]);
        let applied = s.play_tick(&mut provider, policy(), no_op);
        assert!(applied.is_empty());
        assert!(provider.asked.is_empty());
        assert_eq!(
            s.state(),
            &SessionState::Ended(EndReason::Collision { snake: 0 })
        );
        assert_eq!(s.roster()[1].head(), Coord::new(9, 9));
    }

    #[test]
    fn invalid_move_ends_session() {
        let mut s = session(vec![
            Snake::new(RED, Coord::new(2, 2)),
            Snake::new(BLUE, Coord::new(9, 9)),
        ]);
        let mut provider = ScriptedProvider::new([
            Ok(DecisionOutcome::Valid(Decision::new(Direction::Left))),
            Ok(parse_reply(r#"{"move": "diagonal"}"#)),
        ]);
        let applied = s.play_tick(&mut provider, policy(), no_op);
        assert_eq!(applied, [(0, Decision::new(Direction::Left))]);
        let SessionState::Ended(reason) = s.state() else {
            panic!("session should have ended");
        };
        assert!(matches!(reason, EndReason::InvalidMove { snake: 1, .. }));
        assert_eq!(reason.to_string(), "Invalid move or movement error");
        assert_eq!(s.roster()[1].head(), Coord::new(9, 9));
    }

    #[test]
    fn missing_move_ends_session() {
        let mut s = session(vec![Snake::new(RED, Coord::new(2, 2))]);
        let mut provider = ScriptedProvider::new([Ok(DecisionOutcome::Malformed(InvalidMove::Missing))]);
        let _ = s.play_tick(&mut provider, policy(), no_op);
        assert!(matches!(
            s.state(),
            SessionState::Ended(EndReason::InvalidMove { snake: 0, .. })
        ));
    }

    #[test]
    fn provider_error_ends_session() {
        let mut s = session(vec![Snake::new(RED, Coord::new(2, 2))]);
        let mut provider = ScriptedProvider::new([Err(server_error())]);
        let _ = s.play_tick(&mut provider, policy(), no_op);
        assert_eq!(
            s.state(),
            &SessionState::Ended(EndReason::DecisionError {
                snake: 0,
                message: String::from(
                    "text-generation API returned 500 Internal Server Error: boom"
                ),
            })
        );
        assert_eq!(s.roster()[0].head(), Coord::new(2, 2));
    }

    #[test]
    fn empty_replies_are_retried() {
        let mut s = session(vec![Snake::new(RED, Coord::new(2, 2))]);
        let mut provider = ScriptedProvider::new([
            Ok(DecisionOutcome::Empty),
            Ok(parse_reply("")),
            Ok(parse_reply("```json\n{\"move\": \"up\"}\n```")),
        ]);
        let _ = s.play_tick(&mut provider, policy(), no_op);
        assert!(s.running());
        assert_eq!(s.roster()[0].head(), Coord::new(2, 1));
        assert_eq!(provider.asked, [0, 0, 0]);
    }

    #[test]
    fn ended_session_does_not_tick() {
        let mut s = session(vec![Snake::new(RED, Coord::new(2, 2))]);
        s.quit();
        let mut provider = ScriptedProvider::moves([Direction::Up]);
        assert!(s.play_tick(&mut provider, policy(), no_op).is_empty());
        assert_eq!(s.tick(), 0);
        assert_eq!(s.state(), &SessionState::Ended(EndReason::Quit));
        assert_eq!(EndReason::Quit.snake(), None);
    }

    #[test]
    fn quit_does_not_override_earlier_end() {
        let mut s = session(vec![Snake::new(RED, Coord::new(-5, 2))]);
        let mut provider = ScriptedProvider::moves([]);
        let _ = s.play_tick(&mut provider, policy(), no_op);
        s.quit();
        assert_eq!(
            s.state(),
            &SessionState::Ended(EndReason::Collision { snake: 0 })
        );
    }

    #[test]
    fn from_config() {
        let mut rng = ChaCha12Rng::seed_from_u64(0x0123456789ABCDEF);
        let config = Config::default();
        let s = Session::from_config(&config, &mut rng).unwrap();
        assert_eq!(s.roster().len(), config.game.snakes.len());
        assert_eq!(s.food().len(), config.food.count(s.roster().len()));
        assert_eq!(s.grid(), Grid::new(30, 20).unwrap());
        assert!(s.running());
        assert_eq!(s.tick(), 0);
    }
}
