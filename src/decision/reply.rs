use super::{Decision, DecisionOutcome, DecisionRequest, InvalidMove};
use crate::world::{Coord, Grid};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, VecDeque};

#[derive(Debug, Serialize)]
struct PromptView<'a> {
    your_snake: &'a VecDeque<Coord>,
    opponent_snake: Vec<&'a VecDeque<Coord>>,
    food: &'a BTreeSet<Coord>,
    grid_size: Grid,
}

/// Render the board as seen by the requesting snake as a JSON document
pub(crate) fn build_prompt(request: &DecisionRequest<'_>) -> String {
    let view = PromptView {
        your_snake: request.snake().coords(),
        opponent_snake: request.opponents().iter().map(|s| s.coords()).collect(),
        food: request.food(),
        grid_size: request.grid(),
    };
    // Coordinates and plain sequences always serialize.
    serde_json::to_string(&view).unwrap_or_default()
}

/// Interpret the text of a model reply.  The reply is expected to be a JSON
/// object, possibly wrapped in Markdown code fences.
pub(crate) fn parse_reply(text: &str) -> DecisionOutcome {
    let stripped = strip_code_fences(text);
    let body = stripped.trim();
    if body.is_empty() {
        return DecisionOutcome::Empty;
    }
    match serde_json::from_str::<Value>(body) {
        Ok(value) => match Decision::from_reply(&value) {
            Ok(d) => DecisionOutcome::Valid(d),
            Err(e) => DecisionOutcome::Malformed(e),
        },
        Err(e) => DecisionOutcome::Malformed(InvalidMove::NotJson(e.to_string())),
    }
}

/// Remove every ```` ``` ```` marker, along with an immediately following
/// `json` tag and any whitespace after it
fn strip_code_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(i) = rest.find("```") {
        out.push_str(&rest[..i]);
        rest = &rest[i + 3..];
        rest = rest.strip_prefix("json").unwrap_or(rest).trim_start();
    }
    out.push_str(rest);
    out
}
