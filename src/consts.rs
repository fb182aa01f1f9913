//! Assorted constants & hard-coded configuration
use ratatui::style::{Color, Modifier, Style};
use std::num::NonZeroU32;
use std::time::Duration;

/// How long to wait for input while the session is paused before redrawing
/// the header clock
pub(crate) const PAUSE_POLL: Duration = Duration::from_millis(250);

/// Number of rows taken up by the header when it is shown
pub(crate) const HEADER_HEIGHT: u16 = 4;

/// Number of random squares drawn along the diagonal in debug mode
pub(crate) const DEBUG_SQUARES: usize = 20;

/// Default replay speed in frames per second
pub(crate) const REPLAY_FPS: NonZeroU32 = match NonZeroU32::new(2) {
    Some(n) => n,
    None => unreachable!(),
};

/// Line separating consecutive frames in an assembled replay
pub(crate) const FRAME_SEPARATOR: &str = "\u{c}\n";

/// `strftime` format of the clock in the header
pub(crate) const HEADER_CLOCK_FORMAT: &str = "%d.%m.%y %H:%M:%S";

/// `strftime` format of times written to the archive
pub(crate) const LOG_CLOCK_FORMAT: &str = "%H:%M:%S";

/// Glyph for an empty block of the board
pub(crate) const GRID_SYMBOL: char = '·';

/// Glyph for the first column of a food block
pub(crate) const FOOD_SYMBOL: char = '●';

/// Glyph for a snake's head
pub(crate) const SNAKE_HEAD_SYMBOL: char = '◆';

/// Glyph filling the snake's body, and the rest of the head block
pub(crate) const SNAKE_BODY_SYMBOL: char = '█';

/// Glyph for the head of the snake that ended the session by colliding
pub(crate) const COLLISION_SYMBOL: char = '×';

/// Glyph used for the squares of the debug overlay
pub(crate) const DEBUG_SYMBOL: char = '▒';

/// Style for the title line of the header
pub(crate) const TITLE_STYLE: Style = Style::new().add_modifier(Modifier::BOLD);

/// Style for key codes shown in the interface
pub(crate) const KEY_STYLE: Style = Style::new().fg(Color::Yellow);

/// Style for the message shown once the session has ended
pub(crate) const END_STYLE: Style = Style::new()
    .fg(Color::LightRed)
    .add_modifier(Modifier::BOLD);

/// Style for [`COLLISION_SYMBOL`]
pub(crate) const COLLISION_STYLE: Style = Style::new()
    .fg(Color::LightRed)
    .add_modifier(Modifier::REVERSED);

/// System instruction sent with every request when no prompt file is
/// configured
pub(crate) const DEFAULT_SYSTEM_PROMPT: &str = "\
You control one snake in a multiplayer snake game played on a grid. \
The user message is a JSON object with these fields:
- \"your_snake\": the cells of your snake as [x, y] pairs, head first
- \"opponent_snake\": one list of cells per other snake
- \"food\": the cells holding food
- \"grid_size\": [width, height]; x grows to the right and y grows downwards
You lose if your head leaves the grid, runs into your own body, or runs into \
any cell of another snake. Head for food while staying alive.
Reply with only a JSON object of the form \
{\"move\": \"up\" | \"down\" | \"left\" | \"right\", \"explanation\": \"<one sentence>\"}.";
