use crate::config::Config;
use crate::consts;
use crate::world::{Coord, EndReason, Rgb, Session, SessionState};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Margin, Rect, Size},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Widget},
};

/// Width of the header: a hyphenated UUID, a gap, and the quit hint
const HEADER_WIDTH: u16 = 36 + 2 + 8;

/// Display settings that stay fixed for the whole session
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Theme {
    pub(crate) title: String,
    pub(crate) block_size: u16,
    pub(crate) background: Rgb,
    pub(crate) grid: Rgb,
    pub(crate) show_header: bool,
}

impl Theme {
    pub(crate) fn from_config(config: &Config) -> Theme {
        Theme {
            title: config.game.title.clone(),
            block_size: config.game.block_size.max(1),
            background: config.game.background_color,
            grid: config.game.grid_color,
            show_header: config.settings.show_header,
        }
    }

    fn cell_style(&self, fg: Rgb) -> Style {
        Style::new().fg(fg.into()).bg(self.background.into())
    }
}

/// One frame's worth of a session: header, board, and status line
#[derive(Clone, Copy, Debug)]
pub(crate) struct SessionView<'a> {
    session: &'a Session,
    theme: &'a Theme,
    clock: &'a str,
    debug: &'a [Rgb],
    paused: bool,
}

impl<'a> SessionView<'a> {
    pub(crate) fn new(session: &'a Session, theme: &'a Theme, clock: &'a str) -> SessionView<'a> {
        SessionView {
            session,
            theme,
            clock,
            debug: &[],
            paused: false,
        }
    }

    /// Paint these colors over the diagonal of the board
    pub(crate) fn debug_overlay(mut self, colors: &'a [Rgb]) -> SessionView<'a> {
        self.debug = colors;
        self
    }

    pub(crate) fn paused(mut self, paused: bool) -> SessionView<'a> {
        self.paused = paused;
        self
    }

    fn board_size(&self) -> Size {
        let grid = self.session.grid();
        Size {
            width: grid
                .width()
                .saturating_mul(self.theme.block_size)
                .saturating_add(2),
            height: grid.height().saturating_add(2),
        }
    }

    /// The smallest area that fits the whole view
    pub(crate) fn size(&self) -> Size {
        let board = self.board_size();
        let status_width = self
            .status_line()
            .map_or(0, |line| u16::try_from(line.width()).unwrap_or(u16::MAX));
        let (width, height) = if self.theme.show_header {
            (
                board.width.max(HEADER_WIDTH),
                board.height.saturating_add(consts::HEADER_HEIGHT + 1),
            )
        } else {
            (board.width, board.height.saturating_add(1))
        };
        Size {
            width: width.max(status_width),
            height,
        }
    }

    fn render_header(&self, area: Rect, buf: &mut Buffer) {
        let [id_area, clock_area, title_area, tick_area] =
            Layout::vertical([Constraint::Length(1); 4]).areas(area);
        Span::raw(self.session.id().to_string()).render(id_area, buf);
        Line::from_iter([
            Span::raw("Quit ("),
            Span::styled("q", consts::KEY_STYLE),
            Span::raw(")"),
        ])
        .right_aligned()
        .render(id_area, buf);
        Span::raw(self.clock).render(clock_area, buf);
        Span::styled(self.theme.title.as_str(), consts::TITLE_STYLE).render(title_area, buf);
        Span::raw(format!("Tick {}", self.session.tick())).render(tick_area, buf);
    }

    fn render_board(&self, area: Rect, buf: &mut Buffer) {
        let size = self.board_size();
        let area = Rect {
            width: size.width.min(area.width),
            height: size.height.min(area.height),
            ..area
        };
        Block::bordered()
            .style(self.theme.cell_style(self.theme.grid))
            .render(area, buf);
        let mut canvas = Canvas {
            area: area.inner(Margin::new(1, 1)),
            block_size: self.theme.block_size,
            buf,
        };
        let grid_style = self.theme.cell_style(self.theme.grid);
        for pos in self.session.grid().cells() {
            canvas.draw_block(pos, consts::GRID_SYMBOL, ' ', grid_style);
        }
        for (i, &color) in self.debug.iter().enumerate() {
            let Ok(i) = i32::try_from(i) else {
                break;
            };
            canvas.draw_block(
                Coord::new(i, i),
                consts::DEBUG_SYMBOL,
                consts::DEBUG_SYMBOL,
                self.theme.cell_style(color),
            );
        }
        let food_style = self.theme.cell_style(Rgb::WHITE);
        for &pos in self.session.food() {
            canvas.draw_block(pos, consts::FOOD_SYMBOL, ' ', food_style);
        }
        for snake in self.session.roster() {
            let style = self.theme.cell_style(snake.color());
            for &pos in snake.tail() {
                canvas.draw_block(pos, consts::SNAKE_BODY_SYMBOL, consts::SNAKE_BODY_SYMBOL, style);
            }
            canvas.draw_block(
                snake.head(),
                consts::SNAKE_HEAD_SYMBOL,
                consts::SNAKE_BODY_SYMBOL,
                style,
            );
        }
        // Draw the crash last so that it covers whatever was hit
        if let SessionState::Ended(EndReason::Collision { snake }) = *self.session.state() {
            if let Some(s) = self.session.roster().get(snake) {
                canvas.draw_block(s.head(), consts::COLLISION_SYMBOL, ' ', consts::COLLISION_STYLE);
            }
        }
    }

    /// The line under the board: the end reason, or a hint while paused
    fn status_line(&self) -> Option<Line<'static>> {
        match self.session.state() {
            SessionState::Running if self.paused => Some(Line::from_iter([
                Span::raw(" — PAUSED — press "),
                Span::styled("p", consts::KEY_STYLE),
                Span::raw(" to resume"),
            ])),
            SessionState::Running => None,
            SessionState::Ended(reason) => Some(Line::from(Span::styled(
                format!(" — {reason}"),
                consts::END_STYLE,
            ))),
        }
    }
}

impl Widget for SessionView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let header_height = if self.theme.show_header {
            consts::HEADER_HEIGHT
        } else {
            0
        };
        let [header_area, board_area, status_area] = Layout::vertical([
            Constraint::Length(header_height),
            Constraint::Length(self.board_size().height),
            Constraint::Length(1),
        ])
        .areas(area);
        if self.theme.show_header {
            self.render_header(header_area, buf);
        }
        self.render_board(board_area, buf);
        if let Some(line) = self.status_line() {
            line.render(status_area, buf);
        }
    }
}

/// Draws blocks of the board, `block_size` columns wide and one row tall
#[derive(Debug)]
struct Canvas<'a> {
    area: Rect,
    block_size: u16,
    buf: &'a mut Buffer,
}

impl Canvas<'_> {
    /// Draw the block at `pos` with `first` in its leftmost column and `fill`
    /// in the rest.  Blocks outside the canvas are skipped.
    fn draw_block(&mut self, pos: Coord, first: char, fill: char, style: Style) {
        let (Ok(bx), Ok(by)) = (u16::try_from(pos.x), u16::try_from(pos.y)) else {
            return;
        };
        let Some(y) = self.area.y.checked_add(by).filter(|&y| y < self.area.bottom()) else {
            return;
        };
        let Some(x0) = bx
            .checked_mul(self.block_size)
            .and_then(|dx| self.area.x.checked_add(dx))
        else {
            return;
        };
        for k in 0..self.block_size {
            let Some(x) = x0.checked_add(k).filter(|&x| x < self.area.right()) else {
                return;
            };
            if let Some(cell) = self.buf.cell_mut((x, y)) {
                cell.set_char(if k == 0 { first } else { fill });
                cell.set_style(Style::reset().patch(style));
            }
        }
    }
}
