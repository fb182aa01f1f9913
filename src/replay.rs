use crate::archive::{Archive, ArchiveError};
use crate::command::{wait_for_command, Command};
use crate::consts;
use ratatui::{
    backend::Backend,
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    text::{Line, Span, Text},
    widgets::Widget,
    Terminal,
};
use std::io;
use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Plays back the frames archived for a finished session
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Replay {
    frames: Vec<String>,
    index: usize,
    delay: Duration,
    paused: bool,
}

impl Replay {
    pub(crate) fn new(frames: Vec<String>, fps: NonZeroU32) -> Replay {
        Replay {
            frames,
            index: 0,
            delay: Duration::from_secs(1) / fps.get(),
            paused: false,
        }
    }

    pub(crate) fn load(dir: &Path, fps: NonZeroU32) -> Result<Replay, ReplayError> {
        let frames = Archive::open(dir.to_path_buf()).load_frames()?;
        if frames.is_empty() {
            return Err(ReplayError::NoFrames(dir.display().to_string()));
        }
        Ok(Replay::new(frames, fps))
    }

    pub(crate) fn run<B: Backend>(mut self, mut terminal: Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|frame| frame.render_widget(&self, frame.area()))?;
            let timeout = (!self.paused && !self.finished()).then_some(self.delay);
            match wait_for_command(timeout)? {
                Some(Command::Quit) => return Ok(()),
                Some(Command::Pause) => self.paused = !self.paused,
                None => self.advance(),
            }
        }
    }

    fn finished(&self) -> bool {
        self.index + 1 >= self.frames.len()
    }

    fn advance(&mut self) {
        if !self.finished() {
            self.index += 1;
        }
    }
}

impl Widget for &Replay {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let [frame_area, footer_area] =
            Layout::vertical([Constraint::Fill(1), Constraint::Length(1)]).areas(area);
        if let Some(frame) = self.frames.get(self.index) {
            Text::raw(frame.trim_end_matches('\n')).render(frame_area, buf);
        }
        let mut footer = vec![
            Span::raw(format!("Frame {}/{}  ", self.index + 1, self.frames.len())),
            Span::raw("Quit ("),
            Span::styled("q", consts::KEY_STYLE),
            Span::raw(")  Pause ("),
            Span::styled("p", consts::KEY_STYLE),
            Span::raw(")"),
        ];
        if self.finished() {
            footer.push(Span::styled("  End of replay", consts::END_STYLE));
        } else if self.paused {
            footer.push(Span::raw("  PAUSED"));
        }
        Line::from(footer).render(footer_area, buf);
    }
}

#[derive(Debug, Error)]
pub(crate) enum ReplayError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("no recorded frames found in {0}")]
    NoFrames(String),
}
