use crossterm::event::{poll, read, KeyCode, KeyEvent, KeyModifiers};
use std::io;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Command {
    Quit,
    Pause,
}

impl Command {
    pub(crate) fn from_key_event(ev: KeyEvent) -> Option<Command> {
        match (ev.modifiers, ev.code) {
            (KeyModifiers::CONTROL, KeyCode::Char('c'))
            | (KeyModifiers::NONE, KeyCode::Char('q') | KeyCode::Esc) => Some(Command::Quit),
            (KeyModifiers::NONE, KeyCode::Char('p' | ' ')) => Some(Command::Pause),
            _ => None,
        }
    }
}

/// Wait up to `timeout`, or indefinitely if `None`, for a key press that
/// maps to a command.  Other events are discarded.
pub(crate) fn wait_for_command(timeout: Option<Duration>) -> io::Result<Option<Command>> {
    let deadline = timeout.map(|t| Instant::now() + t);
    loop {
        if let Some(deadline) = deadline {
            let wait = deadline.saturating_duration_since(Instant::now());
            if !poll(wait)? {
                return Ok(None);
            }
        }
        if let Some(cmd) = read()?
            .as_key_press_event()
            .and_then(Command::from_key_event)
        {
            return Ok(Some(cmd));
        }
    }
}
