use crate::archive::Archive;
use crate::command::{wait_for_command, Command};
use crate::config::Config;
use crate::consts;
use crate::decision::{Decision, DecisionProvider, PollPolicy};
use crate::render::{SessionView, Theme};
use crate::util::render_to_text;
use crate::world::{EndReason, Rgb, Session, SessionState};
use chrono::Local;
use rand::Rng;
use ratatui::{backend::Backend, Terminal};
use std::io;
use std::time::Duration;

/// Runs one live session in the terminal and keeps its archive up to date
#[derive(Debug)]
pub(crate) struct App<R = rand::rngs::ThreadRng> {
    session: Session,
    provider: Box<dyn DecisionProvider>,
    policy: PollPolicy,
    theme: Theme,
    archive: Archive,
    move_delay: Duration,
    debug_mode: bool,
    paused: bool,
    rng: R,
}

impl<R: Rng> App<R> {
    pub(crate) fn new(
        config: &Config,
        session: Session,
        provider: Box<dyn DecisionProvider>,
        archive: Archive,
        rng: R,
    ) -> App<R> {
        App {
            session,
            provider,
            policy: PollPolicy::from_config(&config.provider),
            theme: Theme::from_config(config),
            archive,
            move_delay: config.settings.move_delay(),
            debug_mode: config.settings.debug_mode,
            paused: false,
            rng,
        }
    }

    /// Play until a snake collides, a decision fails, or the user quits.
    /// Returns the finished session.
    pub(crate) fn run<B: Backend>(mut self, mut terminal: Terminal<B>) -> io::Result<Session> {
        tracing::info!(
            session = %self.session.id(),
            snakes = self.session.roster().len(),
            food = self.session.food().len(),
            "Starting session"
        );
        while self.session.running() {
            self.draw(&mut terminal)?;
            self.process_input(&mut terminal)?;
            if !self.session.running() {
                break;
            }
            if self.session.tick() == 0 {
                self.record_start();
            }
            self.step(&mut terminal)?;
        }
        self.draw(&mut terminal)?;
        self.finish();
        if !matches!(self.session.state(), SessionState::Ended(EndReason::Quit)) {
            while wait_for_command(None)? != Some(Command::Quit) {}
        }
        Ok(self.session)
    }

    fn draw<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        let debug = debug_colors(&mut self.rng, self.debug_mode);
        draw_session(terminal, &self.session, &self.theme, &debug, self.paused)
    }

    fn process_input<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        match wait_for_command(Some(Duration::ZERO))? {
            Some(Command::Quit) => self.session.quit(),
            Some(Command::Pause) => self.pause(terminal)?,
            None => (),
        }
        Ok(())
    }

    /// Hold the session until the user resumes or quits, redrawing so that
    /// the clock keeps moving
    fn pause<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        tracing::info!(tick = self.session.tick(), "Paused");
        self.paused = true;
        loop {
            self.draw(terminal)?;
            match wait_for_command(Some(consts::PAUSE_POLL))? {
                Some(Command::Quit) => {
                    self.session.quit();
                    break;
                }
                Some(Command::Pause) => break,
                None => (),
            }
        }
        self.paused = false;
        Ok(())
    }

    /// Play one tick, redrawing after every move, and archive the result
    fn step<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        let mut draw_error = None;
        let theme = &self.theme;
        let rng = &mut self.rng;
        let debug_mode = self.debug_mode;
        let move_delay = self.move_delay;
        let decisions = self.session.play_tick(
            &mut *self.provider,
            self.policy,
            |session, _, _| {
                if draw_error.is_some() {
                    return;
                }
                let debug = debug_colors(&mut *rng, debug_mode);
                match draw_session(&mut *terminal, session, theme, &debug, false) {
                    Ok(()) => std::thread::sleep(move_delay),
                    Err(e) => draw_error = Some(e),
                }
            },
        );
        self.record_tick(&decisions);
        match draw_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Render the current state as plain text for the archive
    fn frame_text(&self) -> String {
        let clock = Local::now().format(consts::HEADER_CLOCK_FORMAT).to_string();
        let view = SessionView::new(&self.session, &self.theme, &clock);
        render_to_text(view, view.size())
    }

    fn record_start(&self) {
        let thumbnail = self.frame_text();
        if let Err(e) = self
            .archive
            .write_info(self.session.id(), self.session.roster(), &thumbnail)
        {
            tracing::warn!(error = ?e, "Could not record starting snakes");
        }
    }

    fn record_tick(&self, decisions: &[(usize, Decision)]) {
        let frame = self.frame_text();
        if let Err(e) = self.archive.log_tick(self.session.tick(), decisions, &frame) {
            tracing::warn!(tick = self.session.tick(), error = ?e, "Could not record tick");
        }
        if let SessionState::Ended(reason) = self.session.state() {
            if let Some(msg) = error_record(reason) {
                if let Err(e) = self.archive.log_error(&msg) {
                    tracing::warn!(error = ?e, "Could not record decision error");
                }
            }
        }
    }

    fn finish(&self) {
        match self.archive.assemble_replay() {
            Ok(true) => tracing::info!(path = %self.archive.dir().display(), "Replay assembled"),
            Ok(false) => tracing::info!("No frames recorded; skipping replay"),
            Err(e) => tracing::warn!(error = ?e, "Could not assemble replay"),
        }
    }
}

fn draw_session<B: Backend>(
    terminal: &mut Terminal<B>,
    session: &Session,
    theme: &Theme,
    debug: &[Rgb],
    paused: bool,
) -> io::Result<()> {
    let clock = Local::now().format(consts::HEADER_CLOCK_FORMAT).to_string();
    let view = SessionView::new(session, theme, &clock)
        .debug_overlay(debug)
        .paused(paused);
    terminal.draw(|frame| frame.render_widget(view, frame.area()))?;
    Ok(())
}

fn debug_colors<R: Rng>(rng: &mut R, enabled: bool) -> Vec<Rgb> {
    if enabled {
        (0..consts::DEBUG_SQUARES)
            .map(|_| Rgb::new(rng.random(), rng.random(), rng.random()))
            .collect()
    } else {
        Vec::new()
    }
}

/// The text to append to `info.txt` for a session that ended because of a
/// bad or failed decision
fn error_record(reason: &EndReason) -> Option<String> {
    match reason {
        EndReason::InvalidMove { snake, detail } => {
            Some(format!("Snake {snake}: {reason}: {detail}"))
        }
        EndReason::DecisionError { snake, message } => Some(format!("Snake {snake}: {message}")),
        EndReason::Collision { .. } | EndReason::Quit => None,
    }
}
