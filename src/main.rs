mod app;
mod archive;
mod command;
mod config;
mod consts;
mod decision;
mod render;
mod replay;
mod util;
mod world;
use crate::app::App;
use crate::archive::Archive;
use crate::config::Config;
use crate::replay::Replay;
use crate::world::{EndReason, Session, SessionState};
use anyhow::Context;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
Usage: snakemind [run] [-c|--config PATH]
       snakemind replay DIR [--fps N]

Snakes on a shared grid, each steered by a language model.

Options:
  -c, --config PATH   Read configuration from PATH
      --fps N         Frames shown per second when replaying [default: 2]
  -h, --help          Show this help and exit
  -V, --version       Show the program version and exit";

#[derive(Clone, Debug, Eq, PartialEq)]
enum Cli {
    Run { config: Option<PathBuf> },
    Replay { dir: PathBuf, fps: NonZeroU32 },
    Help,
    Version,
}

impl Cli {
    fn from_parser(mut parser: lexopt::Parser) -> Result<Cli, lexopt::Error> {
        use lexopt::prelude::*;
        let mut subcommand = None;
        let mut config = None;
        let mut fps = None;
        let mut dir = None;
        while let Some(arg) = parser.next()? {
            match arg {
                Short('h') | Long("help") => return Ok(Cli::Help),
                Short('V') | Long("version") => return Ok(Cli::Version),
                Short('c') | Long("config") => config = Some(PathBuf::from(parser.value()?)),
                Long("fps") => fps = Some(parser.value()?.parse::<NonZeroU32>()?),
                Value(val) if subcommand.is_none() => subcommand = Some(val.string()?),
                Value(val) if dir.is_none() && subcommand.as_deref() == Some("replay") => {
                    dir = Some(PathBuf::from(val));
                }
                _ => return Err(arg.unexpected()),
            }
        }
        match subcommand.as_deref() {
            None | Some("run") => {
                if fps.is_some() {
                    return Err("--fps can only be used with replay".into());
                }
                Ok(Cli::Run { config })
            }
            Some("replay") => {
                if config.is_some() {
                    return Err("--config cannot be used with replay".into());
                }
                let dir = dir.ok_or("replay requires a session directory")?;
                let fps = fps.unwrap_or(consts::REPLAY_FPS);
                Ok(Cli::Replay { dir, fps })
            }
            Some(other) => Err(format!("unknown command {other:?}").into()),
        }
    }

    fn run(self) -> anyhow::Result<ExitCode> {
        match self {
            Cli::Run { config } => run_session(config.as_deref()),
            Cli::Replay { dir, fps } => {
                let replay = Replay::load(&dir, fps)
                    .with_context(|| format!("failed to load replay from {}", dir.display()))?;
                let terminal = ratatui::init();
                let r = replay.run(terminal);
                ratatui::restore();
                r.context("terminal I/O failed")?;
                Ok(ExitCode::SUCCESS)
            }
            Cli::Help => {
                println!("{USAGE}");
                Ok(ExitCode::SUCCESS)
            }
            Cli::Version => {
                println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::from_parser(lexopt::Parser::from_env()) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("snakemind: {e}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };
    match cli.run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("snakemind: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run_session(config_path: Option<&Path>) -> anyhow::Result<ExitCode> {
    let config = Config::locate(config_path).context("failed to load configuration")?;
    let mut rng = rand::rng();
    let session =
        Session::from_config(&config, &mut rng).context("failed to lay out a new session")?;
    let archive = Archive::create(&config.archive.log_root, session.id())
        .context("failed to create session archive")?;
    init_logging(&archive.log_path())?;
    tracing::info!(
        name = %config.project.name,
        version = %config.project.version,
        provider = ?config.provider.kind,
        "Configuration loaded"
    );
    let provider =
        decision::from_config(&config.provider).context("failed to set up decision provider")?;
    let dir = archive.dir().to_path_buf();
    let terminal = ratatui::init();
    let r = App::new(&config, session, provider, archive, rng).run(terminal);
    ratatui::restore();
    let session = r.context("terminal I/O failed")?;
    print!("{}", summary(&config, &session, &dir));
    Ok(match session.state() {
        SessionState::Ended(EndReason::DecisionError { .. } | EndReason::InvalidMove { .. }) => {
            ExitCode::FAILURE
        }
        _ => ExitCode::SUCCESS,
    })
}

/// Send diagnostics to the session's log file, since the terminal belongs to
/// the interface
fn init_logging(path: &Path) -> anyhow::Result<()> {
    let file = fs_err::File::create(path).context("failed to create session log")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("failed to install logger")
}

/// Text printed once the terminal has been restored
fn summary(config: &Config, session: &Session, dir: &Path) -> String {
    let banner = format!(
        "{} v{} by {}",
        config.project.name, config.project.version, config.project.author
    );
    let rule = "#".repeat(banner.chars().count());
    let outcome = match session.state() {
        SessionState::Running => String::from("Session did not finish"),
        SessionState::Ended(reason) => match reason.snake() {
            Some(i) => format!("{reason} (snake {i}, tick {})", session.tick()),
            None => format!("{reason} (tick {})", session.tick()),
        },
    };
    format!(
        "{rule}\n{banner}\n{rule}\n{outcome}\nSession archived in {}\n",
        dir.display()
    )
}
