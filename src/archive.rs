//! On-disk record of a session
//!
//! Every session gets its own directory, named after the session ID, under
//! the configured log root.  The layout is:
//!
//! - `info.txt`: the starting roster, followed by any fatal decision errors
//! - `thumbnail.txt`: the first frame
//! - `explanations.log`: the moves chosen on each tick and their reasons
//! - `images/<tick>.txt`: the frame drawn after each tick
//! - `replay.txt`: all frames in tick order, separated by form feeds
//! - `session.log`: diagnostic output
use crate::consts;
use crate::decision::Decision;
use crate::world::Snake;
use chrono::Local;
use fs_err::{File, OpenOptions};
use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Archive {
    dir: PathBuf,
}

impl Archive {
    /// Create the directory for session `id` under `root`
    pub(crate) fn create(root: &Path, id: Uuid) -> Result<Archive, ArchiveError> {
        let dir = root.join(id.to_string());
        fs_err::create_dir_all(dir.join("images")).map_err(ArchiveError::mkdir)?;
        Ok(Archive { dir })
    }

    /// Wrap an existing session directory, e.g., one being replayed
    pub(crate) fn open(dir: PathBuf) -> Archive {
        Archive { dir }
    }

    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }

    pub(crate) fn log_path(&self) -> PathBuf {
        self.dir.join("session.log")
    }

    fn info_path(&self) -> PathBuf {
        self.dir.join("info.txt")
    }

    fn replay_path(&self) -> PathBuf {
        self.dir.join("replay.txt")
    }

    fn frame_path(&self, tick: u64) -> PathBuf {
        self.dir.join("images").join(format!("{tick}.txt"))
    }

    fn append(&self, path: &Path, text: &str) -> Result<(), ArchiveError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut fp| fp.write_all(text.as_bytes()))
            .map_err(ArchiveError::write)
    }

    /// Record the starting roster in `info.txt` and save the first frame as
    /// the thumbnail
    pub(crate) fn write_info(&self, id: Uuid, roster: &[Snake], thumbnail: &str) -> Result<(), ArchiveError> {
        let rule = format!("#### {id} ####");
        let mut info = format!("{rule}\n({})\n\nStarting Snakes:\n", clock());
        for snake in roster {
            let _ = writeln!(info, "{snake}\n");
        }
        info.push_str(&rule);
        info.push('\n');
        fs_err::write(self.info_path(), info).map_err(ArchiveError::write)?;
        fs_err::write(self.dir.join("thumbnail.txt"), with_newline(thumbnail))
            .map_err(ArchiveError::write)
    }

    /// Append a fatal decision error to `info.txt`
    pub(crate) fn log_error(&self, message: &str) -> Result<(), ArchiveError> {
        self.append(
            &self.info_path(),
            &format!("\n#### ERROR ({}):\n{message}\n", clock()),
        )
    }

    /// Record the decisions of tick `tick` and the frame drawn afterwards
    pub(crate) fn log_tick(
        &self,
        tick: u64,
        decisions: &[(usize, Decision)],
        frame: &str,
    ) -> Result<(), ArchiveError> {
        let mut entry = format!("(Tick {tick}) {}\n", clock());
        for (index, decision) in decisions {
            let explanation = decision.explanation.as_deref().filter(|e| !e.is_empty());
            if let Some(explanation) = explanation {
                let _ = writeln!(entry, "({index}) {}: {explanation}", decision.direction);
            }
        }
        entry.push('\n');
        self.append(&self.dir.join("explanations.log"), &entry)?;
        fs_err::write(self.frame_path(tick), with_newline(frame)).map_err(ArchiveError::write)
    }

    /// Frames saved under `images/`, in tick order
    fn saved_frames(&self) -> Result<Vec<String>, ArchiveError> {
        let mut ticks = Vec::new();
        let entries = match fs_err::read_dir(self.dir.join("images")) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ArchiveError::read(e)),
        };
        for entry in entries {
            let path = entry.map_err(ArchiveError::read)?.path();
            if path.extension().is_some_and(|ext| ext == "txt") {
                if let Some(tick) = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(|s| s.parse::<u64>().ok())
                {
                    ticks.push(tick);
                }
            }
        }
        ticks.sort_unstable();
        ticks
            .into_iter()
            .map(|t| fs_err::read_to_string(self.frame_path(t)).map_err(ArchiveError::read))
            .collect()
    }

    /// Join the saved frames into `replay.txt`.  Returns `false` if there
    /// were no frames to join, in which case no file is written.
    pub(crate) fn assemble_replay(&self) -> Result<bool, ArchiveError> {
        let frames = self.saved_frames()?;
        if frames.is_empty() {
            return Ok(false);
        }
        let mut fp = File::create(self.replay_path()).map_err(ArchiveError::write)?;
        for (i, frame) in frames.iter().enumerate() {
            if i > 0 {
                fp.write_all(consts::FRAME_SEPARATOR.as_bytes())
                    .map_err(ArchiveError::write)?;
            }
            fp.write_all(frame.as_bytes()).map_err(ArchiveError::write)?;
        }
        fp.flush().map_err(ArchiveError::write)?;
        Ok(true)
    }

    /// Load the frames of a finished session from `replay.txt`, falling back
    /// to the individual frames if it was never assembled
    pub(crate) fn load_frames(&self) -> Result<Vec<String>, ArchiveError> {
        match fs_err::read_to_string(self.replay_path()) {
            Ok(src) => Ok(split_frames(&src)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => self.saved_frames(),
            Err(e) => Err(ArchiveError::read(e)),
        }
    }
}

fn clock() -> String {
    Local::now().format(consts::LOG_CLOCK_FORMAT).to_string()
}

fn with_newline(text: &str) -> String {
    let mut s = text.to_owned();
    if !s.ends_with('\n') {
        s.push('\n');
    }
    s
}

fn split_frames(src: &str) -> Vec<String> {
    src.split(consts::FRAME_SEPARATOR)
        .filter(|f| !f.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Debug, Error)]
#[error("Failed to update session archive")]
pub(crate) struct ArchiveError(#[source] ArchiveErrorSource);

impl ArchiveError {
    fn mkdir(e: io::Error) -> Self {
        ArchiveError(ArchiveErrorSource::Mkdir(e))
    }

    fn write(e: io::Error) -> Self {
        ArchiveError(ArchiveErrorSource::Write(e))
    }

    fn read(e: io::Error) -> Self {
        ArchiveError(ArchiveErrorSource::Read(e))
    }
}

#[derive(Debug, Error)]
enum ArchiveErrorSource {
    #[error("failed to create session directory")]
    Mkdir(#[source] io::Error),
    #[error("failed to write archive file")]
    Write(#[source] io::Error),
    #[error("failed to read archive file")]
    Read(#[source] io::Error),
}
