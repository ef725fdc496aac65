use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs4::FileExt;

use crate::error::{CResult, Error};

pub const DEFAULT_LOG_PATH: &str = "data.db";

/// The append-only durability log.
///
/// Every line is a committed `SET`/`DEL`/`EXPIRE` command, written in the same canonical
/// format the command dispatcher already emits. The log is opened once, held open and
/// locked for the lifetime of the process, and is never rewritten or compacted: this engine
/// makes no attempt at snapshotting, only straight replay.
pub struct DurabilityLog {
    path: PathBuf,
    file: std::fs::File,
}

impl DurabilityLog {
    /// Opens (creating if necessary) the log at `path`, taking out an advisory exclusive
    /// lock, and returns it along with the lines already on disk for the caller to replay.
    ///
    /// A missing file is not an error — it just means this is the first run, and replay
    /// starts from an empty keyspace.
    pub fn open(path: impl AsRef<Path>) -> CResult<(Self, Vec<String>)> {
        let path = path.as_ref().to_path_buf();

        let lines = match std::fs::read_to_string(&path) {
            Ok(contents) => contents.lines().map(str::to_string).collect(),
            Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.try_lock_exclusive().map_err(|_| {
            Error::internal(format!(
                "could not acquire exclusive lock on {} (another instance running?)",
                path.display()
            ))
        })?;

        log::info!("opened durability log at {} ({} lines to replay)", path.display(), lines.len());
        Ok((Self { path, file }, lines))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one command line, flushing it out of the process's userspace buffer before
    /// returning. No fsync is performed: durability here is best-effort, not guaranteed
    /// against a power loss, only against the process exiting.
    pub fn append(&mut self, line: &str) -> CResult<()> {
        writeln!(self.file, "{line}")?;
        self.file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_replays_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        let (_log, lines) = DurabilityLog::open(&path).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn appended_lines_are_replayed_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        {
            let (mut log, lines) = DurabilityLog::open(&path).unwrap();
            assert!(lines.is_empty());
            log.append("SET a 1").unwrap();
            log.append("DEL b").unwrap();
        }
        let (_log, lines) = DurabilityLog::open(&path).unwrap();
        assert_eq!(lines, vec!["SET a 1".to_string(), "DEL b".to_string()]);
    }

    #[test]
    fn second_open_while_locked_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        let (_log, _) = DurabilityLog::open(&path).unwrap();
        assert!(DurabilityLog::open(&path).is_err());
    }
}
