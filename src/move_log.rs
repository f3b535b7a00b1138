//! Durable, append-only move logs.
//!
//! Every non-dry-run sort writes one log per run. Logs live in the user state
//! directory, grouped per inbox:
//!
//! ```text
//! <state>/runs/<inbox key>/
//!     inbox                              absolute inbox path, for humans
//!     .lock                              advisory lock held during sort/undo
//!     run_20261018T093012345Z-000.jsonl  one MoveRecord per line
//!     run_20261018T093012345Z-000.undone indices of reversed records
//! ```
//!
//! Each append is flushed to stable storage before it returns, so a crash
//! loses at most the record that was being written. Undo never rewrites a log;
//! it appends the index of each reversed record to the `.undone` sidecar.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

const RUN_PREFIX: &str = "run_";
const RECORDS_EXT: &str = "jsonl";
const CONSUMED_EXT: &str = "undone";
const LOCK_FILE: &str = ".lock";
const INBOX_FILE: &str = "inbox";

/// Errors raised by the log store. All of them are fatal to a run or undo.
#[derive(Debug, Error)]
pub enum LogError {
    /// Another sort or undo holds the lock for this inbox.
    #[error("another parsort run is active for {}", inbox.display())]
    Busy { inbox: PathBuf },

    #[error("log I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A log line other than a torn final line could not be parsed.
    #[error("corrupt log {} at line {line}: {reason}", path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("could not determine a state directory for move logs")]
    NoStateDir,

    #[error("invalid run id '{0}'")]
    InvalidRunId(String),
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> LogError + '_ {
    move |source| LogError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// What happened to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Moved under its own name.
    Moved,
    /// Moved under a suffixed name because the plain name was taken.
    Renamed,
    /// Left in place; only written when skip recording is enabled.
    Skipped,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Moved => "moved",
            Outcome::Renamed => "renamed",
            Outcome::Skipped => "skipped",
        })
    }
}

/// One line of a move log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub timestamp: DateTime<Utc>,
    pub src: PathBuf,
    pub dst: PathBuf,
    pub outcome: Outcome,
    /// Rule label, or "guided" for a hand-picked destination.
    #[serde(default)]
    pub rule: String,
}

impl MoveRecord {
    pub fn new(src: PathBuf, dst: PathBuf, outcome: Outcome, rule: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            src,
            dst,
            outcome,
            rule: rule.to_string(),
        }
    }

    /// Records that describe a real move can be reversed.
    pub fn is_undoable(&self) -> bool {
        self.outcome != Outcome::Skipped
    }
}

/// Identifier of one run: UTC start time with milliseconds plus a sequence
/// number, so the lexical order is the chronological order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId(String);

impl RunId {
    fn at(time: DateTime<Utc>, seq: u32) -> Self {
        RunId(format!("{}-{:03}", time.format("%Y%m%dT%H%M%S%3fZ"), seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RunId {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s
            .strip_prefix(RUN_PREFIX)
            .unwrap_or(s)
            .trim_end_matches(&format!(".{}", RECORDS_EXT));
        let valid = !s.is_empty()
            && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if valid {
            Ok(RunId(s.to_string()))
        } else {
            Err(LogError::InvalidRunId(s.to_string()))
        }
    }
}

/// Addresses one stored run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogHandle {
    dir: PathBuf,
    run: RunId,
}

impl LogHandle {
    pub fn run(&self) -> &RunId {
        &self.run
    }

    /// The JSON-lines file holding the records.
    pub fn records_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}{}.{}", RUN_PREFIX, self.run, RECORDS_EXT))
    }

    /// The sidecar listing reversed record indices.
    pub fn consumed_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}{}.{}", RUN_PREFIX, self.run, CONSUMED_EXT))
    }
}

/// Summary of a stored run, for listings.
#[derive(Debug, Clone)]
pub struct RunInfo {
    pub handle: LogHandle,
    /// Records that describe a real move.
    pub records: usize,
    /// Of those, how many have not been reversed.
    pub pending: usize,
}

/// Exclusive hold on one inbox's log directory. Released on drop.
#[derive(Debug)]
pub struct InboxLock {
    _file: File,
}

/// Location of all move logs.
#[derive(Debug, Clone)]
pub struct LogStore {
    root: PathBuf,
}

impl LogStore {
    /// A store rooted at `root`; handy for tests.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store in the user state directory (`$XDG_STATE_HOME/parsort`).
    pub fn from_env() -> Result<Self, LogError> {
        let base = dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .ok_or(LogError::NoStateDir)?;
        Ok(Self::new(base.join("parsort")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stable per-inbox directory name derived from the canonical path.
    pub fn inbox_key(inbox: &Path) -> String {
        let canonical = fs::canonicalize(inbox)
            .or_else(|_| std::path::absolute(inbox))
            .unwrap_or_else(|_| inbox.to_path_buf());
        let hex = blake3::hash(canonical.to_string_lossy().as_bytes()).to_hex();
        hex.as_str()[..16].to_string()
    }

    fn inbox_dir(&self, inbox: &Path) -> PathBuf {
        self.root.join("runs").join(Self::inbox_key(inbox))
    }

    /// Takes the advisory lock for `inbox`.
    ///
    /// # Errors
    ///
    /// `LogError::Busy` if another process (or another guard in this one)
    /// already holds it.
    pub fn lock(&self, inbox: &Path) -> Result<InboxLock, LogError> {
        let dir = self.inbox_dir(inbox);
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;

        let inbox_file = dir.join(INBOX_FILE);
        if !inbox_file.exists() {
            let shown = fs::canonicalize(inbox).unwrap_or_else(|_| inbox.to_path_buf());
            fs::write(&inbox_file, format!("{}\n", shown.display()))
                .map_err(io_err(&inbox_file))?;
        }

        let lock_path = dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(io_err(&lock_path))?;

        match file.try_lock() {
            Ok(()) => Ok(InboxLock { _file: file }),
            Err(TryLockError::WouldBlock) => Err(LogError::Busy {
                inbox: inbox.to_path_buf(),
            }),
            Err(TryLockError::Error(source)) => Err(LogError::Io {
                path: lock_path,
                source,
            }),
        }
    }

    /// Starts a new run for `inbox`, holding its lock until the log is
    /// finalized or dropped. The log file appears with the first record.
    pub fn begin(&self, inbox: &Path) -> Result<MoveLog, LogError> {
        let lock = self.lock(inbox)?;
        let dir = self.inbox_dir(inbox);
        let now = Utc::now();

        let mut seq = 0;
        let handle = loop {
            let handle = LogHandle {
                dir: dir.clone(),
                run: RunId::at(now, seq),
            };
            if !handle.records_path().exists() {
                break handle;
            }
            seq += 1;
        };

        log::debug!("starting run {} for {}", handle.run, inbox.display());
        Ok(MoveLog {
            handle,
            file: None,
            appended: 0,
            _lock: lock,
        })
    }

    /// All runs recorded for `inbox`, oldest first.
    pub fn runs(&self, inbox: &Path) -> Result<Vec<RunInfo>, LogError> {
        self.handles(inbox)?
            .into_iter()
            .map(|handle| {
                let records = self.load(&handle)?;
                let consumed = self.consumed(&handle)?;
                let undoable: Vec<usize> = records
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| r.is_undoable())
                    .map(|(i, _)| i)
                    .collect();
                let pending = undoable.iter().filter(|i| !consumed.contains(i)).count();
                Ok(RunInfo {
                    handle,
                    records: undoable.len(),
                    pending,
                })
            })
            .collect()
    }

    fn handles(&self, inbox: &Path) -> Result<Vec<LogHandle>, LogError> {
        let dir = self.inbox_dir(inbox);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut handles: Vec<LogHandle> = fs::read_dir(&dir)
            .map_err(io_err(&dir))?
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                let id = name
                    .strip_prefix(RUN_PREFIX)?
                    .strip_suffix(&format!(".{}", RECORDS_EXT))?
                    .parse::<RunId>()
                    .ok()?;
                Some(LogHandle {
                    dir: dir.clone(),
                    run: id,
                })
            })
            .collect();
        handles.sort_by(|a, b| a.run.cmp(&b.run));
        Ok(handles)
    }

    /// Looks up a specific run of `inbox`.
    pub fn handle(&self, inbox: &Path, run: &RunId) -> Option<LogHandle> {
        let handle = LogHandle {
            dir: self.inbox_dir(inbox),
            run: run.clone(),
        };
        handle.records_path().exists().then_some(handle)
    }

    /// The newest run of `inbox`, reversed or not.
    pub fn latest(&self, inbox: &Path) -> Result<Option<LogHandle>, LogError> {
        Ok(self.handles(inbox)?.pop())
    }

    /// The newest run of `inbox` that still has records to reverse.
    pub fn latest_pending(&self, inbox: &Path) -> Result<Option<LogHandle>, LogError> {
        for handle in self.handles(inbox)?.into_iter().rev() {
            if !self.pending(&handle)?.is_empty() {
                return Ok(Some(handle));
            }
        }
        Ok(None)
    }

    /// Reads every record of a run in append order.
    ///
    /// A torn final line, left by a crash mid-append, is ignored.
    pub fn load(&self, handle: &LogHandle) -> Result<Vec<MoveRecord>, LogError> {
        read_lines(&handle.records_path(), TornTail::KeepIfValid, |line| {
            serde_json::from_str::<MoveRecord>(line).map_err(|e| e.to_string())
        })
    }

    /// Indices of records already reversed.
    pub fn consumed(&self, handle: &LogHandle) -> Result<BTreeSet<usize>, LogError> {
        let path = handle.consumed_path();
        if !path.exists() {
            return Ok(BTreeSet::new());
        }
        let indices = read_lines(&path, TornTail::Discard, |line| {
            line.trim().parse::<usize>().map_err(|e| e.to_string())
        })?;
        Ok(indices.into_iter().collect())
    }

    /// Undoable, unconsumed records with their indices, in append order.
    pub fn pending(&self, handle: &LogHandle) -> Result<Vec<(usize, MoveRecord)>, LogError> {
        let consumed = self.consumed(handle)?;
        Ok(self
            .load(handle)?
            .into_iter()
            .enumerate()
            .filter(|(i, record)| record.is_undoable() && !consumed.contains(i))
            .collect())
    }

    /// Durably marks record `index` of a run as reversed.
    ///
    /// The caller must hold the inbox lock. A torn last index left by a crash
    /// is cut off first so the new index starts on a line of its own.
    pub fn mark_consumed(
        &self,
        _lock: &InboxLock,
        handle: &LogHandle,
        index: usize,
    ) -> Result<(), LogError> {
        let path = handle.consumed_path();
        let created = !path.exists();
        if !created {
            drop_torn_tail(&path).map_err(io_err(&path))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err(&path))?;
        append_line(&mut file, &index.to_string()).map_err(io_err(&path))?;
        if created {
            sync_dir(&handle.dir).map_err(io_err(&handle.dir))?;
        }
        Ok(())
    }
}

/// Log of the run in progress.
#[derive(Debug)]
pub struct MoveLog {
    handle: LogHandle,
    file: Option<File>,
    appended: usize,
    _lock: InboxLock,
}

impl MoveLog {
    pub fn handle(&self) -> &LogHandle {
        &self.handle
    }

    /// Number of records appended so far.
    pub fn len(&self) -> usize {
        self.appended
    }

    pub fn is_empty(&self) -> bool {
        self.appended == 0
    }

    /// Appends a record and flushes it to disk before returning.
    pub fn append(&mut self, record: &MoveRecord) -> Result<(), LogError> {
        let path = self.handle.records_path();
        let file = match self.file.take() {
            Some(file) => file,
            None => {
                let file = OpenOptions::new()
                    .create_new(true)
                    .append(true)
                    .open(&path)
                    .map_err(io_err(&path))?;
                sync_dir(&self.handle.dir).map_err(io_err(&self.handle.dir))?;
                file
            }
        };
        let file = self.file.insert(file);

        let line = serde_json::to_string(record).map_err(|e| LogError::Io {
            path: path.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;
        append_line(file, &line).map_err(io_err(&path))?;
        self.appended += 1;
        Ok(())
    }

    /// Closes the run and releases the lock.
    ///
    /// Returns the handle if at least one record was written.
    pub fn finalize(self) -> Option<LogHandle> {
        (self.appended > 0).then_some(self.handle)
    }
}

fn append_line(file: &mut File, line: &str) -> io::Result<()> {
    file.write_all(format!("{}\n", line).as_bytes())?;
    file.sync_data()
}

/// Makes a newly created entry of `dir` durable.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

/// Truncates `path` after its last newline.
fn drop_torn_tail(path: &Path) -> io::Result<()> {
    let content = fs::read(path)?;
    let keep = content
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |i| i + 1);
    if keep == content.len() {
        return Ok(());
    }
    log::warn!("dropping incomplete last line of {}", path.display());
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(keep as u64)?;
    file.sync_data()
}

/// What to do with a last line that has no trailing newline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TornTail {
    /// Keep it if it parses. A truncated JSON record never does.
    KeepIfValid,
    /// Always drop it; a truncated number still parses.
    Discard,
}

fn read_lines<T>(
    path: &Path,
    tail: TornTail,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Result<Vec<T>, LogError> {
    let content = fs::read_to_string(path).map_err(io_err(path))?;
    let complete = content.ends_with('\n');
    let lines: Vec<&str> = content.lines().collect();
    let last = lines.len().saturating_sub(1);

    let mut out = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let torn = i == last && !complete;
        if torn && tail == TornTail::Discard {
            log::warn!("ignoring incomplete last line of {}", path.display());
            continue;
        }
        match parse(line) {
            Ok(value) => out.push(value),
            Err(_) if torn => {
                log::warn!(
                    "ignoring incomplete last line of {} (interrupted write?)",
                    path.display()
                );
            }
            Err(reason) => {
                return Err(LogError::Corrupt {
                    path: path.to_path_buf(),
                    line: i + 1,
                    reason,
                });
            }
        }
    }
    Ok(out)
}
