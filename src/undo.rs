/// Undo functionality for reverting sort runs.
///
/// This module moves files back to where a sort run found them, using the
/// run's move log. Records are reversed newest first, and every successful
/// reversal is marked in the log store before the next one starts, so an
/// interrupted undo can simply be run again.
use crate::destination::{ensure_parent_dir, is_occupied, move_file};
use crate::move_log::{InboxLock, LogError, LogHandle, LogStore, MoveRecord, RunId};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that stop an undo.
#[derive(Debug, Error)]
pub enum UndoError {
    /// No run of this inbox has anything left to reverse.
    #[error("no previous parsort run found to undo for {}", inbox.display())]
    NoLogFound { inbox: PathBuf },

    #[error("run {run} not found for {}", inbox.display())]
    RunNotFound { inbox: PathBuf, run: RunId },

    #[error(transparent)]
    Log(#[from] LogError),
}

/// Why a record was not reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoSkip {
    /// Nothing is at the logged destination any more.
    Missing,
    /// Something else now occupies the original path.
    Conflict,
}

impl fmt::Display for UndoSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UndoSkip::Missing => write!(f, "missing"),
            UndoSkip::Conflict => write!(f, "conflict"),
        }
    }
}

/// Represents the result of an undo operation.
#[derive(Debug)]
pub struct UndoSummary {
    pub run: RunId,
    pub dry_run: bool,
    /// Records reversed, newest first.
    pub undone: Vec<MoveRecord>,
    /// Reversals a dry run would perform.
    pub planned: Vec<MoveRecord>,
    pub skipped: Vec<(MoveRecord, UndoSkip)>,
    /// Records whose move back failed; they stay pending.
    pub failed: Vec<(MoveRecord, String)>,
}

impl UndoSummary {
    fn new(run: RunId, dry_run: bool) -> Self {
        Self {
            run,
            dry_run,
            undone: Vec::new(),
            planned: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Returns the total number of records processed.
    pub fn total_processed(&self) -> usize {
        self.undone.len() + self.planned.len() + self.skipped.len() + self.failed.len()
    }

    /// Returns true if every pending record was (or would be) reversed.
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Reverses sort runs recorded in a [`LogStore`].
pub struct UndoEngine<'a> {
    store: &'a LogStore,
}

impl<'a> UndoEngine<'a> {
    pub fn new(store: &'a LogStore) -> Self {
        Self { store }
    }

    /// Undoes the most recent run of `inbox` that still has pending records.
    ///
    /// # Errors
    ///
    /// `NoLogFound` if the inbox has no recorded run, `Log` if the store
    /// cannot be read or written or another run holds the inbox lock. When
    /// every run is already reversed the latest one yields an empty summary.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use parsort::move_log::LogStore;
    /// use parsort::undo::UndoEngine;
    /// use std::path::Path;
    ///
    /// let store = LogStore::from_env().expect("state dir");
    /// match UndoEngine::new(&store).undo(Path::new("/home/me/Downloads"), false) {
    ///     Ok(summary) => println!("Restored {} files", summary.undone.len()),
    ///     Err(e) => eprintln!("Undo failed: {}", e),
    /// }
    /// ```
    pub fn undo(&self, inbox: &Path, dry_run: bool) -> Result<UndoSummary, UndoError> {
        let lock = self.lock_unless(inbox, dry_run)?;
        let handle = match self.store.latest_pending(inbox)? {
            Some(handle) => handle,
            None => self
                .store
                .latest(inbox)?
                .ok_or_else(|| UndoError::NoLogFound {
                    inbox: inbox.to_path_buf(),
                })?,
        };
        self.reverse(&handle, lock.as_ref(), dry_run)
    }

    /// Undoes a specific run.
    ///
    /// A run that is already fully reversed yields an empty summary, so
    /// repeating this call is a no-op.
    pub fn undo_run(
        &self,
        inbox: &Path,
        run: &RunId,
        dry_run: bool,
    ) -> Result<UndoSummary, UndoError> {
        let lock = self.lock_unless(inbox, dry_run)?;
        let handle = self
            .store
            .handle(inbox, run)
            .ok_or_else(|| UndoError::RunNotFound {
                inbox: inbox.to_path_buf(),
                run: run.clone(),
            })?;
        self.reverse(&handle, lock.as_ref(), dry_run)
    }

    fn lock_unless(&self, inbox: &Path, dry_run: bool) -> Result<Option<InboxLock>, UndoError> {
        if dry_run {
            return Ok(None);
        }
        Ok(Some(self.store.lock(inbox)?))
    }

    fn reverse(
        &self,
        handle: &LogHandle,
        lock: Option<&InboxLock>,
        dry_run: bool,
    ) -> Result<UndoSummary, UndoError> {
        let mut summary = UndoSummary::new(handle.run().clone(), dry_run);

        // Newest first: a later move may occupy a slot an earlier reversal needs.
        for (index, record) in self.store.pending(handle)?.into_iter().rev() {
            if !is_occupied(&record.dst) {
                log::warn!(
                    "{} is gone; cannot restore {}",
                    record.dst.display(),
                    record.src.display()
                );
                if let Some(lock) = lock {
                    self.store.mark_consumed(lock, handle, index)?;
                }
                summary.skipped.push((record, UndoSkip::Missing));
                continue;
            }

            if is_occupied(&record.src) {
                log::warn!(
                    "{} is occupied; leaving {} where it is",
                    record.src.display(),
                    record.dst.display()
                );
                summary.skipped.push((record, UndoSkip::Conflict));
                continue;
            }

            let Some(lock) = lock else {
                summary.planned.push(record);
                continue;
            };

            if let Err(e) = ensure_parent_dir(&record.src) {
                summary.failed.push((record, e.to_string()));
                continue;
            }

            if let Err(e) = move_file(&record.dst, &record.src) {
                let reason = format!("failed to restore file: {}", e);
                summary.failed.push((record, reason));
                continue;
            }

            self.store.mark_consumed(lock, handle, index)?;
            log::info!(
                "restored {} -> {}",
                record.dst.display(),
                record.src.display()
            );
            summary.undone.push(record);
        }

        Ok(summary)
    }
}
