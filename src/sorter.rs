//! One sorting pass over an inbox.
//!
//! The [`SortEngine`] walks the top level of the inbox in name order. Each
//! file is matched against the rules (automatic mode) or offered to a
//! [`Prompter`] (guided mode), resolved to a destination, moved, and logged
//! before the next file is looked at. Problems with a single file are
//! collected in the [`RunSummary`]; only an unreadable inbox or a failing log
//! store stop the run.

use crate::config::{CompiledIgnore, Config, ConfigError};
use crate::destination::{
    DestinationResolver, ResolveError, Resolved, Target, ensure_parent_dir, move_file,
};
use crate::move_log::{LogError, LogHandle, LogStore, MoveLog, MoveRecord, Outcome};
use crate::rules::{Rule, RuleMatcher, extension_of};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Label stored for destinations picked by hand.
pub const GUIDED_LABEL: &str = "guided";

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum SortError {
    #[error("cannot read inbox {}: {source}", path.display())]
    Inbox {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Log(#[from] LogError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Why a single file could not be placed. The run continues.
#[derive(Debug, Error)]
pub enum MoveError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("failed to move {} to {}: {source}", src.display(), dst.display())]
    Io {
        src: PathBuf,
        dst: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Answer of the guided-mode collaborator for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuidedChoice {
    /// Move the file to this target.
    Place(Target),
    /// Leave the file where it is.
    Skip,
    /// Stop the run before this file.
    Quit,
}

/// Asks where a file should go. Implemented by the terminal UI and by tests.
pub trait Prompter {
    /// `suggestion` is the rule that would have claimed the file in
    /// automatic mode, if any.
    fn choose(&mut self, file: &Path, suggestion: Option<&Rule>) -> GuidedChoice;
}

/// How destinations are chosen.
pub enum Mode<'p> {
    /// Rules decide; unmatched files stay in the inbox.
    Automatic,
    /// Every file is offered to the prompter; rules are only suggestions.
    Guided(&'p mut dyn Prompter),
}

/// Why a file stayed in the inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Hidden or matched by an ignore pattern.
    Ignored,
    NoExtension,
    /// No rule claims this extension.
    NoRule(String),
    /// The chosen target names a bucket that is not configured.
    UnknownBucket(String),
    UserSkipped,
    /// A symbolic link; links are never moved.
    Symlink,
    /// The destination is the file itself.
    AlreadyInPlace,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Ignored => write!(f, "ignored"),
            SkipReason::NoExtension => write!(f, "no extension"),
            SkipReason::NoRule(ext) => write!(f, "no rule for .{}", ext),
            SkipReason::UnknownBucket(bucket) => write!(f, "unknown bucket '{}'", bucket),
            SkipReason::UserSkipped => write!(f, "user skipped"),
            SkipReason::Symlink => write!(f, "symbolic link"),
            SkipReason::AlreadyInPlace => write!(f, "already in place"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Skipped {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// A move computed during a dry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub src: PathBuf,
    pub dst: PathBuf,
    pub renamed: bool,
    pub rule: String,
}

#[derive(Debug)]
pub struct Failure {
    pub path: PathBuf,
    pub error: MoveError,
}

/// Everything that happened during one run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub dry_run: bool,
    /// Records of files that were moved, in order.
    pub moved: Vec<MoveRecord>,
    /// Moves a dry run would have made.
    pub planned: Vec<PlannedMove>,
    pub skipped: Vec<Skipped>,
    pub failed: Vec<Failure>,
    /// The user quit before every file was seen.
    pub quit: bool,
    /// Files not looked at because of a quit.
    pub remaining: usize,
    /// The written log, if anything was moved.
    pub log: Option<LogHandle>,
}

impl RunSummary {
    fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    /// Files that were (or in a dry run would be) moved under a suffixed name.
    pub fn renamed_count(&self) -> usize {
        if self.dry_run {
            self.planned.iter().filter(|p| p.renamed).count()
        } else {
            self.moved
                .iter()
                .filter(|r| r.outcome == Outcome::Renamed)
                .count()
        }
    }

    /// True if every discovered file was dealt with without an error.
    pub fn is_complete(&self) -> bool {
        !self.quit && self.failed.is_empty()
    }
}

/// Sorts inbox files into the PARA tree.
pub struct SortEngine<'a> {
    matcher: RuleMatcher,
    resolver: DestinationResolver,
    ignore: CompiledIgnore,
    store: &'a LogStore,
    record_skips: bool,
}

impl<'a> SortEngine<'a> {
    /// Builds an engine from a loaded configuration.
    ///
    /// Rules that reference unknown buckets are dropped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if an ignore pattern is invalid.
    pub fn new(config: &Config, store: &'a LogStore) -> Result<Self, SortError> {
        Ok(Self {
            matcher: RuleMatcher::for_buckets(config.rules.clone(), &config.buckets),
            resolver: DestinationResolver::new(&config.para_root, config.buckets.clone()),
            ignore: config.ignore.compile()?,
            store,
            record_skips: false,
        })
    }

    /// Also write skipped files to the log, with outcome `skipped`.
    pub fn record_skips(mut self, enabled: bool) -> Self {
        self.record_skips = enabled;
        self
    }

    pub fn matcher(&self) -> &RuleMatcher {
        &self.matcher
    }

    /// Processes every top-level file of `inbox` once.
    ///
    /// In a dry run nothing is moved, no log is written and no lock is taken.
    ///
    /// # Errors
    ///
    /// Fails if the inbox cannot be listed, the inbox lock is held by another
    /// run, or a record cannot be written to the log. In the last case the
    /// file that was just moved is put back before returning.
    pub fn run(
        &self,
        inbox: &Path,
        mut mode: Mode<'_>,
        dry_run: bool,
    ) -> Result<RunSummary, SortError> {
        let files = discover(inbox)?;
        let mut log = if dry_run {
            None
        } else {
            Some(self.store.begin(inbox)?)
        };
        let mut summary = RunSummary::new(dry_run);
        // Destinations a dry run has handed out so far.
        let mut planned: HashSet<PathBuf> = HashSet::new();

        for (index, path) in files.iter().enumerate() {
            let name = file_name(path);

            if self.ignore.is_ignored(&name) {
                log::debug!("ignoring {}", path.display());
                summary.skipped.push(Skipped {
                    path: path.clone(),
                    reason: SkipReason::Ignored,
                });
                continue;
            }

            if is_symlink(path) {
                self.skip(path, SkipReason::Symlink, log.as_mut(), &mut summary)?;
                continue;
            }

            let rule = self.matcher.find(&name);
            let (target, label) = match &mut mode {
                Mode::Automatic => match rule {
                    Some(rule) => (rule_target(rule), rule.name.clone()),
                    None => {
                        let reason = match extension_of(&name) {
                            Some(ext) => SkipReason::NoRule(ext),
                            None => SkipReason::NoExtension,
                        };
                        self.skip(path, reason, log.as_mut(), &mut summary)?;
                        continue;
                    }
                },
                Mode::Guided(prompter) => match prompter.choose(path, rule) {
                    GuidedChoice::Quit => {
                        log::info!("quit requested; {} file(s) left untouched", files.len() - index);
                        summary.quit = true;
                        summary.remaining = files.len() - index;
                        break;
                    }
                    GuidedChoice::Skip => {
                        self.skip(path, SkipReason::UserSkipped, log.as_mut(), &mut summary)?;
                        continue;
                    }
                    GuidedChoice::Place(target) => {
                        let label = match rule {
                            Some(rule) if rule_target(rule) == target => rule.name.clone(),
                            _ => GUIDED_LABEL.to_string(),
                        };
                        (target, label)
                    }
                },
            };

            self.place(path, &target, &label, log.as_mut(), &mut planned, &mut summary)?;
        }

        summary.log = log.and_then(MoveLog::finalize);
        Ok(summary)
    }

    fn place(
        &self,
        path: &Path,
        target: &Target,
        label: &str,
        log: Option<&mut MoveLog>,
        planned: &mut HashSet<PathBuf>,
        summary: &mut RunSummary,
    ) -> Result<(), SortError> {
        let resolved = self
            .resolver
            .resolve_avoiding(target, path, |candidate| planned.contains(candidate));
        let Resolved { path: dst, renamed } = match resolved {
            Ok(resolved) => resolved,
            Err(ResolveError::UnknownBucket { bucket }) => {
                log::warn!(
                    "{}: bucket '{}' is not configured; leaving file unmatched",
                    path.display(),
                    bucket
                );
                return self.skip(path, SkipReason::UnknownBucket(bucket), log, summary);
            }
            Err(e) => {
                summary.failed.push(Failure {
                    path: path.to_path_buf(),
                    error: e.into(),
                });
                return Ok(());
            }
        };

        if dst == path {
            return self.skip(path, SkipReason::AlreadyInPlace, log, summary);
        }

        let Some(log) = log else {
            planned.insert(dst.clone());
            summary.planned.push(PlannedMove {
                src: path.to_path_buf(),
                dst,
                renamed,
                rule: label.to_string(),
            });
            return Ok(());
        };

        if let Err(e) = ensure_parent_dir(&dst) {
            summary.failed.push(Failure {
                path: path.to_path_buf(),
                error: e.into(),
            });
            return Ok(());
        }

        if let Err(source) = move_file(path, &dst) {
            summary.failed.push(Failure {
                path: path.to_path_buf(),
                error: MoveError::Io {
                    src: path.to_path_buf(),
                    dst,
                    source,
                },
            });
            return Ok(());
        }

        let outcome = if renamed {
            Outcome::Renamed
        } else {
            Outcome::Moved
        };
        let record = MoveRecord::new(path.to_path_buf(), dst, outcome, label);

        if let Err(e) = log.append(&record) {
            // Unlogged moves are put back.
            if let Err(back) = move_file(&record.dst, &record.src) {
                log::error!(
                    "could not log or revert move of {} to {}: {}",
                    record.src.display(),
                    record.dst.display(),
                    back
                );
            }
            return Err(e.into());
        }

        log::info!(
            "{}: {} -> {}",
            label,
            record.src.display(),
            record.dst.display()
        );
        summary.moved.push(record);
        Ok(())
    }

    fn skip(
        &self,
        path: &Path,
        reason: SkipReason,
        log: Option<&mut MoveLog>,
        summary: &mut RunSummary,
    ) -> Result<(), SortError> {
        log::debug!("skipping {}: {}", path.display(), reason);
        if self.record_skips
            && let Some(log) = log
        {
            let record = MoveRecord::new(
                path.to_path_buf(),
                path.to_path_buf(),
                Outcome::Skipped,
                &reason.to_string(),
            );
            log.append(&record)?;
        }
        summary.skipped.push(Skipped {
            path: path.to_path_buf(),
            reason,
        });
        Ok(())
    }
}

fn rule_target(rule: &Rule) -> Target {
    Target::new(rule.bucket.as_str(), rule.path.as_deref())
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Regular files and links to files directly inside `inbox`, sorted by name.
///
/// Directories are never entered, so bucket directories living under the
/// inbox are left alone. Links are listed only so they can be reported.
fn discover(inbox: &Path) -> Result<Vec<PathBuf>, SortError> {
    let entries = fs::read_dir(inbox).map_err(|source| SortError::Inbox {
        path: inbox.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| match entry.file_type() {
            Ok(t) if t.is_file() => true,
            Ok(t) if t.is_symlink() => !entry.path().is_dir(),
            _ => false,
        })
        .map(|entry| entry.path())
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Bucket, default_buckets};
    use std::collections::VecDeque;
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        store: LogStore,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().expect("Failed to create temp directory");
            fs::create_dir(temp.path().join("inbox")).unwrap();
            let store = LogStore::new(temp.path().join("state"));
            Self { temp, store }
        }

        fn inbox(&self) -> PathBuf {
            self.temp.path().join("inbox")
        }

        fn root(&self) -> PathBuf {
            self.temp.path().join("para")
        }

        fn config(&self, rules: Vec<Rule>) -> Config {
            Config {
                para_root: self.root(),
                buckets: default_buckets(),
                rules,
                ..Config::default()
            }
        }

        fn create(&self, name: &str) -> PathBuf {
            let path = self.inbox().join(name);
            fs::write(&path, name).unwrap();
            path
        }
    }

    struct Scripted(VecDeque<GuidedChoice>);

    impl Prompter for Scripted {
        fn choose(&mut self, _file: &Path, _suggestion: Option<&Rule>) -> GuidedChoice {
            self.0.pop_front().unwrap_or(GuidedChoice::Quit)
        }
    }

    fn images_rule() -> Rule {
        Rule::new("Images", ["png", "jpg"], "resources", Some("Images"))
    }

    #[test]
    fn test_automatic_moves_matched_and_logs() {
        let f = Fixture::new();
        f.create("photo.JPG");
        f.create("notes.txt");
        let engine = SortEngine::new(&f.config(vec![images_rule()]), &f.store).unwrap();

        let summary = engine.run(&f.inbox(), Mode::Automatic, false).unwrap();

        let dest = f.root().join("3_Resources/Images/photo.JPG");
        assert!(dest.exists());
        assert!(f.inbox().join("notes.txt").exists());
        assert_eq!(summary.moved.len(), 1);
        assert_eq!(summary.moved[0].dst, dest);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].reason, SkipReason::NoRule("txt".to_string()));

        let handle = summary.log.expect("log written");
        let records = f.store.load(&handle).unwrap();
        assert_eq!(records, summary.moved);
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let f = Fixture::new();
        let src = f.create("photo.png");
        let engine = SortEngine::new(&f.config(vec![images_rule()]), &f.store).unwrap();

        let summary = engine.run(&f.inbox(), Mode::Automatic, true).unwrap();

        assert!(src.exists());
        assert!(!f.root().exists());
        assert!(!f.store.root().exists());
        assert_eq!(summary.planned.len(), 1);
        assert_eq!(
            summary.planned[0].dst,
            f.root().join("3_Resources/Images/photo.png")
        );
        assert!(summary.moved.is_empty());
        assert!(summary.log.is_none());
    }

    #[test]
    fn test_collision_is_renamed_and_logged() {
        let f = Fixture::new();
        f.create("a.png");
        let dir = f.root().join("3_Resources/Images");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("a.png"), "older").unwrap();
        let engine = SortEngine::new(&f.config(vec![images_rule()]), &f.store).unwrap();

        let summary = engine.run(&f.inbox(), Mode::Automatic, false).unwrap();

        assert_eq!(summary.moved[0].dst, dir.join("a_1.png"));
        assert_eq!(summary.moved[0].outcome, Outcome::Renamed);
        assert_eq!(fs::read_to_string(dir.join("a.png")).unwrap(), "older");
        assert_eq!(summary.renamed_count(), 1);
    }

    #[test]
    fn test_directories_are_left_alone() {
        let f = Fixture::new();
        fs::create_dir(f.inbox().join("nested.png")).unwrap();
        let engine = SortEngine::new(&f.config(vec![images_rule()]), &f.store).unwrap();

        let summary = engine.run(&f.inbox(), Mode::Automatic, false).unwrap();

        assert!(summary.moved.is_empty());
        assert!(summary.skipped.is_empty());
        assert!(f.inbox().join("nested.png").is_dir());
        assert!(summary.log.is_none());
    }

    #[test]
    fn test_dotfiles_are_sorted_unless_hidden_is_ignored() {
        let f = Fixture::new();
        f.create(".draft.png");
        f.create(".DS_Store");
        let engine = SortEngine::new(&f.config(vec![images_rule()]), &f.store).unwrap();

        let summary = engine.run(&f.inbox(), Mode::Automatic, true).unwrap();
        assert_eq!(summary.planned.len(), 1);
        assert_eq!(
            summary.planned[0].dst,
            f.root().join("3_Resources/Images/.draft.png")
        );
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].reason, SkipReason::NoExtension);

        let mut config = f.config(vec![images_rule()]);
        config.ignore.hidden = true;
        let engine = SortEngine::new(&config, &f.store).unwrap();
        let summary = engine.run(&f.inbox(), Mode::Automatic, false).unwrap();

        assert!(summary.moved.is_empty());
        assert!(f.inbox().join(".draft.png").exists());
        assert!(summary.skipped.iter().all(|s| s.reason == SkipReason::Ignored));
        assert!(summary.log.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_reported_not_moved() {
        let f = Fixture::new();
        let target = f.temp.path().join("real.png");
        fs::write(&target, "pixels").unwrap();
        let link = f.inbox().join("link.png");
        std::os::unix::fs::symlink(&target, &link).unwrap();
        let engine = SortEngine::new(&f.config(vec![images_rule()]), &f.store).unwrap();

        let summary = engine.run(&f.inbox(), Mode::Automatic, false).unwrap();

        assert!(summary.moved.is_empty());
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].path, link);
        assert_eq!(summary.skipped[0].reason, SkipReason::Symlink);
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    }

    #[test]
    fn test_dry_run_plan_matches_real_run() {
        let f = Fixture::new();
        f.create("a.png");
        f.create("a_1.png");
        let dir = f.root().join("3_Resources/Images");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("a.png"), "older").unwrap();
        let engine = SortEngine::new(&f.config(vec![images_rule()]), &f.store).unwrap();

        let plan = engine.run(&f.inbox(), Mode::Automatic, true).unwrap();
        let real = engine.run(&f.inbox(), Mode::Automatic, false).unwrap();

        let planned: Vec<PathBuf> = plan.planned.iter().map(|p| p.dst.clone()).collect();
        let moved: Vec<PathBuf> = real.moved.iter().map(|r| r.dst.clone()).collect();
        assert_eq!(planned, vec![dir.join("a_1.png"), dir.join("a_1_1.png")]);
        assert_eq!(planned, moved);
        assert_eq!(plan.renamed_count(), real.renamed_count());
    }

    #[test]
    fn test_unknown_bucket_rule_leaves_file_unmatched() {
        let f = Fixture::new();
        f.create("a.png");
        let rules = vec![Rule::new("Broken", ["png"], "foo", None)];
        let engine = SortEngine::new(&f.config(rules), &f.store).unwrap();

        let summary = engine.run(&f.inbox(), Mode::Automatic, false).unwrap();

        assert!(summary.moved.is_empty());
        assert!(f.inbox().join("a.png").exists());
        assert_eq!(summary.skipped[0].reason, SkipReason::NoRule("png".to_string()));
    }

    #[test]
    fn test_guided_unknown_bucket_is_unmatched() {
        let f = Fixture::new();
        f.create("a.png");
        let mut config = f.config(vec![]);
        config.buckets.remove(&Bucket::Projects);
        let engine = SortEngine::new(&config, &f.store).unwrap();
        let mut prompter = Scripted(VecDeque::from([GuidedChoice::Place(Target::in_bucket(
            Bucket::Projects,
            None,
        ))]));

        let summary = engine
            .run(&f.inbox(), Mode::Guided(&mut prompter), false)
            .unwrap();

        assert!(summary.moved.is_empty());
        assert!(summary.failed.is_empty());
        assert_eq!(
            summary.skipped[0].reason,
            SkipReason::UnknownBucket("projects".to_string())
        );
    }

    #[test]
    fn test_guided_quit_keeps_partial_log() {
        let f = Fixture::new();
        for name in ["1.png", "2.png", "3.png", "4.png", "5.png"] {
            f.create(name);
        }
        let engine = SortEngine::new(&f.config(vec![images_rule()]), &f.store).unwrap();
        let mut prompter = Scripted(VecDeque::from([
            GuidedChoice::Place(Target::in_bucket(Bucket::Areas, Some("Pics"))),
            GuidedChoice::Place(Target::in_bucket(Bucket::Resources, Some("Images"))),
            GuidedChoice::Quit,
        ]));

        let summary = engine
            .run(&f.inbox(), Mode::Guided(&mut prompter), false)
            .unwrap();

        assert!(summary.quit);
        assert_eq!(summary.remaining, 3);
        assert_eq!(summary.moved.len(), 2);
        assert_eq!(summary.moved[0].rule, GUIDED_LABEL);
        assert_eq!(summary.moved[1].rule, "Images");
        assert!(f.root().join("2_Areas/Pics/1.png").exists());
        assert!(f.root().join("3_Resources/Images/2.png").exists());
        for name in ["3.png", "4.png", "5.png"] {
            assert!(f.inbox().join(name).exists());
        }
        let handle = summary.log.expect("partial log kept");
        assert_eq!(f.store.load(&handle).unwrap().len(), 2);
    }

    #[test]
    fn test_guided_skip_is_not_logged_by_default() {
        let f = Fixture::new();
        f.create("a.png");
        let engine = SortEngine::new(&f.config(vec![images_rule()]), &f.store).unwrap();
        let mut prompter = Scripted(VecDeque::from([GuidedChoice::Skip]));

        let summary = engine
            .run(&f.inbox(), Mode::Guided(&mut prompter), false)
            .unwrap();

        assert_eq!(summary.skipped[0].reason, SkipReason::UserSkipped);
        assert!(summary.log.is_none());
    }

    #[test]
    fn test_record_skips_writes_skipped_outcome() {
        let f = Fixture::new();
        f.create("notes.txt");
        f.create("a.png");
        let engine = SortEngine::new(&f.config(vec![images_rule()]), &f.store)
            .unwrap()
            .record_skips(true);

        let summary = engine.run(&f.inbox(), Mode::Automatic, false).unwrap();

        let records = f.store.load(summary.log.as_ref().unwrap()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].outcome, Outcome::Skipped);
        assert_eq!(records[1].rule, "no rule for .txt");
        assert_eq!(f.store.pending(summary.log.as_ref().unwrap()).unwrap().len(), 1);
    }

    #[test]
    fn test_directory_failure_is_per_file() {
        let f = Fixture::new();
        f.create("a.png");
        f.create("b.pdf");
        fs::create_dir_all(f.root()).unwrap();
        // A file where the bucket directory should be.
        fs::write(f.root().join("3_Resources"), "blocker").unwrap();
        let rules = vec![
            images_rule(),
            Rule::new("PDFs", ["pdf"], "archive", None),
        ];
        let engine = SortEngine::new(&f.config(rules), &f.store).unwrap();

        let summary = engine.run(&f.inbox(), Mode::Automatic, false).unwrap();

        assert_eq!(summary.failed.len(), 1);
        assert!(matches!(
            summary.failed[0].error,
            MoveError::Resolve(ResolveError::DirectoryCreate { .. })
        ));
        assert_eq!(summary.moved.len(), 1);
        assert!(f.root().join("4_Archive/b.pdf").exists());
        assert!(f.inbox().join("a.png").exists());
        assert!(!summary.is_complete());
    }

    #[test]
    fn test_missing_inbox_is_fatal() {
        let f = Fixture::new();
        let engine = SortEngine::new(&f.config(vec![]), &f.store).unwrap();
        let result = engine.run(&f.temp.path().join("nope"), Mode::Automatic, false);
        assert!(matches!(result, Err(SortError::Inbox { .. })));
    }

    #[test]
    fn test_busy_log_is_fatal() {
        let f = Fixture::new();
        f.create("a.png");
        let engine = SortEngine::new(&f.config(vec![images_rule()]), &f.store).unwrap();
        let _held = f.store.lock(&f.inbox()).unwrap();

        let result = engine.run(&f.inbox(), Mode::Automatic, false);
        assert!(matches!(result, Err(SortError::Log(LogError::Busy { .. }))));
        assert!(f.inbox().join("a.png").exists());
    }
}
