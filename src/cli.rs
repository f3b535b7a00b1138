//! Command-line interface module for parsort.
//!
//! This module handles all CLI-related functionality including:
//! - Command parsing (clap)
//! - Config creation (`init`)
//! - Sort orchestration in automatic and guided mode
//! - Undo and run listing

use crate::config::{
    Bucket, BucketMap, Config, config_template, default_buckets, user_config_path, write_config,
};
use crate::move_log::{LogStore, RunId};
use crate::output::OutputFormatter;
use crate::prompt::Terminal;
use crate::sorter::{Mode, SortEngine};
use crate::undo::UndoEngine;
use clap::{ArgAction, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

/// Sort an inbox folder into a PARA hierarchy.
#[derive(Debug, Parser)]
#[command(name = "parsort", version, about)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Represents a CLI command to execute.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create a user config file
    Init {
        /// Ask for the PARA root and bucket folder names
        #[arg(long)]
        guided: bool,
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
        /// Where to write the config (defaults to the user config path)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
    /// Sort an inbox folder using rules
    Sort {
        /// Folder to treat as inbox (e.g. ~/Downloads)
        inbox: PathBuf,
        /// Path to a config file (overrides the usual lookup)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
        /// Prompt for every file; rules are suggestions only
        #[arg(long)]
        guided: bool,
        /// Show what would happen without moving anything
        #[arg(long)]
        dry_run: bool,
        /// Also record skipped files in the move log
        #[arg(long)]
        log_skips: bool,
    },
    /// Undo the last sort run of an inbox
    Undo {
        /// Inbox folder used previously
        inbox: PathBuf,
        /// Undo this run instead of the latest one (see `parsort runs`)
        #[arg(long, value_name = "RUN")]
        run: Option<String>,
        /// Show what would happen without moving anything
        #[arg(long)]
        dry_run: bool,
    },
    /// List the recorded runs of an inbox
    Runs {
        inbox: PathBuf,
    },
}

/// Runs a command against the user's log store.
///
/// # Examples
///
/// ```no_run
/// use parsort::cli::{run_cli, Command};
/// use std::path::PathBuf;
///
/// let result = run_cli(Command::Undo {
///     inbox: PathBuf::from("/home/me/Downloads"),
///     run: None,
///     dry_run: true,
/// });
/// if let Err(e) = result {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(command: Command) -> Result<(), String> {
    let store = LogStore::from_env().map_err(|e| e.to_string())?;
    run_cli_with_store(command, &store)
}

/// Runs a command against an explicit log store.
pub fn run_cli_with_store(command: Command, store: &LogStore) -> Result<(), String> {
    match command {
        Command::Init {
            guided,
            force,
            config,
        } => init_config(guided, force, config),
        Command::Sort {
            inbox,
            config,
            guided,
            dry_run,
            log_skips,
        } => sort_inbox(&inbox, config.as_deref(), guided, dry_run, log_skips, store),
        Command::Undo {
            inbox,
            run,
            dry_run,
        } => undo_inbox(&inbox, run.as_deref(), dry_run, store),
        Command::Runs { inbox } => list_runs(&inbox, store),
    }
}

/// Sorts `inbox` into the PARA tree described by the loaded config.
///
/// Per-file failures are reported but do not make this fail; an inaccessible
/// inbox or config, or a busy/unwritable log, does.
pub fn sort_inbox(
    inbox: &Path,
    config_path: Option<&Path>,
    guided: bool,
    dry_run: bool,
    log_skips: bool,
    store: &LogStore,
) -> Result<(), String> {
    let inbox = fs::canonicalize(inbox)
        .map_err(|e| format!("Cannot access inbox {}: {}", inbox.display(), e))?;
    if !inbox.is_dir() {
        return Err(format!("Inbox {} is not a directory", inbox.display()));
    }

    let config = Config::load(config_path).map_err(|e| format!("Error loading configuration: {}", e))?;
    let engine = SortEngine::new(&config, store)
        .map_err(|e| format!("Error loading configuration: {}", e))?
        .record_skips(log_skips);

    if dry_run {
        OutputFormatter::dry_run_notice(&format!("Analyzing contents of: {}", inbox.display()));
    } else {
        OutputFormatter::info(&format!("Sorting contents of: {}", inbox.display()));
    }
    match &config.source {
        Some(path) => OutputFormatter::plain(&format!("Config: {}", path.display())),
        None => OutputFormatter::plain("Config: built-in defaults"),
    }
    OutputFormatter::plain(&format!("PARA root: {}", config.para_root.display()));
    if engine.matcher().is_empty() && !guided {
        OutputFormatter::warning("No usable rules configured; nothing will be moved.");
    }

    let summary = if guided {
        let mut terminal = Terminal::stdio(config.buckets.clone());
        engine.run(&inbox, Mode::Guided(&mut terminal), dry_run)
    } else {
        engine.run(&inbox, Mode::Automatic, dry_run)
    }
    .map_err(|e| format!("Error: {}", e))?;

    OutputFormatter::sort_report(&summary);

    if dry_run {
        OutputFormatter::success("Dry run complete. No files were modified.");
    } else if let Some(handle) = &summary.log {
        OutputFormatter::plain(&format!("log: {}", handle.records_path().display()));
        OutputFormatter::plain(&format!(
            "Use 'parsort undo {}' to revert changes.",
            inbox.display()
        ));
    }

    if !summary.failed.is_empty() {
        OutputFormatter::warning("Some files could not be moved. Please review errors above.");
    }
    Ok(())
}

/// Undoes the latest (or the given) run of `inbox`.
pub fn undo_inbox(
    inbox: &Path,
    run: Option<&str>,
    dry_run: bool,
    store: &LogStore,
) -> Result<(), String> {
    let inbox = resolve_inbox(inbox)?;
    let engine = UndoEngine::new(store);

    if dry_run {
        OutputFormatter::dry_run_notice(&format!("Planning undo for: {}", inbox.display()));
    } else {
        OutputFormatter::info(&format!("Undoing previous sort of: {}", inbox.display()));
    }

    let summary = match run {
        Some(id) => {
            let id: RunId = id.parse().map_err(|e| format!("Error: {}", e))?;
            engine.undo_run(&inbox, &id, dry_run)
        }
        None => engine.undo(&inbox, dry_run),
    }
    .map_err(|e| format!("Error: {}", e))?;

    OutputFormatter::undo_report(&summary);

    if summary.skipped.iter().any(|(_, why)| *why == crate::undo::UndoSkip::Conflict)
        || !summary.failed.is_empty()
    {
        OutputFormatter::warning(
            "Some moves are still pending. Fix the issues above and run undo again.",
        );
    }
    Ok(())
}

/// Prints the runs recorded for `inbox`.
pub fn list_runs(inbox: &Path, store: &LogStore) -> Result<(), String> {
    let inbox = resolve_inbox(inbox)?;
    let runs = store.runs(&inbox).map_err(|e| format!("Error: {}", e))?;
    OutputFormatter::header(&format!("Runs for {}", inbox.display()));
    OutputFormatter::runs_table(&runs);
    Ok(())
}

/// Canonical path if the inbox still exists, absolute path otherwise.
fn resolve_inbox(inbox: &Path) -> Result<PathBuf, String> {
    fs::canonicalize(inbox)
        .or_else(|_| std::path::absolute(inbox))
        .map_err(|e| format!("Cannot resolve inbox {}: {}", inbox.display(), e))
}

/// Writes a config file, optionally asking for the root and bucket names.
fn init_config(guided: bool, force: bool, path: Option<PathBuf>) -> Result<(), String> {
    let path = path
        .or_else(user_config_path)
        .ok_or("Could not determine the user config directory; pass --config")?;

    if path.exists() && !force {
        OutputFormatter::info(&format!("Config already exists: {}", path.display()));
        OutputFormatter::plain("Use --force to overwrite.");
        return Ok(());
    }

    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let contents = if guided {
        guided_template(&home).map_err(|e| format!("Error: {}", e))?
    } else {
        config_template(&home, &default_buckets())
    };

    write_config(&path, &contents, force).map_err(|e| format!("Error: {}", e))?;
    OutputFormatter::success(&format!("Wrote config: {}", path.display()));
    Ok(())
}

fn guided_template(home: &Path) -> std::io::Result<String> {
    let mut terminal = Terminal::stdio(default_buckets());
    OutputFormatter::plain("parsort init (guided). Press Enter to accept defaults.\n");

    let root = terminal.ask("PARA root folder", &home.display().to_string())?;
    let root = crate::config::expand_tilde(Path::new(&root))
        .ok()
        .and_then(|p| std::path::absolute(p).ok())
        .unwrap_or_else(|| PathBuf::from(&root));

    let mut buckets = BucketMap::new();
    for bucket in Bucket::ALL {
        let question = format!("{} bucket folder", capitalize(bucket.key()));
        let dir = terminal.ask(&question, bucket.default_dir_name())?;
        buckets.insert(bucket, dir);
    }

    let missing: Vec<PathBuf> = buckets
        .values()
        .map(|dir| root.join(dir))
        .filter(|p| !p.exists())
        .collect();
    if !missing.is_empty() {
        OutputFormatter::header("The following bucket directories do not exist:");
        for path in &missing {
            OutputFormatter::plain(&format!("  - {}", path.display()));
        }
        if terminal.confirm("Create them now?")? {
            for path in &missing {
                fs::create_dir_all(path)?;
                OutputFormatter::success(&format!("Created: {}", path.display()));
            }
        } else {
            OutputFormatter::warning("Skipping bucket creation. Make sure they exist before sorting.");
        }
    }

    Ok(config_template(&root, &buckets))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
