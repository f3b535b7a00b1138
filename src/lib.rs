//! parsort - sort an inbox folder into a PARA hierarchy
//!
//! This library matches inbox files against ordered extension rules, resolves
//! collision-free destinations in the Projects/Areas/Resources/Archive buckets,
//! moves them while appending every move to a durable log, and reverses those
//! moves on undo.

pub mod cli;
pub mod config;
pub mod destination;
pub mod move_log;
pub mod output;
pub mod prompt;
pub mod rules;
pub mod sorter;
pub mod undo;

pub use config::{Bucket, BucketMap, Config, ConfigError};
pub use destination::{DestinationResolver, ResolveError, Target};
pub use move_log::{LogError, LogHandle, LogStore, MoveLog, MoveRecord, Outcome, RunId};
pub use rules::{Rule, RuleMatcher};
pub use sorter::{GuidedChoice, Mode, MoveError, Prompter, RunSummary, SortEngine, SortError};
pub use undo::{UndoEngine, UndoError, UndoSkip, UndoSummary};

pub use cli::{Command, run_cli};
