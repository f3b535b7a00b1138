//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output: colored status lines,
//! per-rule summary tables, and the run/undo reports.

use crate::move_log::RunInfo;
use crate::sorter::RunSummary;
use crate::undo::UndoSummary;
use colored::*;
use std::collections::{BTreeMap, HashMap};

/// How many skipped files are listed by name before eliding the rest.
const SKIP_EXAMPLES: usize = 20;

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Summary tables for sort and undo runs
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a regular message without styling.
    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Prints a summary table with file counts by rule.
    ///
    /// # Arguments
    ///
    /// * `rule_counts` - HashMap of rule labels to file counts
    /// * `total_files` - Total number of files moved
    pub fn summary_table(rule_counts: &HashMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        // Sort rules for consistent output
        let mut rules: Vec<_> = rule_counts.iter().collect();
        rules.sort_by_key(|&(name, _)| name);

        let max_rule_len = rules
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0)
            .max(5); // At least "Total" width

        println!(
            "{:<width$} | {}",
            "Rule".bold(),
            "Files".bold(),
            width = max_rule_len
        );
        println!("{}", "-".repeat(max_rule_len + 10));

        for (rule, count) in &rules {
            let file_word = if **count == 1 { "file" } else { "files" };
            println!(
                "{:<width$} | {} {}",
                rule,
                count.to_string().green(),
                file_word,
                width = max_rule_len
            );
        }

        println!("{}", "-".repeat(max_rule_len + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            if total_files == 1 { "file" } else { "files" },
            width = max_rule_len
        );
    }

    /// Prints everything a sort run did or would do.
    pub fn sort_report(summary: &RunSummary) {
        let mut rule_counts: HashMap<String, usize> = HashMap::new();

        if summary.dry_run {
            for planned in &summary.planned {
                let note = if planned.renamed { " (renamed)" } else { "" };
                Self::dry_run_notice(&format!(
                    "{}: {} -> {}{}",
                    planned.rule,
                    planned.src.display(),
                    planned.dst.display(),
                    note
                ));
                *rule_counts.entry(planned.rule.clone()).or_insert(0) += 1;
            }
        } else {
            for record in &summary.moved {
                Self::success(&format!(
                    "{}: {} -> {}",
                    record.rule,
                    record.src.display(),
                    record.dst.display()
                ));
                *rule_counts.entry(record.rule.clone()).or_insert(0) += 1;
            }
        }

        for failure in &summary.failed {
            Self::error(&format!("{}: {}", failure.path.display(), failure.error));
        }

        let total: usize = rule_counts.values().sum();
        if total > 0 {
            Self::summary_table(&rule_counts, total);
        }

        Self::skipped_report(summary);

        if summary.quit {
            Self::warning(&format!(
                "Run stopped early; {} file(s) left untouched.",
                summary.remaining
            ));
        }

        let renamed = summary.renamed_count();
        if summary.dry_run {
            Self::dry_run_notice(&format!(
                "would move {} file(s) ({} renamed), skip {}, fail {}",
                summary.planned.len(),
                renamed,
                summary.skipped.len(),
                summary.failed.len()
            ));
        } else {
            Self::plain(&format!(
                "moved {} file(s) ({} renamed), skipped {}, failed {}",
                summary.moved.len(),
                renamed,
                summary.skipped.len(),
                summary.failed.len()
            ));
        }
    }

    fn skipped_report(summary: &RunSummary) {
        if summary.skipped.is_empty() {
            return;
        }

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for skipped in &summary.skipped {
            *counts.entry(skipped.reason.to_string()).or_insert(0) += 1;
        }

        Self::header("Unmatched / skipped:");
        for (reason, n) in &counts {
            Self::plain(&format!("  - {}: {}", reason, n));
        }

        for skipped in summary.skipped.iter().take(SKIP_EXAMPLES) {
            Self::plain(&format!(
                "    {}: {}",
                skipped.reason,
                skipped.path.display()
            ));
        }
        if summary.skipped.len() > SKIP_EXAMPLES {
            Self::plain(&format!(
                "    ... and {} more",
                summary.skipped.len() - SKIP_EXAMPLES
            ));
        }
    }

    /// Prints what an undo did or would do.
    pub fn undo_report(summary: &UndoSummary) {
        for record in &summary.planned {
            Self::dry_run_notice(&format!(
                "{} -> {}",
                record.dst.display(),
                record.src.display()
            ));
        }
        for record in &summary.undone {
            Self::success(&format!(
                "{} -> {}",
                record.dst.display(),
                record.src.display()
            ));
        }
        for (record, why) in &summary.skipped {
            Self::warning(&format!("skipped ({}): {}", why, record.dst.display()));
        }
        for (record, reason) in &summary.failed {
            Self::error(&format!("{}: {}", record.dst.display(), reason));
        }

        if summary.dry_run {
            Self::dry_run_notice(&format!(
                "would undo {} move(s) from run {}, skip {}",
                summary.planned.len(),
                summary.run,
                summary.skipped.len()
            ));
        } else {
            Self::plain(&format!(
                "undid {} move(s) from run {}, skipped {}, failed {}",
                summary.undone.len(),
                summary.run,
                summary.skipped.len(),
                summary.failed.len()
            ));
        }
    }

    /// Lists stored runs, oldest first.
    pub fn runs_table(runs: &[RunInfo]) {
        if runs.is_empty() {
            Self::info("No runs recorded for this inbox.");
            return;
        }

        println!("{:<26} | {:>7} | {:>7}", "Run".bold(), "Moves".bold(), "Pending".bold());
        println!("{}", "-".repeat(46));
        for run in runs {
            let pending = if run.pending == 0 {
                "undone".dimmed().to_string()
            } else {
                run.pending.to_string().yellow().to_string()
            };
            println!(
                "{:<26} | {:>7} | {:>7}",
                run.handle.run().as_str(),
                run.records,
                pending
            );
        }
    }
}
