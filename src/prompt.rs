//! Line-based terminal prompts for guided sorting and `init --guided`.

use crate::config::{Bucket, BucketMap};
use crate::destination::Target;
use crate::rules::Rule;
use crate::sorter::{GuidedChoice, Prompter};
use std::io::{self, BufRead, StdinLock, Stdout, Write};
use std::path::Path;

/// Reads answers from `input` and writes questions to `output`.
///
/// End of input is treated as "quit".
pub struct Terminal<R, W> {
    input: R,
    output: W,
    buckets: BucketMap,
}

impl Terminal<StdinLock<'static>, Stdout> {
    /// A terminal on the process's stdin and stdout.
    pub fn stdio(buckets: BucketMap) -> Self {
        Self::new(io::stdin().lock(), io::stdout(), buckets)
    }
}

impl<R: BufRead, W: Write> Terminal<R, W> {
    pub fn new(input: R, output: W, buckets: BucketMap) -> Self {
        Self {
            input,
            output,
            buckets,
        }
    }

    /// Reads one trimmed line, or `None` at end of input.
    fn read_line(&mut self) -> io::Result<Option<String>> {
        write!(self.output, "> ")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Asks a question with a default answer.
    pub fn ask(&mut self, question: &str, default: &str) -> io::Result<String> {
        writeln!(self.output, "{} [{}]", question, default)?;
        Ok(self
            .read_line()?
            .filter(|answer| !answer.is_empty())
            .unwrap_or_else(|| default.to_string()))
    }

    /// Asks a yes/no question; anything but "y" or "yes" is no.
    pub fn confirm(&mut self, question: &str) -> io::Result<bool> {
        writeln!(self.output, "{} [y/N]", question)?;
        Ok(matches!(
            self.read_line()?.map(|a| a.to_lowercase()).as_deref(),
            Some("y") | Some("yes")
        ))
    }

    fn try_choose(&mut self, file: &Path, suggestion: Option<&Rule>) -> io::Result<GuidedChoice> {
        let suggested = suggestion.and_then(|rule| rule.bucket_key().map(|b| (b, rule)));
        let label = match suggested {
            Some((bucket, rule)) => match &rule.path {
                Some(path) => format!("{}/{} ({})", bucket, path, rule.name),
                None => format!("{} ({})", bucket, rule.name),
            },
            None => "(no suggestion)".to_string(),
        };

        writeln!(self.output, "{}", "-".repeat(50))?;
        writeln!(
            self.output,
            "File: {}",
            file.file_name().unwrap_or_default().to_string_lossy()
        )?;
        writeln!(self.output, "From: {}", file.display())?;
        writeln!(self.output, "Suggested: {}", label)?;

        let order: Vec<Bucket> = self.buckets.keys().copied().collect();
        for (i, bucket) in order.iter().enumerate() {
            writeln!(self.output, "  {}) {} ({})", i + 1, bucket, self.buckets[bucket])?;
        }
        writeln!(self.output, "  s) skip file")?;
        writeln!(self.output, "  q) quit run")?;
        writeln!(self.output, "  Enter = accept suggestion")?;

        let bucket = loop {
            let Some(answer) = self.read_line()? else {
                return Ok(GuidedChoice::Quit);
            };
            match answer.to_lowercase().as_str() {
                "q" => return Ok(GuidedChoice::Quit),
                "s" => return Ok(GuidedChoice::Skip),
                "" => match suggested {
                    Some((bucket, _)) => break bucket,
                    None => writeln!(
                        self.output,
                        "No suggestion available. Choose a bucket number, s, or q."
                    )?,
                },
                other => match other.parse::<usize>() {
                    Ok(n) if (1..=order.len()).contains(&n) => break order[n - 1],
                    _ => writeln!(self.output, "Invalid input. Use Enter, a number, s, or q.")?,
                },
            }
        };

        let default_subpath = match suggested {
            Some((suggested_bucket, rule)) if suggested_bucket == bucket => {
                rule.path.clone().unwrap_or_default()
            }
            _ => String::new(),
        };
        writeln!(self.output, "Subfolder path [{}]", default_subpath)?;
        let Some(answer) = self.read_line()? else {
            return Ok(GuidedChoice::Quit);
        };
        let subpath = if answer.is_empty() {
            default_subpath
        } else {
            answer
        };

        Ok(GuidedChoice::Place(Target::in_bucket(
            bucket,
            Some(subpath.as_str()),
        )))
    }
}

impl<R: BufRead, W: Write> Prompter for Terminal<R, W> {
    fn choose(&mut self, file: &Path, suggestion: Option<&Rule>) -> GuidedChoice {
        self.try_choose(file, suggestion).unwrap_or_else(|e| {
            log::error!("terminal error: {}; stopping", e);
            GuidedChoice::Quit
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_buckets;
    use std::io::Cursor;

    fn terminal(input: &str) -> Terminal<Cursor<Vec<u8>>, Vec<u8>> {
        Terminal::new(
            Cursor::new(input.as_bytes().to_vec()),
            Vec::new(),
            default_buckets(),
        )
    }

    fn images() -> Rule {
        Rule::new("Images", ["png"], "resources", Some("Images"))
    }

    #[test]
    fn test_enter_accepts_suggestion_and_subpath() {
        let mut t = terminal("\n\n");
        let choice = t.choose(Path::new("/inbox/a.png"), Some(&images()));
        assert_eq!(
            choice,
            GuidedChoice::Place(Target::new("resources", Some("Images")))
        );
    }

    #[test]
    fn test_number_picks_bucket_and_custom_subpath() {
        let mut t = terminal("1\nClient/Assets\n");
        let choice = t.choose(Path::new("/inbox/a.png"), Some(&images()));
        assert_eq!(
            choice,
            GuidedChoice::Place(Target::new("projects", Some("Client/Assets")))
        );
    }

    #[test]
    fn test_other_bucket_has_no_default_subpath() {
        let mut t = terminal("4\n\n");
        let choice = t.choose(Path::new("/inbox/a.png"), Some(&images()));
        assert_eq!(choice, GuidedChoice::Place(Target::new("archive", None)));
    }

    #[test]
    fn test_enter_without_suggestion_reprompts() {
        let mut t = terminal("\n9\ns\n");
        let choice = t.choose(Path::new("/inbox/a.bin"), None);
        assert_eq!(choice, GuidedChoice::Skip);
        let shown = String::from_utf8(t.output.clone()).unwrap();
        assert!(shown.contains("No suggestion available"));
        assert!(shown.contains("Invalid input"));
    }

    #[test]
    fn test_quit_and_end_of_input() {
        assert_eq!(
            terminal("q\n").choose(Path::new("/inbox/a.png"), None),
            GuidedChoice::Quit
        );
        assert_eq!(
            terminal("").choose(Path::new("/inbox/a.png"), None),
            GuidedChoice::Quit
        );
    }

    #[test]
    fn test_ask_and_confirm() {
        let mut t = terminal("\n/data\nyes\n");
        assert_eq!(t.ask("Root", "/home").unwrap(), "/home");
        assert_eq!(t.ask("Root", "/home").unwrap(), "/data");
        assert!(t.confirm("Create?").unwrap());
        assert!(!t.confirm("Again?").unwrap());
    }
}
