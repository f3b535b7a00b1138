//! Ordered extension rules.
//!
//! A [`RuleMatcher`] holds the configured rules in declaration order and
//! answers one question: which rule, if any, claims a given file name. The
//! first rule whose extension set contains the file's extension wins, so two
//! rules listing the same extension are resolved by their position.
//!
//! # Examples
//!
//! ```
//! use parsort::rules::{Rule, RuleMatcher};
//!
//! let matcher = RuleMatcher::new(vec![
//!     Rule::new("Images", ["png", "JPG"], "resources", Some("Images")),
//!     Rule::new("Anything jpg", ["jpg"], "archive", None),
//! ]);
//!
//! assert_eq!(matcher.find("photo.jpg").map(|r| r.name.as_str()), Some("Images"));
//! assert!(matcher.find("README").is_none());
//! ```

use crate::config::{Bucket, BucketMap};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::str::FromStr;

/// A single extension-to-destination mapping as written in the config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Rule {
    /// Label shown in output and stored in the move log.
    #[serde(default = "default_rule_name")]
    pub name: String,

    /// Extensions claimed by this rule, normalized to lowercase without a dot.
    #[serde(rename = "ext", alias = "extensions", default)]
    pub extensions: BTreeSet<String>,

    /// Bucket key, kept as written so unknown keys can be reported.
    pub bucket: String,

    /// Optional path below the bucket directory.
    #[serde(default)]
    pub path: Option<String>,
}

fn default_rule_name() -> String {
    "unnamed".to_string()
}

impl Rule {
    /// Builds a rule, normalizing the extensions and dropping an empty subpath.
    pub fn new<I, S>(name: &str, extensions: I, bucket: &str, path: Option<&str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name: name.to_string(),
            extensions: extensions.into_iter().map(|e| e.as_ref().to_string()).collect(),
            bucket: bucket.to_string(),
            path: path.map(str::to_string),
        }
        .normalized()
    }

    fn normalized(mut self) -> Self {
        self.extensions = self
            .extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        self.path = self
            .path
            .map(|p| p.trim().trim_matches('/').to_string())
            .filter(|p| !p.is_empty());
        self.bucket = self.bucket.trim().to_string();
        self
    }

    /// Parses the bucket key, returning `None` for names outside the PARA set.
    pub fn bucket_key(&self) -> Option<Bucket> {
        Bucket::from_str(&self.bucket).ok()
    }
}

/// Returns the case-folded extension of a file name.
///
/// Names without a dot, names ending in a dot and dotfiles such as `.bashrc`
/// have no extension.
pub fn extension_of(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// First-match-wins lookup over an ordered rule list.
#[derive(Debug, Clone, Default)]
pub struct RuleMatcher {
    rules: Vec<Rule>,
}

impl RuleMatcher {
    /// Creates a matcher over `rules` in the given order.
    ///
    /// Rules whose extension set is empty after normalization can never match
    /// and are dropped with a warning.
    pub fn new(rules: Vec<Rule>) -> Self {
        let rules = rules
            .into_iter()
            .map(Rule::normalized)
            .filter(|rule| {
                if rule.extensions.is_empty() {
                    log::warn!("rule '{}' lists no extensions; ignoring it", rule.name);
                    return false;
                }
                true
            })
            .collect();
        Self { rules }
    }

    /// Creates a matcher that keeps only rules whose bucket is configured.
    ///
    /// A rule pointing at an unknown bucket is skipped with a warning, so files
    /// it alone would have claimed stay unmatched.
    pub fn for_buckets(rules: Vec<Rule>, buckets: &BucketMap) -> Self {
        let known: Vec<Rule> = rules
            .into_iter()
            .filter(|rule| match rule.bucket_key() {
                Some(bucket) if buckets.contains_key(&bucket) => true,
                _ => {
                    let known_keys: Vec<&str> = buckets.keys().map(Bucket::key).collect();
                    log::warn!(
                        "rule '{}' references unknown bucket '{}' (known: {}); skipping it",
                        rule.name,
                        rule.bucket,
                        known_keys.join(", ")
                    );
                    false
                }
            })
            .collect();
        Self::new(known)
    }

    /// Returns the first rule claiming the extension of `file_name`.
    pub fn find(&self, file_name: &str) -> Option<&Rule> {
        let ext = extension_of(file_name)?;
        self.rules.iter().find(|rule| rule.extensions.contains(&ext))
    }

    /// The rules in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_buckets;

    fn images() -> Rule {
        Rule::new("Images", ["png", "jpg"], "resources", Some("Images"))
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("photo.JPG"), Some("jpg".to_string()));
        assert_eq!(extension_of("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(extension_of("README"), None);
        assert_eq!(extension_of("trailing."), None);
        assert_eq!(extension_of(".bashrc"), None);
        assert_eq!(extension_of(".config.toml"), Some("toml".to_string()));
    }

    #[test]
    fn test_rule_new_normalizes_extensions() {
        let rule = Rule::new("Docs", [".PDF", " Txt "], "resources", Some("/Docs/"));
        assert!(rule.extensions.contains("pdf"));
        assert!(rule.extensions.contains("txt"));
        assert_eq!(rule.path.as_deref(), Some("Docs"));
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let matcher = RuleMatcher::new(vec![images()]);
        let rule = matcher.find("photo.JPG").expect("should match");
        assert_eq!(rule.name, "Images");
    }

    #[test]
    fn test_unique_extension_matches_its_rule() {
        let matcher = RuleMatcher::new(vec![
            images(),
            Rule::new("PDFs", ["pdf"], "resources", Some("PDFs")),
            Rule::new("Zips", ["zip"], "archive", None),
        ]);
        assert_eq!(matcher.find("a.pdf").unwrap().name, "PDFs");
        assert_eq!(matcher.find("a.zip").unwrap().name, "Zips");
        assert_eq!(matcher.find("a.png").unwrap().name, "Images");
    }

    #[test]
    fn test_earlier_rule_wins_on_overlap() {
        let matcher = RuleMatcher::new(vec![
            Rule::new("First", ["jpg"], "projects", None),
            Rule::new("Second", ["jpg", "png"], "resources", None),
        ]);
        assert_eq!(matcher.find("x.jpg").unwrap().name, "First");
        assert_eq!(matcher.find("x.png").unwrap().name, "Second");

        let swapped = RuleMatcher::new(vec![
            Rule::new("Second", ["jpg", "png"], "resources", None),
            Rule::new("First", ["jpg"], "projects", None),
        ]);
        assert_eq!(swapped.find("x.jpg").unwrap().name, "Second");
    }

    #[test]
    fn test_empty_rule_list_never_matches() {
        let matcher = RuleMatcher::new(Vec::new());
        assert!(matcher.is_empty());
        assert!(matcher.find("a.png").is_none());
    }

    #[test]
    fn test_no_extension_never_matches() {
        let matcher = RuleMatcher::new(vec![Rule::new("Weird", ["makefile"], "areas", None)]);
        assert!(matcher.find("Makefile").is_none());
    }

    #[test]
    fn test_rule_without_extensions_is_dropped() {
        let matcher = RuleMatcher::new(vec![Rule::new("Empty", Vec::<String>::new(), "areas", None)]);
        assert!(matcher.is_empty());
    }

    #[test]
    fn test_unknown_bucket_rule_is_skipped() {
        let matcher = RuleMatcher::for_buckets(
            vec![
                Rule::new("Broken", ["png"], "foo", None),
                Rule::new("Fallback", ["png"], "archive", None),
                Rule::new("OnlyBroken", ["gif"], "foo", None),
            ],
            &default_buckets(),
        );
        assert_eq!(matcher.rules().len(), 1);
        assert_eq!(matcher.find("a.png").unwrap().name, "Fallback");
        assert!(matcher.find("a.gif").is_none());
    }

    #[test]
    fn test_bucket_missing_from_map_is_skipped() {
        let mut buckets = default_buckets();
        buckets.remove(&Bucket::Archive);
        let matcher =
            RuleMatcher::for_buckets(vec![Rule::new("Zips", ["zip"], "archive", None)], &buckets);
        assert!(matcher.find("a.zip").is_none());
    }
}
