//! Configuration loading for parsort.
//!
//! The configuration names the PARA root, maps each bucket to a directory
//! below it, lists the sorting rules in evaluation order and describes which
//! inbox entries to ignore. It is stored as TOML:
//!
//! ```toml
//! para_root = "~"
//!
//! [buckets]
//! projects = "1_Projects"
//! areas = "2_Areas"
//! resources = "3_Resources"
//! archive = "4_Archive"
//!
//! [[rules]]
//! name = "Images"
//! ext = ["png", "jpg"]
//! bucket = "resources"
//! path = "Images"
//!
//! [ignore]
//! hidden = false
//! patterns = ["*.part"]
//! ```

use crate::rules::Rule;
use glob::Pattern;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// File name looked up in the current directory before the user config.
pub const LOCAL_CONFIG_NAME: &str = ".parsort.toml";

/// Errors that can occur while loading or writing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Invalid TOML syntax or structure.
    #[error("invalid configuration {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },

    /// An ignore pattern is not a valid glob.
    #[error("invalid ignore pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// IO error while reading or writing configuration.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `~` was used but no home directory is known.
    #[error("cannot expand '~': home directory is unknown")]
    NoHome,
}

/// One of the four fixed PARA buckets.
///
/// Declaration order is the canonical PARA order, which is also the order of
/// a [`BucketMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bucket {
    Projects,
    Areas,
    Resources,
    Archive,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::Projects,
        Bucket::Areas,
        Bucket::Resources,
        Bucket::Archive,
    ];

    /// The key used for this bucket in configuration files.
    pub fn key(&self) -> &'static str {
        match self {
            Bucket::Projects => "projects",
            Bucket::Areas => "areas",
            Bucket::Resources => "resources",
            Bucket::Archive => "archive",
        }
    }

    /// The directory name used when the config does not override it.
    pub fn default_dir_name(&self) -> &'static str {
        match self {
            Bucket::Projects => "1_Projects",
            Bucket::Areas => "2_Areas",
            Bucket::Resources => "3_Resources",
            Bucket::Archive => "4_Archive",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Bucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Bucket::ALL
            .into_iter()
            .find(|b| b.key() == lowered)
            .ok_or_else(|| format!("unknown bucket '{}'", s))
    }
}

/// Bucket to directory-name mapping, relative to the PARA root.
pub type BucketMap = BTreeMap<Bucket, String>;

/// The four buckets with their default directory names.
pub fn default_buckets() -> BucketMap {
    Bucket::ALL
        .into_iter()
        .map(|b| (b, b.default_dir_name().to_string()))
        .collect()
}

/// Rules used when no configuration file is found.
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "Images",
            ["png", "jpg", "jpeg", "gif", "webp"],
            "resources",
            Some("Images"),
        ),
        Rule::new(
            "Archives",
            ["zip", "rar", "7z", "tar", "gz"],
            "archive",
            Some("Archives"),
        ),
        Rule::new("PDFs", ["pdf"], "resources", Some("PDFs")),
    ]
}

/// Which inbox entries are never considered for sorting.
///
/// Dotfiles without an extension (`.DS_Store`) never match a rule anyway;
/// `hidden` additionally keeps dotfiles such as `.draft.png` in place.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IgnoreRules {
    /// Skip entries whose name starts with a dot. Defaults to false.
    #[serde(default)]
    pub hidden: bool,

    /// Glob patterns matched against the file name (e.g. "*.part").
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl IgnoreRules {
    /// Compiles the glob patterns once so matching does not reparse them.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidPattern` for the first invalid pattern.
    pub fn compile(&self) -> Result<CompiledIgnore, ConfigError> {
        let patterns = self
            .patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CompiledIgnore {
            hidden: self.hidden,
            patterns,
        })
    }
}

/// Pre-compiled ignore filters.
#[derive(Debug, Clone, Default)]
pub struct CompiledIgnore {
    hidden: bool,
    patterns: Vec<Pattern>,
}

impl CompiledIgnore {
    /// Returns true if an entry with this name must be left alone.
    pub fn is_ignored(&self, file_name: &str) -> bool {
        if self.hidden && file_name.starts_with('.') {
            return true;
        }
        self.patterns.iter().any(|p| p.matches(file_name))
    }
}

/// Complete parsort configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Root directory holding the bucket directories.
    #[serde(default = "default_para_root")]
    pub para_root: PathBuf,

    #[serde(default = "default_buckets", deserialize_with = "deserialize_buckets")]
    pub buckets: BucketMap,

    /// Rules in evaluation order.
    #[serde(default)]
    pub rules: Vec<Rule>,

    #[serde(default)]
    pub ignore: IgnoreRules,

    /// File the configuration was read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

fn deserialize_buckets<'de, D>(deserializer: D) -> Result<BucketMap, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, String> = Deserialize::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, dir)| {
            let bucket = key.parse::<Bucket>().map_err(serde::de::Error::custom)?;
            Ok((bucket, dir))
        })
        .collect()
}

fn default_para_root() -> PathBuf {
    PathBuf::from("~")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            para_root: default_para_root(),
            buckets: default_buckets(),
            rules: default_rules(),
            ignore: IgnoreRules::default(),
            source: None,
        }
    }
}

impl Config {
    /// Load configuration, falling back through the usual locations.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. `.parsort.toml` in the current directory
    /// 3. `parsort/config.toml` in the user config directory
    /// 4. The built-in defaults
    ///
    /// The returned config has an absolute `para_root`.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly given file is missing, or if any file
    /// that is found cannot be read or parsed.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = if let Some(path) = config_path {
            Self::load_from_file(path)?
        } else if Path::new(LOCAL_CONFIG_NAME).exists() {
            Self::load_from_file(Path::new(LOCAL_CONFIG_NAME))?
        } else {
            match user_config_path() {
                Some(path) if path.exists() => Self::load_from_file(&path)?,
                _ => Self::default(),
            }
        };
        config.resolved()
    }

    /// Load configuration from a specific file without resolving `para_root`.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::from_toml(&content).map_err(|reason| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason,
        })?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parses a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Expands `~` in `para_root` and makes it absolute.
    pub fn resolved(mut self) -> Result<Self, ConfigError> {
        let expanded = expand_tilde(&self.para_root)?;
        self.para_root = std::path::absolute(&expanded).map_err(|source| ConfigError::Io {
            path: expanded,
            source,
        })?;
        Ok(self)
    }
}

/// Replaces a leading `~` with the home directory.
pub fn expand_tilde(path: &Path) -> Result<PathBuf, ConfigError> {
    let Ok(rest) = path.strip_prefix("~") else {
        return Ok(path.to_path_buf());
    };
    let home = dirs::home_dir().ok_or(ConfigError::NoHome)?;
    Ok(home.join(rest))
}

/// `parsort/config.toml` inside the platform config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("parsort").join("config.toml"))
}

/// Renders a config file with the default rules for the given root and buckets.
pub fn config_template(para_root: &Path, buckets: &BucketMap) -> String {
    let mut out = String::new();
    out.push_str(&format!("para_root = '{}'\n\n[buckets]\n", para_root.display()));
    for (bucket, dir) in buckets {
        out.push_str(&format!("{} = '{}'\n", bucket.key(), dir));
    }

    for rule in default_rules() {
        let exts: Vec<String> = rule.extensions.iter().map(|e| format!("\"{}\"", e)).collect();
        out.push_str(&format!(
            "\n[[rules]]\nname = \"{}\"\next = [{}]\nbucket = \"{}\"\n",
            rule.name,
            exts.join(", "),
            rule.bucket
        ));
        if let Some(path) = &rule.path {
            out.push_str(&format!("path = \"{}\"\n", path));
        }
    }

    out.push_str("\n[ignore]\n# true also leaves dotfiles such as .draft.png in the inbox\nhidden = false\npatterns = [\"*.part\", \"*.crdownload\"]\n");
    out
}

/// Writes a config file, creating parent directories.
///
/// Returns `Ok(false)` without touching anything if the file exists and
/// `force` is not set.
pub fn write_config(path: &Path, contents: &str, force: bool) -> Result<bool, ConfigError> {
    if path.exists() && !force {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(path, contents).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(true)
}
