//! Destination resolution and the filesystem primitives used to move files.
//!
//! [`DestinationResolver`] turns a target (bucket plus optional subpath) into
//! an absolute path below the PARA root. When that path is already taken by a
//! different file, a numeric suffix is inserted before the extension until a
//! free name is found: `a.png`, `a_1.png`, `a_2.png`, ...

use crate::config::{Bucket, BucketMap};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Errors that prevent a single file from being placed.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The bucket key is not one of the configured buckets.
    #[error("unknown bucket '{bucket}'")]
    UnknownBucket { bucket: String },

    /// The subpath would escape the bucket directory.
    #[error("invalid subpath '{path}': must be relative and must not contain '..'")]
    InvalidSubpath { path: String },

    /// The source path has no file name component.
    #[error("{} has no file name", .0.display())]
    NoFileName(PathBuf),

    /// A directory of the destination chain could not be created.
    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where a file should go: a bucket key and an optional path below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub bucket: String,
    pub subpath: Option<String>,
}

impl Target {
    pub fn new(bucket: impl Into<String>, subpath: Option<&str>) -> Self {
        Self {
            bucket: bucket.into(),
            subpath: subpath
                .map(|p| p.trim().trim_matches('/').to_string())
                .filter(|p| !p.is_empty()),
        }
    }

    /// Shortcut for a target in a known bucket.
    pub fn in_bucket(bucket: Bucket, subpath: Option<&str>) -> Self {
        Self::new(bucket.key(), subpath)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.subpath {
            Some(sub) => write!(f, "{}/{}", self.bucket, sub),
            None => write!(f, "{}", self.bucket),
        }
    }
}

/// A computed destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub path: PathBuf,
    /// True when the plain name was taken and a suffix was added.
    pub renamed: bool,
}

/// Computes destinations below a PARA root.
#[derive(Debug, Clone)]
pub struct DestinationResolver {
    para_root: PathBuf,
    buckets: BucketMap,
}

impl DestinationResolver {
    pub fn new(para_root: impl Into<PathBuf>, buckets: BucketMap) -> Self {
        Self {
            para_root: para_root.into(),
            buckets,
        }
    }

    pub fn para_root(&self) -> &Path {
        &self.para_root
    }

    pub fn buckets(&self) -> &BucketMap {
        &self.buckets
    }

    /// The directory a target points at, without the file name.
    ///
    /// # Errors
    ///
    /// `UnknownBucket` if the bucket is not configured, `InvalidSubpath` if
    /// the subpath is absolute or climbs out with `..`.
    pub fn target_dir(&self, target: &Target) -> Result<PathBuf, ResolveError> {
        let dir_name = target
            .bucket
            .parse::<Bucket>()
            .ok()
            .and_then(|bucket| self.buckets.get(&bucket))
            .ok_or_else(|| ResolveError::UnknownBucket {
                bucket: target.bucket.clone(),
            })?;

        let mut dir = self.para_root.join(dir_name);
        if let Some(subpath) = &target.subpath {
            let relative = Path::new(subpath);
            let escapes = relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if escapes {
                return Err(ResolveError::InvalidSubpath {
                    path: subpath.clone(),
                });
            }
            dir.push(relative);
        }
        Ok(dir)
    }

    /// Computes where `source` would land for `target`.
    ///
    /// Does not touch the filesystem except to check which names are taken.
    /// A destination that is the source itself is returned unchanged.
    pub fn resolve(&self, target: &Target, source: &Path) -> Result<Resolved, ResolveError> {
        self.resolve_avoiding(target, source, |_| false)
    }

    /// Like [`resolve`](Self::resolve), but also treats every path for which
    /// `taken` returns true as occupied. Dry runs pass the destinations they
    /// have already planned so the plan matches what a real run would do.
    pub fn resolve_avoiding(
        &self,
        target: &Target,
        source: &Path,
        taken: impl Fn(&Path) -> bool,
    ) -> Result<Resolved, ResolveError> {
        let file_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ResolveError::NoFileName(source.to_path_buf()))?;

        let dir = self.target_dir(target)?;
        let occupied = |path: &Path| taken(path) || is_occupied(path);

        let candidate = dir.join(file_name);
        if !occupied(candidate.as_path())
            || (!taken(candidate.as_path()) && is_same_file(&candidate, source))
        {
            return Ok(Resolved {
                path: candidate,
                renamed: false,
            });
        }

        let (stem, ext) = split_name(file_name);
        let mut n: u64 = 1;
        let path = loop {
            let candidate = match ext {
                Some(ext) => dir.join(format!("{}_{}.{}", stem, n, ext)),
                None => dir.join(format!("{}_{}", stem, n)),
            };
            if !occupied(candidate.as_path()) {
                break candidate;
            }
            n += 1;
        };

        Ok(Resolved {
            path,
            renamed: true,
        })
    }
}

/// Splits `name` into stem and extension, keeping dotfiles whole.
fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

/// True if anything, including a dangling symlink, sits at `path`.
pub fn is_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Creates every missing directory above `path`.
///
/// Idempotent: an existing chain is left as it is.
pub fn ensure_parent_dir(path: &Path) -> Result<(), ResolveError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(parent).map_err(|source| ResolveError::DirectoryCreate {
        path: parent.to_path_buf(),
        source,
    })
}

/// Moves a file, falling back to copy and remove across filesystems.
///
/// Either the file ends up at `to` only, or it stays at `from` only.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            log::debug!(
                "{} and {} are on different devices; copying",
                from.display(),
                to.display()
            );
            copy_then_remove(from, to, |path| fs::remove_file(path))
        }
        Err(e) => Err(e),
    }
}

/// Copies `from` to `to`, then deletes `from` with `remove`.
///
/// If the copy or the removal fails, the copy at `to` is deleted again so the
/// file is never left in both places.
fn copy_then_remove(
    from: &Path,
    to: &Path,
    remove: impl FnOnce(&Path) -> io::Result<()>,
) -> io::Result<()> {
    if let Err(copy_err) = fs::copy(from, to) {
        let _ = fs::remove_file(to);
        return Err(copy_err);
    }
    if let Err(remove_err) = remove(from) {
        if let Err(e) = fs::remove_file(to) {
            log::error!(
                "{} could not be removed after a failed move: {}",
                to.display(),
                e
            );
        }
        return Err(remove_err);
    }
    Ok(())
}
