use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// What to do when the output already holds a file with the same name.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Leave the existing file alone and do not copy.
    #[default]
    Skip,
    /// Replace the existing file.
    Overwrite,
    /// Copy under the first free `name-N.ext`.
    Rename,
}

/// Destination for selected images.
pub trait FileStore {
    /// Make the destination ready and snapshot what it already holds.
    fn prepare(&mut self) -> Result<()>;

    /// Whether `name` was present when the store was prepared.
    fn contains(&self, name: &OsStr) -> bool;

    /// Copy `source` in under `name`. `None` means nothing was written.
    fn store(&mut self, source: &Path, name: &OsStr) -> Result<Option<PathBuf>>;
}

impl<S: FileStore + ?Sized> FileStore for &mut S {
    fn prepare(&mut self) -> Result<()> {
        (**self).prepare()
    }

    fn contains(&self, name: &OsStr) -> bool {
        (**self).contains(name)
    }

    fn store(&mut self, source: &Path, name: &OsStr) -> Result<Option<PathBuf>> {
        (**self).store(source, name)
    }
}

/// Output directory receiving unmodified copies of selected files.
#[derive(Debug)]
pub struct DirStore {
    root: PathBuf,
    policy: CollisionPolicy,
    existing: HashSet<OsString>,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>, policy: CollisionPolicy) -> Self {
        Self {
            root: root.into(),
            policy,
            existing: HashSet::new(),
        }
    }

    fn free_name(&self, name: &OsStr) -> PathBuf {
        let original = Path::new(name);
        let stem = original.file_stem().unwrap_or(name);
        let ext = original.extension();

        (1u32..)
            .map(|n| {
                let mut candidate = stem.to_os_string();
                candidate.push(format!("-{n}"));
                if let Some(ext) = ext {
                    candidate.push(".");
                    candidate.push(ext);
                }
                self.root.join(candidate)
            })
            .find(|p| !p.exists())
            .unwrap_or_else(|| self.root.join(name))
    }
}

impl FileStore for DirStore {
    fn prepare(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("creating output folder {}", self.root.display()))?;

        self.existing.clear();
        for entry in std::fs::read_dir(&self.root)
            .with_context(|| format!("listing output folder {}", self.root.display()))?
        {
            let entry = entry?;
            self.existing.insert(entry.file_name());
        }
        debug!(
            "{} file(s) already in {}",
            self.existing.len(),
            self.root.display()
        );
        Ok(())
    }

    fn contains(&self, name: &OsStr) -> bool {
        self.existing.contains(name)
    }

    fn store(&mut self, source: &Path, name: &OsStr) -> Result<Option<PathBuf>> {
        let mut target = self.root.join(name);
        if target.exists() {
            match self.policy {
                CollisionPolicy::Skip => {
                    warn!(
                        "{} already exists in output, not copied",
                        name.to_string_lossy()
                    );
                    return Ok(None);
                }
                CollisionPolicy::Overwrite => {
                    debug!("overwriting {}", target.display());
                }
                CollisionPolicy::Rename => {
                    target = self.free_name(name);
                    debug!(
                        "{} exists, copying as {}",
                        name.to_string_lossy(),
                        target.display()
                    );
                }
            }
        }

        std::fs::copy(source, &target).with_context(|| {
            format!("copying {} to {}", source.display(), target.display())
        })?;
        Ok(Some(target))
    }
}
