use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::store::FileStore;

pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// An input image awaiting a decision.
///
/// `name` is the file name exactly as the filesystem reports it, so a copy
/// keeps it byte for byte even when it is not valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub path: PathBuf,
    #[serde(skip)]
    pub name: OsString,
}

impl Candidate {
    pub fn from_path(path: PathBuf) -> Option<Self> {
        let name = path.file_name()?.to_os_string();
        Some(Self { path, name })
    }

    /// Name for log lines.
    pub fn display_name(&self) -> std::borrow::Cow<'_, str> {
        self.name.to_string_lossy()
    }
}

/// Image files directly inside `dir`, sorted by path.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && is_image(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// Images in `input` whose names the store does not hold yet.
pub fn pending_candidates<S: FileStore + ?Sized>(input: &Path, store: &S) -> Result<Vec<Candidate>> {
    Ok(list_images(input)?
        .into_iter()
        .filter_map(Candidate::from_path)
        .filter(|c| !store.contains(&c.name))
        .collect())
}
