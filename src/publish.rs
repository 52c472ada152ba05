//! Naming rules for published files: stamped filenames, repository paths and public links.

use std::path::Path;

use thiserror::Error;

use crate::config::PublishConfig;

/// Upper bound (exclusive) of the random id stamped into filenames.
pub const RANDOM_ID_RANGE: u32 = 100_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidPath {
    #[error("path is empty")]
    Empty,
    #[error("path segment '{0}' is not allowed")]
    Segment(String),
    #[error("path contains forbidden characters")]
    Characters,
}

/// Where a file lives in the repository and the link it is served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub path: String,
    pub url: String,
}

/// `photo.jpg` + 42 -> `photo_42.jpg`. Only the last component of `original` is kept.
pub fn stamped_name(original: &str, id: u32) -> String {
    let name = Path::new(original)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = if name.is_empty() { "upload".to_string() } else { name };

    let path = Path::new(&name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.clone());

    match path.extension() {
        Some(ext) => format!("{stem}_{id}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{id}"),
    }
}

pub fn random_id() -> u32 {
    use rand::Rng;
    rand::thread_rng().gen_range(0..RANDOM_ID_RANGE)
}

/// Reject anything that could escape the configured folders.
///
/// A valid path is one or more `/`-separated segments, none empty, `.` or `..`,
/// with no backslashes or control characters.
pub fn validate_relative(path: &str) -> Result<(), InvalidPath> {
    if path.is_empty() {
        return Err(InvalidPath::Empty);
    }
    if path.chars().any(|c| c == '\\' || c.is_control()) {
        return Err(InvalidPath::Characters);
    }
    for segment in path.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(InvalidPath::Segment(segment.to_string()));
        }
    }
    Ok(())
}

impl PublishConfig {
    /// Repository folder for an optional caller-supplied folder.
    pub fn folder(&self, folder: Option<&str>) -> String {
        match folder {
            Some(folder) => format!("{}/{folder}", self.custom_folder),
            None => self.base_folder.clone(),
        }
    }

    pub fn target(&self, folder: Option<&str>, file_name: &str) -> Target {
        let path = format!("{}/{file_name}", self.folder(folder));
        let url = match folder {
            Some(folder) => format!(
                "{}/{folder}/{file_name}",
                self.custom_url.trim_end_matches('/')
            ),
            None => format!("{}/{file_name}", self.base_url.trim_end_matches('/')),
        };
        Target { path, url }
    }
}
