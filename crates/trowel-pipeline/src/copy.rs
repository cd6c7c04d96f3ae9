//! Verbatim copies of fonts, images, and vendor scripts.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use walkdir::WalkDir;

/// A directory tree copied without transformation.
#[derive(Debug, Clone)]
pub struct CopyTask {
    /// Name used in log output
    pub label: &'static str,

    /// Source directory
    pub src: PathBuf,

    /// Destination directory
    pub dest: PathBuf,

    /// Allowed extensions (lowercase), or every file when `None`
    pub extensions: Option<Vec<String>>,
}

/// Outcome of a copy task.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CopyReport {
    /// Destination paths written
    pub copied: Vec<PathBuf>,

    /// Files that could not be copied
    pub failed: usize,
}

impl CopyTask {
    /// Copy every matching file, preserving relative paths.
    ///
    /// A missing source directory copies nothing. A failed file is logged and
    /// the rest still copy.
    pub fn run(&self) -> CopyReport {
        if !self.src.is_dir() {
            tracing::debug!("No {} to copy at {}", self.label, self.src.display());
            return CopyReport::default();
        }

        let files: Vec<PathBuf> = WalkDir::new(&self.src)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::error!("Error reading {}: {}", self.label, e);
                    None
                }
            })
            .filter(|e| e.file_type().is_file() && self.accepts(e.path()))
            .map(|e| e.into_path())
            .collect();

        let results: Vec<Result<PathBuf, String>> = files
            .par_iter()
            .map(|path| self.copy_one(path))
            .collect();

        let mut report = CopyReport::default();
        for result in results {
            match result {
                Ok(dest) => report.copied.push(dest),
                Err(message) => {
                    tracing::error!("Error copying {}: {}", self.label, message);
                    report.failed += 1;
                }
            }
        }

        report
    }

    fn accepts(&self, path: &Path) -> bool {
        let Some(extensions) = &self.extensions else {
            return true;
        };

        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }

    fn copy_one(&self, path: &Path) -> Result<PathBuf, String> {
        let relative = path.strip_prefix(&self.src).unwrap_or(path);
        let dest = self.dest.join(relative);

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("{}: {}", parent.display(), e))?;
        }

        fs::copy(path, &dest)
            .map_err(|e| format!("{} -> {}: {}", path.display(), dest.display(), e))?;

        Ok(dest)
    }
}
