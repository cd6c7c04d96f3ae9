//! HTML assembly: include expansion with an output cache.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rayon::prelude::*;
use sha2::{Digest, Sha256};
use trowel_include::Includer;
use walkdir::{DirEntry, WalkDir};

use crate::error::PipelineError;

/// Marker for partials and private directories.
const PARTIAL_MARKER: char = '_';

/// Directory of include-only fragments at the page root.
const INCLUDE_DIR: &str = "include";

/// Outcome of an HTML stage run.
#[derive(Debug, Default)]
pub struct HtmlOutcome {
    /// Pages written because their output changed
    pub written: Vec<PathBuf>,

    /// Pages skipped because their output was unchanged
    pub unchanged: usize,

    /// Pages that failed to render
    pub failed: usize,
}

enum PageResult {
    Written(PathBuf),
    Unchanged,
    Failed,
}

/// Renders pages from `src` into `dest`.
///
/// Holds the rendered-output cache for the lifetime of a session.
pub struct HtmlStage {
    includer: Includer,
    src: PathBuf,
    dest: PathBuf,
    cache: Mutex<HashMap<PathBuf, [u8; 32]>>,
}

impl HtmlStage {
    /// Create a stage rendering `src` into `dest`.
    pub fn new(includer: Includer, src: PathBuf, dest: PathBuf) -> Self {
        Self {
            includer,
            src,
            dest,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Pages to render, sorted by path.
    pub fn select_pages(&self) -> Vec<PathBuf> {
        if !self.src.is_dir() {
            return Vec::new();
        }

        let mut pages: Vec<PathBuf> = WalkDir::new(&self.src)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| !is_excluded(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("html"))
            .collect();

        pages.sort();
        pages
    }

    /// Render every page, writing those whose output changed.
    pub fn run(&self) -> Result<HtmlOutcome, PipelineError> {
        let pages = self.select_pages();

        let results: Vec<Result<PageResult, PipelineError>> =
            pages.par_iter().map(|page| self.render_page(page)).collect();

        let mut outcome = HtmlOutcome::default();
        for result in results {
            match result? {
                PageResult::Written(path) => outcome.written.push(path),
                PageResult::Unchanged => outcome.unchanged += 1,
                PageResult::Failed => outcome.failed += 1,
            }
        }

        Ok(outcome)
    }

    fn render_page(&self, page: &Path) -> Result<PageResult, PipelineError> {
        let html = match self.includer.render_file(page) {
            Ok(html) => html,
            Err(e) => {
                tracing::error!("{}", e);
                return Ok(PageResult::Failed);
            }
        };

        let relative = page.strip_prefix(&self.src).unwrap_or(page);
        let output = self.dest.join(relative);
        let digest: [u8; 32] = Sha256::digest(html.as_bytes()).into();

        if self.is_cached(&output, &digest) {
            return Ok(PageResult::Unchanged);
        }

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(PipelineError::io(parent))?;
        }
        fs::write(&output, html).map_err(PipelineError::io(&output))?;

        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(output.clone(), digest);

        Ok(PageResult::Written(output))
    }

    fn is_cached(&self, output: &Path, digest: &[u8; 32]) -> bool {
        let cache = self
            .cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        cache.get(output) == Some(digest) && output.exists()
    }
}

/// Whether a walk entry is a partial, a private directory, or the include folder.
fn is_excluded(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return false;
    }

    let name = entry.file_name().to_string_lossy();
    if name.starts_with(PARTIAL_MARKER) {
        return true;
    }

    entry.depth() == 1 && entry.file_type().is_dir() && name == INCLUDE_DIR
}
