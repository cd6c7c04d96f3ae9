//! Script stage: selection, bundling, and minification of application scripts.

use std::fs;
use std::path::{Path, PathBuf};

use trowel_script::{
    bundle_scripts, is_minified_name, minified_name, minify, ScriptSource, ScriptTransform,
};
use walkdir::WalkDir;

use crate::error::PipelineError;

/// Outcome of a script stage run.
#[derive(Debug, Default)]
pub struct ScriptOutcome {
    /// Files written
    pub written: Vec<PathBuf>,

    /// Scripts left out of the bundle, plus a failed minification
    pub failed: usize,
}

/// Application scripts under `js_root`, sorted by path.
///
/// Skips the vendor folder and the bootstrap entry at the script root.
pub fn select_scripts(js_root: &Path, vendor_dir: &str, entry: &str) -> Vec<PathBuf> {
    if !js_root.is_dir() {
        return Vec::new();
    }

    let vendor = js_root.join(vendor_dir);
    let entry = js_root.join(entry);

    let mut scripts: Vec<PathBuf> = WalkDir::new(js_root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.path() != vendor)
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("js") && *p != entry)
        .collect();

    scripts.sort();
    scripts
}

/// Bundle `scripts` into `out_dir/<bundle_name>` with a map and minified sibling.
///
/// Unreadable or untransformable scripts are logged and left out.
pub fn build_scripts(
    scripts: &[PathBuf],
    js_root: &Path,
    out_dir: &Path,
    bundle_name: &str,
    transform: &dyn ScriptTransform,
) -> Result<ScriptOutcome, PipelineError> {
    let mut outcome = ScriptOutcome::default();
    let mut sources = Vec::with_capacity(scripts.len());

    for path in scripts {
        let name = path
            .strip_prefix(js_root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        match fs::read_to_string(path) {
            Ok(source) => sources.push(ScriptSource::new(name, source)),
            Err(e) => {
                tracing::error!("Failed to read {}: {}", path.display(), e);
                outcome.failed += 1;
            }
        }
    }

    let result = bundle_scripts(bundle_name, &sources, transform);
    for failure in &result.failures {
        tracing::error!("{}", failure);
    }
    outcome.failed += result.failures.len();

    let Some(bundle) = result.bundle else {
        if !sources.is_empty() {
            tracing::warn!("No scripts survived; {} not written", bundle_name);
        }
        return Ok(outcome);
    };
    tracing::debug!("{}: {}", bundle.name, bundle.scripts.join(", "));

    fs::create_dir_all(out_dir).map_err(PipelineError::io(out_dir))?;

    let code_path = out_dir.join(&bundle.name);
    fs::write(&code_path, &bundle.code).map_err(PipelineError::io(&code_path))?;
    outcome.written.push(code_path);

    let map_path = out_dir.join(bundle.map_name());
    fs::write(&map_path, &bundle.map).map_err(PipelineError::io(&map_path))?;
    outcome.written.push(map_path);

    if is_minified_name(&bundle.name) {
        return Ok(outcome);
    }

    let combined = ScriptSource::new(bundle.name.clone(), bundle.code_without_map_url());
    match minify(&combined) {
        Ok(code) => {
            let min_path = out_dir.join(minified_name(&bundle.name));
            fs::write(&min_path, code).map_err(PipelineError::io(&min_path))?;
            outcome.written.push(min_path);
        }
        Err(e) => {
            tracing::error!("{}", e);
            outcome.failed += 1;
        }
    }

    Ok(outcome)
}
