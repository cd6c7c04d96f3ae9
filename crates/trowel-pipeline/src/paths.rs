//! Source and output directory layout.

use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;

/// Directories for each asset kind under one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPaths {
    pub html: PathBuf,
    pub css: PathBuf,
    pub images: PathBuf,
    pub js: PathBuf,
    pub fonts: PathBuf,
}

impl AssetPaths {
    /// Layout with pages under `html_dir` and assets under `root/assets`.
    fn new(root: &Path, html_dir: PathBuf, assets: &str) -> Self {
        let assets = root.join(assets);
        Self {
            html: html_dir,
            css: assets.join("css"),
            images: assets.join("images"),
            js: assets.join("js"),
            fonts: assets.join("fonts"),
        }
    }
}

/// Source and output layout of a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// Output root, removed by `clean`
    pub dist_root: PathBuf,

    /// Source directories
    pub src: AssetPaths,

    /// Output directories
    pub dist: AssetPaths,

    vendor: String,
}

impl Paths {
    /// Derive the layout from the three root settings.
    ///
    /// Pages come from `src/html` and land directly in the output root.
    pub fn new(src_root: &Path, dist_root: &Path, assets: &str, vendor: &str) -> Self {
        Self {
            dist_root: dist_root.to_path_buf(),
            src: AssetPaths::new(src_root, src_root.join("html"), assets),
            dist: AssetPaths::new(dist_root, dist_root.to_path_buf(), assets),
            vendor: vendor.to_string(),
        }
    }

    /// Layout for a configuration, resolved against its project root.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            &config.root.join(&config.src_dir),
            &config.root.join(&config.dist_dir),
            &config.assets_dir,
            &config.script_vendor_dir,
        )
    }

    /// Vendor scripts in the source tree.
    pub fn js_vendor_src(&self) -> PathBuf {
        self.src.js.join(&self.vendor)
    }

    /// Vendor scripts in the output tree.
    pub fn js_vendor_dist(&self) -> PathBuf {
        self.dist.js.join(&self.vendor)
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new(Path::new("src"), Path::new("dist"), "assets", "vendor")
    }
}
