//! Pipeline composition.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use trowel_include::{Context, IncludeOptions, Includer};
use trowel_script::Downleveler;

use crate::clean::clean;
use crate::config::{PipelineConfig, StyleEntry};
use crate::copy::CopyTask;
use crate::error::PipelineError;
use crate::html::HtmlStage;
use crate::paths::Paths;
use crate::scripts::{build_scripts, select_scripts};
use crate::styles::StyleCompiler;

/// A pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Html,
    Styles,
    Scripts,
    Fonts,
    Vendor,
    Images,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Html => "html",
            Stage::Styles => "styles",
            Stage::Scripts => "scripts",
            Stage::Fonts => "fonts",
            Stage::Vendor => "vendor",
            Stage::Images => "images",
        };
        f.write_str(name)
    }
}

/// Outcome of running one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    /// Stage that ran
    pub stage: Stage,

    /// Output files written
    pub written: Vec<PathBuf>,

    /// Inputs skipped because their output was unchanged
    pub unchanged: usize,

    /// Inputs that failed and were logged
    pub failed: usize,
}

impl StageReport {
    fn new(stage: Stage) -> Self {
        Self {
            stage,
            written: Vec::new(),
            unchanged: 0,
            failed: 0,
        }
    }

    /// Whether the stage wrote anything.
    pub fn changed(&self) -> bool {
        !self.written.is_empty()
    }
}

/// Result of a full build.
#[derive(Debug)]
pub struct BuildResult {
    /// One report per stage branch
    pub reports: Vec<StageReport>,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

impl BuildResult {
    /// Total files written.
    pub fn files_written(&self) -> usize {
        self.reports.iter().map(|r| r.written.len()).sum()
    }

    /// Total inputs that failed.
    pub fn failures(&self) -> usize {
        self.reports.iter().map(|r| r.failed).sum()
    }
}

/// All pipelines of a project, sharing one configuration.
///
/// Each stage writes to its own output subtree, so stages may run
/// concurrently.
pub struct Pipeline {
    config: PipelineConfig,
    paths: Paths,
    styles: StyleCompiler,
    scripts: Downleveler,
    html: HtmlStage,
}

impl Pipeline {
    /// Create the pipelines for a configuration.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let paths = Paths::from_config(&config);
        let styles = StyleCompiler::new(config.style.clone(), &config.browsers)?;
        let scripts = Downleveler::new(&config.script_target)
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let includer = Includer::new(
            IncludeOptions {
                prefix: config.include_prefix.clone(),
                ..IncludeOptions::default()
            },
            Context::from(config.context.clone()),
        );
        let html = HtmlStage::new(includer, paths.src.html.clone(), paths.dist.html.clone());

        Ok(Self {
            config,
            paths,
            styles,
            scripts,
            html,
        })
    }

    /// Project layout.
    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    /// Delete the output root.
    pub fn clean(&self) -> Result<(), PipelineError> {
        clean(&self.paths.dist_root)
    }

    /// Run every stage concurrently and wait for all of them.
    pub async fn build(self: &Arc<Self>) -> Result<BuildResult, PipelineError> {
        let start = Instant::now();

        let mut branches: Vec<JoinHandle<Result<StageReport, PipelineError>>> = vec![
            self.spawn(|p| p.run_html()),
            self.spawn(|p| p.run_scripts()),
            self.spawn(|p| Ok(p.copy_fonts())),
            self.spawn(|p| Ok(p.copy_vendor())),
            self.spawn(|p| Ok(p.copy_images())),
        ];
        for entry in self.config.styles.clone() {
            branches.push(self.spawn(move |p| p.run_style(&entry)));
        }

        let mut reports = Vec::with_capacity(branches.len());
        for branch in branches {
            let report = branch
                .await
                .map_err(|e| PipelineError::Join(e.to_string()))??;
            reports.push(report);
        }

        Ok(BuildResult {
            reports,
            duration_ms: start.elapsed().as_millis() as u64,
            output_dir: self.paths.dist_root.clone(),
        })
    }

    fn spawn<F>(self: &Arc<Self>, f: F) -> JoinHandle<Result<StageReport, PipelineError>>
    where
        F: FnOnce(&Pipeline) -> Result<StageReport, PipelineError> + Send + 'static,
    {
        let pipeline = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&pipeline))
    }

    /// Assemble HTML pages.
    pub fn run_html(&self) -> Result<StageReport, PipelineError> {
        let outcome = self.html.run()?;

        tracing::info!(
            "html: {} written, {} unchanged, {} failed",
            outcome.written.len(),
            outcome.unchanged,
            outcome.failed
        );

        Ok(StageReport {
            written: outcome.written,
            unchanged: outcome.unchanged,
            failed: outcome.failed,
            ..StageReport::new(Stage::Html)
        })
    }

    /// Compile every style entry.
    pub fn run_styles(&self) -> Result<StageReport, PipelineError> {
        let mut report = StageReport::new(Stage::Styles);

        for entry in &self.config.styles {
            let single = self.run_style(entry)?;
            report.written.extend(single.written);
            report.failed += single.failed;
        }

        Ok(report)
    }

    /// Compile one style entry. Compilation errors are logged, not returned.
    pub fn run_style(&self, entry: &StyleEntry) -> Result<StageReport, PipelineError> {
        let mut report = StageReport::new(Stage::Styles);
        let source = self.paths.src.css.join(&entry.source);

        if !source.exists() {
            tracing::warn!("Style entry not found: {}", source.display());
            return Ok(report);
        }

        match self.styles.compile(&source, &entry.source, &entry.output) {
            Ok(artifacts) => {
                report.written = artifacts.write(&self.paths.dist.css)?;
                tracing::info!("styles: compiled {}", entry.source);
            }
            Err(PipelineError::Style { entry, message }) => {
                tracing::error!("Style error in {}: {}", entry, message);
                report.failed += 1;
            }
            Err(e) => return Err(e),
        }

        Ok(report)
    }

    /// Bundle application scripts.
    pub fn run_scripts(&self) -> Result<StageReport, PipelineError> {
        let js_root = &self.paths.src.js;
        let scripts = select_scripts(
            js_root,
            &self.config.script_vendor_dir,
            &self.config.script_entry,
        );
        tracing::debug!(
            "scripts: lowering {} files to {}",
            scripts.len(),
            self.scripts.target()
        );

        let outcome = build_scripts(
            &scripts,
            js_root,
            &self.paths.dist.js,
            &self.config.script_bundle,
            &self.scripts,
        )?;

        tracing::info!(
            "scripts: {} selected, {} failed",
            scripts.len(),
            outcome.failed
        );

        Ok(StageReport {
            written: outcome.written,
            failed: outcome.failed,
            ..StageReport::new(Stage::Scripts)
        })
    }

    /// Copy fonts verbatim.
    pub fn copy_fonts(&self) -> StageReport {
        self.copy(
            Stage::Fonts,
            CopyTask {
                label: "fonts",
                src: self.paths.src.fonts.clone(),
                dest: self.paths.dist.fonts.clone(),
                extensions: None,
            },
        )
    }

    /// Copy vendor scripts verbatim.
    pub fn copy_vendor(&self) -> StageReport {
        self.copy(
            Stage::Vendor,
            CopyTask {
                label: "vendor scripts",
                src: self.paths.js_vendor_src(),
                dest: self.paths.js_vendor_dist(),
                extensions: None,
            },
        )
    }

    /// Copy images with a known extension.
    pub fn copy_images(&self) -> StageReport {
        let report = self.copy(
            Stage::Images,
            CopyTask {
                label: "images",
                src: self.paths.src.images.clone(),
                dest: self.paths.dist.images.clone(),
                extensions: Some(self.config.image_extensions.clone()),
            },
        );

        if report.failed == 0 && report.changed() {
            tracing::info!("Images copied successfully.");
        }
        report
    }

    fn copy(&self, stage: Stage, task: CopyTask) -> StageReport {
        let copied = task.run();
        tracing::debug!("{}: copied {} files", stage, copied.copied.len());

        StageReport {
            written: copied.copied,
            failed: copied.failed,
            ..StageReport::new(stage)
        }
    }

    /// Which stage owns a changed source file, if any.
    pub fn stage_for(&self, path: &Path) -> Option<Stage> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        if path.starts_with(&self.paths.src.css) && ext == "scss" {
            Some(Stage::Styles)
        } else if path.starts_with(&self.paths.src.js) && ext == "js" {
            Some(Stage::Scripts)
        } else if path.starts_with(&self.paths.src.html) && ext == "html" {
            Some(Stage::Html)
        } else {
            None
        }
    }

    /// Re-run the stage a watcher asked for.
    pub fn run_stage(&self, stage: Stage) -> Result<StageReport, PipelineError> {
        match stage {
            Stage::Html => self.run_html(),
            Stage::Styles => self.run_styles(),
            Stage::Scripts => self.run_scripts(),
            Stage::Fonts => Ok(self.copy_fonts()),
            Stage::Vendor => Ok(self.copy_vendor()),
            Stage::Images => Ok(self.copy_images()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn sample_site(root: &Path) {
        write(root, "src/html/include/header.html", "<header>@@page_name</header>");
        write(
            root,
            "src/html/about.html",
            "@@include('./include/header.html')\n<h1>@@page_name</h1>",
        );
        write(root, "src/html/_partial.html", "partial");
        write(root, "src/assets/css/index.scss", "$c: #333;\nbody { color: $c; }\n");
        write(root, "src/assets/css/reset.scss", "* { margin: 0; }\n");
        write(root, "src/assets/js/app.js", "const x = () => 1;\nwindow.x = x;\n");
        write(root, "src/assets/js/main.js", "boot();\n");
        write(root, "src/assets/js/vendor/lib.js", "/*! lib */window.lib=()=>0;\n");
        write(root, "src/assets/fonts/sans.woff2", "font");
        write(root, "src/assets/images/logo.svg", "<svg/>");
    }

    fn pipeline(root: &Path) -> Arc<Pipeline> {
        let config = PipelineConfig {
            root: root.to_path_buf(),
            ..PipelineConfig::default()
        };
        Arc::new(Pipeline::new(config).unwrap())
    }

    fn snapshot(dir: &Path) -> Vec<(PathBuf, Vec<u8>)> {
        let mut files: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| (e.path().to_path_buf(), fs::read(e.path()).unwrap()))
            .collect();
        files.sort();
        files
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn builds_every_stage() {
        let temp = tempdir().unwrap();
        sample_site(temp.path());

        let result = pipeline(temp.path()).build().await.unwrap();
        let dist = temp.path().join("dist");

        assert_eq!(result.failures(), 0);
        assert_eq!(result.reports.len(), 7);
        let about = fs::read_to_string(dist.join("about.html")).unwrap();
        assert!(about.contains("<header>회사소개</header>"));
        assert!(!about.contains("@@"));
        assert!(!dist.join("_partial.html").exists());
        assert!(!dist.join("include").exists());
        assert!(dist.join("assets/css/styles.css").exists());
        assert!(dist.join("assets/css/styles.min.css").exists());
        assert!(dist.join("assets/css/reset.min.css.map").exists());
        assert!(dist.join("assets/js/all.js").exists());
        assert!(dist.join("assets/js/all.min.js").exists());
        assert!(dist.join("assets/fonts/sans.woff2").exists());
        assert!(dist.join("assets/images/logo.svg").exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn vendor_scripts_bypass_the_bundle() {
        let temp = tempdir().unwrap();
        sample_site(temp.path());

        pipeline(temp.path()).build().await.unwrap();
        let dist = temp.path().join("dist/assets/js");

        assert_eq!(
            fs::read(dist.join("vendor/lib.js")).unwrap(),
            fs::read(temp.path().join("src/assets/js/vendor/lib.js")).unwrap()
        );
        let all = fs::read_to_string(dist.join("all.js")).unwrap();
        assert!(!all.contains("window.lib"));
        assert!(!all.contains("boot()"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rebuilding_is_byte_identical() {
        let temp = tempdir().unwrap();
        sample_site(temp.path());
        let dist = temp.path().join("dist");

        pipeline(temp.path()).build().await.unwrap();
        let first = snapshot(&dist);
        pipeline(temp.path()).build().await.unwrap();
        let second = snapshot(&dist);

        assert_eq!(first, second);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn broken_style_does_not_stop_the_build() {
        let temp = tempdir().unwrap();
        sample_site(temp.path());
        write(temp.path(), "src/assets/css/index.scss", "body { color: $nope; }");

        let result = pipeline(temp.path()).build().await.unwrap();
        let dist = temp.path().join("dist");

        assert_eq!(result.failures(), 1);
        assert!(!dist.join("assets/css/styles.css").exists());
        assert!(dist.join("assets/css/reset.css").exists());
        assert!(dist.join("about.html").exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn clean_removes_output() {
        let temp = tempdir().unwrap();
        sample_site(temp.path());
        let pipeline = pipeline(temp.path());

        pipeline.build().await.unwrap();
        pipeline.clean().unwrap();

        assert!(!temp.path().join("dist").exists());
    }

    #[test]
    fn maps_changed_files_to_stages() {
        let temp = tempdir().unwrap();
        let pipeline = pipeline(temp.path());
        let src = temp.path().join("src");

        assert_eq!(
            pipeline.stage_for(&src.join("assets/css/_vars.scss")),
            Some(Stage::Styles)
        );
        assert_eq!(
            pipeline.stage_for(&src.join("assets/js/ui/menu.js")),
            Some(Stage::Scripts)
        );
        assert_eq!(
            pipeline.stage_for(&src.join("html/include/header.html")),
            Some(Stage::Html)
        );
        assert_eq!(pipeline.stage_for(&src.join("assets/css/notes.txt")), None);
        assert_eq!(pipeline.stage_for(&src.join("assets/images/a.png")), None);
    }
}
