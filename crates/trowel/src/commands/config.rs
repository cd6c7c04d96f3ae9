//! Configuration file loading (trowel.toml).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use trowel_pipeline::{PipelineConfig, StyleEntry, StyleOptions};
use trowel_server::DevServerConfig;

/// Configuration file structure (trowel.toml).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    paths: PathsSection,
    #[serde(default)]
    styles: StylesSection,
    #[serde(default)]
    scripts: ScriptsSection,
    #[serde(default)]
    html: HtmlSection,
    #[serde(default)]
    images: ImagesSection,
    #[serde(default)]
    server: ServerSection,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PathsSection {
    src: Option<PathBuf>,
    dist: Option<PathBuf>,
    assets: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct StylesSection {
    browsers: Option<String>,
    entries: Option<Vec<StyleEntry>>,
    format: Option<StyleOptions>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ScriptsSection {
    target: Option<String>,
    bundle: Option<String>,
    entry: Option<String>,
    vendor: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct HtmlSection {
    prefix: Option<String>,
    #[serde(default)]
    context: Map<String, Value>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ImagesSection {
    extensions: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ServerSection {
    host: Option<String>,
    port: Option<u16>,
    reload_delay_ms: Option<u64>,
    notify: Option<bool>,
    open: Option<bool>,
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        tracing::debug!("No {}, using defaults", path.display());
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Directory the config file lives in; paths in it are relative to this.
pub fn project_root(config_path: &Path) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;

    Ok(match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => cwd.join(parent),
        _ => cwd,
    })
}

impl ConfigFile {
    /// Pipeline settings, with unset fields taken from the defaults.
    pub fn pipeline_config(&self, root: PathBuf) -> PipelineConfig {
        let defaults = PipelineConfig::default();

        let mut context = defaults.context;
        for (key, value) in &self.html.context {
            context.insert(key.clone(), value.clone());
        }

        PipelineConfig {
            root,
            src_dir: self.paths.src.clone().unwrap_or(defaults.src_dir),
            dist_dir: self.paths.dist.clone().unwrap_or(defaults.dist_dir),
            assets_dir: self.paths.assets.clone().unwrap_or(defaults.assets_dir),
            browsers: self.styles.browsers.clone().unwrap_or(defaults.browsers),
            style: self.styles.format.clone().unwrap_or(defaults.style),
            styles: self.styles.entries.clone().unwrap_or(defaults.styles),
            script_target: self.scripts.target.clone().unwrap_or(defaults.script_target),
            script_bundle: self.scripts.bundle.clone().unwrap_or(defaults.script_bundle),
            script_entry: self.scripts.entry.clone().unwrap_or(defaults.script_entry),
            script_vendor_dir: self
                .scripts
                .vendor
                .clone()
                .unwrap_or(defaults.script_vendor_dir),
            context,
            include_prefix: self.html.prefix.clone().unwrap_or(defaults.include_prefix),
            image_extensions: self
                .images
                .extensions
                .clone()
                .unwrap_or(defaults.image_extensions),
        }
    }

    /// Dev server settings, with unset fields taken from the defaults.
    pub fn server_config(&self) -> DevServerConfig {
        let defaults = DevServerConfig::default();

        DevServerConfig {
            host: self.server.host.clone().unwrap_or(defaults.host),
            port: self.server.port.unwrap_or(defaults.port),
            reload_delay: self
                .server
                .reload_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.reload_delay),
            notify: self.server.notify.unwrap_or(defaults.notify),
            open: self.server.open.unwrap_or(defaults.open),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;
    use trowel_pipeline::IndentType;

    #[test]
    fn missing_file_uses_defaults() {
        let temp = tempdir().unwrap();
        let config = load_config(&temp.path().join("trowel.toml")).unwrap();

        let pipeline = config.pipeline_config(temp.path().to_path_buf());
        let server = config.server_config();

        assert_eq!(pipeline.browsers, "last 2 versions");
        assert_eq!(pipeline.script_bundle, "all.js");
        assert_eq!(pipeline.context["page_name"], "회사소개");
        assert_eq!(server.port, 8080);
        assert_eq!(server.reload_delay, Duration::from_millis(50));
    }

    #[test]
    fn overrides_selected_fields() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("trowel.toml");
        fs::write(
            &path,
            r#"
[paths]
dist = "public"

[styles]
browsers = "> 1%"
entries = [{ source = "main.scss", output = "main" }]

[styles.format]
indent_type = "space"
indent_width = 2

[html.context]
page_name = "Contact"
title = "Acme"

[server]
port = 3000
open = false
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        let pipeline = config.pipeline_config(temp.path().to_path_buf());
        let server = config.server_config();

        assert_eq!(pipeline.dist_dir, PathBuf::from("public"));
        assert_eq!(pipeline.src_dir, PathBuf::from("src"));
        assert_eq!(pipeline.browsers, "> 1%");
        assert_eq!(pipeline.styles, vec![StyleEntry::new("main.scss", "main")]);
        assert_eq!(pipeline.style.indent_type, IndentType::Space);
        assert_eq!(pipeline.style.indent_width, 2);
        assert_eq!(pipeline.style.precision, 8);
        assert_eq!(pipeline.context["page_name"], "Contact");
        assert_eq!(pipeline.context["page_main"], false);
        assert_eq!(pipeline.context["title"], "Acme");
        assert_eq!(server.port, 3000);
        assert!(!server.open);
        assert!(server.notify);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("trowel.toml");
        fs::write(&path, "[server]\nport = \"eighty\"\n").unwrap();

        let err = load_config(&path).unwrap_err();

        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("trowel.toml");
        fs::write(&path, "[scripts]\nminify = false\n").unwrap();

        assert!(load_config(&path).is_err());
    }

    #[test]
    fn root_is_config_directory() {
        let cwd = std::env::current_dir().unwrap();

        assert_eq!(project_root(Path::new("trowel.toml")).unwrap(), cwd);
        assert_eq!(
            project_root(Path::new("site/trowel.toml")).unwrap(),
            cwd.join("site")
        );
    }
}
