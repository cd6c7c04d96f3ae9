//! Pipeline configuration.

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Configuration for all pipelines.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Project root; source and output roots are relative to it
    pub root: PathBuf,

    /// Source root
    pub src_dir: PathBuf,

    /// Output root
    pub dist_dir: PathBuf,

    /// Asset subfolder under both roots
    pub assets_dir: String,

    /// Browserslist query used for vendor prefixing
    pub browsers: String,

    /// Formatting of the readable CSS output
    pub style: StyleOptions,

    /// Style entry points, compiled independently
    pub styles: Vec<StyleEntry>,

    /// ES target scripts are lowered to
    pub script_target: String,

    /// File name of the concatenated script
    pub script_bundle: String,

    /// Bootstrap script left out of the bundle
    pub script_entry: String,

    /// Subfolder of the script root copied verbatim
    pub script_vendor_dir: String,

    /// Values substituted into pages
    pub context: Map<String, Value>,

    /// Directive prefix for the include pass
    pub include_prefix: String,

    /// Image extensions copied to the output
    pub image_extensions: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let mut context = Map::new();
        context.insert("page_main".to_string(), Value::Bool(false));
        context.insert("page_name".to_string(), Value::from("회사소개"));

        Self {
            root: PathBuf::from("."),
            src_dir: PathBuf::from("src"),
            dist_dir: PathBuf::from("dist"),
            assets_dir: "assets".to_string(),
            browsers: "last 2 versions".to_string(),
            style: StyleOptions::default(),
            styles: vec![
                StyleEntry::new("index.scss", "styles"),
                StyleEntry::new("reset.scss", "reset"),
            ],
            script_target: "es2015".to_string(),
            script_bundle: "all.js".to_string(),
            script_entry: "main.js".to_string(),
            script_vendor_dir: "vendor".to_string(),
            context,
            include_prefix: "@@".to_string(),
            image_extensions: ["jpg", "jpeg", "png", "gif", "svg"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// A style sheet entry point.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StyleEntry {
    /// SCSS file, relative to the style source directory
    pub source: String,

    /// Output base name (`styles` -> `styles.css`, `styles.min.css`)
    pub output: String,
}

impl StyleEntry {
    /// Create a new entry.
    pub fn new(source: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
        }
    }
}

/// Indentation used in readable CSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndentType {
    #[default]
    Tab,
    Space,
}

/// Formatting options for readable CSS.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StyleOptions {
    pub indent_type: IndentType,

    /// Spaces per level when `indent_type` is `space`
    pub indent_width: usize,

    /// Maximum fractional digits in numbers
    pub precision: usize,

    /// Annotate output with the entry it was compiled from
    pub source_comments: bool,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            indent_type: IndentType::Tab,
            indent_width: 4,
            precision: 8,
            source_comments: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_site_layout() {
        let config = PipelineConfig::default();

        assert_eq!(config.browsers, "last 2 versions");
        assert_eq!(config.styles.len(), 2);
        assert_eq!(config.styles[0], StyleEntry::new("index.scss", "styles"));
        assert_eq!(config.context["page_name"], "회사소개");
        assert_eq!(config.context["page_main"], false);
        assert_eq!(config.style.indent_type, IndentType::Tab);
        assert_eq!(config.style.precision, 8);
    }

    #[test]
    fn style_options_fill_missing_fields() {
        let options: StyleOptions = serde_json::from_str(r#"{"indent_type": "space"}"#).unwrap();

        assert_eq!(options.indent_type, IndentType::Space);
        assert_eq!(options.indent_width, 4);
        assert!(options.source_comments);
    }
}
