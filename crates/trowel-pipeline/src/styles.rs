//! Style pipeline: SCSS preprocessing, vendor prefixing, and compression.

use std::fs;
use std::path::{Path, PathBuf};

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use regex::{Captures, Regex};

use crate::config::{IndentType, StyleOptions};
use crate::error::PipelineError;

/// Compiled output of one style entry.
#[derive(Debug, Clone)]
pub struct StyleArtifacts {
    /// Output base name
    pub name: String,

    /// Prefixed, human-readable CSS
    pub css: String,

    /// Minified CSS, ending with a `sourceMappingURL` comment
    pub min_css: String,

    /// Source map of the minified CSS back to the readable file
    pub map: String,
}

impl StyleArtifacts {
    pub fn css_name(&self) -> String {
        format!("{}.css", self.name)
    }

    pub fn min_css_name(&self) -> String {
        format!("{}.min.css", self.name)
    }

    pub fn map_name(&self) -> String {
        format!("{}.min.css.map", self.name)
    }

    /// Write all three artifacts into `dir`.
    pub fn write(&self, dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
        fs::create_dir_all(dir).map_err(PipelineError::io(dir))?;

        let files = [
            (self.css_name(), &self.css),
            (self.min_css_name(), &self.min_css),
            (self.map_name(), &self.map),
        ];

        let mut written = Vec::with_capacity(files.len());
        for (name, content) in files {
            let path = dir.join(name);
            fs::write(&path, content).map_err(PipelineError::io(&path))?;
            written.push(path);
        }

        Ok(written)
    }
}

/// Compiles SCSS entries into prefixed and minified CSS.
pub struct StyleCompiler {
    options: StyleOptions,
    targets: Targets,
    token: Regex,
    long_number: Regex,
}

impl StyleCompiler {
    /// Create a compiler for a browserslist query such as `"last 2 versions"`.
    pub fn new(options: StyleOptions, browsers: &str) -> Result<Self, PipelineError> {
        let parsed = Browsers::from_browserslist([browsers])
            .map_err(|e| PipelineError::Config(format!("browserslist '{}': {}", browsers, e)))?;

        // urls and strings match whole so their contents are never rounded
        let token = Regex::new(r#"url\([^)]*\)|"(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|[\w.#-]+"#)
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        let long_number = Regex::new(&format!(
            r"^(-?)(\d*\.\d{{{},}})([a-zA-Z]*)$",
            options.precision + 1
        ))
        .map_err(|e| PipelineError::Config(e.to_string()))?;

        Ok(Self {
            options,
            targets: Targets {
                browsers: parsed,
                ..Targets::default()
            },
            token,
            long_number,
        })
    }

    /// Compile one entry. `label` names the entry in annotations.
    pub fn compile(
        &self,
        entry: &Path,
        label: &str,
        output: &str,
    ) -> Result<StyleArtifacts, PipelineError> {
        let style_error = |message: String| PipelineError::Style {
            entry: label.to_string(),
            message,
        };

        let mut grass_options = grass::Options::default().style(grass::OutputStyle::Expanded);
        if let Some(dir) = entry.parent() {
            grass_options = grass_options.load_path(dir);
        }
        let compiled =
            grass::from_path(entry, &grass_options).map_err(|e| style_error(e.to_string()))?;

        let prefixed = self.prefix(&compiled, label).map_err(style_error)?;
        let css = self.format(&prefixed, label);

        let css_name = format!("{}.css", output);
        let (minified, map) = self.minify(&css, &css_name).map_err(style_error)?;

        Ok(StyleArtifacts {
            name: output.to_string(),
            css,
            min_css: format!(
                "{}\n/*# sourceMappingURL={}.min.css.map */\n",
                minified, output
            ),
            map,
        })
    }

    /// Apply vendor prefixes for the configured browsers.
    fn prefix(&self, css: &str, filename: &str) -> Result<String, String> {
        let mut sheet = StyleSheet::parse(
            css,
            ParserOptions {
                filename: filename.to_string(),
                ..ParserOptions::default()
            },
        )
        .map_err(|e| format!("CSS parse error: {}", e))?;

        sheet
            .minify(MinifyOptions {
                targets: self.targets,
                ..MinifyOptions::default()
            })
            .map_err(|e| format!("CSS prefix error: {}", e))?;

        let printed = sheet
            .to_css(PrinterOptions {
                targets: self.targets,
                ..PrinterOptions::default()
            })
            .map_err(|e| format!("CSS print error: {}", e))?;

        Ok(printed.code)
    }

    /// Compress readable CSS, mapping the result back to it.
    fn minify(&self, css: &str, filename: &str) -> Result<(String, String), String> {
        let sheet = StyleSheet::parse(
            css,
            ParserOptions {
                filename: filename.to_string(),
                ..ParserOptions::default()
            },
        )
        .map_err(|e| format!("CSS parse error: {}", e))?;

        let mut source_map = SourceMap::new("/");
        let source = source_map.add_source(filename);
        source_map
            .set_source_content(source as usize, css)
            .map_err(|e| format!("Source map error: {}", e))?;

        let printed = sheet
            .to_css(PrinterOptions {
                minify: true,
                targets: self.targets,
                source_map: Some(&mut source_map),
                ..PrinterOptions::default()
            })
            .map_err(|e| format!("CSS minify error: {}", e))?;

        let map = source_map
            .to_json(None)
            .map_err(|e| format!("Source map error: {}", e))?;

        Ok((printed.code, map))
    }

    /// Re-indent and round the printer's output per the style options.
    fn format(&self, css: &str, label: &str) -> String {
        let mut out = String::with_capacity(css.len() + label.len() + 8);

        if self.options.source_comments {
            out.push_str(&format!("/* {} */\n", label));
        }

        for line in css.lines() {
            let body = line.trim_start_matches(' ');
            // lightningcss indents two spaces per level
            let level = (line.len() - body.len()) / 2;

            match self.options.indent_type {
                IndentType::Tab => out.push_str(&"\t".repeat(level)),
                IndentType::Space => out.push_str(&" ".repeat(level * self.options.indent_width)),
            }
            out.push_str(&self.limit_precision(body));
            out.push('\n');
        }

        out
    }

    /// Round numbers with more fractional digits than the precision allows.
    ///
    /// Only whole numeric tokens (with an optional unit) are touched; names,
    /// selectors, strings, and `url(...)` arguments pass through.
    fn limit_precision(&self, text: &str) -> String {
        let precision = self.options.precision;
        self.token
            .replace_all(text, |caps: &Captures| {
                let token = &caps[0];
                match self.long_number.captures(token) {
                    Some(number) => format!(
                        "{}{}{}",
                        &number[1],
                        round_number(&number[2], precision),
                        &number[3]
                    ),
                    None => token.to_string(),
                }
            })
            .into_owned()
    }
}

/// Round a decimal literal to `precision` fractional digits, trimming zeros.
fn round_number(literal: &str, precision: usize) -> String {
    let Ok(value) = literal.parse::<f64>() else {
        return literal.to_string();
    };

    let rounded = format!("{:.*}", precision, value);
    let rounded = rounded.trim_end_matches('0').trim_end_matches('.');

    match rounded.strip_prefix('0') {
        Some(fraction) if literal.starts_with('.') && !fraction.is_empty() => fraction.to_string(),
        _ => rounded.to_string(),
    }
}
