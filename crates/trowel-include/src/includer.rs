//! Recursive include expansion.

use std::fs;
use std::path::{Path, PathBuf};

use crate::context::Context;
use crate::directive::{parse_directives, DirectiveError, Segment};

/// Options for the include pass.
#[derive(Debug, Clone)]
pub struct IncludeOptions {
    /// Directive prefix
    pub prefix: String,

    /// Maximum include nesting before giving up
    pub max_depth: usize,
}

impl Default for IncludeOptions {
    fn default() -> Self {
        Self {
            prefix: "@@".to_string(),
            max_depth: 32,
        }
    }
}

/// Errors that can occur while expanding a page.
#[derive(Debug, thiserror::Error)]
pub enum IncludeError {
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Missing include '{target}' in {from} (line {line})")]
    MissingInclude {
        from: String,
        target: String,
        line: usize,
    },

    #[error("{path}: {source}")]
    Directive {
        path: String,
        #[source]
        source: DirectiveError,
    },

    #[error("Include depth exceeded {limit} at {path}; circular include?")]
    TooDeep { path: String, limit: usize },
}

/// Expands includes and variables in HTML files.
#[derive(Debug, Clone, Default)]
pub struct Includer {
    options: IncludeOptions,
    context: Context,
}

impl Includer {
    /// Create an includer with the given base context.
    pub fn new(options: IncludeOptions, context: Context) -> Self {
        Self { options, context }
    }

    /// Render a file, resolving includes relative to it.
    pub fn render_file(&self, path: &Path) -> Result<String, IncludeError> {
        let source = fs::read_to_string(path).map_err(|e| IncludeError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        self.render(&source, path, &self.context, 0)
    }

    /// Render source text as if it were read from `path`.
    pub fn render_str(&self, source: &str, path: &Path) -> Result<String, IncludeError> {
        self.render(source, path, &self.context, 0)
    }

    fn render(
        &self,
        source: &str,
        path: &Path,
        context: &Context,
        depth: usize,
    ) -> Result<String, IncludeError> {
        if depth > self.options.max_depth {
            return Err(IncludeError::TooDeep {
                path: path.display().to_string(),
                limit: self.options.max_depth,
            });
        }

        let segments =
            parse_directives(source, &self.options.prefix).map_err(|e| IncludeError::Directive {
                path: path.display().to_string(),
                source: e,
            })?;

        let base_dir = path.parent().unwrap_or(Path::new(""));
        let mut output = String::with_capacity(source.len());

        for segment in segments {
            match segment {
                Segment::Text(text) => output.push_str(text),

                Segment::Variable { name, raw } => match context.lookup(name) {
                    Some(value) => output.push_str(&Context::render_value(value)),
                    None => {
                        tracing::debug!("Unknown variable {} in {}", raw, path.display());
                        output.push_str(raw);
                    }
                },

                Segment::Include {
                    path: target,
                    context: overrides,
                    line,
                } => {
                    let include_path = resolve(base_dir, &target);
                    let included = fs::read_to_string(&include_path).map_err(|_| {
                        IncludeError::MissingInclude {
                            from: path.display().to_string(),
                            target: target.clone(),
                            line,
                        }
                    })?;

                    let rendered = match overrides {
                        Some(overrides) => self.render(
                            &included,
                            &include_path,
                            &context.merged(&overrides),
                            depth + 1,
                        )?,
                        None => self.render(&included, &include_path, context, depth + 1)?,
                    };
                    output.push_str(&rendered);
                }
            }
        }

        Ok(output)
    }
}

/// Resolve an include target against the including file's directory.
fn resolve(base_dir: &Path, target: &str) -> PathBuf {
    let target = Path::new(target);
    if target.is_absolute() {
        target.to_path_buf()
    } else {
        base_dir.join(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn includer() -> Includer {
        let mut context = Context::new();
        context.insert("page_main", false);
        context.insert("page_name", "회사소개");
        Includer::new(IncludeOptions::default(), context)
    }

    #[test]
    fn expands_include_and_variables() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("include")).unwrap();
        fs::write(
            temp.path().join("include/header.html"),
            "<header>@@page_name</header>",
        )
        .unwrap();
        let page = temp.path().join("about.html");
        fs::write(
            &page,
            "@@include('./include/header.html')\n<main data-main=\"@@page_main\">@@page_name</main>",
        )
        .unwrap();

        let html = includer().render_file(&page).unwrap();

        assert_eq!(
            html,
            "<header>회사소개</header>\n<main data-main=\"false\">회사소개</main>"
        );
        assert!(!html.contains("@@"));
    }

    #[test]
    fn nested_includes_resolve_relative_to_their_file() {
        let temp = tempdir().unwrap();
        let include = temp.path().join("include");
        fs::create_dir_all(include.join("parts")).unwrap();
        fs::write(include.join("layout.html"), "[@@include('parts/nav.html')]").unwrap();
        fs::write(include.join("parts/nav.html"), "nav").unwrap();
        let page = temp.path().join("index.html");
        fs::write(&page, "@@include('include/layout.html')").unwrap();

        let html = includer().render_file(&page).unwrap();

        assert_eq!(html, "[nav]");
    }

    #[test]
    fn include_context_is_scoped_to_the_inclusion() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("title.html"), "<h1>@@page_name</h1>").unwrap();
        let page = temp.path().join("index.html");
        fs::write(
            &page,
            r#"@@include('title.html', {"page_name": "Home"})@@page_name"#,
        )
        .unwrap();

        let html = includer().render_file(&page).unwrap();

        assert_eq!(html, "<h1>Home</h1>회사소개");
    }

    #[test]
    fn unknown_variables_are_left_alone() {
        let html = includer()
            .render_str("contact@@unknown_name", Path::new("page.html"))
            .unwrap();

        assert_eq!(html, "contact@@unknown_name");
    }

    #[test]
    fn errors_on_missing_include() {
        let temp = tempdir().unwrap();
        let page = temp.path().join("index.html");
        fs::write(&page, "line\n@@include('./include/nope.html')").unwrap();

        let err = includer().render_file(&page).unwrap_err();

        match err {
            IncludeError::MissingInclude { target, line, .. } => {
                assert_eq!(target, "./include/nope.html");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn errors_on_circular_include() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.html"), "@@include('b.html')").unwrap();
        fs::write(temp.path().join("b.html"), "@@include('a.html')").unwrap();

        let err = includer()
            .render_file(&temp.path().join("a.html"))
            .unwrap_err();

        assert!(matches!(err, IncludeError::TooDeep { limit: 32, .. }));
    }
}
