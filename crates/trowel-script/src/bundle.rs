//! Concatenation of transformed scripts into a single artifact.

use std::collections::HashMap;

use oxc_allocator::Allocator;
use oxc_semantic::{SemanticBuilder, SymbolFlags};
use oxc_sourcemap::ConcatSourceMapBuilder;

use crate::downlevel::parse_script;
use crate::helpers::{helpers_used, HELPER_PREAMBLE};
use crate::traits::{ScriptError, ScriptSource, ScriptTransform, TransformedScript};

/// A concatenated script with its source map.
#[derive(Debug, Clone)]
pub struct Bundle {
    /// Output file name (e.g., "all.js")
    pub name: String,

    /// Concatenated code, ending with a `sourceMappingURL` comment
    pub code: String,

    /// Source map JSON
    pub map: String,

    /// Names of the scripts included, in order
    pub scripts: Vec<String>,
}

impl Bundle {
    /// File name of the source map.
    pub fn map_name(&self) -> String {
        format!("{}.map", self.name)
    }

    /// Code without the trailing `sourceMappingURL` comment.
    pub fn code_without_map_url(&self) -> &str {
        match self.code.rfind("//# sourceMappingURL=") {
            Some(pos) => &self.code[..pos],
            None => &self.code,
        }
    }
}

/// Outcome of bundling a set of scripts.
#[derive(Debug)]
pub struct BundleResult {
    /// The bundle, if at least one script transformed
    pub bundle: Option<Bundle>,

    /// Scripts that failed and were left out
    pub failures: Vec<ScriptError>,
}

/// Transform each script and concatenate the results in the given order.
///
/// A script that fails to transform, or that redeclares a top-level
/// `let`, `const`, or `class` binding of an earlier script, is reported in
/// `failures` and skipped. The bundle starts with the runtime helpers when
/// any included script uses them.
pub fn bundle_scripts(
    name: &str,
    scripts: &[ScriptSource],
    transform: &dyn ScriptTransform,
) -> BundleResult {
    let mut accepted = Vec::with_capacity(scripts.len());
    let mut failures = Vec::new();
    let mut top_level = TopLevel::default();

    for script in scripts {
        let out = match transform.transform(script) {
            Ok(out) => out,
            Err(e) => {
                tracing::debug!("{} failed on {}", transform.name(), script.name);
                failures.push(e);
                continue;
            }
        };

        match top_level.claim(&out) {
            Ok(()) => accepted.push(out),
            Err(e) => {
                tracing::debug!("{} left out of {}", script.name, name);
                failures.push(e);
            }
        }
    }

    let bundle = (!accepted.is_empty()).then(|| concat(name, &accepted));

    BundleResult { bundle, failures }
}

/// Top-level bindings of the scripts accepted so far, shared by every
/// script in the bundle.
#[derive(Debug, Default)]
struct TopLevel {
    /// Name to whether it is lexical (`let`, `const`, `class`)
    names: HashMap<String, bool>,
}

impl TopLevel {
    /// Record the bindings of `part`, or fail if one clashes with an earlier script.
    ///
    /// Repeated `var` and function declarations are allowed, as they are
    /// across separate `<script>` tags.
    fn claim(&mut self, part: &TransformedScript) -> Result<(), ScriptError> {
        let bindings = top_level_bindings(part)?;

        let mut clashes: Vec<&str> = bindings
            .iter()
            .filter(|(binding, lexical)| {
                self.names
                    .get(binding)
                    .is_some_and(|earlier| *earlier || *lexical)
            })
            .map(|(binding, _)| binding.as_str())
            .collect();
        if !clashes.is_empty() {
            clashes.sort_unstable();
            return Err(ScriptError::Conflict {
                name: part.name.clone(),
                message: format!("already declared: {}", clashes.join(", ")),
            });
        }

        for (binding, lexical) in bindings {
            self.names.entry(binding).or_insert(lexical);
        }
        Ok(())
    }
}

fn top_level_bindings(part: &TransformedScript) -> Result<Vec<(String, bool)>, ScriptError> {
    let allocator = Allocator::default();
    let script = ScriptSource::new(part.name.clone(), part.code.clone());
    let program = parse_script(&allocator, &script)?;

    let scoping = SemanticBuilder::new()
        .build(&program)
        .semantic
        .into_scoping();
    let root = scoping.root_scope_id();

    Ok(scoping
        .iter_bindings_in(root)
        .map(|symbol| {
            let lexical = scoping
                .symbol_flags(symbol)
                .intersects(SymbolFlags::BlockScoped);
            (scoping.symbol_name(symbol).to_string(), lexical)
        })
        .collect())
}

fn concat(name: &str, parts: &[TransformedScript]) -> Bundle {
    let mut code = String::new();
    let mut builder = ConcatSourceMapBuilder::default();

    if parts.iter().any(|part| !helpers_used(&part.code).is_empty()) {
        code.push_str(HELPER_PREAMBLE);
    }

    for part in parts {
        let line_offset = code.matches('\n').count() as u32;
        if let Some(map) = &part.map {
            builder.add_sourcemap(map, line_offset);
        }

        code.push_str(&part.code);
        if !part.code.ends_with('\n') {
            code.push('\n');
        }
    }

    let map = builder.into_sourcemap().to_json_string();
    code.push_str(&format!("//# sourceMappingURL={}.map\n", name));

    Bundle {
        name: name.to_string(),
        code,
        map,
        scripts: parts.iter().map(|p| p.name.clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downlevel::Downleveler;

    /// Passes code through unchanged.
    struct Identity;

    impl ScriptTransform for Identity {
        fn name(&self) -> &'static str {
            "identity"
        }

        fn transform(&self, script: &ScriptSource) -> Result<TransformedScript, ScriptError> {
            if script.source.contains("FAIL") {
                return Err(ScriptError::Transform {
                    name: script.name.clone(),
                    message: "marked as failing".to_string(),
                });
            }
            Ok(TransformedScript {
                name: script.name.clone(),
                code: script.source.clone(),
                map: None,
            })
        }
    }

    #[test]
    fn preserves_declared_order() {
        let scripts = vec![
            ScriptSource::new("a.js", "var log = [];\nlog.push('a');"),
            ScriptSource::new("b.js", "log.push('b');\n"),
            ScriptSource::new("c.js", "log.push('c');"),
        ];

        let result = bundle_scripts("all.js", &scripts, &Identity);
        let bundle = result.bundle.unwrap();

        let a = bundle.code.find("'a'").unwrap();
        let b = bundle.code.find("'b'").unwrap();
        let c = bundle.code.find("'c'").unwrap();
        assert!(a < b && b < c);
        assert_eq!(bundle.scripts, vec!["a.js", "b.js", "c.js"]);
        assert!(bundle.code.ends_with("//# sourceMappingURL=all.js.map\n"));
        assert!(!bundle.code.contains("babelHelpers"));
    }

    #[test]
    fn skips_failed_scripts() {
        let scripts = vec![
            ScriptSource::new("ok.js", "var ok = 1;"),
            ScriptSource::new("bad.js", "FAIL"),
        ];

        let result = bundle_scripts("all.js", &scripts, &Identity);

        assert_eq!(result.failures.len(), 1);
        let bundle = result.bundle.unwrap();
        assert_eq!(bundle.scripts, vec!["ok.js"]);
        assert!(!bundle.code.contains("FAIL"));
    }

    #[test]
    fn no_bundle_when_everything_fails() {
        let scripts = vec![ScriptSource::new("bad.js", "FAIL")];

        let result = bundle_scripts("all.js", &scripts, &Identity);

        assert!(result.bundle.is_none());
    }

    #[test]
    fn map_lists_every_transformed_source() {
        let downleveler = Downleveler::new("es2015").unwrap();
        let scripts = vec![
            ScriptSource::new("first.js", "let a = 1;\n"),
            ScriptSource::new("nested/second.js", "let b = a + 1;\n"),
        ];

        let result = bundle_scripts("all.js", &scripts, &downleveler);
        let bundle = result.bundle.unwrap();

        assert!(bundle.map.contains("first.js"));
        assert!(bundle.map.contains("nested/second.js"));
        assert_eq!(bundle.map_name(), "all.js.map");
        assert!(!bundle.code_without_map_url().contains("sourceMappingURL"));
    }

    #[test]
    fn helpers_are_defined_once_ahead_of_the_scripts() {
        let downleveler = Downleveler::new("es2015").unwrap();
        let scripts = vec![
            ScriptSource::new("load.js", "async function load() { await 1 }\n"),
            ScriptSource::new("merge.js", "var o = { ...window.a, b: 1 };\n"),
            ScriptSource::new("more.js", "var p = { ...o };\n"),
        ];

        let result = bundle_scripts("all.js", &scripts, &downleveler);
        let bundle = result.bundle.unwrap();

        assert!(result.failures.is_empty());
        assert!(bundle.code.starts_with("var babelHelpers = "));
        assert_eq!(bundle.code.matches("var babelHelpers = ").count(), 1);
        assert!(!bundle.code.contains("require("));
        assert!(!bundle.code.contains("import"));
        let preamble_end = HELPER_PREAMBLE.len();
        assert!(bundle.code[preamble_end..].contains("babelHelpers.asyncToGenerator"));
        assert!(bundle.map.contains("load.js"));
    }

    #[test]
    fn lowered_temporaries_do_not_collide_across_scripts() {
        let downleveler = Downleveler::new("es2015").unwrap();
        let scripts = vec![
            ScriptSource::new("a.js", "class A { #count = 0; get() { return this.#count; } }\n"),
            ScriptSource::new("b.js", "class B { #count = 1; get() { return this.#count; } }\n"),
        ];

        let result = bundle_scripts("all.js", &scripts, &downleveler);
        let bundle = result.bundle.unwrap();

        assert!(result.failures.is_empty(), "{:?}", result.failures);
        assert_eq!(bundle.scripts, vec!["a.js", "b.js"]);
        assert!(bundle.code.contains("$a_js"));
        assert!(bundle.code.contains("$b_js"));
    }

    #[test]
    fn lexical_redeclaration_leaves_later_script_out() {
        let scripts = vec![
            ScriptSource::new("a.js", "let count = 0;\nfunction greet() {}\nvar shared = 1;\n"),
            ScriptSource::new("b.js", "let count = 1;\n"),
            ScriptSource::new("c.js", "var shared = 2;\nfunction greet() {}\ngreet();\n"),
        ];

        let result = bundle_scripts("all.js", &scripts, &Identity);
        let bundle = result.bundle.unwrap();

        assert_eq!(bundle.scripts, vec!["a.js", "c.js"]);
        assert_eq!(result.failures.len(), 1);
        match &result.failures[0] {
            ScriptError::Conflict { name, message } => {
                assert_eq!(name, "b.js");
                assert!(message.contains("count"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
