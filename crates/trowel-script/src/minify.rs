//! Minification of the combined script.

use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{Minifier, MinifierOptions};

use crate::downlevel::parse_script;
use crate::traits::{ScriptError, ScriptSource};

/// Markers for files that are already minified.
const MINIFIED_SUFFIXES: &[&str] = &[".min.js", "-min.js"];

/// Whether a file name already marks minified output.
pub fn is_minified_name(name: &str) -> bool {
    MINIFIED_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// `all.js` -> `all.min.js`.
pub fn minified_name(name: &str) -> String {
    match name.strip_suffix(".js") {
        Some(stem) => format!("{}.min.js", stem),
        None => format!("{}.min.js", name),
    }
}

/// Minify a script. Top-level names are kept so globals stay reachable.
pub fn minify(script: &ScriptSource) -> Result<String, ScriptError> {
    let allocator = Allocator::default();
    let mut program = parse_script(&allocator, script).map_err(|e| ScriptError::Minify {
        name: script.name.clone(),
        message: e.to_string(),
    })?;

    let ret = Minifier::new(MinifierOptions::default()).build(&allocator, &mut program);

    Ok(Codegen::new()
        .with_options(CodegenOptions::minify())
        .with_scoping(ret.scoping)
        .build(&program)
        .code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_minified_names() {
        assert!(is_minified_name("all.min.js"));
        assert!(is_minified_name("jquery-min.js"));
        assert!(!is_minified_name("all.js"));
        assert!(!is_minified_name("admin.js"));
    }

    #[test]
    fn derives_minified_name() {
        assert_eq!(minified_name("all.js"), "all.min.js");
        assert_eq!(minified_name("bundle"), "bundle.min.js");
    }

    #[test]
    fn minified_output_is_smaller_and_keeps_globals() {
        let source = r#"
function greet(name) {
    var message = "Hello, " + name;
    return message;
}
window.greet = greet;
"#;
        let script = ScriptSource::new("all.js", source);

        let minified = minify(&script).unwrap();

        assert!(minified.len() < source.len());
        assert!(minified.contains("greet"));
        assert!(!minified.contains("\n    "));
    }

    #[test]
    fn errors_on_invalid_input() {
        let script = ScriptSource::new("all.js", "var = ;");

        assert!(matches!(minify(&script), Err(ScriptError::Minify { .. })));
    }
}
