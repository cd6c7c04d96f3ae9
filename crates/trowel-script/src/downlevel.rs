//! Syntax lowering to a broadly compatible ES target.

use std::collections::HashSet;
use std::path::Path;

use oxc_allocator::Allocator;
use oxc_ast::ast::Program;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_parser::Parser;
use oxc_semantic::{Scoping, SemanticBuilder, SymbolId};
use oxc_span::SourceType;
use oxc_transformer::{HelperLoaderMode, TransformOptions, Transformer};

use crate::helpers::{helpers_used, is_ident_char, is_supported};
use crate::traits::{
    join_diagnostics, ScriptError, ScriptSource, ScriptTransform, TransformedScript,
};

/// Lowers modern syntax to the configured ES target.
#[derive(Debug)]
pub struct Downleveler {
    target: String,
    options: TransformOptions,
}

impl Downleveler {
    /// Create a downleveler for a target such as `"es2015"`.
    ///
    /// Lowered code reads its helpers from the global `babelHelpers` object.
    pub fn new(target: &str) -> Result<Self, ScriptError> {
        let mut options =
            TransformOptions::from_target(target).map_err(|message| ScriptError::InvalidTarget {
                target: target.to_string(),
                message,
            })?;
        options.helper_loader.mode = HelperLoaderMode::External;

        Ok(Self {
            target: target.to_string(),
            options,
        })
    }

    /// The ES target this downleveler lowers to.
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl ScriptTransform for Downleveler {
    fn name(&self) -> &'static str {
        "downlevel"
    }

    fn transform(&self, script: &ScriptSource) -> Result<TransformedScript, ScriptError> {
        let allocator = Allocator::default();
        let path = Path::new(&script.name);
        let mut program = parse_script(&allocator, script)?;

        let semantic = SemanticBuilder::new().build(&program);
        if !semantic.errors.is_empty() {
            return Err(ScriptError::Parse {
                name: script.name.clone(),
                message: join_diagnostics(&semantic.errors),
            });
        }
        let scoping = semantic.semantic.into_scoping();
        let declared = top_level_names(&scoping);

        let ret = Transformer::new(&allocator, path, &self.options)
            .build_with_scoping(scoping, &mut program);
        if !ret.errors.is_empty() {
            return Err(ScriptError::Transform {
                name: script.name.clone(),
                message: join_diagnostics(&ret.errors),
            });
        }

        let mut scoping = ret.scoping;
        suffix_generated_names(&mut scoping, &declared, &script.name);

        let generated = Codegen::new()
            .with_options(CodegenOptions {
                source_map_path: Some(path.to_path_buf()),
                ..CodegenOptions::default()
            })
            .with_scoping(Some(scoping))
            .build(&program);

        let missing: Vec<String> = helpers_used(&generated.code)
            .into_iter()
            .filter(|helper| !is_supported(helper))
            .collect();
        if !missing.is_empty() {
            return Err(ScriptError::Transform {
                name: script.name.clone(),
                message: format!("no inline helper for {}", missing.join(", ")),
            });
        }

        Ok(TransformedScript {
            name: script.name.clone(),
            code: generated.code,
            map: generated.map,
        })
    }
}

fn top_level_names(scoping: &Scoping) -> HashSet<String> {
    scoping
        .iter_bindings_in(scoping.root_scope_id())
        .map(|symbol| scoping.symbol_name(symbol).to_string())
        .collect()
}

/// Rename top-level bindings the transform introduced (private field maps,
/// hoisted async bodies) to `<name>$<file>`, so scripts sharing one global
/// scope in a bundle do not overwrite each other's temporaries.
fn suffix_generated_names(scoping: &mut Scoping, declared: &HashSet<String>, file: &str) {
    let root = scoping.root_scope_id();
    let suffix: String = file
        .chars()
        .map(|c| if is_ident_char(c) { c } else { '_' })
        .collect();

    let generated: Vec<SymbolId> = scoping
        .iter_bindings_in(root)
        .filter(|&symbol| !declared.contains(scoping.symbol_name(symbol)))
        .collect();

    for symbol in generated {
        let name = format!("{}${}", scoping.symbol_name(symbol), suffix);
        scoping.rename_symbol(symbol, root, &name);
    }
}

/// Parse a classic (non-module) browser script.
pub(crate) fn parse_script<'a>(
    allocator: &'a Allocator,
    script: &'a ScriptSource,
) -> Result<Program<'a>, ScriptError> {
    let ret = Parser::new(allocator, &script.source, SourceType::cjs()).parse();

    if ret.panicked || !ret.errors.is_empty() {
        return Err(ScriptError::Parse {
            name: script.name.clone(),
            message: join_diagnostics(&ret.errors),
        });
    }

    Ok(ret.program)
}
