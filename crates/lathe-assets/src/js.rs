//! JavaScript transpilation and minification with oxc.

use std::fmt::Display;
use std::path::Path;

use oxc_allocator::Allocator;
use oxc_ast::ast::Program;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{CompressOptions, MangleOptions, Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_semantic::{Scoping, SemanticBuilder};
use oxc_span::SourceType;
use oxc_transformer::{TransformOptions, Transformer};

use crate::AssetError;

/// Module oxc imports lowering helpers from. Plain `<script>` tags cannot
/// resolve it, so output referring to it is rejected.
const RUNTIME_HELPERS: &str = "@oxc-project/runtime/helpers/";

/// Options for [`transpile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsOptions {
    /// Syntax level to lower to, e.g. `es2018`
    pub target: String,

    /// Compress and mangle the output
    pub minify: bool,
}

impl Default for JsOptions {
    fn default() -> Self {
        Self {
            target: "es2018".to_string(),
            minify: false,
        }
    }
}

/// Transpile a script to the configured target, minifying when asked.
pub fn transpile(path: &Path, source: &str, options: &JsOptions) -> Result<String, AssetError> {
    let allocator = Allocator::default();
    let source_type = SourceType::from_path(path).unwrap_or_else(|_| SourceType::mjs());

    let parsed = Parser::new(&allocator, source, source_type).parse();
    if parsed.panicked || !parsed.errors.is_empty() {
        return Err(js_error(path, join(&parsed.errors)));
    }
    let mut program = parsed.program;

    let scoping = SemanticBuilder::new()
        .build(&program)
        .semantic
        .into_scoping();

    let mut transform_options =
        TransformOptions::from_target(&options.target).map_err(|e| js_error(path, e))?;
    transform_options.assumptions.set_public_class_fields = true;
    let transformed = Transformer::new(&allocator, path, &transform_options)
        .build_with_scoping(scoping, &mut program);
    if !transformed.errors.is_empty() {
        return Err(js_error(path, join(&transformed.errors)));
    }

    let code = if options.minify {
        let minified = Minifier::new(MinifierOptions {
            mangle: Some(MangleOptions::default()),
            compress: Some(CompressOptions::default()),
        })
        .build(&allocator, &mut program);
        print(&program, true, minified.scoping)
    } else {
        print(&program, false, None)
    };

    let helpers = runtime_helpers(&code);
    if !helpers.is_empty() {
        return Err(js_error(
            path,
            format!(
                "target {} needs runtime helpers ({}); raise the [js] target",
                options.target,
                helpers.join(", ")
            ),
        ));
    }

    Ok(code)
}

/// Names of the runtime helpers the output imports.
fn runtime_helpers(code: &str) -> Vec<&str> {
    let mut names: Vec<&str> = code
        .match_indices(RUNTIME_HELPERS)
        .filter_map(|(index, _)| {
            code[index + RUNTIME_HELPERS.len()..]
                .split(['"', '\'', '`'])
                .next()
        })
        .collect();
    names.sort_unstable();
    names.dedup();
    names
}

fn print(program: &Program<'_>, minify: bool, scoping: Option<Scoping>) -> String {
    Codegen::new()
        .with_options(CodegenOptions {
            minify,
            ..CodegenOptions::default()
        })
        .with_scoping(scoping)
        .build(program)
        .code
}

fn join<E: Display>(errors: &[E]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn js_error(path: &Path, message: impl Display) -> AssetError {
    AssetError::Js {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowers_newer_syntax() {
        let source = "const value = input ?? 'fallback';\nconsole.log(value);\n";

        let out = transpile(Path::new("app.js"), source, &JsOptions::default()).unwrap();

        assert!(!out.contains("??"));
        assert!(out.contains("fallback"));
    }

    #[test]
    fn minifies_for_production() {
        let source = "function add(first, second) {\n  return first + second;\n}\nwindow.add = add;\n";
        let options = JsOptions {
            minify: true,
            ..JsOptions::default()
        };

        let out = transpile(Path::new("app.js"), source, &options).unwrap();

        assert!(out.len() < source.len());
        assert!(!out.contains("second"));
    }

    #[test]
    fn default_target_output_runs_as_a_plain_script() {
        let source = "const load = async () => ({ ...defaults, ready: await ready() });\n";

        for minify in [false, true] {
            let options = JsOptions {
                minify,
                ..JsOptions::default()
            };
            let out = transpile(Path::new("app.js"), source, &options).unwrap();

            assert!(!out.contains("import"), "unexpected import in {out}");
            assert!(!out.contains(RUNTIME_HELPERS));
        }
    }

    #[test]
    fn helper_dependent_lowering_is_an_error() {
        let options = JsOptions {
            target: "es2015".to_string(),
            minify: false,
        };

        let err = transpile(Path::new("app.js"), "async function go() {}\n", &options)
            .unwrap_err();

        match err {
            AssetError::Js { message, .. } => assert!(message.contains("asyncToGenerator")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn finds_imported_helper_names() {
        let code = "import _a from \"@oxc-project/runtime/helpers/objectSpread2\";\n\
                    import _b from \"@oxc-project/runtime/helpers/asyncToGenerator\";\n";

        assert_eq!(runtime_helpers(code), vec!["asyncToGenerator", "objectSpread2"]);
        assert!(runtime_helpers("console.log(1);").is_empty());
    }

    #[test]
    fn rejects_invalid_source() {
        let err = transpile(Path::new("app.js"), "let = ;", &JsOptions::default()).unwrap_err();
        assert!(matches!(err, AssetError::Js { .. }));
    }
}
