//! WASM bindings for the CEEx compiler.
//!
//! Exposes `render()` and `check()` to JavaScript via wasm-bindgen.
//! Assigns are passed as a plain JS object; errors are thrown as JS errors.

use ceex_codegen::{compile, Assigns, CompileOptions};
use wasm_bindgen::prelude::*;

/// Compile `source` and render it with `assigns`.
///
/// `assigns` may be `undefined` or `null` for a template without assigns.
/// Throws on syntax errors (with the formatted diagnostic) and on render errors.
#[wasm_bindgen]
pub fn render(source: &str, assigns: JsValue) -> Result<String, JsError> {
    let assigns: Assigns = if assigns.is_undefined() || assigns.is_null() {
        Assigns::new()
    } else {
        serde_wasm_bindgen::from_value(assigns).map_err(|e| JsError::new(&e.to_string()))?
    };
    render_native(source, assigns)
}

/// Check `source` for syntax errors. Throws the diagnostic on failure.
#[wasm_bindgen]
pub fn check(source: &str) -> Result<(), JsError> {
    check_native(source).map_err(|e| JsError::new(&e))
}

/// Get the compiler version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn render_native(source: &str, assigns: Assigns) -> Result<String, JsError> {
    let template = compile(source, &CompileOptions::new("playground"))
        .map_err(|e| JsError::new(&e.to_string()))?;
    template
        .render_to_string(assigns)
        .map_err(|e| JsError::new(&e.to_string()))
}

fn check_native(source: &str) -> Result<(), String> {
    compile(source, &CompileOptions::new("playground"))
        .map(|_| ())
        .map_err(|e| e.to_string())
}
