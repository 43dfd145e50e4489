//! Browser binding, built with the `wasm` feature.

use wasm_bindgen::prelude::*;

use crate::compiler::compile;

/// Compile an XTQL query to compact JSON.
///
/// On failure the rejected value is the parse error serialized as JSON:
/// `{"kind": ..., "message": ..., "position": {"offset", "line", "column"}}`.
#[wasm_bindgen]
pub fn compile_to_json(content: &str) -> Result<String, JsValue> {
    compile(content)
        .map(|doc| doc.to_json_string())
        .map_err(|e| {
            let detail = serde_json::to_string(&e).unwrap_or_else(|_| e.to_string());
            JsValue::from_str(&detail)
        })
}

/// Crate version, for diagnostics
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
