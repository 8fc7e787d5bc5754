use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub fn compile_project_json(source: &str) -> Result<String, JsValue> {
    compile_project_json_with_options(source, crate::compiler::DEFAULT_GLIDE_STEPS)
}

#[wasm_bindgen]
pub fn compile_project_json_with_options(source: &str, glide_steps: u32) -> Result<String, JsValue> {
    let options = crate::compiler::CompileOptions {
        glide_steps,
        ..Default::default()
    };
    crate::compile_project_source(source, options)
        .map(|compilation| compilation.program)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
pub fn compile_sb3(bytes: &[u8]) -> Result<String, JsValue> {
    crate::compile_project_archive(bytes, crate::compiler::CompileOptions::default())
        .map(|compilation| compilation.program)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}
