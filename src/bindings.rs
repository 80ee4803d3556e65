//! Node bindings for a JavaScript host UI.
//!
//! Files cross the boundary as JSON, either an object mapping path to
//! content or an array of `{ path | filename, content }` records.

use napi_derive::napi;
use serde_json::Value;

use crate::config::RendererConfig;
use crate::document::SandboxRenderer;
use crate::fileset::FileSet;
use crate::transform::transpile;
use crate::tree::build_tree;

fn file_set(value: &Value) -> Result<FileSet, String> {
    match value {
        Value::Object(map) => Ok(FileSet::from_entries(map.iter().map(|(path, content)| {
            let text = match content {
                Value::String(s) => s.clone(),
                other => serde_json::to_string_pretty(other).unwrap_or_default(),
            };
            (path.clone(), text)
        }))),
        Value::Array(items) => {
            let mut entries = Vec::with_capacity(items.len());
            for item in items {
                let path = item
                    .get("path")
                    .or_else(|| item.get("filename"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| format!("file record without a path: {}", item))?;
                let content = item.get("content").and_then(Value::as_str).unwrap_or("");
                entries.push((path.to_string(), content.to_string()));
            }
            Ok(FileSet::from_entries(entries))
        }
        other => Err(format!("expected an object or array of files, got {}", other)),
    }
}

fn to_napi<E: std::fmt::Display>(err: E) -> napi::Error {
    napi::Error::from_reason(err.to_string())
}

#[napi]
pub fn transpile_file_native(path: String, source: String, is_root: bool) -> napi::Result<Value> {
    serde_json::to_value(transpile(&path, &source, is_root)).map_err(to_napi)
}

#[napi]
pub fn build_tree_native(files: Value) -> napi::Result<Value> {
    let files = file_set(&files).map_err(to_napi)?;
    serde_json::to_value(build_tree(&files)).map_err(to_napi)
}

/// Render a preview document. `config` is an optional renderer configuration
/// object; missing fields take their defaults.
#[napi]
pub fn render_preview_native(files: Value, config: Option<Value>) -> napi::Result<Value> {
    let files = file_set(&files).map_err(to_napi)?;
    let config: RendererConfig = match config {
        Some(value) => serde_json::from_value(value).map_err(to_napi)?,
        None => RendererConfig::default(),
    };
    let output = SandboxRenderer::new(config).render(&files);
    serde_json::to_value(output).map_err(to_napi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_set_from_object_and_array() {
        let set = file_set(&json!({"a.ts": "x", "data.json": {"k": 1}})).unwrap();
        assert_eq!(set.get("a.ts").map(|f| f.content()), Some("x"));
        assert_eq!(set.get("data.json").map(|f| f.content()), Some("{\n  \"k\": 1\n}"));

        let set = file_set(&json!([{"filename": "src/App.tsx", "content": "y"}])).unwrap();
        assert_eq!(set.get("src/App.tsx").map(|f| f.content()), Some("y"));

        assert!(file_set(&json!([{"content": "z"}])).is_err());
        assert!(file_set(&json!("nope")).is_err());
    }
}
