//! Generation input parameters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Inputs forwarded to the generation backend.
///
/// Known fields are typed; anything else the caller sends is kept in
/// `extra` and passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Text prompt.
    pub prompt: String,
    /// Number of images requested.
    #[serde(default = "default_num_outputs")]
    pub num_outputs: u32,
    /// Output size as `WIDTHxHEIGHT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Things the image should avoid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    /// Fixed seed for reproducible output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Backend-specific passthrough options.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_num_outputs() -> u32 {
    1
}

impl GenerationParams {
    /// Parse raw request input, rejecting anything that is not an object
    /// with at least a `prompt`.
    pub fn from_value(value: Value) -> Result<Self, String> {
        if !value.is_object() {
            return Err("input parameters must be a JSON object".to_string());
        }
        serde_json::from_value(value).map_err(|e| format!("malformed input parameters: {e}"))
    }

    /// Check the parameters against request limits.
    pub fn validate(&self, max_outputs: u32, max_prompt_length: usize) -> Result<(), String> {
        let prompt = self.prompt.trim();
        if prompt.is_empty() {
            return Err("prompt must not be empty".to_string());
        }
        if prompt.chars().count() > max_prompt_length {
            return Err(format!(
                "prompt exceeds {max_prompt_length} characters"
            ));
        }
        if self.num_outputs == 0 || self.num_outputs > max_outputs {
            return Err(format!("num_outputs must be within 1..={max_outputs}"));
        }
        if let Some(size) = &self.size {
            if parse_size(size).is_none() {
                return Err(format!("size '{size}' is not of the form WIDTHxHEIGHT"));
            }
        }
        Ok(())
    }

    /// Canonical JSON text used for cache fingerprints.
    ///
    /// Prompt whitespace is collapsed, size is lowercased, and object keys
    /// are written in sorted order, so cosmetically different requests
    /// share a key.
    pub fn normalized(&self) -> String {
        let mut normalized = self.clone();
        normalized.prompt = collapse_whitespace(&self.prompt);
        normalized.negative_prompt = self
            .negative_prompt
            .as_deref()
            .map(collapse_whitespace)
            .filter(|p| !p.is_empty());
        normalized.size = self.size.as_deref().map(|s| s.trim().to_ascii_lowercase());
        let value = serde_json::to_value(normalized).unwrap_or(Value::Null);
        let mut out = String::new();
        write_canonical(&value, &mut out);
        out
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_size(size: &str) -> Option<(u32, u32)> {
    let (w, h) = size.trim().to_ascii_lowercase().split_once('x').map(|(w, h)| {
        (w.trim().parse::<u32>(), h.trim().parse::<u32>())
    })?;
    match (w, h) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => Some((w, h)),
        _ => None,
    }
}
