//! Enabling and disabling the bundled snippets by editing the extension manifest.
//!
//! The presence of the `Snippets` category is the only state: toggling adds
//! the category together with the two snippet contributions, or removes all
//! three.

use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const SNIPPETS_CATEGORY: &str = "Snippets";
pub const SNIPPETS_PATH: &str = "./c_cpp_snippets.json";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to write manifest {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("manifest is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("manifest field '{0}' is missing or has the wrong type")]
    Shape(&'static str),
}

/// Result of a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnippetsState {
    Enabled,
    Disabled,
}

fn snippet_contributions() -> Value {
    json!([
        { "language": "c", "path": SNIPPETS_PATH },
        { "language": "cpp", "path": SNIPPETS_PATH }
    ])
}

/// Toggle snippets on an in-memory manifest.
pub fn toggle_snippets(manifest: &mut Value) -> Result<SnippetsState, ManifestError> {
    let root = manifest
        .as_object_mut()
        .ok_or(ManifestError::Shape("<root>"))?;

    let categories = root
        .entry("categories")
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or(ManifestError::Shape("categories"))?;

    let existing = categories
        .iter()
        .position(|c| c.as_str() == Some(SNIPPETS_CATEGORY));

    let state = match existing {
        Some(index) => {
            categories.remove(index);
            SnippetsState::Disabled
        }
        None => {
            categories.push(Value::String(SNIPPETS_CATEGORY.to_string()));
            SnippetsState::Enabled
        }
    };

    let contributes = root
        .entry("contributes")
        .or_insert_with(|| Value::Object(serde_json::Map::new()))
        .as_object_mut()
        .ok_or(ManifestError::Shape("contributes"))?;

    match state {
        SnippetsState::Enabled => {
            contributes.insert("snippets".to_string(), snippet_contributions());
        }
        SnippetsState::Disabled => {
            contributes.shift_remove("snippets");
        }
    }

    Ok(state)
}

/// Toggle snippets in the manifest file at `path`, rewriting it in place.
pub fn toggle_snippets_file(path: &Path) -> Result<SnippetsState, ManifestError> {
    let content = fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let mut manifest: Value = serde_json::from_str(&content)?;

    let state = toggle_snippets(&mut manifest)?;

    let mut body = serde_json::to_string_pretty(&manifest)?;
    body.push('\n');
    fs::write(path, body).map_err(|source| ManifestError::Write {
        path: path.display().to_string(),
        source,
    })?;

    tracing::info!("Snippets {:?} in {}", state, path.display());
    Ok(state)
}
