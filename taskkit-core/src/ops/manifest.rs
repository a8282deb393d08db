//! Reading and writing the `version` field of package manifests.

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::{Error, Result};

enum Format {
    Json,
    Toml,
}

fn format_of(path: &Path) -> Result<Format> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        _ => Err(Error::Operation(format!(
            "Unsupported manifest format: {}. Expected a .json or .toml file",
            path.display()
        ))),
    }
}

/// Reads the version of a JSON (`version`) or TOML (`package.version` or
/// `version`) manifest.
///
/// # Errors
///
/// Returns an error if the file cannot be read or has no version.
pub fn read_version(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path)?;
    let version = match format_of(path)? {
        Format::Json => parse_json(path, &content)?
            .get("version")
            .and_then(Value::as_str)
            .map(str::to_string),
        Format::Toml => {
            let table = parse_toml(path, &content)?;
            toml_version(&table).map(str::to_string)
        }
    };

    version.ok_or_else(|| Error::Operation(format!("No version field in {}", path.display())))
}

/// Replaces the version of a manifest and returns the previous one.
///
/// JSON key order is preserved. TOML files are re-serialized.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed or written, or has no
/// version.
pub fn write_version(path: &Path, new_version: &str) -> Result<String> {
    let content = fs::read_to_string(path)?;
    let missing = || Error::Operation(format!("No version field in {}", path.display()));

    let (old, updated) = match format_of(path)? {
        Format::Json => {
            let mut manifest = parse_json(path, &content)?;
            let object = manifest.as_object_mut().ok_or_else(missing)?;
            let old = object
                .get("version")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(missing)?;
            object.insert("version".to_string(), Value::String(new_version.to_string()));
            let mut updated = serde_json::to_string_pretty(&manifest).map_err(|e| {
                Error::Operation(format!("Failed to serialize {}: {}", path.display(), e))
            })?;
            updated.push('\n');
            (old, updated)
        }
        Format::Toml => {
            let mut table = parse_toml(path, &content)?;
            let old = toml_version(&table).map(str::to_string).ok_or_else(missing)?;
            let in_package = table
                .get("package")
                .and_then(|p| p.get("version"))
                .is_some();
            let slot = if in_package {
                table
                    .get_mut("package")
                    .and_then(toml::Value::as_table_mut)
                    .ok_or_else(missing)?
            } else {
                &mut table
            };
            slot.insert(
                "version".to_string(),
                toml::Value::String(new_version.to_string()),
            );
            let updated = toml::to_string(&table).map_err(|e| {
                Error::Operation(format!("Failed to serialize {}: {}", path.display(), e))
            })?;
            (old, updated)
        }
    };

    fs::write(path, updated)?;
    Ok(old)
}

fn parse_json(path: &Path, content: &str) -> Result<Value> {
    serde_json::from_str(content)
        .map_err(|e| Error::Operation(format!("Invalid JSON in {}: {}", path.display(), e)))
}

fn parse_toml(path: &Path, content: &str) -> Result<toml::Table> {
    content.parse::<toml::Table>().map_err(|error| Error::Toml {
        error,
        context: path.display().to_string(),
    })
}

fn toml_version(table: &toml::Table) -> Option<&str> {
    table
        .get("package")
        .and_then(|p| p.get("version"))
        .or_else(|| table.get("version"))
        .and_then(toml::Value::as_str)
}
