//! Built-in task operations.
//!
//! These cover the side effects a typical front-end release needs: shell
//! commands, manifest version bumps, text replacement, and git commits and
//! tags. Anything else is a shell command.

mod git;
mod manifest;
mod replace;
mod shell;
mod version;

use std::path::PathBuf;

pub use git::{GitCommit, GitTag};
pub use manifest::{read_version, write_version};
pub use replace::ReplaceInFiles;
pub use shell::ShellCommand;
pub use version::BumpVersion;

use crate::error::{BoxError, Error};
use crate::task::TaskContext;

/// Expands `{version}` from the configured version file.
pub(crate) fn expand_template(template: &str, ctx: &TaskContext<'_>) -> Result<String, BoxError> {
    if !template.contains("{version}") {
        return Ok(template.to_string());
    }

    let version_file = ctx.resolve(&ctx.options().version_file);
    let version = read_version(&version_file)?;
    Ok(template.replace("{version}", &version))
}

/// Resolves file entries against the project root, expanding globs.
///
/// Literal entries are returned as-is so that a missing file surfaces as an
/// error from the operation that reads it.
pub(crate) fn expand_files(entries: &[String], ctx: &TaskContext<'_>) -> Result<Vec<PathBuf>, BoxError> {
    let mut files = Vec::new();

    for entry in entries {
        if !entry.contains(['*', '?', '[']) {
            files.push(ctx.resolve(entry));
            continue;
        }

        let pattern = ctx.resolve(entry);
        let pattern = pattern
            .to_str()
            .ok_or_else(|| Error::Operation(format!("Non UTF-8 path pattern: {}", entry)))?;
        let mut matched = glob::glob(pattern)
            .map_err(|e| Error::Operation(format!("Invalid file pattern '{}': {}", entry, e)))?
            .filter_map(|p| p.ok())
            .filter(|p| p.is_file())
            .collect::<Vec<_>>();
        matched.sort();
        files.extend(matched);
    }

    files.dedup();
    Ok(files)
}

/// Path shown to the user: relative to the project root when possible.
pub(crate) fn display_path(path: &std::path::Path, ctx: &TaskContext<'_>) -> String {
    path.strip_prefix(ctx.project_root())
        .unwrap_or(path)
        .display()
        .to_string()
}
