//! Regex replacement across files.

use std::fs;

use async_trait::async_trait;
use regex::Regex;

use crate::error::{BoxError, Error, Result};
use crate::ops::{display_path, expand_files, expand_template};
use crate::task::{Operation, TaskContext};

/// Rewrites every match of `pattern` in `files` with `replacement`.
///
/// `{version}` in the replacement is expanded when the task runs, and `$1`
/// style capture references are honoured.
#[derive(Debug, Clone)]
pub struct ReplaceInFiles {
    files: Vec<String>,
    pattern: Regex,
    replacement: String,
}

impl ReplaceInFiles {
    /// # Errors
    ///
    /// Returns [`Error::Operation`] if `pattern` is not a valid regex.
    pub fn new<I, S>(files: I, pattern: &str, replacement: impl Into<String>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::Operation(format!("Invalid pattern '{}': {}", pattern, e)))?;
        Ok(Self {
            files: files.into_iter().map(Into::into).collect(),
            pattern,
            replacement: replacement.into(),
        })
    }
}

#[async_trait]
impl Operation for ReplaceInFiles {
    async fn run(&self, ctx: &TaskContext<'_>) -> std::result::Result<(), BoxError> {
        let replacement = expand_template(&self.replacement, ctx)?;

        for file in expand_files(&self.files, ctx)? {
            let content = fs::read_to_string(&file)?;
            let count = self.pattern.find_iter(&content).count();
            if count == 0 {
                continue;
            }

            let updated = self.pattern.replace_all(&content, replacement.as_str());
            fs::write(&file, updated.as_bytes())?;
            ctx.reporter().task_output(
                ctx.task_name(),
                &format!("{}: {} replacement(s)", display_path(&file, ctx), count),
                false,
            );
        }

        Ok(())
    }
}
