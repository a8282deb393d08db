//! Manifest version bump operation.

use async_trait::async_trait;

use crate::error::{BoxError, Error};
use crate::ops::{display_path, expand_files, write_version, read_version};
use crate::release::bump_version;
use crate::task::{Operation, TaskContext};

/// Bumps the `version` of each manifest by the run's [`BumpType`].
///
/// [`BumpType`]: crate::release::BumpType
#[derive(Debug, Clone)]
pub struct BumpVersion {
    files: Vec<String>,
}

impl BumpVersion {
    pub fn new<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Operation for BumpVersion {
    async fn run(&self, ctx: &TaskContext<'_>) -> Result<(), BoxError> {
        let files = expand_files(&self.files, ctx)?;
        if files.is_empty() {
            return Err(Error::Operation("No manifest files to bump".to_string()).into());
        }

        let bump = ctx.options().bump;
        for file in files {
            let current = read_version(&file)?;
            let next = bump_version(&current, bump)?;
            let old = write_version(&file, &next)?;
            ctx.reporter()
                .version_bumped(&display_path(&file, ctx), &old, &next);
        }

        Ok(())
    }
}
