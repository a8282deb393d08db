//! Shell command operation with streamed output.

use std::collections::VecDeque;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::command_validator::CommandValidator;
use crate::error::{BoxError, Error};
use crate::task::{Operation, TaskContext};

const STDERR_TAIL_LINES: usize = 20;

/// Runs `sh -c <command>` in the project root.
///
/// Output is streamed line by line to the reporter, with invalid UTF-8
/// replaced. A non-zero exit status fails the task with the last lines of
/// stderr. The child is killed if the task is dropped before it exits.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    command: String,
    validator: CommandValidator,
}

impl ShellCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            validator: CommandValidator::new(),
        }
    }

    pub fn with_validator(mut self, validator: CommandValidator) -> Self {
        self.validator = validator;
        self
    }

    #[inline]
    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl Operation for ShellCommand {
    async fn run(&self, ctx: &TaskContext<'_>) -> Result<(), BoxError> {
        self.validator.validate(&self.command)?;
        debug!(task = ctx.task_name(), command = %self.command, "spawning");

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(ctx.project_root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Operation(format!("Failed to spawn `{}`: {}", self.command, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Operation("Failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Operation("Failed to capture stderr".to_string()))?;

        let mut stdout = BufReader::new(stdout);
        let mut stderr = BufReader::new(stderr);
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut stderr_tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

        while stdout_open || stderr_open {
            tokio::select! {
                read = stdout.read_until(b'\n', &mut stdout_buf), if stdout_open => {
                    if read? == 0 {
                        stdout_open = false;
                    } else {
                        let line = decode_line(&stdout_buf);
                        ctx.reporter().task_output(ctx.task_name(), &line, false);
                        stdout_buf.clear();
                    }
                }
                read = stderr.read_until(b'\n', &mut stderr_buf), if stderr_open => {
                    if read? == 0 {
                        stderr_open = false;
                    } else {
                        let line = decode_line(&stderr_buf);
                        ctx.reporter().task_output(ctx.task_name(), &line, true);
                        stderr_buf.clear();
                        if stderr_tail.len() == STDERR_TAIL_LINES {
                            stderr_tail.pop_front();
                        }
                        stderr_tail.push_back(line);
                    }
                }
            }
        }

        let status = child.wait().await?;
        if status.success() {
            return Ok(());
        }

        let mut message = format!("`{}` exited with {}", self.command, status);
        if !stderr_tail.is_empty() {
            message.push('\n');
            message.push_str(&Vec::from(stderr_tail).join("\n"));
        }
        Err(Error::Operation(message).into())
    }
}

/// Decodes one output line, replacing invalid UTF-8 and dropping the line ending.
fn decode_line(bytes: &[u8]) -> String {
    let line = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}
