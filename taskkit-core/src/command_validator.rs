//! Validation of shell commands and task names.

use crate::error::{Error, Result};

const MAX_COMMAND_LEN: usize = 10_000;
const MAX_IDENTIFIER_LEN: usize = 255;

/// Validates shell commands before execution.
///
/// This validator checks for patterns that would let a config file smuggle
/// extra commands past the one it declares.
#[derive(Debug, Clone)]
pub struct CommandValidator {
    allow_shell: bool,
}

impl Default for CommandValidator {
    fn default() -> Self {
        Self { allow_shell: true }
    }
}

impl CommandValidator {
    /// Creates a new command validator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a validator that disallows shell features.
    pub fn strict() -> Self {
        Self { allow_shell: false }
    }

    /// Validates a command string before execution.
    ///
    /// # Errors
    ///
    /// Returns an error if the command is empty, too long, contains NUL bytes
    /// or line breaks, or uses shell features in strict mode.
    pub fn validate(&self, command: &str) -> Result<()> {
        if command.trim().is_empty() {
            return Err(Error::Operation("Command cannot be empty".to_string()));
        }

        if command.len() > MAX_COMMAND_LEN {
            return Err(Error::Operation(format!(
                "Command exceeds {} characters",
                MAX_COMMAND_LEN
            )));
        }

        if command.contains('\0') {
            return Err(Error::Operation(
                "Command contains a NUL byte".to_string(),
            ));
        }

        if command.contains('\n') || command.contains('\r') {
            return Err(Error::Operation(format!(
                "Command contains a line break: {:?}. Chain commands with && instead.",
                command
            )));
        }

        if !self.allow_shell
            && (command.contains(';')
                || command.contains("&&")
                || command.contains("||")
                || command.contains('|')
                || command.contains('`')
                || command.contains('$'))
        {
            return Err(Error::Operation(format!(
                "Command contains shell features not allowed in strict mode: {}",
                command
            )));
        }

        Ok(())
    }

    /// Validates a task name or similar identifier.
    ///
    /// Allowed: ASCII letters and digits plus `-`, `_`, `.`, `:` and `@`,
    /// not starting with `.` or `-`.
    ///
    /// # Errors
    ///
    /// Returns an error naming `kind` if the identifier is invalid.
    pub fn validate_identifier(identifier: &str, kind: &str) -> Result<()> {
        if identifier.is_empty() {
            return Err(Error::Operation(format!("{} name cannot be empty", kind)));
        }

        if identifier.len() > MAX_IDENTIFIER_LEN {
            return Err(Error::Operation(format!(
                "{} name exceeds {} characters",
                kind, MAX_IDENTIFIER_LEN
            )));
        }

        if identifier.starts_with('.') || identifier.starts_with('-') {
            return Err(Error::Operation(format!(
                "{} name cannot start with '.' or '-': {}",
                kind, identifier
            )));
        }

        if identifier.contains("..") {
            return Err(Error::Operation(format!(
                "{} name cannot contain '..': {}",
                kind, identifier
            )));
        }

        if let Some(c) = identifier
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '@')))
        {
            return Err(Error::Operation(format!(
                "{} name contains invalid character {:?}: {}",
                kind, c, identifier
            )));
        }

        Ok(())
    }
}
