//! Error types for device sessions.
//!
//! Errors are categorized by the transport so that callers never have to
//! inspect raw device output to understand what went wrong. The engine only
//! decides whether to continue or abort; classification happens here.

use thiserror::Error;

/// Categories of session errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Host unreachable, connection refused, or handshake failure
    Connection,
    /// Credentials rejected by the device
    Authentication,
    /// Device did not answer within the allowed time
    Timeout,
    /// Command not understood by the device (invalid, incomplete, ambiguous)
    Syntax,
    /// Device refused the command for authorization reasons
    Permission,
    /// Device understood the command but rejected it
    Rejected,
    /// Operation not supported by this backend or platform
    Unsupported,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether the session is unusable after an error of this category.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::Connection | Self::Authentication | Self::Timeout)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Connection => "Cannot reach device",
            Self::Authentication => "Authentication rejected",
            Self::Timeout => "Device did not respond in time",
            Self::Syntax => "Command not recognized",
            Self::Permission => "Command not authorized",
            Self::Rejected => "Command rejected by device",
            Self::Unsupported => "Operation not supported",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Connection => "Check the address, port, and that SSH is enabled on the device",
            Self::Authentication => "Verify the username and the credential environment variable",
            Self::Timeout => "Increase read_timeout_secs or check device load",
            Self::Syntax => "Check the [dialect] command templates for this platform",
            Self::Permission => "Use an account with a higher privilege level",
            Self::Rejected => "Inspect the device output for the rejected value",
            Self::Unsupported => "No action possible for this device type",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur while talking to a device.
#[derive(Debug, Error)]
pub enum Error {
    /// Host unreachable, refused, or SSH handshake failure
    #[error("cannot reach {target}: {message}")]
    Unreachable {
        /// Target label (`name (address:port)`)
        target: String,
        /// Message reported by the transport
        message: String,
    },

    /// Credentials rejected
    #[error("authentication rejected by {target}")]
    AuthenticationFailed {
        /// Target label
        target: String,
    },

    /// No prompt seen before the deadline
    #[error("timed out after {seconds}s waiting for {waiting_for}")]
    Timeout {
        /// What the session was waiting for (a command or the login banner)
        waiting_for: String,
        /// Seconds waited
        seconds: u64,
    },

    /// Invalid, incomplete, or ambiguous command
    #[error("invalid command `{command}`: {output}")]
    Syntax {
        /// The command as sent
        command: String,
        /// Device error text
        output: String,
    },

    /// Authorization failure for a command
    #[error("permission denied for `{command}`: {output}")]
    Permission {
        /// The command as sent
        command: String,
        /// Device error text
        output: String,
    },

    /// Command understood but refused
    #[error("device rejected `{command}`: {output}")]
    Rejected {
        /// The command as sent
        command: String,
        /// Device error text
        output: String,
    },

    /// Operation unsupported by backend or platform
    #[error("not supported: {0}")]
    Unsupported(String),

    /// The session ended underneath us
    #[error("session closed: {0}")]
    SessionClosed(String),

    /// IO error talking to the transport process
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Unreachable { .. } | Error::SessionClosed(_) => ErrorCategory::Connection,
            Error::AuthenticationFailed { .. } => ErrorCategory::Authentication,
            Error::Timeout { .. } => ErrorCategory::Timeout,
            Error::Syntax { .. } => ErrorCategory::Syntax,
            Error::Permission { .. } => ErrorCategory::Permission,
            Error::Rejected { .. } => ErrorCategory::Rejected,
            Error::Unsupported(_) => ErrorCategory::Unsupported,
            Error::Io(_) | Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// The command this error refers to, if it is a command-level error.
    pub fn command(&self) -> Option<&str> {
        match self {
            Error::Syntax { command, .. }
            | Error::Permission { command, .. }
            | Error::Rejected { command, .. } => Some(command),
            _ => None,
        }
    }

    /// Replace the command (and any echo of it in the device output) with a
    /// redacted form, so the error can be logged without leaking credentials.
    #[must_use]
    pub fn redact_command(self, redacted: &str) -> Self {
        let scrub = |command: String, output: String| {
            (redacted.to_string(), output.replace(&command, redacted))
        };
        match self {
            Error::Syntax { command, output } => {
                let (command, output) = scrub(command, output);
                Error::Syntax { command, output }
            }
            Error::Permission { command, output } => {
                let (command, output) = scrub(command, output);
                Error::Permission { command, output }
            }
            Error::Rejected { command, output } => {
                let (command, output) = scrub(command, output);
                Error::Rejected { command, output }
            }
            other => other,
        }
    }

    /// Inspect the output of a command and return an error if the device
    /// reported one.
    ///
    /// Device errors are lines starting with `%` (IOS style). Warnings and
    /// informational `%` lines are not errors.
    pub fn from_device_output(output: &str, command: &str) -> Option<Self> {
        let line = output
            .lines()
            .map(str::trim)
            .find(|l| l.starts_with('%') && !is_benign_notice(l))?;

        let lower = line.to_lowercase();
        let command = command.to_string();
        let output = line.to_string();

        if lower.contains("invalid input")
            || lower.contains("incomplete command")
            || lower.contains("ambiguous command")
            || lower.contains("unknown command")
            || lower.contains("unrecognized command")
        {
            return Some(Error::Syntax { command, output });
        }

        if lower.contains("authorization failed")
            || lower.contains("not authorized")
            || lower.contains("permission denied")
            || lower.contains("privilege")
        {
            return Some(Error::Permission { command, output });
        }

        Some(Error::Rejected { command, output })
    }

    /// Classify the stderr of an OpenSSH client that exited before the
    /// session became usable.
    pub fn from_ssh_stderr(stderr: &str, target: &str) -> Self {
        let lower = stderr.to_lowercase();

        if lower.contains("permission denied")
            || lower.contains("authentication failed")
            || lower.contains("too many authentication failures")
        {
            return Error::AuthenticationFailed {
                target: target.to_string(),
            };
        }

        let message = stderr
            .lines()
            .map(str::trim)
            .rfind(|l| !l.is_empty())
            .unwrap_or("ssh exited before the device prompt appeared")
            .to_string();

        Error::Unreachable {
            target: target.to_string(),
            message,
        }
    }
}

fn is_benign_notice(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.starts_with("% warning") || lower.starts_with("%warning") || lower.contains("[ok]")
}

/// Result type for device sessions.
pub type Result<T> = std::result::Result<T, Error>;
