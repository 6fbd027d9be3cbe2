//! Backend abstraction for device sessions.
//!
//! The [`Connector`] trait opens a [`Session`] to one target. Sessions are
//! stateful and exclusive: one run owns one session and issues commands to
//! it strictly in order.
//!
//! - [`ssh`]: real devices through the OpenSSH client
//! - [`mock`]: scripted devices for testing

pub mod mock;
pub mod ssh;

use crate::error::Result;
use crate::types::{ChangeOutcome, Record, TargetHandle};
use std::ops::{Deref, DerefMut};

/// A connected command channel to one device.
pub trait Session: Send {
    /// Run a read-only command and return its output.
    fn run_read(&mut self, command: &str) -> Result<String>;

    /// Run a read-only command through a structured parser, if the backend
    /// has one for this command.
    ///
    /// `Ok(None)` means no structured output is available and the caller
    /// should fall back to [`Session::run_read`].
    fn run_structured(&mut self, _command: &str) -> Result<Option<Vec<Record>>> {
        Ok(None)
    }

    /// Whether [`Session::run_change`] applies a batch all-or-nothing.
    fn supports_atomic_batch(&self) -> bool {
        false
    }

    /// Apply configuration commands in order.
    ///
    /// Confirmation prompts raised by the device are answered by the
    /// session. Non-atomic sessions stop at the first failing command.
    fn run_change(&mut self, commands: &[String]) -> Result<ChangeOutcome>;

    /// Save the running configuration durably.
    fn persist(&mut self) -> Result<()>;

    /// End the session. Called exactly once per successful connect.
    fn close(&mut self) -> Result<()>;
}

/// Opens sessions to targets.
pub trait Connector: Send + Sync {
    /// Connect and authenticate to a target.
    fn connect(&self, target: &TargetHandle) -> Result<Box<dyn Session>>;
}

/// Scoped ownership of a session.
///
/// Closes the session exactly once: explicitly through
/// [`SessionGuard::close`], or on drop for early-return paths.
pub struct SessionGuard {
    session: Box<dyn Session>,
    label: String,
    closed: bool,
}

impl SessionGuard {
    /// Take ownership of a freshly connected session.
    pub fn new(session: Box<dyn Session>, label: impl Into<String>) -> Self {
        Self {
            session,
            label: label.into(),
            closed: false,
        }
    }

    /// Close the session and report the result.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        log::debug!("Closing session to {}", self.label);
        self.session.close()
    }
}

impl Deref for SessionGuard {
    type Target = dyn Session;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        log::debug!("Closing session to {} on unwind", self.label);
        if let Err(e) = self.session.close() {
            log::warn!("Failed to close session to {}: {e}", self.label);
        }
    }
}
