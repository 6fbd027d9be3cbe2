//! # devicekit
//!
//! Scoped command sessions to network devices.
//!
//! This crate provides:
//! - [`TargetHandle`] and [`Credential`] to identify and authenticate to a device
//! - The [`Session`] / [`Connector`] traits: read commands, structured reads,
//!   change batches with automatic confirmation, persistence, and close
//! - [`SessionGuard`] for exactly-once close, including early returns
//! - An OpenSSH-backed implementation and a scripted mock for tests
//! - Categorized errors so callers never parse device output themselves
//!
//! ## Example
//!
//! ```no_run
//! use devicekit::{Connector, SessionGuard, SessionOptions, TargetHandle};
//! use devicekit::backend::ssh::SshConnector;
//!
//! let connector = SshConnector::new(SessionOptions::default());
//! let target = TargetHandle::new("edge1", "192.168.5.118", 22, "expert");
//!
//! let session = connector.connect(&target).expect("connect failed");
//! let mut session = SessionGuard::new(session, target.to_string());
//! let users = session.run_read("show running-config | include ^username").unwrap();
//! println!("{users}");
//! session.close().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod prompt;
pub mod types;

pub use backend::{Connector, Session, SessionGuard};
pub use error::{Error, ErrorCategory, Result};
pub use types::{ChangeOutcome, Credential, Record, Secret, SessionOptions, TargetHandle};
