//! Scripted device backend for tests.
//!
//! A [`MockDevice`] describes how the device answers; a [`MockConnector`]
//! hands out sessions for it and records every interaction in a shared
//! [`MockLog`] that stays readable after the sessions are gone.

use crate::backend::{Connector, Session};
use crate::error::{Error, Result};
use crate::types::{ChangeOutcome, Record, TargetHandle};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Scripted behavior of a device.
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    responses: HashMap<String, String>,
    records: HashMap<String, Vec<Record>>,
    failing_reads: HashSet<String>,
    fail_change_at: Option<usize>,
    fail_persist: bool,
    unreachable: bool,
    atomic: bool,
}

impl MockDevice {
    /// A device that answers every read with empty output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `command` with `output`.
    pub fn respond(mut self, command: &str, output: &str) -> Self {
        self.responses
            .insert(command.to_string(), output.to_string());
        self
    }

    /// Offer structured records for `command`.
    pub fn records(mut self, command: &str, records: Vec<Record>) -> Self {
        self.records.insert(command.to_string(), records);
        self
    }

    /// Fail reads of `command`.
    pub fn fail_read(mut self, command: &str) -> Self {
        self.failing_reads.insert(command.to_string());
        self
    }

    /// Reject the change command at this zero-based position.
    pub fn fail_change_at(mut self, index: usize) -> Self {
        self.fail_change_at = Some(index);
        self
    }

    /// Make `persist` fail.
    pub fn fail_persist(mut self) -> Self {
        self.fail_persist = true;
        self
    }

    /// Refuse connections.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Apply change batches all-or-nothing.
    pub fn atomic(mut self) -> Self {
        self.atomic = true;
        self
    }
}

#[derive(Debug, Default)]
struct Events {
    connects: usize,
    closes: usize,
    persists: usize,
    reads: Vec<String>,
    applied: Vec<String>,
    batches: Vec<Vec<String>>,
    change_attempts: usize,
}

/// Shared record of interactions with a mock device.
#[derive(Debug, Clone, Default)]
pub struct MockLog(Arc<Mutex<Events>>);

impl MockLog {
    fn lock(&self) -> MutexGuard<'_, Events> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Successful connects.
    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    /// Calls to `close`.
    pub fn close_count(&self) -> usize {
        self.lock().closes
    }

    /// Successful calls to `persist`.
    pub fn persist_count(&self) -> usize {
        self.lock().persists
    }

    /// Read commands, in order.
    pub fn reads(&self) -> Vec<String> {
        self.lock().reads.clone()
    }

    /// Change commands the device accepted, in order.
    pub fn applied(&self) -> Vec<String> {
        self.lock().applied.clone()
    }

    /// Every batch submitted to `run_change`, in order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.lock().batches.clone()
    }
}

/// Connector for a [`MockDevice`].
///
/// Targets get the default device unless one was registered for their name
/// with [`MockConnector::with_target`]. All devices share one log.
#[derive(Debug, Clone)]
pub struct MockConnector {
    device: MockDevice,
    targets: HashMap<String, MockDevice>,
    log: MockLog,
}

impl MockConnector {
    /// Create a connector for a scripted device.
    pub fn new(device: MockDevice) -> Self {
        Self {
            device,
            targets: HashMap::new(),
            log: MockLog::default(),
        }
    }

    /// Use `device` for the target named `name`.
    pub fn with_target(mut self, name: &str, device: MockDevice) -> Self {
        self.targets.insert(name.to_string(), device);
        self
    }

    /// Handle on the interaction log.
    pub fn log(&self) -> MockLog {
        self.log.clone()
    }
}

impl Connector for MockConnector {
    fn connect(&self, target: &TargetHandle) -> Result<Box<dyn Session>> {
        let device = self.targets.get(target.name()).unwrap_or(&self.device);
        if device.unreachable {
            return Err(Error::Unreachable {
                target: target.to_string(),
                message: "Connection refused".to_string(),
            });
        }
        self.log.lock().connects += 1;
        Ok(Box::new(MockSession {
            device: device.clone(),
            log: self.log.clone(),
        }))
    }
}

/// A session to a [`MockDevice`].
pub struct MockSession {
    device: MockDevice,
    log: MockLog,
}

impl MockSession {
    fn read_failure(&self, command: &str) -> Option<Error> {
        self.device
            .failing_reads
            .contains(command)
            .then(|| Error::Syntax {
                command: command.to_string(),
                output: "% Invalid input detected at '^' marker.".to_string(),
            })
    }
}

impl Session for MockSession {
    fn run_read(&mut self, command: &str) -> Result<String> {
        self.log.lock().reads.push(command.to_string());
        if let Some(err) = self.read_failure(command) {
            return Err(err);
        }
        Ok(self
            .device
            .responses
            .get(command)
            .cloned()
            .unwrap_or_default())
    }

    fn run_structured(&mut self, command: &str) -> Result<Option<Vec<Record>>> {
        if let Some(err) = self.read_failure(command) {
            return Err(err);
        }
        Ok(self.device.records.get(command).cloned())
    }

    fn supports_atomic_batch(&self) -> bool {
        self.device.atomic
    }

    fn run_change(&mut self, commands: &[String]) -> Result<ChangeOutcome> {
        let mut events = self.log.lock();
        events.batches.push(commands.to_vec());

        let start = events.change_attempts;
        events.change_attempts += commands.len();

        let failing = self
            .device
            .fail_change_at
            .filter(|at| (start..start + commands.len()).contains(at))
            .map(|at| at - start);

        if let Some(offset) = failing {
            if !self.device.atomic {
                events.applied.extend_from_slice(&commands[..offset]);
            }
            return Err(Error::Rejected {
                command: commands[offset].clone(),
                output: "% Command rejected".to_string(),
            });
        }

        events.applied.extend_from_slice(commands);
        Ok(ChangeOutcome {
            applied: commands.len(),
            output: String::new(),
        })
    }

    fn persist(&mut self) -> Result<()> {
        if self.device.fail_persist {
            return Err(Error::Unsupported("write memory".to_string()));
        }
        self.log.lock().persists += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.log.lock().closes += 1;
        Ok(())
    }
}
