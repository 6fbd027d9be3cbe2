//! Real device backend using the OpenSSH client.
//!
//! Each session is one long-lived `ssh -tt` child process. Commands are
//! written to its stdin; a reader thread drains stdout into a channel and
//! the session waits for the device prompt after every command.
//!
//! Password credentials are handed to ssh through `SSH_ASKPASS` with
//! `SSH_ASKPASS_REQUIRE=force` (OpenSSH 8.4+). The askpass program is
//! expected to print [`askpass_response`] and exit.

use crate::backend::{Connector, Session};
use crate::error::{Error, Result};
use crate::prompt::{self, Waiting};
use crate::types::{ChangeOutcome, Credential, SessionOptions, TargetHandle};
use std::io::{Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Environment variable carrying the password to the askpass program.
pub const ASKPASS_SECRET_ENV: &str = "DEVICEKIT_ASKPASS_SECRET";

/// If this process was started by ssh as an askpass helper, the password
/// it should print.
pub fn askpass_response() -> Option<String> {
    std::env::var(ASKPASS_SECRET_ENV).ok()
}

/// Opens [`SshSession`]s.
#[derive(Debug, Clone, Default)]
pub struct SshConnector {
    options: SessionOptions,
}

impl SshConnector {
    /// Create a connector with the given session options.
    pub fn new(options: SessionOptions) -> Self {
        Self { options }
    }
}

impl Connector for SshConnector {
    fn connect(&self, target: &TargetHandle) -> Result<Box<dyn Session>> {
        Ok(Box::new(SshSession::open(target, &self.options)?))
    }
}

/// Build the ssh invocation for a target.
fn ssh_command(target: &TargetHandle, options: &SessionOptions) -> Result<Command> {
    let mut cmd = Command::new(&options.ssh_program);
    cmd.arg("-tt")
        .arg("-p")
        .arg(target.port().to_string())
        .arg("-l")
        .arg(target.username())
        .arg("-o")
        .arg(format!(
            "ConnectTimeout={}",
            options.connect_timeout.as_secs().max(1)
        ))
        .arg("-o")
        .arg("ServerAliveInterval=15");

    match target.credential() {
        Credential::Agent => {
            cmd.arg("-o").arg("BatchMode=yes");
        }
        Credential::IdentityFile(path) => {
            cmd.arg("-i")
                .arg(path)
                .arg("-o")
                .arg("IdentitiesOnly=yes")
                .arg("-o")
                .arg("BatchMode=yes");
        }
        Credential::Password(secret) => {
            let askpass = options.askpass_program.as_ref().ok_or_else(|| {
                Error::Unsupported("password authentication without an askpass program".into())
            })?;
            cmd.env("SSH_ASKPASS", askpass)
                .env("SSH_ASKPASS_REQUIRE", "force")
                .env(ASKPASS_SECRET_ENV, secret.expose())
                .arg("-o")
                .arg("PreferredAuthentications=keyboard-interactive,password")
                .arg("-o")
                .arg("NumberOfPasswordPrompts=1");
        }
    }

    cmd.args(&options.ssh_args)
        .arg(target.address())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    Ok(cmd)
}

/// An interactive CLI session over ssh.
pub struct SshSession {
    label: String,
    child: Child,
    stdin: Option<ChildStdin>,
    output: Receiver<String>,
    stderr: Option<JoinHandle<String>>,
    buffer: String,
    options: SessionOptions,
    in_config: bool,
    logged_in: bool,
    closed: bool,
}

impl SshSession {
    /// Spawn ssh, wait for the first prompt, and run the setup commands.
    pub fn open(target: &TargetHandle, options: &SessionOptions) -> Result<Self> {
        let label = target.to_string();
        log::debug!("Connecting to {label}");

        let mut child = ssh_command(target, options)?
            .spawn()
            .map_err(|e| Error::Unreachable {
                target: label.clone(),
                message: format!("failed to execute {}: {e}", options.ssh_program),
            })?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Other("ssh stdout was not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Other("ssh stderr was not captured".into()))?;

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || pump_stdout(stdout, &tx));
        let stderr = thread::spawn(move || collect_stderr(stderr));

        let mut session = Self {
            label,
            child,
            stdin,
            output: rx,
            stderr: Some(stderr),
            buffer: String::new(),
            options: options.clone(),
            in_config: false,
            logged_in: false,
            closed: false,
        };

        session.await_login()?;
        session.logged_in = true;

        for setup in options.setup_commands.clone() {
            match session.exec(&setup, Some(options.read_timeout)) {
                Ok(_) => {}
                Err(e) if e.category().is_session_fatal() => return Err(e),
                Err(e) => log::debug!("Setup command `{setup}` failed on {}: {e}", session.label),
            }
        }

        log::debug!("Connected to {}", session.label);
        Ok(session)
    }

    fn await_login(&mut self) -> Result<()> {
        let timeout = self.options.connect_timeout + self.options.read_timeout;
        loop {
            match self.wait_for_prompt("login prompt", Some(timeout))? {
                Waiting::Command => break,
                Waiting::Confirmation => self.answer_confirmation()?,
            }
        }
        self.in_config = prompt::is_config_mode(&self.buffer);
        self.buffer.clear();
        Ok(())
    }

    /// Send a command and collect its output up to the next prompt.
    fn exec(&mut self, command: &str, timeout: Option<Duration>) -> Result<String> {
        self.buffer.clear();
        self.send(&format!("{command}\n"))?;

        let mut transcript = String::new();
        loop {
            let waiting = self.wait_for_prompt(command, timeout)?;
            transcript.push_str(&self.buffer);
            self.buffer.clear();
            match waiting {
                Waiting::Command => break,
                Waiting::Confirmation => {
                    transcript.push('\n');
                    self.answer_confirmation()?;
                }
            }
        }

        self.in_config = prompt::is_config_mode(&transcript);

        let output = prompt::command_output(&transcript, command);
        match Error::from_device_output(&output, command) {
            Some(err) => Err(err),
            None => Ok(output),
        }
    }

    fn answer_confirmation(&mut self) -> Result<()> {
        log::debug!("Answering confirmation prompt on {}", self.label);
        let response = self.options.confirm_response.clone();
        self.buffer.clear();
        self.send(&response)
    }

    fn wait_for_prompt(&mut self, waiting_for: &str, timeout: Option<Duration>) -> Result<Waiting> {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            if let Some(waiting) = prompt::detect(&self.buffer) {
                return Ok(waiting);
            }

            let received = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    self.output.recv_timeout(remaining)
                }
                None => self
                    .output
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(chunk) => self.buffer.push_str(&prompt::normalize(&chunk)),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(Error::Timeout {
                        waiting_for: waiting_for.to_string(),
                        seconds: timeout.map(|t| t.as_secs()).unwrap_or_default(),
                    });
                }
                Err(RecvTimeoutError::Disconnected) => return Err(self.exited()),
            }
        }
    }

    /// Build the error for an ssh process whose output ended.
    fn exited(&mut self) -> Error {
        self.stdin = None;
        let _ = self.child.wait();
        self.closed = true;

        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if self.logged_in {
            let reason = stderr
                .lines()
                .rfind(|l| !l.trim().is_empty())
                .unwrap_or("connection closed by device");
            Error::SessionClosed(format!("{}: {}", self.label, reason.trim()))
        } else {
            Error::from_ssh_stderr(&stderr, &self.label)
        }
    }

    fn send(&mut self, text: &str) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::SessionClosed(self.label.clone()))?;
        stdin.write_all(text.as_bytes())?;
        stdin.flush()?;
        Ok(())
    }

    fn leave_config(&mut self) -> Result<()> {
        if self.in_config {
            self.exec("end", Some(self.options.read_timeout))?;
        }
        Ok(())
    }

    fn reap(&mut self) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if matches!(self.child.try_wait(), Ok(Some(_))) {
                return;
            }
            thread::sleep(Duration::from_millis(50));
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Session for SshSession {
    fn run_read(&mut self, command: &str) -> Result<String> {
        self.leave_config()?;
        log::debug!("{}: {command}", self.label);
        self.exec(command, Some(self.options.read_timeout))
    }

    fn run_change(&mut self, commands: &[String]) -> Result<ChangeOutcome> {
        if !self.in_config {
            self.exec("configure terminal", Some(self.options.read_timeout))?;
        }

        let mut outcome = ChangeOutcome::default();
        for command in commands {
            // No deadline: a change in flight must reach a prompt.
            let output = self.exec(command, None)?;
            outcome.applied += 1;
            if !output.is_empty() {
                outcome.output.push_str(&output);
                outcome.output.push('\n');
            }
        }
        log::debug!("{}: applied {} change command(s)", self.label, outcome.applied);
        Ok(outcome)
    }

    fn persist(&mut self) -> Result<()> {
        self.leave_config()?;
        let command = self.options.persist_command.clone();
        log::debug!("{}: {command}", self.label);
        self.exec(&command, None).map(|_| ())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if let Err(e) = self.leave_config() {
            log::debug!("Could not leave config mode on {}: {e}", self.label);
        }
        let _ = self.send("exit\n");
        self.stdin = None;
        self.reap();
        self.closed = true;
        Ok(())
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn pump_stdout(mut stdout: impl Read, tx: &mpsc::Sender<String>) {
    let mut buf = [0u8; 4096];
    loop {
        match stdout.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if tx.send(String::from_utf8_lossy(&buf[..n]).into_owned()).is_err() {
                    break;
                }
            }
        }
    }
}

fn collect_stderr(mut stderr: impl Read) -> String {
    let mut text = String::new();
    let _ = stderr.read_to_string(&mut text);
    text
}
