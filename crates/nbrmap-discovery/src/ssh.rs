//! Session provider that drives the system OpenSSH client
//!
//! Each device gets one `ssh -tt` connection carrying a single interactive
//! shell. Commands are typed into that shell and their output is read back
//! up to the next prompt, so devices that allow only one channel per
//! connection work the same as any other. Password logins go through
//! `sshpass -e` so the password never appears on a command line.

use async_trait::async_trait;
use nbrmap_core::DeviceAddr;
use serde::{Deserialize, Serialize};
use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::session::{
    CommandError, ConnectionError, Credentials, Session, SessionProvider, SessionTarget,
};
use crate::text::after_label;

const EXIT_TIMEOUT: Duration = Duration::from_secs(5);
const STDERR_TIMEOUT: Duration = Duration::from_secs(1);
/// sshpass exit status for a rejected password
const SSHPASS_BAD_PASSWORD: i32 = 5;
const MORE_MARKER: &str = "--More--";
const MAX_PROMPT_LEN: usize = 80;

/// OpenSSH client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshOptions {
    /// Path or name of the `ssh` binary
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Path or name of the `sshpass` binary, used only with passwords
    #[serde(default = "default_sshpass_binary")]
    pub sshpass_binary: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Value for `-o StrictHostKeyChecking=`
    #[serde(default = "default_strict_host_key_checking")]
    pub strict_host_key_checking: String,
    /// Sent once after login to turn off paging; empty sends nothing
    #[serde(default = "default_pager_command")]
    pub pager_command: String,
    /// Extra `-o` options, e.g. `KexAlgorithms=+diffie-hellman-group14-sha1`
    #[serde(default)]
    pub extra_options: Vec<String>,
}

fn default_binary() -> String {
    "ssh".to_string()
}

fn default_sshpass_binary() -> String {
    "sshpass".to_string()
}

fn default_port() -> u16 {
    22
}

fn default_strict_host_key_checking() -> String {
    "accept-new".to_string()
}

fn default_pager_command() -> String {
    "terminal length 0".to_string()
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            sshpass_binary: default_sshpass_binary(),
            port: default_port(),
            strict_host_key_checking: default_strict_host_key_checking(),
            pager_command: default_pager_command(),
            extra_options: Vec::new(),
        }
    }
}

/// Session provider backed by one interactive OpenSSH shell per device
#[derive(Debug, Clone)]
pub struct OpenSshProvider {
    options: Arc<SshOptions>,
    hostname_command: Arc<str>,
    command_timeout: Duration,
}

impl OpenSshProvider {
    pub fn new(
        options: SshOptions,
        hostname_command: impl Into<String>,
        command_timeout: Duration,
    ) -> Self {
        Self {
            options: Arc::new(options),
            hostname_command: Arc::from(hostname_command.into()),
            command_timeout,
        }
    }

    /// Arguments for the shell connection, excluding the sshpass wrapper
    fn shell_args(&self, target: &SessionTarget, connect_timeout: Duration) -> Vec<String> {
        let batch_mode = if target.credentials.password.is_some() { "no" } else { "yes" };
        let mut args = vec![
            "-tt".to_string(),
            "-p".to_string(),
            self.options.port.to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", connect_timeout.as_secs().max(1)),
            "-o".to_string(),
            format!("StrictHostKeyChecking={}", self.options.strict_host_key_checking),
            "-o".to_string(),
            format!("BatchMode={}", batch_mode),
            "-o".to_string(),
            "NumberOfPasswordPrompts=1".to_string(),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
        ];
        for option in &self.options.extra_options {
            args.push("-o".to_string());
            args.push(option.clone());
        }
        args.push(destination(&target.credentials, &target.address));
        args
    }

    fn shell_command(&self, target: &SessionTarget, connect_timeout: Duration) -> Command {
        let mut command = match &target.credentials.password {
            Some(password) => {
                let mut command = Command::new(&self.options.sshpass_binary);
                command
                    .arg("-e")
                    .arg(&self.options.binary)
                    .env("SSHPASS", password);
                command
            }
            None => Command::new(&self.options.binary),
        };
        command
            .args(self.shell_args(target, connect_timeout))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

fn destination(credentials: &Credentials, address: &DeviceAddr) -> String {
    if credentials.username.is_empty() {
        address.to_string()
    } else {
        format!("{}@{}", credentials.username, address)
    }
}

#[async_trait]
impl SessionProvider for OpenSshProvider {
    async fn open(
        &self,
        target: &SessionTarget,
        connect_timeout: Duration,
    ) -> Result<Box<dyn Session>, ConnectionError> {
        let address = &target.address;
        debug!(address = %address, family = %target.family, "Opening SSH shell");
        let mut child = self
            .shell_command(target, connect_timeout)
            .spawn()
            .map_err(|e| {
                ConnectionError::unreachable(address, format!("failed to start ssh: {}", e))
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(ConnectionError::unreachable(address, "ssh pipes unavailable"));
        };
        let mut shell = Shell {
            stdin,
            stdout,
            pending: Vec::new(),
        };

        let prompt = match timeout(connect_timeout, shell.read_until_prompt(None)).await {
            Ok(Ok((_banner, prompt))) => prompt,
            Ok(Err(_)) => {
                drop(shell);
                let code = match timeout(EXIT_TIMEOUT, child.wait()).await {
                    Ok(Ok(status)) => status.code(),
                    _ => None,
                };
                let stderr = read_stderr(&mut child).await;
                return Err(classify_failure(address, &stderr, code, connect_timeout));
            }
            Err(_) => {
                let _ = child.kill().await;
                return Err(ConnectionError::Timeout {
                    address: address.clone(),
                    timeout: connect_timeout,
                });
            }
        };

        info!(address = %address, prompt = %prompt, "SSH session established");
        let mut session = OpenSshSession {
            address: address.clone(),
            child: Some(child),
            shell: Some(shell),
            prompt,
            stale: false,
            hostname_command: self.hostname_command.clone(),
            command_timeout: self.command_timeout,
        };

        let pager = self.options.pager_command.trim();
        if !pager.is_empty() {
            if let Err(e) = session.exchange(pager, self.command_timeout).await {
                warn!(address = %address, error = %e, "Could not disable paging");
            }
        }
        Ok(Box::new(session))
    }
}

async fn read_stderr(child: &mut Child) -> String {
    let mut stderr = String::new();
    if let Some(mut pipe) = child.stderr.take() {
        let _ = timeout(STDERR_TIMEOUT, pipe.read_to_string(&mut stderr)).await;
    }
    stderr
}

/// The interactive shell's pipes plus output not yet consumed
struct Shell {
    stdin: ChildStdin,
    stdout: ChildStdout,
    pending: Vec<u8>,
}

impl Shell {
    async fn send(&mut self, line: &str) -> io::Result<()> {
        self.stdin.write_all(format!("{}\n", line).as_bytes()).await?;
        self.stdin.flush().await
    }

    /// Read until the last unterminated line is a prompt
    ///
    /// Returns the text before the prompt line and the prompt itself. With
    /// `expected` set only that exact prompt ends the read.
    async fn read_until_prompt(&mut self, expected: Option<&str>) -> io::Result<(String, String)> {
        let mut chunk = [0u8; 4096];
        loop {
            let start = self.pending.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);
            let tail = String::from_utf8_lossy(&self.pending[start..]).into_owned();

            if tail.contains(MORE_MARKER) {
                self.pending.truncate(start);
                self.stdin.write_all(b" ").await?;
                self.stdin.flush().await?;
            } else {
                let matched = match expected {
                    Some(prompt) => tail.trim() == prompt,
                    None => is_prompt(&tail),
                };
                if matched {
                    let output = String::from_utf8_lossy(&self.pending[..start]).into_owned();
                    self.pending.clear();
                    return Ok((output, tail.trim().to_string()));
                }
            }

            let read = self.stdout.read(&mut chunk).await?;
            if read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by device",
                ));
            }
            self.pending.extend_from_slice(&chunk[..read]);
        }
    }
}

/// One device connection: the ssh process and its interactive shell
pub struct OpenSshSession {
    address: DeviceAddr,
    child: Option<Child>,
    shell: Option<Shell>,
    prompt: String,
    /// A command timed out and its output may still be arriving
    stale: bool,
    hostname_command: Arc<str>,
    command_timeout: Duration,
}

impl OpenSshSession {
    /// Type one command and collect its output up to the next prompt
    async fn exchange(&mut self, command: &str, limit: Duration) -> Result<String, CommandError> {
        let Some(shell) = self.shell.as_mut() else {
            return Err(CommandError::Failed {
                command: command.to_string(),
                reason: "session closed".to_string(),
            });
        };
        let prompt = self.prompt.as_str();
        let stale = self.stale;

        let result = timeout(limit, async {
            if stale {
                shell.read_until_prompt(Some(prompt)).await?;
            }
            shell.send(command).await?;
            let (output, _) = shell.read_until_prompt(Some(prompt)).await?;
            Ok::<_, io::Error>(output)
        })
        .await;

        match result {
            Ok(Ok(output)) => {
                self.stale = false;
                Ok(clean_output(&output, command))
            }
            Ok(Err(e)) => Err(CommandError::Failed {
                command: command.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => {
                self.stale = true;
                Err(CommandError::Timeout {
                    command: command.to_string(),
                    timeout: limit,
                })
            }
        }
    }
}

#[async_trait]
impl Session for OpenSshSession {
    async fn run(&mut self, command: &str, limit: Duration) -> Result<String, CommandError> {
        debug!(address = %self.address, command = %command, "Running command");
        self.exchange(command, limit).await
    }

    async fn resolve_hostname(&mut self) -> String {
        let command = self.hostname_command.clone();
        if !command.trim().is_empty() {
            match self.exchange(&command, self.command_timeout).await {
                Ok(output) => {
                    if let Some(name) = parse_hostname(&output) {
                        return name;
                    }
                }
                Err(e) => debug!(
                    address = %self.address,
                    error = %e,
                    "Hostname command failed, using prompt"
                ),
            }
        }
        prompt_hostname(&self.prompt).unwrap_or_else(|| self.address.to_string())
    }

    async fn close(&mut self) {
        if let Some(mut shell) = self.shell.take() {
            let _ = timeout(EXIT_TIMEOUT, shell.send("exit")).await;
        }
        let Some(mut child) = self.child.take() else {
            return;
        };
        if timeout(EXIT_TIMEOUT, child.wait()).await.is_err() {
            warn!(address = %self.address, "ssh did not exit, killing it");
            let _ = child.kill().await;
        }
        debug!(address = %self.address, "SSH session closed");
    }
}

/// Map a failed ssh process to the connection error taxonomy
fn classify_failure(
    address: &DeviceAddr,
    stderr: &str,
    code: Option<i32>,
    connect_timeout: Duration,
) -> ConnectionError {
    let lower = stderr.to_lowercase();
    if code == Some(SSHPASS_BAD_PASSWORD)
        || lower.contains("permission denied")
        || lower.contains("authentication failed")
        || lower.contains("too many authentication failures")
    {
        return ConnectionError::AuthFailed {
            address: address.clone(),
        };
    }
    if lower.contains("timed out") {
        return ConnectionError::Timeout {
            address: address.clone(),
            timeout: connect_timeout,
        };
    }
    let reason = last_line(stderr).unwrap_or_else(|| match code {
        Some(code) => format!("ssh exited with status {}", code),
        None => "ssh closed the connection before a prompt".to_string(),
    });
    ConnectionError::unreachable(address, reason)
}

fn last_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .map(str::to_string)
}

/// A CLI prompt such as `CORE-SW-01#`, `leaf-1>` or `admin@mx1>`
fn is_prompt(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty()
        && line.len() <= MAX_PROMPT_LEN
        && line.ends_with(['#', '>'])
        && line.len() > 1
        && !line.contains(char::is_whitespace)
}

/// Hostname part of a prompt: `sw1(config)#` gives `sw1`, `admin@mx1>` gives `mx1`
fn prompt_hostname(prompt: &str) -> Option<String> {
    let name = prompt.trim().trim_end_matches(['#', '>']);
    let name = name.split('(').next().unwrap_or(name);
    let name = name.rsplit('@').next().unwrap_or(name);
    (!name.is_empty()).then(|| name.to_string())
}

/// Normalise line endings and drop the echoed command
fn clean_output(raw: &str, command: &str) -> String {
    let text = raw.replace("\r\n", "\n").replace('\r', "");
    match text.split_once('\n') {
        Some((first, rest)) if first.trim() == command.trim() => rest.to_string(),
        None if text.trim() == command.trim() => String::new(),
        _ => text,
    }
}

/// Extract a hostname from `show running-config | include ^hostname` style output
///
/// Also understands Junos `host-name`, NX-OS `switchname`, and a bare
/// single-word answer such as `show hostname` or a prompt (`CORE-SW-01#`).
pub fn parse_hostname(output: &str) -> Option<String> {
    for line in output.lines().map(str::trim) {
        for keyword in ["hostname ", "host-name ", "switchname "] {
            if let Some(rest) = after_label(line, keyword) {
                let name = rest.trim_end_matches(';').trim().trim_matches('"');
                if !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        }
    }

    let mut lines = output.lines().map(str::trim).filter(|l| !l.is_empty());
    match (lines.next(), lines.next()) {
        (Some(only), None) if !only.contains(char::is_whitespace) => {
            let name = only.trim_end_matches(['#', '>']);
            (!name.is_empty()).then(|| name.to_string())
        }
        _ => None,
    }
}
