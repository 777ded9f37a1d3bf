//! Shared helpers for the core integration tests.
//!
//! The SSH tests need an OpenSSH server on `127.0.0.1:2201` accepting
//! `testuser`/`testpass`; they skip themselves when nothing listens there.
//! Everything else runs against [`FakeRemote`].

// Each integration test is compiled as its own crate, so not every test file
// uses every function from this shared module.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::TcpStream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use remote_node_exporter_core::channel::{
    CommandChannel, Connector, RemoteSession, RetryPolicy,
};
use remote_node_exporter_core::config::{HostKeyPolicy, SshConfig};
use remote_node_exporter_core::errors::ChannelError;

/// Check if a TCP port is reachable on the given host.
pub fn is_port_reachable(host: &str, port: u16) -> bool {
    let addr = format!("{host}:{port}");
    if let Ok(addr) = addr.parse() {
        TcpStream::connect_timeout(&addr, Duration::from_secs(2)).is_ok()
    } else {
        false
    }
}

/// Skip the current test if the SSH test container is not reachable.
macro_rules! require_docker {
    ($port:expr) => {
        if !common::is_port_reachable("127.0.0.1", $port) {
            eprintln!(
                "SKIPPED: SSH test container not reachable on port {} \
                 (run an sshd with testuser/testpass mapped to it)",
                $port
            );
            return;
        }
    };
}
pub(crate) use require_docker;

/// Password-auth sshd container.
pub const PORT_SSH_PASSWORD: u16 = 2201;

/// `SshConfig` for the password container. Its host key changes with every
/// rebuild, so verification is off.
pub fn ssh_password_config(port: u16) -> SshConfig {
    SshConfig {
        host: "127.0.0.1".to_string(),
        port,
        username: "testuser".to_string(),
        auth_method: "password".to_string(),
        password: Some("testpass".to_string()),
        host_key_policy: HostKeyPolicy::AcceptAny,
        ..Default::default()
    }
}

/// Execute a command on an authenticated SSH session and return the output.
pub fn ssh_exec(session: &ssh2::Session, command: &str) -> Result<String, String> {
    let mut channel = session
        .channel_session()
        .map_err(|e| format!("Failed to open channel: {e}"))?;
    channel
        .exec(command)
        .map_err(|e| format!("Failed to exec: {e}"))?;

    let mut output = String::new();
    std::io::Read::read_to_string(&mut channel, &mut output)
        .map_err(|e| format!("Failed to read output: {e}"))?;

    channel.wait_close().ok();
    Ok(output)
}

/// Retry policy without the backoff pause.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        backoff: Duration::ZERO,
        ..Default::default()
    }
}

/// In-memory stand-in for a monitored host.
///
/// Serves `grep -F -H "" <paths>` batches, `cat <path>` and exact-match
/// commands from its file and command tables.
#[derive(Clone, Default)]
pub struct FakeRemote {
    files: Arc<Mutex<BTreeMap<String, String>>>,
    commands: Arc<Mutex<BTreeMap<String, String>>>,
    pub executed: Arc<Mutex<Vec<String>>>,
    pub connects: Arc<AtomicUsize>,
    /// When set, every connect and exec fails.
    pub down: Arc<Mutex<bool>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(self, path: &str, text: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), text.to_string());
        self
    }

    pub fn command(self, command: &str, output: &str) -> Self {
        self.commands
            .lock()
            .unwrap()
            .insert(command.to_string(), output.to_string());
        self
    }

    pub fn set_down(&self, down: bool) {
        *self.down.lock().unwrap() = down;
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn channel(&self) -> CommandChannel {
        CommandChannel::with_retry(Box::new(self.clone()), fast_retry())
    }

    /// Output of `grep -F -H "" <args>`, expanding `<dir>/*.prom` globs.
    fn grep(&self, args: &str) -> String {
        let files = self.files.lock().unwrap();
        let mut out = String::new();
        for arg in args.split_whitespace() {
            let matched: Vec<(&String, &String)> = match arg.strip_suffix("*.prom") {
                Some(dir) => files
                    .iter()
                    .filter(|(path, _)| path.starts_with(dir) && path.ends_with(".prom"))
                    .collect(),
                None => files.get_key_value(arg).into_iter().collect(),
            };
            for (path, text) in matched {
                for line in text.lines() {
                    out.push_str(&format!("{path}:{line}\n"));
                }
            }
        }
        out
    }

    fn run(&self, command: &str) -> String {
        self.executed.lock().unwrap().push(command.to_string());
        if let Some(args) = command.strip_prefix("grep -F -H \"\" ") {
            return self.grep(args);
        }
        if let Some(path) = command.strip_prefix("cat ") {
            return self.files.lock().unwrap().get(path).cloned().unwrap_or_default();
        }
        self.commands
            .lock()
            .unwrap()
            .get(command)
            .cloned()
            .unwrap_or_default()
    }
}

struct FakeSession {
    remote: FakeRemote,
}

impl RemoteSession for FakeSession {
    fn exec(&mut self, command: &str, _timeout: Duration) -> Result<String, ChannelError> {
        if *self.remote.down.lock().unwrap() {
            return Err(ChannelError::Exec("connection reset".into()));
        }
        Ok(self.remote.run(command))
    }
}

impl Connector for FakeRemote {
    fn connect(&self) -> Result<Box<dyn RemoteSession>, ChannelError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if *self.down.lock().unwrap() {
            return Err(ChannelError::Connect("127.0.0.1:22: connection refused".into()));
        }
        Ok(Box::new(FakeSession {
            remote: self.clone(),
        }))
    }

    fn describe(&self) -> String {
        "fake@127.0.0.1:22".to_string()
    }
}
