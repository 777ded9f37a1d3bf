//! `ssh2`-backed [`Connector`] and [`RemoteSession`].

use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use ssh2::{CheckResult, KnownHostFileKind};
use tracing::{debug, warn};

use crate::config::{HostKeyPolicy, SshConfig};
use crate::errors::ChannelError;

use super::auth::authenticate;
use super::{Connector, RemoteSession};

/// Opens SSH sessions to the configured host.
pub struct SshConnector {
    config: SshConfig,
}

impl SshConnector {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }
}

impl Connector for SshConnector {
    fn connect(&self) -> Result<Box<dyn RemoteSession>, ChannelError> {
        let session = open_session(&self.config)?;
        Ok(Box::new(SshSession { session }))
    }

    fn describe(&self) -> String {
        self.config.destination()
    }
}

/// An authenticated session in blocking mode.
pub struct SshSession {
    session: ssh2::Session,
}

impl RemoteSession for SshSession {
    fn exec(&mut self, command: &str, timeout: Duration) -> Result<String, ChannelError> {
        self.session.set_timeout(as_millis(timeout));
        if let Err(e) = self.session.keepalive_send() {
            debug!("keepalive failed: {e}");
        }

        let mut channel = self
            .session
            .channel_session()
            .map_err(|e| ChannelError::Exec(format!("channel open: {e}")))?;
        channel
            .exec(command)
            .map_err(|e| ChannelError::Exec(format!("exec: {e}")))?;

        let mut stdout = Vec::new();
        channel
            .read_to_end(&mut stdout)
            .map_err(|e| ChannelError::Exec(format!("read: {e}")))?;
        // Drain stderr so the channel can close cleanly.
        let mut stderr = Vec::new();
        channel.stderr().read_to_end(&mut stderr).ok();
        channel.wait_close().ok();

        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

/// Connect, handshake, verify the host key and authenticate.
///
/// The returned session has compression and keepalive configured per
/// `config`.
pub fn open_session(config: &SshConfig) -> Result<ssh2::Session, ChannelError> {
    let timeout = Duration::from_secs(config.connect_timeout_secs);
    let tcp = connect_tcp(&config.host, config.port, timeout)?;

    let mut session =
        ssh2::Session::new().map_err(|e| ChannelError::Handshake(e.to_string()))?;
    session.set_compress(config.compress);
    session.set_timeout(as_millis(timeout));
    session.set_tcp_stream(tcp);
    session
        .handshake()
        .map_err(|e| ChannelError::Handshake(e.to_string()))?;

    verify_host_key(&session, config)?;
    authenticate(&session, config)?;

    session.set_blocking(true);
    session.set_keepalive(false, config.keepalive_secs);
    Ok(session)
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, ChannelError> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| ChannelError::Connect(format!("{host}:{port}: {e}")))?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }
    Err(ChannelError::Connect(match last_error {
        Some(e) => format!("{host}:{port}: {e}"),
        None => format!("{host}:{port}: no addresses resolved"),
    }))
}

fn verify_host_key(session: &ssh2::Session, config: &SshConfig) -> Result<(), ChannelError> {
    if config.host_key_policy == HostKeyPolicy::AcceptAny {
        warn!(
            "Host key verification disabled for {}",
            config.destination()
        );
        return Ok(());
    }

    let path = config.known_hosts_file();
    let mut known = session
        .known_hosts()
        .map_err(|e| ChannelError::HostKey(e.to_string()))?;
    known
        .read_file(&path, KnownHostFileKind::OpenSSH)
        .map_err(|e| ChannelError::HostKey(format!("cannot read {}: {e}", path.display())))?;

    let (key, _) = session
        .host_key()
        .ok_or_else(|| ChannelError::HostKey("server presented no host key".to_string()))?;

    let target = format!("{}:{}", config.host, config.port);
    match known.check_port(&config.host, config.port, key) {
        CheckResult::Match => Ok(()),
        CheckResult::NotFound => Err(ChannelError::HostKey(format!(
            "{target} is not listed in {}",
            path.display()
        ))),
        CheckResult::Mismatch => Err(ChannelError::HostKey(format!(
            "{target} presented a key that does not match {}",
            path.display()
        ))),
        CheckResult::Failure => Err(ChannelError::HostKey(format!(
            "{target}: known_hosts lookup failed"
        ))),
    }
}

fn as_millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}
