//! Exporter configuration.
//!
//! The binary reads everything from environment variables; the variable
//! names of both earlier deployments are accepted (`SSH_USER` and
//! `SSH_USERNAME`, `TEXTFILE_PATH` and `REMOTE_TEXTFILE_PATH`, ...).
//! Empty values count as unset.

use std::path::PathBuf;

use crate::errors::ConfigError;
use crate::parsers::Parser;

/// HTTP port used when `PORT` is not set.
pub const DEFAULT_LISTEN_PORT: u16 = 9101;

/// How the remote host key is checked after the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostKeyPolicy {
    /// Require a matching entry in an OpenSSH `known_hosts` file.
    #[default]
    KnownHosts,
    /// Accept whatever key the server presents.
    AcceptAny,
}

impl HostKeyPolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "known-hosts" | "known_hosts" | "strict" => Some(Self::KnownHosts),
            "accept-any" | "accept_any" | "insecure" => Some(Self::AcceptAny),
            _ => None,
        }
    }
}

/// SSH connection settings for the monitored host.
///
/// - `auth_method`: `"password"`, `"key"` or `"agent"`.
/// - `password`: the login password, or the key passphrase when
///   `auth_method` is `"key"`.
/// - `known_hosts_path`: defaults to `~/.ssh/known_hosts`.
#[derive(Debug, Clone)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth_method: String,
    pub password: Option<String>,
    pub key_path: Option<String>,
    pub host_key_policy: HostKeyPolicy,
    pub known_hosts_path: Option<String>,
    pub connect_timeout_secs: u64,
    pub keepalive_secs: u32,
    pub compress: bool,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_ssh_port(),
            username: String::new(),
            auth_method: String::new(),
            password: None,
            key_path: None,
            host_key_policy: HostKeyPolicy::default(),
            known_hosts_path: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            keepalive_secs: default_keepalive_secs(),
            compress: default_compress(),
        }
    }
}

impl SshConfig {
    /// Return a copy with `~` expanded in file paths.
    pub fn expand(mut self) -> Self {
        self.key_path = self.key_path.map(|s| {
            // Strip surrounding quotes, users often paste paths like "~/.ssh/id"
            let stripped = s.trim().trim_matches('"').trim_matches('\'');
            shellexpand::tilde(stripped).into_owned()
        });
        self.known_hosts_path = self
            .known_hosts_path
            .map(|s| shellexpand::tilde(s.trim()).into_owned());
        self
    }

    /// The `known_hosts` file consulted under [`HostKeyPolicy::KnownHosts`].
    pub fn known_hosts_file(&self) -> PathBuf {
        let path = self
            .known_hosts_path
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("~/.ssh/known_hosts");
        PathBuf::from(shellexpand::tilde(path).into_owned())
    }

    /// `user@host:port`, for log lines.
    pub fn destination(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }

    /// Check the settings before the first connection attempt.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Missing("SSH_HOST"));
        }
        if self.username.trim().is_empty() {
            return Err(ConfigError::Missing("SSH_USER"));
        }
        if self.auth_method == "key" && self.key_path.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::Missing("SSH_KEYFILE"));
        }
        Ok(())
    }
}

/// Everything the exporter needs to run.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub listen_port: u16,
    pub ssh: SshConfig,
    /// Remote directory holding pre-rendered `*.prom` snippets.
    pub textfile_path: Option<String>,
    /// Parsers that run after the default set (e.g. filesystem).
    pub extra_collectors: Vec<Parser>,
}

impl ExporterConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |names: &[&'static str]| -> Option<(&'static str, String)> {
            names.iter().find_map(|&name| {
                lookup(name)
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .map(|v| (name, v))
            })
        };

        let listen_port = match var(&["PORT"]) {
            Some((name, value)) => parse_port(name, &value)?,
            None => DEFAULT_LISTEN_PORT,
        };

        let host = var(&["SSH_HOST"])
            .map(|(_, v)| v)
            .ok_or(ConfigError::Missing("SSH_HOST"))?;
        let port = match var(&["SSH_PORT"]) {
            Some((name, value)) => parse_port(name, &value)?,
            None => default_ssh_port(),
        };
        let username = var(&["SSH_USERNAME", "SSH_USER"])
            .map(|(_, v)| v)
            .ok_or(ConfigError::Missing("SSH_USER"))?;
        let password = var(&["SSH_PASSWORD", "SSH_PASS"]).map(|(_, v)| v);
        let key_path = var(&["SSH_KEYFILE"]).map(|(_, v)| v);

        let auth_method = if key_path.is_some() {
            "key"
        } else if password.is_some() {
            "password"
        } else {
            "agent"
        };

        let host_key_policy = match var(&["SSH_HOST_KEY_POLICY"]) {
            Some((name, value)) => {
                HostKeyPolicy::from_name(&value).ok_or_else(|| ConfigError::Invalid {
                    var: name,
                    value: value.clone(),
                    reason: "expected \"known-hosts\" or \"accept-any\"".to_string(),
                })?
            }
            None => HostKeyPolicy::default(),
        };

        let ssh = SshConfig {
            host,
            port,
            username,
            auth_method: auth_method.to_string(),
            password,
            key_path,
            host_key_policy,
            known_hosts_path: var(&["SSH_KNOWN_HOSTS"]).map(|(_, v)| v),
            ..Default::default()
        }
        .expand();
        ssh.validate()?;

        let textfile_path = var(&["REMOTE_TEXTFILE_PATH", "TEXTFILE_PATH"])
            .map(|(_, v)| v.trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty());

        let mut extra_collectors = Vec::new();
        if let Some((name, value)) = var(&["EXTRA_COLLECTORS"]) {
            for item in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let parser = Parser::from_name(item).ok_or_else(|| ConfigError::Invalid {
                    var: name,
                    value: value.clone(),
                    reason: format!("unknown collector {item:?}"),
                })?;
                if !extra_collectors.contains(&parser) {
                    extra_collectors.push(parser);
                }
            }
        }

        Ok(Self {
            listen_port,
            ssh,
            textfile_path,
            extra_collectors,
        })
    }
}

fn parse_port(var: &'static str, value: &str) -> Result<u16, ConfigError> {
    value
        .parse::<u16>()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: "not a port number".to_string(),
        })
}

// --- Default value functions ---

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout_secs() -> u64 {
    8
}

fn default_keepalive_secs() -> u32 {
    60
}

fn default_compress() -> bool {
    true
}
