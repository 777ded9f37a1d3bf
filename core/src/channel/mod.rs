//! Resilient remote command channel.
//!
//! [`CommandChannel`] owns at most one remote session and hides every
//! failure from its callers: a command that cannot be run after the retry
//! budget is spent yields empty output, which parsers read as "source
//! unavailable".
//!
//! The network side sits behind two small traits so the channel can be
//! driven by fakes in tests:
//!
//! - [`Connector`] opens a new [`RemoteSession`].
//! - [`RemoteSession`] runs one command with a timeout.
//!
//! The SSH implementation lives in [`ssh`].

#[cfg(feature = "ssh")]
pub mod auth;
#[cfg(feature = "ssh")]
pub mod ssh;

use std::time::Duration;

use tracing::{error, info, warn};

use crate::errors::ChannelError;

/// Probe returning the remote timezone as `±HHMM`.
pub const TIMEZONE_PROBE: &str = "date +%z";

/// One open remote session.
pub trait RemoteSession: Send {
    /// Run `command` and return its stdout.
    ///
    /// A non-zero exit status is not an error; only failures of the
    /// transport itself (channel open, exec, read, timeout) are.
    fn exec(&mut self, command: &str, timeout: Duration) -> Result<String, ChannelError>;
}

/// Factory for [`RemoteSession`]s, called on every (re)connect.
pub trait Connector: Send {
    fn connect(&self) -> Result<Box<dyn RemoteSession>, ChannelError>;

    /// Human-readable target, used in log lines.
    fn describe(&self) -> String;
}

/// Attempt budget for [`CommandChannel::exec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per command, including the first.
    pub attempts: u32,
    /// Pause before reconnecting after a failed attempt.
    pub backoff: Duration,
    /// Per-attempt command timeout.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(500),
            timeout: Duration::from_secs(8),
        }
    }
}

/// Remote command execution with reconnect and bounded retries.
pub struct CommandChannel {
    connector: Box<dyn Connector>,
    session: Option<Box<dyn RemoteSession>>,
    retry: RetryPolicy,
    /// Remote UTC offset in minutes; `None` until probed on this session.
    timezone_offset: Option<i64>,
}

impl CommandChannel {
    pub fn new(connector: Box<dyn Connector>) -> Self {
        Self::with_retry(connector, RetryPolicy::default())
    }

    pub fn with_retry(connector: Box<dyn Connector>, retry: RetryPolicy) -> Self {
        Self {
            connector,
            session: None,
            retry,
            timezone_offset: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Drop any existing session and open a new one.
    ///
    /// Failures are logged and leave the channel disconnected.
    pub fn connect(&mut self) {
        self.session = None;
        self.timezone_offset = None;
        match self.connector.connect() {
            Ok(session) => {
                info!("Connected to {}", self.connector.describe());
                self.session = Some(session);
            }
            Err(e) => {
                error!("Connect to {} failed: {e}", self.connector.describe());
            }
        }
    }

    /// Run `command` with the default timeout, stderr discarded.
    pub fn exec(&mut self, command: &str) -> String {
        self.exec_with(command, self.retry.timeout, false)
    }

    /// Run `command`, retrying with a reconnect after each failure.
    ///
    /// Returns empty output once all attempts have failed.
    pub fn exec_with(&mut self, command: &str, timeout: Duration, redirect_stderr: bool) -> String {
        let command = if redirect_stderr {
            format!("{command} 2>&1")
        } else {
            command.to_string()
        };

        for attempt in 1..=self.retry.attempts {
            let result = match self.session.as_mut() {
                Some(session) => session.exec(&command, timeout),
                None => Err(ChannelError::NotConnected),
            };
            match result {
                Ok(output) => return output,
                Err(e) => {
                    error!(
                        "exec({command:?}) attempt {attempt}/{} failed: {e}, reconnecting",
                        self.retry.attempts
                    );
                    std::thread::sleep(self.retry.backoff);
                    self.connect();
                }
            }
        }
        String::new()
    }

    /// Remote UTC offset in minutes, probed once per connection.
    ///
    /// An empty probe reply counts as UTC for this call only and is probed
    /// again next time.
    pub fn timezone_offset_minutes(&mut self) -> i64 {
        if let Some(offset) = self.timezone_offset {
            return offset;
        }
        let output = self.exec(TIMEZONE_PROBE);
        let raw = output.trim();
        if raw.is_empty() {
            warn!("Remote timezone unavailable, assuming UTC for this cycle");
            return 0;
        }
        let offset = parse_timezone_offset(raw).unwrap_or_else(|| {
            warn!("Unrecognised remote timezone {raw:?}, assuming UTC");
            0
        });
        // The probe may have reconnected; cache on whatever session is current.
        self.timezone_offset = Some(offset);
        offset
    }
}

/// Parse `±HHMM` into signed minutes: sign from the first character, hours
/// from the next two digits, minutes from the last two.
pub fn parse_timezone_offset(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.len() != 5 || !raw.is_ascii() {
        return None;
    }
    let sign = match &raw[..1] {
        "+" => 1,
        "-" => -1,
        _ => return None,
    };
    let hours: i64 = raw[1..3].parse().ok()?;
    let minutes: i64 = raw[3..5].parse().ok()?;
    if !raw[1..].bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(sign * (hours * 60 + minutes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Session that replays scripted results and records commands.
    struct ScriptedSession {
        results: Arc<Mutex<VecDeque<Result<String, ChannelError>>>>,
        commands: Arc<Mutex<Vec<String>>>,
    }

    impl RemoteSession for ScriptedSession {
        fn exec(&mut self, command: &str, _timeout: Duration) -> Result<String, ChannelError> {
            self.commands.lock().unwrap().push(command.to_string());
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ChannelError::Exec("script exhausted".into())))
        }
    }

    struct ScriptedConnector {
        connects: Arc<AtomicUsize>,
        refuse: bool,
        results: Arc<Mutex<VecDeque<Result<String, ChannelError>>>>,
        commands: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedConnector {
        fn new(results: Vec<Result<String, ChannelError>>) -> Self {
            Self {
                connects: Arc::new(AtomicUsize::new(0)),
                refuse: false,
                results: Arc::new(Mutex::new(results.into())),
                commands: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl Connector for ScriptedConnector {
        fn connect(&self) -> Result<Box<dyn RemoteSession>, ChannelError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.refuse {
                return Err(ChannelError::Connect("refused".into()));
            }
            Ok(Box::new(ScriptedSession {
                results: self.results.clone(),
                commands: self.commands.clone(),
            }))
        }

        fn describe(&self) -> String {
            "test@scripted:22".to_string()
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            backoff: Duration::ZERO,
            ..Default::default()
        }
    }

    #[test]
    fn retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.backoff, Duration::from_millis(500));
        assert_eq!(policy.timeout, Duration::from_secs(8));
    }

    #[test]
    fn exec_returns_output_on_first_success() {
        let connector = ScriptedConnector::new(vec![Ok("0.15 0.10 0.05 1/234 5678\n".into())]);
        let connects = connector.connects.clone();
        let mut channel = CommandChannel::with_retry(Box::new(connector), fast_retry());
        channel.connect();

        assert_eq!(channel.exec("cat /proc/loadavg"), "0.15 0.10 0.05 1/234 5678\n");
        assert_eq!(connects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn exec_reconnects_once_per_failure_then_gives_up() {
        let connector = ScriptedConnector::new(vec![
            Err(ChannelError::Exec("broken pipe".into())),
            Err(ChannelError::Exec("broken pipe".into())),
            Err(ChannelError::Exec("broken pipe".into())),
        ]);
        let connects = connector.connects.clone();
        let commands = connector.commands.clone();
        let mut channel = CommandChannel::with_retry(Box::new(connector), fast_retry());
        channel.connect();
        assert_eq!(connects.load(Ordering::SeqCst), 1);

        assert_eq!(channel.exec("cat /proc/stat"), "");
        // initial connect + one reconnect per failed attempt
        assert_eq!(connects.load(Ordering::SeqCst), 4);
        assert_eq!(commands.lock().unwrap().len(), 3);
    }

    #[test]
    fn exec_recovers_after_transient_failure() {
        let connector = ScriptedConnector::new(vec![
            Err(ChannelError::Exec("timed out".into())),
            Ok("ok\n".into()),
        ]);
        let connects = connector.connects.clone();
        let mut channel = CommandChannel::with_retry(Box::new(connector), fast_retry());
        channel.connect();

        assert_eq!(channel.exec("echo ok"), "ok\n");
        assert_eq!(connects.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn exec_without_session_reconnects() {
        let connector = ScriptedConnector::new(vec![Ok("up\n".into())]);
        let connects = connector.connects.clone();
        let mut channel = CommandChannel::with_retry(Box::new(connector), fast_retry());
        assert!(!channel.is_connected());

        assert_eq!(channel.exec("uptime"), "up\n");
        assert!(channel.is_connected());
        assert_eq!(connects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn connect_failure_leaves_channel_disconnected() {
        let mut connector = ScriptedConnector::new(vec![]);
        connector.refuse = true;
        let connects = connector.connects.clone();
        let mut channel = CommandChannel::with_retry(Box::new(connector), fast_retry());

        channel.connect();
        assert!(!channel.is_connected());
        assert_eq!(channel.exec("true"), "");
        assert_eq!(connects.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn exec_with_redirects_stderr() {
        let connector = ScriptedConnector::new(vec![Ok(String::new())]);
        let commands = connector.commands.clone();
        let mut channel = CommandChannel::with_retry(Box::new(connector), fast_retry());
        channel.connect();

        channel.exec_with("df -P", Duration::from_secs(1), true);
        assert_eq!(commands.lock().unwrap().as_slice(), ["df -P 2>&1"]);
    }

    #[test]
    fn timezone_offset_is_cached_until_reconnect() {
        let connector = ScriptedConnector::new(vec![Ok("+0800\n".into()), Ok("-0130\n".into())]);
        let commands = connector.commands.clone();
        let mut channel = CommandChannel::with_retry(Box::new(connector), fast_retry());
        channel.connect();

        assert_eq!(channel.timezone_offset_minutes(), 480);
        assert_eq!(channel.timezone_offset_minutes(), 480);
        assert_eq!(commands.lock().unwrap().len(), 1);

        channel.connect();
        assert_eq!(channel.timezone_offset_minutes(), -90);
        assert_eq!(commands.lock().unwrap().len(), 2);
    }

    #[test]
    fn timezone_offset_empty_probe_means_utc() {
        let connector = ScriptedConnector::new(vec![Ok("\n".into())]);
        let mut channel = CommandChannel::with_retry(Box::new(connector), fast_retry());
        channel.connect();
        assert_eq!(channel.timezone_offset_minutes(), 0);
    }

    #[test]
    fn timezone_offset_not_cached_after_failed_probe() {
        let connector = ScriptedConnector::new(vec![
            Err(ChannelError::Exec("timed out".into())),
            Err(ChannelError::Exec("timed out".into())),
            Err(ChannelError::Exec("timed out".into())),
            Ok("+0800\n".into()),
        ]);
        let commands = connector.commands.clone();
        let mut channel = CommandChannel::with_retry(Box::new(connector), fast_retry());
        channel.connect();

        assert_eq!(channel.timezone_offset_minutes(), 0);
        // The last reconnect succeeded, so the next call probes again.
        assert!(channel.is_connected());
        assert_eq!(channel.timezone_offset_minutes(), 480);
        assert_eq!(channel.timezone_offset_minutes(), 480);
        assert_eq!(commands.lock().unwrap().len(), 4);
    }

    #[test]
    fn timezone_offset_malformed_reply_is_cached_as_utc() {
        let connector = ScriptedConnector::new(vec![Ok("CEST\n".into()), Ok("+0800\n".into())]);
        let commands = connector.commands.clone();
        let mut channel = CommandChannel::with_retry(Box::new(connector), fast_retry());
        channel.connect();

        assert_eq!(channel.timezone_offset_minutes(), 0);
        assert_eq!(channel.timezone_offset_minutes(), 0);
        assert_eq!(commands.lock().unwrap().len(), 1);
    }

    #[test]
    fn parse_timezone_offset_signs() {
        assert_eq!(parse_timezone_offset("+0800"), Some(480));
        assert_eq!(parse_timezone_offset("-0530"), Some(-330));
        assert_eq!(parse_timezone_offset("+0000"), Some(0));
        assert_eq!(parse_timezone_offset(" +0545\n"), Some(345));
    }

    #[test]
    fn parse_timezone_offset_rejects_garbage() {
        assert_eq!(parse_timezone_offset("UTC"), None);
        assert_eq!(parse_timezone_offset("0800"), None);
        assert_eq!(parse_timezone_offset("+08:00"), None);
        assert_eq!(parse_timezone_offset("+0a00"), None);
        assert_eq!(parse_timezone_offset(""), None);
    }
}
