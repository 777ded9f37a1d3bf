//! Uniform access to remote statistics sources.

use crate::channel::CommandChannel;
use crate::preread::PrereadCache;

/// What a parser may ask of the monitored host.
///
/// Every method degrades to empty output (or a zero offset) rather than
/// failing.
pub trait Source {
    /// Contents of the file at `path`.
    fn read(&mut self, path: &str) -> String;

    /// Stdout of `command`.
    fn exec(&mut self, command: &str) -> String;

    /// Remote UTC offset in minutes.
    fn timezone_offset_minutes(&mut self) -> i64;

    /// Textfile snippets collected by the batched read, in path order.
    fn textfiles(&self) -> Vec<(String, String)>;
}

/// [`Source`] backed by the preread cache, falling back to the channel.
pub struct RemoteReader<'a> {
    channel: &'a mut CommandChannel,
    cache: &'a PrereadCache,
}

impl<'a> RemoteReader<'a> {
    pub fn new(channel: &'a mut CommandChannel, cache: &'a PrereadCache) -> Self {
        Self { channel, cache }
    }
}

impl Source for RemoteReader<'_> {
    fn read(&mut self, path: &str) -> String {
        if self.cache.is_known(path) {
            self.cache.get(path).to_string()
        } else {
            self.channel.exec(&format!("cat {path}"))
        }
    }

    fn exec(&mut self, command: &str) -> String {
        self.channel.exec(command)
    }

    fn timezone_offset_minutes(&mut self) -> i64 {
        self.channel.timezone_offset_minutes()
    }

    fn textfiles(&self) -> Vec<(String, String)> {
        self.cache
            .textfiles()
            .into_iter()
            .map(|(path, text)| (path.to_string(), text.to_string()))
            .collect()
    }
}
