//! One scrape cycle: connect, preread, run parsers, render.

use std::time::Instant;

use tracing::debug;

use crate::channel::CommandChannel;
use crate::exposition::Exposition;
use crate::parsers::Parser;
use crate::preread::{PrereadCache, SourceRegistry};
use crate::reader::RemoteReader;

/// Owns all per-process collection state.
///
/// Not `Sync`; callers serialize access to [`collect`](Self::collect).
pub struct NodeCollector {
    channel: CommandChannel,
    cache: PrereadCache,
    exposition: Exposition,
    parsers: Vec<Parser>,
}

impl NodeCollector {
    /// `extra` parsers run after the defaults; duplicates are ignored.
    pub fn new(channel: CommandChannel, registry: SourceRegistry, extra: &[Parser]) -> Self {
        let mut parsers = Parser::DEFAULT_ORDER.to_vec();
        for parser in extra {
            if !parsers.contains(parser) {
                parsers.push(*parser);
            }
        }
        Self {
            channel,
            cache: PrereadCache::new(registry),
            exposition: Exposition::new(),
            parsers,
        }
    }

    pub fn parsers(&self) -> &[Parser] {
        &self.parsers
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    /// Run one collection and return the exposition text.
    ///
    /// Never fails: unreachable hosts and unreadable sources only shrink
    /// the output.
    pub fn collect(&mut self) -> String {
        let started = Instant::now();
        self.exposition.reset();

        if !self.channel.is_connected() {
            self.channel.connect();
        }
        self.cache.build(&mut self.channel);

        let mut reader = RemoteReader::new(&mut self.channel, &self.cache);
        for parser in &self.parsers {
            if let Err(e) = parser.run(&mut reader, &mut self.exposition) {
                debug!("{parser} skipped: {e}");
            }
        }

        debug!(
            "Collected {} metric families in {:?}",
            self.exposition.family_count(),
            started.elapsed()
        );
        self.exposition.render()
    }
}
