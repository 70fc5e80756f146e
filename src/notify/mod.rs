pub mod log;

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use crate::types::Match;

pub use log::LogNotifier;

/// Receives the matches of one run. Rendering and delivery live behind this.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, matches: &[Match]) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Fan out to every registered notifier. One failing sink doesn't stop the rest.
#[derive(Default)]
pub struct NotifierMux {
    sinks: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl Notifier + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Returns how many sinks accepted the batch.
    pub async fn send_all(&self, matches: &[Match]) -> usize {
        let mut ok = 0;
        for sink in &self.sinks {
            match sink.send(matches).await {
                Ok(()) => ok += 1,
                Err(e) => warn!(notifier = sink.name(), error = %e, "notifier failed"),
            }
        }
        ok
    }
}
