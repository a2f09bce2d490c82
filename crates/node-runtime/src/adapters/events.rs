//! Job exchange notifications delivered over a channel.

use cn_03_job_exchange::{JobEventSink, JobExchangeEvent};
use tokio::sync::mpsc;
use tracing::debug;

/// Forwards every event to the runtime loop.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<JobExchangeEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::UnboundedSender<JobExchangeEvent>) -> Self {
        Self { tx }
    }
}

impl JobEventSink for ChannelEventSink {
    fn publish(&self, event: JobExchangeEvent) {
        if let Err(e) = self.tx.send(event) {
            debug!(event = ?e.0, "Runtime gone, dropping job event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_receiver() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        ChannelEventSink::new(tx).publish(JobExchangeEvent::TrustChanged);
        assert!(matches!(rx.recv().await, Some(JobExchangeEvent::TrustChanged)));
    }

    #[test]
    fn test_publish_after_receiver_dropped_is_silent() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        ChannelEventSink::new(tx).publish(JobExchangeEvent::TrustChanged);
    }
}
