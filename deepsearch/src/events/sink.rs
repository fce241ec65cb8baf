//! Event sink trait and implementations.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use super::PipelineEvent;
use crate::cancellation::CancellationToken;

/// Returned when the consumer of the event stream has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("event stream closed by consumer")]
pub struct StreamClosed;

/// Destination of the events produced by a pipeline run.
///
/// Only one task writes to a sink at a time; the sink preserves the order in
/// which events are emitted.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits one event.
    ///
    /// # Errors
    ///
    /// Returns [`StreamClosed`] if the consumer is gone. The event is dropped.
    async fn emit(&self, event: PipelineEvent) -> Result<(), StreamClosed>;
}

/// Production sink: forwards events over an unbounded channel to the
/// response body.
///
/// A failed send trips the run's cancellation token. [`Self::closed`] lets the
/// owner of the run notice a departed consumer between emits.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<PipelineEvent>,
    cancel_token: Arc<CancellationToken>,
}

impl ChannelEventSink {
    /// Creates a sink and the receiving half of its channel.
    #[must_use]
    pub fn new(
        cancel_token: Arc<CancellationToken>,
    ) -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, cancel_token }, rx)
    }

    /// Resolves once the receiving half has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn emit(&self, event: PipelineEvent) -> Result<(), StreamClosed> {
        let tag = event.tag();
        if self.tx.send(event).is_err() {
            self.cancel_token.cancel("client disconnected");
            return Err(StreamClosed);
        }
        debug!(event_type = tag, "Event emitted");
        Ok(())
    }
}

/// A collecting event sink for testing purposes.
///
/// Optionally simulates a client disconnect after a fixed number of events.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<PipelineEvent>>,
    close_after: Option<usize>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink that accepts `count` events and then reports itself closed.
    #[must_use]
    pub fn closing_after(count: usize) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            close_after: Some(count),
        }
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().clone()
    }

    /// Returns the wire tags of all collected events, in order.
    #[must_use]
    pub fn tags(&self) -> Vec<&'static str> {
        self.events.read().iter().map(PipelineEvent::tag).collect()
    }

    /// Returns the number of collected events with the given tag.
    #[must_use]
    pub fn count_of(&self, tag: &str) -> usize {
        self.events.read().iter().filter(|e| e.tag() == tag).count()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event: PipelineEvent) -> Result<(), StreamClosed> {
        let mut events = self.events.write();
        if self.close_after.is_some_and(|limit| events.len() >= limit) {
            return Err(StreamClosed);
        }
        events.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_preserves_order() {
        let token = Arc::new(CancellationToken::new());
        let (sink, mut rx) = ChannelEventSink::new(token);

        sink.emit(PipelineEvent::status("one")).await.unwrap();
        sink.emit(PipelineEvent::ai_response("two")).await.unwrap();
        drop(sink);

        assert_eq!(rx.recv().await, Some(PipelineEvent::status("one")));
        assert_eq!(rx.recv().await, Some(PipelineEvent::ai_response("two")));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_channel_sink_cancels_run_on_disconnect() {
        let token = Arc::new(CancellationToken::new());
        let (sink, rx) = ChannelEventSink::new(token.clone());
        drop(rx);

        tokio::time::timeout(std::time::Duration::from_secs(1), sink.closed())
            .await
            .unwrap();
        let result = sink.emit(PipelineEvent::status("lost")).await;
        assert_eq!(result, Err(StreamClosed));
        assert!(token.is_cancelled());
        assert_eq!(token.reason().as_deref(), Some("client disconnected"));
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit(PipelineEvent::status("a")).await.unwrap();
        sink.emit(PipelineEvent::url_processed("b")).await.unwrap();
        sink.emit(PipelineEvent::url_processed("c")).await.unwrap();

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.count_of("url_processed"), 2);
        assert_eq!(sink.tags(), vec!["processing_status", "url_processed", "url_processed"]);
    }

    #[tokio::test]
    async fn test_collecting_sink_closing_after() {
        let sink = CollectingEventSink::closing_after(1);
        assert!(sink.emit(PipelineEvent::status("a")).await.is_ok());
        assert_eq!(sink.emit(PipelineEvent::status("b")).await, Err(StreamClosed));
        assert_eq!(sink.len(), 1);
    }
}
