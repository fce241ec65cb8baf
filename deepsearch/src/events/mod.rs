//! Outbound event stream.
//!
//! Every pipeline run produces an ordered sequence of [`PipelineEvent`]s that
//! is written, one JSON object per line, to the HTTP response body.

mod event;
mod sink;

pub use event::{
    InitialResponse, PipelineEvent, STATUS_FETCHING, STATUS_GENERATING, STATUS_SELECTING,
};
pub use sink::{ChannelEventSink, CollectingEventSink, EventSink, StreamClosed};
