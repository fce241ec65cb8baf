//! Sequences one request through search, selection, retrieval and answer
//! streaming, and multiplexes everything into a single ordered event stream.

use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use super::prompt::{build_snippet_message, build_user_message};
use super::run_config::RunConfig;
use super::selector::UrlSelector;
use super::state::PipelineState;
use crate::cancellation::CancellationToken;
use crate::config::StageTimeouts;
use crate::errors::{DeepSearchError, Result};
use crate::events::{
    ChannelEventSink, EventSink, InitialResponse, PipelineEvent, StreamClosed, STATUS_FETCHING,
    STATUS_GENERATING, STATUS_SELECTING,
};
use crate::observability::{SpanTimer, StageTimings};
use crate::providers::{CompletionClient, CompletionRequest, SearchClient};
use crate::websearch::{extract_urls, merge_selection, CandidateSet, ConcurrentRetriever};

/// Why a run stopped before reaching `Done`.
#[derive(Debug)]
enum Halt {
    /// The consumer went away; nothing more is emitted.
    Disconnected,
    /// A stage failed; reported with one `error` event.
    Failed(DeepSearchError),
}

impl From<StreamClosed> for Halt {
    fn from(_: StreamClosed) -> Self {
        Self::Disconnected
    }
}

impl From<DeepSearchError> for Halt {
    fn from(err: DeepSearchError) -> Self {
        Self::Failed(err)
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Correlation ID logged on every line of the run.
    pub run_id: Uuid,
    /// Final state: `Done` or `Error`. A disconnected run keeps the state it
    /// was in when the consumer left.
    pub state: PipelineState,
    /// Stage durations.
    pub timings: StageTimings,
    /// Whether the consumer disconnected.
    pub disconnected: bool,
}

/// Runs the state machine for one query at a time; shareable across requests.
#[derive(Clone)]
pub struct PipelineOrchestrator {
    search: Arc<dyn SearchClient>,
    completion: Arc<dyn CompletionClient>,
    selector: UrlSelector,
    retriever: ConcurrentRetriever,
    system_prompt: Arc<str>,
    market: String,
    timeouts: StageTimeouts,
    run_config: RunConfig,
}

impl PipelineOrchestrator {
    /// Creates an orchestrator with default market, timeouts and run config.
    pub fn new(
        search: Arc<dyn SearchClient>,
        completion: Arc<dyn CompletionClient>,
        retriever: ConcurrentRetriever,
        system_prompt: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            search,
            selector: UrlSelector::new(Arc::clone(&completion)),
            completion,
            retriever,
            system_prompt: system_prompt.into(),
            market: "en-US".to_string(),
            timeouts: StageTimeouts::default(),
            run_config: RunConfig::default(),
        }
    }

    /// Sets the search market.
    #[must_use]
    pub fn with_market(mut self, market: impl Into<String>) -> Self {
        self.market = market.into();
        self
    }

    /// Sets the stage time budgets.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Sets the run configuration used by [`Self::spawn`].
    #[must_use]
    pub fn with_run_config(mut self, run_config: RunConfig) -> Self {
        self.run_config = run_config;
        self
    }

    /// Starts a run on its own task and returns the receiving end of its
    /// event stream.
    ///
    /// Dropping the receiver cancels the run right away: pending fetches are
    /// aborted and an open answer stream is dropped.
    pub fn spawn(
        self: &Arc<Self>,
        query: impl Into<String>,
    ) -> (mpsc::UnboundedReceiver<PipelineEvent>, JoinHandle<RunReport>) {
        let token = Arc::new(CancellationToken::new());
        let (sink, rx) = ChannelEventSink::new(Arc::clone(&token));
        let this = Arc::clone(self);
        let query = query.into();
        let handle = tokio::spawn(async move {
            let config = this.run_config.clone();
            let run = this.run(&query, &config, &sink, &token);
            tokio::pin!(run);
            tokio::select! {
                biased;
                report = &mut run => report,
                () = sink.closed() => {
                    token.cancel("client disconnected");
                    run.await
                }
            }
        });
        (rx, handle)
    }

    /// Executes one run, writing every event to `sink`.
    ///
    /// Never fails: a stage error becomes a single `error` event and a
    /// disconnect ends the run silently.
    pub async fn run(
        &self,
        query: &str,
        config: &RunConfig,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> RunReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", run_id = %run_id);
        async {
            info!(query = %query, "Received query");
            let mut state = PipelineState::Searching;
            let mut timings = StageTimings::default();

            let result = self
                .drive(query, config, sink, cancel, &mut state, &mut timings)
                .await;

            let disconnected = match result {
                Ok(()) => false,
                Err(Halt::Disconnected) => {
                    info!(state = %state, "Client disconnected, run abandoned");
                    true
                }
                Err(Halt::Failed(err)) => {
                    error!(state = %state, error = %err, kind = err.kind(), "Pipeline run failed");
                    advance(&mut state, PipelineState::Error);
                    let message = format!("An error occurred: {err}");
                    // A consumer that left meanwhile cannot see the error either.
                    let _ = sink.emit(PipelineEvent::error(message)).await;
                    false
                }
            };

            info!(
                state = %state,
                search_ms = timings.search_ms,
                selection_ms = timings.selection_ms,
                retrieval_ms = timings.retrieval_ms,
                prompt_ms = timings.prompt_ms,
                generation_ms = timings.generation_ms,
                total_ms = timings.total_ms(),
                "Run finished"
            );
            RunReport {
                run_id,
                state,
                timings,
                disconnected,
            }
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        query: &str,
        config: &RunConfig,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
        state: &mut PipelineState,
        timings: &mut StageTimings,
    ) -> std::result::Result<(), Halt> {
        config.validate()?;
        self.timeouts.validate()?;

        let timer = SpanTimer::start("search");
        let raw = unless_cancelled(
            cancel,
            within(
                self.timeouts.search(),
                DeepSearchError::Search,
                "search",
                self.search
                    .search(query, config.initial_search_results, &self.market),
            ),
        )
        .await?;
        timings.search_ms = Some(timer.finish());

        sink.emit(PipelineEvent::InitialResponse(InitialResponse {
            user_query: query.to_string(),
            search_results: raw.clone(),
            headers: config.headers(),
        }))
        .await?;

        let candidates = extract_urls(&raw);
        debug!(candidates = candidates.len(), "Search results flattened");

        let user_message = if config.deep_search {
            advance(state, PipelineState::Selecting);
            sink.emit(PipelineEvent::status(STATUS_SELECTING)).await?;

            let timer = SpanTimer::start("selection");
            let choices = unless_cancelled(
                cancel,
                within(
                    self.timeouts.selection(),
                    DeepSearchError::Selection,
                    "selection",
                    self.selector.select(
                        query,
                        &candidates,
                        &config.deep_search_model,
                        config.max_tokens,
                        config.deep_search_quantity,
                    ),
                ),
            )
            .await?;
            timings.selection_ms = Some(timer.finish());

            let mut selected = merge_selection(choices, &CandidateSet::from_results(&candidates));
            selected.truncate(config.deep_search_quantity);

            advance(state, PipelineState::Fetching);
            sink.emit(PipelineEvent::status(STATUS_FETCHING)).await?;

            let outcome = self.retriever.retrieve(&selected, sink, cancel).await;
            if outcome.cancelled {
                return Err(Halt::Disconnected);
            }
            timings.retrieval_ms = Some(outcome.aggregate_duration() * 1000.0);

            if config.report_fetch_failures && outcome.failed > 0 {
                let status = format!(
                    "{} of {} pages could not be loaded",
                    outcome.failed,
                    outcome.attempted()
                );
                sink.emit(PipelineEvent::status(status)).await?;
            }

            if config.context_only {
                advance(state, PipelineState::Done);
                return Ok(());
            }

            let timer = SpanTimer::start("prompt");
            let message = build_user_message(query, &outcome.contents);
            timings.prompt_ms = Some(timer.finish());
            message
        } else {
            if config.context_only {
                advance(state, PipelineState::Done);
                return Ok(());
            }
            let timer = SpanTimer::start("prompt");
            let message = build_snippet_message(query, &candidates);
            timings.prompt_ms = Some(timer.finish());
            message
        };

        advance(state, PipelineState::Generating);
        sink.emit(PipelineEvent::status(STATUS_GENERATING)).await?;

        let timer = SpanTimer::start("generation");
        let request = CompletionRequest::new(
            self.system_prompt.as_ref(),
            user_message,
            &config.set_model,
            config.max_tokens,
        );
        let mut fragments = unless_cancelled(
            cancel,
            within(
                self.timeouts.completion_start(),
                DeepSearchError::Completion,
                "completion start",
                self.completion.complete_stream(request),
            ),
        )
        .await?;

        let idle = self.timeouts.fragment_idle();
        let mut emitted = 0usize;
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Halt::Disconnected),
                next = tokio::time::timeout(idle, fragments.next()) => next,
            };
            match next {
                Err(_) => {
                    return Err(Halt::Failed(DeepSearchError::Completion(
                        timeout_error("completion stream", idle).to_string(),
                    )));
                }
                Ok(None) => break,
                Ok(Some(Err(err))) => return Err(Halt::Failed(err)),
                Ok(Some(Ok(fragment))) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    sink.emit(PipelineEvent::ai_response(fragment)).await?;
                    emitted += 1;
                }
            }
        }
        timings.generation_ms = Some(timer.finish());
        debug!(fragments = emitted, "Answer stream exhausted");

        advance(state, PipelineState::Done);
        Ok(())
    }
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("retriever", &self.retriever)
            .field("market", &self.market)
            .field("timeouts", &self.timeouts)
            .field("run_config", &self.run_config)
            .finish_non_exhaustive()
    }
}

fn advance(state: &mut PipelineState, next: PipelineState) {
    debug_assert!(
        state.can_transition_to(next),
        "illegal transition {state} -> {next}"
    );
    debug!(from = %state, to = %next, "State transition");
    *state = next;
}

fn timeout_error(stage: &'static str, budget: Duration) -> DeepSearchError {
    DeepSearchError::Timeout {
        stage,
        seconds: budget.as_secs_f64(),
    }
}

/// Awaits `fut` for at most `budget`; an overrun becomes the stage's own
/// error kind built by `as_stage_error`.
async fn within<T>(
    budget: Duration,
    as_stage_error: fn(String) -> DeepSearchError,
    stage: &'static str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(budget, fut).await {
        Ok(result) => result,
        Err(_) => Err(as_stage_error(timeout_error(stage, budget).to_string())),
    }
}

/// Drops `fut` as soon as `cancel` fires.
async fn unless_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> std::result::Result<T, Halt> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Halt::Disconnected),
        result = fut => result.map_err(Halt::from),
    }
}
