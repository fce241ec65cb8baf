//! OpenAI-compatible chat completions client.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::pin::Pin;
use tracing::debug;

use super::sse::{SseEvent, SseLineParser};
use super::{CompletionClient, CompletionRequest, FragmentStream};
use crate::errors::{DeepSearchError, Result};

/// Connection settings for an OpenAI-compatible API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Base URL including the version segment.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token.
    #[serde(default)]
    pub api_key: String,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
        }
    }
}

impl OpenAiConfig {
    /// Creates a configuration for the public API.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Overrides the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// [`CompletionClient`] speaking the `/chat/completions` wire format.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    /// Creates a client sharing the given `reqwest` client.
    #[must_use]
    pub fn new(client: reqwest::Client, config: OpenAiConfig) -> Self {
        Self { client, config }
    }

    async fn post(&self, body: &serde_json::Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| DeepSearchError::Completion(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeepSearchError::Completion(format!(
                "HTTP {status}: {}",
                error_message(&body)
            )));
        }
        Ok(response)
    }
}

/// Builds the JSON body for a chat completion call.
#[must_use]
pub fn build_request_body(request: &CompletionRequest, stream: bool) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": request.model,
        "max_tokens": request.max_tokens,
        "messages": [
            {"role": "system", "content": request.system},
            {"role": "user", "content": request.user},
        ],
        "stream": stream,
    });
    if request.json_mode {
        body["response_format"] = serde_json::json!({"type": "json_object"});
    }
    body
}

/// Pulls `error.message` out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let body = build_request_body(&request, false);
        let response = self.post(&body).await?;
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DeepSearchError::Completion(format!("invalid response body: {e}")))?;

        if let Some(usage) = payload.get("usage") {
            debug!(
                model = %request.model,
                prompt_tokens = usage["prompt_tokens"].as_u64(),
                completion_tokens = usage["completion_tokens"].as_u64(),
                "Completion token usage"
            );
        }

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| DeepSearchError::Completion("response has no message content".into()))
    }

    async fn complete_stream(&self, request: CompletionRequest) -> Result<FragmentStream> {
        let body = build_request_body(&request, true);
        let response = self.post(&body).await?;
        Ok(Box::pin(fragment_stream(response.bytes_stream())))
    }
}

struct StreamState {
    bytes: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    parser: SseLineParser,
    pending: VecDeque<Result<String>>,
    finished: bool,
}

impl StreamState {
    /// Queues the fragment or error carried by one SSE event.
    /// Returns `true` once the stream signalled its end.
    fn absorb(&mut self, event: &SseEvent) -> bool {
        if event.is_done() {
            return true;
        }
        match serde_json::from_str::<serde_json::Value>(&event.data) {
            Ok(chunk) => {
                if let Some(message) = chunk["error"]["message"].as_str() {
                    self.pending
                        .push_back(Err(DeepSearchError::Completion(message.to_string())));
                    return true;
                }
                if let Some(content) = chunk["choices"][0]["delta"]["content"].as_str() {
                    if !content.is_empty() {
                        self.pending.push_back(Ok(content.to_string()));
                    }
                }
                false
            }
            Err(e) => {
                self.pending.push_back(Err(DeepSearchError::Completion(format!(
                    "malformed stream chunk: {e}"
                ))));
                true
            }
        }
    }
}

/// Turns an SSE byte stream into non-empty content fragments.
fn fragment_stream(
    bytes: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
) -> impl Stream<Item = Result<String>> + Send {
    futures::stream::unfold(
        StreamState {
            bytes: Box::pin(bytes),
            parser: SseLineParser::new(),
            pending: VecDeque::new(),
            finished: false,
        },
        |mut state| async move {
            loop {
                if let Some(item) = state.pending.pop_front() {
                    return Some((item, state));
                }
                if state.finished {
                    return None;
                }

                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        for event in state.parser.push(&chunk) {
                            if state.absorb(&event) {
                                state.finished = true;
                                break;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        state.finished = true;
                        state.pending.push_back(Err(DeepSearchError::Completion(format!(
                            "stream read error: {e}"
                        ))));
                    }
                    None => {
                        state.finished = true;
                        if let Some(event) = state.parser.flush() {
                            state.absorb(&event);
                        }
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenAiClient {
        let config = OpenAiConfig::new("sk-test").with_base_url(format!("{}/v1", server.uri()));
        OpenAiClient::new(reqwest::Client::new(), config)
    }

    fn request() -> CompletionRequest {
        CompletionRequest::new("system", "user", "gpt-4o", 100)
    }

    #[test]
    fn test_request_body_json_mode() {
        let body = build_request_body(&request().json(), false);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "user");
        assert_eq!(body["response_format"]["type"], "json_object");

        let plain = build_request_body(&request(), true);
        assert!(plain.get("response_format").is_none());
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"error": {"message": "quota"}}"#), "quota");
        assert_eq!(error_message("plain"), "plain");
    }

    #[tokio::test]
    async fn test_complete_returns_message_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o",
                "response_format": {"type": "json_object"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"selected_urls\": []}"}}],
                "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client_for(&server).complete(request().json()).await.unwrap();
        assert_eq!(text, "{\"selected_urls\": []}");
    }

    #[tokio::test]
    async fn test_complete_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(json!({"error": {"message": "rate limited"}})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).complete(request()).await.unwrap_err();
        assert!(matches!(err, DeepSearchError::Completion(ref m) if m.contains("rate limited")));
    }

    #[tokio::test]
    async fn test_complete_stream_yields_fragments_in_order() {
        let server = MockServer::start().await;
        let sse = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Sunny\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" skies\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse),
            )
            .mount(&server)
            .await;

        let stream = client_for(&server).complete_stream(request()).await.unwrap();
        let fragments: Vec<String> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(fragments, vec!["Sunny".to_string(), " skies".to_string()]);
    }

    #[tokio::test]
    async fn test_fragment_stream_reports_malformed_chunk() {
        let chunks: Vec<reqwest::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n")),
            Ok(Bytes::from_static(b"data: not json\n\n")),
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n")),
        ];
        let items: Vec<Result<String>> = fragment_stream(futures::stream::iter(chunks)).collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "a");
        assert!(matches!(items[1], Err(DeepSearchError::Completion(_))));
    }

    #[tokio::test]
    async fn test_fragment_stream_without_done_sentinel() {
        let chunks: Vec<reqwest::Result<Bytes>> = vec![Ok(Bytes::from_static(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}",
        ))];
        let items: Vec<String> = fragment_stream(futures::stream::iter(chunks))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(items, vec!["tail".to_string()]);
    }
}
