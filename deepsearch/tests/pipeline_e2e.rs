//! End-to-end runs against mock search, completion and web servers.

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use deepsearch::prelude::*;
use deepsearch::providers::{BingConfig, BingSearchClient, OpenAiClient, OpenAiConfig};
use deepsearch::websearch::HttpPageFetcher;

struct Harness {
    search: MockServer,
    llm: MockServer,
    web: MockServer,
}

impl Harness {
    async fn start() -> Self {
        Self {
            search: MockServer::start().await,
            llm: MockServer::start().await,
            web: MockServer::start().await,
        }
    }

    fn page_url(&self, name: &str) -> String {
        format!("{}/{name}", self.web.uri())
    }

    fn pipeline(&self) -> PipelineOrchestrator {
        let http = reqwest::Client::new();
        let bing = BingSearchClient::new(
            http.clone(),
            BingConfig::new("key", "cfg").with_endpoint(format!("{}/search", self.search.uri())),
        );
        let openai = OpenAiClient::new(
            http,
            OpenAiConfig::new("sk").with_base_url(format!("{}/v1", self.llm.uri())),
        );
        let fetch = FetchConfig::default().with_timeout(0.3);
        let fetcher = HttpPageFetcher::new(&fetch).unwrap();
        PipelineOrchestrator::new(
            Arc::new(bing),
            Arc::new(openai),
            ConcurrentRetriever::new(Arc::new(fetcher), fetch),
            "Answer using the context.",
        )
    }

    async fn mount_search(&self, pages: &[&str]) {
        let hits: Vec<_> = pages
            .iter()
            .map(|p| json!({"url": self.page_url(p), "name": format!("Title {p}"), "snippet": "s"}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"webPages": {"value": hits}})))
            .mount(&self.search)
            .await;
    }

    async fn mount_selection(&self, pages: &[&str]) {
        let choices: Vec<_> = pages
            .iter()
            .map(|p| json!({"url": self.page_url(p), "reason": "relevant"}))
            .collect();
        let content = json!({ "selected_urls": choices }).to_string();
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": content}}]
            })))
            .mount(&self.llm)
            .await;
    }

    async fn mount_answer(&self, fragments: &[&str]) {
        let mut sse = String::new();
        for fragment in fragments {
            let chunk = json!({"choices": [{"delta": {"content": fragment}}]});
            sse.push_str(&format!("data: {chunk}\n\n"));
        }
        sse.push_str("data: [DONE]\n\n");
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse),
            )
            .mount(&self.llm)
            .await;
    }

    async fn mount_page(&self, name: &str, html: &str, delay: Duration) {
        Mock::given(method("GET"))
            .and(path(format!("/{name}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(html)
                    .set_delay(delay),
            )
            .mount(&self.web)
            .await;
    }
}

#[tokio::test]
async fn test_weather_query_with_one_slow_page() {
    let h = Harness::start().await;
    h.mount_search(&["a", "b", "c", "d", "e"]).await;
    h.mount_selection(&["a", "b", "c"]).await;
    h.mount_answer(&["It is ", "sunny."]).await;
    h.mount_page("a", "<body><nav>menu</nav><p>Sunny, 24C</p></body>", Duration::ZERO)
        .await;
    h.mount_page("b", "<body><p>Clear skies</p></body>", Duration::ZERO)
        .await;
    h.mount_page("c", "<body><p>late</p></body>", Duration::from_secs(3))
        .await;

    let sink = CollectingEventSink::new();
    let report = h
        .pipeline()
        .run("weather today", &RunConfig::default(), &sink, &CancellationToken::new())
        .await;

    assert_eq!(report.state, PipelineState::Done);
    assert_eq!(sink.count_of("initial_response"), 1);
    assert_eq!(sink.count_of("processing_status"), 3);
    assert_eq!(sink.count_of("url_processed"), 2);
    assert_eq!(sink.count_of("ai_response"), 2);
    assert_eq!(sink.count_of("error"), 0);

    let events = sink.events();
    let PipelineEvent::InitialResponse(initial) = &events[0] else {
        panic!("first event must be initial_response");
    };
    assert_eq!(initial.user_query, "weather today");
    assert_eq!(initial.headers, RunConfig::default().headers());
    assert_eq!(
        initial.search_results["webPages"]["value"]
            .as_array()
            .map(Vec::len),
        Some(5)
    );

    let tags = sink.tags();
    let fetching = tags.iter().position(|t| *t == "processing_status").unwrap() + 1;
    assert_eq!(&tags[fetching..fetching + 3], ["processing_status", "url_processed", "url_processed"]);
    assert_eq!(
        &events[events.len() - 2..],
        [PipelineEvent::ai_response("It is "), PipelineEvent::ai_response("sunny.")]
    );
}

#[tokio::test]
async fn test_search_outage_yields_exactly_one_error() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&h.search)
        .await;

    let sink = CollectingEventSink::new();
    let report = h
        .pipeline()
        .run("weather today", &RunConfig::default(), &sink, &CancellationToken::new())
        .await;

    assert_eq!(report.state, PipelineState::Error);
    assert_eq!(sink.len(), 1);
    let PipelineEvent::Error { message } = &sink.events()[0] else {
        panic!("expected error event");
    };
    assert!(message.starts_with("An error occurred: Search failed"));
}

#[tokio::test]
async fn test_context_only_run_never_calls_answer_model() {
    let h = Harness::start().await;
    h.mount_search(&["a", "b"]).await;
    h.mount_selection(&["a", "b"]).await;
    h.mount_page("a", "<body><p>one</p></body>", Duration::ZERO).await;
    h.mount_page("b", "<body><p>two</p></body>", Duration::ZERO).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&h.llm)
        .await;

    let sink = CollectingEventSink::new();
    h.pipeline()
        .run(
            "q",
            &RunConfig::default().with_context_only(true),
            &sink,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(sink.count_of("ai_response"), 0);
    assert_eq!(sink.count_of("error"), 0);
    assert_eq!(sink.count_of("url_processed"), 2);
    assert_eq!(sink.count_of("processing_status"), 2);
}

#[tokio::test]
async fn test_selector_may_pick_unknown_urls() {
    let h = Harness::start().await;
    h.mount_search(&["a"]).await;
    h.mount_selection(&["a", "elsewhere"]).await;
    h.mount_answer(&["ok"]).await;
    h.mount_page("a", "<body><p>known</p></body>", Duration::ZERO).await;
    h.mount_page("elsewhere", "<body><p>unlisted</p></body>", Duration::ZERO)
        .await;

    let sink = CollectingEventSink::new();
    h.pipeline()
        .run("q", &RunConfig::default(), &sink, &CancellationToken::new())
        .await;

    let mut titles: Vec<String> = sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            PipelineEvent::UrlProcessed { url } => Some(url),
            _ => None,
        })
        .collect();
    titles.sort();
    assert_eq!(titles, vec!["No title provided".to_string(), "Title a".to_string()]);
}

#[tokio::test]
async fn test_dropped_receiver_stops_spawned_run() {
    let h = Harness::start().await;
    h.mount_search(&["a"]).await;
    h.mount_selection(&["a"]).await;
    h.mount_answer(&["never seen"]).await;
    h.mount_page("a", "<body><p>slow</p></body>", Duration::from_millis(200))
        .await;

    let pipeline = Arc::new(h.pipeline());
    let (mut rx, handle) = pipeline.spawn("q");
    let first = rx.recv().await.unwrap();
    assert_eq!(first.tag(), "initial_response");
    drop(rx);

    let report = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(report.disconnected);
    assert_ne!(report.state, PipelineState::Done);
}
