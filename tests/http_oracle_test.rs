use anyhow::Result;
use chrono::NaiveDate;
use famcal::config::toml_config::OracleConfig;
use famcal::domain::model::{Category, ImagePayload, RawContent, RequestContext};
use famcal::domain::ports::{ClassificationOracle, OraclePrompt};
use famcal::{
    ContentPipeline, FallbackClassifier, HttpOracle, IngestEngine, JsonRecordStore, LocalStorage,
    OracleClassifier, PipelineOptions, RuleBasedClassifier,
};
use httpmock::prelude::*;
use std::collections::HashMap;
use tempfile::TempDir;

const COMPLETIONS_PATH: &str = "/v1/chat/completions";

fn chat_reply(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-1",
        "model": "test-model",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

fn store(dir: &TempDir) -> JsonRecordStore<LocalStorage> {
    JsonRecordStore::new(LocalStorage::new(dir.path().to_string_lossy().to_string()))
}

fn options() -> PipelineOptions {
    PipelineOptions::default().with_reference_date(NaiveDate::from_ymd_opt(2025, 9, 1).unwrap())
}

#[tokio::test]
async fn test_oracle_reply_flows_into_created_event() -> Result<()> {
    let server = MockServer::start();
    let reply = "Here is what I found:\n```json\n{\"hasEvents\": true, \"events\": [{\"title\": \"Picture Day\", \
                 \"startDate\": \"2025-09-12\", \"category\": \"school event\", \"startTime\": \"8:15 AM\"}], \
                 \"analysis\": \"One school event\"}\n```";

    let api_mock = server.mock(|when, then| {
        when.method(POST)
            .path(COMPLETIONS_PATH)
            .header("authorization", "Bearer sk-test")
            .body_contains("\"model\":\"test-model\"")
            .body_contains("Picture day is September 12, 2025")
            .body_contains("Today's date is 2025-09-01");
        then.status(200).json_body(chat_reply(reply));
    });

    let oracle = HttpOracle::new(server.url(COMPLETIONS_PATH), "test-model").with_api_key("sk-test");
    let dir = TempDir::new()?;
    let engine = IngestEngine::new(ContentPipeline::new(
        store(&dir),
        OracleClassifier::new(oracle),
        options(),
    ));

    let result = engine
        .run(
            &RequestContext::new(1, vec![]),
            &RawContent::html("<div>Picture day is <b>September 12, 2025</b></div>"),
        )
        .await?;

    api_mock.assert();
    assert_eq!(result.events_created, 1);
    let event = &result.events[0].event;
    assert_eq!(event.title, "Picture Day");
    assert_eq!(event.category, Category::SchoolEvent);
    assert_eq!(event.color, "#4285F4");
    assert_eq!(event.start_time_label().as_deref(), Some("08:15"));
    assert_eq!(result.analysis, "One school event");

    Ok(())
}

#[tokio::test]
async fn test_oracle_http_error_is_not_fatal() -> Result<()> {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(POST).path(COMPLETIONS_PATH);
        then.status(500).body("upstream exploded");
    });

    let dir = TempDir::new()?;
    let engine = IngestEngine::new(ContentPipeline::new(
        store(&dir),
        OracleClassifier::new(HttpOracle::new(server.url(COMPLETIONS_PATH), "test-model")),
        options(),
    ));

    let result = engine
        .run(
            &RequestContext::new(1, vec![]),
            &RawContent::text("Field trip on 09/20/2025"),
        )
        .await?;

    api_mock.assert();
    assert!(!result.has_events);
    assert_eq!(result.events_created, 0);
    assert!(result.analysis.contains("500"));

    Ok(())
}

#[tokio::test]
async fn test_fallback_to_rules_when_oracle_reply_is_garbage() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(COMPLETIONS_PATH);
        then.status(200)
            .json_body(chat_reply("Sorry, I cannot help with that."));
    });

    let dir = TempDir::new()?;
    let classifier = FallbackClassifier::new(
        OracleClassifier::new(HttpOracle::new(server.url(COMPLETIONS_PATH), "test-model")),
        RuleBasedClassifier::new(),
    );
    let engine = IngestEngine::new(ContentPipeline::new(store(&dir), classifier, options()));

    let result = engine
        .run(
            &RequestContext::new(1, vec![]),
            &RawContent::text("Field trip on 09/20/2025"),
        )
        .await?;

    assert_eq!(result.events_created, 1);
    assert_eq!(result.events[0].event.category, Category::SchoolEvent);
    assert!(result.analysis.contains("JSON object"));

    Ok(())
}

#[tokio::test]
async fn test_configured_headers_and_image_data_url() -> Result<()> {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(POST)
            .path(COMPLETIONS_PATH)
            .header("x-household", "smith")
            .body_contains("data:image/png;base64,aW1n")
            .body_contains("\"role\":\"system\"");
        then.status(200)
            .json_body(chat_reply("{\"hasEvents\": false, \"events\": [], \"analysis\": \"blank flyer\"}"));
    });

    let config = OracleConfig {
        endpoint: server.url(COMPLETIONS_PATH),
        model: "vision".to_string(),
        api_key: None,
        timeout_seconds: Some(5),
        headers: Some(HashMap::from([(
            "X-Household".to_string(),
            "smith".to_string(),
        )])),
    };
    let oracle = HttpOracle::from_config(&config)?;

    let reply = oracle
        .complete(&OraclePrompt {
            instructions: "extract events".to_string(),
            text: "see flyer".to_string(),
            image: Some(famcal::domain::ports::OracleImage {
                mime_type: "image/png".to_string(),
                base64_data: "aW1n".to_string(),
            }),
        })
        .await?;

    api_mock.assert();
    assert!(reply.contains("blank flyer"));

    // 透過分類器時圖片會自動轉成 base64
    let dir = TempDir::new()?;
    let engine = IngestEngine::new(ContentPipeline::new(
        store(&dir),
        OracleClassifier::new(HttpOracle::from_config(&config)?),
        options(),
    ));
    let photo = RawContent::photo(
        Some(ImagePayload {
            bytes: b"img".to_vec(),
            mime_type: "image/png".to_string(),
        }),
        "",
    );
    let result = engine.run(&RequestContext::new(1, vec![]), &photo).await?;
    assert!(!result.has_events);
    assert_eq!(result.analysis, "blank flyer");

    Ok(())
}

#[tokio::test]
async fn test_reply_without_choices_is_an_error() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(COMPLETIONS_PATH);
        then.status(200).json_body(serde_json::json!({ "choices": [] }));
    });

    let oracle = HttpOracle::new(server.url(COMPLETIONS_PATH), "test-model");
    let result = oracle
        .complete(&OraclePrompt {
            instructions: String::new(),
            text: "hello".to_string(),
            image: None,
        })
        .await;

    assert!(result.is_err());
    Ok(())
}
