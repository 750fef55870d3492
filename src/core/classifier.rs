//! Classifier implementations behind the `EventClassifier` contract.

use crate::core::extractor::EntityExtractor;
use crate::core::normalizer;
use crate::domain::model::{Category, ContentKind, Priority};
use crate::domain::ports::{
    ClassificationOracle, ClassifyRequest, EventClassifier, OracleImage, OraclePrompt,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::NaiveDate;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// 沒有事件時的標準回覆形狀
pub fn no_events(analysis: impl Into<String>) -> Value {
    json!({
        "hasEvents": false,
        "events": [],
        "analysis": analysis.into(),
    })
}

pub fn reports_events(value: &Value) -> bool {
    let declared = value
        .get("hasEvents")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let has_items = value
        .get("events")
        .and_then(Value::as_array)
        .map(|events| !events.is_empty())
        .unwrap_or(false);
    declared && has_items
}

fn analysis_of(value: &Value) -> &str {
    value.get("analysis").and_then(Value::as_str).unwrap_or("")
}

/// 固定的指令內容：回覆格式、列舉值、今天日期與已知小孩
pub fn build_instructions(today: NaiveDate, known_children: &[String]) -> String {
    let categories = Category::ALL
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let priorities = Priority::ALL
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let children = if known_children.is_empty() {
        "none on record".to_string()
    } else {
        known_children.join(", ")
    };

    format!(
        "You extract family calendar events from school emails, flyers and notes.\n\
         Today's date is {today}. Resolve relative phrases such as \"tomorrow\" or \"next Friday\" against it.\n\
         Known children: {children}. Set childNameHint to one of these names when the content is about that child.\n\
         Reply with a single JSON object and nothing else, shaped as:\n\
         {{\"hasEvents\": boolean, \"events\": [{{\"title\": string, \"description\": string, \
         \"startDate\": \"YYYY-MM-DD\", \"endDate\": \"YYYY-MM-DD\" or null, \
         \"startTime\": \"HH:MM\" or null, \"endTime\": \"HH:MM\" or null, \"isAllDay\": boolean, \
         \"category\": one of [{categories}], \"priority\": one of [{priorities}], \
         \"hasReminder\": boolean, \"reminderMinutes\": integer or null, \
         \"childNameHint\": string or null}}], \"analysis\": string}}\n\
         Use 24-hour times. If the content has no events, reply with hasEvents false and an empty events list.",
        today = today.format("%Y-%m-%d"),
    )
}

/// 找出回覆中第一個完整的 `{...}`；會略過字串內的大括號與跳脫字元
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;

    for (offset, &byte) in text.as_bytes()[start..].iter().enumerate() {
        if escape {
            escape = false;
            continue;
        }
        if in_string {
            match byte {
                b'\\' => escape = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// 解析失敗一律轉成沒有事件的診斷結果
pub fn parse_oracle_reply(reply: &str) -> Value {
    let Some(block) = extract_json_object(reply) else {
        warn!("⚠️ Classifier reply contained no JSON object");
        return no_events("Classifier reply did not contain a JSON object");
    };

    match serde_json::from_str::<Value>(block) {
        Ok(value) if value.is_object() => value,
        Ok(_) => no_events("Classifier reply was not a JSON object"),
        Err(e) => {
            warn!("⚠️ Failed to parse classifier JSON: {}", e);
            no_events(format!("Classifier reply was not valid JSON: {}", e))
        }
    }
}

pub struct OracleClassifier<O: ClassificationOracle> {
    oracle: O,
}

impl<O: ClassificationOracle> OracleClassifier<O> {
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }

    pub fn build_prompt(&self, request: &ClassifyRequest<'_>) -> OraclePrompt {
        let image = request.content.image.as_ref().map(|image| OracleImage {
            mime_type: image.mime_type.clone(),
            base64_data: STANDARD.encode(&image.bytes),
        });

        OraclePrompt {
            instructions: build_instructions(request.reference_date, &request.known_children),
            text: normalizer::to_single_line(&normalizer::normalize_content(request.content)),
            image,
        }
    }
}

#[async_trait]
impl<O: ClassificationOracle> EventClassifier for OracleClassifier<O> {
    fn name(&self) -> &str {
        "oracle"
    }

    async fn classify(&self, request: &ClassifyRequest<'_>) -> Value {
        let prompt = self.build_prompt(request);
        debug!(
            "🔮 Sending {} chars to classification oracle (image: {})",
            prompt.text.len(),
            prompt.image.is_some()
        );

        match self.oracle.complete(&prompt).await {
            Ok(reply) => {
                debug!("📥 Oracle replied with {} chars", reply.len());
                parse_oracle_reply(&reply)
            }
            Err(e) => {
                warn!("⚠️ Classification oracle unavailable: {}", e);
                no_events(format!("Classification service unavailable: {}", e))
            }
        }
    }
}

/// 規則式分類器，不需要網路
#[derive(Debug, Clone, Default)]
pub struct RuleBasedClassifier;

impl RuleBasedClassifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventClassifier for RuleBasedClassifier {
    fn name(&self) -> &str {
        "rules"
    }

    async fn classify(&self, request: &ClassifyRequest<'_>) -> Value {
        if request.content.kind == ContentKind::Photo && !request.content.has_text() {
            return no_events("Photo content needs the classification service; no text to scan");
        }

        let text = normalizer::normalize_content(request.content);
        let extractor = EntityExtractor::new(request.reference_date)
            .with_known_children(request.known_children.clone());

        match extractor.to_candidate(&text) {
            Some(candidate) => {
                let analysis = format!(
                    "Rule-based extraction found a {} event on {}",
                    candidate.category,
                    candidate.start_date.format("%Y-%m-%d")
                );
                json!({
                    "hasEvents": true,
                    "events": [candidate],
                    "analysis": analysis,
                })
            }
            None => no_events("Rule-based extraction found no date in the content"),
        }
    }
}

/// 主要分類器沒找到事件時，改用備援分類器
pub struct FallbackClassifier<P: EventClassifier, F: EventClassifier> {
    primary: P,
    fallback: F,
    name: String,
}

impl<P: EventClassifier, F: EventClassifier> FallbackClassifier<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        let name = format!("{}+{}", primary.name(), fallback.name());
        Self {
            primary,
            fallback,
            name,
        }
    }
}

#[async_trait]
impl<P: EventClassifier, F: EventClassifier> EventClassifier for FallbackClassifier<P, F> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn classify(&self, request: &ClassifyRequest<'_>) -> Value {
        let primary = self.primary.classify(request).await;
        if reports_events(&primary) || !request.content.has_text() {
            return primary;
        }

        info!(
            "🔁 {} found no events, falling back to {}",
            self.primary.name(),
            self.fallback.name()
        );
        let mut fallback = self.fallback.classify(request).await;
        let merged = [analysis_of(&primary), analysis_of(&fallback)]
            .iter()
            .filter(|a| !a.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("; ");

        if let Some(object) = fallback.as_object_mut() {
            object.insert("analysis".to_string(), Value::String(merged));
        }
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ImagePayload, RawContent};
    use crate::utils::error::{IngestError, Result};
    use std::sync::Mutex;

    struct StubOracle {
        reply: std::result::Result<String, String>,
        seen: Mutex<Vec<OraclePrompt>>,
    }

    impl StubOracle {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ClassificationOracle for StubOracle {
        async fn complete(&self, prompt: &OraclePrompt) -> Result<String> {
            self.seen.lock().unwrap().push(prompt.clone());
            self.reply.clone().map_err(|message| IngestError::ProcessingError { message })
        }
    }

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
    }

    fn request(content: &RawContent) -> ClassifyRequest<'_> {
        ClassifyRequest {
            content,
            known_children: vec!["Alice".to_string()],
            reference_date: reference(),
        }
    }

    #[test]
    fn test_extract_json_object_skips_braces_in_strings() {
        let reply = r#"Sure! {"analysis": "uses } and \" {", "events": [{"a": 1}]} trailing }"#;
        assert_eq!(
            extract_json_object(reply),
            Some(r#"{"analysis": "uses } and \" {", "events": [{"a": 1}]}"#)
        );
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("{ unbalanced"), None);
    }

    #[test]
    fn test_parse_oracle_reply_is_non_fatal() {
        let value = parse_oracle_reply("```json\n{\"hasEvents\": true, \"events\": [{}]}\n```");
        assert!(reports_events(&value));

        let value = parse_oracle_reply("{not json}");
        assert_eq!(value["hasEvents"], false);
        assert!(value["analysis"].as_str().unwrap().contains("not valid JSON"));

        let value = parse_oracle_reply("I could not find anything.");
        assert_eq!(value["events"], json!([]));
    }

    #[test]
    fn test_instructions_mention_today_and_children() {
        let text = build_instructions(reference(), &["Alice".to_string(), "Bob".to_string()]);
        assert!(text.contains("2025-03-15"));
        assert!(text.contains("Alice, Bob"));
        assert!(text.contains("ASSIGNMENT_DUE"));
        assert!(text.contains("URGENT"));
    }

    #[tokio::test]
    async fn test_oracle_classifier_sends_normalized_text_and_image() {
        let classifier = OracleClassifier::new(StubOracle::replying(
            r#"{"hasEvents": true, "events": [{"title": "Picture Day"}], "analysis": "ok"}"#,
        ));
        let content = RawContent::photo(
            Some(ImagePayload {
                bytes: b"img".to_vec(),
                mime_type: "image/png".to_string(),
            }),
            "  Picture   day | flyer ",
        );

        let value = classifier.classify(&request(&content)).await;
        assert_eq!(value["events"][0]["title"], "Picture Day");

        let seen = classifier.oracle.seen.lock().unwrap();
        assert_eq!(seen[0].text, "Picture day flyer");
        let image = seen[0].image.as_ref().unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.base64_data, "aW1n");
    }

    #[tokio::test]
    async fn test_oracle_failure_becomes_diagnostic() {
        let classifier = OracleClassifier::new(StubOracle::failing("connection refused"));
        let content = RawContent::text("Soccer on Saturday");
        let value = classifier.classify(&request(&content)).await;

        assert_eq!(value["hasEvents"], false);
        assert!(value["analysis"]
            .as_str()
            .unwrap()
            .contains("connection refused"));
    }

    #[tokio::test]
    async fn test_rule_based_classifier_produces_candidate_json() {
        let content = RawContent::text("Math homework due tomorrow at 5:00 PM");
        let value = RuleBasedClassifier::new().classify(&request(&content)).await;

        assert_eq!(value["hasEvents"], true);
        assert_eq!(value["events"][0]["category"], "ASSIGNMENT_DUE");
        assert_eq!(value["events"][0]["startDate"], "2025-03-16");
        assert_eq!(value["events"][0]["startTime"], "17:00");
    }

    #[tokio::test]
    async fn test_fallback_runs_rules_when_oracle_finds_nothing() {
        let classifier = FallbackClassifier::new(
            OracleClassifier::new(StubOracle::failing("timeout")),
            RuleBasedClassifier::new(),
        );
        assert_eq!(classifier.name(), "oracle+rules");

        let content = RawContent::text("Dentist appointment on 04/02/2025 at 9:00 AM");
        let value = classifier.classify(&request(&content)).await;

        assert!(reports_events(&value));
        assert_eq!(value["events"][0]["category"], "APPOINTMENT");
        let analysis = value["analysis"].as_str().unwrap();
        assert!(analysis.contains("timeout"));
        assert!(analysis.contains("Rule-based"));
    }
}
