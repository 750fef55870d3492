use crate::core::child_resolver::{resolve_child, ChildResolution};
use crate::core::conflicts::{find_conflicts_in_store, TimeInterval};
use crate::core::dedup::{DedupKey, DuplicateSuppressor};
use crate::core::validator::CandidateValidator;
use crate::domain::model::{
    AnalyzeResult, ClassificationReport, EventConflict, NewEvent, PlannedEvent, RawContent,
    RequestContext, TransformResult,
};
use crate::domain::ports::{ClassifyRequest, ConfigProvider, EventClassifier, Pipeline, RecordStore};
use crate::utils::error::Result;
use chrono::NaiveDate;

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub detect_conflicts: bool,
    pub default_reminder_minutes: Option<u32>,
    /// 解析 "tomorrow" 等相對日期的基準日；預設為本地今天
    pub reference_date: Option<NaiveDate>,
}

impl PipelineOptions {
    pub fn from_config<C: ConfigProvider + ?Sized>(config: &C) -> Self {
        Self {
            detect_conflicts: config.detect_conflicts(),
            default_reminder_minutes: config.default_reminder_minutes(),
            reference_date: None,
        }
    }

    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }
}

pub struct ContentPipeline<S: RecordStore, C: EventClassifier> {
    store: S,
    classifier: C,
    validator: CandidateValidator,
    options: PipelineOptions,
}

impl<S: RecordStore, C: EventClassifier> ContentPipeline<S, C> {
    pub fn new(store: S, classifier: C, options: PipelineOptions) -> Self {
        Self {
            store,
            classifier,
            validator: CandidateValidator::new()
                .with_default_reminder(options.default_reminder_minutes),
            options,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn reference_date(&self) -> NaiveDate {
        self.options
            .reference_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

#[async_trait::async_trait]
impl<S: RecordStore, C: EventClassifier> Pipeline for ContentPipeline<S, C> {
    async fn extract(
        &self,
        ctx: &RequestContext,
        content: &RawContent,
    ) -> Result<ClassificationReport> {
        let request = ClassifyRequest {
            content,
            known_children: ctx.child_names(),
            reference_date: self.reference_date(),
        };

        tracing::debug!(
            "Classifying {:?} content ({} chars) with '{}'",
            content.kind,
            content.text.len(),
            self.classifier.name()
        );
        let raw = self.classifier.classify(&request).await;
        let report = self.validator.validate_report(&raw);

        if !report.rejections.is_empty() {
            tracing::warn!(
                "⚠️ {} candidate(s) failed schema validation",
                report.rejections.len()
            );
        }

        Ok(report)
    }

    async fn transform(
        &self,
        ctx: &RequestContext,
        report: ClassificationReport,
    ) -> Result<TransformResult> {
        let mut planned = Vec::new();

        if report.has_events {
            for candidate in report.events {
                let resolution = resolve_child(candidate.child_name_hint.as_deref(), &ctx.children);
                if let ChildResolution::NoMatch(hint) = &resolution {
                    tracing::warn!(
                        "👤 No child named '{}' for user {}, event '{}' stays unassigned",
                        hint,
                        ctx.user_id,
                        candidate.title
                    );
                }

                planned.push(PlannedEvent {
                    child_id: resolution.child_id(),
                    candidate,
                });
            }
        }

        Ok(TransformResult {
            has_events: report.has_events,
            analysis: report.analysis,
            planned,
            errors: report.rejections,
        })
    }

    async fn load(&self, ctx: &RequestContext, result: TransformResult) -> Result<AnalyzeResult> {
        let suppressor = DuplicateSuppressor::new(&self.store);
        let mut events = Vec::new();
        let mut errors = result.errors;
        let mut conflicts = Vec::new();
        let mut skipped = 0;

        // 逐筆處理，前一筆寫入完成後才檢查下一筆
        for planned in result.planned {
            let key = DedupKey::new(ctx.user_id, &planned.candidate, planned.child_id);
            match suppressor.find_existing(&key).await {
                Ok(Some(existing)) => {
                    tracing::info!(
                        "⏭️ Skipping duplicate '{}' on {} (event #{})",
                        key.title,
                        key.start_date,
                        existing.id
                    );
                    skipped += 1;
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("⚠️ Duplicate check failed for '{}': {}", key.title, e);
                    errors.push(format!("{}: {}", key.title, e));
                    continue;
                }
            }

            let conflicting_ids = if self.options.detect_conflicts {
                let interval = TimeInterval::of_event(&planned.candidate);
                match find_conflicts_in_store(&self.store, ctx.user_id, &interval, None).await {
                    Ok(found) => found.iter().map(|e| e.id).collect(),
                    Err(e) => {
                        tracing::warn!("⚠️ Conflict lookup failed for '{}': {}", key.title, e);
                        Vec::new()
                    }
                }
            } else {
                Vec::new()
            };

            let new_event = NewEvent {
                parent_id: ctx.user_id,
                child_id: planned.child_id,
                event: planned.candidate,
            };
            match self.store.create_event(new_event).await {
                Ok(record) => {
                    tracing::info!(
                        "📅 Created '{}' on {} (event #{})",
                        record.event.title,
                        record.event.start_date,
                        record.id
                    );
                    if !conflicting_ids.is_empty() {
                        tracing::warn!(
                            "⏰ Event #{} overlaps {} existing event(s)",
                            record.id,
                            conflicting_ids.len()
                        );
                        conflicts.push(EventConflict {
                            event_id: record.id,
                            conflicting_event_ids: conflicting_ids,
                        });
                    }
                    events.push(record);
                }
                Err(e) => {
                    tracing::error!("❌ Failed to create '{}': {}", key.title, e);
                    errors.push(format!("{}: {}", key.title, e));
                }
            }
        }

        Ok(AnalyzeResult {
            has_events: result.has_events,
            events_created: events.len(),
            events,
            skipped,
            analysis: result.analysis,
            errors,
            conflicts,
        })
    }
}
