use crate::core::Pipeline;
use crate::domain::model::{AnalyzeResult, RawContent, RequestContext};
use crate::utils::error::Result;
use crate::utils::validation::Validate;

pub struct IngestEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> IngestEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// 缺少輸入時在呼叫分類器之前就失敗
    pub async fn run(&self, ctx: &RequestContext, content: &RawContent) -> Result<AnalyzeResult> {
        content.validate()?;
        tracing::info!("🚀 Analyzing {:?} content for user {}", content.kind, ctx.user_id);

        // Extract
        let report = self.pipeline.extract(ctx, content).await?;
        tracing::info!(
            "🔍 Classified {} candidate(s), {} rejected",
            report.events.len(),
            report.rejections.len()
        );

        // Transform
        let planned = self.pipeline.transform(ctx, report).await?;
        tracing::debug!("Planned {} event(s)", planned.planned.len());

        // Load
        let result = self.pipeline.load(ctx, planned).await?;
        tracing::info!(
            "✅ Created {} event(s), skipped {} duplicate(s), {} error(s)",
            result.events_created,
            result.skipped,
            result.errors.len()
        );

        Ok(result)
    }
}
