use crate::domain::model::{
    AnalyzeResult, Child, ClassificationReport, EventFilter, Id, NewEvent, PersistedEvent,
    RawContent, RequestContext, TransformResult,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn data_dir(&self) -> &str;
    fn fallback_to_rules(&self) -> bool;
    fn detect_conflicts(&self) -> bool;
    fn default_reminder_minutes(&self) -> Option<u32>;
}

/// 外部的 Child / Event 紀錄存放處，所有查詢都以 owner 為範圍
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_children(&self, parent_id: Id) -> Result<Vec<Child>>;
    async fn create_child(&self, parent_id: Id, name: &str) -> Result<Child>;
    async fn find_events(&self, filter: &EventFilter) -> Result<Vec<PersistedEvent>>;
    async fn find_first_event(&self, filter: &EventFilter) -> Result<Option<PersistedEvent>>;
    async fn create_event(&self, event: NewEvent) -> Result<PersistedEvent>;
    async fn delete_event(&self, parent_id: Id, id: Id) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleImage {
    pub mime_type: String,
    pub base64_data: String,
}

/// 送給外部 oracle 的固定指令與內容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OraclePrompt {
    pub instructions: String,
    pub text: String,
    pub image: Option<OracleImage>,
}

#[async_trait]
pub trait ClassificationOracle: Send + Sync {
    async fn complete(&self, prompt: &OraclePrompt) -> Result<String>;
}

pub struct ClassifyRequest<'a> {
    pub content: &'a RawContent,
    pub known_children: Vec<String>,
    pub reference_date: NaiveDate,
}

/// 單一的分類契約；回傳未經驗證的 JSON，交給 validator 處理
#[async_trait]
pub trait EventClassifier: Send + Sync {
    fn name(&self) -> &str;
    async fn classify(&self, request: &ClassifyRequest<'_>) -> serde_json::Value;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(
        &self,
        ctx: &RequestContext,
        content: &RawContent,
    ) -> Result<ClassificationReport>;
    async fn transform(
        &self,
        ctx: &RequestContext,
        report: ClassificationReport,
    ) -> Result<TransformResult>;
    async fn load(&self, ctx: &RequestContext, result: TransformResult) -> Result<AnalyzeResult>;
}
