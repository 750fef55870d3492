pub mod child_resolver;
pub mod classifier;
pub mod conflicts;
pub mod dedup;
pub mod etl;
pub mod extractor;
pub mod grid;
pub mod normalizer;
pub mod pipeline;
pub mod validator;

pub use crate::domain::model::{AnalyzeResult, TransformResult};
pub use crate::domain::ports::{ConfigProvider, Pipeline, RecordStore, Storage};
pub use crate::utils::error::Result;
