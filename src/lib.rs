pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{http_oracle::HttpOracle, json_store::JsonRecordStore, storage::LocalStorage};
pub use config::TomlConfig;
pub use core::{
    classifier::{FallbackClassifier, OracleClassifier, RuleBasedClassifier},
    conflicts::{find_conflicts, TimeInterval},
    etl::IngestEngine,
    grid::{build_month_grid, MonthGrid, MonthView},
    pipeline::{ContentPipeline, PipelineOptions},
};
pub use utils::error::{IngestError, Result};
