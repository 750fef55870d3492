// Adapters layer: concrete implementations of the domain ports (storage, record store, oracle).

#[cfg(feature = "cli")]
pub mod csv_export;
pub mod http_oracle;
pub mod json_store;
pub mod storage;
