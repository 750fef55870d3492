//! Record store backed by a single JSON snapshot written through `Storage`.
//!
//! Writes are serialized by an in-process mutex only; separate processes
//! sharing one data directory are not coordinated.

use crate::domain::model::{Child, EventFilter, Id, NewEvent, PersistedEvent};
use crate::domain::ports::{RecordStore, Storage};
use crate::utils::error::{IngestError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

pub const DEFAULT_SNAPSHOT_FILE: &str = "store.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreSnapshot {
    next_id: Id,
    #[serde(default)]
    children: Vec<Child>,
    #[serde(default)]
    events: Vec<PersistedEvent>,
}

impl StoreSnapshot {
    fn allocate_id(&mut self) -> Id {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        id
    }
}

pub struct JsonRecordStore<S: Storage> {
    storage: S,
    file_name: String,
    write_lock: Mutex<()>,
}

impl<S: Storage> JsonRecordStore<S> {
    pub fn new(storage: S) -> Self {
        Self::with_file_name(storage, DEFAULT_SNAPSHOT_FILE)
    }

    pub fn with_file_name(storage: S, file_name: impl Into<String>) -> Self {
        Self {
            storage,
            file_name: file_name.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<StoreSnapshot> {
        if !self.storage.exists(&self.file_name).await {
            return Ok(StoreSnapshot::default());
        }

        let bytes = self.storage.read_file(&self.file_name).await?;
        serde_json::from_slice(&bytes).map_err(|e| IngestError::StoreError {
            message: format!("corrupt snapshot '{}': {}", self.file_name, e),
        })
    }

    async fn save(&self, snapshot: &StoreSnapshot) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        self.storage.write_file(&self.file_name, &bytes).await
    }
}

#[async_trait]
impl<S: Storage> RecordStore for JsonRecordStore<S> {
    async fn find_children(&self, parent_id: Id) -> Result<Vec<Child>> {
        let snapshot = self.load().await?;
        Ok(snapshot
            .children
            .into_iter()
            .filter(|child| child.parent_id == parent_id)
            .collect())
    }

    async fn create_child(&self, parent_id: Id, name: &str) -> Result<Child> {
        let name = name.trim();
        if name.is_empty() {
            return Err(IngestError::ValidationError {
                message: "child name cannot be empty".to_string(),
            });
        }

        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.load().await?;

        let taken = snapshot
            .children
            .iter()
            .any(|c| c.parent_id == parent_id && c.name.eq_ignore_ascii_case(name));
        if taken {
            return Err(IngestError::ValidationError {
                message: format!("child '{}' already exists", name),
            });
        }

        let child = Child {
            id: snapshot.allocate_id(),
            name: name.to_string(),
            parent_id,
        };
        snapshot.children.push(child.clone());
        self.save(&snapshot).await?;

        tracing::debug!("Created child #{} '{}' for user {}", child.id, child.name, parent_id);
        Ok(child)
    }

    async fn find_events(&self, filter: &EventFilter) -> Result<Vec<PersistedEvent>> {
        let snapshot = self.load().await?;
        let mut events: Vec<PersistedEvent> = snapshot
            .events
            .into_iter()
            .filter(|event| filter.matches(event))
            .collect();
        events.sort_by(|a, b| {
            (a.event.start_date, a.event.start_time, a.id).cmp(&(
                b.event.start_date,
                b.event.start_time,
                b.id,
            ))
        });
        Ok(events)
    }

    async fn find_first_event(&self, filter: &EventFilter) -> Result<Option<PersistedEvent>> {
        let snapshot = self.load().await?;
        Ok(snapshot
            .events
            .into_iter()
            .find(|event| filter.matches(event)))
    }

    async fn create_event(&self, event: NewEvent) -> Result<PersistedEvent> {
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.load().await?;

        let mut candidate = event.event;
        if candidate.color.is_empty() {
            candidate.color = candidate.category.color().to_string();
        }

        let record = PersistedEvent {
            id: snapshot.allocate_id(),
            parent_id: event.parent_id,
            child_id: event.child_id,
            event: candidate,
        };
        snapshot.events.push(record.clone());
        self.save(&snapshot).await?;

        Ok(record)
    }

    async fn delete_event(&self, parent_id: Id, id: Id) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.load().await?;

        let before = snapshot.events.len();
        snapshot
            .events
            .retain(|event| !(event.id == id && event.parent_id == parent_id));
        let removed = snapshot.events.len() != before;

        if removed {
            self.save(&snapshot).await?;
        }
        Ok(removed)
    }
}
