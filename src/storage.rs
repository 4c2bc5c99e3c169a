use crate::course::CourseRecord;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Receives normalized course records
#[async_trait]
pub trait CourseSink: Send + Sync {
    async fn store(&self, source_name: &str, record: CourseRecord) -> Result<()>;
}

/// In-memory sink grouping records by source, for CLI runs and tests
#[derive(Default, Clone)]
pub struct InMemorySink {
    records: Arc<Mutex<HashMap<String, Vec<CourseRecord>>>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<CourseRecord>>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn records_for(&self, source_name: &str) -> Vec<CourseRecord> {
        self.lock().get(source_name).cloned().unwrap_or_default()
    }

    /// Every stored record, ordered by source name then insertion.
    pub fn all_records(&self) -> Vec<CourseRecord> {
        let records = self.lock();
        let mut sources: Vec<&String> = records.keys().collect();
        sources.sort();
        sources
            .into_iter()
            .flat_map(|source| records[source].iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CourseSink for InMemorySink {
    async fn store(&self, source_name: &str, record: CourseRecord) -> Result<()> {
        debug!(
            "Storing record {} for {}",
            record.link.as_deref().unwrap_or_default(),
            source_name
        );
        let mut records = self.lock();
        records.entry(source_name.to_string()).or_default().push(record);
        Ok(())
    }
}
