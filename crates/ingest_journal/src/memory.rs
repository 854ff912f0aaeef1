//! In-memory `Journal` for unit tests, so pipeline stages can be driven
//! in-process without a real database.

use crate::{DecisionEntry, Journal, Stage};
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryJournal {
    entries: Mutex<Vec<DecisionEntry>>,
}

#[async_trait]
impl Journal for MemoryJournal {
    async fn append(&self, entry: DecisionEntry) -> anyhow::Result<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    async fn purge_stage(&self, ingestion_id: &str, stage: Stage) -> anyhow::Result<()> {
        self.entries
            .lock()
            .unwrap()
            .retain(|e| !(e.ingestion_id == ingestion_id && e.stage as u8 == stage as u8));
        Ok(())
    }

    async fn list(&self, ingestion_id: &str) -> anyhow::Result<Vec<DecisionEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.ingestion_id == ingestion_id)
            .cloned()
            .collect())
    }

    async fn list_stage(&self, ingestion_id: &str, stage: Stage) -> anyhow::Result<Vec<DecisionEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.ingestion_id == ingestion_id && e.stage as u8 == stage as u8)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn purge_only_removes_matching_stage() {
        let j = MemoryJournal::default();
        j.append(DecisionEntry::new("i1", Stage::Parse, "parse_complete", json!({})))
            .await
            .unwrap();
        j.append(DecisionEntry::new("i1", Stage::Map, "column_mapped", json!({})))
            .await
            .unwrap();

        j.purge_stage("i1", Stage::Parse).await.unwrap();

        let remaining = j.list("i1").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].decision_type, "column_mapped");
    }
}
