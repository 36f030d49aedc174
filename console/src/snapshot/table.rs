use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::constants::DELETING_STATUS_TEXT;
use crate::model::{Snapshot, SnapshotOperation};

/// Agreement between a displayed row and the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowSync {
    /// As listed by the server
    Committed,
    /// Changed locally ahead of the server; `previous` is the rollback value
    Optimistic { previous: Box<Snapshot> },
    /// Patched from a poll response
    Reconciled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRow {
    pub snapshot: Snapshot,
    pub sync: RowSync,
}

impl SnapshotRow {
    fn committed(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            sync: RowSync::Committed,
        }
    }

    fn matches(&self, id: &str) -> bool {
        self.snapshot.id.as_deref() == Some(id)
    }
}

/// Displayed snapshot list of one VM; the single writer for its rows
#[derive(Clone, Default)]
pub struct SnapshotTable {
    rows: Arc<RwLock<Vec<SnapshotRow>>>,
}

impl SnapshotTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full reload: every row becomes `Committed`
    pub async fn replace_all(&self, snapshots: Vec<Snapshot>) {
        let mut rows = self.rows.write().await;
        *rows = snapshots.into_iter().map(SnapshotRow::committed).collect();
        debug!("Snapshot table reloaded with {} rows", rows.len());
    }

    pub async fn rows(&self) -> Vec<SnapshotRow> {
        self.rows.read().await.clone()
    }

    pub async fn snapshots(&self) -> Vec<Snapshot> {
        self.rows
            .read()
            .await
            .iter()
            .map(|row| row.snapshot.clone())
            .collect()
    }

    pub async fn get(&self, id: &str) -> Option<SnapshotRow> {
        self.rows.read().await.iter().find(|row| row.matches(id)).cloned()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    pub async fn has_pending(&self) -> bool {
        self.rows
            .read()
            .await
            .iter()
            .any(|row| row.snapshot.is_pending())
    }

    /// Show a just-submitted snapshot ahead of the server list
    pub async fn insert_pending(&self, snapshot: Snapshot) {
        self.rows.write().await.insert(0, SnapshotRow::committed(snapshot));
    }

    /// Patch the row with the given id in place; false when no row matches
    pub async fn patch<F>(&self, id: &str, update: F) -> bool
    where
        F: FnOnce(&mut Snapshot),
    {
        let mut rows = self.rows.write().await;
        match rows.iter_mut().find(|row| row.matches(id)) {
            Some(row) => {
                update(&mut row.snapshot);
                row.sync = RowSync::Reconciled;
                true
            }
            None => false,
        }
    }

    /// Optimistically flag a row as being deleted; false when no row matches
    pub async fn mark_deleting(&self, id: &str) -> bool {
        let mut rows = self.rows.write().await;
        match rows.iter_mut().find(|row| row.matches(id)) {
            Some(row) => {
                let previous = Box::new(row.snapshot.clone());
                row.snapshot.operation = Some(SnapshotOperation::Delete);
                row.snapshot.status_text = Some(DELETING_STATUS_TEXT.to_string());
                row.sync = RowSync::Optimistic { previous };
                true
            }
            None => false,
        }
    }

    /// Undo an optimistic change; false when the row is not optimistic
    pub async fn rollback(&self, id: &str) -> bool {
        let mut rows = self.rows.write().await;
        let Some(row) = rows.iter_mut().find(|row| row.matches(id)) else {
            return false;
        };
        match std::mem::replace(&mut row.sync, RowSync::Committed) {
            RowSync::Optimistic { previous } => {
                row.snapshot = *previous;
                true
            }
            other => {
                row.sync = other;
                false
            }
        }
    }
}
