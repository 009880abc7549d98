//! JSON export of the aggregation state

use crate::state::StoreSnapshot;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One category in the export file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedCategory {
    /// Current window, oldest first
    pub values: Vec<f64>,
    pub mean: Option<f64>,
    pub stdev: Option<f64>,
    pub count: u64,
}

/// Whole export document, keyed by category
pub type ExportDocument = BTreeMap<String, ExportedCategory>;

pub fn build_document(snapshot: &StoreSnapshot) -> ExportDocument {
    snapshot
        .iter()
        .map(|(category, window)| {
            (
                category.clone(),
                ExportedCategory {
                    values: window.to_vec(),
                    mean: window.mean(),
                    stdev: window.stdev(),
                    count: window.count(),
                },
            )
        })
        .collect()
}

/// Serialize a snapshot and write it to `path`
///
/// Takes an already detached snapshot so no lock is held during the write.
pub async fn export_snapshot(snapshot: &StoreSnapshot, path: &Path) -> Result<usize, ExportError> {
    let document = build_document(snapshot);
    let json = serde_json::to_string_pretty(&document)?;
    tokio::fs::write(path, json).await?;

    log::debug!("Exported {} categories to {}", document.len(), path.display());
    Ok(document.len())
}

/// Read an export file back
pub fn load_export(path: &Path) -> Result<ExportDocument, ExportError> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AggregateStore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_export_writes_expected_shape() {
        let store = AggregateStore::new(10);
        store.record_reading("Temp", 5.0);

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("export.json");
        let written = export_snapshot(&store.snapshot(), &path).await.unwrap();
        assert_eq!(written, 1);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["Temp"]["values"], serde_json::json!([5.0]));
        assert_eq!(raw["Temp"]["mean"], serde_json::json!(5.0));
        assert!(raw["Temp"]["stdev"].is_null());
        assert_eq!(raw["Temp"]["count"], serde_json::json!(1));
    }

    #[tokio::test]
    async fn test_export_empty_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.json");
        export_snapshot(&StoreSnapshot::new(), &path).await.unwrap();
        assert!(load_export(&path).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_export_to_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("export.json");
        let result = export_snapshot(&StoreSnapshot::new(), &path).await;
        assert!(matches!(result, Err(ExportError::Io(_))));
    }
}
