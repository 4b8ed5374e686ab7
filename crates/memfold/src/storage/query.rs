//! Similarity query results in parallel-array form
//!
//! Stores answer a query with one inner list per query text:
//! `{"ids": [[...]], "documents": [[...]], "metadatas": [[...]], "distances": [[...]]}`.
//! Only the first inner list is used since every query carries one text.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{MemfoldError, Result};
use crate::memory::types::{MemoryId, RelatedMemory};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub ids: Vec<Vec<String>>,
    #[serde(default)]
    pub documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    pub metadatas: Option<Vec<Vec<Option<MemoryMetadata>>>>,
    #[serde(default)]
    pub distances: Option<Vec<Vec<f32>>>,
}

/// Per-memory metadata written alongside each document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryMetadata {
    /// Unix timestamp in seconds
    #[serde(default)]
    pub created_at: Option<f64>,
}

impl MemoryMetadata {
    /// Creation time; memories without one sort as the oldest
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
            .and_then(|secs| DateTime::from_timestamp(secs.trunc() as i64, 0))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

impl QueryResult {
    /// True when the result names no memories at all
    pub fn is_empty(&self) -> bool {
        self.ids.first().is_none_or(|ids| ids.is_empty())
    }

    /// Zip the parallel arrays into related memories.
    ///
    /// Entries without a document are skipped; arrays of different lengths
    /// or missing distances are `Retrieval` errors.
    pub fn into_related(self) -> Result<Vec<RelatedMemory>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let ids = self.ids.into_iter().next().unwrap_or_default();
        let documents = first_row(self.documents)
            .ok_or_else(|| MemfoldError::Retrieval("query result has no documents".to_string()))?;
        let distances = first_row(self.distances)
            .ok_or_else(|| MemfoldError::Retrieval("query result has no distances".to_string()))?;
        let metadatas = first_row(self.metadatas).unwrap_or_default();

        if documents.len() != ids.len() || distances.len() != ids.len() {
            return Err(MemfoldError::Retrieval(format!(
                "query result arrays differ in length: {} ids, {} documents, {} distances",
                ids.len(),
                documents.len(),
                distances.len()
            )));
        }

        let mut metadatas = metadatas.into_iter();
        let related = ids
            .into_iter()
            .zip(documents)
            .zip(distances)
            .filter_map(|((id, document), distance)| {
                let created_at = metadatas
                    .next()
                    .flatten()
                    .unwrap_or_default()
                    .created_at();
                document.map(|fact| RelatedMemory {
                    id: MemoryId::new(id),
                    fact,
                    created_at,
                    distance,
                })
            })
            .collect();

        Ok(related)
    }
}

fn first_row<T>(rows: Option<Vec<Vec<T>>>) -> Option<Vec<T>> {
    rows.and_then(|rows| rows.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_related_zips_arrays() {
        let result: QueryResult = serde_json::from_value(serde_json::json!({
            "ids": [["a", "b"]],
            "documents": [["User likes oranges", "User likes pineapples"]],
            "metadatas": [[{"created_at": 1000}, {"created_at": 900.7}]],
            "distances": [[0.2, 0.9]]
        }))
        .unwrap();

        let related = result.into_related().unwrap();
        assert_eq!(related.len(), 2);
        assert_eq!(related[0].id, MemoryId::new("a"));
        assert_eq!(related[0].fact, "User likes oranges");
        assert_eq!(related[0].created_at.timestamp(), 1000);
        assert!((related[0].distance - 0.2).abs() < f32::EPSILON);
        assert_eq!(related[1].created_at.timestamp(), 900);
    }

    #[test]
    fn test_empty_result_shapes() {
        for value in [
            serde_json::json!({}),
            serde_json::json!({"ids": []}),
            serde_json::json!({"ids": [[]], "documents": [[]], "distances": [[]]}),
        ] {
            let result: QueryResult = serde_json::from_value(value).unwrap();
            assert!(result.is_empty());
            assert!(result.into_related().unwrap().is_empty());
        }
    }

    #[test]
    fn test_missing_metadata_defaults_to_epoch() {
        let result: QueryResult = serde_json::from_value(serde_json::json!({
            "ids": [["a"]],
            "documents": [["User likes tea"]],
            "metadatas": [[null]],
            "distances": [[0.1]]
        }))
        .unwrap();

        let related = result.into_related().unwrap();
        assert_eq!(related[0].created_at, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_entries_without_document_are_skipped() {
        let result: QueryResult = serde_json::from_value(serde_json::json!({
            "ids": [["a", "b"]],
            "documents": [[null, "User likes tea"]],
            "distances": [[0.1, 0.2]]
        }))
        .unwrap();

        let related = result.into_related().unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].id, MemoryId::new("b"));
    }

    #[test]
    fn test_mismatched_lengths_are_retrieval_errors() {
        let result: QueryResult = serde_json::from_value(serde_json::json!({
            "ids": [["a", "b"]],
            "documents": [["only one"]],
            "distances": [[0.1, 0.2]]
        }))
        .unwrap();

        assert!(matches!(
            result.into_related(),
            Err(MemfoldError::Retrieval(_))
        ));
    }

    #[test]
    fn test_missing_distances_is_retrieval_error() {
        let result: QueryResult = serde_json::from_value(serde_json::json!({
            "ids": [["a"]],
            "documents": [["User likes tea"]]
        }))
        .unwrap();

        assert!(matches!(
            result.into_related(),
            Err(MemfoldError::Retrieval(_))
        ));
    }
}
