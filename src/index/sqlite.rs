//! SQLite vector backend using the `sqlite-vec` extension.
//!
//! Entries live in a `chunks` table keyed by content-addressed id; vectors
//! live in a `vec0` virtual table joined on rowid. Similarity queries use
//! cosine distance via `vec_distance_cosine`.

use std::collections::HashSet;
use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::OnceLock;

use async_trait::async_trait;
use tokio_rusqlite::{Connection, OptionalExtension, ffi, rusqlite};

use super::{IndexEntry, SearchHit, VectorBackend, WriteOutcome};
use crate::types::KnowledgeError;

#[derive(Clone)]
pub struct SqliteVectorBackend {
    conn: Connection,
}

impl SqliteVectorBackend {
    /// Opens (or creates) the database at `path` with a vector table of the
    /// given width. The width must match the embedding provider's
    /// dimensionality for the life of the store.
    pub async fn open(
        path: impl AsRef<Path>,
        dimensions: usize,
    ) -> Result<Self, KnowledgeError> {
        register_sqlite_vec()?;

        let conn = Connection::open(path)
            .await
            .map_err(|err| KnowledgeError::Storage(err.to_string()))?;

        // Probe the extension before touching any tables.
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))?;
            Ok(())
        })
        .await
        .map_err(|err| KnowledgeError::Storage(err.to_string()))?;

        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS chunks (
                    id TEXT PRIMARY KEY,
                    source TEXT,
                    content TEXT,
                    metadata TEXT
                )",
                [],
            )?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source)",
                [],
            )?;
            conn.execute(
                &format!(
                    "CREATE VIRTUAL TABLE IF NOT EXISTS chunks_embeddings \
                     USING vec0(embedding float[{dimensions}])"
                ),
                [],
            )?;
            Ok(())
        })
        .await
        .map_err(|err| KnowledgeError::Storage(err.to_string()))?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl VectorBackend for SqliteVectorBackend {
    async fn list_ids(&self) -> Result<HashSet<String>, KnowledgeError> {
        self.conn
            .call(|conn| -> Result<HashSet<String>, rusqlite::Error> {
                let mut stmt = conn.prepare("SELECT id FROM chunks")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                let mut ids = HashSet::new();
                for row in rows {
                    ids.insert(row?);
                }
                Ok(ids)
            })
            .await
            .map_err(|err| KnowledgeError::Storage(err.to_string()))
    }

    async fn upsert(
        &self,
        entries: Vec<(IndexEntry, Vec<f32>)>,
    ) -> Result<WriteOutcome, KnowledgeError> {
        if entries.is_empty() {
            return Ok(WriteOutcome::default());
        }

        let outcome = self
            .conn
            .call(move |conn| -> Result<WriteOutcome, rusqlite::Error> {
                let mut outcome = WriteOutcome::default();
                for (entry, vector) in entries {
                    let embedding_json = match serde_json::to_string(&vector) {
                        Ok(json) => json,
                        Err(err) => {
                            outcome.failed.push((entry.id, err.to_string()));
                            continue;
                        }
                    };
                    let result: Result<(), rusqlite::Error> = (|| {
                        conn.execute(
                            "INSERT INTO chunks (id, source, content, metadata)
                             VALUES (?1, ?2, ?3, ?4)
                             ON CONFLICT(id) DO UPDATE SET
                                 source = excluded.source,
                                 content = excluded.content,
                                 metadata = excluded.metadata",
                            (
                                &entry.id,
                                &entry.source,
                                &entry.content,
                                entry.metadata.to_string(),
                            ),
                        )?;
                        let rowid: i64 = conn.query_row(
                            "SELECT rowid FROM chunks WHERE id = ?1",
                            (&entry.id,),
                            |row| row.get(0),
                        )?;
                        conn.execute(
                            "DELETE FROM chunks_embeddings WHERE rowid = ?1",
                            (rowid,),
                        )?;
                        conn.execute(
                            "INSERT INTO chunks_embeddings (rowid, embedding) VALUES (?1, ?2)",
                            (rowid, &embedding_json),
                        )?;
                        Ok(())
                    })();
                    match result {
                        Ok(()) => outcome.succeeded.push(entry.id),
                        Err(err) => outcome.failed.push((entry.id, err.to_string())),
                    }
                }
                Ok(outcome)
            })
            .await
            .map_err(|err| KnowledgeError::Storage(err.to_string()))?;

        if outcome.succeeded.is_empty() && !outcome.failed.is_empty() {
            return Err(KnowledgeError::StoreWrite {
                failed: outcome.failed,
            });
        }
        Ok(outcome)
    }

    async fn delete(&self, ids: &[String]) -> Result<WriteOutcome, KnowledgeError> {
        if ids.is_empty() {
            return Ok(WriteOutcome::default());
        }

        let ids = ids.to_vec();
        let outcome = self
            .conn
            .call(move |conn| -> Result<WriteOutcome, rusqlite::Error> {
                let mut outcome = WriteOutcome::default();
                for id in ids {
                    let result: Result<(), rusqlite::Error> = (|| {
                        let rowid: Option<i64> = conn
                            .query_row(
                                "SELECT rowid FROM chunks WHERE id = ?1",
                                (&id,),
                                |row| row.get(0),
                            )
                            .optional()?;
                        if let Some(rowid) = rowid {
                            conn.execute(
                                "DELETE FROM chunks_embeddings WHERE rowid = ?1",
                                (rowid,),
                            )?;
                            conn.execute("DELETE FROM chunks WHERE rowid = ?1", (rowid,))?;
                        }
                        Ok(())
                    })();
                    match result {
                        Ok(()) => outcome.succeeded.push(id),
                        Err(err) => outcome.failed.push((id, err.to_string())),
                    }
                }
                Ok(outcome)
            })
            .await
            .map_err(|err| KnowledgeError::Storage(err.to_string()))?;

        if outcome.succeeded.is_empty() && !outcome.failed.is_empty() {
            return Err(KnowledgeError::StoreWrite {
                failed: outcome.failed,
            });
        }
        Ok(outcome)
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, KnowledgeError> {
        let embedding_json = serde_json::to_string(query)
            .map_err(|err| KnowledgeError::Storage(err.to_string()))?;

        self.conn
            .call(move |conn| -> Result<Vec<SearchHit>, rusqlite::Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT c.id, c.source, c.content, c.metadata, \
                     vec_distance_cosine(e.embedding, vec_f32(?1)) AS distance \
                     FROM chunks c \
                     JOIN chunks_embeddings e ON e.rowid = c.rowid \
                     ORDER BY distance ASC \
                     LIMIT {k}"
                ))?;

                let rows = stmt.query_map((&embedding_json,), |row| {
                    let entry = IndexEntry {
                        id: row.get(0)?,
                        source: row.get(1)?,
                        content: row.get(2)?,
                        metadata: row
                            .get::<_, String>(3)
                            .map(|s| serde_json::from_str(&s).unwrap_or_default())
                            .unwrap_or_default(),
                    };
                    let distance: f32 = row.get(4)?;
                    // Cosine distance to similarity.
                    Ok(SearchHit {
                        entry,
                        score: 1.0 - distance,
                    })
                })?;

                let mut hits = Vec::new();
                for row in rows {
                    hits.push(row?);
                }
                Ok(hits)
            })
            .await
            .map_err(|err| KnowledgeError::Storage(err.to_string()))
    }

    async fn count(&self) -> Result<usize, KnowledgeError> {
        self.conn
            .call(|conn| -> Result<usize, rusqlite::Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| KnowledgeError::Storage(err.to_string()))
    }
}

/// Registers `sqlite-vec` as an auto-loaded extension, once per process.
fn register_sqlite_vec() -> Result<(), KnowledgeError> {
    static REGISTERED: OnceLock<Result<(), String>> = OnceLock::new();

    REGISTERED
        .get_or_init(|| unsafe {
            type SqliteExtensionInit = unsafe extern "C" fn(
                *mut ffi::sqlite3,
                *mut *mut c_char,
                *const ffi::sqlite3_api_routines,
            ) -> i32;

            let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
            let init_fn: SqliteExtensionInit =
                transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
            let rc = ffi::sqlite3_auto_extension(Some(init_fn));
            if rc != ffi::SQLITE_OK {
                Err(format!(
                    "failed to register sqlite-vec extension (code {rc})"
                ))
            } else {
                Ok(())
            }
        })
        .clone()
        .map_err(KnowledgeError::Storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: &str, text: &str) -> IndexEntry {
        IndexEntry {
            id: id.to_string(),
            source: "docs/a.md".to_string(),
            content: text.to_string(),
            metadata: json!({"level1": "docs"}),
        }
    }

    #[tokio::test]
    async fn upsert_list_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SqliteVectorBackend::open(dir.path().join("store.sqlite"), 3)
            .await
            .unwrap();

        let outcome = backend
            .upsert(vec![
                (entry("one", "first chunk"), vec![0.1, 0.2, 0.3]),
                (entry("two", "second chunk"), vec![0.4, 0.5, 0.6]),
            ])
            .await
            .unwrap();
        assert!(outcome.is_complete());
        assert_eq!(backend.count().await.unwrap(), 2);

        let ids = backend.list_ids().await.unwrap();
        assert!(ids.contains("one") && ids.contains("two"));

        let outcome = backend.delete(&["one".to_string()]).await.unwrap();
        assert!(outcome.is_complete());
        assert_eq!(backend.count().await.unwrap(), 1);
        assert!(!backend.list_ids().await.unwrap().contains("one"));
    }

    #[tokio::test]
    async fn upsert_overwrites_existing_id() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SqliteVectorBackend::open(dir.path().join("store.sqlite"), 3)
            .await
            .unwrap();

        backend
            .upsert(vec![(entry("one", "original"), vec![0.1, 0.2, 0.3])])
            .await
            .unwrap();
        backend
            .upsert(vec![(entry("one", "replaced"), vec![0.9, 0.8, 0.7])])
            .await
            .unwrap();

        assert_eq!(backend.count().await.unwrap(), 1);
        let hits = backend.search(&[0.9, 0.8, 0.7], 1).await.unwrap();
        assert_eq!(hits[0].entry.content, "replaced");
    }

    #[tokio::test]
    async fn search_orders_by_similarity() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SqliteVectorBackend::open(dir.path().join("store.sqlite"), 3)
            .await
            .unwrap();

        backend
            .upsert(vec![
                (entry("near", "close"), vec![1.0, 0.0, 0.0]),
                (entry("far", "distant"), vec![0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = backend.search(&[1.0, 0.1, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].entry.id, "near");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn delete_failing_for_every_id_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite");
        let backend = SqliteVectorBackend::open(&path, 3).await.unwrap();
        backend
            .upsert(vec![(entry("one", "first chunk"), vec![0.1, 0.2, 0.3])])
            .await
            .unwrap();

        // Drop the vector table out from under the backend.
        let raw = Connection::open(&path).await.unwrap();
        raw.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute("DROP TABLE chunks_embeddings", [])?;
            Ok(())
        })
        .await
        .unwrap();

        let err = backend.delete(&["one".to_string()]).await.unwrap_err();
        assert!(matches!(err, KnowledgeError::StoreWrite { .. }));
    }

    #[tokio::test]
    async fn deleting_absent_id_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SqliteVectorBackend::open(dir.path().join("store.sqlite"), 3)
            .await
            .unwrap();
        let outcome = backend.delete(&["ghost".to_string()]).await.unwrap();
        assert!(outcome.is_complete());
    }
}
