//! Knowledge Store - rusqlite 기반 코퍼스 저장소
//!
//! 코퍼스를 `{id, source, text}` 레코드로 삽입 순서대로 저장합니다.
//! 모델(TF-IDF)은 저장하지 않으며 시작할 때 저장된 청크로 다시 학습합니다.
//! 저장 위치: `<data_dir>/knowledge.db`

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags};
use serde::Serialize;

use crate::config::get_data_dir;

use super::corpus::{Chunk, CorpusRecord};

// ============================================================================
// Types
// ============================================================================

/// 저장된 청크 (목록 조회용)
#[derive(Debug, Clone, Serialize)]
pub struct StoredChunk {
    pub seq: i64,
    pub id: String,
    pub source: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// 저장소 통계
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub chunk_count: usize,
    pub source_count: usize,
    pub total_text_bytes: usize,
    pub db_path: PathBuf,
}

/// JSON 가져오기 결과
#[derive(Debug, Clone, Default)]
pub struct ImportedRecords {
    pub records: Vec<CorpusRecord>,
    /// 형태가 맞지 않아 건너뛴 항목 수
    pub skipped: usize,
}

// ============================================================================
// KnowledgeStore
// ============================================================================

/// Knowledge Store - 동기 코퍼스 저장소
pub struct KnowledgeStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl KnowledgeStore {
    /// 저장소 열기 (없으면 생성)
    pub fn open(path: &Path) -> Result<Self> {
        // 부모 디렉토리 생성
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create database directory")?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open SQLite database")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        };

        store.initialize()?;
        Ok(store)
    }

    /// 기본 위치에서 열기
    pub fn open_default() -> Result<Self> {
        let data_dir = get_data_dir();
        if !data_dir.exists() {
            std::fs::create_dir_all(&data_dir)
                .context("Failed to create data directory")?;
        }

        Self::open(&data_dir.join("knowledge.db"))
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))
    }

    /// 스키마 초기화
    fn initialize(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS chunks (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL,
                source TEXT NOT NULL,
                text TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create chunks table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source)",
            [],
        )
        .context("Failed to create source index")?;

        tracing::debug!("Knowledge store initialized at {:?}", self.db_path);
        Ok(())
    }

    /// 청크 추가 (하나의 트랜잭션)
    pub fn append_chunks(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let now = Utc::now().to_rfc3339();

        let tx = conn.transaction().context("Failed to begin transaction")?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO chunks (id, source, text, created_at) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for chunk in chunks {
                stmt.execute(params![chunk.id.as_str(), chunk.source, chunk.text, now])
                    .context("Failed to insert chunk")?;
            }
        }
        tx.commit().context("Failed to commit chunks")?;

        tracing::info!("Stored {} chunks", chunks.len());
        Ok(chunks.len())
    }

    /// 전체 레코드 (삽입 순서)
    pub fn load_records(&self) -> Result<Vec<CorpusRecord>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare("SELECT id, source, text FROM chunks ORDER BY seq ASC")?;
        let records = stmt
            .query_map([], |row| {
                Ok(CorpusRecord {
                    id: row.get(0)?,
                    source: row.get(1)?,
                    text: row.get(2)?,
                })
            })?
            .filter_map(|r| match r {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!("Skipping unreadable row: {}", e);
                    None
                }
            })
            .collect();

        Ok(records)
    }

    /// 최근 청크 목록
    pub fn list_recent(&self, limit: usize, source: Option<&str>) -> Result<Vec<StoredChunk>> {
        let conn = self.lock()?;

        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<StoredChunk> {
            Ok(StoredChunk {
                seq: row.get(0)?,
                id: row.get(1)?,
                source: row.get(2)?,
                text: row.get(3)?,
                created_at: parse_datetime(row.get::<_, String>(4)?),
            })
        };

        let chunks: Vec<StoredChunk> = if let Some(source) = source {
            let mut stmt = conn.prepare(
                "SELECT seq, id, source, text, created_at FROM chunks
                 WHERE source = ?1
                 ORDER BY seq DESC
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![source, limit as i64], map_row)?;
            rows.filter_map(|r| r.ok()).collect()
        } else {
            let mut stmt = conn.prepare(
                "SELECT seq, id, source, text, created_at FROM chunks
                 ORDER BY seq DESC
                 LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], map_row)?;
            rows.filter_map(|r| r.ok()).collect()
        };

        Ok(chunks)
    }

    /// 전체 삭제
    pub fn clear(&self) -> Result<usize> {
        let conn = self.lock()?;
        let rows = conn
            .execute("DELETE FROM chunks", [])
            .context("Failed to clear chunks")?;

        tracing::info!("Cleared {} stored chunks", rows);
        Ok(rows)
    }

    /// 저장소 통계
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock()?;

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
            .unwrap_or(0);

        let sources: i64 = conn
            .query_row("SELECT COUNT(DISTINCT source) FROM chunks", [], |row| row.get(0))
            .unwrap_or(0);

        let total_size: i64 = conn
            .query_row(
                "SELECT COALESCE(SUM(LENGTH(CAST(text AS BLOB))), 0) FROM chunks",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        Ok(StoreStats {
            chunk_count: count as usize,
            source_count: sources as usize,
            total_text_bytes: total_size as usize,
            db_path: self.db_path.clone(),
        })
    }
}

// ============================================================================
// JSON Export / Import
// ============================================================================

/// 레코드를 JSON 배열로 저장
pub fn export_json(path: &Path, records: &[CorpusRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records).context("Failed to serialize corpus")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

/// JSON 배열에서 레코드 읽기
///
/// 형태가 맞지 않는 항목은 건너뛰고 개수만 셉니다.
pub fn import_json(path: &Path) -> Result<ImportedRecords> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {:?}", path))?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        _ => anyhow::bail!("Expected a JSON array of {{id, source, text}} records"),
    };

    let mut imported = ImportedRecords::default();
    for item in items {
        match CorpusRecord::try_from(item) {
            Ok(record) => imported.records.push(record),
            Err(e) => {
                tracing::warn!("Skipping imported item: {}", e);
                imported.skipped += 1;
            }
        }
    }

    Ok(imported)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// RFC3339 문자열을 DateTime<Utc>로 파싱
fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::corpus::ChunkId;
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, KnowledgeStore) {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("test.db");
        let store = KnowledgeStore::open(&db_path).unwrap();
        (dir, store)
    }

    fn chunk(source: &str, text: &str) -> Chunk {
        Chunk {
            id: ChunkId::generate(),
            source: source.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_append_and_load_preserves_order() {
        let (_dir, store) = create_test_store();
        let chunks = vec![chunk("faq", "uno"), chunk("web", "dos"), chunk("faq", "tres")];

        assert_eq!(store.append_chunks(&chunks).unwrap(), 3);

        let records = store.load_records().unwrap();
        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["uno", "dos", "tres"]);
        assert_eq!(records[0].id, chunks[0].id.as_str());
    }

    #[test]
    fn test_append_empty_is_noop() {
        let (_dir, store) = create_test_store();
        assert_eq!(store.append_chunks(&[]).unwrap(), 0);
        assert!(store.load_records().unwrap().is_empty());
    }

    #[test]
    fn test_list_recent_with_source_filter() {
        let (_dir, store) = create_test_store();
        store
            .append_chunks(&[chunk("faq", "uno"), chunk("web", "dos"), chunk("faq", "tres")])
            .unwrap();

        let recent = store.list_recent(10, None).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].text, "tres");

        let faq = store.list_recent(10, Some("faq")).unwrap();
        assert_eq!(faq.len(), 2);

        let limited = store.list_recent(1, None).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_stats_and_clear() {
        let (_dir, store) = create_test_store();
        store
            .append_chunks(&[chunk("faq", "abc"), chunk("web", "ñ")])
            .unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.chunk_count, 2);
        assert_eq!(stats.source_count, 2);
        assert_eq!(stats.total_text_bytes, 5);

        assert_eq!(store.clear().unwrap(), 2);
        assert_eq!(store.stats().unwrap().chunk_count, 0);
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("knowledge.db");

        {
            let store = KnowledgeStore::open(&path).unwrap();
            store.append_chunks(&[chunk("faq", "persistente")]).unwrap();
        }

        let store = KnowledgeStore::open(&path).unwrap();
        assert_eq!(store.load_records().unwrap()[0].text, "persistente");
    }

    #[test]
    fn test_export_import_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corpus.json");

        let records = vec![
            CorpusRecord {
                id: "1".to_string(),
                source: "faq".to_string(),
                text: "hola".to_string(),
            },
            CorpusRecord {
                id: "2".to_string(),
                source: "web".to_string(),
                text: "adiós".to_string(),
            },
        ];
        export_json(&path, &records).unwrap();

        let imported = import_json(&path).unwrap();
        assert_eq!(imported.records, records);
        assert_eq!(imported.skipped, 0);
    }

    #[test]
    fn test_import_skips_malformed_items() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corpus.json");
        std::fs::write(
            &path,
            r#"[{"id":"1","source":"faq","text":"hola"}, {"id":"2"}, 42]"#,
        )
        .unwrap();

        let imported = import_json(&path).unwrap();
        assert_eq!(imported.records.len(), 1);
        assert_eq!(imported.skipped, 2);

        std::fs::write(&path, r#"{"id":"1"}"#).unwrap();
        assert!(import_json(&path).is_err());
    }
}
