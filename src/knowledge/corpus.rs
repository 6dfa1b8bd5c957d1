//! Corpus - 청크 컬렉션
//!
//! 삽입 순서를 유지하는 청크 목록입니다. 내부 벡터는 `Arc`로 공유되어
//! 인덱스 스냅샷이 복사 없이 같은 청크를 참조하고, 추가 시에만 copy-on-write 됩니다.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RagError, RagResult};

use super::chunker::Chunker;

// ============================================================================
// Types
// ============================================================================

/// 청크 식별자 (UUID v4)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(String);

impl ChunkId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 검색 단위 청크 (생성 후 불변)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    /// 출처 라벨 (파일명, URL, 사용자 지정 이름)
    pub source: String,
    pub text: String,
}

/// 영속화된 청크 레코드
///
/// 저장소나 JSON 내보내기에서 그대로 돌려받는 형태입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusRecord {
    pub id: String,
    pub source: String,
    pub text: String,
}

impl CorpusRecord {
    /// 레코드 형태 검증 후 청크로 변환
    pub fn into_chunk(self) -> RagResult<Chunk> {
        if self.id.trim().is_empty() {
            return Err(RagError::InvalidRecord("empty id".to_string()));
        }
        if self.text.trim().is_empty() {
            return Err(RagError::InvalidRecord(format!("record {} has no text", self.id)));
        }

        Ok(Chunk {
            id: ChunkId(self.id),
            source: self.source,
            text: self.text,
        })
    }
}

impl From<&Chunk> for CorpusRecord {
    fn from(chunk: &Chunk) -> Self {
        Self {
            id: chunk.id.to_string(),
            source: chunk.source.clone(),
            text: chunk.text.clone(),
        }
    }
}

impl TryFrom<serde_json::Value> for CorpusRecord {
    type Error = RagError;

    fn try_from(value: serde_json::Value) -> RagResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| RagError::InvalidRecord("not a JSON object".to_string()))?;

        let field = |name: &str| -> RagResult<String> {
            obj.get(name)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| RagError::InvalidRecord(format!("missing string field '{}'", name)))
        };

        Ok(Self {
            id: field("id")?,
            source: field("source")?,
            text: field("text")?,
        })
    }
}

/// 복원 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub restored: usize,
    pub skipped: usize,
}

/// 출처별 요약
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub source: String,
    pub chunks: usize,
    pub chars: usize,
}

// ============================================================================
// Corpus
// ============================================================================

/// 청크 컬렉션
///
/// `revision`은 구조가 바뀔 때마다 증가하며, 인덱스가 오래되었는지 판단하는 데 쓰입니다.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    chunks: Arc<Vec<Chunk>>,
    revision: u64,
}

/// 탐색 뷰에서 필터가 없을 때 보여주는 최근 청크 수
const RECENT_VIEW: usize = 200;

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 텍스트를 청킹해 추가하고, 새로 생긴 청크를 반환
    ///
    /// 빈 텍스트에서는 청크를 만들지 않습니다.
    pub fn ingest(&mut self, chunker: &dyn Chunker, source: &str, text: &str) -> Vec<Chunk> {
        let pieces = chunker.chunk(text);
        if pieces.is_empty() {
            return Vec::new();
        }

        let created: Vec<Chunk> = pieces
            .into_iter()
            .map(|text| Chunk {
                id: ChunkId::generate(),
                source: source.to_string(),
                text,
            })
            .collect();

        self.extend(created.iter().cloned());
        created
    }

    /// 영속 레코드에서 복원 (잘못된 레코드는 건너뜀)
    pub fn restore<I>(&mut self, records: I) -> RestoreReport
    where
        I: IntoIterator<Item = CorpusRecord>,
    {
        let mut report = RestoreReport::default();
        let mut valid = Vec::new();

        for record in records {
            match record.into_chunk() {
                Ok(chunk) => {
                    valid.push(chunk);
                    report.restored += 1;
                }
                Err(e) => {
                    tracing::warn!("Skipping corpus record: {}", e);
                    report.skipped += 1;
                }
            }
        }

        self.extend(valid);
        report
    }

    fn extend<I: IntoIterator<Item = Chunk>>(&mut self, chunks: I) {
        let before = self.chunks.len();
        Arc::make_mut(&mut self.chunks).extend(chunks);
        if self.chunks.len() != before {
            self.revision += 1;
        }
    }

    /// 전체 삭제
    pub fn clear(&mut self) {
        self.chunks = Arc::new(Vec::new());
        self.revision += 1;
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// 인덱스 스냅샷용 공유 핸들
    pub fn shared(&self) -> Arc<Vec<Chunk>> {
        Arc::clone(&self.chunks)
    }

    pub fn get(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    /// 영속화용 레코드
    pub fn records(&self) -> Vec<CorpusRecord> {
        self.chunks.iter().map(CorpusRecord::from).collect()
    }

    /// 출처별 요약 (처음 등장한 순서)
    pub fn sources(&self) -> Vec<SourceSummary> {
        let mut summaries: Vec<SourceSummary> = Vec::new();

        for chunk in self.chunks.iter() {
            let chars = chunk.text.chars().count();
            match summaries.iter_mut().find(|s| s.source == chunk.source) {
                Some(summary) => {
                    summary.chunks += 1;
                    summary.chars += chars;
                }
                None => summaries.push(SourceSummary {
                    source: chunk.source.clone(),
                    chunks: 1,
                    chars,
                }),
            }
        }

        summaries
    }

    /// 부분 문자열 탐색 (대소문자 무시)
    ///
    /// 필터가 비어 있으면 가장 최근 청크들을 반환합니다.
    pub fn find(&self, filter: &str) -> Vec<&Chunk> {
        let filter = filter.trim().to_lowercase();
        if filter.is_empty() {
            let skip = self.chunks.len().saturating_sub(RECENT_VIEW);
            return self.chunks.iter().skip(skip).collect();
        }

        self.chunks
            .iter()
            .filter(|c| c.text.to_lowercase().contains(&filter))
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
