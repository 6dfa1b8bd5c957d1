//! Engine - 코퍼스와 인덱스를 묶는 명시적 컨텍스트
//!
//! 숨은 전역 상태 없이 호출자가 소유합니다. 코퍼스와 모델은 `IndexSnapshot`
//! 한 단위로 교체되므로, 재학습 중에도 이전 스냅샷으로 일관된 답을 냅니다.
//!
//! 상태: `NoIndex` → (학습 성공) → `Indexed`. 재학습은 `Indexed`에 재진입합니다.

mod indexer;

pub use indexer::BackgroundIndexer;

use std::sync::Arc;

use serde::Serialize;

use crate::answer::{AnswerResult, ResponsePolicy, ScoredChunk};
use crate::config::Settings;
use crate::knowledge::{
    retrieve, Chunk, Corpus, CorpusRecord, ParagraphChunker, RestoreReport, RetrievalHit,
    SourceSummary, TfIdfModel,
};

/// 탐색 검색에서 최소로 요청하는 결과 수
const MIN_SEARCH_RESULTS: usize = 3;

// ============================================================================
// Types
// ============================================================================

/// 학습 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModelStatus {
    Trained { chunks: usize, vocabulary: usize },
    Untrained { reason: String },
}

impl ModelStatus {
    pub fn is_trained(&self) -> bool {
        matches!(self, Self::Trained { .. })
    }
}

/// 인덱스 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IndexState {
    NoIndex,
    /// `stale`: 스냅샷 이후 코퍼스가 바뀜
    Indexed { stale: bool },
}

/// 코퍼스 + 모델 (항상 함께 교체)
#[derive(Debug)]
pub struct IndexSnapshot {
    chunks: Arc<Vec<Chunk>>,
    model: TfIdfModel,
    revision: u64,
}

impl IndexSnapshot {
    /// 청크 목록으로 모델 학습 (CPU 작업)
    pub fn build(chunks: Arc<Vec<Chunk>>, revision: u64) -> Self {
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let model = TfIdfModel::build(&texts);
        Self {
            chunks,
            model,
            revision,
        }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn model(&self) -> &TfIdfModel {
        &self.model
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn status(&self) -> ModelStatus {
        ModelStatus::Trained {
            chunks: self.chunks.len(),
            vocabulary: self.model.vocabulary().len(),
        }
    }

    /// 검색 결과를 청크 참조로 변환
    pub fn scored<'a>(&'a self, hits: &[RetrievalHit]) -> Vec<ScoredChunk<'a>> {
        hits.iter()
            .filter_map(|hit| {
                self.chunks.get(hit.chunk_index).map(|chunk| ScoredChunk {
                    chunk,
                    score: hit.score,
                })
            })
            .collect()
    }
}

/// 탐색 검색 결과
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}

/// 스냅샷 하나로 쿼리에 답하기
///
/// 스냅샷이 없으면 인덱스 없음 경로(폴백)로 갑니다.
pub fn answer_with(
    policy: &ResponsePolicy,
    snapshot: Option<&IndexSnapshot>,
    query: &str,
    settings: &Settings,
) -> AnswerResult {
    let Some(snapshot) = snapshot else {
        return policy.respond(query, None, settings);
    };

    let hits = retrieve(
        snapshot.model(),
        query,
        settings.config.top_k,
        settings.config.threshold,
    );
    let scored = snapshot.scored(&hits);
    policy.respond(query, Some(scored.as_slice()), settings)
}

// ============================================================================
// Engine
// ============================================================================

pub struct Engine {
    settings: Settings,
    corpus: Corpus,
    snapshot: Option<Arc<IndexSnapshot>>,
    chunker: ParagraphChunker,
    policy: ResponsePolicy,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl Engine {
    pub fn new(settings: Settings) -> Self {
        let settings = settings.validated();
        let chunker = ParagraphChunker::new(settings.config.chunk_config());
        Self {
            settings,
            corpus: Corpus::new(),
            snapshot: None,
            chunker,
            policy: ResponsePolicy::default(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// 설정 교체 (청크 설정은 이후 수집부터 적용)
    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings.validated();
        self.chunker = ParagraphChunker::new(self.settings.config.chunk_config());
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn snapshot(&self) -> Option<Arc<IndexSnapshot>> {
        self.snapshot.clone()
    }

    // ------------------------------------------------------------------------
    // Ingestion
    // ------------------------------------------------------------------------

    /// 텍스트 수집 (학습은 하지 않음)
    pub fn ingest(&mut self, source: &str, text: &str) -> Vec<Chunk> {
        let created = self.corpus.ingest(&self.chunker, source, text);
        if created.is_empty() {
            tracing::warn!("No content to ingest from {}", source);
        } else {
            tracing::info!("Ingested {} chunks from {}", created.len(), source);
        }
        created
    }

    /// 영속 레코드 복원
    pub fn restore<I>(&mut self, records: I) -> RestoreReport
    where
        I: IntoIterator<Item = CorpusRecord>,
    {
        let report = self.corpus.restore(records);
        tracing::info!(
            "Restored {} chunks ({} skipped)",
            report.restored,
            report.skipped
        );
        report
    }

    // ------------------------------------------------------------------------
    // Indexing
    // ------------------------------------------------------------------------

    /// 현재 코퍼스로 재학습 (코퍼스가 비면 아무것도 하지 않음)
    pub fn build_index(&mut self) -> ModelStatus {
        if self.corpus.is_empty() {
            return ModelStatus::Untrained {
                reason: "no content".to_string(),
            };
        }

        let snapshot = IndexSnapshot::build(self.corpus.shared(), self.corpus.revision());
        self.install(Arc::new(snapshot))
    }

    /// 다른 곳(백그라운드)에서 만든 스냅샷 설치
    ///
    /// 이미 설치된 것보다 오래된 스냅샷은 무시합니다.
    pub fn install(&mut self, snapshot: Arc<IndexSnapshot>) -> ModelStatus {
        if let Some(current) = &self.snapshot {
            if current.revision() > snapshot.revision() {
                tracing::debug!(
                    "Ignoring snapshot r{} older than installed r{}",
                    snapshot.revision(),
                    current.revision()
                );
                return current.status();
            }
        }

        let status = snapshot.status();
        if let ModelStatus::Trained { chunks, vocabulary } = &status {
            tracing::info!("Index installed: {} chunks, {} terms", chunks, vocabulary);
        }
        self.snapshot = Some(snapshot);
        status
    }

    pub fn state(&self) -> IndexState {
        match &self.snapshot {
            None => IndexState::NoIndex,
            Some(snapshot) => IndexState::Indexed {
                stale: snapshot.revision() != self.corpus.revision(),
            },
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// 설정된 top_k / threshold로 검색
    pub fn retrieve(&self, query: &str) -> Vec<RetrievalHit> {
        match &self.snapshot {
            Some(snapshot) => retrieve(
                snapshot.model(),
                query,
                self.settings.config.top_k,
                self.settings.config.threshold,
            ),
            None => Vec::new(),
        }
    }

    /// 전체 질의 경로
    pub fn ask(&self, query: &str) -> AnswerResult {
        answer_with(&self.policy, self.snapshot.as_deref(), query, &self.settings)
    }

    /// 코퍼스 탐색용 검색 (임계값 0)
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        let Some(snapshot) = &self.snapshot else {
            return Vec::new();
        };

        let hits = retrieve(snapshot.model(), query, limit.max(MIN_SEARCH_RESULTS), 0.0);
        snapshot
            .scored(&hits)
            .into_iter()
            .map(|h| SearchHit {
                chunk: h.chunk.clone(),
                score: h.score,
            })
            .collect()
    }

    pub fn sources(&self) -> Vec<SourceSummary> {
        self.corpus.sources()
    }

    /// 코퍼스와 모델 모두 초기화
    pub fn reset_all(&mut self) {
        self.corpus.clear();
        self.snapshot = None;
        tracing::info!("Corpus and index reset");
    }
}

// ============================================================================
// Tests
// ============================================================================
