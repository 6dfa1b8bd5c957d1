//! Knowledge 모듈 - 로컬 TF-IDF 검색
//!
//! - Tokenizer: 소문자화 + 악센트 제거 + 구두점 제거
//! - Chunker: 문단 단위 분할 + 오버랩
//! - Corpus: 청크 컬렉션 (copy-on-write)
//! - Index: 평활화 TF-IDF 벡터 공간 모델
//! - Retriever: 코사인 유사도 순위
//! - Store: SQLite 코퍼스 저장

mod chunker;
mod corpus;
mod index;
mod retriever;
mod store;
mod tokenizer;

// Re-exports
pub use chunker::{
    chunk_by_stride, default_chunker, paragraph_chunker, ChunkConfig, Chunker, ParagraphChunker,
};
pub use corpus::{Chunk, ChunkId, Corpus, CorpusRecord, RestoreReport, SourceSummary};
pub use index::{cosine_similarity, euclidean_norm, TfIdfModel, Vocabulary};
pub use retriever::{retrieve, RetrievalHit};
pub use store::{export_json, import_json, ImportedRecords, KnowledgeStore, StoreStats, StoredChunk};
pub use tokenizer::{collapse_whitespace, token_set, tokenize};
