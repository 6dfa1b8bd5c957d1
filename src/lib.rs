//! asistente-rag - 로컬 TF-IDF 검색 + 답변 합성 어시스턴트
//!
//! 수집한 문서를 청크로 나누고, 평활화 TF-IDF로 검색한 뒤
//! 근거 문장을 골라 짧은 답변을 만듭니다. 내부 지침(goal / notes / system prompt)을
//! 그대로 되풀이하는 답변은 걸러냅니다.

pub mod answer;
pub mod cli;
pub mod collector;
pub mod config;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod knowledge;
pub mod scraper;

// Re-exports
pub use answer::{AnswerReason, AnswerResult, GuardSet, ResponsePolicy, Synthesizer, UsedChunk};
pub use config::{get_data_dir, BotProfile, EngineConfig, ReplyTemplates, Settings};
pub use engine::{BackgroundIndexer, Engine, IndexSnapshot, IndexState, ModelStatus, SearchHit};
pub use error::{RagError, RagResult};
pub use extractor::{FileLoader, LoadedText, TextLoader};
pub use knowledge::{
    default_chunker, retrieve, tokenize, Chunk, ChunkConfig, ChunkId, Chunker, Corpus,
    CorpusRecord, KnowledgeStore, ParagraphChunker, RetrievalHit, StoreStats, TfIdfModel,
};
pub use scraper::{ScrapedPage, WebScraper};
