//! Answer 모듈 - 검색 결과로 답변 만들기
//!
//! - Sentence: 교체 가능한 문장 분리 전략
//! - Guard: 내부 지침 되풀이 방지 (anti-echo)
//! - Synthesizer: 추출/압축 방식 답변 합성
//! - Policy: 합성 답변 vs 폴백 결정

mod guard;
mod policy;
mod sentence;
mod synthesizer;

// Re-exports
pub use guard::{GuardSet, ECHO_RATIO};
pub use policy::{fallback_text, AnswerReason, AnswerResult, ResponsePolicy, ScoredChunk, UsedChunk};
pub use sentence::{default_splitter, PunctuationSplitter, SentenceSplitter};
pub use synthesizer::{limit_words, Evidence, SynthesisOptions, SynthesisRequest, Synthesizer};
