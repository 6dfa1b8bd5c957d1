//! Synthesizer - 검색된 청크에서 문장을 뽑아 짧은 답변으로 압축
//!
//! 처리 순서:
//! 1. 청크별 문장 분리 (청크당 최대 10문장)
//! 2. 쿼리 토큰과의 겹침 수 계산, 겹침 0인 문장 제외
//!    (모든 문장이 0이면 상위 청크의 첫 문장들로 대체)
//! 3. `검색 점수 × 겹침 수`로 안정 정렬
//! 4. 토큰 시그니처로 중복 제거
//! 5. anti-echo 필터
//! 6. 압축 + 마무리 문장 + 단어 수 제한
//!
//! 결과가 비어 있으면 호출자가 폴백 답변을 사용합니다.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::knowledge::{collapse_whitespace, token_set, tokenize};

use super::guard::GuardSet;
use super::sentence::{default_splitter, SentenceSplitter};

// ============================================================================
// Options
// ============================================================================

/// 합성 상수
#[derive(Debug, Clone, Copy)]
pub struct SynthesisOptions {
    /// 청크당 살펴볼 최대 문장 수
    pub sentences_per_chunk: usize,
    /// 겹침이 전혀 없을 때 대체에 쓰는 청크 수
    pub fallback_chunks: usize,
    /// 대체 시 청크당 문장 수
    pub fallback_sentences: usize,
    /// 중복 제거 후 후보 풀 크기
    pub candidate_pool: usize,
    /// 답변에 들어가는 최대 문장 수
    pub max_sentences: usize,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            sentences_per_chunk: 10,
            fallback_chunks: 2,
            fallback_sentences: 2,
            candidate_pool: 6,
            max_sentences: 4,
        }
    }
}

/// 검색된 청크 텍스트와 점수 (검색 순서 유지)
#[derive(Debug, Clone, Copy)]
pub struct Evidence<'a> {
    pub text: &'a str,
    pub score: f32,
}

/// 합성 요청
#[derive(Debug, Clone, Copy)]
pub struct SynthesisRequest<'a> {
    pub query: &'a str,
    pub guard: &'a GuardSet,
    pub max_words: usize,
    pub min_words: usize,
    /// 답변 끝에 붙는 안내 문장
    pub closing: &'a str,
}

struct Candidate {
    sentence: String,
    weight: f32,
}

// ============================================================================
// Synthesizer
// ============================================================================

pub struct Synthesizer {
    splitter: Box<dyn SentenceSplitter>,
    options: SynthesisOptions,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new(default_splitter(), SynthesisOptions::default())
    }
}

impl Synthesizer {
    pub fn new(splitter: Box<dyn SentenceSplitter>, options: SynthesisOptions) -> Self {
        Self { splitter, options }
    }

    pub fn options(&self) -> SynthesisOptions {
        self.options
    }

    /// 답변 합성 (빈 문자열이면 폴백 신호)
    pub fn synthesize(&self, evidence: &[Evidence<'_>], request: &SynthesisRequest<'_>) -> String {
        if evidence.is_empty() {
            return String::new();
        }

        let mut candidates = self.overlapping_sentences(evidence, request.query);
        if candidates.is_empty() {
            tracing::debug!("No sentence overlaps the query, using leading sentences");
            candidates = self.leading_sentences(evidence);
        }

        // sort_by는 안정 정렬: 동점이면 검색 순서 유지
        candidates.sort_by(|a, b| b.weight.total_cmp(&a.weight));

        let pool = dedupe(candidates, self.options.candidate_pool);
        let before = pool.len();

        let selected: Vec<String> = pool
            .into_iter()
            .filter(|s| !request.guard.is_echo(s))
            .take(self.options.max_sentences)
            .collect();

        if selected.len() < before.min(self.options.max_sentences) {
            tracing::debug!("Anti-echo removed {} candidate sentences", before - selected.len());
        }

        let body: Vec<String> = selected
            .iter()
            .map(|s| compress(s))
            .filter(|s| !s.is_empty())
            .collect();
        if body.is_empty() {
            return String::new();
        }

        let evidence_text = strip_qa_markers(&body.join(" "));
        let evidence_words = evidence_text.split_whitespace().count();
        if evidence_words < request.min_words {
            tracing::debug!(
                "Synthesized text too short ({} < {} words)",
                evidence_words,
                request.min_words
            );
            return String::new();
        }

        if request.guard.is_echo(&evidence_text) {
            tracing::debug!("Synthesized text echoes guarded text, discarding");
            return String::new();
        }

        let closing = collapse_whitespace(request.closing);
        let answer = if closing.is_empty() {
            evidence_text
        } else {
            format!("{} {}", evidence_text, closing)
        };

        limit_words(&answer, request.max_words)
    }

    /// 쿼리와 겹치는 문장들
    fn overlapping_sentences(&self, evidence: &[Evidence<'_>], query: &str) -> Vec<Candidate> {
        let query_tokens = token_set(query);
        let mut candidates = Vec::new();
        if query_tokens.is_empty() {
            return candidates;
        }

        for hit in evidence {
            for sentence in self
                .splitter
                .split(hit.text)
                .into_iter()
                .take(self.options.sentences_per_chunk)
            {
                let overlap = tokenize(&sentence)
                    .iter()
                    .filter(|t| query_tokens.contains(*t))
                    .count();
                if overlap > 0 {
                    candidates.push(Candidate {
                        sentence,
                        weight: hit.score * overlap as f32,
                    });
                }
            }
        }

        candidates
    }

    /// 상위 청크의 첫 문장들 (겹침 1로 취급)
    fn leading_sentences(&self, evidence: &[Evidence<'_>]) -> Vec<Candidate> {
        evidence
            .iter()
            .take(self.options.fallback_chunks)
            .flat_map(|hit| {
                self.splitter
                    .split(hit.text)
                    .into_iter()
                    .take(self.options.fallback_sentences)
                    .map(move |sentence| Candidate {
                        sentence,
                        weight: hit.score,
                    })
            })
            .collect()
    }
}

// ============================================================================
// Text Helpers
// ============================================================================

/// 토큰 시그니처 기준 중복 제거 (시그니처가 3자 미만이면 버림)
fn dedupe(candidates: Vec<Candidate>, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();

    for candidate in candidates {
        if unique.len() >= limit {
            break;
        }
        let signature = tokenize(&candidate.sentence).join(" ");
        if signature.chars().count() < 3 {
            continue;
        }
        if seen.insert(signature) {
            unique.push(candidate.sentence);
        }
    }

    unique
}

fn parenthetical() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\([^)]*\)").expect("Invalid regex"))
}

fn qa_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b[QA]\s*:\s*").expect("Invalid regex"))
}

/// 가벼운 압축: 괄호 속 부연 제거, 구두점 앞 공백 정리
fn compress(sentence: &str) -> String {
    let without_asides = parenthetical().replace_all(sentence, " ");
    collapse_whitespace(&without_asides)
        .replace(" ,", ",")
        .replace(" ;", ";")
        .replace(" .", ".")
}

/// Q&A 원문의 `Q:` / `A:` 표식 제거
fn strip_qa_markers(text: &str) -> String {
    collapse_whitespace(&qa_marker().replace_all(text, ""))
}

/// 단어 수 제한 (초과 시 `max_words - 1` 단어 + `…`)
pub fn limit_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if max_words == 0 || words.len() <= max_words {
        return words.join(" ");
    }

    let mut out = words[..max_words - 1].join(" ");
    out.push('…');
    out
}

// ============================================================================
// Tests
// ============================================================================
