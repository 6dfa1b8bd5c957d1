//! Text Chunking Module
//!
//! 문단 경계를 존중하면서 겹치는(overlap) 청크로 텍스트를 나눕니다.
//! 인접 청크가 문맥을 공유하므로 경계 근처 문장의 검색 재현율이 올라갑니다.

use regex::Regex;
use std::sync::OnceLock;

use super::tokenizer::collapse_whitespace;

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
///
/// 길이는 모두 문자(char) 단위입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// 최대 청크 크기
    pub max_characters: usize,
    /// 이전 청크에서 이어받는 꼬리 길이
    pub overlap_characters: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_characters: 900,
            overlap_characters: 180,
        }
    }
}

impl ChunkConfig {
    /// 설정 생성
    ///
    /// overlap이 max 이상이면 max/2로 줄입니다 (고정 보폭 분할이 진행되도록).
    pub fn new(max_characters: usize, overlap_characters: usize) -> Self {
        let max_characters = max_characters.max(1);
        let overlap_characters = if overlap_characters >= max_characters {
            max_characters / 2
        } else {
            overlap_characters
        };

        Self {
            max_characters,
            overlap_characters,
        }
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// ParagraphChunker
// ============================================================================

/// 문단 인식 청커
///
/// - 빈 줄로 문단 분리
/// - `max_characters`를 넘기 전까지 문단을 버퍼에 누적
/// - 플러시 후 다음 버퍼는 이전 버퍼의 꼬리 `overlap_characters`로 시작
/// - 문단 구분이 없는 긴 텍스트는 고정 보폭 슬라이싱
///
/// 한 문단이 `max_characters`보다 길면 내용을 잃지 않도록 그대로 내보냅니다.
pub struct ParagraphChunker {
    config: ChunkConfig,
}

impl ParagraphChunker {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Self {
        Self {
            config: ChunkConfig::new(config.max_characters, config.overlap_characters),
        }
    }

    /// 기본 설정으로 생성
    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    pub fn config(&self) -> ChunkConfig {
        self.config
    }

    /// 빈 줄 기준으로 문단 분할 (문단 내부 공백은 정리)
    fn split_paragraphs(&self, text: &str) -> Vec<String> {
        paragraph_break()
            .split(text)
            .map(collapse_whitespace)
            .filter(|p| !p.is_empty())
            .collect()
    }

    /// 문단 누적 + 오버랩
    fn accumulate(&self, paragraphs: Vec<String>) -> Vec<String> {
        let max = self.config.max_characters;
        let mut chunks = Vec::new();
        let mut buffer = String::new();
        let mut buffer_len = 0usize;

        for para in paragraphs {
            let para_len = para.chars().count();
            let joined_len = if buffer.is_empty() {
                para_len
            } else {
                buffer_len + 1 + para_len
            };

            if joined_len <= max {
                if !buffer.is_empty() {
                    buffer.push(' ');
                }
                buffer.push_str(&para);
                buffer_len = joined_len;
                continue;
            }

            // 플러시 후 꼬리를 이어받아 새 버퍼 시작
            let carried = if buffer.is_empty() {
                String::new()
            } else {
                let tail = overlap_tail(&buffer, self.config.overlap_characters);
                chunks.push(std::mem::take(&mut buffer));
                fit_carried(tail, para_len, max)
            };

            buffer = if carried.is_empty() {
                para
            } else {
                format!("{} {}", carried, para)
            };
            buffer_len = buffer.chars().count();
        }

        if !buffer.is_empty() {
            chunks.push(buffer);
        }

        chunks
    }
}

impl Chunker for ParagraphChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }

        let paragraphs = self.split_paragraphs(text);

        // 문단 구분 없이 긴 텍스트 → 고정 보폭
        if paragraphs.len() == 1 && paragraphs[0].chars().count() > self.config.max_characters {
            return chunk_by_stride(
                &paragraphs[0],
                self.config.max_characters,
                self.config.overlap_characters,
            );
        }

        self.accumulate(paragraphs)
    }

    fn name(&self) -> &'static str {
        "ParagraphChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn paragraph_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\r?\n[ \t\r]*\n").expect("Invalid regex"))
}

/// 고정 보폭 슬라이싱
///
/// `max_characters` 길이 창을 `max - overlap`씩 전진시킵니다.
pub fn chunk_by_stride(text: &str, max_characters: usize, overlap_characters: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![];
    }

    let config = ChunkConfig::new(max_characters, overlap_characters);
    if chars.len() <= config.max_characters {
        return vec![text.to_string()];
    }

    let stride = config.max_characters - config.overlap_characters;
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + config.max_characters).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim().to_string();
        if !chunk.is_empty() {
            chunks.push(chunk);
        }

        if end >= chars.len() {
            break;
        }
        start += stride;
    }

    chunks
}

/// 버퍼의 마지막 `overlap`자를 단어 경계에 맞춰 반환
fn overlap_tail(buffer: &str, overlap: usize) -> String {
    if overlap == 0 {
        return String::new();
    }

    let total = buffer.chars().count();
    let skip = total.saturating_sub(overlap);
    let mut tail: String = buffer.chars().skip(skip).collect();

    // 단어 중간에서 잘렸으면 다음 단어부터
    let cut_mid_word = skip > 0
        && buffer
            .chars()
            .nth(skip - 1)
            .map(|c| !c.is_whitespace())
            .unwrap_or(false);

    if cut_mid_word {
        if let Some(pos) = tail.find(char::is_whitespace) {
            tail = tail[pos..].to_string();
        }
    }

    tail.trim().to_string()
}

/// 이어받은 꼬리가 새 문단과 합쳐 `max`를 넘으면 단어 경계에 맞춰 줄이고, 자리가 없으면 버림
fn fit_carried(carried: String, para_len: usize, max: usize) -> String {
    if carried.is_empty() {
        return carried;
    }

    let budget = max.saturating_sub(para_len + 1);
    if carried.chars().count() <= budget {
        carried
    } else {
        overlap_tail(&carried, budget)
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 기본 청커 생성
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(ParagraphChunker::with_defaults())
}

/// 설정을 지정한 문단 청커 생성
pub fn paragraph_chunker(config: ChunkConfig) -> Box<dyn Chunker> {
    Box::new(ParagraphChunker::new(config))
}

// ============================================================================
// Tests
// ============================================================================
