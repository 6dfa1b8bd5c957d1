//! 문장 분리기
//!
//! 교체 가능한 전략 트레이트입니다. 기본 구현은 구두점 휴리스틱:
//! `.`, `?`, `!` 뒤에 공백이 오고 그 다음 글자가 대문자이면 문장 경계로 봅니다.
//! 드문 약어보다 경계 위치의 정확도를 우선합니다.

use crate::knowledge::collapse_whitespace;

/// 문장 분리 전략
pub trait SentenceSplitter: Send + Sync {
    /// 텍스트를 문장 단위로 분리 (빈 문장 없음)
    fn split(&self, text: &str) -> Vec<String>;

    /// 분리기 이름
    fn name(&self) -> &'static str;
}

/// 구두점 + 대문자 휴리스틱 분리기
#[derive(Debug, Clone, Copy, Default)]
pub struct PunctuationSplitter;

impl PunctuationSplitter {
    pub fn new() -> Self {
        Self
    }
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '?' | '!')
}

/// 문장 시작으로 인정하는 글자 (스페인어 여는 부호 포함)
fn starts_sentence(c: char) -> bool {
    c.is_uppercase() || matches!(c, '¿' | '¡')
}

impl SentenceSplitter for PunctuationSplitter {
    fn split(&self, text: &str) -> Vec<String> {
        let text = collapse_whitespace(text);
        if text.is_empty() {
            return Vec::new();
        }

        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut sentences = Vec::new();
        let mut start = 0usize;

        // 공백이 정규화되어 있으므로 경계는 항상 "구두점 + 공백 1개 + 다음 글자"
        for w in chars.windows(3) {
            let (_, punct) = w[0];
            let (space_at, space) = w[1];
            let (next_at, next) = w[2];

            if is_terminal(punct) && space == ' ' && starts_sentence(next) {
                let sentence = text[start..space_at].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                start = next_at;
            }
        }

        let tail = text[start..].trim();
        if !tail.is_empty() {
            sentences.push(tail.to_string());
        }

        sentences
    }

    fn name(&self) -> &'static str {
        "punctuation"
    }
}

/// 기본 분리기
pub fn default_splitter() -> Box<dyn SentenceSplitter> {
    Box::new(PunctuationSplitter::new())
}
