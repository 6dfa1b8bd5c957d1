//! Anti-echo 가드
//!
//! 내부 지침(system prompt, goal, notes)의 토큰 집합입니다. 문장 토큰 중
//! 가드에 포함된 비율이 임계값 이상이면 그 문장은 내부 텍스트를 되풀이하는 것으로 봅니다.

use std::collections::HashSet;

use crate::knowledge::{token_set, tokenize};

/// 기본 에코 판정 비율
pub const ECHO_RATIO: f32 = 0.65;

/// 보호 대상 텍스트의 토큰 집합
#[derive(Debug, Clone, Default)]
pub struct GuardSet {
    tokens: HashSet<String>,
    ratio: f32,
}

impl GuardSet {
    pub fn new(guard_text: &str) -> Self {
        Self::with_ratio(guard_text, ECHO_RATIO)
    }

    pub fn with_ratio(guard_text: &str, ratio: f32) -> Self {
        Self {
            tokens: token_set(guard_text),
            ratio,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// 문장 토큰 중 가드에 속한 비율 (토큰이 없으면 0)
    pub fn overlap_ratio(&self, sentence: &str) -> f32 {
        let tokens = tokenize(sentence);
        if tokens.is_empty() || self.tokens.is_empty() {
            return 0.0;
        }

        let shared = tokens.iter().filter(|t| self.tokens.contains(*t)).count();
        shared as f32 / tokens.len() as f32
    }

    /// 내부 텍스트를 되풀이하는 문장인지
    pub fn is_echo(&self, sentence: &str) -> bool {
        !self.tokens.is_empty() && self.overlap_ratio(sentence) >= self.ratio
    }
}
