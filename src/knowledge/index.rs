//! TF-IDF 인덱스 - 청크 벡터 공간 모델
//!
//! 평활화된 TF-IDF:
//! - `tf = c / L` (청크 내 등장 횟수 / 청크 토큰 수)
//! - `idf = ln((N + 1) / df) + 1`
//! - 가중치 `tf * idf`를 L2 정규화
//!
//! 모든 가중치가 음수가 아니므로 코사인 유사도는 항상 `[0, 1]` 범위입니다.
//! 매 학습마다 어휘를 통째로 다시 만들며 증분 갱신은 하지 않습니다.

use std::collections::HashMap;

use super::tokenizer::tokenize;

// ============================================================================
// Vocabulary
// ============================================================================

/// 토큰 → 밀집 인덱스 (처음 등장한 순서)
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    ids: HashMap<String, usize>,
    terms: Vec<String>,
}

impl Vocabulary {
    fn insert(&mut self, token: &str) -> usize {
        if let Some(&id) = self.ids.get(token) {
            return id;
        }
        let id = self.terms.len();
        self.ids.insert(token.to_string(), id);
        self.terms.push(token.to_string());
        id
    }

    pub fn get(&self, token: &str) -> Option<usize> {
        self.ids.get(token).copied()
    }

    pub fn term(&self, id: usize) -> Option<&str> {
        self.terms.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

// ============================================================================
// TfIdfModel
// ============================================================================

/// 학습된 벡터 공간 모델
///
/// `vectors[i]`는 학습에 사용된 i번째 청크와 1:1로 정렬됩니다.
#[derive(Debug, Clone)]
pub struct TfIdfModel {
    vocabulary: Vocabulary,
    /// 토큰별 문서 빈도 (어휘 인덱스 정렬)
    document_frequency: Vec<u32>,
    /// 토큰별 idf (어휘 인덱스 정렬)
    idf: Vec<f32>,
    vectors: Vec<Vec<f32>>,
    document_count: usize,
}

impl TfIdfModel {
    /// 청크 텍스트들로 모델 학습
    ///
    /// 같은 입력이면 항상 같은 벡터를 만듭니다 (해시 순회 순서에 의존하지 않음).
    pub fn build<S: AsRef<str>>(texts: &[S]) -> Self {
        let docs: Vec<Vec<String>> = texts.iter().map(|t| tokenize(t.as_ref())).collect();

        let mut vocabulary = Vocabulary::default();
        let mut document_frequency: Vec<u32> = Vec::new();

        for tokens in &docs {
            let mut seen = vec![false; vocabulary.len()];
            for token in tokens {
                let id = vocabulary.insert(token);
                if id >= document_frequency.len() {
                    document_frequency.push(0);
                }
                if id >= seen.len() {
                    seen.resize(id + 1, false);
                }
                if !seen[id] {
                    seen[id] = true;
                    document_frequency[id] += 1;
                }
            }
        }

        let document_count = docs.len();
        let idf: Vec<f32> = document_frequency
            .iter()
            .map(|&df| smoothed_idf(document_count, df))
            .collect();

        let mut model = Self {
            vocabulary,
            document_frequency,
            idf,
            vectors: Vec::with_capacity(document_count),
            document_count,
        };

        let vectors: Vec<Vec<f32>> = docs.iter().map(|tokens| model.weigh(tokens)).collect();
        model.vectors = vectors;

        tracing::debug!(
            "Built TF-IDF model: {} chunks, {} terms",
            model.document_count,
            model.vocabulary.len()
        );

        model
    }

    /// 쿼리 텍스트를 같은 벡터 공간으로 투영
    ///
    /// 학습 때 보지 못한 토큰은 조용히 무시됩니다.
    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        self.weigh(&tokenize(text))
    }

    /// 토큰 시퀀스 → 정규화된 TF-IDF 벡터
    fn weigh(&self, tokens: &[String]) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.vocabulary.len()];
        if tokens.is_empty() {
            return vector;
        }

        for token in tokens {
            if let Some(id) = self.vocabulary.get(token) {
                vector[id] += 1.0;
            }
        }

        let length = tokens.len() as f32;
        for (id, weight) in vector.iter_mut().enumerate() {
            if *weight > 0.0 {
                *weight = (*weight / length) * self.idf[id];
            }
        }

        normalize(&mut vector);
        vector
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    pub fn vector(&self, index: usize) -> Option<&[f32]> {
        self.vectors.get(index).map(Vec::as_slice)
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// 토큰의 문서 빈도
    pub fn document_frequency(&self, token: &str) -> Option<u32> {
        self.vocabulary
            .get(token)
            .and_then(|id| self.document_frequency.get(id).copied())
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// `ln((N + 1) / df) + 1`
fn smoothed_idf(document_count: usize, df: u32) -> f32 {
    let df = df.max(1) as f64;
    (((document_count as f64 + 1.0) / df).ln() + 1.0) as f32
}

/// L2 정규화 (영벡터는 그대로)
fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|w| w * w).sum::<f32>().sqrt();
    if norm > 0.0 {
        for w in vector.iter_mut() {
            *w /= norm;
        }
    }
}

/// 정규화된 두 벡터의 코사인 유사도 (내적)
///
/// 길이가 다르거나 비어 있으면 0.0, 결과는 `[0, 1]`로 고정합니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    if dot.is_nan() {
        return 0.0;
    }
    dot.clamp(0.0, 1.0)
}

/// 벡터의 유클리드 노름
pub fn euclidean_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|w| w * w).sum::<f32>().sqrt()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> TfIdfModel {
        TfIdfModel::build(&[
            "Atendemos de lunes a sábado de 8:00 a.m. a 6:00 p.m.",
            "El precio del plan básico es de 100 dólares.",
            "Hacemos envíos a todo el país.",
            "",
        ])
    }

    #[test]
    fn test_vocabulary_first_seen_order() {
        let model = TfIdfModel::build(&["b a", "c a"]);
        assert_eq!(model.vocabulary().get("b"), Some(0));
        assert_eq!(model.vocabulary().get("a"), Some(1));
        assert_eq!(model.vocabulary().get("c"), Some(2));
        assert_eq!(model.vocabulary().term(2), Some("c"));
    }

    #[test]
    fn test_document_frequency_counts_once_per_chunk() {
        let model = TfIdfModel::build(&["a a a b", "a c"]);
        assert_eq!(model.document_frequency("a"), Some(2));
        assert_eq!(model.document_frequency("b"), Some(1));
        assert_eq!(model.document_frequency("zzz"), None);
    }

    #[test]
    fn test_idf_formula() {
        // N = 2, df = 2 → ln(3/2) + 1
        let expected = ((3.0f64 / 2.0).ln() + 1.0) as f32;
        assert!((smoothed_idf(2, 2) - expected).abs() < 1e-6);
        // 모든 청크에 등장해도 양수
        assert!(smoothed_idf(5, 5) > 0.0);
    }

    #[test]
    fn test_vectors_are_normalized() {
        let model = sample_model();
        for (i, vector) in model.vectors().iter().enumerate() {
            let norm = euclidean_norm(vector);
            if i == 3 {
                assert_eq!(norm, 0.0, "empty chunk must be a zero vector");
            } else {
                assert!((norm - 1.0).abs() < 1e-4, "chunk {} norm {}", i, norm);
            }
        }
    }

    #[test]
    fn test_vectors_are_index_aligned() {
        let model = sample_model();
        assert_eq!(model.vectors().len(), 4);
        assert_eq!(model.document_count(), 4);
        assert!(model.vectors().iter().all(|v| v.len() == model.vocabulary().len()));
    }

    #[test]
    fn test_vectorize_drops_unknown_tokens() {
        let model = sample_model();
        let known = model.vectorize("precio");
        let mixed = model.vectorize("precio xyzzy quux");

        assert!((euclidean_norm(&known) - 1.0).abs() < 1e-4);
        assert!((cosine_similarity(&known, &mixed) - 1.0).abs() < 1e-4);

        let unknown = model.vectorize("xyzzy quux");
        assert_eq!(euclidean_norm(&unknown), 0.0);
    }

    #[test]
    fn test_similarity_bounds() {
        let model = sample_model();
        let queries = ["precio", "horario de atención", "", "envíos país precio lunes", "???"];

        for query in queries {
            let qv = model.vectorize(query);
            for vector in model.vectors() {
                let sim = cosine_similarity(&qv, vector);
                assert!((0.0..=1.0).contains(&sim), "{} out of bounds", sim);
            }
        }
    }

    #[test]
    fn test_self_similarity() {
        let model = sample_model();
        let v = model.vector(1).unwrap();
        assert!((cosine_similarity(v, v) - 1.0).abs() < 1e-4);

        let zero = model.vector(3).unwrap();
        assert_eq!(cosine_similarity(zero, zero), 0.0);
        assert_eq!(cosine_similarity(zero, v), 0.0);
    }

    #[test]
    fn test_build_is_deterministic() {
        let a = sample_model();
        let b = sample_model();

        for (va, vb) in a.vectors().iter().zip(b.vectors()) {
            let bits_a: Vec<u32> = va.iter().map(|w| w.to_bits()).collect();
            let bits_b: Vec<u32> = vb.iter().map(|w| w.to_bits()).collect();
            assert_eq!(bits_a, bits_b);
        }
    }

    #[test]
    fn test_cosine_similarity_mismatched_or_empty() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_empty_model() {
        let model = TfIdfModel::build::<&str>(&[]);
        assert!(model.vocabulary().is_empty());
        assert!(model.vectors().is_empty());
        assert!(model.vectorize("hola").is_empty());
    }
}
