//! Retriever - 쿼리와 청크 벡터 간 코사인 유사도 순위
//!
//! 점수 내림차순으로 정렬하고, 동점이면 원래 청크 인덱스가 작은 쪽이 먼저 옵니다.
//! 상위 `top_k`개를 자른 뒤 `threshold` 미만을 버립니다 (경계값은 포함).

use serde::Serialize;

use super::index::{cosine_similarity, TfIdfModel};

/// 검색 결과 한 건 (쿼리마다 새로 생성)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RetrievalHit {
    /// 코퍼스 내 청크 인덱스
    pub chunk_index: usize,
    /// 유사도 (0.0 ~ 1.0)
    pub score: f32,
}

/// 검색 실행
///
/// 모델이 비어 있으면 빈 결과를 돌려줍니다. 잘못된 인자는 한 번 더 보정합니다:
/// `top_k`는 최소 1, `threshold`는 `[0, 1]` (NaN은 0).
pub fn retrieve(model: &TfIdfModel, query: &str, top_k: usize, threshold: f32) -> Vec<RetrievalHit> {
    if model.vectors().is_empty() {
        return Vec::new();
    }

    let top_k = top_k.max(1);
    let threshold = if threshold.is_nan() {
        0.0
    } else {
        threshold.clamp(0.0, 1.0)
    };

    let query_vector = model.vectorize(query);

    let mut hits: Vec<RetrievalHit> = model
        .vectors()
        .iter()
        .enumerate()
        .map(|(chunk_index, vector)| RetrievalHit {
            chunk_index,
            score: cosine_similarity(&query_vector, vector),
        })
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.chunk_index.cmp(&b.chunk_index))
    });
    hits.truncate(top_k);
    hits.retain(|hit| hit.score >= threshold);

    tracing::debug!(
        "Retrieved {} hits for {:?} (top_k={}, threshold={})",
        hits.len(),
        query,
        top_k,
        threshold
    );

    hits
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieve_empty_model() {
        let model = TfIdfModel::build::<&str>(&[]);
        assert!(retrieve(&model, "precio", 3, 0.0).is_empty());
    }

    #[test]
    fn test_self_retrieval() {
        let text = "Atendemos de lunes a sábado de 8:00 a.m. a 6:00 p.m.";
        let model = TfIdfModel::build(&[text]);

        let hits = retrieve(&model, text, 3, 0.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_index, 0);
        assert!(hits[0].score >= 0.99);
    }

    #[test]
    fn test_disjoint_vocabularies_threshold() {
        let model = TfIdfModel::build(&[
            "manzanas peras uvas frutas",
            "tornillos tuercas martillo herramientas",
        ]);

        let hits = retrieve(&model, "martillo y tornillos", 2, 0.3);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_index, 1);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let model = TfIdfModel::build(&["uno dos tres", "cuatro cinco seis", "uno cinco"]);
        let query = "uno cinco";

        let all = retrieve(&model, query, 3, 0.0);
        let last = all.last().copied().unwrap();
        assert!(last.score > 0.0);

        let exact = retrieve(&model, query, 3, last.score);
        assert!(exact.iter().any(|h| h.chunk_index == last.chunk_index));
        assert_eq!(exact.len(), all.len());
    }

    #[test]
    fn test_ties_broken_by_chunk_index() {
        let model = TfIdfModel::build(&["perro gato", "gato perro", "perro gato"]);
        let hits = retrieve(&model, "perro gato", 3, 0.0);

        let order: Vec<usize> = hits.iter().map(|h| h.chunk_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_top_k_limits_and_orders() {
        let model = TfIdfModel::build(&[
            "precio precio precio",
            "precio envio",
            "envio gratis",
            "horario",
        ]);

        let hits = retrieve(&model, "precio", 2, 0.0);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_index, 0);
        assert_eq!(hits[1].chunk_index, 1);
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_invalid_arguments_are_clamped() {
        let model = TfIdfModel::build(&["hola mundo", "adios mundo"]);

        let zero_k = retrieve(&model, "hola", 0, 0.0);
        assert_eq!(zero_k.len(), 1);

        let nan = retrieve(&model, "hola", 2, f32::NAN);
        assert_eq!(nan.len(), 2);

        let above_one = retrieve(&model, "hola", 2, 7.5);
        assert!(above_one.iter().all(|h| h.score >= 1.0));
    }

    #[test]
    fn test_empty_query_yields_zero_scores() {
        let model = TfIdfModel::build(&["hola mundo"]);
        let hits = retrieve(&model, "", 1, 0.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, 0.0);
        assert!(retrieve(&model, "", 1, 0.1).is_empty());
    }

    #[test]
    fn test_ranking_is_reproducible() {
        let texts = ["alfa beta", "beta gama", "gama delta alfa"];
        let a = retrieve(&TfIdfModel::build(&texts), "alfa gama", 3, 0.0);
        let b = retrieve(&TfIdfModel::build(&texts), "alfa gama", 3, 0.0);

        let bits = |hits: &[RetrievalHit]| -> Vec<(usize, u32)> {
            hits.iter().map(|h| (h.chunk_index, h.score.to_bits())).collect()
        };
        assert_eq!(bits(&a), bits(&b));
    }
}
