//! Lexical Normalizer - 텍스트를 검색용 토큰으로 정규화
//!
//! 소문자 변환 → NFD 분해 후 발음 구별 기호 제거 → 허용 문자 외에는 공백 치환 → 공백 분할.
//! "café"와 "cafe"는 같은 토큰이 됩니다.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// 텍스트를 토큰 시퀀스로 변환
///
/// 순수 함수이며 빈 입력은 빈 시퀀스를 반환합니다.
pub fn tokenize(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let cleaned: String = text
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if is_token_char(c) { c } else { ' ' })
        .collect();

    cleaned.split_whitespace().map(str::to_string).collect()
}

/// 토큰 집합 (중복 제거)
pub fn token_set(text: &str) -> std::collections::HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// 연속 공백을 하나로 정리
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[inline]
fn is_token_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \n\t ").is_empty());
    }

    #[test]
    fn test_tokenize_strips_accents() {
        assert_eq!(tokenize("Café"), tokenize("cafe"));
        assert_eq!(tokenize("Atención"), vec!["atencion"]);
        assert_eq!(tokenize("AÑO pingüino"), vec!["ano", "pinguino"]);

        // 이미 조합된 문자든 분해된 입력이든 결과는 ASCII
        let tokens = tokenize("ÁÉÍÓÚ áéíóú ñ ü n\u{303}");
        assert_eq!(tokens, vec!["aeiou", "aeiou", "n", "u", "n"]);
        assert!(tokens.iter().all(|t| t.is_ascii()));
    }

    #[test]
    fn test_tokenize_replaces_punctuation() {
        assert_eq!(
            tokenize("Hola, ¿qué tal? <b>bien</b>!"),
            vec!["hola", "que", "tal", "b", "bien", "b"]
        );
        assert_eq!(tokenize("8:00 a.m."), vec!["8", "00", "a", "m"]);
    }

    #[test]
    fn test_tokenize_drops_non_latin_letters() {
        assert_eq!(tokenize("precio 가격 price"), vec!["precio", "price"]);
    }

    #[test]
    fn test_tokenize_idempotent() {
        let samples = [
            "Atendemos de lunes a sábado de 8:00 a.m. a 6:00 p.m.",
            "Responde en español de Colombia, claro y breve.",
            "ÁÉÍÓÚ ñandú -- (paréntesis) [corchetes] {llaves}",
            "",
        ];

        for text in samples {
            let once = tokenize(text);
            let twice = tokenize(&once.join(" "));
            assert_eq!(once, twice, "not idempotent for {:?}", text);
        }
    }

    #[test]
    fn test_token_set_dedupes() {
        let set = token_set("de la casa de la playa");
        assert_eq!(set.len(), 4);
        assert!(set.contains("playa"));
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\n b\tc  "), "a b c");
        assert_eq!(collapse_whitespace(""), "");
    }
}
