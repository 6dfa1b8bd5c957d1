//! CSV / JSON → 평문
//!
//! 대화 예시(user/assistant) 형태면 `Q: ...\nA: ...` 쌍으로 바꾸고,
//! 각 쌍은 빈 줄로 구분해 청커가 문단으로 나누게 합니다.

use serde_json::Value;

fn qa_pair(question: &str, answer: &str) -> String {
    format!("Q: {}\nA: {}", question.trim(), answer.trim())
}

/// CSV 변환
///
/// 헤더에 `user`, `assistant` 열이 모두 있으면 행마다 Q/A 쌍을 만들고,
/// 아니면 원문을 그대로 돌려줍니다. 따옴표 안의 쉼표는 처리하지 않습니다.
pub fn csv_to_text(csv: &str) -> String {
    let mut lines = csv.lines().filter(|l| !l.trim().is_empty());

    let Some(header) = lines.next() else {
        return String::new();
    };

    let columns: Vec<String> = header.split(',').map(|c| c.trim().to_lowercase()).collect();
    let user = columns.iter().position(|c| c == "user");
    let assistant = columns.iter().position(|c| c == "assistant");

    let (Some(user), Some(assistant)) = (user, assistant) else {
        return csv.to_string();
    };

    lines
        .map(|line| {
            let cells: Vec<&str> = line.split(',').collect();
            let cell = |i: usize| cells.get(i).copied().unwrap_or("");
            qa_pair(cell(user), cell(assistant))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// JSON 변환
///
/// - 배열: `{user|question, assistant|answer}` 객체는 Q/A 쌍, 나머지는 문자열화
/// - `{ "examples": [...] }`: 배열과 동일
/// - 그 외: 들여쓴 JSON
pub fn json_to_text(value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .map(json_item_to_text)
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"),
        Value::Object(map) => match map.get("examples") {
            Some(examples @ Value::Array(_)) => json_to_text(examples),
            _ => serde_json::to_string_pretty(value).unwrap_or_default(),
        },
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_item_to_text(item: &Value) -> String {
    if let Value::Object(map) = item {
        let field = |names: [&str; 2]| {
            names
                .iter()
                .find_map(|n| map.get(*n).and_then(Value::as_str))
        };

        if map.contains_key("user") || map.contains_key("question") {
            let question = field(["user", "question"]).unwrap_or("");
            let answer = field(["assistant", "answer"]).unwrap_or("");
            return qa_pair(question, answer);
        }
    }

    match item {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
