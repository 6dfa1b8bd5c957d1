//! 도메인 에러 타입
//!
//! 코어 파이프라인(토큰화, 인덱싱, 검색, 합성)은 실패하지 않고 상태값을 돌려줍니다.
//! 여기 정의된 에러는 입력 경계(레코드 복원, 설정, 파일 형식)에서만 발생합니다.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// `{id, source, text}` 형태가 아닌 코퍼스 레코드
    #[error("Invalid corpus record: {0}")]
    InvalidRecord(String),

    /// 알 수 없는 설정 키 또는 파싱 불가능한 값
    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    /// 지원하지 않는 파일 형식
    #[error("Unsupported file type: {0:?}")]
    UnsupportedFile(PathBuf),

    /// 잘못된 URL
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl RagError {
    pub fn invalid_setting(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

pub type RagResult<T> = std::result::Result<T, RagError>;
