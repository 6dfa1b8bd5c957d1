//! 콘텐츠 추출 모듈
//!
//! 수집 경계(비동기)입니다. 코어는 이미 디코딩된 평문과 출처 라벨만 받습니다.
//! - 텍스트 / 마크다운: 그대로 읽기
//! - CSV / JSON: Q/A 쌍으로 변환
//! - HTML: 본문 텍스트만
//! - PDF: pdf-extract (spawn_blocking)
//! - DOCX: word/document.xml 문단 (spawn_blocking)

pub mod docx;
pub mod pdf;
pub mod structured;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::collector::{CollectedFile, FileCollector, FileType};
use crate::error::RagError;

pub use structured::{csv_to_text, json_to_text};

// ============================================================================
// Loader Trait
// ============================================================================

/// 로더가 돌려주는 평문 + 출처
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedText {
    pub source: String,
    pub text: String,
}

/// 문서 로더 (유일한 비동기 경계)
#[async_trait]
pub trait TextLoader: Send + Sync {
    /// 대상(경로, URL 등)을 읽어 평문 목록으로
    async fn load(&self, target: &str) -> Result<Vec<LoadedText>>;

    /// 로더 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// Content Extractor
// ============================================================================

/// 파일 형식별 텍스트 추출기
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentExtractor;

impl ContentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 파일에서 평문 추출
    pub async fn extract(&self, path: &Path, file_type: FileType) -> Result<String> {
        match file_type {
            FileType::Text => read_text(path).await,
            FileType::Csv => Ok(csv_to_text(&read_text(path).await?)),
            FileType::Json => {
                let raw = read_text(path).await?;
                let value: serde_json::Value = serde_json::from_str(&raw)
                    .with_context(|| format!("Invalid JSON: {:?}", path))?;
                Ok(json_to_text(&value))
            }
            FileType::Html => Ok(crate::scraper::html_to_text(&read_text(path).await?)),
            FileType::Pdf => {
                // CPU 바운드이므로 spawn_blocking 사용
                let path = path.to_path_buf();
                tokio::task::spawn_blocking(move || pdf::extract_text_from_pdf(&path))
                    .await
                    .context("PDF extraction task failed")?
            }
            FileType::Docx => {
                let path = path.to_path_buf();
                tokio::task::spawn_blocking(move || docx::extract_text_from_docx(&path))
                    .await
                    .context("DOCX extraction task failed")?
            }
        }
    }
}

async fn read_text(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read file: {:?}", path))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// ============================================================================
// File Loader
// ============================================================================

/// 파일 / 폴더 로더
///
/// 폴더는 재귀적으로 수집하며, 실패한 파일은 경고 후 건너뜁니다.
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    collector: FileCollector,
    extractor: ContentExtractor,
}

impl FileLoader {
    pub fn new(collector: FileCollector) -> Self {
        Self {
            collector,
            extractor: ContentExtractor::new(),
        }
    }

    async fn load_file(&self, file: &CollectedFile) -> Result<LoadedText> {
        let text = self.extractor.extract(&file.path, file.file_type).await?;
        Ok(LoadedText {
            source: file.source_label(),
            text,
        })
    }
}

#[async_trait]
impl TextLoader for FileLoader {
    async fn load(&self, target: &str) -> Result<Vec<LoadedText>> {
        let path = PathBuf::from(target);

        if path.is_dir() {
            let files = self.collector.collect_directory(&path)?;
            let mut loaded = Vec::with_capacity(files.len());

            for file in &files {
                match self.load_file(file).await {
                    Ok(text) => loaded.push(text),
                    Err(e) => tracing::warn!("Skipping {:?}: {:#}", file.path, e),
                }
            }
            return Ok(loaded);
        }

        let file = self
            .collector
            .collect_file(&path)?
            .ok_or_else(|| RagError::UnsupportedFile(path.clone()))?;

        Ok(vec![self.load_file(&file).await?])
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

// ============================================================================
// Tests
// ============================================================================
