//! CLI 모듈
//!
//! asistente-rag CLI 명령어 정의 및 구현.
//! 모델은 저장하지 않으므로 질의가 필요한 명령은 저장된 청크로 매번 다시 학습합니다.

mod chat;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::answer::AnswerResult;
use crate::config::{get_data_dir, Settings};
use crate::engine::{Engine, IndexState, ModelStatus};
use crate::extractor::{FileLoader, LoadedText, TextLoader};
use crate::knowledge::{export_json, import_json, KnowledgeStore};
use crate::scraper::WebScraper;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "asistente-rag")]
#[command(version, about = "로컬 TF-IDF 검색 + 답변 합성 어시스턴트", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// URL, 파일, 폴더, 또는 텍스트를 코퍼스에 추가
    Ingest {
        /// 수집할 URL
        #[arg(short, long)]
        url: Option<String>,

        /// 직접 입력할 텍스트
        #[arg(short, long)]
        text: Option<String>,

        /// 수집할 파일 경로
        #[arg(long)]
        file: Option<PathBuf>,

        /// 수집할 폴더 경로 (재귀)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// 출처 라벨 (기본: 파일명 / URL)
        #[arg(short, long)]
        source: Option<String>,
    },

    /// 저장된 청크로 인덱스 학습 후 상태 출력 (모델은 저장되지 않으며 ask/search/chat은 시작할 때 다시 학습)
    Train,

    /// 질문하기 (저장된 청크 전체로 다시 학습한 뒤 답변, auto_train과 무관)
    Ask {
        /// 질문
        query: String,

        /// 검색 결과 수 (1 ~ 6)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// 최소 유사도 (0.0 ~ 1.0)
        #[arg(short, long)]
        threshold: Option<f32>,

        /// JSON으로 출력
        #[arg(long)]
        json: bool,
    },

    /// 코퍼스 검색 (임계값 없이 점수 순)
    Search {
        /// 검색 쿼리
        query: String,

        /// 결과 개수
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// 출처별 요약
    Sources,

    /// 최근 청크 목록
    List {
        /// 출처 필터
        #[arg(short, long)]
        source: Option<String>,

        /// 본문에 포함된 문자열 (대소문자 무시)
        #[arg(short, long)]
        contains: Option<String>,

        /// 결과 개수 제한
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// 코퍼스를 JSON으로 내보내기
    Export {
        /// 출력 파일
        path: PathBuf,
    },

    /// JSON 코퍼스 가져오기
    Import {
        /// 입력 파일
        path: PathBuf,
    },

    /// 설정 보기 / 변경
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// 코퍼스 전체 삭제
    Reset {
        /// 확인 없이 삭제
        #[arg(long)]
        yes: bool,
    },

    /// 상태 확인
    Status,

    /// 대화형 모드
    Chat,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// 현재 설정 출력
    Show,
    /// 값 하나 변경
    Set { key: String, value: String },
    /// 기본값으로 초기화
    Reset,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Ingest {
            url,
            text,
            file,
            dir,
            source,
        } => cmd_ingest(url, text, file, dir, source).await,
        Commands::Train => cmd_train(),
        Commands::Ask {
            query,
            top_k,
            threshold,
            json,
        } => cmd_ask(&query, top_k, threshold, json),
        Commands::Search { query, limit } => cmd_search(&query, limit),
        Commands::Sources => cmd_sources(),
        Commands::List {
            source,
            contains,
            limit,
        } => match contains {
            Some(filter) => cmd_find(&filter, limit),
            None => cmd_list(source, limit),
        },
        Commands::Export { path } => cmd_export(&path),
        Commands::Import { path } => cmd_import(&path),
        Commands::Config { action } => cmd_config(action),
        Commands::Reset { yes } => cmd_reset(yes),
        Commands::Status => cmd_status(),
        Commands::Chat => chat::run_chat().await,
    }
}

// ============================================================================
// Workspace
// ============================================================================

/// 설정 + 저장소 + 복원된 엔진
pub(crate) struct Workspace {
    pub settings_path: PathBuf,
    pub store: KnowledgeStore,
    pub engine: Engine,
}

impl Workspace {
    pub fn open() -> Result<Self> {
        let settings_path = Settings::default_path();
        let settings = Settings::load(&settings_path).context("설정 로드 실패")?;
        let store = KnowledgeStore::open_default().context("KnowledgeStore 열기 실패")?;

        let mut engine = Engine::new(settings);
        let records = store.load_records().context("코퍼스 로드 실패")?;
        let report = engine.restore(records);
        if report.skipped > 0 {
            println!("[!] 손상된 레코드 {}건을 건너뛰었습니다", report.skipped);
        }

        Ok(Self {
            settings_path,
            store,
            engine,
        })
    }

    /// 로드된 텍스트를 코퍼스와 저장소에 추가, 생성된 청크 수 반환
    pub fn ingest_loaded(&mut self, loaded: Vec<LoadedText>, source: Option<&str>) -> Result<usize> {
        let mut total = 0;

        for item in loaded {
            let label = source.unwrap_or(&item.source);
            let created = self.engine.ingest(label, &item.text);
            if created.is_empty() {
                println!("[!] {}: 추출된 텍스트가 없습니다", label);
                continue;
            }

            self.store
                .append_chunks(&created)
                .with_context(|| format!("청크 저장 실패: {}", label))?;
            println!("[OK] {}: {} 청크", label, created.len());
            total += created.len();
        }

        Ok(total)
    }
}

/// 대상에 맞는 로더 (http/https면 웹, 아니면 파일)
pub(crate) fn loader_for(target: &str) -> Result<Box<dyn TextLoader>> {
    let lower = target.trim().to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(Box::new(WebScraper::new()?))
    } else {
        Ok(Box::new(FileLoader::default()))
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 수집 명령어 (ingest)
async fn cmd_ingest(
    url: Option<String>,
    text: Option<String>,
    file: Option<PathBuf>,
    dir: Option<PathBuf>,
    source: Option<String>,
) -> Result<()> {
    let mut ws = Workspace::open()?;

    let loaded = if let Some(text) = text {
        vec![LoadedText {
            source: "direct-input".to_string(),
            text,
        }]
    } else {
        let target = match (url, file, dir) {
            (Some(url), _, _) => url,
            (_, Some(path), _) | (_, _, Some(path)) => path.display().to_string(),
            _ => bail!("--url, --text, --file, --dir 중 하나를 지정해야 합니다"),
        };

        println!("[*] 불러오는 중: {}", target);
        let loader = loader_for(&target)?;
        loader
            .load(&target)
            .await
            .with_context(|| format!("{} 로더 실패: {}", loader.name(), target))?
    };

    if loaded.is_empty() {
        println!("[!] 수집할 문서가 없습니다.");
        return Ok(());
    }

    let total = ws.ingest_loaded(loaded, source.as_deref())?;
    println!();
    println!("[OK] 새 청크 {}개 (전체 {}개)", total, ws.engine.corpus().len());

    if ws.engine.settings().config.auto_train && total > 0 {
        print_status(&ws.engine.build_index());
    } else {
        println!("[*] `train`으로 인덱스를 학습하세요.");
    }

    Ok(())
}

/// 학습 명령어 (train)
fn cmd_train() -> Result<()> {
    let mut ws = Workspace::open()?;
    print_status(&ws.engine.build_index());
    Ok(())
}

/// 질문 명령어 (ask)
fn cmd_ask(query: &str, top_k: Option<usize>, threshold: Option<f32>, json: bool) -> Result<()> {
    let mut ws = Workspace::open()?;

    let mut settings = ws.engine.settings().clone();
    if let Some(k) = top_k {
        settings.config.top_k = k;
    }
    if let Some(t) = threshold {
        settings.config.threshold = t;
    }
    ws.engine.set_settings(settings);
    ws.engine.build_index();

    let result = ws.engine.ask(query);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("JSON 직렬화 실패")?
        );
    } else {
        print_answer(&result);
    }

    Ok(())
}

/// 검색 명령어 (search)
fn cmd_search(query: &str, limit: usize) -> Result<()> {
    let mut ws = Workspace::open()?;
    if !ws.engine.build_index().is_trained() {
        println!("[!] 코퍼스가 비어 있습니다.");
        return Ok(());
    }

    let hits = ws.engine.search(query, limit);
    println!("[OK] 검색 결과 ({} 건):\n", hits.len());

    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [점수: {:.4}] {}", i + 1, hit.score, hit.chunk.source);
        println!("   {}", truncate_text(&hit.chunk.text, 200));
        println!();
    }

    Ok(())
}

/// 출처 명령어 (sources)
fn cmd_sources() -> Result<()> {
    let ws = Workspace::open()?;
    let sources = ws.engine.sources();

    if sources.is_empty() {
        println!("[!] 저장된 출처가 없습니다.");
        return Ok(());
    }

    println!("[OK] 출처 ({} 건):\n", sources.len());
    for s in sources {
        println!("  {:<40} {:>4} 청크 | {} chars", truncate_text(&s.source, 40), s.chunks, s.chars);
    }

    Ok(())
}

/// 목록 명령어 (list)
fn cmd_list(source: Option<String>, limit: usize) -> Result<()> {
    let store = KnowledgeStore::open_default().context("KnowledgeStore 열기 실패")?;

    let chunks = store
        .list_recent(limit, source.as_deref())
        .context("청크 목록 조회 실패")?;

    if chunks.is_empty() {
        println!("[!] 저장된 청크가 없습니다.");
        return Ok(());
    }

    println!("[OK] 최근 청크 ({} 건):\n", chunks.len());

    for chunk in chunks {
        println!("  #{:<4} [{}] {}", chunk.seq, chunk.source, truncate_text(&chunk.text, 60));
        println!(
            "        {} | {} chars | {}",
            chunk.created_at.format("%Y-%m-%d %H:%M"),
            chunk.text.chars().count(),
            chunk.id
        );
        println!();
    }

    Ok(())
}

/// 본문 검색 목록 (list --contains)
fn cmd_find(filter: &str, limit: usize) -> Result<()> {
    let ws = Workspace::open()?;
    let matches = ws.engine.corpus().find(filter);

    if matches.is_empty() {
        println!("[!] '{}'을(를) 포함한 청크가 없습니다.", filter);
        return Ok(());
    }

    println!("[OK] 일치하는 청크 ({} 건):\n", matches.len());
    for chunk in matches.iter().rev().take(limit) {
        println!("  [{}] {}", chunk.source, truncate_text(&chunk.text, 60));
        println!("        {}", chunk.id);
    }

    Ok(())
}

/// 내보내기 명령어 (export)
fn cmd_export(path: &std::path::Path) -> Result<()> {
    let store = KnowledgeStore::open_default().context("KnowledgeStore 열기 실패")?;
    let records = store.load_records().context("코퍼스 로드 실패")?;

    export_json(path, &records)?;
    println!("[OK] {}개 레코드를 내보냈습니다: {}", records.len(), path.display());
    Ok(())
}

/// 가져오기 명령어 (import)
fn cmd_import(path: &std::path::Path) -> Result<()> {
    let store = KnowledgeStore::open_default().context("KnowledgeStore 열기 실패")?;
    let imported = import_json(path)?;

    let mut chunks = Vec::with_capacity(imported.records.len());
    let mut skipped = imported.skipped;
    for record in imported.records {
        match record.into_chunk() {
            Ok(chunk) => chunks.push(chunk),
            Err(e) => {
                tracing::warn!("Skipping imported record: {}", e);
                skipped += 1;
            }
        }
    }

    let stored = store.append_chunks(&chunks)?;
    println!("[OK] 가져오기 완료: {}개 저장, {}개 건너뜀", stored, skipped);
    Ok(())
}

/// 설정 명령어 (config)
fn cmd_config(action: ConfigAction) -> Result<()> {
    let path = Settings::default_path();

    match action {
        ConfigAction::Show => {
            let settings = Settings::load(&path).context("설정 로드 실패")?;
            println!("[*] 설정 파일: {}", path.display());
            println!(
                "{}",
                serde_json::to_string_pretty(&settings).context("JSON 직렬화 실패")?
            );
        }
        ConfigAction::Set { key, value } => {
            let mut settings = Settings::load(&path).context("설정 로드 실패")?;
            settings.set(&key, &value)?;
            settings.save(&path)?;
            println!("[OK] {} = {}", key, value);
        }
        ConfigAction::Reset => {
            Settings::default().save(&path)?;
            println!("[OK] 설정을 기본값으로 초기화했습니다.");
        }
    }

    Ok(())
}

/// 초기화 명령어 (reset)
fn cmd_reset(yes: bool) -> Result<()> {
    if !yes {
        bail!("코퍼스 전체가 삭제됩니다. 계속하려면 --yes를 지정하세요");
    }

    let store = KnowledgeStore::open_default().context("KnowledgeStore 열기 실패")?;
    let removed = store.clear()?;
    println!("[OK] {}개 청크를 삭제했습니다.", removed);
    Ok(())
}

/// 상태 명령어 (status)
fn cmd_status() -> Result<()> {
    println!("asistente-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", get_data_dir().display());

    let mut ws = match Workspace::open() {
        Ok(ws) => ws,
        Err(e) => {
            println!("[!] 작업 공간 열기 실패: {:#}", e);
            return Ok(());
        }
    };
    println!("[*] 설정 파일: {}", ws.settings_path.display());

    match ws.store.stats() {
        Ok(stats) => {
            println!(
                "[OK] 저장된 청크: {} 건 ({} 출처)",
                stats.chunk_count, stats.source_count
            );
            println!("     총 텍스트: {}", format_bytes(stats.total_text_bytes));
        }
        Err(e) => println!("[!] 통계 조회 실패: {}", e),
    }

    let config = &ws.engine.settings().config;
    println!(
        "[*] top_k={} threshold={} chunk={}/{} auto_train={}",
        config.top_k, config.threshold, config.chunk_max_len, config.chunk_overlap, config.auto_train
    );

    print_status(&ws.engine.build_index());
    Ok(())
}

// ============================================================================
// Output Helpers
// ============================================================================

pub(crate) fn print_status(status: &ModelStatus) {
    match status {
        ModelStatus::Trained { chunks, vocabulary } => {
            println!("[OK] 인덱스: {} 청크, 어휘 {}개", chunks, vocabulary);
        }
        ModelStatus::Untrained { reason } => {
            println!("[!] 인덱스 없음: {}", reason);
        }
    }
}

pub(crate) fn print_state(state: IndexState) {
    match state {
        IndexState::NoIndex => println!("[!] 인덱스 없음"),
        IndexState::Indexed { stale: true } => println!("[*] 인덱스가 코퍼스보다 오래되었습니다"),
        IndexState::Indexed { stale: false } => println!("[OK] 인덱스 최신"),
    }
}

pub(crate) fn print_answer(result: &AnswerResult) {
    println!("{}", result.text);

    if result.reason.is_fallback() {
        tracing::debug!("Fallback reason: {}", result.reason.as_str());
        return;
    }

    println!();
    for used in &result.used_chunks {
        println!(
            "  - [{:.3}] {}: {}",
            used.score,
            used.source,
            truncate_text(&used.excerpt, 80)
        );
    }
}

/// 텍스트 자르기 (UTF-8 안전)
pub(crate) fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hola", 10), "hola");
        assert_eq!(truncate_text("hola mundo", 4), "hola...");
        assert_eq!(truncate_text("hola\nmundo", 20), "hola mundo");
    }

    #[test]
    fn test_truncate_unicode() {
        assert_eq!(truncate_text("información", 5), "infor...");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }

    #[test]
    fn test_loader_for_target() {
        assert_eq!(loader_for("https://example.com").unwrap().name(), "web");
        assert_eq!(loader_for("HTTP://example.com").unwrap().name(), "web");
        assert_eq!(loader_for("./docs").unwrap().name(), "file");
    }

    #[test]
    fn test_help_explains_retraining() {
        use clap::CommandFactory;

        let command = Cli::command();
        let about = |name: &str| {
            command
                .find_subcommand(name)
                .and_then(|c| c.get_about())
                .map(|s| s.to_string())
                .unwrap_or_default()
        };

        assert!(about("train").contains("모델은 저장되지 않으며"));
        assert!(about("ask").contains("다시 학습"));
    }

    #[test]
    fn test_cli_parses_ask() {
        let cli = Cli::try_parse_from(["asistente-rag", "ask", "¿precio?", "-k", "2", "--json"]).unwrap();
        match cli.command {
            Commands::Ask { query, top_k, json, .. } => {
                assert_eq!(query, "¿precio?");
                assert_eq!(top_k, Some(2));
                assert!(json);
            }
            _ => panic!("expected ask"),
        }
    }
}
