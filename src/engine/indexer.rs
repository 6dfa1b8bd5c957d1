//! 백그라운드 인덱서
//!
//! - 요청은 `watch` 채널로 전달되어 마지막 요청만 남습니다 (합치기)
//! - 학습은 `spawn_blocking`에서 실행
//! - 학습 중에 새 요청이 오면 결과를 버리고 새 요청을 학습 (경쟁 없음)
//! - 완료된 스냅샷은 두 번째 `watch` 채널로 통째로 교체 발행

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::knowledge::{Chunk, Corpus};

use super::IndexSnapshot;

#[derive(Debug, Clone)]
enum BuildRequest {
    Build { chunks: Arc<Vec<Chunk>>, revision: u64 },
    Reset,
}

type Published = Option<Arc<IndexSnapshot>>;

pub struct BackgroundIndexer {
    requests: watch::Sender<Option<BuildRequest>>,
    snapshots: watch::Receiver<Published>,
    worker: JoinHandle<()>,
}

impl BackgroundIndexer {
    /// 워커 태스크 시작 (Tokio 런타임 안에서 호출)
    pub fn spawn(initial: Published) -> Self {
        let (request_tx, request_rx) = watch::channel(None);
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);

        let worker = tokio::spawn(run_worker(request_rx, snapshot_tx));

        Self {
            requests: request_tx,
            snapshots: snapshot_rx,
            worker,
        }
    }

    /// 코퍼스 재학습 요청 (진행 중인 학습은 대체됨)
    pub fn request_rebuild(&self, corpus: &Corpus) {
        tracing::debug!("Rebuild requested for r{}", corpus.revision());
        self.requests.send_replace(Some(BuildRequest::Build {
            chunks: corpus.shared(),
            revision: corpus.revision(),
        }));
    }

    /// 인덱스 없음 상태 발행 요청
    pub fn request_reset(&self) {
        self.requests.send_replace(Some(BuildRequest::Reset));
    }

    /// 현재 발행된 스냅샷
    pub fn current(&self) -> Published {
        self.snapshots.borrow().clone()
    }

    /// 스냅샷 변경 구독
    pub fn subscribe(&self) -> watch::Receiver<Published> {
        self.snapshots.clone()
    }

    /// 주어진 리비전 이상의 스냅샷이 발행될 때까지 대기
    pub async fn wait_for_revision(&self, revision: u64) -> Published {
        let mut rx = self.snapshots.clone();
        loop {
            {
                let current = rx.borrow_and_update();
                if let Some(snapshot) = current.as_ref() {
                    if snapshot.revision() >= revision {
                        return Some(Arc::clone(snapshot));
                    }
                }
            }
            if rx.changed().await.is_err() {
                return self.current();
            }
        }
    }

    /// 요청 채널을 닫고 워커 종료 대기
    pub async fn shutdown(self) {
        let Self {
            requests,
            snapshots: _,
            worker,
        } = self;
        drop(requests);
        if let Err(e) = worker.await {
            tracing::warn!("Indexer worker ended abnormally: {}", e);
        }
    }
}

async fn run_worker(
    mut requests: watch::Receiver<Option<BuildRequest>>,
    snapshots: watch::Sender<Published>,
) {
    while requests.changed().await.is_ok() {
        let request = requests.borrow_and_update().clone();

        match request {
            None => continue,
            Some(BuildRequest::Reset) => {
                snapshots.send_replace(None);
                tracing::info!("Index reset published");
            }
            Some(BuildRequest::Build { chunks, revision }) => {
                if chunks.is_empty() {
                    snapshots.send_replace(None);
                    continue;
                }

                let built =
                    tokio::task::spawn_blocking(move || IndexSnapshot::build(chunks, revision)).await;

                let snapshot = match built {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        tracing::warn!("Index build task failed: {}", e);
                        continue;
                    }
                };

                if requests.has_changed().unwrap_or(false) {
                    tracing::debug!("Discarding superseded build r{}", revision);
                    continue;
                }

                tracing::info!(
                    "Background index ready: r{} ({} chunks)",
                    revision,
                    snapshot.chunks().len()
                );
                snapshots.send_replace(Some(Arc::new(snapshot)));
            }
        }
    }

    tracing::debug!("Indexer worker stopped");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::ParagraphChunker;

    fn corpus_with(texts: &[&str]) -> Corpus {
        let chunker = ParagraphChunker::with_defaults();
        let mut corpus = Corpus::new();
        for t in texts {
            corpus.ingest(&chunker, "doc", t);
        }
        corpus
    }

    #[tokio::test]
    async fn test_rebuild_publishes_snapshot() {
        let indexer = BackgroundIndexer::spawn(None);
        assert!(indexer.current().is_none());

        let corpus = corpus_with(&["Atendemos de lunes a sábado."]);
        indexer.request_rebuild(&corpus);

        let snapshot = indexer.wait_for_revision(corpus.revision()).await.unwrap();
        assert_eq!(snapshot.chunks().len(), 1);
        assert_eq!(snapshot.revision(), corpus.revision());

        indexer.shutdown().await;
    }

    #[tokio::test]
    async fn test_latest_request_wins() {
        let indexer = BackgroundIndexer::spawn(None);

        let mut corpus = corpus_with(&["uno"]);
        indexer.request_rebuild(&corpus);
        let chunker = ParagraphChunker::with_defaults();
        corpus.ingest(&chunker, "doc", "dos");
        corpus.ingest(&chunker, "doc", "tres");
        indexer.request_rebuild(&corpus);

        let snapshot = indexer.wait_for_revision(corpus.revision()).await.unwrap();
        assert_eq!(snapshot.chunks().len(), 3);

        // 이전 스냅샷은 읽는 쪽이 계속 들고 있을 수 있음
        let held = indexer.current().unwrap();
        assert_eq!(held.revision(), corpus.revision());

        indexer.shutdown().await;
    }

    #[tokio::test]
    async fn test_reader_keeps_previous_snapshot() {
        let indexer = BackgroundIndexer::spawn(None);
        let mut corpus = corpus_with(&["uno"]);
        indexer.request_rebuild(&corpus);
        let first = indexer.wait_for_revision(corpus.revision()).await.unwrap();

        corpus.ingest(&ParagraphChunker::with_defaults(), "doc", "dos");
        indexer.request_rebuild(&corpus);
        let second = indexer.wait_for_revision(corpus.revision()).await.unwrap();

        assert_eq!(first.chunks().len(), 1);
        assert_eq!(second.chunks().len(), 2);

        indexer.shutdown().await;
    }

    #[tokio::test]
    async fn test_reset_publishes_none() {
        let corpus = corpus_with(&["uno"]);
        let initial = Arc::new(IndexSnapshot::build(corpus.shared(), corpus.revision()));
        let indexer = BackgroundIndexer::spawn(Some(initial));
        assert!(indexer.current().is_some());

        let mut rx = indexer.subscribe();
        indexer.request_reset();
        rx.changed().await.unwrap();
        assert!(indexer.current().is_none());

        indexer.shutdown().await;
    }
}
