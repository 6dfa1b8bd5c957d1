//! 대화형 모드
//!
//! 질문은 현재 설치된 스냅샷으로 바로 답하고, 문서 수집과 재학습은
//! 백그라운드에서 진행합니다. 새 스냅샷이 발행되면 엔진에 설치합니다.

use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use super::{loader_for, print_answer, print_state, print_status, Workspace};
use crate::engine::BackgroundIndexer;
use crate::extractor::LoadedText;

/// 대화형 입력 한 줄
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ChatInput<'a> {
    Empty,
    Quit,
    Train,
    Status,
    Help,
    Add(&'a str),
    Question(&'a str),
}

pub(crate) fn parse_chat_input(line: &str) -> ChatInput<'_> {
    let line = line.trim();
    if line.is_empty() {
        return ChatInput::Empty;
    }

    let Some(command) = line.strip_prefix(':') else {
        return ChatInput::Question(line);
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    match name {
        "q" | "quit" | "exit" => ChatInput::Quit,
        "train" => ChatInput::Train,
        "status" => ChatInput::Status,
        "add" if !arg.is_empty() => ChatInput::Add(arg),
        _ => ChatInput::Help,
    }
}

fn print_help() {
    println!("  :add <경로|URL>  문서 추가 (백그라운드)");
    println!("  :train          재학습");
    println!("  :status         인덱스 상태");
    println!("  :quit           종료");
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

type LoadOutcome = (String, Result<Vec<LoadedText>>);

/// 백그라운드 로드 결과 반영
///
/// 실패는 출력만 하고 세션은 계속됩니다. 재학습이 필요하면 `true`.
fn absorb_loaded(ws: &mut Workspace, target: &str, result: Result<Vec<LoadedText>>) -> bool {
    match result.and_then(|loaded| ws.ingest_loaded(loaded, None)) {
        Ok(added) => added > 0 && ws.engine.settings().config.auto_train,
        Err(e) => {
            println!("[!] {} 추가 실패: {:#}", target, e);
            false
        }
    }
}

/// 대화형 루프
pub async fn run_chat() -> Result<()> {
    let mut ws = Workspace::open()?;
    print_status(&ws.engine.build_index());

    let indexer = BackgroundIndexer::spawn(ws.engine.snapshot());
    let mut snapshots = indexer.subscribe();
    let (loaded_tx, mut loaded_rx) = mpsc::unbounded_channel::<LoadOutcome>();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("[*] 대화형 모드 (:help 도움말, :quit 종료)");
    prompt();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };

                match parse_chat_input(&line) {
                    ChatInput::Empty => {}
                    ChatInput::Quit => break,
                    ChatInput::Help => print_help(),
                    ChatInput::Status => print_state(ws.engine.state()),
                    ChatInput::Train => {
                        indexer.request_rebuild(ws.engine.corpus());
                        println!("[*] 재학습 요청됨");
                    }
                    ChatInput::Add(target) => match loader_for(target) {
                        Ok(loader) => {
                            let target = target.to_string();
                            let tx = loaded_tx.clone();
                            println!("[*] 불러오는 중: {}", target);

                            tokio::spawn(async move {
                                let result = loader.load(&target).await;
                                let _ = tx.send((target, result));
                            });
                        }
                        Err(e) => println!("[!] {} 로더 준비 실패: {:#}", target, e),
                    },
                    ChatInput::Question(query) => {
                        print_answer(&ws.engine.ask(query));
                    }
                }
                prompt();
            }

            Some((target, result)) = loaded_rx.recv() => {
                if absorb_loaded(&mut ws, &target, result) {
                    indexer.request_rebuild(ws.engine.corpus());
                }
                prompt();
            }

            Ok(()) = snapshots.changed() => {
                let published = snapshots.borrow_and_update().clone();
                if let Some(snapshot) = published {
                    println!();
                    print_status(&ws.engine.install(snapshot));
                    prompt();
                }
            }
        }
    }

    indexer.shutdown().await;
    println!("[OK] 종료");
    Ok(())
}
