use pretty_assertions::assert_eq;

use super::*;
use crate::backend::daemon::Daemon;

fn published(content: &str) -> (LocalDaemon, PageDirectory) {
    let mut daemon = LocalDaemon::new();
    daemon.start().unwrap();
    daemon.create_page("file", content).unwrap();
    daemon.pull_all_pages().unwrap();
    let directory = daemon.directory();
    (daemon, directory)
}

fn insert(offset: usize, text: &str) -> Vec<Value> {
    vec![
        json!(forward_chunk("insert")),
        json!([offset, text]),
    ]
}

#[tokio::test]
async fn live_editor_edits_the_page() {
    let (daemon, directory) = published("hello");
    let mut editor = MemoryEditor::new(directory, SyncMode::Live);
    editor.connect().await.unwrap();
    editor
        .request(COMMAND, vec![json!("edit! /tmp/pages/file")])
        .await
        .unwrap();
    editor.request(EXEC_LUA, insert(5, " 🥕")).await.unwrap();
    let page = daemon.find_page("file").unwrap();
    assert_eq!(page.get(CONTENT_KEY).unwrap().to_string(), "hello 🥕");
    let lines = editor.request(GET_LINES, vec![]).await.unwrap();
    assert_eq!(lines, json!(["hello 🥕"]));
}

#[tokio::test]
async fn snapshot_editor_keeps_its_copy() {
    let (daemon, directory) = published("a\nb");
    let mut editor = MemoryEditor::new(directory, SyncMode::Snapshot);
    editor.connect().await.unwrap();
    editor
        .request(COMMAND, vec![json!("edit! ./file")])
        .await
        .unwrap();
    editor
        .request(
            EXEC_LUA,
            vec![json!(forward_chunk("delete")), json!([0, 2])],
        )
        .await
        .unwrap();
    let page = daemon.find_page("file").unwrap();
    assert_eq!(page.get(CONTENT_KEY).unwrap().to_string(), "a\nb");
    let lines = editor.request(GET_LINES, vec![]).await.unwrap();
    assert_eq!(lines, json!(["b"]));
}

#[tokio::test]
async fn unknown_page_and_function_are_remote_errors() {
    let (_daemon, directory) = published("hello");
    let mut editor = MemoryEditor::new(directory, SyncMode::Live);
    editor.connect().await.unwrap();
    assert!(matches!(
        editor.request(COMMAND, vec![json!("edit! ./missing")]).await,
        Err(RpcError::Remote { .. })
    ));
    assert!(matches!(
        editor.request(EXEC_LUA, insert(0, "x")).await,
        Err(RpcError::Remote { .. })
    ));
    editor
        .request(COMMAND, vec![json!("edit! ./file")])
        .await
        .unwrap();
    assert!(matches!(
        editor
            .request(EXEC_LUA, vec![json!("return nope(...)"), json!([0, "x"])])
            .await,
        Err(RpcError::Remote { .. })
    ));
    assert!(matches!(
        editor.request(EXEC_LUA, insert(9, "x")).await,
        Err(RpcError::Remote { .. })
    ));
}

#[tokio::test]
async fn broken_after_n_calls() {
    let (_daemon, directory) = published("hello");
    let mut editor = MemoryEditor::new(directory, SyncMode::Live).fail_after(1);
    let probe = editor.probe();
    assert!(matches!(
        editor.request(GET_LINES, vec![]).await,
        Err(RpcError::Disconnected)
    ));
    editor.connect().await.unwrap();
    assert!(matches!(
        editor.request(GET_LINES, vec![]).await,
        Err(RpcError::Disconnected)
    ));
    assert_eq!(probe.calls(), vec![GET_LINES.to_string(), GET_LINES.to_string()]);
    assert!(!probe.is_closed());
    editor.close().await.unwrap();
    assert!(probe.is_closed());
}

#[test]
fn fuzz_live_0() {
    fuzzing(FuzzInput {
        seed: 0,
        rounds: 255,
        await_edits: false,
    })
}

#[test]
fn fuzz_live_1() {
    fuzzing(FuzzInput {
        seed: u64::MAX,
        rounds: 64,
        await_edits: true,
    })
}

#[test]
fn fuzz_snapshot_0() {
    fuzzing_snapshot(FuzzInput {
        seed: 123,
        rounds: 200,
        await_edits: false,
    })
}

#[test]
fn arb_live_editor_converges() {
    arbtest::arbtest(|u| {
        let input: FuzzInput = u.arbitrary()?;
        fuzzing(input);
        Ok(())
    });
}
